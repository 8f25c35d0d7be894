use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use tracing::trace;

use super::{DecodeFn, FieldType, FromValue, make_scalar_decoder};
use crate::error::QueryFnError;
use crate::results::DbRow;
use crate::types::RowValues;

/// One declared field of a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: FieldType,
}

impl FieldSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// How rows map onto a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordShape {
    /// Declared fields, looked up by column name. Extra columns are ignored.
    Fields(Vec<FieldSpec>),
    /// Every column, undecoded, under its column name.
    Dynamic,
}

/// A type built from one result row.
///
/// Usually declared through [`result_record!`](crate::result_record), which generates the
/// struct and this impl from its field list.
pub trait ResultRecord: Sized + 'static {
    fn shape() -> RecordShape;

    /// # Errors
    ///
    /// Returns `QueryFnError::DecodeError` if a field does not convert.
    fn from_decoded(row: DecodedRow) -> Result<Self, QueryFnError>;
}

/// Declare a record struct and its [`ResultRecord`] impl.
///
/// Each field is read from the column of the same name and converted through its
/// type's [`FromValue`] impl; use `Option<T>` for nullable columns.
///
/// ```rust
/// query_fn::result_record! {
///     #[derive(Debug, Clone)]
///     pub struct User {
///         pub id: i64,
///         pub username: String,
///         pub email: Option<String>,
///     }
/// }
/// ```
#[macro_export]
macro_rules! result_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($(#[$fmeta:meta])* $fvis:vis $field:ident : $ty:ty),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $($(#[$fmeta])* $fvis $field: $ty),*
        }

        impl $crate::decode::ResultRecord for $name {
            fn shape() -> $crate::decode::RecordShape {
                $crate::decode::RecordShape::Fields(vec![
                    $($crate::decode::FieldSpec::new(
                        stringify!($field),
                        <$ty as $crate::decode::FromValue>::FIELD_TYPE,
                    )),*
                ])
            }

            fn from_decoded(
                #[allow(unused_mut)] mut row: $crate::decode::DecodedRow,
            ) -> ::std::result::Result<Self, $crate::QueryFnError> {
                Ok(Self {
                    $($field: row.take(stringify!($field))?),*
                })
            }
        }
    };
}

/// Decoded values of one row, in field order.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRow {
    names: Arc<Vec<String>>,
    values: Vec<RowValues>,
}

impl DecodedRow {
    #[must_use]
    pub fn new(names: Arc<Vec<String>>, values: Vec<RowValues>) -> Self {
        Self { names, values }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RowValues> {
        self.position(name).and_then(|idx| self.values.get(idx))
    }

    /// Move a field out and convert it, leaving NULL behind.
    ///
    /// # Errors
    ///
    /// Returns `QueryFnError::DecodeError` for an unknown field or a failed conversion.
    pub fn take<T: FromValue>(&mut self, name: &str) -> Result<T, QueryFnError> {
        let idx = self
            .position(name)
            .ok_or_else(|| QueryFnError::DecodeError(format!("record has no field `{name}`")))?;
        let value = std::mem::replace(&mut self.values[idx], RowValues::Null);
        T::from_value(value)
            .map_err(|err| QueryFnError::DecodeError(format!("field `{name}`: {err}")))
    }

    /// Name to value map. Of several same-named columns the first wins, as in [`DbRow::get`].
    #[must_use]
    pub fn into_map(self) -> BTreeMap<String, RowValues> {
        let mut map = BTreeMap::new();
        for (name, value) in self.names.iter().zip(self.values) {
            map.entry(name.clone()).or_insert(value);
        }
        map
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

impl ResultRecord for BTreeMap<String, RowValues> {
    fn shape() -> RecordShape {
        RecordShape::Dynamic
    }

    fn from_decoded(row: DecodedRow) -> Result<Self, QueryFnError> {
        Ok(row.into_map())
    }
}

impl ResultRecord for HashMap<String, RowValues> {
    fn shape() -> RecordShape {
        RecordShape::Dynamic
    }

    fn from_decoded(row: DecodedRow) -> Result<Self, QueryFnError> {
        let mut map = HashMap::with_capacity(row.values.len());
        for (name, value) in row.names.iter().zip(row.values) {
            map.entry(name.clone()).or_insert(value);
        }
        Ok(map)
    }
}

type DecoderCache = LazyLock<RwLock<HashMap<TypeId, Arc<RecordDecoder>>>>;

static DECODERS: DecoderCache = LazyLock::new(|| RwLock::new(HashMap::new()));

/// Row decoder compiled from a [`RecordShape`].
#[derive(Debug)]
pub struct RecordDecoder {
    fields: Option<(Arc<Vec<String>>, Vec<(FieldType, DecodeFn)>)>,
}

impl RecordDecoder {
    #[must_use]
    pub fn from_shape(shape: RecordShape) -> Self {
        let fields = match shape {
            RecordShape::Dynamic => None,
            RecordShape::Fields(specs) => {
                let names = specs.iter().map(|s| s.name.clone()).collect();
                let decoders = specs
                    .iter()
                    .map(|s| (s.ty, make_scalar_decoder(s.ty)))
                    .collect();
                Some((Arc::new(names), decoders))
            }
        };
        Self { fields }
    }

    /// Process-wide decoder for `T`, built on first use.
    ///
    /// Concurrent first uses may each build one; the first stored is kept.
    #[must_use]
    pub fn for_record<T: ResultRecord>() -> Arc<RecordDecoder> {
        let key = TypeId::of::<T>();
        if let Some(found) = DECODERS
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(found);
        }
        let built = Arc::new(Self::from_shape(T::shape()));
        trace!(record = std::any::type_name::<T>(), "built record decoder");
        let mut cache = DECODERS.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cache.entry(key).or_insert(built))
    }

    /// Resolve declared fields to column positions for one result.
    ///
    /// # Errors
    ///
    /// Returns `QueryFnError::DecodeError` naming the first declared field with no column.
    pub fn bind(&self, columns: &Arc<Vec<String>>) -> Result<BoundDecoder<'_>, QueryFnError> {
        let Some((names, decoders)) = &self.fields else {
            return Ok(BoundDecoder {
                names: Arc::clone(columns),
                plan: Plan::Dynamic,
            });
        };
        let mut positions = Vec::with_capacity(names.len());
        for name in names.iter() {
            let pos = columns.iter().position(|c| c == name).ok_or_else(|| {
                QueryFnError::DecodeError(format!(
                    "no column named `{name}` in result (columns: {})",
                    columns.join(", ")
                ))
            })?;
            positions.push(pos);
        }
        Ok(BoundDecoder {
            names: Arc::clone(names),
            plan: Plan::Fields {
                positions,
                decoders,
            },
        })
    }
}

/// Decodes a stream of rows, binding to the columns of the first row it sees.
pub struct DecodeSession<'a> {
    decoder: &'a RecordDecoder,
    bound: Option<BoundDecoder<'a>>,
}

impl<'a> DecodeSession<'a> {
    #[must_use]
    pub fn new(decoder: &'a RecordDecoder) -> Self {
        Self {
            decoder,
            bound: None,
        }
    }

    /// # Errors
    ///
    /// Returns `QueryFnError::DecodeError` if binding or field conversion fails.
    pub fn decode<T: ResultRecord>(&mut self, row: DbRow) -> Result<T, QueryFnError> {
        let bound = match self.bound.take() {
            Some(bound) => bound,
            None => self.decoder.bind(row.column_names())?,
        };
        let record = bound.decode(row);
        self.bound = Some(bound);
        record
    }
}

enum Plan<'a> {
    Dynamic,
    Fields {
        positions: Vec<usize>,
        decoders: &'a [(FieldType, DecodeFn)],
    },
}

/// A [`RecordDecoder`] bound to the columns of one result.
pub struct BoundDecoder<'a> {
    names: Arc<Vec<String>>,
    plan: Plan<'a>,
}

impl BoundDecoder<'_> {
    /// Decode one row into `T`.
    ///
    /// # Errors
    ///
    /// Returns `QueryFnError::DecodeError` naming the field that failed.
    pub fn decode<T: ResultRecord>(&self, row: DbRow) -> Result<T, QueryFnError> {
        T::from_decoded(self.decode_row(row)?)
    }

    fn decode_row(&self, row: DbRow) -> Result<DecodedRow, QueryFnError> {
        let mut raw = row.into_values();
        let values = match &self.plan {
            Plan::Dynamic => raw,
            Plan::Fields {
                positions,
                decoders,
            } => {
                let mut values = Vec::with_capacity(positions.len());
                for ((pos, (_, decode)), name) in positions.iter().zip(decoders.iter()).zip(self.names.iter()) {
                    let value = raw
                        .get_mut(*pos)
                        .map_or(RowValues::Null, |slot| std::mem::replace(slot, RowValues::Null));
                    values.push(
                        decode(value)
                            .map_err(|err| QueryFnError::DecodeError(format!("column `{name}`: {err}")))?,
                    );
                }
                values
            }
        };
        Ok(DecodedRow::new(Arc::clone(&self.names), values))
    }
}
