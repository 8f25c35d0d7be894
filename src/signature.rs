//! Declared parameters of a query function and call-time argument binding.

use crate::decode::FromValue;
use crate::error::QueryFnError;
use crate::types::RowValues;

/// One declared parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub default: Option<RowValues>,
}

/// Ordered parameter declarations of a query function.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    params: Vec<ParamSpec>,
}

impl Signature {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a required parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            default: None,
        });
        self
    }

    /// Declare a parameter with a default value.
    #[must_use]
    pub fn param_default(mut self, name: impl Into<String>, default: impl Into<RowValues>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            default: Some(default.into()),
        });
        self
    }

    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Bind call-time arguments to the declared parameters, applying defaults.
    ///
    /// # Errors
    ///
    /// Returns `QueryFnError::UsageError` when there are too many positional arguments,
    /// an unknown or repeated keyword, or a required parameter without a value.
    pub fn bind(&self, args: &CallArgs) -> Result<BoundArgs, QueryFnError> {
        if args.positional.len() > self.params.len() {
            return Err(QueryFnError::UsageError(format!(
                "takes {} positional argument(s) but {} were given",
                self.params.len(),
                args.positional.len()
            )));
        }

        let mut slots: Vec<Option<RowValues>> = vec![None; self.params.len()];
        for (slot, value) in slots.iter_mut().zip(&args.positional) {
            *slot = Some(value.clone());
        }

        for (name, value) in &args.named {
            let Some(idx) = self.params.iter().position(|p| &p.name == name) else {
                return Err(QueryFnError::UsageError(format!(
                    "got an unexpected keyword argument `{name}`"
                )));
            };
            if slots[idx].is_some() {
                return Err(QueryFnError::UsageError(format!(
                    "got multiple values for argument `{name}`"
                )));
            }
            slots[idx] = Some(value.clone());
        }

        let mut values = Vec::with_capacity(self.params.len());
        for (spec, slot) in self.params.iter().zip(slots) {
            let value = match (slot, &spec.default) {
                (Some(value), _) => value,
                (None, Some(default)) => default.clone(),
                (None, None) => {
                    return Err(QueryFnError::UsageError(format!(
                        "missing required argument `{}`",
                        spec.name
                    )));
                }
            };
            values.push((spec.name.clone(), value));
        }
        Ok(BoundArgs { values })
    }
}

/// Arguments supplied at call time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallArgs {
    positional: Vec<RowValues>,
    named: Vec<(String, RowValues)>,
}

impl CallArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn arg(mut self, value: impl Into<RowValues>) -> Self {
        self.positional.push(value.into());
        self
    }

    #[must_use]
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.named.push((name.into(), value.into()));
        self
    }
}

impl<V: Into<RowValues>> FromIterator<V> for CallArgs {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self {
            positional: iter.into_iter().map(Into::into).collect(),
            named: Vec::new(),
        }
    }
}

/// Arguments after binding, in declared order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundArgs {
    values: Vec<(String, RowValues)>,
}

impl BoundArgs {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RowValues> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Typed access to a bound argument.
    ///
    /// # Errors
    ///
    /// Returns `QueryFnError::UsageError` for an undeclared name, or a decode error
    /// if the value does not convert to `T`.
    pub fn value<T: FromValue>(&self, name: &str) -> Result<T, QueryFnError> {
        let value = self.get(name).ok_or_else(|| {
            QueryFnError::UsageError(format!("no argument named `{name}` is declared"))
        })?;
        T::from_value(value.clone())
    }

    #[must_use]
    pub fn to_positional(&self) -> Vec<RowValues> {
        self.values.iter().map(|(_, v)| v.clone()).collect()
    }

    #[must_use]
    pub fn to_named(&self) -> Vec<(String, RowValues)> {
        self.values.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig() -> Signature {
        Signature::new()
            .param("username")
            .param_default("email", RowValues::Null)
    }

    #[test]
    fn binds_positional_then_defaults() {
        let bound = sig().bind(&CallArgs::new().arg("jane")).unwrap();
        assert_eq!(
            bound.to_named(),
            vec![
                ("username".to_string(), RowValues::Text("jane".into())),
                ("email".to_string(), RowValues::Null),
            ]
        );
    }

    #[test]
    fn binds_keywords_out_of_order() {
        let args = CallArgs::new().kwarg("email", "j@x").kwarg("username", "j");
        let bound = sig().bind(&args).unwrap();
        assert_eq!(
            bound.to_positional(),
            vec![RowValues::Text("j".into()), RowValues::Text("j@x".into())]
        );
        assert_eq!(bound.value::<String>("email").unwrap(), "j@x");
    }

    #[test]
    fn rejects_bad_calls() {
        let too_many: CallArgs = [1, 2, 3].into_iter().collect();
        assert!(matches!(sig().bind(&too_many), Err(QueryFnError::UsageError(_))));

        let unknown = CallArgs::new().arg("j").kwarg("phone", "1");
        assert!(matches!(sig().bind(&unknown), Err(QueryFnError::UsageError(_))));

        let twice = CallArgs::new().arg("j").kwarg("username", "k");
        assert!(matches!(sig().bind(&twice), Err(QueryFnError::UsageError(_))));

        assert!(matches!(sig().bind(&CallArgs::new()), Err(QueryFnError::UsageError(_))));
    }
}
