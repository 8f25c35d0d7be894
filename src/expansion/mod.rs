use std::borrow::Cow;
use std::collections::HashMap;

use tracing::trace;

use crate::error::QueryFnError;

mod parsers;
mod scanner;

use parsers::{scan_digits, scan_ident};
use scanner::{Span, split_spans};

/// Replacement for a list placeholder bound to an empty list.
///
/// `x IN (SELECT NULL WHERE 0)` is false and `x NOT IN (SELECT NULL WHERE 0)` is true for
/// every `x`, which is what an empty membership list means. The text is only valid where a
/// subquery is, so the placeholder must be the sole element of its `IN (...)` list.
pub const EMPTY_LIST_SUBSTITUTE: &str = "SELECT NULL WHERE 0";

/// One parameter slot: a single value, or the elements of a list parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    Single(T),
    Expand(Vec<T>),
}

impl<T> Slot<T> {
    #[must_use]
    pub fn is_expand(&self) -> bool {
        matches!(self, Slot::Expand(_))
    }
}

/// Rewrite `?` placeholders bound to list slots into one placeholder per element.
///
/// Slot `i` belongs to the `i`-th bare `?` in the code spans of `sql`. Returns the rewritten
/// statement (borrowed when nothing expands) and the flattened values in slot order.
///
/// # Errors
///
/// Returns `QueryFnError::UsageError` if an expansion is needed and the statement uses
/// numbered `?NNN` placeholders, whose numbering the rewrite cannot keep consistent, or if an
/// empty list sits anywhere but alone in its parentheses.
pub fn expand_positional<T>(
    sql: &str,
    slots: Vec<Slot<T>>,
) -> Result<(Cow<'_, str>, Vec<T>), QueryFnError> {
    let counts: Vec<Option<usize>> = slots
        .iter()
        .map(|slot| match slot {
            Slot::Single(_) => None,
            Slot::Expand(items) => Some(items.len()),
        })
        .collect();
    let values = flatten(slots);

    if counts.iter().all(Option::is_none) {
        return Ok((Cow::Borrowed(sql), values));
    }

    let mut out = String::with_capacity(sql.len() + 16);
    let mut index = 0usize;
    for span in split_spans(sql) {
        let range = match span {
            Span::Opaque(range) => {
                out.push_str(&sql[range]);
                continue;
            }
            Span::Code(range) => range,
        };
        let code = &sql[range];
        let bytes = code.as_bytes();
        let mut copied = 0;
        let mut idx = 0;
        while idx < bytes.len() {
            if bytes[idx] != b'?' {
                idx += 1;
                continue;
            }
            let digits_end = scan_digits(bytes, idx + 1);
            if digits_end > idx + 1 {
                return Err(QueryFnError::UsageError(format!(
                    "list parameters need bare `?` placeholders, found `{}`",
                    &code[idx..digits_end]
                )));
            }
            out.push_str(&code[copied..idx]);
            match counts.get(index).copied().flatten() {
                Some(count) => {
                    check_empty_list(code, idx, idx + 1, count)?;
                    push_run(&mut out, count, |buf, _| buf.push('?'));
                }
                None => out.push('?'),
            }
            index += 1;
            idx += 1;
            copied = idx;
        }
        out.push_str(&code[copied..]);
    }

    trace!(placeholders = index, sql = %out, "expanded positional placeholders");
    Ok((Cow::Owned(out), values))
}

/// Rewrite named placeholders bound to list slots into synthetic `__name_i` placeholders.
///
/// `:name`, `@name` and `$name` are all recognised and the rewrite keeps the prefix, so
/// `@ids` becomes `@__ids_0, @__ids_1`. A name matches only as a whole identifier, so
/// expanding `:id` leaves `:identity` alone. Values of expanded names are returned under the
/// synthetic keys `__name_i`; other values keep their key. Order follows `slots`.
///
/// # Errors
///
/// Returns `QueryFnError::UsageError` if an empty list sits anywhere but alone in its
/// parentheses.
pub fn expand_named<T>(
    sql: &str,
    slots: Vec<(String, Slot<T>)>,
) -> Result<(Cow<'_, str>, Vec<(String, T)>), QueryFnError> {
    let counts: HashMap<String, usize> = slots
        .iter()
        .filter_map(|(name, slot)| match slot {
            Slot::Expand(items) => Some((name.clone(), items.len())),
            Slot::Single(_) => None,
        })
        .collect();

    let mut values = Vec::with_capacity(slots.len());
    for (name, slot) in slots {
        match slot {
            Slot::Single(value) => values.push((name, value)),
            Slot::Expand(items) => values.extend(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, value)| (synthetic_name(&name, i), value)),
            ),
        }
    }

    if counts.is_empty() {
        return Ok((Cow::Borrowed(sql), values));
    }

    let mut out = String::with_capacity(sql.len() + 32);
    for span in split_spans(sql) {
        let range = match span {
            Span::Opaque(range) => {
                out.push_str(&sql[range]);
                continue;
            }
            Span::Code(range) => range,
        };
        let code = &sql[range];
        let mut copied = 0;
        let mut idx = 0;
        while let Some(off) = code[idx..].find(NAMED_PREFIXES) {
            let start = idx + off;
            let Some(end) = scan_ident(code, start + 1) else {
                idx = start + 1;
                continue;
            };
            let prefix = &code[start..=start];
            let name = &code[start + 1..end];
            if let Some(&count) = counts.get(name) {
                check_empty_list(code, start, end, count)?;
                out.push_str(&code[copied..start]);
                push_run(&mut out, count, |buf, i| {
                    buf.push_str(prefix);
                    buf.push_str(&synthetic_name(name, i));
                });
                copied = end;
            }
            idx = end;
        }
        out.push_str(&code[copied..]);
    }

    trace!(sql = %out, "expanded named placeholders");
    Ok((Cow::Owned(out), values))
}

const NAMED_PREFIXES: [char; 3] = [':', '@', '$'];

fn synthetic_name(name: &str, index: usize) -> String {
    format!("__{name}_{index}")
}

/// An empty list is only valid as `(placeholder)`: the substitute is a whole subquery.
fn check_empty_list(code: &str, start: usize, end: usize, count: usize) -> Result<(), QueryFnError> {
    if count > 0 {
        return Ok(());
    }
    let before = code[..start].trim_end().chars().next_back();
    let after = code[end..].trim_start().chars().next();
    if before.is_none_or(|c| c == '(') && after.is_none_or(|c| c == ')') {
        return Ok(());
    }
    Err(QueryFnError::UsageError(format!(
        "`{}` is bound to an empty list and must be the only element of its `IN (...)` list",
        &code[start..end]
    )))
}

fn push_run(out: &mut String, count: usize, mut placeholder: impl FnMut(&mut String, usize)) {
    if count == 0 {
        out.push_str(EMPTY_LIST_SUBSTITUTE);
        return;
    }
    for i in 0..count {
        if i > 0 {
            out.push_str(", ");
        }
        placeholder(out, i);
    }
}

fn flatten<T>(slots: Vec<Slot<T>>) -> Vec<T> {
    let mut values = Vec::with_capacity(slots.len());
    for slot in slots {
        match slot {
            Slot::Single(value) => values.push(value),
            Slot::Expand(items) => values.extend(items),
        }
    }
    values
}
