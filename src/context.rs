//! Scoped default connection.
//!
//! A [`DbScope`] carries the connection calls should use when the caller does not pass one
//! directly. Scopes are plain values: nesting a scope shadows the outer one for as long as
//! it is borrowed, and leaving it restores the outer one.

use crate::error::QueryFnError;

/// Optional default connection handed down to result-mode calls.
#[derive(Debug)]
pub struct DbScope<'a, E: ?Sized> {
    conn: Option<&'a E>,
}

impl<E: ?Sized> Clone for DbScope<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: ?Sized> Copy for DbScope<'_, E> {}

impl<'a, E: ?Sized> DbScope<'a, E> {
    #[must_use]
    pub fn new(conn: &'a E) -> Self {
        Self { conn: Some(conn) }
    }

    /// Scope with no default connection.
    #[must_use]
    pub fn empty() -> Self {
        Self { conn: None }
    }

    /// Inner scope: `conn` replaces this scope's connection, `None` keeps it.
    #[must_use]
    pub fn nested(&self, conn: Option<&'a E>) -> Self {
        Self {
            conn: conn.or(self.conn),
        }
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.conn.is_some()
    }

    /// The scope's connection.
    ///
    /// # Errors
    ///
    /// Returns `QueryFnError::ConfigError` if no default connection is set.
    pub fn conn(&self) -> Result<&'a E, QueryFnError> {
        self.conn.ok_or_else(|| {
            QueryFnError::ConfigError(
                "no default connection is set; pass one explicitly or open a DbScope".into(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nesting_shadows_and_restores() {
        let outer_conn = 1;
        let inner_conn = 2;
        let outer = DbScope::new(&outer_conn);
        {
            let inner = outer.nested(Some(&inner_conn));
            assert_eq!(*inner.conn().unwrap(), 2);
            assert_eq!(*inner.nested(None).conn().unwrap(), 2);
        }
        assert_eq!(*outer.conn().unwrap(), 1);
    }

    #[test]
    fn empty_scope_is_config_error() {
        let scope: DbScope<'_, i32> = DbScope::empty();
        assert!(matches!(scope.conn(), Err(QueryFnError::ConfigError(_))));
    }
}
