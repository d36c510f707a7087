//! Principals and request scopes.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The acting identity that checks are evaluated against.
///
/// Wraps an opaque credential supplied by the embedding application. The
/// layer never inspects it; checks recover it with [`Principal::credential`].
#[derive(Clone)]
pub struct Principal {
    credential: Arc<dyn Any + Send + Sync>,
}

impl Principal {
    /// Wraps an opaque credential.
    pub fn new<C: Any + Send + Sync>(credential: C) -> Self {
        Self {
            credential: Arc::new(credential),
        }
    }

    /// Returns the credential if it has type `C`.
    #[must_use]
    pub fn credential<C: Any>(&self) -> Option<&C> {
        self.credential.downcast_ref::<C>()
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal").finish_non_exhaustive()
    }
}

/// Request context handed to checks.
#[derive(Debug, Clone)]
pub struct RequestScope {
    principal: Principal,
    attributes: BTreeMap<String, String>,
}

impl RequestScope {
    /// Creates a scope for `principal` with no attributes.
    #[must_use]
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            attributes: BTreeMap::new(),
        }
    }

    /// Adds a request attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// The acting principal.
    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Looks up a request attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct User {
        name: &'static str,
    }

    #[test]
    fn credential_downcasts_to_its_type() {
        let principal = Principal::new(User { name: "alice" });
        assert_eq!(principal.credential::<User>(), Some(&User { name: "alice" }));
        assert!(principal.credential::<String>().is_none());
    }

    #[test]
    fn scope_attributes() {
        let scope = RequestScope::new(Principal::new(()))
            .with_attribute("tenant", "acme");
        assert_eq!(scope.attribute("tenant"), Some("acme"));
        assert_eq!(scope.attribute("region"), None);
    }
}
