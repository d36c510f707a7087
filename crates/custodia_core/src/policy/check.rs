//! Security checks.

use crate::policy::principal::{Principal, RequestScope};
use std::fmt;
use std::sync::Arc;

/// Result of evaluating a [`RuntimeCheck`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The principal passes the check.
    Allow,
    /// The principal fails the check.
    Deny,
    /// The check cannot decide without the object itself.
    Abstain,
}

/// A check that can express itself as a storage predicate.
pub trait NativeFilterCheck<P>: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// The predicate fragment for this request.
    fn predicate(&self, scope: &RequestScope) -> P;
}

/// A check that can only be evaluated in process.
pub trait RuntimeCheck: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Evaluates the check against the acting principal.
    fn evaluate(&self, principal: &Principal) -> CheckOutcome;
}

impl<P, F> NativeFilterCheck<P> for F
where
    F: Fn(&RequestScope) -> P + Send + Sync,
{
    fn predicate(&self, scope: &RequestScope) -> P {
        self(scope)
    }
}

impl<F> RuntimeCheck for F
where
    F: Fn(&Principal) -> CheckOutcome + Send + Sync,
{
    fn evaluate(&self, principal: &Principal) -> CheckOutcome {
        self(principal)
    }
}

/// One entry of a filter policy.
///
/// The set of check kinds is closed: a check either produces a predicate
/// fragment or is evaluated at runtime.
pub enum Check<P> {
    /// Translates into a predicate over `P`.
    Native(Arc<dyn NativeFilterCheck<P>>),
    /// Evaluated against the principal.
    Runtime(Arc<dyn RuntimeCheck>),
}

impl<P> Check<P> {
    /// Wraps a predicate-producing check.
    pub fn native(check: impl NativeFilterCheck<P> + 'static) -> Self {
        Self::Native(Arc::new(check))
    }

    /// Wraps a runtime check.
    pub fn runtime(check: impl RuntimeCheck + 'static) -> Self {
        Self::Runtime(Arc::new(check))
    }

    /// Name used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Native(check) => check.name(),
            Self::Runtime(check) => check.name(),
        }
    }
}

impl<P> Clone for Check<P> {
    fn clone(&self) -> Self {
        match self {
            Self::Native(check) => Self::Native(Arc::clone(check)),
            Self::Runtime(check) => Self::Runtime(Arc::clone(check)),
        }
    }
}

impl<P> fmt::Debug for Check<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(check) => f.debug_tuple("Native").field(&check.name()).finish(),
            Self::Runtime(check) => f.debug_tuple("Runtime").field(&check.name()).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct IsAdmin;

    impl RuntimeCheck for IsAdmin {
        fn name(&self) -> &str {
            "is-admin"
        }

        fn evaluate(&self, principal: &Principal) -> CheckOutcome {
            match principal.credential::<&str>() {
                Some(&"admin") => CheckOutcome::Allow,
                _ => CheckOutcome::Deny,
            }
        }
    }

    #[test]
    fn closures_are_checks() {
        let scope = RequestScope::new(Principal::new("bob")).with_attribute("tenant", "acme");
        let native: Check<String> =
            Check::native(|s: &RequestScope| format!("tenant = {}", s.attribute("tenant").unwrap_or("")));
        let Check::Native(inner) = &native else {
            panic!("expected native check");
        };
        assert_eq!(inner.predicate(&scope), "tenant = acme");

        let runtime: Check<String> = Check::runtime(|_: &Principal| CheckOutcome::Abstain);
        let Check::Runtime(inner) = &runtime else {
            panic!("expected runtime check");
        };
        assert_eq!(inner.evaluate(scope.principal()), CheckOutcome::Abstain);
    }

    #[test]
    fn named_runtime_check() {
        let check: Check<()> = Check::runtime(IsAdmin);
        assert_eq!(check.name(), "is-admin");
        assert_eq!(format!("{check:?}"), "Runtime(\"is-admin\")");
        let Check::Runtime(inner) = check else {
            panic!("expected runtime check");
        };
        assert_eq!(inner.evaluate(&Principal::new("admin")), CheckOutcome::Allow);
        assert_eq!(inner.evaluate(&Principal::new("bob")), CheckOutcome::Deny);
    }
}
