//! Filter policies.
//!
//! A [`FilterPolicy`] is the read-side view of an authorization rule: an
//! ordered list of [`Check`]s joined by a [`Combinator`], plus the
//! [`RequestScope`] they are evaluated in.

mod check;
mod principal;

pub use check::{Check, CheckOutcome, NativeFilterCheck, RuntimeCheck};
pub use principal::{Principal, RequestScope};

/// How the checks of a policy are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Every check must hold.
    All,
    /// At least one check must hold.
    Any,
}

impl Combinator {
    /// Returns true if a runtime outcome leaves the combined result
    /// unchanged: `Allow` under `All`, `Deny` under `Any`.
    #[must_use]
    pub fn is_neutral(self, outcome: CheckOutcome) -> bool {
        matches!(
            (self, outcome),
            (Self::All, CheckOutcome::Allow) | (Self::Any, CheckOutcome::Deny)
        )
    }
}

/// Ordered checks, their combinator, and the request they apply to.
#[derive(Debug, Clone)]
pub struct FilterPolicy<P> {
    checks: Vec<Check<P>>,
    combinator: Combinator,
    scope: RequestScope,
}

impl<P> FilterPolicy<P> {
    /// Creates an empty policy.
    #[must_use]
    pub fn new(combinator: Combinator, scope: RequestScope) -> Self {
        Self {
            checks: Vec::new(),
            combinator,
            scope,
        }
    }

    /// Creates an empty conjunctive policy.
    #[must_use]
    pub fn all(scope: RequestScope) -> Self {
        Self::new(Combinator::All, scope)
    }

    /// Creates an empty disjunctive policy.
    #[must_use]
    pub fn any(scope: RequestScope) -> Self {
        Self::new(Combinator::Any, scope)
    }

    /// Appends a check.
    #[must_use]
    pub fn with_check(mut self, check: Check<P>) -> Self {
        self.checks.push(check);
        self
    }

    /// Checks in declared order.
    #[must_use]
    pub fn checks(&self) -> &[Check<P>] {
        &self.checks
    }

    /// The combinator.
    #[must_use]
    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    /// The request scope.
    #[must_use]
    pub fn scope(&self) -> &RequestScope {
        &self.scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_outcomes() {
        assert!(Combinator::All.is_neutral(CheckOutcome::Allow));
        assert!(!Combinator::All.is_neutral(CheckOutcome::Deny));
        assert!(Combinator::Any.is_neutral(CheckOutcome::Deny));
        assert!(!Combinator::Any.is_neutral(CheckOutcome::Allow));
        assert!(!Combinator::All.is_neutral(CheckOutcome::Abstain));
        assert!(!Combinator::Any.is_neutral(CheckOutcome::Abstain));
    }

    #[test]
    fn checks_keep_declared_order() {
        let policy: FilterPolicy<u32> = FilterPolicy::any(RequestScope::new(Principal::new(())))
            .with_check(Check::native(|_: &RequestScope| 1u32))
            .with_check(Check::runtime(|_: &Principal| CheckOutcome::Deny));

        assert_eq!(policy.combinator(), Combinator::Any);
        assert!(matches!(policy.checks()[0], Check::Native(_)));
        assert!(matches!(policy.checks()[1], Check::Runtime(_)));
    }
}
