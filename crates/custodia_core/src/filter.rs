//! Policy pushdown.
//!
//! Translates a [`FilterPolicy`] into a single storage predicate when the
//! policy's truth value depends only on predicate-expressible checks.
//!
//! The result is an optimization, never an authorization decision: `None`
//! means "load unfiltered" and relies on the post-load enforcement layer to
//! decide per object.

use crate::policy::{Check, Combinator, FilterPolicy};
use custodia_engine::Predicate;
use tracing::debug;

/// Builds storage predicates from filter policies.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterPredicateBuilder;

impl FilterPredicateBuilder {
    /// Creates a builder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Builds the predicate for `policy`, or `None` if pushdown is unsound.
    ///
    /// Checks are processed in declared order:
    /// - a native check contributes its fragment, joined with `and` under
    ///   [`Combinator::All`] and with `or` under [`Combinator::Any`]
    /// - a runtime check whose outcome is neutral for the combinator is
    ///   skipped
    /// - any other runtime outcome decides the policy on its own; the
    ///   fragments gathered so far are discarded and `None` is returned
    ///   without evaluating later checks
    ///
    /// An empty policy, or one made only of neutral runtime checks, also
    /// yields `None`.
    pub fn build<P: Predicate>(&self, policy: &FilterPolicy<P>) -> Option<P> {
        let combinator = policy.combinator();
        let scope = policy.scope();
        let mut accumulated: Option<P> = None;

        for check in policy.checks() {
            match check {
                Check::Native(native) => {
                    let fragment = native.predicate(scope);
                    accumulated = Some(match accumulated {
                        None => fragment,
                        Some(acc) => match combinator {
                            Combinator::All => acc.and(fragment),
                            Combinator::Any => acc.or(fragment),
                        },
                    });
                }
                Check::Runtime(runtime) => {
                    let outcome = runtime.evaluate(scope.principal());
                    if combinator.is_neutral(outcome) {
                        continue;
                    }
                    debug!(
                        check = runtime.name(),
                        ?outcome,
                        ?combinator,
                        "runtime check is decisive, skipping pushdown"
                    );
                    return None;
                }
            }
        }
        accumulated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{CheckOutcome, Principal, RequestScope};
    use custodia_engine::Criterion;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn scope() -> RequestScope {
        RequestScope::new(Principal::new("alice")).with_attribute("tenant", "acme")
    }

    fn native(field: &'static str) -> Check<Criterion> {
        Check::native(move |_: &RequestScope| Criterion::eq(field, true))
    }

    fn runtime(outcome: CheckOutcome) -> Check<Criterion> {
        Check::runtime(move |_: &Principal| outcome)
    }

    fn build(policy: &FilterPolicy<Criterion>) -> Option<Criterion> {
        FilterPredicateBuilder::new().build(policy)
    }

    fn c(field: &str) -> Criterion {
        Criterion::eq(field, true)
    }

    #[test]
    fn empty_policy_has_no_predicate() {
        assert_eq!(build(&FilterPolicy::all(scope())), None);
        assert_eq!(build(&FilterPolicy::any(scope())), None);
    }

    #[test]
    fn all_with_single_runtime_check() {
        let allow = FilterPolicy::all(scope()).with_check(runtime(CheckOutcome::Allow));
        let deny = FilterPolicy::all(scope()).with_check(runtime(CheckOutcome::Deny));
        assert_eq!(build(&allow), None);
        assert_eq!(build(&deny), None);
    }

    #[test]
    fn any_with_single_runtime_check() {
        let allow = FilterPolicy::any(scope()).with_check(runtime(CheckOutcome::Allow));
        let deny = FilterPolicy::any(scope()).with_check(runtime(CheckOutcome::Deny));
        assert_eq!(build(&allow), None);
        assert_eq!(build(&deny), None);
    }

    #[test]
    fn single_native_check_is_verbatim() {
        let policy = FilterPolicy::all(scope()).with_check(native("c1"));
        assert_eq!(build(&policy), Some(c("c1")));
        let policy = FilterPolicy::any(scope()).with_check(native("c1"));
        assert_eq!(build(&policy), Some(c("c1")));
    }

    #[test]
    fn all_joins_with_and() {
        let policy = FilterPolicy::all(scope())
            .with_check(native("c1"))
            .with_check(native("c2"));
        assert_eq!(build(&policy), Some(c("c1").and(c("c2"))));
    }

    #[test]
    fn any_joins_with_or() {
        let policy = FilterPolicy::any(scope())
            .with_check(native("c1"))
            .with_check(native("c2"))
            .with_check(native("c3"));
        assert_eq!(build(&policy), Some(c("c1").or(c("c2")).or(c("c3"))));
    }

    #[test]
    fn neutral_runtime_checks_are_skipped() {
        let policy = FilterPolicy::all(scope())
            .with_check(runtime(CheckOutcome::Allow))
            .with_check(native("c1"))
            .with_check(runtime(CheckOutcome::Allow))
            .with_check(native("c2"));
        assert_eq!(build(&policy), Some(c("c1").and(c("c2"))));

        let policy = FilterPolicy::any(scope())
            .with_check(native("c1"))
            .with_check(runtime(CheckOutcome::Deny));
        assert_eq!(build(&policy), Some(c("c1")));
    }

    #[test]
    fn decisive_runtime_check_discards_accumulator() {
        let all = FilterPolicy::all(scope())
            .with_check(native("c1"))
            .with_check(runtime(CheckOutcome::Deny))
            .with_check(native("c2"));
        assert_eq!(build(&all), None);

        let any = FilterPolicy::any(scope())
            .with_check(native("c1"))
            .with_check(runtime(CheckOutcome::Allow));
        assert_eq!(build(&any), None);
    }

    #[test]
    fn abstaining_check_is_decisive_in_both_modes() {
        for policy in [
            FilterPolicy::all(scope()),
            FilterPolicy::any(scope()),
        ] {
            let policy = policy
                .with_check(native("c1"))
                .with_check(runtime(CheckOutcome::Abstain));
            assert_eq!(build(&policy), None);
        }
    }

    #[test]
    fn native_checks_see_request_scope() {
        let policy = FilterPolicy::all(scope()).with_check(Check::native(|s: &RequestScope| {
            Criterion::eq("tenant", s.attribute("tenant").unwrap_or_default())
        }));
        assert_eq!(build(&policy), Some(Criterion::eq("tenant", "acme")));
    }

    #[test]
    fn runtime_checks_run_in_order_and_stop_at_decisive() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recording = |label: &'static str, outcome: CheckOutcome| {
            let seen = Arc::clone(&seen);
            Check::<Criterion>::runtime(move |_: &Principal| {
                seen.lock().push(label);
                outcome
            })
        };

        let policy = FilterPolicy::all(scope())
            .with_check(recording("first", CheckOutcome::Allow))
            .with_check(native("c1"))
            .with_check(recording("second", CheckOutcome::Deny))
            .with_check(recording("third", CheckOutcome::Allow));

        assert_eq!(build(&policy), None);
        assert_eq!(*seen.lock(), vec!["first", "second"]);
    }

    #[test]
    fn runtime_checks_see_principal() {
        let policy = FilterPolicy::any(scope())
            .with_check(Check::runtime(|p: &Principal| {
                if p.credential::<&str>() == Some(&"alice") {
                    CheckOutcome::Deny
                } else {
                    CheckOutcome::Allow
                }
            }))
            .with_check(native("shared"));
        assert_eq!(build(&policy), Some(c("shared")));
    }
}
