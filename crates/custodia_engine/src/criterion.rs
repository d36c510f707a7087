//! Row filter predicates for the in-memory engine.

use crate::id::EntityId;
use crate::session::{Predicate, Row};
use std::cmp::Ordering;
use std::fmt;

/// Comparison operator of a [`Criterion::Compare`] leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn matches(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

/// A filter predicate over row fields.
///
/// Leaves compare one top-level field of a row against a constant.
/// A missing field behaves like a null: it satisfies only `IsNull`.
///
/// ```rust
/// use custodia_engine::{Criterion, Predicate};
///
/// let visible = Criterion::eq("owner", "alice").or(Criterion::eq("public", true));
/// assert_eq!(visible.to_string(), "(owner = \"alice\" OR public = true)");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// `field <op> value`
    Compare {
        /// Field name.
        field: String,
        /// Operator.
        op: CompareOp,
        /// Constant operand.
        value: Row,
    },
    /// `field IN (values)`
    In {
        /// Field name.
        field: String,
        /// Accepted values.
        values: Vec<Row>,
    },
    /// `field IS NULL`
    IsNull(String),
    /// Negation.
    Not(Box<Criterion>),
    /// Conjunction.
    And(Box<Criterion>, Box<Criterion>),
    /// Disjunction.
    Or(Box<Criterion>, Box<Criterion>),
}

impl Criterion {
    fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Row>) -> Self {
        Self::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// `field = value`
    pub fn eq(field: impl Into<String>, value: impl Into<Row>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    /// `field <> value`
    pub fn ne(field: impl Into<String>, value: impl Into<Row>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: impl Into<Row>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    /// `field <= value`
    pub fn le(field: impl Into<String>, value: impl Into<Row>) -> Self {
        Self::compare(field, CompareOp::Le, value)
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: impl Into<Row>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    /// `field >= value`
    pub fn ge(field: impl Into<String>, value: impl Into<Row>) -> Self {
        Self::compare(field, CompareOp::Ge, value)
    }

    /// `field IN (values)`
    pub fn is_in<V: Into<Row>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// `field IS NULL`
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::IsNull(field.into())
    }

    /// Negates a criterion.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Evaluates the criterion against a row.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Self::Compare { field, op, value } => field_of(row, field)
                .and_then(|actual| compare_values(actual, value))
                .is_some_and(|ordering| op.matches(ordering)),
            Self::In { field, values } => field_of(row, field).is_some_and(|actual| {
                values
                    .iter()
                    .any(|v| compare_values(actual, v) == Some(Ordering::Equal))
            }),
            Self::IsNull(field) => field_of(row, field).is_none(),
            Self::Not(inner) => !inner.matches(row),
            Self::And(left, right) => left.matches(row) && right.matches(row),
            Self::Or(left, right) => left.matches(row) || right.matches(row),
        }
    }
}

impl Predicate for Criterion {
    fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare { field, op, value } => {
                write!(f, "{field} {} ", op.as_str())?;
                write_value(f, value)
            }
            Self::In { field, values } => {
                write!(f, "{field} IN (")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_value(f, value)?;
                }
                f.write_str(")")
            }
            Self::IsNull(field) => write!(f, "{field} IS NULL"),
            Self::Not(inner) => write!(f, "NOT ({inner})"),
            Self::And(left, right) => write!(f, "({left} AND {right})"),
            Self::Or(left, right) => write!(f, "({left} OR {right})"),
        }
    }
}

impl From<EntityId> for Row {
    fn from(id: EntityId) -> Self {
        Row::Bytes(id.as_bytes().to_vec())
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &Row) -> fmt::Result {
    match value {
        Row::Text(s) => write!(f, "{s:?}"),
        Row::Bool(b) => write!(f, "{b}"),
        Row::Integer(i) => write!(f, "{}", i128::from(*i)),
        Row::Float(x) => write!(f, "{x}"),
        Row::Null => f.write_str("NULL"),
        other => write!(f, "{other:?}"),
    }
}

/// Looks up a top-level field; nulls read as absent.
fn field_of<'a>(row: &'a Row, field: &str) -> Option<&'a Row> {
    let entries = row.as_map()?;
    entries
        .iter()
        .find(|(key, _)| key.as_text() == Some(field))
        .map(|(_, value)| value)
        .filter(|value| !value.is_null())
}

/// Orders two scalar values; `None` when they are not comparable.
fn compare_values(left: &Row, right: &Row) -> Option<Ordering> {
    match (left, right) {
        (Row::Integer(a), Row::Integer(b)) => Some(i128::from(*a).cmp(&i128::from(*b))),
        (Row::Float(a), Row::Float(b)) => a.partial_cmp(b),
        (Row::Integer(a), Row::Float(b)) => (i128::from(*a) as f64).partial_cmp(b),
        (Row::Float(a), Row::Integer(b)) => a.partial_cmp(&(i128::from(*b) as f64)),
        (Row::Text(a), Row::Text(b)) => Some(a.cmp(b)),
        (Row::Bool(a), Row::Bool(b)) => Some(a.cmp(b)),
        (Row::Bytes(a), Row::Bytes(b)) => Some(a.cmp(b)),
        (a, b) if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(owner: &str, pages: i64, public: bool) -> Row {
        Row::Map(vec![
            (Row::Text("owner".into()), Row::Text(owner.into())),
            (Row::Text("pages".into()), Row::Integer(pages.into())),
            (Row::Text("public".into()), Row::Bool(public)),
            (Row::Text("isbn".into()), Row::Null),
        ])
    }

    #[test]
    fn equality_on_text() {
        let r = row("alice", 10, false);
        assert!(Criterion::eq("owner", "alice").matches(&r));
        assert!(!Criterion::eq("owner", "bob").matches(&r));
        assert!(Criterion::ne("owner", "bob").matches(&r));
    }

    #[test]
    fn ordering_on_integers_and_floats() {
        let r = row("alice", 10, false);
        assert!(Criterion::gt("pages", 5i64).matches(&r));
        assert!(Criterion::le("pages", 10i64).matches(&r));
        assert!(!Criterion::lt("pages", 9.5f64).matches(&r));
        assert!(Criterion::ge("pages", 9.5f64).matches(&r));
    }

    #[test]
    fn missing_and_null_fields_only_match_is_null() {
        let r = row("alice", 10, false);
        assert!(Criterion::is_null("isbn").matches(&r));
        assert!(Criterion::is_null("missing").matches(&r));
        assert!(!Criterion::eq("missing", "x").matches(&r));
        assert!(!Criterion::ne("missing", "x").matches(&r));
    }

    #[test]
    fn in_list() {
        let r = row("carol", 1, true);
        assert!(Criterion::is_in("owner", ["alice", "carol"]).matches(&r));
        assert!(!Criterion::is_in("owner", ["alice", "bob"]).matches(&r));
    }

    #[test]
    fn combinators_compose() {
        let r = row("bob", 3, true);
        let private_to_alice = Criterion::eq("owner", "alice");
        let public = Criterion::eq("public", true);
        assert!(private_to_alice.clone().or(public.clone()).matches(&r));
        assert!(!private_to_alice.and(public).matches(&r));
    }

    #[test]
    fn display_renders_tree() {
        let c = Criterion::eq("owner", "alice")
            .and(Criterion::gt("pages", 3i64))
            .or(Criterion::is_null("isbn").negate());
        assert_eq!(
            c.to_string(),
            "((owner = \"alice\" AND pages > 3) OR NOT (isbn IS NULL))"
        );
    }

    #[test]
    fn entity_id_compares_as_bytes() {
        let id = EntityId::new();
        let r = Row::Map(vec![(
            Row::Text("id".into()),
            Row::serialized(&id).unwrap(),
        )]);
        assert!(Criterion::eq("id", id).matches(&r));
    }

    proptest! {
        #[test]
        fn negation_complements(pages in -1000i64..1000, bound in -1000i64..1000) {
            let r = row("alice", pages, false);
            let c = Criterion::lt("pages", bound);
            prop_assert_eq!(c.clone().negate().matches(&r), !c.matches(&r));
            prop_assert_eq!(Criterion::ge("pages", bound).matches(&r), !c.matches(&r));
        }
    }
}
