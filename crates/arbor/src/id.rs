//! Value identity.
//!
//! An identity answers one question: *are these two reactive values the same
//! value?* Signals hand out identities instead of comparing payloads so that
//! the runtime can decide when cached results must be invalidated without
//! cloning or even inspecting the values themselves.

use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// Dynamic identity payload.
///
/// Implementations must provide a total order *within* one dynamic type;
/// ordering across types is resolved by [`ValueId`] using the type ids, so
/// the combined order is total as well.
pub trait DynId: fmt::Debug + 'static {
    fn as_any(&self) -> &dyn Any;

    /// Equality against an id of any dynamic type.
    ///
    /// Ids of different dynamic types are never equal.
    fn dyn_eq(&self, other: &dyn DynId) -> bool;

    /// Total order against an id of any dynamic type.
    fn dyn_cmp(&self, other: &dyn DynId) -> Ordering;

    fn clone_boxed(&self) -> Box<dyn DynId>;

    /// Type-matched in-place refresh: overwrite `dest` with a copy of `self`
    /// if `dest` already holds this dynamic type.
    ///
    /// Returns false (and leaves `dest` untouched) on a type mismatch.
    fn copy_into(&self, dest: &mut dyn Any) -> bool;
}

/// Bound for payloads usable as a by-value identity.
pub trait IdValue: Clone + PartialEq + PartialOrd + fmt::Debug + 'static {}

impl<T: Clone + PartialEq + PartialOrd + fmt::Debug + 'static> IdValue for T {}

/// By-value identity: copies a comparable value and compares payloads.
#[derive(Clone, Debug)]
pub struct SimpleId<T>(pub T);

impl<T: IdValue> DynId for SimpleId<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn DynId) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| self.0 == other.0)
    }

    fn dyn_cmp(&self, other: &dyn DynId) -> Ordering {
        match other.as_any().downcast_ref::<Self>() {
            // Incomparable payloads (NaN and friends) collapse to Equal so
            // the order stays total.
            Some(other) => self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal),
            None => TypeId::of::<Self>().cmp(&other.as_any().type_id()),
        }
    }

    fn clone_boxed(&self) -> Box<dyn DynId> {
        Box::new(self.clone())
    }

    fn copy_into(&self, dest: &mut dyn Any) -> bool {
        if let Some(dest) = dest.downcast_mut::<Self>() {
            dest.0.clone_from(&self.0);
            true
        } else {
            false
        }
    }
}

/// A value identity handle.
///
/// Cheap to clone and pass around (the dynamic payload is behind an `Rc`).
/// `ValueId`s form a total order: the sentinels rank first, then dynamic ids
/// ordered by type, then by payload. For any two ids of the same kind,
/// `a == b ⇔ !(a < b) && !(b < a)`.
#[derive(Clone, Default)]
pub enum ValueId {
    /// No id: the signal does not know its value (yet).
    #[default]
    Null,
    /// The identity of the single shared unit value.
    Unit,
    /// A dynamic identity payload.
    Dyn(Rc<dyn DynId>),
}

// Ids flow through every combinator; keep the handle small.
static_assertions::const_assert!(size_of::<ValueId>() <= 4 * size_of::<usize>());

impl ValueId {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Debug for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null_id"),
            Self::Unit => f.write_str("unit_id"),
            Self::Dyn(id) => id.fmt(f),
        }
    }
}

impl PartialEq for ValueId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) | (Self::Unit, Self::Unit) => true,
            (Self::Dyn(a), Self::Dyn(b)) => a.dyn_eq(&**b),
            _ => false,
        }
    }
}

impl Eq for ValueId {}

impl PartialOrd for ValueId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ValueId {
    fn cmp(&self, other: &Self) -> Ordering {
        fn rank(id: &ValueId) -> u8 {
            match id {
                ValueId::Null => 0,
                ValueId::Unit => 1,
                ValueId::Dyn(_) => 2,
            }
        }
        match (self, other) {
            (Self::Dyn(a), Self::Dyn(b)) => {
                let (ta, tb) = (a.as_any().type_id(), b.as_any().type_id());
                ta.cmp(&tb).then_with(|| a.dyn_cmp(&**b))
            }
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

/// The id for signals that don't know their value.
#[inline]
pub fn null_id() -> ValueId {
    ValueId::Null
}

/// The id of the single shared unit value.
#[inline]
pub fn unit_id() -> ValueId {
    ValueId::Unit
}

/// A by-value identity over `v`.
pub fn simple_id<T: IdValue>(v: T) -> ValueId {
    ValueId::Dyn(Rc::new(SimpleId(v)))
}

/// Lexicographic combination of two ids.
///
/// An unknown component makes the whole combination unknown: if either side
/// is null, the pair is null, so downstream caches never mistake two
/// not-yet-known values for the same value.
pub fn pair_id(a: ValueId, b: ValueId) -> ValueId {
    if a.is_null() || b.is_null() {
        return ValueId::Null;
    }
    simple_id((a, b))
}

/// An owning captured identity, for storage that outlives a traversal
/// (named-block keys, memoization keys).
///
/// Dynamic id payloads are immutable behind `Rc`, so capturing is a pointer
/// copy; no allocation happens on refresh.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct CapturedId {
    id: ValueId,
}

impl CapturedId {
    pub fn capture(&mut self, id: &ValueId) {
        self.id = id.clone();
    }

    pub fn clear(&mut self) {
        self.id = ValueId::Null;
    }

    /// Whether a (non-null) id has been captured.
    #[inline]
    pub fn is_captured(&self) -> bool {
        !self.id.is_null()
    }

    #[inline]
    pub fn get(&self) -> &ValueId {
        &self.id
    }

    #[inline]
    pub fn matches(&self, id: &ValueId) -> bool {
        self.id == *id
    }
}

impl From<&ValueId> for CapturedId {
    fn from(id: &ValueId) -> Self {
        Self { id: id.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels() {
        assert_eq!(null_id(), null_id());
        assert_eq!(unit_id(), unit_id());
        assert_ne!(null_id(), unit_id());
        assert!(null_id() < unit_id());
        assert!(unit_id() < simple_id(0));
    }

    #[test]
    fn same_type_compares_payloads() {
        assert_eq!(simple_id(17), simple_id(17));
        assert_ne!(simple_id(17), simple_id(18));
        assert!(simple_id(17) < simple_id(18));
    }

    #[test]
    fn cross_type_order_is_total() {
        let a = simple_id(1_i32);
        let b = simple_id("one");
        assert_ne!(a, b);
        // Consistency: exactly one strict order between distinct ids, and
        // equality agrees with the order.
        assert!((a < b) ^ (b < a));
        for (x, y) in [(&a, &b), (&a, &a), (&b, &b)] {
            assert_eq!(x == y, !(x < y) && !(y < x));
        }
    }

    #[test]
    fn pair_ids_order_lexicographically() {
        let ab = pair_id(simple_id(1), simple_id(2));
        let ab2 = pair_id(simple_id(1), simple_id(2));
        let ac = pair_id(simple_id(1), simple_id(3));
        let bb = pair_id(simple_id(2), simple_id(2));
        assert_eq!(ab, ab2);
        assert!(ab < ac);
        assert!(ac < bb);
    }

    #[test]
    fn capture_and_match() {
        let mut captured = CapturedId::default();
        assert!(!captured.is_captured());

        let id = simple_id(42);
        captured.capture(&id);
        assert!(captured.is_captured());
        assert!(captured.matches(&simple_id(42)));
        assert!(!captured.matches(&simple_id(43)));

        captured.clear();
        assert!(!captured.is_captured());
    }

    #[test]
    fn copy_into_refreshes_same_type_only() {
        let src = SimpleId(5_i32);
        let mut same = SimpleId(9_i32);
        let mut different = SimpleId("x");

        assert!(src.copy_into(&mut same));
        assert_eq!(same.0, 5);
        assert!(!src.copy_into(&mut different));
        assert_eq!(different.0, "x");
    }
}
