//! Base interface for all abstract domains.

use crate::ids::DomainKind;
use std::any::Any;
use std::fmt;
use std::hash::Hasher;
use std::rc::Rc;

pub mod interval;

/// A shared, read-only abstract value. Mutation paths clone first.
pub type SharedVal = Rc<dyn AbsDom>;

/// Constructor of a fresh abstract value, memoised per domain kind by the
/// analysis manager.
pub type DomainValFn = fn() -> Box<dyn AbsDom>;

/// The lattice contract every pluggable domain satisfies.
///
/// The in-place combinators assume the caller owns `self` exclusively;
/// values reachable from a program state are never combined in place,
/// they are cloned first. Combining values of different kinds is a
/// plug-in bug and asserts.
///
/// Expected of the combinators, though not enforced here: `join_with` is
/// commutative and monotone w.r.t. `leq`, `widen_with` over-approximates
/// `join_with`, and `fold_hash` agrees with `equals`.
pub trait AbsDom: fmt::Debug {
    /// The kind of the domain.
    fn kind(&self) -> DomainKind;

    /// Check if the abstract value is bottom.
    fn is_bottom(&self) -> bool;

    /// Check if the abstract value is top.
    fn is_top(&self) -> bool;

    /// Set the abstract value to bottom.
    fn set_to_bottom(&mut self);

    /// Set the abstract value to top.
    fn set_to_top(&mut self);

    /// Canonicalise the abstract value. Idempotent; preserves `equals`.
    ///
    /// Default impl is do nothing.
    fn normalize(&mut self) {}

    /// Join with another abstract value.
    fn join_with(&mut self, other: &dyn AbsDom);

    /// Join at a loop head. Default impl is `join_with`.
    fn join_with_at_loop_head(&mut self, other: &dyn AbsDom) {
        self.join_with(other);
    }

    /// Join between consecutive fixpoint iterations. Default impl is
    /// `join_with`.
    fn join_consecutive_iter_with(&mut self, other: &dyn AbsDom) {
        self.join_with(other);
    }

    /// Widen with another abstract value. Default impl is `join_with`.
    fn widen_with(&mut self, other: &dyn AbsDom) {
        self.join_with(other);
    }

    /// Meet with another abstract value. Default impl is do nothing.
    fn meet_with(&mut self, _other: &dyn AbsDom) {}

    /// Narrow with another abstract value. Default impl is `meet_with`.
    fn narrow_with(&mut self, other: &dyn AbsDom) {
        self.meet_with(other);
    }

    /// Check the inclusion relation.
    fn leq(&self, other: &dyn AbsDom) -> bool;

    /// Equality comparison. Default impl is mutual inclusion.
    fn equals(&self, other: &dyn AbsDom) -> bool
    where
        Self: Sized,
    {
        self.leq(other) && other.leq(self)
    }

    /// Clone into a fresh, independently mutable value.
    fn clone_val(&self) -> Box<dyn AbsDom>;

    /// Feed the value into a state fold hash. Must agree with `equals`;
    /// implementations hash their normal form.
    fn fold_hash(&self, state: &mut dyn Hasher);

    /// Dump the abstract value for debugging.
    fn dump(&self, f: &mut fmt::Formatter) -> fmt::Result;

    /// Downcast support for typed accessors.
    fn as_any(&self) -> &dyn Any;
}

/// Compile-time metadata of a concrete domain: its kind and the two
/// constructors the state manager seeds initial states from.
pub trait Dom: AbsDom + Sized + 'static {
    const KIND: DomainKind;

    /// The top-like initial element.
    fn default_val() -> Self;

    /// The least element.
    fn bottom_val() -> Self;
}

pub(crate) fn make_default<D: Dom>() -> Box<dyn AbsDom> {
    Box::new(D::default_val())
}

pub(crate) fn make_bottom<D: Dom>() -> Box<dyn AbsDom> {
    Box::new(D::bottom_val())
}

/// Downcasts a borrowed abstract value to its concrete domain type.
///
/// # Panics
///
/// Panics when the value is of a different domain; callers only reach
/// this through accessors keyed by the domain's own id.
#[must_use]
pub fn expect_dom<D: Dom>(val: &dyn AbsDom) -> &D {
    val.as_any()
        .downcast_ref::<D>()
        .expect("abstract value is not of the expected domain")
}

/// Adapter rendering an abstract value through its `dump` method.
pub struct Dump<'a>(pub &'a dyn AbsDom);

impl fmt::Display for Dump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.dump(f)
    }
}
