//! Integer interval environment domain.
//!
//! [`Itv`] is the classic interval lattice over `i64` with infinite
//! bounds; [`ItvDom`] lifts it to a non-relational environment mapping
//! regions to intervals. An absent region means top, so the environment
//! only stores what is actually known.

use crate::domain::{expect_dom, AbsDom, Dom};
use crate::ids::DomainKind;
use crate::region::RegionId;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bound {
    NegInf,
    Finite(i64),
    PosInf,
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NegInf => write!(f, "-oo"),
            Self::Finite(v) => write!(f, "{v}"),
            Self::PosInf => write!(f, "+oo"),
        }
    }
}

fn bound_neg(b: Bound) -> Bound {
    match b {
        Bound::NegInf => Bound::PosInf,
        Bound::Finite(v) => Bound::Finite(v.saturating_neg()),
        Bound::PosInf => Bound::NegInf,
    }
}

fn bound_add(a: Bound, b: Bound) -> Bound {
    match (a, b) {
        (Bound::Finite(x), Bound::Finite(y)) => Bound::Finite(x.saturating_add(y)),
        (Bound::NegInf, _) | (_, Bound::NegInf) => Bound::NegInf,
        _ => Bound::PosInf,
    }
}

fn bound_mul(a: Bound, b: Bound) -> Bound {
    let sign = |b: Bound| match b {
        Bound::NegInf => -1,
        Bound::Finite(v) => v.signum(),
        Bound::PosInf => 1,
    };
    match (a, b) {
        (Bound::Finite(x), Bound::Finite(y)) => Bound::Finite(x.saturating_mul(y)),
        (Bound::Finite(0), _) | (_, Bound::Finite(0)) => Bound::Finite(0),
        _ => {
            if sign(a) * sign(b) > 0 {
                Bound::PosInf
            } else {
                Bound::NegInf
            }
        }
    }
}

/// An integer interval. Empty (bottom) iff `lo > hi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Itv {
    pub lo: Bound,
    pub hi: Bound,
}

impl Itv {
    #[must_use]
    pub fn top() -> Self {
        Self {
            lo: Bound::NegInf,
            hi: Bound::PosInf,
        }
    }

    #[must_use]
    pub fn bottom() -> Self {
        Self {
            lo: Bound::PosInf,
            hi: Bound::NegInf,
        }
    }

    #[must_use]
    pub fn of(lo: i64, hi: i64) -> Self {
        Self {
            lo: Bound::Finite(lo),
            hi: Bound::Finite(hi),
        }
    }

    #[must_use]
    pub fn singleton(v: i64) -> Self {
        Self::of(v, v)
    }

    #[must_use]
    pub fn is_bottom(&self) -> bool {
        self.lo > self.hi
    }

    #[must_use]
    pub fn is_top(&self) -> bool {
        self.lo == Bound::NegInf && self.hi == Bound::PosInf
    }

    /// All empty intervals are the same interval.
    #[must_use]
    pub fn normalized(self) -> Self {
        if self.is_bottom() {
            Self::bottom()
        } else {
            self
        }
    }

    #[must_use]
    pub fn leq(&self, other: &Self) -> bool {
        self.is_bottom() || (!other.is_bottom() && other.lo <= self.lo && self.hi <= other.hi)
    }

    #[must_use]
    pub fn join(self, other: Self) -> Self {
        if self.is_bottom() {
            return other.normalized();
        }
        if other.is_bottom() {
            return self.normalized();
        }
        Self {
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
        }
    }

    #[must_use]
    pub fn meet(self, other: Self) -> Self {
        Self {
            lo: self.lo.max(other.lo),
            hi: self.hi.min(other.hi),
        }
        .normalized()
    }

    /// Standard interval widening: unstable bounds jump to infinity.
    #[must_use]
    pub fn widen(self, other: Self) -> Self {
        if self.is_bottom() {
            return other.normalized();
        }
        if other.is_bottom() {
            return self.normalized();
        }
        Self {
            lo: if other.lo < self.lo {
                Bound::NegInf
            } else {
                self.lo
            },
            hi: if other.hi > self.hi {
                Bound::PosInf
            } else {
                self.hi
            },
        }
    }

    /// Standard interval narrowing: only infinite bounds are refined.
    #[must_use]
    pub fn narrow(self, other: Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        Self {
            lo: if self.lo == Bound::NegInf {
                other.lo
            } else {
                self.lo
            },
            hi: if self.hi == Bound::PosInf {
                other.hi
            } else {
                self.hi
            },
        }
        .normalized()
    }

    #[must_use]
    pub fn add(self, other: Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        Self {
            lo: bound_add(self.lo, other.lo),
            hi: bound_add(self.hi, other.hi),
        }
    }

    #[must_use]
    pub fn neg(self) -> Self {
        if self.is_bottom() {
            return Self::bottom();
        }
        Self {
            lo: bound_neg(self.hi),
            hi: bound_neg(self.lo),
        }
    }

    #[must_use]
    pub fn sub(self, other: Self) -> Self {
        self.add(other.neg())
    }

    #[must_use]
    pub fn mul(self, other: Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        let corners = [
            bound_mul(self.lo, other.lo),
            bound_mul(self.lo, other.hi),
            bound_mul(self.hi, other.lo),
            bound_mul(self.hi, other.hi),
        ];
        Self {
            lo: corners.iter().copied().min().unwrap_or(Bound::NegInf),
            hi: corners.iter().copied().max().unwrap_or(Bound::PosInf),
        }
    }
}

impl fmt::Display for Itv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_bottom() {
            write!(f, "⊥")
        } else {
            write!(f, "[{}, {}]", self.lo, self.hi)
        }
    }
}

/// Non-relational interval environment over memory regions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItvDom {
    env: BTreeMap<RegionId, Itv>,
    bottom: bool,
}

impl ItvDom {
    /// The interval known for `region`; an untracked region is top.
    #[must_use]
    pub fn get(&self, region: RegionId) -> Itv {
        if self.bottom {
            return Itv::bottom();
        }
        self.env.get(&region).copied().unwrap_or_else(Itv::top)
    }

    /// Binds `region` to `itv`. Binding an empty interval makes the
    /// whole environment unreachable.
    pub fn set(&mut self, region: RegionId, itv: Itv) {
        if self.bottom {
            return;
        }
        if itv.is_bottom() {
            self.set_to_bottom();
        } else {
            self.env.insert(region, itv.normalized());
        }
    }

    pub fn forget(&mut self, region: RegionId) {
        self.env.remove(&region);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.env.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.env.is_empty()
    }
}

impl AbsDom for ItvDom {
    fn kind(&self) -> DomainKind {
        DomainKind::Interval
    }

    fn is_bottom(&self) -> bool {
        self.bottom || self.env.values().any(Itv::is_bottom)
    }

    fn is_top(&self) -> bool {
        !self.is_bottom() && self.env.values().all(Itv::is_top)
    }

    fn set_to_bottom(&mut self) {
        self.bottom = true;
        self.env.clear();
    }

    fn set_to_top(&mut self) {
        self.bottom = false;
        self.env.clear();
    }

    fn normalize(&mut self) {
        if self.is_bottom() {
            self.set_to_bottom();
        } else {
            self.env.retain(|_, itv| !itv.is_top());
        }
    }

    fn join_with(&mut self, other: &dyn AbsDom) {
        let other = expect_dom::<Self>(other);
        if other.is_bottom() {
            return;
        }
        if self.is_bottom() {
            *self = other.clone();
            return;
        }
        // An absent region is top, so only regions tracked on both sides
        // stay tracked.
        let mut joined = BTreeMap::new();
        for (region, itv) in &self.env {
            if let Some(o) = other.env.get(region) {
                let j = itv.join(*o);
                if !j.is_top() {
                    joined.insert(*region, j);
                }
            }
        }
        self.env = joined;
    }

    fn widen_with(&mut self, other: &dyn AbsDom) {
        let other = expect_dom::<Self>(other);
        if other.is_bottom() {
            return;
        }
        if self.is_bottom() {
            *self = other.clone();
            return;
        }
        let mut widened = BTreeMap::new();
        for (region, itv) in &self.env {
            if let Some(o) = other.env.get(region) {
                let w = itv.widen(*o);
                if !w.is_top() {
                    widened.insert(*region, w);
                }
            }
        }
        self.env = widened;
    }

    fn meet_with(&mut self, other: &dyn AbsDom) {
        let other = expect_dom::<Self>(other);
        if self.is_bottom() {
            return;
        }
        if other.is_bottom() {
            self.set_to_bottom();
            return;
        }
        for (region, itv) in &other.env {
            let met = self.get(*region).meet(*itv);
            if met.is_bottom() {
                self.set_to_bottom();
                return;
            }
            self.env.insert(*region, met);
        }
    }

    fn narrow_with(&mut self, other: &dyn AbsDom) {
        let other = expect_dom::<Self>(other);
        if self.is_bottom() {
            return;
        }
        if other.is_bottom() {
            self.set_to_bottom();
            return;
        }
        for (region, itv) in &other.env {
            let narrowed = self.get(*region).narrow(*itv);
            if narrowed.is_bottom() {
                self.set_to_bottom();
                return;
            }
            self.env.insert(*region, narrowed);
        }
    }

    fn leq(&self, other: &dyn AbsDom) -> bool {
        let other = expect_dom::<Self>(other);
        if self.is_bottom() {
            return true;
        }
        if other.is_bottom() {
            return false;
        }
        other
            .env
            .iter()
            .all(|(region, o)| self.get(*region).leq(o))
    }

    fn clone_val(&self) -> Box<dyn AbsDom> {
        Box::new(self.clone())
    }

    fn fold_hash(&self, state: &mut dyn Hasher) {
        // Hash the normal form so equal environments hash alike.
        if self.is_bottom() {
            state.write_u8(0);
            return;
        }
        state.write_u8(1);
        let mut h = FoldHasher(state);
        for (region, itv) in &self.env {
            if itv.is_top() {
                continue;
            }
            region.hash(&mut h);
            itv.hash(&mut h);
        }
    }

    fn dump(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_bottom() {
            return write!(f, "⊥");
        }
        if self.is_top() {
            return write!(f, "⊤");
        }
        write!(f, "{{")?;
        for (i, (region, itv)) in self.env.iter().filter(|(_, i)| !i.is_top()).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{region}: {itv}")?;
        }
        write!(f, "}}")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// `Hash::hash` wants a sized hasher; borrow the dynamic one.
struct FoldHasher<'a>(&'a mut dyn Hasher);

impl Hasher for FoldHasher<'_> {
    fn finish(&self) -> u64 {
        self.0.finish()
    }

    fn write(&mut self, bytes: &[u8]) {
        self.0.write(bytes);
    }
}

impl Dom for ItvDom {
    const KIND: DomainKind = DomainKind::Interval;

    fn default_val() -> Self {
        Self::default()
    }

    fn bottom_val() -> Self {
        let mut dom = Self::default();
        dom.set_to_bottom();
        dom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_lattice_laws() {
        let a = Itv::of(0, 10);
        let b = Itv::of(5, 20);
        assert!(a.leq(&a.join(b)));
        assert!(b.leq(&a.join(b)));
        assert!(a.meet(b).leq(&a));
        assert!(a.meet(b).leq(&b));
        assert_eq!(a.join(b), Itv::of(0, 20));
        assert_eq!(a.meet(b), Itv::of(5, 10));
        assert!(Itv::bottom().leq(&a));
        assert!(a.leq(&Itv::top()));
    }

    #[test]
    fn empty_intervals_are_all_bottom() {
        let e = Itv::of(3, 1);
        assert!(e.is_bottom());
        assert_eq!(e.normalized(), Itv::bottom());
        assert_eq!(e.join(Itv::of(0, 1)), Itv::of(0, 1));
    }

    #[test]
    fn widening_reaches_a_fixpoint() {
        let mut cur = Itv::singleton(0);
        let mut steps = 0;
        loop {
            let next = cur.widen(cur.add(Itv::singleton(1)));
            if next == cur {
                break;
            }
            cur = next;
            steps += 1;
            assert!(steps < 4);
        }
        assert_eq!(cur.hi, Bound::PosInf);
        // Narrowing recovers nothing here but must stay sound.
        assert!(cur.narrow(cur).leq(&cur));
    }

    #[test]
    fn arithmetic() {
        assert_eq!(Itv::of(1, 2).add(Itv::of(10, 20)), Itv::of(11, 22));
        assert_eq!(Itv::of(1, 2).sub(Itv::of(0, 1)), Itv::of(0, 2));
        assert_eq!(Itv::of(-2, 3).mul(Itv::singleton(-1)), Itv::of(-3, 2));
        assert_eq!(
            Itv::of(0, 1).mul(Itv::top()),
            Itv {
                lo: Bound::NegInf,
                hi: Bound::PosInf
            }
        );
    }

    fn region(ids: &mut crate::region::RegionManager, ast: &cn_ast::AstContext, d: cn_ast::DeclId) -> RegionId {
        ids.region_of_decl(ast.decl(d)).unwrap().id()
    }

    #[test]
    fn environment_join_drops_one_sided_regions() {
        let mut ast = cn_ast::AstContext::new();
        let x = ast.var("x", cn_ast::Ty::Int);
        let y = ast.var("y", cn_ast::Ty::Int);
        let mut regions = crate::region::RegionManager::new();
        let rx = region(&mut regions, &ast, x);
        let ry = region(&mut regions, &ast, y);

        let mut a = ItvDom::default();
        a.set(rx, Itv::of(0, 1));
        a.set(ry, Itv::of(0, 5));
        let mut b = ItvDom::default();
        b.set(rx, Itv::of(2, 3));

        a.join_with(&b);
        assert_eq!(a.get(rx), Itv::of(0, 3));
        assert!(a.get(ry).is_top());
    }

    #[test]
    fn environment_bottom_is_absorbing() {
        let mut ast = cn_ast::AstContext::new();
        let x = ast.var("x", cn_ast::Ty::Int);
        let mut regions = crate::region::RegionManager::new();
        let rx = region(&mut regions, &ast, x);

        let mut a = ItvDom::default();
        a.set(rx, Itv::bottom());
        assert!(a.is_bottom());

        let mut b = ItvDom::bottom_val();
        let mut top = ItvDom::default_val();
        assert!(b.leq(&top));
        assert!(!top.leq(&b));
        b.join_with(&top);
        assert!(b.is_top());
        top.meet_with(&ItvDom::bottom_val());
        assert!(top.is_bottom());
    }

    #[test]
    fn normalize_is_idempotent_and_preserves_equality() {
        let mut ast = cn_ast::AstContext::new();
        let x = ast.var("x", cn_ast::Ty::Int);
        let mut regions = crate::region::RegionManager::new();
        let rx = region(&mut regions, &ast, x);

        let mut a = ItvDom::default();
        a.env.insert(rx, Itv::top());
        let before = a.clone();
        a.normalize();
        assert!(a.equals(&before));
        assert!(a.is_empty());
        let once = a.clone();
        a.normalize();
        assert_eq!(a, once);
    }
}
