//! The program state and its hash-consing manager.
//!
//! A [`ProgramState`] is an immutable snapshot of every tracked domain
//! value at one program point, plus two auxiliary maps binding regions
//! and statements to symbolic expressions. States are only ever handed
//! out as interned [`StateRef`] handles: two handles are pointer-equal
//! exactly when their contents are equal, so state comparison during
//! fixpoint iteration is a pointer check.
//!
//! The manager keeps one pool of interned states. When the last handle
//! of a state drops, its slot is recycled through a free list; the pool
//! itself releases storage at teardown.

use crate::analysis_manager::AnalysisManager;
use crate::domain::{AbsDom, Dom, DomainValFn, Dump, SharedVal};
use crate::ids::{domain_id, domain_name, DomainId};
use crate::region::RegionId;
use crate::symbol::SExprRef;
use cn_ast::StmtId;
use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::Rc;

pub type DomValMap = BTreeMap<DomainId, SharedVal>;
pub type RegionSExprMap = BTreeMap<RegionId, SExprRef>;
pub type StmtSExprMap = BTreeMap<StmtId, SExprRef>;

/// Immutable per-program-point snapshot of all domain values.
///
/// Callers never mutate a state; every "mutation" builds a fresh state
/// and interns it, so the result may alias an existing one.
#[derive(Debug)]
pub struct ProgramState {
    dom_vals: DomValMap,
    region_sexprs: RegionSExprMap,
    stmt_sexprs: StmtSExprMap,
}

impl ProgramState {
    #[must_use]
    pub fn new(dom_vals: DomValMap) -> Self {
        Self {
            dom_vals,
            region_sexprs: RegionSExprMap::new(),
            stmt_sexprs: StmtSExprMap::new(),
        }
    }

    #[must_use]
    pub fn dom_vals(&self) -> &DomValMap {
        &self.dom_vals
    }

    #[must_use]
    pub fn value_of(&self, id: DomainId) -> Option<&SharedVal> {
        self.dom_vals.get(&id)
    }

    /// A state is bottom as soon as one tracked domain is bottom.
    #[must_use]
    pub fn is_bottom(&self) -> bool {
        self.dom_vals.values().any(|v| v.is_bottom())
    }

    /// A state is top when every tracked domain is top; with no tracked
    /// domain at all this is vacuously true.
    #[must_use]
    pub fn is_top(&self) -> bool {
        self.dom_vals.values().all(|v| v.is_top())
    }

    /// Pointwise inclusion. A domain missing on one side counts as
    /// bottom there and as top on the other.
    #[must_use]
    pub fn leq(&self, other: &ProgramState) -> bool {
        for (id, val) in &self.dom_vals {
            match other.dom_vals.get(id) {
                Some(o) => {
                    if !val.leq(o.as_ref()) {
                        return false;
                    }
                }
                None => {
                    if !val.is_bottom() {
                        return false;
                    }
                }
            }
        }
        other
            .dom_vals
            .iter()
            .all(|(id, val)| self.dom_vals.contains_key(id) || val.is_top())
    }

    /// Structural equality over all three maps. Interning guarantees
    /// this agrees with handle pointer equality.
    #[must_use]
    pub fn equals(&self, other: &ProgramState) -> bool {
        if self.dom_vals.len() != other.dom_vals.len() {
            return false;
        }
        let vals_eq = self
            .dom_vals
            .iter()
            .zip(other.dom_vals.iter())
            .all(|((id, val), (oid, oval))| {
                id == oid && val.leq(oval.as_ref()) && oval.leq(val.as_ref())
            });
        vals_eq
            && self.region_sexprs == other.region_sexprs
            && self.stmt_sexprs == other.stmt_sexprs
    }

    /// Fold hash over all three maps; feeds the intern table.
    fn fold_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for (id, val) in &self.dom_vals {
            id.hash(&mut hasher);
            val.fold_hash(&mut hasher);
        }
        self.region_sexprs.hash(&mut hasher);
        self.stmt_sexprs.hash(&mut hasher);
        hasher.finish()
    }
}

impl fmt::Display for ProgramState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (id, val)) in self.dom_vals.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", domain_name(*id), Dump(val.as_ref()))?;
        }
        write!(f, "}}")?;
        if !self.region_sexprs.is_empty() {
            write!(f, " regions{{")?;
            for (i, (region, sexpr)) in self.region_sexprs.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{region}: {sexpr}")?;
            }
            write!(f, "}}")?;
        }
        if !self.stmt_sexprs.is_empty() {
            write!(f, " stmts{{")?;
            for (i, (stmt, sexpr)) in self.stmt_sexprs.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{stmt}: {sexpr}")?;
            }
            write!(f, "}}")?;
        }
        Ok(())
    }
}

struct Slot {
    hash: u64,
    state: Rc<ProgramState>,
}

/// Intern table and slot storage shared by the manager and every handle.
#[derive(Default)]
pub(crate) struct StatePool {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    index: HashMap<u64, Vec<usize>>,
}

impl StatePool {
    fn release(&mut self, slot: usize) {
        let entry = self.slots[slot]
            .take()
            .expect("released state slot is occupied");
        let chain = self
            .index
            .get_mut(&entry.hash)
            .expect("released state is indexed");
        chain.retain(|&i| i != slot);
        if chain.is_empty() {
            self.index.remove(&entry.hash);
        }
        self.free.push(slot);
    }

    fn live_states(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

fn intern_in(pool: &Rc<RefCell<StatePool>>, state: ProgramState) -> StateRef {
    let hash = state.fold_hash();
    let found = {
        let p = pool.borrow();
        p.index.get(&hash).and_then(|chain| {
            chain
                .iter()
                .copied()
                .find(|&i| {
                    p.slots[i]
                        .as_ref()
                        .is_some_and(|slot| slot.state.equals(&state))
                })
                .map(|i| (i, Rc::clone(&p.slots[i].as_ref().expect("indexed slot").state)))
        })
    };
    if let Some((slot, existing)) = found {
        return StateRef {
            pool: Rc::clone(pool),
            slot,
            state: existing,
        };
    }

    let rc = Rc::new(state);
    let mut p = pool.borrow_mut();
    let slot = match p.free.pop() {
        Some(slot) => {
            p.slots[slot] = Some(Slot {
                hash,
                state: Rc::clone(&rc),
            });
            slot
        }
        None => {
            p.slots.push(Some(Slot {
                hash,
                state: Rc::clone(&rc),
            }));
            p.slots.len() - 1
        }
    };
    p.index.entry(hash).or_default().push(slot);
    drop(p);
    StateRef {
        pool: Rc::clone(pool),
        slot,
        state: rc,
    }
}

/// A counted handle of an interned [`ProgramState`].
///
/// Handles are the only way states circulate: cloning acquires, dropping
/// releases, and releasing the last handle recycles the slot. Handle
/// equality is pointer equality, which interning makes equivalent to
/// content equality.
pub struct StateRef {
    pool: Rc<RefCell<StatePool>>,
    slot: usize,
    state: Rc<ProgramState>,
}

impl Deref for StateRef {
    type Target = ProgramState;

    fn deref(&self) -> &ProgramState {
        &self.state
    }
}

impl Clone for StateRef {
    fn clone(&self) -> Self {
        Self {
            pool: Rc::clone(&self.pool),
            slot: self.slot,
            state: Rc::clone(&self.state),
        }
    }
}

impl Drop for StateRef {
    fn drop(&mut self) {
        // Pool slot + this handle: count 2 means the last outside handle
        // is going away, so the slot can be recycled.
        if Rc::strong_count(&self.state) == 2 {
            self.pool.borrow_mut().release(self.slot);
        }
    }
}

impl PartialEq for StateRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl Eq for StateRef {}

impl fmt::Debug for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "StateRef#{} ", self.slot)?;
        fmt::Debug::fmt(&self.state, f)
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.state, f)
    }
}

fn clone_combined(
    lhs: &SharedVal,
    rhs: &SharedVal,
    op: impl Fn(&mut dyn AbsDom, &dyn AbsDom),
) -> SharedVal {
    let mut val = lhs.clone_val();
    op(val.as_mut(), rhs.as_ref());
    Rc::from(val)
}

/// Key-set union; both-sided keys are combined, one-sided keys are
/// shared as-is.
fn union_vals(
    a: &DomValMap,
    b: &DomValMap,
    op: impl Fn(&mut dyn AbsDom, &dyn AbsDom) + Copy,
) -> DomValMap {
    let mut out = a.clone();
    for (id, bval) in b {
        match out.entry(*id) {
            std::collections::btree_map::Entry::Occupied(mut entry) => {
                let combined = clone_combined(entry.get(), bval, op);
                *entry.get_mut() = combined;
            }
            std::collections::btree_map::Entry::Vacant(entry) => {
                entry.insert(Rc::clone(bval));
            }
        }
    }
    out
}

/// Key-set intersection; one-sided keys are dropped.
fn intersect_vals(
    a: &DomValMap,
    b: &DomValMap,
    op: impl Fn(&mut dyn AbsDom, &dyn AbsDom) + Copy,
) -> DomValMap {
    a.iter()
        .filter_map(|(id, aval)| {
            b.get(id)
                .map(|bval| (*id, clone_combined(aval, bval, op)))
        })
        .collect()
}

/// Region bindings name the current value of a region, so a merged
/// state only keeps the bindings both operands agree on.
fn merge_region_sexprs(a: &RegionSExprMap, b: &RegionSExprMap) -> RegionSExprMap {
    a.iter()
        .filter(|(region, aval)| b.get(*region) == Some(*aval))
        .map(|(region, aval)| (*region, Rc::clone(aval)))
        .collect()
}

/// Statement bindings record what a statement evaluated to on some
/// path; one-sided bindings are kept, conflicting ones are dropped.
fn merge_stmt_sexprs(a: &StmtSExprMap, b: &StmtSExprMap) -> StmtSExprMap {
    let mut out = a.clone();
    for (stmt, bval) in b {
        match out.entry(*stmt) {
            std::collections::btree_map::Entry::Occupied(entry) => {
                if entry.get() != bval {
                    entry.remove();
                }
            }
            std::collections::btree_map::Entry::Vacant(entry) => {
                entry.insert(Rc::clone(bval));
            }
        }
    }
    out
}

impl StateRef {
    fn intern_sibling(&self, state: ProgramState) -> StateRef {
        intern_in(&self.pool, state)
    }

    fn with_dom_vals(&self, dom_vals: DomValMap) -> StateRef {
        self.intern_sibling(ProgramState {
            dom_vals,
            region_sexprs: self.region_sexprs.clone(),
            stmt_sexprs: self.stmt_sexprs.clone(),
        })
    }

    fn combine(&self, other: &StateRef, vals: DomValMap) -> StateRef {
        self.intern_sibling(ProgramState {
            dom_vals: vals,
            region_sexprs: merge_region_sexprs(&self.region_sexprs, &other.region_sexprs),
            stmt_sexprs: merge_stmt_sexprs(&self.stmt_sexprs, &other.stmt_sexprs),
        })
    }

    #[must_use]
    pub fn exists<D: Dom>(&self) -> bool {
        self.dom_vals.contains_key(&domain_id(D::KIND))
    }

    /// The tracked value of domain `D`, if present.
    #[must_use]
    pub fn get_dom<D: Dom>(&self) -> Option<&D> {
        self.dom_vals
            .get(&domain_id(D::KIND))
            .map(|val| crate::domain::expect_dom::<D>(val.as_ref()))
    }

    /// Binds domain `D` to `val` in a new interned state.
    #[must_use]
    pub fn set_dom<D: Dom>(&self, val: D) -> StateRef {
        let mut vals = self.dom_vals.clone();
        vals.insert(domain_id(D::KIND), Rc::new(val) as SharedVal);
        self.with_dom_vals(vals)
    }

    /// Removes domain `D` in a new interned state.
    #[must_use]
    pub fn remove_dom<D: Dom>(&self) -> StateRef {
        let mut vals = self.dom_vals.clone();
        vals.remove(&domain_id(D::KIND));
        self.with_dom_vals(vals)
    }

    #[must_use]
    pub fn join(&self, other: &StateRef) -> StateRef {
        self.combine(other, union_vals(&self.dom_vals, &other.dom_vals, |a, b| a.join_with(b)))
    }

    #[must_use]
    pub fn join_at_loop_head(&self, other: &StateRef) -> StateRef {
        self.combine(
            other,
            union_vals(&self.dom_vals, &other.dom_vals, |a, b| {
                a.join_with_at_loop_head(b)
            }),
        )
    }

    #[must_use]
    pub fn join_consecutive_iter(&self, other: &StateRef) -> StateRef {
        self.combine(
            other,
            union_vals(&self.dom_vals, &other.dom_vals, |a, b| {
                a.join_consecutive_iter_with(b)
            }),
        )
    }

    #[must_use]
    pub fn widen(&self, other: &StateRef) -> StateRef {
        self.combine(other, union_vals(&self.dom_vals, &other.dom_vals, |a, b| a.widen_with(b)))
    }

    #[must_use]
    pub fn meet(&self, other: &StateRef) -> StateRef {
        self.combine(
            other,
            intersect_vals(&self.dom_vals, &other.dom_vals, |a, b| a.meet_with(b)),
        )
    }

    #[must_use]
    pub fn narrow(&self, other: &StateRef) -> StateRef {
        self.combine(
            other,
            intersect_vals(&self.dom_vals, &other.dom_vals, |a, b| a.narrow_with(b)),
        )
    }

    /// Canonicalises every tracked value.
    #[must_use]
    pub fn normalize(&self) -> StateRef {
        let vals = self
            .dom_vals
            .iter()
            .map(|(id, val)| {
                let mut fresh = val.clone_val();
                fresh.normalize();
                (*id, Rc::from(fresh) as SharedVal)
            })
            .collect();
        self.with_dom_vals(vals)
    }

    #[must_use]
    pub fn set_to_bottom(&self) -> StateRef {
        let vals = self
            .dom_vals
            .iter()
            .map(|(id, val)| {
                let mut fresh = val.clone_val();
                fresh.set_to_bottom();
                (*id, Rc::from(fresh) as SharedVal)
            })
            .collect();
        self.with_dom_vals(vals)
    }

    #[must_use]
    pub fn set_to_top(&self) -> StateRef {
        let vals = self
            .dom_vals
            .iter()
            .map(|(id, val)| {
                let mut fresh = val.clone_val();
                fresh.set_to_top();
                (*id, Rc::from(fresh) as SharedVal)
            })
            .collect();
        self.with_dom_vals(vals)
    }

    /// Pointer comparison; content agreement is the interning invariant.
    #[must_use]
    pub fn equals(&self, other: &StateRef) -> bool {
        let same = Rc::ptr_eq(&self.state, &other.state);
        debug_assert_eq!(same, self.state.equals(&other.state));
        same
    }

    #[must_use]
    pub fn set_region_sexpr(&self, region: RegionId, sexpr: SExprRef) -> StateRef {
        let mut map = self.region_sexprs.clone();
        map.insert(region, sexpr);
        self.intern_sibling(ProgramState {
            dom_vals: self.dom_vals.clone(),
            region_sexprs: map,
            stmt_sexprs: self.stmt_sexprs.clone(),
        })
    }

    #[must_use]
    pub fn get_region_sexpr(&self, region: RegionId) -> Option<&SExprRef> {
        self.region_sexprs.get(&region)
    }

    #[must_use]
    pub fn set_stmt_sexpr(&self, stmt: StmtId, sexpr: SExprRef) -> StateRef {
        let mut map = self.stmt_sexprs.clone();
        map.insert(stmt, sexpr);
        self.intern_sibling(ProgramState {
            dom_vals: self.dom_vals.clone(),
            region_sexprs: self.region_sexprs.clone(),
            stmt_sexprs: map,
        })
    }

    #[must_use]
    pub fn get_stmt_sexpr(&self, stmt: StmtId) -> Option<&SExprRef> {
        self.stmt_sexprs.get(&stmt)
    }
}

struct DomainSeed {
    id: DomainId,
    default_fn: DomainValFn,
    bottom_fn: DomainValFn,
}

/// Hash-consing allocator of program states.
///
/// Also knows, from the analysis manager it was built against, which
/// domains a well-formed initial state carries and how to construct
/// their default and bottom values.
pub struct ProgramStateManager {
    seeds: Vec<DomainSeed>,
    pool: Rc<RefCell<StatePool>>,
}

impl ProgramStateManager {
    /// Snapshots the domains of every required analysis.
    #[must_use]
    pub fn new(analysis_mgr: &AnalysisManager) -> Self {
        let mut seeds: Vec<DomainSeed> = Vec::new();
        for analysis in analysis_mgr.required_analyses() {
            for id in analysis_mgr.registered_domains_in(*analysis) {
                let info = analysis_mgr
                    .domain_info(id)
                    .unwrap_or_else(|| panic!("domain {} has no registered constructors", domain_name(id)));
                seeds.push(DomainSeed {
                    id,
                    default_fn: info.default_fn,
                    bottom_fn: info.bottom_fn,
                });
            }
        }
        seeds.sort_by_key(|seed| seed.id);
        seeds.dedup_by_key(|seed| seed.id);
        Self {
            seeds,
            pool: Rc::new(RefCell::new(StatePool::default())),
        }
    }

    /// The ids of the domains initial states carry.
    #[must_use]
    pub fn dom_ids(&self) -> Vec<DomainId> {
        self.seeds.iter().map(|seed| seed.id).collect()
    }

    /// A state holding every required domain's default value.
    #[must_use]
    pub fn default_state(&self) -> StateRef {
        let vals = self
            .seeds
            .iter()
            .map(|seed| (seed.id, Rc::from((seed.default_fn)()) as SharedVal))
            .collect();
        self.intern(ProgramState::new(vals))
    }

    /// A state holding every required domain's bottom value.
    #[must_use]
    pub fn bottom_state(&self) -> StateRef {
        let vals = self
            .seeds
            .iter()
            .map(|seed| (seed.id, Rc::from((seed.bottom_fn)()) as SharedVal))
            .collect();
        self.intern(ProgramState::new(vals))
    }

    /// Interns a state, returning the canonical handle of its content.
    #[must_use]
    pub fn intern(&self, state: ProgramState) -> StateRef {
        intern_in(&self.pool, state)
    }

    /// A new interned state copying `src` with its domain values replaced.
    #[must_use]
    pub fn state_with_dom_vals(&self, src: &StateRef, dom_vals: DomValMap) -> StateRef {
        src.with_dom_vals(dom_vals)
    }

    /// Number of states currently interned.
    #[must_use]
    pub fn live_states(&self) -> usize {
        self.pool.borrow().live_states()
    }

    /// Number of recycled slots awaiting reuse.
    #[must_use]
    pub fn free_slots(&self) -> usize {
        self.pool.borrow().free.len()
    }
}
