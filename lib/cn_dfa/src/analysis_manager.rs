//! The analysis manager which holds all the registered analyses.
//!
//! Registration declares analyses, their dependencies, their domains and
//! their callbacks; the ordering pass turns the dependency relation into
//! one deterministic full order; dispatch then fires callbacks in that
//! order for every traversal step the driver makes.

use crate::analysis::{Analysis, AnalysisDef, MatchStmtFn, VisitPhase};
use crate::analysis_context::AnalysisContext;
use crate::context::CairnContext;
use crate::domain::{make_bottom, make_default, Dom, DomainValFn};
use crate::errors::{DfaError, DfaResult};
use crate::ids::{analysis_id, analysis_name, domain_id, domain_name, AnalysisId, DomainId};
use crate::proc_cfg::NodeRef;
use cn_ast::Stmt;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;

pub type AnalyzeBeginFunctionFn = Box<dyn Fn(&mut AnalysisContext)>;
pub type AnalyzeEndFunctionFn = Box<dyn Fn(NodeRef, &mut AnalysisContext)>;
pub type AnalyzeStmtFn = Box<dyn Fn(&Stmt, &mut AnalysisContext)>;

struct BeginFunctionCallback {
    owner: AnalysisId,
    run: AnalyzeBeginFunctionFn,
}

struct EndFunctionCallback {
    owner: AnalysisId,
    run: AnalyzeEndFunctionFn,
}

/// Per-statement callback record; dispatch streams through these in a
/// contiguous vector.
struct StmtCallback {
    owner: AnalysisId,
    phase: VisitPhase,
    matches: MatchStmtFn,
    run: AnalyzeStmtFn,
}

pub(crate) struct DomainInfo {
    pub(crate) owner: AnalysisId,
    pub(crate) default_fn: DomainValFn,
    pub(crate) bottom_fn: DomainValFn,
}

/// Registry and scheduler of every analysis of one session.
pub struct AnalysisManager {
    ctx: Rc<CairnContext>,

    registered: BTreeSet<AnalysisId>,
    dependencies: BTreeMap<AnalysisId, BTreeSet<AnalysisId>>,
    required: BTreeSet<AnalysisId>,
    privileged: BTreeSet<AnalysisId>,
    enabled: BTreeMap<AnalysisId, Rc<dyn Analysis>>,
    full_order: Vec<AnalysisId>,

    domains: BTreeMap<DomainId, DomainInfo>,
    analysis_domains: BTreeMap<AnalysisId, BTreeSet<DomainId>>,

    begin_function_callbacks: Vec<BeginFunctionCallback>,
    end_function_callbacks: Vec<EndFunctionCallback>,
    stmt_callbacks: Vec<StmtCallback>,
}

impl AnalysisManager {
    #[must_use]
    pub fn new(ctx: Rc<CairnContext>) -> Self {
        Self {
            ctx,
            registered: BTreeSet::new(),
            dependencies: BTreeMap::new(),
            required: BTreeSet::new(),
            privileged: BTreeSet::new(),
            enabled: BTreeMap::new(),
            full_order: Vec::new(),
            domains: BTreeMap::new(),
            analysis_domains: BTreeMap::new(),
            begin_function_callbacks: Vec::new(),
            end_function_callbacks: Vec::new(),
            stmt_callbacks: Vec::new(),
        }
    }

    #[must_use]
    pub fn context(&self) -> &Rc<CairnContext> {
        &self.ctx
    }

    /// Registers an analysis instance and lets it install its callbacks
    /// and domains. Ownership of the instance goes back to the caller,
    /// who enables it later with [`enable_analysis`](Self::enable_analysis).
    ///
    /// Registering a kind twice warns and keeps the first registration;
    /// the second instance installs nothing.
    pub fn register_analysis<A: AnalysisDef>(&mut self, analysis: A) -> Rc<A> {
        let id = analysis_id(A::KIND);
        let instance = Rc::new(analysis);
        if !self.registered.insert(id) {
            log::warn!(
                "analysis `{}` is already registered, keeping the first registration",
                analysis_name(id)
            );
            return instance;
        }
        A::register_callbacks(&instance, self);
        instance
    }

    /// Records that `id` must run after `required_id`.
    ///
    /// # Errors
    ///
    /// Both ends must be registered; an unknown end is fatal.
    pub fn add_analysis_dependency(
        &mut self,
        id: AnalysisId,
        required_id: AnalysisId,
    ) -> DfaResult<()> {
        for end in [id, required_id] {
            if !self.registered.contains(&end) {
                return Err(DfaError::UnknownAnalysis(analysis_name(end).to_string()));
            }
        }
        self.dependencies.entry(id).or_default().insert(required_id);
        Ok(())
    }

    #[must_use]
    pub fn analysis_dependencies(&self, id: AnalysisId) -> BTreeSet<AnalysisId> {
        self.dependencies.get(&id).cloned().unwrap_or_default()
    }

    /// Marks an analysis as required.
    ///
    /// # Errors
    ///
    /// The analysis must be registered.
    pub fn add_required_analysis(&mut self, id: AnalysisId) -> DfaResult<()> {
        if !self.registered.contains(&id) {
            return Err(DfaError::UnknownAnalysis(analysis_name(id).to_string()));
        }
        self.required.insert(id);
        Ok(())
    }

    /// Forces `A` to stay required through any later recomputation of
    /// the required set.
    ///
    /// # Errors
    ///
    /// The analysis must be registered.
    pub fn set_analysis_privileged<A: AnalysisDef>(&mut self) -> DfaResult<()> {
        let id = analysis_id(A::KIND);
        if !self.registered.contains(&id) {
            return Err(DfaError::UnknownAnalysis(analysis_name(id).to_string()));
        }
        self.privileged.insert(id);
        self.required.insert(id);
        Ok(())
    }

    #[must_use]
    pub fn is_analysis_required(&self, id: AnalysisId) -> bool {
        self.required.contains(&id)
    }

    #[must_use]
    pub fn required_analyses(&self) -> &BTreeSet<AnalysisId> {
        &self.required
    }

    /// Replaces the required set with its closure under the dependency
    /// relation, seeded by the current required and privileged sets.
    pub fn compute_required_by_dependencies(&mut self) {
        let mut queue: VecDeque<AnalysisId> =
            self.required.union(&self.privileged).copied().collect();
        let mut closed = BTreeSet::new();
        while let Some(id) = queue.pop_front() {
            if !closed.insert(id) {
                continue;
            }
            if let Some(deps) = self.dependencies.get(&id) {
                queue.extend(deps.iter().copied());
            }
        }
        self.required = closed;
    }

    /// Computes the full execution order over all registered analyses:
    /// dependencies first, ties broken by rising id.
    ///
    /// # Errors
    ///
    /// A cyclic dependency relation is fatal.
    pub fn compute_full_order_after_registry(&mut self) -> DfaResult<()> {
        let mut dependents: BTreeMap<AnalysisId, Vec<AnalysisId>> = BTreeMap::new();
        let mut in_degree: BTreeMap<AnalysisId, usize> = BTreeMap::new();
        for &id in &self.registered {
            in_degree.insert(id, 0);
        }
        for (&id, deps) in &self.dependencies {
            for &dep in deps {
                dependents.entry(dep).or_default().push(id);
                *in_degree.entry(id).or_insert(0) += 1;
            }
        }

        let mut frontier: BTreeSet<AnalysisId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.registered.len());
        while let Some(&id) = frontier.iter().next() {
            frontier.remove(&id);
            order.push(id);
            for &dependent in dependents.get(&id).into_iter().flatten() {
                let degree = in_degree
                    .get_mut(&dependent)
                    .expect("dependent is registered");
                *degree -= 1;
                if *degree == 0 {
                    frontier.insert(dependent);
                }
            }
        }

        if order.len() != self.registered.len() {
            let stuck: Vec<&str> = self
                .registered
                .iter()
                .filter(|id| !order.contains(id))
                .map(|id| analysis_name(*id))
                .collect();
            return Err(DfaError::DependencyCycle(stuck.join(", ")));
        }
        self.full_order = order;
        Ok(())
    }

    /// The computed full order.
    #[must_use]
    pub fn full_order(&self) -> &[AnalysisId] {
        &self.full_order
    }

    /// Filters the full order down to `subset`, keeping the order.
    #[must_use]
    pub fn get_ordered(&self, subset: &BTreeSet<AnalysisId>) -> Vec<AnalysisId> {
        self.full_order
            .iter()
            .filter(|id| subset.contains(id))
            .copied()
            .collect()
    }

    /// Moves a registered analysis into the enabled set and records it
    /// as required.
    ///
    /// # Errors
    ///
    /// The analysis must be registered, and its dependencies must be
    /// enabled already.
    pub fn enable_analysis(&mut self, analysis: Rc<dyn Analysis>) -> DfaResult<()> {
        let id = analysis_id(analysis.kind());
        if !self.registered.contains(&id) {
            return Err(DfaError::UnknownAnalysis(analysis_name(id).to_string()));
        }
        if self.enabled.contains_key(&id) {
            log::debug!("analysis `{}` is already enabled", analysis_name(id));
            return Ok(());
        }
        if let Some(deps) = self.dependencies.get(&id) {
            for dep in deps {
                if !self.enabled.contains_key(dep) {
                    return Err(DfaError::MissingDependency {
                        analysis: analysis_name(id).to_string(),
                        dependency: analysis_name(*dep).to_string(),
                    });
                }
            }
        }
        self.enabled.insert(id, analysis);
        self.required.insert(id);
        Ok(())
    }

    /// The enabled instance of `id`, if any.
    #[must_use]
    pub fn get_analysis(&self, id: AnalysisId) -> Option<&Rc<dyn Analysis>> {
        self.enabled.get(&id)
    }

    /// Records that domain `D` belongs to analysis `A` and memoises its
    /// value constructors. Re-binding a domain warns and keeps the first
    /// owner.
    pub fn add_domain_dependency<A: AnalysisDef, D: Dom>(&mut self) {
        let analysis = analysis_id(A::KIND);
        let domain = domain_id(D::KIND);
        if let Some(info) = self.domains.get(&domain) {
            if info.owner != analysis {
                log::warn!(
                    "domain `{}` is already owned by `{}`, keeping that owner",
                    domain_name(domain),
                    analysis_name(info.owner)
                );
            }
            return;
        }
        self.domains.insert(
            domain,
            DomainInfo {
                owner: analysis,
                default_fn: make_default::<D>,
                bottom_fn: make_bottom::<D>,
            },
        );
        self.analysis_domains
            .entry(analysis)
            .or_default()
            .insert(domain);
    }

    /// The domains registered by `id`.
    #[must_use]
    pub fn registered_domains_in(&self, id: AnalysisId) -> BTreeSet<DomainId> {
        self.analysis_domains.get(&id).cloned().unwrap_or_default()
    }

    /// The analysis owning domain `id`.
    ///
    /// # Errors
    ///
    /// The domain must be registered.
    pub fn domain_owner(&self, id: DomainId) -> DfaResult<AnalysisId> {
        self.domains
            .get(&id)
            .map(|info| info.owner)
            .ok_or_else(|| DfaError::UnknownDomain(domain_name(id).to_string()))
    }

    pub(crate) fn domain_info(&self, id: DomainId) -> Option<&DomainInfo> {
        self.domains.get(&id)
    }

    pub fn register_begin_function(&mut self, owner: AnalysisId, run: AnalyzeBeginFunctionFn) {
        self.begin_function_callbacks
            .push(BeginFunctionCallback { owner, run });
    }

    pub fn register_end_function(&mut self, owner: AnalysisId, run: AnalyzeEndFunctionFn) {
        self.end_function_callbacks
            .push(EndFunctionCallback { owner, run });
    }

    pub fn register_stmt(
        &mut self,
        owner: AnalysisId,
        run: AnalyzeStmtFn,
        matches: MatchStmtFn,
        phase: VisitPhase,
    ) {
        self.stmt_callbacks.push(StmtCallback {
            owner,
            phase,
            matches,
            run,
        });
    }

    /// Fires every begin-function callback of the required analyses, in
    /// full order then registration order.
    pub fn run_begin_function(&self, ctx: &mut AnalysisContext) {
        for id in &self.full_order {
            if !self.required.contains(id) {
                continue;
            }
            for cb in self
                .begin_function_callbacks
                .iter()
                .filter(|cb| cb.owner == *id)
            {
                log::trace!("begin-function callback of `{}`", analysis_name(*id));
                (cb.run)(ctx);
            }
        }
    }

    /// Fires every end-function callback with the CFG exit node.
    pub fn run_end_function(&self, ctx: &mut AnalysisContext, exit_node: NodeRef) {
        for id in &self.full_order {
            if !self.required.contains(id) {
                continue;
            }
            for cb in self
                .end_function_callbacks
                .iter()
                .filter(|cb| cb.owner == *id)
            {
                log::trace!("end-function callback of `{}`", analysis_name(*id));
                (cb.run)(exit_node, ctx);
            }
        }
    }

    /// Fires the per-statement callbacks of `phase` whose matcher
    /// accepts `stmt`.
    pub fn run_for_stmt(&self, ctx: &mut AnalysisContext, stmt: &Stmt, phase: VisitPhase) {
        for id in &self.full_order {
            if !self.required.contains(id) {
                continue;
            }
            for cb in self.stmt_callbacks.iter().filter(|cb| {
                cb.owner == *id && cb.phase == phase && (cb.matches)(stmt)
            }) {
                log::trace!(
                    "{:?}-stmt callback of `{}` on {}",
                    phase,
                    analysis_name(*id),
                    stmt
                );
                (cb.run)(stmt, ctx);
            }
        }
    }

    pub fn run_pre_stmt(&self, ctx: &mut AnalysisContext, stmt: &Stmt) {
        self.run_for_stmt(ctx, stmt, VisitPhase::Pre);
    }

    pub fn run_eval_stmt(&self, ctx: &mut AnalysisContext, stmt: &Stmt) {
        self.run_for_stmt(ctx, stmt, VisitPhase::Eval);
    }

    pub fn run_post_stmt(&self, ctx: &mut AnalysisContext, stmt: &Stmt) {
        self.run_for_stmt(ctx, stmt, VisitPhase::Post);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::interval::IntervalAnalysis;
    use crate::analysis::symbol_resolver::SymbolResolver;
    use crate::domain::interval::ItvDom;
    use crate::ids::{AnalysisKind, DomainKind};
    use cn_ast::{AstContext, SourceManager};

    struct SignAnalysis;
    struct ParityAnalysis;
    struct TaintAnalysis;

    macro_rules! stub_analysis {
        ($ty:ident, $kind:expr) => {
            impl Analysis for $ty {
                fn kind(&self) -> AnalysisKind {
                    $kind
                }
            }
            impl AnalysisDef for $ty {
                const KIND: AnalysisKind = $kind;
                fn register_callbacks(_: &Rc<Self>, _: &mut AnalysisManager) {}
            }
        };
    }

    stub_analysis!(SignAnalysis, AnalysisKind::Sign);
    stub_analysis!(ParityAnalysis, AnalysisKind::Parity);
    stub_analysis!(TaintAnalysis, AnalysisKind::Taint);

    fn new_manager() -> AnalysisManager {
        let ctx = CairnContext::new(
            Rc::new(AstContext::new()),
            Rc::new(SourceManager::new()),
        );
        AnalysisManager::new(Rc::new(ctx))
    }

    fn id_of(kind: AnalysisKind) -> AnalysisId {
        analysis_id(kind)
    }

    #[test]
    fn full_order_respects_dependencies() {
        let mut mgr = new_manager();
        mgr.register_analysis(SignAnalysis);
        mgr.register_analysis(ParityAnalysis);
        mgr.register_analysis(TaintAnalysis);
        // parity runs after sign, taint after parity
        mgr.add_analysis_dependency(id_of(AnalysisKind::Parity), id_of(AnalysisKind::Sign))
            .unwrap();
        mgr.add_analysis_dependency(id_of(AnalysisKind::Taint), id_of(AnalysisKind::Parity))
            .unwrap();
        mgr.compute_full_order_after_registry().unwrap();
        assert_eq!(
            mgr.full_order(),
            &[
                id_of(AnalysisKind::Sign),
                id_of(AnalysisKind::Parity),
                id_of(AnalysisKind::Taint)
            ]
        );
    }

    #[test]
    fn full_order_breaks_ties_by_rising_id() {
        let mut mgr = new_manager();
        // registration order must not matter
        mgr.register_analysis(TaintAnalysis);
        mgr.register_analysis(SignAnalysis);
        mgr.register_analysis(ParityAnalysis);
        mgr.compute_full_order_after_registry().unwrap();
        assert_eq!(
            mgr.full_order(),
            &[
                id_of(AnalysisKind::Sign),
                id_of(AnalysisKind::Parity),
                id_of(AnalysisKind::Taint)
            ]
        );
    }

    #[test]
    fn dependency_cycle_is_fatal() {
        let mut mgr = new_manager();
        mgr.register_analysis(SignAnalysis);
        mgr.register_analysis(ParityAnalysis);
        mgr.add_analysis_dependency(id_of(AnalysisKind::Sign), id_of(AnalysisKind::Parity))
            .unwrap();
        mgr.add_analysis_dependency(id_of(AnalysisKind::Parity), id_of(AnalysisKind::Sign))
            .unwrap();
        assert!(matches!(
            mgr.compute_full_order_after_registry(),
            Err(DfaError::DependencyCycle(_))
        ));
    }

    #[test]
    fn unknown_dependency_end_is_fatal() {
        let mut mgr = new_manager();
        mgr.register_analysis(SignAnalysis);
        assert!(matches!(
            mgr.add_analysis_dependency(id_of(AnalysisKind::Sign), id_of(AnalysisKind::Taint)),
            Err(DfaError::UnknownAnalysis(_))
        ));
    }

    #[test]
    fn duplicate_registration_keeps_the_first() {
        let mut mgr = new_manager();
        let first = mgr.register_analysis(SignAnalysis);
        let _second = mgr.register_analysis(SignAnalysis);
        mgr.compute_full_order_after_registry().unwrap();
        assert_eq!(mgr.full_order().len(), 1);
        mgr.enable_analysis(first).unwrap();
        assert!(mgr.get_analysis(id_of(AnalysisKind::Sign)).is_some());
    }

    #[test]
    fn required_set_closes_over_dependencies() {
        let mut mgr = new_manager();
        mgr.register_analysis(SignAnalysis);
        mgr.register_analysis(ParityAnalysis);
        mgr.register_analysis(TaintAnalysis);
        mgr.add_analysis_dependency(id_of(AnalysisKind::Parity), id_of(AnalysisKind::Sign))
            .unwrap();
        mgr.add_analysis_dependency(id_of(AnalysisKind::Taint), id_of(AnalysisKind::Parity))
            .unwrap();
        mgr.add_required_analysis(id_of(AnalysisKind::Taint)).unwrap();
        mgr.compute_required_by_dependencies();
        let required = mgr.required_analyses();
        assert!(required.contains(&id_of(AnalysisKind::Sign)));
        assert!(required.contains(&id_of(AnalysisKind::Parity)));
        assert!(required.contains(&id_of(AnalysisKind::Taint)));
    }

    #[test]
    fn privileged_analysis_survives_recomputation() {
        let mut mgr = new_manager();
        mgr.register_analysis(SymbolResolver::new());
        mgr.register_analysis(SignAnalysis);
        mgr.set_analysis_privileged::<SymbolResolver>().unwrap();
        // a driver-side filter only asked for the sign analysis
        mgr.add_required_analysis(id_of(AnalysisKind::Sign)).unwrap();
        mgr.compute_required_by_dependencies();
        assert!(mgr.is_analysis_required(id_of(AnalysisKind::SymbolResolver)));
        assert!(mgr.is_analysis_required(id_of(AnalysisKind::Sign)));
    }

    #[test]
    fn enabling_without_enabled_dependency_is_fatal() {
        let mut mgr = new_manager();
        let sign = mgr.register_analysis(SignAnalysis);
        let parity = mgr.register_analysis(ParityAnalysis);
        mgr.add_analysis_dependency(id_of(AnalysisKind::Parity), id_of(AnalysisKind::Sign))
            .unwrap();
        assert!(matches!(
            mgr.enable_analysis(Rc::clone(&parity) as Rc<dyn Analysis>),
            Err(DfaError::MissingDependency { .. })
        ));
        mgr.enable_analysis(sign).unwrap();
        mgr.enable_analysis(parity).unwrap();
    }

    #[test]
    fn enabling_twice_is_a_no_op() {
        let mut mgr = new_manager();
        let sign = mgr.register_analysis(SignAnalysis);
        mgr.enable_analysis(Rc::clone(&sign) as Rc<dyn Analysis>).unwrap();
        let required_before = mgr.required_analyses().clone();
        mgr.enable_analysis(sign).unwrap();
        assert_eq!(mgr.required_analyses(), &required_before);
    }

    #[test]
    fn enabling_unregistered_analysis_is_fatal() {
        let mut mgr = new_manager();
        assert!(matches!(
            mgr.enable_analysis(Rc::new(SignAnalysis) as Rc<dyn Analysis>),
            Err(DfaError::UnknownAnalysis(_))
        ));
    }

    #[test]
    fn get_ordered_filters_the_full_order() {
        let mut mgr = new_manager();
        mgr.register_analysis(SignAnalysis);
        mgr.register_analysis(ParityAnalysis);
        mgr.register_analysis(TaintAnalysis);
        mgr.add_analysis_dependency(id_of(AnalysisKind::Taint), id_of(AnalysisKind::Sign))
            .unwrap();
        mgr.compute_full_order_after_registry().unwrap();
        let subset: BTreeSet<AnalysisId> =
            [id_of(AnalysisKind::Taint), id_of(AnalysisKind::Sign)].into();
        assert_eq!(
            mgr.get_ordered(&subset),
            vec![id_of(AnalysisKind::Sign), id_of(AnalysisKind::Taint)]
        );
    }

    #[test]
    fn domain_ownership_is_recorded_once() {
        let mut mgr = new_manager();
        mgr.register_analysis(IntervalAnalysis::new());
        let dom = domain_id(DomainKind::Interval);
        assert_eq!(
            mgr.domain_owner(dom).unwrap(),
            id_of(AnalysisKind::Interval)
        );
        assert!(mgr
            .registered_domains_in(id_of(AnalysisKind::Interval))
            .contains(&dom));

        // re-binding from another analysis keeps the first owner
        mgr.register_analysis(SignAnalysis);
        mgr.add_domain_dependency::<SignAnalysis, ItvDom>();
        assert_eq!(
            mgr.domain_owner(dom).unwrap(),
            id_of(AnalysisKind::Interval)
        );

        assert!(matches!(
            mgr.domain_owner(domain_id(DomainKind::Sign)),
            Err(DfaError::UnknownDomain(_))
        ));
    }
}
