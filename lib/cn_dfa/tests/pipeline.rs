//! End-to-end scenarios: dispatch ordering across analyses and whole
//! functions run to fixpoint.

use cn_ast::{AstContext, BinOp, DeclId, SourceManager, Ty};
use cn_dfa::analysis::interval::IntervalAnalysis;
use cn_dfa::analysis::symbol_resolver::SymbolResolver;
use cn_dfa::analysis::{matchers, Analysis, AnalysisDef, VisitPhase};
use cn_dfa::domain::interval::{Bound, Itv, ItvDom};
use cn_dfa::ids::{analysis_id, AnalysisKind};
use cn_dfa::program_state::ProgramStateManager;
use cn_dfa::stack_frame::StackFrameManager;
use cn_dfa::symbol::SExpr;
use cn_dfa::{analyze_function, AnalysisContext, AnalysisManager, CairnContext};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default)]
struct Trace(RefCell<Vec<String>>);

impl Trace {
    fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

struct RecorderA {
    trace: Rc<Trace>,
}

impl Analysis for RecorderA {
    fn kind(&self) -> AnalysisKind {
        AnalysisKind::Sign
    }
}

impl AnalysisDef for RecorderA {
    const KIND: AnalysisKind = AnalysisKind::Sign;

    fn register_callbacks(this: &Rc<Self>, mgr: &mut AnalysisManager) {
        let id = analysis_id(Self::KIND);
        let trace = Rc::clone(&this.trace);
        mgr.register_begin_function(id, Box::new(move |_ctx| trace.push("A:begin")));
        let trace = Rc::clone(&this.trace);
        mgr.register_stmt(
            id,
            Box::new(move |stmt, _ctx| trace.push(format!("A:pre:{}", stmt.id()))),
            matchers::any,
            VisitPhase::Pre,
        );
        let trace = Rc::clone(&this.trace);
        mgr.register_stmt(
            id,
            Box::new(move |stmt, _ctx| trace.push(format!("A:eval:{}", stmt.id()))),
            matchers::any,
            VisitPhase::Eval,
        );
        let trace = Rc::clone(&this.trace);
        mgr.register_end_function(id, Box::new(move |_node, _ctx| trace.push("A:end")));
    }
}

struct RecorderB {
    trace: Rc<Trace>,
}

impl Analysis for RecorderB {
    fn kind(&self) -> AnalysisKind {
        AnalysisKind::Parity
    }
}

impl AnalysisDef for RecorderB {
    const KIND: AnalysisKind = AnalysisKind::Parity;

    fn register_callbacks(this: &Rc<Self>, mgr: &mut AnalysisManager) {
        let id = analysis_id(Self::KIND);
        let trace = Rc::clone(&this.trace);
        mgr.register_begin_function(id, Box::new(move |_ctx| trace.push("B:begin")));
        let trace = Rc::clone(&this.trace);
        mgr.register_stmt(
            id,
            Box::new(move |stmt, _ctx| trace.push(format!("B:pre:{}", stmt.id()))),
            matchers::any,
            VisitPhase::Pre,
        );
        let trace = Rc::clone(&this.trace);
        mgr.register_end_function(id, Box::new(move |_node, _ctx| trace.push("B:end")));
    }
}

#[test]
fn dispatch_follows_dependency_order_not_registration_order() {
    let trace = Rc::new(Trace::default());

    let mut ast = AstContext::new();
    let x = ast.var("x", Ty::Int);
    let one = ast.int_lit(1);
    let bind = ast.decl_stmt(x, Some(one));

    let ctx = Rc::new(CairnContext::new(
        Rc::new(ast),
        Rc::new(SourceManager::new()),
    ));
    let mut mgr = AnalysisManager::new(Rc::clone(&ctx));

    // B registers first, but depends on A: A must fire first anyway.
    let b = mgr.register_analysis(RecorderB {
        trace: Rc::clone(&trace),
    });
    let a = mgr.register_analysis(RecorderA {
        trace: Rc::clone(&trace),
    });
    mgr.add_analysis_dependency(
        analysis_id(AnalysisKind::Parity),
        analysis_id(AnalysisKind::Sign),
    )
    .unwrap();
    mgr.compute_required_by_dependencies();
    mgr.compute_full_order_after_registry().unwrap();
    mgr.enable_analysis(a).unwrap();
    mgr.enable_analysis(b).unwrap();

    let state_mgr = ProgramStateManager::new(&mgr);
    let mut actx = AnalysisContext::new(&ctx, state_mgr.default_state());

    mgr.run_begin_function(&mut actx);
    let stmt = ctx.ast().stmt(bind);
    mgr.run_pre_stmt(&mut actx, stmt);
    mgr.run_eval_stmt(&mut actx, stmt);
    mgr.run_post_stmt(&mut actx, stmt);
    mgr.run_end_function(&mut actx, petgraph::graph::NodeIndex::new(0));

    assert_eq!(
        trace.entries(),
        vec![
            "A:begin".to_string(),
            "B:begin".to_string(),
            format!("A:pre:{}", stmt.id()),
            format!("B:pre:{}", stmt.id()),
            format!("A:eval:{}", stmt.id()),
            "A:end".to_string(),
            "B:end".to_string(),
        ]
    );
}

fn wire_interval_pipeline(ast: AstContext) -> (Rc<CairnContext>, AnalysisManager) {
    let ctx = Rc::new(CairnContext::new(
        Rc::new(ast),
        Rc::new(SourceManager::new()),
    ));
    let mut mgr = AnalysisManager::new(Rc::clone(&ctx));
    let resolver = mgr.register_analysis(SymbolResolver::new());
    let intervals = mgr.register_analysis(IntervalAnalysis::new());
    mgr.set_analysis_privileged::<SymbolResolver>().unwrap();
    mgr.add_analysis_dependency(
        analysis_id(AnalysisKind::Interval),
        analysis_id(AnalysisKind::SymbolResolver),
    )
    .unwrap();
    mgr.add_required_analysis(analysis_id(AnalysisKind::Interval))
        .unwrap();
    mgr.compute_required_by_dependencies();
    mgr.compute_full_order_after_registry().unwrap();
    mgr.enable_analysis(resolver).unwrap();
    mgr.enable_analysis(intervals).unwrap();
    (ctx, mgr)
}

fn region_of(ctx: &CairnContext, decl: DeclId) -> cn_dfa::region::RegionId {
    ctx.regions().get(decl).expect("region was interned").id()
}

#[test]
fn straight_line_intervals_and_symbols() {
    // int x = 3; int y = x + 4;
    let mut ast = AstContext::new();
    let x = ast.var("x", Ty::Int);
    let y = ast.var("y", Ty::Int);
    let three = ast.int_lit(3);
    let dx = ast.decl_stmt(x, Some(three));
    let xr = ast.decl_ref(x);
    let four = ast.int_lit(4);
    let sum = ast.binary(BinOp::Add, xr, four);
    let dy = ast.decl_stmt(y, Some(sum));
    let main_f = ast.function("main", vec![]);
    ast.set_function_body(main_f, vec![dx, dy]);

    let (ctx, mgr) = wire_interval_pipeline(ast);
    let mut frames = StackFrameManager::new();
    let states = analyze_function(&mgr, &mut frames, main_f).unwrap();

    let cfg = frames.cfg(main_f).unwrap();
    let exit = states.exits.get(&cfg.exit()).unwrap();
    let env = exit.get_dom::<ItvDom>().unwrap();
    assert_eq!(env.get(region_of(&ctx, x)), Itv::singleton(3));
    assert_eq!(env.get(region_of(&ctx, y)), Itv::singleton(7));

    // the resolver bound both regions to expressions
    assert_eq!(
        exit.get_region_sexpr(region_of(&ctx, x)).map(|e| e.as_ref()),
        Some(&SExpr::IntConst(3))
    );
    assert!(exit.get_region_sexpr(region_of(&ctx, y)).is_some());
    assert!(exit.get_stmt_sexpr(dy).is_some());
}

#[test]
fn branch_states_join_at_the_merge_point() {
    // int x = 0; if (x < 5) { x = 1; } else { x = 2; }
    let mut ast = AstContext::new();
    let x = ast.var("x", Ty::Int);
    let zero = ast.int_lit(0);
    let dx = ast.decl_stmt(x, Some(zero));
    let xr = ast.decl_ref(x);
    let five = ast.int_lit(5);
    let cond = ast.binary(BinOp::Lt, xr, five);
    let one = ast.int_lit(1);
    let set1 = ast.assign(x, one);
    let two = ast.int_lit(2);
    let set2 = ast.assign(x, two);
    let branch = ast.if_stmt(cond, vec![set1], vec![set2]);
    let main_f = ast.function("main", vec![]);
    ast.set_function_body(main_f, vec![dx, branch]);

    let (ctx, mgr) = wire_interval_pipeline(ast);
    let mut frames = StackFrameManager::new();
    let states = analyze_function(&mgr, &mut frames, main_f).unwrap();

    let cfg = frames.cfg(main_f).unwrap();
    let exit = states.exits.get(&cfg.exit()).unwrap();
    let env = exit.get_dom::<ItvDom>().unwrap();
    assert_eq!(env.get(region_of(&ctx, x)), Itv::of(1, 2));

    // conflicting symbol bindings disappear at the join
    assert!(exit.get_region_sexpr(region_of(&ctx, x)).is_none());
    // one-sided statement bindings survive it
    assert_eq!(
        exit.get_stmt_sexpr(set1).map(|e| e.as_ref()),
        Some(&SExpr::IntConst(1))
    );
}

#[test]
fn loops_widen_to_a_fixpoint() {
    // int i = 0; int one = 1; while (i < 10) { i = i + one; }
    let mut ast = AstContext::new();
    let i = ast.var("i", Ty::Int);
    let one_v = ast.var("one", Ty::Int);
    let zero = ast.int_lit(0);
    let di = ast.decl_stmt(i, Some(zero));
    let one_l = ast.int_lit(1);
    let done = ast.decl_stmt(one_v, Some(one_l));
    let ir = ast.decl_ref(i);
    let ten = ast.int_lit(10);
    let cond = ast.binary(BinOp::Lt, ir, ten);
    let ir2 = ast.decl_ref(i);
    let oner = ast.decl_ref(one_v);
    let sum = ast.binary(BinOp::Add, ir2, oner);
    let step = ast.assign(i, sum);
    let w = ast.while_stmt(cond, vec![step]);
    let main_f = ast.function("main", vec![]);
    ast.set_function_body(main_f, vec![di, done, w]);

    let (ctx, mgr) = wire_interval_pipeline(ast);
    let mut frames = StackFrameManager::new();
    let states = analyze_function(&mgr, &mut frames, main_f).unwrap();

    let cfg = frames.cfg(main_f).unwrap();
    let exit = states.exits.get(&cfg.exit()).unwrap();
    let env = exit.get_dom::<ItvDom>().unwrap();

    // the loop counter grows without an upper bound after widening, but
    // never below its initial value
    let ival = env.get(region_of(&ctx, i));
    assert_eq!(ival.lo, Bound::Finite(0));
    assert_eq!(ival.hi, Bound::PosInf);
    // the loop-invariant variable stays exact
    assert_eq!(env.get(region_of(&ctx, one_v)), Itv::singleton(1));
    assert_eq!(
        exit.get_region_sexpr(region_of(&ctx, one_v)).map(|e| e.as_ref()),
        Some(&SExpr::IntConst(1))
    );
}

#[test]
fn unmodelled_declarations_are_skipped() {
    // typedef-like declarations have no storage; binding one is ignored
    let mut ast = AstContext::new();
    let t = ast.record("s");
    let dt = ast.decl_stmt(t, None);
    let x = ast.var("x", Ty::Int);
    let nine = ast.int_lit(9);
    let dx = ast.decl_stmt(x, Some(nine));
    let main_f = ast.function("main", vec![]);
    ast.set_function_body(main_f, vec![dt, dx]);

    let (ctx, mgr) = wire_interval_pipeline(ast);
    let mut frames = StackFrameManager::new();
    let states = analyze_function(&mgr, &mut frames, main_f).unwrap();

    let cfg = frames.cfg(main_f).unwrap();
    let exit = states.exits.get(&cfg.exit()).unwrap();
    let env = exit.get_dom::<ItvDom>().unwrap();
    assert_eq!(env.get(region_of(&ctx, x)), Itv::singleton(9));
    assert!(ctx.regions().get(t).is_none());
}
