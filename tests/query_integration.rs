//! Integration tests for query compilation and execution
//!
//! Every indexed query is checked against the same query evaluated with the
//! index planner switched off.

use std::sync::Arc;

use arbor::query::nodes::{And, Calc, CalcOp, Cmp, Not, Or, Path, PosTest, Step};
use arbor::query::{CmpOp, Expr, NodeId, QueryContext, QueryExecutor, QueryPlan, QueryPlanner, Value};
use arbor::{
    ArborError, DocumentBuilder, EngineConfig, EvalFault, IndexAccessor, IndexMeta, MemoryStore, PlannerConfig,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn library_with(meta: IndexMeta) -> MemoryStore {
    init_tracing();
    let mut b = DocumentBuilder::new().with_meta(meta);
    b.open("library");
    for (id, title, price) in [("b1", "Dune", "9"), ("b2", "Emma", "15"), ("b3", "Ulysses", "30"), ("b4", "Dune", "12")] {
        b.open("book").attr("id", id);
        b.open("title").text(title).close();
        b.open("price").text(price).close();
        b.close();
    }
    b.close();
    b.build().unwrap()
}

fn library() -> Arc<MemoryStore> {
    Arc::new(library_with(IndexMeta::all()))
}

fn sequential(store: Arc<MemoryStore>) -> QueryContext {
    let planner = PlannerConfig {
        use_index: false,
        ..PlannerConfig::default()
    };
    QueryContext::builder(store)
        .config(EngineConfig::default().with_planner(planner))
        .build()
}

fn ids(query: &QueryContext, expr: Expr) -> (QueryPlan, Vec<NodeId>) {
    let plan = QueryPlanner::plan(expr, query).unwrap();
    let result = QueryExecutor::execute(&plan, query).unwrap();
    let ids = result.node_ids().to_vec();
    (plan, ids)
}

fn texts(store: &MemoryStore, ids: &[NodeId]) -> Vec<String> {
    ids.iter()
        .map(|&id| store.node_text(id).unwrap().into_owned())
        .collect()
}

fn used_index(plan: &QueryPlan) -> bool {
    plan.optimizations.iter().any(|note| note.starts_with("index access"))
}

fn books(pred: impl Into<Expr>) -> Expr {
    Expr::Path(Path::absolute(vec![
        Step::child("library"),
        Step::child("book").pred(pred),
        Step::child("title"),
    ]))
}

fn id_is(value: &str) -> Expr {
    Cmp::new(Path::relative(vec![Step::attr("id")]), CmpOp::Eq, Expr::str(value)).into()
}

fn price(op: CmpOp, n: f64) -> Expr {
    Cmp::new(
        Path::relative(vec![Step::child("price"), Step::text()]),
        op,
        Expr::num(n),
    )
    .into()
}

/// Run indexed and sequentially, assert both agree and return the titles
fn check(expr: Expr) -> (QueryPlan, Vec<String>) {
    let store = library();
    let indexed = QueryContext::new(store.clone());
    let (plan, hits) = ids(&indexed, expr.clone());
    let (_, expected) = ids(&sequential(store.clone()), expr);
    assert_eq!(hits, expected);
    (plan, texts(&store, &hits))
}

#[test]
fn test_attribute_equality_uses_value_index() {
    let (plan, titles) = check(books(id_is("b2")));
    assert!(used_index(&plan));
    assert_eq!(titles, vec!["Emma"]);
    assert!(plan.explain().to_string().contains("IndexAccess"));
}

#[test]
fn test_numeric_bounds_become_range_probe() {
    let (plan, titles) = check(books(And::new(vec![
        price(CmpOp::Ge, 10.0),
        price(CmpOp::Le, 20.0),
    ])));
    assert!(used_index(&plan));
    assert!(plan.optimizations.iter().any(|n| n.contains("merged")));
    assert_eq!(titles, vec!["Emma", "Dune"]);
}

#[test]
fn test_disjunction_becomes_membership_probe() {
    let (plan, titles) = check(books(Or::new(vec![id_is("b1"), id_is("b3")])));
    assert!(used_index(&plan));
    assert_eq!(titles, vec!["Dune", "Ulysses"]);
}

#[test]
fn test_value_without_hits_empties_the_path() {
    let store = library();
    let query = QueryContext::new(store);
    let plan = QueryPlanner::plan(books(id_is("missing")), &query).unwrap();
    assert_eq!(plan.root, Expr::empty());
    let result = QueryExecutor::execute(&plan, &query).unwrap();
    assert_eq!(result.value, Value::Empty);
}

/// Two indexable predicates; the attribute probe is the cheaper one
fn dune_b4() -> Expr {
    let title_dune: Expr = Cmp::new(
        Path::relative(vec![Step::child("title"), Step::text()]),
        CmpOp::Eq,
        Expr::str("Dune"),
    )
    .into();
    Expr::Path(Path::absolute(vec![
        Step::child("library"),
        Step::child("book").pred(title_dune).pred(id_is("b4")),
        Step::child("title"),
    ]))
}

/// `price/text() + 0 + 0 ...` nested `depth` times
fn nested_sum(depth: usize) -> Expr {
    let mut expr: Expr = Path::relative(vec![Step::child("price"), Step::text()]).into();
    for _ in 0..depth {
        expr = Calc::new(expr, CalcOp::Add, Expr::num(0.0)).into();
    }
    expr
}

fn shallow(store: Arc<MemoryStore>) -> QueryContext {
    QueryContext::builder(store)
        .config(EngineConfig::default().with_max_depth(16))
        .build()
}

#[test]
fn test_cheapest_predicate_is_chosen() {
    let (plan, titles) = check(dune_b4());
    assert!(used_index(&plan));
    assert_eq!(titles, vec!["Dune"]);
    let explain = plan.explain().to_string();
    assert!(explain.contains("values=\"b4\""));
}

#[test]
fn test_positional_predicates_disable_the_planner() {
    let expr = Expr::Path(Path::absolute(vec![
        Step::child("library"),
        Step::child("book").pred(id_is("b4")).pred(PosTest::new(1, 1)),
        Step::child("title"),
    ]));
    let (plan, titles) = check(expr);
    assert!(!used_index(&plan));
    assert_eq!(titles, vec!["Dune"]);
}

#[test]
fn test_negated_predicate_stays_sequential() {
    let (plan, titles) = check(books(Not::new(id_is("b1"))));
    assert!(!used_index(&plan));
    assert_eq!(titles, vec!["Emma", "Ulysses", "Dune"]);
}

#[test]
fn test_missing_index_falls_back() {
    let meta = IndexMeta {
        attribute_index: false,
        ..IndexMeta::all()
    };
    let store = Arc::new(library_with(meta));
    let query = QueryContext::new(store.clone());
    let (plan, hits) = ids(&query, books(id_is("b3")));
    assert!(!used_index(&plan));
    assert_eq!(texts(&store, &hits), vec!["Ulysses"]);
    assert_eq!(store.probe_count(), 0);
}

#[test]
fn test_probe_cache_serves_repeated_runs() {
    let store = library();
    let query = QueryContext::new(store.clone());
    let plan = QueryPlanner::plan(books(id_is("b2")), &query).unwrap();

    let first = QueryExecutor::execute(&plan, &query).unwrap();
    assert_eq!(first.stats.probe_cache_misses, 1);
    let second = QueryExecutor::execute(&plan, &query).unwrap();
    assert_eq!(second.stats.probe_cache_hits, 1);
    assert_eq!(store.probe_count(), 1);

    query.clear_probe_cache();
    let third = QueryExecutor::execute(&plan, &query).unwrap();
    assert_eq!(third.stats.probe_cache_misses, 1);
    assert_eq!(store.probe_count(), 2);
}

#[test]
fn test_cancelled_query() {
    let query = QueryContext::new(library());
    let plan = QueryPlanner::plan(books(id_is("b2")), &query).unwrap();
    query.cancel_handle().cancel();
    let err = QueryExecutor::execute(&plan, &query).unwrap_err();
    assert!(matches!(err, ArborError::Cancelled));
}

#[test]
fn test_explain_json() {
    let query = QueryContext::new(library());
    let plan = QueryPlanner::plan(books(id_is("b2")), &query).unwrap();
    let json = plan.explain().to_json().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["name"], "QueryPlan");
}

#[test]
fn test_explain_is_deterministic() {
    let store = library();
    let first = QueryPlanner::plan(dune_b4(), &QueryContext::new(store.clone())).unwrap();
    let second = QueryPlanner::plan(dune_b4(), &QueryContext::new(store)).unwrap();
    assert_eq!(first.explain().to_string(), second.explain().to_string());
    assert_eq!(first.explain().to_json().unwrap(), second.explain().to_json().unwrap());
}

#[test]
fn test_too_deep_tree_fails_compilation() {
    let expr = books(Cmp::new(nested_sum(40), CmpOp::Ge, Expr::num(0.0)));
    let err = QueryPlanner::plan(expr, &shallow(library())).unwrap_err();
    assert_eq!(err.fault(), Some(EvalFault::DepthExceeded));
}

#[test]
fn test_too_deep_tree_fails_evaluation() {
    let store = library();
    let expr = books(Cmp::new(nested_sum(40), CmpOp::Ge, Expr::num(0.0)));
    let plan = QueryPlanner::plan(expr, &QueryContext::new(store.clone())).unwrap();

    let err = QueryExecutor::execute(&plan, &shallow(store.clone())).unwrap_err();
    assert_eq!(err.fault(), Some(EvalFault::DepthExceeded));

    let result = QueryExecutor::execute(&plan, &QueryContext::new(store)).unwrap();
    assert_eq!(result.node_ids().len(), 4);
}
