//! Query planner and index-equivalence rewriting
//!
//! Compilation is driven by [`QueryPlanner::plan`]. While paths compile, the
//! [`IndexPlanner`] looks for the predicate that is cheapest to answer through
//! a secondary index and, when one is found, turns the path inside out: the
//! index access becomes the path root and the steps leading to it are re-checked
//! through an inverted relative path.

use crate::config::ZeroCostPolicy;
use crate::query::accessor::{IndexAccessor, ValueTarget};
use crate::query::ast::{Expr, Use};
use crate::query::context::{CompileContext, QueryContext};
use crate::query::explain::PlanNode;
use crate::query::nodes::{Path, PathRoot, Step};
use crate::query::types::{Axis, IndexCost, Test};
use crate::tokenizer::Tokenizer;
use crate::Result;

/// Compiled query ready for execution
#[derive(Clone, Debug)]
pub struct QueryPlan {
    pub root: Expr,
    /// Rewrites applied during compilation, in order
    pub optimizations: Vec<String>,
}

impl QueryPlan {
    /// Deterministic description of the compiled tree
    pub fn explain(&self) -> PlanNode {
        PlanNode::new("QueryPlan").child(self.root.plan())
    }
}

/// Query planner
pub struct QueryPlanner;

impl QueryPlanner {
    /// Compile an expression tree into an executable plan
    pub fn plan(expr: Expr, query: &QueryContext) -> Result<QueryPlan> {
        let mut cx = CompileContext::new(query);
        let root = expr.compile(&mut cx)?;
        let optimizations = cx.into_notes();
        tracing::debug!(rewrites = optimizations.len(), "query compiled");
        Ok(QueryPlan { root, optimizations })
    }
}

/// Context of an index cost or equivalence request
pub struct IndexContext<'a> {
    query: &'a QueryContext,
    /// Test of the step whose predicate is being planned
    pub test: Test,
}

impl<'a> IndexContext<'a> {
    pub fn new(query: &'a QueryContext, test: Test) -> Self {
        Self { query, test }
    }

    pub fn accessor(&self) -> &'a dyn IndexAccessor {
        self.query.accessor()
    }

    pub fn tokenizer(&self) -> &'a Tokenizer {
        self.query.tokenizer()
    }

    pub fn policy(&self) -> ZeroCostPolicy {
        self.query.config().planner.zero_cost
    }

    /// Whether the store keeps a value index for the target
    pub fn has_value_index(&self, target: ValueTarget) -> bool {
        let meta = self.accessor().index_meta();
        match target {
            ValueTarget::Text => meta.text_index,
            ValueTarget::Attribute => meta.attribute_index,
        }
    }
}

/// Node kind an indexable predicate path ends in, plus an attribute name filter
pub fn index_target(expr: &Expr) -> Option<(ValueTarget, Option<String>)> {
    let path = match expr {
        Expr::Path(path) => path,
        _ => return None,
    };
    if path.root != PathRoot::Context {
        return None;
    }
    let (last, inner) = path.steps.split_last()?;
    let inner_ok = inner.iter().all(|step| {
        matches!(step.axis, Axis::Child | Axis::Descendant)
            && matches!(step.test, Test::Name(_) | Test::Any)
            && step.preds.is_empty()
    });
    if !inner_ok || !last.preds.is_empty() {
        return None;
    }
    match (last.axis, &last.test) {
        (Axis::Child | Axis::Descendant, Test::Text) => Some((ValueTarget::Text, None)),
        (Axis::Attribute, Test::Name(name)) => Some((ValueTarget::Attribute, Some(name.clone()))),
        (Axis::Attribute, Test::Any) => Some((ValueTarget::Attribute, None)),
        _ => None,
    }
}

/// Steps leading from the end of a predicate path back to its context step
pub fn invert_pred_path(steps: &[Step], test: &Test) -> Vec<Step> {
    let mut inverted = Vec::with_capacity(steps.len());
    for i in (1..steps.len()).rev() {
        inverted.push(Step {
            axis: steps[i].axis.invert(),
            test: steps[i - 1].test.clone(),
            preds: steps[i - 1].preds.clone(),
        });
    }
    if let Some(first) = steps.first() {
        inverted.push(Step::new(first.axis.invert(), test.clone()));
    }
    inverted
}

/// Wrap an index access so it yields nodes of the planned step
pub fn reanchor(access: Expr, pred_path: &Expr, ic: &IndexContext<'_>) -> Expr {
    let steps = match pred_path {
        Expr::Path(path) => invert_pred_path(&path.steps, &ic.test),
        _ => Vec::new(),
    };
    if steps.is_empty() {
        return access;
    }
    Expr::Path(Path {
        root: PathRoot::Expr(Box::new(access)),
        steps,
    })
}

/// Sum of costs, stopping once the cap is exceeded
pub fn capped_sum<I>(costs: I, cap: usize) -> IndexCost
where
    I: IntoIterator<Item = IndexCost>,
{
    let mut sum = 0usize;
    for cost in costs {
        if !cost.is_usable() || cost.negated {
            return IndexCost::UNUSABLE;
        }
        sum = sum.saturating_add(cost.hits);
        if sum > cap {
            return IndexCost::hits(sum);
        }
    }
    IndexCost::hits(sum)
}

/// Picks index-servable predicates of absolute paths
pub struct IndexPlanner;

impl IndexPlanner {
    fn applicable(path: &Path, query: &QueryContext) -> bool {
        query.config().planner.use_index
            && path.root == PathRoot::Document
            && path.steps.iter().all(|step| step.axis.is_down())
            && path.steps.iter().flat_map(|s| &s.preds).all(|p| !p.uses(Use::Position) && !p.uses(Use::Size))
    }

    /// Rewrite a compiled absolute path around its cheapest index-servable predicate
    pub fn rewrite_path(mut path: Path, cx: &mut CompileContext<'_>) -> Result<Expr> {
        let query = cx.query();
        if !Self::applicable(&path, query) {
            return Ok(Expr::Path(path));
        }

        let mut best: Option<(usize, usize, IndexCost)> = None;
        'search: for (s, step) in path.steps.iter().enumerate() {
            let ic = IndexContext::new(query, step.test.clone());
            for (p, pred) in step.preds.iter().enumerate() {
                let cap = best.map_or(usize::MAX, |(_, _, c)| c.hits);
                let cost = pred.index_cost(&ic, cap);
                if !cost.is_usable() || (cost.negated && cost.hits > 0) {
                    continue;
                }
                if cost.hits < cap {
                    best = Some((s, p, cost));
                    if cost.hits == 0 {
                        break 'search;
                    }
                }
            }
        }

        let (s, p, cost) = match best {
            Some(found) => found,
            None => return Ok(Expr::Path(path)),
        };
        tracing::debug!(step = s, predicate = p, hits = cost.hits, negated = cost.negated, "index candidate");

        if cost.hits == 0 {
            if !cost.negated {
                cx.note("index access without hits: path is empty");
                return Ok(Expr::empty());
            }
            // a negated operand without hits holds for every node
            path.steps[s].preds.remove(p);
            cx.note("negated full-text predicate without hits removed");
            return Self::rewrite_path(path, cx);
        }

        let test = path.steps[s].test.clone();
        let pred = path.steps[s].preds.remove(p);
        let ic = IndexContext::new(query, test);
        let access = pred.index_equivalent(&ic)?;
        cx.note(format!("index access for step {} ({} expected hits)", s + 1, cost.hits));

        let mut steps = path.steps;
        let rest = steps.split_off(s + 1);
        let mut chosen = match steps.pop() {
            Some(step) => step,
            None => return Ok(access),
        };

        let mut preds = std::mem::take(&mut chosen.preds);
        if let Some(outer) = Self::outer_check(chosen.axis, &steps) {
            preds.push(outer);
        }

        if preds.is_empty() && rest.is_empty() {
            return Ok(access);
        }
        let mut new_steps = Vec::with_capacity(rest.len() + 1);
        if !preds.is_empty() {
            new_steps.push(Step {
                axis: Axis::SelfAxis,
                test: Test::Node,
                preds,
            });
        }
        new_steps.extend(rest);
        Ok(Expr::Path(Path {
            root: PathRoot::Expr(Box::new(access)),
            steps: new_steps,
        }))
    }

    /// Relative path checking that a node is reachable through the steps before it
    fn outer_check(axis: Axis, before: &[Step]) -> Option<Expr> {
        let mut steps = Vec::with_capacity(before.len() + 1);
        let mut last_axis = axis.invert();
        for prev in before.iter().rev() {
            steps.push(Step {
                axis: last_axis,
                test: prev.test.clone(),
                preds: prev.preds.clone(),
            });
            last_axis = prev.axis.invert();
        }
        if !matches!(last_axis, Axis::Ancestor | Axis::AncestorOrSelf) {
            steps.push(Step::new(last_axis, Test::Document));
        }
        if steps.is_empty() {
            return None;
        }
        Some(Expr::Path(Path::relative(steps)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::types::Axis;

    #[test]
    fn test_index_target_text_and_attribute() {
        let text = Expr::Path(Path::relative(vec![Step::child("title"), Step::text()]));
        assert_eq!(index_target(&text), Some((ValueTarget::Text, None)));

        let attr = Expr::Path(Path::relative(vec![Step::attr("id")]));
        assert_eq!(index_target(&attr), Some((ValueTarget::Attribute, Some("id".to_string()))));

        let element = Expr::Path(Path::relative(vec![Step::child("title")]));
        assert_eq!(index_target(&element), None);

        let absolute = Expr::Path(Path::absolute(vec![Step::child("title"), Step::text()]));
        assert_eq!(index_target(&absolute), None);
    }

    #[test]
    fn test_invert_pred_path() {
        let steps = vec![Step::child("title"), Step::text()];
        let inverted = invert_pred_path(&steps, &Test::name("book"));
        assert_eq!(inverted.len(), 2);
        assert_eq!(inverted[0].axis, Axis::Parent);
        assert_eq!(inverted[0].test, Test::name("title"));
        assert_eq!(inverted[1].axis, Axis::Parent);
        assert_eq!(inverted[1].test, Test::name("book"));
    }

    #[test]
    fn test_outer_check_stops_at_ancestor() {
        // /descendant::book: any book has the document as ancestor
        let check = IndexPlanner::outer_check(Axis::Descendant, &[]);
        assert!(check.is_none());

        // /library/book
        let before = vec![Step::child("library")];
        let check = IndexPlanner::outer_check(Axis::Child, &before);
        match check {
            Some(Expr::Path(path)) => {
                assert_eq!(path.steps.len(), 2);
                assert_eq!(path.steps[0].test, Test::name("library"));
                assert_eq!(path.steps[1].test, Test::Document);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_capped_sum() {
        let costs = vec![IndexCost::hits(3), IndexCost::hits(4), IndexCost::hits(100)];
        assert_eq!(capped_sum(costs.clone(), usize::MAX).hits, 107);
        assert_eq!(capped_sum(costs, 5).hits, 7);
        assert!(!capped_sum(vec![IndexCost::hits(1), IndexCost::UNUSABLE], 10).is_usable());
    }
}
