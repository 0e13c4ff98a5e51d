//! Index accesses and node-set combination produced by the planner

use crate::error::{ArborError, EvalFault};
use crate::query::accessor::{NumRange, ValueTarget};
use crate::query::ast::{Expr, ExprNode, Use};
use crate::query::context::{CompileContext, EvalContext};
use crate::query::explain::PlanNode;
use crate::query::fulltext::{FtExpr, FtSource};
use crate::query::planner::IndexContext;
use crate::query::types::{IndexCost, NodeSet, Value};
use crate::Result;
use roaring::RoaringBitmap;

/// Lookup sent to the store
#[derive(Clone, Debug, PartialEq)]
pub enum IndexProbe {
    /// Nodes whose value equals one of the strings
    Value { target: ValueTarget, values: Vec<String> },
    /// Nodes whose numeric value falls inside the range
    Range { target: ValueTarget, range: NumRange },
    /// Text nodes matching a full-text selection
    FullText { ft: FtExpr },
}

impl IndexProbe {
    /// Estimated hits, or unusable when the store lacks the index
    pub fn cost(&self, ic: &IndexContext<'_>) -> IndexCost {
        let accessor = ic.accessor();
        match self {
            IndexProbe::Value { target, values } if ic.has_value_index(*target) => IndexCost::hits(
                values
                    .iter()
                    .map(|v| accessor.estimate_value_hits(*target, v))
                    .fold(0, usize::saturating_add),
            ),
            IndexProbe::Range { target, range } if ic.has_value_index(*target) => {
                IndexCost::hits(accessor.estimate_range_hits(*target, range))
            }
            IndexProbe::FullText { ft } => ft.index_cost(ic, usize::MAX),
            _ => IndexCost::UNUSABLE,
        }
    }

    /// Cache key identifying the lookup
    fn cache_key(&self) -> String {
        match self {
            IndexProbe::Value { target, values } => format!("value:{}:{}", target.name(), values.join("\u{1f}")),
            IndexProbe::Range { target, range } => format!("range:{}:{}", target.name(), range),
            IndexProbe::FullText { ft } => format!("ft:{:?}", ft),
        }
    }

    fn plan(&self, node: PlanNode) -> PlanNode {
        match self {
            IndexProbe::Value { target, values } => node
                .attr("type", "value")
                .attr("target", target.name())
                .attr("values", values.join(", ")),
            IndexProbe::Range { target, range } => node
                .attr("type", "range")
                .attr("target", target.name())
                .attr("range", range),
            IndexProbe::FullText { ft } => node.attr("type", "fulltext").child(ft.plan()),
        }
    }
}

/// Index lookup evaluated through the per-query probe cache
#[derive(Clone, Debug, PartialEq)]
pub struct IndexAccess {
    pub probe: IndexProbe,
    /// Attribute name the hits must carry
    pub name: Option<String>,
}

impl IndexAccess {
    pub fn new(probe: IndexProbe, name: Option<String>) -> Self {
        Self { probe, name }
    }

    fn lookup(&self, cx: &mut EvalContext<'_>) -> Result<RoaringBitmap> {
        let key = self.probe.cache_key();
        let accessor = cx.accessor();
        match &self.probe {
            IndexProbe::Value { target, values } => cx.probe(&key, || {
                let mut hits = RoaringBitmap::new();
                for value in values {
                    hits |= accessor.lookup_value(*target, value)?;
                }
                Ok(hits)
            }),
            IndexProbe::Range { target, range } => {
                cx.probe(&key, || accessor.lookup_numeric_range(*target, range))
            }
            IndexProbe::FullText { ft } => {
                let query = cx.query();
                let mut terms = 0;
                let hits = cx.probe(&key, || {
                    let mut inner = EvalContext::new(query);
                    let matches = ft.evaluate(&mut inner, &FtSource::Index)?;
                    terms = inner.stats.ft_terms;
                    Ok(matches.ids().iter().copied().collect())
                })?;
                cx.stats.ft_terms += terms;
                Ok(hits)
            }
        }
    }
}

impl ExprNode for IndexAccess {
    fn compile(self, _cx: &mut CompileContext<'_>) -> Result<Expr> {
        Ok(Expr::Index(self))
    }

    fn evaluate(&self, cx: &mut EvalContext<'_>) -> Result<Value> {
        cx.check_cancelled()?;
        let hits = self.lookup(cx)?;
        let nodes = match &self.name {
            Some(name) => {
                let accessor = cx.accessor();
                let ids = hits
                    .iter()
                    .filter(|&id| accessor.node_name(id) == Some(name.as_str()))
                    .collect();
                NodeSet::from_sorted(ids)
            }
            None => NodeSet::from_bitmap(&hits),
        };
        Ok(Value::Nodes(nodes))
    }

    fn uses(&self, _u: Use) -> bool {
        false
    }

    fn plan(&self) -> PlanNode {
        let mut node = self.probe.plan(PlanNode::new("IndexAccess"));
        if let Some(name) = &self.name {
            node = node.attr("name", name);
        }
        node
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetOp {
    Union,
    Intersect,
}

/// Union or intersection of node sets
#[derive(Clone, Debug, PartialEq)]
pub struct SetExpr {
    pub op: SetOp,
    pub operands: Vec<Expr>,
}

impl SetExpr {
    pub fn new(op: SetOp, operands: Vec<Expr>) -> Self {
        Self { op, operands }
    }
}

impl ExprNode for SetExpr {
    fn compile(self, cx: &mut CompileContext<'_>) -> Result<Expr> {
        let operands = self
            .operands
            .into_iter()
            .map(|op| op.compile(cx))
            .collect::<Result<Vec<_>>>()?;
        Ok(Expr::Set(SetExpr { op: self.op, operands }))
    }

    fn evaluate(&self, cx: &mut EvalContext<'_>) -> Result<Value> {
        let mut acc: Option<NodeSet> = None;
        for op in &self.operands {
            let nodes = match op.evaluate(cx)? {
                Value::Nodes(nodes) => nodes,
                Value::Empty => NodeSet::new(),
                other => {
                    return Err(ArborError::eval(
                        EvalFault::Type,
                        format!("set operand yields {}, nodes expected", other.type_name()),
                    ))
                }
            };
            acc = Some(match (acc, self.op) {
                (None, _) => nodes,
                (Some(prev), SetOp::Union) => prev.union(&nodes),
                (Some(prev), SetOp::Intersect) => prev.intersect(&nodes),
            });
            if self.op == SetOp::Intersect && acc.as_ref().map_or(false, NodeSet::is_empty) {
                break;
            }
        }
        Ok(Value::Nodes(acc.unwrap_or_default()))
    }

    fn uses(&self, u: Use) -> bool {
        self.operands.iter().any(|op| op.uses(u))
    }

    fn plan(&self) -> PlanNode {
        let name = match self.op {
            SetOp::Union => "Union",
            SetOp::Intersect => "Intersect",
        };
        PlanNode::new(name).children(self.operands.iter().map(Expr::plan))
    }
}
