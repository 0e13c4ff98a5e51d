//! Location paths

use crate::error::{ArborError, EvalFault};
use crate::query::accessor::IndexAccessor;
use crate::query::ast::{Expr, ExprNode, Use};
use crate::query::context::{CompileContext, EvalContext, Focus};
use crate::query::explain::PlanNode;
use crate::query::nodes::PosTest;
use crate::query::planner::IndexPlanner;
use crate::query::types::{Axis, NodeId, NodeKind, NodeSet, Test, Value};
use crate::Result;

/// Where a path starts
#[derive(Clone, Debug, PartialEq)]
pub enum PathRoot {
    /// The focus item
    Context,
    /// The document node
    Document,
    /// Nodes produced by an expression
    Expr(Box<Expr>),
}

/// One axis step with its predicates
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: Test,
    pub preds: Vec<Expr>,
}

impl Step {
    pub fn new(axis: Axis, test: Test) -> Self {
        Self {
            axis,
            test,
            preds: Vec::new(),
        }
    }

    pub fn child(name: impl Into<String>) -> Self {
        Self::new(Axis::Child, Test::name(name))
    }

    pub fn descendant(name: impl Into<String>) -> Self {
        Self::new(Axis::Descendant, Test::name(name))
    }

    pub fn attr(name: impl Into<String>) -> Self {
        Self::new(Axis::Attribute, Test::name(name))
    }

    /// `child::text()`
    pub fn text() -> Self {
        Self::new(Axis::Child, Test::Text)
    }

    /// `self::node()`
    pub fn node() -> Self {
        Self::new(Axis::SelfAxis, Test::Node)
    }

    /// `descendant-or-self::node()`
    pub fn anywhere() -> Self {
        Self::new(Axis::DescendantOrSelf, Test::Node)
    }

    pub fn pred(mut self, pred: impl Into<Expr>) -> Self {
        self.preds.push(pred.into());
        self
    }

    fn uses_focus(&self) -> bool {
        self.preds.iter().any(|p| p.uses(Use::Position) || p.uses(Use::Size))
    }

    /// A predicate yielding a number at runtime acts as a position test
    fn may_test_position(&self) -> bool {
        self.preds.iter().any(|p| {
            !p.returns_bool() && !matches!(p, Expr::Path(_) | Expr::Index(_) | Expr::Set(_))
        })
    }

    /// Step cannot produce nodes after `prev`
    fn unreachable_after(&self, prev: &Step) -> bool {
        let leaf = prev.axis == Axis::Attribute || prev.test == Test::Text;
        if leaf && matches!(self.axis, Axis::Child | Axis::Descendant | Axis::Attribute) {
            return true;
        }
        match (&self.test, &prev.test) {
            (Test::Name(a), Test::Name(b)) => self.axis == Axis::SelfAxis && a != b,
            _ => false,
        }
    }

    fn plan(&self) -> PlanNode {
        PlanNode::new("Step")
            .attr("axis", self.axis.name())
            .attr("test", &self.test)
            .children(self.preds.iter().map(Expr::plan))
    }
}

/// Sequence of steps applied to a start set
#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    pub root: PathRoot,
    pub steps: Vec<Step>,
}

impl Path {
    /// Path starting at the document node
    pub fn absolute(steps: Vec<Step>) -> Self {
        Self {
            root: PathRoot::Document,
            steps,
        }
    }

    /// Path starting at the focus item
    pub fn relative(steps: Vec<Step>) -> Self {
        Self {
            root: PathRoot::Context,
            steps,
        }
    }

    pub fn from_expr(root: impl Into<Expr>, steps: Vec<Step>) -> Self {
        Self {
            root: PathRoot::Expr(Box::new(root.into())),
            steps,
        }
    }

    pub(crate) fn has_index_access(&self) -> bool {
        let root = match &self.root {
            PathRoot::Expr(expr) => expr.has_index_access(),
            _ => false,
        };
        root || self.steps.iter().flat_map(|s| &s.preds).any(Expr::has_index_access)
    }

    /// Compile predicates; `None` when a predicate can never hold
    fn compile_preds(preds: Vec<Expr>, cx: &mut CompileContext<'_>) -> Result<Option<Vec<Expr>>> {
        let mut out = Vec::with_capacity(preds.len());
        for pred in preds {
            match pred.compile(cx)? {
                Expr::Item(Value::Num(n)) => {
                    if n.fract() != 0.0 || n < 1.0 {
                        cx.note(format!("positional predicate [{}] never matches", n));
                        return Ok(None);
                    }
                    match PosTest::new(n as usize, n as usize).into_expr() {
                        Expr::Item(_) => return Ok(None),
                        test => out.push(test),
                    }
                }
                Expr::Item(v) => {
                    if !v.truthy() {
                        cx.note("predicate is always false");
                        return Ok(None);
                    }
                    cx.note("predicate is always true: removed");
                }
                other => out.push(other),
            }
        }
        Ok(Some(out))
    }

    /// `descendant-or-self::node()/child::x` becomes `descendant::x`
    fn merge_descendant_steps(steps: Vec<Step>, cx: &mut CompileContext<'_>) -> Vec<Step> {
        let mut out: Vec<Step> = Vec::with_capacity(steps.len());
        for step in steps {
            let mergeable = step.axis == Axis::Child && !step.uses_focus() && !step.may_test_position();
            match out.last_mut() {
                Some(prev)
                    if mergeable
                        && prev.axis == Axis::DescendantOrSelf
                        && prev.test == Test::Node
                        && prev.preds.is_empty() =>
                {
                    *prev = Step {
                        axis: Axis::Descendant,
                        ..step
                    };
                    cx.note("merged descendant-or-self::node() into descendant step");
                }
                _ => out.push(step),
            }
        }
        out
    }

    fn check_reachable(steps: &[Step]) -> Result<()> {
        for pair in steps.windows(2) {
            if pair[1].unreachable_after(&pair[0]) {
                return Err(ArborError::Compile(format!(
                    "step {}::{} never yields nodes after {}::{}",
                    pair[1].axis.name(),
                    pair[1].test,
                    pair[0].axis.name(),
                    pair[0].test
                )));
            }
        }
        Ok(())
    }

    fn start(&self, cx: &mut EvalContext<'_>) -> Result<Option<NodeSet>> {
        match &self.root {
            PathRoot::Context => match cx.focus().item {
                Some(id) => Ok(Some(NodeSet::single(id))),
                None => Err(ArborError::eval(EvalFault::NoContext, "path needs a context node")),
            },
            PathRoot::Document => Ok(Some(NodeSet::single(cx.accessor().root()))),
            PathRoot::Expr(expr) => match expr.evaluate(cx)? {
                Value::Nodes(nodes) => Ok(Some(nodes)),
                Value::Empty => Ok(None),
                other => Err(ArborError::eval(
                    EvalFault::Type,
                    format!("path root yields {}, nodes expected", other.type_name()),
                )),
            },
        }
    }

    fn eval_step(step: &Step, input: &NodeSet, cx: &mut EvalContext<'_>) -> Result<NodeSet> {
        let accessor = cx.accessor();
        let principal = if step.axis == Axis::Attribute {
            NodeKind::Attribute
        } else {
            NodeKind::Element
        };

        let mut result = Vec::new();
        let mut axis_nodes = Vec::new();
        for &id in input.ids() {
            axis_nodes.clear();
            walk_axis(accessor, id, step.axis, &mut axis_nodes)?;
            cx.stats.nodes_visited += axis_nodes.len() as u64;

            let mut matched = Vec::with_capacity(axis_nodes.len());
            for &node in &axis_nodes {
                let kind = accessor.node_kind(node)?;
                if step.test.matches(kind, accessor.node_name(node), principal) {
                    matched.push(node);
                }
            }
            for pred in &step.preds {
                if matched.is_empty() {
                    break;
                }
                matched = apply_pred(pred, matched, cx)?;
            }
            result.extend(matched);
        }
        Ok(NodeSet::from_unsorted(result))
    }
}

/// Nodes on an axis in axis order; reverse axes start next to `id`
fn walk_axis(accessor: &dyn IndexAccessor, id: NodeId, axis: Axis, out: &mut Vec<NodeId>) -> Result<()> {
    match axis {
        Axis::Child => out.extend_from_slice(accessor.children(id)),
        Axis::Attribute => out.extend_from_slice(accessor.attributes(id)),
        Axis::SelfAxis => out.push(id),
        Axis::Descendant | Axis::DescendantOrSelf => {
            if axis == Axis::DescendantOrSelf {
                out.push(id);
            }
            let mut stack: Vec<NodeId> = accessor.children(id).iter().rev().copied().collect();
            while let Some(node) = stack.pop() {
                out.push(node);
                stack.extend(accessor.children(node).iter().rev());
            }
        }
        Axis::Parent => out.extend(accessor.node_parent(id)),
        Axis::Ancestor | Axis::AncestorOrSelf => {
            if axis == Axis::AncestorOrSelf {
                out.push(id);
            }
            let mut current = accessor.node_parent(id);
            while let Some(node) = current {
                out.push(node);
                current = accessor.node_parent(node);
            }
        }
    }
    Ok(())
}

/// Filter nodes by a predicate evaluated with each node as focus
fn apply_pred(pred: &Expr, nodes: Vec<NodeId>, cx: &mut EvalContext<'_>) -> Result<Vec<NodeId>> {
    if let Expr::Pos(test) = pred {
        return Ok(test.slice(nodes));
    }

    let size = nodes.len();
    let mut kept = Vec::with_capacity(size);
    for (i, &id) in nodes.iter().enumerate() {
        let focus = Focus {
            item: Some(id),
            pos: i + 1,
            size,
        };
        let value = cx.with_focus(focus, |cx| pred.evaluate(cx))?;
        let keep = match value {
            Value::Num(n) => n == (i + 1) as f64,
            other => other.truthy(),
        };
        if keep {
            kept.push(id);
        }
    }
    Ok(kept)
}

impl ExprNode for Path {
    fn compile(self, cx: &mut CompileContext<'_>) -> Result<Expr> {
        let root = match self.root {
            PathRoot::Expr(expr) => match expr.compile(cx)? {
                e if e.is_empty_item() => return Ok(Expr::empty()),
                e => PathRoot::Expr(Box::new(e)),
            },
            other => other,
        };

        let mut steps = Vec::with_capacity(self.steps.len());
        for step in self.steps {
            match Self::compile_preds(step.preds, cx)? {
                Some(preds) => steps.push(Step { preds, ..step }),
                None => return Ok(Expr::empty()),
            }
        }

        let steps = Self::merge_descendant_steps(steps, cx);
        Self::check_reachable(&steps)?;

        if steps.is_empty() {
            return Ok(match root {
                PathRoot::Expr(expr) => *expr,
                PathRoot::Context => Expr::ContextItem,
                PathRoot::Document => Expr::Path(Path::absolute(Vec::new())),
            });
        }

        IndexPlanner::rewrite_path(Path { root, steps }, cx)
    }

    fn evaluate(&self, cx: &mut EvalContext<'_>) -> Result<Value> {
        let mut current = match self.start(cx)? {
            Some(nodes) => nodes,
            None => return Ok(Value::Empty),
        };
        for step in &self.steps {
            cx.check_cancelled()?;
            if current.is_empty() {
                break;
            }
            current = Self::eval_step(step, &current, cx)?;
        }
        Ok(Value::Nodes(current))
    }

    fn uses(&self, u: Use) -> bool {
        match &self.root {
            PathRoot::Expr(expr) => expr.uses(u),
            _ => false,
        }
    }

    fn plan(&self) -> PlanNode {
        let mut node = PlanNode::new("Path");
        node = match &self.root {
            PathRoot::Context => node.attr("root", "context"),
            PathRoot::Document => node.attr("root", "document"),
            PathRoot::Expr(expr) => node.child(expr.plan()),
        };
        node.children(self.steps.iter().map(Step::plan))
    }
}
