//! Expression tree and the node contract
//!
//! Every variant of [`Expr`] wraps a node type implementing [`ExprNode`].
//! Compilation runs once, bottom-up: each node compiles its children, then
//! returns its own replacement, which may be a folded constant, a rewritten
//! combinator or an index access.

use crate::error::{ArborError, EvalFault};
use crate::query::context::{CompileContext, EvalContext};
use crate::query::explain::PlanNode;
use crate::query::nodes::{
    And, Calc, Cmp, FtContains, IndexAccess, Last, MultiCmp, Not, Or, Path, PosTest, Position,
    RangeCmp, SetExpr,
};
use crate::query::planner::IndexContext;
use crate::query::types::{IndexCost, NodeSet, Value};
use crate::Result;

/// Focus dependencies a node may have
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Use {
    /// Reads the context position
    Position,
    /// Reads the context size
    Size,
}

/// Contract shared by all expression nodes
pub trait ExprNode: Sized {
    /// Compile the node; children are compiled first
    fn compile(self, cx: &mut CompileContext<'_>) -> Result<Expr>;

    fn evaluate(&self, cx: &mut EvalContext<'_>) -> Result<Value>;

    /// Whether the node reads the given part of the focus
    fn uses(&self, u: Use) -> bool;

    fn plan(&self) -> PlanNode;

    /// Expected hits when the node is answered by an index, relative to the step in `ic`
    fn index_cost(&self, _ic: &IndexContext<'_>, _cap: usize) -> IndexCost {
        IndexCost::UNUSABLE
    }

    /// Index access returning the nodes of the step in `ic` that satisfy the node
    ///
    /// Only called after `index_cost` returned a usable estimate.
    fn index_equivalent(self, _ic: &IndexContext<'_>) -> Result<Expr> {
        Err(ArborError::Compile("expression has no index equivalent".to_string()))
    }

    /// Whether evaluation always yields a boolean
    fn returns_bool(&self) -> bool {
        false
    }
}

/// Expression tree
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Constant value
    Item(Value),
    /// The focus item
    ContextItem,
    Path(Path),
    Cmp(Cmp),
    Range(RangeCmp),
    Multi(MultiCmp),
    And(And),
    Or(Or),
    Not(Not),
    Pos(PosTest),
    Position(Position),
    Last(Last),
    Calc(Calc),
    Set(SetExpr),
    Index(IndexAccess),
    FtContains(FtContains),
}

macro_rules! dispatch {
    ($expr:expr, $node:ident => $body:expr, $item:pat => $item_body:expr, $ctx:pat => $ctx_body:expr) => {
        match $expr {
            $item => $item_body,
            $ctx => $ctx_body,
            Expr::Path($node) => $body,
            Expr::Cmp($node) => $body,
            Expr::Range($node) => $body,
            Expr::Multi($node) => $body,
            Expr::And($node) => $body,
            Expr::Or($node) => $body,
            Expr::Not($node) => $body,
            Expr::Pos($node) => $body,
            Expr::Position($node) => $body,
            Expr::Last($node) => $body,
            Expr::Calc($node) => $body,
            Expr::Set($node) => $body,
            Expr::Index($node) => $body,
            Expr::FtContains($node) => $body,
        }
    };
}

impl Expr {
    pub fn bool(b: bool) -> Expr {
        Expr::Item(Value::Bool(b))
    }

    pub fn num(n: f64) -> Expr {
        Expr::Item(Value::Num(n))
    }

    pub fn str(s: impl Into<String>) -> Expr {
        Expr::Item(Value::Str(s.into()))
    }

    pub fn empty() -> Expr {
        Expr::Item(Value::Empty)
    }

    pub fn is_item(&self) -> bool {
        matches!(self, Expr::Item(_))
    }

    pub fn as_item(&self) -> Option<&Value> {
        match self {
            Expr::Item(v) => Some(v),
            _ => None,
        }
    }

    /// Constant empty sequence or empty node set
    pub fn is_empty_item(&self) -> bool {
        self.as_item().map_or(false, Value::is_empty)
    }

    pub fn compile(self, cx: &mut CompileContext<'_>) -> Result<Expr> {
        cx.enter()?;
        let result = dispatch!(self,
            node => node.compile(cx),
            Expr::Item(v) => Ok(Expr::Item(v)),
            Expr::ContextItem => Ok(Expr::ContextItem));
        cx.leave();
        result
    }

    pub fn evaluate(&self, cx: &mut EvalContext<'_>) -> Result<Value> {
        cx.enter()?;
        let result = dispatch!(self,
            node => node.evaluate(cx),
            Expr::Item(v) => Ok(v.clone()),
            Expr::ContextItem => match cx.focus().item {
                Some(id) => Ok(Value::Nodes(NodeSet::single(id))),
                None => Err(ArborError::eval(EvalFault::NoContext, "no context item")),
            });
        cx.leave();
        result
    }

    pub fn uses(&self, u: Use) -> bool {
        dispatch!(self,
            node => node.uses(u),
            Expr::Item(_) => false,
            Expr::ContextItem => false)
    }

    pub fn plan(&self) -> PlanNode {
        dispatch!(self,
            node => node.plan(),
            Expr::Item(v) => PlanNode::new("Item").attr("value", v),
            Expr::ContextItem => PlanNode::new("ContextItem"))
    }

    pub fn index_cost(&self, ic: &IndexContext<'_>, cap: usize) -> IndexCost {
        dispatch!(self,
            node => node.index_cost(ic, cap),
            Expr::Item(_) => IndexCost::UNUSABLE,
            Expr::ContextItem => IndexCost::UNUSABLE)
    }

    pub fn index_equivalent(self, ic: &IndexContext<'_>) -> Result<Expr> {
        dispatch!(self,
            node => node.index_equivalent(ic),
            Expr::Item(_) => Err(ArborError::Compile("constant has no index equivalent".to_string())),
            Expr::ContextItem => Err(ArborError::Compile("context item has no index equivalent".to_string())))
    }

    pub fn returns_bool(&self) -> bool {
        dispatch!(self,
            node => node.returns_bool(),
            Expr::Item(v) => matches!(v, Value::Bool(_)),
            Expr::ContextItem => false)
    }

    /// Conservative structural equality; trees holding index accesses never compare equal
    pub fn same_as(&self, other: &Expr) -> bool {
        !self.has_index_access() && !other.has_index_access() && self == other
    }

    pub(crate) fn has_index_access(&self) -> bool {
        match self {
            Expr::Index(_) => true,
            Expr::Path(path) => path.has_index_access(),
            Expr::Set(set) => set.operands.iter().any(Expr::has_index_access),
            Expr::Cmp(cmp) => cmp.lhs.has_index_access() || cmp.rhs.has_index_access(),
            Expr::Range(range) => range.input.has_index_access(),
            Expr::Multi(multi) => multi.input.has_index_access(),
            Expr::And(and) => and.operands.iter().any(Expr::has_index_access),
            Expr::Or(or) => or.operands.iter().any(Expr::has_index_access),
            Expr::Not(not) => not.operand.has_index_access(),
            Expr::Calc(calc) => calc.lhs.has_index_access() || calc.rhs.has_index_access(),
            Expr::FtContains(ft) => ft.input.has_index_access(),
            Expr::Item(_) | Expr::ContextItem | Expr::Pos(_) | Expr::Position(_) | Expr::Last(_) => false,
        }
    }
}

macro_rules! impl_from_node {
    ($($node:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$node> for Expr {
                fn from(node: $node) -> Self {
                    Expr::$variant(node)
                }
            }
        )*
    };
}

impl_from_node!(
    Path => Path,
    Cmp => Cmp,
    RangeCmp => Range,
    MultiCmp => Multi,
    And => And,
    Or => Or,
    Not => Not,
    PosTest => Pos,
    Position => Position,
    Last => Last,
    Calc => Calc,
    SetExpr => Set,
    IndexAccess => Index,
    FtContains => FtContains,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::accessor::ValueTarget;
    use crate::query::nodes::{IndexProbe, Step};
    use crate::query::types::CmpOp;

    #[test]
    fn test_same_as_is_structural() {
        let a = Expr::from(Cmp::new(Path::relative(vec![Step::child("price")]), CmpOp::Gt, Expr::num(5.0)));
        let b = a.clone();
        assert!(a.same_as(&b));
        assert!(!a.same_as(&Expr::num(5.0)));
    }

    #[test]
    fn test_index_accesses_are_never_same() {
        let access = Expr::from(IndexAccess::new(
            IndexProbe::Value {
                target: ValueTarget::Text,
                values: vec!["x".to_string()],
            },
            None,
        ));
        assert!(!access.same_as(&access.clone()));
    }

    #[test]
    fn test_returns_bool() {
        assert!(Expr::bool(true).returns_bool());
        assert!(!Expr::num(1.0).returns_bool());
        assert!(Expr::from(PosTest::new(1, 2)).returns_bool());
    }
}
