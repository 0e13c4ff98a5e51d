//! Position tests and focus functions

use crate::error::{ArborError, EvalFault};
use crate::query::ast::{Expr, ExprNode, Use};
use crate::query::context::{CompileContext, EvalContext};
use crate::query::explain::PlanNode;
use crate::query::types::{NodeId, Value};
use crate::Result;

/// Context position inside `[min, max]`, 1-based
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PosTest {
    pub min: usize,
    pub max: usize,
}

impl PosTest {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min: min.max(1), max }
    }

    /// Positions from `min` on
    pub fn starting_at(min: usize) -> Self {
        Self::new(min, usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Test holding for every position
    pub fn is_all(&self) -> bool {
        self.min <= 1 && self.max == usize::MAX
    }

    pub fn intersect(&self, other: &PosTest) -> PosTest {
        PosTest {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        }
    }

    /// Union if the ranges overlap or touch
    pub fn union(&self, other: &PosTest) -> Option<PosTest> {
        let touching = self.min <= other.max.saturating_add(1) && other.min <= self.max.saturating_add(1);
        touching.then(|| PosTest {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        })
    }

    /// Constant when the test never or always holds
    pub fn into_expr(self) -> Expr {
        if self.is_empty() {
            Expr::bool(false)
        } else if self.is_all() {
            Expr::bool(true)
        } else {
            Expr::Pos(self)
        }
    }

    pub fn holds(&self, pos: usize) -> bool {
        pos >= self.min && pos <= self.max
    }

    /// Keep the nodes at matching positions
    pub fn slice(&self, mut nodes: Vec<NodeId>) -> Vec<NodeId> {
        if self.is_empty() || self.min > nodes.len() {
            return Vec::new();
        }
        nodes.truncate(self.max.min(nodes.len()));
        nodes.split_off(self.min - 1)
    }
}

fn focus_position(cx: &EvalContext<'_>) -> Result<usize> {
    let pos = cx.focus().pos;
    if pos == 0 {
        return Err(ArborError::eval(EvalFault::Position, "no context position"));
    }
    Ok(pos)
}

impl ExprNode for PosTest {
    fn compile(self, _cx: &mut CompileContext<'_>) -> Result<Expr> {
        Ok(self.into_expr())
    }

    fn evaluate(&self, cx: &mut EvalContext<'_>) -> Result<Value> {
        Ok(Value::Bool(self.holds(focus_position(cx)?)))
    }

    fn uses(&self, u: Use) -> bool {
        u == Use::Position
    }

    fn plan(&self) -> PlanNode {
        let max = if self.max == usize::MAX {
            "last".to_string()
        } else {
            self.max.to_string()
        };
        PlanNode::new("Pos").attr("min", self.min).attr("max", max)
    }

    fn returns_bool(&self) -> bool {
        true
    }
}

/// `position()`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position;

impl ExprNode for Position {
    fn compile(self, _cx: &mut CompileContext<'_>) -> Result<Expr> {
        Ok(Expr::Position(self))
    }

    fn evaluate(&self, cx: &mut EvalContext<'_>) -> Result<Value> {
        Ok(Value::Num(focus_position(cx)? as f64))
    }

    fn uses(&self, u: Use) -> bool {
        u == Use::Position
    }

    fn plan(&self) -> PlanNode {
        PlanNode::new("Position")
    }
}

/// `last()`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Last;

impl ExprNode for Last {
    fn compile(self, _cx: &mut CompileContext<'_>) -> Result<Expr> {
        Ok(Expr::Last(self))
    }

    fn evaluate(&self, cx: &mut EvalContext<'_>) -> Result<Value> {
        focus_position(cx)?;
        Ok(Value::Num(cx.focus().size as f64))
    }

    fn uses(&self, u: Use) -> bool {
        u == Use::Size
    }

    fn plan(&self) -> PlanNode {
        PlanNode::new("Last")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::context::{Focus, QueryContext};
    use crate::store::DocumentBuilder;
    use std::sync::Arc;

    #[test]
    fn test_intersect_and_union() {
        let a = PosTest::new(2, 5);
        let b = PosTest::new(4, 9);
        assert_eq!(a.intersect(&b), PosTest::new(4, 5));
        assert_eq!(a.union(&b), Some(PosTest::new(2, 9)));
        assert_eq!(PosTest::new(1, 2).union(&PosTest::new(3, 3)), Some(PosTest::new(1, 3)));
        assert_eq!(PosTest::new(1, 2).union(&PosTest::new(4, 4)), None);
        assert!(PosTest::new(5, 6).intersect(&PosTest::new(1, 2)).is_empty());
    }

    #[test]
    fn test_into_expr_folds() {
        assert_eq!(PosTest::new(3, 2).into_expr(), Expr::bool(false));
        assert_eq!(PosTest::starting_at(1).into_expr(), Expr::bool(true));
        assert!(matches!(PosTest::new(2, 2).into_expr(), Expr::Pos(_)));
    }

    #[test]
    fn test_slice() {
        let nodes = vec![10, 11, 12, 13];
        assert_eq!(PosTest::new(2, 3).slice(nodes.clone()), vec![11, 12]);
        assert_eq!(PosTest::starting_at(3).slice(nodes.clone()), vec![12, 13]);
        assert!(PosTest::new(5, 5).slice(nodes).is_empty());
    }

    #[test]
    fn test_position_without_focus_is_fault() {
        let store = DocumentBuilder::new().build().unwrap();
        let query = QueryContext::new(Arc::new(store));
        let mut cx = EvalContext::new(&query);
        let err = Expr::Position(Position).evaluate(&mut cx).unwrap_err();
        assert_eq!(err.fault(), Some(EvalFault::Position));

        let focus = Focus {
            item: Some(0),
            pos: 2,
            size: 4,
        };
        let value = cx.with_focus(focus, |cx| Expr::Last(Last).evaluate(cx)).unwrap();
        assert_eq!(value, Value::Num(4.0));
    }
}
