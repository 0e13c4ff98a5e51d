//! Boolean connectives

use crate::query::ast::{Expr, ExprNode, Use};
use crate::query::context::{CompileContext, EvalContext};
use crate::query::explain::PlanNode;
use crate::query::nodes::{SetExpr, SetOp};
use crate::query::planner::{capped_sum, IndexContext};
use crate::query::rewrite;
use crate::query::types::{IndexCost, Value};
use crate::Result;

fn compile_all(operands: Vec<Expr>, cx: &mut CompileContext<'_>) -> Result<Vec<Expr>> {
    operands.into_iter().map(|op| op.compile(cx)).collect()
}

fn index_equivalents(operands: Vec<Expr>, ic: &IndexContext<'_>) -> Result<Vec<Expr>> {
    operands.into_iter().map(|op| op.index_equivalent(ic)).collect()
}

/// Conjunction
#[derive(Clone, Debug, PartialEq)]
pub struct And {
    pub operands: Vec<Expr>,
}

impl And {
    pub fn new(operands: Vec<Expr>) -> Self {
        Self { operands }
    }
}

impl ExprNode for And {
    fn compile(self, cx: &mut CompileContext<'_>) -> Result<Expr> {
        let operands = compile_all(self.operands, cx)?;
        rewrite::simplify_and(operands, cx)
    }

    fn evaluate(&self, cx: &mut EvalContext<'_>) -> Result<Value> {
        for op in &self.operands {
            if !op.evaluate(cx)?.truthy() {
                return Ok(Value::Bool(false));
            }
        }
        Ok(Value::Bool(true))
    }

    fn uses(&self, u: Use) -> bool {
        self.operands.iter().any(|op| op.uses(u))
    }

    fn plan(&self) -> PlanNode {
        PlanNode::new("And").children(self.operands.iter().map(Expr::plan))
    }

    fn index_cost(&self, ic: &IndexContext<'_>, cap: usize) -> IndexCost {
        capped_sum(self.operands.iter().map(|op| op.index_cost(ic, cap)), cap)
    }

    fn index_equivalent(self, ic: &IndexContext<'_>) -> Result<Expr> {
        Ok(Expr::Set(SetExpr::new(SetOp::Intersect, index_equivalents(self.operands, ic)?)))
    }

    fn returns_bool(&self) -> bool {
        true
    }
}

/// Disjunction
#[derive(Clone, Debug, PartialEq)]
pub struct Or {
    pub operands: Vec<Expr>,
}

impl Or {
    pub fn new(operands: Vec<Expr>) -> Self {
        Self { operands }
    }
}

impl ExprNode for Or {
    fn compile(self, cx: &mut CompileContext<'_>) -> Result<Expr> {
        let operands = compile_all(self.operands, cx)?;
        rewrite::simplify_or(operands, cx)
    }

    fn evaluate(&self, cx: &mut EvalContext<'_>) -> Result<Value> {
        for op in &self.operands {
            if op.evaluate(cx)?.truthy() {
                return Ok(Value::Bool(true));
            }
        }
        Ok(Value::Bool(false))
    }

    fn uses(&self, u: Use) -> bool {
        self.operands.iter().any(|op| op.uses(u))
    }

    fn plan(&self) -> PlanNode {
        PlanNode::new("Or").children(self.operands.iter().map(Expr::plan))
    }

    // the capped sum over-approximates the hits of a disjunction
    fn index_cost(&self, ic: &IndexContext<'_>, cap: usize) -> IndexCost {
        capped_sum(self.operands.iter().map(|op| op.index_cost(ic, cap)), cap)
    }

    fn index_equivalent(self, ic: &IndexContext<'_>) -> Result<Expr> {
        Ok(Expr::Set(SetExpr::new(SetOp::Union, index_equivalents(self.operands, ic)?)))
    }

    fn returns_bool(&self) -> bool {
        true
    }
}

/// Negation
#[derive(Clone, Debug, PartialEq)]
pub struct Not {
    pub operand: Box<Expr>,
}

impl Not {
    pub fn new(operand: impl Into<Expr>) -> Self {
        Self {
            operand: Box::new(operand.into()),
        }
    }
}

impl ExprNode for Not {
    fn compile(self, cx: &mut CompileContext<'_>) -> Result<Expr> {
        let operand = self.operand.compile(cx)?;
        if let Some(value) = operand.as_item() {
            return Ok(Expr::bool(!value.truthy()));
        }
        match operand {
            Expr::Not(inner) if inner.operand.returns_bool() => {
                cx.note("double negation removed");
                Ok(*inner.operand)
            }
            other => Ok(Expr::Not(Not {
                operand: Box::new(other),
            })),
        }
    }

    fn evaluate(&self, cx: &mut EvalContext<'_>) -> Result<Value> {
        Ok(Value::Bool(!self.operand.evaluate(cx)?.truthy()))
    }

    fn uses(&self, u: Use) -> bool {
        self.operand.uses(u)
    }

    fn plan(&self) -> PlanNode {
        PlanNode::new("Not").child(self.operand.plan())
    }

    fn returns_bool(&self) -> bool {
        true
    }
}
