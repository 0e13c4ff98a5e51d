//! Arithmetic

use crate::error::{ArborError, EvalFault};
use crate::query::ast::{Expr, ExprNode, Use};
use crate::query::context::{CompileContext, EvalContext};
use crate::query::explain::PlanNode;
use crate::query::types::{Atom, Value};
use crate::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalcOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl CalcOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CalcOp::Add => "+",
            CalcOp::Sub => "-",
            CalcOp::Mul => "*",
            CalcOp::Div => "div",
            CalcOp::Mod => "mod",
        }
    }

    fn apply(self, a: f64, b: f64) -> Result<f64> {
        if matches!(self, CalcOp::Div | CalcOp::Mod) && b == 0.0 {
            return Err(ArborError::eval(
                EvalFault::Arithmetic,
                format!("{} {} 0", a, self.symbol()),
            ));
        }
        Ok(match self {
            CalcOp::Add => a + b,
            CalcOp::Sub => a - b,
            CalcOp::Mul => a * b,
            CalcOp::Div => a / b,
            CalcOp::Mod => a % b,
        })
    }
}

/// Binary arithmetic over single numeric operands
#[derive(Clone, Debug, PartialEq)]
pub struct Calc {
    pub lhs: Box<Expr>,
    pub op: CalcOp,
    pub rhs: Box<Expr>,
}

impl Calc {
    pub fn new(lhs: impl Into<Expr>, op: CalcOp, rhs: impl Into<Expr>) -> Self {
        Self {
            lhs: Box::new(lhs.into()),
            op,
            rhs: Box::new(rhs.into()),
        }
    }
}

/// Numeric value of an operand; `None` for the empty sequence
fn operand(atoms: Vec<Atom>) -> Result<Option<f64>> {
    let mut atoms = atoms.into_iter();
    let atom = match (atoms.next(), atoms.next()) {
        (None, _) => return Ok(None),
        (Some(atom), None) => atom,
        (Some(_), Some(_)) => {
            return Err(ArborError::eval(EvalFault::Type, "arithmetic operand is a sequence"));
        }
    };
    let n = atom.to_num();
    if n.is_nan() && !matches!(atom, Atom::Num(_)) {
        return Err(ArborError::eval(
            EvalFault::Type,
            format!("{} is not a number", atom),
        ));
    }
    Ok(Some(n))
}

impl ExprNode for Calc {
    fn compile(self, cx: &mut CompileContext<'_>) -> Result<Expr> {
        let lhs = self.lhs.compile(cx)?;
        let rhs = self.rhs.compile(cx)?;
        if lhs.is_empty_item() || rhs.is_empty_item() {
            return Ok(Expr::empty());
        }
        let calc = Calc {
            lhs: Box::new(lhs),
            op: self.op,
            rhs: Box::new(rhs),
        };
        if calc.lhs.is_item() && calc.rhs.is_item() {
            // constant operands; faults surface at compile time
            let query = cx.query();
            let value = calc.evaluate(&mut EvalContext::new(query))?;
            return Ok(Expr::Item(value));
        }
        Ok(Expr::Calc(calc))
    }

    fn evaluate(&self, cx: &mut EvalContext<'_>) -> Result<Value> {
        let left = self.lhs.evaluate(cx)?;
        let right = self.rhs.evaluate(cx)?;
        let a = operand(cx.atomize(&left)?)?;
        let b = operand(cx.atomize(&right)?)?;
        match (a, b) {
            (Some(a), Some(b)) => Ok(Value::Num(self.op.apply(a, b)?)),
            _ => Ok(Value::Empty),
        }
    }

    fn uses(&self, u: Use) -> bool {
        self.lhs.uses(u) || self.rhs.uses(u)
    }

    fn plan(&self) -> PlanNode {
        PlanNode::new("Calc")
            .attr("op", self.op.symbol())
            .child(self.lhs.plan())
            .child(self.rhs.plan())
    }
}
