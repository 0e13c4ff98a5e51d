//! General comparisons, numeric ranges and multi-value membership

use crate::error::ArborError;
use crate::query::accessor::NumRange;
use crate::query::ast::{Expr, ExprNode, Use};
use crate::query::context::{CompileContext, EvalContext};
use crate::query::explain::PlanNode;
use crate::query::nodes::{IndexAccess, IndexProbe, PosTest};
use crate::query::planner::{capped_sum, index_target, reanchor, IndexContext};
use crate::query::types::{Atom, CmpOp, IndexCost, Value};
use crate::Result;

/// Range satisfied by `x op n`; `None` for `!=`
pub fn bound_range(op: CmpOp, n: f64) -> Option<NumRange> {
    let open = NumRange::unbounded();
    match op {
        CmpOp::Eq => Some(NumRange::closed(n, n)),
        CmpOp::Ne => None,
        CmpOp::Lt => Some(open.with_max(n, false)),
        CmpOp::Le => Some(open.with_max(n, true)),
        CmpOp::Gt => Some(open.with_min(n, false)),
        CmpOp::Ge => Some(open.with_min(n, true)),
    }
}

/// `position() op n` as a position test
fn position_test(op: CmpOp, n: f64) -> Option<PosTest> {
    let none = PosTest::new(1, 0);
    if n.is_nan() {
        return (op != CmpOp::Ne).then_some(none);
    }
    Some(match op {
        CmpOp::Eq if n.fract() == 0.0 && n >= 1.0 => PosTest::new(n as usize, n as usize),
        CmpOp::Eq => none,
        CmpOp::Ne => return None,
        CmpOp::Lt => PosTest::new(1, (n.ceil() - 1.0) as usize),
        CmpOp::Le => PosTest::new(1, n.floor() as usize),
        CmpOp::Gt => PosTest::starting_at((n.floor() + 1.0) as usize),
        CmpOp::Ge => PosTest::starting_at(n.ceil() as usize),
    })
}

fn any_match(left: &[Atom], op: CmpOp, right: &Atom) -> bool {
    left.iter().any(|a| a.compare(op, right))
}

/// Existential comparison of two operands
#[derive(Clone, Debug, PartialEq)]
pub struct Cmp {
    pub lhs: Box<Expr>,
    pub op: CmpOp,
    pub rhs: Box<Expr>,
}

impl Cmp {
    pub fn new(lhs: impl Into<Expr>, op: CmpOp, rhs: impl Into<Expr>) -> Self {
        Self {
            lhs: Box::new(lhs.into()),
            op,
            rhs: Box::new(rhs.into()),
        }
    }

    /// Constant right operand
    pub fn constant(&self) -> Option<&Value> {
        self.rhs.as_item()
    }

    fn probe(&self) -> Option<IndexProbe> {
        let (target, _) = index_target(&self.lhs)?;
        match (self.op, self.constant()?) {
            (CmpOp::Eq, Value::Str(s)) => Some(IndexProbe::Value {
                target,
                values: vec![s.clone()],
            }),
            (op, Value::Num(n)) if !n.is_nan() => Some(IndexProbe::Range {
                target,
                range: bound_range(op, *n)?,
            }),
            _ => None,
        }
    }
}

impl ExprNode for Cmp {
    fn compile(self, cx: &mut CompileContext<'_>) -> Result<Expr> {
        let lhs = self.lhs.compile(cx)?;
        let rhs = self.rhs.compile(cx)?;
        if lhs.is_empty_item() || rhs.is_empty_item() {
            cx.note("comparison with empty operand is false");
            return Ok(Expr::bool(false));
        }

        if let (Some(l), Some(r)) = (lhs.as_item(), rhs.as_item()) {
            if let (Some(a), Some(b)) = (l.as_atom(), r.as_atom()) {
                return Ok(Expr::bool(a.compare(self.op, &b)));
            }
        }

        let (lhs, op, rhs) = if lhs.is_item() && !rhs.is_item() {
            cx.note("comparison operands swapped");
            (rhs, self.op.swap(), lhs)
        } else {
            (lhs, self.op, rhs)
        };

        if let (Expr::Position(_), Some(Value::Num(n))) = (&lhs, rhs.as_item()) {
            if let Some(test) = position_test(op, *n) {
                cx.note(format!("position() {} {} rewritten to position test", op.symbol(), n));
                return Ok(test.into_expr());
            }
        }

        Ok(Expr::Cmp(Cmp {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
        }))
    }

    fn evaluate(&self, cx: &mut EvalContext<'_>) -> Result<Value> {
        let left = self.lhs.evaluate(cx)?;
        if left.is_empty() {
            return Ok(Value::Bool(false));
        }
        let right = self.rhs.evaluate(cx)?;
        let left = cx.atomize(&left)?;
        let right = cx.atomize(&right)?;
        Ok(Value::Bool(right.iter().any(|b| any_match(&left, self.op, b))))
    }

    fn uses(&self, u: Use) -> bool {
        self.lhs.uses(u) || self.rhs.uses(u)
    }

    fn plan(&self) -> PlanNode {
        PlanNode::new("Cmp")
            .attr("op", self.op.symbol())
            .child(self.lhs.plan())
            .child(self.rhs.plan())
    }

    fn index_cost(&self, ic: &IndexContext<'_>, _cap: usize) -> IndexCost {
        let probe = match self.probe() {
            Some(probe) => probe,
            None => return IndexCost::UNUSABLE,
        };
        probe.cost(ic)
    }

    fn index_equivalent(self, ic: &IndexContext<'_>) -> Result<Expr> {
        let name = index_target(&self.lhs).and_then(|(_, name)| name);
        let probe = self.probe().ok_or_else(|| {
            ArborError::Compile(format!("comparison {} is not index-servable", self.op.symbol()))
        })?;
        let access = Expr::Index(IndexAccess::new(probe, name));
        Ok(reanchor(access, &self.lhs, ic))
    }

    fn returns_bool(&self) -> bool {
        true
    }
}

/// Input value inside a numeric range
#[derive(Clone, Debug, PartialEq)]
pub struct RangeCmp {
    pub input: Box<Expr>,
    pub range: NumRange,
}

impl RangeCmp {
    pub fn new(input: impl Into<Expr>, range: NumRange) -> Self {
        Self {
            input: Box::new(input.into()),
            range,
        }
    }
}

impl ExprNode for RangeCmp {
    fn compile(self, cx: &mut CompileContext<'_>) -> Result<Expr> {
        let input = self.input.compile(cx)?;
        if self.range.is_empty() || input.is_empty_item() {
            cx.note(format!("range {} never matches", self.range));
            return Ok(Expr::bool(false));
        }
        if let Some(atom) = input.as_item().and_then(Value::as_atom) {
            return Ok(Expr::bool(self.range.contains(atom.to_num())));
        }
        Ok(Expr::Range(RangeCmp {
            input: Box::new(input),
            range: self.range,
        }))
    }

    fn evaluate(&self, cx: &mut EvalContext<'_>) -> Result<Value> {
        let value = self.input.evaluate(cx)?;
        let atoms = cx.atomize(&value)?;
        Ok(Value::Bool(atoms.iter().any(|a| self.range.contains(a.to_num()))))
    }

    fn uses(&self, u: Use) -> bool {
        self.input.uses(u)
    }

    fn plan(&self) -> PlanNode {
        PlanNode::new("Range")
            .attr("range", self.range)
            .child(self.input.plan())
    }

    fn index_cost(&self, ic: &IndexContext<'_>, _cap: usize) -> IndexCost {
        match index_target(&self.input) {
            Some((target, _)) => IndexProbe::Range {
                target,
                range: self.range,
            }
            .cost(ic),
            None => IndexCost::UNUSABLE,
        }
    }

    fn index_equivalent(self, ic: &IndexContext<'_>) -> Result<Expr> {
        let (target, name) = index_target(&self.input)
            .ok_or_else(|| ArborError::Compile("range input is not index-servable".to_string()))?;
        let access = Expr::Index(IndexAccess::new(
            IndexProbe::Range {
                target,
                range: self.range,
            },
            name,
        ));
        Ok(reanchor(access, &self.input, ic))
    }

    fn returns_bool(&self) -> bool {
        true
    }
}

/// How the values of a membership test combine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MultiMode {
    /// Every value must compare
    AllOf,
    /// One value must compare
    OneOf,
}

/// Comparison of one input against several constants
#[derive(Clone, Debug, PartialEq)]
pub struct MultiCmp {
    pub input: Box<Expr>,
    pub op: CmpOp,
    pub values: Vec<Atom>,
    pub mode: MultiMode,
}

impl MultiCmp {
    pub fn new(input: impl Into<Expr>, op: CmpOp, values: Vec<Atom>, mode: MultiMode) -> Self {
        Self {
            input: Box::new(input.into()),
            op,
            values,
            mode,
        }
    }

    fn holds(&self, atoms: &[Atom]) -> bool {
        match self.mode {
            MultiMode::AllOf => self.values.iter().all(|v| any_match(atoms, self.op, v)),
            MultiMode::OneOf => self.values.iter().any(|v| any_match(atoms, self.op, v)),
        }
    }

    fn string_values(&self) -> Option<Vec<String>> {
        if self.mode != MultiMode::OneOf || self.op != CmpOp::Eq {
            return None;
        }
        self.values
            .iter()
            .map(|v| match v {
                Atom::Str(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ExprNode for MultiCmp {
    fn compile(self, cx: &mut CompileContext<'_>) -> Result<Expr> {
        let MultiCmp { input, op, values, mode } = self;
        let input = input.compile(cx)?;
        if input.is_empty_item() {
            return Ok(Expr::bool(false));
        }
        let multi = MultiCmp {
            input: Box::new(input),
            op,
            values,
            mode,
        };
        if let Some(atom) = multi.input.as_item().and_then(Value::as_atom) {
            return Ok(Expr::bool(multi.holds(std::slice::from_ref(&atom))));
        }
        Ok(Expr::Multi(multi))
    }

    fn evaluate(&self, cx: &mut EvalContext<'_>) -> Result<Value> {
        let value = self.input.evaluate(cx)?;
        let atoms = cx.atomize(&value)?;
        Ok(Value::Bool(self.holds(&atoms)))
    }

    fn uses(&self, u: Use) -> bool {
        self.input.uses(u)
    }

    fn plan(&self) -> PlanNode {
        let mode = match self.mode {
            MultiMode::AllOf => "all",
            MultiMode::OneOf => "any",
        };
        let values: Vec<String> = self.values.iter().map(ToString::to_string).collect();
        PlanNode::new("Multi")
            .attr("op", self.op.symbol())
            .attr("mode", mode)
            .attr("values", values.join(", "))
            .child(self.input.plan())
    }

    fn index_cost(&self, ic: &IndexContext<'_>, cap: usize) -> IndexCost {
        let (target, _) = match index_target(&self.input) {
            Some(found) => found,
            None => return IndexCost::UNUSABLE,
        };
        let values = match self.string_values() {
            Some(values) if ic.has_value_index(target) => values,
            _ => return IndexCost::UNUSABLE,
        };
        let accessor = ic.accessor();
        capped_sum(
            values.iter().map(|v| IndexCost::hits(accessor.estimate_value_hits(target, v))),
            cap,
        )
    }

    fn index_equivalent(self, ic: &IndexContext<'_>) -> Result<Expr> {
        let (target, name) = index_target(&self.input)
            .ok_or_else(|| ArborError::Compile("membership input is not index-servable".to_string()))?;
        let values = self
            .string_values()
            .ok_or_else(|| ArborError::Compile("membership test is not index-servable".to_string()))?;
        let access = Expr::Index(IndexAccess::new(IndexProbe::Value { target, values }, name));
        Ok(reanchor(access, &self.input, ic))
    }

    fn returns_bool(&self) -> bool {
        true
    }
}
