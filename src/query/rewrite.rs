//! Boolean rewrites applied when conjunctions and disjunctions compile
//!
//! Operands are scanned once from left to right. A new operand is merged into
//! the first earlier operand it combines with; the merged node takes the place
//! of the earlier one and the new operand is dropped.

use crate::query::accessor::NumRange;
use crate::query::ast::Expr;
use crate::query::context::CompileContext;
use crate::query::nodes::{bound_range, And, Cmp, MultiCmp, MultiMode, Or, RangeCmp};
use crate::query::types::{Atom, CmpOp, Value};
use crate::Result;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Conn {
    And,
    Or,
}

impl Conn {
    /// Constant that decides the whole connective
    fn absorbing(self) -> bool {
        self == Conn::Or
    }

    fn name(self) -> &'static str {
        match self {
            Conn::And => "and",
            Conn::Or => "or",
        }
    }
}

pub fn simplify_and(operands: Vec<Expr>, cx: &mut CompileContext<'_>) -> Result<Expr> {
    simplify(Conn::And, operands, cx)
}

pub fn simplify_or(operands: Vec<Expr>, cx: &mut CompileContext<'_>) -> Result<Expr> {
    simplify(Conn::Or, operands, cx)
}

fn simplify(conn: Conn, operands: Vec<Expr>, cx: &mut CompileContext<'_>) -> Result<Expr> {
    let mut flat = Vec::with_capacity(operands.len());
    for op in operands {
        match (conn, op) {
            (Conn::And, Expr::And(inner)) => flat.extend(inner.operands),
            (Conn::Or, Expr::Or(inner)) => flat.extend(inner.operands),
            (_, other) => flat.push(other),
        }
    }

    let mut kept: Vec<Expr> = Vec::with_capacity(flat.len());
    for op in flat {
        if let Some(value) = op.as_item() {
            if value.truthy() == conn.absorbing() {
                cx.note(format!("{} decided by constant operand", conn.name()));
                return Ok(Expr::bool(conn.absorbing()));
            }
            continue;
        }

        let merged = kept
            .iter()
            .enumerate()
            .find_map(|(i, prev)| merge(conn, prev, &op).map(|m| (i, m)));
        match merged {
            Some((_, Expr::Item(Value::Bool(b)))) if b == conn.absorbing() => {
                cx.note(format!("{} operands merged into a constant", conn.name()));
                return Ok(Expr::bool(b));
            }
            Some((i, merged)) => {
                cx.note(format!("{} operands merged", conn.name()));
                kept[i] = merged;
            }
            None => kept.push(op),
        }
    }

    Ok(match kept.len() {
        0 => Expr::bool(!conn.absorbing()),
        1 if kept[0].returns_bool() => kept.remove(0),
        _ => match conn {
            Conn::And => Expr::And(And::new(kept)),
            Conn::Or => Expr::Or(Or::new(kept)),
        },
    })
}

fn merge(conn: Conn, prev: &Expr, next: &Expr) -> Option<Expr> {
    match conn {
        Conn::And => merge_and(prev, next),
        Conn::Or => merge_or(prev, next),
    }
}

/// Comparison of a path with a constant atom
fn constant_cmp(cmp: &Cmp) -> Option<Atom> {
    cmp.constant().and_then(Value::as_atom)
}

fn numeric_bound(cmp: &Cmp) -> Option<NumRange> {
    match cmp.constant() {
        Some(Value::Num(n)) if !n.is_nan() && cmp.op != CmpOp::Eq => bound_range(cmp.op, *n),
        _ => None,
    }
}

fn range_expr(input: &Expr, range: NumRange) -> Expr {
    if range.is_empty() {
        return Expr::bool(false);
    }
    Expr::Range(RangeCmp {
        input: Box::new(input.clone()),
        range,
    })
}

fn merge_and(prev: &Expr, next: &Expr) -> Option<Expr> {
    match (prev, next) {
        (Expr::Pos(a), Expr::Pos(b)) => Some(a.intersect(b).into_expr()),

        (Expr::Cmp(a), Expr::Cmp(b)) if a.lhs.same_as(&b.lhs) => {
            if let (Some(ra), Some(rb)) = (numeric_bound(a), numeric_bound(b)) {
                let complementary = (a.op.is_lower_bound() && b.op.is_upper_bound())
                    || (a.op.is_upper_bound() && b.op.is_lower_bound());
                if complementary {
                    return Some(range_expr(&a.lhs, ra.intersect(rb)));
                }
            }
            multi(a, b, MultiMode::AllOf)
        }

        (Expr::Range(r), Expr::Cmp(c)) | (Expr::Cmp(c), Expr::Range(r)) if r.input.same_as(&c.lhs) => {
            let bound = numeric_bound(c)?;
            Some(range_expr(&r.input, r.range.intersect(bound)))
        }

        (Expr::Range(a), Expr::Range(b)) if a.input.same_as(&b.input) => {
            Some(range_expr(&a.input, a.range.intersect(b.range)))
        }

        (Expr::Multi(m), Expr::Cmp(c)) => extend_multi(m, c, MultiMode::AllOf),

        _ => None,
    }
}

fn merge_or(prev: &Expr, next: &Expr) -> Option<Expr> {
    match (prev, next) {
        (Expr::Pos(a), Expr::Pos(b)) => a.union(b).map(|u| u.into_expr()),
        (Expr::Cmp(a), Expr::Cmp(b)) if a.lhs.same_as(&b.lhs) => multi(a, b, MultiMode::OneOf),
        (Expr::Multi(m), Expr::Cmp(c)) => extend_multi(m, c, MultiMode::OneOf),
        _ => None,
    }
}

fn multi(a: &Cmp, b: &Cmp, mode: MultiMode) -> Option<Expr> {
    if a.op != b.op {
        return None;
    }
    let values = vec![constant_cmp(a)?, constant_cmp(b)?];
    Some(Expr::Multi(MultiCmp {
        input: a.lhs.clone(),
        op: a.op,
        values,
        mode,
    }))
}

fn extend_multi(m: &MultiCmp, c: &Cmp, mode: MultiMode) -> Option<Expr> {
    if m.mode != mode || m.op != c.op || !m.input.same_as(&c.lhs) {
        return None;
    }
    let mut merged = m.clone();
    merged.values.push(constant_cmp(c)?);
    Some(Expr::Multi(merged))
}
