//! `contains text` over the string values of an input

use crate::config::FtOptions;
use crate::error::ArborError;
use crate::query::accessor::ValueTarget;
use crate::query::ast::{Expr, ExprNode, Use};
use crate::query::context::{CompileContext, EvalContext};
use crate::query::explain::PlanNode;
use crate::query::fulltext::{FtExpr, FtSource};
use crate::query::nodes::{IndexAccess, IndexProbe};
use crate::query::planner::{index_target, reanchor, IndexContext};
use crate::query::types::{Atom, IndexCost, NodeId, Value};
use crate::Result;

/// Whether any item of the input matches a full-text selection
#[derive(Clone, Debug, PartialEq)]
pub struct FtContains {
    pub input: Box<Expr>,
    pub ft: FtExpr,
    /// Clause options handed to terms without their own
    pub options: FtOptions,
}

impl FtContains {
    pub fn new(input: impl Into<Expr>, ft: FtExpr, options: FtOptions) -> Self {
        Self {
            input: Box::new(input.into()),
            ft,
            options,
        }
    }

    fn matches_text(&self, cx: &mut EvalContext<'_>, id: NodeId, text: &str) -> Result<bool> {
        let matches = self.ft.evaluate(cx, &FtSource::Node { id, text })?;
        Ok(!matches.is_empty())
    }
}

impl ExprNode for FtContains {
    fn compile(self, cx: &mut CompileContext<'_>) -> Result<Expr> {
        let input = self.input.compile(cx)?;
        let ft = self.ft.compile(&self.options)?;
        if input.is_empty_item() {
            cx.note("full-text search over empty input is false");
            return Ok(Expr::bool(false));
        }
        let node = FtContains {
            input: Box::new(input),
            ft,
            options: self.options,
        };
        if node.input.is_item() {
            let query = cx.query();
            let value = node.evaluate(&mut EvalContext::new(query))?;
            cx.note("full-text search over a constant folded");
            return Ok(Expr::Item(value));
        }
        Ok(Expr::FtContains(node))
    }

    fn evaluate(&self, cx: &mut EvalContext<'_>) -> Result<Value> {
        match self.input.evaluate(cx)? {
            Value::Empty => Ok(Value::Bool(false)),
            Value::Nodes(nodes) => {
                let accessor = cx.accessor();
                for &id in nodes.ids() {
                    cx.check_cancelled()?;
                    let text = accessor.node_text(id)?;
                    if self.matches_text(cx, id, &text)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            other => {
                let text = other
                    .as_atom()
                    .map(|atom| match atom {
                        Atom::Str(s) => s,
                        atom => atom.to_string(),
                    })
                    .unwrap_or_default();
                Ok(Value::Bool(self.matches_text(cx, 0, &text)?))
            }
        }
    }

    fn uses(&self, u: Use) -> bool {
        self.input.uses(u)
    }

    fn plan(&self) -> PlanNode {
        PlanNode::new("FtContains")
            .child(self.input.plan())
            .child(self.ft.plan())
    }

    fn index_cost(&self, ic: &IndexContext<'_>, cap: usize) -> IndexCost {
        match index_target(&self.input) {
            Some((ValueTarget::Text, None)) => self.ft.index_cost(ic, cap),
            _ => IndexCost::UNUSABLE,
        }
    }

    fn index_equivalent(self, ic: &IndexContext<'_>) -> Result<Expr> {
        if index_target(&self.input) != Some((ValueTarget::Text, None)) {
            return Err(ArborError::Compile(
                "full-text input is not index-servable".to_string(),
            ));
        }
        let access = Expr::Index(IndexAccess::new(IndexProbe::FullText { ft: self.ft }, None));
        Ok(reanchor(access, &self.input, ic))
    }

    fn returns_bool(&self) -> bool {
        true
    }
}
