//! Query compilation and evaluation
//!
//! Expressions are built as [`Expr`] trees, compiled once by the
//! [`QueryPlanner`] and evaluated by the [`QueryExecutor`]. Compilation:
//! - folds constants and removes redundant predicates
//! - merges comparisons inside conjunctions and disjunctions
//! - answers selective predicates through value and full-text indexes
//!
//! # Example
//!
//! ```ignore
//! // /library/book[@id = "b2"]
//! let expr = Expr::Path(Path::absolute(vec![
//!     Step::child("library"),
//!     Step::child("book").pred(Cmp::new(
//!         Path::relative(vec![Step::attr("id")]),
//!         CmpOp::Eq,
//!         Expr::str("b2"),
//!     )),
//! ]));
//! let plan = QueryPlanner::plan(expr, &query)?;
//! let result = QueryExecutor::execute(&plan, &query)?;
//! ```

pub mod accessor;
pub mod ast;
pub mod context;
pub mod executor;
pub mod explain;
pub mod fulltext;
pub mod nodes;
pub mod pairs;
pub mod planner;
pub mod rewrite;
pub mod types;

pub use accessor::{IndexAccessor, NumRange, ValueTarget};
pub use ast::{Expr, ExprNode, Use};
pub use context::{CancelHandle, CompileContext, EvalContext, Focus, QueryContext, QueryContextBuilder};
pub use executor::{QueryExecutor, QueryResult};
pub use explain::PlanNode;
pub use planner::{IndexContext, QueryPlan, QueryPlanner};
pub use types::*;
