//! Expression node implementations

mod calc;
mod comparison;
mod ft_contains;
mod index_access;
mod logic;
mod path;
mod position;

pub use calc::{Calc, CalcOp};
pub use comparison::{bound_range, Cmp, MultiCmp, MultiMode, RangeCmp};
pub use ft_contains::FtContains;
pub use index_access::{IndexAccess, IndexProbe, SetExpr, SetOp};
pub use logic::{And, Not, Or};
pub use path::{Path, PathRoot, Step};
pub use position::{Last, PosTest, Position};
