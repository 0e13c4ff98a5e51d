//! Full-text positional algebra
//!
//! Full-text selections evaluate to [`FtMatches`] streams: node ids with the
//! token positions that satisfied each query operand. Combinators merge the
//! streams, position filters narrow them.

pub mod expr;
pub mod filter;
pub mod matches;
pub mod options;
pub mod units;

pub use expr::{FtExpr, FtMode, FtSource, FtWords};
pub use filter::MAX_FILTER_LEVELS;
pub use matches::{FtHit, FtMatches};
pub use options::{ContentAnchor, Distance, PosFilterConfig, RangeSpec, Scope, ScopeFilter, Unit, Window};
pub use units::TextUnits;
