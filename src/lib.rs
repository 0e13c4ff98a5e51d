pub mod config;
pub mod error;
pub mod query;
pub mod store;
pub mod tokenizer;

pub use config::{
    EngineConfig, FtIndexOptions, FtOptions, IndexMeta, PlannerConfig, StopWords, TokenizerConfig,
    ZeroCostPolicy,
};
pub use error::{ArborError, EvalFault, Result};
pub use query::{
    Expr, IndexAccessor, QueryContext, QueryExecutor, QueryPlan, QueryPlanner, QueryResult,
};
pub use store::{DocumentBuilder, MemoryStore};
pub use tokenizer::Tokenizer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
