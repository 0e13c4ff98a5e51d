//! Query compilation and execution contexts
//!
//! The `QueryContext` is shared by compilation and evaluation of one query.
//! It carries the storage accessor, the tokenizer, engine configuration, the
//! cancellation flag and a cache of index probe results.
//!
//! The probe cache lives as long as the context. Every execution on the same
//! context reuses and extends it, so a context is scoped to one query session
//! over an unchanging store; call [`QueryContext::clear_probe_cache`] or build
//! a fresh context to release the cached bitmaps.

use crate::config::EngineConfig;
use crate::error::{ArborError, EvalFault};
use crate::query::accessor::IndexAccessor;
use crate::query::types::{Atom, NodeId, QueryStats, Value};
use crate::tokenizer::Tokenizer;
use crate::Result;
use parking_lot::RwLock;
use roaring::RoaringBitmap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Probe cache keyed by the canonical form of an index probe
///
/// Unbounded; entries are dropped only with the owning context or on clear.
pub type ProbeCache = Arc<RwLock<HashMap<String, RoaringBitmap>>>;

/// Cooperative cancellation flag, cloneable across threads
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every evaluation sharing this handle
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Per-query context giving access to storage, tokenizer and configuration
pub struct QueryContext {
    accessor: Arc<dyn IndexAccessor>,
    tokenizer: Arc<Tokenizer>,
    config: EngineConfig,
    cancel: CancelHandle,
    probe_cache: ProbeCache,
}

impl QueryContext {
    /// Create a context with default configuration
    pub fn new(accessor: Arc<dyn IndexAccessor>) -> Self {
        Self::builder(accessor).build()
    }

    /// Create a context builder
    pub fn builder(accessor: Arc<dyn IndexAccessor>) -> QueryContextBuilder {
        QueryContextBuilder {
            accessor,
            tokenizer: None,
            config: EngineConfig::default(),
            cancel: None,
        }
    }

    pub fn accessor(&self) -> &dyn IndexAccessor {
        self.accessor.as_ref()
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handle that cancels evaluations running on this context
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ArborError::Cancelled);
        }
        Ok(())
    }

    /// Get or compute a cached probe result
    ///
    /// Returns the bitmap and whether it came from the cache.
    pub fn get_or_cache_probe<F>(&self, cache_key: &str, compute: F) -> Result<(RoaringBitmap, bool)>
    where
        F: FnOnce() -> Result<RoaringBitmap>,
    {
        if let Some(cached) = self.probe_cache.read().get(cache_key) {
            return Ok((cached.clone(), true));
        }

        let result = compute()?;
        self.probe_cache
            .write()
            .insert(cache_key.to_string(), result.clone());
        Ok((result, false))
    }

    /// Clear the probe cache
    pub fn clear_probe_cache(&self) {
        self.probe_cache.write().clear();
    }
}

/// Builder for QueryContext
pub struct QueryContextBuilder {
    accessor: Arc<dyn IndexAccessor>,
    tokenizer: Option<Arc<Tokenizer>>,
    config: EngineConfig,
    cancel: Option<CancelHandle>,
}

impl QueryContextBuilder {
    /// Set the tokenizer
    pub fn tokenizer(mut self, tokenizer: Arc<Tokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    /// Set the engine configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing cancellation handle
    pub fn cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Build the QueryContext
    pub fn build(self) -> QueryContext {
        let tokenizer = self
            .tokenizer
            .unwrap_or_else(|| Arc::new(Tokenizer::new(&self.config.tokenizer)));

        QueryContext {
            accessor: self.accessor,
            tokenizer,
            config: self.config,
            cancel: self.cancel.unwrap_or_default(),
            probe_cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

/// Compilation state threaded through one bottom-up pass
pub struct CompileContext<'q> {
    query: &'q QueryContext,
    depth: usize,
    notes: Vec<String>,
}

impl<'q> CompileContext<'q> {
    pub fn new(query: &'q QueryContext) -> Self {
        Self {
            query,
            depth: 0,
            notes: Vec::new(),
        }
    }

    pub fn query(&self) -> &'q QueryContext {
        self.query
    }

    /// Record an applied rewrite
    pub fn note(&mut self, note: impl Into<String>) {
        let note = note.into();
        tracing::debug!(rewrite = %note, "compile rewrite");
        self.notes.push(note);
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn into_notes(self) -> Vec<String> {
        self.notes
    }

    pub fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        let max = self.query.config().max_depth;
        if self.depth > max {
            self.depth -= 1;
            return Err(ArborError::eval(
                EvalFault::DepthExceeded,
                format!("expression nesting exceeds {} levels during compilation", max),
            ));
        }
        Ok(())
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

/// Focus of an evaluation: context item, position and size
///
/// A position of 0 means no positional context is available.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Focus {
    pub item: Option<NodeId>,
    pub pos: usize,
    pub size: usize,
}

impl Focus {
    pub fn item(id: NodeId) -> Self {
        Self {
            item: Some(id),
            pos: 0,
            size: 0,
        }
    }
}

/// Evaluation state for one execution of a compiled expression
pub struct EvalContext<'q> {
    query: &'q QueryContext,
    focus: Focus,
    depth: usize,
    pub stats: QueryStats,
}

impl<'q> EvalContext<'q> {
    pub fn new(query: &'q QueryContext) -> Self {
        Self {
            query,
            focus: Focus::default(),
            depth: 0,
            stats: QueryStats::default(),
        }
    }

    /// Start with a context item
    pub fn with_item(query: &'q QueryContext, item: NodeId) -> Self {
        let mut cx = Self::new(query);
        cx.focus = Focus::item(item);
        cx
    }

    pub fn query(&self) -> &'q QueryContext {
        self.query
    }

    pub fn accessor(&self) -> &'q dyn IndexAccessor {
        self.query.accessor()
    }

    pub fn tokenizer(&self) -> &'q Tokenizer {
        self.query.tokenizer()
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    /// Run `f` under a substituted focus and restore the previous one
    pub fn with_focus<T, F>(&mut self, focus: Focus, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved = std::mem::replace(&mut self.focus, focus);
        let result = f(self);
        self.focus = saved;
        result
    }

    pub fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        let max = self.query.config().max_depth;
        if self.depth > max {
            self.depth -= 1;
            return Err(ArborError::eval(
                EvalFault::DepthExceeded,
                format!("evaluation nesting exceeds {} levels", max),
            ));
        }
        Ok(())
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn check_cancelled(&self) -> Result<()> {
        self.query.check_cancelled()
    }

    /// Atomize a value; nodes contribute their string values
    pub fn atomize(&self, value: &Value) -> Result<Vec<Atom>> {
        match value {
            Value::Nodes(nodes) => {
                let accessor = self.accessor();
                nodes
                    .ids()
                    .iter()
                    .map(|&id| Ok(Atom::Str(accessor.node_text(id)?.into_owned())))
                    .collect()
            }
            other => Ok(other.as_atom().into_iter().collect()),
        }
    }

    /// Resolve an index probe through the per-query cache
    pub fn probe<F>(&mut self, cache_key: &str, compute: F) -> Result<RoaringBitmap>
    where
        F: FnOnce() -> Result<RoaringBitmap>,
    {
        let (bitmap, hit) = self.query.get_or_cache_probe(cache_key, compute)?;
        if hit {
            self.stats.probe_cache_hits += 1;
        } else {
            self.stats.probe_cache_misses += 1;
            self.stats.index_probes += 1;
        }
        tracing::trace!(probe = cache_key, hits = bitmap.len(), cached = hit, "index probe");
        Ok(bitmap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DocumentBuilder;

    fn create_test_context() -> QueryContext {
        let mut b = DocumentBuilder::new();
        b.open("root").text("x").close();
        QueryContext::new(Arc::new(b.build().unwrap()))
    }

    #[test]
    fn test_probe_cache() {
        let query = create_test_context();
        let mut calls = 0;
        let (first, cached) = query
            .get_or_cache_probe("k", || {
                calls += 1;
                Ok(RoaringBitmap::from_iter([1u32, 2]))
            })
            .unwrap();
        assert!(!cached);
        let (second, cached) = query
            .get_or_cache_probe("k", || {
                calls += 1;
                Ok(RoaringBitmap::new())
            })
            .unwrap();
        assert!(cached);
        assert_eq!(first, second);
        assert_eq!(calls, 1);

        query.clear_probe_cache();
        let (_, cached) = query.get_or_cache_probe("k", || Ok(RoaringBitmap::new())).unwrap();
        assert!(!cached);
    }

    #[test]
    fn test_failed_probe_is_not_cached() {
        let query = create_test_context();
        let err = query.get_or_cache_probe("k", || Err(ArborError::Storage("down".to_string())));
        assert!(err.is_err());
        let (_, cached) = query.get_or_cache_probe("k", || Ok(RoaringBitmap::new())).unwrap();
        assert!(!cached);
    }

    #[test]
    fn test_cancellation_is_shared() {
        let cancel = CancelHandle::new();
        let mut b = DocumentBuilder::new();
        b.open("root").close();
        let query = QueryContext::builder(Arc::new(b.build().unwrap()))
            .cancel_handle(cancel.clone())
            .build();
        assert!(query.check_cancelled().is_ok());
        cancel.cancel();
        assert!(query.check_cancelled().unwrap_err().is_cancellation());
        cancel.reset();
        assert!(query.check_cancelled().is_ok());
    }

    #[test]
    fn test_depth_limit() {
        let mut b = DocumentBuilder::new();
        b.open("root").close();
        let query = QueryContext::builder(Arc::new(b.build().unwrap()))
            .config(EngineConfig::default().with_max_depth(2))
            .build();

        let mut cx = EvalContext::new(&query);
        cx.enter().unwrap();
        cx.enter().unwrap();
        let err = cx.enter().unwrap_err();
        assert_eq!(err.fault(), Some(EvalFault::DepthExceeded));
        cx.leave();
        assert!(cx.enter().is_ok());

        let mut compile = CompileContext::new(&query);
        compile.enter().unwrap();
        compile.enter().unwrap();
        let err = compile.enter().unwrap_err();
        assert_eq!(err.fault(), Some(EvalFault::DepthExceeded));
        compile.leave();
        assert!(compile.enter().is_ok());
    }

    #[test]
    fn test_focus_is_restored() {
        let query = create_test_context();
        let mut cx = EvalContext::with_item(&query, 1);
        let inner = cx
            .with_focus(Focus { item: Some(2), pos: 1, size: 1 }, |cx| Ok(cx.focus()))
            .unwrap();
        assert_eq!(inner.item, Some(2));
        assert_eq!(cx.focus(), Focus::item(1));
    }

    #[test]
    fn test_atomize_nodes() {
        let query = create_test_context();
        let cx = EvalContext::new(&query);
        let atoms = cx
            .atomize(&Value::Nodes(crate::query::types::NodeSet::single(1)))
            .unwrap();
        assert_eq!(atoms, vec![Atom::Str("x".to_string())]);
        assert!(cx.atomize(&Value::Empty).unwrap().is_empty());
    }
}
