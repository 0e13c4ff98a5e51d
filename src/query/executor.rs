//! Query executor for running compiled plans
//!
//! The executor evaluates the root of a [`QueryPlan`] against a
//! [`QueryContext`] and reports the value together with execution statistics.

use crate::query::context::{EvalContext, QueryContext};
use crate::query::planner::QueryPlan;
use crate::query::types::{NodeId, QueryStats, Value};
use crate::Result;
use std::time::Instant;

/// Query execution result
#[derive(Debug)]
pub struct QueryResult {
    /// Value of the root expression
    pub value: Value,
    /// Execution statistics
    pub stats: QueryStats,
}

impl QueryResult {
    /// Node ids of the result, empty for atomic values
    pub fn node_ids(&self) -> &[NodeId] {
        match &self.value {
            Value::Nodes(nodes) => nodes.ids(),
            _ => &[],
        }
    }
}

/// Query executor for running plans
pub struct QueryExecutor;

impl QueryExecutor {
    /// Execute a plan without a context item
    pub fn execute(plan: &QueryPlan, query: &QueryContext) -> Result<QueryResult> {
        Self::run(plan, EvalContext::new(query))
    }

    /// Execute a plan with `item` as the initial context item
    pub fn execute_with_item(plan: &QueryPlan, query: &QueryContext, item: NodeId) -> Result<QueryResult> {
        Self::run(plan, EvalContext::with_item(query, item))
    }

    fn run(plan: &QueryPlan, mut cx: EvalContext<'_>) -> Result<QueryResult> {
        let start = Instant::now();
        cx.check_cancelled()?;

        let value = match plan.root.evaluate(&mut cx) {
            Ok(value) => value,
            Err(err) => {
                if err.is_cancellation() {
                    tracing::info!("query cancelled");
                } else {
                    tracing::debug!(error = %err, "query failed");
                }
                return Err(err);
            }
        };

        let mut stats = cx.stats;
        stats.nodes_matched = match &value {
            Value::Nodes(nodes) => nodes.len() as u64,
            Value::Empty => 0,
            _ => 1,
        };
        stats.execution_time_us = start.elapsed().as_micros() as u64;

        tracing::debug!(
            matched = stats.nodes_matched,
            probes = stats.index_probes,
            cache_hits = stats.probe_cache_hits,
            elapsed_us = stats.execution_time_us,
            "query executed"
        );

        Ok(QueryResult { value, stats })
    }
}
