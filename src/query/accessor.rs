//! Storage collaborator contract
//!
//! Query compilation and evaluation reach stored nodes and secondary indexes
//! only through [`IndexAccessor`]. Implementations must allow concurrent
//! readers.

use crate::config::{FtOptions, IndexMeta};
use crate::query::types::{NodeId, NodeKind};
use crate::Result;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Node kind served by a value index
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueTarget {
    Text,
    Attribute,
}

impl ValueTarget {
    pub fn name(self) -> &'static str {
        match self {
            ValueTarget::Text => "text",
            ValueTarget::Attribute => "attribute",
        }
    }
}

/// Numeric interval with inclusive or exclusive bounds
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NumRange {
    pub min: f64,
    pub min_inclusive: bool,
    pub max: f64,
    pub max_inclusive: bool,
}

impl NumRange {
    pub fn closed(min: f64, max: f64) -> Self {
        Self {
            min,
            min_inclusive: true,
            max,
            max_inclusive: true,
        }
    }

    pub fn unbounded() -> Self {
        Self::closed(f64::NEG_INFINITY, f64::INFINITY)
    }

    pub fn contains(&self, v: f64) -> bool {
        let above = if self.min_inclusive { v >= self.min } else { v > self.min };
        let below = if self.max_inclusive { v <= self.max } else { v < self.max };
        above && below
    }

    /// No number satisfies the range
    pub fn is_empty(&self) -> bool {
        self.min > self.max
            || (self.min == self.max && !(self.min_inclusive && self.max_inclusive))
            || self.min.is_nan()
            || self.max.is_nan()
    }

    /// Tighten the lower bound
    pub fn with_min(mut self, min: f64, inclusive: bool) -> Self {
        if min > self.min || (min == self.min && !inclusive) {
            self.min = min;
            self.min_inclusive = inclusive;
        }
        self
    }

    /// Tighten the upper bound
    pub fn with_max(mut self, max: f64, inclusive: bool) -> Self {
        if max < self.max || (max == self.max && !inclusive) {
            self.max = max;
            self.max_inclusive = inclusive;
        }
        self
    }

    pub fn intersect(self, other: NumRange) -> NumRange {
        self.with_min(other.min, other.min_inclusive)
            .with_max(other.max, other.max_inclusive)
    }
}

impl std::fmt::Display for NumRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}, {}{}",
            if self.min_inclusive { '[' } else { '(' },
            self.min,
            self.max,
            if self.max_inclusive { ']' } else { ')' }
        )
    }
}

/// Trait for reading stored nodes and probing secondary indexes
pub trait IndexAccessor: Send + Sync {
    /// The document node
    fn root(&self) -> NodeId;

    fn node_kind(&self, id: NodeId) -> Result<NodeKind>;

    /// Element or attribute name
    fn node_name(&self, id: NodeId) -> Option<&str>;

    fn node_parent(&self, id: NodeId) -> Option<NodeId>;

    /// Child nodes in document order, attributes excluded
    fn children(&self, id: NodeId) -> &[NodeId];

    fn attributes(&self, id: NodeId) -> &[NodeId];

    /// String value of a node
    fn node_text(&self, id: NodeId) -> Result<Cow<'_, str>>;

    /// Indexes available for planning
    fn index_meta(&self) -> &IndexMeta;

    fn estimate_value_hits(&self, target: ValueTarget, value: &str) -> usize;

    /// Text or attribute nodes whose value equals `value`
    fn lookup_value(&self, target: ValueTarget, value: &str) -> Result<RoaringBitmap>;

    fn estimate_range_hits(&self, target: ValueTarget, range: &NumRange) -> usize;

    /// Text or attribute nodes whose numeric value falls inside `range`
    fn lookup_numeric_range(&self, target: ValueTarget, range: &NumRange) -> Result<RoaringBitmap>;

    fn estimate_token_hits(&self, token: &str, opts: &FtOptions) -> usize;

    /// Occurrences of a query word as (text node, token position), sorted
    fn lookup_token(&self, token: &str, opts: &FtOptions) -> Result<Vec<(NodeId, u32)>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_range_bounds() {
        let range = NumRange::closed(5.0, 10.0);
        assert!(range.contains(5.0));
        assert!(range.contains(10.0));
        assert!(!range.contains(10.5));
        assert!(!range.is_empty());

        let open = NumRange::unbounded().with_min(5.0, false);
        assert!(!open.contains(5.0));
        assert!(open.contains(5.1));
    }

    #[test]
    fn test_num_range_intersection() {
        let a = NumRange::closed(1.0, 8.0);
        let b = NumRange::closed(4.0, 12.0);
        assert_eq!(a.intersect(b), NumRange::closed(4.0, 8.0));

        let empty = NumRange::closed(10.0, 5.0);
        assert!(empty.is_empty());
        let point = NumRange::unbounded().with_min(3.0, true).with_max(3.0, false);
        assert!(point.is_empty());
    }
}
