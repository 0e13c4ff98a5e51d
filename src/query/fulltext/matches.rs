//! Positional match streams
//!
//! An [`FtMatches`] stores, per matching node id, a block of hits. Blocks are
//! kept in compressed-row form: `bounds[i]..bounds[i + 1]` indexes the hits of
//! `ids[i]`. Ids ascend strictly and hits within a block are ordered by start
//! position, then by level.

use crate::query::pairs;
use crate::query::types::NodeId;
use crate::Result;

/// One matched occurrence inside a node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FtHit {
    /// Position of the first matched token
    pub pos: u32,
    /// Position of the last matched token
    pub end: u32,
    /// Query operand that produced the hit
    pub level: u16,
}

impl FtHit {
    pub fn new(pos: u32, end: u32, level: u16) -> Self {
        Self { pos, end, level }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FtMatches {
    ids: Vec<NodeId>,
    bounds: Vec<usize>,
    hits: Vec<FtHit>,
    levels: u16,
}

impl FtMatches {
    pub fn empty(levels: u16) -> Self {
        Self {
            ids: Vec::new(),
            bounds: vec![0],
            hits: Vec::new(),
            levels,
        }
    }

    /// A single id matched without positions
    pub fn bare(id: NodeId) -> Self {
        let mut matches = Self::empty(0);
        matches.push(id, std::iter::empty());
        matches
    }

    /// Build a single-level stream from (id, position) pairs sorted by id then position
    pub fn from_postings(postings: &[(NodeId, u32)]) -> Self {
        let mut matches = Self::empty(1);
        let mut i = 0;
        while i < postings.len() {
            let id = postings[i].0;
            let start = i;
            while i < postings.len() && postings[i].0 == id {
                i += 1;
            }
            matches.push(id, postings[start..i].iter().map(|&(_, p)| FtHit::new(p, p, 0)));
        }
        matches
    }

    /// Append a block; ids must be pushed in ascending order
    pub fn push(&mut self, id: NodeId, hits: impl IntoIterator<Item = FtHit>) {
        debug_assert!(self.ids.last().map_or(true, |&last| last < id));
        self.ids.push(id);
        self.hits.extend(hits);
        self.bounds.push(self.hits.len());
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    pub fn levels(&self) -> u16 {
        self.levels
    }

    pub fn block(&self, i: usize) -> &[FtHit] {
        &self.hits[self.bounds[i]..self.bounds[i + 1]]
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &[FtHit])> + '_ {
        self.ids.iter().enumerate().map(move |(i, &id)| (id, self.block(i)))
    }

    /// Flattened (id, position) pairs
    pub fn pairs(&self) -> Vec<(NodeId, u32)> {
        self.iter()
            .flat_map(|(id, block)| block.iter().map(move |h| (id, h.pos)))
            .collect()
    }

    /// Collapse every operand into one level
    pub fn flatten(mut self) -> Self {
        for hit in &mut self.hits {
            hit.level = 0;
        }
        self.levels = self.levels.min(1);
        self
    }

    /// Ids present in both streams, keeping the hits of both sides
    ///
    /// Levels of `other` are shifted past the levels of `self`.
    pub fn intersect(&self, other: &FtMatches) -> FtMatches {
        let mut out = FtMatches::empty(self.levels + other.levels);
        let (mut i, mut j) = (0, 0);
        let mut merged = Vec::new();
        while i < self.len() && j < other.len() {
            match self.ids[i].cmp(&other.ids[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    merged.clear();
                    pairs::merge_hits(self.block(i), other.block(j), self.levels, &mut merged);
                    out.push(self.ids[i], merged.iter().copied());
                    i += 1;
                    j += 1;
                }
            }
        }
        out
    }

    /// Ids present in either stream; hits at the same position collapse
    pub fn union(&self, other: &FtMatches) -> FtMatches {
        let mut out = FtMatches::empty(self.levels.max(other.levels));
        let (mut i, mut j) = (0, 0);
        let mut merged = Vec::new();
        while i < self.len() || j < other.len() {
            let order = match (self.ids.get(i), other.ids.get(j)) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(_), None) => std::cmp::Ordering::Less,
                _ => std::cmp::Ordering::Greater,
            };
            match order {
                std::cmp::Ordering::Less => {
                    out.push(self.ids[i], self.block(i).iter().copied());
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    out.push(other.ids[j], other.block(j).iter().copied());
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    merged.clear();
                    pairs::union_hits(self.block(i), other.block(j), &mut merged);
                    out.push(self.ids[i], merged.iter().copied());
                    i += 1;
                    j += 1;
                }
            }
        }
        out
    }

    /// Remove hits covered by a hit of `other`; ids left without hits are dropped
    pub fn mild_not(&self, other: &FtMatches) -> FtMatches {
        let mut out = FtMatches::empty(self.levels);
        let mut j = 0;
        let mut kept = Vec::new();
        for (i, &id) in self.ids.iter().enumerate() {
            while j < other.len() && other.ids[j] < id {
                j += 1;
            }
            let block = self.block(i);
            if j >= other.len() || other.ids[j] != id || block.is_empty() {
                out.push(id, block.iter().copied());
                continue;
            }
            kept.clear();
            pairs::exclude_hits(block, other.block(j), &mut kept);
            if !kept.is_empty() {
                out.push(id, kept.iter().copied());
            }
        }
        out
    }

    /// Drop every id that appears in `other`
    pub fn without_ids(&self, other: &FtMatches) -> FtMatches {
        let keep = pairs::difference_sorted(&self.ids, &other.ids);
        let mut out = FtMatches::empty(self.levels);
        let mut k = 0;
        for (i, &id) in self.ids.iter().enumerate() {
            if k < keep.len() && keep[k] == id {
                out.push(id, self.block(i).iter().copied());
                k += 1;
            }
        }
        out
    }

    /// Rebuild the stream block by block
    ///
    /// `f` returns the hits to keep, or `None` to drop the id. Blocks without
    /// hits carry no positions to test and pass through unchanged.
    pub fn filter_blocks<F>(&self, mut f: F) -> Result<FtMatches>
    where
        F: FnMut(NodeId, &[FtHit]) -> Result<Option<Vec<FtHit>>>,
    {
        let mut out = FtMatches::empty(self.levels);
        for (id, block) in self.iter() {
            if block.is_empty() {
                out.push(id, std::iter::empty());
                continue;
            }
            if let Some(kept) = f(id, block)? {
                if !kept.is_empty() {
                    out.push(id, kept);
                }
            }
        }
        Ok(out)
    }
}
