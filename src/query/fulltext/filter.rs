//! Position filters over match streams
//!
//! Each filter narrows the hit block of every id and drops ids that end up
//! without hits. Order inside a block is never changed, so filtered streams
//! stay valid input for further combinators.

use crate::query::fulltext::matches::{FtHit, FtMatches};
use crate::query::fulltext::options::{
    ContentAnchor, Distance, PosFilterConfig, RangeSpec, Scope, ScopeFilter, Window,
};
use crate::query::fulltext::units::TextUnits;
use crate::query::types::NodeId;
use crate::Result;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};

/// Highest number of query levels a position filter can track
pub const MAX_FILTER_LEVELS: u16 = 32;

fn full_mask(levels: u16) -> u32 {
    if levels >= 32 {
        u32::MAX
    } else {
        (1u32 << levels) - 1
    }
}

fn bit(hit: &FtHit) -> u32 {
    1u32 << hit.level
}

/// Apply every configured constraint: ordered, window, distance, scope, content
pub fn apply_filters<F>(matches: &FtMatches, config: &PosFilterConfig, mut units_for: F) -> Result<FtMatches>
where
    F: FnMut(NodeId) -> Result<TextUnits>,
{
    let levels = matches.levels();
    let needs_text = config.needs_text();

    matches.filter_blocks(|id, block| {
        let units = if needs_text {
            units_for(id)?
        } else {
            TextUnits::default()
        };

        let mut hits = block.to_vec();
        if config.ordered {
            hits = ordered(&hits, levels);
        }
        if let Some(window) = config.window {
            hits = within_window(&hits, levels, window, &units);
        }
        if let Some(distance) = config.distance {
            hits = within_distance(&hits, levels, distance, &units);
        }
        if let Some(scope) = config.scope {
            hits = match scope.scope {
                Scope::Same => same_scope(&hits, levels, scope, &units),
                Scope::Different => different_scope(&hits, levels, scope, &units),
            };
        }
        if let Some(anchor) = config.content {
            if !content(&hits, anchor, &units) {
                return Ok(None);
            }
        }
        Ok(Some(hits))
    })
}

/// Keep ids whose number of hits falls inside `range`
pub fn occurs(matches: &FtMatches, range: RangeSpec) -> FtMatches {
    let mut out = FtMatches::empty(matches.levels());
    for (id, block) in matches.iter() {
        if range.contains(block.len() as u32) {
            out.push(id, block.iter().copied());
        }
    }
    out
}

/// Hits lying on a chain that visits every level in query order
pub fn ordered(block: &[FtHit], levels: u16) -> Vec<FtHit> {
    let l = levels as usize;
    if l <= 1 {
        return block.to_vec();
    }

    // forward: some chain of levels 0..=level ends at the hit
    let mut forward = vec![false; block.len()];
    let mut min_end = vec![u32::MAX; l];
    for (i, hit) in block.iter().enumerate() {
        let level = hit.level as usize;
        if level == 0 || min_end[level - 1] < hit.pos {
            forward[i] = true;
            min_end[level] = min_end[level].min(hit.end);
        }
    }

    // backward: some chain of levels level..l starts at the hit
    let mut keep = vec![false; block.len()];
    let mut max_pos: Vec<Option<u32>> = vec![None; l];
    for (i, hit) in block.iter().enumerate().rev() {
        let level = hit.level as usize;
        let reaches = level + 1 == l || max_pos[level + 1].map_or(false, |p| p > hit.end);
        if reaches {
            max_pos[level] = Some(max_pos[level].map_or(hit.pos, |p| p.max(hit.pos)));
            keep[i] = forward[i];
        }
    }

    select(block, &keep)
}

/// Hits inside a window of `size` units that contains every level
///
/// A window starts at a hit and ends before the unit limit. Limits never
/// decrease along the block, so one sweep admits hits by start, counts them
/// once their end fits, and retires them as the window start moves past.
pub fn within_window(block: &[FtHit], levels: u16, window: Window, units: &TextUnits) -> Vec<FtHit> {
    let full = full_mask(levels);
    let mut limits = Vec::with_capacity(block.len());
    let mut complete = vec![false; block.len()];

    let mut counts = [0u32; MAX_FILTER_LEVELS as usize];
    let mut present = 0u32;
    let mut counted = vec![false; block.len()];
    let mut pending: BinaryHeap<Reverse<(u32, usize)>> = BinaryHeap::new();
    let mut next = 0;
    for i in 0..block.len() {
        let limit = units.advance(block[i].pos, window.unit, window.size);
        limits.push(limit);

        next = next.max(i);
        while next < block.len() && block[next].pos < limit {
            pending.push(Reverse((block[next].end, next)));
            next += 1;
        }
        while let Some(&Reverse((end, j))) = pending.peek() {
            if end >= limit {
                break;
            }
            pending.pop();
            if j >= i {
                counted[j] = true;
                let level = block[j].level as usize;
                counts[level] += 1;
                present |= bit(&block[j]);
            }
        }
        complete[i] = present & full == full;

        if counted[i] {
            let level = block[i].level as usize;
            counts[level] -= 1;
            if counts[level] == 0 {
                present &= !bit(&block[i]);
            }
        }
    }

    // a hit is kept by the latest complete window starting at or before it
    let mut keep = vec![false; block.len()];
    let mut reach: Option<u32> = None;
    for (k, hit) in block.iter().enumerate() {
        if complete[k] {
            reach = Some(limits[k]);
        }
        keep[k] = reach.map_or(false, |limit| hit.end < limit);
    }
    select(block, &keep)
}

struct DistanceChains<'a> {
    block: &'a [FtHit],
    full: u32,
    distance: Distance,
    units: &'a TextUnits,
    memo: HashMap<(usize, u32), bool>,
    keep: Vec<bool>,
}

impl DistanceChains<'_> {
    /// Whether a chain from hit `i` with levels `mask` can be completed
    fn extend(&mut self, i: usize, mask: u32) -> bool {
        if mask == self.full {
            return true;
        }
        if let Some(&done) = self.memo.get(&(i, mask)) {
            return done;
        }

        let from = self.block[i];
        let mut found = false;
        for j in i + 1..self.block.len() {
            let next = self.block[j];
            if next.pos <= from.end {
                continue;
            }
            let gap = self.units.distance(from.end, next.pos, self.distance.unit);
            if gap > self.distance.range.upper() {
                break;
            }
            if mask & bit(&next) != 0 || !self.distance.range.contains(gap) {
                continue;
            }
            if self.extend(j, mask | bit(&next)) {
                self.keep[j] = true;
                found = true;
            }
        }
        self.memo.insert((i, mask), found);
        found
    }
}

/// Hits on a chain covering every level with each gap inside the distance range
pub fn within_distance(block: &[FtHit], levels: u16, distance: Distance, units: &TextUnits) -> Vec<FtHit> {
    let mut chains = DistanceChains {
        block,
        full: full_mask(levels),
        distance,
        units,
        memo: HashMap::new(),
        keep: vec![false; block.len()],
    };
    for i in 0..block.len() {
        if chains.extend(i, bit(&block[i])) {
            chains.keep[i] = true;
        }
    }
    select(block, &chains.keep)
}

fn span_of(hit: &FtHit, scope: ScopeFilter, units: &TextUnits) -> Option<u32> {
    let start = units.unit_index(hit.pos, scope.unit);
    (start == units.unit_index(hit.end, scope.unit)).then_some(start)
}

/// Hits of spans that contain every level
pub fn same_scope(block: &[FtHit], levels: u16, scope: ScopeFilter, units: &TextUnits) -> Vec<FtHit> {
    let full = full_mask(levels);
    let mut spans: BTreeMap<u32, u32> = BTreeMap::new();
    for hit in block {
        if let Some(span) = span_of(hit, scope, units) {
            *spans.entry(span).or_insert(0) |= bit(hit);
        }
    }
    block
        .iter()
        .filter(|hit| {
            span_of(hit, scope, units)
                .and_then(|span| spans.get(&span))
                .map_or(false, |&mask| mask == full)
        })
        .copied()
        .collect()
}

/// Hits usable in a pick of one hit per level with pairwise different spans
pub fn different_scope(block: &[FtHit], levels: u16, scope: ScopeFilter, units: &TextUnits) -> Vec<FtHit> {
    let mut by_level: Vec<Vec<u32>> = vec![Vec::new(); levels as usize];
    let spans: Vec<Option<u32>> = block.iter().map(|h| span_of(h, scope, units)).collect();
    for (hit, span) in block.iter().zip(&spans) {
        if let Some(span) = span {
            if !by_level[hit.level as usize].contains(span) {
                by_level[hit.level as usize].push(*span);
            }
        }
    }

    fn assign(level: usize, fixed: (usize, u32), by_level: &[Vec<u32>], used: &mut Vec<u32>) -> bool {
        if level == by_level.len() {
            return true;
        }
        let candidates: &[u32] = if level == fixed.0 {
            std::slice::from_ref(&fixed.1)
        } else {
            &by_level[level]
        };
        for &span in candidates {
            if used.contains(&span) {
                continue;
            }
            used.push(span);
            let ok = assign(level + 1, fixed, by_level, used);
            used.pop();
            if ok {
                return true;
            }
        }
        false
    }

    let mut keep = vec![false; block.len()];
    let mut used = Vec::with_capacity(levels as usize);
    for (i, hit) in block.iter().enumerate() {
        if let Some(span) = spans[i] {
            keep[i] = assign(0, (hit.level as usize, span), &by_level, &mut used);
        }
    }
    select(block, &keep)
}

/// Whether the hits are anchored as requested
pub fn content(block: &[FtHit], anchor: ContentAnchor, units: &TextUnits) -> bool {
    let len = units.len();
    if len == 0 {
        return false;
    }
    match anchor {
        ContentAnchor::AtStart => block.iter().any(|h| h.pos == 0),
        ContentAnchor::AtEnd => block.iter().any(|h| h.end + 1 == len),
        ContentAnchor::EntireContent => {
            let mut covered = 0u32;
            for hit in block {
                if hit.pos > covered {
                    return false;
                }
                covered = covered.max(hit.end + 1);
            }
            covered >= len
        }
    }
}

fn select(block: &[FtHit], keep: &[bool]) -> Vec<FtHit> {
    block
        .iter()
        .zip(keep)
        .filter(|(_, k)| **k)
        .map(|(h, _)| *h)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenizerConfig;
    use crate::query::fulltext::options::Unit;
    use crate::tokenizer::Tokenizer;

    fn hit(pos: u32, level: u16) -> FtHit {
        FtHit::new(pos, pos, level)
    }

    fn units(text: &str) -> TextUnits {
        TextUnits::new(text, &Tokenizer::new(&TokenizerConfig::default()))
    }

    #[test]
    fn test_ordered_pairs_later_term() {
        // "b a b": a = level 0, b = level 1
        let block = [hit(0, 1), hit(1, 0), hit(2, 1)];
        assert_eq!(ordered(&block, 2), vec![hit(1, 0), hit(2, 1)]);

        // "b a"
        let block = [hit(0, 1), hit(1, 0)];
        assert!(ordered(&block, 2).is_empty());

        // "a b"
        let block = [hit(0, 0), hit(1, 1)];
        assert_eq!(ordered(&block, 2).len(), 2);
    }

    #[test]
    fn test_window_words() {
        let u = TextUnits::default();
        let window = Window { size: 3, unit: Unit::Words };
        // a at 0, b at 2 fits into 3 words; b at 7 does not pair with anything
        let block = [hit(0, 0), hit(2, 1), hit(7, 1)];
        assert_eq!(within_window(&block, 2, window, &u), vec![hit(0, 0), hit(2, 1)]);

        let far = [hit(0, 0), hit(3, 1)];
        assert!(within_window(&far, 2, window, &u).is_empty());
    }

    /// Every window start checked on its own
    fn window_by_start(block: &[FtHit], levels: u16, window: Window, units: &TextUnits) -> Vec<FtHit> {
        let mut keep = vec![false; block.len()];
        for i in 0..block.len() {
            let limit = units.advance(block[i].pos, window.unit, window.size);
            let inside: Vec<usize> = (i..block.len())
                .filter(|&j| block[j].pos < limit && block[j].end < limit)
                .collect();
            let mask = inside.iter().fold(0, |m, &j| m | bit(&block[j]));
            if mask == full_mask(levels) {
                inside.iter().for_each(|&j| keep[j] = true);
            }
        }
        select(block, &keep)
    }

    #[test]
    fn test_window_sweep_matches_per_start_check() {
        let u = TextUnits::default();
        let blocks: Vec<Vec<FtHit>> = vec![
            vec![hit(0, 0), hit(1, 2), hit(2, 1), hit(4, 0), hit(5, 2), hit(9, 1), hit(10, 0)],
            vec![FtHit::new(0, 3, 0), hit(1, 1), hit(2, 1), FtHit::new(4, 5, 0), hit(6, 1)],
            vec![hit(3, 0), hit(3, 1), hit(3, 2), hit(8, 0), hit(8, 1)],
            vec![hit(0, 1), hit(7, 0), hit(8, 1), hit(12, 0), hit(20, 1)],
        ];
        for block in &blocks {
            for size in 1..6 {
                let window = Window { size, unit: Unit::Words };
                let levels = if block.iter().any(|h| h.level == 2) { 3 } else { 2 };
                assert_eq!(
                    within_window(block, levels, window, &u),
                    window_by_start(block, levels, window, &u),
                    "size {} over {:?}",
                    size,
                    block
                );
            }
        }
    }

    #[test]
    fn test_window_sentences() {
        let u = units("x a y. z b. q c");
        let window = Window { size: 2, unit: Unit::Sentences };
        let block = [hit(1, 0), hit(4, 1)];
        assert_eq!(within_window(&block, 2, window, &u).len(), 2);
        let block = [hit(1, 0), hit(6, 1)];
        assert!(within_window(&block, 2, window, &u).is_empty());
    }

    #[test]
    fn test_distance_chain() {
        let u = TextUnits::default();
        let at_most_one = Distance { range: RangeSpec::AtMost(1), unit: Unit::Words };
        // gap between 0 and 2 is one word
        let block = [hit(0, 0), hit(2, 1), hit(9, 1)];
        assert_eq!(within_distance(&block, 2, at_most_one, &u), vec![hit(0, 0), hit(2, 1)]);

        let exactly_three = Distance { range: RangeSpec::Exactly(3), unit: Unit::Words };
        let block = [hit(0, 0), hit(2, 1), hit(4, 1)];
        assert_eq!(within_distance(&block, 2, exactly_three, &u), vec![hit(0, 0), hit(4, 1)]);
    }

    #[test]
    fn test_scope_same_and_different() {
        let u = units("a b. c d");
        let sentence = |scope| ScopeFilter { scope, unit: Unit::Sentences };
        let block = [hit(0, 0), hit(1, 1), hit(2, 0)];
        assert_eq!(same_scope(&block, 2, sentence(Scope::Same), &u), vec![hit(0, 0), hit(1, 1)]);
        assert_eq!(
            different_scope(&block, 2, sentence(Scope::Different), &u),
            vec![hit(1, 1), hit(2, 0)]
        );
    }

    #[test]
    fn test_content_anchors() {
        let u = units("one two three");
        assert!(content(&[hit(0, 0)], ContentAnchor::AtStart, &u));
        assert!(!content(&[hit(1, 0)], ContentAnchor::AtStart, &u));
        assert!(content(&[hit(2, 0)], ContentAnchor::AtEnd, &u));
        assert!(content(&[FtHit::new(0, 1, 0), hit(2, 1)], ContentAnchor::EntireContent, &u));
        assert!(!content(&[hit(0, 0), hit(2, 1)], ContentAnchor::EntireContent, &u));
    }

    #[test]
    fn test_occurs() {
        let m = FtMatches::from_postings(&[(1, 0), (1, 3), (1, 5), (2, 1)]);
        assert_eq!(occurs(&m, RangeSpec::Exactly(3)).ids(), &[1]);
        assert!(occurs(&m, RangeSpec::AtLeast(4)).is_empty());
        assert_eq!(occurs(&m, RangeSpec::AtMost(1)).ids(), &[2]);
    }
}
