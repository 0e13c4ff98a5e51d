//! Merge primitives over sorted id arrays and sorted hit blocks
//!
//! Every routine is a single forward scan over both inputs, O(n + m), and
//! preserves ascending order so the results can be fed straight into the
//! next operator.

use crate::query::fulltext::FtHit;

/// Ids present in both inputs
pub fn intersect_sorted(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Ids present in either input, duplicates collapsed
pub fn union_sorted(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Ids of `a` absent from `b`
pub fn difference_sorted(a: &[u32], b: &[u32]) -> Vec<u32> {
    let mut out = Vec::with_capacity(a.len());
    let mut j = 0;
    for &id in a {
        while j < b.len() && b[j] < id {
            j += 1;
        }
        if j >= b.len() || b[j] != id {
            out.push(id);
        }
    }
    out
}

/// Merge two hit blocks by start position, shifting the right block's levels
///
/// On equal positions the left hit comes first.
pub fn merge_hits(a: &[FtHit], b: &[FtHit], shift: u16, out: &mut Vec<FtHit>) {
    let (mut i, mut j) = (0, 0);
    while i < a.len() || j < b.len() {
        let take_left = j >= b.len() || (i < a.len() && a[i].pos <= b[j].pos);
        if take_left {
            out.push(a[i]);
            i += 1;
        } else {
            let mut hit = b[j];
            hit.level += shift;
            out.push(hit);
            j += 1;
        }
    }
}

/// Merge two hit blocks, collapsing hits that start at the same position
pub fn union_hits(a: &[FtHit], b: &[FtHit], out: &mut Vec<FtHit>) {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].pos.cmp(&b[j].pos) {
            std::cmp::Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                let pos = a[i].pos;
                i += 1;
                j += 1;
                // a block may hold several hits at one position
                while i < a.len() && a[i].pos == pos {
                    out.push(a[i]);
                    i += 1;
                }
                while j < b.len() && b[j].pos == pos {
                    j += 1;
                }
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
}

/// Hits of `a` not covered by any hit of `b`
///
/// A hit is covered when some hit of `b` starts at or before it and ends at
/// or after it. Both blocks are sorted by start, so a running maximum of the
/// ends seen in `b` decides coverage in one pass.
pub fn exclude_hits(a: &[FtHit], b: &[FtHit], out: &mut Vec<FtHit>) {
    let mut j = 0;
    let mut reach: Option<u32> = None;
    for hit in a {
        while j < b.len() && b[j].pos <= hit.pos {
            reach = Some(reach.map_or(b[j].end, |r| r.max(b[j].end)));
            j += 1;
        }
        if reach.map_or(true, |r| r < hit.end) {
            out.push(*hit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(pos: u32, level: u16) -> FtHit {
        FtHit::new(pos, pos, level)
    }

    #[test]
    fn test_id_set_operations() {
        let a = [1, 3, 5, 7];
        let b = [3, 4, 7, 9];
        assert_eq!(intersect_sorted(&a, &b), vec![3, 7]);
        assert_eq!(union_sorted(&a, &b), vec![1, 3, 4, 5, 7, 9]);
        assert_eq!(difference_sorted(&a, &b), vec![1, 5]);
        assert_eq!(difference_sorted(&a, &[]), a.to_vec());
        assert!(intersect_sorted(&[], &b).is_empty());
    }

    #[test]
    fn test_merge_hits_shifts_levels() {
        let mut out = Vec::new();
        merge_hits(&[hit(1, 0), hit(4, 0)], &[hit(1, 0), hit(2, 0)], 1, &mut out);
        let seen: Vec<(u32, u16)> = out.iter().map(|h| (h.pos, h.level)).collect();
        assert_eq!(seen, vec![(1, 0), (1, 1), (2, 1), (4, 0)]);
    }

    #[test]
    fn test_union_hits_collapses_duplicates() {
        let mut out = Vec::new();
        union_hits(&[hit(1, 0), hit(5, 0)], &[hit(1, 0), hit(3, 0)], &mut out);
        let seen: Vec<u32> = out.iter().map(|h| h.pos).collect();
        assert_eq!(seen, vec![1, 3, 5]);
    }

    #[test]
    fn test_exclude_hits() {
        let mut out = Vec::new();
        exclude_hits(&[hit(5, 0), hit(9, 0)], &[hit(9, 0)], &mut out);
        assert_eq!(out, vec![hit(5, 0)]);

        // a phrase hit covering positions 3..=4 removes the single word at 4
        let mut out = Vec::new();
        exclude_hits(&[hit(2, 0), hit(4, 0)], &[FtHit::new(3, 4, 0)], &mut out);
        assert_eq!(out, vec![hit(2, 0)]);
    }
}
