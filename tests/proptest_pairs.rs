//! Property tests for the sorted merge primitives
//!
//! Every merge is checked against a `BTreeSet` model of the same inputs.

use std::collections::BTreeSet;

use arbor::query::fulltext::{FtHit, FtMatches};
use arbor::query::pairs::{difference_sorted, exclude_hits, intersect_sorted, merge_hits, union_sorted};
use arbor::query::NodeSet;
use proptest::prelude::*;

fn arb_ids() -> impl Strategy<Value = BTreeSet<u32>> {
    prop::collection::btree_set(0u32..200, 0..40)
}

/// Postings sorted by id then position
fn arb_postings() -> impl Strategy<Value = Vec<(u32, u32)>> {
    prop::collection::btree_set((0u32..30, 0u32..20), 0..60).prop_map(|set| set.into_iter().collect())
}

fn to_vec(set: &BTreeSet<u32>) -> Vec<u32> {
    set.iter().copied().collect()
}

fn point_hits(positions: &BTreeSet<u32>, level: u16) -> Vec<FtHit> {
    positions.iter().map(|&p| FtHit::new(p, p, level)).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// intersect_sorted agrees with set intersection
    #[test]
    fn intersect_matches_model(a in arb_ids(), b in arb_ids()) {
        let expected: Vec<u32> = a.intersection(&b).copied().collect();
        prop_assert_eq!(intersect_sorted(&to_vec(&a), &to_vec(&b)), expected);
    }

    /// union_sorted agrees with set union and keeps ids unique
    #[test]
    fn union_matches_model(a in arb_ids(), b in arb_ids()) {
        let expected: Vec<u32> = a.union(&b).copied().collect();
        prop_assert_eq!(union_sorted(&to_vec(&a), &to_vec(&b)), expected);
    }

    /// difference_sorted agrees with set difference
    #[test]
    fn difference_matches_model(a in arb_ids(), b in arb_ids()) {
        let expected: Vec<u32> = a.difference(&b).copied().collect();
        prop_assert_eq!(difference_sorted(&to_vec(&a), &to_vec(&b)), expected);
    }

    /// NodeSet normalizes any input order and merges like the model
    #[test]
    fn node_set_operations(a in prop::collection::vec(0u32..100, 0..50), b in arb_ids()) {
        let model_a: BTreeSet<u32> = a.iter().copied().collect();
        let left = NodeSet::from_unsorted(a);
        let right = NodeSet::from_sorted(to_vec(&b));
        let expected = to_vec(&model_a);
        prop_assert_eq!(left.ids(), expected.as_slice());
        prop_assert_eq!(left.union(&right).into_ids(), model_a.union(&b).copied().collect::<Vec<_>>());
        prop_assert_eq!(
            left.intersect(&right).into_ids(),
            model_a.intersection(&b).copied().collect::<Vec<_>>()
        );
        prop_assert_eq!(NodeSet::from_bitmap(&left.to_bitmap()), left);
    }

    /// merge_hits keeps every hit, orders by position and shifts right levels
    #[test]
    fn merge_hits_is_sorted(a in prop::collection::btree_set(0u32..50, 0..20),
                            b in prop::collection::btree_set(0u32..50, 0..20),
                            shift in 1u16..4) {
        let mut out = Vec::new();
        merge_hits(&point_hits(&a, 0), &point_hits(&b, 0), shift, &mut out);
        prop_assert_eq!(out.len(), a.len() + b.len());
        prop_assert!(out.windows(2).all(|w| w[0].pos <= w[1].pos));
        prop_assert_eq!(out.iter().filter(|h| h.level == shift).count(), b.len());
    }

    /// exclude_hits on single-token hits removes exactly the shared positions
    #[test]
    fn exclude_point_hits(a in prop::collection::btree_set(0u32..50, 0..20),
                          b in prop::collection::btree_set(0u32..50, 0..20)) {
        let mut out = Vec::new();
        exclude_hits(&point_hits(&a, 0), &point_hits(&b, 0), &mut out);
        let kept: Vec<u32> = out.iter().map(|h| h.pos).collect();
        prop_assert_eq!(kept, a.difference(&b).copied().collect::<Vec<_>>());
    }

    /// Match streams combine ids the way the id primitives do
    #[test]
    fn match_streams_follow_ids(a in arb_postings(), b in arb_postings()) {
        let left = FtMatches::from_postings(&a);
        let right = FtMatches::from_postings(&b);

        let both = left.intersect(&right);
        let expected = intersect_sorted(left.ids(), right.ids());
        prop_assert_eq!(both.ids(), expected.as_slice());
        prop_assert_eq!(both.levels(), 2);

        let any = left.union(&right);
        let expected = union_sorted(left.ids(), right.ids());
        prop_assert_eq!(any.ids(), expected.as_slice());
        let model: BTreeSet<(u32, u32)> = a.iter().chain(b.iter()).copied().collect();
        prop_assert_eq!(any.pairs(), model.into_iter().collect::<Vec<_>>());

        let rest = left.without_ids(&right);
        let expected = difference_sorted(left.ids(), right.ids());
        prop_assert_eq!(rest.ids(), expected.as_slice());

        // mild not never adds ids and never keeps a position present on the right
        let mild = left.mild_not(&right);
        let right_pairs: BTreeSet<(u32, u32)> = b.iter().copied().collect();
        prop_assert!(mild.pairs().iter().all(|p| !right_pairs.contains(p)));
        prop_assert!(mild.ids().iter().all(|id| left.ids().contains(id)));
    }
}
