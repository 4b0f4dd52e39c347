//! Pairwise covering-array tests against a brute-force oracle

use proptest::prelude::*;
use std::collections::BTreeSet;
use tcgen::covering_rows;

fn required_pairs(sizes: &[usize]) -> BTreeSet<(usize, usize, usize, usize)> {
    let mut pairs = BTreeSet::new();
    for i in 0..sizes.len() {
        for j in (i + 1)..sizes.len() {
            for a in 0..sizes[i] {
                for b in 0..sizes[j] {
                    pairs.insert((i, a, j, b));
                }
            }
        }
    }
    pairs
}

fn covered_pairs(rows: &[Vec<usize>]) -> BTreeSet<(usize, usize, usize, usize)> {
    let mut pairs = BTreeSet::new();
    for row in rows {
        for i in 0..row.len() {
            for j in (i + 1)..row.len() {
                pairs.insert((i, row[i], j, row[j]));
            }
        }
    }
    pairs
}

/// Smallest row count that covers every pair, by trying every subset
fn oracle_minimum(sizes: &[usize]) -> usize {
    let mut product: Vec<Vec<usize>> = vec![Vec::new()];
    for &size in sizes {
        product = product
            .into_iter()
            .flat_map(|prefix| {
                (0..size).map(move |v| {
                    let mut row = prefix.clone();
                    row.push(v);
                    row
                })
            })
            .collect();
    }
    let required = required_pairs(sizes);
    let n = product.len();
    (1..=n)
        .find(|&k| {
            (0u32..(1 << n))
                .filter(|mask| mask.count_ones() as usize == k)
                .any(|mask| {
                    let rows: Vec<Vec<usize>> = (0..n)
                        .filter(|i| mask & (1 << i) != 0)
                        .map(|i| product[i].clone())
                        .collect();
                    required.is_subset(&covered_pairs(&rows))
                })
        })
        .unwrap_or(n)
}

#[test]
fn two_binary_fields_need_all_four_rows() {
    let rows = covering_rows(&[2, 2], 4096);
    assert_eq!(rows.len(), 4);
    assert_eq!(oracle_minimum(&[2, 2]), 4);
    assert_eq!(covered_pairs(&rows), required_pairs(&[2, 2]));
}

#[test]
fn greedy_matches_oracle_on_small_arrays() {
    for sizes in [vec![2, 2, 2], vec![3, 2], vec![2, 3, 2]] {
        let rows = covering_rows(&sizes, 4096);
        assert!(required_pairs(&sizes).is_subset(&covered_pairs(&rows)));
        assert_eq!(rows.len(), oracle_minimum(&sizes), "sizes {:?}", sizes);
    }
}

proptest! {
    #[test]
    fn test_every_pair_is_covered(sizes in prop::collection::vec(1usize..5, 2..6), exhaustive in any::<bool>()) {
        let limit = if exhaustive { 4096 } else { 0 };
        let rows = covering_rows(&sizes, limit);
        prop_assert!(required_pairs(&sizes).is_subset(&covered_pairs(&rows)));
        prop_assert!(rows.iter().all(|row| row.len() == sizes.len()));
        prop_assert!(rows.iter().all(|row| row.iter().zip(&sizes).all(|(v, s)| v < s)));
    }

    #[test]
    fn test_rows_never_exceed_full_product(sizes in prop::collection::vec(1usize..4, 2..5)) {
        let rows = covering_rows(&sizes, 4096);
        let product: usize = sizes.iter().product();
        prop_assert!(rows.len() <= product);
        prop_assert_eq!(&rows, &covering_rows(&sizes, 4096));
    }
}
