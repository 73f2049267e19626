//! Superstring Overlay (spec §4.4).
//!
//! A direct, non-incremental realization of the greedy shortest-common-
//! superstring heuristic: dedup, merge maximum-overlap pairs until none
//! overlap, then try 64 additional randomly-shuffled trials in parallel and
//! keep the shortest valid result. Spec §9 calls caching overlap
//! computations across trials "a permissible optimization", not a
//! requirement, so this implementation recomputes the overlap matrix each
//! merge step instead — the pattern counts this pipeline deals with (tens
//! of canonical patterns per gap or arena) make that the plainer, equally
//! correct choice.

use std::thread;

use crate::constants::{LCG_INCREMENT, LCG_MULTIPLIER};

/// Longest `l` in `[1, min(|a|, |b|)]` such that the last `l` bytes of `a`
/// equal the first `l` bytes of `b`. Returns 0 if no such `l` exists.
pub(crate) fn overlap_len(a: &[u8], b: &[u8]) -> usize {
    let max_l = a.len().min(b.len());
    for l in (1..=max_l).rev() {
        if a[a.len() - l..] == b[..l] {
            return l;
        }
    }
    0
}

/// Greedily merges maximum-overlap pairs of the strings named by `perm`
/// (given as indices into `unique_patterns`) until no live pair overlaps.
/// Returns the concatenated blob and, per unique-pattern index, its final
/// offset within that blob.
fn run_trial(unique_patterns: &[Vec<u8>], perm: &[usize]) -> (Vec<u8>, Vec<usize>) {
    let u = perm.len();
    let mut strings: Vec<Vec<u8>> = perm.iter().map(|&idx| unique_patterns[idx].clone()).collect();
    let mut alive = vec![true; u];
    // members[pos] = (unique_pattern_index, offset within strings[pos])
    let mut members: Vec<Vec<(usize, usize)>> =
        perm.iter().map(|&idx| vec![(idx, 0usize)]).collect();

    loop {
        let mut best: Option<(usize, usize, usize)> = None; // (i, j, overlap)
        for i in 0..u {
            if !alive[i] {
                continue;
            }
            for j in 0..u {
                if i == j || !alive[j] {
                    continue;
                }
                let l = overlap_len(&strings[i], &strings[j]);
                if l == 0 {
                    continue;
                }
                let is_better = match best {
                    None => true,
                    Some((_, _, best_l)) => l > best_l,
                };
                if is_better {
                    best = Some((i, j, l));
                }
            }
        }

        let Some((i, j, l)) = best else { break };
        let shift = strings[i].len() - l;
        strings[i].extend_from_slice(&strings[j][l..]);
        let mut j_members = std::mem::take(&mut members[j]);
        for (_, off) in j_members.iter_mut() {
            *off += shift;
        }
        members[i].extend(j_members);
        alive[j] = false;
    }

    let mut blob = Vec::new();
    let mut offsets = vec![0usize; unique_patterns.len()];
    for pos in 0..u {
        if !alive[pos] {
            continue;
        }
        let base = blob.len();
        for &(unique_idx, local_off) in &members[pos] {
            offsets[unique_idx] = base + local_off;
        }
        blob.extend_from_slice(&strings[pos]);
    }
    (blob, offsets)
}

/// Deterministic Fisher-Yates shuffle of `0..n`, seeded per spec §4.4 step 4.
fn shuffled_permutation(n: usize, seed: u32) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..n).collect();
    if n < 2 {
        return perm;
    }
    let mut state: u32 = seed.wrapping_mul(LCG_MULTIPLIER);
    for i in (1..n).rev() {
        state = state.wrapping_mul(LCG_MULTIPLIER).wrapping_add(LCG_INCREMENT);
        let draw = (state >> 16) & 0x7FFF;
        let j = (draw as usize) % (i + 1);
        perm.swap(i, j);
    }
    perm
}

fn validate(unique_patterns: &[Vec<u8>], blob: &[u8], offsets: &[usize]) -> bool {
    unique_patterns.iter().zip(offsets.iter()).all(|(p, &off)| {
        off.checked_add(p.len())
            .is_some_and(|end| end <= blob.len() && &blob[off..end] == p.as_slice())
    })
}

/// Packs `patterns` into a single superstring blob, returning the blob and
/// one absolute offset per input pattern (duplicates share an offset).
///
/// Runs the deterministic baseline merge plus `trial_count` randomly
/// shuffled retries in parallel (spec §4.4, §5), keeping the shortest valid
/// result. Ties are broken in favor of the lower trial seed, with the
/// baseline (conceptually seed 0) always losing a tie against any valid
/// shuffled trial — this replicates the source implementation's selection
/// behavior exactly (spec §9).
pub fn pack_patterns(patterns: &[&[u8]], trial_count: u32) -> (Vec<u8>, Vec<usize>, u32) {
    if patterns.is_empty() {
        return (Vec::new(), Vec::new(), 0);
    }

    let mut unique_patterns: Vec<Vec<u8>> = Vec::new();
    let mut unique_index_of: std::collections::HashMap<Vec<u8>, usize> =
        std::collections::HashMap::new();
    let mut dedup_of = Vec::with_capacity(patterns.len());
    for &p in patterns {
        let idx = *unique_index_of.entry(p.to_vec()).or_insert_with(|| {
            unique_patterns.push(p.to_vec());
            unique_patterns.len() - 1
        });
        dedup_of.push(idx);
    }

    let u = unique_patterns.len();
    let identity: Vec<usize> = (0..u).collect();
    let (baseline_blob, baseline_offsets) = run_trial(&unique_patterns, &identity);

    // (blob, offsets, seed); seed 0 marks the baseline for the tie-break rule.
    let mut best = (baseline_blob, baseline_offsets, 0u32);

    let trial_results: Vec<Option<(u32, Vec<u8>, Vec<usize>)>> = thread::scope(|scope| {
        let handles: Vec<_> = (1..=trial_count)
            .map(|seed| {
                let unique_patterns = &unique_patterns;
                scope.spawn(move || {
                    let perm = shuffled_permutation(u, seed);
                    let (blob, offsets) = run_trial(unique_patterns, &perm);
                    if validate(unique_patterns, &blob, &offsets) {
                        Some((seed, blob, offsets))
                    } else {
                        None
                    }
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (seed, blob, offsets) in trial_results.into_iter().flatten() {
        let shorter = blob.len() < best.0.len();
        let tie_beats_baseline = blob.len() == best.0.len() && best.2 == 0;
        if shorter || tie_beats_baseline {
            best = (blob, offsets, seed);
        }
    }

    let (blob, unique_offsets, winning_seed) = best;
    let offsets = dedup_of.iter().map(|&idx| unique_offsets[idx]).collect();
    (blob, offsets, winning_seed)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn empty_input_yields_empty_blob() {
        let (blob, offsets, _) = pack_patterns(&[], 8);
        assert!(blob.is_empty());
        assert!(offsets.is_empty());
    }

    #[test]
    fn single_pattern_is_unchanged() {
        let p = [1u8, 2, 3, 4, 5];
        let (blob, offsets, _) = pack_patterns(&[&p], 8);
        assert_eq!(blob, p);
        assert_eq!(offsets, vec![0]);
    }

    #[test]
    fn overlap_case_from_spec_scenario_d() {
        let p0 = [1u8, 2, 3, 4, 5];
        let p1 = [4u8, 5, 6, 7];
        let (blob, offsets, _) = pack_patterns(&[&p0, &p1], 8);
        assert_eq!(blob, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(offsets[0], 0);
        assert_eq!(offsets[1], 3);
    }

    #[test]
    fn identical_patterns_share_one_offset() {
        let p = [9u8, 8, 7];
        let (blob, offsets, _) = pack_patterns(&[&p, &p], 8);
        assert_eq!(blob, p);
        assert_eq!(offsets[0], offsets[1]);
    }

    #[test]
    fn never_exceeds_sum_of_lengths() {
        let p0 = [1u8, 2, 3];
        let p1 = [4u8, 5, 6];
        let p2 = [7u8, 8, 9];
        let (blob, _, _) = pack_patterns(&[&p0, &p1, &p2], 8);
        assert!(blob.len() <= p0.len() + p1.len() + p2.len());
    }

    #[test]
    fn every_pattern_is_a_verbatim_substring() {
        let p0 = [10u8, 20, 30, 40, 50];
        let p1 = [30u8, 40, 50, 60, 70];
        let p2 = [99u8, 98, 97];
        let patterns = [&p0[..], &p1[..], &p2[..]];
        let (blob, offsets, _) = pack_patterns(&patterns, 16);
        for (p, &off) in patterns.iter().zip(offsets.iter()) {
            assert_eq!(&blob[off..off + p.len()], *p);
        }
    }

    #[test]
    fn deterministic_across_repeated_runs() {
        let p0 = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let p1 = [5u8, 6, 7, 8, 9, 10];
        let p2 = [0u8, 1, 2, 3];
        let patterns = [&p0[..], &p1[..], &p2[..]];
        let a = pack_patterns(&patterns, 64);
        let b = pack_patterns(&patterns, 64);
        assert_eq!(a, b);
    }

    #[test]
    fn shuffle_is_reproducible_per_seed() {
        assert_eq!(shuffled_permutation(10, 7), shuffled_permutation(10, 7));
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut perm = shuffled_permutation(12, 42);
        perm.sort_unstable();
        assert_eq!(perm, (0..12).collect::<Vec<_>>());
    }

    proptest! {
        /// Spec §8 property 9: same inputs (including the trial count, which
        /// fixes the tie-break search space) always pack to byte-identical
        /// output.
        #[test]
        fn pack_patterns_is_deterministic_prop(
            patterns in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..12), 1..6)
        ) {
            let refs: Vec<&[u8]> = patterns.iter().map(|p| p.as_slice()).collect();
            let a = pack_patterns(&refs, 8);
            let b = pack_patterns(&refs, 8);
            prop_assert_eq!(a, b);
        }

        /// Spec §8 property 10: the packed blob never grows past the summed
        /// length of its (deduplicated) canonical patterns.
        #[test]
        fn pack_patterns_never_grows_prop(
            patterns in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..12), 1..6)
        ) {
            let refs: Vec<&[u8]> = patterns.iter().map(|p| p.as_slice()).collect();
            let (blob, _, _) = pack_patterns(&refs, 8);
            let sum: usize = patterns.iter().map(|p| p.len()).sum();
            prop_assert!(blob.len() <= sum);
        }

        /// Spec §8 property 1, specialized to the superstring stage: every
        /// input pattern is recoverable as a verbatim substring at its
        /// reported offset.
        #[test]
        fn every_pattern_is_a_substring_prop(
            patterns in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..12), 1..6)
        ) {
            let refs: Vec<&[u8]> = patterns.iter().map(|p| p.as_slice()).collect();
            let (blob, offsets, _) = pack_patterns(&refs, 8);
            for (p, &off) in patterns.iter().zip(offsets.iter()) {
                prop_assert_eq!(&blob[off..off + p.len()], p.as_slice());
            }
        }
    }
}
