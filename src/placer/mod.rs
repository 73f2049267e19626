//! Pattern Placer (spec §4.3).
//!
//! Assigns canonical pattern byte streams to the unused "gaps" between
//! fixed-offset output regions, falling back to a main arena for whatever
//! does not fit. The gap-filling subroutine and the arena both go through
//! the same [`superstring`] trial farm.

pub mod superstring;

use tracing::{debug, trace};

use crate::constants::{
    ARP_OFFSET, BITSTREAM_OFFSET, DICT_ARRAY_SIZE, FILTER_OFFSET, PACKED_PTRS_OFFSET,
    ROW_DICT_OFFSET, TRANS_BASE_OFFSET,
};
use crate::err::PlacerEvent;

/// Tunable knobs that are not part of the downstream engine's ABI (spec §6,
/// "Configuration"). Defaults match the spec's constants exactly; callers
/// (mainly tests) may shrink `trial_count` to make the superstring farm
/// cheaper without changing its semantics.
#[derive(Debug, Clone, Copy)]
pub struct PlacerConfig {
    pub trial_count: u32,
}

impl Default for PlacerConfig {
    fn default() -> Self {
        Self {
            trial_count: crate::constants::DEFAULT_SUPERSTRING_TRIALS,
        }
    }
}

/// Sizes needed to compute the gap inventory (spec §4.3). All come from the
/// already-built `TransformedSong`/`EncodedSong` the transform stage
/// produced; see `spec.md` §3.
#[derive(Debug, Clone, Copy, Default)]
pub struct GapLayout {
    pub inst_size: usize,
    pub bitstream_size: usize,
    pub filter_size: usize,
    pub arp_size: usize,
    pub num_dict_entries: usize,
}

#[derive(Debug, Clone, Copy)]
struct Gap {
    name: &'static str,
    start: usize,
    len: usize,
}

fn span(start: usize, end: usize) -> usize {
    end.saturating_sub(start)
}

/// Builds the 7-entry gap inventory in the fixed iteration order spec §4.3
/// requires (it is a protocol contract: reordering it changes output
/// bytes).
fn gap_inventory(layout: &GapLayout) -> [Gap; 7] {
    let dict_tail = layout.num_dict_entries.saturating_sub(1);
    [
        Gap {
            name: "inst",
            start: crate::constants::INST_OFFSET + layout.inst_size,
            len: span(crate::constants::INST_OFFSET + layout.inst_size, BITSTREAM_OFFSET),
        },
        Gap {
            name: "filter",
            start: FILTER_OFFSET + layout.filter_size,
            len: span(FILTER_OFFSET + layout.filter_size, ARP_OFFSET),
        },
        Gap {
            name: "arp",
            start: ARP_OFFSET + layout.arp_size,
            len: span(ARP_OFFSET + layout.arp_size, TRANS_BASE_OFFSET),
        },
        Gap {
            name: "dict-col-0",
            start: ROW_DICT_OFFSET + dict_tail,
            len: span(ROW_DICT_OFFSET + dict_tail, ROW_DICT_OFFSET + DICT_ARRAY_SIZE),
        },
        Gap {
            name: "dict-col-1",
            start: ROW_DICT_OFFSET + DICT_ARRAY_SIZE + dict_tail,
            len: span(
                ROW_DICT_OFFSET + DICT_ARRAY_SIZE + dict_tail,
                ROW_DICT_OFFSET + 2 * DICT_ARRAY_SIZE,
            ),
        },
        Gap {
            name: "dict-col-2",
            start: ROW_DICT_OFFSET + 2 * DICT_ARRAY_SIZE + dict_tail,
            len: span(
                ROW_DICT_OFFSET + 2 * DICT_ARRAY_SIZE + dict_tail,
                ROW_DICT_OFFSET + 3 * DICT_ARRAY_SIZE,
            ),
        },
        Gap {
            // Intentionally last: the gap order is a placement tie-break,
            // not just a memory map (spec §4.3).
            name: "bitstream",
            start: BITSTREAM_OFFSET + layout.bitstream_size,
            len: span(BITSTREAM_OFFSET + layout.bitstream_size, FILTER_OFFSET),
        },
    ]
}

/// Longest overlap, in either direction, between pattern `i` and any other
/// pattern (spec §4.3 step 1).
fn overlap_potentials(patterns: &[Vec<u8>]) -> Vec<usize> {
    let n = patterns.len();
    let mut potential = vec![0usize; n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let suffix_i_prefix_j = superstring::overlap_len(&patterns[i], &patterns[j]);
            let suffix_j_prefix_i = superstring::overlap_len(&patterns[j], &patterns[i]);
            potential[i] = potential[i].max(suffix_i_prefix_j).max(suffix_j_prefix_i);
        }
    }
    potential
}

/// Greedy best-fit bin assignment (spec §4.3 step 2): sorts patterns by
/// ascending overlap potential / descending size, then drops each into
/// whichever gap currently has the smallest remaining capacity that still
/// fits it. Returns, per canonical pattern index, the gap index it was
/// tentatively assigned to (or `None` if it never fit anywhere).
fn assign_to_gaps(patterns: &[Vec<u8>], gaps: &[Gap; 7]) -> Vec<Option<usize>> {
    let potentials = overlap_potentials(patterns);
    let mut order: Vec<usize> = (0..patterns.len()).collect();
    order.sort_by(|&a, &b| {
        potentials[a]
            .cmp(&potentials[b])
            .then_with(|| patterns[b].len().cmp(&patterns[a].len()))
    });

    let mut remaining: [usize; 7] = gaps.map(|g| g.len);
    let mut assignment = vec![None; patterns.len()];

    for idx in order {
        let plen = patterns[idx].len();
        let mut best_gap: Option<usize> = None;
        for (g, &cap) in remaining.iter().enumerate() {
            if cap < plen {
                continue;
            }
            match best_gap {
                None => best_gap = Some(g),
                Some(bg) if cap < remaining[bg] => best_gap = Some(g),
                _ => {}
            }
        }
        if let Some(g) = best_gap {
            assignment[idx] = Some(g);
            remaining[g] -= plen;
        }
    }

    assignment
}

/// One filled gap, ready to be overlaid onto the output buffer.
#[derive(Debug, Clone)]
pub struct GapPlacement {
    pub start: usize,
    pub bytes: Vec<u8>,
}

/// Everything the serializer needs to lay pattern data into the output
/// buffer (spec §4.3 "Output").
#[derive(Debug, Clone)]
pub struct PlacementResult {
    /// Absolute offset per canonical pattern index.
    pub canonical_offsets: Vec<usize>,
    pub gap_placements: Vec<GapPlacement>,
    pub main_arena_start: usize,
    pub main_arena: Vec<u8>,
}

/// Assigns canonical patterns to gaps (falling back to the main arena),
/// running the superstring overlay (spec §4.4) for each filled region.
///
/// `num_patterns` is the total number of *original* (pre-dedup) patterns;
/// it only affects where the main arena starts (spec §4.3).
pub fn place_patterns(
    canon_patterns: &[Vec<u8>],
    num_patterns: usize,
    layout: &GapLayout,
    config: &PlacerConfig,
    mut on_event: Option<&mut dyn FnMut(PlacerEvent)>,
) -> PlacementResult {
    let gaps = gap_inventory(layout);
    let tentative = assign_to_gaps(canon_patterns, &gaps);

    let mut canonical_offsets = vec![0usize; canon_patterns.len()];
    let mut gap_placements = Vec::new();
    let mut arena_indices: Vec<usize> = Vec::new();

    for (gap_idx, gap) in gaps.iter().enumerate() {
        let members: Vec<usize> = (0..canon_patterns.len())
            .filter(|&i| tentative[i] == Some(gap_idx))
            .collect();
        if members.is_empty() {
            continue;
        }

        let refs: Vec<&[u8]> = members.iter().map(|&i| canon_patterns[i].as_slice()).collect();
        let (blob, offsets, seed) = superstring::pack_patterns(&refs, config.trial_count);

        if blob.len() <= gap.len {
            trace!(gap = gap.name, winning_seed = seed, packed_len = blob.len(), "gap filled");
            if let Some(cb) = on_event.as_deref_mut() {
                cb(PlacerEvent::GapFilled {
                    gap_name: gap.name,
                    pattern_indices: members.clone(),
                    packed_len: blob.len(),
                    gap_capacity: gap.len,
                });
            }
            for (member_pos, &pattern_idx) in members.iter().enumerate() {
                canonical_offsets[pattern_idx] = gap.start + offsets[member_pos];
            }
            gap_placements.push(GapPlacement {
                start: gap.start,
                bytes: blob,
            });
        } else {
            debug!(gap = gap.name, packed_len = blob.len(), capacity = gap.len, "gap overflowed");
            if let Some(cb) = on_event.as_deref_mut() {
                cb(PlacerEvent::GapOverflowed {
                    gap_name: gap.name,
                    pattern_indices: members.clone(),
                    packed_len: blob.len(),
                    gap_capacity: gap.len,
                });
            }
            arena_indices.extend(members);
        }
    }

    arena_indices.extend((0..canon_patterns.len()).filter(|i| tentative[*i].is_none()));
    arena_indices.sort_unstable();
    arena_indices.dedup();

    let main_arena_start = PACKED_PTRS_OFFSET + num_patterns * 2;
    let refs: Vec<&[u8]> = arena_indices
        .iter()
        .map(|&i| canon_patterns[i].as_slice())
        .collect();
    let (main_arena, offsets, seed) = superstring::pack_patterns(&refs, config.trial_count);
    if let Some(cb) = on_event.as_deref_mut() {
        cb(PlacerEvent::ArenaPacked {
            winning_seed: seed,
            packed_len: main_arena.len(),
        });
    }
    for (pos, &pattern_idx) in arena_indices.iter().enumerate() {
        canonical_offsets[pattern_idx] = main_arena_start + offsets[pos];
    }

    PlacementResult {
        canonical_offsets,
        gap_placements,
        main_arena_start,
        main_arena,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout_with_room() -> GapLayout {
        GapLayout {
            inst_size: 0,
            bitstream_size: 0,
            filter_size: 0,
            arp_size: 0,
            num_dict_entries: 1,
        }
    }

    #[test]
    fn empty_pattern_set_produces_empty_arena() {
        let result = place_patterns(&[], 0, &layout_with_room(), &PlacerConfig { trial_count: 4 }, None);
        assert!(result.main_arena.is_empty());
        assert!(result.gap_placements.is_empty());
        assert_eq!(result.main_arena_start, PACKED_PTRS_OFFSET);
    }

    #[test]
    fn single_pattern_fits_in_a_gap() {
        let pattern = vec![0u8; 192];
        let result = place_patterns(
            &[pattern.clone()],
            1,
            &layout_with_room(),
            &PlacerConfig { trial_count: 4 },
            None,
        );
        // the pattern must end up recorded as a verbatim substring either
        // in a gap or in the main arena.
        let off = result.canonical_offsets[0];
        if let Some(gap) = result.gap_placements.iter().find(|g| off >= g.start && off < g.start + g.bytes.len()) {
            let local = off - gap.start;
            assert_eq!(&gap.bytes[local..local + pattern.len()], pattern.as_slice());
        } else {
            let local = off - result.main_arena_start;
            assert_eq!(&result.main_arena[local..local + pattern.len()], pattern.as_slice());
        }
    }

    #[test]
    fn oversized_pattern_overflows_to_arena() {
        // Shrink every gap below 200 bytes; a 200-byte pattern must decline
        // all of them and fall back to the main arena (spec §8 scenario e).
        use crate::constants::{ARP_OFFSET, BITSTREAM_OFFSET, FILTER_OFFSET, TRANS_BASE_OFFSET};
        let layout = GapLayout {
            inst_size: BITSTREAM_OFFSET - 50,
            bitstream_size: (FILTER_OFFSET - BITSTREAM_OFFSET) - 50,
            filter_size: (ARP_OFFSET - FILTER_OFFSET) - 50,
            arp_size: (TRANS_BASE_OFFSET - ARP_OFFSET) - 50,
            num_dict_entries: 200, // shrinks each 365-byte dict tail to 166 bytes
        };
        let pattern = vec![7u8; 200];
        let result = place_patterns(
            &[pattern.clone()],
            1,
            &layout,
            &PlacerConfig { trial_count: 2 },
            None,
        );
        assert!(result.gap_placements.is_empty());
        let local = result.canonical_offsets[0] - result.main_arena_start;
        assert_eq!(&result.main_arena[local..local + pattern.len()], pattern.as_slice());
    }

    #[test]
    fn two_identical_patterns_map_to_one_copy() {
        let p = vec![3u8; 50];
        let result = place_patterns(
            &[p.clone(), p.clone()],
            2,
            &layout_with_room(),
            &PlacerConfig { trial_count: 4 },
            None,
        );
        assert_eq!(result.canonical_offsets[0], result.canonical_offsets[1]);
    }

    #[test]
    fn gap_order_is_fixed() {
        let layout = layout_with_room();
        let gaps = gap_inventory(&layout);
        let names: Vec<&str> = gaps.iter().map(|g| g.name).collect();
        assert_eq!(
            names,
            ["inst", "filter", "arp", "dict-col-0", "dict-col-1", "dict-col-2", "bitstream"]
        );
    }
}
