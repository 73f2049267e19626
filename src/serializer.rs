//! Serializer (spec §4.5) and order bitstream packer (spec §4.6).
//!
//! Writes the fixed-offset output blob from a `TransformedSong` +
//! `EncodedSong` pair plus the pattern placement the [`crate::placer`]
//! module computed.

use std::collections::HashMap;

use enumflags2::BitFlags;
use tracing::debug;

use crate::constants::{
    ARP_OFFSET, BITSTREAM_OFFSET, DELTA_BASE_OFFSET, DICT_ARRAY_SIZE, FILTER_OFFSET, INST_OFFSET,
    MAX_ARP_SIZE, MAX_FILTER_SIZE, ORDER_STEP_BYTES, OUTPUT_SIZE, PACKED_PTRS_OFFSET,
    ROW_DICT_OFFSET, TRANS_BASE_OFFSET,
};
use crate::err::ParseDefect;
use crate::model::{EncodedSong, OrderIndexTables, TransformedSong};
use crate::placer::PlacementResult;

/// Tuning inputs the legacy `serialize` entry point (spec §9) zeroes out:
/// the delta/transpose index tables and the dict/transpose/delta base
/// bytes.
#[derive(Debug, Clone, Default)]
pub struct SerializeTuning {
    pub order_tables: OrderIndexTables,
}

/// Computes, per channel, the relative transpose and trackptr indices that
/// feed the order bitstream packer (spec §4.6).
fn relative_order_indices(
    temp_transpose: &[u8],
    temp_trackptr: &[u16],
    tables: &OrderIndexTables,
) -> (Vec<u8>, Vec<u8>) {
    let mut rel_transpose = Vec::with_capacity(temp_transpose.len());
    let mut rel_trackptr = Vec::with_capacity(temp_trackptr.len());
    let mut prev: i32 = tables.start_const;

    for (&transpose_byte, &trackptr) in temp_transpose.iter().zip(temp_trackptr.iter()) {
        let transpose = transpose_byte as i8;
        rel_transpose.push(*tables.transpose_to_idx.get(&transpose).unwrap_or(&tables.transpose_base));

        let mut delta = i32::from(trackptr) - prev;
        if delta > 127 {
            delta -= 256;
        } else if delta < -128 {
            delta += 256;
        }
        let delta = delta as i16;
        rel_trackptr.push(*tables.delta_to_idx.get(&delta).unwrap_or(&tables.delta_base));

        prev = i32::from(trackptr);
    }

    (rel_transpose, rel_trackptr)
}

/// Packs the delta-encoded order bitstream (spec §4.6). `PackOrderBitstream`
/// is documented in `spec.md` as a black box whose real byte layout is an
/// undocumented downstream-engine contract (spec §9, Open Question); the
/// layout below is this crate's own concrete choice — 3 trackptr-index
/// bytes followed by one byte folding the 3 transpose indices together —
/// picked to satisfy the one property the spec does pin down
/// (`4 * num_orders` bytes, fully determined by its inputs). See
/// `DESIGN.md` for why an exact upstream match isn't attemptable here.
fn pack_order_bitstream(num_orders: usize, rel_transpose: &[[u8; 3]], rel_trackptr: &[[u8; 3]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(num_orders * ORDER_STEP_BYTES);
    for i in 0..num_orders {
        let t = rel_trackptr[i];
        let p = rel_transpose[i];
        out.push(t[0]);
        out.push(t[1]);
        out.push(t[2]);
        out.push(p[0] ^ p[1].rotate_left(3) ^ p[2].rotate_left(5));
    }
    out
}

fn write_at(buf: &mut [u8], offset: usize, bytes: &[u8]) {
    let end = (offset + bytes.len()).min(buf.len());
    if offset >= buf.len() {
        return;
    }
    let n = end - offset;
    buf[offset..end].copy_from_slice(&bytes[..n]);
}

/// Writes a pattern pointer table entry: low byte is the offset's low 8
/// bits, high byte packs the offset's high bits with the 3-bit gap code in
/// the top 3 bits (spec §4.5).
fn pointer_bytes(offset: u16, gap_code: u8) -> [u8; 2] {
    let lo = (offset & 0xFF) as u8;
    let hi = ((offset >> 8) as u8) | (gap_code << 5);
    [lo, hi]
}

/// Writes the instrument data region, applying the optional wave-index
/// remap (spec §4.5).
fn write_instruments(buf: &mut [u8], song: &TransformedSong, num_instruments: usize) {
    let mut data = song.instrument_data.clone();
    if let Some(remap) = &song.wave_remap {
        // Column layout: field p occupies [p * num_instruments, (p+1) * num_instruments).
        // Instrument index i (1-based per spec.md §4.5: "for instrument i in [1, numInst]").
        const WAVE_START_FIELD: usize = 2;
        const WAVE_END_FIELD: usize = 3;
        const WAVE_LOOP_FIELD: usize = 4;
        for (&inst_idx, remap) in remap {
            if inst_idx == 0 || inst_idx > num_instruments {
                continue;
            }
            let col = |field: usize| field * num_instruments + (inst_idx - 1);
            if let Some(slot) = data.get_mut(col(WAVE_START_FIELD)) {
                *slot = remap.wave_start;
            }
            if let Some(slot) = data.get_mut(col(WAVE_END_FIELD)) {
                *slot = if remap.wave_end == 255 {
                    remap.wave_end
                } else {
                    remap.wave_end + 1
                };
            }
            if let Some(slot) = data.get_mut(col(WAVE_LOOP_FIELD)) {
                *slot = remap.wave_loop;
            }
        }
    }
    write_at(buf, INST_OFFSET, &data);
}

fn write_row_dict(buf: &mut [u8], row_dict: &[u8]) {
    let num_entries = row_dict.len() / 3;
    for i in 1..num_entries {
        for k in 0..3 {
            let dst = ROW_DICT_OFFSET + k * DICT_ARRAY_SIZE + (i - 1);
            if dst < buf.len() {
                buf[dst] = row_dict[3 * i + k];
            }
        }
    }
}

fn write_pattern_pointers(
    buf: &mut [u8],
    encoded: &EncodedSong,
    placement: &PlacementResult,
) {
    for (i, &canon_idx) in encoded.pattern_canon.iter().enumerate() {
        let offset = placement
            .canonical_offsets
            .get(canon_idx)
            .copied()
            .unwrap_or(0) as u16;
        let gap_code = encoded.pattern_gap_codes.get(i).copied().unwrap_or(0);
        let bytes = pointer_bytes(offset, gap_code);
        write_at(buf, PACKED_PTRS_OFFSET + i * 2, &bytes);
    }
}

fn trim_trailing_zeros(buf: Vec<u8>) -> Vec<u8> {
    match buf.iter().rposition(|&b| b != 0) {
        Some(last) => {
            let mut buf = buf;
            buf.truncate(last + 1);
            buf
        }
        None => Vec::new(),
    }
}

/// Full serializer (spec §4.5) with wave remap, dict/order tuning, and end
/// trimming. This is the primary entry point new callers should use.
///
/// Returns the serialized blob alongside any non-fatal defects observed
/// while writing it — currently just the filter/arp table truncations,
/// the only place in the pipeline where this stage's own inputs can
/// exceed their output-region capacity (spec §3, `TruncatedFilterTable`/
/// `TruncatedArpTable`).
pub fn serialize_with_wave_remap(
    song: &TransformedSong,
    encoded: &EncodedSong,
    placement: &PlacementResult,
    tuning: &SerializeTuning,
) -> (Vec<u8>, BitFlags<ParseDefect>) {
    let mut defects = BitFlags::empty();
    let num_patterns = encoded.pattern_canon.len();
    let num_instruments = song.instrument_data.len() / crate::model::Instrument::FIELD_COUNT;
    // Zero-initialized buffer sized so every fixed-offset region and the
    // pattern data past it has room (spec §4.5); trimmed to the last
    // non-zero byte at the end (spec §3 invariant).
    let mut buf = vec![0u8; OUTPUT_SIZE];

    write_instruments(&mut buf, song, num_instruments);

    let num_orders = song.temp_trackptr[0].len();
    let mut rel_transpose_per_channel = [Vec::new(), Vec::new(), Vec::new()];
    let mut rel_trackptr_per_channel = [Vec::new(), Vec::new(), Vec::new()];
    for c in 0..3 {
        let (rel_t, rel_p) = relative_order_indices(
            &song.temp_transpose[c],
            &song.temp_trackptr[c],
            &tuning.order_tables,
        );
        rel_transpose_per_channel[c] = rel_t;
        rel_trackptr_per_channel[c] = rel_p;
    }
    let rel_transpose_steps: Vec<[u8; 3]> = (0..num_orders)
        .map(|i| [
            rel_transpose_per_channel[0][i],
            rel_transpose_per_channel[1][i],
            rel_transpose_per_channel[2][i],
        ])
        .collect();
    let rel_trackptr_steps: Vec<[u8; 3]> = (0..num_orders)
        .map(|i| [
            rel_trackptr_per_channel[0][i],
            rel_trackptr_per_channel[1][i],
            rel_trackptr_per_channel[2][i],
        ])
        .collect();
    let bitstream = pack_order_bitstream(num_orders, &rel_transpose_steps, &rel_trackptr_steps);
    write_at(&mut buf, BITSTREAM_OFFSET, &bitstream);

    if song.filter_table.len() > MAX_FILTER_SIZE {
        defects.insert(ParseDefect::TruncatedFilterTable);
    }
    let filter = &song.filter_table[..song.filter_table.len().min(MAX_FILTER_SIZE)];
    write_at(&mut buf, FILTER_OFFSET, filter);

    if song.arp_table.len() > MAX_ARP_SIZE {
        defects.insert(ParseDefect::TruncatedArpTable);
    }
    let arp = &song.arp_table[..song.arp_table.len().min(MAX_ARP_SIZE)];
    write_at(&mut buf, ARP_OFFSET, arp);

    write_at(&mut buf, TRANS_BASE_OFFSET, &[tuning.order_tables.transpose_base]);
    write_at(&mut buf, DELTA_BASE_OFFSET, &[tuning.order_tables.delta_base]);

    write_row_dict(&mut buf, &song.row_dict);

    write_pattern_pointers(&mut buf, encoded, placement);

    for gap in &placement.gap_placements {
        write_at(&mut buf, gap.start, &gap.bytes);
    }

    write_at(&mut buf, placement.main_arena_start, &placement.main_arena);

    let out = trim_trailing_zeros(buf);
    debug!(len = out.len(), num_patterns, ?defects, "serialized song");
    (out, defects)
}

/// Legacy entry point (spec §9): produces a non-trimmed, `OUTPUT_SIZE`-byte
/// blob with all tuning tables (dict bases, order index maps) zeroed. Kept
/// for parity with the teacher's habit of leaving an old, simpler API
/// reachable rather than deleting it outright.
pub fn serialize(
    song: &TransformedSong,
    encoded: &EncodedSong,
    placement: &PlacementResult,
) -> (Vec<u8>, BitFlags<ParseDefect>) {
    let tuning = SerializeTuning {
        order_tables: OrderIndexTables {
            delta_to_idx: HashMap::new(),
            transpose_to_idx: HashMap::new(),
            delta_base: 0,
            transpose_base: 0,
            start_const: 0,
        },
    };
    let (mut buf, defects) = serialize_with_wave_remap(song, encoded, placement, &tuning);
    buf.resize(OUTPUT_SIZE, 0);
    (buf, defects)
}
