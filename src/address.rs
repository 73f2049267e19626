//! Address Extractor (spec §4.1).
//!
//! Reads a handful of fixed code-site offsets out of an untagged source
//! image and rebases every recovered pointer into a file offset. Like the
//! teacher's `ImpulseHeader::load_from_buf`, this never fails: bytes beyond
//! the buffer's end read as zero instead of panicking or erroring, because
//! `spec.md` §4.1 explicitly states address extraction "never fails".

use enumflags2::BitFlags;
use tracing::trace;

use crate::constants::code_sites;
use crate::err::ParseDefect;
use crate::model::TableAddresses;

/// Reads a little-endian `u16` at `offset`, treating any byte past the end
/// of `raw` as zero.
fn read_u16_le(raw: &[u8], offset: usize) -> u16 {
    let lo = raw.get(offset).copied().unwrap_or(0);
    let hi = raw.get(offset + 1).copied().unwrap_or(0);
    u16::from_le_bytes([lo, hi])
}

/// Extracts [`TableAddresses`] from a raw source image.
///
/// Every address field is expressed as a file offset (source pointer minus
/// `base_addr`); `base_addr` itself comes from byte 2 of the image shifted
/// left 8 (spec §4.1).
pub fn extract_table_addresses(raw: &[u8]) -> (TableAddresses, BitFlags<ParseDefect>) {
    let mut defects = BitFlags::empty();

    let base_addr = u32::from(raw.get(2).copied().unwrap_or(0)) << crate::constants::BASE_ADDR_SHIFT;

    let rebase = |word_offset: usize| -> usize {
        let abs = u32::from(read_u16_le(raw, word_offset));
        abs.wrapping_sub(base_addr) as usize
    };

    let song_start = rebase(code_sites::SONG_START);
    let transpose = code_sites::TRANSPOSE.map(rebase);
    let track_lo = code_sites::TRACK_LO.map(rebase);
    let track_hi = code_sites::TRACK_HI.map(rebase);
    let inst_ad = rebase(code_sites::INST_AD);
    let inst_sr = rebase(code_sites::INST_SR);
    let wavetable = rebase(code_sites::WAVETABLE);
    let arptable = rebase(code_sites::ARPTABLE);
    let filtertable = rebase(code_sites::FILTERTABLE);

    let num_instruments = inst_sr.saturating_sub(inst_ad);

    let raw_num_orders = track_lo[0] as isize - transpose[0] as isize;
    let num_orders = if raw_num_orders >= 1 && raw_num_orders <= 255 {
        raw_num_orders as usize
    } else {
        defects.insert(ParseDefect::OrderCountClamped);
        255
    };

    trace!(
        base_addr,
        song_start,
        num_instruments,
        num_orders,
        "extracted table addresses"
    );

    (
        TableAddresses {
            base_addr,
            song_start,
            transpose,
            track_lo,
            track_hi,
            inst_ad,
            inst_sr,
            wavetable,
            arptable,
            filtertable,
            num_instruments,
            num_orders,
        },
        defects,
    )
}
