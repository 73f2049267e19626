//! Plain data types shared between the parser and the serializer.
//!
//! Nothing here owns a runtime behavior beyond small constructors: the
//! parser and serializer are free functions over these records (§9,
//! "Polymorphism requirement").

use std::collections::HashMap;

use crate::constants::INSTRUMENT_PARAM_COUNT;

/// File-offset form of every pointer the address extractor recovers (§3).
/// All fields are file offsets (source pointer minus `base_addr`), not
/// absolute source addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableAddresses {
    pub base_addr: u32,
    pub song_start: usize,
    pub transpose: [usize; 3],
    pub track_lo: [usize; 3],
    pub track_hi: [usize; 3],
    pub inst_ad: usize,
    pub inst_sr: usize,
    pub wavetable: usize,
    pub arptable: usize,
    pub filtertable: usize,
    pub num_instruments: usize,
    pub num_orders: usize,
}

/// One tracker cell, unpacked from 3 source bytes (§3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Row {
    pub note: u8,
    pub inst: u8,
    pub effect: u8,
    pub param: u8,
}

impl Row {
    /// Unpacks a row from its 3 source bytes.
    pub fn from_bytes(b0: u8, b1: u8, b2: u8) -> Self {
        Self {
            note: b0 & 0x7F,
            inst: b1 & 0x1F,
            effect: (b1 >> 5) | ((b0 >> 4) & 0x08),
            param: b2,
        }
    }

    /// Packs a row back into its 3 source bytes. Used by the round-trip
    /// property tests (§8 property 7); not needed by the pipeline itself.
    pub fn to_bytes(self) -> (u8, u8, u8) {
        let b0 = (self.note & 0x7F) | ((self.effect & 0x08) << 4);
        let b1 = (self.inst & 0x1F) | ((self.effect & 0x07) << 5);
        let b2 = self.param;
        (b0, b1, b2)
    }
}

/// A decoded pattern: its original 16-bit source pointer (the dedup key)
/// plus 64 rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub address: u16,
    pub rows: Box<[Row; crate::constants::PATTERN_ROWS]>,
}

impl Pattern {
    pub fn new(address: u16, rows: [Row; crate::constants::PATTERN_ROWS]) -> Self {
        Self {
            address,
            rows: Box::new(rows),
        }
    }
}

/// One step in a channel's order list: which pattern to play and at what
/// transpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderEntry {
    pub pattern_addr: u16,
    pub transpose: i8,
}

impl Default for OrderEntry {
    fn default() -> Self {
        Self {
            pattern_addr: 0,
            transpose: 0,
        }
    }
}

/// One instrument's 16 column-major parameter bytes (§3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Instrument {
    pub ad: u8,
    pub sr: u8,
    pub wave_start: u8,
    pub wave_end: u8,
    pub wave_loop: u8,
    pub arp_start: u8,
    pub arp_end: u8,
    pub arp_loop: u8,
    pub pulse_width_lo: u8,
    pub pulse_width_hi: u8,
    pub pulse_speed: u8,
    pub vib_depth_speed: u8,
    pub vib_delay: u8,
    pub filter_start: u8,
    pub filter_end: u8,
    pub filter_loop: u8,
}

impl Instrument {
    /// Order of the 16 column-major fields as laid out in the source image
    /// and in the output instrument table.
    pub const FIELD_COUNT: usize = INSTRUMENT_PARAM_COUNT;

    pub fn field(&self, p: usize) -> u8 {
        match p {
            0 => self.ad,
            1 => self.sr,
            2 => self.wave_start,
            3 => self.wave_end,
            4 => self.wave_loop,
            5 => self.arp_start,
            6 => self.arp_end,
            7 => self.arp_loop,
            8 => self.pulse_width_lo,
            9 => self.pulse_width_hi,
            10 => self.pulse_speed,
            11 => self.vib_depth_speed,
            12 => self.vib_delay,
            13 => self.filter_start,
            14 => self.filter_end,
            15 => self.filter_loop,
            _ => unreachable!("instrument has exactly {} fields", Self::FIELD_COUNT),
        }
    }

    pub fn set_field(&mut self, p: usize, value: u8) {
        match p {
            0 => self.ad = value,
            1 => self.sr = value,
            2 => self.wave_start = value,
            3 => self.wave_end = value,
            4 => self.wave_loop = value,
            5 => self.arp_start = value,
            6 => self.arp_end = value,
            7 => self.arp_loop = value,
            8 => self.pulse_width_lo = value,
            9 => self.pulse_width_hi = value,
            10 => self.pulse_speed = value,
            11 => self.vib_depth_speed = value,
            12 => self.vib_delay = value,
            13 => self.filter_start = value,
            14 => self.filter_end = value,
            15 => self.filter_loop = value,
            _ => unreachable!("instrument has exactly {} fields", Self::FIELD_COUNT),
        }
    }
}

/// Fully decoded source song (§3). `patterns` is keyed by the original
/// 16-bit source pointer, which doubles as the dedup key during parsing.
#[derive(Debug, Clone)]
pub struct ParsedSong {
    pub base_addr: u32,
    pub instruments: Vec<Instrument>,
    pub patterns: HashMap<u16, Pattern>,
    pub orders: [Vec<OrderEntry>; 3],
    pub wavetable: Vec<u8>,
    pub arptable: Vec<u8>,
    pub filtertable: Vec<u8>,
    pub start_order: u8,
    pub num_orders: usize,
    pub addresses: TableAddresses,
}

/// A remap applied to one instrument's wave-envelope fields during
/// serialization (§4.5, Instrument data row).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveRemap {
    pub wave_start: u8,
    pub wave_end: u8,
    pub wave_loop: u8,
}

/// Produced by the (external) transform stage and consumed by the
/// serializer (§3, "TransformedSong / EncodedSong"). This crate only
/// defines the shape of the contract; populating it is the transform
/// stage's job.
#[derive(Debug, Clone, Default)]
pub struct TransformedSong {
    /// 16 * num_instruments bytes, column-major.
    pub instrument_data: Vec<u8>,
    pub filter_table: Vec<u8>,
    pub arp_table: Vec<u8>,
    /// Per-channel order lists after transformation.
    pub orders: [Vec<u8>; 3],
    /// Absolute transpose bytes per order step, per channel.
    pub temp_transpose: [Vec<u8>; 3],
    /// Absolute 16-bit trackptr values per order step, per channel.
    pub temp_trackptr: [Vec<u16>; 3],
    /// Dictionary bytes, length = 3 * num_dict_entries. Entry 0 is reserved.
    pub row_dict: Vec<u8>,
    pub wave_remap: Option<HashMap<usize, WaveRemap>>,
}

/// Per-canonical-pattern dedup/placement metadata produced upstream and
/// consumed by the placer and serializer (§3).
#[derive(Debug, Clone, Default)]
pub struct EncodedSong {
    /// Canonical (deduped) pattern byte streams.
    pub canon_patterns: Vec<Vec<u8>>,
    /// 3-bit gap code per canonical pattern.
    pub canon_gap_codes: Vec<u8>,
    /// Map from original pattern index to canonical index.
    pub pattern_canon: Vec<usize>,
    /// 3-bit tag per original pattern, written into the pointer's high byte.
    pub pattern_gap_codes: Vec<u8>,
    /// Fallback pre-packed blob, used only when `canon_patterns` is empty.
    pub packed_patterns: Vec<u8>,
    pub pattern_offsets: Vec<u16>,
}

/// Index translation tables supplied by the transform stage for the order
/// bitstream (§4.6, §6).
#[derive(Debug, Clone, Default)]
pub struct OrderIndexTables {
    pub delta_to_idx: HashMap<i16, u8>,
    pub transpose_to_idx: HashMap<i8, u8>,
    pub delta_base: u8,
    pub transpose_base: u8,
    pub start_const: i32,
}
