//! Fixed offsets and sizes dictated by the downstream hardware engine's ABI.
//! None of these are tunable: changing one changes the bytes a real engine
//! expects to load at its base address.

/// Page-aligned origin bit shift applied to byte 2 of the source image.
pub const BASE_ADDR_SHIFT: u32 = 8;

/// Fixed code-site offsets probed by the address extractor (§4.1).
pub mod code_sites {
    pub const SONG_START: usize = 0x003B;
    pub const TRANSPOSE: [usize; 3] = [0x00BA, 0x00CE, 0x00E2];
    pub const TRACK_LO: [usize; 3] = [0x00C0, 0x00D4, 0x00E8];
    pub const TRACK_HI: [usize; 3] = [0x00C3, 0x00D7, 0x00EB];
    pub const INST_AD: usize = 0x0520;
    pub const INST_SR: usize = 0x0526;
    pub const WAVETABLE: usize = 0x025F;
    pub const ARPTABLE: usize = 0x0281;
    pub const FILTERTABLE: usize = 0x015B;
}

/// A source pattern is 64 rows of 3 packed bytes each.
pub const PATTERN_ROWS: usize = 64;
pub const PATTERN_SOURCE_BYTES: usize = PATTERN_ROWS * 3;

/// Number of column-major parameter bytes per instrument (§3).
pub const INSTRUMENT_PARAM_COUNT: usize = 16;

/// Output blob layout (§5, "downstream engine ABI" — non-negotiable).
pub const INST_OFFSET: usize = 0x000;
pub const BITSTREAM_OFFSET: usize = 0x1F0;
pub const FILTER_OFFSET: usize = 0x5EC;
pub const ARP_OFFSET: usize = 0x6CF;
pub const TRANS_BASE_OFFSET: usize = 0x78B;
pub const DELTA_BASE_OFFSET: usize = 0x78C;
pub const ROW_DICT_OFFSET: usize = 0x78D;
pub const PACKED_PTRS_OFFSET: usize = 0xBD4;

pub const MAX_FILTER_SIZE: usize = 227;
pub const MAX_ARP_SIZE: usize = 188;
pub const DICT_ARRAY_SIZE: usize = 365;
pub const OUTPUT_SIZE: usize = 0x1000;

/// Bytes emitted per order step by the order bitstream packer (§4.6).
pub const ORDER_STEP_BYTES: usize = 4;

/// Number of extra randomized superstring trials run alongside the
/// deterministic baseline (§4.4 step 4).
pub const DEFAULT_SUPERSTRING_TRIALS: u32 = 64;

/// LCG constants used to deterministically shuffle each superstring trial's
/// input permutation (§4.4 step 4). Same constants as the glibc `rand()`
/// family; only used here as a fixed, reproducible shuffle source.
pub const LCG_MULTIPLIER: u32 = 1_103_515_245;
pub const LCG_INCREMENT: u32 = 12_345;
