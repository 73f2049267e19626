//! Diagnostic-only "error" types.
//!
//! The core is total (spec §7): nothing here is ever returned as a hard
//! failure. `ParseDefect` mirrors the shape of the teacher's own
//! `LoadDefect`/`BitFlags<LoadDefect>` pattern (`file/impulse_format/header.rs`
//! in the source tracker engine), but every variant here describes a
//! clamp/skip/truncate that already happened rather than a reason to abort.

use enumflags2::bitflags;

/// Non-fatal conditions observed while extracting addresses or parsing the
/// song. Collecting these never changes the bytes the parser produces.
#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseDefect {
    /// A code-site pointer or derived offset fell outside the image and was
    /// clamped or zero-filled.
    OutOfBoundsPointer,
    /// `num_orders` fell outside `[1, 255]` and was forced to 255.
    OrderCountClamped,
    /// An order entry referenced a pattern address that did not resolve to
    /// a full 192-byte region; the order entry was kept with no pattern.
    DroppedPatternReference,
    /// The source filter table ran past the image and was truncated.
    TruncatedFilterTable,
    /// The source arp table ran past the image and was truncated.
    TruncatedArpTable,
}

/// Emitted by the placer when `debugGaps`/`DebugCanon`-style introspection
/// is wanted (spec §7). Purely informational: no placement decision reads
/// these back.
#[derive(Debug, Clone)]
pub enum PlacerEvent {
    /// A gap accepted a set of canonical pattern indices at the given
    /// packed size.
    GapFilled {
        gap_name: &'static str,
        pattern_indices: Vec<usize>,
        packed_len: usize,
        gap_capacity: usize,
    },
    /// A gap's superstring overflowed its capacity; all tentative patterns
    /// fell back to the main arena.
    GapOverflowed {
        gap_name: &'static str,
        pattern_indices: Vec<usize>,
        packed_len: usize,
        gap_capacity: usize,
    },
    /// The main arena's superstring trial selection finished.
    ArenaPacked { winning_seed: u32, packed_len: usize },
}
