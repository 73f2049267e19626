//! Parses a 3-channel tracker-engine memory image and repacks its song
//! data into the fixed-offset binary layout a real hardware playback
//! engine expects to load at its base address.
//!
//! The pipeline runs in four stages, each its own module:
//! [`address`] recovers every code-site pointer as a file offset,
//! [`parser`] decodes instruments/patterns/orders/side-tables from those
//! offsets, [`placer`] assigns encoded pattern data to unused gaps (or the
//! main arena) via a shortest-common-superstring overlay, and
//! [`serializer`] writes the final blob.

pub mod address;
pub mod constants;
pub mod err;
pub mod model;
pub mod parser;
pub mod placer;
pub mod serializer;

pub use address::extract_table_addresses;
pub use model::{EncodedSong, OrderIndexTables, ParsedSong, TableAddresses, TransformedSong, WaveRemap};
pub use parser::parse_song;
pub use placer::{place_patterns, GapLayout, GapPlacement, PlacementResult, PlacerConfig};
pub use serializer::{serialize, serialize_with_wave_remap, SerializeTuning};
