#![no_main]

use libfuzzer_sys::fuzz_target;

use chiptune_repack::placer::{place_patterns, GapLayout, PlacerConfig};
use chiptune_repack::serializer::{serialize_with_wave_remap, SerializeTuning};
use chiptune_repack::model::{EncodedSong, TransformedSong};

fuzz_target!(|data: &[u8]| {
    let (addrs, _) = chiptune_repack::extract_table_addresses(data);
    let (song, _) = chiptune_repack::parse_song(data, &addrs);

    let canon_patterns: Vec<Vec<u8>> = song
        .patterns
        .values()
        .map(|p| p.rows.iter().flat_map(|r| { let (a, b, c) = r.to_bytes(); [a, b, c] }).collect())
        .collect();

    let layout = GapLayout::default();
    let config = PlacerConfig { trial_count: 2 };
    let placement = place_patterns(&canon_patterns, canon_patterns.len(), &layout, &config, None);

    let transformed = TransformedSong {
        instrument_data: vec![0u8; song.instruments.len() * 16],
        filter_table: song.filtertable.clone(),
        arp_table: song.arptable.clone(),
        orders: Default::default(),
        temp_transpose: [vec![0], vec![0], vec![0]],
        temp_trackptr: [vec![0], vec![0], vec![0]],
        row_dict: vec![0, 0, 0],
        wave_remap: None,
    };
    let encoded = EncodedSong::default();

    let (out, _) = serialize_with_wave_remap(&transformed, &encoded, &placement, &SerializeTuning::default());
    assert!(out.len() <= chiptune_repack::constants::OUTPUT_SIZE);
});
