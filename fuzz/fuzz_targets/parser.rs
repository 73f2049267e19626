#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let (addrs, _) = chiptune_repack::extract_table_addresses(data);
    chiptune_repack::parser::parse_song(data, &addrs);
});
