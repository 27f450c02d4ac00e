//! Fuzz target for JSON-lines record decoding.
//!
//! Run with: cargo +nightly fuzz run fuzz_record_parser
//!
//! Decodes arbitrary lines with `Record::from_line()` and probes dotted
//! field lookups on whatever decodes.

#![no_main]

use evloop_core::Record;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(record) = Record::from_line(line) {
        for key in record.as_map().keys() {
            let _ = record.get(key);
            let _ = record.number(&format!("{key}.{key}"));
        }
        let _ = record.number("a.b.c");
    }
});
