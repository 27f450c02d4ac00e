//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Feeds arbitrary UTF-8 to `AppConfig::parse()`, covering TOML decoding,
//! tool declarations, and validation.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data)
        && let Ok(config) = evloop_config::AppConfig::parse(s)
    {
        // Render the validated config and parse the rendering again.
        let rendered = toml::to_string(&config).unwrap_or_default();
        let _ = evloop_config::AppConfig::parse(&rendered);
        let _ = config.tool_names();
    }
});
