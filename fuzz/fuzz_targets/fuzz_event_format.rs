#![no_main]

use libfuzzer_sys::fuzz_target;
use lipc::protocol::event::parse_format;

fuzz_target!(|data: &[u8]| {
    // Fuzz event format parsing - test for panics on malformed specifiers
    if let Ok(format) = std::str::from_utf8(data) {
        let _ = parse_format(format);
    }
});
