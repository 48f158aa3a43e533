#![no_main]

use libfuzzer_sys::fuzz_target;
use lipc::HashArray;

fuzz_target!(|data: &[u8]| {
    // Restoring arbitrary bytes must fail cleanly, never panic
    if let Ok(ha) = HashArray::from_bytes(data) {
        let _ = ha.render();
        let _ = ha.to_bytes();
    }
});
