#![no_main]
use iploc::validation::{validate_bytes, ValidationLevel};
use iploc::Locator;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Garbage must fail cleanly, never panic
    let _ = validate_bytes(data, ValidationLevel::Strict);

    if let Ok(locator) = Locator::from_bytes(data.to_vec()) {
        for addr in [0u32, 0x0101_0101, 0x7f00_0001, 0xc0a8_0001, u32::MAX] {
            let _ = locator.find_by_u32(addr);
        }
    }
});
