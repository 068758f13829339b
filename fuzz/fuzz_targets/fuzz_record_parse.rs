#![no_main]
use iploc::Locator;
use libfuzzer_sys::fuzz_target;

/// One-range database whose only record is `record`
fn single_record_database(record: &[u8]) -> Vec<u8> {
    let text_offset: u32 = 4 + 1024 + 8 + 1024;
    let mut data = Vec::with_capacity(text_offset as usize + record.len());
    data.extend_from_slice(&text_offset.to_be_bytes());
    data.extend_from_slice(&[0u8; 1024]);
    data.extend_from_slice(&u32::MAX.to_be_bytes());
    data.extend_from_slice(&1024u32.to_le_bytes()[..3]);
    data.push(record.len() as u8);
    data.extend_from_slice(&[0u8; 1024]);
    data.extend_from_slice(record);
    data
}

fuzz_target!(|record: &[u8]| {
    if record.len() > u8::MAX as usize {
        return;
    }
    let data = single_record_database(record);

    let lenient = Locator::from_bytes(data.clone()).expect("well-formed header");
    let strict = Locator::from_bytes_builder(data)
        .strict_numeric_fields()
        .open()
        .expect("well-formed header");

    match (lenient.find_by_u32(0x0808_0808), strict.find_by_u32(0x0808_0808)) {
        // Strict parsing never accepts what lenient parsing rejects
        (Err(_), Ok(_)) => panic!("strict accepted a record lenient rejected"),
        (Ok(a), Ok(b)) => assert_eq!(a, b),
        _ => {}
    }
});
