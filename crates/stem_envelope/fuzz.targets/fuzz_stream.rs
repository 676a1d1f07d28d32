#![no_main]
use libfuzzer_sys::fuzz_target;
use stem_envelope::EnvelopeReader;

fuzz_target!(|data: &[u8]| {
    // Small thresholds push most payloads through the spool path
    let reader = EnvelopeReader::new()
        .with_spill_threshold(64)
        .with_chunk_size(7)
        .with_max_meta_len(1 << 16);
    let mut input = data;
    while let Ok(envelope) = reader.read(&mut input) {
        assert!(envelope.payload.len() <= data.len());
    }
});
