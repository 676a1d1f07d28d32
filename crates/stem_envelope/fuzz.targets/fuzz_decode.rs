#![no_main]
use libfuzzer_sys::fuzz_target;
use stem_envelope::Envelope;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must be rejected, never panic
    if let Ok(envelope) = Envelope::from_bytes(data) {
        let encoded = envelope.to_bytes().expect("decoded envelope re-encodes");
        let again = Envelope::from_bytes(&encoded).expect("re-encoded envelope decodes");
        assert_eq!(envelope, again);
    }
});
