#![no_main]

use libfuzzer_sys::fuzz_target;
use patch::IncrementalApplier;

const BASE: &str = "<html><head></head><body><section id=\"hero\">Old</section></body></html>";

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let mut streamed = IncrementalApplier::new(BASE);
    for (end, _) in text.char_indices().step_by(7) {
        streamed.update(&text[..end]);
    }
    streamed.finalize(text);
    // Every operation of the complete text has been consumed.
    assert!(streamed.applied_count() >= patch::parse_operations(text).len());
});
