#![no_main]

use libfuzzer_sys::fuzz_target;

const BASE: &str = "<!DOCTYPE html><html><head><style>:root { --c: red; }</style></head><body><main id=\"m\"><p class=\"a\">x</p></main></body></html>";

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let parsed = patch::parse_operations(text);
    for pair in parsed.windows(2) {
        assert!(pair[0].start <= pair[1].start);
    }
    for op in &parsed {
        assert!(op.start < op.end && op.end <= text.len());
    }
    let _ = patch::apply_operations(BASE, parsed.iter().map(|p| &p.op));
    let _ = patch::apply_operations(text, parsed.iter().map(|p| &p.op));
});
