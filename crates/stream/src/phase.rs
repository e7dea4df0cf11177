use patch::grammar;

/// Coarse progress of a response, used to decide what a preview can show.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    #[default]
    Head,
    Body,
    Complete,
}

/// What kind of response is arriving.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseMode {
    Patch,
    FullDocument,
}

pub fn response_mode(text: &str) -> Option<ResponseMode> {
    match grammar::classify_stream(text) {
        grammar::StreamKind::Undecided => None,
        grammar::StreamKind::Patch => Some(ResponseMode::Patch),
        grammar::StreamKind::Document => Some(ResponseMode::FullDocument),
    }
}

const BODY_OPEN: &[u8] = b"<body";
const CLOSERS: [&[u8]; 2] = [b"</body>", b"</html>"];

/// Monotonic phase detection over a growing buffer. Tag searches resume near
/// where the previous call stopped, so each byte is examined a bounded number of times.
#[derive(Clone, Debug, Default)]
pub(crate) struct PhaseTracker {
    phase: Phase,
    scanned: usize,
}

impl PhaseTracker {
    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn observe(&mut self, text: &str, mode: Option<ResponseMode>) -> Phase {
        let detected = match mode {
            None => Phase::Head,
            Some(ResponseMode::Patch) => {
                if grammar::has_stream_end(text) {
                    Phase::Complete
                } else {
                    Phase::Body
                }
            }
            Some(ResponseMode::FullDocument) => self.scan_document(text),
        };
        self.phase = self.phase.max(detected);
        self.phase
    }

    fn scan_document(&mut self, text: &str) -> Phase {
        let bytes = text.as_bytes();
        // Back up far enough to catch a tag split across the previous boundary.
        let from = self.scanned.saturating_sub(CLOSERS[0].len() - 1).min(bytes.len());
        let window = &bytes[from..];
        self.scanned = bytes.len();

        if CLOSERS.iter().any(|tag| contains_ignore_ascii_case(window, tag)) {
            Phase::Complete
        } else if self.phase >= Phase::Body || contains_ignore_ascii_case(window, BODY_OPEN) {
            Phase::Body
        } else {
            Phase::Head
        }
    }
}

fn contains_ignore_ascii_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w.eq_ignore_ascii_case(needle))
}
