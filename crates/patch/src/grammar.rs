//! Patch grammar scanner.
//!
//! A patch stream is ordinary text carrying comment markers:
//!
//! ```text
//! <!-- PATCH -->
//! <!-- REPLACE_VARS --> ... <!-- /REPLACE_VARS -->
//! <!-- REPLACE_STYLES --> ... <!-- /REPLACE_STYLES -->
//! <!-- REPLACE <selector> --> ... <!-- /REPLACE -->
//! <!-- INSERT_AFTER <selector> --> ... <!-- /INSERT_AFTER -->
//! <!-- INSERT_BEFORE <selector> --> ... <!-- /INSERT_BEFORE -->
//! <!-- REMOVE <selector> -->
//! <!-- /PATCH -->
//! ```
//!
//! Scanning is stateless: every call rescans the whole buffer. An operation is
//! reported only once its closing marker is present, so calling
//! [`parse_operations`] on a growing prefix of a stream yields a growing list.
//! There is no error path; an unmatched or unclosed marker is just "not yet".

use memchr::memmem;

pub const STREAM_START: &str = "<!-- PATCH -->";
pub const STREAM_END: &str = "<!-- /PATCH -->";

const COMMENT_OPEN: &[u8] = b"<!--";
const COMMENT_CLOSE: &[u8] = b"-->";

/// How far into an unterminated leading comment we wait before deciding the
/// response is not a patch stream.
const MAX_START_MARKER_LEN: usize = 64;

/// One patch operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatchOp {
    ReplaceVars { content: String },
    ReplaceStyles { content: String },
    Replace { selector: String, content: String },
    InsertAfter { selector: String, content: String },
    InsertBefore { selector: String, content: String },
    Remove { selector: String },
}

impl PatchOp {
    pub fn kind(&self) -> OpKind {
        match self {
            PatchOp::ReplaceVars { .. } => OpKind::ReplaceVars,
            PatchOp::ReplaceStyles { .. } => OpKind::ReplaceStyles,
            PatchOp::Replace { .. } => OpKind::Replace,
            PatchOp::InsertAfter { .. } => OpKind::InsertAfter,
            PatchOp::InsertBefore { .. } => OpKind::InsertBefore,
            PatchOp::Remove { .. } => OpKind::Remove,
        }
    }

    pub fn selector(&self) -> Option<&str> {
        match self {
            PatchOp::Replace { selector, .. }
            | PatchOp::InsertAfter { selector, .. }
            | PatchOp::InsertBefore { selector, .. }
            | PatchOp::Remove { selector } => Some(selector),
            PatchOp::ReplaceVars { .. } | PatchOp::ReplaceStyles { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    ReplaceVars,
    ReplaceStyles,
    Replace,
    InsertAfter,
    InsertBefore,
    Remove,
}

impl OpKind {
    pub const ALL: [OpKind; 6] = [
        OpKind::ReplaceVars,
        OpKind::ReplaceStyles,
        OpKind::Replace,
        OpKind::InsertAfter,
        OpKind::InsertBefore,
        OpKind::Remove,
    ];

    /// Marker name as written in the stream.
    pub fn marker_name(self) -> &'static str {
        match self {
            OpKind::ReplaceVars => "REPLACE_VARS",
            OpKind::ReplaceStyles => "REPLACE_STYLES",
            OpKind::Replace => "REPLACE",
            OpKind::InsertAfter => "INSERT_AFTER",
            OpKind::InsertBefore => "INSERT_BEFORE",
            OpKind::Remove => "REMOVE",
        }
    }

    fn takes_selector(self) -> bool {
        !matches!(self, OpKind::ReplaceVars | OpKind::ReplaceStyles)
    }

    fn from_marker_name(name: &str) -> Option<Self> {
        OpKind::ALL.into_iter().find(|k| k.marker_name() == name)
    }
}

/// An operation plus its byte span in the scanned text: `start` is the
/// offset of its opening marker, `end` the offset just past its closing one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedOp {
    pub op: PatchOp,
    pub start: usize,
    pub end: usize,
}

/// Classification of a response by its leading bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    /// Too little text to tell yet.
    Undecided,
    Patch,
    Document,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Marker<'a> {
    StreamStart,
    StreamEnd,
    Open(OpKind, &'a str),
    Close(OpKind),
    Plain,
}

#[derive(Clone, Debug)]
struct MarkerAt<'a> {
    marker: Marker<'a>,
    start: usize,
    end: usize,
}

/// Exact marker grammar: a name token, then for selector kinds a non-empty
/// selector. Anything else is an ordinary comment.
fn classify_comment(body: &str) -> Marker<'_> {
    let body = body.trim();
    let (name, rest) = match body.find(|c: char| c.is_ascii_whitespace()) {
        Some(split) => (&body[..split], body[split..].trim()),
        None => (body, ""),
    };

    if let Some(closing) = name.strip_prefix('/') {
        if !rest.is_empty() {
            return Marker::Plain;
        }
        if closing == "PATCH" {
            return Marker::StreamEnd;
        }
        return match OpKind::from_marker_name(closing) {
            Some(kind) if kind != OpKind::Remove => Marker::Close(kind),
            _ => Marker::Plain,
        };
    }

    if name == "PATCH" {
        return if rest.is_empty() {
            Marker::StreamStart
        } else {
            Marker::Plain
        };
    }

    match OpKind::from_marker_name(name) {
        Some(kind) if kind.takes_selector() == !rest.is_empty() => Marker::Open(kind, rest),
        _ => Marker::Plain,
    }
}

/// Every complete comment in `text`, including comments that begin inside
/// another comment's body, in order of their opening `<!--`.
fn scan_markers(text: &str) -> Vec<MarkerAt<'_>> {
    let bytes = text.as_bytes();
    let closes: Vec<usize> = memmem::find_iter(bytes, COMMENT_CLOSE).collect();
    let mut out = Vec::new();

    for open in memmem::find_iter(bytes, COMMENT_OPEN) {
        let body_start = open + COMMENT_OPEN.len();
        let next = closes.partition_point(|&c| c < body_start);
        let Some(&close) = closes.get(next) else {
            // No terminator after this point; later openers have none either.
            break;
        };
        out.push(MarkerAt {
            marker: classify_comment(&text[body_start..close]),
            start: open,
            end: close + COMMENT_CLOSE.len(),
        });
    }
    out
}

/// Classify a (possibly partial) response.
pub fn classify_stream(text: &str) -> StreamKind {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return StreamKind::Undecided;
    }
    if trimmed.len() < COMMENT_OPEN.len() {
        return if STREAM_START.starts_with(trimmed) {
            StreamKind::Undecided
        } else {
            StreamKind::Document
        };
    }
    if !trimmed.as_bytes().starts_with(COMMENT_OPEN) {
        return StreamKind::Document;
    }
    let head = &trimmed.as_bytes()[COMMENT_OPEN.len()..];
    match memmem::find(head, COMMENT_CLOSE) {
        Some(close) => {
            let body = &trimmed[COMMENT_OPEN.len()..COMMENT_OPEN.len() + close];
            if classify_comment(body) == Marker::StreamStart {
                StreamKind::Patch
            } else {
                StreamKind::Document
            }
        }
        None if trimmed.len() < MAX_START_MARKER_LEN => StreamKind::Undecided,
        None => StreamKind::Document,
    }
}

/// True once `text` (after leading whitespace) begins with a complete
/// stream-start marker. A half-received marker reports `false`.
pub fn is_patch_stream(text: &str) -> bool {
    classify_stream(text) == StreamKind::Patch
}

/// True once the stream-end marker has arrived.
pub fn has_stream_end(text: &str) -> bool {
    scan_markers(text)
        .iter()
        .any(|m| m.marker == Marker::StreamEnd)
}

/// Result of scanning a (possibly partial) stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OperationScan {
    /// Fully closed operations, ordered by start offset.
    pub ops: Vec<ParsedOp>,
    /// Start offset of the earliest opening marker still waiting for its
    /// closer. Operations starting after it may still be preceded by it.
    pub first_unclosed: Option<usize>,
}

/// All fully closed operations in `text`, in order of appearance.
pub fn parse_operations(text: &str) -> Vec<ParsedOp> {
    scan_operations(text).ops
}

/// Closed operations plus the position of the earliest unclosed opener.
pub fn scan_operations(text: &str) -> OperationScan {
    let markers = scan_markers(text);
    let mut ops = Vec::new();
    let mut first_unclosed: Option<usize> = None;

    for kind in OpKind::ALL {
        if let Some(start) = collect_kind(text, &markers, kind, &mut ops) {
            first_unclosed = Some(first_unclosed.map_or(start, |s| s.min(start)));
        }
    }

    ops.sort_by_key(|op| op.start);
    OperationScan { ops, first_unclosed }
}

/// Non-overlapping, non-nested pairing for a single kind: each opener takes
/// the first closer after it, and scanning resumes past that closer.
/// Returns the start of the opener left without a closer, if any.
fn collect_kind(
    text: &str,
    markers: &[MarkerAt<'_>],
    kind: OpKind,
    out: &mut Vec<ParsedOp>,
) -> Option<usize> {
    let mut resume_at = 0;
    for (i, open) in markers.iter().enumerate() {
        if open.start < resume_at {
            continue;
        }
        let Marker::Open(k, selector) = open.marker else {
            continue;
        };
        if k != kind {
            continue;
        }

        if kind == OpKind::Remove {
            out.push(ParsedOp {
                op: PatchOp::Remove {
                    selector: selector.to_string(),
                },
                start: open.start,
                end: open.end,
            });
            resume_at = open.end;
            continue;
        }

        let close = markers[i + 1..]
            .iter()
            .find(|m| m.start >= open.end && m.marker == Marker::Close(kind));
        let Some(close) = close else {
            // Unclosed: nothing after it can pair either.
            return Some(open.start);
        };

        let content = text[open.end..close.start].to_string();
        let selector = selector.to_string();
        let op = match kind {
            OpKind::ReplaceVars => PatchOp::ReplaceVars { content },
            OpKind::ReplaceStyles => PatchOp::ReplaceStyles { content },
            OpKind::Replace => PatchOp::Replace { selector, content },
            OpKind::InsertAfter => PatchOp::InsertAfter { selector, content },
            OpKind::InsertBefore => PatchOp::InsertBefore { selector, content },
            OpKind::Remove => unreachable!("remove markers are self-closing"),
        };
        out.push(ParsedOp {
            op,
            start: open.start,
            end: close.end,
        });
        resume_at = close.end;
    }
    None
}

/// Drop the stream start/end markers, leaving operation markers in place.
pub fn strip_stream_markers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    for m in scan_markers(text) {
        if m.start < copied {
            continue;
        }
        if matches!(m.marker, Marker::StreamStart | Marker::StreamEnd) {
            out.push_str(&text[copied..m.start]);
            copied = m.end;
        }
    }
    out.push_str(&text[copied..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = "<!-- PATCH -->\n\
        <!-- REPLACE_VARS -->--accent: #f60;<!-- /REPLACE_VARS -->\n\
        <!-- REPLACE #hero --><section id=\"hero\">new</section><!-- /REPLACE -->\n\
        <!-- REMOVE .promo -->\n\
        <!-- INSERT_AFTER #hero --><p id=\"tag\">hi</p><!-- /INSERT_AFTER -->\n\
        <!-- /PATCH -->";

    #[test]
    fn parses_all_kinds_in_document_order() {
        let ops = parse_operations(STREAM);
        let kinds: Vec<_> = ops.iter().map(|o| o.op.kind()).collect();
        assert_eq!(
            kinds,
            [
                OpKind::ReplaceVars,
                OpKind::Replace,
                OpKind::Remove,
                OpKind::InsertAfter
            ]
        );
        assert!(ops.windows(2).all(|w| w[0].start < w[1].start));
        assert_eq!(
            ops[1].op,
            PatchOp::Replace {
                selector: "#hero".into(),
                content: "<section id=\"hero\">new</section>".into(),
            }
        );
        assert_eq!(&STREAM[ops[2].start..ops[2].end], "<!-- REMOVE .promo -->");
    }

    #[test]
    fn unclosed_operation_is_omitted() {
        let text = "<!-- PATCH --><!-- REPLACE #a --><div id=a>partial";
        assert!(parse_operations(text).is_empty());
        let text = "<!-- PATCH --><!-- REPLACE #a --><div id=a>x</div><!-- /REPL";
        assert!(parse_operations(text).is_empty());
    }

    #[test]
    fn reports_earliest_unclosed_opener() {
        let text = "<!-- PATCH --><!-- REPLACE #a --><p>x</p><!-- REMOVE #b -->";
        let scan = scan_operations(text);
        assert_eq!(scan.first_unclosed, Some(14));
        assert_eq!(scan.ops.len(), 1);
        assert!(scan.ops[0].start > 14);

        let closed = format!("{text}<!-- /REPLACE -->");
        let scan = scan_operations(&closed);
        assert_eq!(scan.first_unclosed, None);
        assert_eq!(scan.ops.len(), 2);
    }

    #[test]
    fn prefixes_never_yield_more_operations() {
        let full = parse_operations(STREAM);
        for cut in 0..=STREAM.len() {
            if !STREAM.is_char_boundary(cut) {
                continue;
            }
            let partial = parse_operations(&STREAM[..cut]);
            assert!(partial.len() <= full.len(), "cut={cut}");
            assert_eq!(partial[..], full[..partial.len()], "cut={cut}");
        }
    }

    #[test]
    fn marker_names_match_exactly() {
        assert_eq!(classify_comment(" REPLACE_VARS "), Marker::Open(OpKind::ReplaceVars, ""));
        assert_eq!(classify_comment("REPLACE #a"), Marker::Open(OpKind::Replace, "#a"));
        assert_eq!(classify_comment(" /REPLACE "), Marker::Close(OpKind::Replace));
        assert_eq!(classify_comment("REMOVE #x"), Marker::Open(OpKind::Remove, "#x"));
        assert_eq!(classify_comment("/REMOVE"), Marker::Plain);
        assert_eq!(classify_comment("REMOVED #x"), Marker::Plain);
        assert_eq!(classify_comment("REMOVE"), Marker::Plain);
        assert_eq!(classify_comment("REPLACE"), Marker::Plain);
        assert_eq!(classify_comment("REPLACE_VARS extra"), Marker::Plain);
        assert_eq!(classify_comment("remove #x"), Marker::Plain);
    }

    #[test]
    fn replace_close_does_not_close_replace_vars() {
        let text = "<!-- REPLACE_VARS -->--a: 1;<!-- /REPLACE -->";
        assert!(parse_operations(text).is_empty());
    }

    #[test]
    fn same_kind_opener_inside_body_is_absorbed() {
        let text = "<!-- REPLACE #a -->x<!-- REPLACE #b -->y<!-- /REPLACE -->";
        let ops = parse_operations(text);
        assert_eq!(ops.len(), 1);
        assert_eq!(
            ops[0].op,
            PatchOp::Replace {
                selector: "#a".into(),
                content: "x<!-- REPLACE #b -->y".into(),
            }
        );
    }

    #[test]
    fn tolerates_tight_marker_whitespace() {
        let ops = parse_operations("<!--PATCH--><!--REMOVE #x--><!--/PATCH-->");
        assert_eq!(
            ops[0].op,
            PatchOp::Remove {
                selector: "#x".into()
            }
        );
    }

    #[test]
    fn classifies_stream_prefixes() {
        assert_eq!(classify_stream(""), StreamKind::Undecided);
        assert_eq!(classify_stream("  \n<!"), StreamKind::Undecided);
        assert_eq!(classify_stream("<!-- PAT"), StreamKind::Undecided);
        assert_eq!(classify_stream("\n<!-- PATCH -->"), StreamKind::Patch);
        assert_eq!(classify_stream("<!DOCTYPE html>"), StreamKind::Document);
        assert_eq!(classify_stream("<html>"), StreamKind::Document);
        assert_eq!(classify_stream("<!-- generated page --><html>"), StreamKind::Document);
        assert!(!is_patch_stream("<!-- PAT"));
        assert!(!is_patch_stream("Sure! <!-- PATCH -->"));
    }

    #[test]
    fn detects_stream_end() {
        assert!(!has_stream_end("<!-- PATCH --><!-- REMOVE #x -->"));
        assert!(has_stream_end("<!-- PATCH --><!-- REMOVE #x --><!-- /PATCH -->"));
    }

    #[test]
    fn strips_stream_markers_only() {
        assert_eq!(
            strip_stream_markers("<!-- PATCH -->\n<!-- REMOVE #x -->\n<!-- /PATCH -->"),
            "\n<!-- REMOVE #x -->\n"
        );
    }
}
