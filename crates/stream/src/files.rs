//! Multi-document responses: `<!-- FILE: about.html -->` markers split the
//! text into named documents.

use memchr::memmem;
use std::collections::BTreeMap;

#[derive(Debug)]
struct FileMarker<'a> {
    name: &'a str,
    start: usize,
    end: usize,
}

/// Name carried by a comment body such as ` ==== FILE: about.html ==== `.
fn file_marker_name(body: &str) -> Option<&str> {
    let body = body.trim().trim_matches('=').trim();
    let keyword = body.get(..4)?;
    if !keyword.eq_ignore_ascii_case("FILE") {
        return None;
    }
    let name = body[4..].trim_start().strip_prefix(':')?;
    let name = name.trim().trim_end_matches('=').trim();
    (!name.is_empty() && !name.contains(char::is_whitespace)).then_some(name)
}

fn file_markers(text: &str) -> Vec<FileMarker<'_>> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(rel) = memmem::find(&bytes[from..], b"<!--") {
        let open = from + rel;
        let body_start = open + 4;
        let Some(close_rel) = memmem::find(&bytes[body_start..], b"-->") else {
            break;
        };
        let close = body_start + close_rel;
        if let Some(name) = file_marker_name(&text[body_start..close]) {
            out.push(FileMarker {
                name,
                start: open,
                end: close + 3,
            });
        }
        from = close + 3;
    }
    out
}

/// Split `text` into named documents, or `None` when it carries no file
/// marker. Text before the first marker is dropped; a repeated name keeps
/// the later content. The last document runs to the end of the buffer, so
/// it grows while the response streams in.
pub fn split_files(text: &str) -> Option<BTreeMap<String, String>> {
    let markers = file_markers(text);
    if markers.is_empty() {
        return None;
    }
    let mut files = BTreeMap::new();
    for (i, marker) in markers.iter().enumerate() {
        let until = markers.get(i + 1).map_or(text.len(), |next| next.start);
        files.insert(
            marker.name.to_string(),
            text[marker.end..until].trim().to_string(),
        );
    }
    Some(files)
}
