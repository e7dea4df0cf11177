//! Lossless-enough HTML tokenizer for generated markup.
//!
//! Tag and attribute names are ASCII `[A-Za-z0-9:_-]` and are lowercased.
//! Text, attribute values and rawtext bodies are kept verbatim (entities are
//! not decoded) so a parse/serialize round trip leaves content bytes alone.
//!
//! Known limitations (intentional):
//! - Not an HTML5 state machine; no parse-error recovery beyond skipping.
//! - Rawtext close-tag scanning accepts only ASCII whitespace before `>`.
use crate::types::Token;
use memchr::memchr;

const COMMENT_START: &str = "<!--";
const COMMENT_END: &str = "-->";

// Matches only start at ASCII `<`, which never occurs inside a UTF-8
// continuation byte, so slice endpoints stay on char boundaries.
const SCRIPT_CLOSE_TAG: &[u8] = b"</script";
const STYLE_CLOSE_TAG: &[u8] = b"</style";

fn starts_with_ignore_ascii_case_at(haystack: &[u8], start: usize, needle: &[u8]) -> bool {
    haystack.len() >= start + needle.len()
        && haystack[start..start + needle.len()].eq_ignore_ascii_case(needle)
}

fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-' || c == b'_' || c == b':'
}

fn find_rawtext_close_tag(haystack: &str, close_tag: &[u8]) -> Option<(usize, usize)> {
    let bytes = haystack.as_bytes();
    let len = bytes.len();
    let n = close_tag.len();
    let mut i = 0;
    while i + n <= len {
        i += memchr(b'<', &bytes[i..])?;
        if i + n > len {
            return None;
        }
        if starts_with_ignore_ascii_case_at(bytes, i, close_tag) {
            let mut k = i + n;
            while k < len && bytes[k].is_ascii_whitespace() {
                k += 1;
            }
            if k < len && bytes[k] == b'>' {
                return Some((i, k + 1));
            }
        }
        i += 1;
    }
    None
}

pub(crate) fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Tokenize `input` into a flat token list.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut out = Vec::new();
    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut i = 0;

    while i < len {
        if bytes[i] != b'<' {
            let start = i;
            i += memchr(b'<', &bytes[i..]).unwrap_or(len - i);
            out.push(Token::Text(input[start..i].to_string()));
            continue;
        }

        if input[i..].starts_with(COMMENT_START) {
            let body_start = i + COMMENT_START.len();
            match input[body_start..].find(COMMENT_END) {
                Some(rel) => {
                    out.push(Token::Comment(
                        input[body_start..body_start + rel].to_string(),
                    ));
                    i = body_start + rel + COMMENT_END.len();
                    continue;
                }
                None => {
                    out.push(Token::Comment(input[body_start..].to_string()));
                    break;
                }
            }
        }

        if starts_with_ignore_ascii_case_at(bytes, i, b"<!doctype") {
            let rest = &input[i + 2..];
            match rest.find('>') {
                Some(end) => {
                    out.push(Token::Doctype(rest[..end].trim().to_string()));
                    i += 2 + end + 1;
                    continue;
                }
                None => break,
            }
        }

        // End tag.
        if i + 1 < len && bytes[i + 1] == b'/' {
            let start = i + 2;
            let mut j = start;
            while j < len && is_name_char(bytes[j]) {
                j += 1;
            }
            let name = input[start..j].to_ascii_lowercase();
            j += memchr(b'>', &bytes[j..]).map_or(len - j, |rel| rel + 1);
            if !name.is_empty() {
                out.push(Token::EndTag(name));
            }
            i = j;
            continue;
        }

        // Start tag. A `<` not followed by a name is literal text.
        let start = i + 1;
        let mut j = start;
        while j < len && is_name_char(bytes[j]) {
            j += 1;
        }
        if j == start {
            out.push(Token::Text("<".to_string()));
            i += 1;
            continue;
        }
        let name = input[start..j].to_ascii_lowercase();
        let (attributes, mut self_closing, content_start) = scan_attributes(input, j);
        if is_void_element(&name) {
            self_closing = true;
        }

        let rawtext = !self_closing && (name == "script" || name == "style");
        out.push(Token::StartTag {
            name: name.clone(),
            attributes,
            self_closing,
        });

        if rawtext {
            let close_tag = if name == "script" {
                SCRIPT_CLOSE_TAG
            } else {
                STYLE_CLOSE_TAG
            };
            let body = &input[content_start..];
            match find_rawtext_close_tag(body, close_tag) {
                Some((rel_start, rel_end)) => {
                    if rel_start > 0 {
                        out.push(Token::Text(body[..rel_start].to_string()));
                    }
                    out.push(Token::EndTag(name));
                    i = content_start + rel_end;
                    continue;
                }
                None => {
                    // Missing close tag: the remainder is rawtext with an implied end.
                    if !body.is_empty() {
                        out.push(Token::Text(body.to_string()));
                    }
                    out.push(Token::EndTag(name));
                    break;
                }
            }
        }

        i = content_start;
    }

    out
}

/// Scan attributes starting right after the tag name. Returns the attributes,
/// whether the tag was written self-closing, and the offset after `>`.
fn scan_attributes(input: &str, mut k: usize) -> (Vec<(String, Option<String>)>, bool, usize) {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut attributes = Vec::new();
    let mut self_closing = false;

    let skip_whitespace = |k: &mut usize| {
        while *k < len && bytes[*k].is_ascii_whitespace() {
            *k += 1;
        }
    };

    loop {
        skip_whitespace(&mut k);
        if k >= len {
            break;
        }
        if bytes[k] == b'>' {
            k += 1;
            break;
        }
        if bytes[k] == b'/' {
            if k + 1 < len && bytes[k + 1] == b'>' {
                self_closing = true;
                k += 2;
                break;
            }
            k += 1;
            continue;
        }
        let name_start = k;
        while k < len && is_name_char(bytes[k]) {
            k += 1;
        }
        if name_start == k {
            k += 1;
            continue;
        }
        let attr_name = input[name_start..k].to_ascii_lowercase();

        skip_whitespace(&mut k);
        let value = if k < len && bytes[k] == b'=' {
            k += 1;
            skip_whitespace(&mut k);
            if k < len && (bytes[k] == b'"' || bytes[k] == b'\'') {
                let quote = bytes[k];
                k += 1;
                let vstart = k;
                k += memchr(quote, &bytes[k..]).unwrap_or(len - k);
                let raw = input[vstart..k].to_string();
                if k < len {
                    k += 1;
                }
                Some(raw)
            } else {
                let vstart = k;
                while k < len && !bytes[k].is_ascii_whitespace() && bytes[k] != b'>' {
                    if bytes[k] == b'/' && k + 1 < len && bytes[k + 1] == b'>' {
                        break;
                    }
                    k += 1;
                }
                Some(input[vstart..k].to_string())
            }
        } else {
            None
        };
        attributes.push((attr_name, value));
    }

    (attributes, self_closing, k)
}
