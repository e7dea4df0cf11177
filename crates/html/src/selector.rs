//! Minimal selector language used by patch operations.
//!
//! Grammar: one or more compound selectors separated by whitespace
//! (descendant combinator). A compound is an optional tag name followed by
//! any number of `#id`, `.class`, `[attr]` and `[attr=value]` parts.
//! Child/sibling combinators, pseudo-classes, `*` and selector lists are
//! rejected with [`SelectorError`].

use crate::types::Node;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unsupported selector syntax {found:?} at offset {offset}")]
    Unsupported { found: char, offset: usize },
    #[error("unterminated attribute selector")]
    UnterminatedAttribute,
    #[error("expected a name at offset {offset}")]
    MissingName { offset: usize },
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum AttrMatch {
    Exists(String),
    Equals(String, String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
}

impl Compound {
    fn matches(&self, node: &Node) -> bool {
        let Node::Element { name, .. } = node else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if !name.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if node.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = node.attr("class").unwrap_or("");
            if !self
                .classes
                .iter()
                .all(|want| class_attr.split_ascii_whitespace().any(|c| c == want))
            {
                return false;
            }
        }
        self.attrs.iter().all(|m| match m {
            AttrMatch::Exists(k) => node.attr(k).is_some(),
            AttrMatch::Equals(k, v) => node.attr(k) == Some(v.as_str()),
        })
    }
}

/// A parsed selector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    source: String,
    // Outermost ancestor first; the last compound is the subject.
    compounds: Vec<Compound>,
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(SelectorError::Empty);
        }
        let mut compounds = Vec::new();
        let chars: Vec<(usize, char)> = trimmed.char_indices().collect();
        let mut i = 0;

        while i < chars.len() {
            while i < chars.len() && chars[i].1.is_whitespace() {
                i += 1;
            }
            if i == chars.len() {
                break;
            }
            let mut compound = Compound::default();
            let mut any = false;
            while i < chars.len() && !chars[i].1.is_whitespace() {
                let (offset, c) = chars[i];
                match c {
                    '#' | '.' => {
                        let (name, next) = read_ident(&chars, i + 1);
                        if name.is_empty() {
                            return Err(SelectorError::MissingName { offset: offset + 1 });
                        }
                        if c == '#' {
                            compound.id = Some(name);
                        } else {
                            compound.classes.push(name);
                        }
                        i = next;
                    }
                    '[' => {
                        let (attr, next) = read_attr(&chars, i + 1)?;
                        compound.attrs.push(attr);
                        i = next;
                    }
                    c if is_ident_char(c) && !any => {
                        let (name, next) = read_ident(&chars, i);
                        compound.tag = Some(name.to_ascii_lowercase());
                        i = next;
                    }
                    found => return Err(SelectorError::Unsupported { found, offset }),
                }
                any = true;
            }
            compounds.push(compound);
        }

        Ok(Self {
            source: trimmed.to_string(),
            compounds,
        })
    }

    /// Whether `node` matches given its ancestors (outermost first).
    pub fn matches(&self, node: &Node, ancestors: &[&Node]) -> bool {
        let Some((subject, rest)) = self.compounds.split_last() else {
            return false;
        };
        if !subject.matches(node) {
            return false;
        }
        // Descendant-only combinators: greedy right-to-left matching is exact.
        let mut remaining = rest.iter().rev().peekable();
        for ancestor in ancestors.iter().rev() {
            match remaining.peek() {
                Some(compound) if compound.matches(ancestor) => {
                    remaining.next();
                }
                Some(_) => {}
                None => break,
            }
        }
        remaining.peek().is_none()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn read_ident(chars: &[(usize, char)], mut i: usize) -> (String, usize) {
    let mut out = String::new();
    while i < chars.len() && is_ident_char(chars[i].1) {
        out.push(chars[i].1);
        i += 1;
    }
    (out, i)
}

fn read_attr(chars: &[(usize, char)], mut i: usize) -> Result<(AttrMatch, usize), SelectorError> {
    let skip_ws = |i: &mut usize| {
        while *i < chars.len() && chars[*i].1.is_whitespace() {
            *i += 1;
        }
    };
    skip_ws(&mut i);
    let start_offset = chars.get(i).map_or(0, |c| c.0);
    let (name, next) = read_ident(chars, i);
    if name.is_empty() {
        return Err(SelectorError::MissingName {
            offset: start_offset,
        });
    }
    i = next;
    skip_ws(&mut i);
    match chars.get(i).map(|c| c.1) {
        Some(']') => Ok((AttrMatch::Exists(name.to_ascii_lowercase()), i + 1)),
        Some('=') => {
            i += 1;
            skip_ws(&mut i);
            let mut value = String::new();
            match chars.get(i).map(|c| c.1) {
                Some(q @ ('"' | '\'')) => {
                    i += 1;
                    loop {
                        match chars.get(i) {
                            Some(&(_, c)) if c == q => {
                                i += 1;
                                break;
                            }
                            Some(&(_, c)) => {
                                value.push(c);
                                i += 1;
                            }
                            None => return Err(SelectorError::UnterminatedAttribute),
                        }
                    }
                }
                _ => {
                    let (bare, next) = read_ident(chars, i);
                    value = bare;
                    i = next;
                }
            }
            skip_ws(&mut i);
            match chars.get(i) {
                Some(&(_, ']')) => Ok((AttrMatch::Equals(name.to_ascii_lowercase(), value), i + 1)),
                Some(&(offset, found)) => Err(SelectorError::Unsupported { found, offset }),
                None => Err(SelectorError::UnterminatedAttribute),
            }
        }
        Some(found) => Err(SelectorError::Unsupported {
            found,
            offset: chars[i].0,
        }),
        None => Err(SelectorError::UnterminatedAttribute),
    }
}
