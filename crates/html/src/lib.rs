//! Document tree model for generated markup: tokenizer, tree builder,
//! selector lookup, structural mutation and serialization.

pub mod dom_utils;
pub mod selector;
pub mod serialize;

mod dom_builder;
mod tokenizer;
mod types;

pub use crate::dom_builder::{MAX_DEPTH, build_dom, build_fragment};
pub use crate::dom_utils::{MutationError, NodePath};
pub use crate::selector::{Selector, SelectorError};
pub use crate::serialize::{serialize_document, to_html};
pub use crate::tokenizer::tokenize;
pub use crate::types::{Node, Token};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("element nesting exceeds {limit} levels")]
    TooDeep { limit: usize },
}

/// Parse a complete document.
pub fn parse_document(input: &str) -> Result<Node, ParseError> {
    build_dom(&tokenize(input))
}

/// Parse a markup fragment into sibling nodes, dropping whitespace-only text
/// at either end.
pub fn parse_fragment(input: &str) -> Result<Vec<Node>, ParseError> {
    let mut nodes = build_fragment(&tokenize(input))?;
    while nodes.last().is_some_and(Node::is_blank_text) {
        nodes.pop();
    }
    let leading = nodes.iter().take_while(|n| n.is_blank_text()).count();
    nodes.drain(..leading);
    Ok(nodes)
}
