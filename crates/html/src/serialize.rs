//! Markup serialization for [`Node`] trees.
//!
//! Text and attribute values are written verbatim (the tokenizer keeps them
//! undecoded). Void elements get no end tag; every other element does.

use crate::tokenizer::is_void_element;
use crate::types::Node;

pub const DEFAULT_DOCTYPE: &str = "DOCTYPE html";

/// Serialize `node` exactly as stored; a document's doctype is written only if present.
pub fn to_html(node: &Node) -> String {
    let mut out = String::new();
    write_node(node, &mut out);
    out
}

/// Serialize a document, inserting `<!DOCTYPE html>` and a newline when the
/// document has no doctype of its own.
pub fn serialize_document(node: &Node) -> String {
    match node {
        Node::Document { doctype: None, .. } => {
            let mut out = format!("<!{DEFAULT_DOCTYPE}>\n");
            write_node(node, &mut out);
            out
        }
        _ => to_html(node),
    }
}

pub fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Document { doctype, children } => {
            if let Some(dt) = doctype {
                out.push_str("<!");
                out.push_str(dt);
                out.push('>');
            }
            for child in children {
                write_node(child, out);
            }
        }
        Node::Element {
            name,
            attributes,
            children,
        } => {
            out.push('<');
            out.push_str(name);
            for (key, value) in attributes {
                out.push(' ');
                out.push_str(key);
                if let Some(v) = value {
                    let quote = if v.contains('"') { '\'' } else { '"' };
                    out.push('=');
                    out.push(quote);
                    out.push_str(v);
                    out.push(quote);
                }
            }
            out.push('>');
            if is_void_element(name) {
                return;
            }
            for child in children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        Node::Text { text } => out.push_str(text),
        Node::Comment { text } => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
    }
}
