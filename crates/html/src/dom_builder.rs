use crate::ParseError;
use crate::types::{Node, Token};

/// Open-element depth past which a document is rejected. Serialization and
/// selector matching recurse, so unbounded nesting is not accepted.
pub const MAX_DEPTH: usize = 512;

/// Build a document tree from tokens.
pub fn build_dom(tokens: &[Token]) -> Result<Node, ParseError> {
    let mut arena = NodeArena::new();
    let root = arena.push(ArenaNode::Document {
        doctype: None,
        children: Vec::new(),
    });
    arena.build_into(root, tokens)?;
    Ok(arena.into_node(root))
}

/// Build a list of sibling nodes from a markup fragment's tokens.
///
/// A doctype inside a fragment is dropped.
pub fn build_fragment(tokens: &[Token]) -> Result<Vec<Node>, ParseError> {
    let mut arena = NodeArena::new();
    let root = arena.push(ArenaNode::Document {
        doctype: None,
        children: Vec::new(),
    });
    arena.build_into(root, tokens)?;
    match arena.into_node(root) {
        Node::Document { children, .. } => Ok(children),
        _ => unreachable!("fragment root is always a document node"),
    }
}

#[derive(Debug)]
enum ArenaNode {
    Document {
        doctype: Option<String>,
        children: Vec<usize>,
    },
    Element {
        name: String,
        attributes: Vec<(String, Option<String>)>,
        children: Vec<usize>,
    },
    Text(String),
    Comment(String),
}

impl ArenaNode {
    fn children(&self) -> Option<&[usize]> {
        match self {
            ArenaNode::Document { children, .. } | ArenaNode::Element { children, .. } => {
                Some(children)
            }
            ArenaNode::Text(_) | ArenaNode::Comment(_) => None,
        }
    }
}

#[derive(Debug)]
struct NodeArena {
    nodes: Vec<ArenaNode>,
}

impl NodeArena {
    fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    fn push(&mut self, node: ArenaNode) -> usize {
        let index = self.nodes.len();
        self.nodes.push(node);
        index
    }

    fn add_child(&mut self, parent: usize, child: ArenaNode) -> usize {
        let index = self.push(child);
        match &mut self.nodes[parent] {
            ArenaNode::Document { children, .. } | ArenaNode::Element { children, .. } => {
                children.push(index);
            }
            _ => unreachable!("dom builder parent cannot have children"),
        }
        index
    }

    fn is_element_named(&self, index: usize, target: &str) -> bool {
        matches!(&self.nodes[index], ArenaNode::Element { name, .. } if name == target)
    }

    fn build_into(&mut self, root: usize, tokens: &[Token]) -> Result<(), ParseError> {
        let mut open: Vec<usize> = Vec::new();

        for token in tokens {
            let parent = open.last().copied().unwrap_or(root);
            match token {
                Token::Doctype(s) => {
                    if let ArenaNode::Document { doctype, .. } = &mut self.nodes[root] {
                        if doctype.is_none() && open.is_empty() {
                            *doctype = Some(s.clone());
                        }
                    }
                }
                Token::Comment(c) => {
                    self.add_child(parent, ArenaNode::Comment(c.clone()));
                }
                Token::Text(t) => {
                    if t.is_empty() {
                        continue;
                    }
                    // Adjacent text (e.g. a stray `<` split out by the tokenizer) merges.
                    let last = self.nodes[parent].children().and_then(|c| c.last().copied());
                    if let Some(ArenaNode::Text(prev)) = last.map(|i| &mut self.nodes[i]) {
                        prev.push_str(t);
                    } else {
                        self.add_child(parent, ArenaNode::Text(t.clone()));
                    }
                }
                Token::StartTag {
                    name,
                    attributes,
                    self_closing,
                } => {
                    let index = self.add_child(
                        parent,
                        ArenaNode::Element {
                            name: name.clone(),
                            attributes: attributes.clone(),
                            children: Vec::new(),
                        },
                    );
                    if !*self_closing {
                        if open.len() >= MAX_DEPTH {
                            return Err(ParseError::TooDeep { limit: MAX_DEPTH });
                        }
                        open.push(index);
                    }
                }
                Token::EndTag(name) => {
                    // Stray end tags are ignored instead of unwinding the whole stack.
                    if let Some(pos) = open.iter().rposition(|&i| self.is_element_named(i, name))
                    {
                        open.truncate(pos);
                    }
                }
            }
        }
        Ok(())
    }

    fn into_node(self, root: usize) -> Node {
        let mut nodes = self.nodes;
        let mut built: Vec<Node> = Vec::with_capacity(nodes.len());

        fn take_children(n: usize, built: &mut Vec<Node>) -> Vec<Node> {
            let split = built.len() - n;
            built.split_off(split)
        }

        // Iterative postorder: a node is finished once all of its children are
        // on `built`, in original order, as its last `child_count` entries.
        let mut stack: Vec<(usize, bool)> = vec![(root, false)];

        while let Some((index, visited)) = stack.pop() {
            if !visited {
                stack.push((index, true));
                if let Some(children) = nodes[index].children() {
                    for &child in children.iter().rev() {
                        stack.push((child, false));
                    }
                }
                continue;
            }

            let node = match &mut nodes[index] {
                ArenaNode::Document { doctype, children } => Node::Document {
                    doctype: doctype.take(),
                    children: take_children(children.len(), &mut built),
                },
                ArenaNode::Element {
                    name,
                    attributes,
                    children,
                } => Node::Element {
                    name: std::mem::take(name),
                    attributes: std::mem::take(attributes),
                    children: take_children(children.len(), &mut built),
                },
                ArenaNode::Text(text) => Node::Text {
                    text: std::mem::take(text),
                },
                ArenaNode::Comment(text) => Node::Comment {
                    text: std::mem::take(text),
                },
            };
            built.push(node);
        }

        debug_assert_eq!(built.len(), 1, "dom builder should build exactly one root");
        built.pop().unwrap_or(Node::Document {
            doctype: None,
            children: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize;

    #[test]
    fn nests_elements_and_keeps_doctype() {
        let dom = build_dom(&tokenize("<!DOCTYPE html><html><body><p>hi</p></body></html>"))
            .unwrap();
        let Node::Document { doctype, children } = &dom else {
            panic!("expected document");
        };
        assert_eq!(doctype.as_deref(), Some("DOCTYPE html"));
        assert_eq!(children.len(), 1);
        let body = &children[0].children()[0];
        assert!(body.is_element_named("body"));
        assert_eq!(body.children()[0].own_text(), "hi");
    }

    #[test]
    fn stray_end_tag_does_not_close_ancestors() {
        let dom = build_dom(&tokenize("<div><span>a</p>b</span></div>")).unwrap();
        let div = &dom.children()[0];
        let span = &div.children()[0];
        assert_eq!(span.own_text(), "ab");
        assert_eq!(div.children().len(), 1);
    }

    #[test]
    fn unclosed_elements_close_at_end() {
        let dom = build_dom(&tokenize("<ul><li>one<li>two")).unwrap();
        let ul = &dom.children()[0];
        assert_eq!(ul.children().len(), 1, "li is not auto-closed");
    }

    #[test]
    fn fragment_yields_siblings() {
        let nodes = build_fragment(&tokenize("<a></a> <b></b>")).unwrap();
        assert_eq!(nodes.len(), 3);
        assert!(nodes[1].is_blank_text());
    }

    #[test]
    fn rejects_excessive_nesting() {
        let input = "<div>".repeat(MAX_DEPTH + 1);
        assert_eq!(
            build_dom(&tokenize(&input)),
            Err(ParseError::TooDeep { limit: MAX_DEPTH })
        );
    }

    #[test]
    fn accepts_nesting_at_limit() {
        let input = "<div>".repeat(MAX_DEPTH);
        assert!(build_dom(&tokenize(&input)).is_ok());
    }
}
