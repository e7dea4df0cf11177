#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Doctype(String),
    StartTag {
        name: String,
        attributes: Vec<(String, Option<String>)>,
        self_closing: bool,
    },
    EndTag(String),
    Comment(String),
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Document {
        doctype: Option<String>,
        children: Vec<Node>,
    },
    Element {
        name: String,
        attributes: Vec<(String, Option<String>)>,
        children: Vec<Node>,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
    },
}

impl Node {
    pub fn element(name: impl Into<String>) -> Self {
        Node::Element {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text { text: text.into() }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Document { children, .. } | Node::Element { children, .. } => children,
            Node::Text { .. } | Node::Comment { .. } => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Document { children, .. } | Node::Element { children, .. } => Some(children),
            _ => None,
        }
    }

    pub fn is_element_named(&self, target: &str) -> bool {
        matches!(self, Node::Element { name, .. } if name.eq_ignore_ascii_case(target))
    }

    /// Attribute value; `Some("")` for a bare attribute like `hidden`.
    pub fn attr(&self, key: &str) -> Option<&str> {
        match self {
            Node::Element { attributes, .. } => attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.as_deref().unwrap_or("")),
            _ => None,
        }
    }

    /// True for text nodes containing only ASCII whitespace.
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text { text } if text.bytes().all(|b| b.is_ascii_whitespace()))
    }

    /// Concatenated text of direct text children.
    pub fn own_text(&self) -> String {
        let mut out = String::new();
        for child in self.children() {
            if let Node::Text { text } = child {
                out.push_str(text);
            }
        }
        out
    }
}
