//! Patch application engine.
//!
//! The base document is parsed once, operations run in the given order
//! against the tree, and the tree is serialized back with a doctype. If the
//! base cannot be parsed or any operation fails, the caller gets the base
//! document back untouched; a failure never leaks a half-patched tree.

use crate::grammar::PatchOp;
use html::dom_utils::{self, NodePath};
use html::{MutationError, Node, ParseError, Selector, SelectorError};

const LOG_TARGET: &str = "patch.apply";

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    #[error("markup could not be parsed: {0}")]
    Parse(#[from] ParseError),
    #[error("bad selector: {0}")]
    Selector(#[from] SelectorError),
    #[error(transparent)]
    Mutation(#[from] MutationError),
    #[error("document has no place for a head element")]
    NoHead,
}

/// Result of one operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpOutcome {
    Applied,
    /// The selector resolved to nothing; the document is unchanged.
    SkippedNoMatch,
    Failed(ApplyError),
}

/// Outcome of a whole [`apply_operations_with_report`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplyReport {
    pub document: String,
    /// One entry per operation attempted. Operations after a failure are not attempted.
    pub outcomes: Vec<OpOutcome>,
    /// True when the base was returned because of a failure.
    pub recovered: bool,
}

impl ApplyReport {
    pub fn applied_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, OpOutcome::Applied))
            .count()
    }
}

/// Apply `ops` to `base` and return the new document, or `base` unchanged on failure.
pub fn apply_operations<'a>(base: &str, ops: impl IntoIterator<Item = &'a PatchOp>) -> String {
    apply_operations_with_report(base, ops).document
}

pub fn apply_operations_with_report<'a>(
    base: &str,
    ops: impl IntoIterator<Item = &'a PatchOp>,
) -> ApplyReport {
    let mut doc = match html::parse_document(base) {
        Ok(doc) => doc,
        Err(err) => {
            log::warn!(target: LOG_TARGET, "base document rejected, keeping it as is: {err}");
            return ApplyReport {
                document: base.to_string(),
                outcomes: vec![OpOutcome::Failed(err.into())],
                recovered: true,
            };
        }
    };

    let mut outcomes = Vec::new();
    for op in ops {
        let outcome = apply_one(&mut doc, op).unwrap_or_else(OpOutcome::Failed);
        match &outcome {
            OpOutcome::Failed(err) => {
                log::warn!(
                    target: LOG_TARGET,
                    "{} {} failed, keeping previous document: {err}",
                    op.kind().marker_name(),
                    op.selector().unwrap_or(""),
                );
                outcomes.push(outcome);
                return ApplyReport {
                    document: base.to_string(),
                    outcomes,
                    recovered: true,
                };
            }
            OpOutcome::SkippedNoMatch => {
                log::debug!(
                    target: LOG_TARGET,
                    "{} {} matched nothing",
                    op.kind().marker_name(),
                    op.selector().unwrap_or(""),
                );
            }
            OpOutcome::Applied => {
                log::trace!(target: LOG_TARGET, "applied {}", op.kind().marker_name());
            }
        }
        outcomes.push(outcome);
    }

    ApplyReport {
        document: html::serialize_document(&doc),
        outcomes,
        recovered: false,
    }
}

fn apply_one(doc: &mut Node, op: &PatchOp) -> Result<OpOutcome, ApplyError> {
    match op {
        PatchOp::ReplaceVars { content } => replace_vars(doc, content),
        PatchOp::ReplaceStyles { content } => replace_styles(doc, content),
        PatchOp::Replace { selector, content } => {
            with_target(doc, selector, |doc, path| {
                let nodes = html::parse_fragment(content)?;
                dom_utils::replace_node(doc, path, nodes)?;
                Ok(())
            })
        }
        PatchOp::InsertAfter { selector, content } => {
            with_target(doc, selector, |doc, path| {
                let nodes = html::parse_fragment(content)?;
                dom_utils::insert_after(doc, path, nodes)?;
                Ok(())
            })
        }
        PatchOp::InsertBefore { selector, content } => {
            with_target(doc, selector, |doc, path| {
                let nodes = html::parse_fragment(content)?;
                dom_utils::insert_before(doc, path, nodes)?;
                Ok(())
            })
        }
        PatchOp::Remove { selector } => with_target(doc, selector, |doc, path| {
            dom_utils::remove_node(doc, path)?;
            Ok(())
        }),
    }
}

fn with_target(
    doc: &mut Node,
    selector: &str,
    mutate: impl FnOnce(&mut Node, &[usize]) -> Result<(), ApplyError>,
) -> Result<OpOutcome, ApplyError> {
    let selector = Selector::parse(selector)?;
    let Some(path) = dom_utils::find_first(doc, &selector) else {
        return Ok(OpOutcome::SkippedNoMatch);
    };
    mutate(doc, &path)?;
    Ok(OpOutcome::Applied)
}

fn head_path(doc: &mut Node) -> Result<NodePath, ApplyError> {
    dom_utils::ensure_head(doc).ok_or(ApplyError::NoHead)
}

/// Absolute paths of the `<style>` elements inside the head at `head`.
fn head_styles(doc: &Node, head: &[usize]) -> Vec<NodePath> {
    let Some(head_node) = dom_utils::node_at(doc, head) else {
        return Vec::new();
    };
    dom_utils::find_all_named(head_node, "style")
        .into_iter()
        .map(|rel| head.iter().copied().chain(rel).collect())
        .collect()
}

fn set_text(node: &mut Node, text: String) {
    if let Some(children) = node.children_mut() {
        *children = vec![Node::text(text)];
    }
}

fn replace_vars(doc: &mut Node, content: &str) -> Result<OpOutcome, ApplyError> {
    let declarations = css::declarations_of(content);
    let head = head_path(doc)?;
    let styles = head_styles(doc, &head);

    for path in &styles {
        let Some(style) = dom_utils::node_at_mut(doc, path) else {
            continue;
        };
        let css_text = style.own_text();
        if let Some(block) = css::find_root_block(&css_text) {
            let updated = format!(
                "{}\n{}\n{}",
                &css_text[..=block.open],
                declarations,
                &css_text[block.close..]
            );
            set_text(style, updated);
            return Ok(OpOutcome::Applied);
        }
    }

    let root_rule = format!(":root {{\n{declarations}\n}}\n");
    if let Some(path) = styles.first() {
        if let Some(style) = dom_utils::node_at_mut(doc, path) {
            let css_text = style.own_text();
            set_text(style, format!("{root_rule}{css_text}"));
            return Ok(OpOutcome::Applied);
        }
    }

    let mut style = Node::element("style");
    set_text(&mut style, root_rule);
    let head_children = dom_utils::node_at_mut(doc, &head)
        .and_then(Node::children_mut)
        .ok_or(ApplyError::NoHead)?;
    head_children.insert(0, style);
    Ok(OpOutcome::Applied)
}

fn replace_styles(doc: &mut Node, content: &str) -> Result<OpOutcome, ApplyError> {
    let head = head_path(doc)?;
    // Reverse document order keeps the remaining paths valid while removing.
    for path in head_styles(doc, &head).iter().rev() {
        dom_utils::remove_node(doc, path)?;
    }

    let parsed = Node::Document {
        doctype: None,
        children: html::parse_fragment(content)?,
    };
    let mut styles: Vec<Node> = dom_utils::find_all_named(&parsed, "style")
        .iter()
        .filter_map(|p| dom_utils::node_at(&parsed, p).cloned())
        .collect();
    if styles.is_empty() {
        let mut style = Node::element("style");
        set_text(&mut style, content.trim().to_string());
        styles.push(style);
    }

    let head_children = dom_utils::node_at_mut(doc, &head)
        .and_then(Node::children_mut)
        .ok_or(ApplyError::NoHead)?;
    head_children.extend(styles);
    Ok(OpOutcome::Applied)
}

mod css {
    /// Byte offsets of a rule block's `{` and matching `}`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(super) struct Block {
        pub open: usize,
        pub close: usize,
    }

    /// The first top-level rule whose selector is exactly `:root`.
    pub(super) fn find_root_block(css: &str) -> Option<Block> {
        top_level_blocks(css)
            .into_iter()
            .find(|(prelude, _)| prelude.trim() == ":root")
            .map(|(_, block)| block)
    }

    /// Declarations carried by a REPLACE_VARS body: the inside of its `:root`
    /// rule (or first rule) when it has braces, the body itself otherwise.
    pub(super) fn declarations_of(content: &str) -> String {
        let content = content.trim();
        if !content.contains('{') {
            return content.to_string();
        }
        let blocks = top_level_blocks(content);
        let block = blocks
            .iter()
            .find(|(prelude, _)| prelude.trim() == ":root")
            .or_else(|| blocks.first())
            .map(|(_, block)| *block);
        match block {
            Some(b) => content[b.open + 1..b.close].trim().to_string(),
            None => content.to_string(),
        }
    }

    /// Top-level `prelude { ... }` blocks, skipping comments and strings.
    /// An unterminated trailing block is not reported.
    fn top_level_blocks(css: &str) -> Vec<(&str, Block)> {
        let bytes = css.as_bytes();
        let mut out = Vec::new();
        let mut depth = 0usize;
        let mut prelude_start = 0usize;
        let mut open = 0usize;
        let mut i = 0usize;

        while i < bytes.len() {
            match bytes[i] {
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    let end = css[i + 2..].find("*/").map_or(bytes.len(), |rel| i + 2 + rel + 2);
                    if depth == 0 && css[prelude_start..i].trim().is_empty() {
                        prelude_start = end;
                    }
                    i = end;
                    continue;
                }
                quote @ (b'"' | b'\'') => {
                    let mut j = i + 1;
                    while j < bytes.len() && bytes[j] != quote {
                        j += if bytes[j] == b'\\' { 2 } else { 1 };
                    }
                    i = j + 1;
                    continue;
                }
                b'{' => {
                    if depth == 0 {
                        open = i;
                    }
                    depth += 1;
                }
                b'}' if depth > 0 => {
                    depth -= 1;
                    if depth == 0 {
                        out.push((&css[prelude_start..open], Block { open, close: i }));
                        prelude_start = i + 1;
                    }
                }
                b';' if depth == 0 => prelude_start = i + 1,
                _ => {}
            }
            i += 1;
        }
        out
    }

}
