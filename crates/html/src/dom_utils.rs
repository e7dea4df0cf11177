//! Path-addressed lookup and structural mutation on a [`Node`] tree.
//!
//! A [`NodePath`] is the list of child indices from the root. Paths are only
//! valid until the next structural mutation.

use crate::selector::Selector;
use crate::types::Node;

pub type NodePath = Vec<usize>;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    #[error("node path {0:?} does not resolve")]
    InvalidPath(NodePath),
    #[error("the document root cannot be replaced, removed or given siblings")]
    RootNotMutable,
}

/// Path of the first node (document order) matching `selector`.
pub fn find_first(root: &Node, selector: &Selector) -> Option<NodePath> {
    fn walk<'a>(
        node: &'a Node,
        selector: &Selector,
        ancestors: &mut Vec<&'a Node>,
        path: &mut NodePath,
    ) -> bool {
        if selector.matches(node, ancestors) {
            return true;
        }
        ancestors.push(node);
        for (i, child) in node.children().iter().enumerate() {
            path.push(i);
            if walk(child, selector, ancestors, path) {
                return true;
            }
            path.pop();
        }
        ancestors.pop();
        false
    }

    let mut path = Vec::new();
    walk(root, selector, &mut Vec::new(), &mut path).then_some(path)
}

/// Paths of every element named `name` below `root`, in document order.
pub fn find_all_named(root: &Node, name: &str) -> Vec<NodePath> {
    fn walk(node: &Node, name: &str, path: &mut NodePath, out: &mut Vec<NodePath>) {
        for (i, child) in node.children().iter().enumerate() {
            path.push(i);
            if child.is_element_named(name) {
                out.push(path.clone());
            }
            walk(child, name, path, out);
            path.pop();
        }
    }

    let mut out = Vec::new();
    walk(root, name, &mut Vec::new(), &mut out);
    out
}

pub fn node_at<'a>(root: &'a Node, path: &[usize]) -> Option<&'a Node> {
    path.iter()
        .try_fold(root, |node, &i| node.children().get(i))
}

pub fn node_at_mut<'a>(root: &'a mut Node, path: &[usize]) -> Option<&'a mut Node> {
    let mut node = root;
    for &i in path {
        node = node.children_mut()?.get_mut(i)?;
    }
    Some(node)
}

fn siblings_mut<'a>(
    root: &'a mut Node,
    path: &[usize],
) -> Result<(&'a mut Vec<Node>, usize), MutationError> {
    let Some((&index, parent_path)) = path.split_last() else {
        return Err(MutationError::RootNotMutable);
    };
    let siblings = node_at_mut(root, parent_path)
        .and_then(Node::children_mut)
        .filter(|children| index < children.len())
        .ok_or_else(|| MutationError::InvalidPath(path.to_vec()))?;
    Ok((siblings, index))
}

/// Replace the node at `path` with `replacement` (possibly several siblings, possibly none).
pub fn replace_node(
    root: &mut Node,
    path: &[usize],
    replacement: Vec<Node>,
) -> Result<Node, MutationError> {
    let (siblings, index) = siblings_mut(root, path)?;
    let mut removed = siblings.splice(index..=index, replacement);
    removed
        .next()
        .ok_or_else(|| MutationError::InvalidPath(path.to_vec()))
}

pub fn insert_before(
    root: &mut Node,
    path: &[usize],
    nodes: Vec<Node>,
) -> Result<(), MutationError> {
    let (siblings, index) = siblings_mut(root, path)?;
    siblings.splice(index..index, nodes);
    Ok(())
}

pub fn insert_after(
    root: &mut Node,
    path: &[usize],
    nodes: Vec<Node>,
) -> Result<(), MutationError> {
    let (siblings, index) = siblings_mut(root, path)?;
    siblings.splice(index + 1..index + 1, nodes);
    Ok(())
}

pub fn remove_node(root: &mut Node, path: &[usize]) -> Result<Node, MutationError> {
    let (siblings, index) = siblings_mut(root, path)?;
    Ok(siblings.remove(index))
}

/// Path of the first `<head>` element.
pub fn find_head(root: &Node) -> Option<NodePath> {
    find_all_named(root, "head").into_iter().next()
}

/// Path of the `<head>` element, creating an empty one first if the document
/// has none: as the first child of `<html>`, or of the document itself.
///
/// `None` only when `root` is a text or comment node.
pub fn ensure_head(root: &mut Node) -> Option<NodePath> {
    if let Some(path) = find_head(root) {
        return Some(path);
    }
    let mut parent_path = find_all_named(root, "html")
        .into_iter()
        .next()
        .unwrap_or_default();
    let children = node_at_mut(root, &parent_path).and_then(Node::children_mut)?;
    children.insert(0, Node::element("head"));
    parent_path.push(0);
    Some(parent_path)
}
