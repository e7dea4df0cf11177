//! Shared helpers for streaming tests across the workspace.

pub mod chunk;
pub mod chunker;

pub use chunk::{BoundaryPolicy, ChunkPlan};
pub use chunker::{ChunkPlanCase, build_chunk_plans, build_chunk_plans_utf8};

/// First differing line of two documents, with a little context, for assertion messages.
pub fn diff_lines(expected: &str, actual: &str) -> String {
    use std::fmt::Write;

    let expected: Vec<&str> = expected.lines().collect();
    let actual: Vec<&str> = actual.lines().collect();
    let max = expected.len().max(actual.len());
    let missing = "<missing>";
    let Some(i) = (0..max).find(|&i| expected.get(i) != actual.get(i)) else {
        return String::from("documents are identical");
    };

    let mut out = String::new();
    let start = i.saturating_sub(2);
    let end = (i + 3).min(max);
    let _ = writeln!(out, "first mismatch at line {} (showing {}..={}):", i + 1, start + 1, end);
    for line_idx in start..end {
        let left = expected.get(line_idx).copied().unwrap_or(missing);
        let right = actual.get(line_idx).copied().unwrap_or(missing);
        let marker = if line_idx == i { ">" } else { " " };
        let _ = writeln!(out, "{marker} {:>4}  expected: {left}", line_idx + 1);
        let _ = writeln!(out, "{marker} {:>4}    actual: {right}", line_idx + 1);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_points_at_first_mismatch() {
        let out = diff_lines("a\nb\nc", "a\nx\nc");
        assert!(out.starts_with("first mismatch at line 2"));
        assert!(out.contains(">    2    actual: x"));
    }
}
