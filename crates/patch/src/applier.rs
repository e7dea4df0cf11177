//! Per-stream applier session.
//!
//! The caller hands over the whole accumulated text on every chunk. The
//! applier rescans it, applies only the operations it has not applied before
//! to its current snapshot, and keeps the result. Operations are identified by
//! the offset of their opening marker, which never moves as the text grows.

use crate::apply::{self, OpOutcome};
use crate::grammar::{self, ParsedOp};
use std::collections::BTreeSet;

const LOG_TARGET: &str = "patch.apply";

/// What an [`IncrementalApplier::update`] call produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateResult<'a> {
    pub document: &'a str,
    /// True when at least one new operation was consumed by this call.
    pub applied_new: bool,
}

#[derive(Debug, Clone)]
pub struct IncrementalApplier {
    document: String,
    applied: BTreeSet<usize>,
    failed: usize,
}

impl IncrementalApplier {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            document: base.into(),
            applied: BTreeSet::new(),
            failed: 0,
        }
    }

    /// Apply the operations of `text` not applied yet. An operation is held
    /// back while an opener that starts before it is still unclosed, so the
    /// document always sees operations in start order.
    pub fn update(&mut self, text: &str) -> UpdateResult<'_> {
        let scan = grammar::scan_operations(text);
        let frontier = scan.first_unclosed.unwrap_or(usize::MAX);
        self.apply_pending(scan.ops, frontier)
    }

    fn apply_pending(&mut self, ops: Vec<ParsedOp>, frontier: usize) -> UpdateResult<'_> {
        let pending: Vec<ParsedOp> = ops
            .into_iter()
            .filter(|p| p.start < frontier && !self.applied.contains(&p.start))
            .collect();

        if pending.is_empty() {
            return UpdateResult {
                document: &self.document,
                applied_new: false,
            };
        }

        let report =
            apply::apply_operations_with_report(&self.document, pending.iter().map(|p| &p.op));
        if report.recovered {
            // One bad operation must not take the rest of the batch down with it.
            self.apply_one_by_one(&pending);
        } else {
            self.document = report.document;
        }
        self.applied.extend(pending.iter().map(|p| p.start));

        UpdateResult {
            document: &self.document,
            applied_new: true,
        }
    }

    fn apply_one_by_one(&mut self, pending: &[ParsedOp]) {
        for parsed in pending {
            let report = apply::apply_operations_with_report(&self.document, [&parsed.op]);
            if report.recovered {
                self.failed += 1;
                log::warn!(
                    target: LOG_TARGET,
                    "dropping {} at offset {}: {:?}",
                    parsed.op.kind().marker_name(),
                    parsed.start,
                    report.outcomes.last().unwrap_or(&OpOutcome::SkippedNoMatch),
                );
            } else {
                self.document = report.document;
            }
        }
    }

    /// Final pass over the complete text. Operations held behind an opener
    /// that never closed are applied now, in start order.
    pub fn finalize(&mut self, text: &str) -> String {
        self.apply_pending(grammar::parse_operations(text), usize::MAX);
        self.document.clone()
    }

    pub fn current_document(&self) -> &str {
        &self.document
    }

    /// Operations consumed so far, including ones that failed to apply.
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = concat!(
        "<!DOCTYPE html><html><head></head><body>",
        "<p id=\"a\">a</p><p id=\"b\">b</p>",
        "</body></html>",
    );

    #[test]
    fn nothing_complete_leaves_base_untouched() {
        let mut applier = IncrementalApplier::new(BASE);
        let result = applier.update("<!-- PATCH -->\n<!-- REPLACE #a --><p>x");
        assert!(!result.applied_new);
        assert_eq!(result.document, BASE);
        assert_eq!(applier.applied_count(), 0);
    }

    #[test]
    fn same_text_twice_is_idempotent() {
        let text = "<!-- PATCH --><!-- REMOVE #a -->";
        let mut applier = IncrementalApplier::new(BASE);
        let first = applier.update(text).document.to_string();
        let second = applier.update(text);
        assert!(!second.applied_new);
        assert_eq!(second.document, first);
        assert_eq!(applier.applied_count(), 1);
    }

    #[test]
    fn nested_remove_waits_for_enclosing_replace() {
        let base = "<html><head></head><body><div id=\"a\">A</div></body></html>";
        let partial = "<!-- PATCH --><!-- REPLACE #a --><div id=a>X</div><!-- REMOVE #a -->";
        let full = format!("{partial}<!-- /REPLACE -->");

        let oneshot = IncrementalApplier::new(base).finalize(&full);
        // REPLACE runs first, then REMOVE takes out the replacement.
        assert!(!oneshot.contains(">A<"));
        assert!(!oneshot.contains(">X<"));

        let mut applier = IncrementalApplier::new(base);
        let held = applier.update(partial);
        assert!(!held.applied_new);
        assert_eq!(held.document, base);
        assert_eq!(applier.applied_count(), 0);
        assert_eq!(applier.finalize(&full), oneshot);
        assert_eq!(applier.applied_count(), 2);
    }

    #[test]
    fn held_operations_apply_when_stream_ends_unclosed() {
        let text = "<!-- PATCH --><!-- REPLACE #b --><p>never closed<!-- REMOVE #a -->";
        let mut applier = IncrementalApplier::new(BASE);
        assert!(!applier.update(text).applied_new);
        let doc = applier.finalize(text);
        assert_eq!(doc, IncrementalApplier::new(BASE).finalize(text));
        assert!(!doc.contains("id=\"a\""));
        assert!(doc.contains("id=\"b\""));
    }

    #[test]
    fn failing_operation_does_not_block_others() {
        let text = "<!-- PATCH --><!-- REMOVE p > b --><!-- REMOVE #a -->";
        let mut applier = IncrementalApplier::new(BASE);
        let result = applier.update(text);
        assert!(result.applied_new);
        assert!(!result.document.contains("id=\"a\""));
        assert_eq!(applier.applied_count(), 2);
        assert_eq!(applier.failed_count(), 1);
    }
}
