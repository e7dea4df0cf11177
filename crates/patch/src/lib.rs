//! Streaming patch grammar, the engine that applies it to a document, and the
//! per-stream session that applies each operation exactly once.

pub mod applier;
pub mod apply;
pub mod grammar;

pub use crate::applier::{IncrementalApplier, UpdateResult};
pub use crate::apply::{
    ApplyError, ApplyReport, OpOutcome, apply_operations, apply_operations_with_report,
};
pub use crate::grammar::{
    OpKind, OperationScan, ParsedOp, PatchOp, STREAM_END, STREAM_START, StreamKind,
    classify_stream, has_stream_end, is_patch_stream, parse_operations, scan_operations,
    strip_stream_markers,
};
