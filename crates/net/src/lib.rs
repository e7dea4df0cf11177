//! Transport seam for generation requests: open a readable byte stream for a
//! request, observe a cancellation flag, report failures as [`StreamError`].

mod cancel;
mod http;

pub use crate::cancel::CancelFlag;
pub use crate::http::{HttpConfig, HttpOpener};

use core_types::GenerationRequest;
use std::io::Read;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("generator answered with status {code}")]
    Status { code: u16 },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("invalid generator endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("generation aborted")]
    Aborted,
}

impl StreamError {
    /// Cancellation is expected control flow, not a failure to report.
    pub fn is_abort(&self) -> bool {
        matches!(self, StreamError::Aborted)
    }
}

/// A successfully opened response body.
pub struct OpenedStream {
    pub status: u16,
    pub reader: Box<dyn Read + Send>,
}

impl std::fmt::Debug for OpenedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedStream")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Opens the byte stream for one generation request.
pub trait StreamOpener {
    fn open(
        &self,
        request: &GenerationRequest,
        cancel: &CancelFlag,
    ) -> Result<OpenedStream, StreamError>;
}

impl<T: StreamOpener + ?Sized> StreamOpener for &T {
    fn open(
        &self,
        request: &GenerationRequest,
        cancel: &CancelFlag,
    ) -> Result<OpenedStream, StreamError> {
        (**self).open(request, cancel)
    }
}

impl<T: StreamOpener + ?Sized> StreamOpener for Box<T> {
    fn open(
        &self,
        request: &GenerationRequest,
        cancel: &CancelFlag,
    ) -> Result<OpenedStream, StreamError> {
        (**self).open(request, cancel)
    }
}
