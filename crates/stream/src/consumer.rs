use crate::files::split_files;
use crate::phase::{self, Phase, PhaseTracker, ResponseMode};
use core_types::GenerationRequest;
use net::{CancelFlag, StreamError, StreamOpener};
use std::collections::BTreeMap;
use std::io::{self, Read};
use tools::Utf8Decoder;

const LOG_TARGET: &str = "stream.consumer";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConsumerConfig {
    pub read_buffer_bytes: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            read_buffer_bytes: 8 * 1024,
        }
    }
}

/// Snapshot handed to the progress callback after every chunk.
#[derive(Debug)]
pub struct Progress<'a> {
    pub chunk: &'a str,
    pub full_text: &'a str,
    pub phase: Phase,
    pub mode: Option<ResponseMode>,
    pub files: Option<&'a BTreeMap<String, String>>,
}

pub type ProgressCallback = Box<dyn FnMut(&Progress<'_>) + Send>;

#[derive(Debug, Default)]
struct ConsumerState {
    full_text: String,
    files: Option<BTreeMap<String, String>>,
    mode: Option<ResponseMode>,
    phase: PhaseTracker,
    decoder: Utf8Decoder,
}

/// Reads a generation response chunk by chunk and keeps the accumulated
/// text, its phase and its file split up to date.
pub struct StreamConsumer<O> {
    opener: O,
    config: ConsumerConfig,
    state: ConsumerState,
    on_progress: Option<ProgressCallback>,
}

impl<O: StreamOpener> StreamConsumer<O> {
    pub fn new(opener: O, config: ConsumerConfig) -> Self {
        Self {
            opener,
            config,
            state: ConsumerState::default(),
            on_progress: None,
        }
    }

    pub fn on_progress(&mut self, callback: impl FnMut(&Progress<'_>) + Send + 'static) {
        self.on_progress = Some(Box::new(callback));
    }

    /// Open the response for `request`. Reading happens only as the returned
    /// iterator is advanced; any state from a previous response is cleared.
    pub fn consume(
        &mut self,
        request: &GenerationRequest,
        cancel: &CancelFlag,
    ) -> Result<Chunks<'_, O>, StreamError> {
        self.reset();
        if cancel.is_cancelled() {
            return Err(StreamError::Aborted);
        }
        let opened = self.opener.open(request, cancel)?;
        if !(200..300).contains(&opened.status) {
            log::warn!(target: LOG_TARGET, "generator answered {}", opened.status);
            return Err(StreamError::Status {
                code: opened.status,
            });
        }
        let buf = vec![0; self.config.read_buffer_bytes.max(1)];
        Ok(Chunks {
            consumer: self,
            reader: Some(opened.reader),
            cancel: cancel.clone(),
            buf,
        })
    }

    pub fn full_text(&self) -> &str {
        &self.state.full_text
    }

    pub fn files(&self) -> Option<&BTreeMap<String, String>> {
        self.state.files.as_ref()
    }

    pub fn is_multi_document(&self) -> bool {
        self.state.files.is_some()
    }

    pub fn phase(&self) -> Phase {
        self.state.phase.phase()
    }

    /// `None` until enough text has arrived to tell.
    pub fn response_mode(&self) -> Option<ResponseMode> {
        self.state.mode
    }

    pub fn reset(&mut self) {
        self.state = ConsumerState::default();
    }

    fn absorb(&mut self, chunk: String) -> String {
        let state = &mut self.state;
        state.full_text.push_str(&chunk);
        if state.mode.is_none() {
            state.mode = phase::response_mode(&state.full_text);
            if let Some(mode) = state.mode {
                log::debug!(target: LOG_TARGET, "response is {mode:?}");
            }
        }
        state.files = split_files(&state.full_text);
        let before = state.phase.phase();
        let now = state.phase.observe(&state.full_text, state.mode);
        if now != before {
            log::debug!(target: LOG_TARGET, "phase {before:?} -> {now:?}");
        }

        if let Some(callback) = self.on_progress.as_mut() {
            callback(&Progress {
                chunk: &chunk,
                full_text: &state.full_text,
                phase: now,
                mode: state.mode,
                files: state.files.as_ref(),
            });
        }
        chunk
    }
}

/// Single-use iterator over the decoded chunks of one response.
///
/// Yields `Err(StreamError::Aborted)` once if the cancel flag is set, and
/// ends after any error.
pub struct Chunks<'a, O> {
    consumer: &'a mut StreamConsumer<O>,
    reader: Option<Box<dyn Read + Send>>,
    cancel: CancelFlag,
    buf: Vec<u8>,
}

impl<O: StreamOpener> Chunks<'_, O> {
    pub fn full_text(&self) -> &str {
        self.consumer.full_text()
    }

    pub fn files(&self) -> Option<&BTreeMap<String, String>> {
        self.consumer.files()
    }

    pub fn phase(&self) -> Phase {
        self.consumer.phase()
    }

    pub fn response_mode(&self) -> Option<ResponseMode> {
        self.consumer.response_mode()
    }
}

impl<O: StreamOpener> Iterator for Chunks<'_, O> {
    type Item = Result<String, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let reader = self.reader.as_mut()?;
            if self.cancel.is_cancelled() {
                self.reader = None;
                log::debug!(
                    target: LOG_TARGET,
                    "aborted after {} bytes",
                    self.consumer.state.full_text.len()
                );
                return Some(Err(StreamError::Aborted));
            }

            match reader.read(&mut self.buf) {
                Ok(0) => {
                    self.reader = None;
                    let tail = self.consumer.state.decoder.finish();
                    log::debug!(
                        target: LOG_TARGET,
                        "stream ended after {} bytes",
                        self.consumer.state.full_text.len() + tail.len()
                    );
                    return (!tail.is_empty()).then(|| Ok(self.consumer.absorb(tail)));
                }
                Ok(n) => {
                    let text = self.consumer.state.decoder.decode(&self.buf[..n]);
                    if !text.is_empty() {
                        return Some(Ok(self.consumer.absorb(text)));
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => {
                    self.reader = None;
                    log::warn!(target: LOG_TARGET, "read failed: {err}");
                    return Some(Err(err.into()));
                }
            }
        }
    }
}
