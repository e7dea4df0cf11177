use crate::consumer::StreamConsumer;
use crate::phase::{Phase, ResponseMode};
use core_types::{GenerationRequest, GenerationResult};
use net::{CancelFlag, StreamError, StreamOpener};
use patch::IncrementalApplier;
use std::collections::BTreeMap;

const LOG_TARGET: &str = "stream.run";

/// Name of the document shown when a response carries several files.
pub const PRIMARY_FILE: &str = "index.html";

/// One generation from request to final document.
///
/// Patch responses are applied to the base document as operations complete;
/// full documents replace it chunk by chunk. The latest materialized document
/// stays available after an error or cancellation.
#[derive(Debug)]
pub struct GenerationRun {
    base: String,
    applier: Option<IncrementalApplier>,
    latest: String,
}

impl GenerationRun {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            latest: base.clone(),
            base,
            applier: None,
        }
    }

    /// A run whose base is the document the request refines, if any.
    pub fn for_request(request: &GenerationRequest) -> Self {
        Self::new(request.base_document.clone().unwrap_or_default())
    }

    pub fn latest_document(&self) -> &str {
        &self.latest
    }

    pub fn applied_operations(&self) -> usize {
        self.applier.as_ref().map_or(0, IncrementalApplier::applied_count)
    }

    /// Stream the response for `request` to completion. `on_update` sees every
    /// new materialized document along with the response phase.
    pub fn drive<O: StreamOpener>(
        &mut self,
        consumer: &mut StreamConsumer<O>,
        request: &GenerationRequest,
        cancel: &CancelFlag,
        mut on_update: impl FnMut(Phase, &str),
    ) -> Result<GenerationResult, StreamError> {
        let mut chunks = consumer.consume(request, cancel)?;
        while let Some(chunk) = chunks.next() {
            chunk?;
            if self.refresh(chunks.response_mode(), chunks.full_text(), chunks.files()) {
                on_update(chunks.phase(), &self.latest);
            }
        }
        drop(chunks);

        let files = consumer.files().cloned();
        let document = match consumer.response_mode() {
            Some(ResponseMode::Patch) => self
                .applier
                .get_or_insert_with(|| IncrementalApplier::new(self.base.clone()))
                .finalize(consumer.full_text()),
            // Too short to classify means it cannot be a patch stream.
            Some(ResponseMode::FullDocument) | None => {
                primary_document(consumer.full_text(), files.as_ref())
            }
        };
        if document != self.latest {
            self.latest = document.clone();
            on_update(consumer.phase(), &self.latest);
        }
        log::info!(
            target: LOG_TARGET,
            "generation finished: {} bytes, {} operations",
            document.len(),
            self.applied_operations()
        );

        Ok(GenerationResult {
            document,
            files,
            usage: 0,
        })
    }

    fn refresh(
        &mut self,
        mode: Option<ResponseMode>,
        full_text: &str,
        files: Option<&BTreeMap<String, String>>,
    ) -> bool {
        match mode {
            None => false,
            Some(ResponseMode::Patch) => {
                let applier = self
                    .applier
                    .get_or_insert_with(|| IncrementalApplier::new(self.base.clone()));
                let update = applier.update(full_text);
                if update.applied_new {
                    self.latest = update.document.to_string();
                }
                update.applied_new
            }
            Some(ResponseMode::FullDocument) => {
                self.latest = primary_document(full_text, files);
                true
            }
        }
    }
}

fn primary_document(full_text: &str, files: Option<&BTreeMap<String, String>>) -> String {
    match files {
        Some(files) => files
            .get(PRIMARY_FILE)
            .or_else(|| files.values().next())
            .cloned()
            .unwrap_or_default(),
        None => full_text.to_string(),
    }
}
