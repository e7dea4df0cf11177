#![allow(dead_code)]

use core_types::GenerationRequest;
use net::{CancelFlag, OpenedStream, StreamError, StreamOpener};
use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use test_support::ChunkPlan;

/// Prompt that makes [`ScriptedOpener`] hold the stream open until cancelled.
pub const HANG_PROMPT: &str = "hang until cancelled";

/// Opener replaying a fixed list of byte chunks, one chunk per read.
#[derive(Clone, Debug, Default)]
pub struct ScriptedOpener {
    status: u16,
    chunks: Arc<Vec<Vec<u8>>>,
    cancel_after: Option<usize>,
    fail_after: Option<usize>,
    opened: Arc<AtomicUsize>,
}

impl ScriptedOpener {
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            status: 200,
            chunks: Arc::new(chunks),
            ..Self::default()
        }
    }

    pub fn from_plan(input: &str, plan: &ChunkPlan) -> Self {
        Self::new(plan.chunks(input).into_iter().map(<[u8]>::to_vec).collect())
    }

    pub fn whole(input: &str) -> Self {
        Self::new(vec![input.as_bytes().to_vec()])
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Trip the request's cancel flag right after serving `n` chunks.
    pub fn cancel_after(mut self, n: usize) -> Self {
        self.cancel_after = Some(n);
        self
    }

    /// Fail the read that would serve chunk `n`.
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn times_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl StreamOpener for ScriptedOpener {
    fn open(
        &self,
        request: &GenerationRequest,
        cancel: &CancelFlag,
    ) -> Result<OpenedStream, StreamError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if request.prompt == HANG_PROMPT {
            return Ok(OpenedStream {
                status: self.status,
                reader: Box::new(HangingReader {
                    cancel: cancel.clone(),
                }),
            });
        }
        Ok(OpenedStream {
            status: self.status,
            reader: Box::new(ScriptedReader {
                chunks: self.chunks.iter().cloned().collect(),
                served: 0,
                cancel: cancel.clone(),
                cancel_after: self.cancel_after,
                fail_after: self.fail_after,
            }),
        })
    }
}

struct ScriptedReader {
    chunks: VecDeque<Vec<u8>>,
    served: usize,
    cancel: CancelFlag,
    cancel_after: Option<usize>,
    fail_after: Option<usize>,
}

impl Read for ScriptedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.fail_after == Some(self.served) {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer reset"));
        }
        let Some(mut chunk) = self.chunks.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.chunks.push_front(chunk.split_off(n));
        } else {
            self.served += 1;
            if self.cancel_after == Some(self.served) {
                self.cancel.cancel();
            }
        }
        Ok(n)
    }
}

/// Produces nothing until its flag is tripped, then one byte.
struct HangingReader {
    cancel: CancelFlag,
}

impl Read for HangingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !self.cancel.is_cancelled() {
            if Instant::now() > deadline {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "never cancelled"));
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        buf[0] = b' ';
        Ok(1)
    }
}
