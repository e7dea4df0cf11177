//! Background generation runtime: commands in, events out, one worker
//! thread per generation, at most one generation live at a time.

use crate::consumer::{ConsumerConfig, StreamConsumer};
use crate::phase::Phase;
use crate::run::GenerationRun;
use crate::session::{GenerationSession, Ticket};
use core_types::{GenerationRequest, GenerationResult, RequestId};
use net::StreamOpener;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

#[derive(Debug)]
pub enum GenerationCommand {
    Start { request: GenerationRequest },
    Cancel,
}

#[derive(Debug)]
pub enum GenerationEvent {
    Started {
        request_id: RequestId,
    },
    Update {
        request_id: RequestId,
        phase: Phase,
        document: String,
    },
    Done {
        request_id: RequestId,
        result: GenerationResult,
    },
    Aborted {
        request_id: RequestId,
        /// Document as materialized when the cancel landed.
        partial: String,
    },
    Failed {
        request_id: RequestId,
        error: String,
    },
}

impl GenerationEvent {
    pub fn request_id(&self) -> RequestId {
        match self {
            GenerationEvent::Started { request_id }
            | GenerationEvent::Update { request_id, .. }
            | GenerationEvent::Done { request_id, .. }
            | GenerationEvent::Aborted { request_id, .. }
            | GenerationEvent::Failed { request_id, .. } => *request_id,
        }
    }
}

/// What the coordinator thread reacts to: caller commands plus reports from
/// its own workers.
enum Inbox {
    Command(GenerationCommand),
    Finished(RequestId),
    Shutdown,
}

/// Runs until `cmd_rx` disconnects. Workers still streaming at that point
/// are cancelled.
pub fn start_generation_runtime<O>(
    opener: O,
    config: ConsumerConfig,
    cmd_rx: Receiver<GenerationCommand>,
    evt_tx: Sender<GenerationEvent>,
) -> JoinHandle<()>
where
    O: StreamOpener + Clone + Send + 'static,
{
    let (inbox_tx, inbox_rx) = mpsc::channel();

    let forward = inbox_tx.clone();
    thread::spawn(move || {
        while let Ok(cmd) = cmd_rx.recv() {
            if forward.send(Inbox::Command(cmd)).is_err() {
                return;
            }
        }
        let _ = forward.send(Inbox::Shutdown);
    });

    thread::spawn(move || {
        let mut coordinator = Coordinator::new(opener, config, evt_tx, inbox_tx);
        while let Ok(msg) = inbox_rx.recv() {
            if !coordinator.handle(msg) {
                break;
            }
        }
    })
}

struct Coordinator<O> {
    opener: O,
    config: ConsumerConfig,
    session: GenerationSession,
    evt_tx: Sender<GenerationEvent>,
    inbox_tx: Sender<Inbox>,
}

impl<O> Coordinator<O>
where
    O: StreamOpener + Clone + Send + 'static,
{
    fn new(
        opener: O,
        config: ConsumerConfig,
        evt_tx: Sender<GenerationEvent>,
        inbox_tx: Sender<Inbox>,
    ) -> Self {
        Self {
            opener,
            config,
            session: GenerationSession::new(),
            evt_tx,
            inbox_tx,
        }
    }

    /// Returns false once the runtime should stop.
    fn handle(&mut self, msg: Inbox) -> bool {
        match msg {
            Inbox::Command(GenerationCommand::Start { request }) => self.start(request),
            Inbox::Command(GenerationCommand::Cancel) => {
                self.session.cancel_active();
            }
            Inbox::Finished(request_id) => {
                self.session.finish(request_id);
            }
            Inbox::Shutdown => {
                self.session.cancel_active();
                return false;
            }
        }
        true
    }

    fn start(&mut self, request: GenerationRequest) {
        let ticket = self.session.begin();
        let request_id = ticket.request_id;
        let _ = self.evt_tx.send(GenerationEvent::Started { request_id });

        let opener = self.opener.clone();
        let config = self.config;
        let evt_tx = self.evt_tx.clone();
        let inbox_tx = self.inbox_tx.clone();
        thread::spawn(move || {
            run_worker(opener, config, request, ticket, evt_tx);
            let _ = inbox_tx.send(Inbox::Finished(request_id));
        });
    }
}

fn run_worker<O: StreamOpener>(
    opener: O,
    config: ConsumerConfig,
    request: GenerationRequest,
    ticket: Ticket,
    evt_tx: Sender<GenerationEvent>,
) {
    let request_id = ticket.request_id;
    let mut consumer = StreamConsumer::new(opener, config);
    let mut run = GenerationRun::for_request(&request);

    let updates = evt_tx.clone();
    let outcome = run.drive(&mut consumer, &request, &ticket.cancel, |phase, document| {
        let _ = updates.send(GenerationEvent::Update {
            request_id,
            phase,
            document: document.to_string(),
        });
    });

    let event = match outcome {
        Ok(result) => GenerationEvent::Done { request_id, result },
        Err(err) if err.is_abort() => GenerationEvent::Aborted {
            request_id,
            partial: run.latest_document().to_string(),
        },
        Err(err) => GenerationEvent::Failed {
            request_id,
            error: err.to_string(),
        },
    };
    let _ = evt_tx.send(event);
}
