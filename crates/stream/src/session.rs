use core_types::RequestId;
use net::CancelFlag;

/// Handle for the generation a [`GenerationSession`] just started.
#[derive(Clone, Debug)]
pub struct Ticket {
    pub request_id: RequestId,
    pub cancel: CancelFlag,
}

/// Single-flight bookkeeping: at most one generation is live at a time.
#[derive(Debug, Default)]
pub struct GenerationSession {
    last_id: RequestId,
    active: Option<Ticket>,
}

impl GenerationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel whatever is running and issue a fresh id and flag.
    pub fn begin(&mut self) -> Ticket {
        self.cancel_active();
        self.last_id += 1;
        let ticket = Ticket {
            request_id: self.last_id,
            cancel: CancelFlag::new(),
        };
        self.active = Some(ticket.clone());
        ticket
    }

    pub fn cancel_active(&mut self) -> Option<RequestId> {
        let ticket = self.active.take()?;
        ticket.cancel.cancel();
        Some(ticket.request_id)
    }

    /// Mark `request_id` finished. Stale ids (already superseded) are ignored.
    pub fn finish(&mut self, request_id: RequestId) -> bool {
        if self.active_id() == Some(request_id) {
            self.active = None;
            true
        } else {
            false
        }
    }

    pub fn active_id(&self) -> Option<RequestId> {
        self.active.as_ref().map(|t| t.request_id)
    }
}
