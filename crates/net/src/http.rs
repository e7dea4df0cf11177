use crate::{CancelFlag, OpenedStream, StreamError, StreamOpener};
use core_types::GenerationRequest;
use std::time::Duration;
use url::Url;

const LOG_TARGET: &str = "net";

#[derive(Clone, Debug)]
pub struct HttpConfig {
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            endpoint: String::from("http://127.0.0.1:8787/generate"),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("livepatch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// POSTs the request as JSON and streams the response body.
///
/// No read timeout is set: generation runs as long as the generator keeps
/// sending, and callers stop it through the cancel flag.
#[derive(Debug)]
pub struct HttpOpener {
    agent: ureq::Agent,
    endpoint: Url,
}

impl HttpOpener {
    pub fn new(config: &HttpConfig) -> Result<Self, StreamError> {
        let endpoint = Url::parse(&config.endpoint)?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(StreamError::Transport(format!(
                "unsupported scheme {:?}",
                endpoint.scheme()
            )));
        }
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build();
        Ok(Self { agent, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl StreamOpener for HttpOpener {
    fn open(
        &self,
        request: &GenerationRequest,
        cancel: &CancelFlag,
    ) -> Result<OpenedStream, StreamError> {
        if cancel.is_cancelled() {
            return Err(StreamError::Aborted);
        }
        log::debug!(target: LOG_TARGET, "POST {} ({:?})", self.endpoint, request.kind);

        let response = self
            .agent
            .post(self.endpoint.as_str())
            .set("Accept", "text/html")
            .send_json(request)
            .map_err(|err| match err {
                ureq::Error::Status(code, _) => StreamError::Status { code },
                ureq::Error::Transport(transport) => StreamError::Transport(transport.to_string()),
            })?;

        // The cancel may have landed while we were waiting for headers.
        if cancel.is_cancelled() {
            return Err(StreamError::Aborted);
        }
        let status = response.status();
        log::debug!(
            target: LOG_TARGET,
            "{} answered {status} ({})",
            self.endpoint,
            response.content_type()
        );
        Ok(OpenedStream {
            status,
            reader: response.into_reader(),
        })
    }
}
