//! Line-delimited JSON host protocol.
//!
//! Each input line is one [`Command`], optionally carrying a numeric `id`
//! that is echoed on its [`Reply`]. Every command except `message` gets
//! exactly one reply line. Malformed lines are answered with an `error`
//! reply and the loop keeps going.
//!
//! `fetch`, `message` and `page_load` run as their own tasks, so a slow
//! network call never holds up other requests; their replies are written
//! as they complete and may arrive out of order. `connectivity`, `status`
//! and `script` are answered in input order.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tillcache_client::{ConnectivityEvent, Coordinator, Navigation, WorkerHandle};
use tillcache_core::{Destination, Message, Request, RequestMode, Response};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc};
use url::Url;

use crate::error::HostError;
use crate::lifecycle::LifecycleState;
use crate::worker::ServiceWorker;

fn default_method() -> String {
    "GET".into()
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Fetch {
        url: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default)]
        mode: RequestMode,
        #[serde(default)]
        destination: Destination,
    },
    Message {
        data: Message,
    },
    PageLoad {
        page_url: String,
        html: String,
    },
    Connectivity {
        event: ConnectivityEvent,
        path: String,
    },
    Status,
    Script {
        source: String,
    },
}

impl Command {
    /// Commands that may wait on the network run off the reader task.
    fn is_detached(&self) -> bool {
        matches!(self, Command::Fetch { .. } | Command::Message { .. } | Command::PageLoad { .. })
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum Reply {
    Response {
        status: u16,
        headers: BTreeMap<String, String>,
        /// Exact body bytes, base64 encoded.
        body_base64: String,
        /// A background refresh was started for this response.
        revalidating: bool,
    },
    Passthrough,
    Pushed {
        count: usize,
    },
    Redirect {
        to: String,
    },
    Stay,
    Status {
        state: LifecycleState,
        partitions: Vec<String>,
    },
    Error {
        message: String,
    },
}

impl Reply {
    fn response(response: Response, revalidating: bool) -> Self {
        let body_base64 = BASE64.encode(&response.body);
        Reply::Response { status: response.status, headers: response.headers, body_base64, revalidating }
    }
}

impl From<HostError> for Reply {
    fn from(err: HostError) -> Self {
        Reply::Error { message: err.to_string() }
    }
}

/// A protocol line: a command or reply plus the caller's correlation id.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Framed<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub body: T,
}

/// Protocol front end over one worker and one page coordinator.
#[derive(Clone)]
pub struct Host {
    worker: Arc<ServiceWorker>,
    coordinator: Arc<Mutex<Coordinator>>,
    origin: Url,
}

impl Host {
    pub fn new(worker: Arc<ServiceWorker>, coordinator: Coordinator, origin: Url) -> Self {
        Self { worker, coordinator: Arc::new(Mutex::new(coordinator)), origin }
    }

    fn resolve(&self, raw: &str) -> Result<Url, HostError> {
        self.origin.join(raw).map_err(|e| HostError::InvalidUrl(format!("{raw}: {e}")))
    }

    /// Parse one line; a malformed line becomes its error reply.
    fn parse(line: &str) -> Result<Framed<Command>, Framed<Reply>> {
        let value: serde_json::Value =
            serde_json::from_str(line).map_err(|e| Framed { id: None, body: HostError::from(e).into() })?;
        let id = value.get("id").and_then(serde_json::Value::as_u64);
        serde_json::from_value(value).map_err(|e| Framed { id, body: HostError::from(e).into() })
    }

    /// Handle one protocol line to completion. `None` means no reply is written.
    pub async fn handle_line(&self, line: &str) -> Option<Framed<Reply>> {
        match Self::parse(line) {
            Ok(command) => self.execute(command).await,
            Err(reply) => Some(reply),
        }
    }

    async fn execute(&self, command: Framed<Command>) -> Option<Framed<Reply>> {
        let id = command.id;
        let reply = match self.dispatch(command.body).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(?id, "command failed: {e}");
                Some(e.into())
            }
        };
        reply.map(|body| Framed { id, body })
    }

    async fn dispatch(&self, command: Command) -> Result<Option<Reply>, HostError> {
        match command {
            Command::Fetch { url, method, mode, destination } => {
                let request = Request { method: method.to_ascii_uppercase(), url: self.resolve(&url)?, mode, destination };
                let reply = match self.worker.handle_fetch(&request).await {
                    Some(handled) => Reply::response(handled.response, handled.revalidation.is_some()),
                    None => Reply::Passthrough,
                };
                Ok(Some(reply))
            }
            Command::Message { data } => {
                self.worker.post_message(data).await?;
                Ok(None)
            }
            Command::PageLoad { page_url, html } => {
                let page_url = self.resolve(&page_url)?;
                let coordinator = self.coordinator.lock().await.clone();
                let count = coordinator.on_page_load(&html, &page_url, self.worker.as_ref()).await?;
                Ok(Some(Reply::Pushed { count }))
            }
            Command::Connectivity { event, path } => {
                let navigation = self.coordinator.lock().await.on_connectivity(event, &path);
                Ok(Some(match navigation {
                    Navigation::Stay => Reply::Stay,
                    Navigation::Redirect(to) => Reply::Redirect { to },
                }))
            }
            Command::Status => {
                let state = self.worker.state().await;
                let partitions = self.worker.store().partition_names().await?;
                Ok(Some(Reply::Status { state, partitions }))
            }
            Command::Script { source } => Ok(Some(Reply::response(self.worker.script(&source), false))),
        }
    }

    /// Serve commands from `input` until it is exhausted and every
    /// detached command has replied.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> Result<(), HostError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Framed<Reply>>();
        let mut lines = input.lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match Self::parse(line) {
                        Err(reply) => write_reply(&mut output, &reply).await?,
                        Ok(command) if command.body.is_detached() => {
                            let host = self.clone();
                            let tx = tx.clone();
                            tokio::spawn(async move {
                                if let Some(reply) = host.execute(command).await {
                                    let _ = tx.send(reply);
                                }
                            });
                        }
                        Ok(command) => {
                            if let Some(reply) = self.execute(command).await {
                                write_reply(&mut output, &reply).await?;
                            }
                        }
                    }
                }
                Some(reply) = rx.recv() => write_reply(&mut output, &reply).await?,
            }
        }

        drop(tx);
        while let Some(reply) = rx.recv().await {
            write_reply(&mut output, &reply).await?;
        }
        tracing::info!("input closed");
        Ok(())
    }
}

async fn write_reply<W: AsyncWrite + Unpin>(output: &mut W, reply: &Framed<Reply>) -> Result<(), HostError> {
    let mut encoded = serde_json::to_vec(reply)?;
    encoded.push(b'\n');
    output.write_all(&encoded).await?;
    output.flush().await?;
    Ok(())
}
