//! Read/write access to the remote quiz authority.

use std::{
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use futures::future::{AbortHandle, Abortable};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::SessionKey,
    protocol::{Ack, Mutation, RematchState, RoundSnapshot, SessionQuery},
};
use tokio::sync::watch;
use tracing::debug;
use url::Url;

use crate::{
    config::RetryPolicy, error::SyncError, gate::FetchMode, retry::retry_with_backoff,
    view::ImageLoader,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait QuizApi: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<RoundSnapshot, SyncError>;
    /// Issues one write. A not-ok body is returned as-is, not as an error.
    async fn submit(&self, mutation: &Mutation) -> Result<Ack, SyncError>;
    async fn rematch_state(&self) -> Result<RematchState, SyncError>;
}

/// `QuizApi` over the authority's JSON endpoints.
pub struct HttpQuizApi {
    http: Client,
    base: Url,
    session: SessionKey,
}

impl HttpQuizApi {
    pub fn new(server_url: &str, session: SessionKey) -> Result<Self, url::ParseError> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Ok(Self {
            http,
            base: base_url(server_url)?,
            session,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, SyncError> {
        self.base
            .join(path)
            .map_err(|err| SyncError::Network(format!("invalid endpoint {path}: {err}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SyncError> {
        let response = self
            .http
            .get(self.endpoint(path)?)
            .query(&SessionQuery::from(self.session))
            .send()
            .await?;
        decode_body(response).await
    }
}

#[async_trait]
impl QuizApi for HttpQuizApi {
    async fn fetch_snapshot(&self) -> Result<RoundSnapshot, SyncError> {
        self.get_json("api/get_state").await
    }

    async fn submit(&self, mutation: &Mutation) -> Result<Ack, SyncError> {
        let response = self
            .http
            .post(self.endpoint(mutation.path())?)
            .json(&mutation.request(self.session))
            .send()
            .await?;
        decode_body(response).await
    }

    async fn rematch_state(&self) -> Result<RematchState, SyncError> {
        self.get_json("api/rematch/state").await
    }
}

/// Error statuses still carry a JSON envelope (`{"ok": false, ...}`); only
/// bodies that fail to decode are treated as faults.
async fn decode_body<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SyncError> {
    let status = response.status();
    let bytes = response.bytes().await?;
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(value),
        Err(err) if is_transport_status(status) => {
            debug!(status = status.as_u16(), error = %err, "remote: undecodable error response");
            Err(SyncError::Network(format!("http status {status}")))
        }
        Err(err) => Err(err.into()),
    }
}

fn is_transport_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

fn base_url(server_url: &str) -> Result<Url, url::ParseError> {
    let mut base = Url::parse(server_url.trim())?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

/// Routes a question image through the authority's image proxy.
pub fn proxied_image_url(server_url: &str, image: &str) -> Result<String, url::ParseError> {
    let mut url = base_url(server_url)?.join("api/img")?;
    url.query_pairs_mut().append_pair("u", image);
    Ok(url.into())
}

/// Preloads images with a plain GET; the body is discarded.
#[derive(Debug, Clone)]
pub struct HttpImageLoader {
    http: Client,
}

impl HttpImageLoader {
    pub fn new() -> Self {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { http }
    }
}

impl Default for HttpImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageLoader for HttpImageLoader {
    async fn preload(&self, url: &str) -> bool {
        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(url, error = %err, "remote: image preload failed");
                return false;
            }
        };
        if !response.status().is_success() {
            debug!(url, status = response.status().as_u16(), "remote: image preload rejected");
            return false;
        }
        response.bytes().await.is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    #[default]
    Online,
    Degraded,
}

#[derive(Debug, Default)]
struct DegradedBy {
    retries_pending: usize,
    read_failed: bool,
}

/// Shared "connectivity degraded" badge state. Retried writes and failed
/// reads raise it independently; it clears once neither holds it.
#[derive(Debug, Clone)]
pub struct ConnectivityIndicator {
    tx: Arc<watch::Sender<Connectivity>>,
    sources: Arc<Mutex<DegradedBy>>,
}

impl ConnectivityIndicator {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Connectivity::Online);
        Self {
            tx: Arc::new(tx),
            sources: Arc::new(Mutex::new(DegradedBy::default())),
        }
    }

    pub fn retry_started(&self) {
        self.update(|sources| sources.retries_pending += 1);
    }

    pub fn retry_finished(&self) {
        self.update(|sources| sources.retries_pending = sources.retries_pending.saturating_sub(1));
    }

    pub fn read_failed(&self) {
        self.update(|sources| sources.read_failed = true);
    }

    pub fn read_recovered(&self) {
        self.update(|sources| sources.read_failed = false);
    }

    pub fn current(&self) -> Connectivity {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.tx.subscribe()
    }

    fn update(&self, change: impl FnOnce(&mut DegradedBy)) {
        let mut sources = self
            .sources
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        change(&mut sources);
        let next = if sources.retries_pending > 0 || sources.read_failed {
            Connectivity::Degraded
        } else {
            Connectivity::Online
        };
        self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

impl Default for ConnectivityIndicator {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifies one issued read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadTicket {
    pub id: u64,
    pub mode: FetchMode,
}

struct OutstandingRead {
    ticket: ReadTicket,
    abort: AbortHandle,
}

/// Owns read cancellation and write retries on top of a `QuizApi`.
pub struct RemoteStateClient {
    api: Arc<dyn QuizApi>,
    retry: RetryPolicy,
    indicator: ConnectivityIndicator,
    next_read_id: u64,
    outstanding: Option<OutstandingRead>,
}

impl RemoteStateClient {
    pub fn new(api: Arc<dyn QuizApi>, retry: RetryPolicy) -> Self {
        Self {
            api,
            retry,
            indicator: ConnectivityIndicator::new(),
            next_read_id: 0,
            outstanding: None,
        }
    }

    pub fn indicator(&self) -> &ConnectivityIndicator {
        &self.indicator
    }

    /// The read that has been issued and not yet finished, if any.
    pub fn in_flight(&self) -> Option<ReadTicket> {
        self.outstanding.as_ref().map(|read| read.ticket)
    }

    /// Issues a snapshot read, cancelling any read still outstanding. The
    /// returned future resolves to `SyncError::Cancelled` if it is superseded.
    pub fn begin_read(
        &mut self,
        mode: FetchMode,
    ) -> (
        ReadTicket,
        impl Future<Output = Result<RoundSnapshot, SyncError>> + Send + 'static,
    ) {
        self.cancel_read();
        self.next_read_id += 1;
        let ticket = ReadTicket {
            id: self.next_read_id,
            mode,
        };
        let (abort, registration) = AbortHandle::new_pair();
        self.outstanding = Some(OutstandingRead { ticket, abort });

        let api = Arc::clone(&self.api);
        let read = Abortable::new(async move { api.fetch_snapshot().await }, registration);
        let future = async move {
            match read.await {
                Ok(result) => result,
                Err(aborted) => Err(aborted.into()),
            }
        };
        (ticket, future)
    }

    /// Marks a read as resolved. Returns false for a read that was already
    /// superseded, whose result must be ignored.
    pub fn finish_read(&mut self, id: u64) -> bool {
        match &self.outstanding {
            Some(read) if read.ticket.id == id => {
                self.outstanding = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel_read(&mut self) {
        if let Some(read) = self.outstanding.take() {
            debug!(read_id = read.ticket.id, "remote: cancelling outstanding read");
            read.abort.abort();
        }
    }

    /// Issues a write with bounded retry. A not-ok acknowledgement becomes
    /// `SyncError::ServerRejected` and is never retried.
    pub fn submit(
        &self,
        mutation: Mutation,
    ) -> impl Future<Output = Result<Ack, SyncError>> + Send + 'static {
        let api = Arc::clone(&self.api);
        let retry = self.retry;
        let indicator = self.indicator.clone();
        async move {
            let label = mutation.kind();
            retry_with_backoff(retry, label, &indicator, || {
                let api = Arc::clone(&api);
                let mutation = mutation.clone();
                async move {
                    let ack = api.submit(&mutation).await?;
                    if ack.ok {
                        Ok(ack)
                    } else {
                        Err(SyncError::ServerRejected(
                            ack.error.unwrap_or_else(|| "not ok".to_string()),
                        ))
                    }
                }
            })
            .await
        }
    }

    pub fn rematch_state(
        &self,
    ) -> impl Future<Output = Result<RematchState, SyncError>> + Send + 'static {
        let api = Arc::clone(&self.api);
        async move { api.rematch_state().await }
    }
}

#[cfg(test)]
#[path = "tests/remote_tests.rs"]
mod tests;
