use crate::error::{ConsoleError, Result};
use crate::sse::{SseDecoder, SseEvent};
use crate::types::LogEvent;
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const BACKOFF_MULTIPLIER: u32 = 2;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type Handler = Box<dyn Fn(LogEvent) + Send + Sync>;

/// Opens server-sent-event connections that deliver [`LogEvent`]s.
///
/// Connecting twice to the same URL while the first connection is still
/// open hands back the existing connection.
pub struct EventStreamClient {
    http: reqwest::Client,
    connections: Mutex<HashMap<String, Weak<Shared>>>,
}

impl EventStreamClient {
    pub fn new() -> Result<Self> {
        // No overall timeout: the response body never ends.
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self::with_client(http))
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Starts streaming from `url`. Must be called inside a Tokio runtime.
    ///
    /// Transport failures are not reported here; the connection keeps
    /// reconnecting in the background until it is closed or dropped.
    pub fn connect(&self, url: &str) -> Connection {
        let mut connections = lock(&self.connections);
        connections.retain(|_, weak| weak.strong_count() > 0);

        if let Some(shared) = connections.get(url).and_then(Weak::upgrade) {
            if !shared.closed.load(Ordering::SeqCst) {
                debug!("Reusing event stream connection to {}", url);
                return Connection { shared };
            }
        }

        let shared = Arc::new(Shared {
            url: url.to_string(),
            handler: Mutex::new(None),
            task: Mutex::new(None),
            closed: AtomicBool::new(false),
        });
        let task = tokio::spawn(run(
            self.http.clone(),
            url.to_string(),
            Arc::downgrade(&shared),
        ));
        *lock(&shared.task) = Some(task);

        connections.insert(url.to_string(), Arc::downgrade(&shared));
        info!("Opened event stream to {}", url);
        Connection { shared }
    }
}

/// Handle to one live event stream.
///
/// Clones share the stream. It is torn down by [`Connection::close`] or when
/// the last handle is dropped.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Installs the handler for incoming events, replacing any previous one.
    ///
    /// Events arriving while no handler is installed are discarded. The
    /// handler must not call back into this connection.
    pub fn on_event<F>(&self, handler: F)
    where
        F: Fn(LogEvent) + Send + Sync + 'static,
    {
        // checked under the handler lock so a racing close() cannot leave a handler behind
        let mut slot = lock(&self.shared.handler);
        if self.is_closed() {
            warn!("Ignoring handler registration on closed stream {}", self.shared.url);
            return;
        }
        *slot = Some(Box::new(handler));
    }

    /// Stops the transport and drops the handler. No handler call starts
    /// after this returns.
    pub fn close(&self) {
        self.shared.shutdown();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }
}

struct Shared {
    url: String,
    handler: Mutex<Option<Handler>>,
    task: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Shared {
    fn dispatch(&self, event: LogEvent) {
        // Held for the whole call so close() waits for an in-flight delivery.
        let handler = lock(&self.handler);
        match handler.as_ref() {
            Some(handler) => handler(event),
            None => debug!("No handler registered, dropping event"),
        }
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        lock(&self.handler).take();
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
        info!("Closed event stream to {}", self.url);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run(http: reqwest::Client, url: String, shared: Weak<Shared>) {
    let mut backoff = INITIAL_BACKOFF;
    let mut last_event_id: Option<String> = None;

    loop {
        let mut decoder = SseDecoder::new();
        let mut connected = false;

        let result = stream_once(
            &http,
            &url,
            &shared,
            &mut decoder,
            last_event_id.as_deref(),
            &mut connected,
        )
        .await;
        match &result {
            Ok(()) => info!("Event stream {} closed by server", url),
            Err(e) => error!("Event stream error: {}", e),
        }

        if connected {
            // A session was established, so start over from the initial delay
            backoff = decoder.retry().unwrap_or(INITIAL_BACKOFF);
            warn!("Reconnecting in {:?}", backoff);
            sleep(backoff).await;
        } else {
            if let Some(retry) = decoder.retry() {
                backoff = retry;
            }
            warn!("Reconnecting in {:?}", backoff);
            sleep(backoff).await;

            // Exponential backoff
            backoff = std::cmp::min(backoff * BACKOFF_MULTIPLIER, MAX_BACKOFF);
        }

        if let Some(id) = decoder.last_event_id() {
            last_event_id = Some(id.to_string());
        }
        if shared.strong_count() == 0 {
            return;
        }
    }
}

async fn stream_once(
    http: &reqwest::Client,
    url: &str,
    shared: &Weak<Shared>,
    decoder: &mut SseDecoder,
    last_event_id: Option<&str>,
    connected: &mut bool,
) -> Result<()> {
    let mut request = http
        .get(url)
        .header(reqwest::header::ACCEPT, "text/event-stream");
    if let Some(id) = last_event_id {
        request = request.header("Last-Event-ID", id);
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(ConsoleError::StreamError(format!(
            "server returned {}",
            response.status()
        )));
    }
    *connected = true;
    debug!("Event stream {} connected", url);

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for frame in decoder.feed(&chunk) {
            let Some(shared) = shared.upgrade() else {
                return Ok(());
            };
            deliver(&shared, frame);
        }
    }

    Ok(())
}

fn deliver(shared: &Shared, frame: SseEvent) {
    if frame.event != "message" {
        debug!("Ignoring '{}' event", frame.event);
        return;
    }
    match serde_json::from_str::<LogEvent>(&frame.data) {
        Ok(event) => shared.dispatch(event),
        Err(e) => warn!("Skipping malformed log event: {}", e),
    }
}
