use crate::event_stream::{Connection, EventStreamClient};
use crate::log_entry::{self, FormattedLogEntry};
use crate::log_store::{OrderedLogStore, StoredEntry};
use crate::types::{LogEvent, Scalar};
use chrono::Local;
use log::debug;
use std::future::Future;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

pub const INITIAL_MESSAGE: &str = "console initialized, scheme - {message} [ID: {participant ID} IP: {participant IP} P: {protocol} R: {round} SID: {session ID}]";

/// Live log console: a store fed by one event stream connection.
///
/// The connection is closed when the view is dropped.
pub struct LogView {
    store: OrderedLogStore,
    connection: Connection,
}

impl LogView {
    /// Creates the store with its initial entry and starts streaming from `url`.
    pub fn mount(client: &EventStreamClient, url: &str) -> Self {
        let store = OrderedLogStore::with_initial(initial_entry());
        let connection = client.connect(url);

        let writer = store.clone();
        connection.on_event(move |event: LogEvent| {
            writer.append(log_entry::format(&event));
        });

        debug!("Log view mounted on {}", url);
        Self { store, connection }
    }

    pub fn snapshot(&self) -> Vec<Arc<StoredEntry>> {
        self.store.snapshot()
    }

    /// Writes entries appended after `last` and returns the newest sequence number seen.
    pub fn render_new<W: Write>(&self, out: &mut W, last: Option<u64>) -> io::Result<Option<u64>> {
        let mut newest = last;
        for stored in self.store.since(last) {
            writeln!(out, "{}", stored.entry)?;
            newest = Some(stored.seq);
        }
        out.flush()?;
        Ok(newest)
    }

    /// Prints new entries every `poll` until `shutdown` resolves.
    pub async fn render_until<W, F>(&self, out: &mut W, poll: Duration, shutdown: F) -> io::Result<()>
    where
        W: Write,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(poll);
        let mut last = None;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    self.render_new(out, last)?;
                    return Ok(());
                }
                _ = ticker.tick() => {
                    last = self.render_new(out, last)?;
                }
            }
        }
    }

    /// Closes the connection and discards the store.
    pub fn unmount(self) {}
}

impl Drop for LogView {
    fn drop(&mut self) {
        self.connection.close();
    }
}

fn initial_entry() -> FormattedLogEntry {
    let now = Local::now().timestamp_millis() as f64 / 1000.0;
    let timestamp = serde_json::Number::from_f64(now).map(Scalar::Number);
    log_entry::format(&LogEvent {
        timestamp,
        message: INITIAL_MESSAGE.to_string(),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_entry_has_no_metadata() {
        let entry = initial_entry();
        assert_eq!(entry.message, INITIAL_MESSAGE);
        assert!(entry.metadata.is_empty());
        assert_ne!(entry.timestamp, log_entry::INVALID_DATE);
    }
}
