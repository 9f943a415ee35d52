//! Logging infrastructure: a bounded ring buffer of recent lines for
//! `GET /api/status`, an append-only file writer via
//! `tracing-appender`, and a broadcast channel republishing each
//! formatted line for any future subscriber (the log-streaming UI
//! itself is out of scope, but the channel it would read from is
//! ambient infrastructure).

use std::collections::VecDeque;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::fmt::MakeWriter;

/// How many recent log lines `GET /api/status` can return.
const RING_BUFFER_CAPACITY: usize = 500;

/// A `tracing_subscriber` writer that appends to a bounded in-memory
/// ring buffer and republishes each line on a broadcast channel.
/// Slow/absent subscribers never block logging: `broadcast::Sender`
/// drops the oldest unreceived message instead of back-pressuring the
/// writer.
#[derive(Clone)]
pub struct RingBufferWriter {
    buffer: std::sync::Arc<Mutex<VecDeque<String>>>,
    tx: tokio::sync::broadcast::Sender<String>,
}

impl RingBufferWriter {
    pub fn new() -> Self {
        let (tx, _rx) = tokio::sync::broadcast::channel(RING_BUFFER_CAPACITY);
        Self {
            buffer: std::sync::Arc::new(Mutex::new(VecDeque::with_capacity(RING_BUFFER_CAPACITY))),
            tx,
        }
    }

    /// A snapshot of the most recent lines, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.buffer.lock().unwrap().iter().cloned().collect()
    }

    /// Subscribes to newly written lines going forward. Returned
    /// receiver lags (and drops old messages) if the subscriber falls
    /// behind; it never blocks the writer.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    fn push_line(&self, line: String) {
        let mut buffer = self.buffer.lock().unwrap();
        if buffer.len() == RING_BUFFER_CAPACITY {
            buffer.pop_front();
        }
        buffer.push_back(line.clone());
        drop(buffer);
        let _ = self.tx.send(line);
    }
}

impl Default for RingBufferWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::io::Write for RingBufferWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let line = String::from_utf8_lossy(buf).trim_end().to_string();
        if !line.is_empty() {
            self.push_line(line);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for RingBufferWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Initializes the global `tracing` subscriber: an env-filter-driven
/// formatter writing to stdout, an append-only file under
/// `<logs_dir>/app.log`, and the in-memory ring buffer used by the
/// status endpoint. Returns the ring buffer handle and the file
/// appender's guard (must be kept alive for the process lifetime).
pub fn init(logs_dir: &std::path::Path) -> (RingBufferWriter, tracing_appender::non_blocking::WorkerGuard) {
    let ring = RingBufferWriter::new();

    std::fs::create_dir_all(logs_dir).ok();
    let file_appender = tracing_appender::rolling::never(logs_dir, "app.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(ring.clone().and(non_blocking))
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("global tracing subscriber already set");
    }

    (ring, guard)
}
