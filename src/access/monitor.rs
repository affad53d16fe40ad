use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::time::{timeout, Duration, Instant};

use crate::access::decoder::{DecoderStats, FrameDecoder};
use crate::access::history::{EventLog, History, LogReader};
use crate::access::types::{AccessEvent, CurrentStatus};
use crate::serial::{ByteSource, SerialError};

/// How long `MonitorHandle::stop` waits for the loop to wind down
const STOP_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Sleep between polling cycles
    pub poll_interval: Duration,
    /// Largest single read from the byte source
    pub read_chunk: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(crate::access::DEFAULT_POLL_INTERVAL_MS),
            read_chunk: 256,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorMetrics {
    pub polls: u64,
    pub bytes_read: u64,
    pub read_errors: u64,
    pub read_timeouts: u64,
    pub last_error: Option<String>,
    pub events_appended: u64,
    pub decoder: DecoderStats,
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Monitoring task did not stop within {0:?}")]
    StopTimeout(Duration),

    #[error("Monitoring task failed: {0}")]
    TaskFailed(String),
}

/// One monitoring session: the only owner of the byte source and decoder,
/// and the only writer to the event log.
pub struct AccessMonitor<S: ByteSource> {
    source: S,
    decoder: FrameDecoder,
    log: EventLog,
    settings: MonitorSettings,
    metrics: MonitorMetrics,
    metrics_tx: watch::Sender<MonitorMetrics>,
}

impl<S: ByteSource> AccessMonitor<S> {
    pub fn new(source: S, settings: MonitorSettings) -> Self {
        let (metrics_tx, _) = watch::channel(MonitorMetrics::default());
        Self {
            source,
            decoder: FrameDecoder::new(),
            log: EventLog::new(),
            settings,
            metrics: MonitorMetrics::default(),
            metrics_tx,
        }
    }

    pub fn reader(&self) -> LogReader {
        self.log.reader()
    }

    pub fn metrics_receiver(&self) -> watch::Receiver<MonitorMetrics> {
        self.metrics_tx.subscribe()
    }

    pub fn current_status(&self) -> CurrentStatus {
        self.log.current_status()
    }

    pub fn history(&self) -> History {
        self.log.history()
    }

    pub fn metrics(&self) -> &MonitorMetrics {
        &self.metrics
    }

    /// Decode `raw` and append every resulting event to the log
    pub fn push_bytes(&mut self, raw: &[u8]) -> Vec<AccessEvent> {
        let events = self.decoder.push_bytes(raw);
        for event in &events {
            log::info!("{} ({})", event.kind().banner(), event.timestamp().format("%Y-%m-%d %H:%M:%S"));
            self.log.append(event.clone());
        }
        self.metrics.events_appended += events.len() as u64;
        self.metrics.decoder = self.decoder.stats().clone();
        events
    }

    /// One read/decode/append cycle.
    ///
    /// Does nothing when no bytes are waiting. Read faults are logged and
    /// counted; they never end the session. A hard read error also drops any
    /// partial frame, a timeout keeps it.
    pub async fn poll_once(&mut self) -> Vec<AccessEvent> {
        self.metrics.polls += 1;
        let events = match self.read_waiting().await {
            Ok(data) if !data.is_empty() => {
                self.metrics.bytes_read += data.len() as u64;
                self.push_bytes(&data)
            }
            Ok(_) => Vec::new(),
            Err(SerialError::Timeout) => {
                log::warn!("Read timed out with bytes pending");
                self.metrics.read_timeouts += 1;
                self.metrics.last_error = Some(SerialError::Timeout.to_string());
                Vec::new()
            }
            Err(e) => {
                log::warn!("Read error: {}", e);
                self.metrics.read_errors += 1;
                self.metrics.last_error = Some(e.to_string());
                // Whatever was buffered may have been cut off mid-frame
                if !self.decoder.pending().is_empty() {
                    log::debug!("Dropping {} buffered bytes after read error", self.decoder.pending().len());
                }
                self.decoder.reset();
                Vec::new()
            }
        };
        self.metrics_tx.send_replace(self.metrics.clone());
        events
    }

    async fn read_waiting(&mut self) -> Result<Vec<u8>, SerialError> {
        let waiting = self.source.bytes_available().await?;
        if waiting == 0 {
            return Ok(Vec::new());
        }
        let mut buffer = vec![0u8; waiting.min(self.settings.read_chunk.max(1))];
        let n = self.source.read_available(&mut buffer).await?;
        buffer.truncate(n);
        Ok(buffer)
    }

    /// Poll until a stop signal arrives or every stop sender is dropped.
    ///
    /// Consumes the monitor; the byte source is released when this returns.
    /// The returned history is everything logged during the session.
    pub async fn run(mut self, mut stop_rx: mpsc::Receiver<()>) -> History {
        let started = Instant::now();
        log::info!(
            "Starting access monitoring (poll interval {:?})",
            self.settings.poll_interval
        );

        loop {
            self.poll_once().await;

            tokio::select! {
                _ = stop_rx.recv() => {
                    log::info!("Received stop signal for monitoring");
                    break;
                }
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }

        log::info!(
            "Stopped access monitoring after {:?}: {} events, {} read errors, {} read timeouts, {} frames discarded",
            started.elapsed(),
            self.metrics.events_appended,
            self.metrics.read_errors,
            self.metrics.read_timeouts,
            self.metrics.decoder.malformed_frames
                + self.metrics.decoder.unknown_status
                + self.metrics.decoder.overflowed_frames
        );
        self.log.history()
    }
}

impl<S: ByteSource + 'static> AccessMonitor<S> {
    /// Run the session on its own task
    pub fn spawn(self) -> MonitorHandle {
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let reader = self.reader();
        let metrics_rx = self.metrics_receiver();
        let task_handle = tokio::spawn(self.run(stop_rx));

        MonitorHandle {
            stop_tx,
            task_handle,
            reader,
            metrics_rx,
        }
    }
}

/// Control handle for a spawned monitoring session
pub struct MonitorHandle {
    stop_tx: mpsc::Sender<()>,
    task_handle: tokio::task::JoinHandle<History>,
    reader: LogReader,
    metrics_rx: watch::Receiver<MonitorMetrics>,
}

impl MonitorHandle {
    pub fn reader(&self) -> LogReader {
        self.reader.clone()
    }

    pub fn current_status(&self) -> CurrentStatus {
        self.reader.current_status()
    }

    pub fn history(&self) -> History {
        self.reader.history()
    }

    pub fn metrics(&self) -> watch::Receiver<MonitorMetrics> {
        self.metrics_rx.clone()
    }

    /// Signal the loop to stop and wait for it to release the byte source
    pub async fn stop(self) -> Result<History, MonitorError> {
        let _ = self.stop_tx.send(()).await;

        let mut task_handle = self.task_handle;
        match timeout(STOP_GRACE, &mut task_handle).await {
            Ok(Ok(history)) => Ok(history),
            Ok(Err(e)) => Err(MonitorError::TaskFailed(e.to_string())),
            Err(_) => {
                task_handle.abort();
                Err(MonitorError::StopTimeout(STOP_GRACE))
            }
        }
    }
}
