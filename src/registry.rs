//! Bounded stream registry
//!
//! The registry is the crate's entry point: a fixed-capacity arena of stream
//! slots whose indexes are the externally visible stream ids. The slot table
//! has its own lock, held only for bookkeeping (never across socket or file
//! construction, never across a join await) so operations on different
//! streams do not contend. Each stream's status has its own independent lock.

use parking_lot::Mutex;
use std::net::Ipv4Addr;
use std::path::Path;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{AppConfig, CaptureConfig};
use crate::error::{NetworkError, RegistryError, Result, TraceError};
use crate::stream::status::{shared_status, SharedStatus, StreamState, StreamStatus};
use crate::stream::worker::Worker;

/// One registry capacity unit.
///
/// `Reserved` marks a slot claimed by an in-flight `create` or `close`; the
/// id becomes reusable only once the slot returns to `Empty`, which happens
/// strictly after the previous worker has fully stopped.
enum Slot {
    Empty,
    Reserved,
    Active(ActiveStream),
}

struct ActiveStream {
    status: SharedStatus,
    shutdown: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

/// Top-level manager of concurrently active captures.
pub struct StreamRegistry {
    slots: Mutex<Vec<Slot>>,
    capture: CaptureConfig,
}

impl StreamRegistry {
    /// Build a registry sized and timed by `config`.
    pub fn new(config: &AppConfig) -> Self {
        let capacity = config.registry.max_streams.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot::Empty);
        tracing::info!(capacity, "stream registry initialized");
        Self {
            slots: Mutex::new(slots),
            capture: config.capture.clone(),
        }
    }

    /// Registry with the built-in defaults
    pub fn with_defaults() -> Self {
        Self::new(&AppConfig::default())
    }

    /// Total slot capacity
    pub fn capacity(&self) -> usize {
        self.slots.lock().len()
    }

    /// Number of currently active streams
    pub fn active_count(&self) -> usize {
        self.slots
            .lock()
            .iter()
            .filter(|slot| matches!(slot, Slot::Active(_)))
            .count()
    }

    /// Start capturing one stream; returns its id.
    ///
    /// Validation happens before any slot, socket or file is claimed. On any
    /// construction failure the reserved slot is released again, so a failed
    /// create never leaves a half-initialized stream behind.
    pub async fn create(
        &self,
        ip: Ipv4Addr,
        video_port: u16,
        audio_port: u16,
        path: impl AsRef<Path>,
    ) -> Result<usize> {
        let path = path.as_ref();
        if video_port % 2 != 0 {
            return Err(NetworkError::OddRtpPort(video_port).into());
        }
        if audio_port % 2 != 0 {
            return Err(NetworkError::OddRtpPort(audio_port).into());
        }
        if path.as_os_str().is_empty() {
            return Err(TraceError::InvalidPath("empty output path".to_string()).into());
        }

        let id = {
            let mut slots = self.slots.lock();
            match slots.iter().position(|slot| matches!(slot, Slot::Empty)) {
                Some(id) => {
                    slots[id] = Slot::Reserved;
                    id
                }
                None => {
                    tracing::error!(capacity = slots.len(), "no free stream slot");
                    return Err(RegistryError::CapacityExhausted(slots.len()).into());
                }
            }
        };
        tracing::debug!(id, "stream slot allocated");

        let status = shared_status();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = match Worker::initialize(
            ip,
            video_port,
            audio_port,
            path,
            &self.capture,
            status.clone(),
            shutdown_rx,
        ) {
            Ok(worker) => worker,
            Err(e) => {
                self.slots.lock()[id] = Slot::Empty;
                tracing::error!(id, %ip, error = %e, "stream setup failed");
                return Err(e);
            }
        };

        let handle = tokio::spawn(worker.run());
        self.slots.lock()[id] = Slot::Active(ActiveStream {
            status,
            shutdown: shutdown_tx,
            worker: handle,
        });

        tracing::info!(
            id, %ip, video_port, audio_port, path = %path.display(),
            "stream created"
        );
        Ok(id)
    }

    /// Stop the stream at `id`, reclaim its resources and free the slot.
    ///
    /// The worker gets a grace period to observe the shutdown signal; if it
    /// does not stop in time it is aborted, which still releases its sockets
    /// and files before the slot is handed back.
    pub async fn close(&self, id: usize) -> Result<()> {
        let active = {
            let mut slots = self.slots.lock();
            let slot = match slots.get_mut(id) {
                Some(slot) => slot,
                None => {
                    tracing::error!(id, "close of invalid stream id");
                    return Err(RegistryError::InvalidStreamId(id).into());
                }
            };
            match std::mem::replace(slot, Slot::Reserved) {
                Slot::Active(active) => active,
                previous => {
                    *slot = previous;
                    tracing::error!(id, "close of unused stream id");
                    return Err(RegistryError::InvalidStreamId(id).into());
                }
            }
        };

        let ActiveStream {
            status,
            shutdown,
            mut worker,
        } = active;
        let _ = shutdown.send(true);

        match tokio::time::timeout(self.capture.stop_grace(), &mut worker).await {
            Ok(joined) => {
                if let Err(e) = joined {
                    tracing::warn!(id, error = %e, "stream worker join failed");
                    status.lock().state = StreamState::Ended;
                }
            }
            Err(_) => {
                tracing::warn!(id, "stream worker ignored shutdown, aborting");
                worker.abort();
                // Wait for the abort to land so sockets and files are
                // released before the slot becomes reusable.
                let _ = (&mut worker).await;
                status.lock().state = StreamState::Ended;
            }
        }

        self.slots.lock()[id] = Slot::Empty;
        tracing::info!(id, "stream closed");
        Ok(())
    }

    /// Snapshot copy of the stream's status.
    pub fn status(&self, id: usize) -> Result<StreamStatus> {
        let slots = self.slots.lock();
        match slots.get(id) {
            Some(Slot::Active(active)) => Ok(active.status.lock().clone()),
            _ => {
                tracing::error!(id, "status of invalid stream id");
                Err(RegistryError::InvalidStreamId(id).into())
            }
        }
    }

    /// Current lifecycle state of the stream
    pub fn state(&self, id: usize) -> Result<StreamState> {
        self.status(id).map(|status| status.state)
    }

    /// Total bytes captured by the stream so far
    pub fn bytes_captured(&self, id: usize) -> Result<u64> {
        self.status(id).map(|status| status.bytes_captured)
    }

    /// Last computed window throughput of the stream in kbit/s
    pub fn throughput_kbps(&self, id: usize) -> Result<f64> {
        self.status(id).map(|status| status.throughput_kbps)
    }

    /// Close every occupied slot; used at shutdown.
    pub async fn close_all(&self) {
        let ids: Vec<usize> = {
            let slots = self.slots.lock();
            slots
                .iter()
                .enumerate()
                .filter(|(_, slot)| matches!(slot, Slot::Active(_)))
                .map(|(id, _)| id)
                .collect()
        };
        for id in ids {
            let _ = self.close(id).await;
        }
        tracing::info!("stream registry closed");
    }
}
