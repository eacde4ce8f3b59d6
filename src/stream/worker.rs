//! Per-stream capture worker
//!
//! One worker owns the full lifecycle of a capture: both media sessions, both
//! trace writers, the framer and the status snapshot. Construction happens on
//! the caller's task so failures surface from `create`; the capture loop then
//! runs as its own tokio task until the registry signals shutdown.
//!
//! The loop has a single suspension point: a `select!` over the four sockets'
//! readiness, the throughput-window deadline and the shutdown channel. Reads
//! are non-blocking and bounded to one datagram per wake, so the loop stays
//! responsive to cancellation even under silence or flood.

use std::io::ErrorKind;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::time::{self, Instant};

use crate::config::CaptureConfig;
use crate::constants::MAX_DATAGRAM_SIZE;
use crate::error::{NetworkError, Result};
use crate::network::MediaSession;
use crate::stream::framer::PacketFramer;
use crate::stream::status::{SharedStatus, StreamState};
use crate::trace::format::{trace_path, MediaKind};
use crate::trace::writer::TraceWriter;

/// What woke the capture loop
enum Wake {
    Shutdown,
    Timeout,
    Ready(MediaKind, bool),
}

/// One stream's capture state, driven by [`Worker::run`].
pub(crate) struct Worker {
    video: MediaSession,
    audio: MediaSession,
    video_out: TraceWriter,
    audio_out: TraceWriter,
    framer: PacketFramer,
    status: SharedStatus,
    shutdown: watch::Receiver<bool>,
    period: Duration,
    buf: Vec<u8>,
}

impl Worker {
    /// Construct sessions and outputs for one stream.
    ///
    /// Both RTP ports are validated before any socket or file is touched.
    /// Any later step failing releases everything acquired so far and marks
    /// the status `Failed` before the error propagates.
    pub(crate) fn initialize(
        ip: Ipv4Addr,
        video_port: u16,
        audio_port: u16,
        path: &Path,
        config: &CaptureConfig,
        status: SharedStatus,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        match Self::build(ip, video_port, audio_port, path, config, status.clone(), shutdown) {
            Ok(worker) => Ok(worker),
            Err(e) => {
                status.lock().state = StreamState::Failed;
                Err(e)
            }
        }
    }

    fn build(
        ip: Ipv4Addr,
        video_port: u16,
        audio_port: u16,
        path: &Path,
        config: &CaptureConfig,
        status: SharedStatus,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        if video_port % 2 != 0 {
            return Err(NetworkError::OddRtpPort(video_port).into());
        }
        if audio_port % 2 != 0 {
            return Err(NetworkError::OddRtpPort(audio_port).into());
        }

        let video = MediaSession::connect(ip, video_port)?;
        let audio = MediaSession::connect(ip, audio_port)?;

        let mut video_out = TraceWriter::create(&trace_path(path, MediaKind::Video))?;
        video_out.write_header(ip, video_port)?;
        let mut audio_out = TraceWriter::create(&trace_path(path, MediaKind::Audio))?;
        audio_out.write_header(ip, audio_port)?;

        Ok(Self {
            video,
            audio,
            video_out,
            audio_out,
            framer: PacketFramer::new(config.anchor_backdate()),
            status,
            shutdown,
            period: config.period(),
            buf: vec![0u8; MAX_DATAGRAM_SIZE],
        })
    }

    /// The capture loop. Runs until shutdown is signalled, then marks the
    /// status `Ended` as its final act and releases all stream resources.
    pub(crate) async fn run(mut self) {
        let video_port = self.video.rtp_port();
        let audio_port = self.audio.rtp_port();
        tracing::info!(video_port, audio_port, "stream worker started");

        self.status.lock().state = StreamState::Waiting;

        let mut window_start = Instant::now();
        let mut window_bytes: u64 = 0;
        let mut throughput = 0.0;

        loop {
            let deadline = window_start + self.period;
            let wake = tokio::select! {
                _ = self.shutdown.changed() => Wake::Shutdown,
                _ = time::sleep_until(deadline) => Wake::Timeout,
                _ = self.audio.rtp.readable() => Wake::Ready(MediaKind::Audio, false),
                _ = self.audio.rtcp.readable() => Wake::Ready(MediaKind::Audio, true),
                _ = self.video.rtp.readable() => Wake::Ready(MediaKind::Video, false),
                _ = self.video.rtcp.readable() => Wake::Ready(MediaKind::Video, true),
            };

            let cycle_bytes = match wake {
                Wake::Shutdown => break,
                Wake::Timeout => 0,
                Wake::Ready(kind, is_control) => self.read_ready(kind, is_control),
            };
            window_bytes += cycle_bytes;

            let now = Instant::now();
            if now >= deadline {
                let elapsed = (now - window_start).as_secs_f64();
                throughput = speed_kbps(window_bytes, elapsed);
                tracing::debug!(throughput_kbps = throughput, window_bytes, "window closed");
                window_start = now;
                window_bytes = 0;
            }

            let mut status = self.status.lock();
            status.state = if cycle_bytes == 0 {
                StreamState::Waiting
            } else {
                StreamState::Recording
            };
            status.bytes_captured += cycle_bytes;
            status.throughput_kbps = throughput;
        }

        self.status.lock().state = StreamState::Ended;
        self.video_out.close();
        self.audio_out.close();
        tracing::info!(video_port, audio_port, "stream worker stopped");
    }

    /// Read at most one datagram from the socket reported ready.
    ///
    /// Returns the bytes received this wake. Receive errors count as zero
    /// bytes and never end the loop; the same goes for write failures.
    fn read_ready(&mut self, kind: MediaKind, is_control: bool) -> u64 {
        let socket = match (kind, is_control) {
            (MediaKind::Audio, false) => &self.audio.rtp,
            (MediaKind::Audio, true) => &self.audio.rtcp,
            (MediaKind::Video, false) => &self.video.rtp,
            (MediaKind::Video, true) => &self.video.rtcp,
        };

        let len = match socket.try_recv(&mut self.buf) {
            Ok(len) => len,
            // Spurious readiness; not an error.
            Err(e) if e.kind() == ErrorKind::WouldBlock => return 0,
            Err(e) => {
                tracing::warn!(%kind, is_control, error = %e, "socket receive failed");
                return 0;
            }
        };

        let now = SystemTime::now();
        if let Some(record) = self.framer.frame(now, kind, is_control, &self.buf[..len]) {
            let writer = match kind {
                MediaKind::Audio => &mut self.audio_out,
                MediaKind::Video => &mut self.video_out,
            };
            if let Err(e) = writer.append(&record) {
                tracing::warn!(%kind, error = %e, "trace write failed");
            }
        }

        len as u64
    }
}

/// Window throughput in kbit/s, 1024-based.
fn speed_kbps(bytes: u64, secs: f64) -> f64 {
    if secs <= 0.0 {
        return 0.0;
    }
    (bytes as f64 * 8.0 / 1024.0) / secs
}
