//! RTP Recorder Application
//!
//! Captures one RTP/RTCP stream pair (video + audio) from the network and
//! stores it as replayable trace files until interrupted.

use anyhow::{bail, Context, Result};
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rtp_recorder::config::AppConfig;
use rtp_recorder::StreamRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load or create config
    let config = AppConfig::load_default()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log.level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting RTP Recorder");

    let mut args = std::env::args().skip(1);
    let (ip, video_port, audio_port, output) = match (args.next(), args.next(), args.next(), args.next()) {
        (Some(ip), Some(video), Some(audio), Some(output)) => (ip, video, audio, output),
        _ => {
            eprintln!("Usage: recorder <ip> <video_rtp_port> <audio_rtp_port> <output_path>");
            eprintln!("  <ip>              multicast group or unicast receive address");
            eprintln!("  <video_rtp_port>  even RTP port for video (RTCP uses port+1)");
            eprintln!("  <audio_rtp_port>  even RTP port for audio (RTCP uses port+1)");
            eprintln!("  <output_path>     base path; writes <path>.video.rtp and <path>.audio.rtp");
            bail!("missing arguments");
        }
    };

    let ip: Ipv4Addr = ip.parse().context("invalid IPv4 address")?;
    let video_port: u16 = video_port.parse().context("invalid video port")?;
    let audio_port: u16 = audio_port.parse().context("invalid audio port")?;

    let registry = StreamRegistry::new(&config);
    let id = registry.create(ip, video_port, audio_port, &output).await?;

    tracing::info!(id, %ip, video_port, audio_port, output = %output, "capture running - press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_secs(2)) => {
                if let Ok(status) = registry.status(id) {
                    tracing::info!(
                        state = %status.state,
                        bytes_captured = status.bytes_captured,
                        throughput_kbps = status.throughput_kbps,
                        "capture status"
                    );
                }
            }
        }
    }

    tracing::info!("shutting down");
    registry.close_all().await;
    Ok(())
}
