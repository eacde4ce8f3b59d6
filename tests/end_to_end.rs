//! End-to-end capture test over real loopback sockets
//!
//! Drives the full pipeline: registry create, a datagram sent into the video
//! RTP port, status flipping to recording, close, and a byte-level check of
//! the trace files left on disk.

use std::net::Ipv4Addr;
use std::time::Duration;

use rtp_recorder::config::AppConfig;
use rtp_recorder::trace::format::{FileHeader, TraceRecord};
use rtp_recorder::{StreamRegistry, StreamState};

/// Find an even port whose odd sibling is also free.
fn free_even_port() -> u16 {
    for _ in 0..32 {
        let probe = std::net::UdpSocket::bind(("127.0.0.1", 0)).unwrap();
        let port = probe.local_addr().unwrap().port() & !1;
        drop(probe);
        if port == 0 {
            continue;
        }
        let rtp = std::net::UdpSocket::bind(("0.0.0.0", port));
        let rtcp = std::net::UdpSocket::bind(("0.0.0.0", port + 1));
        if rtp.is_ok() && rtcp.is_ok() {
            return port;
        }
    }
    panic!("no free even/odd port pair found");
}

/// Minimal well-formed RTP v2 packet: 12-byte header plus payload.
fn rtp_packet(payload: usize) -> Vec<u8> {
    let mut packet = vec![0u8; 12 + payload];
    packet[0] = 0x80;
    packet[1] = 96;
    packet
}

/// Split a trace file into its signature line, file header and record bytes.
fn parse_trace(bytes: &[u8]) -> (String, Vec<u8>, Vec<u8>) {
    let signature_end = bytes.iter().position(|&b| b == b'\n').unwrap() + 1;
    let signature = String::from_utf8(bytes[..signature_end].to_vec()).unwrap();
    let header = bytes[signature_end..signature_end + FileHeader::LEN].to_vec();
    let records = bytes[signature_end + FileHeader::LEN..].to_vec();
    (signature, header, records)
}

#[tokio::test]
async fn captured_datagrams_land_in_the_video_trace() {
    let mut config = AppConfig::default();
    config.capture.period_secs = 1;
    let registry = StreamRegistry::new(&config);

    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("cap");
    let video_port = free_even_port();
    let audio_port = loop {
        let port = free_even_port();
        if port != video_port {
            break port;
        }
    };

    let id = registry
        .create(Ipv4Addr::LOCALHOST, video_port, audio_port, &base)
        .await
        .unwrap();

    // Both trace files exist as soon as create returns.
    let video_path = dir.path().join("cap.video.rtp");
    let audio_path = dir.path().join("cap.audio.rtp");
    assert!(video_path.exists());
    assert!(audio_path.exists());

    let state = registry.state(id).unwrap();
    assert!(state == StreamState::Initializing || state == StreamState::Waiting);

    // One data packet, then one control packet on the video session.
    let sender = std::net::UdpSocket::bind(("127.0.0.1", 0)).unwrap();
    let data = rtp_packet(100);
    sender.send_to(&data, ("127.0.0.1", video_port)).unwrap();

    let mut recorded = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let status = registry.status(id).unwrap();
        if status.state == StreamState::Recording || status.bytes_captured > 0 {
            recorded = true;
            break;
        }
    }
    assert!(recorded, "datagram was never observed by the worker");
    assert_eq!(registry.bytes_captured(id).unwrap(), data.len() as u64);

    let rtcp = vec![0x81u8; 32];
    sender.send_to(&rtcp, ("127.0.0.1", video_port + 1)).unwrap();
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if registry.bytes_captured(id).unwrap() > data.len() as u64 {
            break;
        }
    }
    assert_eq!(
        registry.bytes_captured(id).unwrap(),
        (data.len() + rtcp.len()) as u64
    );

    registry.close(id).await.unwrap();
    assert!(registry.status(id).is_err());

    // Video trace: signature, header, one data record, one control record.
    let (signature, header, records) = parse_trace(&std::fs::read(&video_path).unwrap());
    assert_eq!(
        signature,
        format!("#!rtpplay2.0 127.0.0.1/{}\n", video_port)
    );
    assert_eq!(&header[12..14], &video_port.to_be_bytes());

    assert_eq!(records[0], b'V');
    let length = u16::from_be_bytes([records[1], records[2]]) as usize;
    let payload_len = u16::from_be_bytes([records[3], records[4]]) as usize;
    let offset_ms = u32::from_be_bytes([records[5], records[6], records[7], records[8]]);
    assert_eq!(length, data.len() + TraceRecord::HEADER_LEN);
    assert_eq!(payload_len, data.len());
    // The anchor is back-dated 3 seconds, so the first packet lands near 3000.
    assert!((2900..10_000).contains(&offset_ms), "offset {offset_ms}");
    assert_eq!(&records[9..9 + data.len()], &data[..]);

    let control_start = 9 + data.len();
    assert_eq!(records[control_start], b'V');
    let control_plen = u16::from_be_bytes([
        records[control_start + 3],
        records[control_start + 4],
    ]);
    assert_eq!(control_plen, 0);
    assert_eq!(records.len(), control_start + 9 + rtcp.len());

    // Audio trace: header only, nothing was sent there.
    let (audio_signature, audio_header, audio_records) =
        parse_trace(&std::fs::read(&audio_path).unwrap());
    assert_eq!(
        audio_signature,
        format!("#!rtpplay2.0 127.0.0.1/{}\n", audio_port)
    );
    assert_eq!(&audio_header[12..14], &audio_port.to_be_bytes());
    assert!(audio_records.is_empty());
}

#[tokio::test]
async fn malformed_versions_count_bytes_but_write_nothing() {
    let mut config = AppConfig::default();
    config.capture.period_secs = 1;
    let registry = StreamRegistry::new(&config);

    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("cap");
    let video_port = free_even_port();
    let audio_port = loop {
        let port = free_even_port();
        if port != video_port {
            break port;
        }
    };

    let id = registry
        .create(Ipv4Addr::LOCALHOST, video_port, audio_port, &base)
        .await
        .unwrap();

    // Version 1 is neither legacy nor current RTP; it must be dropped.
    let sender = std::net::UdpSocket::bind(("127.0.0.1", 0)).unwrap();
    let mut bogus = rtp_packet(50);
    bogus[0] = 0x40;
    sender.send_to(&bogus, ("127.0.0.1", video_port)).unwrap();

    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if registry.bytes_captured(id).unwrap() > 0 {
            break;
        }
    }
    // Received bytes are accounted even when the framer drops the packet.
    assert_eq!(registry.bytes_captured(id).unwrap(), bogus.len() as u64);

    registry.close_all().await;

    let (_, _, records) = parse_trace(&std::fs::read(dir.path().join("cap.video.rtp")).unwrap());
    assert!(records.is_empty(), "dropped datagram must not be written");
}
