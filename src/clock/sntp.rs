//! # SNTP Client
//!
//! Minimal SNTP (RFC 4330) client over a `tokio` UDP socket.
//!
//! A single 48-byte client request (LI=0, VN=3, Mode=3) is sent and the
//! server's transmit timestamp is corrected by half the round-trip time.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::net::{ToSocketAddrs, UdpSocket};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{Result, StationError};

/// Well-known NTP port.
pub const NTP_PORT: u16 = 123;

/// Size of an NTP packet without extensions.
pub const NTP_PACKET_LEN: usize = 48;

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
const NTP_UNIX_EPOCH_DELTA: u64 = 2_208_988_800;

/// Highest stratum accepted from a server.
const MAX_STRATUM: u8 = 15;

/// Server mode in the first header byte.
const MODE_SERVER: u8 = 4;

/// Builds a client request packet.
#[must_use]
pub fn request_packet() -> [u8; NTP_PACKET_LEN] {
    let mut packet = [0u8; NTP_PACKET_LEN];
    packet[0] = 0x1B;
    packet
}

/// Extracts the transmit timestamp from a server response.
///
/// # Errors
///
/// Returns [`StationError::ClockSync`] for short packets, non-server modes,
/// kiss-o'-death / unsynchronized strata and empty timestamps.
pub fn parse_response(packet: &[u8]) -> Result<DateTime<Utc>> {
    if packet.len() < NTP_PACKET_LEN {
        return Err(StationError::ClockSync(format!(
            "short NTP response: {} bytes",
            packet.len()
        )));
    }

    let mode = packet[0] & 0x07;
    if mode != MODE_SERVER {
        return Err(StationError::ClockSync(format!(
            "unexpected NTP mode {}",
            mode
        )));
    }

    let stratum = packet[1];
    if stratum == 0 || stratum > MAX_STRATUM {
        return Err(StationError::ClockSync(format!(
            "invalid stratum {}",
            stratum
        )));
    }

    let secs = u32::from_be_bytes([packet[40], packet[41], packet[42], packet[43]]) as u64;
    let frac = u32::from_be_bytes([packet[44], packet[45], packet[46], packet[47]]) as u64;

    let unix_secs = secs
        .checked_sub(NTP_UNIX_EPOCH_DELTA)
        .ok_or_else(|| StationError::ClockSync("transmit timestamp before 1970".to_string()))?;
    let nanos = ((frac * 1_000_000_000) >> 32) as u32;

    DateTime::from_timestamp(unix_secs as i64, nanos)
        .ok_or_else(|| StationError::ClockSync("transmit timestamp out of range".to_string()))
}

/// Queries `server` once and returns the RTT-corrected server time.
///
/// # Errors
///
/// Returns [`StationError::ClockSync`] on socket errors, timeout or an
/// invalid response.
pub async fn query<A: ToSocketAddrs>(server: A, timeout: Duration) -> Result<DateTime<Utc>> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(|e| StationError::ClockSync(format!("Failed to bind socket: {}", e)))?;
    socket
        .connect(server)
        .await
        .map_err(|e| StationError::ClockSync(format!("Failed to resolve server: {}", e)))?;

    let sent_at = Instant::now();
    socket
        .send(&request_packet())
        .await
        .map_err(|e| StationError::ClockSync(format!("Failed to send request: {}", e)))?;
    debug!("Sent NTP request to {:?}", socket.peer_addr().ok());

    let mut response = [0u8; NTP_PACKET_LEN];
    let len = tokio::time::timeout(timeout, socket.recv(&mut response))
        .await
        .map_err(|_| StationError::ClockSync(format!("no NTP response within {:?}", timeout)))?
        .map_err(|e| StationError::ClockSync(format!("Failed to receive response: {}", e)))?;
    let rtt = sent_at.elapsed();

    let server_time = parse_response(&response[..len])?;
    let half_rtt = chrono::Duration::from_std(rtt / 2).unwrap_or_else(|_| chrono::Duration::zero());
    let corrected = server_time + half_rtt;
    info!("NTP time {} (RTT {:?})", corrected, rtt);
    Ok(corrected)
}
