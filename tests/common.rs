#![allow(unused)]

use std::sync::Once;
use std::time::{Duration, Instant};

use rtp_twcc::{TwccConfig, TwccManager};

pub const TWCC_EXT_ID: u8 = 5;
pub const MEDIA_SSRC: u32 = 0x3039;

pub fn init_log() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    static START: Once = Once::new();

    START.call_once(|| {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(env_filter)
            .init();
    });
}

/// RTP packet with a one byte header extension carrying the transport-wide
/// sequence number.
pub fn rtp_packet(seq: u16, twcc: u16, marker: bool) -> Vec<u8> {
    let mut buf = vec![0x90, (marker as u8) << 7 | 96];
    buf.extend_from_slice(&seq.to_be_bytes());
    buf.extend_from_slice(&90_000_u32.to_be_bytes());
    buf.extend_from_slice(&MEDIA_SSRC.to_be_bytes());

    // one element, 2 bytes of data, padded to a word
    buf.extend_from_slice(&[0xbe, 0xde, 0x00, 0x01]);
    buf.push(TWCC_EXT_ID << 4 | 1);
    buf.extend_from_slice(&twcc.to_be_bytes());
    buf.push(0);

    buf.extend_from_slice(&[0x11; 40]);
    buf
}

/// RTP packet with an empty slot for the sender to fill in.
pub fn rtp_packet_unstamped(seq: u16, marker: bool) -> Vec<u8> {
    rtp_packet(seq, 0, marker)
}

/// A packet arriving at `at` past the epoch.
#[derive(Debug, Clone, Copy)]
pub struct Arrival {
    pub twcc: u16,
    pub at: Duration,
    pub marker: bool,
}

pub fn arrival(twcc: u16, at: Duration, marker: bool) -> Arrival {
    Arrival { twcc, at, marker }
}

pub fn receiver(epoch: Instant) -> TwccManager {
    TwccConfig::new()
        .set_recv_ext_id(TWCC_EXT_ID)
        .set_sender_ssrc(1)
        .build(epoch)
        .expect("receiver config")
}

pub fn push_all(twcc: &mut TwccManager, epoch: Instant, arrivals: &[Arrival]) {
    for (i, a) in arrivals.iter().enumerate() {
        let buf = rtp_packet(i as u16, a.twcc, a.marker);
        twcc.record_incoming(&buf, epoch + a.at);
    }
}

pub fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

pub fn us(v: u64) -> Duration {
    Duration::from_micros(v)
}
