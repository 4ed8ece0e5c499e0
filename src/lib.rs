//! Transport-wide congestion control feedback for RTP, in Rust.
//!
//! This is a [Sans I/O][sansio] implementation of the feedback mechanism described in
//! [draft-holmer-rmcat-transport-wide-cc-extensions-01][draft]. The [`TwccManager`] does no
//! network talking, has no internal threads and no async tasks. Time is passed in on every call.
//!
//! A sender stamps each outgoing RTP packet with a transport-wide sequence number carried in a
//! header extension. The receiver logs arrival times of those packets and periodically sends back
//! an RTCP transport-wide feedback report. The sender decodes the report and learns, per packet,
//! whether it arrived and when, which a bandwidth estimator builds on.
//!
//! # Usage
//!
//! The extension id comes from the negotiated `a=extmap` lines.
//!
//! ```
//! # use rtp_twcc::{rtp, TwccConfig};
//! # use std::time::Instant;
//! let extmap = [
//!     "a=extmap:1 urn:ietf:params:rtp-hdrext:sdes:mid",
//!     "a=extmap:3 http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01",
//! ];
//! let id = rtp::twcc_ext_id_from_extmap(extmap).unwrap_or(0);
//!
//! let mut twcc = TwccConfig::new()
//!     .set_send_ext_id(id)
//!     .set_recv_ext_id(id)
//!     .build(Instant::now())
//!     .unwrap();
//! # assert_eq!(id, 3);
//! # assert!(twcc.poll_feedback().is_none());
//! ```
//!
//! ## Sending side
//!
//! 1. Reserve a two byte extension element with the negotiated id in each outgoing packet.
//! 2. Call [`TwccManager::tag_outgoing`] right before handing the packet to the socket.
//! 3. Optionally report the socket send time with [`TwccManager::set_socket_timestamp`].
//! 4. Pass incoming RTCP transport-wide feedback to [`TwccManager::decode_rtcp`].
//!
//! ## Receiving side
//!
//! 1. Pass every incoming RTP packet to [`TwccManager::record_incoming`].
//! 2. Drain produced reports with [`TwccManager::poll_feedback`] and send them.
//! 3. With a periodic feedback interval, drive time forward using
//!    [`TwccManager::poll_timeout`] and [`TwccManager::handle_timeout`].
//!
//! ```
//! # use rtp_twcc::TwccConfig;
//! # use std::time::{Duration, Instant};
//! let start = Instant::now();
//! let mut twcc = TwccConfig::new()
//!     .set_recv_ext_id(3)
//!     .set_feedback_interval(Some(Duration::from_millis(100)))
//!     .build(start)
//!     .unwrap();
//!
//! // Normally: record_incoming(&packet, now) for every received packet.
//!
//! if let Some(timeout) = twcc.poll_timeout() {
//!     twcc.handle_timeout(timeout);
//! }
//! while let Some(fb) = twcc.poll_feedback() {
//!     let _rtcp: Vec<u8> = fb.to_bytes();
//!     // socket.send(&_rtcp)
//! }
//! ```
//!
//! # Logging
//!
//! The crate logs with [`tracing`]. Flush decisions are on `debug`, individual packets on `trace`,
//! and malformed incoming reports on `warn`.
//!
//! [sansio]: https://sans-io.readthedocs.io
//! [draft]: https://datatracker.ietf.org/doc/html/draft-holmer-rmcat-transport-wide-cc-extensions-01

#![forbid(unsafe_code)]
#![allow(clippy::new_without_default)]
#![allow(clippy::manual_range_contains)]

#[macro_use]
extern crate tracing;

mod config;
pub use config::{TwccConfig, MIN_MTU};

mod error;
pub use error::{FeedbackError, RtcpError, TwccError};

pub mod rtp;
pub use rtp::{PacketStatus, TransportFeedback};

pub mod twcc;
pub use twcc::{DecodedPacket, TwccManager};

mod util;
