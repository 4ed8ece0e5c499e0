//! Transport-wide congestion control feedback.
//!
//! The receiving side logs arrivals of tagged packets and turns them into
//! feedback reports. The sending side remembers what it sent and matches the
//! reports it gets back.

mod decode;
pub use decode::{DecodedPacket, FeedbackDecoder};

mod encode;
pub use encode::FeedbackEncoder;

mod manager;
pub use manager::TwccManager;

mod recv;
pub use recv::{max_packets_per_report, FlushPolicy, ReceivedPacketLog, RecvRecord};

mod send;
pub use send::{SentPacket, SentPacketStore, MAX_RETAINED};
