//! RTP and RTCP plumbing for transport-wide congestion control.

mod ext;
pub use ext::{read_transport_cc, twcc_ext_id_from_extmap, write_transport_cc, TWCC_URI};

mod header;
pub use header::RtpHeader;

mod seq;
pub use seq::{compare15, compare16, compare8, RefTimeUnwrapper};

pub mod rtcp;
pub use rtcp::{PacketStatus, TransportFeedback};

#[cfg(test)]
pub(crate) use ext::ExtensionsForm;
#[cfg(test)]
pub(crate) use header::test::packet_with_ext;
