//! Errors of the transport-wide feedback subsystem.

use thiserror::Error;

/// Errors from parsing the FCI of a transport-wide feedback report.
///
/// These never escape [`TwccManager`][crate::TwccManager]: a malformed report
/// is logged and yields no decoded packets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedbackError {
    /// The FCI is shorter than the header plus one chunk.
    #[error("Feedback too short: {len} bytes")]
    TooShort { len: usize },

    /// Receive deltas run past the end of the input.
    #[error("Receive deltas overrun the feedback: need {needed}, remaining {remaining}")]
    DeltaOverrun { needed: usize, remaining: usize },
}

/// Errors from RTCP framing around the feedback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RtcpError {
    #[error("RTCP packet too short: {0} bytes")]
    TooShort(usize),

    #[error("RTCP version is not 2")]
    BadVersion,

    #[error("Not a transport-wide feedback packet, pt: {pt} fmt: {fmt}")]
    NotTransportFeedback { pt: u8, fmt: u8 },

    #[error("RTCP length field does not match the buffer")]
    BadLength,
}

/// Errors surfaced by the public API.
#[derive(Debug, Error)]
pub enum TwccError {
    #[error("{0}")]
    Feedback(#[from] FeedbackError),

    #[error("{0}")]
    Rtcp(#[from] RtcpError),

    /// A configuration value is out of range.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}
