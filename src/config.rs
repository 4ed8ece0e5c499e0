use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::TwccError;
use crate::twcc::{TwccManager, MAX_RETAINED};

/// Smallest MTU that leaves room for the RTCP header, the FCI header and a few statuses.
pub const MIN_MTU: usize = 48;

/// Configuration of a [`TwccManager`].
///
/// ```
/// # use rtp_twcc::TwccConfig;
/// # use std::time::{Duration, Instant};
/// let twcc = TwccConfig::new()
///     .set_send_ext_id(3)
///     .set_recv_ext_id(3)
///     .set_feedback_interval(Some(Duration::from_millis(50)))
///     .build(Instant::now())
///     .unwrap();
/// ```
///
/// Configs implement [`Clone`] to help create multiple managers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwccConfig {
    send_ext_id: u8,
    recv_ext_id: u8,
    mtu: usize,
    feedback_interval: Option<Duration>,
    sender_ssrc: u32,
    lost_min_received: usize,
    lost_min_no_marker: usize,
    lost_threshold: usize,
    max_retained: usize,
}

impl TwccConfig {
    /// Creates a new default config.
    pub fn new() -> Self {
        TwccConfig::default()
    }

    /// Header extension id written on outgoing packets. 0 disables tagging.
    pub fn send_ext_id(&self) -> u8 {
        self.send_ext_id
    }

    pub fn set_send_ext_id(mut self, id: u8) -> Self {
        self.send_ext_id = id;
        self
    }

    /// Header extension id read from incoming packets. 0 disables feedback.
    pub fn recv_ext_id(&self) -> u8 {
        self.recv_ext_id
    }

    pub fn set_recv_ext_id(mut self, id: u8) -> Self {
        self.recv_ext_id = id;
        self
    }

    /// Path MTU bounding the size of one feedback report.
    ///
    /// Defaults to 1400.
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    pub fn set_mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    /// Interval for periodic feedback.
    ///
    /// With [`None`], reports are sent when a packet with the marker bit
    /// arrives, or when many packets are missing without seeing one.
    pub fn feedback_interval(&self) -> Option<Duration> {
        self.feedback_interval
    }

    pub fn set_feedback_interval(mut self, interval: Option<Duration>) -> Self {
        self.feedback_interval = interval;
        self
    }

    /// SSRC put in the sender field of produced feedback packets.
    pub fn sender_ssrc(&self) -> u32 {
        self.sender_ssrc
    }

    pub fn set_sender_ssrc(mut self, ssrc: u32) -> Self {
        self.sender_ssrc = ssrc;
        self
    }

    /// Tune the loss heuristic of the marker mode.
    ///
    /// A report is sent once `threshold` packets are missing and either
    /// `min_received` packets arrived or `min_no_marker` packets arrived
    /// without a marker. Defaults to 30, 10 and 60.
    pub fn set_loss_heuristic(
        mut self,
        min_received: usize,
        min_no_marker: usize,
        threshold: usize,
    ) -> Self {
        self.lost_min_received = min_received;
        self.lost_min_no_marker = min_no_marker;
        self.lost_threshold = threshold;
        self
    }

    /// How many sent packets are remembered while waiting for feedback.
    ///
    /// Defaults to 8192. At most 32768.
    pub fn max_retained(&self) -> usize {
        self.max_retained
    }

    pub fn set_max_retained(mut self, max: usize) -> Self {
        self.max_retained = max;
        self
    }

    pub(crate) fn loss_heuristic(&self) -> (usize, usize, usize) {
        (
            self.lost_min_received,
            self.lost_min_no_marker,
            self.lost_threshold,
        )
    }

    /// Check the values are usable.
    pub fn validate(&self) -> Result<(), TwccError> {
        if self.mtu < MIN_MTU {
            return Err(TwccError::InvalidConfig(format!(
                "mtu {} below {}",
                self.mtu, MIN_MTU
            )));
        }
        if self.max_retained == 0 || self.max_retained > MAX_RETAINED {
            return Err(TwccError::InvalidConfig(format!(
                "max_retained {} not in 1..={}",
                self.max_retained, MAX_RETAINED
            )));
        }
        if self.feedback_interval == Some(Duration::ZERO) {
            return Err(TwccError::InvalidConfig("zero feedback interval".into()));
        }
        Ok(())
    }

    /// Create a manager. `epoch` anchors the local arrival times.
    pub fn build(self, epoch: Instant) -> Result<TwccManager, TwccError> {
        self.validate()?;
        Ok(TwccManager::new(self, epoch))
    }
}

impl Default for TwccConfig {
    fn default() -> Self {
        TwccConfig {
            send_ext_id: 0,
            recv_ext_id: 0,
            mtu: 1400,
            feedback_interval: None,
            sender_ssrc: 0,
            lost_min_received: 30,
            lost_min_no_marker: 10,
            lost_threshold: 60,
            max_retained: 8192,
        }
    }
}
