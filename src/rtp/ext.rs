use std::ops::Range;

use super::header::RtpHeader;

/// URI announcing the transport-wide sequence number header extension.
pub const TWCC_URI: &str =
    "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01";

// If one extension requires the two byte form
// (probably because of its size, but possibly because of ID),
// The form must be the two-byte variety for all of them.
#[repr(u16)]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum ExtensionsForm {
    // See RFC 8285 Section 4.2
    // ID Range: 1..=14
    // Length Range: 1..=16
    OneByte = 0xBEDE,
    // See RFC 8285 Section 4.3
    // ID Range: 1..=255
    // Length Range: 0..=255
    TwoByte = 0x1000,
}

pub const MAX_ID_ONE_BYTE_FORM: u8 = 14;

impl ExtensionsForm {
    pub(crate) fn as_u16(self) -> u16 {
        self as u16
    }

    #[cfg(test)]
    pub(crate) fn serialize(self) -> [u8; 2] {
        // App bits set to 0
        self.as_u16().to_be_bytes()
    }

    pub(crate) fn parse(bytes: [u8; 2]) -> Option<Self> {
        let serialized = u16::from_be_bytes(bytes);
        if serialized == ExtensionsForm::OneByte.as_u16() {
            Some(ExtensionsForm::OneByte)
        // Ignore the app bits
        } else if (serialized & 0xFFF0) == ExtensionsForm::TwoByte.as_u16() {
            Some(ExtensionsForm::TwoByte)
        } else {
            None
        }
    }
}

/// Locate the data of the element `id` inside an extension block.
///
/// The returned range is relative to `buf`.
// https://tools.ietf.org/html/rfc8285
fn find_element(buf: &[u8], form: ExtensionsForm, id: u8) -> Option<Range<usize>> {
    let mut pos = 0;

    loop {
        if pos >= buf.len() {
            return None;
        }

        if buf[pos] == 0 {
            // padding
            pos += 1;
            continue;
        }

        let (elem_id, len) = match form {
            ExtensionsForm::OneByte => {
                let elem_id = buf[pos] >> 4;
                let len = (buf[pos] & 0xf) as usize + 1;
                pos += 1;

                if elem_id == 15 {
                    // ID 15 terminates processing of the whole block.
                    return None;
                }
                (elem_id, len)
            }
            ExtensionsForm::TwoByte => {
                if buf.len() < pos + 2 {
                    trace!("Not enough ext header len: {} < {}", buf.len() - pos, 2);
                    return None;
                }
                let elem_id = buf[pos];
                let len = buf[pos + 1] as usize;
                pos += 2;
                (elem_id, len)
            }
        };

        if buf.len() < pos + len {
            trace!("Not enough type ext len: {} < {}", buf.len() - pos, len);
            return None;
        }

        if elem_id == id {
            return Some(pos..pos + len);
        }

        pos += len;
    }
}

/// Read the transport-wide sequence number carried under `id`.
///
/// [`None`] when the packet has no such element or it is shorter than two bytes.
pub fn read_transport_cc(packet: &[u8], header: &RtpHeader, id: u8) -> Option<u16> {
    let r = element_range(packet, header, id)?;
    if r.len() < 2 {
        return None;
    }
    Some(u16::from_be_bytes([packet[r.start], packet[r.start + 1]]))
}

/// Overwrite the transport-wide sequence number carried under `id`.
///
/// Returns `false`, leaving the packet untouched, when there is no slot for it.
pub fn write_transport_cc(packet: &mut [u8], header: &RtpHeader, id: u8, seq: u16) -> bool {
    let Some(r) = element_range(packet, header, id) else {
        return false;
    };
    if r.len() < 2 {
        return false;
    }
    packet[r.start..r.start + 2].copy_from_slice(&seq.to_be_bytes());
    true
}

fn element_range(packet: &[u8], header: &RtpHeader, id: u8) -> Option<Range<usize>> {
    if id == 0 {
        return None;
    }
    let block = header.ext.as_ref()?;
    if block.form == ExtensionsForm::OneByte && id > MAX_ID_ONE_BYTE_FORM {
        return None;
    }
    let base = block.range.start;
    let elems = packet.get(block.range.clone())?;
    let r = find_element(elems, block.form, id)?;
    Some(base + r.start..base + r.end)
}

/// Find the transport-wide sequence number id among SDP `extmap` attributes.
///
/// Accepts lines such as `a=extmap:3 <uri>` or `extmap:3/sendrecv <uri>`.
///
/// ```
/// # use rtp_twcc::rtp::twcc_ext_id_from_extmap;
/// let sdp = [
///     "a=extmap:1 urn:ietf:params:rtp-hdrext:sdes:mid",
///     "a=extmap:5 http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01",
/// ];
/// assert_eq!(twcc_ext_id_from_extmap(sdp), Some(5));
/// ```
pub fn twcc_ext_id_from_extmap<'a>(lines: impl IntoIterator<Item = &'a str>) -> Option<u8> {
    for line in lines {
        let line = line.trim();
        let line = line.strip_prefix("a=").unwrap_or(line);
        let Some(rest) = line.strip_prefix("extmap:") else {
            continue;
        };

        let mut parts = rest.split_whitespace();
        let (Some(id), Some(uri)) = (parts.next(), parts.next()) else {
            continue;
        };

        if uri != TWCC_URI {
            continue;
        }

        // id can be followed by a direction, 3/sendrecv
        let id = id.split('/').next().unwrap_or(id);
        match id.parse::<u8>() {
            Ok(id) if id > 0 => return Some(id),
            _ => {
                debug!("Bad extmap id for transport-wide cc: {}", id);
            }
        }
    }

    None
}
