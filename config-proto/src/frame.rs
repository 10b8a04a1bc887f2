//! Frame layout and encoder.
//!
//! ```text
//! SYNC=0xAA | LEN_LO | LEN_HI | TYPE | SEQ | payload[LEN] | CRC16_LO | CRC16_HI
//! ```
//!
//! LEN counts payload bytes only. The CRC-16 (CCITT 0x1021, init 0xFFFF)
//! covers TYPE + SEQ + payload.

use crate::crc::Crc16Digest;

/// Frame start byte.
pub const SYNC: u8 = 0xAA;

/// Largest payload a frame may carry.
pub const MAX_PAYLOAD: usize = 4096;

/// Bytes before the payload (sync, len, type, seq).
pub const HEADER_LEN: usize = 5;

/// Bytes after the payload (crc).
pub const TRAILER_LEN: usize = 2;

/// Frame kind discriminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameType {
    /// Host request; expects a matching `Rsp` with the same SEQ.
    Cmd = 0x01,
    Rsp = 0x02,
    /// Unsolicited (input stream, debug log).
    Evt = 0x03,
    Ack = 0x04,
    Nak = 0x05,
    /// Binary data stream chunk.
    Dat = 0x10,
}

impl FrameType {
    #[must_use]
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(Self::Cmd),
            0x02 => Some(Self::Rsp),
            0x03 => Some(Self::Evt),
            0x04 => Some(Self::Ack),
            0x05 => Some(Self::Nak),
            0x10 => Some(Self::Dat),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Output buffer cannot hold the encoded frame.
    BufferTooSmall,
    PayloadTooLarge,
}

/// Size of the encoded frame for a payload length.
#[inline]
#[must_use]
pub const fn encoded_len(payload_len: usize) -> usize {
    HEADER_LEN + payload_len + TRAILER_LEN
}

/// Encode one frame into `out`, returning the number of bytes written.
pub fn encode(
    frame_type: FrameType,
    seq: u8,
    payload: &[u8],
    out: &mut [u8],
) -> Result<usize, FrameError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge);
    }
    let total = encoded_len(payload.len());
    if out.len() < total {
        return Err(FrameError::BufferTooSmall);
    }

    let len = payload.len() as u16;
    out[0] = SYNC;
    out[1] = (len & 0xFF) as u8;
    out[2] = (len >> 8) as u8;
    out[3] = frame_type as u8;
    out[4] = seq;
    out[HEADER_LEN..HEADER_LEN + payload.len()].copy_from_slice(payload);

    let mut crc = Crc16Digest::new();
    crc.update(frame_type as u8);
    crc.update(seq);
    crc.update_slice(payload);
    let crc = crc.finalize();
    out[HEADER_LEN + payload.len()] = (crc & 0xFF) as u8;
    out[HEADER_LEN + payload.len() + 1] = (crc >> 8) as u8;
    Ok(total)
}
