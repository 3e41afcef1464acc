use std::ops::Range;

use crate::error::{CodecError, ParseErrorKind, Result};

/// First byte of every interleaved frame (RFC 2326 §10.12).
pub const INTERLEAVED_MAGIC: u8 = b'$';
/// `$`, channel id, 16-bit length.
pub const INTERLEAVED_HEADER_LEN: usize = 4;
/// RTP fixed header without CSRCs (RFC 3550 §5.1).
pub const RTP_HEADER_LEN: usize = 12;
/// Bytes ahead of the payload in every packet this crate sends.
pub const PACKET_PREFIX_LEN: usize = INTERLEAVED_HEADER_LEN + RTP_HEADER_LEN;
/// Largest payload whose RTP packet still fits the 16-bit interleaved
/// length field.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize - RTP_HEADER_LEN;

const RTP_VERSION: u8 = 2;

/// RTP fixed header (RFC 3550 §5.1).
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           Timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                             SSRC                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Written headers always use version 2 with padding, extension and CSRC
/// count of 0. Parsing accepts all three on received packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    /// RTP payload type (7-bit, RFC 3551).
    pub payload_type: u8,
    /// Set on the last packet of a frame.
    pub marker: bool,
    pub sequence: u16,
    /// Media clock ticks as written on the wire.
    pub timestamp: u32,
    /// Synchronization source identifier (RFC 3550 §8.1).
    pub ssrc: u32,
}

impl RtpHeader {
    /// Serialize the 12-byte fixed header.
    pub fn write(&self) -> [u8; RTP_HEADER_LEN] {
        let first_byte: u8 = RTP_VERSION << 6;
        let second_byte: u8 = ((self.marker as u8) << 7) | (self.payload_type & 0x7f);

        let mut header = [0u8; RTP_HEADER_LEN];
        header[0] = first_byte;
        header[1] = second_byte;
        header[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        header[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        header[8..12].copy_from_slice(&self.ssrc.to_be_bytes());
        header
    }

    /// Parse a header and locate the payload within `data`.
    ///
    /// The returned range skips the CSRC list and header extension and
    /// excludes trailing padding.
    pub fn parse(data: &[u8]) -> Result<(Self, Range<usize>)> {
        let short = || CodecError::Parse {
            kind: ParseErrorKind::ShortPacket,
        };
        if data.len() < RTP_HEADER_LEN {
            return Err(short());
        }
        if data[0] >> 6 != RTP_VERSION {
            return Err(CodecError::Parse {
                kind: ParseErrorKind::BadVersion,
            });
        }
        let padding = data[0] & 0x20 != 0;
        let extension = data[0] & 0x10 != 0;
        let csrc_count = (data[0] & 0x0f) as usize;

        let mut start = RTP_HEADER_LEN + 4 * csrc_count;
        if extension {
            if data.len() < start + 4 {
                return Err(short());
            }
            let words = u16::from_be_bytes([data[start + 2], data[start + 3]]) as usize;
            start += 4 + 4 * words;
        }

        let mut end = data.len();
        if padding {
            let pad = data[end - 1] as usize;
            if pad == 0 || pad > end {
                return Err(short());
            }
            end -= pad;
        }
        if start > end {
            return Err(short());
        }

        let header = Self {
            payload_type: data[1] & 0x7f,
            marker: data[1] & 0x80 != 0,
            sequence: u16::from_be_bytes([data[2], data[3]]),
            timestamp: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            ssrc: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
        };
        Ok((header, start..end))
    }
}

/// One RTP packet together with the buffer that carries it.
///
/// Packets built by the packetizer use the interleaved wire layout:
///
/// ```text
/// [0]      '$'
/// [1]      interleaved channel
/// [2..4)   length of RTP header + payload (big-endian)
/// [4..16)  RTP fixed header
/// [16..)   payload
/// ```
///
/// Received packets may come with or without the interleaved prefix.
#[derive(Debug, Clone)]
pub struct RtpPacket {
    buffer: Vec<u8>,
    rtp_start: usize,
    payload: Range<usize>,
    pub interleaved: u8,
    pub payload_type: u8,
    pub mark: bool,
    pub sequence: u16,
    /// Media time in milliseconds.
    pub timestamp: u32,
    pub ssrc: u32,
    /// Set by the packetizer from the carried NAL type.
    pub key_frame: bool,
}

impl RtpPacket {
    /// Build an interleaved packet in `buffer` whose payload is the
    /// concatenation of `parts`.
    ///
    /// `timestamp_ms` is kept on the packet; the wire carries
    /// `header.timestamp`. The payload must not exceed [`MAX_PAYLOAD_LEN`];
    /// [`CodecConfig::validate`](crate::CodecConfig::validate) bounds what
    /// the packetizer sends accordingly.
    pub fn encode(
        mut buffer: Vec<u8>,
        interleaved: u8,
        header: &RtpHeader,
        timestamp_ms: u32,
        parts: &[&[u8]],
    ) -> Self {
        let payload_len: usize = parts.iter().map(|p| p.len()).sum();
        debug_assert!(
            payload_len <= MAX_PAYLOAD_LEN,
            "payload of {payload_len} bytes overflows the interleaved length field"
        );
        let rtp_len = (RTP_HEADER_LEN + payload_len) as u16;

        buffer.clear();
        buffer.reserve(PACKET_PREFIX_LEN + payload_len);
        buffer.push(INTERLEAVED_MAGIC);
        buffer.push(interleaved);
        buffer.extend_from_slice(&rtp_len.to_be_bytes());
        buffer.extend_from_slice(&header.write());
        for part in parts {
            buffer.extend_from_slice(part);
        }

        let end = buffer.len();
        Self {
            buffer,
            rtp_start: INTERLEAVED_HEADER_LEN,
            payload: PACKET_PREFIX_LEN..end,
            interleaved,
            payload_type: header.payload_type,
            mark: header.marker,
            sequence: header.sequence,
            timestamp: timestamp_ms,
            ssrc: header.ssrc,
            key_frame: false,
        }
    }

    /// Parse a complete interleaved frame (`$` prefix included).
    ///
    /// `ticks_per_ms` converts the wire timestamp back to milliseconds.
    pub fn parse_interleaved(buffer: Vec<u8>, ticks_per_ms: u32) -> Result<Self> {
        if buffer.len() < INTERLEAVED_HEADER_LEN {
            return Err(CodecError::Parse {
                kind: ParseErrorKind::ShortPacket,
            });
        }
        if buffer[0] != INTERLEAVED_MAGIC {
            return Err(CodecError::Parse {
                kind: ParseErrorKind::BadMagic,
            });
        }
        let declared = u16::from_be_bytes([buffer[2], buffer[3]]) as usize;
        if declared != buffer.len() - INTERLEAVED_HEADER_LEN {
            return Err(CodecError::Parse {
                kind: ParseErrorKind::LengthMismatch,
            });
        }
        let interleaved = buffer[1];
        Self::from_parts(buffer, INTERLEAVED_HEADER_LEN, interleaved, ticks_per_ms)
    }

    /// Parse a bare RTP packet, as received over UDP.
    pub fn parse_rtp(buffer: Vec<u8>, ticks_per_ms: u32) -> Result<Self> {
        Self::from_parts(buffer, 0, 0, ticks_per_ms)
    }

    fn from_parts(
        buffer: Vec<u8>,
        rtp_start: usize,
        interleaved: u8,
        ticks_per_ms: u32,
    ) -> Result<Self> {
        let (header, range) = RtpHeader::parse(&buffer[rtp_start..])?;
        Ok(Self {
            payload: range.start + rtp_start..range.end + rtp_start,
            rtp_start,
            buffer,
            interleaved,
            payload_type: header.payload_type,
            mark: header.marker,
            sequence: header.sequence,
            timestamp: header.timestamp / ticks_per_ms.max(1),
            ssrc: header.ssrc,
            key_frame: false,
        })
    }

    /// Bytes after the RTP header.
    pub fn payload(&self) -> &[u8] {
        &self.buffer[self.payload.clone()]
    }

    /// Offset of the payload within [`as_bytes`](Self::as_bytes).
    pub fn payload_offset(&self) -> usize {
        self.payload.start
    }

    /// The whole buffer, interleaved prefix included when present.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// The RTP portion, without any interleaved prefix.
    pub fn rtp_bytes(&self) -> &[u8] {
        &self.buffer[self.rtp_start..]
    }

    /// Whether the buffer starts with the 4-byte interleaved prefix.
    pub fn is_interleaved(&self) -> bool {
        self.rtp_start == INTERLEAVED_HEADER_LEN
    }

    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }
}
