//! Error types for the H.265 RTP codec library.

use std::fmt;

/// Errors that can occur while converting between RTP packets and frames.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Headers**: [`MalformedHeader`](Self::MalformedHeader),
///   [`Truncated`](Self::Truncated),
///   [`UnsupportedNalType`](Self::UnsupportedNalType).
/// - **Reassembly**: [`SequenceGap`](Self::SequenceGap),
///   [`OrphanFragment`](Self::OrphanFragment).
/// - **Framing**: [`Parse`](Self::Parse) for malformed interleaved/RTP bytes.
/// - **Transport**: [`Io`](Self::Io).
/// - **Setup**: [`InvalidConfig`](Self::InvalidConfig).
///
/// The depacketizer and packetizer never surface the header and reassembly
/// variants to their callers; they log them and drop the unit.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A NAL or FU header byte violates its fixed-bit constraints.
    #[error("malformed header byte {byte:#04x}: {kind}")]
    MalformedHeader { kind: HeaderErrorKind, byte: u8 },

    /// Payload is shorter than the headers it must carry.
    #[error("payload truncated: need {needed} bytes, got {len}")]
    Truncated { needed: usize, len: usize },

    /// Aggregation packets, FU-B and undefined types are not reassembled.
    #[error("unsupported NAL type {nal_type} (seq {sequence})")]
    UnsupportedNalType { nal_type: u8, sequence: u16 },

    /// A fragment did not directly follow the previous one.
    #[error("sequence gap: expected {expected}, received {received}")]
    SequenceGap { expected: u16, received: u16 },

    /// A continuation or end fragment arrived with no frame in progress.
    #[error("fragment without start (seq {sequence})")]
    OrphanFragment { sequence: u16 },

    /// Failed to parse interleaved framing or the RTP fixed header.
    #[error("RTP parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// A [`CodecConfig`](crate::CodecConfig) value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Which fixed bit of a header byte was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderErrorKind {
    /// NAL header `forbidden_zero_bit` is 1.
    ForbiddenBitSet,
    /// FU header `R` bit is 1.
    ReservedBitSet,
}

impl fmt::Display for HeaderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForbiddenBitSet => write!(f, "forbidden_zero_bit set"),
            Self::ReservedBitSet => write!(f, "FU reserved bit set"),
        }
    }
}

/// Specific kind of packet framing failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Interleaved frame did not start with `$`.
    BadMagic,
    /// Fewer bytes than the fixed headers require.
    ShortPacket,
    /// Interleaved length field disagrees with the buffer size.
    LengthMismatch,
    /// RTP version field is not 2.
    BadVersion,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic => write!(f, "missing interleaved '$' marker"),
            Self::ShortPacket => write!(f, "packet too short"),
            Self::LengthMismatch => write!(f, "interleaved length mismatch"),
            Self::BadVersion => write!(f, "unsupported RTP version"),
        }
    }
}

/// Convenience alias for `Result<T, CodecError>`.
pub type Result<T> = std::result::Result<T, CodecError>;
