//! One-byte NAL unit and FU header codec.
//!
//! ```text
//! NAL header:  [F|NRI|Type]      F = forbidden_zero_bit (must be 0)
//! FU header:   [S|E|R|Type]      R = reserved (must be 0)
//! ```
//!
//! Parsing is pure: each call returns a fresh value or an error, nothing
//! is mutated in place.

use crate::error::{CodecError, HeaderErrorKind, Result};

/// NAL type carried in the FU indicator of a fragmentation unit.
pub const NAL_TYPE_FU_A: u8 = 28;

/// NAL type of an IDR (key frame) slice.
pub const NAL_TYPE_IDR: u8 = 5;

/// FU indicator plus FU header, ahead of every fragment body.
pub const FU_PREFIX_LEN: usize = 2;

/// Highest NAL type sent as a single NAL unit packet.
pub const NAL_TYPE_SINGLE_MAX: u8 = 23;

/// Whether a frame of this NAL type decodes without prior frames.
pub fn is_key_frame(nal_type: u8) -> bool {
    nal_type == NAL_TYPE_IDR
}

/// How the depacketizer handles a packet, decided by its NAL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Types 0–23: one complete NAL unit.
    Single,
    /// Type 28: one fragment of a larger NAL unit.
    FragmentationUnit,
    /// STAP/MTAP (24–27), FU-B (29) and undefined (30, 31).
    Unsupported,
}

impl PayloadKind {
    pub fn classify(nal_type: u8) -> Self {
        match nal_type {
            0..=NAL_TYPE_SINGLE_MAX => Self::Single,
            NAL_TYPE_FU_A => Self::FragmentationUnit,
            _ => Self::Unsupported,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalHeader {
    pub forbidden_zero_bit: bool,
    /// Two-bit importance field, carried through fragmentation untouched.
    pub nal_ref_idc: u8,
    pub nal_type: u8,
}

impl NalHeader {
    /// Split a header byte into its fields.
    ///
    /// Fails with [`HeaderErrorKind::ForbiddenBitSet`] when the top bit is 1.
    pub fn parse(byte: u8) -> Result<Self> {
        let header = Self {
            forbidden_zero_bit: byte >> 7 != 0,
            nal_ref_idc: (byte & 0x60) >> 5,
            nal_type: byte & 0x1f,
        };
        if header.forbidden_zero_bit {
            return Err(CodecError::MalformedHeader {
                kind: HeaderErrorKind::ForbiddenBitSet,
                byte,
            });
        }
        Ok(header)
    }

    pub fn to_byte(self) -> u8 {
        ((self.forbidden_zero_bit as u8) << 7)
            | ((self.nal_ref_idc & 0x03) << 5)
            | (self.nal_type & 0x1f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuHeader {
    pub start: bool,
    pub end: bool,
    pub reserved: bool,
    /// Type of the NAL unit being fragmented.
    pub nal_type: u8,
}

impl FuHeader {
    /// Split an FU header byte into its fields.
    ///
    /// Fails with [`HeaderErrorKind::ReservedBitSet`] when `R` is 1.
    pub fn parse(byte: u8) -> Result<Self> {
        let header = Self {
            start: byte >> 7 != 0,
            end: (byte >> 6) & 0x01 != 0,
            reserved: (byte >> 5) & 0x01 != 0,
            nal_type: byte & 0x1f,
        };
        if header.reserved {
            return Err(CodecError::MalformedHeader {
                kind: HeaderErrorKind::ReservedBitSet,
                byte,
            });
        }
        Ok(header)
    }

    pub fn to_byte(self) -> u8 {
        ((self.start as u8) << 7)
            | ((self.end as u8) << 6)
            | ((self.reserved as u8) << 5)
            | (self.nal_type & 0x1f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_idr_header() {
        let h = NalHeader::parse(0x65).unwrap();
        assert!(!h.forbidden_zero_bit);
        assert_eq!(h.nal_ref_idc, 3);
        assert_eq!(h.nal_type, 5);
        assert_eq!(h.to_byte(), 0x65);
    }

    #[test]
    fn forbidden_bit_rejected() {
        let err = NalHeader::parse(0x85).unwrap_err();
        assert!(matches!(
            err,
            CodecError::MalformedHeader {
                kind: HeaderErrorKind::ForbiddenBitSet,
                byte: 0x85
            }
        ));
    }

    #[test]
    fn parse_fu_start_and_end() {
        let start = FuHeader::parse(0x85).unwrap();
        assert!(start.start && !start.end);
        assert_eq!(start.nal_type, 5);

        let end = FuHeader::parse(0x41).unwrap();
        assert!(!end.start && end.end);
        assert_eq!(end.nal_type, 1);

        let mid = FuHeader::parse(0x01).unwrap();
        assert!(!mid.start && !mid.end);
    }

    #[test]
    fn fu_reserved_bit_rejected() {
        assert!(matches!(
            FuHeader::parse(0xA5),
            Err(CodecError::MalformedHeader {
                kind: HeaderErrorKind::ReservedBitSet,
                ..
            })
        ));
    }

    #[test]
    fn fu_header_to_byte() {
        let h = FuHeader {
            start: true,
            end: false,
            reserved: false,
            nal_type: 5,
        };
        assert_eq!(h.to_byte(), 0x85);
    }

    #[test]
    fn classify_types() {
        assert_eq!(PayloadKind::classify(0), PayloadKind::Single);
        assert_eq!(PayloadKind::classify(23), PayloadKind::Single);
        assert_eq!(PayloadKind::classify(28), PayloadKind::FragmentationUnit);
        for t in [24, 25, 26, 27, 29, 30, 31] {
            assert_eq!(PayloadKind::classify(t), PayloadKind::Unsupported);
        }
    }

    #[test]
    fn only_idr_is_key_frame() {
        assert!(is_key_frame(5));
        for t in (0..32).filter(|&t| t != 5) {
            assert!(!is_key_frame(t));
        }
    }
}
