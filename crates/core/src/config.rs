use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{CodecError, Result};
use crate::media::nal::FU_PREFIX_LEN;
use crate::media::rtp::MAX_PAYLOAD_LEN;

/// Default maximum payload size per outgoing packet.
pub const DEFAULT_MTU: usize = 1400;

/// Bytes subtracted from the MTU to size each FU fragment.
pub const DEFAULT_FRAGMENT_OVERHEAD: usize = 2;

/// Video clock rate in Hz (RFC 3551 §4).
pub const DEFAULT_SAMPLE_RATE: u32 = 90000;

/// First dynamic payload type (RFC 3551 §6).
pub const DEFAULT_PAYLOAD_TYPE: u8 = 96;

/// Timestamp wraparound cycle: 13 hours in milliseconds.
///
/// Scaled to 90 kHz this is 4 212 000 000 ticks, the largest whole-hour
/// cycle that still fits in the 32-bit RTP timestamp.
pub const DEFAULT_CYCLE_MS: u32 = 13 * 60 * 60 * 1000;

/// Shared timestamp wraparound cycle length, in milliseconds.
///
/// The value is owned by whoever loads configuration; every clone sees
/// updates made through any other clone. The packetizer reads it once per
/// frame.
#[derive(Debug, Clone)]
pub struct CycleLength(Arc<AtomicU32>);

impl CycleLength {
    pub fn new(cycle_ms: u32) -> Result<Self> {
        let cycle = Self(Arc::new(AtomicU32::new(DEFAULT_CYCLE_MS)));
        cycle.set(cycle_ms)?;
        Ok(cycle)
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    /// Replace the cycle length. Zero is rejected.
    pub fn set(&self, cycle_ms: u32) -> Result<()> {
        if cycle_ms == 0 {
            return Err(CodecError::InvalidConfig(
                "timestamp cycle must be non-zero".to_string(),
            ));
        }
        self.0.store(cycle_ms, Ordering::Relaxed);
        tracing::debug!(cycle_ms, "timestamp cycle updated");
        Ok(())
    }
}

impl Default for CycleLength {
    fn default() -> Self {
        Self(Arc::new(AtomicU32::new(DEFAULT_CYCLE_MS)))
    }
}

/// Per-stream codec parameters shared by the packetizer and depacketizer.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Maximum payload bytes per outgoing packet before fragmenting.
    pub mtu: usize,
    /// Subtracted from `mtu` to get the fragment capacity. Two bytes covers
    /// the FU indicator and FU header.
    pub fragment_overhead: usize,
    /// RTP clock rate in Hz.
    pub sample_rate: u32,
    /// RTP payload type (7-bit).
    pub payload_type: u8,
    /// Interleaved channel id written to byte 1 of each outgoing packet.
    pub interleaved: u8,
    /// Timestamp wraparound cycle.
    pub cycle: CycleLength,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            fragment_overhead: DEFAULT_FRAGMENT_OVERHEAD,
            sample_rate: DEFAULT_SAMPLE_RATE,
            payload_type: DEFAULT_PAYLOAD_TYPE,
            interleaved: 0,
            cycle: CycleLength::default(),
        }
    }
}

impl CodecConfig {
    /// Payload bytes carried by each full fragment.
    pub fn fragment_capacity(&self) -> usize {
        self.mtu.saturating_sub(self.fragment_overhead)
    }

    /// RTP clock ticks per millisecond.
    pub fn ticks_per_ms(&self) -> u32 {
        clock_ticks_per_ms(self.sample_rate)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mtu <= self.fragment_overhead + 1 {
            return Err(CodecError::InvalidConfig(format!(
                "mtu {} leaves no room for fragment payload (overhead {})",
                self.mtu, self.fragment_overhead
            )));
        }
        // Fragments carry the FU prefix on top of a full capacity chunk.
        if self.fragment_capacity() + FU_PREFIX_LEN > MAX_PAYLOAD_LEN {
            return Err(CodecError::InvalidConfig(format!(
                "mtu {} with fragment overhead {} does not fit the interleaved length field",
                self.mtu, self.fragment_overhead
            )));
        }
        if self.sample_rate == 0 {
            return Err(CodecError::InvalidConfig(
                "sample rate must be non-zero".to_string(),
            ));
        }
        if self.payload_type > 0x7f {
            return Err(CodecError::InvalidConfig(format!(
                "payload type {} exceeds 7 bits",
                self.payload_type
            )));
        }
        let cycle_ms = self.cycle.get();
        if !self.cycle_fits(cycle_ms) {
            return Err(CodecError::InvalidConfig(format!(
                "cycle of {} ms overflows 32-bit timestamps at {} Hz",
                cycle_ms, self.sample_rate
            )));
        }
        Ok(())
    }

    /// Whether every stamp below `cycle_ms` scales to a 32-bit wire
    /// timestamp at this sample rate.
    pub fn cycle_fits(&self, cycle_ms: u32) -> bool {
        cycle_ms as u64 * self.ticks_per_ms() as u64 <= u32::MAX as u64
    }
}

/// Milliseconds-to-ticks factor, never zero.
pub fn clock_ticks_per_ms(sample_rate: u32) -> u32 {
    (sample_rate / 1000).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CodecConfig::default();
        config.validate().unwrap();
        assert_eq!(config.fragment_capacity(), 1398);
        assert_eq!(config.ticks_per_ms(), 90);
    }

    #[test]
    fn default_cycle_fits_32_bits() {
        assert!(DEFAULT_CYCLE_MS as u64 * 90 <= u32::MAX as u64);
    }

    #[test]
    fn tiny_mtu_rejected() {
        let config = CodecConfig {
            mtu: 3,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CodecError::InvalidConfig(_))
        ));
    }

    #[test]
    fn fragments_must_fit_length_field() {
        // 65_523 + 2 + 12 bytes would wrap the 16-bit length to 1.
        let config = CodecConfig {
            mtu: 65_523,
            fragment_overhead: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CodecError::InvalidConfig(_))
        ));

        let config = CodecConfig {
            mtu: 65_521,
            fragment_overhead: 0,
            ..Default::default()
        };
        config.validate().unwrap();
        assert_eq!(config.fragment_capacity() + FU_PREFIX_LEN, MAX_PAYLOAD_LEN);
    }

    #[test]
    fn oversized_cycle_rejected() {
        let config = CodecConfig::default();
        config.cycle.set(DEFAULT_CYCLE_MS * 2).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn payload_type_must_fit_seven_bits() {
        let config = CodecConfig {
            payload_type: 200,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn cycle_zero_rejected() {
        assert!(CycleLength::new(0).is_err());
        let cycle = CycleLength::default();
        assert!(cycle.set(0).is_err());
        assert_eq!(cycle.get(), DEFAULT_CYCLE_MS);
    }

    #[test]
    fn cycle_updates_are_shared() {
        let config = CodecConfig::default();
        let handle = config.cycle.clone();
        handle.set(1000).unwrap();
        assert_eq!(config.cycle.get(), 1000);
    }

    #[test]
    fn cycle_fits_depends_on_sample_rate() {
        let config = CodecConfig::default();
        assert!(config.cycle_fits(DEFAULT_CYCLE_MS));
        assert!(!config.cycle_fits(u32::MAX));
        let slow = CodecConfig {
            sample_rate: 1000,
            ..Default::default()
        };
        assert!(slow.cycle_fits(u32::MAX));
    }
}
