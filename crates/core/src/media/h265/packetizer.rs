//! Send side: H.265 frames in, MTU-bounded RTP packets out.
//!
//! Each NAL unit is sent whole when it fits the fragment capacity and as a
//! run of FU-A fragments otherwise. Every packet of one unit shares the
//! unit's stamp, taken modulo the configured cycle so that it scales to a
//! 32-bit wire timestamp.

use rand::RngExt;

use crate::config::CodecConfig;
use crate::error::Result;
use crate::media::frame::H265Frame;
use crate::media::nal::{FuHeader, NAL_TYPE_FU_A, is_key_frame};
use crate::media::rtp::{RtpHeader, RtpPacket};
use crate::media::{PacketSink, Packetizer};
use crate::pool::BufferPool;

/// Splits H.265 frames into interleaved RTP packets.
///
/// A NAL unit that fits within `mtu - fragment_overhead` bytes goes out as
/// a single packet. Larger units are cut into FU-A fragments of that many
/// bytes each; the last fragment takes whatever remains, and is sent even
/// when nothing remains so the receiver always sees an end flag.
///
/// Per-stream state (sequence counter, SSRC, last timestamp) lives here;
/// build one packetizer per outgoing stream.
///
/// The cycle is re-read for every frame. A cycle changed at runtime to a
/// value whose scaled stamps overflow 32 bits is ignored with a warning,
/// and the last cycle that fitted stays in use.
#[derive(Debug)]
pub struct H265Packetizer {
    config: CodecConfig,
    pool: BufferPool,
    ssrc: u32,
    sequence: u16,
    last_timestamp: u32,
    cycle_ms: u32,
    ignored_cycle_ms: Option<u32>,
}

impl H265Packetizer {
    /// Create with an explicit SSRC. Fails when `config` does not validate.
    pub fn new(config: CodecConfig, ssrc: u32, pool: BufferPool) -> Result<Self> {
        config.validate()?;
        tracing::debug!(
            pt = config.payload_type,
            ssrc = format_args!("{:#010X}", ssrc),
            mtu = config.mtu,
            "H.265 packetizer created"
        );
        let cycle_ms = config.cycle.get();
        Ok(Self {
            config,
            pool,
            ssrc,
            sequence: 0,
            last_timestamp: 0,
            cycle_ms,
            ignored_cycle_ms: None,
        })
    }

    /// Create with a random SSRC.
    ///
    /// Per RFC 3550 §8.1, the SSRC should be chosen randomly to minimize
    /// the probability of collisions between independent sessions.
    pub fn with_random_ssrc(config: CodecConfig, pool: BufferPool) -> Result<Self> {
        let ssrc = rand::rng().random::<u32>();
        Self::new(config, ssrc, pool)
    }

    /// Continue an existing stream from `sequence`.
    pub fn with_initial_sequence(mut self, sequence: u16) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Cycle-bounded millisecond stamp of the last packet sent.
    pub fn last_timestamp(&self) -> u32 {
        self.last_timestamp
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Cycle to apply to the next frame.
    fn current_cycle(&mut self) -> u32 {
        let requested = self.config.cycle.get();
        if requested == self.cycle_ms {
            return requested;
        }
        if self.config.cycle_fits(requested) {
            self.cycle_ms = requested;
            self.ignored_cycle_ms = None;
        } else if self.ignored_cycle_ms != Some(requested) {
            tracing::warn!(
                requested,
                in_use = self.cycle_ms,
                sample_rate = self.config.sample_rate,
                "timestamp cycle overflows 32-bit wire stamps, keeping previous cycle"
            );
            self.ignored_cycle_ms = Some(requested);
        }
        self.cycle_ms
    }

    fn send(
        &mut self,
        parts: &[&[u8]],
        mark: bool,
        stamp: u32,
        key_frame: bool,
        sink: &mut dyn PacketSink,
    ) {
        let header = RtpHeader {
            payload_type: self.config.payload_type,
            marker: mark,
            sequence: self.sequence,
            // stamp < cycle_ms, which fits 32 bits once scaled
            timestamp: stamp * self.config.ticks_per_ms(),
            ssrc: self.ssrc,
        };
        let mut packet = RtpPacket::encode(
            self.pool.obtain(),
            self.config.interleaved,
            &header,
            stamp,
            parts,
        );
        packet.key_frame = key_frame;
        sink.deliver_packet(packet, key_frame);

        self.sequence = self.sequence.wrapping_add(1);
        self.last_timestamp = stamp;
    }
}

impl Packetizer for H265Packetizer {
    fn input_frame(&mut self, frame: &H265Frame, sink: &mut dyn PacketSink) {
        let payload = frame.payload();
        let Some(&nal_header) = payload.first() else {
            tracing::debug!(ts = frame.timestamp, "empty frame skipped");
            return;
        };
        let stamp = frame.timestamp % self.current_cycle();
        let nal_type = nal_header & 0x1f;
        let key_frame = is_key_frame(nal_type);
        let capacity = self.config.fragment_capacity();

        if payload.len() <= capacity {
            self.send(&[payload], true, stamp, key_frame, sink);
            return;
        }

        let nri = nal_header & 0x60;
        let fu_indicator = nri | NAL_TYPE_FU_A;
        let body = &payload[1..];
        let mut offset = 0usize;
        let mut fragments = 0usize;

        loop {
            let remaining = body.len() - offset;
            let last = remaining < capacity;
            let chunk_size = if last { remaining } else { capacity };
            let fu_header = FuHeader {
                start: offset == 0,
                end: last,
                reserved: false,
                nal_type,
            };
            let fu_prefix = [fu_indicator, fu_header.to_byte()];
            let chunk = &body[offset..offset + chunk_size];
            self.send(
                &[&fu_prefix[..], chunk],
                last,
                stamp,
                key_frame,
                sink,
            );
            offset += chunk_size;
            fragments += 1;
            if last {
                break;
            }
        }

        tracing::trace!(
            nal_type,
            nal_size = payload.len(),
            fragments,
            seq = self.sequence,
            ts = stamp,
            "FU-A fragmented NAL unit"
        );
    }

    fn next_sequence(&self) -> u16 {
        self.sequence
    }
}
