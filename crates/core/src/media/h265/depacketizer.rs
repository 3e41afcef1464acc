//! Receive side: RTP packets in, complete H.265 frames out.
//!
//! Single NAL packets become frames directly. FU-A fragments are appended
//! to a pooled buffer between the start and end flags; any sequence gap
//! inside a fragmented unit discards the partial frame, and later
//! fragments of that unit are rejected until the next start.

use crate::error::{CodecError, Result};
use crate::media::frame::H265Frame;
use crate::media::nal::{FuHeader, NalHeader, PayloadKind, is_key_frame};
use crate::media::rtp::RtpPacket;
use crate::media::{Depacketizer, FrameSink};
use crate::pool::BufferPool;

/// Counters kept by [`H265Depacketizer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DepacketizerStats {
    /// Frames delivered to the sink.
    pub frames: u64,
    /// Partial frames abandoned after a sequence gap.
    pub dropped_frames: u64,
    /// Packets rejected for malformed headers, unsupported types or
    /// missing fragment starts.
    pub rejected_packets: u64,
}

/// Reassembles H.265 frames from RTP packets.
///
/// Holds exactly one live assembly frame. Single NAL unit packets replace
/// it and are delivered at once; FU-A fragments accumulate into it until
/// the end fragment arrives. Each fragment after the first must carry the
/// next sequence number, otherwise the partial frame is thrown away and
/// reassembly resumes at the next start fragment or single NAL unit.
///
/// After every delivery a fresh buffer is taken from the pool, so the
/// sink may keep the delivered frame for as long as it likes.
#[derive(Debug)]
pub struct H265Depacketizer {
    pool: BufferPool,
    frame: H265Frame,
    assembling: bool,
    stats: DepacketizerStats,
}

impl H265Depacketizer {
    pub fn new(pool: BufferPool) -> Self {
        let frame = H265Frame::empty(pool.obtain());
        Self {
            pool,
            frame,
            assembling: false,
            stats: DepacketizerStats::default(),
        }
    }

    /// Whether a fragmented frame is in progress.
    pub fn is_assembling(&self) -> bool {
        self.assembling
    }

    /// Bytes currently held in the assembly buffer, start code included.
    pub fn pending_len(&self) -> usize {
        self.frame.len()
    }

    pub fn stats(&self) -> DepacketizerStats {
        self.stats
    }

    fn decode(&mut self, packet: &RtpPacket, sink: &mut dyn FrameSink) -> Result<bool> {
        let payload = packet.payload();
        let Some(&first) = payload.first() else {
            return Err(CodecError::Truncated { needed: 1, len: 0 });
        };
        let nal = NalHeader::parse(first)?;

        match PayloadKind::classify(nal.nal_type) {
            PayloadKind::Single => {
                if self.assembling {
                    tracing::debug!(
                        seq = packet.sequence,
                        pending = self.frame.len(),
                        "single NAL unit replaces partial fragmented frame"
                    );
                }
                self.frame.restart();
                self.frame.extend(payload);
                self.frame.nal_type = nal.nal_type;
                self.frame.timestamp = packet.timestamp;
                self.frame.sequence = packet.sequence;
                self.assembling = false;
                let key = is_key_frame(nal.nal_type);
                self.emit(sink);
                Ok(key)
            }
            PayloadKind::FragmentationUnit => self.decode_fragment(nal, packet, sink),
            PayloadKind::Unsupported => Err(CodecError::UnsupportedNalType {
                nal_type: nal.nal_type,
                sequence: packet.sequence,
            }),
        }
    }

    fn decode_fragment(
        &mut self,
        nal: NalHeader,
        packet: &RtpPacket,
        sink: &mut dyn FrameSink,
    ) -> Result<bool> {
        let payload = packet.payload();
        if payload.len() < 2 {
            return Err(CodecError::Truncated {
                needed: 2,
                len: payload.len(),
            });
        }
        let fu = FuHeader::parse(payload[1])?;
        let fragment = &payload[2..];

        if fu.start {
            let rebuilt = NalHeader {
                forbidden_zero_bit: nal.forbidden_zero_bit,
                nal_ref_idc: nal.nal_ref_idc,
                nal_type: fu.nal_type,
            };
            self.frame.restart();
            self.frame.push(rebuilt.to_byte());
            self.frame.extend(fragment);
            self.frame.nal_type = fu.nal_type;
            self.frame.timestamp = packet.timestamp;
            self.frame.sequence = packet.sequence;
            self.assembling = true;
            return Ok(is_key_frame(fu.nal_type));
        }

        if !self.assembling {
            return Err(CodecError::OrphanFragment {
                sequence: packet.sequence,
            });
        }

        let expected = self.frame.sequence.wrapping_add(1);
        if packet.sequence != expected {
            self.frame.clear();
            self.assembling = false;
            self.stats.dropped_frames += 1;
            return Err(CodecError::SequenceGap {
                expected,
                received: packet.sequence,
            });
        }

        self.frame.sequence = packet.sequence;
        self.frame.extend(fragment);

        if fu.end {
            self.frame.timestamp = packet.timestamp;
            self.assembling = false;
            let key = is_key_frame(self.frame.nal_type);
            self.emit(sink);
            return Ok(key);
        }
        Ok(false)
    }

    /// Hand the live frame to the sink and start over on a fresh buffer.
    fn emit(&mut self, sink: &mut dyn FrameSink) {
        let next = H265Frame::empty(self.pool.obtain());
        let frame = std::mem::replace(&mut self.frame, next);
        tracing::trace!(
            nal_type = frame.nal_type,
            seq = frame.sequence,
            ts = frame.timestamp,
            bytes = frame.len(),
            "frame reassembled"
        );
        self.stats.frames += 1;
        sink.deliver_frame(frame);
    }
}

impl Depacketizer for H265Depacketizer {
    fn input_packet(&mut self, packet: &RtpPacket, sink: &mut dyn FrameSink) -> bool {
        match self.decode(packet, sink) {
            Ok(key) => key,
            Err(CodecError::SequenceGap { expected, received }) => {
                tracing::warn!(expected, received, "packet loss, fragmented frame discarded");
                false
            }
            Err(e) => {
                self.stats.rejected_packets += 1;
                tracing::warn!(seq = packet.sequence, error = %e, "RTP packet rejected");
                false
            }
        }
    }
}
