//! Media codecs and RTP (de)packetization.
//!
//! ## RTP overview (RFC 3550)
//!
//! Each encoded video frame travels as one or more RTP packets.
//! Every RTP packet carries a 12-byte fixed header ([`rtp::RtpHeader`])
//! containing:
//!
//! - **Sequence number** (16-bit, wrapping): for reordering and loss detection.
//! - **Timestamp** (32-bit): media clock, typically 90 kHz for video.
//! - **SSRC** (32-bit): randomly chosen to identify the sender.
//! - **Marker bit**: set on the last packet of a frame.
//!
//! ## Data flow
//!
//! ```text
//! transport ──RtpPacket──▶ Depacketizer ──H265Frame──▶ FrameSink
//! encoder ──H265Frame──▶ Packetizer ──RtpPacket──▶ PacketSink ──▶ transport
//! ```
//!
//! Frames and packets are moved into sinks by value. Once handed off, the
//! producer never writes to that buffer again.

pub mod annexb;
pub mod frame;
pub mod h265;
pub mod nal;
pub mod rtp;

use std::sync::mpsc::Sender;

use frame::H265Frame;
use rtp::RtpPacket;

/// Receives frames completed by a [`Depacketizer`].
pub trait FrameSink {
    fn deliver_frame(&mut self, frame: H265Frame);
}

/// Receives ready-to-transmit packets from a [`Packetizer`].
pub trait PacketSink {
    /// `key_frame` repeats [`RtpPacket::key_frame`] for sinks that only
    /// look at the bytes.
    fn deliver_packet(&mut self, packet: RtpPacket, key_frame: bool);
}

impl FrameSink for Vec<H265Frame> {
    fn deliver_frame(&mut self, frame: H265Frame) {
        self.push(frame);
    }
}

impl PacketSink for Vec<RtpPacket> {
    fn deliver_packet(&mut self, packet: RtpPacket, _key_frame: bool) {
        self.push(packet);
    }
}

impl FrameSink for Sender<H265Frame> {
    fn deliver_frame(&mut self, frame: H265Frame) {
        if self.send(frame).is_err() {
            tracing::debug!("frame receiver gone, dropping frame");
        }
    }
}

impl PacketSink for Sender<RtpPacket> {
    fn deliver_packet(&mut self, packet: RtpPacket, _key_frame: bool) {
        if self.send(packet).is_err() {
            tracing::debug!("packet receiver gone, dropping packet");
        }
    }
}

/// Codec-specific receive side: RTP packets in, frames out.
pub trait Depacketizer {
    /// Fold one packet into the frame being assembled, delivering at most
    /// one completed frame to `sink`.
    ///
    /// Returns `true` when this packet starts or completes a key frame.
    /// Malformed, unsupported and out-of-sequence packets are logged and
    /// dropped; they return `false`.
    fn input_packet(&mut self, packet: &RtpPacket, sink: &mut dyn FrameSink) -> bool;
}

/// Codec-specific send side: frames in, MTU-bounded RTP packets out.
pub trait Packetizer {
    /// Send one frame as one or more packets. The last packet carries the
    /// marker bit.
    fn input_frame(&mut self, frame: &H265Frame, sink: &mut dyn PacketSink);

    /// Sequence number the next packet will carry.
    fn next_sequence(&self) -> u16;
}
