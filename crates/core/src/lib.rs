pub mod config;
pub mod error;
pub mod media;
pub mod pool;
pub mod transport;

pub use config::{CodecConfig, CycleLength};
pub use error::{CodecError, Result};
pub use media::frame::H265Frame;
pub use media::h265::{H265Depacketizer, H265Packetizer};
pub use media::rtp::RtpPacket;
pub use media::{Depacketizer, FrameSink, PacketSink, Packetizer};
pub use pool::BufferPool;
