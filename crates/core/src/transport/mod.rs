//! Byte transports that feed and drain the codecs.
//!
//! - **Interleaved** ([`interleaved`]): RTP packets framed with a 4-byte
//!   `$`/channel/length prefix (RFC 2326 §10.12), read from or written to
//!   any byte stream such as the RTSP TCP connection or a capture file.
//!
//! - **UDP** ([`udp`]): plain RTP delivery. A single socket is shared for
//!   all outbound packets; the interleaved prefix is stripped on send.

pub mod interleaved;
pub mod udp;

pub use interleaved::{InterleavedReader, InterleavedWriter};
pub use udp::{UdpSink, UdpTransport};
