//! H.265 RTP payload handling with one-byte NAL headers and FU-A
//! fragmentation.
//!
//! - **Single NAL unit** (types 0–23): one packet carries one whole NAL
//!   unit.
//!
//! - **FU-A** (type 28): a NAL unit too large for one packet is split.
//!   Each fragment carries a 2-byte prefix before the NAL payload:
//!
//!   ```text
//!   FU indicator:  [F|NRI|Type=28]     (1 byte)
//!   FU header:     [S|E|R|NAL_Type]    (1 byte)
//!   Fragment data: [...]               (up to MTU - 2 bytes)
//!   ```
//!
//!   The original NAL header byte is not sent; the receiver rebuilds it
//!   from the indicator's F/NRI bits and the FU header's type.
//!
//! Aggregation packets (24–27) and FU-B (29) are not reassembled.

mod depacketizer;
mod packetizer;

pub use depacketizer::{DepacketizerStats, H265Depacketizer};
pub use packetizer::H265Packetizer;
