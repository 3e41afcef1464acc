use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;

use crate::error::Result;
use crate::media::PacketSink;
use crate::media::rtp::RtpPacket;
use crate::pool::BufferPool;

/// Largest datagram accepted by [`UdpTransport::recv_packet`].
const MAX_DATAGRAM: usize = 65535;

/// UDP transport for plain RTP delivery.
///
/// This layer is address-only: it does not know about sessions. Packets
/// are sent without their interleaved prefix, as RTP over UDP expects.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Bind an ephemeral UDP socket for outbound RTP.
    pub fn bind_ephemeral() -> Result<Self> {
        Self::bind("0.0.0.0:0")
    }

    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Send raw bytes to a specific socket address.
    pub fn send_to(&self, payload: &[u8], addr: SocketAddr) -> Result<usize> {
        Ok(self.socket.send_to(payload, addr)?)
    }

    /// Send the RTP portion of `packet` to `addr`.
    pub fn send_packet(&self, packet: &RtpPacket, addr: SocketAddr) -> Result<usize> {
        self.send_to(packet.rtp_bytes(), addr)
    }

    /// Block for one datagram and parse it as RTP.
    pub fn recv_packet(&self, mut buffer: Vec<u8>, ticks_per_ms: u32) -> Result<RtpPacket> {
        buffer.resize(MAX_DATAGRAM, 0);
        let (len, _) = self.socket.recv_from(&mut buffer)?;
        buffer.truncate(len);
        RtpPacket::parse_rtp(buffer, ticks_per_ms)
    }
}

/// Packet sink that sends every packet to one peer over UDP.
///
/// Send failures are logged and counted; the stream keeps going.
pub struct UdpSink {
    transport: UdpTransport,
    peer: SocketAddr,
    pool: BufferPool,
    sent: usize,
    failed: usize,
}

impl UdpSink {
    pub fn new(transport: UdpTransport, peer: SocketAddr, pool: BufferPool) -> Self {
        Self {
            transport,
            peer,
            pool,
            sent: 0,
            failed: 0,
        }
    }

    pub fn sent(&self) -> usize {
        self.sent
    }

    pub fn failed(&self) -> usize {
        self.failed
    }
}

impl PacketSink for UdpSink {
    fn deliver_packet(&mut self, packet: RtpPacket, _key_frame: bool) {
        match self.transport.send_packet(&packet, self.peer) {
            Ok(_) => self.sent += 1,
            Err(e) => {
                self.failed += 1;
                tracing::warn!(peer = %self.peer, seq = packet.sequence, error = %e, "UDP send failed");
            }
        }
        self.pool.recycle(packet.into_buffer());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::rtp::RtpHeader;
    use std::time::Duration;

    #[test]
    fn sink_sends_rtp_without_prefix() {
        let receiver = UdpTransport::bind("127.0.0.1:0").unwrap();
        receiver
            .socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let peer = receiver.local_addr().unwrap();

        let sender = UdpTransport::bind("127.0.0.1:0").unwrap();
        let pool = BufferPool::new(2);
        let mut sink = UdpSink::new(sender, peer, pool.clone());

        let header = RtpHeader {
            payload_type: 96,
            marker: true,
            sequence: 42,
            timestamp: 900,
            ssrc: 1,
        };
        let packet = RtpPacket::encode(Vec::new(), 0, &header, 10, &[&[0x65, 1, 2][..]]);
        sink.deliver_packet(packet, true);
        assert_eq!(sink.sent(), 1);
        assert_eq!(pool.idle(), 1);

        let received = receiver.recv_packet(Vec::new(), 90).unwrap();
        assert!(!received.is_interleaved());
        assert_eq!(received.sequence, 42);
        assert_eq!(received.timestamp, 10);
        assert!(received.mark);
        assert_eq!(received.payload(), &[0x65, 1, 2]);
    }
}
