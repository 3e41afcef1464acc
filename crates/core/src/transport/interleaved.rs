use std::io::{self, Read, Write};

use crate::error::{CodecError, ParseErrorKind, Result};
use crate::media::PacketSink;
use crate::media::rtp::{INTERLEAVED_HEADER_LEN, INTERLEAVED_MAGIC, RtpPacket};
use crate::pool::BufferPool;

/// Reads `$`-framed RTP packets from a byte stream.
///
/// Packet buffers are taken from the pool. A clean end of stream between
/// frames ends the stream; an end of stream inside a frame is an error.
///
/// As an iterator, reading stops after the first I/O error or missing `$`
/// marker since the stream can no longer be trusted to be aligned. RTP
/// header errors inside a well-framed packet are yielded and skipped.
pub struct InterleavedReader<R: Read> {
    reader: R,
    pool: BufferPool,
    ticks_per_ms: u32,
    done: bool,
}

impl<R: Read> InterleavedReader<R> {
    /// `ticks_per_ms` converts wire timestamps back to milliseconds.
    pub fn new(reader: R, pool: BufferPool, ticks_per_ms: u32) -> Self {
        Self {
            reader,
            pool,
            ticks_per_ms,
            done: false,
        }
    }

    /// Read the next packet, or `None` at end of stream.
    pub fn read_packet(&mut self) -> Result<Option<RtpPacket>> {
        let mut prefix = [0u8; INTERLEAVED_HEADER_LEN];
        if !fill_or_eof(&mut self.reader, &mut prefix)? {
            return Ok(None);
        }
        if prefix[0] != INTERLEAVED_MAGIC {
            return Err(CodecError::Parse {
                kind: ParseErrorKind::BadMagic,
            });
        }
        let len = u16::from_be_bytes([prefix[2], prefix[3]]) as usize;

        let mut buffer = self.pool.obtain();
        buffer.extend_from_slice(&prefix);
        buffer.resize(INTERLEAVED_HEADER_LEN + len, 0);
        self.reader.read_exact(&mut buffer[INTERLEAVED_HEADER_LEN..])?;

        RtpPacket::parse_interleaved(buffer, self.ticks_per_ms).map(Some)
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Iterator for InterleavedReader<R> {
    type Item = Result<RtpPacket>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.read_packet().transpose();
        match &item {
            None
            | Some(Err(CodecError::Io(_)))
            | Some(Err(CodecError::Parse {
                kind: ParseErrorKind::BadMagic,
            })) => self.done = true,
            _ => {}
        }
        item
    }
}

/// Fill `buf` completely. `Ok(false)` when the stream ends before the
/// first byte.
fn fill_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

/// Packet sink that writes interleaved frames to a byte stream.
///
/// Packets without an interleaved prefix get one built from their
/// `interleaved` channel. Buffers go back to the pool once written. The
/// first write error is kept and later packets are dropped;
/// [`finish`](Self::finish) reports it.
pub struct InterleavedWriter<W: Write> {
    writer: W,
    pool: BufferPool,
    packets: usize,
    key_packets: usize,
    error: Option<io::Error>,
}

impl<W: Write> InterleavedWriter<W> {
    pub fn new(writer: W, pool: BufferPool) -> Self {
        Self {
            writer,
            pool,
            packets: 0,
            key_packets: 0,
            error: None,
        }
    }

    /// Packets written so far.
    pub fn packets(&self) -> usize {
        self.packets
    }

    /// Written packets that belong to key frames.
    pub fn key_packets(&self) -> usize {
        self.key_packets
    }

    fn write_packet(&mut self, packet: &RtpPacket) -> io::Result<()> {
        if !packet.is_interleaved() {
            let len = packet.rtp_bytes().len() as u16;
            let [hi, lo] = len.to_be_bytes();
            self.writer
                .write_all(&[INTERLEAVED_MAGIC, packet.interleaved, hi, lo])?;
        }
        self.writer.write_all(packet.as_bytes())
    }

    /// Flush and hand back the writer, or the first error seen.
    pub fn finish(mut self) -> Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e.into());
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> PacketSink for InterleavedWriter<W> {
    fn deliver_packet(&mut self, packet: RtpPacket, key_frame: bool) {
        if self.error.is_none() {
            match self.write_packet(&packet) {
                Ok(()) => {
                    self.packets += 1;
                    if key_frame {
                        self.key_packets += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(seq = packet.sequence, error = %e, "interleaved write failed");
                    self.error = Some(e);
                }
            }
        }
        self.pool.recycle(packet.into_buffer());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::rtp::RtpHeader;
    use std::io::Cursor;

    fn packet(sequence: u16, payload: &[u8]) -> RtpPacket {
        let header = RtpHeader {
            payload_type: 96,
            marker: true,
            sequence,
            timestamp: 9000,
            ssrc: 7,
        };
        RtpPacket::encode(Vec::new(), 0, &header, 100, &[payload])
    }

    #[test]
    fn write_then_read_back() {
        let pool = BufferPool::new(4);
        let mut writer = InterleavedWriter::new(Vec::new(), pool.clone());
        writer.deliver_packet(packet(1, &[0x41, 1]), false);
        writer.deliver_packet(packet(2, &[0x65, 2, 3]), true);
        assert_eq!(writer.packets(), 2);
        assert_eq!(writer.key_packets(), 1);
        let bytes = writer.finish().unwrap();

        let reader = InterleavedReader::new(Cursor::new(bytes), pool, 90);
        let packets: Vec<RtpPacket> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].sequence, 1);
        assert_eq!(packets[1].payload(), &[0x65, 2, 3]);
        assert_eq!(packets[1].timestamp, 100);
    }

    #[test]
    fn bare_rtp_packet_gets_prefix() {
        let rtp = packet(5, &[0x41]).rtp_bytes().to_vec();
        let mut bare = RtpPacket::parse_rtp(rtp, 90).unwrap();
        bare.interleaved = 3;

        let mut writer = InterleavedWriter::new(Vec::new(), BufferPool::new(1));
        writer.deliver_packet(bare, false);
        let bytes = writer.finish().unwrap();
        assert_eq!(&bytes[..4], &[b'$', 3, 0, 13]);
        assert_eq!(bytes.len(), 4 + 13);
    }

    #[test]
    fn empty_stream_yields_nothing() {
        let mut reader = InterleavedReader::new(Cursor::new(Vec::new()), BufferPool::new(1), 90);
        assert!(reader.read_packet().unwrap().is_none());
    }

    #[test]
    fn truncated_frame_is_io_error() {
        let bytes = packet(1, &[0x41, 1, 2]).into_buffer();
        let cut = bytes[..bytes.len() - 1].to_vec();
        let mut reader = InterleavedReader::new(Cursor::new(cut), BufferPool::new(1), 90);
        assert!(matches!(reader.read_packet(), Err(CodecError::Io(_))));
    }

    #[test]
    fn missing_magic_stops_iteration() {
        let mut bytes = vec![b'X', 0, 0, 0];
        bytes.extend(packet(1, &[0x41]).into_buffer());
        let mut reader = InterleavedReader::new(Cursor::new(bytes), BufferPool::new(1), 90);
        assert!(matches!(
            reader.next(),
            Some(Err(CodecError::Parse {
                kind: ParseErrorKind::BadMagic
            }))
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn write_error_reported_by_finish() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut writer = InterleavedWriter::new(Broken, BufferPool::new(1));
        writer.deliver_packet(packet(1, &[0x41]), false);
        writer.deliver_packet(packet(2, &[0x41]), false);
        assert_eq!(writer.packets(), 0);
        assert!(writer.finish().is_err());
    }
}
