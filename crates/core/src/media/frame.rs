use super::nal::is_key_frame;

/// Annex-B start code written ahead of every reassembled NAL unit.
pub const START_CODE: [u8; 4] = [0, 0, 0, 1];

/// One prefix-delimited NAL unit.
///
/// The buffer holds `prefix_size` bytes of start code followed by the NAL
/// unit itself (NAL header byte first).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct H265Frame {
    buffer: Vec<u8>,
    prefix_size: usize,
    /// NAL type of the carried unit (for fragmented input, the FU type).
    pub nal_type: u8,
    /// Media time in milliseconds.
    pub timestamp: u32,
    /// RTP sequence number of the last packet folded into this frame.
    pub sequence: u16,
}

impl H265Frame {
    /// An empty assembly frame backed by `buffer`, expecting a 4-byte prefix.
    pub fn empty(mut buffer: Vec<u8>) -> Self {
        buffer.clear();
        Self {
            buffer,
            prefix_size: START_CODE.len(),
            nal_type: 0,
            timestamp: 0,
            sequence: 0,
        }
    }

    /// Wrap a bare NAL unit, writing the 4-byte start code in front of it.
    pub fn from_nal(buffer: Vec<u8>, nal: &[u8], timestamp: u32) -> Self {
        let mut frame = Self::empty(buffer);
        frame.buffer.extend_from_slice(&START_CODE);
        frame.buffer.extend_from_slice(nal);
        frame.nal_type = nal.first().map_or(0, |b| b & 0x1f);
        frame.timestamp = timestamp;
        frame
    }

    /// Wrap bytes that already begin with a `prefix_size`-byte start code.
    pub fn with_prefix(buffer: Vec<u8>, prefix_size: usize, timestamp: u32) -> Self {
        let prefix_size = prefix_size.min(buffer.len());
        let nal_type = buffer.get(prefix_size).map_or(0, |b| b & 0x1f);
        Self {
            buffer,
            prefix_size,
            nal_type,
            timestamp,
            sequence: 0,
        }
    }

    /// Start code plus NAL unit.
    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    /// NAL unit without its start code.
    pub fn payload(&self) -> &[u8] {
        &self.buffer[self.prefix_size.min(self.buffer.len())..]
    }

    pub fn prefix_size(&self) -> usize {
        self.prefix_size
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_key_frame(&self) -> bool {
        is_key_frame(self.nal_type)
    }

    pub fn into_buffer(self) -> Vec<u8> {
        self.buffer
    }

    /// Drop all bytes and start over with a fresh start code.
    pub(crate) fn restart(&mut self) {
        self.buffer.clear();
        self.buffer.extend_from_slice(&START_CODE);
        self.prefix_size = START_CODE.len();
    }

    pub(crate) fn clear(&mut self) {
        self.buffer.clear();
    }

    pub(crate) fn push(&mut self, byte: u8) {
        self.buffer.push(byte);
    }

    pub(crate) fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_nal_prepends_start_code() {
        let frame = H265Frame::from_nal(Vec::new(), &[0x65, 0xAA], 40);
        assert_eq!(frame.data(), &[0, 0, 0, 1, 0x65, 0xAA]);
        assert_eq!(frame.payload(), &[0x65, 0xAA]);
        assert_eq!(frame.nal_type, 5);
        assert!(frame.is_key_frame());
        assert_eq!(frame.timestamp, 40);
    }

    #[test]
    fn with_prefix_accepts_three_byte_start_code() {
        let frame = H265Frame::with_prefix(vec![0, 0, 1, 0x41, 0x9A], 3, 0);
        assert_eq!(frame.payload(), &[0x41, 0x9A]);
        assert_eq!(frame.nal_type, 1);
        assert!(!frame.is_key_frame());
    }

    #[test]
    fn empty_reuses_buffer_storage() {
        let buf = Vec::with_capacity(512);
        let frame = H265Frame::empty(buf);
        assert!(frame.is_empty());
        assert!(frame.into_buffer().capacity() >= 512);
    }
}
