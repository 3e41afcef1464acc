//! Annex-B byte stream helpers.

use std::io::Write;

use super::FrameSink;
use super::frame::H265Frame;
use crate::error::Result;
use crate::pool::BufferPool;

/// Split an Annex-B bitstream into NAL units.
///
/// Scans for start codes (both 4-byte `00 00 00 01` and 3-byte
/// `00 00 01`) and returns the NAL data between them, excluding
/// the start codes themselves.
///
/// The start code length is tracked per-NAL so boundaries between adjacent
/// NALs stay correct when 3-byte and 4-byte start codes are mixed.
pub fn split_nal_units(data: &[u8]) -> Vec<&[u8]> {
    let mut i = 0usize;

    // (nal_data_start_index, start_code_length)
    let mut start_entries: Vec<(usize, usize)> = Vec::new();

    while i < data.len() {
        if i + 3 < data.len() && data[i..i + 4] == [0, 0, 0, 1] {
            start_entries.push((i + 4, 4));
            i += 4;
        } else if i + 2 < data.len() && data[i..i + 3] == [0, 0, 1] {
            start_entries.push((i + 3, 3));
            i += 3;
        } else {
            i += 1;
        }
    }

    start_entries
        .iter()
        .enumerate()
        .filter_map(|(idx, &(start, _))| {
            let end = match start_entries.get(idx + 1) {
                Some(&(next_start, next_sc_len)) => next_start - next_sc_len,
                None => data.len(),
            };
            (start < end).then(|| &data[start..end])
        })
        .collect()
}

/// Frame sink that writes each frame, start code included, to `W`.
///
/// Frame buffers go back to the pool once written. The first write error is
/// kept and later frames are dropped; [`finish`](Self::finish) reports it.
pub struct AnnexBWriter<W: Write> {
    writer: W,
    pool: BufferPool,
    frames: usize,
    error: Option<std::io::Error>,
}

impl<W: Write> AnnexBWriter<W> {
    pub fn new(writer: W, pool: BufferPool) -> Self {
        Self {
            writer,
            pool,
            frames: 0,
            error: None,
        }
    }

    /// Frames written so far.
    pub fn frames(&self) -> usize {
        self.frames
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

impl<W: Write> FrameSink for AnnexBWriter<W> {
    fn deliver_frame(&mut self, frame: H265Frame) {
        if self.error.is_none() {
            match self.writer.write_all(frame.data()) {
                Ok(()) => self.frames += 1,
                Err(e) => {
                    tracing::warn!(error = %e, "Annex-B write failed");
                    self.error = Some(e);
                }
            }
        }
        self.pool.recycle(frame.into_buffer());
    }
}
