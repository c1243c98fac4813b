//! Animation player for reading back recorded floods.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use super::format::{
    AnimationHeader, CompressionType, FrameIndex, METRICS_SIZE, decode_metrics, decompress_lz4,
    invalid_data, unpack_mask,
};
use crate::compute::{MetricsFrame, WaterState};

/// Reads `.glfa` flood recordings.
///
/// ```ignore
/// let mut player = AnimationPlayer::open("run.glfa")?;
/// for frame in player.frames() {
///     let (water, metrics) = frame?;
///     println!("{}: {} cells", metrics.frame, water.flooded_count());
/// }
/// ```
pub struct AnimationPlayer {
    reader: BufReader<File>,
    header: AnimationHeader,
    frame_indices: Vec<FrameIndex>,
}

impl AnimationPlayer {
    /// Open a recording and load its frame index.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let header = AnimationHeader::read_from(&mut reader)?;

        // Index table sits at the end of the file
        let index_size = header
            .frame_count
            .checked_mul(FrameIndex::SIZE as u64)
            .ok_or_else(|| invalid_data("Frame count overflow".to_string()))?;
        let file_len = reader.seek(SeekFrom::End(0))?;
        let index_start = file_len
            .checked_sub(index_size)
            .filter(|&start| start >= AnimationHeader::SIZE as u64)
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "Truncated frame index"))?;

        reader.seek(SeekFrom::Start(index_start))?;

        let mut frame_indices = Vec::with_capacity(header.frame_count as usize);
        for _ in 0..header.frame_count {
            frame_indices.push(FrameIndex::read_from(&mut reader)?);
        }

        Ok(Self {
            reader,
            header,
            frame_indices,
        })
    }

    /// Recording header.
    pub fn header(&self) -> &AnimationHeader {
        &self.header
    }

    /// Number of recorded frames.
    pub fn frame_count(&self) -> u64 {
        self.header.frame_count
    }

    /// Grid dimensions as (width, height).
    pub fn dimensions(&self) -> (usize, usize) {
        (self.header.width as usize, self.header.height as usize)
    }

    /// Flood elevation of the recorded session.
    pub fn threshold(&self) -> f64 {
        self.header.threshold
    }

    /// Area of one prepared cell.
    pub fn cell_area(&self) -> f64 {
        self.header.cell_area
    }

    /// Decode the water state and metrics of the `frame_index`-th recorded frame.
    pub fn read_frame(&mut self, frame_index: u64) -> io::Result<(WaterState, MetricsFrame)> {
        let Some(index) = self.frame_indices.get(frame_index as usize).copied() else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Frame index {} out of range ({} frames)",
                    frame_index, self.header.frame_count
                ),
            ));
        };

        let limit = self.header.max_stored_frame_size();
        let size = usize::try_from(index.size)
            .ok()
            .filter(|&size| size <= limit)
            .ok_or_else(|| {
                invalid_data(format!(
                    "Frame {} claims {} stored bytes, at most {} allowed",
                    frame_index, index.size, limit
                ))
            })?;

        self.reader.seek(SeekFrom::Start(index.offset))?;
        let mut data = vec![0u8; size];
        self.reader.read_exact(&mut data)?;

        let frame = match self.header.compression {
            CompressionType::None => data,
            CompressionType::Lz4 => decompress_lz4(&data)?,
        };

        if frame.len() != self.header.frame_size() {
            return Err(invalid_data(format!(
                "Frame {} decodes to {} bytes, expected {}",
                frame_index,
                frame.len(),
                self.header.frame_size()
            )));
        }

        let (width, height) = self.dimensions();
        let plane = self.header.plane_size();
        let metrics = decode_metrics(&frame[..METRICS_SIZE])?;

        let mut flooded = vec![false; width * height];
        let mut source = vec![false; width * height];
        unpack_mask(&frame[METRICS_SIZE..METRICS_SIZE + plane], &mut flooded)?;
        unpack_mask(&frame[METRICS_SIZE + plane..], &mut source)?;

        let water = WaterState::from_masks(width, height, flooded, source)
            .map_err(|e| invalid_data(e.to_string()))?;
        Ok((water, metrics))
    }

    /// Iterate over every recorded frame in order.
    pub fn frames(&mut self) -> FrameIterator<'_> {
        FrameIterator {
            player: self,
            current: 0,
        }
    }
}

/// Sequential reader over a recording, see [`AnimationPlayer::frames`].
pub struct FrameIterator<'a> {
    player: &'a mut AnimationPlayer,
    current: u64,
}

impl Iterator for FrameIterator<'_> {
    type Item = io::Result<(WaterState, MetricsFrame)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.player.frame_count() {
            return None;
        }

        let result = self.player.read_frame(self.current);
        self.current += 1;
        Some(result)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.player.frame_count().saturating_sub(self.current) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FrameIterator<'_> {}
