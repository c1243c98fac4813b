//! Animation recorder for capturing flood frames.

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use log::warn;

use super::format::{
    AnimationHeader, CompressionType, FrameIndex, compress_lz4, encode_metrics, pack_mask,
};
use crate::compute::{FrameSink, FrameSnapshot, MetricsFrame, WaterState};

/// Which frames a recorder keeps and how it stores them.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Compression type to use.
    pub compression: CompressionType,
    /// Record every Nth frame (1 = every frame).
    pub frame_skip: u32,
    /// Maximum frames to record (0 = unlimited).
    pub max_frames: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            compression: CompressionType::None,
            frame_skip: 1,
            max_frames: 0,
        }
    }
}

/// Records committed flood frames to a `.glfa` file.
///
/// As a [`FrameSink`] the recorder cannot report write failures per frame; the
/// first one is kept, further frames are dropped, and [`finalize`] returns it.
///
/// ```ignore
/// let mut recorder = AnimationRecorder::create("run.glfa", grid.dims(), threshold, cell_area, Default::default())?;
/// controller.run_frames(&mut recorder, 100)?;
/// recorder.finalize()?;
/// ```
///
/// [`finalize`]: AnimationRecorder::finalize
pub struct AnimationRecorder {
    writer: BufWriter<File>,
    header: AnimationHeader,
    frame_indices: Vec<FrameIndex>,
    config: RecorderConfig,
    frames_written: u64,
    step_counter: u32,
    encode_buffer: Vec<u8>,
    error: Option<io::Error>,
}

impl AnimationRecorder {
    /// Create a recorder for a `width x height` session.
    pub fn create<P: AsRef<Path>>(
        path: P,
        (width, height): (usize, usize),
        threshold: f64,
        cell_area: f64,
        config: RecorderConfig,
    ) -> io::Result<Self> {
        let too_large = || io::Error::new(io::ErrorKind::InvalidInput, "Grid too large for GLFA");
        let header = AnimationHeader {
            width: u32::try_from(width).map_err(|_| too_large())?,
            height: u32::try_from(height).map_err(|_| too_large())?,
            frame_count: 0, // Updated on finalize
            threshold,
            cell_area,
            compression: config.compression,
        };

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        header.write_to(&mut writer)?;

        let frame_size = header.frame_size();

        Ok(Self {
            writer,
            header,
            frame_indices: Vec::new(),
            config,
            frames_written: 0,
            step_counter: 0,
            encode_buffer: Vec::with_capacity(frame_size),
            error: None,
        })
    }

    /// Record one frame.
    ///
    /// Returns true if the frame was written (frames may be skipped per config).
    pub fn record_frame(&mut self, water: &WaterState, metrics: &MetricsFrame) -> io::Result<bool> {
        if water.dims() != (self.header.width as usize, self.header.height as usize) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Frame is {:?}, recorder expects {}x{}",
                    water.dims(),
                    self.header.width,
                    self.header.height
                ),
            ));
        }

        self.step_counter += 1;
        if self.step_counter < self.config.frame_skip {
            return Ok(false);
        }
        self.step_counter = 0;

        if self.config.max_frames > 0 && self.frames_written >= self.config.max_frames {
            return Ok(false);
        }

        let offset = self.writer.stream_position()?;

        self.encode_buffer.clear();
        encode_metrics(metrics, &mut self.encode_buffer);
        pack_mask(water.flooded(), &mut self.encode_buffer);
        pack_mask(water.source(), &mut self.encode_buffer);

        let size = match self.header.compression {
            CompressionType::None => {
                self.writer.write_all(&self.encode_buffer)?;
                self.encode_buffer.len()
            }
            CompressionType::Lz4 => {
                let compressed = compress_lz4(&self.encode_buffer);
                self.writer.write_all(&compressed)?;
                compressed.len()
            }
        };

        self.frame_indices.push(FrameIndex {
            offset,
            size: size as u64,
        });
        self.frames_written += 1;

        Ok(true)
    }

    /// Append the frame index table and patch the frame count into the
    /// header. Fails with the first write error seen while recording.
    pub fn finalize(mut self) -> io::Result<AnimationStats> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }

        let index_offset = self.writer.stream_position()?;
        for index in &self.frame_indices {
            index.write_to(&mut self.writer)?;
        }

        self.header.frame_count = self.frames_written;
        self.writer.seek(SeekFrom::Start(0))?;
        self.header.write_to(&mut self.writer)?;
        self.writer.flush()?;

        let total_bytes = index_offset + self.frame_indices.len() as u64 * FrameIndex::SIZE as u64;

        Ok(AnimationStats {
            frame_count: self.frames_written,
            total_bytes,
            average_frame_size: if self.frames_written > 0 {
                index_offset.saturating_sub(AnimationHeader::SIZE as u64) / self.frames_written
            } else {
                0
            },
            compression: self.header.compression,
        })
    }

    /// Frames written so far (skipped frames excluded).
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// First write error seen while acting as a sink, if any.
    pub fn error(&self) -> Option<&io::Error> {
        self.error.as_ref()
    }
}

impl FrameSink for AnimationRecorder {
    fn present(&mut self, snapshot: &FrameSnapshot<'_>, metrics: &MetricsFrame) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = self.record_frame(snapshot.water, metrics) {
            warn!("Recording stopped at frame {}: {}", snapshot.frame, err);
            self.error = Some(err);
        }
    }
}

/// Size summary returned by [`AnimationRecorder::finalize`].
#[derive(Debug, Clone)]
pub struct AnimationStats {
    /// Number of frames recorded.
    pub frame_count: u64,
    /// Total file size in bytes.
    pub total_bytes: u64,
    /// Average stored frame size in bytes.
    pub average_frame_size: u64,
    /// Compression used.
    pub compression: CompressionType,
}

impl std::fmt::Display for AnimationStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} frames, {:.2} KB total, {:.2} KB/frame avg, compression: {:?}",
            self.frame_count,
            self.total_bytes as f64 / 1024.0,
            self.average_frame_size as f64 / 1024.0,
            self.compression
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn metrics(frame: u64, flooded: usize) -> MetricsFrame {
        MetricsFrame {
            frame,
            flooded_cells: flooded,
            changed_cells: 1,
            coverage_area: flooded as f64,
            volume: 0.0,
            max_depth: 0.0,
            velocity_estimate: 1.0,
        }
    }

    fn water(flooded: &[usize]) -> WaterState {
        let mut mask = vec![false; 12];
        for &i in flooded {
            mask[i] = true;
        }
        WaterState::from_masks(4, 3, mask, vec![false; 12]).unwrap()
    }

    #[test]
    fn test_recorder_writes_header_frames_and_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.glfa");

        let mut recorder =
            AnimationRecorder::create(&path, (4, 3), 10.0, 1.0, RecorderConfig::default()).unwrap();
        for i in 0..3 {
            assert!(recorder.record_frame(&water(&[i]), &metrics(i as u64 + 1, 1)).unwrap());
        }
        let stats = recorder.finalize().unwrap();

        assert_eq!(stats.frame_count, 3);
        // 56 metrics bytes + two 2-byte planes per frame
        assert_eq!(stats.average_frame_size, 60);
        let len = std::fs::metadata(&path).unwrap().len();
        assert_eq!(len, stats.total_bytes);
        assert_eq!(len, 48 + 3 * 60 + 3 * 16);
    }

    #[test]
    fn test_recorder_frame_skip_and_limit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("skip.glfa");

        let config = RecorderConfig {
            frame_skip: 2,
            max_frames: 2,
            ..Default::default()
        };
        let mut recorder = AnimationRecorder::create(&path, (4, 3), 10.0, 1.0, config).unwrap();

        let recorded: Vec<bool> = (0..6)
            .map(|i| recorder.record_frame(&water(&[]), &metrics(i, 0)).unwrap())
            .collect();
        assert_eq!(recorded, vec![false, true, false, true, false, false]);
        assert_eq!(recorder.frames_written(), 2);
    }

    #[test]
    fn test_recorder_rejects_wrong_dimensions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dims.glfa");

        let mut recorder =
            AnimationRecorder::create(&path, (5, 5), 10.0, 1.0, RecorderConfig::default()).unwrap();
        let err = recorder.record_frame(&water(&[0]), &metrics(1, 1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_sink_keeps_first_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sink.glfa");
        let grid = crate::compute::ElevationGrid::new(4, 3, vec![0.0; 12]).unwrap();
        let wrong = WaterState::dry(2, 2);

        let mut recorder =
            AnimationRecorder::create(&path, (4, 3), 10.0, 1.0, RecorderConfig::default()).unwrap();
        let snapshot = FrameSnapshot {
            frame: 1,
            grid: &grid,
            water: &wrong,
            threshold: 10.0,
        };
        recorder.present(&snapshot, &metrics(1, 0));
        assert!(recorder.error().is_some());

        let good = water(&[1]);
        let snapshot = FrameSnapshot {
            water: &good,
            ..snapshot
        };
        recorder.present(&snapshot, &metrics(2, 1));
        assert_eq!(recorder.frames_written(), 0);
        assert!(recorder.finalize().is_err());
    }
}
