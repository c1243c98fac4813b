//! Binary format definitions for flood animation files.

use std::io::{self, Read, Write};

use crate::compute::MetricsFrame;

/// Magic bytes identifying a flood animation file.
pub const ANIMATION_MAGIC: &[u8; 4] = b"GLFA";

/// Current format version.
pub const ANIMATION_VERSION: u16 = 1;

/// Compression type for frame data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CompressionType {
    /// No compression (raw bit planes).
    #[default]
    None = 0,
    /// LZ4 fast compression.
    Lz4 = 1,
}

impl CompressionType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Lz4),
            _ => None,
        }
    }
}

/// File header for the flood animation format.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationHeader {
    /// Grid width.
    pub width: u32,
    /// Grid height.
    pub height: u32,
    /// Total number of frames.
    pub frame_count: u64,
    /// Flood elevation of the recorded session.
    pub threshold: f64,
    /// Area of one prepared cell.
    pub cell_area: f64,
    /// Frame compression.
    pub compression: CompressionType,
}

impl AnimationHeader {
    /// Size of header in bytes.
    /// Magic(4) + Version(2) + Flags(2) + Width(4) + Height(4) +
    /// FrameCount(8) + Threshold(8) + CellArea(8) + Reserved(8) = 48
    pub const SIZE: usize = 48;

    /// Bytes of one bit-packed mask plane.
    pub fn plane_size(&self) -> usize {
        (self.width as usize * self.height as usize).div_ceil(8)
    }

    /// Size of one uncompressed frame in bytes: metrics block plus the
    /// flooded and source planes.
    pub fn frame_size(&self) -> usize {
        METRICS_SIZE + 2 * self.plane_size()
    }

    /// Largest size a stored frame can legitimately take on disk.
    pub fn max_stored_frame_size(&self) -> usize {
        let raw = self.frame_size();
        match self.compression {
            CompressionType::None => raw,
            // LZ4 worst case on incompressible input, plus the size prefix.
            CompressionType::Lz4 => raw + raw / 255 + 16 + 4,
        }
    }

    /// Serialize the header.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(ANIMATION_MAGIC)?;
        w.write_all(&ANIMATION_VERSION.to_le_bytes())?;
        w.write_all(&(self.compression as u16).to_le_bytes())?;
        for dim in [self.width, self.height] {
            w.write_all(&dim.to_le_bytes())?;
        }
        w.write_all(&self.frame_count.to_le_bytes())?;
        for value in [self.threshold, self.cell_area] {
            w.write_all(&value.to_le_bytes())?;
        }
        w.write_all(&[0u8; 8])
    }

    /// Parse and check a header.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let magic: [u8; 4] = read_array(r)?;
        if &magic != ANIMATION_MAGIC {
            return Err(invalid_data("Not a GLFA recording (bad magic)".to_string()));
        }

        let version = u16::from_le_bytes(read_array(r)?);
        if version != ANIMATION_VERSION {
            return Err(invalid_data(format!("GLFA version {} is not supported", version)));
        }

        let flags = u16::from_le_bytes(read_array(r)?);
        let compression = CompressionType::from_u8((flags & 0x0F) as u8)
            .ok_or_else(|| invalid_data(format!("Unknown compression {}", flags & 0x0F)))?;

        let width = u32::from_le_bytes(read_array(r)?);
        let height = u32::from_le_bytes(read_array(r)?);
        let frame_count = u64::from_le_bytes(read_array(r)?);
        let threshold = f64::from_le_bytes(read_array(r)?);
        let cell_area = f64::from_le_bytes(read_array(r)?);
        let _reserved: [u8; 8] = read_array(r)?;

        Ok(Self {
            width,
            height,
            frame_count,
            threshold,
            cell_area,
            compression,
        })
    }
}

fn read_array<R: Read, const N: usize>(r: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

pub(crate) fn invalid_data(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Index entry for a single frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameIndex {
    /// Byte offset from start of file.
    pub offset: u64,
    /// Stored size in bytes (equals uncompressed if no compression).
    pub size: u64,
}

impl FrameIndex {
    /// Size of one index entry in bytes.
    pub const SIZE: usize = 16;

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.offset.to_le_bytes())?;
        w.write_all(&self.size.to_le_bytes())
    }

    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        Ok(Self {
            offset: u64::from_le_bytes(read_array(r)?),
            size: u64::from_le_bytes(read_array(r)?),
        })
    }
}

/// Bytes of the per-frame metrics block:
/// frame(8) + flooded(8) + changed(8) + coverage(8) + volume(8) + max_depth(8) + velocity(8).
pub const METRICS_SIZE: usize = 56;

/// Encode a metrics frame.
pub fn encode_metrics(metrics: &MetricsFrame, out: &mut Vec<u8>) {
    out.extend_from_slice(&metrics.frame.to_le_bytes());
    out.extend_from_slice(&(metrics.flooded_cells as u64).to_le_bytes());
    out.extend_from_slice(&(metrics.changed_cells as u64).to_le_bytes());
    out.extend_from_slice(&metrics.coverage_area.to_le_bytes());
    out.extend_from_slice(&metrics.volume.to_le_bytes());
    out.extend_from_slice(&metrics.max_depth.to_le_bytes());
    out.extend_from_slice(&metrics.velocity_estimate.to_le_bytes());
}

/// Decode a metrics frame from exactly [`METRICS_SIZE`] bytes.
pub fn decode_metrics(bytes: &[u8]) -> io::Result<MetricsFrame> {
    if bytes.len() != METRICS_SIZE {
        return Err(invalid_data(format!(
            "Metrics block is {} bytes, expected {}",
            bytes.len(),
            METRICS_SIZE
        )));
    }
    let word = |i: usize| {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[i * 8..(i + 1) * 8]);
        buf
    };
    Ok(MetricsFrame {
        frame: u64::from_le_bytes(word(0)),
        flooded_cells: u64::from_le_bytes(word(1)) as usize,
        changed_cells: u64::from_le_bytes(word(2)) as usize,
        coverage_area: f64::from_le_bytes(word(3)),
        volume: f64::from_le_bytes(word(4)),
        max_depth: f64::from_le_bytes(word(5)),
        velocity_estimate: f64::from_le_bytes(word(6)),
    })
}

/// Pack a boolean mask into bits, least significant bit first.
pub fn pack_mask(mask: &[bool], out: &mut Vec<u8>) {
    for chunk in mask.chunks(8) {
        let mut byte = 0u8;
        for (bit, &set) in chunk.iter().enumerate() {
            if set {
                byte |= 1 << bit;
            }
        }
        out.push(byte);
    }
}

/// Unpack bits into a boolean mask of `output.len()` cells.
pub fn unpack_mask(bytes: &[u8], output: &mut [bool]) -> io::Result<()> {
    if bytes.len() != output.len().div_ceil(8) {
        return Err(invalid_data(format!(
            "Mask of {} bytes cannot hold {} cells",
            bytes.len(),
            output.len()
        )));
    }
    for (i, cell) in output.iter_mut().enumerate() {
        *cell = bytes[i / 8] & (1 << (i % 8)) != 0;
    }
    Ok(())
}

/// LZ4 block with the uncompressed size prepended.
#[cfg(feature = "lz4")]
pub fn compress_lz4(frame: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(frame)
}

#[cfg(feature = "lz4")]
pub fn decompress_lz4(stored: &[u8]) -> io::Result<Vec<u8>> {
    lz4_flex::decompress_size_prepended(stored).map_err(|e| invalid_data(e.to_string()))
}

/// Without the `lz4` feature frames are stored as-is even when the header
/// asks for LZ4, and read back the same way.
#[cfg(not(feature = "lz4"))]
pub fn compress_lz4(frame: &[u8]) -> Vec<u8> {
    frame.to_vec()
}

#[cfg(not(feature = "lz4"))]
pub fn decompress_lz4(stored: &[u8]) -> io::Result<Vec<u8>> {
    Ok(stored.to_vec())
}
