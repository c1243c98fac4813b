//! Recording and playback of flood sessions.
//!
//! A recording holds the water masks and metrics of each committed frame, so
//! a long run over a large DEM can be replayed or inspected without
//! recomputing it.
//!
//! # File Format
//!
//! The `.glfa` format, all integers little-endian:
//!
//! ```text
//! Header (48 bytes):
//!   Magic: "GLFA" (4 bytes)
//!   Version: u16
//!   Flags: u16 (low nibble: compression)
//!   Width: u32
//!   Height: u32
//!   Frame count: u64
//!   Threshold: f64
//!   Cell area: f64
//!   Reserved: 8 bytes
//!
//! Frame data (variable):
//!   Metrics block (56 bytes): frame, flooded cells, changed cells as u64;
//!     coverage, volume, max depth, velocity as f64
//!   Flooded plane: ceil(width * height / 8) bytes, LSB first
//!   Source plane: same size
//!   Whole frame optionally LZ4 compressed
//!
//! Frame index table (frame_count * 16 bytes, at end of file):
//!   Offset: u64
//!   Stored size: u64
//! ```

mod format;
mod player;
mod recorder;

pub use format::{ANIMATION_MAGIC, ANIMATION_VERSION, AnimationHeader, CompressionType, FrameIndex};
pub use player::{AnimationPlayer, FrameIterator};
pub use recorder::{AnimationRecorder, AnimationStats, RecorderConfig};
