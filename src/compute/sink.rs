//! Renderer / metrics sink seam.

use log::debug;

use super::{ElevationGrid, MetricsFrame, MetricsSummary, WaterState};

/// Read-only view of one committed frame, handed to sinks after each tick.
#[derive(Debug, Clone, Copy)]
pub struct FrameSnapshot<'a> {
    /// Frame index (1 for the first advance).
    pub frame: u64,
    /// Prepared elevation grid.
    pub grid: &'a ElevationGrid,
    /// Water state after this frame.
    pub water: &'a WaterState,
    /// Flood elevation of the session.
    pub threshold: f64,
}

/// Consumer of committed frames.
///
/// Called once per tick, in frame order, after the frame is committed. Sinks
/// must not block beyond their own work; pacing is the driver's job.
pub trait FrameSink {
    fn present(&mut self, snapshot: &FrameSnapshot<'_>, metrics: &MetricsFrame);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _snapshot: &FrameSnapshot<'_>, _metrics: &MetricsFrame) {}
}

/// Sink that keeps every metrics frame and logs it at debug level.
#[derive(Debug, Default, Clone)]
pub struct MetricsLog {
    frames: Vec<MetricsFrame>,
}

impl MetricsLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames received so far, in arrival order.
    pub fn frames(&self) -> &[MetricsFrame] {
        &self.frames
    }

    /// Summary of the frames received so far.
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary::from_history(&self.frames)
    }

    /// Serialize the received frames as a pretty JSON array.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.frames)
    }
}

impl FrameSink for MetricsLog {
    fn present(&mut self, snapshot: &FrameSnapshot<'_>, metrics: &MetricsFrame) {
        debug!(
            "frame {}: coverage={:.1} volume={:.1} max_depth={:.2} velocity={:.4}",
            snapshot.frame,
            metrics.coverage_area,
            metrics.volume,
            metrics.max_depth,
            metrics.velocity_estimate
        );
        self.frames.push(*metrics);
    }
}
