//! Animation controller - session state machine driving the flood engine.
//!
//! The controller owns one session at a time. It never sleeps: an external
//! driver (CLI loop, UI event loop, test) calls [`AnimationController::tick`]
//! and applies [`AnimationController::frame_delay`] between ticks.

use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::schema::SimulationConfig;

use super::{
    ElevationGrid, FloodEngine, FrameSink, FrameSnapshot, MetricsFrame, SimError, WaterState,
    flood_threshold, prepare_grid, seed_water,
};

/// Lifecycle of a simulation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// No session; `initialize` required.
    Idle,
    /// Seeded at frame 0, not yet started.
    Ready,
    /// Advancing on every tick.
    Running,
    /// Halted; resumable from the current frame.
    Stopped,
    /// A tick failed. Terminal until reset.
    Failed,
}

/// Mutable state of one session.
#[derive(Debug, Clone)]
pub struct SimulationState {
    /// Frames advanced so far (0 right after seeding).
    pub frame: u64,
    /// Current water state.
    pub water: WaterState,
    /// Metrics in frame order, one per advanced frame.
    pub history: Vec<MetricsFrame>,
}

impl SimulationState {
    fn seeded(water: WaterState) -> Self {
        Self {
            frame: 0,
            water,
            history: Vec::new(),
        }
    }

    /// Metrics of the most recent frame.
    pub fn latest_metrics(&self) -> Option<&MetricsFrame> {
        self.history.last()
    }
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// A frame was advanced and committed.
    Advanced(MetricsFrame),
    /// Nothing happened because the session is not running.
    Halted(SessionStatus),
}

/// Prepared inputs plus the evolving state.
struct Session {
    grid: ElevationGrid,
    engine: FloodEngine,
    state: SimulationState,
}

impl Session {
    /// Compute the next frame without touching committed state.
    fn next_frame(
        &mut self,
        config: &SimulationConfig,
    ) -> Result<(WaterState, MetricsFrame), SimError> {
        let mut water = self.state.water.clone();
        let previous = self.engine.advance(&mut water, config.flow_speed)?;
        let metrics = MetricsFrame::compute(
            self.state.frame + 1,
            &previous,
            &water,
            &self.grid,
            self.engine.threshold(),
            config.cell_area(),
            config.flow_speed,
        )?;
        Ok((water, metrics))
    }

    fn commit(&mut self, water: WaterState, metrics: MetricsFrame) {
        self.state.water = water;
        self.state.frame = metrics.frame;
        self.state.history.push(metrics);
    }

    fn snapshot(&self) -> FrameSnapshot<'_> {
        FrameSnapshot {
            frame: self.state.frame,
            grid: &self.grid,
            water: &self.state.water,
            threshold: self.engine.threshold(),
        }
    }
}

/// Sequences frames for one simulation session.
pub struct AnimationController {
    config: SimulationConfig,
    status: SessionStatus,
    session: Option<Session>,
    last_error: Option<SimError>,
}

impl AnimationController {
    /// Create an idle controller. Fails with a config error on invalid options.
    pub fn new(config: SimulationConfig) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self {
            config,
            status: SessionStatus::Idle,
            session: None,
            last_error: None,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Error that moved the session into `Failed`.
    pub fn last_error(&self) -> Option<&SimError> {
        self.last_error.as_ref()
    }

    /// Current session state, if initialized.
    pub fn state(&self) -> Option<&SimulationState> {
        self.session.as_ref().map(|s| &s.state)
    }

    /// Prepared elevation grid, if initialized.
    pub fn grid(&self) -> Option<&ElevationGrid> {
        self.session.as_ref().map(|s| &s.grid)
    }

    /// Flood elevation, if initialized.
    pub fn threshold(&self) -> Option<f64> {
        self.session.as_ref().map(|s| s.engine.threshold())
    }

    /// Metrics history of the current session (empty when idle).
    pub fn history(&self) -> &[MetricsFrame] {
        self.state()
            .map(|s| s.history.as_slice())
            .unwrap_or_default()
    }

    /// Snapshot of the latest committed frame, if initialized.
    pub fn snapshot(&self) -> Option<FrameSnapshot<'_>> {
        self.session.as_ref().map(Session::snapshot)
    }

    /// Delay the driver should wait between ticks.
    pub fn frame_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.config.frame_delay).unwrap_or(Duration::MAX)
    }

    /// Prepare the raw grid, compute the threshold and seed frame 0.
    ///
    /// `Idle -> Ready`. On failure the controller stays idle.
    pub fn initialize(&mut self, raw: &ElevationGrid) -> Result<&SimulationState, SimError> {
        self.require(SessionStatus::Idle, "initialize")?;

        let config = &self.config;
        let grid = prepare_grid(raw, config.downscale_factor, config.smoothing_sigma)?;
        let threshold = flood_threshold(&grid, config.water_level_percent)?;
        let water = seed_water(&grid, threshold, config.seed_policy)?;
        let engine = FloodEngine::new(&grid, threshold)?;

        info!(
            "Session initialized: {}x{} grid (from {}x{}), threshold {:.3}, {} flooded, {} source cells",
            grid.width(),
            grid.height(),
            raw.width(),
            raw.height(),
            threshold,
            water.flooded_count(),
            water.source_count()
        );

        self.status = SessionStatus::Ready;
        let session = self.session.insert(Session {
            grid,
            engine,
            state: SimulationState::seeded(water),
        });
        Ok(&session.state)
    }

    /// `Ready -> Running`.
    pub fn start(&mut self) -> Result<(), SimError> {
        self.transition(SessionStatus::Ready, SessionStatus::Running, "start")
    }

    /// `Running -> Stopped`. Frame index, water state and history are kept.
    pub fn stop(&mut self) -> Result<(), SimError> {
        self.transition(SessionStatus::Running, SessionStatus::Stopped, "stop")
    }

    /// `Stopped -> Running`, continuing from the current frame.
    pub fn resume(&mut self) -> Result<(), SimError> {
        self.transition(SessionStatus::Stopped, SessionStatus::Running, "resume")
    }

    /// Discard the session and return to `Idle` from any status.
    pub fn reset(&mut self) {
        if self.session.is_some() {
            info!("Session reset at frame {}", self.state().map_or(0, |s| s.frame));
        }
        self.session = None;
        self.last_error = None;
        self.status = SessionStatus::Idle;
    }

    /// Advance one frame if running.
    ///
    /// The frame is computed in full before it is committed. On failure the
    /// session moves to `Failed`, committed frames stay intact and the error
    /// is returned. After a commit the snapshot is handed to `sink`; reaching
    /// `max_frames` moves the session to `Stopped`.
    pub fn tick<S: FrameSink + ?Sized>(&mut self, sink: &mut S) -> Result<TickOutcome, SimError> {
        if self.status != SessionStatus::Running {
            return Ok(TickOutcome::Halted(self.status));
        }
        let Some(session) = self.session.as_mut() else {
            return Ok(TickOutcome::Halted(self.status));
        };

        let (water, metrics) = match session.next_frame(&self.config) {
            Ok(next) => next,
            Err(err) => {
                warn!(
                    "Frame {} failed ({}): {}",
                    session.state.frame + 1,
                    err.kind(),
                    err
                );
                self.status = SessionStatus::Failed;
                self.last_error = Some(err.clone());
                return Err(err);
            }
        };

        session.commit(water, metrics);
        sink.present(&session.snapshot(), &metrics);

        if let Some(max_frames) = self.config.max_frames
            && metrics.frame >= max_frames
        {
            info!("Reached {} frames, stopping", max_frames);
            self.status = SessionStatus::Stopped;
        }

        Ok(TickOutcome::Advanced(metrics))
    }

    /// Tick until the session halts or `frames` frames have advanced.
    ///
    /// Does not sleep. Returns the number of frames advanced.
    pub fn run_frames<S: FrameSink + ?Sized>(
        &mut self,
        sink: &mut S,
        frames: u64,
    ) -> Result<u64, SimError> {
        let mut advanced = 0;
        while advanced < frames {
            match self.tick(sink)? {
                TickOutcome::Advanced(_) => advanced += 1,
                TickOutcome::Halted(_) => break,
            }
        }
        Ok(advanced)
    }

    fn require(&self, expected: SessionStatus, command: &'static str) -> Result<(), SimError> {
        if self.status != expected {
            return Err(SimError::InvalidTransition {
                from: self.status,
                command,
            });
        }
        Ok(())
    }

    fn transition(
        &mut self,
        from: SessionStatus,
        to: SessionStatus,
        command: &'static str,
    ) -> Result<(), SimError> {
        self.require(from, command)?;
        info!(
            "Session {:?} -> {:?} at frame {}",
            from,
            to,
            self.state().map_or(0, |s| s.frame)
        );
        self.status = to;
        Ok(())
    }

    /// Force a tick failure, for exercising the `Failed` path.
    #[cfg(test)]
    fn corrupt_water_shape(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.state.water = WaterState::dry(1, 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{MetricsLog, NullSink, ShapeError};
    use crate::schema::{ConfigError, SeedPolicy};

    fn bowl() -> ElevationGrid {
        ElevationGrid::from_rows(vec![
            vec![10.0, 10.0, 10.0],
            vec![10.0, 1.0, 10.0],
            vec![10.0, 10.0, 10.0],
        ])
        .unwrap()
    }

    fn raw_config(downscale_factor: usize) -> SimulationConfig {
        SimulationConfig {
            downscale_factor,
            water_level_percent: 90,
            flow_speed: 1,
            frame_delay: 0.0,
            smoothing_sigma: 0.0,
            seed_policy: SeedPolicy::Source,
            max_frames: None,
        }
    }

    /// Valley sloping down to the right with a lake basin on the left.
    fn valley(width: usize, height: usize) -> ElevationGrid {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let across = (y as f64 - height as f64 / 2.0).abs();
                data.push(100.0 - x as f64 + across * 3.0);
            }
        }
        ElevationGrid::new(width, height, data).unwrap()
    }

    #[test]
    fn test_bowl_scenario_end_to_end() {
        let mut controller = AnimationController::new(raw_config(1)).unwrap();

        let state = controller.initialize(&bowl()).unwrap();
        assert_eq!(state.frame, 0);
        assert_eq!(state.water.flooded_count(), 8);
        assert!(!state.water.is_flooded(1, 1));
        assert_eq!(controller.threshold(), Some(10.0));
        assert_eq!(controller.status(), SessionStatus::Ready);

        controller.start().unwrap();
        let mut sink = MetricsLog::new();
        let outcome = controller.tick(&mut sink).unwrap();

        let TickOutcome::Advanced(metrics) = outcome else {
            panic!("expected an advanced frame, got {:?}", outcome);
        };
        assert_eq!(metrics.frame, 1);
        assert_eq!(metrics.flooded_cells, 9);
        assert_eq!(metrics.coverage_area, 9.0);
        assert_eq!(metrics.max_depth, 9.0);
        assert_eq!(sink.frames(), &[metrics]);

        let state = controller.state().unwrap();
        assert_eq!(state.frame, 1);
        assert_eq!(state.water.flooded_count(), 9);
    }

    #[test]
    fn test_coverage_scales_with_downscale_factor() {
        // 6x6 bowl decimated by 2 gives the 3x3 bowl.
        let mut rows = vec![vec![10.0; 6]; 6];
        rows[2][2] = 1.0;
        let raw = ElevationGrid::from_rows(rows).unwrap();

        let mut controller = AnimationController::new(raw_config(2)).unwrap();
        controller.initialize(&raw).unwrap();
        assert_eq!(controller.grid().unwrap().dims(), (3, 3));

        controller.start().unwrap();
        controller.tick(&mut NullSink).unwrap();

        let metrics = controller.history()[0];
        assert_eq!(metrics.flooded_cells, 9);
        assert_eq!(metrics.coverage_area, 9.0 * 4.0);
    }

    #[test]
    fn test_history_is_ordered_and_growth_monotonic() {
        let config = SimulationConfig {
            water_level_percent: 60,
            smoothing_sigma: 1.0,
            ..raw_config(1)
        };
        let mut controller = AnimationController::new(config).unwrap();
        controller.initialize(&valley(40, 15)).unwrap();
        controller.start().unwrap();

        let mut sink = MetricsLog::new();
        assert_eq!(controller.run_frames(&mut sink, 30).unwrap(), 30);

        let history = controller.history();
        assert_eq!(history.len(), 30);
        assert_eq!(sink.frames(), history);
        for (i, m) in history.iter().enumerate() {
            assert_eq!(m.frame, i as u64 + 1);
            assert!(m.max_depth >= 0.0);
        }
        for pair in history.windows(2) {
            assert!(pair[1].flooded_cells >= pair[0].flooded_cells);
        }
    }

    #[test]
    fn test_stop_and_resume_preserve_state() {
        let mut controller = AnimationController::new(raw_config(1)).unwrap();
        controller.initialize(&valley(20, 9)).unwrap();
        controller.start().unwrap();
        controller.run_frames(&mut NullSink, 3).unwrap();

        controller.stop().unwrap();
        let frozen = controller.state().unwrap().clone();

        assert_eq!(
            controller.tick(&mut NullSink).unwrap(),
            TickOutcome::Halted(SessionStatus::Stopped)
        );
        assert_eq!(controller.state().unwrap().frame, frozen.frame);
        assert_eq!(controller.state().unwrap().water, frozen.water);

        controller.resume().unwrap();
        controller.tick(&mut NullSink).unwrap();
        assert_eq!(controller.state().unwrap().frame, 4);
        assert_eq!(controller.history().len(), 4);
    }

    #[test]
    fn test_reset_discards_session() {
        let mut controller = AnimationController::new(raw_config(1)).unwrap();
        controller.initialize(&bowl()).unwrap();
        controller.start().unwrap();
        controller.tick(&mut NullSink).unwrap();

        controller.reset();

        assert_eq!(controller.status(), SessionStatus::Idle);
        assert!(controller.state().is_none());
        assert!(controller.history().is_empty());
        assert!(matches!(
            controller.start(),
            Err(SimError::InvalidTransition { .. })
        ));
        controller.initialize(&bowl()).unwrap();
        assert_eq!(controller.state().unwrap().frame, 0);
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut controller = AnimationController::new(raw_config(1)).unwrap();
        assert_eq!(
            controller.stop(),
            Err(SimError::InvalidTransition {
                from: SessionStatus::Idle,
                command: "stop"
            })
        );
        assert_eq!(
            controller.tick(&mut NullSink).unwrap(),
            TickOutcome::Halted(SessionStatus::Idle)
        );

        controller.initialize(&bowl()).unwrap();
        assert!(controller.resume().is_err());
        assert!(controller.initialize(&bowl()).is_err());
        assert_eq!(controller.status(), SessionStatus::Ready);
    }

    #[test]
    fn test_max_frames_stops_session() {
        let config = SimulationConfig {
            max_frames: Some(2),
            ..raw_config(1)
        };
        let mut controller = AnimationController::new(config).unwrap();
        controller.initialize(&valley(10, 5)).unwrap();
        controller.start().unwrap();

        let advanced = controller.run_frames(&mut NullSink, 10).unwrap();

        assert_eq!(advanced, 2);
        assert_eq!(controller.status(), SessionStatus::Stopped);
    }

    #[test]
    fn test_init_errors_keep_controller_idle() {
        let mut controller = AnimationController::new(raw_config(1)).unwrap();

        let empty = ElevationGrid::new(0, 0, vec![]).unwrap();
        assert!(matches!(
            controller.initialize(&empty),
            Err(SimError::Data(_))
        ));

        let undefined = ElevationGrid::new(2, 2, vec![f64::NAN; 4]).unwrap();
        assert!(matches!(
            controller.initialize(&undefined),
            Err(SimError::Data(_))
        ));
        assert_eq!(controller.status(), SessionStatus::Idle);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SimulationConfig {
            flow_speed: 0,
            ..raw_config(1)
        };
        assert_eq!(
            AnimationController::new(config).err(),
            Some(SimError::Config(ConfigError::InvalidFlowSpeed(0)))
        );
    }

    #[test]
    fn test_tick_failure_is_terminal_and_keeps_history() {
        let mut controller = AnimationController::new(raw_config(1)).unwrap();
        controller.initialize(&valley(12, 6)).unwrap();
        controller.start().unwrap();
        controller.run_frames(&mut NullSink, 2).unwrap();

        controller.corrupt_water_shape();
        let err = controller.tick(&mut NullSink).unwrap_err();

        assert_eq!(
            err,
            SimError::Shape(ShapeError {
                expected: (12, 6),
                found: (1, 1)
            })
        );
        assert_eq!(controller.status(), SessionStatus::Failed);
        assert_eq!(controller.last_error(), Some(&err));
        assert_eq!(controller.history().len(), 2);
        assert_eq!(
            controller.tick(&mut NullSink).unwrap(),
            TickOutcome::Halted(SessionStatus::Failed)
        );
        assert!(controller.resume().is_err());

        controller.reset();
        assert!(controller.last_error().is_none());
    }

    #[test]
    fn test_frame_delay() {
        let config = SimulationConfig {
            frame_delay: 0.25,
            ..raw_config(1)
        };
        let controller = AnimationController::new(config).unwrap();
        assert_eq!(controller.frame_delay(), Duration::from_millis(250));
    }
}
