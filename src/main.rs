//! GLOF Sim CLI - Run flood sessions from JSON configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;

use glof_sim::{
    animation::{AnimationRecorder, RecorderConfig},
    compute::{
        AnimationController, ElevationGrid, FrameSink, FrameSnapshot, MetricsFrame, MetricsLog,
        TickOutcome,
    },
    io::read_ascii_grid,
    schema::{SimulationConfig, Terrain},
};

struct Args {
    config_path: PathBuf,
    frames: u64,
    dem: Option<PathBuf>,
    record: Option<PathBuf>,
    metrics: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example_config();
        return;
    }

    let args = parse_args(&args).unwrap_or_else(|msg| {
        if let Some(msg) = msg {
            eprintln!("Error: {}", msg);
            eprintln!();
        }
        print_usage(args.first().map_or("glof-sim", String::as_str));
        std::process::exit(1);
    });

    // Load configuration
    let config_str = fs::read_to_string(&args.config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: SimulationConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    let dem = load_dem(&args);

    println!("GLOF Flood Simulation");
    println!("=====================");
    println!("DEM: {}x{} ({} defined cells)", dem.width(), dem.height(), dem.defined_count());
    println!("Downscale: {}x", config.downscale_factor);
    println!("Water level: {}th percentile", config.water_level_percent);
    println!("Flow speed: {} rings/frame", config.flow_speed);
    println!("Frames: {}", args.frames);
    println!();

    let mut controller = AnimationController::new(config).unwrap_or_else(|e| {
        eprintln!("Invalid config: {}", e);
        std::process::exit(1);
    });

    let initial = controller.initialize(&dem).unwrap_or_else(|e| {
        eprintln!("Error initializing session: {}", e);
        std::process::exit(1);
    });
    let initial_flooded = initial.water.flooded_count();
    let initial_sources = initial.water.source_count();

    let (Some(grid), Some(threshold)) = (controller.grid(), controller.threshold()) else {
        eprintln!("Session has no prepared grid");
        std::process::exit(1);
    };
    let (width, height) = grid.dims();

    println!("Initial state:");
    println!("  Prepared grid: {}x{}", width, height);
    println!("  Threshold: {:.3}", threshold);
    println!("  Flooded cells: {}", initial_flooded);
    println!("  Source cells: {}", initial_sources);
    println!();

    let mut recorder = args.record.as_ref().map(|path| {
        AnimationRecorder::create(
            path,
            (width, height),
            threshold,
            controller.config().cell_area(),
            RecorderConfig::default(),
        )
        .unwrap_or_else(|e| {
            eprintln!("Error creating recording {}: {}", path.display(), e);
            std::process::exit(1);
        })
    });
    let mut log = MetricsLog::new();

    if let Err(e) = controller.start() {
        eprintln!("Error starting session: {}", e);
        std::process::exit(1);
    }

    println!("Running simulation...");
    let start = Instant::now();
    let delay = controller.frame_delay();

    for i in 0..args.frames {
        let mut sinks = Fanout {
            log: &mut log,
            recorder: recorder.as_mut(),
        };
        let metrics = match controller.tick(&mut sinks) {
            Ok(TickOutcome::Advanced(metrics)) => metrics,
            Ok(TickOutcome::Halted(status)) => {
                println!("  Session halted ({:?}) after {} frames", status, i);
                break;
            }
            Err(e) => {
                eprintln!("Frame {} failed: {}", i + 1, e);
                std::process::exit(1);
            }
        };

        // Print progress every 10%
        if (i + 1) % (args.frames / 10).max(1) == 0 {
            println!(
                "  Frame {}/{}: coverage={:.1}, volume={:.1}, max_depth={:.2}, velocity={:.4}",
                metrics.frame,
                args.frames,
                metrics.coverage_area,
                metrics.volume,
                metrics.max_depth,
                metrics.velocity_estimate
            );
        }

        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }

    let elapsed = start.elapsed();
    let summary = log.summary();

    println!();
    println!("Final state:");
    println!("  Coverage area: {:.1}", summary.final_coverage_area);
    println!("  Volume: {:.1}", summary.final_volume);
    println!("  Peak max depth: {:.2}", summary.peak_max_depth);
    println!(
        "  Velocity: peak {:.4}, mean {:.4}",
        summary.peak_velocity, summary.mean_velocity
    );
    println!(
        "Time: {:.2}s ({} frames)",
        elapsed.as_secs_f32(),
        summary.frames
    );

    if let Some(recorder) = recorder {
        match recorder.finalize() {
            Ok(stats) => println!("Recording: {}", stats),
            Err(e) => {
                eprintln!("Error finalizing recording: {}", e);
                std::process::exit(1);
            }
        }
    }

    if let Some(path) = &args.metrics {
        let written = log
            .to_json()
            .map_err(|e| e.to_string())
            .and_then(|json| fs::write(path, json).map_err(|e| e.to_string()));
        if let Err(e) = written {
            eprintln!("Error writing metrics {}: {}", path.display(), e);
            std::process::exit(1);
        }
        println!("Metrics: {}", path.display());
    }
}

/// Hands each frame to the metrics log and, if enabled, the recorder.
struct Fanout<'a> {
    log: &'a mut MetricsLog,
    recorder: Option<&'a mut AnimationRecorder>,
}

impl FrameSink for Fanout<'_> {
    fn present(&mut self, snapshot: &FrameSnapshot<'_>, metrics: &MetricsFrame) {
        self.log.present(snapshot, metrics);
        if let Some(recorder) = self.recorder.as_deref_mut() {
            recorder.present(snapshot, metrics);
        }
    }
}

/// `Err(None)` asks for usage only.
fn parse_args(args: &[String]) -> Result<Args, Option<String>> {
    let mut positional = Vec::new();
    let mut dem = None;
    let mut record = None;
    let mut metrics = None;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let slot = match arg.as_str() {
            "--dem" => &mut dem,
            "--record" => &mut record,
            "--metrics" => &mut metrics,
            "-h" | "--help" => return Err(None),
            flag if flag.starts_with("--") => return Err(Some(format!("unknown option {}", flag))),
            _ => {
                positional.push(arg);
                continue;
            }
        };
        let value = iter
            .next()
            .ok_or_else(|| Some(format!("{} needs a path", arg)))?;
        *slot = Some(PathBuf::from(value));
    }

    let config_path = match positional.first() {
        Some(path) => PathBuf::from(path),
        None => return Err(None),
    };
    let frames = match positional.get(1) {
        Some(s) => s
            .parse()
            .map_err(|_| Some(format!("invalid frame count {}", s)))?,
        None => 50,
    };
    if positional.len() > 2 {
        return Err(Some(format!("unexpected argument {}", positional[2])));
    }

    Ok(Args {
        config_path,
        frames,
        dem,
        record,
        metrics,
    })
}

/// DEM from `--dem`, else `<config>.terrain.json`, else the default valley.
fn load_dem(args: &Args) -> ElevationGrid {
    if let Some(path) = &args.dem {
        let raster = read_ascii_grid(path).unwrap_or_else(|e| {
            eprintln!("Error reading DEM {}: {}", path.display(), e);
            std::process::exit(1);
        });
        return raster.grid;
    }

    let terrain_path = args.config_path.with_extension("terrain.json");
    let terrain = if terrain_path.exists() {
        read_terrain(&terrain_path)
    } else {
        Terrain::default()
    };
    terrain.generate().unwrap_or_else(|e| {
        eprintln!("Error generating terrain: {}", e);
        std::process::exit(1);
    })
}

fn read_terrain(path: &Path) -> Terrain {
    let terrain_str = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading terrain file: {}", e);
        std::process::exit(1);
    });
    serde_json::from_str(&terrain_str).unwrap_or_else(|e| {
        eprintln!("Error parsing terrain: {}", e);
        std::process::exit(1);
    })
}

fn print_usage(program: &str) {
    eprintln!(
        "Usage: {} <config.json> [frames] [--dem <file.asc>] [--record <out.glfa>] [--metrics <out.json>]",
        program
    );
    eprintln!();
    eprintln!("Run a GLOF flood simulation from JSON configuration.");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  config.json  Path to simulation configuration file");
    eprintln!("  frames       Number of frames to advance (default: 50)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --dem        ESRI ASCII DEM (default: <config>.terrain.json or a synthetic valley)");
    eprintln!("  --record     Write a .glfa recording of every frame");
    eprintln!("  --metrics    Write per-frame metrics as JSON");
    eprintln!();
    eprintln!("Example configuration is generated with --example flag.");
}

fn print_example_config() {
    let config = serde_json::to_string_pretty(&SimulationConfig::default());
    let terrain = serde_json::to_string_pretty(&Terrain::default());
    match (config, terrain) {
        (Ok(config), Ok(terrain)) => {
            println!("Example configuration (config.json):");
            println!("{}", config);
            println!();
            println!("Example terrain (config.terrain.json):");
            println!("{}", terrain);
        }
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Error serializing example: {}", e);
            std::process::exit(1);
        }
    }
}
