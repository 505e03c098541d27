use anyhow::{Context, Result};
use clap::Parser;
use excam::{
    ActionState, AutoConfig, ControlEvent, ControlListener, EventFilter, ExcamConfig, FrameData,
    MockDevice, MockRecorder, ParamConfig, PhotoEvent, PhotoListener, RecordEvent,
    RecordListener, RecorderEvent, SessionControllerBuilder, SessionError, SessionEvent, UsbState,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "excam")]
#[command(about = "Camera session controller driven by a simulated USB camera")]
#[command(version)]
#[command(long_about = "Runs the excam session controller against a simulated camera: \
starts preview, takes photos into the configured output directory, records a short clip \
and prints every listener callback.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, help = "Path to TOML configuration file")]
    config: Option<String>,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Number of photos to take
    #[arg(long, default_value_t = 2)]
    photos: u32,

    /// Length of the recorded clip in seconds (0 skips recording)
    #[arg(long, default_value_t = 2)]
    record_seconds: u32,

    /// Simulated preview frame rate
    #[arg(long, default_value_t = 15)]
    frame_rate: u32,

    /// Print listener callbacks as JSON lines
    #[arg(long)]
    json_events: bool,

    /// Include every preview frame in the printed callbacks
    #[arg(long)]
    show_frames: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting excam v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => ExcamConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => ExcamConfig::load().context("Failed to load configuration")?,
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    run_simulation(&args, config).await
}

async fn run_simulation(args: &Args, config: ExcamConfig) -> Result<()> {
    let (width, height) = config.camera.resolution;
    let device = Arc::new(
        MockDevice::new()
            .with_param(ParamConfig::new("brightness", 0, 255, 128))
            .with_param(ParamConfig::new("contrast", 0, 100, 50))
            .with_param(ParamConfig::new("zoom", 100, 500, 100))
            .with_auto(AutoConfig {
                tag: "auto_exposure".to_string(),
                default: true,
            }),
    );
    let recorder = Arc::new(MockRecorder::new());

    let (controller, pump) = SessionControllerBuilder::new()
        .config(config)
        .device(device.clone())
        .recorder(recorder.clone())
        .build()
        .context("Failed to build session controller")?;

    let filter = if args.show_frames {
        EventFilter::All
    } else {
        EventFilter::Exclude(vec!["load_frame", "usb_state_update"])
    };
    let printer = Arc::new(EventPrinter::new(args.json_events, filter));
    controller.set_control_listener(Some(printer.clone()));
    controller.set_photo_listener(Some(printer.clone()));
    controller.set_record_listener(Some(printer.clone()));

    let consumer = std::thread::Builder::new()
        .name("excam-events".to_string())
        .spawn(move || pump.run())
        .context("Failed to spawn event consumer")?;

    let shutdown = CancellationToken::new();
    let frames = tokio::spawn(push_frames(
        device.clone(),
        width,
        height,
        args.frame_rate,
        shutdown.clone(),
    ));

    device.attach();
    controller.set_param_percent("brightness", 60);
    controller.start();

    let scenario = async {
        tokio::time::sleep(Duration::from_millis(500)).await;

        for _ in 0..args.photos {
            let path = controller.request_photo_auto();
            info!("Requested photo {}", path);
            tokio::time::sleep(Duration::from_millis(400)).await;
        }

        if args.record_seconds > 0 {
            let path = controller.request_record_start_auto();
            info!("Requested recording {}", path);
            for elapsed in 1..=args.record_seconds {
                for _ in 0..args.frame_rate.max(1) {
                    recorder.pull_frame();
                    tokio::time::sleep(Duration::from_millis(1000 / args.frame_rate.max(1) as u64))
                        .await;
                }
                if controller.action_state() == ActionState::Recording {
                    recorder.emit(RecorderEvent::Progress {
                        elapsed_secs: elapsed,
                    });
                }
            }
            controller.request_record_stop();
            info!("Recorder encoded {} frames", recorder.frames_pulled());
        }

        tokio::time::sleep(Duration::from_millis(300)).await;
    };

    tokio::select! {
        _ = scenario => info!("Simulation finished"),
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => warn!("Interrupted, stopping session"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        },
    }

    controller.stop();
    shutdown.cancel();
    if let Err(e) = frames.await {
        warn!("Frame task ended abnormally: {}", e);
    }
    // Let the photo saver finish outstanding writes before the camera goes away
    tokio::time::sleep(Duration::from_millis(200)).await;
    device.detach();
    controller.release();
    drop(controller);

    if consumer.join().is_err() {
        error!("Event consumer panicked");
    }
    printer.summary();
    Ok(())
}

async fn push_frames(
    device: Arc<MockDevice>,
    width: u32,
    height: u32,
    frame_rate: u32,
    shutdown: CancellationToken,
) {
    let period = Duration::from_millis(1000 / frame_rate.max(1) as u64);
    let mut ticks = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticks.tick() => {
                device.push_rgb_frame(width, height);
            }
        }
    }
}

/// Prints every listener callback as text or JSON lines
struct EventPrinter {
    json: bool,
    filter: EventFilter,
    printed: AtomicU64,
    frames: AtomicU64,
}

impl EventPrinter {
    fn new(json: bool, filter: EventFilter) -> Self {
        Self {
            json,
            filter,
            printed: AtomicU64::new(0),
            frames: AtomicU64::new(0),
        }
    }

    fn emit(&self, event: SessionEvent) {
        if !self.filter.matches(&event) {
            return;
        }
        self.printed.fetch_add(1, Ordering::Relaxed);
        if self.json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to serialize {}: {}", event.event_type(), e),
            }
        } else {
            println!("[{}] {}", event.event_type(), event.description());
        }
    }

    fn control(&self, event: ControlEvent) {
        self.emit(SessionEvent::Control(event));
    }

    fn photo(&self, event: PhotoEvent) {
        self.emit(SessionEvent::Photo(event));
    }

    fn record(&self, event: RecordEvent) {
        self.emit(SessionEvent::Record(event));
    }

    fn summary(&self) {
        info!(
            "Printed {} callbacks, {} preview frames delivered",
            self.printed.load(Ordering::Relaxed),
            self.frames.load(Ordering::Relaxed)
        );
    }
}

impl ControlListener for EventPrinter {
    fn on_usb_connect(&self) {
        self.control(ControlEvent::UsbConnect);
    }
    fn on_usb_disconnect(&self) {
        self.control(ControlEvent::UsbDisconnect);
    }
    fn on_camera_open(&self) {
        self.control(ControlEvent::CameraOpen);
    }
    fn on_camera_close(&self) {
        self.control(ControlEvent::CameraClose);
    }
    fn on_preview_start(&self) {
        self.control(ControlEvent::PreviewStart);
    }
    fn on_preview_stop(&self) {
        self.control(ControlEvent::PreviewStop);
    }
    fn on_usb_state_update(&self, state: UsbState) {
        self.control(ControlEvent::UsbStateUpdate { state });
    }
    fn on_action_state_update(&self, state: ActionState) {
        self.control(ControlEvent::ActionStateUpdate { state });
    }
    fn on_load_frame(&self, frame: &FrameData) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.control(ControlEvent::LoadFrame(frame.clone()));
    }
    fn on_load_fps(&self, instant: u32, average: f32) {
        self.control(ControlEvent::LoadFps { instant, average });
    }
}

impl PhotoListener for EventPrinter {
    fn on_take_photo_start(&self) {
        self.photo(PhotoEvent::Start);
    }
    fn on_take_photo_success(&self, path: &str) {
        self.photo(PhotoEvent::Success {
            path: path.to_string(),
        });
    }
    fn on_take_photo_fail(&self, reason: SessionError) {
        self.photo(PhotoEvent::Fail { reason });
    }
    fn on_take_photo_done(&self) {
        self.photo(PhotoEvent::Done);
    }
}

impl RecordListener for EventPrinter {
    fn on_record_start_success(&self) {
        self.record(RecordEvent::StartSuccess);
    }
    fn on_record_start_fail(&self, reason: SessionError) {
        self.record(RecordEvent::StartFail { reason });
    }
    fn on_record_progress(&self, elapsed_secs: u32) {
        self.record(RecordEvent::Progress { elapsed_secs });
    }
    fn on_record_success(&self, path: &str) {
        self.record(RecordEvent::Success {
            path: path.to_string(),
        });
    }
    fn on_record_fail(&self, reason: SessionError) {
        self.record(RecordEvent::Fail { reason });
    }
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("excam={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("pretty") => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some("compact") | None => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer().with_target(true).boxed()
        }
    };

    let (file_layer, guard) = match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "excam.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# excam configuration file");
    println!("# Every option with its default value; EXCAM_<SECTION>__<KEY> overrides");
    println!();
    let rendered = toml::to_string_pretty(&ExcamConfig::default())
        .context("Failed to render default configuration")?;
    println!("{}", rendered);
    Ok(())
}
