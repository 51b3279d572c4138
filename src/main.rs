use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use ride_recorder_rs::button::{self, ButtonSource, GpiogetButton, SysfsButton};
use ride_recorder_rs::capture::VideoCapture;
use ride_recorder_rs::gps::{GpsSource, SerialGps};
use ride_recorder_rs::imu::{self, ImuCache};
use ride_recorder_rs::led::{StatusLight, SysfsLed};
use ride_recorder_rs::logger;
use ride_recorder_rs::session::SessionController;
use ride_recorder_rs::shutdown::{self, HostShutdown, ShutdownScheduler};
use ride_recorder_rs::state::RecordingState;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(name = "ride_recorder")]
#[command(about = "Button-driven GPS/IMU/video session recorder", long_about = None)]
struct Args {
    /// Directory for per-session artifacts
    #[arg(long, default_value = "/mnt/sdcard")]
    output_dir: PathBuf,

    /// GPS serial device
    #[arg(long, default_value = "/dev/ttyS7")]
    gps_port: PathBuf,

    /// GPS baud rate
    #[arg(long, default_value_t = 9600)]
    gps_baud: u32,

    /// Command that streams inertial JSON records, one per line, on stdout
    #[arg(long, default_value = "imu-feed")]
    imu_command: String,

    /// Video capture helper program
    #[arg(long, default_value = "cam-record")]
    capture_command: String,

    /// Process name pattern used to terminate stale capture instances
    #[arg(long, default_value = "cam-record")]
    capture_process: String,

    /// Button backend
    #[arg(long, value_enum, default_value = "sysfs")]
    button_backend: ButtonBackend,

    /// Button GPIO pin (sysfs backend) or line offset (gpioget backend)
    #[arg(long, default_value_t = 17)]
    button_pin: u32,

    /// GPIO chip name for the gpioget backend
    #[arg(long, default_value = "gpiochip0")]
    button_chip: String,

    /// Recording indicator LED pin
    #[arg(long, default_value_t = 27)]
    record_led_pin: u32,

    /// Power/status LED pin
    #[arg(long, default_value_t = 22)]
    status_led_pin: u32,

    /// Disable LED indicators
    #[arg(long)]
    no_led: bool,

    /// Seconds between a long press and host power-off
    #[arg(long, default_value_t = 10)]
    shutdown_delay_secs: u64,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ButtonBackend {
    /// /sys/class/gpio value file
    Sysfs,
    /// gpioget CLI (libgpiod character device)
    Gpioget,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    info!("ride recorder starting");
    info!("  output dir: {}", args.output_dir.display());
    info!("  gps port:   {} @ {}", args.gps_port.display(), args.gps_baud);
    info!("  imu feed:   {}", args.imu_command);
    info!("  capture:    {}", args.capture_command);

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating output dir {}", args.output_dir.display()))?;

    let (stop_tx, stop_rx) = watch::channel(false);

    // Status light on for the whole run; the recording LED follows sessions.
    let status_led = (!args.no_led).then(|| SysfsLed::new(args.status_led_pin));
    if let Some(led) = &status_led {
        led.set(true);
    }
    let record_led: Option<Arc<dyn StatusLight>> = (!args.no_led)
        .then(|| Arc::new(SysfsLed::new(args.record_led_pin)) as Arc<dyn StatusLight>);

    let state = Arc::new(RecordingState::new());
    let capture = Arc::new(VideoCapture::new(&args.capture_command, &args.capture_process));
    let controller = Arc::new(SessionController::new(state.clone(), capture, record_led));

    // Inertial acquisition runs for the whole process lifetime, independent
    // of session state.
    let cache = Arc::new(ImuCache::new());
    let imu_task = tokio::spawn(imu::feed_loop(
        args.imu_command.clone(),
        cache.clone(),
        stop_rx.clone(),
    ));

    // GPS is optional: without it sessions still record IMU and video.
    let gps: Option<Box<dyn GpsSource>> = match SerialGps::open(&args.gps_port, args.gps_baud) {
        Ok(port) => Some(Box::new(port)),
        Err(e) => {
            error!("{}; sessions will have no GPS artifact", e);
            None
        }
    };

    let shutdown_sched: Arc<dyn ShutdownScheduler> =
        Arc::new(HostShutdown::new(Duration::from_secs(args.shutdown_delay_secs)));

    // A dead button disables the input monitor only; acquisition and signal
    // handling still run.
    match make_button(&args) {
        Ok(source) => {
            tokio::spawn(button::monitor_loop(
                source,
                controller.clone(),
                shutdown_sched,
                stop_rx.clone(),
            ));
        }
        Err(e) => error!("{}; input monitor disabled", e),
    }

    tokio::spawn(shutdown::signal_listener(stop_tx));

    // The session logger holds the main task until a stop is signalled; its
    // files are closed by the time it returns.
    logger::session_loop(
        state.clone(),
        stop_rx,
        gps,
        cache,
        args.output_dir.clone(),
    )
    .await;

    // Files are closed, now stop any running capture, then join the inertial
    // reader so the feed is not left with a dangling consumer.
    controller.set_active(false);
    if let Err(e) = imu_task.await {
        warn!("inertial task join failed: {}", e);
    }

    if let Some(led) = &status_led {
        led.set(false);
    }
    info!("ride recorder exiting");
    Ok(())
}

fn make_button(args: &Args) -> ride_recorder_rs::Result<Box<dyn ButtonSource>> {
    match args.button_backend {
        ButtonBackend::Sysfs => Ok(Box::new(SysfsButton::new(args.button_pin)?)),
        ButtonBackend::Gpioget => Ok(Box::new(GpiogetButton::new(
            args.button_chip.clone(),
            args.button_pin,
        )?)),
    }
}
