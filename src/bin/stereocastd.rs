//! stereocastd - stereo video replay daemon
//!
//! This daemon:
//! 1. Loads and validates configuration (file, environment, CLI)
//! 2. Opens the left and right video sources, seeking to the start frame
//! 3. Republishes frame pairs at a fixed rate onto two MQTT image channels
//! 4. Stops cleanly when either source runs out of frames, or on Ctrl-C
//!
//! End of stream is the normal way this process ends; open failures abort
//! before the serving loop starts.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

use stereocast::{
    ConfigOverrides, DualStreamScheduler, FileConfig, FileSource, MqttRuntime, StereoSide,
    StereocastConfig,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Replay a stereo video pair onto two MQTT image channels"
)]
struct Args {
    /// Path to a JSON config file. CLI and environment values override it.
    #[arg(long, env = "STEREOCAST_CONFIG")]
    config: Option<PathBuf>,

    /// Left stream video file.
    #[arg(long, env = "STEREOCAST_LEFT_VIDEO")]
    left_video: Option<String>,

    /// Right stream video file.
    #[arg(long, env = "STEREOCAST_RIGHT_VIDEO")]
    right_video: Option<String>,

    /// Publish rate in Hz (not necessarily the videos' fps).
    #[arg(long, env = "STEREOCAST_RATE_HZ")]
    rate_hz: Option<f64>,

    /// Frame index both sources start from.
    #[arg(long, env = "STEREOCAST_START_FRAME")]
    start_frame: Option<u64>,

    /// MQTT broker address.
    #[arg(long, env = "MQTT_BROKER_ADDR")]
    mqtt_broker_addr: Option<String>,

    /// MQTT client identifier.
    #[arg(long, env = "MQTT_CLIENT_ID")]
    mqtt_client_id: Option<String>,

    /// Topic prefix for the image channels.
    #[arg(long, env = "STEREOCAST_TOPIC_PREFIX")]
    topic_prefix: Option<String>,

    /// MQTT username for authentication.
    #[arg(long, env = "MQTT_USERNAME")]
    mqtt_username: Option<String>,

    /// MQTT password for authentication.
    #[arg(long, env = "MQTT_PASSWORD")]
    mqtt_password: Option<String>,

    /// Allow non-loopback MQTT connections.
    /// Use in trusted environments only.
    #[arg(long, env = "ALLOW_REMOTE_MQTT")]
    allow_remote_mqtt: bool,

    /// Bounded publish queue depth.
    #[arg(long, env = "STEREOCAST_QUEUE_CAPACITY")]
    queue_capacity: Option<usize>,
}

impl Args {
    fn into_overrides(self) -> ConfigOverrides {
        ConfigOverrides {
            left_video: self.left_video,
            right_video: self.right_video,
            rate_hz: self.rate_hz,
            start_frame: self.start_frame,
            mqtt_broker_addr: self.mqtt_broker_addr,
            mqtt_client_id: self.mqtt_client_id,
            topic_prefix: self.topic_prefix,
            mqtt_username: self.mqtt_username,
            mqtt_password: self.mqtt_password,
            allow_remote_mqtt: self.allow_remote_mqtt,
            queue_capacity: self.queue_capacity,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config_path = args.config.clone();
    let cfg = StereocastConfig::load(config_path.as_deref(), args.into_overrides())?;

    log::info!("stereocastd started");
    log::info!("Left:  {}", cfg.left_video);
    log::info!("Right: {}", cfg.right_video);
    log::info!(
        "Publishing at {:.2} Hz starting frame {}",
        cfg.effective_rate_hz(),
        cfg.start_frame
    );

    // Open both sources before serving anything; a failure here aborts with
    // the offending path, and the already-open handle is released on drop.
    let left = FileSource::open(FileConfig {
        path: cfg.left_video.clone(),
    })
    .with_context(|| format!("cannot open left video: {}", cfg.left_video))?;
    let right = FileSource::open(FileConfig {
        path: cfg.right_video.clone(),
    })
    .with_context(|| format!("cannot open right video: {}", cfg.right_video))?;

    let runtime = MqttRuntime::connect(&cfg.mqtt)?;
    let left_publisher = runtime.publisher(StereoSide::Left);
    let right_publisher = runtime.publisher(StereoSide::Right);

    let mut scheduler = DualStreamScheduler::new(
        left,
        right,
        left_publisher,
        right_publisher,
        cfg.schedule(),
    );
    let shutdown = scheduler.shutdown_handle();
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::SeqCst);
    })
    .context("install interrupt handler")?;

    scheduler.run()?;

    runtime.disconnect()?;
    log::info!("stereocastd exiting");
    Ok(())
}
