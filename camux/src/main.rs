mod sink;

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use camux_core::config::discover_config_path;
use camux_core::logging::init_logging;
use camux_core::{
    CameraId, DeviceDirectory, GroupController, GroupReport, HttpStreamTransport, MediaFlags,
    MediaFlagsState, MediaSink, ProxyClient, SelectionRegistry, ViewerConfig, WebRtcConnector,
};

use sink::MediaLog;

#[derive(Parser, Debug)]
#[command(name = "camux")]
#[command(about = "Watch several cameras at once through a camux proxy", long_about = None)]
struct Args {
    /// Config file (YAML/TOML)
    #[arg(long, global = true, env = "CAMUX_CONFIG_PATH")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the cameras visible to the configured account
    Devices,
    /// Stream the given cameras until interrupted
    Watch {
        /// Camera to stream; repeat for more
        #[arg(long = "camera", value_name = "ID")]
        cameras: Vec<String>,

        /// Stream every camera the account can see
        #[arg(long, conflicts_with = "cameras")]
        all: bool,

        /// Start with audio muted
        #[arg(long)]
        no_audio: bool,

        /// Start with video hidden
        #[arg(long)]
        no_video: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.or_else(discover_config_path);
    let config = ViewerConfig::load(config_path.as_deref())?;
    if let Err(errors) = config.validate() {
        for e in &errors {
            eprintln!("Config validation error: {e}");
        }
        bail!("Configuration validation failed with {} error(s)", errors.len());
    }

    init_logging(&config.logging)?;

    let client = ProxyClient::new(
        &config.api_base_url,
        config.bearer_token.clone(),
        config.request_timeout(),
    )?;

    match args.command {
        Command::Devices => list_devices(DeviceDirectory::new(client)).await,
        Command::Watch {
            cameras,
            all,
            no_audio,
            no_video,
        } => {
            let initial = MediaFlagsState {
                video_enabled: !no_video,
                audio_enabled: !no_audio,
            };
            watch(&config, client, cameras, all, initial).await
        }
    }
}

async fn list_devices(directory: DeviceDirectory) -> Result<()> {
    let devices = directory.list_cameras().await?;

    if let Some(url) = devices.partner_connection_url {
        println!("No devices linked yet. Connect them at: {url}");
        return Ok(());
    }

    for camera in &devices.cameras {
        println!(
            "{}\t{}\t{}",
            camera.camera_id(),
            camera.kind_label(),
            camera.display_name()
        );
    }
    Ok(())
}

async fn watch(
    config: &ViewerConfig,
    client: ProxyClient,
    cameras: Vec<String>,
    all: bool,
    initial: MediaFlagsState,
) -> Result<()> {
    let ids: Vec<CameraId> = if all {
        DeviceDirectory::new(client.clone())
            .list_cameras()
            .await?
            .camera_ids()
    } else {
        cameras.iter().map(|c| CameraId::from_device_name(c)).collect()
    };
    if ids.is_empty() {
        bail!("No cameras to watch; pass --camera ID or --all");
    }

    let media_log = Arc::new(MediaLog::new());
    let sink: Arc<dyn MediaSink> = media_log.clone();
    let connector = WebRtcConnector::new(Some(sink))?;
    let controller = GroupController::new(
        Arc::new(HttpStreamTransport::new(client)),
        Arc::new(connector),
        MediaFlags::new(initial),
        SelectionRegistry::new(),
        config.extension_interval(),
    );

    for id in ids {
        controller.register(id);
    }
    controller.select_all();

    info!(cameras = controller.selection().count(), "Starting streams");
    print_report("start", &controller.start_selected().await);
    println!("Commands: v = toggle video, a = toggle audio, s = status, q = quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Failed to listen for interrupt: {}", e);
                }
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "v" => println!("video {}", on_off(controller.toggle_video())),
                    "a" => println!("audio {}", on_off(controller.toggle_audio())),
                    "s" => print_status(&controller, &media_log),
                    "q" => break,
                    "" => {}
                    other => println!("unknown command: {other}"),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },
        }
    }

    print_status(&controller, &media_log);
    print_report("stop", &controller.stop_selected().await);
    Ok(())
}

const fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

fn print_report(action: &str, report: &GroupReport) {
    for camera in report.succeeded() {
        println!("{action} {camera}: ok");
    }
    for (camera, error) in report.failed() {
        println!("{action} {camera}: {error}");
    }
}

fn print_status(controller: &GroupController, media_log: &MediaLog) {
    let flags = controller.flags().current();
    println!(
        "video {}, audio {}",
        on_off(flags.video_enabled),
        on_off(flags.audio_enabled)
    );

    for camera in controller.camera_ids() {
        let Some(session) = controller.session(&camera) else {
            continue;
        };
        match session.last_error() {
            Some(error) => println!("{camera}: {} | error: {error}", session.state()),
            None => println!("{camera}: {}", session.state()),
        }

        for track in session.stream().tracks() {
            let stats = track.stats();
            let flowing = if media_log.is_flowing(&camera, track.id()) {
                "flowing"
            } else {
                "waiting"
            };
            println!(
                "  {} {} ({}, {flowing}): {} pkts / {} B received, {} delivered",
                stats.kind.as_str(),
                stats.track_id,
                on_off(stats.enabled),
                stats.packets_received,
                stats.bytes_received,
                stats.packets_delivered
            );
        }
    }
}
