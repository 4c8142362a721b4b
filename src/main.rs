//! Scape Pilot CLI
//!
//! Runs a bundled script against the live client, or against a saved
//! screenshot with input only logged (`--frame`).

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use scape_pilot::config::Settings;
use scape_pilot::controller::{ChannelFactory, Controller};
use scape_pilot::input::recording::LogChannel;
use scape_pilot::input::InputChannel;
use scape_pilot::platform::{self, StubDesktop, WindowSystem};
use scape_pilot::runtime::hotkey::native_hook;
use scape_pilot::runtime::{RunConfig, RunOutcome, ScriptRunner};
use scape_pilot::scripts::default_registry;

#[derive(Parser)]
#[command(name = "pilot")]
#[command(about = "Colour and template driven client automation", long_about = None)]
struct Cli {
    /// Settings file (JSON)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a bundled script until paused or stopped
    Run {
        /// Script name, see `pilot list`
        #[arg(short, long)]
        script: String,

        /// Drive a saved screenshot instead of the live window; input is only logged
        #[arg(long, value_name = "PNG")]
        frame: Option<PathBuf>,

        /// Stop cleanly after this many seconds
        #[arg(long, value_name = "SECS")]
        max_runtime: Option<u64>,
    },

    /// List bundled scripts
    List,

    /// Print the effective settings as JSON
    Config {
        /// Start from the slower preset instead of the defaults
        #[arg(long)]
        cautious: bool,
    },
}

fn load_settings(path: Option<&Path>) -> Result<Settings, scape_pilot::Error> {
    match path {
        Some(path) => Ok(Settings::load(path)?),
        None => Ok(Settings::default()),
    }
}

fn native_channels() -> ChannelFactory {
    Box::new(|input| {
        #[cfg(windows)]
        {
            let channel = scape_pilot::input::kinput::KInputChannel::load(
                &input.resolve_module_dir(),
                &input.module_name,
            )?;
            Ok(Box::new(channel) as Box<dyn InputChannel>)
        }
        #[cfg(not(windows))]
        {
            let _ = input;
            Err(scape_pilot::input::InputError::LibraryLoad(
                "the input host is only available on Windows".into(),
            ))
        }
    })
}

fn dry_run_channels() -> ChannelFactory {
    Box::new(|_| Ok(Box::new(LogChannel) as Box<dyn InputChannel>))
}

/// Desktop showing `frame` under the configured window settings
fn screenshot_desktop(settings: &Settings, frame: &Path) -> Result<Arc<dyn WindowSystem>, scape_pilot::Error> {
    let image = image::open(frame)
        .map_err(scape_pilot::vision::VisionError::from)?
        .to_rgb8();
    let window = &settings.window;
    Ok(Arc::new(StubDesktop::with_client(
        &window.title,
        window.canvas_class.as_deref().unwrap_or_default(),
        window.canvas_index,
        std::process::id(),
        (0, 0),
        image,
    )))
}

fn run(
    mut settings: Settings,
    config: &RunConfig,
    frame: Option<&Path>,
    max_runtime: Option<u64>,
) -> Result<RunOutcome, scape_pilot::Error> {
    let mut script = default_registry().create_for(config)?;
    if max_runtime.is_some() {
        settings.script.max_runtime_secs = max_runtime;
    }

    let (system, channels) = match frame {
        Some(frame) => {
            log::info!("Dry run against {}", frame.display());
            settings.input.cleanup_modules = false;
            settings.hotkey.enabled = false;
            (screenshot_desktop(&settings, frame)?, dry_run_channels())
        }
        None => (platform::native()?, native_channels()),
    };

    let hotkey = settings.hotkey.enabled;
    let controller = Arc::new(Controller::new(settings, system, channels));
    let listener = hotkey.then(|| controller.pause_listener(native_hook()));
    if let Some(listener) = &listener {
        if let Err(e) = listener.start() {
            log::warn!("Pause hotkey unavailable: {}", e);
        }
    }

    let outcome = ScriptRunner::new(controller.clone()).run(script.as_mut());
    if let Some(listener) = &listener {
        listener.stop();
    }

    let stats = controller.stats().snapshot();
    match serde_json::to_string(&stats) {
        Ok(json) => log::info!("Run statistics: {}", json),
        Err(e) => log::warn!("Statistics not serialisable: {}", e),
    }
    outcome
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::List => {
            for name in default_registry().names() {
                println!("{}", name);
            }
            ExitCode::SUCCESS
        }
        Commands::Config { cautious } => {
            let settings = if cautious {
                Settings::cautious_preset()
            } else {
                settings
            };
            match serde_json::to_string_pretty(&settings) {
                Ok(json) => {
                    println!("{}", json);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    log::error!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Run {
            script,
            frame,
            max_runtime,
        } => match run(settings, &RunConfig { script }, frame.as_deref(), max_runtime) {
            Ok(outcome) => {
                log::info!("Run finished: {:?}", outcome);
                ExitCode::SUCCESS
            }
            Err(e) => {
                log::error!("{}", e);
                ExitCode::FAILURE
            }
        },
    }
}
