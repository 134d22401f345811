use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use physarum::config::{Settings, WorldConfig};
use physarum::error::SimulationError;
use physarum::midi::{self, ExternalController};
use physarum::App;

#[derive(Parser, Debug)]
#[command(name = "physarum", version, about = "Physarum slime-mold simulation")]
struct Args {
    /// JSON settings file. Missing fields take their defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run in a 3D volume instead of the flat world.
    #[arg(long)]
    three_d: bool,

    /// Override the agent count.
    #[arg(short, long)]
    agents: Option<u32>,

    /// Seed for agent placement. Random when omitted.
    #[arg(short, long)]
    seed: Option<u64>,

    /// Raw MIDI device to read a MIDIMIX-layout controller from,
    /// e.g. /dev/snd/midiC1D0.
    #[arg(long, value_name = "PATH")]
    controller: Option<PathBuf>,
}

fn settings_from(args: &Args) -> Result<Settings, SimulationError> {
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    if args.three_d && !settings.world.dimensionality.is_3d() {
        settings.world = WorldConfig::three_d();
    }
    if let Some(count) = args.agents {
        settings.world.agent_count = count;
    }
    settings.world.validate()?;
    Ok(settings)
}

fn open_controller(path: &Path) -> Result<ExternalController, SimulationError> {
    let device = File::open(path).map_err(SimulationError::Controller)?;
    log::info!("reading controller from {}", path.display());
    Ok(ExternalController::midimix(Box::new(midi::spawn_reader(device))))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);

    let result = settings_from(&args).and_then(|settings| {
        log::info!(
            "{:?} world {}x{}x{}, {} agents, seed {}",
            settings.world.dimensionality,
            settings.world.width,
            settings.world.height,
            settings.world.depth,
            settings.world.agent_count,
            seed
        );
        let mut app = App::new(settings, seed);
        if let Some(path) = &args.controller {
            app = app.with_controller(open_controller(path)?);
        }
        physarum::run_app(app)
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
