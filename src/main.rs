//! eeka daemon: grabs the mouse, runs the chord engine, forwards the rest.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::OnceLock;

use clap::{ArgAction, Parser};
use log::{error, info, warn};
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::{Pid, getuid};
use tracing_subscriber::EnvFilter;

use eeka::{
    Controls, DispatchLoop, Engine, Error, EvdevSource, Result, UinputSink, XlibWindowSystem,
    config,
};

/// Mouse chord remapper for X11.
///
/// Hold a mouse button and press another one (or scroll) to send a
/// keyboard shortcut to the window under the pointer.
#[derive(Debug, Parser)]
#[command(name = "eeka", version, disable_version_flag = true)]
struct Cli {
    /// Configuration file (default: ~/.config/eeka/config)
    #[arg(short, long, value_name = "FILE", env = "EEKA_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'V', long)]
    verbose: bool,

    /// Enable/disable remapping in the running daemon
    #[arg(short, long)]
    toggle: bool,

    /// Input device to grab instead of auto-detecting one
    #[arg(short, long, value_name = "PATH")]
    device: Option<PathBuf>,

    /// Print version
    #[arg(long, action = ArgAction::Version)]
    version: Option<bool>,
}

static CONTROLS: OnceLock<Controls> = OnceLock::new();

extern "C" fn handle_signal(signum: libc::c_int) {
    let Some(controls) = CONTROLS.get() else {
        return;
    };
    match Signal::try_from(signum) {
        Ok(Signal::SIGINT | Signal::SIGTERM) => controls.stop(),
        Ok(Signal::SIGUSR1) => {
            controls.toggle();
        }
        _ => {}
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "eeka=debug" } else { "eeka=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

fn pidfile_path() -> PathBuf {
    match dirs::runtime_dir() {
        Some(dir) => dir.join("eeka.pid"),
        None => PathBuf::from(format!("/tmp/eeka-{}.pid", getuid())),
    }
}

fn read_pid(path: &Path) -> Result<Pid> {
    let text = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::NotRunning(format!("no pidfile at {}", path.display())),
        _ => Error::Io(e),
    })?;
    text.trim()
        .parse::<i32>()
        .ok()
        .filter(|pid| *pid > 0)
        .map(Pid::from_raw)
        .ok_or_else(|| Error::NotRunning(format!("invalid pid in {}", path.display())))
}

/// Ask the running daemon to flip its enabled flag.
fn send_toggle() -> Result<()> {
    let path = pidfile_path();
    let pid = read_pid(&path)?;
    signal::kill(pid, Signal::SIGUSR1)
        .map_err(|e| Error::NotRunning(format!("cannot signal process {pid}: {e}")))?;
    info!("Toggle signal sent to eeka daemon (PID {pid})");
    Ok(())
}

fn install_signal_handlers(controls: Controls) -> Result<()> {
    if CONTROLS.set(controls).is_err() {
        return Err(Error::Platform("signal handlers already installed".into()));
    }
    // No SA_RESTART: poll() must wake up with EINTR.
    let action = SigAction::new(
        SigHandler::Handler(handle_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for sig in [Signal::SIGINT, Signal::SIGTERM, Signal::SIGUSR1] {
        unsafe { signal::sigaction(sig, &action) }
            .map_err(|e| Error::Platform(format!("failed to install {sig} handler: {e}")))?;
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    if cli.toggle {
        return send_toggle();
    }

    let rules = config::load_or_default(cli.config.as_deref())?;
    info!(
        "Loaded {} global bindings, {} window rules",
        rules.bindings.len(),
        rules.window_rules.len()
    );

    let ws = XlibWindowSystem::connect()?;
    let source = match &cli.device {
        Some(path) => EvdevSource::open(path)?,
        None => EvdevSource::autodetect(&rules)?,
    };
    let sink = UinputSink::create()?;

    let pidfile = pidfile_path();
    if let Err(e) = fs::write(&pidfile, format!("{}\n", std::process::id())) {
        warn!("Failed to write pidfile {}: {}", pidfile.display(), e);
    }

    let controls = Controls::new();
    install_signal_handlers(controls.clone())?;

    info!("eeka running on {}", source.path().display());
    let result = DispatchLoop::new(Engine::new(ws, rules), source, sink, controls).run();

    if let Err(e) = fs::remove_file(&pidfile)
        && e.kind() != io::ErrorKind::NotFound
    {
        warn!("Failed to remove pidfile {}: {}", pidfile.display(), e);
    }
    result
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
