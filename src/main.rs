//! Flick recents - replay recorded gesture traces through the recents core
//!
//! Runs the same owner-thread event loop the shell embeds, with the
//! compositor replaced by a provider that logs what it would be asked to do.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use calloop::EventLoop;
use clap::Parser;
use tracing::info;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flick_recents::animation::{RemoteAnimationProvider, SurfaceHandle, SurfaceTransaction, TaskSnapshot};
use flick_recents::helper::PkexecHelper;
use flick_recents::{trace, Config, OverviewHost, TouchInteractionService};

#[derive(Parser, Debug)]
#[command(name = "flick-recents")]
#[command(about = "Replay a gesture trace through the Flick recents core", long_about = None)]
struct Args {
    /// Gesture trace (JSON array of timestamped events)
    #[arg(short, long)]
    trace: PathBuf,

    /// Config file (default: $XDG_CONFIG_HOME/flick/recents.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host overview in the standalone recents surface instead of the launcher
    #[arg(short, long)]
    fallback: bool,

    /// Try to reach the privileged helper (pkexec)
    #[arg(long)]
    helper: bool,

    /// Enable verbose debug output
    #[arg(short, long)]
    debug: bool,
}

/// Compositor stand-in: logs every request
struct LoggingProvider {
    screen: smithay::utils::Size<i32, smithay::utils::Logical>,
}

impl RemoteAnimationProvider for LoggingProvider {
    fn apply_transaction(&mut self, t: &SurfaceTransaction) {
        tracing::debug!(
            surface = t.surface.0,
            x = t.rect.loc.x,
            y = t.rect.loc.y,
            w = t.rect.size.w,
            h = t.rect.size.h,
            radius = t.corner_radius,
            "Surface transaction"
        );
    }

    fn capture_snapshot(&mut self, task_id: u32) -> Option<TaskSnapshot> {
        info!(task_id, "Snapshot captured");
        Some(TaskSnapshot {
            task_id,
            size: self.screen,
        })
    }

    fn release_surface(&mut self, surface: SurfaceHandle) {
        info!(surface = surface.0, "Live surface released");
    }

    fn finish(&mut self, gesture_id: u32, to_home: bool) {
        info!(gesture_id, to_home, "Compositor animation finished");
    }

    fn launch_task(&mut self, task_id: u32) {
        info!(task_id, "Task launched");
    }
}

/// `$XDG_STATE_HOME/flick`, else `~/.local/state/flick`, else `/tmp/flick`
fn state_dir(xdg_state_home: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    xdg_state_home
        .or_else(|| home.map(|h| h.join(".local/state")))
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("flick")
}

fn main() -> Result<()> {
    let log_dir = state_dir(
        std::env::var_os("XDG_STATE_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    );

    let crash_log = log_dir.join("crash.log");
    std::panic::set_hook(Box::new(move |panic_info| {
        eprintln!("PANIC: {}", panic_info);
        if let Ok(mut f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&crash_log)
        {
            use std::io::Write;
            let _ = writeln!(f, "[{}] PANIC: {}", chrono::Local::now(), panic_info);
        }
    }));

    std::fs::create_dir_all(&log_dir).ok();

    let args = Args::parse();

    let file_appender = rolling::daily(&log_dir, "recents.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let default_filter = if args.debug {
        "debug,flick_recents=debug"
    } else {
        "warn,flick_recents=info"
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    info!(log_path = %log_dir.display(), "Flick recents starting");

    let config = Config::load(args.config.as_deref()).context("loading config")?;
    let entries = trace::load(&args.trace).with_context(|| format!("reading trace {:?}", args.trace))?;
    let host = if args.fallback {
        OverviewHost::Fallback
    } else {
        OverviewHost::Launcher
    };

    let mut event_loop: EventLoop<TouchInteractionService> = EventLoop::try_new()?;
    let handle = event_loop.handle();
    let provider = LoggingProvider {
        screen: smithay::utils::Size::from((config.display.width, config.display.height)),
    };
    let mut service = TouchInteractionService::new(config, host, Box::new(provider));
    let compositor = TouchInteractionService::insert_sources(&handle)?;

    if args.helper {
        service.connect_helper(&handle, PkexecHelper::connect)?;
    }

    info!(events = entries.len(), ?host, "Replaying trace");
    for entry in &entries {
        entry.apply(&mut service, &compositor);
        event_loop.dispatch(Some(Duration::ZERO), &mut service)?;
    }

    println!("host: {:?}", service.host());
    println!(
        "state: {}",
        service.current_state().unwrap_or_else(|| "<no surface>".to_string())
    );
    println!("end target: {:?}", service.last_end_target());
    println!("live tile: {:?}", service.live_tile_task());
    println!("dropped content: {}", service.session().dropped_content_count());
    println!("overview exits: {}", service.overview_exits());
    println!("transitions:");
    for line in service.transition_log() {
        println!("  {}", line);
    }
    for notification in service.notifications() {
        println!("notification: {}", notification);
    }

    Ok(())
}
