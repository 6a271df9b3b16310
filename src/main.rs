//! gesture-slots - replay body frames through the gesture slot pipeline.
//!
//! Reads one s-expression frame per line from a file or stdin, drives the
//! tracker, and prints confirmed gestures as IPC event lines.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use body_gesture_slots::body::{DiscreteEvent, EventPolicy};
use body_gesture_slots::replay::ScriptedFrame;
use body_gesture_slots::dispatch::{spawn_dispatcher, ActionDispatcher, GestureHandler};
use body_gesture_slots::replay::FrameReader;
use body_gesture_slots::{ReplayError, Tracker, TrackerConfig};
use clap::Parser;
use tracing::{info, warn};

/// Global flag set by SIGTERM/SIGINT handlers.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

#[derive(Parser, Debug)]
#[command(name = "gesture-slots", about = "Replay body frames through per-body gesture slots")]
struct Cli {
    /// Frame script to read ("-" for stdin)
    #[arg(long, default_value = "-")]
    input: String,

    /// Number of slots
    #[arg(long, default_value_t = 6)]
    slots: usize,

    /// Bodies per frame the source reports; must equal --slots
    #[arg(long, default_value_t = 6)]
    bodies: usize,

    /// Confidence a detection must exceed to fire
    #[arg(long, default_value_t = 0.4)]
    threshold: f32,

    /// Event policy: per-frame, rising-edge, or cooldown
    #[arg(long, default_value = "per-frame")]
    policy: String,

    /// Cooldown window for the cooldown policy
    #[arg(long, default_value_t = 500)]
    cooldown_ms: u64,

    /// Dispatcher queue bound
    #[arg(long, default_value_t = 64)]
    queue_capacity: usize,

    /// Print slot status after the last frame
    #[arg(long)]
    status: bool,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

/// Writes every event to stdout as an IPC event line.
struct PrintHandler;

impl GestureHandler for PrintHandler {
    fn handle(&mut self, event: &DiscreteEvent) {
        let mut out = io::stdout().lock();
        if let Err(e) = writeln!(out, "{}", event.to_sexp()) {
            warn!("failed to write event: {}", e);
        }
    }
}

fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

fn open_input(path: &str) -> anyhow::Result<Box<dyn BufRead>> {
    if path == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path).with_context(|| format!("opening frame script {path}"))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Drive every scripted frame through the tracker until input ends,
/// a signal arrives, or a frame fails.
fn replay<I>(tracker: &mut Tracker, frames: I) -> anyhow::Result<()>
where
    I: IntoIterator<Item = Result<ScriptedFrame, ReplayError>>,
{
    for scripted in frames {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            info!("shutdown requested, stopping replay");
            break;
        }
        let scripted = scripted.context("reading frame script")?;
        tracker
            .process_frame_with(&scripted.frame, |slots| scripted.feed(slots))
            .with_context(|| format!("frame {}", scripted.frame.sequence))?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("gesture-slots {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "body_gesture_slots=info,gesture_slots=info".into()),
        )
        .init();

    info!("gesture-slots v{} starting", env!("CARGO_PKG_VERSION"));

    let event_policy = EventPolicy::parse(&cli.policy, cli.cooldown_ms).with_context(|| {
        format!(
            "unknown policy {}. Use: per-frame, rising-edge, or cooldown",
            cli.policy
        )
    })?;
    let config = TrackerConfig {
        slot_count: cli.slots,
        confirmation_threshold: cli.threshold,
        event_policy,
        queue_capacity: cli.queue_capacity,
    };
    info!("config: {}", config.config_sexp());

    let mut tracker = Tracker::scripted(config.clone(), cli.bodies).context("invalid configuration")?;

    let mut dispatcher = ActionDispatcher::with_default_labels();
    dispatcher.add_observer(Box::new(PrintHandler));
    let (sink, dispatch_thread) = spawn_dispatcher(dispatcher, config.queue_capacity)
        .context("starting dispatcher")?;
    tracker.attach_sink(sink);

    install_signal_handlers();

    let outcome = open_input(&cli.input)
        .and_then(|input| replay(&mut tracker, FrameReader::new(input)));

    // Drain events already queued for earlier frames, even on failure.
    let status = tracker.status_sexp();
    drop(tracker.detach_sink());
    let joined = dispatch_thread.join().context("dispatcher thread");
    if let Err(e) = &outcome {
        warn!("replay stopped early: {:#}", e);
    }
    outcome?;
    let dispatcher = joined?;

    for (gesture, label) in dispatcher.labels() {
        info!(gesture = %gesture, "{}", label);
    }
    let stats = tracker.stats();
    info!(
        frames = stats.frames,
        transitions = stats.transitions,
        events = stats.events,
        "replay finished"
    );

    if cli.status {
        println!("{}", status);
    }

    Ok(())
}
