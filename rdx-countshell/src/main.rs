use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use countdown::components::boundary::BoundaryEvent;
use countdown::prelude::*;
use countdown::time::SystemTimeSource;
use countdown::{ENGINE_NAME, VERSION as LIB_VERSION};
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct CommandHighlighter;

impl Highlighter for CommandHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            let colored_command = command.yellow().bold();
            let colored_rest = rest.yellow();
            Cow::Owned(format!("{} {}", colored_command, colored_rest))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }
    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    println!("{}", "countshell".cyan().bold());
    let version_string = format!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    println!("{}", "-----------------------------------------------------------------".dimmed());
    println!("{}", version_string);
    println!("{}", "-----------------------------------------------------------------".dimmed());
}

/// Spawns the feedback listeners. Boundary crossings are only printed while
/// `is_watching` is set.
fn spawn_event_listeners(engine: &CountdownEngine, is_watching: Arc<AtomicBool>) {
    let mut system_rx = engine.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            println!("\n<-- [SYSTEM EVENT] {:?}\n>> ", event);
        }
    });

    let mut frame_rx = engine.subscribe_frame_events();
    tokio::spawn(async move {
        loop {
            let frame = match frame_rx.recv().await {
                Ok(frame) => frame,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            };
            if !is_watching.load(Ordering::Relaxed) {
                continue;
            }
            for event in &frame.boundaries {
                match event {
                    BoundaryEvent::SecondTick => {
                        println!("<-- [TICK] {}", frame.remaining);
                    }
                    // Repeats every sample; the tick line already shows the digit.
                    BoundaryEvent::FinalCountdownTick { .. } => {}
                    other => println!("<-- [{}] {:?}", "BOUNDARY".magenta(), other),
                }
            }
        }
    });
}

fn format_target(target: TargetInstant, config: &CountdownConfig) -> String {
    target
        .to_utc()
        .map(|t| t.with_timezone(&config.timezone).to_rfc3339())
        .unwrap_or_else(|| target.as_millis().to_string())
}

async fn print_status(engine: &CountdownEngine) {
    let target = engine.target().await;
    println!("  Remaining : {}", engine.remaining().await.to_string().bold());
    println!("  Target    : {}", format_target(target, engine.config()));
    println!("  Mode      : {:?}", engine.mode().await);
    println!(
        "  Sync      : {:?} (offset {}ms)",
        engine.sync_status(),
        engine.clock_offset().millis()
    );
    println!(
        "  Haptics   : {}",
        if engine.haptics().is_enabled() { "on" } else { "off" }
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    let path = env::args().nth(1).map(PathBuf::from);
    let config = CountdownConfig::load(path.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let authority = WorldTimeApi::new(config.time_authority_url.clone())?;
    let engine = CountdownEngine::with_platform(
        config,
        Arc::new(SystemTimeSource),
        Some(Arc::new(TracingHaptics)),
    )?;

    let is_watching = Arc::new(AtomicBool::new(false));
    spawn_event_listeners(&engine, is_watching.clone());

    info!("Starting {} in the background...", ENGINE_NAME.cyan());
    let handle = engine.start(authority, None);

    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut rl = Editor::new()?;
    rl.set_helper(Some(CommandHighlighter));

    println!("{} is running. Type 'help' for commands or 'exit' to quit.", ENGINE_NAME.cyan());

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        let readline = rl.readline(&prompt);
        match readline {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let args = line.split_whitespace().collect::<Vec<_>>();

                if let Some(command) = args.first() {
                    match *command {
                        "status" => print_status(&engine).await,
                        "target" => match args.get(1).map(|s| s.parse::<u64>()) {
                            Some(Ok(seconds)) => match engine.set_test_target(seconds).await {
                                Ok(target) => println!(
                                    "--> Counting down {} seconds, to {}.",
                                    seconds,
                                    format_target(target, engine.config())
                                ),
                                Err(e) => println!("Error: {}", e),
                            },
                            Some(Err(_)) => {
                                println!("Error: '{}' is not a valid number of seconds.", args[1]);
                            }
                            None => println!("Usage: target <SECONDS>"),
                        },
                        "reset" => {
                            let now = DateTime::<Utc>::from_timestamp_millis(engine.corrected_now())
                                .unwrap_or_else(Utc::now);
                            match engine.config().target_instant(now) {
                                Ok(target) => {
                                    engine.reset_countdown(Some(target)).await;
                                    println!("--> Reset to {}.", format_target(target, engine.config()));
                                }
                                Err(e) => println!("Error: {}", e),
                            }
                        }
                        "sync" => {
                            engine.sync_now();
                            println!("--> Sync requested.");
                        }
                        "watch" => match args.get(1) {
                            Some(&"on") => {
                                is_watching.store(true, Ordering::Relaxed);
                                println!("--> Printing boundary crossings.");
                            }
                            Some(&"off") => {
                                is_watching.store(false, Ordering::Relaxed);
                                println!("--> Stopped printing boundary crossings.");
                            }
                            _ => println!("Usage: watch on|off"),
                        },
                        "haptics" => match args.get(1) {
                            Some(&"on") => {
                                engine.haptics().set_enabled(true);
                                println!("--> Haptics enabled.");
                            }
                            Some(&"off") => {
                                engine.haptics().set_enabled(false);
                                println!("--> Haptics disabled.");
                            }
                            _ => println!("Usage: haptics on|off"),
                        },
                        "effects" => {
                            let counts = engine.effect_counts().await;
                            println!("Live effects:");
                            println!("  confetti   : {}", counts.confetti);
                            println!("  rockets    : {}", counts.rockets);
                            println!("  explosions : {}", counts.explosions);
                            println!("  rising     : {}", counts.rising);
                            println!("  pending    : {}", counts.pending);
                        }
                        "help" => {
                            println!("Available commands:");
                            println!("  status                - Shows remaining time, target and sync state.");
                            println!("  target <S>            - Restarts the countdown S seconds from now.");
                            println!("  reset                 - Restarts the countdown to the next New Year.");
                            println!("  sync                  - Re-syncs with the time authority now.");
                            println!("  watch on|off          - Toggles printing of boundary crossings.");
                            println!("  haptics on|off        - Toggles haptic feedback.");
                            println!("  effects               - Shows live effect counts.");
                            println!("  exit                  - Quits the shell.");
                        }
                        "exit" => break,
                        _ => println!("Unknown command: '{}'. Type 'help'.", line),
                    }
                }
            }
            Err(_) => {
                println!("Exiting countshell...");
                break;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}
