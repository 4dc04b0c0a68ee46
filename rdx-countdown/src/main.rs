use anyhow::Result;
use countdown::components::boundary::BoundaryEvent;
use countdown::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load the configuration from an optional TOML path plus COUNTDOWN_* overrides.
    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = CountdownConfig::load(path.as_deref())?;

    // 2. Initialize structured logging. RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // 3. Create the engine. Console haptics stand in for a device actuator.
    let authority = WorldTimeApi::new(config.time_authority_url.clone())?;
    let haptic_sink: Option<Arc<dyn HapticSink>> = if config.haptics_enabled {
        Some(Arc::new(TracingHaptics))
    } else {
        None
    };
    let engine = CountdownEngine::with_platform(
        config,
        Arc::new(countdown::time::SystemTimeSource),
        haptic_sink,
    )?;

    // 4. Spawn concurrent tasks to listen to different event streams.
    spawn_event_listeners(&engine);

    // 5. Run the engine.
    engine.run(authority).await?;

    Ok(())
}

/// Spawns several tasks, each subscribing to a different event stream from the engine.
fn spawn_event_listeners(engine: &CountdownEngine) {
    let mut system_rx = engine.subscribe_system_events();
    tokio::spawn(async move {
        while let Ok(event) = system_rx.recv().await {
            info!("[SYSTEM] => {:?}", event);
        }
    });

    let mut frame_rx = engine.subscribe_frame_events();
    tokio::spawn(async move {
        loop {
            let frame = match frame_rx.recv().await {
                Ok(frame) => frame,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => break,
            };
            for event in &frame.boundaries {
                match event {
                    BoundaryEvent::SecondTick if frame.remaining.is_final_countdown() => {
                        info!("[FINAL] => {}", frame.remaining.total_seconds);
                    }
                    BoundaryEvent::MinuteRollover => {
                        info!("[MINUTE] => {} remaining", frame.remaining);
                    }
                    BoundaryEvent::HourRollover => {
                        info!("[HOUR] => {} remaining", frame.remaining);
                    }
                    BoundaryEvent::LastMinuteEntered => info!("[LAST MINUTE] => one minute to go"),
                    BoundaryEvent::Completed => info!("[COMPLETE] => Happy New Year!"),
                    _ => {}
                }
            }
        }
    });
}
