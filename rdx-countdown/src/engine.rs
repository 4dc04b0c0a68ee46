//! The core engine that orchestrates the countdown.

use crate::common::EpochMillis;
use crate::components::boundary::{BoundaryClock, BoundaryEvent, RemainingTime, TargetInstant};
use crate::components::dispatcher::{DisplayMode, EffectCounts, EffectDispatcher};
use crate::config::CountdownConfig;
use crate::error::ConfigError;
use crate::events::{FrameEvent, MotionEvent, SystemEvent};
use crate::haptics::{HapticSink, Haptics};
use crate::motion::{MotionAdapter, MotionReading};
use crate::sync::{ClockOffset, ClockOffsetCell, ClockSync, SyncStatus, TimeAuthority};
use crate::time::{SystemTimeSource, TimeSource};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, Mutex, Notify};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace};

/// The boundary detector and the dispatcher it feeds.
///
/// They sit behind one lock so that a reset can never be observed half-applied
/// by the sampler.
struct Countdown {
    boundary: BoundaryClock,
    dispatcher: EffectDispatcher,
}

/// The main countdown engine.
///
/// This struct is the central point of control. It holds the configuration,
/// the shared clock offset, the countdown state and the event channels. The
/// engine is designed to be cloned and shared across tasks, providing a handle
/// to the running instance.
#[derive(Clone)]
pub struct CountdownEngine {
    config: Arc<CountdownConfig>,
    clock: Arc<dyn TimeSource>,
    offset: ClockOffsetCell,
    countdown: Arc<Mutex<Countdown>>,
    haptics: Haptics,
    effect_epoch: Instant,
    sync_status: Arc<watch::Sender<SyncStatus>>,
    sync_now: Arc<Notify>,
    system_event_sender: broadcast::Sender<SystemEvent>,
    frame_event_sender: broadcast::Sender<FrameEvent>,
    motion_event_sender: broadcast::Sender<MotionEvent>,
}

/// Owns every task spawned by [`CountdownEngine::start`].
///
/// Dropping the handle aborts the tasks; [`EngineHandle::shutdown`] stops
/// them gracefully and waits for them to finish.
pub struct EngineHandle {
    shutdown_tx: broadcast::Sender<()>,
    tasks: JoinSet<()>,
    system_event_sender: broadcast::Sender<SystemEvent>,
}

impl EngineHandle {
    /// Number of engine tasks still running.
    pub fn running_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub async fn shutdown(mut self) {
        info!("Shutdown requested. Broadcasting to all tasks...");
        if self.shutdown_tx.send(()).is_err() {
            debug!("No engine task was listening for shutdown.");
        }
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                error!("Engine task ended abnormally: {}", e);
            }
        }
        self.system_event_sender
            .send(SystemEvent::EngineShutdown)
            .ok();
        info!("Countdown engine has shut down.");
    }
}

// Core implementation block for internal logic.
impl CountdownEngine {
    /// Creates an engine on the system clock with no haptic actuator.
    pub fn new(config: CountdownConfig) -> Result<Self, ConfigError> {
        Self::with_platform(config, Arc::new(SystemTimeSource), None)
    }

    /// Creates an engine on an explicit local clock and haptic actuator.
    ///
    /// The target is derived from `clock`'s current reading, so a test clock
    /// produces a target relative to its own notion of now.
    pub fn with_platform(
        config: CountdownConfig,
        clock: Arc<dyn TimeSource>,
        haptic_sink: Option<Arc<dyn HapticSink>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let now = DateTime::<Utc>::from_timestamp_millis(clock.now_millis()).unwrap_or_else(Utc::now);
        let target = config.target_instant(now)?;

        let haptics = Haptics::select(haptic_sink, config.haptics_enabled);
        let dispatcher = EffectDispatcher::new(
            config.effects.clone(),
            haptics.clone(),
            StdRng::from_entropy(),
        );

        const FRAME_CHANNEL_CAPACITY: usize = 256;
        let (system_event_sender, _) = broadcast::channel(64);
        let (frame_event_sender, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        let (motion_event_sender, _) = broadcast::channel(64);
        let (sync_status, _) = watch::channel(SyncStatus::Syncing);

        Ok(Self {
            config: Arc::new(config),
            clock,
            offset: ClockOffsetCell::default(),
            countdown: Arc::new(Mutex::new(Countdown {
                boundary: BoundaryClock::new(target),
                dispatcher,
            })),
            haptics,
            effect_epoch: Instant::now(),
            sync_status: Arc::new(sync_status),
            sync_now: Arc::new(Notify::new()),
            system_event_sender,
            frame_event_sender,
            motion_event_sender,
        })
    }

    /// Spawns the sampler, the sync loop and, when a sensor channel is given
    /// and motion is enabled, the motion loop.
    pub fn start<A: TimeAuthority + 'static>(
        &self,
        authority: A,
        motion: Option<mpsc::Receiver<MotionReading>>,
    ) -> EngineHandle {
        let (shutdown_tx, _) = broadcast::channel(1);
        let mut tasks = JoinSet::new();

        let sync = ClockSync::new(authority, self.clock.clone(), self.config.timezone.name())
            .with_offset_cell(self.offset.clone());
        tasks.spawn(self.clone().sync_loop(sync, shutdown_tx.subscribe()));
        tasks.spawn(self.clone().sampler_loop(shutdown_tx.subscribe()));

        match motion {
            Some(readings) if self.config.motion_enabled => {
                tasks.spawn(self.clone().motion_loop(readings, shutdown_tx.subscribe()));
            }
            Some(_) => debug!("Motion input disabled by configuration."),
            None => debug!("No motion sensor attached."),
        }

        EngineHandle {
            shutdown_tx,
            tasks,
            system_event_sender: self.system_event_sender.clone(),
        }
    }

    /// Runs the engine until a shutdown signal is received.
    pub async fn run<A: TimeAuthority + 'static>(&self, authority: A) -> anyhow::Result<()> {
        info!("Countdown engine starting up...");
        let handle = self.start(authority, None);
        let target = self.target().await;
        info!(
            "Counting down to {} ({}). Press Ctrl+C to shut down.",
            target
                .to_utc()
                .map(|t| t.with_timezone(&self.config.timezone).to_rfc3339())
                .unwrap_or_else(|| target.as_millis().to_string()),
            self.config.timezone
        );
        tokio::signal::ctrl_c().await?;
        handle.shutdown().await;
        Ok(())
    }

    #[doc(hidden)]
    async fn sampler_loop(self, mut shutdown_rx: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.config.sample_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let target = self.target().await;
        self.system_event_sender
            .send(SystemEvent::EngineStarted {
                timestamp: Instant::now(),
                target,
            })
            .ok();

        let mut sample_count: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => {
                    sample_count += 1;
                    let frame = self.sample_once(sample_count).await;
                    trace!("Sample #{} at {}: {:?}", frame.sample, frame.corrected_now, frame.remaining);
                    self.frame_event_sender.send(frame).ok();
                }
            }
        }
        debug!("Sampler stopped after {} samples.", sample_count);
    }

    /// One complete sampler tick: read the corrected time, detect crossings,
    /// dispatch them and sweep expired effects.
    ///
    /// Crossings are detected on corrected time. Effect lifetimes and
    /// follow-ups run on the effect clock, so an offset jump from a re-sync
    /// never stretches or cuts them short.
    async fn sample_once(&self, sample: u64) -> FrameEvent {
        let corrected_now = self.corrected_now();
        let effect_now = self.effect_clock();
        let mut countdown = self.countdown.lock().await;
        let result = countdown.boundary.sample(corrected_now);
        for event in &result.events {
            match event {
                BoundaryEvent::SecondTick | BoundaryEvent::FinalCountdownTick { .. } => {}
                BoundaryEvent::Completed => info!("Target reached."),
                other => debug!("Boundary crossed: {:?} ({:?})", other, result.remaining),
            }
        }
        countdown.dispatcher.handle(&result, effect_now);
        countdown.dispatcher.sweep(effect_now);
        let scene = Arc::new(countdown.dispatcher.snapshot(effect_now));
        FrameEvent {
            sample,
            corrected_now,
            effect_clock: effect_now,
            remaining: result.remaining,
            boundaries: result.events,
            scene,
        }
    }

    #[doc(hidden)]
    async fn sync_loop<A: TimeAuthority>(
        self,
        sync: ClockSync<A>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        // The first tick completes immediately, which gives the startup sync.
        let mut ticker = tokio::time::interval(self.config.sync_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => {}
                _ = self.sync_now.notified() => ticker.reset(),
            }

            self.publish_sync_status(SyncStatus::Syncing);
            let status = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                status = sync.sync_quietly() => status,
            };
            self.publish_sync_status(status);
        }
        debug!("Sync loop stopped.");
    }

    fn publish_sync_status(&self, status: SyncStatus) {
        let previous = self.sync_status.send_replace(status);
        if previous != status {
            self.system_event_sender
                .send(SystemEvent::SyncStatusChanged {
                    status,
                    offset: self.offset.load(),
                })
                .ok();
        }
    }

    #[doc(hidden)]
    async fn motion_loop(
        self,
        mut readings: mpsc::Receiver<MotionReading>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let mut adapter = MotionAdapter::new();
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                reading = readings.recv() => {
                    let Some(reading) = reading else {
                        debug!("Motion sensor channel closed.");
                        break;
                    };
                    let update = adapter.process(reading, self.effect_clock());
                    self.motion_event_sender
                        .send(MotionEvent::Moved {
                            parallax: update.parallax,
                            shaking: update.shaking,
                        })
                        .ok();
                    if update.shake_detected {
                        debug!("Shake gesture detected.");
                        self.motion_event_sender.send(MotionEvent::ShakeDetected).ok();
                    }
                }
            }
        }
    }
}

// Public API implementation block.
impl CountdownEngine {
    pub fn config(&self) -> &CountdownConfig {
        &self.config
    }

    /// Local time with the latest published offset applied.
    pub fn corrected_now(&self) -> EpochMillis {
        self.offset.load().correct(self.clock.now_millis())
    }

    /// Milliseconds since the engine was created, on the monotonic clock that
    /// effect lifetimes, deferred follow-ups and the shake cooldown use.
    pub fn effect_clock(&self) -> EpochMillis {
        EpochMillis::try_from(self.effect_epoch.elapsed().as_millis()).unwrap_or(EpochMillis::MAX)
    }

    pub fn clock_offset(&self) -> ClockOffset {
        self.offset.load()
    }

    pub fn sync_status(&self) -> SyncStatus {
        *self.sync_status.borrow()
    }

    /// Requests an immediate re-sync. The regular interval restarts from it.
    pub fn sync_now(&self) {
        self.sync_now.notify_one();
    }

    pub fn haptics(&self) -> &Haptics {
        &self.haptics
    }

    pub async fn target(&self) -> TargetInstant {
        self.countdown.lock().await.boundary.target()
    }

    /// Remaining time at the corrected now, without advancing the detector.
    pub async fn remaining(&self) -> RemainingTime {
        let now = self.corrected_now();
        self.countdown.lock().await.boundary.remaining_at(now)
    }

    pub async fn mode(&self) -> DisplayMode {
        self.countdown.lock().await.dispatcher.mode()
    }

    pub async fn effect_counts(&self) -> EffectCounts {
        self.countdown.lock().await.dispatcher.counts()
    }

    /// Re-arms the countdown, optionally against a new target.
    ///
    /// Detector history, sticky latches, live effects and pending follow-ups
    /// are all cleared under one lock acquisition.
    pub async fn reset_countdown(&self, new_target: Option<TargetInstant>) -> TargetInstant {
        let target = {
            let mut countdown = self.countdown.lock().await;
            countdown.boundary.reset(new_target);
            countdown.dispatcher.reset();
            countdown.boundary.target()
        };
        info!("Countdown reset. Target: {}", target.as_millis());
        self.system_event_sender
            .send(SystemEvent::CountdownReset { target })
            .ok();
        target
    }

    /// Resets against a target `seconds_from_now` seconds after the corrected now.
    ///
    /// A delay that does not fit the millisecond timeline leaves the running
    /// countdown untouched.
    pub async fn set_test_target(
        &self,
        seconds_from_now: u64,
    ) -> Result<TargetInstant, ConfigError> {
        let at = seconds_from_now
            .checked_mul(1_000)
            .and_then(|ms| EpochMillis::try_from(ms).ok())
            .and_then(|ms| self.corrected_now().checked_add(ms))
            .ok_or(ConfigError::TargetOutOfRange(seconds_from_now))?;
        Ok(self
            .reset_countdown(Some(TargetInstant::from_millis(at)))
            .await)
    }

    /// Subscribes to the `SystemEvent` stream.
    pub fn subscribe_system_events(&self) -> broadcast::Receiver<SystemEvent> {
        self.system_event_sender.subscribe()
    }

    /// Subscribes to the `FrameEvent` stream.
    pub fn subscribe_frame_events(&self) -> broadcast::Receiver<FrameEvent> {
        self.frame_event_sender.subscribe()
    }

    /// Subscribes to the `MotionEvent` stream.
    pub fn subscribe_motion_events(&self) -> broadcast::Receiver<MotionEvent> {
        self.motion_event_sender.subscribe()
    }

    /// Watches the sync status without going through the event stream.
    pub fn subscribe_sync_status(&self) -> watch::Receiver<SyncStatus> {
        self.sync_status.subscribe()
    }
}
