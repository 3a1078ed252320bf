//! Serialized event loop around a [`SessionController`]
//!
//! Fixes, heart-rate readings and user commands arrive on one mpsc channel
//! and the two periodic timers fire from `tokio::time::interval`s, all
//! handled by a single task so the controller never sees concurrent
//! mutation. Snapshots go out on a watch channel after every event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::collaborators::{HealthProvider, LocationProvider, SessionId, SessionStore};
use crate::controller::SessionController;
use crate::error::{TrackerError, TrackerResult};
use crate::metrics::{SessionMetrics, TrackerSnapshot, TrackingState};
use crate::sample::PositionSample;

const EVENT_QUEUE: usize = 256;

/// Seconds since the Unix epoch
pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Source of "now" for commands and timer ticks
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        current_timestamp()
    }
}

/// Clock moved by hand; clones share the same time
#[derive(Debug, Clone)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        ManualClock {
            bits: Arc::new(AtomicU64::new(start.to_bits())),
        }
    }

    pub fn set(&self, now: f64) {
        self.bits.store(now.to_bits(), Ordering::SeqCst);
    }

    pub fn advance(&self, secs: f64) {
        self.set(self.now() + secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

#[derive(Debug)]
pub enum TrackerCommand {
    Start {
        load_weight_kg: f64,
        reply: oneshot::Sender<TrackerResult<SessionId>>,
    },
    Pause,
    Resume,
    Stop {
        reply: oneshot::Sender<Option<SessionMetrics>>,
    },
    Toggle,
}

#[derive(Debug)]
pub enum TrackerEvent {
    Sample(PositionSample),
    HeartRate(f64),
    Command(TrackerCommand),
    Shutdown,
}

/// Cloneable front end of a running tracker task
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    events: mpsc::Sender<TrackerEvent>,
    snapshots: watch::Receiver<TrackerSnapshot>,
}

impl TrackerHandle {
    async fn send(&self, event: TrackerEvent) -> TrackerResult<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| TrackerError::ChannelClosed)
    }

    pub async fn send_sample(&self, sample: PositionSample) -> TrackerResult<()> {
        self.send(TrackerEvent::Sample(sample)).await
    }

    pub async fn send_heart_rate(&self, bpm: f64) -> TrackerResult<()> {
        self.send(TrackerEvent::HeartRate(bpm)).await
    }

    pub async fn start(&self, load_weight_kg: f64) -> TrackerResult<SessionId> {
        let (reply, response) = oneshot::channel();
        self.send(TrackerEvent::Command(TrackerCommand::Start {
            load_weight_kg,
            reply,
        }))
        .await?;
        response.await.map_err(|_| TrackerError::ChannelClosed)?
    }

    pub async fn pause(&self) -> TrackerResult<()> {
        self.send(TrackerEvent::Command(TrackerCommand::Pause)).await
    }

    pub async fn resume(&self) -> TrackerResult<()> {
        self.send(TrackerEvent::Command(TrackerCommand::Resume)).await
    }

    pub async fn toggle(&self) -> TrackerResult<()> {
        self.send(TrackerEvent::Command(TrackerCommand::Toggle)).await
    }

    /// Final metrics, or `None` when no session was running
    pub async fn stop(&self) -> TrackerResult<Option<SessionMetrics>> {
        let (reply, response) = oneshot::channel();
        self.send(TrackerEvent::Command(TrackerCommand::Stop { reply }))
            .await?;
        response.await.map_err(|_| TrackerError::ChannelClosed)
    }

    pub async fn shutdown(&self) -> TrackerResult<()> {
        self.send(TrackerEvent::Shutdown).await
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> TrackerSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackerSnapshot> {
        self.snapshots.clone()
    }
}

fn tick_period(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::from_secs(1)
    }
}

/// Spawn the tracker loop on the current tokio runtime.
///
/// The join handle yields the controller back once the loop ends, either
/// on [`TrackerEvent::Shutdown`] or when every handle has been dropped. A
/// session still running at that point is stopped first.
pub fn spawn_tracker<S, H, L, C>(
    controller: SessionController<S, H, L>,
    clock: C,
) -> (TrackerHandle, JoinHandle<SessionController<S, H, L>>)
where
    S: SessionStore + 'static,
    H: HealthProvider + 'static,
    L: LocationProvider + 'static,
    C: Clock,
{
    let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE);
    let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());

    let task = tokio::spawn(run_tracker(controller, clock, event_rx, snapshot_tx));
    let handle = TrackerHandle {
        events: event_tx,
        snapshots: snapshot_rx,
    };
    (handle, task)
}

async fn run_tracker<S, H, L, C>(
    mut controller: SessionController<S, H, L>,
    clock: C,
    mut events: mpsc::Receiver<TrackerEvent>,
    snapshots: watch::Sender<TrackerSnapshot>,
) -> SessionController<S, H, L>
where
    S: SessionStore,
    H: HealthProvider,
    L: LocationProvider,
    C: Clock,
{
    let mut auto_pause_timer = interval(tick_period(
        controller.config().auto_pause.check_interval_secs,
    ));
    let mut publish_timer = interval(tick_period(controller.config().publish_interval_secs));
    auto_pause_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    publish_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    log::debug!("Tracker loop running");
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(TrackerEvent::Sample(sample)) => {
                    controller.handle_sample(&sample);
                }
                Some(TrackerEvent::HeartRate(bpm)) => controller.on_heart_rate(bpm),
                Some(TrackerEvent::Command(command)) => {
                    apply_command(&mut controller, command, clock.now());
                }
                Some(TrackerEvent::Shutdown) | None => break,
            },
            _ = auto_pause_timer.tick() => {
                controller.on_auto_pause_tick(clock.now());
            }
            _ = publish_timer.tick() => {
                controller.on_publish_tick(clock.now());
            }
        }
        snapshots.send_replace(controller.snapshot());
    }

    if controller.state() != TrackingState::Stopped {
        log::warn!("Tracker shutting down with a session running, stopping it");
        controller.stop(clock.now());
        snapshots.send_replace(controller.snapshot());
    }
    log::debug!("Tracker loop finished");
    controller
}

fn apply_command<S, H, L>(controller: &mut SessionController<S, H, L>, command: TrackerCommand, now: f64)
where
    S: SessionStore,
    H: HealthProvider,
    L: LocationProvider,
{
    match command {
        TrackerCommand::Start {
            load_weight_kg,
            reply,
        } => {
            let result = controller.start(load_weight_kg, now);
            if let Err(e) = &result {
                log::error!("Failed to start session: {}", e);
            }
            // The caller may have given up waiting
            let _ = reply.send(result);
        }
        TrackerCommand::Pause => {
            controller.pause(now);
        }
        TrackerCommand::Resume => {
            controller.resume(now);
        }
        TrackerCommand::Toggle => {
            controller.toggle(now);
        }
        TrackerCommand::Stop { reply } => {
            let _ = reply.send(controller.stop(now));
        }
    }
}
