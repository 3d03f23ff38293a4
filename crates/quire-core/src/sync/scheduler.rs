//! Scheduled sync for one signed-in session.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::{SyncEngine, SyncOutcome};

/// Host visibility, reported by whatever embeds the workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

#[derive(Debug)]
enum Control {
    Visibility(Visibility),
    Flush,
    Stop,
}

enum Event {
    Tick,
    Control(Control),
}

/// Handle to a running scheduler. Consumed by [`SyncHandle::stop`].
///
/// Dropping the handle stops the scheduler as well.
#[derive(Debug)]
pub struct SyncHandle {
    owner_id: String,
    control: mpsc::UnboundedSender<Control>,
    task: JoinHandle<()>,
}

impl SyncEngine {
    /// Schedule sync cycles for `owner_id` every `period`.
    ///
    /// One cycle runs immediately. Cycles are spawned so that a trigger which
    /// arrives while one is running is dropped by the single-flight guard
    /// instead of queueing behind it.
    pub fn start(self: &Arc<Self>, owner_id: impl Into<String>, period: Duration) -> SyncHandle {
        let owner_id = owner_id.into();
        let (control, receiver) = mpsc::unbounded_channel();

        self.set_scheduled(true);
        tracing::info!("Sync started for {owner_id}");
        let task = tokio::spawn(run(Arc::clone(self), owner_id.clone(), period, receiver));

        SyncHandle {
            owner_id,
            control,
            task,
        }
    }
}

impl SyncHandle {
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Report a visibility change.
    ///
    /// Both transitions sync once; hiding disarms the timer and showing re-arms it.
    pub fn set_visibility(&self, visibility: Visibility) {
        self.send(Control::Visibility(visibility));
    }

    /// Trigger one cycle now, outside the timer
    pub fn flush(&self) {
        self.send(Control::Flush);
    }

    /// Disarm the timer and wait for the scheduler to exit.
    ///
    /// A cycle already in flight runs to completion.
    pub async fn stop(self) {
        self.send(Control::Stop);
        if let Err(error) = self.task.await {
            tracing::warn!("Sync scheduler ended abnormally: {error}");
        }
    }

    /// Best-effort final sync on session teardown, then stop without waiting
    pub fn teardown(self) {
        self.send(Control::Flush);
        self.send(Control::Stop);
    }

    fn send(&self, message: Control) {
        if self.control.send(message).is_err() {
            tracing::debug!("Sync scheduler for {} already exited", self.owner_id);
        }
    }
}

async fn run(
    engine: Arc<SyncEngine>,
    owner_id: String,
    period: Duration,
    mut control: mpsc::UnboundedReceiver<Control>,
) {
    trigger(&engine, &owner_id, "start");
    let mut timer = Some(arm(period));

    loop {
        let event = tokio::select! {
            message = control.recv() => Event::Control(message.unwrap_or(Control::Stop)),
            () = next_tick(&mut timer) => Event::Tick,
        };

        match event {
            Event::Tick => trigger(&engine, &owner_id, "timer"),
            Event::Control(Control::Visibility(Visibility::Hidden)) => {
                trigger(&engine, &owner_id, "hidden");
                timer = None;
            }
            Event::Control(Control::Visibility(Visibility::Visible)) => {
                trigger(&engine, &owner_id, "visible");
                timer = Some(arm(period));
            }
            Event::Control(Control::Flush) => trigger(&engine, &owner_id, "flush"),
            Event::Control(Control::Stop) => break,
        }
    }

    engine.set_scheduled(false);
    tracing::info!("Sync stopped for {owner_id}");
}

fn arm(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn trigger(engine: &Arc<SyncEngine>, owner_id: &str, reason: &'static str) {
    let engine = Arc::clone(engine);
    let owner_id = owner_id.to_string();
    tokio::spawn(async move {
        match engine.sync(&owner_id).await {
            Ok(SyncOutcome::Completed(report)) if !report.is_clean() => {
                tracing::debug!("Sync ({reason}) finished with contained failures");
            }
            Ok(SyncOutcome::Skipped) => tracing::debug!("Sync ({reason}) skipped"),
            Ok(SyncOutcome::Completed(_)) => {}
            Err(error) => tracing::warn!("Sync ({reason}) failed: {error}"),
        }
    });
}
