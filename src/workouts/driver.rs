//! Async host for a session engine.
//!
//! One task owns the engine. Commands from the UI and ticks from the
//! [`Ticker`] are multiplexed in a single `select!`, so every event is applied
//! completely before the next one is looked at. Snapshots are published on a
//! `watch` channel and notable moments on a `broadcast` channel.
//!
//! Dropping the [`SessionHandle`] closes the command channel, which ends the
//! task and releases the ticker.

use crate::workouts::clock::{IntervalTicker, Ticker};
use crate::workouts::engine::SessionEngine;
use crate::workouts::types::{
    PersistenceFailure, PhaseKind, PrEvent, SessionError, SessionSnapshot, SessionSummary,
    SetObservation, SetRejection, Transition,
};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Capacity of the command queue.
const COMMAND_BUFFER: usize = 32;

/// Capacity of the event broadcast channel.
const EVENT_BUFFER: usize = 64;

/// Notable things that happened in a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Phase changed
    PhaseChanged { from: PhaseKind, to: PhaseKind },
    /// A personal record was hit
    PersonalRecord(PrEvent),
    /// The session finished
    Completed(SessionSummary),
    /// A write failed (the session carries on)
    PersistenceFailed(PersistenceFailure),
}

/// Actions that cannot fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Pause,
    Resume,
    SkipRest,
    SkipExercise,
    EndWorkout,
    DismissPr,
    AddRestTime(u32),
    ExtendRest,
}

enum Command {
    Start(oneshot::Sender<Result<Transition, SessionError>>),
    CompleteSet(
        SetObservation,
        oneshot::Sender<Result<Transition, SetRejection>>,
    ),
    Action(SessionAction, oneshot::Sender<Transition>),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    TakeFailures(oneshot::Sender<Vec<PersistenceFailure>>),
}

/// Errors returned through a [`SessionHandle`].
#[derive(Debug, Error)]
pub enum DriverError {
    /// The driver task has stopped
    #[error("Session driver is no longer running")]
    Closed,

    /// Session setup failed
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Set observation rejected
    #[error(transparent)]
    Rejected(#[from] SetRejection),
}

/// Owns a session engine and feeds it commands and ticks.
pub struct SessionDriver<T: Ticker> {
    engine: SessionEngine,
    ticker: T,
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
    reported_failures: usize,
}

impl SessionDriver<IntervalTicker> {
    /// Spawn a driver ticking at the engine's configured interval.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn_interval(engine: SessionEngine) -> SessionHandle {
        let period = Duration::from_millis(engine.settings().tick_interval_ms.max(1));
        SessionDriver::spawn(engine, IntervalTicker::new(period))
    }
}

impl<T: Ticker + 'static> SessionDriver<T> {
    /// Spawn a driver task for `engine`.
    pub fn spawn(engine: SessionEngine, ticker: T) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(engine.snapshot());
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

        let driver = SessionDriver {
            engine,
            ticker,
            commands: command_rx,
            snapshots: snapshot_tx,
            events: event_tx.clone(),
            reported_failures: 0,
        };

        let task = tokio::spawn(driver.run());

        SessionHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            events: event_tx,
            task,
        }
    }

    async fn run(mut self) {
        tracing::debug!("Session driver started for {}", self.engine.workout_id());
        let mut ticking = self.engine.is_timed();

        loop {
            tokio::select! {
                biased;

                _ = self.ticker.tick(), if ticking => {
                    let from = self.engine.phase();
                    self.engine.tick();
                    self.publish(from);
                }
                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle(command),
                        None => break,
                    }
                }
            }

            let timed = self.engine.is_timed();
            if timed && !ticking {
                self.ticker.reset();
            }
            ticking = timed;
        }

        tracing::debug!("Session driver stopped");
    }

    fn handle(&mut self, command: Command) {
        let from = self.engine.phase();

        match command {
            Command::Start(reply) => {
                let result = self.engine.start_workout();
                self.publish(from);
                let _ = reply.send(result);
            }
            Command::CompleteSet(observation, reply) => {
                let result = self.engine.complete_set(observation);
                self.publish(from);
                let _ = reply.send(result);
            }
            Command::Action(action, reply) => {
                let transition = self.apply(action);
                self.publish(from);
                let _ = reply.send(transition);
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.engine.snapshot());
            }
            Command::TakeFailures(reply) => {
                let failures = self.engine.take_persistence_failures();
                self.reported_failures = 0;
                self.publish(from);
                let _ = reply.send(failures);
            }
        }
    }

    fn apply(&mut self, action: SessionAction) -> Transition {
        match action {
            SessionAction::Pause => self.engine.pause(),
            SessionAction::Resume => self.engine.resume(),
            SessionAction::SkipRest => self.engine.skip_rest(),
            SessionAction::SkipExercise => self.engine.skip_exercise(),
            SessionAction::EndWorkout => self.engine.end_workout(),
            SessionAction::DismissPr => self.engine.dismiss_pr_celebration(),
            SessionAction::AddRestTime(seconds) => self.engine.add_rest_time(seconds),
            SessionAction::ExtendRest => self.engine.extend_rest(),
        }
    }

    fn publish(&mut self, from: PhaseKind) {
        let snapshot = self.engine.snapshot();

        if snapshot.phase != from {
            let _ = self.events.send(SessionEvent::PhaseChanged {
                from,
                to: snapshot.phase,
            });
            if let Some(event) = &snapshot.pending_pr {
                let _ = self.events.send(SessionEvent::PersonalRecord(event.clone()));
            }
            if let Some(summary) = &snapshot.summary {
                let _ = self.events.send(SessionEvent::Completed(summary.clone()));
            }
        }

        for failure in snapshot
            .persistence_failures
            .iter()
            .skip(self.reported_failures)
        {
            let _ = self
                .events
                .send(SessionEvent::PersistenceFailed(failure.clone()));
        }
        self.reported_failures = snapshot.persistence_failures.len();

        self.snapshots.send_replace(snapshot);
    }
}

/// UI-side handle to a running session.
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Start the workout.
    pub async fn start(&self) -> Result<Transition, DriverError> {
        let result = self.request(Command::Start).await?;
        Ok(result?)
    }

    /// Record the set under the cursor.
    pub async fn complete_set(&self, observation: SetObservation) -> Result<Transition, DriverError> {
        let result = self
            .request(|reply| Command::CompleteSet(observation, reply))
            .await?;
        Ok(result?)
    }

    /// Apply an action.
    pub async fn act(&self, action: SessionAction) -> Result<Transition, DriverError> {
        self.request(|reply| Command::Action(action, reply)).await
    }

    /// Pause the session.
    pub async fn pause(&self) -> Result<Transition, DriverError> {
        self.act(SessionAction::Pause).await
    }

    /// Resume the session.
    pub async fn resume(&self) -> Result<Transition, DriverError> {
        self.act(SessionAction::Resume).await
    }

    /// Skip the current rest.
    pub async fn skip_rest(&self) -> Result<Transition, DriverError> {
        self.act(SessionAction::SkipRest).await
    }

    /// Skip the rest of the current exercise (while paused).
    pub async fn skip_exercise(&self) -> Result<Transition, DriverError> {
        self.act(SessionAction::SkipExercise).await
    }

    /// End the workout early (while paused).
    pub async fn end_workout(&self) -> Result<Transition, DriverError> {
        self.act(SessionAction::EndWorkout).await
    }

    /// Dismiss a personal-record celebration.
    pub async fn dismiss_pr_celebration(&self) -> Result<Transition, DriverError> {
        self.act(SessionAction::DismissPr).await
    }

    /// Current snapshot, read from the engine after all earlier events.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, DriverError> {
        self.request(Command::Snapshot).await
    }

    /// Drain failed writes for retry.
    pub async fn take_persistence_failures(&self) -> Result<Vec<PersistenceFailure>, DriverError> {
        self.request(Command::TakeFailures).await
    }

    /// Latest published snapshot without a round trip.
    pub fn latest(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Observe snapshots as they are published.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Stop the driver and wait for it to release the ticker.
    pub async fn shutdown(self) -> Result<(), DriverError> {
        let SessionHandle { commands, task, .. } = self;
        drop(commands);
        task.await.map_err(|_| DriverError::Closed)
    }

    async fn request<R>(
        &self,
        command: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, DriverError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| DriverError::Closed)?;
        reply_rx.await.map_err(|_| DriverError::Closed)
    }
}
