//! Drives sessions on tokio: one task per player, sleeping until the next due
//! event or the next command.

use chrono::{DateTime, TimeDelta, Utc};
use log::{info, warn};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::error::GameError;
use crate::ledger::PlayerStore;
use crate::notify::Announcer;
use crate::order::Order;
use crate::session::{ActiveOrder, GameSession, SubmissionOutcome};

const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("session task has stopped")]
    SessionClosed,
    #[error("a session for {0} is already running")]
    AlreadyRunning(String),
    #[error("session task failed: {0}")]
    Join(String),
    #[error(transparent)]
    Game(#[from] GameError),
}

enum Command {
    Submit {
        order_id: String,
        order: Box<Order>,
        reply: oneshot::Sender<Result<SubmissionOutcome, GameError>>,
    },
    ActiveOrders {
        reply: oneshot::Sender<Vec<ActiveOrder>>,
    },
    GetOrder {
        order_id: String,
        reply: oneshot::Sender<Option<ActiveOrder>>,
    },
    Discard {
        order_id: String,
        reply: oneshot::Sender<Result<ActiveOrder, GameError>>,
    },
}

/// Maps the tokio clock onto wall-clock timestamps from a fixed origin.
#[derive(Debug, Clone, Copy)]
struct Clock {
    origin: Instant,
    origin_utc: DateTime<Utc>,
}

impl Clock {
    fn new(origin_utc: DateTime<Utc>) -> Self {
        Self {
            origin: Instant::now(),
            origin_utc,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.origin.elapsed()).unwrap_or(TimeDelta::zero());
        self.origin_utc + elapsed
    }

    fn instant_for(&self, at: DateTime<Utc>) -> Instant {
        let offset = (at - self.origin_utc).to_std().unwrap_or(Duration::ZERO);
        self.origin + offset
    }
}

async fn sleep_until_due(wake: Option<Instant>) {
    match wake {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Handle to a session running on its own task.
#[derive(Debug)]
pub struct SessionHandle<S: PlayerStore, A: Announcer> {
    player_id: String,
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
    task: JoinHandle<GameSession<S, A>>,
}

impl<S, A> SessionHandle<S, A>
where
    S: PlayerStore + Send + 'static,
    A: Announcer + Send + 'static,
{
    #[must_use]
    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    /// Submit an order for scoring.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::SessionClosed`] once the task has stopped, or the
    /// session's own error.
    pub async fn submit(
        &self,
        order_id: &str,
        order: Order,
    ) -> Result<SubmissionOutcome, RuntimeError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Submit {
                order_id: order_id.to_string(),
                order: Box::new(order),
                reply,
            })
            .await
            .map_err(|_| RuntimeError::SessionClosed)?;
        let outcome = response.await.map_err(|_| RuntimeError::SessionClosed)?;
        Ok(outcome?)
    }

    /// Snapshot of the orders currently waiting.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::SessionClosed`] once the task has stopped.
    pub async fn active_orders(&self) -> Result<Vec<ActiveOrder>, RuntimeError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::ActiveOrders { reply })
            .await
            .map_err(|_| RuntimeError::SessionClosed)?;
        response.await.map_err(|_| RuntimeError::SessionClosed)
    }

    /// Look up one active order without consuming it.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::SessionClosed`] once the task has stopped.
    pub async fn get_order_by_id(
        &self,
        order_id: &str,
    ) -> Result<Option<ActiveOrder>, RuntimeError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::GetOrder {
                order_id: order_id.to_string(),
                reply,
            })
            .await
            .map_err(|_| RuntimeError::SessionClosed)?;
        response.await.map_err(|_| RuntimeError::SessionClosed)
    }

    /// Drop an order without scoring it; a replacement follows after the cooldown.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::SessionClosed`] once the task has stopped, or the
    /// session's own error (unknown ids are [`GameError::NotFound`]).
    pub async fn discard(&self, order_id: &str) -> Result<ActiveOrder, RuntimeError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Discard {
                order_id: order_id.to_string(),
                reply,
            })
            .await
            .map_err(|_| RuntimeError::SessionClosed)?;
        let discarded = response.await.map_err(|_| RuntimeError::SessionClosed)?;
        Ok(discarded?)
    }

    /// Ask the task to stop. Safe to call more than once.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.task.is_finished()
    }

    /// Stop the task and take the session back.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Join`] if the task panicked.
    pub async fn join(self) -> Result<GameSession<S, A>, RuntimeError> {
        self.cancel.cancel();
        self.task
            .await
            .map_err(|err| RuntimeError::Join(err.to_string()))
    }
}

/// Start `session` at `now` and run it on a new task.
///
/// # Errors
///
/// Returns the session's start error; nothing is spawned in that case.
pub fn spawn_session<S, A>(
    mut session: GameSession<S, A>,
    now: DateTime<Utc>,
) -> Result<SessionHandle<S, A>, GameError>
where
    S: PlayerStore + Send + 'static,
    A: Announcer + Send + 'static,
{
    session.start(now)?;
    let player_id = session.player_id().to_string();
    let (commands, inbox) = mpsc::channel(COMMAND_BUFFER);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(drive(session, inbox, cancel.clone(), Clock::new(now)));
    Ok(SessionHandle {
        player_id,
        commands,
        cancel,
        task,
    })
}

async fn drive<S, A>(
    mut session: GameSession<S, A>,
    mut inbox: mpsc::Receiver<Command>,
    cancel: CancellationToken,
    clock: Clock,
) -> GameSession<S, A>
where
    S: PlayerStore,
    A: Announcer,
{
    loop {
        let wake = session.next_due().map(|due| clock.instant_for(due));
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            command = inbox.recv() => {
                let Some(command) = command else {
                    break;
                };
                let now = clock.now();
                if let Err(err) = session.advance(now) {
                    warn!("session for {} failed to advance: {err}", session.player_id());
                }
                match command {
                    Command::Submit { order_id, order, reply } => {
                        let _ = reply.send(session.submit(&order_id, &order, now));
                    }
                    Command::ActiveOrders { reply } => {
                        let _ = reply.send(session.active_orders().cloned().collect());
                    }
                    Command::GetOrder { order_id, reply } => {
                        let _ = reply.send(session.get_order_by_id(&order_id).cloned());
                    }
                    Command::Discard { order_id, reply } => {
                        let _ = reply.send(session.discard(&order_id, now));
                    }
                }
            }
            () = sleep_until_due(wake) => {
                if let Err(err) = session.advance(clock.now()) {
                    warn!("session for {} failed to advance: {err}", session.player_id());
                }
            }
        }
    }
    session.stop();
    session
}

/// One running session per player.
#[derive(Debug)]
pub struct SessionRegistry<S: PlayerStore, A: Announcer> {
    sessions: HashMap<String, SessionHandle<S, A>>,
}

impl<S: PlayerStore, A: Announcer> Default for SessionRegistry<S, A> {
    fn default() -> Self {
        Self {
            sessions: HashMap::new(),
        }
    }
}

impl<S, A> SessionRegistry<S, A>
where
    S: PlayerStore + Send + 'static,
    A: Announcer + Send + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session unless the player already has a live one.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::AlreadyRunning`] for a duplicate player, or the
    /// session's start error.
    pub fn start(
        &mut self,
        session: GameSession<S, A>,
        now: DateTime<Utc>,
    ) -> Result<&SessionHandle<S, A>, RuntimeError> {
        let player_id = session.player_id().to_string();
        if self
            .sessions
            .get(&player_id)
            .is_some_and(|handle| !handle.is_stopped())
        {
            return Err(RuntimeError::AlreadyRunning(player_id));
        }
        let handle = spawn_session(session, now)?;
        info!("registered session for {player_id}");
        self.sessions.insert(player_id.clone(), handle);
        self.sessions
            .get(&player_id)
            .ok_or(RuntimeError::SessionClosed)
    }

    #[must_use]
    pub fn get(&self, player_id: &str) -> Option<&SessionHandle<S, A>> {
        self.sessions.get(player_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Stop a player's session and return it; `None` if there was none.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Join`] if the task panicked.
    pub async fn stop(
        &mut self,
        player_id: &str,
    ) -> Result<Option<GameSession<S, A>>, RuntimeError> {
        match self.sessions.remove(player_id) {
            Some(handle) => Ok(Some(handle.join().await?)),
            None => Ok(None),
        }
    }

    /// Stop every session.
    pub async fn stop_all(&mut self) {
        for (player_id, handle) in self.sessions.drain() {
            if let Err(err) = handle.join().await {
                warn!("session for {player_id} ended badly: {err}");
            }
        }
    }
}
