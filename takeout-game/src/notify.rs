//! Outbound announcements for new orders and condition alerts.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Opaque id of a posted announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementKind {
    Order,
    Condition,
}

/// Metadata accompanying an announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnounceContext {
    pub kind: AnnouncementKind,
    /// Display name of the poster.
    pub sender: String,
    pub avatar_url: Option<String>,
    /// Seconds after which the channel may delete the message on its own.
    pub expires_after: Option<u32>,
    pub order_id: Option<String>,
    pub restaurant: Option<String>,
}

impl AnnounceContext {
    #[must_use]
    pub fn order(sender: &str, avatar_url: &str, order_id: &str, restaurant: &str) -> Self {
        Self {
            kind: AnnouncementKind::Order,
            sender: sender.to_string(),
            avatar_url: Some(avatar_url.to_string()),
            expires_after: None,
            order_id: Some(order_id.to_string()),
            restaurant: Some(restaurant.to_string()),
        }
    }

    #[must_use]
    pub fn condition(sender: &str, restaurant: &str, expires_after: u32) -> Self {
        Self {
            kind: AnnouncementKind::Condition,
            sender: sender.to_string(),
            avatar_url: None,
            expires_after: Some(expires_after),
            order_id: None,
            restaurant: Some(restaurant.to_string()),
        }
    }
}

/// Channel that shows messages to the player.
pub trait Announcer {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Post a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel rejects or cannot deliver the message.
    fn announce(
        &mut self,
        message: &str,
        context: &AnnounceContext,
    ) -> Result<MessageHandle, Self::Error>;

    /// Remove a previously posted message. Unknown handles are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel cannot be reached.
    fn retract(&mut self, handle: MessageHandle) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnnounceError {
    #[error("announcement channel unavailable")]
    Unavailable,
}

/// An announcement kept by [`RecordingAnnouncer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posted {
    pub handle: MessageHandle,
    pub message: String,
    pub context: AnnounceContext,
}

#[derive(Debug, Default)]
struct Recording {
    next_handle: u64,
    live: Vec<Posted>,
    retracted: Vec<Posted>,
    failures_pending: u32,
}

/// In-memory announcer; clones observe the same recording.
#[derive(Debug, Clone, Default)]
pub struct RecordingAnnouncer {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingAnnouncer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Fail the next `count` announcements.
    pub fn fail_next(&self, count: u32) {
        self.lock().failures_pending = count;
    }

    /// Messages currently visible.
    #[must_use]
    pub fn live(&self) -> Vec<Posted> {
        self.lock().live.clone()
    }

    #[must_use]
    pub fn retracted(&self) -> Vec<Posted> {
        self.lock().retracted.clone()
    }

    /// Live messages of one kind.
    #[must_use]
    pub fn live_of(&self, kind: AnnouncementKind) -> Vec<Posted> {
        self.lock()
            .live
            .iter()
            .filter(|posted| posted.context.kind == kind)
            .cloned()
            .collect()
    }
}

impl Announcer for RecordingAnnouncer {
    type Error = AnnounceError;

    fn announce(
        &mut self,
        message: &str,
        context: &AnnounceContext,
    ) -> Result<MessageHandle, Self::Error> {
        let mut recording = self.lock();
        if recording.failures_pending > 0 {
            recording.failures_pending -= 1;
            return Err(AnnounceError::Unavailable);
        }
        recording.next_handle += 1;
        let handle = MessageHandle(recording.next_handle);
        recording.live.push(Posted {
            handle,
            message: message.to_string(),
            context: context.clone(),
        });
        Ok(handle)
    }

    fn retract(&mut self, handle: MessageHandle) -> Result<(), Self::Error> {
        let mut recording = self.lock();
        if let Some(index) = recording.live.iter().position(|p| p.handle == handle) {
            let posted = recording.live.remove(index);
            recording.retracted.push(posted);
        }
        Ok(())
    }
}

/// Announcer that writes every message to the log.
#[derive(Debug, Clone, Default)]
pub struct LogAnnouncer {
    next_handle: u64,
}

impl Announcer for LogAnnouncer {
    type Error = std::convert::Infallible;

    fn announce(
        &mut self,
        message: &str,
        context: &AnnounceContext,
    ) -> Result<MessageHandle, Self::Error> {
        self.next_handle += 1;
        info!("[{}] {}: {}", self.next_handle, context.sender, message);
        Ok(MessageHandle(self.next_handle))
    }

    fn retract(&mut self, handle: MessageHandle) -> Result<(), Self::Error> {
        info!("[{}] retracted", handle.0);
        Ok(())
    }
}

/// Retract a message, logging rather than propagating failures.
pub(crate) fn retract_quietly<A: Announcer>(announcer: &mut A, handle: MessageHandle) {
    if let Err(err) = announcer.retract(handle) {
        warn!("failed to retract announcement {}: {err}", handle.0);
    }
}
