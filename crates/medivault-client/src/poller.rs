//! Background notification polling
//!
//! [`NotificationPoller::spawn`] starts a task that refreshes the unread
//! count and recent notifications on a fixed interval and publishes each
//! snapshot on a watch channel. The task stops when the handle is cancelled
//! or dropped, or when the session is torn down.

use std::time::Duration;

use medivault_core::NotificationFeed;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::client::MediVaultClient;
use crate::session::SessionState;

pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct NotificationPoller;

impl NotificationPoller {
    /// Poll at `config.poll_interval`
    pub fn spawn(client: MediVaultClient) -> PollerHandle {
        let interval = client.config().poll_interval;
        Self::spawn_with_interval(client, interval)
    }

    /// Intervals below [`MIN_POLL_INTERVAL`] are raised to it
    pub fn spawn_with_interval(client: MediVaultClient, interval: Duration) -> PollerHandle {
        let interval = interval.max(MIN_POLL_INTERVAL);
        let (feed_tx, feed_rx) = watch::channel(NotificationFeed::default());
        let task = tokio::spawn(run(client, interval, feed_tx));
        PollerHandle { task, feed: feed_rx }
    }
}

async fn run(client: MediVaultClient, interval: Duration, feed_tx: watch::Sender<NotificationFeed>) {
    let mut session_state = client.session().subscribe();
    if *session_state.borrow_and_update() == SessionState::LoggedOut {
        log::debug!("Not polling notifications: no session");
        return;
    }

    // Ticks missed during a slow fetch are still delivered, not coalesced
    let mut ticker = tokio::time::interval(interval);
    log::debug!("Polling notifications every {:?}", interval);

    loop {
        tokio::select! {
            changed = session_state.changed() => {
                if changed.is_err() || *session_state.borrow_and_update() == SessionState::LoggedOut {
                    log::debug!("Session ended, stopping notification poller");
                    break;
                }
            }
            _ = ticker.tick() => {
                match client.notification_feed().await {
                    Ok(feed) => {
                        if feed.unread_count != feed_tx.borrow().unread_count {
                            log::info!("{} unread notification(s)", feed.unread_count);
                        }
                        feed_tx.send_replace(feed);
                    }
                    Err(e) => log::warn!("Notification poll failed: {}", e),
                }
            }
        }
    }
}

/// Owner of a running poller. Dropping it stops the task.
#[derive(Debug)]
pub struct PollerHandle {
    task: JoinHandle<()>,
    feed: watch::Receiver<NotificationFeed>,
}

impl PollerHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to end, by cancellation or session teardown
    pub async fn stopped(mut self) {
        let task = &mut self.task;
        if let Err(e) = task.await {
            if !e.is_cancelled() {
                log::warn!("Notification poller ended abnormally: {}", e);
            }
        }
    }

    /// Receiver for every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<NotificationFeed> {
        self.feed.clone()
    }

    pub fn latest(&self) -> NotificationFeed {
        self.feed.borrow().clone()
    }

    pub fn unread_count(&self) -> u32 {
        self.feed.borrow().unread_count
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
