//! Per-user FIFO dispatch of inbound messages to the engine.
//!
//! Each user gets an unbounded queue and one worker task, so a user's
//! messages are processed strictly in arrival order while different users
//! proceed in parallel. Idle workers exit, releasing the user's cached
//! session, and are recreated on demand.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ailvi_core::{Outbox, UserId};
use ailvi_service::DialogueEngine;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::types::{Inbound, Update};

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

type Queues = Arc<Mutex<HashMap<UserId, mpsc::UnboundedSender<Inbound>>>>;

pub struct Dispatcher {
    engine: Arc<DialogueEngine>,
    outbox: Arc<dyn Outbox>,
    queues: Queues,
    idle_timeout: Duration,
}

impl Dispatcher {
    #[must_use]
    pub fn new(engine: Arc<DialogueEngine>, outbox: Arc<dyn Outbox>) -> Self {
        Self {
            engine,
            outbox,
            queues: Arc::new(Mutex::new(HashMap::new())),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Number of users with a live worker.
    #[must_use]
    pub fn active_workers(&self) -> usize {
        self.queues.lock().len()
    }

    /// Queues a raw update. Non-text updates are dropped.
    pub fn dispatch_update(&self, update: Update) {
        let update_id = update.update_id;
        match update.into_inbound() {
            Some(inbound) => self.dispatch(inbound),
            None => tracing::debug!(update_id, "ignoring non-text update"),
        }
    }

    /// Queues a message behind any earlier ones from the same user. Must be
    /// called from within a tokio runtime.
    pub fn dispatch(&self, inbound: Inbound) {
        let mut queues = self.queues.lock();
        let inbound = match queues.get(&inbound.user_id) {
            Some(sender) => match sender.send(inbound) {
                Ok(()) => return,
                Err(mpsc::error::SendError(inbound)) => inbound,
            },
            None => inbound,
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        let user_id = inbound.user_id.clone();
        if sender.send(inbound).is_err() {
            return;
        }
        queues.insert(user_id.clone(), sender);
        drop(queues);

        tracing::debug!(user_id = %user_id, "starting session worker");
        tokio::spawn(worker(
            user_id,
            receiver,
            Arc::clone(&self.engine),
            Arc::clone(&self.outbox),
            Arc::clone(&self.queues),
            self.idle_timeout,
        ));
    }
}

async fn worker(
    user_id: UserId,
    mut receiver: mpsc::UnboundedReceiver<Inbound>,
    engine: Arc<DialogueEngine>,
    outbox: Arc<dyn Outbox>,
    queues: Queues,
    idle_timeout: Duration,
) {
    loop {
        match tokio::time::timeout(idle_timeout, receiver.recv()).await {
            Ok(Some(inbound)) => {
                engine
                    .handle_message(
                        &inbound.user_id,
                        inbound.username.as_deref(),
                        &inbound.text,
                        outbox.as_ref(),
                    )
                    .await;
            },
            Ok(None) => break,
            Err(_) => {
                // Senders only push while holding the map lock, so an empty
                // queue seen under the lock stays empty once we are removed.
                let idle = {
                    let mut map = queues.lock();
                    let idle = receiver.is_empty();
                    if idle {
                        map.remove(&user_id);
                    }
                    idle
                };
                if idle {
                    engine.release_session(&user_id).await;
                    break;
                }
            },
        }
    }
    tracing::debug!(user_id = %user_id, "session worker stopped");
}
