mod activity;
mod auth;
mod db;
mod error;
mod events;
mod users;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use chrono::Utc;
use crossbeam::channel::{bounded, TrySendError};
use log::warn;
use shala_core::{Config, Eligibility};

pub use activity::*;
pub use auth::*;
pub use db::*;
pub use error::*;
pub use events::*;
pub use users::*;

/// The shala studio, facilitating authentication, events, check-ins and attendance.
pub struct Studio {
    context: StudioContext,
    activity_receiver: ActivityReceiver,

    pub auth: Auth,
    pub events: EventManager,
    pub users: UserManager,
}

/// A type passed to the managers of the studio, to access state and emit activity.
#[derive(Clone)]
pub struct StudioContext {
    pub config: Config,
    pub database: SharedDatabase,

    activity_sender: ActivitySender,
}

impl Studio {
    /// How much activity can pile up before new activity is dropped
    const ACTIVITY_CAPACITY: usize = 1024;

    pub fn new(config: Config, database: SharedDatabase) -> Self {
        let (activity_sender, activity_receiver) = bounded(Self::ACTIVITY_CAPACITY);

        let context = StudioContext {
            config,
            database: database.clone(),
            activity_sender,
        };

        Self {
            auth: Auth::new(&database),
            events: EventManager::new(&context),
            users: UserManager::new(&context),
            activity_receiver,
            context,
        }
    }

    /// Creates a studio backed by a [MemoryDatabase]
    pub fn in_memory(config: Config) -> Self {
        Self::new(config, Arc::new(MemoryDatabase::new()))
    }

    /// Returns a receiver of everything that happens in the studio
    pub fn activity(&self) -> ActivityReceiver {
        self.activity_receiver.clone()
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }
}

impl StudioContext {
    /// Returns the rules as they apply right now
    pub fn eligibility(&self) -> Eligibility {
        Eligibility::new(&self.config, Utc::now())
    }

    pub fn emit(&self, activity: Activity) {
        match self.activity_sender.try_send(activity) {
            Ok(_) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(activity)) => {
                warn!("Activity backlog is full, dropping {:?}", activity)
            }
        }
    }
}
