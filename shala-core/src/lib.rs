//! Domain model and check-in rules for shala.
//!
//! Nothing in here touches storage or the clock directly, every time-dependent
//! rule is evaluated against the `now` carried by an [Eligibility].

mod config;
mod eligibility;
mod event;
mod user;

#[cfg(test)]
mod test_util;

pub use config::*;
pub use eligibility::*;
pub use event::*;
pub use user::*;

/// The type used for primary keys in the database.
pub type PrimaryKey = i32;
