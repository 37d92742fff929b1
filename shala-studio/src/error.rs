use shala_core::EligibilityError;
use thiserror::Error;

use crate::DatabaseError;

pub type StudioResult<T> = Result<T, StudioError>;

#[derive(Debug, Error)]
pub enum StudioError {
    /// A rule of the studio doesn't allow the action right now
    #[error(transparent)]
    Eligibility(#[from] EligibilityError),
    /// The user is not allowed to perform the action at all
    #[error("{0}")]
    Forbidden(&'static str),
    /// The input doesn't make sense regardless of who sends it
    #[error("{0}")]
    Invalid(&'static str),
    #[error(transparent)]
    Db(#[from] DatabaseError),
}
