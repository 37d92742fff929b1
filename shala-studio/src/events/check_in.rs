use log::info;
use shala_core::{CheckInData, EligibilityError, PrimaryKey};

use crate::{Activity, DatabaseError, EventManager, NewCheckIn, StudioError, StudioResult};

impl EventManager {
    /// Reserves a spot in the event, spending one check-in of the user
    pub async fn check_in(
        &self,
        user_id: PrimaryKey,
        event_id: PrimaryKey,
    ) -> StudioResult<CheckInData> {
        let database = &self.context.database;

        let event = database.event_by_id(event_id).await?;
        let user = database.user_by_id(user_id).await?;

        self.context
            .eligibility()
            .ensure_can_check_in(&event, &user)?;

        // The rules are checked again by the database, in case a concurrent
        // request took the last spot or spent the last check-in in the meantime
        let check_in = database
            .create_check_in(NewCheckIn { event_id, user_id })
            .await
            .map_err(check_in_rejection)?;

        let check_ins_left = database.user_by_id(user_id).await?.check_ins_quantity;

        info!(
            "{} checked in to {} ({} check-ins left)",
            user.username, event.title, check_ins_left
        );

        self.context.emit(Activity::CheckedIn {
            event_id,
            user_id,
            check_ins_left,
        });

        Ok(check_in)
    }

    /// Gives up the spot of the user in the event, restoring one check-in
    pub async fn cancel_check_in(
        &self,
        user_id: PrimaryKey,
        event_id: PrimaryKey,
    ) -> StudioResult<()> {
        let database = &self.context.database;
        let event = database.event_by_id(event_id).await?;

        self.context
            .eligibility()
            .ensure_can_cancel_check_in(&event, user_id)?;

        database
            .delete_check_in(event_id, user_id)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound {
                    resource: "check in",
                    ..
                } => EligibilityError::NotCheckedIn.into(),
                e => StudioError::from(e),
            })?;

        let user = database.user_by_id(user_id).await?;

        info!(
            "{} cancelled their check-in to {} ({} check-ins left)",
            user.username, event.title, user.check_ins_quantity
        );

        self.context.emit(Activity::CheckInCancelled {
            event_id,
            user_id,
            check_ins_left: user.check_ins_quantity,
        });

        Ok(())
    }
}

/// Turns a check-in refused by the database into the rule it broke
fn check_in_rejection(error: DatabaseError) -> StudioError {
    match error {
        DatabaseError::Conflict { .. } => EligibilityError::AlreadyCheckedIn.into(),
        DatabaseError::Exhausted {
            resource: "event", ..
        } => EligibilityError::NoVacancy.into(),
        DatabaseError::Exhausted {
            resource: "user", ..
        } => EligibilityError::InsufficientBalance.into(),
        e => StudioError::from(e),
    }
}
