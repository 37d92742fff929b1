use log::info;
use shala_core::{CheckInData, PrimaryKey, UserData};

use crate::{Activity, AttendanceUpdate, EventManager, StudioResult};

impl EventManager {
    /// Records who attended a started event. Attendance can be overwritten any number of times.
    pub async fn update_attendance(
        &self,
        actor: &UserData,
        event_id: PrimaryKey,
        updates: Vec<AttendanceUpdate>,
    ) -> StudioResult<Vec<CheckInData>> {
        let database = &self.context.database;
        let event = database.event_by_id(event_id).await?;

        self.context
            .eligibility()
            .ensure_can_record_attendance(&event, actor)?;

        if updates.is_empty() {
            return Ok(vec![]);
        }

        let changes: Vec<_> = updates
            .iter()
            .map(|u| (u.check_in_id, u.attendance))
            .collect();

        let updated = database.update_attendance(event_id, updates).await?;

        info!(
            "{} recorded attendance of {} check-ins for {}",
            actor.username,
            updated.len(),
            event.title
        );

        self.context.emit(Activity::AttendanceRecorded {
            event_id,
            recorded_by: actor.id,
            changes,
        });

        Ok(updated)
    }
}
