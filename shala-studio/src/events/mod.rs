mod attendance;
mod check_in;

use log::info;
use shala_core::{CheckInData, EligibilityError, EventData, PrimaryKey, Role, UserData};

use crate::{
    Activity, DatabaseError, EventRange, NewEvent, StudioContext, StudioError, StudioResult,
    UpdatedEvent,
};

/// Manages the calendar of events and everything users do with them
pub struct EventManager {
    context: StudioContext,
}

/// Every rule evaluated for a single user and event, as of now
#[derive(Debug, Clone)]
pub struct EventEligibility {
    pub minutes_to_event: Option<i64>,
    pub has_started: bool,
    pub has_checked_in: bool,
    pub still_has_vacancy: bool,
    pub can_check_in: bool,
    /// Why the user can't check in, if they can't
    pub check_in_denial: Option<EligibilityError>,
    pub can_cancel_check_in: bool,
    pub can_enter: bool,
    pub can_view_recording: bool,
    pub can_manage: bool,
}

impl EventManager {
    pub fn new(context: &StudioContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn event(&self, event_id: PrimaryKey) -> StudioResult<EventData> {
        Ok(self.context.database.event_by_id(event_id).await?)
    }

    /// Lists the calendar, recorded only events come last
    pub async fn list(&self, range: EventRange) -> StudioResult<Vec<EventData>> {
        if let (Some(from), Some(to)) = (range.from, range.to) {
            if from > to {
                return Err(StudioError::Invalid("Range must start before it ends"));
            }
        }

        Ok(self.context.database.list_events(range).await?)
    }

    /// Creates an event. Instructors can only create events they teach themselves.
    pub async fn create_event(
        &self,
        actor: &UserData,
        mut new_event: NewEvent,
    ) -> StudioResult<EventData> {
        match actor.role {
            Role::Admin => {}
            Role::Instructor => match new_event.instructor_id {
                None => new_event.instructor_id = Some(actor.id),
                Some(id) if id == actor.id => {}
                Some(_) => {
                    return Err(StudioError::Forbidden(
                        "Instructors can only create their own events",
                    ))
                }
            },
            Role::User => return Err(StudioError::Forbidden("Users cannot create events")),
        }

        if let Some(instructor_id) = new_event.instructor_id {
            let instructor = self.context.database.user_by_id(instructor_id).await?;

            if instructor.role == Role::User {
                return Err(StudioError::Invalid("Event instructor must be an instructor"));
            }
        }

        let event = self.context.database.create_event(new_event).await?;

        info!("{} created event {} ({})", actor.username, event.title, event.id);

        self.context.emit(Activity::EventCreated {
            event_id: event.id,
            created_by: actor.id,
        });

        Ok(event)
    }

    pub async fn update_event(
        &self,
        actor: &UserData,
        updated_event: UpdatedEvent,
    ) -> StudioResult<EventData> {
        let event = self.context.database.event_by_id(updated_event.id).await?;

        if !event.can_be_managed_by(actor) {
            return Err(EligibilityError::NotManager.into());
        }

        if let Some(max) = updated_event.check_ins_max_quantity {
            if !event.can_hold(max) {
                return Err(EligibilityError::CapacityBelowCheckIns.into());
            }
        }

        // Check-ins taken since the event was read are caught by the database
        let event = self
            .context
            .database
            .update_event(updated_event)
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict {
                    field: "check_ins_max_quantity",
                    ..
                } => EligibilityError::CapacityBelowCheckIns.into(),
                e => StudioError::from(e),
            })?;

        info!("{} updated event {}", actor.username, event.id);

        self.context.emit(Activity::EventUpdated {
            event_id: event.id,
            updated_by: actor.id,
        });

        Ok(event)
    }

    /// Lists the check-ins of an event, only managers of the event can see them
    pub async fn check_ins(
        &self,
        actor: &UserData,
        event_id: PrimaryKey,
    ) -> StudioResult<Vec<CheckInData>> {
        let event = self.context.database.event_by_id(event_id).await?;

        if !event.can_be_managed_by(actor) {
            return Err(EligibilityError::NotManager.into());
        }

        Ok(event.check_ins)
    }

    /// Evaluates every rule for the user, so clients know which actions to offer
    pub async fn eligibility(
        &self,
        user: &UserData,
        event_id: PrimaryKey,
    ) -> StudioResult<EventEligibility> {
        let event = self.context.database.event_by_id(event_id).await?;
        let eligibility = self.context.eligibility();
        let check_in_denial = eligibility.ensure_can_check_in(&event, user).err();

        Ok(EventEligibility {
            minutes_to_event: eligibility.minutes_to_event(&event),
            has_started: eligibility.has_started(&event),
            has_checked_in: event.has_user_checked_in(user.id),
            still_has_vacancy: event.still_has_vacancy(),
            can_check_in: check_in_denial.is_none(),
            check_in_denial,
            can_cancel_check_in: eligibility.can_cancel_check_in(&event, user.id),
            can_enter: eligibility.can_enter(&event, user.id),
            can_view_recording: eligibility.can_view_recording(&event, user),
            can_manage: event.can_be_managed_by(user),
        })
    }

    /// Returns the url of the live stream, if the user may enter it
    pub async fn enter(&self, user: &UserData, event_id: PrimaryKey) -> StudioResult<String> {
        let event = self.context.database.event_by_id(event_id).await?;

        self.context.eligibility().ensure_can_enter(&event, user.id)?;

        event.live_url.ok_or(
            DatabaseError::NotFound {
                resource: "event",
                identifier: "live_url",
            }
            .into(),
        )
    }

    /// Returns the url of the recording, if the user may view it
    pub async fn recording(&self, user: &UserData, event_id: PrimaryKey) -> StudioResult<String> {
        let event = self.context.database.event_by_id(event_id).await?;

        self.context
            .eligibility()
            .ensure_can_view_recording(&event, user)?;

        event
            .recorded_url
            .ok_or(EligibilityError::RecordingNotAvailable.into())
    }
}

#[cfg(test)]
mod test {
    use chrono::{Duration, Utc};
    use shala_core::{Config, Schedule};

    use super::*;
    use crate::testing::{create_event, create_user, studio};

    #[tokio::test]
    async fn test_instructor_creates_own_events() {
        let studio = studio(Config::default());
        let instructor = create_user(&studio, "ines", Role::Instructor, 0).await;
        let other = create_user(&studio, "otto", Role::Instructor, 0).await;
        let student = create_user(&studio, "sam", Role::User, 0).await;

        let new_event = NewEvent {
            title: "Hatha".to_string(),
            description: None,
            start_date: Some(Utc::now() + Duration::hours(3)),
            duration_minutes: 60,
            check_ins_max_quantity: Some(12),
            is_live: true,
            is_premium: false,
            live_url: None,
            recorded_url: None,
            instructor_id: None,
        };

        let event = studio
            .events
            .create_event(&instructor, new_event.clone())
            .await
            .unwrap();
        assert_eq!(event.instructor_id, Some(instructor.id));

        let result = studio
            .events
            .create_event(
                &instructor,
                NewEvent {
                    instructor_id: Some(other.id),
                    ..new_event.clone()
                },
            )
            .await;
        assert!(matches!(result, Err(StudioError::Forbidden(_))));

        let result = studio.events.create_event(&student, new_event).await;
        assert!(matches!(result, Err(StudioError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_only_managers_update_events() {
        let studio = studio(Config::default());
        let admin = create_user(&studio, "ada", Role::Admin, 0).await;
        let instructor = create_user(&studio, "ines", Role::Instructor, 0).await;
        let event = create_event(&studio, Some(60), Some(5), None).await;

        let update = UpdatedEvent {
            id: event.id,
            title: Some("Power yoga".to_string()),
            ..Default::default()
        };

        let result = studio.events.update_event(&instructor, update.clone()).await;
        assert!(matches!(
            result,
            Err(StudioError::Eligibility(EligibilityError::NotManager))
        ));

        let updated = studio.events.update_event(&admin, update).await.unwrap();
        assert_eq!(updated.title, "Power yoga");
        assert_eq!(updated.check_ins_max_quantity, Some(5));
    }

    #[tokio::test]
    async fn test_capacity_cannot_drop_below_check_ins() {
        let studio = studio(Config::default());
        let admin = create_user(&studio, "ada", Role::Admin, 0).await;
        let event = create_event(&studio, Some(60), Some(3), None).await;

        for name in ["a", "b", "c"] {
            let user = create_user(&studio, name, Role::User, 1).await;
            studio.events.check_in(user.id, event.id).await.unwrap();
        }

        for max in [Some(1), None] {
            let result = studio
                .events
                .update_event(
                    &admin,
                    UpdatedEvent {
                        id: event.id,
                        check_ins_max_quantity: Some(max),
                        ..Default::default()
                    },
                )
                .await;

            assert!(matches!(
                result,
                Err(StudioError::Eligibility(
                    EligibilityError::CapacityBelowCheckIns
                ))
            ));
        }

        let event = studio.events.event(event.id).await.unwrap();
        assert_eq!(event.check_ins_max_quantity, Some(3));
        assert_eq!(event.check_ins.len(), 3);

        let event = studio
            .events
            .update_event(
                &admin,
                UpdatedEvent {
                    id: event.id,
                    check_ins_max_quantity: Some(Some(5)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(event.vacancy(), Some(2));
    }

    #[tokio::test]
    async fn test_event_becomes_recorded_only() {
        let studio = studio(Config::default());
        let admin = create_user(&studio, "ada", Role::Admin, 0).await;
        let event = create_event(&studio, Some(60), Some(3), None).await;

        let event = studio
            .events
            .update_event(
                &admin,
                UpdatedEvent {
                    id: event.id,
                    start_date: Some(None),
                    check_ins_max_quantity: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(event.schedule, Schedule::RecordedOnly);
        assert_eq!(event.check_ins_max_quantity, None);
    }

    #[tokio::test]
    async fn test_recording_access() {
        let studio = studio(Config::default());
        let student = create_user(&studio, "sam", Role::User, 0).await;
        let event = create_event(&studio, None, None, None).await;

        let result = studio.events.recording(&student, event.id).await;
        assert!(matches!(
            result,
            Err(StudioError::Eligibility(
                EligibilityError::SubscriptionRequired
            ))
        ));

        let student = studio
            .context
            .database
            .update_user(crate::UpdatedUser {
                id: student.id,
                expiration_date: Some(Utc::now() + Duration::days(30)),
                ..Default::default()
            })
            .await
            .unwrap();

        let url = studio.events.recording(&student, event.id).await.unwrap();
        assert_eq!(url, "https://videos.example.com/class");
    }

    #[tokio::test]
    async fn test_eligibility_summary() {
        let studio = studio(Config::default());
        let student = create_user(&studio, "sam", Role::User, 1).await;
        let event = create_event(&studio, Some(30), Some(1), None).await;

        let summary = studio.events.eligibility(&student, event.id).await.unwrap();
        assert!(summary.can_check_in);
        assert!(!summary.has_checked_in);
        assert!(!summary.can_cancel_check_in);

        studio.events.check_in(student.id, event.id).await.unwrap();
        let student = studio.users.user(student.id).await.unwrap();

        let summary = studio.events.eligibility(&student, event.id).await.unwrap();
        assert!(summary.has_checked_in);
        assert!(summary.can_cancel_check_in);
        assert!(summary.can_enter);
        assert!(!summary.still_has_vacancy);
        assert_eq!(
            summary.check_in_denial,
            Some(EligibilityError::AlreadyCheckedIn)
        );
    }

    #[tokio::test]
    async fn test_list_rejects_inverted_range() {
        let studio = studio(Config::default());
        let now = Utc::now();

        let result = studio
            .events
            .list(EventRange {
                from: Some(now),
                to: Some(now - Duration::days(1)),
            })
            .await;

        assert!(matches!(result, Err(StudioError::Invalid(_))));
    }
}
