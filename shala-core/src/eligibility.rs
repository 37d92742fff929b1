use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{Config, EventData, PrimaryKey, UserData};

/// The reason a user can't do something with an event
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EligibilityError {
    #[error("Event has no start date")]
    NotScheduled,
    #[error("Event does not accept check-ins")]
    CheckInsDisabled,
    #[error("Event has already started")]
    AlreadyStarted,
    #[error("Event has not started yet")]
    NotStarted,
    #[error("User has already checked in to this event")]
    AlreadyCheckedIn,
    #[error("User has not checked in to this event")]
    NotCheckedIn,
    #[error("User has no check-ins left")]
    InsufficientBalance,
    #[error("Event has no vacancy left")]
    NoVacancy,
    /// Check-ins open a set amount of minutes before the event
    #[error("Check-in opens {0} minutes before the event starts")]
    CheckInNotOpen(i64),
    #[error("Check-in can only be cancelled within {0} minutes of the event")]
    CancelWindowClosed(i64),
    #[error("Event can no longer be entered")]
    EntryClosed,
    #[error("A subscription or a check-in is required to view this recording")]
    SubscriptionRequired,
    #[error("Event has no recording")]
    RecordingNotAvailable,
    #[error("User is not allowed to manage this event")]
    NotManager,
    /// The maximum would no longer cover the check-ins already taken
    #[error("Event already holds more check-ins than the new maximum allows")]
    CapacityBelowCheckIns,
}

impl EligibilityError {
    /// A machine readable identifier of the error
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotScheduled => "not_scheduled",
            Self::CheckInsDisabled => "check_ins_disabled",
            Self::AlreadyStarted => "already_started",
            Self::NotStarted => "not_started",
            Self::AlreadyCheckedIn => "already_checked_in",
            Self::NotCheckedIn => "not_checked_in",
            Self::InsufficientBalance => "insufficient_balance",
            Self::NoVacancy => "no_vacancy",
            Self::CheckInNotOpen(_) => "check_in_not_open",
            Self::CancelWindowClosed(_) => "cancel_window_closed",
            Self::EntryClosed => "entry_closed",
            Self::SubscriptionRequired => "subscription_required",
            Self::RecordingNotAvailable => "recording_not_available",
            Self::NotManager => "not_manager",
            Self::CapacityBelowCheckIns => "capacity_below_check_ins",
        }
    }

    /// The resource the failed precondition is about
    pub fn location(&self) -> &'static str {
        match self {
            Self::InsufficientBalance | Self::SubscriptionRequired | Self::NotManager => "user",
            Self::AlreadyCheckedIn | Self::NotCheckedIn => "check_in",
            _ => "event",
        }
    }

    /// Returns true if the error is about who the user is rather than the state of the event
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::NotManager)
    }
}

/// Evaluates the check-in rules at a fixed point in time
#[derive(Debug, Clone)]
pub struct Eligibility {
    config: Config,
    now: DateTime<Utc>,
}

impl Eligibility {
    pub fn new(config: &Config, now: DateTime<Utc>) -> Self {
        Self {
            config: config.clone(),
            now,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Returns false for events without a start date
    pub fn has_started(&self, event: &EventData) -> bool {
        event
            .schedule
            .start_date()
            .is_some_and(|start| start < self.now)
    }

    /// Whole minutes until the event starts, negative once it has started
    pub fn minutes_to_event(&self, event: &EventData) -> Option<i64> {
        event
            .schedule
            .start_date()
            .map(|start| (start - self.now).num_minutes())
    }

    pub fn ensure_can_enter(
        &self,
        event: &EventData,
        user_id: PrimaryKey,
    ) -> Result<(), EligibilityError> {
        let minutes = self
            .minutes_to_event(event)
            .ok_or(EligibilityError::NotScheduled)?;

        if !event.has_user_checked_in(user_id) {
            return Err(EligibilityError::NotCheckedIn);
        }

        if minutes <= -self.config.tolerance_minutes_to_enter_event {
            return Err(EligibilityError::EntryClosed);
        }

        Ok(())
    }

    /// Returns true if the user is checked in and the event started less than the tolerance ago
    pub fn can_enter(&self, event: &EventData, user_id: PrimaryKey) -> bool {
        self.ensure_can_enter(event, user_id).is_ok()
    }

    /// Returns the first check-in precondition that doesn't hold
    pub fn ensure_can_check_in(
        &self,
        event: &EventData,
        user: &UserData,
    ) -> Result<(), EligibilityError> {
        let minutes = self
            .minutes_to_event(event)
            .ok_or(EligibilityError::NotScheduled)?;

        if event.check_ins_max_quantity.is_none() {
            return Err(EligibilityError::CheckInsDisabled);
        }

        if self.has_started(event) {
            return Err(EligibilityError::AlreadyStarted);
        }

        if event.has_user_checked_in(user.id) {
            return Err(EligibilityError::AlreadyCheckedIn);
        }

        if user.check_ins_quantity <= 0 {
            return Err(EligibilityError::InsufficientBalance);
        }

        if !event.still_has_vacancy() {
            return Err(EligibilityError::NoVacancy);
        }

        if minutes > self.config.minutes_to_check_in {
            return Err(EligibilityError::CheckInNotOpen(
                self.config.minutes_to_check_in,
            ));
        }

        Ok(())
    }

    pub fn can_check_in(&self, event: &EventData, user: &UserData) -> bool {
        self.ensure_can_check_in(event, user).is_ok()
    }

    pub fn ensure_can_cancel_check_in(
        &self,
        event: &EventData,
        user_id: PrimaryKey,
    ) -> Result<(), EligibilityError> {
        if !event.has_user_checked_in(user_id) {
            return Err(EligibilityError::NotCheckedIn);
        }

        let minutes = self
            .minutes_to_event(event)
            .ok_or(EligibilityError::NotScheduled)?;

        if self.has_started(event) {
            return Err(EligibilityError::AlreadyStarted);
        }

        if minutes > self.config.minutes_to_cancel_check_in {
            return Err(EligibilityError::CancelWindowClosed(
                self.config.minutes_to_cancel_check_in,
            ));
        }

        Ok(())
    }

    pub fn can_cancel_check_in(&self, event: &EventData, user_id: PrimaryKey) -> bool {
        self.ensure_can_cancel_check_in(event, user_id).is_ok()
    }

    pub fn ensure_can_view_recording(
        &self,
        event: &EventData,
        user: &UserData,
    ) -> Result<(), EligibilityError> {
        if event.has_user_checked_in(user.id) || user.is_subscribed(self.now) {
            Ok(())
        } else {
            Err(EligibilityError::SubscriptionRequired)
        }
    }

    /// Subscribers can view every recording, everyone else only the ones they checked in to
    pub fn can_view_recording(&self, event: &EventData, user: &UserData) -> bool {
        self.ensure_can_view_recording(event, user).is_ok()
    }

    /// Attendance is recorded by a manager of the event once it has started
    pub fn ensure_can_record_attendance(
        &self,
        event: &EventData,
        user: &UserData,
    ) -> Result<(), EligibilityError> {
        if !event.can_be_managed_by(user) {
            return Err(EligibilityError::NotManager);
        }

        if !self.has_started(event) {
            return Err(EligibilityError::NotStarted);
        }

        Ok(())
    }

    pub fn can_record_attendance(&self, event: &EventData, user: &UserData) -> bool {
        self.ensure_can_record_attendance(event, user).is_ok()
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;
    use crate::{
        test_util::{check_in, event, event_starting_in, now, user},
        Role, Schedule,
    };

    fn eligibility() -> Eligibility {
        Eligibility::new(&Config::default(), now())
    }

    fn config_with_check_in_window(minutes: i64) -> Config {
        Config {
            minutes_to_check_in: minutes,
            ..Default::default()
        }
    }

    #[test]
    fn test_has_started() {
        let eligibility = eligibility();

        assert!(eligibility.has_started(&event_starting_in(-1, Some(10))));
        assert!(!eligibility.has_started(&event_starting_in(10, Some(10))));
        assert!(!eligibility.has_started(&event(Schedule::RecordedOnly, Some(10))));
    }

    #[test]
    fn test_minutes_to_event() {
        let eligibility = eligibility();

        assert_eq!(
            eligibility.minutes_to_event(&event_starting_in(42, None)),
            Some(42)
        );
        assert_eq!(
            eligibility.minutes_to_event(&event_starting_in(-5, None)),
            Some(-5)
        );
        assert_eq!(
            eligibility.minutes_to_event(&event(Schedule::RecordedOnly, None)),
            None
        );
    }

    #[test]
    fn test_check_in_succeeds_within_window() {
        let eligibility = Eligibility::new(&config_with_check_in_window(15), now());
        let mut event = event_starting_in(10, Some(1));
        let first = user(1, Role::User, 3);
        let second = user(2, Role::User, 3);

        assert!(eligibility.can_check_in(&event, &first));
        check_in(&mut event, first.id);

        assert_eq!(
            eligibility.ensure_can_check_in(&event, &second),
            Err(EligibilityError::NoVacancy)
        );
    }

    #[test]
    fn test_check_in_requires_balance_regardless_of_vacancy() {
        let eligibility = eligibility();
        let event = event_starting_in(10, Some(20));
        let broke = user(1, Role::User, 0);

        assert!(event.still_has_vacancy());
        assert_eq!(
            eligibility.ensure_can_check_in(&event, &broke),
            Err(EligibilityError::InsufficientBalance)
        );
    }

    #[test]
    fn test_check_in_is_closed_once_started() {
        let eligibility = eligibility();
        let event = event_starting_in(-1, Some(20));
        let student = user(1, Role::User, 5);

        assert_eq!(
            eligibility.ensure_can_check_in(&event, &student),
            Err(EligibilityError::AlreadyStarted)
        );
    }

    #[test]
    fn test_check_in_opens_shortly_before_start() {
        let eligibility = Eligibility::new(&config_with_check_in_window(15), now());
        let student = user(1, Role::User, 5);

        assert_eq!(
            eligibility.ensure_can_check_in(&event_starting_in(16, Some(5)), &student),
            Err(EligibilityError::CheckInNotOpen(15))
        );
        assert!(eligibility.can_check_in(&event_starting_in(15, Some(5)), &student));
    }

    #[test]
    fn test_check_in_denies_incomplete_events() {
        let eligibility = eligibility();
        let student = user(1, Role::User, 5);

        assert_eq!(
            eligibility.ensure_can_check_in(&event(Schedule::RecordedOnly, Some(5)), &student),
            Err(EligibilityError::NotScheduled)
        );
        assert_eq!(
            eligibility.ensure_can_check_in(&event_starting_in(10, None), &student),
            Err(EligibilityError::CheckInsDisabled)
        );
    }

    #[test]
    fn test_check_in_only_once() {
        let eligibility = eligibility();
        let mut event = event_starting_in(10, Some(5));
        let student = user(1, Role::User, 5);

        check_in(&mut event, student.id);

        assert_eq!(
            eligibility.ensure_can_check_in(&event, &student),
            Err(EligibilityError::AlreadyCheckedIn)
        );
    }

    #[test]
    fn test_check_in_implies_vacancy() {
        let eligibility = eligibility();

        for max in 0..4 {
            for taken in 0..4 {
                let mut event = event_starting_in(30, Some(max));
                for user_id in 0..taken {
                    check_in(&mut event, 100 + user_id);
                }

                let student = user(1, Role::User, 1);

                if eligibility.can_check_in(&event, &student) {
                    assert!(event.still_has_vacancy());
                }
            }
        }
    }

    #[test]
    fn test_cancel_check_in() {
        let eligibility = eligibility();
        let mut event = event_starting_in(30, Some(5));

        assert_eq!(
            eligibility.ensure_can_cancel_check_in(&event, 1),
            Err(EligibilityError::NotCheckedIn)
        );

        check_in(&mut event, 1);
        assert!(eligibility.can_cancel_check_in(&event, 1));
    }

    #[test]
    fn test_cancel_fails_after_start() {
        let eligibility = eligibility();
        let mut event = event_starting_in(-1, Some(5));
        check_in(&mut event, 1);

        assert!(eligibility.has_started(&event));
        assert_eq!(
            eligibility.ensure_can_cancel_check_in(&event, 1),
            Err(EligibilityError::AlreadyStarted)
        );
    }

    #[test]
    fn test_cancel_window() {
        let config = Config {
            minutes_to_cancel_check_in: 60,
            ..Default::default()
        };
        let eligibility = Eligibility::new(&config, now());

        let mut far_away = event_starting_in(61, Some(5));
        check_in(&mut far_away, 1);

        assert_eq!(
            eligibility.ensure_can_cancel_check_in(&far_away, 1),
            Err(EligibilityError::CancelWindowClosed(60))
        );

        let mut close = event_starting_in(59, Some(5));
        check_in(&mut close, 1);

        assert!(eligibility.can_cancel_check_in(&close, 1));
    }

    #[test]
    fn test_enter_with_tolerance() {
        let eligibility = eligibility();

        let mut event = event_starting_in(5, Some(5));
        assert_eq!(
            eligibility.ensure_can_enter(&event, 1),
            Err(EligibilityError::NotCheckedIn)
        );

        check_in(&mut event, 1);
        assert!(eligibility.can_enter(&event, 1));

        let mut late = event_starting_in(-14, Some(5));
        check_in(&mut late, 1);
        assert!(eligibility.can_enter(&late, 1));

        let mut too_late = event_starting_in(-15, Some(5));
        check_in(&mut too_late, 1);
        assert_eq!(
            eligibility.ensure_can_enter(&too_late, 1),
            Err(EligibilityError::EntryClosed)
        );
    }

    #[test]
    fn test_view_recording() {
        let eligibility = eligibility();
        let mut event = event(Schedule::RecordedOnly, None);
        let mut student = user(1, Role::User, 0);

        assert!(!eligibility.can_view_recording(&event, &student));

        student.expiration_date = Some(now() + Duration::days(1));
        assert!(eligibility.can_view_recording(&event, &student));

        student.expiration_date = Some(now() - Duration::days(1));
        check_in(&mut event, student.id);
        assert!(eligibility.can_view_recording(&event, &student));
    }

    #[test]
    fn test_record_attendance() {
        let eligibility = eligibility();
        let instructor = user(7, Role::Instructor, 0);
        let student = user(1, Role::User, 0);

        let mut upcoming = event_starting_in(10, Some(5));
        upcoming.instructor_id = Some(instructor.id);

        assert_eq!(
            eligibility.ensure_can_record_attendance(&upcoming, &instructor),
            Err(EligibilityError::NotStarted)
        );

        let mut started = event_starting_in(-30, Some(5));
        started.instructor_id = Some(instructor.id);

        assert!(eligibility.can_record_attendance(&started, &instructor));
        assert_eq!(
            eligibility.ensure_can_record_attendance(&started, &student),
            Err(EligibilityError::NotManager)
        );
    }
}
