use crossbeam::channel::{Receiver, Sender};
use shala_core::{Attendance, PrimaryKey};

pub type ActivitySender = Sender<Activity>;
pub type ActivityReceiver = Receiver<Activity>;

/// Changes to the studio that other parts of the system might want to react to
#[derive(Debug, Clone)]
pub enum Activity {
    /// A user reserved a spot in an event
    CheckedIn {
        event_id: PrimaryKey,
        user_id: PrimaryKey,
        /// The balance of the user after checking in
        check_ins_left: i32,
    },
    /// A user gave up their spot in an event
    CheckInCancelled {
        event_id: PrimaryKey,
        user_id: PrimaryKey,
        check_ins_left: i32,
    },
    /// A manager recorded who showed up
    AttendanceRecorded {
        event_id: PrimaryKey,
        recorded_by: PrimaryKey,
        changes: Vec<(PrimaryKey, Attendance)>,
    },
    EventCreated {
        event_id: PrimaryKey,
        created_by: PrimaryKey,
    },
    EventUpdated {
        event_id: PrimaryKey,
        updated_by: PrimaryKey,
    },
    /// An admin added check-ins to the balance of a user
    CheckInsGranted {
        user_id: PrimaryKey,
        amount: i32,
        check_ins_left: i32,
    },
}
