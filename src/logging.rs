use std::{fmt::Display, thread};

use colored::Colorize;
use log::{info, warn, Level};
use shala_studio::{Activity, ActivityReceiver};

/// External crates only need to log warnings and errors
const ALLOWED_EXTERNAL_LEVELS: [Level; 2] = [Level::Warn, Level::Error];
const ALLOWED_LEVELS: [Level; 3] = [Level::Info, Level::Warn, Level::Error];

pub fn init_logger() -> Result<(), log::SetLoggerError> {
    fern::Dispatch::new()
        .format(move |out, message, record| {
            let target = Target::from_str(record.target());
            let now = chrono::Local::now();

            out.finish(format_args!(
                "{:^5} {} {:^8} {}",
                level_to_string(&record.level()),
                now.format("%H:%M:%S").to_string().bright_black(),
                target,
                message
            ))
        })
        .filter(|meta| {
            let target = Target::from_str(meta.target());

            let is_allowed = ALLOWED_LEVELS.contains(&meta.level());
            let is_severe = ALLOWED_EXTERNAL_LEVELS.contains(&meta.level());

            target.is_local() && is_allowed || is_severe
        })
        .chain(std::io::stdout())
        .apply()
}

/// Logs everything happening in the studio on a separate thread
pub fn spawn_activity_logger(receiver: ActivityReceiver) {
    let spawned = thread::Builder::new()
        .name("shala-activity".to_string())
        .spawn(move || {
            for activity in receiver {
                info!(target: "shala::activity", "{}", describe(&activity));
            }
        });

    if let Err(e) = spawned {
        warn!("Activity will not be logged: {}", e);
    }
}

fn describe(activity: &Activity) -> String {
    match activity {
        Activity::CheckedIn {
            event_id,
            user_id,
            check_ins_left,
        } => format!(
            "User {} checked in to event {} ({} left)",
            user_id, event_id, check_ins_left
        ),
        Activity::CheckInCancelled {
            event_id,
            user_id,
            check_ins_left,
        } => format!(
            "User {} cancelled their check-in to event {} ({} left)",
            user_id, event_id, check_ins_left
        ),
        Activity::AttendanceRecorded {
            event_id,
            recorded_by,
            changes,
        } => format!(
            "User {} recorded attendance of {} check-ins in event {}",
            recorded_by,
            changes.len(),
            event_id
        ),
        Activity::EventCreated {
            event_id,
            created_by,
        } => format!("User {} created event {}", created_by, event_id),
        Activity::EventUpdated {
            event_id,
            updated_by,
        } => format!("User {} updated event {}", updated_by, event_id),
        Activity::CheckInsGranted {
            user_id,
            amount,
            check_ins_left,
        } => format!(
            "User {} was granted {} check-ins ({} left)",
            user_id, amount, check_ins_left
        ),
    }
}

enum Target {
    External(String),
    Activity,
    Main,
    Server,
    Studio,
    Core,
}

impl Target {
    fn from_str(str: &str) -> Self {
        if str == "shala::activity" {
            return Self::Activity;
        }

        let module = str.split("::").next().unwrap_or_default();

        match module {
            "shala" => Self::Main,
            "shala_core" => Self::Core,
            "shala_server" => Self::Server,
            "shala_studio" => Self::Studio,
            other => Target::External(other.to_string()),
        }
    }

    fn is_local(&self) -> bool {
        !matches!(self, Self::External(_))
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            Target::External(x) => x.as_str().clear(),
            Target::Activity => "ACTIVITY".bright_cyan(),
            Target::Main => "SHALA".bright_white(),
            Target::Server => "SERVER".bright_green(),
            Target::Studio => "STUDIO".bright_purple(),
            Target::Core => "CORE".blue(),
        };

        Display::fmt(&result, f)
    }
}

fn level_to_string(level: &Level) -> String {
    match level {
        Level::Error => " ERR ".black().on_red().bold().to_string(),
        Level::Warn => " WRN ".black().on_yellow().bold().to_string(),
        Level::Info => " INF ".black().on_blue().bold().to_string(),
        Level::Debug => " DBG ".white().on_black().to_string(),
        Level::Trace => " TRC ".to_string(),
    }
}
