pub type ReminderId = i64;
pub type UserId = i64;

pub const SECONDS_PER_DAY: i64 = 86_400;

/// How a reminder fires: once at an absolute instant, or every day
/// at a fixed UTC time-of-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderKind {
    OneShot,
    Daily,
}

/// Persisted reminder. `schedule_value` is an UTC epoch second for
/// [`ReminderKind::OneShot`] and a second-of-day offset in `[0, 86400)`
/// for [`ReminderKind::Daily`].
#[derive(Debug, Clone)]
pub struct Reminder {
    pub id: ReminderId,
    pub user_id: UserId,
    pub chat_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub link: Option<String>,
    pub file: Option<Vec<u8>>,
    pub file_name: Option<String>,
    pub kind: ReminderKind,
    pub schedule_value: i64,
}

/// Insert shape for a reminder that has not been assigned an id yet.
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub user_id: UserId,
    pub chat_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub link: Option<String>,
    pub file: Option<Vec<u8>>,
    pub file_name: Option<String>,
    pub kind: ReminderKind,
    pub schedule_value: i64,
}
