mod memory;

pub use memory::InMemoryStorage;

use async_trait::async_trait;

use crate::reminder::{NewReminder, Reminder, ReminderId, UserId};

#[async_trait]
pub trait UserStorage: Send + Sync {
    async fn create_user_if_absent(&self, user_id: UserId) -> anyhow::Result<()>;

    /// Returns the named UTC offset the user picked (e.g. "UTC+3"),
    /// or `None` for unknown users.
    async fn get_user_timezone(&self, user_id: UserId) -> anyhow::Result<Option<String>>;

    async fn update_user_timezone(&self, user_id: UserId, offset_name: &str) -> anyhow::Result<()>;
}

#[async_trait]
pub trait ReminderStorage: Send + Sync {
    async fn insert(&self, reminder: NewReminder) -> anyhow::Result<ReminderId>;
    async fn update_time(&self, id: ReminderId, schedule_value: i64) -> anyhow::Result<()>;
    async fn delete(&self, id: ReminderId) -> anyhow::Result<()>;
    async fn get(&self, id: ReminderId) -> anyhow::Result<Option<Reminder>>;
    async fn list_for_user(&self, user_id: UserId) -> anyhow::Result<Vec<Reminder>>;
    async fn count_for_user(&self, user_id: UserId) -> anyhow::Result<usize>;

    /// Returns every one-shot reminder with `schedule_value <= now_epoch`
    /// and removes them in the same operation, so a returned reminder can
    /// never be matched by a later call.
    async fn select_and_delete_one_shot_due(&self, now_epoch: i64)
    -> anyhow::Result<Vec<Reminder>>;

    /// Returns daily reminders whose second-of-day falls in
    /// `[window_start, window_end)`. Matched reminders stay stored.
    async fn select_daily_due(
        &self,
        window_start: i64,
        window_end: i64,
    ) -> anyhow::Result<Vec<Reminder>>;
}
