use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::reminder::{NewReminder, Reminder, ReminderId, ReminderKind, UserId};

use super::{ReminderStorage, UserStorage};

#[derive(Default)]
struct Store {
    next_id: ReminderId,
    reminders: BTreeMap<ReminderId, Reminder>,
    user_timezones: BTreeMap<UserId, Option<String>>,
}

/// In-process storage behind a single `RwLock`. The due queries take the
/// write lock across match and removal, which is what makes
/// `select_and_delete_one_shot_due` atomic with respect to concurrent
/// user deletions.
#[derive(Default)]
pub struct InMemoryStorage {
    store: RwLock<Store>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStorage for InMemoryStorage {
    async fn create_user_if_absent(&self, user_id: UserId) -> anyhow::Result<()> {
        let mut store = self.store.write().await;
        store.user_timezones.entry(user_id).or_insert(None);
        Ok(())
    }

    async fn get_user_timezone(&self, user_id: UserId) -> anyhow::Result<Option<String>> {
        let store = self.store.read().await;
        Ok(store.user_timezones.get(&user_id).cloned().flatten())
    }

    async fn update_user_timezone(&self, user_id: UserId, offset_name: &str) -> anyhow::Result<()> {
        let mut store = self.store.write().await;
        store
            .user_timezones
            .insert(user_id, Some(offset_name.to_string()));
        Ok(())
    }
}

#[async_trait]
impl ReminderStorage for InMemoryStorage {
    async fn insert(&self, reminder: NewReminder) -> anyhow::Result<ReminderId> {
        let mut store = self.store.write().await;
        let id = store.next_id;
        store.next_id += 1;

        let reminder = Reminder {
            id,
            user_id: reminder.user_id,
            chat_id: reminder.chat_id,
            name: reminder.name,
            description: reminder.description,
            link: reminder.link,
            file: reminder.file,
            file_name: reminder.file_name,
            kind: reminder.kind,
            schedule_value: reminder.schedule_value,
        };
        store.reminders.insert(id, reminder);

        log::debug!("Inserted reminder {id}");
        Ok(id)
    }

    async fn update_time(&self, id: ReminderId, schedule_value: i64) -> anyhow::Result<()> {
        let mut store = self.store.write().await;
        match store.reminders.get_mut(&id) {
            Some(reminder) => {
                reminder.schedule_value = schedule_value;
                Ok(())
            }
            None => anyhow::bail!("No reminder with id {id}"),
        }
    }

    async fn delete(&self, id: ReminderId) -> anyhow::Result<()> {
        let mut store = self.store.write().await;
        if store.reminders.remove(&id).is_none() {
            anyhow::bail!("No reminder with id {id}");
        }
        Ok(())
    }

    async fn get(&self, id: ReminderId) -> anyhow::Result<Option<Reminder>> {
        let store = self.store.read().await;
        Ok(store.reminders.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: UserId) -> anyhow::Result<Vec<Reminder>> {
        let store = self.store.read().await;
        Ok(store
            .reminders
            .values()
            .filter(|reminder| reminder.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn count_for_user(&self, user_id: UserId) -> anyhow::Result<usize> {
        let store = self.store.read().await;
        Ok(store
            .reminders
            .values()
            .filter(|reminder| reminder.user_id == user_id)
            .count())
    }

    async fn select_and_delete_one_shot_due(
        &self,
        now_epoch: i64,
    ) -> anyhow::Result<Vec<Reminder>> {
        let mut store = self.store.write().await;
        let due_ids: Vec<ReminderId> = store
            .reminders
            .values()
            .filter(|reminder| {
                reminder.kind == ReminderKind::OneShot && reminder.schedule_value <= now_epoch
            })
            .map(|reminder| reminder.id)
            .collect();

        let mut due = Vec::with_capacity(due_ids.len());
        for id in due_ids {
            if let Some(reminder) = store.reminders.remove(&id) {
                due.push(reminder);
            }
        }
        Ok(due)
    }

    async fn select_daily_due(
        &self,
        window_start: i64,
        window_end: i64,
    ) -> anyhow::Result<Vec<Reminder>> {
        let store = self.store.read().await;
        Ok(store
            .reminders
            .values()
            .filter(|reminder| {
                reminder.kind == ReminderKind::Daily
                    && reminder.schedule_value >= window_start
                    && reminder.schedule_value < window_end
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_reminder(user_id: UserId, kind: ReminderKind, schedule_value: i64) -> NewReminder {
        NewReminder {
            user_id,
            chat_id: user_id,
            name: "test".to_string(),
            description: None,
            link: None,
            file: None,
            file_name: None,
            kind,
            schedule_value,
        }
    }

    #[tokio::test]
    async fn due_one_shot_is_returned_exactly_once() {
        let storage = InMemoryStorage::new();
        let id = storage
            .insert(new_reminder(1, ReminderKind::OneShot, 999))
            .await
            .unwrap();

        let due = storage.select_and_delete_one_shot_due(1000).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, id);

        let again = storage.select_and_delete_one_shot_due(1000).await.unwrap();
        assert!(again.is_empty());
        assert!(storage.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn future_one_shot_is_left_alone() {
        let storage = InMemoryStorage::new();
        let id = storage
            .insert(new_reminder(1, ReminderKind::OneShot, 1001))
            .await
            .unwrap();

        let due = storage.select_and_delete_one_shot_due(1000).await.unwrap();
        assert!(due.is_empty());
        assert!(storage.get(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn daily_due_matches_half_open_window() {
        let storage = InMemoryStorage::new();
        storage
            .insert(new_reminder(1, ReminderKind::Daily, 99))
            .await
            .unwrap();
        let inside = storage
            .insert(new_reminder(1, ReminderKind::Daily, 100))
            .await
            .unwrap();
        storage
            .insert(new_reminder(1, ReminderKind::Daily, 120))
            .await
            .unwrap();

        let due = storage.select_daily_due(100, 120).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, inside);

        // Daily reminders survive the query.
        assert!(storage.get(inside).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn daily_due_ignores_one_shot_records() {
        let storage = InMemoryStorage::new();
        storage
            .insert(new_reminder(1, ReminderKind::OneShot, 110))
            .await
            .unwrap();

        let due = storage.select_daily_due(100, 120).await.unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn count_and_list_are_scoped_per_user() {
        let storage = InMemoryStorage::new();
        storage
            .insert(new_reminder(1, ReminderKind::OneShot, 10))
            .await
            .unwrap();
        storage
            .insert(new_reminder(1, ReminderKind::Daily, 20))
            .await
            .unwrap();
        storage
            .insert(new_reminder(2, ReminderKind::OneShot, 30))
            .await
            .unwrap();

        assert_eq!(storage.count_for_user(1).await.unwrap(), 2);
        assert_eq!(storage.count_for_user(2).await.unwrap(), 1);
        assert_eq!(storage.list_for_user(1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_time_changes_the_schedule_value() {
        let storage = InMemoryStorage::new();
        let id = storage
            .insert(new_reminder(1, ReminderKind::Daily, 100))
            .await
            .unwrap();

        storage.update_time(id, 200).await.unwrap();
        assert_eq!(storage.get(id).await.unwrap().unwrap().schedule_value, 200);

        assert!(storage.update_time(id + 1, 300).await.is_err());
    }

    #[tokio::test]
    async fn timezone_updates_round_trip() {
        let storage = InMemoryStorage::new();
        storage.create_user_if_absent(7).await.unwrap();
        assert_eq!(storage.get_user_timezone(7).await.unwrap(), None);

        storage.update_user_timezone(7, "UTC+3").await.unwrap();
        assert_eq!(
            storage.get_user_timezone(7).await.unwrap(),
            Some("UTC+3".to_string())
        );

        // Re-creating must not wipe the stored zone.
        storage.create_user_if_absent(7).await.unwrap();
        assert_eq!(
            storage.get_user_timezone(7).await.unwrap(),
            Some("UTC+3".to_string())
        );
    }
}
