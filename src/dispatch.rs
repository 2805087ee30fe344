use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use tokio_util::sync::CancellationToken;

use crate::delivery::ReminderDelivery;
use crate::reminder::Reminder;
use crate::storage::ReminderStorage;

/// Seconds elapsed since UTC midnight at `now`.
pub fn second_of_day(now: DateTime<Utc>) -> i64 {
    i64::from(now.time().num_seconds_from_midnight())
}

/// Half-open `[start, end)` second-of-day window matched by one dispatch
/// tick. The window does not wrap across UTC midnight: a daily value
/// within `period` seconds of 86400 is skipped when the tick lands just
/// after midnight, since the window restarts near zero while the value
/// stays near 86400.
pub fn daily_due_window(now: DateTime<Utc>, period: Duration) -> (i64, i64) {
    let start = second_of_day(now);
    (start, start + period.as_secs() as i64)
}

/// Periodic due-reminder dispatcher. Runs forever as a single task:
/// each tick resolves due reminders against storage, hands them to the
/// delivery channel one by one, then sleeps for the configured period.
pub struct ReminderDispatcher<S> {
    storage: Arc<S>,
    delivery: Arc<dyn ReminderDelivery>,
    period: Duration,
}

impl<S: ReminderStorage> ReminderDispatcher<S> {
    pub fn new(storage: Arc<S>, delivery: Arc<dyn ReminderDelivery>, period: Duration) -> Self {
        Self {
            storage,
            delivery,
            period,
        }
    }

    /// Ticks until the token is cancelled. An in-flight tick always
    /// finishes before the loop observes cancellation.
    pub async fn run(self, cancellation_token: CancellationToken) {
        log::info!(
            "Starting reminder dispatch loop. [period = {:?}]",
            self.period
        );
        loop {
            self.tick(Utc::now()).await;

            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    log::info!("Reminder dispatch loop stopped.");
                    break;
                }
                _ = tokio::time::sleep(self.period) => {}
            }
        }
    }

    async fn tick(&self, now: DateTime<Utc>) {
        let mut due: Vec<Reminder> = Vec::new();

        match self
            .storage
            .select_and_delete_one_shot_due(now.timestamp())
            .await
        {
            Ok(reminders) => due.extend(reminders),
            Err(error) => log::error!("Failed to resolve due one-shot reminders: {error:#}"),
        }

        let (window_start, window_end) = daily_due_window(now, self.period);
        match self
            .storage
            .select_daily_due(window_start, window_end)
            .await
        {
            Ok(reminders) => due.extend(reminders),
            Err(error) => log::error!("Failed to resolve due daily reminders: {error:#}"),
        }

        for reminder in due {
            if let Err(error) = self.delivery.deliver(&reminder).await {
                log::warn!(
                    "Failed to deliver reminder. [id = {}, user_id = {}, error = {error:#}]",
                    reminder.id,
                    reminder.user_id
                );
            }
        }
    }
}
