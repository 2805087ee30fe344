mod appsettings;
mod delivery;
mod dispatch;
mod reminder;
mod storage;
mod telegram;
mod timeparse;
mod timezone;

use std::sync::Arc;
use std::time::Duration;

use teloxide::Bot;
use tokio_util::sync::CancellationToken;

use crate::delivery::{ReminderDelivery, TelegramDeliveryChannel};
use crate::dispatch::ReminderDispatcher;
use crate::storage::InMemoryStorage;
use crate::telegram::TelegramInteractionInterface;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    pretty_env_logger::init();

    let settings = appsettings::get();
    let storage = Arc::new(InMemoryStorage::new());
    let bot = Bot::new(settings.telegram.token.clone());

    let delivery: Arc<dyn ReminderDelivery> = Arc::new(TelegramDeliveryChannel::new(
        bot.clone(),
        settings.reminders.max_file_size_bytes,
    ));
    let dispatcher = ReminderDispatcher::new(
        Arc::clone(&storage),
        delivery,
        Duration::from_secs(settings.reminders.dispatch_period_secs),
    );

    let cancellation_token = CancellationToken::new();
    let dispatch_task = tokio::spawn(dispatcher.run(cancellation_token.clone()));

    TelegramInteractionInterface::start(bot, storage).await;

    // The Telegram dispatcher returned, so the process is shutting down.
    cancellation_token.cancel();
    if let Err(error) = dispatch_task.await {
        log::error!("Dispatch task did not shut down cleanly: {error}");
    }
}
