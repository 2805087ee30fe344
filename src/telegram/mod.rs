mod create_reminder;
mod edit_reminder;

use std::sync::Arc;

use create_reminder::CreateReminderState;
use teloxide::dptree::{self, case};
use teloxide::{
    dispatching::dialogue, dispatching::dialogue::InMemStorage, prelude::*,
    utils::command::BotCommands,
};

use crate::reminder::UserId;
use crate::storage::{InMemoryStorage, ReminderStorage, UserStorage};
use crate::timezone;

type GlobalDialogue = Dialogue<GlobalState, InMemStorage<GlobalState>>;
type HandlerResult = anyhow::Result<()>;

#[derive(Default, Clone)]
enum GlobalState {
    #[default]
    Idle,
    CreateReminder(CreateReminderState),
    EditReminder(edit_reminder::EditTarget),
    ReceiveTimezone,
}

pub struct TelegramInteractionInterface;
impl TelegramInteractionInterface {
    pub async fn start(bot: Bot, storage: Arc<InMemoryStorage>) {
        log::info!("Creating Telegram interaction interface");

        let cancel_handler = Update::filter_message().branch(
            teloxide::filter_command::<GlobalCommand, _>()
                .branch(case![GlobalCommand::Cancel].endpoint(cancel)),
        );

        let idle_handler = Update::filter_message().branch(
            teloxide::filter_command::<GlobalCommand, _>().branch(
                case![GlobalState::Idle]
                    .branch(case![GlobalCommand::Help].endpoint(help))
                    .branch(case![GlobalCommand::SetTimezone].endpoint(set_timezone_start))
                    .branch(case![GlobalCommand::ListReminders].endpoint(list_reminders))
                    .branch(case![GlobalCommand::DeleteReminder(id)].endpoint(delete_reminder)),
            ),
        );

        let timezone_handler = Update::filter_message()
            .branch(case![GlobalState::ReceiveTimezone].endpoint(receive_timezone));

        let invalid_state_handler =
            Update::filter_message().branch(dptree::endpoint(invalid_state));

        let schema = dialogue::enter::<Update, InMemStorage<GlobalState>, GlobalState, _>()
            .branch(cancel_handler)
            .branch(idle_handler)
            .branch(create_reminder::schema())
            .branch(edit_reminder::schema())
            .branch(timezone_handler)
            .branch(invalid_state_handler);

        Dispatcher::builder(bot, schema)
            .dependencies(dptree::deps![InMemStorage::<GlobalState>::new(), storage])
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await
    }
}

fn sender_id(msg: &Message) -> Option<UserId> {
    msg.from.as_ref().map(|user| user.id.0 as UserId)
}

/// Resolves the zone a user's wall-clock input is interpreted in,
/// falling back to the default offset for users who never picked one.
async fn user_zone(storage: &InMemoryStorage, user_id: UserId) -> chrono_tz::Tz {
    let stored = storage
        .get_user_timezone(user_id)
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| timezone::DEFAULT_OFFSET_NAME.to_string());

    timezone::find_zone(&stored).unwrap_or_else(|| {
        log::warn!(
            "Stored timezone is unknown, using default. [user_id = {user_id}, stored = {stored}]"
        );
        timezone::find_zone(timezone::DEFAULT_OFFSET_NAME)
            .expect("The default offset is in the table.")
    })
}

async fn cancel(bot: Bot, dialogue: GlobalDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, "Cancelled current operation.")
        .await?;
    dialogue.exit().await?;
    Ok(())
}

async fn invalid_state(bot: Bot, dialogue: GlobalDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, "Unable to handle the message.")
        .await?;
    dialogue.exit().await?;
    Ok(())
}

async fn help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, help_text()).await?;
    Ok(())
}

fn help_text() -> String {
    let offsets = timezone::offset_names().collect::<Vec<_>>().join(", ");
    format!(
        "{commands}\n\n\
         Time formats:\n\
         \"21:45\" sets a time of day. A daily reminder fires at it every day; \
         a one-time reminder uses today, or tomorrow if it has already passed.\n\
         \"3h4m2s\" sets a timer from now (weeks, days, hours, minutes, seconds).\n\
         \"21.07.2024 15:34\" sets an exact date, one-time reminders only. \
         Without a year the current one is used.\n\n\
         Timezones:\n\
         Wall-clock times are interpreted in your timezone, set with /settimezone. \
         Changing it does not move previously created reminders. Supported offsets:\n\
         {offsets}",
        commands = GlobalCommand::descriptions(),
    )
}

async fn set_timezone_start(
    bot: Bot,
    dialogue: GlobalDialogue,
    msg: Message,
    storage: Arc<InMemoryStorage>,
) -> HandlerResult {
    let Some(user_id) = sender_id(&msg) else {
        return Ok(());
    };
    storage.create_user_if_absent(user_id).await?;

    let zones = timezone::offset_names().collect::<Vec<_>>().join(", ");
    bot.send_message(
        msg.chat.id,
        format!("Please send your timezone as a UTC offset. Supported values:\n{zones}"),
    )
    .await?;

    dialogue.update(GlobalState::ReceiveTimezone).await?;
    Ok(())
}

async fn receive_timezone(
    bot: Bot,
    dialogue: GlobalDialogue,
    msg: Message,
    storage: Arc<InMemoryStorage>,
) -> HandlerResult {
    let Some(user_id) = sender_id(&msg) else {
        return Ok(());
    };

    match msg.text().map(str::trim) {
        Some(offset) if timezone::find_zone(offset).is_some() => {
            let offset = offset.to_uppercase();
            storage.update_user_timezone(user_id, &offset).await?;
            bot.send_message(msg.chat.id, format!("Timezone set to {offset}."))
                .await?;
            dialogue.exit().await?;
        }
        _ => {
            bot.send_message(
                msg.chat.id,
                "Unknown timezone. Please send one of the listed offsets, e.g. \"UTC+3\".",
            )
            .await?;
        }
    }
    Ok(())
}

async fn list_reminders(bot: Bot, msg: Message, storage: Arc<InMemoryStorage>) -> HandlerResult {
    let Some(user_id) = sender_id(&msg) else {
        return Ok(());
    };

    let reminders = storage.list_for_user(user_id).await?;
    if reminders.is_empty() {
        bot.send_message(msg.chat.id, "You have no reminders.")
            .await?;
        return Ok(());
    }

    let now = chrono::Utc::now();
    let lines: Vec<String> = reminders
        .iter()
        .map(|reminder| {
            let fired_at =
                crate::timeparse::display_time(reminder.schedule_value, reminder.kind, now)
                    .map(|time| time.format("%d.%m.%Y %H:%M UTC").to_string())
                    .unwrap_or_else(|| "?".to_string());
            format!("{}: \"{}\" at {}", reminder.id, reminder.name, fired_at)
        })
        .collect();

    bot.send_message(msg.chat.id, lines.join("\n")).await?;
    Ok(())
}

async fn delete_reminder(
    bot: Bot,
    msg: Message,
    id: String,
    storage: Arc<InMemoryStorage>,
) -> HandlerResult {
    let Some(user_id) = sender_id(&msg) else {
        return Ok(());
    };

    let Ok(id) = id.trim().parse::<i64>() else {
        bot.send_message(msg.chat.id, "Usage: /deletereminder <id>")
            .await?;
        return Ok(());
    };

    match storage.get(id).await? {
        Some(reminder) if reminder.user_id == user_id => {
            storage.delete(id).await?;
            bot.send_message(
                msg.chat.id,
                format!("Deleted reminder \"{}\".", reminder.name),
            )
            .await?;
        }
        _ => {
            bot.send_message(msg.chat.id, "No such reminder.").await?;
        }
    }
    Ok(())
}

#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
enum GlobalCommand {
    #[command(description = "create a new reminder")]
    CreateReminder,
    #[command(description = "set your timezone")]
    SetTimezone,
    #[command(description = "list your reminders")]
    ListReminders,
    #[command(description = "change the time of a reminder by id")]
    EditReminder(String),
    #[command(description = "delete a reminder by id")]
    DeleteReminder(String),
    #[command(description = "cancel the current operation")]
    Cancel,
    #[command(description = "show this help")]
    Help,
}
