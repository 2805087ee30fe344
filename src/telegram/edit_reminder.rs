use std::sync::Arc;

use teloxide::dispatching::UpdateHandler;
use teloxide::dptree::case;
use teloxide::prelude::*;
use teloxide::{Bot, types::Message};

use crate::appsettings;
use crate::reminder::{ReminderId, ReminderKind};
use crate::storage::{InMemoryStorage, ReminderStorage};
use crate::timeparse::{ParseLimits, ReminderTime};

use super::{GlobalCommand, GlobalDialogue, GlobalState, HandlerResult, sender_id, user_zone};

#[derive(Clone)]
pub(super) struct EditTarget {
    pub id: ReminderId,
    pub kind: ReminderKind,
}

async fn edit_reminder_start(
    bot: Bot,
    dialogue: GlobalDialogue,
    msg: Message,
    id: String,
    storage: Arc<InMemoryStorage>,
) -> HandlerResult {
    let Some(user_id) = sender_id(&msg) else {
        return Ok(());
    };

    let Ok(id) = id.trim().parse::<ReminderId>() else {
        bot.send_message(msg.chat.id, "Usage: /editreminder <id>")
            .await?;
        return Ok(());
    };

    match storage.get(id).await? {
        Some(reminder) if reminder.user_id == user_id => {
            bot.send_message(
                msg.chat.id,
                format!(
                    "Editing \"{}\". Please enter the new time, e.g. \"13:00\" or \"1h30m\".",
                    reminder.name
                ),
            )
            .await?;
            dialogue
                .update(GlobalState::EditReminder(EditTarget {
                    id,
                    kind: reminder.kind,
                }))
                .await?;
        }
        _ => {
            bot.send_message(msg.chat.id, "No such reminder.").await?;
        }
    }
    Ok(())
}

async fn receive_edit_time(
    bot: Bot,
    dialogue: GlobalDialogue,
    target: EditTarget,
    msg: Message,
    storage: Arc<InMemoryStorage>,
) -> HandlerResult {
    let Some(user_id) = sender_id(&msg) else {
        return Ok(());
    };
    let Some(input) = msg.text() else {
        bot.send_message(msg.chat.id, "Please send the time as text.")
            .await?;
        return Ok(());
    };

    // The wider edit lead leaves room between validation here and the
    // dispatch tick that could otherwise fire the old slot mid-edit.
    let settings = &appsettings::get().reminders;
    let limits = ParseLimits {
        lead_minutes: settings.edit_lead_minutes,
        horizon_years: settings.max_future_years,
    };
    let zone = user_zone(&storage, user_id).await;

    match ReminderTime::parse(input, zone, target.kind, limits) {
        Ok(parsed) => {
            storage.update_time(target.id, parsed.schedule_value()).await?;
            log::info!("Updated reminder time. [id = {}, user_id = {user_id}]", target.id);
            bot.send_message(
                msg.chat.id,
                format!(
                    "Updated! The reminder will now fire at {} UTC.",
                    parsed.time().format("%d.%m.%Y %H:%M")
                ),
            )
            .await?;
            dialogue.exit().await?;
        }
        Err(error) => {
            bot.send_message(msg.chat.id, super::create_reminder::time_error_reply(error))
                .await?;
        }
    }
    Ok(())
}

pub fn schema() -> UpdateHandler<anyhow::Error> {
    Update::filter_message()
        .branch(
            teloxide::filter_command::<GlobalCommand, _>().branch(
                case![GlobalState::Idle]
                    .branch(case![GlobalCommand::EditReminder(id)].endpoint(edit_reminder_start)),
            ),
        )
        .branch(case![GlobalState::EditReminder(target)].endpoint(receive_edit_time))
}
