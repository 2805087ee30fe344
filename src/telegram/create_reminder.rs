use std::sync::Arc;

use teloxide::dispatching::UpdateHandler;
use teloxide::dptree::case;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::FileMeta;
use teloxide::{Bot, types::Message};

use crate::appsettings;
use crate::reminder::{NewReminder, ReminderKind, UserId};
use crate::storage::{InMemoryStorage, ReminderStorage, UserStorage};
use crate::timeparse;
use crate::timeparse::{ParseLimits, ReminderTime, TimeParseError};

use super::{GlobalCommand, GlobalDialogue, GlobalState, HandlerResult, sender_id, user_zone};

#[derive(Clone)]
pub(super) enum CreateReminderState {
    ReceiveName,
    ReceiveKind {
        name: String,
    },
    ReceiveTime {
        name: String,
        kind: ReminderKind,
    },
    ReceiveDescription {
        draft: ReminderDraft,
    },
    ReceiveLink {
        draft: ReminderDraft,
    },
    ReceiveAttachment {
        draft: ReminderDraft,
    },
}

/// Everything collected before the optional attachment step.
#[derive(Clone)]
pub(super) struct ReminderDraft {
    name: String,
    kind: ReminderKind,
    schedule_value: i64,
    description: Option<String>,
    link: Option<String>,
}

const SKIP: &str = "-";

async fn create_reminder_start(
    bot: Bot,
    dialogue: GlobalDialogue,
    msg: Message,
    storage: Arc<InMemoryStorage>,
) -> HandlerResult {
    let Some(user_id) = sender_id(&msg) else {
        return Ok(());
    };
    storage.create_user_if_absent(user_id).await?;

    let settings = &appsettings::get().reminders;
    let count = storage.count_for_user(user_id).await?;
    if count >= settings.max_reminders_per_user {
        bot.send_message(
            msg.chat.id,
            format!(
                "You already have {count} reminders, which is the limit. Delete one first with /deletereminder."
            ),
        )
        .await?;
        return Ok(());
    }

    bot.send_message(
        msg.chat.id,
        "Creating a new reminder! Please input reminder text. If you want to cancel, use the /cancel command.",
    )
    .await?;

    dialogue
        .update(GlobalState::CreateReminder(
            CreateReminderState::ReceiveName,
        ))
        .await?;

    Ok(())
}

async fn receive_name(bot: Bot, dialogue: GlobalDialogue, msg: Message) -> HandlerResult {
    match msg.text() {
        Some(name) => {
            let message = format!(
                "Great! You will be reminded about \"{name}\"\nShould it fire once (\"date\") or every day (\"daily\")?"
            );
            bot.send_message(msg.chat.id, message).await?;
            dialogue
                .update(GlobalState::CreateReminder(
                    CreateReminderState::ReceiveKind {
                        name: name.to_string(),
                    },
                ))
                .await?;
        }
        None => {
            bot.send_message(msg.chat.id, "Please send me reminder text.")
                .await?;
        }
    }

    Ok(())
}

async fn receive_kind(
    bot: Bot,
    dialogue: GlobalDialogue,
    name: String,
    msg: Message,
) -> HandlerResult {
    let kind = match msg.text().map(|text| text.trim().to_lowercase()).as_deref() {
        Some("date") | Some("once") => ReminderKind::OneShot,
        Some("daily") => ReminderKind::Daily,
        _ => {
            bot.send_message(msg.chat.id, "Please answer \"date\" or \"daily\".")
                .await?;
            return Ok(());
        }
    };

    bot.send_message(
        msg.chat.id,
        "Now, please enter when the reminder should fire, e.g. \"13:00\", \"1h30m\" or \"21.07.2025 10:00\".",
    )
    .await?;

    dialogue
        .update(GlobalState::CreateReminder(
            CreateReminderState::ReceiveTime { name, kind },
        ))
        .await?;

    Ok(())
}

async fn receive_time(
    bot: Bot,
    dialogue: GlobalDialogue,
    (name, kind): (String, ReminderKind),
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

    let settings = &appsettings::get().reminders;
    let limits = ParseLimits {
        lead_minutes: settings.create_lead_minutes,
        horizon_years: settings.max_future_years,
    };
    let zone = user_zone(&storage, user_id).await;

    let parsed = match ReminderTime::parse(input, zone, kind, limits) {
        Ok(parsed) => parsed,
        Err(error) => {
            bot.send_message(msg.chat.id, time_error_reply(error)).await?;
            return Ok(());
        }
    };

    bot.send_message(
        msg.chat.id,
        format!("Add a description, or send \"{SKIP}\" to skip."),
    )
    .await?;

    dialogue
        .update(GlobalState::CreateReminder(
            CreateReminderState::ReceiveDescription {
                draft: ReminderDraft {
                    name,
                    kind,
                    schedule_value: parsed.schedule_value(),
                    description: None,
                    link: None,
                },
            },
        ))
        .await?;

    Ok(())
}

async fn receive_description(
    bot: Bot,
    dialogue: GlobalDialogue,
    mut draft: ReminderDraft,
    msg: Message,
) -> HandlerResult {
    let Some(input) = msg.text() else {
        bot.send_message(
            msg.chat.id,
            format!("Please send the description as text, or \"{SKIP}\" to skip."),
        )
        .await?;
        return Ok(());
    };

    draft.description = optional_input(input);
    bot.send_message(
        msg.chat.id,
        format!("Add an https:// link, or send \"{SKIP}\" to skip."),
    )
    .await?;

    dialogue
        .update(GlobalState::CreateReminder(
            CreateReminderState::ReceiveLink { draft },
        ))
        .await?;

    Ok(())
}

async fn receive_link(
    bot: Bot,
    dialogue: GlobalDialogue,
    mut draft: ReminderDraft,
    msg: Message,
) -> HandlerResult {
    match msg.text().map(parse_link_input) {
        Some(Ok(link)) => {
            draft.link = link;
            bot.send_message(
                msg.chat.id,
                format!("Attach a file or a photo, or send \"{SKIP}\" to skip."),
            )
            .await?;
            dialogue
                .update(GlobalState::CreateReminder(
                    CreateReminderState::ReceiveAttachment { draft },
                ))
                .await?;
        }
        _ => {
            bot.send_message(
                msg.chat.id,
                format!("The link should start with \"https://\". Send it again, or \"{SKIP}\" to skip."),
            )
            .await?;
        }
    }

    Ok(())
}

async fn receive_attachment(
    bot: Bot,
    dialogue: GlobalDialogue,
    draft: ReminderDraft,
    msg: Message,
    storage: Arc<InMemoryStorage>,
) -> HandlerResult {
    let Some(user_id) = sender_id(&msg) else {
        return Ok(());
    };

    let attachment = if msg.text().map(str::trim) == Some(SKIP) {
        None
    } else {
        let Some((meta, file_name)) = pick_attachment(&msg) else {
            bot.send_message(
                msg.chat.id,
                format!("Please send a file or a photo, or \"{SKIP}\" to skip."),
            )
            .await?;
            return Ok(());
        };

        let settings = &appsettings::get().reminders;
        if u64::from(meta.size) >= settings.max_file_size_bytes {
            bot.send_message(
                msg.chat.id,
                format!(
                    "That file is too large, the limit is {} MB. Send a smaller one, or \"{SKIP}\" to skip.",
                    settings.max_file_size_bytes / (1024 * 1024)
                ),
            )
            .await?;
            return Ok(());
        }

        let file = bot.get_file(meta.id.clone()).await?;
        let mut bytes = Vec::new();
        bot.download_file(&file.path, &mut bytes).await?;
        Some((bytes, file_name))
    };

    let reminder = build_reminder(draft, attachment, user_id, msg.chat.id.0);
    let name = reminder.name.clone();
    let kind = reminder.kind;
    let schedule_value = reminder.schedule_value;
    let id = storage.insert(reminder).await?;

    log::info!("Created reminder. [id = {id}, user_id = {user_id}, kind = {kind:?}]");

    let fired_at = timeparse::display_time(schedule_value, kind, chrono::Utc::now())
        .map(|time| time.format("%d.%m.%Y %H:%M").to_string())
        .unwrap_or_else(|| "?".to_string());
    bot.send_message(
        msg.chat.id,
        format!("Done! Reminder \"{name}\" will fire at {fired_at} UTC."),
    )
    .await?;

    dialogue.exit().await?;
    Ok(())
}

/// Maps the skip marker to `None` and anything else to the trimmed text.
fn optional_input(input: &str) -> Option<String> {
    let input = input.trim();
    (input != SKIP).then(|| input.to_string())
}

fn parse_link_input(input: &str) -> Result<Option<String>, ()> {
    match optional_input(input) {
        None => Ok(None),
        Some(link) if link.starts_with("https://") => Ok(Some(link)),
        Some(_) => Err(()),
    }
}

/// Picks the message's document, or the largest photo rendition.
fn pick_attachment(msg: &Message) -> Option<(&FileMeta, String)> {
    if let Some(document) = msg.document() {
        let file_name = document
            .file_name
            .clone()
            .unwrap_or_else(|| "attachment".to_string());
        return Some((&document.file, file_name));
    }
    if let Some(largest) = msg.photo().and_then(|sizes| sizes.last()) {
        return Some((&largest.file, "photo.jpg".to_string()));
    }
    None
}

fn build_reminder(
    draft: ReminderDraft,
    attachment: Option<(Vec<u8>, String)>,
    user_id: UserId,
    chat_id: i64,
) -> NewReminder {
    let (file, file_name) = match attachment {
        Some((bytes, name)) => (Some(bytes), Some(name)),
        None => (None, None),
    };

    NewReminder {
        user_id,
        chat_id,
        name: draft.name,
        description: draft.description,
        link: draft.link,
        file,
        file_name,
        kind: draft.kind,
        schedule_value: draft.schedule_value,
    }
}

pub(super) fn time_error_reply(error: TimeParseError) -> &'static str {
    match error {
        TimeParseError::InvalidTimeFormat => {
            "Could not parse the time. Send \"13:00\", a timer like \"1h30m\", or a date like \"21.07.2025 10:00\"."
        }
        TimeParseError::InvalidReminderType => {
            "A daily reminder can not use a full date. Send a time like \"13:00\" instead."
        }
        TimeParseError::TimeInPast => "That time is already in the past. Please pick a later one.",
        TimeParseError::ExcessiveFutureTime => {
            "That is too far in the future. Reminders are limited to two years ahead."
        }
    }
}

pub fn schema() -> UpdateHandler<anyhow::Error> {
    Update::filter_message()
        .branch(
            teloxide::filter_command::<GlobalCommand, _>().branch(
                case![GlobalState::Idle]
                    .branch(case![GlobalCommand::CreateReminder].endpoint(create_reminder_start)),
            ),
        )
        .branch(
            case![GlobalState::CreateReminder(x)]
                .branch(case![CreateReminderState::ReceiveName].endpoint(receive_name))
                .branch(case![CreateReminderState::ReceiveKind { name }].endpoint(receive_kind))
                .branch(case![CreateReminderState::ReceiveTime { name, kind }].endpoint(receive_time))
                .branch(
                    case![CreateReminderState::ReceiveDescription { draft }]
                        .endpoint(receive_description),
                )
                .branch(case![CreateReminderState::ReceiveLink { draft }].endpoint(receive_link))
                .branch(
                    case![CreateReminderState::ReceiveAttachment { draft }]
                        .endpoint(receive_attachment),
                ),
        )
}
