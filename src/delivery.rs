use async_trait::async_trait;
use chrono::Utc;
use teloxide::prelude::*;
use teloxide::types::InputFile;

use crate::reminder::{Reminder, ReminderKind};
use crate::timeparse;

/// Delivery collaborator invoked by the dispatch loop. A failure here is
/// isolated per reminder and never terminates the loop.
#[async_trait]
pub trait ReminderDelivery: Send + Sync {
    async fn deliver(&self, reminder: &Reminder) -> anyhow::Result<()>;
}

pub struct TelegramDeliveryChannel {
    bot: Bot,
    max_file_size_bytes: u64,
}

impl TelegramDeliveryChannel {
    pub fn new(bot: Bot, max_file_size_bytes: u64) -> Self {
        Self {
            bot,
            max_file_size_bytes,
        }
    }
}

#[async_trait]
impl ReminderDelivery for TelegramDeliveryChannel {
    async fn deliver(&self, reminder: &Reminder) -> anyhow::Result<()> {
        let text = render_message_text(reminder);
        let chat_id = ChatId(reminder.chat_id);

        // Oversized attachments are dropped rather than failing the whole
        // delivery.
        match (&reminder.file, &reminder.file_name) {
            (Some(bytes), Some(file_name)) if bytes.len() as u64 <= self.max_file_size_bytes => {
                let attachment = InputFile::memory(bytes.clone()).file_name(file_name.clone());
                if is_embeddable_image(file_name) {
                    self.bot.send_photo(chat_id, attachment).caption(text).await?;
                } else {
                    self.bot
                        .send_document(chat_id, attachment)
                        .caption(text)
                        .await?;
                }
            }
            _ => {
                self.bot.send_message(chat_id, text).await?;
            }
        }

        Ok(())
    }
}

const EMBED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "tiff", "ico"];

/// Image-typed attachments are sent as photos so chat clients render
/// them inline instead of as a plain document.
fn is_embeddable_image(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(_, extension)| {
            EMBED_IMAGE_EXTENSIONS
                .iter()
                .any(|known| extension.eq_ignore_ascii_case(known))
        })
}

fn render_message_text(reminder: &Reminder) -> String {
    let mut text = format!("🔔 Reminder: \"{}\"", reminder.name);

    if let Some(description) = &reminder.description {
        text.push('\n');
        text.push_str(description);
    }

    if let Some(link) = &reminder.link {
        text.push_str("\n🔗 ");
        text.push_str(link);
    }

    let footer = match reminder.kind {
        ReminderKind::Daily => "This is a daily reminder",
        ReminderKind::OneShot => "This is a one-time reminder",
    };
    text.push_str("\n\n");
    text.push_str(footer);

    if let Some(fired_at) =
        timeparse::display_time(reminder.schedule_value, reminder.kind, Utc::now())
    {
        text.push_str(&format!(" ({} UTC)", fired_at.format("%d.%m.%Y %H:%M")));
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reminder(kind: ReminderKind) -> Reminder {
        Reminder {
            id: 1,
            user_id: 10,
            chat_id: 10,
            name: "standup".to_string(),
            description: Some("Post the weekly update".to_string()),
            link: Some("https://example.com/board".to_string()),
            file: None,
            file_name: None,
            kind,
            schedule_value: 9 * 3600,
        }
    }

    #[test]
    fn rendered_text_contains_name_description_and_link() {
        let text = render_message_text(&reminder(ReminderKind::Daily));

        assert!(text.contains("standup"));
        assert!(text.contains("Post the weekly update"));
        assert!(text.contains("https://example.com/board"));
        assert!(text.contains("daily reminder"));
    }

    #[test]
    fn one_shot_footer_differs_from_daily() {
        let text = render_message_text(&reminder(ReminderKind::OneShot));

        assert!(text.contains("one-time reminder"));
    }

    #[test]
    fn image_extensions_are_embeddable() {
        assert!(is_embeddable_image("cat.png"));
        assert!(is_embeddable_image("CAT.JPG"));
        assert!(is_embeddable_image("photo.jpeg"));
        assert!(is_embeddable_image("icon.webp"));
    }

    #[test]
    fn non_image_attachments_are_sent_as_documents() {
        assert!(!is_embeddable_image("notes.pdf"));
        assert!(!is_embeddable_image("archive.tar.gz"));
        assert!(!is_embeddable_image("noextension"));
        assert!(!is_embeddable_image("png"));
    }
}
