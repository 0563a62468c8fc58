//! `ghl conversations` - conversation threads and outbound messages

use anyhow::{bail, Result};
use clap::Subcommand;
use ghl_api::resources::{MessageChannel, OutboundMessage};
use serde_json::json;

use crate::context::AppContext;
use crate::output::{to_record, to_rows, Column};

const CONVERSATION_COLUMNS: [Column; 5] = [
    ("id", "ID"),
    ("fullName", "Contact"),
    ("lastMessageBody", "Last Message"),
    ("lastMessageDate", "Date"),
    ("unreadCount", "Unread"),
];

const CONVERSATION_FIELDS: [Column; 6] = [
    ("id", "ID"),
    ("contactId", "Contact ID"),
    ("fullName", "Contact"),
    ("type", "Type"),
    ("lastMessageBody", "Last Message"),
    ("unreadCount", "Unread"),
];

const MESSAGE_COLUMNS: [Column; 5] = [
    ("id", "ID"),
    ("channel", "Type"),
    ("direction", "Direction"),
    ("body", "Message"),
    ("dateAdded", "Date"),
];

#[derive(Debug, Subcommand)]
pub enum ConversationsCommand {
    /// List conversations
    List {
        /// Only this contact's conversations
        #[arg(long)]
        contact: Option<String>,
        /// Search text
        #[arg(long)]
        query: Option<String>,
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
    /// Show a conversation
    Get { conversation_id: String },
    /// Messages of a conversation
    Messages {
        conversation_id: String,
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
    /// Send an SMS or email to a contact
    Send {
        contact_id: String,
        message: String,
        /// sms or email
        #[arg(short = 't', long = "type", default_value = "sms")]
        channel: MessageChannel,
        /// Email subject
        #[arg(long)]
        subject: Option<String>,
    },
}

impl ConversationsCommand {
    pub async fn execute(&self, app: &AppContext) -> Result<()> {
        let out = app.formatter();
        let client = app.client()?;
        let conversations = client.conversations();

        match self {
            ConversationsCommand::List { contact, query, limit } => {
                let found = conversations
                    .search(contact.as_deref(), query.as_deref(), *limit)
                    .await?;
                let rows = to_rows(&found)?;
                out.print_list(&format!("Conversations ({})", rows.len()), &rows, &CONVERSATION_COLUMNS);
            }
            ConversationsCommand::Get { conversation_id } => {
                let conversation = conversations.get(conversation_id).await?;
                out.print_record(&to_record(&conversation)?, &CONVERSATION_FIELDS);
            }
            ConversationsCommand::Messages { conversation_id, limit } => {
                let messages = conversations.messages(conversation_id, *limit).await?;
                let mut rows = to_rows(&messages)?;
                for (row, message) in rows.iter_mut().zip(&messages) {
                    row["channel"] = json!(message.channel());
                }
                out.print_list(&format!("Messages ({})", rows.len()), &rows, &MESSAGE_COLUMNS);
            }
            ConversationsCommand::Send {
                contact_id,
                message,
                channel,
                subject,
            } => {
                if *channel == MessageChannel::Email && subject.is_none() {
                    bail!("--subject is required for email");
                }
                let sent = conversations
                    .send(&OutboundMessage {
                        contact_id: contact_id.clone(),
                        channel: *channel,
                        message: message.clone(),
                        subject: subject.clone(),
                    })
                    .await?;
                let mut record = sent;
                if record.get("id").is_none() {
                    if let Some(id) = record.get("messageId").cloned() {
                        record["id"] = id;
                    }
                }
                out.print_result(
                    &format!("{channel} sent to {contact_id}"),
                    &record,
                    &[("messageId", "Message"), ("conversationId", "Conversation")],
                );
            }
        }
        Ok(())
    }
}
