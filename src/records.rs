//! Records read from the source message store.
//!
//! CHANGELOG:
//! - 10/17/2026 - Read chat.style for group detection
//! - 10/16/2026 - Initial record types for the import pipeline

use serde::{Deserialize, Serialize};

use crate::identity::handle::{classify_handle, HandleKind};

/// Transport a message travelled over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Channel {
    #[serde(rename = "sms")]
    Sms,
    #[serde(rename = "imessage-chat")]
    ImessageChat,
    #[serde(rename = "imessage-email")]
    ImessageEmail,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::ImessageChat => "imessage-chat",
            Channel::ImessageEmail => "imessage-email",
        }
    }

    /// Parse the stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sms" => Some(Channel::Sms),
            "imessage-chat" => Some(Channel::ImessageChat),
            "imessage-email" => Some(Channel::ImessageEmail),
            _ => None,
        }
    }

    /// Derive the channel from the source `service` column and the handle.
    ///
    /// Anything that is not iMessage (SMS, RCS, missing) counts as SMS.
    pub fn from_service(service: Option<&str>, handle: &str) -> Self {
        match service {
            Some(s) if s.eq_ignore_ascii_case("iMessage") => match classify_handle(handle) {
                HandleKind::Email => Channel::ImessageEmail,
                _ => Channel::ImessageChat,
            },
            _ => Channel::Sms,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message row as read from chat.db / sms.db.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawMessageRecord {
    /// ROWID in the source store. Not stable across backups or restores.
    pub local_id: i64,
    pub guid: Option<String>,
    /// Counterpart handle as stored (`+14155551234`, `jane@icloud.com`, ...).
    pub handle: String,
    pub chat_identifier: Option<String>,
    pub timestamp_ms: i64,
    pub channel: Channel,
    pub is_from_me: bool,
    pub text: Option<String>,
    #[serde(skip)]
    pub body: Option<Vec<u8>>,
}

/// Attachment as read from the source store, before it is linked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceAttachment {
    /// Local ROWID of the owning message in the source store.
    pub message_local_id: i64,
    pub filename: String,
    pub mime_type: Option<String>,
    pub total_bytes: i64,
}

/// Attachment keyed by the owning message's external identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentRecord {
    pub message_external_id: String,
    pub filename: String,
    pub mime_type: Option<String>,
    pub total_bytes: i64,
}

/// `chat.style` of a group conversation; one-to-one chats use 45.
pub const GROUP_CHAT_STYLE: i64 = 43;

/// A conversation in the source store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRecord {
    pub local_id: i64,
    pub chat_identifier: String,
    pub display_name: Option<String>,
    pub service: Option<String>,
    /// `chat.style`, when the source has the column.
    pub style: Option<i64>,
    /// Counterpart handles, excluding the device owner.
    pub participants: Vec<String>,
}

impl ChatRecord {
    /// Group style, or more than one counterpart. Members who left the chat
    /// are no longer listed, so the style wins over the participant count.
    pub fn is_group(&self) -> bool {
        self.style == Some(GROUP_CHAT_STYLE) || self.participants.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_from_service() {
        assert_eq!(Channel::from_service(Some("SMS"), "+14155551234"), Channel::Sms);
        assert_eq!(Channel::from_service(Some("RCS"), "+14155551234"), Channel::Sms);
        assert_eq!(Channel::from_service(None, "+14155551234"), Channel::Sms);
        assert_eq!(
            Channel::from_service(Some("iMessage"), "+14155551234"),
            Channel::ImessageChat
        );
        assert_eq!(
            Channel::from_service(Some("iMessage"), "madison@icloud.com"),
            Channel::ImessageEmail
        );
    }

    #[test]
    fn test_channel_string_forms() {
        for channel in [Channel::Sms, Channel::ImessageChat, Channel::ImessageEmail] {
            assert_eq!(Channel::parse(channel.as_str()), Some(channel));
            let json = serde_json::to_string(&channel).unwrap();
            assert_eq!(json, format!("\"{}\"", channel.as_str()));
        }
        assert_eq!(Channel::parse("fax"), None);
    }

    #[test]
    fn test_group_detection() {
        let mut chat = ChatRecord {
            local_id: 1,
            chat_identifier: "chat1".into(),
            display_name: None,
            service: Some("iMessage".into()),
            style: Some(45),
            participants: vec!["+14155551234".into()],
        };
        assert!(!chat.is_group());
        chat.participants.push("+14155550000".into());
        assert!(chat.is_group());
    }

    #[test]
    fn test_group_style_with_one_remaining_member() {
        let chat = ChatRecord {
            local_id: 2,
            chat_identifier: "chat884422".into(),
            display_name: Some("Open House Team".into()),
            service: Some("iMessage".into()),
            style: Some(GROUP_CHAT_STYLE),
            participants: vec!["+14155551234".into()],
        };
        assert!(chat.is_group());
    }
}
