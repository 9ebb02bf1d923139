//! Inbox aggregation over direct messages.
//!
//! Everything here works on messages already loaded into memory and takes
//! the current user explicitly. Persisting the read flags reported by
//! [`open_conversation`] is the caller's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

impl MessageView {
    fn involves(&self, user_id: &str) -> bool {
        self.sender_id == user_id || self.recipient_id == user_id
    }

    fn is_between(&self, user_a: &str, user_b: &str) -> bool {
        (self.sender_id == user_a && self.recipient_id == user_b)
            || (self.sender_id == user_b && self.recipient_id == user_a)
    }

    /// The other participant, seen from `user_id`.
    fn counterpart(&self, user_id: &str) -> &str {
        if self.sender_id == user_id {
            &self.recipient_id
        } else {
            &self.sender_id
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSummary {
    pub contact_id: String,
    pub unread_count: usize,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inbox {
    pub contacts: Vec<ContactSummary>,
    pub total_unread: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedConversation {
    /// The full thread, oldest first, with read flags already updated.
    pub messages: Vec<MessageView>,
    /// Ids of the messages that went from unread to read.
    pub newly_read: Vec<String>,
}

/// Groups `messages` by the other participant and orders contacts by most
/// recent activity. Contacts with the same last activity are ordered by id.
/// Messages that do not involve `current_user` are ignored.
pub fn list_conversations(current_user: &str, messages: &[MessageView]) -> Inbox {
    let mut by_contact: BTreeMap<&str, ContactSummary> = BTreeMap::new();
    for message in messages.iter().filter(|m| m.involves(current_user)) {
        let contact = message.counterpart(current_user);
        let summary = by_contact
            .entry(contact)
            .or_insert_with(|| ContactSummary {
                contact_id: contact.to_string(),
                unread_count: 0,
                last_activity: None,
            });
        if message.recipient_id == current_user && !message.read {
            summary.unread_count += 1;
        }
        if summary.last_activity < Some(message.created_at) {
            summary.last_activity = Some(message.created_at);
        }
    }

    let mut contacts: Vec<ContactSummary> = by_contact.into_values().collect();
    // `None` orders below any timestamp, so contacts without one land last.
    contacts.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
    let total_unread = contacts.iter().map(|c| c.unread_count).sum();

    Inbox {
        contacts,
        total_unread,
    }
}

/// Extracts the thread between `current_user` and `partner` and marks every
/// unread message the partner sent to `current_user` as read.
///
/// Returns `None` without touching anything when the two have never
/// exchanged a message.
pub fn open_conversation(
    current_user: &str,
    partner: &str,
    messages: Vec<MessageView>,
) -> Option<OpenedConversation> {
    let mut thread: Vec<MessageView> = messages
        .into_iter()
        .filter(|m| m.is_between(current_user, partner))
        .collect();
    if thread.is_empty() {
        return None;
    }
    thread.sort_by_key(|m| m.created_at);

    let mut newly_read = Vec::new();
    for message in thread.iter_mut() {
        if message.sender_id == partner && message.recipient_id == current_user && !message.read {
            message.read = true;
            newly_read.push(message.id.clone());
        }
    }

    Some(OpenedConversation {
        messages: thread,
        newly_read,
    })
}
