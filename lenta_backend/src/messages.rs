use crate::conversations::{self, MessageView};
use crate::database::models::{MessageRecord, UserRecord};
use crate::database::repositories::{MessageRepository, UserRepository};
use crate::database::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::utils::now_utc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_MESSAGE_LENGTH: usize = 10_000;

#[derive(Clone)]
pub struct MessageService {
    database: Database,
}

impl MessageService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Everyone `user_id` has exchanged messages with, most recent first.
    pub fn inbox(&self, user_id: &str) -> ServiceResult<InboxView> {
        let (inbox, contacts) = self.database.with_repositories(|repos| {
            let messages: Vec<MessageView> = repos
                .messages()
                .list_involving(user_id)?
                .into_iter()
                .map(view_from_record)
                .collect();
            let inbox = conversations::list_conversations(user_id, &messages);
            let mut contacts = Vec::with_capacity(inbox.contacts.len());
            for summary in &inbox.contacts {
                let username = repos
                    .users()
                    .get(&summary.contact_id)?
                    .map(|user| user.username)
                    .unwrap_or_default();
                contacts.push(ContactView {
                    user_id: summary.contact_id.clone(),
                    username,
                    unread_count: summary.unread_count,
                    last_activity: summary.last_activity,
                });
            }
            Ok((inbox, contacts))
        })?;

        Ok(InboxView {
            contacts,
            total_unread: inbox.total_unread,
        })
    }

    /// Returns the thread with `partner_username` and marks the partner's
    /// unread messages as read. Loading and marking share one immediate
    /// transaction.
    pub fn open_conversation(
        &self,
        user_id: &str,
        partner_username: &str,
    ) -> ServiceResult<ConversationView> {
        let partner = self.require_user(partner_username)?;

        let (opened, marked_read) = self.database.with_transaction(|repos| {
            let messages = repos
                .messages()
                .list_between(user_id, &partner.id)?
                .into_iter()
                .map(view_from_record)
                .collect();
            let Some(opened) = conversations::open_conversation(user_id, &partner.id, messages)
            else {
                return Ok((None, 0));
            };
            let marked_read = repos.messages().mark_read(&opened.newly_read)?;
            Ok((Some(opened), marked_read))
        })?;

        let partner = ParticipantView {
            user_id: partner.id,
            username: partner.username,
        };
        match opened {
            Some(opened) => {
                if marked_read > 0 {
                    tracing::info!(
                        user_id,
                        partner_id = %partner.user_id,
                        marked_read,
                        "conversation opened"
                    );
                }
                Ok(ConversationView {
                    partner,
                    messages: opened.messages,
                    opened: true,
                })
            }
            None => Ok(ConversationView {
                partner,
                messages: Vec::new(),
                opened: false,
            }),
        }
    }

    pub fn send_message(
        &self,
        sender_id: &str,
        recipient_username: &str,
        body: &str,
    ) -> ServiceResult<MessageView> {
        let body = body.trim();
        if body.is_empty() {
            return Err(ServiceError::validation("message body may not be empty"));
        }
        if body.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ServiceError::validation(format!(
                "message may not exceed {MAX_MESSAGE_LENGTH} characters"
            )));
        }
        let recipient = self.require_user(recipient_username)?;
        if recipient.id == sender_id {
            return Err(ServiceError::validation("cannot send a message to yourself"));
        }

        let record = MessageRecord {
            id: Uuid::new_v4().to_string(),
            sender_id: sender_id.to_string(),
            recipient_id: recipient.id,
            body: body.to_string(),
            created_at: now_utc(),
            is_read: false,
        };
        self.database.with_repositories(|repos| {
            if repos.users().get(sender_id)?.is_none() {
                anyhow::bail!(ServiceError::not_found(format!("user {sender_id}")));
            }
            repos.messages().create(&record)
        })?;

        tracing::info!(
            message_id = %record.id,
            sender_id,
            recipient_id = %record.recipient_id,
            "message sent"
        );
        Ok(view_from_record(record))
    }

    pub fn unread_count(&self, user_id: &str) -> ServiceResult<usize> {
        Ok(self
            .database
            .with_repositories(|repos| repos.messages().count_unread(user_id))?)
    }

    fn require_user(&self, username: &str) -> ServiceResult<UserRecord> {
        self.database
            .with_repositories(|repos| repos.users().get_by_username(username))?
            .ok_or_else(|| ServiceError::not_found(format!("user {username}")))
    }
}

fn view_from_record(record: MessageRecord) -> MessageView {
    MessageView {
        id: record.id,
        sender_id: record.sender_id,
        recipient_id: record.recipient_id,
        body: record.body,
        created_at: record.created_at,
        read: record.is_read,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactView {
    pub user_id: String,
    pub username: String,
    pub unread_count: usize,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboxView {
    pub contacts: Vec<ContactView>,
    pub total_unread: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantView {
    pub user_id: String,
    pub username: String,
}

/// An opened thread. `opened` is false when the two users have no history,
/// in which case `messages` is empty and nothing was changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationView {
    pub partner: ParticipantView,
    pub messages: Vec<MessageView>,
    pub opened: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn setup() -> (Database, MessageService) {
        let db = Database::open_in_memory().expect("db");
        db.with_repositories(|repos| {
            for (id, username) in [("u1", "alice"), ("u2", "bob"), ("u3", "carol"), ("u4", "dave")] {
                repos.users().create(&UserRecord {
                    id: id.into(),
                    username: username.into(),
                    email: None,
                    password_hash: "hash".into(),
                    created_at: now_utc(),
                })?;
            }
            Ok(())
        })
        .expect("seed users");
        (db.clone(), MessageService::new(db))
    }

    fn seed(db: &Database, id: &str, from: &str, to: &str, offset_secs: i64, is_read: bool) {
        let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        db.with_repositories(|repos| {
            repos.messages().create(&MessageRecord {
                id: id.into(),
                sender_id: from.into(),
                recipient_id: to.into(),
                body: format!("msg {id}"),
                created_at: base + Duration::seconds(offset_secs),
                is_read,
            })
        })
        .expect("seed message");
    }

    #[test]
    fn inbox_counts_unread_per_contact() {
        let (db, service) = setup();
        seed(&db, "m1", "u2", "u1", 1, false);
        seed(&db, "m2", "u2", "u1", 2, false);
        seed(&db, "m3", "u1", "u2", 3, false);
        seed(&db, "m4", "u3", "u1", 4, false);
        seed(&db, "m5", "u3", "u1", 5, true);

        let inbox = service.inbox("u1").expect("inbox");
        assert_eq!(inbox.total_unread, 3);
        let bob = inbox.contacts.iter().find(|c| c.username == "bob").unwrap();
        let carol = inbox.contacts.iter().find(|c| c.username == "carol").unwrap();
        assert_eq!(bob.unread_count, 2);
        assert_eq!(carol.unread_count, 1);
        assert_eq!(service.unread_count("u1").expect("count"), 3);
    }

    #[test]
    fn inbox_orders_by_latest_activity() {
        let (db, service) = setup();
        seed(&db, "m1", "u4", "u1", 1, true);
        seed(&db, "m2", "u1", "u3", 5, false);
        seed(&db, "m3", "u2", "u1", 10, true);

        let inbox = service.inbox("u1").expect("inbox");
        let names: Vec<_> = inbox.contacts.iter().map(|c| c.username.as_str()).collect();
        assert_eq!(names, vec!["bob", "carol", "dave"]);
    }

    #[test]
    fn opening_persists_read_flags_for_partner_messages_only() {
        let (db, service) = setup();
        seed(&db, "m1", "u2", "u1", 1, false);
        seed(&db, "m2", "u1", "u2", 2, false);
        seed(&db, "m3", "u2", "u1", 3, false);
        seed(&db, "m4", "u3", "u1", 4, false);

        let conversation = service.open_conversation("u1", "bob").expect("open");
        assert!(conversation.opened);
        assert_eq!(conversation.partner.user_id, "u2");
        assert_eq!(conversation.messages.len(), 3);

        let stored = |id: &str| {
            db.with_repositories(|repos| repos.messages().get(id))
                .expect("get")
                .expect("present")
        };
        assert!(stored("m1").is_read);
        assert!(!stored("m2").is_read);
        assert!(stored("m3").is_read);
        assert!(!stored("m4").is_read);
        assert_eq!(service.unread_count("u1").expect("count"), 1);
    }

    #[test]
    fn opening_without_history_changes_nothing() {
        let (db, service) = setup();
        seed(&db, "m1", "u3", "u1", 1, false);

        let conversation = service.open_conversation("u1", "bob").expect("open");
        assert!(!conversation.opened);
        assert!(conversation.messages.is_empty());
        assert_eq!(service.unread_count("u1").expect("count"), 1);
    }

    #[test]
    fn reopening_is_a_no_op() {
        let (db, service) = setup();
        seed(&db, "m1", "u2", "u1", 1, false);

        let first = service.open_conversation("u1", "bob").expect("first");
        let second = service.open_conversation("u1", "bob").expect("second");
        assert_eq!(first.messages, second.messages);
        assert!(second.messages.iter().all(|m| m.read));
    }

    #[test]
    fn send_message_validates_recipient_and_body() {
        let (_, service) = setup();
        let sent = service.send_message("u1", "bob", "  hello  ").expect("send");
        assert_eq!(sent.body, "hello");
        assert!(!sent.read);
        assert_eq!(service.unread_count("u2").expect("count"), 1);

        assert!(matches!(
            service.send_message("u1", "ghost", "hi").unwrap_err(),
            ServiceError::NotFound(_)
        ));
        assert!(matches!(
            service.send_message("u1", "alice", "hi").unwrap_err(),
            ServiceError::Validation(_)
        ));
        assert!(matches!(
            service.send_message("u1", "bob", "   ").unwrap_err(),
            ServiceError::Validation(_)
        ));
    }

    #[test]
    fn unknown_partner_is_not_found() {
        let (_, service) = setup();
        assert!(matches!(
            service.open_conversation("u1", "ghost").unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }
}
