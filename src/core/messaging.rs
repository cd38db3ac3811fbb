use crate::core::platform::{same_user, Platform};
use crate::core::store::names;
use crate::domain::model::{Conversation, Message, Receipt, User};
use crate::domain::ports::Storage;
use crate::utils::error::{PlatformError, Result};
use crate::utils::ids::next_id;
use crate::utils::validation::{validate_email, validate_non_empty_string};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct InboxEntry {
    pub conversation: Conversation,
    pub unread: usize,
    pub last_message: Option<Message>,
}

fn is_member(convo: &Conversation, user: &str) -> bool {
    convo.members.iter().any(|m| same_user(m, user))
}

fn is_pair(convo: &Conversation, a: &str, b: &str) -> bool {
    !convo.is_group
        && convo.members.len() == 2
        && is_member(convo, a)
        && is_member(convo, b)
}

fn unread_for(message: &Message, user: &str) -> bool {
    message
        .receipts
        .iter()
        .any(|(who, r)| *r == Receipt::Unread && same_user(who, user))
}

impl<S: Storage> Platform<S> {
    /// Sends into `convo` when given; otherwise into the 1:1 conversation
    /// between sender and `to`, created on first use.
    pub async fn send_message(
        &self,
        from: &User,
        to: &str,
        text: &str,
        convo: Option<&str>,
    ) -> Result<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PlatformError::validation("message text cannot be empty"));
        }

        let sender = from.email.clone();
        let conversation = match convo {
            Some(id) => {
                let conversation = self.get_conversation(id).await?;
                if !is_member(&conversation, &sender) {
                    return Err(PlatformError::denied(
                        format!("post in conversation {}", id),
                        from.role,
                    ));
                }
                if !conversation.is_group {
                    for member in conversation.members.iter().filter(|m| !same_user(m, &sender)) {
                        self.check_not_blocked(from, member).await?;
                    }
                }
                conversation
            }
            None => {
                let to = to.trim().to_lowercase();
                validate_email("recipient", &to)?;
                if same_user(&to, &sender) {
                    return Err(PlatformError::validation("cannot message yourself"));
                }
                self.check_not_blocked(from, &to).await?;
                self.store
                    .update(names::CONVERSATIONS, |convos: &mut Vec<Conversation>| {
                        if let Some(existing) = convos.iter().find(|c| is_pair(c, &sender, &to)) {
                            return Ok(existing.clone());
                        }
                        let created = Conversation {
                            id: next_id("C"),
                            name: format!("{} & {}", sender, to),
                            is_group: false,
                            members: vec![sender.clone(), to.clone()],
                            created_at: Utc::now(),
                        };
                        convos.push(created.clone());
                        Ok(created)
                    })
                    .await?
            }
        };

        let receipts: BTreeMap<String, Receipt> = conversation
            .members
            .iter()
            .filter(|m| !same_user(m, &sender))
            .map(|m| (m.clone(), Receipt::Unread))
            .collect();
        let message = Message {
            id: next_id("M"),
            convo_id: conversation.id.clone(),
            sender,
            text: text.to_string(),
            time: Utc::now(),
            receipts,
        };
        self.store.append(names::MESSAGES, message.clone()).await?;
        tracing::debug!("Message {} sent in {}", message.id, conversation.id);
        Ok(message)
    }

    async fn check_not_blocked(&self, from: &User, to: &str) -> Result<()> {
        if self.has_blocked(to, &from.email).await? {
            tracing::debug!("{} is blocked by {}", from.email, to);
            return Err(PlatformError::denied(format!("message {}", to), from.role));
        }
        Ok(())
    }

    pub async fn create_group(&self, actor: &User, name: &str, members: &[String]) -> Result<Conversation> {
        validate_non_empty_string("group name", name)?;
        let mut all = vec![actor.email.clone()];
        for member in members {
            let member = member.trim().to_lowercase();
            validate_email("member", &member)?;
            if !all.iter().any(|m| same_user(m, &member)) {
                all.push(member);
            }
        }
        if all.len() < 2 {
            return Err(PlatformError::validation("a group needs at least one other member"));
        }

        let group = Conversation {
            id: next_id("C"),
            name: name.trim().to_string(),
            is_group: true,
            members: all,
            created_at: Utc::now(),
        };
        self.store.append(names::CONVERSATIONS, group.clone()).await?;
        tracing::info!("{} created group '{}' with {} members", actor.email, group.name, group.members.len());
        Ok(group)
    }

    pub async fn get_conversation(&self, id: &str) -> Result<Conversation> {
        let convos: Vec<Conversation> = self.store.load(names::CONVERSATIONS).await?;
        convos
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| PlatformError::not_found("conversation", id))
    }

    /// Returns how many messages flipped to read.
    pub async fn mark_read(&self, convo: &str, user: &str) -> Result<usize> {
        self.store
            .update(names::MESSAGES, |messages: &mut Vec<Message>| {
                let mut changed = 0;
                for m in messages.iter_mut().filter(|m| m.convo_id == convo) {
                    for (who, receipt) in m.receipts.iter_mut() {
                        if *receipt == Receipt::Unread && same_user(who, user) {
                            *receipt = Receipt::Read;
                            changed += 1;
                        }
                    }
                }
                Ok(changed)
            })
            .await
    }

    pub async fn unread_count(&self, user: &str) -> Result<usize> {
        let messages: Vec<Message> = self.store.load(names::MESSAGES).await?;
        Ok(messages.iter().filter(|m| unread_for(m, user)).count())
    }

    /// Oldest first.
    pub async fn conversation(&self, convo: &str) -> Result<Vec<Message>> {
        let mut messages: Vec<Message> = self.store.load(names::MESSAGES).await?;
        messages.retain(|m| m.convo_id == convo);
        messages.sort_by(|a, b| a.time.cmp(&b.time));
        Ok(messages)
    }

    /// The user's conversations, most recently active first.
    pub async fn inbox(&self, user: &str) -> Result<Vec<InboxEntry>> {
        let convos: Vec<Conversation> = self.store.load(names::CONVERSATIONS).await?;
        let messages: Vec<Message> = self.store.load(names::MESSAGES).await?;

        let mut entries: Vec<InboxEntry> = convos
            .into_iter()
            .filter(|c| is_member(c, user))
            .map(|conversation| {
                let in_convo = messages.iter().filter(|m| m.convo_id == conversation.id);
                let unread = in_convo.clone().filter(|m| unread_for(m, user)).count();
                let last_message = in_convo.max_by_key(|m| m.time).cloned();
                InboxEntry {
                    conversation,
                    unread,
                    last_message,
                }
            })
            .collect();
        entries.sort_by(|a, b| {
            let at = |e: &InboxEntry| {
                e.last_message
                    .as_ref()
                    .map_or(e.conversation.created_at, |m| m.time)
            };
            at(b).cmp(&at(a))
        });
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::testing::*;

    #[tokio::test]
    async fn test_direct_messages_reuse_conversation() {
        let platform = platform();
        assert!(platform
            .send_message(&citizen(), "vol@straysafe.org", "   ", None)
            .await
            .is_err());
        assert!(platform
            .send_message(&citizen(), "citizen@mail.com", "hi", None)
            .await
            .is_err());

        let first = platform
            .send_message(&citizen(), "vol@straysafe.org", "Dog near the bus stop", None)
            .await
            .unwrap();
        let reply = platform
            .send_message(&volunteer(), "CITIZEN@mail.com", "On my way", None)
            .await
            .unwrap();
        assert_eq!(first.convo_id, reply.convo_id);
        assert_eq!(first.receipts.get("vol@straysafe.org"), Some(&Receipt::Unread));

        let thread = platform.conversation(&first.convo_id).await.unwrap();
        let texts: Vec<&str> = thread.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["Dog near the bus stop", "On my way"]);

        assert_eq!(platform.unread_count("vol@straysafe.org").await.unwrap(), 1);
        assert_eq!(platform.mark_read(&first.convo_id, "vol@straysafe.org").await.unwrap(), 1);
        assert_eq!(platform.unread_count("vol@straysafe.org").await.unwrap(), 0);
        assert_eq!(platform.unread_count("citizen@mail.com").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_blocked_sender_cannot_message_blocker() {
        let platform = platform();
        let first = platform
            .send_message(&citizen(), "vol@straysafe.org", "Puppy under the car", None)
            .await
            .unwrap();
        platform.block_user(&volunteer(), "citizen@mail.com").await.unwrap();

        let direct = platform
            .send_message(&citizen(), "vol@straysafe.org", "hello?", None)
            .await;
        assert!(matches!(direct, Err(PlatformError::PermissionDenied { .. })));
        let in_thread = platform
            .send_message(&citizen(), "", "hello?", Some(&first.convo_id))
            .await;
        assert!(matches!(in_thread, Err(PlatformError::PermissionDenied { .. })));

        platform
            .send_message(&volunteer(), "citizen@mail.com", "Handled, thanks", None)
            .await
            .unwrap();
        assert_eq!(platform.conversation(&first.convo_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_group_messages() {
        let platform = platform();
        assert!(platform.create_group(&admin(), "Rescue crew", &[]).await.is_err());
        let group = platform
            .create_group(
                &admin(),
                "Rescue crew",
                &["vol@straysafe.org".to_string(), "vet@clinic.in".to_string(), "admin@straysafe.org".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(group.members.len(), 3);

        let msg = platform
            .send_message(&admin(), "", "Briefing at 6", Some(&group.id))
            .await
            .unwrap();
        assert_eq!(msg.receipts.len(), 2);
        assert!(platform
            .send_message(&citizen(), "", "let me in", Some(&group.id))
            .await
            .is_err());

        let inbox = platform.inbox("vet@clinic.in").await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].unread, 1);
        assert_eq!(inbox[0].last_message.as_ref().unwrap().text, "Briefing at 6");
        assert!(platform.inbox("citizen@mail.com").await.unwrap().is_empty());
    }
}
