use crate::core::auth::normalize_email;
use crate::core::platform::{same_user, Platform};
use crate::core::store::names;
use crate::domain::model::{
    BlockEntry, ContactLink, ContactStatus, NotificationKind, Priority, User,
};
use crate::domain::ports::Storage;
use crate::utils::error::{PlatformError, Result};
use chrono::Utc;
use serde::Serialize;

/// Everything the contacts screen shows for one user.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ContactBook {
    pub contacts: Vec<String>,
    pub incoming: Vec<String>,
    pub outgoing: Vec<String>,
    pub blocked: Vec<String>,
}

fn links_between(link: &ContactLink, a: &str, b: &str) -> bool {
    (same_user(&link.user, a) && same_user(&link.contact, b))
        || (same_user(&link.user, b) && same_user(&link.contact, a))
}

impl<S: Storage> Platform<S> {
    /// Whether `blocker` has blocked `other`.
    pub async fn has_blocked(&self, blocker: &str, other: &str) -> Result<bool> {
        let blocks: Vec<BlockEntry> = self.store.load(names::BLOCKS).await?;
        Ok(blocks
            .iter()
            .any(|b| same_user(&b.user, blocker) && same_user(&b.blocked, other)))
    }

    pub async fn request_contact(&self, actor: &User, email: &str) -> Result<ContactLink> {
        let target = normalize_email(email);
        if same_user(&actor.email, &target) {
            return Err(PlatformError::validation("cannot add yourself as a contact"));
        }
        if self.find_user(&target).await?.is_none() {
            return Err(PlatformError::not_found("user", target));
        }
        if self.has_blocked(&target, &actor.email).await?
            || self.has_blocked(&actor.email, &target).await?
        {
            return Err(PlatformError::denied(
                format!("send a contact request to {}", target),
                actor.role,
            ));
        }

        let me = actor.email.clone();
        let link = self
            .store
            .update(names::CONTACTS, |links: &mut Vec<ContactLink>| {
                if links.iter().any(|l| {
                    links_between(l, &me, &target) && l.status != ContactStatus::Rejected
                }) {
                    return Err(PlatformError::conflict(format!(
                        "a request between {} and {} already exists",
                        me, target
                    )));
                }
                let link = ContactLink {
                    user: me.clone(),
                    contact: target.clone(),
                    status: ContactStatus::Pending,
                    created_at: Utc::now(),
                };
                links.retain(|l| !links_between(l, &me, &target));
                links.push(link.clone());
                Ok(link)
            })
            .await?;

        self.notify(
            NotificationKind::Info,
            format!("{} wants to connect", actor.name),
            Priority::Normal,
            &link.contact,
        )
        .await?;
        tracing::debug!("{} requested contact with {}", link.user, link.contact);
        Ok(link)
    }

    /// Accepts or rejects the pending request `from` sent to `actor`.
    /// Accepting stores the reverse link too.
    pub async fn respond_contact(&self, actor: &User, from: &str, accept: bool) -> Result<ContactStatus> {
        let me = actor.email.clone();
        let from = normalize_email(from);
        let status = if accept {
            ContactStatus::Accepted
        } else {
            ContactStatus::Rejected
        };

        self.store
            .update(names::CONTACTS, |links: &mut Vec<ContactLink>| {
                let request = links
                    .iter_mut()
                    .find(|l| {
                        same_user(&l.user, &from)
                            && same_user(&l.contact, &me)
                            && l.status == ContactStatus::Pending
                    })
                    .ok_or_else(|| PlatformError::not_found("contact request", from.clone()))?;
                request.status = status;
                if accept {
                    links.push(ContactLink {
                        user: me.clone(),
                        contact: from.clone(),
                        status,
                        created_at: Utc::now(),
                    });
                }
                Ok(())
            })
            .await?;

        if accept {
            self.notify(
                NotificationKind::Success,
                format!("{} accepted your contact request!", actor.name),
                Priority::Normal,
                &from,
            )
            .await?;
        }
        tracing::debug!("{} {} contact request from {}", me, status, from);
        Ok(status)
    }

    /// Drops the relation in both directions.
    pub async fn remove_contact(&self, actor: &User, email: &str) -> Result<bool> {
        self.store
            .update(names::CONTACTS, |links: &mut Vec<ContactLink>| {
                let before = links.len();
                links.retain(|l| !links_between(l, &actor.email, email));
                Ok(links.len() != before)
            })
            .await
    }

    /// Blocking also removes any contact relation with the blocked user.
    pub async fn block_user(&self, actor: &User, email: &str) -> Result<BlockEntry> {
        let target = normalize_email(email);
        if same_user(&actor.email, &target) {
            return Err(PlatformError::validation("cannot block yourself"));
        }
        let entry = BlockEntry {
            user: actor.email.clone(),
            blocked: target,
            created_at: Utc::now(),
        };
        let saved = entry.clone();
        self.store
            .update(names::BLOCKS, move |blocks: &mut Vec<BlockEntry>| {
                if !blocks
                    .iter()
                    .any(|b| same_user(&b.user, &saved.user) && same_user(&b.blocked, &saved.blocked))
                {
                    blocks.push(saved);
                }
                Ok(())
            })
            .await?;
        self.remove_contact(actor, &entry.blocked).await?;
        tracing::info!("{} blocked {}", entry.user, entry.blocked);
        Ok(entry)
    }

    pub async fn unblock_user(&self, actor: &User, email: &str) -> Result<bool> {
        self.store
            .update(names::BLOCKS, |blocks: &mut Vec<BlockEntry>| {
                let before = blocks.len();
                blocks.retain(|b| !(same_user(&b.user, &actor.email) && same_user(&b.blocked, email)));
                Ok(blocks.len() != before)
            })
            .await
    }

    pub async fn contact_book(&self, user: &str) -> Result<ContactBook> {
        let links: Vec<ContactLink> = self.store.load(names::CONTACTS).await?;
        let blocks: Vec<BlockEntry> = self.store.load(names::BLOCKS).await?;

        let mut book = ContactBook::default();
        for link in &links {
            match link.status {
                ContactStatus::Accepted if same_user(&link.user, user) => {
                    book.contacts.push(link.contact.clone())
                }
                ContactStatus::Pending if same_user(&link.contact, user) => {
                    book.incoming.push(link.user.clone())
                }
                ContactStatus::Pending if same_user(&link.user, user) => {
                    book.outgoing.push(link.contact.clone())
                }
                _ => {}
            }
        }
        book.blocked = blocks
            .into_iter()
            .filter(|b| same_user(&b.user, user))
            .map(|b| b.blocked)
            .collect();
        Ok(book)
    }
}
