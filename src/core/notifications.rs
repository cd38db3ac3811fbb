use crate::core::platform::{same_user, Platform};
use crate::core::store::names;
use crate::domain::model::{AuditEntry, Notification, NotificationKind, Priority, User};
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use crate::utils::ids::next_id;
use chrono::Utc;

/// Recipient used for notifications meant for every responder.
pub const BROADCAST: &str = "all";

impl<S: Storage> Platform<S> {
    pub async fn notify(
        &self,
        kind: NotificationKind,
        message: impl Into<String>,
        priority: Priority,
        user: &str,
    ) -> Result<Notification> {
        let notification = Notification {
            id: next_id("NOTIF"),
            kind,
            message: message.into(),
            time: Utc::now(),
            read: false,
            priority,
            user: user.to_string(),
        };
        tracing::debug!("Notification {} for {}: {}", notification.id, user, notification.message);
        self.store.append(names::NOTIFICATIONS, notification.clone()).await?;
        Ok(notification)
    }

    fn visible_to(notification: &Notification, user: &str) -> bool {
        notification.user == BROADCAST || same_user(&notification.user, user)
    }

    pub async fn unread_notifications(&self, user: &str) -> Result<usize> {
        let all: Vec<Notification> = self.store.load(names::NOTIFICATIONS).await?;
        Ok(all
            .iter()
            .filter(|n| !n.read && Self::visible_to(n, user))
            .count())
    }

    /// Marks everything visible to `user` as read; returns how many changed.
    pub async fn mark_notifications_read(&self, user: &str) -> Result<usize> {
        self.store
            .update(names::NOTIFICATIONS, |all: &mut Vec<Notification>| {
                let mut changed = 0;
                for n in all.iter_mut().filter(|n| !n.read && Self::visible_to(n, user)) {
                    n.read = true;
                    changed += 1;
                }
                Ok(changed)
            })
            .await
    }

    /// Newest first.
    pub async fn recent_notifications(&self, user: &str, n: usize) -> Result<Vec<Notification>> {
        let mut all: Vec<Notification> = self.store.load(names::NOTIFICATIONS).await?;
        all.retain(|item| Self::visible_to(item, user));
        all.sort_by(|a, b| b.time.cmp(&a.time));
        all.truncate(n);
        Ok(all)
    }

    pub async fn audit(
        &self,
        event: &str,
        actor: Option<&User>,
        meta: serde_json::Value,
    ) -> Result<()> {
        let entry = AuditEntry {
            time: Utc::now(),
            event: event.to_string(),
            user: actor.map(|u| u.email.clone()),
            role: actor.map(|u| u.role),
            meta,
        };
        tracing::debug!(event, user = ?entry.user, "audit");
        self.store.append(names::AUDIT, entry).await
    }

    pub async fn audit_log(&self, actor: &User, limit: usize) -> Result<Vec<AuditEntry>> {
        crate::core::platform::require_admin(actor, "read the audit log")?;
        let mut entries: Vec<AuditEntry> = self.store.load(names::AUDIT).await?;
        entries.sort_by(|a, b| b.time.cmp(&a.time));
        entries.truncate(limit);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::testing::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_notifications_unread_and_mark_read() {
        let platform = platform();
        platform
            .notify(NotificationKind::Info, "hello", Priority::Normal, "vet@clinic.in")
            .await
            .unwrap();
        platform
            .notify(NotificationKind::Emergency, "SOS", Priority::High, BROADCAST)
            .await
            .unwrap();
        platform
            .notify(NotificationKind::Info, "other", Priority::Low, "someone@else.com")
            .await
            .unwrap();

        assert_eq!(platform.unread_notifications("VET@clinic.in").await.unwrap(), 2);
        let recent = platform.recent_notifications("vet@clinic.in", 1).await.unwrap();
        assert_eq!(recent.len(), 1);

        assert_eq!(platform.mark_notifications_read("vet@clinic.in").await.unwrap(), 2);
        assert_eq!(platform.unread_notifications("vet@clinic.in").await.unwrap(), 0);
        assert_eq!(platform.unread_notifications("someone@else.com").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_audit_log_is_admin_only() {
        let platform = platform();
        platform
            .audit("sos_created", Some(&volunteer()), json!({"id": "SOS-1"}))
            .await
            .unwrap();
        platform.audit("system_start", None, json!({})).await.unwrap();

        assert!(platform.audit_log(&vet(), 10).await.is_err());
        let entries = platform.audit_log(&admin(), 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.user.as_deref() == Some("vol@straysafe.org")));
    }
}
