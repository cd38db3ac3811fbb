use crate::core::auth::{check_password_len, hash_password, verify_password};
use crate::core::platform::{same_user, Platform};
use crate::core::store::names;
use crate::domain::model::{NotificationPrefs, User};
use crate::domain::ports::Storage;
use crate::utils::error::{PlatformError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_phone};
use serde_json::json;

/// Fields left as `None` are kept. An empty phone removes the number.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
}

fn find_mut<'a>(users: &'a mut [User], email: &str) -> Result<&'a mut User> {
    users
        .iter_mut()
        .find(|u| same_user(&u.email, email))
        .ok_or_else(|| PlatformError::not_found("user", email))
}

impl<S: Storage> Platform<S> {
    pub async fn update_profile(&self, actor: &User, update: ProfileUpdate) -> Result<User> {
        let name = update.name.map(|n| n.trim().to_string());
        if let Some(name) = &name {
            validate_non_empty_string("name", name)?;
        }
        let phone = update.phone.map(|p| p.trim().to_string());
        if let Some(phone) = phone.as_deref().filter(|p| !p.is_empty()) {
            validate_phone("phone", phone)?;
        }

        let updated = self
            .store
            .update(names::USERS, |users: &mut Vec<User>| {
                let user = find_mut(users, &actor.email)?;
                if let Some(name) = name {
                    user.name = name;
                }
                if let Some(phone) = phone {
                    user.phone = Some(phone).filter(|p| !p.is_empty());
                }
                if let Some(bio) = update.bio {
                    user.bio = bio.trim().to_string();
                }
                Ok(user.clone())
            })
            .await?;
        tracing::info!("{} updated their profile", updated.email);
        Ok(updated)
    }

    /// Requires the current password; `confirm` must repeat `new`.
    pub async fn change_password(
        &self,
        actor: &User,
        current: &str,
        new: &str,
        confirm: &str,
    ) -> Result<()> {
        if new != confirm {
            return Err(PlatformError::validation("new passwords don't match"));
        }
        check_password_len(new)?;
        let hash = hash_password(new)?;

        self.store
            .update(names::USERS, |users: &mut Vec<User>| {
                let user = find_mut(users, &actor.email)?;
                if !verify_password(current, &user.password_hash) {
                    return Err(PlatformError::AuthError {
                        message: "Current password is incorrect".to_string(),
                    });
                }
                user.password_hash = hash;
                Ok(())
            })
            .await?;
        tracing::info!("{} changed their password", actor.email);
        self.audit("password_changed", Some(actor), json!({ "email": actor.email }))
            .await
    }

    pub async fn set_notification_prefs(
        &self,
        actor: &User,
        prefs: NotificationPrefs,
    ) -> Result<NotificationPrefs> {
        self.store
            .update(names::USERS, |users: &mut Vec<User>| {
                let user = find_mut(users, &actor.email)?;
                user.preferences = prefs;
                Ok(prefs)
            })
            .await
    }
}
