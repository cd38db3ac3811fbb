use crate::core::platform::{require_admin, same_user, Platform};
use crate::core::store::names;
use crate::domain::model::{Role, User, UserInfo};
use crate::domain::ports::Storage;
use crate::utils::error::{PlatformError, Result};
use crate::utils::validation::{validate_email, validate_non_empty_string, validate_phone};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::OnceLock;

pub(crate) const MIN_PASSWORD_LEN: usize = 6;
const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Roles open to self-registration. Admins are bootstrapped or promoted.
pub const SIGNUP_ROLES: [Role; 3] = [Role::User, Role::Volunteer, Role::Vet];

/// Argon2id PHC string for `password`.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PlatformError::AuthError {
            message: format!("Failed to hash password: {}", e),
        })
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

/// Hash checked when no account matches, so unknown emails cost the same
/// as wrong passwords.
fn dummy_hash() -> Option<&'static str> {
    static HASH: OnceLock<Option<String>> = OnceLock::new();
    HASH.get_or_init(|| hash_password("stray-safe-no-such-user").ok())
        .as_deref()
}

pub(crate) fn check_password_len(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PlatformError::validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: Role,
    pub phone: Option<String>,
}

/// Screens a user can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    Dashboard,
    DiseaseDetection,
    HotspotMapping,
    EmergencySos,
    AwarenessHub,
    CommunityFeed,
    Adoption,
    Donations,
    Contacts,
    Messages,
    Profile,
    AdminPanel,
    ImpactAnalytics,
    VetDesk,
    CaseManagement,
    VolunteerDesk,
    FeedingSchedule,
    VaccinationTracker,
}

pub fn can_access(role: Role, feature: Feature) -> bool {
    use Feature::*;
    match feature {
        AdminPanel | ImpactAnalytics => role == Role::Admin,
        VetDesk | CaseManagement => matches!(role, Role::Admin | Role::Vet),
        VolunteerDesk | FeedingSchedule => matches!(role, Role::Admin | Role::Volunteer),
        VaccinationTracker => role.is_responder(),
        Dashboard | DiseaseDetection | HotspotMapping | EmergencySos | AwarenessHub
        | CommunityFeed | Adoption | Donations | Contacts | Messages | Profile => true,
    }
}

impl<S: Storage> Platform<S> {
    /// Self-service sign-up; only [`SIGNUP_ROLES`] are accepted.
    pub async fn register(&self, registration: Registration) -> Result<User> {
        if !SIGNUP_ROLES.contains(&registration.role) {
            tracing::warn!("Rejected sign-up of {} as {}", registration.email, registration.role);
            return Err(PlatformError::denied(
                format!("register as {}", registration.role),
                "guest",
            ));
        }
        self.create_account(registration).await
    }

    async fn create_account(&self, registration: Registration) -> Result<User> {
        let email = normalize_email(&registration.email);
        validate_email("email", &email)?;
        validate_non_empty_string("name", &registration.name)?;
        check_password_len(&registration.password)?;
        let phone = registration
            .phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        if let Some(phone) = &phone {
            validate_phone("phone", phone)?;
        }

        let user = User {
            email: email.clone(),
            name: registration.name.trim().to_string(),
            password_hash: hash_password(&registration.password)?,
            role: registration.role,
            phone,
            coords: None,
            active: true,
            created_at: Utc::now(),
            bio: String::new(),
            preferences: Default::default(),
        };

        let created = user.clone();
        self.store
            .update(names::USERS, move |users: &mut Vec<User>| {
                if users.iter().any(|u| same_user(&u.email, &email)) {
                    return Err(PlatformError::conflict(format!(
                        "an account for {} already exists",
                        email
                    )));
                }
                users.push(user);
                Ok(())
            })
            .await?;

        tracing::info!("Registered {} as {}", created.email, created.role);
        self.audit("user_registered", Some(&created), json!({ "email": created.email }))
            .await?;
        Ok(created)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let email = normalize_email(email);
        let users: Vec<User> = self.store.load(names::USERS).await?;
        let found = users.into_iter().find(|u| same_user(&u.email, &email));
        let verified = match (&found, dummy_hash()) {
            (Some(user), _) => verify_password(password, &user.password_hash),
            (None, Some(dummy)) => {
                verify_password(password, dummy);
                false
            }
            (None, None) => false,
        };
        let user = found.filter(|u| u.active && verified);

        match user {
            Some(user) => {
                tracing::debug!("Login succeeded for {}", user.email);
                Ok(user)
            }
            None => {
                tracing::warn!("Login failed for {}", email);
                Err(PlatformError::AuthError {
                    message: INVALID_CREDENTIALS.to_string(),
                })
            }
        }
    }

    /// Creates the bootstrap admin if no account uses `email`. Returns whether
    /// an account was created.
    pub async fn ensure_admin(
        &self,
        email: &str,
        name: &str,
        password: &str,
        phone: Option<String>,
    ) -> Result<bool> {
        if self.find_user(email).await?.is_some() {
            tracing::debug!("Admin {} already present", email);
            return Ok(false);
        }
        self.create_account(Registration {
            email: email.to_string(),
            name: name.to_string(),
            password: password.to_string(),
            role: Role::Admin,
            phone,
        })
        .await?;
        Ok(true)
    }

    pub async fn find_user(&self, email: &str) -> Result<Option<User>> {
        let users: Vec<User> = self.store.load(names::USERS).await?;
        Ok(users.into_iter().find(|u| same_user(&u.email, email)))
    }

    pub async fn list_users(&self, actor: &User) -> Result<Vec<UserInfo>> {
        require_admin(actor, "list users")?;
        let users: Vec<User> = self.store.load(names::USERS).await?;
        Ok(users.iter().map(UserInfo::from).collect())
    }

    pub async fn set_role(&self, actor: &User, email: &str, role: Role) -> Result<UserInfo> {
        require_admin(actor, "change roles")?;
        let info = self
            .store
            .update(names::USERS, |users: &mut Vec<User>| {
                let user = users
                    .iter_mut()
                    .find(|u| same_user(&u.email, email))
                    .ok_or_else(|| PlatformError::not_found("user", email))?;
                user.role = role;
                Ok(UserInfo::from(&*user))
            })
            .await?;
        tracing::info!("{} set role of {} to {}", actor.email, info.email, role);
        self.audit("role_changed", Some(actor), json!({ "email": info.email, "role": role }))
            .await?;
        Ok(info)
    }

    pub async fn set_active(&self, actor: &User, email: &str, active: bool) -> Result<UserInfo> {
        require_admin(actor, "activate or deactivate users")?;
        if same_user(&actor.email, email) && !active {
            return Err(PlatformError::validation("admins cannot deactivate themselves"));
        }
        let info = self
            .store
            .update(names::USERS, |users: &mut Vec<User>| {
                let user = users
                    .iter_mut()
                    .find(|u| same_user(&u.email, email))
                    .ok_or_else(|| PlatformError::not_found("user", email))?;
                user.active = active;
                Ok(UserInfo::from(&*user))
            })
            .await?;
        self.audit("user_status_changed", Some(actor), json!({ "email": info.email, "active": active }))
            .await?;
        Ok(info)
    }

    /// Saves the user's last known position so SOS alerts can rank them by distance.
    pub async fn set_location(
        &self,
        actor: &User,
        point: crate::domain::model::GeoPoint,
    ) -> Result<()> {
        point.check()?;
        self.store
            .update(names::USERS, |users: &mut Vec<User>| {
                let user = users
                    .iter_mut()
                    .find(|u| same_user(&u.email, &actor.email))
                    .ok_or_else(|| PlatformError::not_found("user", actor.email.clone()))?;
                user.coords = Some(point);
                Ok(())
            })
            .await
    }

    /// Active admins, vets and volunteers.
    pub async fn responders(&self) -> Result<Vec<User>> {
        let users: Vec<User> = self.store.load(names::USERS).await?;
        Ok(users.into_iter().filter(User::is_responder).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::testing::*;

    fn registration(email: &str, role: Role) -> Registration {
        Registration {
            email: email.to_string(),
            name: "Priya".to_string(),
            password: "paws123".to_string(),
            role,
            phone: Some("+91 98402 77042".to_string()),
        }
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("secret1").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("secret1", &hash));
        assert!(!verify_password("secret2", &hash));
        assert!(!verify_password("secret1", "plaintext"));
    }

    #[test]
    fn test_feature_access_matrix() {
        assert!(can_access(Role::User, Feature::EmergencySos));
        assert!(!can_access(Role::User, Feature::VetDesk));
        assert!(!can_access(Role::Vet, Feature::AdminPanel));
        assert!(can_access(Role::Vet, Feature::CaseManagement));
        assert!(!can_access(Role::Vet, Feature::FeedingSchedule));
        assert!(can_access(Role::Volunteer, Feature::VaccinationTracker));
        assert!(!can_access(Role::User, Feature::VaccinationTracker));
        assert!(can_access(Role::Admin, Feature::ImpactAnalytics));
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let platform = platform();
        let user = platform
            .register(registration(" Priya@Mail.com ", Role::Volunteer))
            .await
            .unwrap();
        assert_eq!(user.email, "priya@mail.com");
        assert_ne!(user.password_hash, "paws123");

        let logged_in = platform.login("PRIYA@mail.com", "paws123").await.unwrap();
        assert_eq!(logged_in.role, Role::Volunteer);

        let wrong = platform.login("priya@mail.com", "nope!!").await.unwrap_err();
        let unknown = platform.login("ghost@mail.com", "paws123").await.unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_bad_input() {
        let platform = platform();
        platform.register(registration("a@mail.com", Role::User)).await.unwrap();

        let dup = platform.register(registration("A@mail.com", Role::User)).await;
        assert!(matches!(dup, Err(PlatformError::Conflict { .. })));

        let mut short = registration("b@mail.com", Role::User);
        short.password = "123".into();
        assert!(platform.register(short).await.is_err());

        assert!(platform.register(registration("not-an-email", Role::User)).await.is_err());
    }

    #[tokio::test]
    async fn test_register_refuses_admin_role() {
        let platform = platform();
        let err = platform
            .register(registration("mallory@mail.com", Role::Admin))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::PermissionDenied { .. }));
        assert!(platform.find_user("mallory@mail.com").await.unwrap().is_none());

        for role in SIGNUP_ROLES {
            let email = format!("{}@mail.com", role);
            assert_eq!(platform.register(registration(&email, role)).await.unwrap().role, role);
        }
        let vet = platform.login("vet@mail.com", "paws123").await.unwrap();
        assert!(platform.list_users(&vet).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_email_is_checked_against_dummy_hash() {
        let dummy = dummy_hash().unwrap();
        assert!(dummy.starts_with("$argon2id$"));
        assert!(!verify_password("paws123", dummy));

        let platform = platform();
        let err = platform.login("ghost@mail.com", "paws123").await.unwrap_err();
        assert!(matches!(err, PlatformError::AuthError { ref message } if message == INVALID_CREDENTIALS));
    }

    #[tokio::test]
    async fn test_inactive_users_cannot_login() {
        let platform = platform();
        platform.register(registration("v@mail.com", Role::Volunteer)).await.unwrap();
        platform.set_active(&admin(), "v@mail.com", false).await.unwrap();

        let err = platform.login("v@mail.com", "paws123").await.unwrap_err();
        assert!(matches!(err, PlatformError::AuthError { .. }));
        assert!(platform.responders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let platform = platform();
        assert!(platform
            .ensure_admin("admin@straysafe.org", "Admin", "admin123", None)
            .await
            .unwrap());
        assert!(!platform
            .ensure_admin("admin@straysafe.org", "Admin", "admin123", None)
            .await
            .unwrap());
        let admin = platform.login("admin@straysafe.org", "admin123").await.unwrap();
        assert_eq!(platform.list_users(&admin).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_role_changes_are_admin_only() {
        let platform = platform();
        platform.register(registration("u@mail.com", Role::User)).await.unwrap();

        let denied = platform.set_role(&volunteer(), "u@mail.com", Role::Vet).await;
        assert!(matches!(denied, Err(PlatformError::PermissionDenied { .. })));

        let info = platform.set_role(&admin(), "u@mail.com", Role::Vet).await.unwrap();
        assert_eq!(info.role, Role::Vet);
        assert!(platform.set_role(&admin(), "ghost@mail.com", Role::Vet).await.is_err());
    }
}
