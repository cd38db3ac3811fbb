use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::utils::error::{PlatformError, Result};

/// Implements `Display` and `FromStr` over the serde names of a fieldless enum.
macro_rules! string_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = PlatformError;

            fn from_str(s: &str) -> Result<Self> {
                let wanted = s.trim().to_lowercase().replace([' ', '-'], "_");
                $(
                    if wanted == $name.to_lowercase().replace([' ', '-'], "_") {
                        return Ok(Self::$variant);
                    }
                )+
                Err(PlatformError::validation(format!(
                    "unknown {} '{}'",
                    stringify!($ty),
                    s
                )))
            }
        }
    };
}

// ---------------------------------------------------------------- geo

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        let point = Self { lat, lon };
        point.check()?;
        Ok(point)
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(PlatformError::validation(format!(
                "coordinates out of range: {}, {}",
                self.lat, self.lon
            )))
        }
    }

    pub fn short_label(&self) -> String {
        format!("{:.5}, {:.5}", self.lat, self.lon)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lat, self.lon)
    }
}

impl FromStr for GeoPoint {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| PlatformError::validation(format!("expected 'lat,lon', got '{}'", s)))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| PlatformError::validation(format!("not a number: '{}'", v.trim())))
        };
        GeoPoint::new(parse(lat)?, parse(lon)?)
    }
}

/// A file kept alongside a record; only the reference is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub content_type: String,
    pub path: String,
}

impl Attachment {
    /// Content type is guessed from the extension.
    pub fn from_path(path: &str) -> Self {
        let file = std::path::Path::new(path);
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string());
        let ext = file
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let content_type = match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "webp" => "image/webp",
            "gif" => "image/gif",
            _ => "application/octet-stream",
        };
        Self {
            name,
            content_type: content_type.to_string(),
            path: path.to_string(),
        }
    }
}

// ---------------------------------------------------------------- users

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Vet,
    Volunteer,
    #[default]
    User,
}

string_enum!(Role { Admin => "admin", Vet => "vet", Volunteer => "volunteer", User => "user" });

impl Role {
    pub fn is_responder(&self) -> bool {
        matches!(self, Role::Admin | Role::Vet | Role::Volunteer)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub coords: Option<GeoPoint>,
    #[serde(default = "default_true")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub preferences: NotificationPrefs,
}

fn default_true() -> bool {
    true
}

/// Which outbound channels a user accepts alerts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPrefs {
    #[serde(default = "default_true")]
    pub email: bool,
    #[serde(default = "default_true")]
    pub sms: bool,
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self {
            email: true,
            sms: true,
        }
    }
}

impl User {
    pub fn is_responder(&self) -> bool {
        self.active && self.role.is_responder()
    }

    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }
}

/// What a user looks like to other users: no password hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub active: bool,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
            phone: user.phone.clone(),
            active: user.active,
        }
    }
}

// ---------------------------------------------------------------- sos

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SosSeverity {
    Medium,
    High,
    Critical,
}

string_enum!(SosSeverity { Medium => "Medium", High => "High", Critical => "Critical" });

impl SosSeverity {
    pub fn risk(&self) -> u8 {
        match self {
            SosSeverity::Medium => 50,
            SosSeverity::High => 75,
            SosSeverity::Critical => 90,
        }
    }

    /// Sort rank, most urgent first.
    pub fn rank(&self) -> u8 {
        match self {
            SosSeverity::Critical => 0,
            SosSeverity::High => 1,
            SosSeverity::Medium => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SosStatus {
    Active,
    Dispatched,
    Resolved,
    Closed,
}

string_enum!(SosStatus {
    Active => "active",
    Dispatched => "dispatched",
    Resolved => "resolved",
    Closed => "closed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmergencyType {
    #[serde(rename = "Injured Dog")]
    InjuredDog,
    #[serde(rename = "Aggressive Dog")]
    AggressiveDog,
    #[serde(rename = "Dog in Danger")]
    DogInDanger,
    Accident,
    Disease,
    Other,
}

string_enum!(EmergencyType {
    InjuredDog => "Injured Dog",
    AggressiveDog => "Aggressive Dog",
    DogInDanger => "Dog in Danger",
    Accident => "Accident",
    Disease => "Disease",
    Other => "Other",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SosAlert {
    pub id: String,
    pub risk: u8,
    pub status: SosStatus,
    pub time: DateTime<Utc>,
    pub place: String,
    #[serde(default)]
    pub full_address: Option<String>,
    pub severity: SosSeverity,
    #[serde(rename = "type")]
    pub kind: EmergencyType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub contact: Option<String>,
    pub created_by: String,
    pub reporter_role: Role,
    #[serde(default)]
    pub coords: Option<GeoPoint>,
    #[serde(default)]
    pub attachment: Option<Attachment>,
    #[serde(default)]
    pub assigned: Option<String>,
    #[serde(default = "one")]
    pub estimated_dogs: u32,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolved_by: Option<String>,
}

fn one() -> u32 {
    1
}

impl SosAlert {
    pub fn display_address(&self) -> &str {
        self.full_address.as_deref().unwrap_or(&self.place)
    }
}

// ---------------------------------------------------------------- tasks

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
}

string_enum!(TaskStatus {
    Pending => "pending",
    Assigned => "assigned",
    InProgress => "in_progress",
    Completed => "completed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    High,
    Medium,
    Low,
}

string_enum!(TaskPriority { High => "high", Medium => "medium", Low => "low" });

impl From<SosSeverity> for TaskPriority {
    fn from(severity: SosSeverity) -> Self {
        match severity {
            SosSeverity::Critical | SosSeverity::High => TaskPriority::High,
            SosSeverity::Medium => TaskPriority::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCategory {
    Rescue,
    Feeding,
    Vaccination,
    Other,
}

string_enum!(TaskCategory {
    Rescue => "rescue",
    Feeding => "feeding",
    Vaccination => "vaccination",
    Other => "other",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNote {
    pub author: String,
    pub text: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    pub notes: String,
    #[serde(default)]
    pub dogs_fed: Option<u32>,
    #[serde(default)]
    pub dogs_rescued: Option<u32>,
    #[serde(default)]
    pub dogs_vaccinated: Option<u32>,
    #[serde(default)]
    pub submitted_by: String,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub sos_id: Option<String>,
    pub title: String,
    pub place: String,
    pub priority: TaskPriority,
    pub category: TaskCategory,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub volunteer: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub notes: Vec<TaskNote>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due: Option<NaiveDate>,
    #[serde(default)]
    pub submission: Option<TaskReport>,
}

// ---------------------------------------------------------------- cases

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Pending,
    InTreatment,
    Resolved,
    Closed,
}

string_enum!(CaseStatus {
    Pending => "pending",
    InTreatment => "in_treatment",
    Resolved => "resolved",
    Closed => "closed",
});

impl CaseStatus {
    pub fn rank(&self) -> u8 {
        match self {
            CaseStatus::Pending => 0,
            CaseStatus::InTreatment => 1,
            CaseStatus::Resolved => 2,
            CaseStatus::Closed => 3,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, CaseStatus::Pending | CaseStatus::InTreatment)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseSeverity {
    Low,
    Medium,
    High,
    Critical,
}

string_enum!(CaseSeverity {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

impl CaseSeverity {
    pub fn rank(&self) -> u8 {
        match self {
            CaseSeverity::Critical => 0,
            CaseSeverity::High => 1,
            CaseSeverity::Medium => 2,
            CaseSeverity::Low => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    pub id: String,
    pub disease: String,
    #[serde(default)]
    pub confidence: f64,
    pub severity: CaseSeverity,
    #[serde(default)]
    pub severity_num: u8,
    pub status: CaseStatus,
    #[serde(default)]
    pub place: String,
    #[serde(default)]
    pub coords: Option<GeoPoint>,
    pub analyzed_by: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub assigned_vet: Option<String>,
    #[serde(default)]
    pub treatment_plan: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub vet_notes: String,
    #[serde(default)]
    pub follow_up_date: Option<NaiveDate>,
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: String,
    pub case_id: String,
    pub vet: String,
    pub medication: String,
    pub dosage: String,
    pub frequency: String,
    pub duration_days: u32,
    #[serde(default)]
    pub notes: String,
    pub issued_at: DateTime<Utc>,
}

// ---------------------------------------------------------------- hotspots

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HotspotCategory {
    Disease,
    #[serde(rename = "Bite Risk")]
    BiteRisk,
    Emergency,
    Sighting,
}

string_enum!(HotspotCategory {
    Disease => "Disease",
    BiteRisk => "Bite Risk",
    Emergency => "Emergency",
    Sighting => "Sighting",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotspot {
    pub id: String,
    pub point: GeoPoint,
    pub category: HotspotCategory,
    pub label: String,
    pub risk: u8,
    pub intensity: f64,
    #[serde(default)]
    pub disease: Option<String>,
    #[serde(default)]
    pub place: String,
    #[serde(default)]
    pub color: String,
    pub reported_by: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------- bite risk

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BiteRiskLevel {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Moderate Risk")]
    Moderate,
    #[serde(rename = "High Risk")]
    High,
    #[serde(rename = "Critical Risk")]
    Critical,
}

string_enum!(BiteRiskLevel {
    Low => "Low Risk",
    Moderate => "Moderate Risk",
    High => "High Risk",
    Critical => "Critical Risk",
});

// ---------------------------------------------------------------- vaccination

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CampaignStatus {
    Scheduled,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Overdue,
}

string_enum!(CampaignStatus {
    Scheduled => "Scheduled",
    InProgress => "In Progress",
    Completed => "Completed",
    Overdue => "Overdue",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub zone: String,
    pub date: NaiveDate,
    pub time_slot: String,
    pub status: CampaignStatus,
    pub target: u32,
    #[serde(default)]
    pub completed: u32,
    pub vaccine_type: String,
    pub coordinator: String,
    #[serde(default)]
    pub volunteers_needed: u32,
    #[serde(default)]
    pub volunteers_assigned: Vec<String>,
    #[serde(default)]
    pub notes: String,
    pub location: GeoPoint,
    pub location_name: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    pub fn spots_left(&self) -> u32 {
        self.volunteers_needed
            .saturating_sub(self.volunteers_assigned.len() as u32)
    }

    pub fn progress_pct(&self) -> f64 {
        if self.target == 0 {
            0.0
        } else {
            f64::from(self.completed) / f64::from(self.target) * 100.0
        }
    }
}

// ---------------------------------------------------------------- feeding

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedingSlot {
    pub id: String,
    pub location: String,
    pub date: NaiveDate,
    pub time_label: String,
    pub time: String,
    pub capacity: u32,
    #[serde(default)]
    pub bookings: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub food_qty: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl FeedingSlot {
    pub fn booked(&self) -> u32 {
        self.bookings.len() as u32
    }

    pub fn is_full(&self) -> bool {
        self.booked() >= self.capacity
    }
}

// ---------------------------------------------------------------- adoption

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DogStatus {
    #[serde(rename = "Pending Approval")]
    PendingApproval,
    Available,
    Adopted,
    Rejected,
}

string_enum!(DogStatus {
    PendingApproval => "Pending Approval",
    Available => "Available",
    Adopted => "Adopted",
    Rejected => "Rejected",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdoptionDog {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub breed: String,
    pub age: String,
    pub gender: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub vaccinated: bool,
    #[serde(default)]
    pub sterilized: bool,
    #[serde(default)]
    pub photo: Option<Attachment>,
    pub status: DogStatus,
    pub added_by: String,
    pub added_at: DateTime<Utc>,
    #[serde(default)]
    pub adopted_by: Option<String>,
    #[serde(default)]
    pub adopted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

string_enum!(ApplicationStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdoptionApplication {
    pub id: String,
    pub dog_id: String,
    pub dog_name: String,
    pub applicant: String,
    pub applicant_email: String,
    pub phone: String,
    pub address: String,
    pub housing_type: String,
    #[serde(default)]
    pub has_yard: bool,
    #[serde(default)]
    pub other_pets: bool,
    #[serde(default)]
    pub experience: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default = "one")]
    pub household_members: u32,
    pub status: ApplicationStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub admin_notes: String,
    #[serde(default)]
    pub decided_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------- donations

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donation {
    pub id: String,
    pub donor: String,
    #[serde(default)]
    pub donor_email: Option<String>,
    pub amount: f64,
    pub purpose: String,
    pub time: DateTime<Utc>,
}

// ---------------------------------------------------------------- notifications & audit

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Emergency,
    Info,
    Success,
    Warning,
}

string_enum!(NotificationKind {
    Emergency => "emergency",
    Info => "info",
    Success => "success",
    Warning => "warning",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    Medium,
    High,
}

string_enum!(Priority { Low => "low", Normal => "normal", Medium => "medium", High => "high" });

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    pub priority: Priority,
    pub user: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub time: DateTime<Utc>,
    pub event: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub meta: serde_json::Value,
}

// ---------------------------------------------------------------- messaging

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub name: String,
    pub is_group: bool,
    pub members: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Receipt {
    Unread,
    Read,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub convo_id: String,
    pub sender: String,
    pub text: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub receipts: BTreeMap<String, Receipt>,
}

// ---------------------------------------------------------------- contacts

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    Pending,
    Accepted,
    Rejected,
}

string_enum!(ContactStatus {
    Pending => "pending",
    Accepted => "accepted",
    Rejected => "rejected",
});

/// One direction of a contact relation: `user` asked for, or holds, `contact`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactLink {
    pub user: String,
    pub contact: String,
    pub status: ContactStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockEntry {
    pub user: String,
    pub blocked: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------- awareness

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoCategory {
    Training,
    Health,
    #[serde(rename = "First Aid")]
    FirstAid,
    Adoption,
    Community,
}

string_enum!(VideoCategory {
    Training => "Training",
    Health => "Health",
    FirstAid => "First Aid",
    Adoption => "Adoption",
    Community => "Community",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

string_enum!(Difficulty {
    Beginner => "Beginner",
    Intermediate => "Intermediate",
    Advanced => "Advanced",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub url: String,
    pub category: VideoCategory,
    #[serde(default)]
    pub duration: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub views: u32,
    #[serde(default)]
    pub likes: u32,
    pub uploaded_by: String,
    pub date: DateTime<Utc>,
}

/// Per-user learning record; quiz scores are percentages keyed by quiz id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningProgress {
    pub user: String,
    #[serde(default)]
    pub completed_videos: Vec<String>,
    #[serde(default)]
    pub quiz_scores: BTreeMap<String, u32>,
    #[serde(default)]
    pub bookmarks: Vec<String>,
    #[serde(default)]
    pub badges: Vec<String>,
    #[serde(default)]
    pub total_points: u32,
}

// ---------------------------------------------------------------- community

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub text: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author: String,
    pub author_email: String,
    pub content: String,
    #[serde(default)]
    pub image: Option<Attachment>,
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_names_round_trip_through_strings() {
        assert_eq!("in_treatment".parse::<CaseStatus>().unwrap(), CaseStatus::InTreatment);
        assert_eq!("In Progress".parse::<CampaignStatus>().unwrap(), CampaignStatus::InProgress);
        assert_eq!("injured-dog".parse::<EmergencyType>().unwrap(), EmergencyType::InjuredDog);
        assert_eq!("VET".parse::<Role>().unwrap(), Role::Vet);
        assert!("wizard".parse::<Role>().is_err());
        assert_eq!(DogStatus::PendingApproval.to_string(), "Pending Approval");
    }

    #[test]
    fn test_attachment_from_path() {
        let photo = Attachment::from_path("/tmp/sos/dog.JPG");
        assert_eq!(photo.name, "dog.JPG");
        assert_eq!(photo.content_type, "image/jpeg");
        assert_eq!(Attachment::from_path("notes").content_type, "application/octet-stream");
    }

    #[test]
    fn test_serde_names_match_display() {
        let json = serde_json::to_string(&HotspotCategory::BiteRisk).unwrap();
        assert_eq!(json, "\"Bite Risk\"");
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn test_geo_point_parsing_and_validation() {
        let p: GeoPoint = "13.0827, 80.2707".parse().unwrap();
        assert_eq!(p.lat, 13.0827);
        assert_eq!(p.to_string(), "13.082700, 80.270700");
        assert!("91,0".parse::<GeoPoint>().is_err());
        assert!("north".parse::<GeoPoint>().is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_sos_severity_scores() {
        assert_eq!(SosSeverity::Medium.risk(), 50);
        assert_eq!(SosSeverity::High.risk(), 75);
        assert_eq!(SosSeverity::Critical.risk(), 90);
        assert_eq!(TaskPriority::from(SosSeverity::High), TaskPriority::High);
    }
}
