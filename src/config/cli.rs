use crate::config::toml_config::{AppConfig, LogFormat};
use crate::core::analytics::{ReportFormat, ReportKind};
use crate::core::cases::CaseSort;
use crate::core::sos::SosSort;
use crate::core::triage::{
    Aggression, Approach, BodyLanguage, EyeContact, FoodGuarding, Health, Pack, PastBehavior, Space,
    Territorial,
};
use crate::domain::model::{
    CampaignStatus, CaseSeverity, CaseStatus, Difficulty, EmergencyType, GeoPoint, Role, SosSeverity,
    SosStatus, TaskStatus, VideoCategory,
};
use crate::domain::ports::TravelMode;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

pub const DEFAULT_CONFIG_FILE: &str = "stray-safe.toml";

#[derive(Debug, Parser)]
#[command(name = "stray-safe")]
#[command(version, about = "Street-dog welfare platform: SOS alerts, cases, campaigns, and more")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Override storage.data_dir
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Email of the acting user
    #[arg(short, long, global = true, env = "STRAY_SAFE_USER")]
    pub user: Option<String>,

    #[arg(long, global = true, env = "STRAY_SAFE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    /// Flags win over file values.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.data_dir {
            config.storage.data_dir = dir.clone();
        }
        if self.verbose {
            config.logging.verbose = true;
        }
        if self.json_logs {
            config.logging.format = LogFormat::Json;
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the admin account from [admin] if it does not exist.
    /// The password comes from `--password` or `admin.password`.
    Init,
    /// Create an account; `--password` is the new account's password
    Register {
        email: String,
        name: String,
        #[arg(long, value_enum, default_value_t = SignupRoleArg::User)]
        role: SignupRoleArg,
        #[arg(long)]
        phone: Option<String>,
    },
    /// List accounts (admin)
    Users,
    SetRole {
        email: String,
        role: Role,
    },
    SetActive {
        email: String,
        #[arg(action = clap::ArgAction::Set)]
        active: bool,
    },
    /// Save your current position for nearest-responder alerts
    Locate {
        coords: GeoPoint,
    },
    #[command(subcommand)]
    Profile(ProfileCommand),
    #[command(subcommand)]
    Contact(ContactCommand),
    #[command(subcommand)]
    Learn(LearnCommand),
    #[command(subcommand)]
    Sos(SosCommand),
    #[command(subcommand)]
    Case(CaseCommand),
    /// Record classifier results for one image
    Detect(DetectArgs),
    BiteAssess(BiteArgs),
    Hotspots {
        #[arg(long)]
        near: Option<GeoPoint>,
        #[arg(long, default_value_t = 5.0)]
        radius_km: f64,
        /// Per-category and per-disease counts instead of the list
        #[arg(long)]
        summary: bool,
    },
    #[command(subcommand)]
    Campaign(CampaignCommand),
    #[command(subcommand)]
    Feeding(FeedingCommand),
    #[command(subcommand)]
    Adopt(AdoptCommand),
    #[command(subcommand)]
    Task(TaskCommand),
    #[command(subcommand)]
    Message(MessageCommand),
    #[command(subcommand)]
    Post(PostCommand),
    Donate {
        amount: f64,
        #[arg(long, default_value = "")]
        purpose: String,
        #[arg(long)]
        anonymous: bool,
    },
    Search {
        query: String,
    },
    Geocode {
        query: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Routes between two places or "lat,lon" points
    Route {
        from: String,
        to: String,
        #[arg(long, value_enum, default_value_t = ModeArg::Driving)]
        mode: ModeArg,
    },
    Report {
        kind: ReportKind,
        #[arg(long, default_value = "csv")]
        format: ReportFormat,
    },
    Notifications {
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        mark_read: bool,
    },
    /// Recent audit entries (admin)
    Audit {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Operations queued while a remote service was unreachable
    Sync {
        /// Print and clear the queue (admin)
        #[arg(long)]
        drain: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    Show,
    Update {
        #[arg(long)]
        name: Option<String>,
        /// An empty value removes the number
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        bio: Option<String>,
    },
    /// The current password is the global `--password`
    Password {
        #[arg(long)]
        new: String,
        #[arg(long)]
        confirm: String,
    },
    /// Which channels SOS alerts may use
    Alerts {
        #[arg(long, action = clap::ArgAction::Set)]
        email: Option<bool>,
        #[arg(long, action = clap::ArgAction::Set)]
        sms: Option<bool>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ContactCommand {
    List,
    Request { email: String },
    Accept { email: String },
    Reject { email: String },
    Remove { email: String },
    Block { email: String },
    Unblock { email: String },
}

#[derive(Debug, Subcommand)]
pub enum LearnCommand {
    Videos {
        #[arg(long)]
        category: Option<VideoCategory>,
        #[arg(long)]
        query: Option<String>,
    },
    /// Add a YouTube video to the library (admin)
    AddVideo {
        title: String,
        url: String,
        #[arg(long, default_value = "Community")]
        category: VideoCategory,
        #[arg(long, default_value = "Beginner")]
        difficulty: Difficulty,
        #[arg(long, default_value = "")]
        description: String,
    },
    Complete { id: String },
    Like { id: String },
    Bookmark { id: String },
    Quizzes,
    Quiz { id: String, score: u32 },
    Progress,
}

#[derive(Debug, Subcommand)]
pub enum SosCommand {
    Create {
        severity: SosSeverity,
        kind: EmergencyType,
        #[arg(long)]
        place: Option<String>,
        #[arg(long)]
        coords: Option<GeoPoint>,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        contact: Option<String>,
        #[arg(long, default_value_t = 1)]
        dogs: u32,
        /// Path of a photo to keep with the alert
        #[arg(long)]
        attachment: Option<String>,
    },
    Quick,
    List {
        #[arg(long, value_delimiter = ',')]
        status: Vec<SosStatus>,
        #[arg(long, value_delimiter = ',')]
        severity: Vec<SosSeverity>,
        #[arg(long, value_enum, default_value_t = SosSortArg::Newest)]
        sort: SosSortArg,
    },
    Assign {
        id: String,
        assignee: String,
    },
    Accept {
        id: String,
    },
    Resolve {
        id: String,
    },
    Close {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum CaseCommand {
    List {
        #[arg(long)]
        status: Option<CaseStatus>,
        #[arg(long)]
        severity: Option<CaseSeverity>,
        #[arg(long)]
        disease: Option<String>,
        #[arg(long, value_enum, default_value_t = CaseSortArg::Recent)]
        sort: CaseSortArg,
    },
    Search {
        query: String,
    },
    Update {
        id: String,
        #[arg(long)]
        status: Option<CaseStatus>,
        #[arg(long)]
        severity: Option<CaseSeverity>,
        #[arg(long)]
        vet: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        plan: Option<String>,
        #[arg(long)]
        follow_up: Option<NaiveDate>,
    },
    Claim {
        id: String,
    },
    Treat {
        id: String,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        medication: Option<String>,
        #[arg(long)]
        outcome: Option<String>,
    },
    Resolve {
        id: String,
    },
    Archive {
        id: String,
    },
    Prescribe {
        case_id: String,
        #[arg(long)]
        medication: String,
        #[arg(long)]
        dosage: String,
        #[arg(long, default_value = "")]
        frequency: String,
        #[arg(long, default_value_t = 7)]
        days: u32,
        #[arg(long, default_value = "")]
        notes: String,
    },
    Stats,
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    #[arg(long)]
    pub place: String,
    #[arg(long)]
    pub coords: Option<GeoPoint>,
    /// `class:confidence`, repeatable (e.g. `ringworm:0.82`)
    #[arg(long = "result", required = true)]
    pub results: Vec<String>,
    #[arg(long, default_value = "")]
    pub notes: String,
    #[arg(long)]
    pub appetite_loss: bool,
    #[arg(long)]
    pub scratching: bool,
    #[arg(long)]
    pub spreading: bool,
    #[arg(long)]
    pub lethargy: bool,
}

/// Each answer takes its option number or its label; unset answers are the calm default.
#[derive(Debug, Args)]
pub struct BiteArgs {
    #[arg(long)]
    pub place: String,
    #[arg(long)]
    pub coords: Option<GeoPoint>,
    #[arg(long)]
    pub aggression: Option<Aggression>,
    #[arg(long)]
    pub body_language: Option<BodyLanguage>,
    #[arg(long)]
    pub eye_contact: Option<EyeContact>,
    #[arg(long)]
    pub territorial: Option<Territorial>,
    #[arg(long)]
    pub past_behavior: Option<PastBehavior>,
    #[arg(long)]
    pub approach: Option<Approach>,
    #[arg(long)]
    pub food_guarding: Option<FoodGuarding>,
    #[arg(long)]
    pub space: Option<Space>,
    #[arg(long)]
    pub health: Option<Health>,
    #[arg(long)]
    pub pack: Option<Pack>,
    #[arg(long, default_value = "")]
    pub notes: String,
}

#[derive(Debug, Subcommand)]
pub enum CampaignCommand {
    Create {
        zone: String,
        date: NaiveDate,
        #[arg(long)]
        coords: GeoPoint,
        #[arg(long)]
        target: u32,
        #[arg(long, default_value = "09:00 - 13:00")]
        time_slot: String,
        #[arg(long, default_value = "Anti-Rabies")]
        vaccine: String,
        #[arg(long)]
        coordinator: Option<String>,
        #[arg(long, default_value_t = 0)]
        volunteers: u32,
        #[arg(long)]
        location_name: Option<String>,
        #[arg(long, default_value = "")]
        notes: String,
    },
    List,
    Join {
        id: String,
    },
    Leave {
        id: String,
    },
    Progress {
        id: String,
        completed: u32,
        #[arg(long)]
        status: Option<CampaignStatus>,
    },
    /// Mark due and overdue campaigns as of today
    Refresh,
    Coverage,
}

#[derive(Debug, Subcommand)]
pub enum FeedingCommand {
    Create {
        location: String,
        date: NaiveDate,
        /// One of the standard slots, e.g. "Early Morning"
        time_label: String,
        #[arg(long, default_value_t = 3)]
        capacity: u32,
        #[arg(long, default_value = "")]
        food: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    Week {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Book {
        id: String,
    },
    Cancel {
        id: String,
    },
    Delete {
        id: String,
    },
    /// Write the week's slots as CSV
    Export {
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        out: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum AdoptCommand {
    Submit {
        name: String,
        #[arg(long)]
        age: String,
        #[arg(long)]
        gender: String,
        #[arg(long, default_value = "")]
        breed: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        vaccinated: bool,
        #[arg(long)]
        sterilized: bool,
        #[arg(long)]
        photo: Option<String>,
    },
    Review {
        id: String,
        #[arg(long)]
        reject: bool,
    },
    List {
        /// Include dogs that are not available
        #[arg(long)]
        all: bool,
    },
    Apply {
        dog_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        address: String,
        #[arg(long, default_value = "Apartment")]
        housing: String,
        #[arg(long)]
        yard: bool,
        #[arg(long)]
        other_pets: bool,
        #[arg(long, default_value = "")]
        experience: String,
        #[arg(long, default_value = "")]
        reason: String,
        #[arg(long, default_value_t = 1)]
        household: u32,
    },
    Decide {
        id: String,
        #[arg(long)]
        reject: bool,
        #[arg(long, default_value = "")]
        notes: String,
    },
    Mine,
}

#[derive(Debug, Subcommand)]
pub enum TaskCommand {
    List {
        #[arg(long)]
        mine: bool,
    },
    Claim {
        id: String,
    },
    Status {
        id: String,
        status: TaskStatus,
    },
    Note {
        id: String,
        text: String,
    },
    Report {
        id: String,
        #[arg(long)]
        notes: String,
        #[arg(long)]
        fed: Option<u32>,
        #[arg(long)]
        rescued: Option<u32>,
        #[arg(long)]
        vaccinated: Option<u32>,
    },
}

#[derive(Debug, Subcommand)]
pub enum MessageCommand {
    Send {
        to: String,
        text: String,
        #[arg(long)]
        convo: Option<String>,
    },
    Group {
        name: String,
        #[arg(required = true)]
        members: Vec<String>,
    },
    /// Show a conversation and mark it read
    Read {
        convo: String,
    },
    Inbox,
}

#[derive(Debug, Subcommand)]
pub enum PostCommand {
    Create {
        content: String,
        #[arg(long)]
        image: Option<String>,
    },
    List {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    Like {
        id: String,
    },
    Comment {
        id: String,
        text: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SosSortArg {
    Newest,
    Oldest,
    Severity,
}

impl From<SosSortArg> for SosSort {
    fn from(arg: SosSortArg) -> Self {
        match arg {
            SosSortArg::Newest => SosSort::Newest,
            SosSortArg::Oldest => SosSort::Oldest,
            SosSortArg::Severity => SosSort::Severity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CaseSortArg {
    Recent,
    Severity,
    Status,
}

impl From<CaseSortArg> for CaseSort {
    fn from(arg: CaseSortArg) -> Self {
        match arg {
            CaseSortArg::Recent => CaseSort::Recent,
            CaseSortArg::Severity => CaseSort::Severity,
            CaseSortArg::Status => CaseSort::Status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SignupRoleArg {
    User,
    Volunteer,
    Vet,
}

impl From<SignupRoleArg> for Role {
    fn from(arg: SignupRoleArg) -> Self {
        match arg {
            SignupRoleArg::User => Role::User,
            SignupRoleArg::Volunteer => Role::Volunteer,
            SignupRoleArg::Vet => Role::Vet,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Driving,
    Walking,
    Cycling,
}

impl From<ModeArg> for TravelMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Driving => TravelMode::Driving,
            ModeArg::Walking => TravelMode::Walking,
            ModeArg::Cycling => TravelMode::Cycling,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_and_overrides() {
        let cli = CliConfig::try_parse_from([
            "stray-safe",
            "--data-dir",
            "/tmp/strays",
            "sos",
            "create",
            "High",
            "injured-dog",
            "--coords",
            "13.05,80.25",
            "--json-logs",
        ])
        .unwrap();
        match &cli.command {
            Command::Sos(SosCommand::Create {
                severity, kind, coords, dogs, ..
            }) => {
                assert_eq!(*severity, SosSeverity::High);
                assert_eq!(*kind, EmergencyType::InjuredDog);
                assert_eq!(coords.unwrap().lat, 13.05);
                assert_eq!(*dogs, 1);
            }
            other => panic!("unexpected command {:?}", other),
        }

        let mut config = AppConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.storage.data_dir, "/tmp/strays");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(!config.logging.verbose);
    }

    #[test]
    fn test_bite_answers_parse_from_numbers() {
        let cli = CliConfig::try_parse_from([
            "stray-safe",
            "bite-assess",
            "--place",
            "Adyar",
            "--aggression",
            "5",
            "--pack",
            "Large pack (4+)",
        ])
        .unwrap();
        let Command::BiteAssess(args) = cli.command else {
            panic!("expected bite-assess");
        };
        assert_eq!(args.aggression, Some(Aggression::AttackingLunging));
        assert_eq!(args.pack, Some(Pack::LargePack));
        assert!(args.space.is_none());
    }

    #[test]
    fn test_register_offers_only_signup_roles() {
        let cli = CliConfig::try_parse_from(["stray-safe", "register", "v@mail.com", "Vee", "--role", "vet"])
            .unwrap();
        match cli.command {
            Command::Register { role, .. } => assert_eq!(Role::from(role), Role::Vet),
            other => panic!("unexpected command {:?}", other),
        }
        assert!(CliConfig::try_parse_from(["stray-safe", "register", "m@mail.com", "M", "--role", "admin"]).is_err());
    }

    #[test]
    fn test_report_kind_and_format() {
        let cli = CliConfig::try_parse_from(["stray-safe", "report", "vaccination", "--format", "zip"]).unwrap();
        match cli.command {
            Command::Report { kind, format } => {
                assert_eq!(kind, ReportKind::Vaccination);
                assert_eq!(format, ReportFormat::Zip);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(CliConfig::try_parse_from(["stray-safe", "report", "weekly"]).is_err());
    }
}
