use crate::core::platform::Platform;
use crate::core::store::names;
use crate::domain::model::{
    AdoptionApplication, ApplicationStatus, Campaign, Case, CaseStatus, Post, Prescription, Role,
    SosAlert, SosStatus, Task, TaskStatus, User,
};
use crate::domain::ports::Storage;
use crate::utils::error::{PlatformError, Result};
use crate::utils::tabular::to_csv;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use zip::write::{FileOptions, ZipWriter};

const REPORTS_DIR: &str = "reports";

/// Platform-wide counts and percentage rates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImpactMetrics {
    pub generated_on: DateTime<Utc>,
    pub cases_total: usize,
    pub cases_resolved: usize,
    pub cases_active: usize,
    pub sos_total: usize,
    pub sos_resolved: usize,
    pub sos_active: usize,
    pub campaigns: usize,
    pub vaccinations_completed: u64,
    pub vaccination_target: u64,
    pub donations_total: f64,
    pub donors: usize,
    pub applications_total: usize,
    pub applications_approved: usize,
    pub posts: usize,
    pub users: usize,
    pub volunteers: usize,
    pub tasks_total: usize,
    pub tasks_completed: usize,
    pub prescriptions: usize,
    pub case_resolution_rate: f64,
    pub sos_resolution_rate: f64,
    pub vaccination_rate: f64,
    pub adoption_approval_rate: f64,
    pub task_completion_rate: f64,
}

/// Percentage with one decimal; 0 when there is nothing to divide by.
fn rate(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        0.0
    } else {
        (part / whole * 1000.0).round() / 10.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Summary,
    Cases,
    Sos,
    Vaccination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Csv,
    Json,
    Zip,
}

impl ReportKind {
    fn slug(&self) -> &'static str {
        match self {
            ReportKind::Summary => "summary",
            ReportKind::Cases => "cases",
            ReportKind::Sos => "sos",
            ReportKind::Vaccination => "vaccination",
        }
    }
}

impl ReportFormat {
    fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Json => "json",
            ReportFormat::Zip => "zip",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ReportKind {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "summary" => Ok(ReportKind::Summary),
            "cases" => Ok(ReportKind::Cases),
            "sos" => Ok(ReportKind::Sos),
            "vaccination" => Ok(ReportKind::Vaccination),
            other => Err(PlatformError::validation(format!("unknown report kind '{}'", other))),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "json" => Ok(ReportFormat::Json),
            "zip" => Ok(ReportFormat::Zip),
            other => Err(PlatformError::validation(format!("unknown report format '{}'", other))),
        }
    }
}

#[derive(Serialize)]
struct MetricRow {
    metric: String,
    value: String,
}

#[derive(Serialize)]
struct CaseRow<'a> {
    id: &'a str,
    disease: &'a str,
    severity: &'a str,
    status: &'a str,
    place: &'a str,
    assigned_vet: &'a str,
    opened: DateTime<Utc>,
}

#[derive(Serialize)]
struct SosRow<'a> {
    id: &'a str,
    severity: &'a str,
    kind: &'a str,
    status: &'a str,
    place: &'a str,
    created_by: &'a str,
    assigned: &'a str,
    time: DateTime<Utc>,
}

#[derive(Serialize)]
struct CampaignRow<'a> {
    id: &'a str,
    zone: &'a str,
    date: NaiveDate,
    status: &'a str,
    target: u32,
    completed: u32,
    progress_pct: f64,
    volunteers: usize,
}

fn summary_rows(metrics: &ImpactMetrics) -> Result<Vec<MetricRow>> {
    let value = serde_json::to_value(metrics)?;
    let object = value
        .as_object()
        .ok_or_else(|| PlatformError::validation("metrics did not serialize to an object"))?;
    Ok(object
        .iter()
        .map(|(metric, value)| MetricRow {
            metric: metric.clone(),
            value: match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        })
        .collect())
}

fn zip_bundle(files: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in files {
        zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
        zip.write_all(data)?;
    }
    Ok(zip.finish()?.into_inner())
}

impl<S: Storage> Platform<S> {
    pub async fn impact_metrics(&self) -> Result<ImpactMetrics> {
        let cases: Vec<Case> = self.store.load(names::CASES).await?;
        let alerts: Vec<SosAlert> = self.store.load(names::SOS).await?;
        let campaigns: Vec<Campaign> = self.store.load(names::CAMPAIGNS).await?;
        let applications: Vec<AdoptionApplication> =
            self.store.load(names::ADOPTION_APPLICATIONS).await?;
        let posts: Vec<Post> = self.store.load(names::POSTS).await?;
        let users: Vec<User> = self.store.load(names::USERS).await?;
        let tasks: Vec<Task> = self.store.load(names::TASKS).await?;
        let prescriptions: Vec<Prescription> = self.store.load(names::PRESCRIPTIONS).await?;
        let donations = self.donation_totals().await?;

        let mut m = ImpactMetrics {
            generated_on: Utc::now(),
            cases_total: cases.len(),
            cases_resolved: cases
                .iter()
                .filter(|c| matches!(c.status, CaseStatus::Resolved | CaseStatus::Closed))
                .count(),
            cases_active: cases.iter().filter(|c| c.status.is_open()).count(),
            sos_total: alerts.len(),
            sos_resolved: alerts
                .iter()
                .filter(|s| matches!(s.status, SosStatus::Resolved | SosStatus::Closed))
                .count(),
            sos_active: alerts
                .iter()
                .filter(|s| matches!(s.status, SosStatus::Active | SosStatus::Dispatched))
                .count(),
            campaigns: campaigns.len(),
            vaccinations_completed: campaigns.iter().map(|c| u64::from(c.completed)).sum(),
            vaccination_target: campaigns.iter().map(|c| u64::from(c.target)).sum(),
            donations_total: donations.total,
            donors: donations.donors,
            applications_total: applications.len(),
            applications_approved: applications
                .iter()
                .filter(|a| a.status == ApplicationStatus::Approved)
                .count(),
            posts: posts.len(),
            users: users.len(),
            volunteers: users
                .iter()
                .filter(|u| u.active && matches!(u.role, Role::Volunteer | Role::Admin))
                .count(),
            tasks_total: tasks.len(),
            tasks_completed: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Completed)
                .count(),
            prescriptions: prescriptions.len(),
            ..Default::default()
        };
        m.case_resolution_rate = rate(m.cases_resolved as f64, m.cases_total as f64);
        m.sos_resolution_rate = rate(m.sos_resolved as f64, m.sos_total as f64);
        m.vaccination_rate = rate(m.vaccinations_completed as f64, m.vaccination_target as f64);
        m.adoption_approval_rate = rate(m.applications_approved as f64, m.applications_total as f64);
        m.task_completion_rate = rate(m.tasks_completed as f64, m.tasks_total as f64);
        Ok(m)
    }

    async fn detail_csv(&self, kind: ReportKind) -> Result<Option<String>> {
        let csv = match kind {
            ReportKind::Summary => return Ok(None),
            ReportKind::Cases => {
                let cases: Vec<Case> = self.store.load(names::CASES).await?;
                let rows: Vec<CaseRow> = cases
                    .iter()
                    .map(|c| CaseRow {
                        id: &c.id,
                        disease: &c.disease,
                        severity: c.severity.as_str(),
                        status: c.status.as_str(),
                        place: &c.place,
                        assigned_vet: c.assigned_vet.as_deref().unwrap_or(""),
                        opened: c.time,
                    })
                    .collect();
                to_csv(&rows)?
            }
            ReportKind::Sos => {
                let alerts: Vec<SosAlert> = self.store.load(names::SOS).await?;
                let rows: Vec<SosRow> = alerts
                    .iter()
                    .map(|s| SosRow {
                        id: &s.id,
                        severity: s.severity.as_str(),
                        kind: s.kind.as_str(),
                        status: s.status.as_str(),
                        place: s.display_address(),
                        created_by: &s.created_by,
                        assigned: s.assigned.as_deref().unwrap_or(""),
                        time: s.time,
                    })
                    .collect();
                to_csv(&rows)?
            }
            ReportKind::Vaccination => {
                let campaigns: Vec<Campaign> = self.store.load(names::CAMPAIGNS).await?;
                let rows: Vec<CampaignRow> = campaigns
                    .iter()
                    .map(|c| CampaignRow {
                        id: &c.id,
                        zone: &c.zone,
                        date: c.date,
                        status: c.status.as_str(),
                        target: c.target,
                        completed: c.completed,
                        progress_pct: (c.progress_pct() * 10.0).round() / 10.0,
                        volunteers: c.volunteers_assigned.len(),
                    })
                    .collect();
                to_csv(&rows)?
            }
        };
        Ok(Some(csv))
    }

    async fn detail_json(&self, kind: ReportKind, metrics: &ImpactMetrics) -> Result<String> {
        let value = match kind {
            ReportKind::Summary => serde_json::to_value(metrics)?,
            ReportKind::Cases => serde_json::to_value(self.store.load::<Case>(names::CASES).await?)?,
            ReportKind::Sos => serde_json::to_value(self.store.load::<SosAlert>(names::SOS).await?)?,
            ReportKind::Vaccination => {
                serde_json::to_value(self.store.load::<Campaign>(names::CAMPAIGNS).await?)?
            }
        };
        Ok(serde_json::to_string_pretty(&value)?)
    }

    /// Writes a report under `reports/` and returns its storage path.
    pub async fn export_report(&self, kind: ReportKind, format: ReportFormat) -> Result<String> {
        let metrics = self.impact_metrics().await?;
        let data: Vec<u8> = match format {
            ReportFormat::Json => self.detail_json(kind, &metrics).await?.into_bytes(),
            ReportFormat::Csv => match self.detail_csv(kind).await? {
                Some(csv) => csv.into_bytes(),
                None => to_csv(&summary_rows(&metrics)?)?.into_bytes(),
            },
            ReportFormat::Zip => {
                let mut files = vec![
                    ("summary.csv".to_string(), to_csv(&summary_rows(&metrics)?)?.into_bytes()),
                    (
                        "summary.json".to_string(),
                        serde_json::to_string_pretty(&metrics)?.into_bytes(),
                    ),
                ];
                if let Some(csv) = self.detail_csv(kind).await? {
                    files.push((format!("{}.csv", kind), csv.into_bytes()));
                }
                zip_bundle(&files)?
            }
        };

        let path = format!(
            "{}/{}_{}.{}",
            REPORTS_DIR,
            kind,
            metrics.generated_on.format("%Y%m%d_%H%M%S%3f"),
            format.extension()
        );
        self.store.storage().write_file(&path, &data).await?;
        tracing::info!("Wrote {} report ({} bytes) to {}", kind, data.len(), path);
        Ok(path)
    }
}
