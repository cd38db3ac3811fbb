use crate::core::platform::{require, same_user, Platform};
use crate::core::store::names;
use crate::domain::model::{Case, CaseSeverity, CaseStatus, Prescription, Role, User};
use crate::domain::ports::Storage;
use crate::utils::error::{PlatformError, Result};
use crate::utils::ids::next_id;
use crate::utils::validation::validate_non_empty_string;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

const MIN_QUERY_LEN: usize = 2;
const MAX_SEARCH_RESULTS: usize = 20;
const MAX_LIST_RESULTS: usize = 50;
const CLINICAL: &[Role] = &[Role::Vet, Role::Admin];

#[derive(Debug, Clone, Default)]
pub struct CaseUpdate {
    pub status: Option<CaseStatus>,
    pub severity: Option<CaseSeverity>,
    pub assigned_vet: Option<String>,
    pub vet_notes: Option<String>,
    pub treatment_plan: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct Treatment {
    pub notes: Option<String>,
    pub medication: Option<String>,
    pub outcome: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPrescription {
    pub medication: String,
    pub dosage: String,
    pub frequency: String,
    pub duration_days: u32,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaseSort {
    #[default]
    Recent,
    Severity,
    Status,
}

#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    pub status: Option<CaseStatus>,
    pub severity: Option<CaseSeverity>,
    pub disease: Option<String>,
    pub sort: CaseSort,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaseStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_severity: BTreeMap<String, usize>,
    pub by_disease: BTreeMap<String, usize>,
    pub resolution_rate: f64,
    pub today: usize,
    pub this_week: usize,
    pub this_month: usize,
}

fn find_case<'a>(cases: &'a mut [Case], id: &str) -> Result<&'a mut Case> {
    cases
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or_else(|| PlatformError::not_found("case", id))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl<S: Storage> Platform<S> {
    pub async fn list_all_cases(&self) -> Result<Vec<Case>> {
        self.store.load(names::CASES).await
    }

    pub async fn get_case(&self, id: &str) -> Result<Case> {
        self.list_all_cases()
            .await?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| PlatformError::not_found("case", id))
    }

    pub async fn update_case(&self, actor: &User, id: &str, update: CaseUpdate) -> Result<Case> {
        require(actor, CLINICAL, "update cases")?;
        let case = self
            .store
            .update(names::CASES, |cases: &mut Vec<Case>| {
                let case = find_case(cases, id)?;
                if let Some(status) = update.status {
                    case.status = status;
                }
                if let Some(severity) = update.severity {
                    case.severity = severity;
                }
                if let Some(vet) = non_empty(update.assigned_vet) {
                    case.assigned_vet = Some(vet);
                }
                if let Some(notes) = update.vet_notes {
                    case.vet_notes = notes;
                }
                if let Some(plan) = update.treatment_plan {
                    case.treatment_plan = plan;
                }
                if let Some(date) = update.follow_up_date {
                    case.follow_up_date = Some(date);
                }
                case.last_updated = Some(Utc::now());
                Ok(case.clone())
            })
            .await?;
        self.audit("case_updated", Some(actor), json!({ "id": case.id, "status": case.status }))
            .await?;
        Ok(case)
    }

    pub async fn record_treatment(&self, actor: &User, id: &str, treatment: Treatment) -> Result<Case> {
        require(actor, CLINICAL, "record treatments")?;
        let now = Utc::now();
        self.store
            .update(names::CASES, |cases: &mut Vec<Case>| {
                let case = find_case(cases, id)?;
                if !case.status.is_open() {
                    return Err(PlatformError::validation(format!(
                        "case {} is {} and cannot be treated",
                        case.id, case.status
                    )));
                }
                if let Some(text) = non_empty(treatment.notes) {
                    case.vet_notes.push_str(&format!(
                        "\n\n[{}] {}",
                        now.format("%Y-%m-%d %H:%M"),
                        text
                    ));
                }
                if let Some(medication) = non_empty(treatment.medication) {
                    case.medications.push(medication);
                }
                if let Some(outcome) = non_empty(treatment.outcome) {
                    case.outcome = outcome;
                }
                case.last_updated = Some(now);
                Ok(case.clone())
            })
            .await
    }

    async fn move_case(
        &self,
        actor: &User,
        id: &str,
        from: CaseStatus,
        to: CaseStatus,
    ) -> Result<Case> {
        require(actor, CLINICAL, "change case status")?;
        let case = self
            .store
            .update(names::CASES, |cases: &mut Vec<Case>| {
                let case = find_case(cases, id)?;
                if case.status != from {
                    return Err(PlatformError::transition("case", case.status, to));
                }
                case.status = to;
                case.last_updated = Some(Utc::now());
                Ok(case.clone())
            })
            .await?;
        self.audit("case_status", Some(actor), json!({ "id": case.id, "status": to }))
            .await?;
        Ok(case)
    }

    pub async fn resolve_case(&self, actor: &User, id: &str) -> Result<Case> {
        self.move_case(actor, id, CaseStatus::InTreatment, CaseStatus::Resolved)
            .await
    }

    pub async fn archive_case(&self, actor: &User, id: &str) -> Result<Case> {
        self.move_case(actor, id, CaseStatus::Resolved, CaseStatus::Closed)
            .await
    }

    /// A vet takes an unassigned case; pending cases start treatment.
    pub async fn claim_case(&self, vet: &User, id: &str) -> Result<Case> {
        require(vet, &[Role::Vet], "claim cases")?;
        self.store
            .update(names::CASES, |cases: &mut Vec<Case>| {
                let case = find_case(cases, id)?;
                if let Some(current) = case
                    .assigned_vet
                    .as_deref()
                    .filter(|v| !same_user(v, &vet.email))
                {
                    return Err(PlatformError::conflict(format!(
                        "case {} is already assigned to {}",
                        case.id, current
                    )));
                }
                case.assigned_vet = Some(vet.email.clone());
                if case.status == CaseStatus::Pending {
                    case.status = CaseStatus::InTreatment;
                }
                case.last_updated = Some(Utc::now());
                Ok(case.clone())
            })
            .await
    }

    pub async fn prescribe(&self, vet: &User, case_id: &str, rx: NewPrescription) -> Result<Prescription> {
        require(vet, CLINICAL, "write prescriptions")?;
        validate_non_empty_string("medication", &rx.medication)?;
        validate_non_empty_string("dosage", &rx.dosage)?;
        if rx.duration_days == 0 {
            return Err(PlatformError::validation("duration must be at least one day"));
        }

        let medication = rx.medication.trim().to_string();
        self.store
            .update(names::CASES, |cases: &mut Vec<Case>| {
                let case = find_case(cases, case_id)?;
                case.medications.push(medication.clone());
                case.last_updated = Some(Utc::now());
                Ok(())
            })
            .await?;

        let prescription = Prescription {
            id: next_id("RX"),
            case_id: case_id.to_string(),
            vet: vet.email.clone(),
            medication,
            dosage: rx.dosage.trim().to_string(),
            frequency: rx.frequency.trim().to_string(),
            duration_days: rx.duration_days,
            notes: rx.notes,
            issued_at: Utc::now(),
        };
        self.store
            .append(names::PRESCRIPTIONS, prescription.clone())
            .await?;
        tracing::info!("{} prescribed {} for {}", vet.email, prescription.medication, case_id);
        Ok(prescription)
    }

    pub async fn prescriptions(&self) -> Result<Vec<Prescription>> {
        self.store.load(names::PRESCRIPTIONS).await
    }

    pub async fn search_cases(&self, query: &str) -> Result<Vec<Case>> {
        let q = query.trim().to_lowercase();
        if q.chars().count() < MIN_QUERY_LEN {
            return Err(PlatformError::validation(format!(
                "search needs at least {} characters",
                MIN_QUERY_LEN
            )));
        }
        let mut hits: Vec<Case> = self
            .list_all_cases()
            .await?
            .into_iter()
            .filter(|c| {
                [
                    c.id.as_str(),
                    c.disease.as_str(),
                    c.place.as_str(),
                    c.assigned_vet.as_deref().unwrap_or(""),
                    c.notes.as_str(),
                    c.vet_notes.as_str(),
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&q))
            })
            .collect();
        hits.truncate(MAX_SEARCH_RESULTS);
        Ok(hits)
    }

    pub async fn list_cases(&self, filter: &CaseFilter) -> Result<Vec<Case>> {
        let disease = filter.disease.as_ref().map(|d| d.trim().to_lowercase());
        let mut cases: Vec<Case> = self
            .list_all_cases()
            .await?
            .into_iter()
            .filter(|c| filter.status.map_or(true, |s| c.status == s))
            .filter(|c| filter.severity.map_or(true, |s| c.severity == s))
            .filter(|c| disease.as_deref().map_or(true, |d| c.disease.to_lowercase() == d))
            .collect();
        match filter.sort {
            CaseSort::Recent => cases.sort_by(|a, b| b.time.cmp(&a.time)),
            CaseSort::Severity => cases.sort_by(|a, b| {
                a.severity
                    .rank()
                    .cmp(&b.severity.rank())
                    .then_with(|| b.time.cmp(&a.time))
            }),
            CaseSort::Status => cases.sort_by(|a, b| {
                a.status
                    .rank()
                    .cmp(&b.status.rank())
                    .then_with(|| b.time.cmp(&a.time))
            }),
        }
        cases.truncate(MAX_LIST_RESULTS);
        Ok(cases)
    }

    pub async fn case_stats(&self, today: NaiveDate) -> Result<CaseStats> {
        let cases = self.list_all_cases().await?;
        let mut stats = CaseStats {
            total: cases.len(),
            ..Default::default()
        };
        let mut resolved = 0usize;
        for c in &cases {
            *stats.by_status.entry(c.status.to_string()).or_default() += 1;
            *stats.by_severity.entry(c.severity.to_string()).or_default() += 1;
            *stats.by_disease.entry(c.disease.clone()).or_default() += 1;
            if matches!(c.status, CaseStatus::Resolved | CaseStatus::Closed) {
                resolved += 1;
            }
            let age = (today - c.time.date_naive()).num_days();
            if age == 0 {
                stats.today += 1;
            }
            if (0..7).contains(&age) {
                stats.this_week += 1;
            }
            if (0..30).contains(&age) {
                stats.this_month += 1;
            }
        }
        if stats.total > 0 {
            stats.resolution_rate = (resolved as f64 / stats.total as f64 * 1000.0).round() / 10.0;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryStorage;
    use crate::core::platform::testing::*;
    use crate::core::triage::Detection;
    use crate::domain::model::GeoPoint;
    use chrono::Duration;

    async fn seed(platform: &Platform<MemoryStorage>, classes: &[(&str, u32)]) -> Vec<String> {
        let detections = classes
            .iter()
            .map(|(class, score)| Detection {
                class: class.to_string(),
                confidence: 0.8,
                score: *score,
            })
            .collect();
        platform
            .record_detection(&volunteer(), "Mylapore", GeoPoint { lat: 13.03, lon: 80.26 }, detections, "tank street")
            .await
            .unwrap()
            .cases
            .into_iter()
            .map(|c| c.id)
            .collect()
    }

    #[tokio::test]
    async fn test_case_lifecycle() {
        let platform = platform();
        let ids = seed(&platform, &[("ringworm", 50)]).await;
        let id = &ids[0];

        assert!(platform.resolve_case(&vet(), id).await.is_err());
        assert!(platform.claim_case(&volunteer(), id).await.is_err());

        let claimed = platform.claim_case(&vet(), id).await.unwrap();
        assert_eq!(claimed.status, CaseStatus::InTreatment);
        assert_eq!(claimed.assigned_vet.as_deref(), Some("vet@clinic.in"));

        let other_vet = user("other@clinic.in", Role::Vet);
        assert!(matches!(
            platform.claim_case(&other_vet, id).await,
            Err(PlatformError::Conflict { .. })
        ));

        let treated = platform
            .record_treatment(
                &vet(),
                id,
                Treatment {
                    notes: Some("Cleaned lesions".into()),
                    medication: Some("Ivermectin".into()),
                    outcome: None,
                },
            )
            .await
            .unwrap();
        assert!(treated.vet_notes.starts_with("\n\n["));
        assert!(treated.vet_notes.ends_with("] Cleaned lesions"));
        assert_eq!(treated.medications, vec!["Ivermectin"]);

        platform.resolve_case(&vet(), id).await.unwrap();
        assert!(platform
            .record_treatment(&vet(), id, Treatment::default())
            .await
            .is_err());
        let closed = platform.archive_case(&admin(), id).await.unwrap();
        assert_eq!(closed.status, CaseStatus::Closed);
    }

    #[tokio::test]
    async fn test_update_case_requires_clinical_role() {
        let platform = platform();
        let ids = seed(&platform, &[("dermatitis", 20)]).await;
        let update = CaseUpdate {
            severity: Some(CaseSeverity::High),
            follow_up_date: NaiveDate::from_ymd_opt(2026, 3, 1),
            ..Default::default()
        };
        assert!(platform.update_case(&volunteer(), &ids[0], update.clone()).await.is_err());
        let case = platform.update_case(&vet(), &ids[0], update).await.unwrap();
        assert_eq!(case.severity, CaseSeverity::High);
        assert!(case.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_prescribe_appends_medication() {
        let platform = platform();
        let ids = seed(&platform, &[("demodicosis", 90)]).await;
        let rx = platform
            .prescribe(
                &vet(),
                &ids[0],
                NewPrescription {
                    medication: "Amitraz dip".into(),
                    dosage: "0.025%".into(),
                    frequency: "weekly".into(),
                    duration_days: 42,
                    notes: String::new(),
                },
            )
            .await
            .unwrap();
        assert!(rx.id.starts_with("RX-"));
        assert_eq!(platform.get_case(&ids[0]).await.unwrap().medications, vec!["Amitraz dip"]);
        assert!(platform
            .prescribe(
                &vet(),
                "CS-missing",
                NewPrescription {
                    medication: "x".into(),
                    dosage: "y".into(),
                    frequency: String::new(),
                    duration_days: 1,
                    notes: String::new(),
                },
            )
            .await
            .is_err());
        assert_eq!(platform.prescriptions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_and_list_limits() {
        let platform = platform();
        let classes: Vec<(&str, u32)> = (0..25).map(|i| ("ringworm", i * 4)).collect();
        seed(&platform, &classes).await;
        seed(&platform, &[("dermatitis", 10)]).await;

        assert!(platform.search_cases("r").await.is_err());
        assert_eq!(platform.search_cases("RING").await.unwrap().len(), 20);
        assert_eq!(platform.search_cases("tank").await.unwrap().len(), 20);
        assert_eq!(platform.search_cases("derma").await.unwrap().len(), 1);

        let listed = platform
            .list_cases(&CaseFilter {
                disease: Some("Ringworm".into()),
                sort: CaseSort::Severity,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(listed.len(), 25);
        assert_eq!(listed[0].severity, CaseSeverity::Critical);
    }

    #[tokio::test]
    async fn test_case_stats() {
        let platform = platform();
        let ids = seed(&platform, &[("ringworm", 50), ("ringworm", 70), ("healthy", 0)]).await;
        platform.claim_case(&vet(), &ids[0]).await.unwrap();
        platform.resolve_case(&vet(), &ids[0]).await.unwrap();

        let today = Utc::now().date_naive();
        let stats = platform.case_stats(today).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_disease["ringworm"], 2);
        assert_eq!(stats.by_status["resolved"], 1);
        assert_eq!(stats.resolution_rate, 33.3);
        assert_eq!(stats.today, 3);

        let later = platform.case_stats(today + Duration::days(10)).await.unwrap();
        assert_eq!(later.today, 0);
        assert_eq!(later.this_week, 0);
        assert_eq!(later.this_month, 3);
    }
}
