use crate::core::platform::{require, same_user, Platform};
use crate::core::store::names;
use crate::domain::model::{Campaign, CampaignStatus, GeoPoint, Role, User};
use crate::domain::ports::Storage;
use crate::utils::error::{PlatformError, Result};
use crate::utils::ids::next_id;
use crate::utils::validation::validate_non_empty_string;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub zone: String,
    pub date: NaiveDate,
    pub time_slot: String,
    pub target: u32,
    pub vaccine_type: String,
    pub coordinator: Option<String>,
    pub volunteers_needed: u32,
    pub notes: String,
    pub location: GeoPoint,
    pub location_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageBand {
    Good,
    Fair,
    Poor,
}

impl CoverageBand {
    pub fn from_pct(pct: f64) -> Self {
        if pct >= 80.0 {
            CoverageBand::Good
        } else if pct >= 50.0 {
            CoverageBand::Fair
        } else {
            CoverageBand::Poor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneCoverage {
    pub zone: String,
    pub campaigns: usize,
    pub vaccinated: u32,
    pub target: u32,
    pub coverage_pct: f64,
    pub band: CoverageBand,
}

fn find_campaign<'a>(campaigns: &'a mut [Campaign], id: &str) -> Result<&'a mut Campaign> {
    campaigns
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or_else(|| PlatformError::not_found("campaign", id))
}

fn default_location_name(zone: &str, at: GeoPoint) -> String {
    format!("{} Area (Lat {:.2}, Lon {:.2})", zone, at.lat, at.lon)
}

impl<S: Storage> Platform<S> {
    pub async fn create_campaign(&self, actor: &User, new: NewCampaign) -> Result<Campaign> {
        require(actor, &[Role::Admin, Role::Vet], "create campaigns")?;
        validate_non_empty_string("zone", &new.zone)?;
        validate_non_empty_string("vaccine_type", &new.vaccine_type)?;
        new.location.check()?;
        if new.target == 0 {
            return Err(PlatformError::validation("campaign target must be at least 1"));
        }

        let zone = new.zone.trim().to_string();
        let location_name = new
            .location_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| default_location_name(&zone, new.location));
        let campaign = Campaign {
            id: next_id("VC"),
            zone,
            date: new.date,
            time_slot: new.time_slot,
            status: CampaignStatus::Scheduled,
            target: new.target,
            completed: 0,
            vaccine_type: new.vaccine_type.trim().to_string(),
            coordinator: new.coordinator.unwrap_or_else(|| actor.name.clone()),
            volunteers_needed: new.volunteers_needed,
            volunteers_assigned: Vec::new(),
            notes: new.notes,
            location: new.location,
            location_name,
            created_by: actor.email.clone(),
            created_at: Utc::now(),
        };
        self.store.append(names::CAMPAIGNS, campaign.clone()).await?;
        self.audit(
            "campaign_created",
            Some(actor),
            json!({ "id": campaign.id, "zone": campaign.zone, "date": campaign.date }),
        )
        .await?;
        tracing::info!("Campaign {} scheduled in {} on {}", campaign.id, campaign.zone, campaign.date);
        Ok(campaign)
    }

    /// Campaigns by date, soonest first.
    pub async fn campaigns(&self) -> Result<Vec<Campaign>> {
        let mut campaigns: Vec<Campaign> = self.store.load(names::CAMPAIGNS).await?;
        campaigns.sort_by_key(|c| c.date);
        Ok(campaigns)
    }

    /// Moves scheduled campaigns that are due today or already past.
    pub async fn refresh_statuses(&self, today: NaiveDate) -> Result<usize> {
        let changed = self
            .store
            .update(names::CAMPAIGNS, |campaigns: &mut Vec<Campaign>| {
                let mut changed = 0;
                for c in campaigns.iter_mut().filter(|c| c.status == CampaignStatus::Scheduled) {
                    if c.date < today {
                        c.status = CampaignStatus::Overdue;
                        changed += 1;
                    } else if c.date == today {
                        c.status = CampaignStatus::InProgress;
                        changed += 1;
                    }
                }
                Ok(changed)
            })
            .await?;
        if changed > 0 {
            tracing::info!("Refreshed {} campaign status(es) for {}", changed, today);
        }
        Ok(changed)
    }

    pub async fn join_campaign(&self, actor: &User, id: &str) -> Result<Campaign> {
        if !actor.is_responder() {
            return Err(PlatformError::denied("join campaigns", actor.role));
        }
        self.store
            .update(names::CAMPAIGNS, |campaigns: &mut Vec<Campaign>| {
                let campaign = find_campaign(campaigns, id)?;
                if campaign
                    .volunteers_assigned
                    .iter()
                    .any(|v| same_user(v, &actor.email))
                {
                    return Ok(campaign.clone());
                }
                if !matches!(
                    campaign.status,
                    CampaignStatus::Scheduled | CampaignStatus::InProgress
                ) {
                    return Err(PlatformError::validation(format!(
                        "campaign {} is {} and no longer takes volunteers",
                        campaign.id, campaign.status
                    )));
                }
                if campaign.spots_left() == 0 {
                    return Err(PlatformError::conflict(format!(
                        "campaign {} has no volunteer spots left",
                        campaign.id
                    )));
                }
                campaign.volunteers_assigned.push(actor.email.clone());
                Ok(campaign.clone())
            })
            .await
    }

    pub async fn leave_campaign(&self, actor: &User, id: &str) -> Result<Campaign> {
        self.store
            .update(names::CAMPAIGNS, |campaigns: &mut Vec<Campaign>| {
                let campaign = find_campaign(campaigns, id)?;
                let before = campaign.volunteers_assigned.len();
                campaign
                    .volunteers_assigned
                    .retain(|v| !same_user(v, &actor.email));
                if campaign.volunteers_assigned.len() == before {
                    return Err(PlatformError::validation(format!(
                        "{} is not a volunteer on campaign {}",
                        actor.email, campaign.id
                    )));
                }
                Ok(campaign.clone())
            })
            .await
    }

    pub async fn record_progress(
        &self,
        actor: &User,
        id: &str,
        completed: u32,
        status: Option<CampaignStatus>,
    ) -> Result<Campaign> {
        require(actor, &[Role::Admin, Role::Vet], "record campaign progress")?;
        let campaign = self
            .store
            .update(names::CAMPAIGNS, |campaigns: &mut Vec<Campaign>| {
                let campaign = find_campaign(campaigns, id)?;
                if completed < campaign.completed {
                    return Err(PlatformError::validation(format!(
                        "completed count cannot go down ({} -> {})",
                        campaign.completed, completed
                    )));
                }
                campaign.completed = completed;
                match status {
                    Some(status) => campaign.status = status,
                    None if completed >= campaign.target => {
                        campaign.status = CampaignStatus::Completed
                    }
                    None => {}
                }
                Ok(campaign.clone())
            })
            .await?;
        self.audit(
            "campaign_progress",
            Some(actor),
            json!({ "id": campaign.id, "completed": campaign.completed, "status": campaign.status }),
        )
        .await?;
        Ok(campaign)
    }

    pub async fn zone_coverage(&self) -> Result<Vec<ZoneCoverage>> {
        let mut zones: BTreeMap<String, (usize, u32, u32)> = BTreeMap::new();
        for c in self.campaigns().await? {
            let entry = zones.entry(c.zone.clone()).or_default();
            entry.0 += 1;
            entry.1 += c.completed;
            entry.2 += c.target;
        }
        Ok(zones
            .into_iter()
            .map(|(zone, (campaigns, vaccinated, target))| {
                let coverage_pct = if target == 0 {
                    0.0
                } else {
                    (f64::from(vaccinated) / f64::from(target) * 1000.0).round() / 10.0
                };
                ZoneCoverage {
                    zone,
                    campaigns,
                    vaccinated,
                    target,
                    coverage_pct,
                    band: CoverageBand::from_pct(coverage_pct),
                }
            })
            .collect())
    }
}
