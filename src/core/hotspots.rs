use crate::core::geo::haversine_km;
use crate::core::platform::Platform;
use crate::core::store::names;
use crate::domain::model::{GeoPoint, Hotspot, HotspotCategory, User};
use crate::domain::ports::Storage;
use crate::utils::error::{PlatformError, Result};
use crate::utils::ids::next_id;
use crate::utils::validation::validate_range;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;

/// Bite-risk hotspots at or above this score count as high risk.
pub const HIGH_BITE_RISK: u8 = 70;

#[derive(Debug, Clone)]
pub struct NewHotspot {
    pub point: GeoPoint,
    pub category: HotspotCategory,
    pub label: String,
    pub risk: u8,
    /// Defaults to `risk / 100`.
    pub intensity: Option<f64>,
    pub disease: Option<String>,
    pub place: String,
    pub color: Option<String>,
}

impl NewHotspot {
    pub fn new(point: GeoPoint, category: HotspotCategory, label: impl Into<String>, risk: u8) -> Self {
        Self {
            point,
            category,
            label: label.into(),
            risk,
            intensity: None,
            disease: None,
            place: String::new(),
            color: None,
        }
    }

    pub fn place(mut self, place: impl Into<String>) -> Self {
        self.place = place.into();
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn disease(mut self, disease: impl Into<String>) -> Self {
        self.disease = Some(disease.into());
        self
    }
}

pub fn default_color(category: HotspotCategory, risk: u8) -> &'static str {
    match category {
        HotspotCategory::BiteRisk if risk >= HIGH_BITE_RISK => "#ef4444",
        HotspotCategory::BiteRisk => "#f59e0b",
        HotspotCategory::Disease => "#3b82f6",
        HotspotCategory::Emergency => "#dc2626",
        HotspotCategory::Sighting => "#64748b",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NearbyHotspot {
    pub hotspot: Hotspot,
    pub distance_km: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiseaseStat {
    pub count: usize,
    pub mean_risk: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HotspotSummary {
    pub total: usize,
    pub by_category: BTreeMap<HotspotCategory, usize>,
    pub diseases: BTreeMap<String, DiseaseStat>,
    pub high_bite_risk: usize,
}

impl<S: Storage> Platform<S> {
    pub async fn add_hotspot(&self, actor: &User, new: NewHotspot) -> Result<Hotspot> {
        new.point.check()?;
        validate_range("risk", new.risk, 0, 100)?;
        let intensity = new.intensity.unwrap_or(f64::from(new.risk) / 100.0);
        if !(0.0..=1.0).contains(&intensity) {
            return Err(PlatformError::validation(format!(
                "intensity must be between 0 and 1 (got {})",
                intensity
            )));
        }
        if new.label.trim().is_empty() {
            return Err(PlatformError::validation("hotspot label cannot be empty"));
        }

        let hotspot = Hotspot {
            id: next_id("HS"),
            point: new.point,
            category: new.category,
            label: new.label.trim().to_string(),
            risk: new.risk,
            intensity,
            disease: new.disease,
            place: new.place,
            color: new
                .color
                .unwrap_or_else(|| default_color(new.category, new.risk).to_string()),
            reported_by: actor.name.clone(),
            created_at: Utc::now(),
        };
        self.store.append(names::HOTSPOTS, hotspot.clone()).await?;
        tracing::debug!("Added {} hotspot {} at {}", hotspot.category, hotspot.id, hotspot.point);
        Ok(hotspot)
    }

    pub async fn hotspots(&self) -> Result<Vec<Hotspot>> {
        self.store.load(names::HOTSPOTS).await
    }

    /// Hotspots within `radius_km`, nearest first.
    pub async fn hotspots_near(&self, point: GeoPoint, radius_km: f64) -> Result<Vec<NearbyHotspot>> {
        point.check()?;
        let mut nearby: Vec<NearbyHotspot> = self
            .hotspots()
            .await?
            .into_iter()
            .map(|hotspot| NearbyHotspot {
                distance_km: haversine_km(point, hotspot.point),
                hotspot,
            })
            .filter(|n| n.distance_km <= radius_km)
            .collect();
        nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        Ok(nearby)
    }

    pub async fn hotspot_summary(&self) -> Result<HotspotSummary> {
        let hotspots = self.hotspots().await?;
        let mut summary = HotspotSummary {
            total: hotspots.len(),
            ..Default::default()
        };
        let mut risk_sums: BTreeMap<String, f64> = BTreeMap::new();

        for h in &hotspots {
            *summary.by_category.entry(h.category).or_default() += 1;
            if h.category == HotspotCategory::BiteRisk && h.risk >= HIGH_BITE_RISK {
                summary.high_bite_risk += 1;
            }
            if let Some(disease) = &h.disease {
                summary.diseases.entry(disease.clone()).or_default().count += 1;
                *risk_sums.entry(disease.clone()).or_default() += f64::from(h.risk);
            }
        }
        for (disease, stat) in summary.diseases.iter_mut() {
            let sum = risk_sums.get(disease).copied().unwrap_or_default();
            stat.mean_risk = (sum / stat.count as f64 * 10.0).round() / 10.0;
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::testing::*;

    fn at(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint { lat, lon }
    }

    #[tokio::test]
    async fn test_add_hotspot_validates_input() {
        let platform = platform();
        let bad = NewHotspot::new(at(120.0, 0.0), HotspotCategory::Sighting, "dog", 10);
        assert!(platform.add_hotspot(&citizen(), bad).await.is_err());

        let bad = NewHotspot::new(at(13.0, 80.0), HotspotCategory::Sighting, "dog", 101);
        assert!(platform.add_hotspot(&citizen(), bad).await.is_err());

        let ok = NewHotspot::new(at(13.0, 80.0), HotspotCategory::BiteRisk, "Bite Risk: High Risk", 75);
        let h = platform.add_hotspot(&citizen(), ok).await.unwrap();
        assert_eq!(h.intensity, 0.75);
        assert_eq!(h.color, "#ef4444");
    }

    #[tokio::test]
    async fn test_hotspots_near_sorted_by_distance() {
        let platform = platform();
        for (lat, label) in [(13.05, "far"), (13.0, "here"), (13.01, "close"), (14.0, "out")] {
            platform
                .add_hotspot(&citizen(), NewHotspot::new(at(lat, 80.25), HotspotCategory::Sighting, label, 10))
                .await
                .unwrap();
        }
        let near = platform.hotspots_near(at(13.0, 80.25), 10.0).await.unwrap();
        let labels: Vec<&str> = near.iter().map(|n| n.hotspot.label.as_str()).collect();
        assert_eq!(labels, vec!["here", "close", "far"]);
        assert_eq!(near[0].distance_km, 0.0);
    }

    #[tokio::test]
    async fn test_summary_counts_and_means() {
        let platform = platform();
        let p = at(13.0, 80.2);
        for risk in [80, 60] {
            platform
                .add_hotspot(&citizen(), NewHotspot::new(p, HotspotCategory::Disease, "Ringworm", risk).disease("ringworm"))
                .await
                .unwrap();
        }
        for risk in [90, 40] {
            platform
                .add_hotspot(&citizen(), NewHotspot::new(p, HotspotCategory::BiteRisk, "bite", risk))
                .await
                .unwrap();
        }

        let summary = platform.hotspot_summary().await.unwrap();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.by_category[&HotspotCategory::Disease], 2);
        assert_eq!(summary.diseases["ringworm"].count, 2);
        assert_eq!(summary.diseases["ringworm"].mean_risk, 70.0);
        assert_eq!(summary.high_bite_risk, 1);
    }
}
