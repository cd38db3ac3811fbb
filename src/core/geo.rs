use crate::core::platform::Platform;
use crate::domain::model::GeoPoint;
use crate::domain::ports::{Place, Route, Storage, TravelMode};
use crate::utils::error::Result;
use chrono::Duration;
use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in km, rounded to two decimals.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let km = 2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt());
    (km * 100.0).round() / 100.0
}

/// Offline table of well-known localities.
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    entries: Vec<(&'static str, GeoPoint)>,
}

impl Gazetteer {
    pub fn new(entries: Vec<(&'static str, GeoPoint)>) -> Self {
        Self { entries }
    }

    pub fn chennai() -> Self {
        const TABLE: &[(&str, f64, f64)] = &[
            ("t.nagar", 13.0418, 80.2341),
            ("t nagar", 13.0418, 80.2341),
            ("anna nagar", 13.0850, 80.2101),
            ("adyar", 13.0067, 80.2571),
            ("velachery", 12.9750, 80.2200),
            ("tambaram", 12.9229, 80.1275),
            ("guindy", 13.0067, 80.2206),
            ("besant nagar", 13.0001, 80.2668),
            ("marina beach", 13.0499, 80.2824),
            ("mylapore", 13.0333, 80.2667),
            ("nungambakkam", 13.0569, 80.2426),
            ("kodambakkam", 13.0518, 80.2244),
            ("vadapalani", 13.0504, 80.2124),
            ("porur", 13.0358, 80.1561),
            ("sholinganallur", 12.9008, 80.2271),
            ("perungudi", 12.9611, 80.2425),
            ("thiruvanmiyur", 12.9826, 80.2588),
            ("chrompet", 12.9517, 80.1392),
        ];
        Self::new(
            TABLE
                .iter()
                .map(|&(name, lat, lon)| (name, GeoPoint { lat, lon }))
                .collect(),
        )
    }

    /// Exact match first, then a substring match in either direction.
    pub fn lookup(&self, place: &str) -> Option<GeoPoint> {
        let wanted = place.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(name, _)| *name == wanted)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|(name, _)| wanted.contains(name) || name.contains(wanted.as_str()))
            })
            .map(|(_, point)| *point)
    }
}

pub fn traffic_multiplier(hour: u32) -> f64 {
    match hour {
        7..=9 => 1.4,
        10..=16 => 1.1,
        17..=19 => 1.5,
        20..=23 => 0.9,
        _ => 0.8,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrafficLevel {
    Light,
    Moderate,
    Heavy,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrafficEta {
    pub base_min: u32,
    pub adjusted_min: u32,
    pub delay_min: i64,
    pub level: TrafficLevel,
}

pub fn eta_with_traffic(route: &Route, hour: u32) -> TrafficEta {
    let multiplier = traffic_multiplier(hour);
    let base_min = route.duration_min as u32;
    let adjusted_min = (route.duration_min * multiplier) as u32;
    let level = if multiplier > 1.3 {
        TrafficLevel::Heavy
    } else if multiplier > 1.0 {
        TrafficLevel::Moderate
    } else {
        TrafficLevel::Light
    };
    TrafficEta {
        base_min,
        adjusted_min,
        delay_min: i64::from(adjusted_min) - i64::from(base_min),
        level,
    }
}

impl<S: Storage> Platform<S> {
    /// Remote geocoder, then the gazetteer, then the configured city center.
    pub async fn resolve_place(&self, place: &str) -> GeoPoint {
        if let Some(geocoder) = &self.geocoder {
            match geocoder.geocode(place).await {
                Ok(Some(point)) => return point,
                Ok(None) => {}
                Err(e) => tracing::warn!("Geocoding '{}' failed: {}", place, e),
            }
        }
        if let Some(point) = self.gazetteer.lookup(place) {
            tracing::debug!("Resolved '{}' from the gazetteer", place);
            return point;
        }
        tracing::warn!("Location '{}' not found, using city center", place);
        self.city_center
    }

    /// Human-readable address, or "lat, lon" when nothing better is known.
    pub async fn describe_point(&self, point: GeoPoint) -> String {
        if let Some(geocoder) = &self.geocoder {
            match geocoder.reverse(point).await {
                Ok(Some(address)) => return address,
                Ok(None) => {}
                Err(e) => tracing::warn!("Reverse geocoding {} failed: {}", point, e),
            }
        }
        point.short_label()
    }

    /// Successful remote results are cached for offline use; when the
    /// geocoder fails the cached answer is served instead.
    pub async fn search_places(&self, query: &str, limit: usize) -> Result<Vec<Place>> {
        let key = format!("places_{}", query.trim().to_lowercase());
        let mut places = match &self.geocoder {
            Some(geocoder) => match geocoder.search(query, limit).await {
                Ok(found) => {
                    if !found.is_empty() {
                        self.store.cache_put(&key, &found, Duration::hours(24)).await?;
                    }
                    found
                }
                Err(e) => {
                    tracing::warn!("Place search for '{}' failed, trying offline cache: {}", query, e);
                    self.store.cache_get(&key).await?.unwrap_or_default()
                }
            },
            None => Vec::new(),
        };
        if places.is_empty() {
            if let Some(point) = self.gazetteer.lookup(query) {
                places.push(Place {
                    name: query.trim().to_string(),
                    point,
                    kind: "locality".to_string(),
                });
            }
        }
        Ok(places)
    }

    /// Routes from the router port, or empty when routing is disabled.
    pub async fn routes(&self, from: GeoPoint, to: GeoPoint, mode: TravelMode) -> Result<Vec<Route>> {
        from.check()?;
        to.check()?;
        match &self.router {
            Some(router) => router.routes(from, to, mode).await,
            None => {
                tracing::info!("Routing disabled; straight-line distance is {} km", haversine_km(from, to));
                Ok(Vec::new())
            }
        }
    }
}
