//! OpenStreetMap clients: Nominatim for geocoding, OSRM for routing.
//!
//! Both are free public services with fair-use limits, so the geocoder keeps a
//! minimum spacing between requests and caches answers in memory.

use crate::config::toml_config::{GeocodingSection, RoutingSection};
use crate::domain::model::GeoPoint;
use crate::domain::ports::{Geocoder, Place, Route, RouteStep, Router, TravelMode};
use crate::utils::error::{PlatformError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const MIN_QUERY_LEN: usize = 3;
const MAX_ALTERNATIVES: usize = 3;

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

impl NominatimPlace {
    fn into_place(self) -> Option<Place> {
        let lat = self.lat.parse().ok()?;
        let lon = self.lon.parse().ok()?;
        let point = GeoPoint::new(lat, lon).ok()?;
        Some(Place {
            name: self.display_name,
            point,
            kind: self.kind.unwrap_or_else(|| "location".to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct NominatimReverse {
    #[serde(default)]
    display_name: Option<String>,
}

struct CacheEntry<T> {
    stored_at: Instant,
    value: T,
}

pub struct NominatimGeocoder {
    client: Client,
    endpoint: String,
    user_agent: String,
    retry_attempts: u32,
    retry_delay: Duration,
    min_interval: Duration,
    cache_ttl: Duration,
    last_request: Mutex<Option<Instant>>,
    search_cache: Mutex<HashMap<String, CacheEntry<Vec<Place>>>>,
    reverse_cache: Mutex<HashMap<String, CacheEntry<Option<String>>>>,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocodingSection) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            retry_attempts: config.retry_attempts.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            min_interval: Duration::from_millis(config.min_interval_ms),
            cache_ttl: Duration::from_secs(config.cache_ttl_seconds),
            last_request: Mutex::new(None),
            search_cache: Mutex::new(HashMap::new()),
            reverse_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Holds the lock across the sleep so concurrent callers queue up.
    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.endpoint, path);
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.throttle().await;
            tracing::debug!("Nominatim request {} (attempt {}/{})", url, attempt, self.retry_attempts);

            let outcome = self
                .client
                .get(&url)
                .header(reqwest::header::USER_AGENT, &self.user_agent)
                .query(query)
                .send()
                .await;

            match outcome {
                Ok(response) if response.status().is_success() => {
                    return Ok(response.json::<T>().await?);
                }
                Ok(response) if response.status().is_server_error()
                    || response.status() == StatusCode::TOO_MANY_REQUESTS =>
                {
                    tracing::warn!("Nominatim returned {}", response.status());
                }
                Ok(response) => {
                    return Err(PlatformError::ServiceError {
                        service: "nominatim".to_string(),
                        message: format!("unexpected status {}", response.status()),
                    });
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    tracing::warn!("Nominatim request failed: {}", e);
                }
                Err(e) => return Err(e.into()),
            }

            if attempt >= self.retry_attempts {
                return Err(PlatformError::ServiceError {
                    service: "nominatim".to_string(),
                    message: format!("gave up after {} attempts", attempt),
                });
            }
            tokio::time::sleep(self.retry_delay).await;
        }
    }

    fn normalize(query: &str) -> String {
        query.trim().to_lowercase()
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>> {
        let found = self.search(address, 1).await?;
        Ok(found.into_iter().next().map(|p| p.point))
    }

    async fn reverse(&self, point: GeoPoint) -> Result<Option<String>> {
        let key = format!("{:.6},{:.6}", point.lat, point.lon);
        if let Some(hit) = self.reverse_cache.lock().await.get(&key) {
            if hit.stored_at.elapsed() < self.cache_ttl {
                return Ok(hit.value.clone());
            }
        }

        let query = [
            ("lat", point.lat.to_string()),
            ("lon", point.lon.to_string()),
            ("format", "json".to_string()),
        ];
        let address = match self.get_json::<NominatimReverse>("/reverse", &query).await {
            Ok(found) => found.display_name,
            Err(e) => {
                tracing::warn!("Reverse geocoding {} failed: {}", point, e);
                return Ok(None);
            }
        };

        self.reverse_cache.lock().await.insert(
            key,
            CacheEntry {
                stored_at: Instant::now(),
                value: address.clone(),
            },
        );
        Ok(address)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Place>> {
        let normalized = Self::normalize(query);
        if normalized.chars().count() < MIN_QUERY_LEN {
            return Ok(Vec::new());
        }

        let key = format!("{}:{}", limit, normalized);
        if let Some(hit) = self.search_cache.lock().await.get(&key) {
            if hit.stored_at.elapsed() < self.cache_ttl {
                tracing::debug!("Geocoding cache hit for '{}'", normalized);
                return Ok(hit.value.clone());
            }
        }

        let params = [
            ("q", query.trim().to_string()),
            ("format", "json".to_string()),
            ("limit", limit.max(1).to_string()),
            ("addressdetails", "1".to_string()),
        ];
        let places: Vec<Place> = match self.get_json::<Vec<NominatimPlace>>("/search", &params).await
        {
            Ok(raw) => raw.into_iter().filter_map(NominatimPlace::into_place).collect(),
            Err(e) => {
                tracing::warn!("Geocoding '{}' failed: {}", query, e);
                return Ok(Vec::new());
            }
        };

        if places.is_empty() {
            tracing::info!("No geocoding results for '{}'", query);
        }

        self.search_cache.lock().await.insert(
            key,
            CacheEntry {
                stored_at: Instant::now(),
                value: places.clone(),
            },
        );
        Ok(places)
    }
}

// ---------------------------------------------------------------- OSRM

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    geometry: OsrmGeometry,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Debug, Deserialize)]
struct OsrmStep {
    distance: f64,
    duration: f64,
    #[serde(default)]
    name: String,
    maneuver: OsrmManeuver,
}

#[derive(Debug, Deserialize)]
struct OsrmManeuver {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    modifier: Option<String>,
}

fn describe_step(step: &OsrmStep) -> String {
    let verb = match step.maneuver.kind.as_str() {
        "depart" => "Depart".to_string(),
        "arrive" => "Arrive".to_string(),
        "turn" | "end of road" | "fork" => match &step.maneuver.modifier {
            Some(m) => format!("Turn {}", m),
            None => "Turn".to_string(),
        },
        "roundabout" | "rotary" => "Enter the roundabout".to_string(),
        _ => "Continue".to_string(),
    };
    if step.name.is_empty() {
        verb
    } else {
        format!("{} onto {}", verb, step.name)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub struct OsrmRouter {
    client: Client,
    endpoint: String,
}

impl OsrmRouter {
    pub fn new(config: &RoutingSection) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Router for OsrmRouter {
    async fn routes(&self, from: GeoPoint, to: GeoPoint, mode: TravelMode) -> Result<Vec<Route>> {
        from.check()?;
        to.check()?;

        // OSRM wants lon,lat pairs.
        let url = format!(
            "{}/route/v1/{}/{},{};{},{}",
            self.endpoint,
            mode.profile(),
            from.lon,
            from.lat,
            to.lon,
            to.lat
        );
        tracing::debug!("OSRM request {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("overview", "full"),
                ("geometries", "geojson"),
                ("steps", "true"),
                ("alternatives", "true"),
            ])
            .send()
            .await?;

        let body: OsrmResponse = response.json().await?;
        if body.code != "Ok" {
            tracing::warn!(
                "Routing failed: {} {}",
                body.code,
                body.message.unwrap_or_default()
            );
            return Ok(Vec::new());
        }

        let routes = body
            .routes
            .into_iter()
            .take(MAX_ALTERNATIVES)
            .enumerate()
            .map(|(idx, route)| Route {
                route_id: idx,
                distance_km: round2(route.distance / 1000.0),
                duration_min: (route.duration / 60.0).round(),
                coordinates: route
                    .geometry
                    .coordinates
                    .iter()
                    .map(|[lon, lat]| GeoPoint { lat: *lat, lon: *lon })
                    .collect(),
                steps: route
                    .legs
                    .iter()
                    .flat_map(|leg| leg.steps.iter())
                    .map(|step| RouteStep {
                        instruction: describe_step(step),
                        distance_m: step.distance,
                        duration_s: step.duration,
                        maneuver: step.maneuver.kind.clone(),
                    })
                    .collect(),
                is_fastest: idx == 0,
            })
            .collect();

        Ok(routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_step() {
        let step = OsrmStep {
            distance: 120.0,
            duration: 30.0,
            name: "Anna Salai".to_string(),
            maneuver: OsrmManeuver {
                kind: "turn".to_string(),
                modifier: Some("left".to_string()),
            },
        };
        assert_eq!(describe_step(&step), "Turn left onto Anna Salai");

        let step = OsrmStep {
            distance: 0.0,
            duration: 0.0,
            name: String::new(),
            maneuver: OsrmManeuver {
                kind: "new name".to_string(),
                modifier: None,
            },
        };
        assert_eq!(describe_step(&step), "Continue");
    }

    #[test]
    fn test_nominatim_place_rejects_bad_coordinates() {
        let raw = NominatimPlace {
            lat: "abc".into(),
            lon: "80.2".into(),
            display_name: "x".into(),
            kind: None,
        };
        assert!(raw.into_place().is_none());

        let raw = NominatimPlace {
            lat: "13.04".into(),
            lon: "80.23".into(),
            display_name: "T. Nagar, Chennai".into(),
            kind: None,
        };
        let place = raw.into_place().unwrap();
        assert_eq!(place.kind, "location");
        assert_eq!(place.point.lat, 13.04);
    }
}
