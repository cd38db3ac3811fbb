use crate::domain::model::GeoPoint;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub trait Storage: Send + Sync {
    fn read_file(
        &self,
        path: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn remove_file(&self, path: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub point: GeoPoint,
    pub kind: String,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>>;
    async fn reverse(&self, point: GeoPoint) -> Result<Option<String>>;
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Place>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    Driving,
    Walking,
    Cycling,
}

impl TravelMode {
    pub fn profile(&self) -> &'static str {
        match self {
            TravelMode::Driving => "driving",
            TravelMode::Walking => "walking",
            TravelMode::Cycling => "cycling",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub instruction: String,
    pub distance_m: f64,
    pub duration_s: f64,
    pub maneuver: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub route_id: usize,
    pub distance_km: f64,
    pub duration_min: f64,
    pub coordinates: Vec<GeoPoint>,
    pub steps: Vec<RouteStep>,
    pub is_fastest: bool,
}

impl Route {
    pub fn distance_text(&self) -> String {
        format!("{:.1} km", self.distance_km)
    }

    pub fn duration_text(&self) -> String {
        format!("{:.0} min", self.duration_min)
    }
}

#[async_trait]
pub trait Router: Send + Sync {
    async fn routes(&self, from: GeoPoint, to: GeoPoint, mode: TravelMode) -> Result<Vec<Route>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Channel not configured; the message was only logged.
    Skipped,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<Delivery>;
    async fn send_sms(&self, to: &str, body: &str) -> Result<Delivery>;
}
