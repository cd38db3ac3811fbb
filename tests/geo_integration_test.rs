use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;
use stray_safe::adapters::{NominatimGeocoder, OsrmRouter};
use stray_safe::config::toml_config::{GeocodingSection, RoutingSection};
use stray_safe::core::sos::NewSos;
use stray_safe::domain::model::{EmergencyType, GeoPoint, Role, SosSeverity, User};
use stray_safe::domain::ports::{Geocoder, Router, TravelMode};
use stray_safe::{MemoryStorage, Platform};

fn geocoding(server: &MockServer) -> GeocodingSection {
    GeocodingSection {
        endpoint: server.base_url(),
        user_agent: "stray-safe-tests/1.0".to_string(),
        retry_attempts: 2,
        retry_delay_ms: 0,
        min_interval_ms: 0,
        ..Default::default()
    }
}

fn reporter() -> User {
    User {
        email: "citizen@mail.com".to_string(),
        name: "citizen".to_string(),
        password_hash: String::new(),
        role: Role::User,
        phone: None,
        coords: None,
        active: true,
        created_at: chrono::Utc::now(),
        bio: String::new(),
        preferences: Default::default(),
    }
}

#[tokio::test]
async fn test_nominatim_search_sends_user_agent_and_caches() {
    let server = MockServer::start();
    let search = server.mock(|when, then| {
        when.method(GET)
            .path("/search")
            .query_param("q", "Adyar")
            .query_param("format", "json")
            .query_param("limit", "3")
            .query_param("addressdetails", "1")
            .header("user-agent", "stray-safe-tests/1.0");
        then.status(200).json_body(json!([
            {"lat": "13.0012", "lon": "80.2565", "display_name": "Adyar, Chennai", "type": "suburb"},
            {"lat": "not-a-number", "lon": "80.0", "display_name": "Broken"}
        ]));
    });

    let geocoder = NominatimGeocoder::new(&geocoding(&server)).unwrap();
    let places = geocoder.search("Adyar", 3).await.unwrap();
    assert_eq!(places.len(), 1);
    assert_eq!(places[0].name, "Adyar, Chennai");
    assert_eq!(places[0].kind, "suburb");
    assert_eq!(places[0].point.lat, 13.0012);

    // Same query, different spacing and case: served from the cache.
    let again = geocoder.search("  adyar ", 3).await.unwrap();
    assert_eq!(again, places);
    search.assert_hits(1);
}

#[tokio::test]
async fn test_nominatim_short_query_makes_no_request() {
    let server = MockServer::start();
    let any = server.mock(|when, then| {
        when.method(GET);
        then.status(200).json_body(json!([]));
    });

    let geocoder = NominatimGeocoder::new(&geocoding(&server)).unwrap();
    assert!(geocoder.search(" ab ", 5).await.unwrap().is_empty());
    any.assert_hits(0);
}

#[tokio::test]
async fn test_nominatim_retries_server_errors_then_gives_up() {
    let server = MockServer::start();
    let failing = server.mock(|when, then| {
        when.method(GET).path("/search");
        then.status(503);
    });

    let geocoder = NominatimGeocoder::new(&geocoding(&server)).unwrap();
    let places = geocoder.search("Velachery", 5).await.unwrap();
    assert!(places.is_empty());
    failing.assert_hits(2);
}

#[tokio::test]
async fn test_platform_uses_reverse_geocoding_for_sos_place() {
    let server = MockServer::start();
    let reverse = server.mock(|when, then| {
        when.method(GET).path("/reverse").query_param("format", "json");
        then.status(200)
            .json_body(json!({"display_name": "Besant Nagar Beach, Chennai"}));
    });

    let geocoder = NominatimGeocoder::new(&geocoding(&server)).unwrap();
    let platform = Platform::new(MemoryStorage::new()).with_geocoder(Arc::new(geocoder));

    let mut sos = NewSos::new(SosSeverity::High, EmergencyType::InjuredDog);
    sos.coords = Some(GeoPoint { lat: 13.0003, lon: 80.2667 });
    let receipt = platform.create_sos(&reporter(), sos).await.unwrap();
    assert_eq!(receipt.sos.place, "Besant Nagar Beach, Chennai");
    reverse.assert_hits(1);
}

#[tokio::test]
async fn test_resolve_place_falls_back_to_gazetteer() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/search");
        then.status(200).json_body(json!([]));
    });

    let geocoder = NominatimGeocoder::new(&geocoding(&server)).unwrap();
    let platform = Platform::new(MemoryStorage::new()).with_geocoder(Arc::new(geocoder));
    let adyar = platform.resolve_place("Adyar").await;
    assert_eq!(adyar, GeoPoint { lat: 13.0067, lon: 80.2571 });

    let nowhere = platform.resolve_place("Atlantis").await;
    assert_eq!(nowhere, GeoPoint { lat: 13.0827, lon: 80.2707 });
}

#[tokio::test]
async fn test_osrm_routes_are_parsed_fastest_first() {
    let server = MockServer::start();
    let route = server.mock(|when, then| {
        when.method(GET)
            .path("/route/v1/walking/80.2707,13.0827;80.2571,13.0067")
            .query_param("overview", "full")
            .query_param("geometries", "geojson")
            .query_param("steps", "true")
            .query_param("alternatives", "true");
        then.status(200).json_body(json!({
            "code": "Ok",
            "routes": [
                {
                    "distance": 9876.0,
                    "duration": 754.0,
                    "geometry": {"coordinates": [[80.2707, 13.0827], [80.2571, 13.0067]]},
                    "legs": [{"steps": [
                        {"distance": 400.0, "duration": 60.0, "name": "Anna Salai",
                         "maneuver": {"type": "depart"}},
                        {"distance": 0.0, "duration": 0.0, "name": "",
                         "maneuver": {"type": "arrive"}}
                    ]}]
                },
                {
                    "distance": 11000.0,
                    "duration": 900.0,
                    "geometry": {"coordinates": []},
                    "legs": []
                }
            ]
        }));
    });

    let router = OsrmRouter::new(&RoutingSection {
        endpoint: server.base_url(),
        ..Default::default()
    })
    .unwrap();
    let from = GeoPoint { lat: 13.0827, lon: 80.2707 };
    let to = GeoPoint { lat: 13.0067, lon: 80.2571 };
    let routes = router.routes(from, to, TravelMode::Walking).await.unwrap();

    route.assert();
    assert_eq!(routes.len(), 2);
    assert!(routes[0].is_fastest);
    assert!(!routes[1].is_fastest);
    assert_eq!(routes[0].distance_km, 9.88);
    assert_eq!(routes[0].duration_min, 13.0);
    assert_eq!(routes[0].coordinates[0], from);
    assert_eq!(routes[0].steps[0].instruction, "Depart onto Anna Salai");
    assert_eq!(routes[0].steps[1].instruction, "Arrive");
}

#[tokio::test]
async fn test_osrm_no_route_gives_empty_list() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path_contains("/route/v1/driving/");
        then.status(200)
            .json_body(json!({"code": "NoRoute", "message": "Impossible route"}));
    });

    let router = OsrmRouter::new(&RoutingSection {
        endpoint: server.base_url(),
        ..Default::default()
    })
    .unwrap();
    let platform = Platform::new(MemoryStorage::new()).with_router(Arc::new(router));
    let routes = platform
        .routes(
            GeoPoint { lat: 13.0827, lon: 80.2707 },
            GeoPoint { lat: 12.9750, lon: 80.2200 },
            TravelMode::Driving,
        )
        .await
        .unwrap();
    assert!(routes.is_empty());
}
