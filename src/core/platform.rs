use crate::adapters::{CompositeNotifier, NominatimGeocoder, OsrmRouter};
use crate::config::toml_config::AppConfig;
use crate::core::geo::Gazetteer;
use crate::core::store::Collections;
use crate::domain::model::{GeoPoint, Role, User};
use crate::domain::ports::{Geocoder, Notifier, Router, Storage};
use crate::utils::error::{PlatformError, Result};
use std::sync::Arc;

/// The service facade. Each feature area adds an `impl` block in its own
/// module; they all share the collections and the outbound ports held here.
pub struct Platform<S: Storage> {
    pub(crate) store: Collections<S>,
    pub(crate) geocoder: Option<Arc<dyn Geocoder>>,
    pub(crate) router: Option<Arc<dyn Router>>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) gazetteer: Gazetteer,
    pub(crate) city_center: GeoPoint,
    pub(crate) notify_concurrency: usize,
}

impl<S: Storage> Platform<S> {
    /// A platform with no geocoder or router and demo-mode notifications.
    pub fn new(storage: S) -> Self {
        Self {
            store: Collections::new(storage),
            geocoder: None,
            router: None,
            notifier: Arc::new(CompositeNotifier::default()),
            gazetteer: Gazetteer::chennai(),
            city_center: GeoPoint {
                lat: 13.0827,
                lon: 80.2707,
            },
            notify_concurrency: 5,
        }
    }

    pub fn from_config(storage: S, config: &AppConfig) -> Result<Self> {
        let mut platform = Self::new(storage)
            .with_city_center(config.platform.city_center)
            .with_notify_concurrency(config.platform.notify_concurrency)
            .with_notifier(Arc::new(CompositeNotifier::from_config(
                config.notifications.email.as_ref(),
                config.notifications.sms.as_ref(),
            )?));

        if config.geocoding.enabled {
            platform = platform.with_geocoder(Arc::new(NominatimGeocoder::new(&config.geocoding)?));
        }
        if config.routing.enabled {
            platform = platform.with_router(Arc::new(OsrmRouter::new(&config.routing)?));
        }
        Ok(platform)
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_router(mut self, router: Arc<dyn Router>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_city_center(mut self, center: GeoPoint) -> Self {
        self.city_center = center;
        self
    }

    pub fn with_notify_concurrency(mut self, limit: usize) -> Self {
        self.notify_concurrency = limit.max(1);
        self
    }

    pub fn store(&self) -> &Collections<S> {
        &self.store
    }
}

/// Fails with `PermissionDenied` unless the actor holds one of `roles`.
pub(crate) fn require(actor: &User, roles: &[Role], action: &str) -> Result<()> {
    if actor.active && actor.has_role(roles) {
        Ok(())
    } else {
        Err(PlatformError::denied(action, actor.role))
    }
}

pub(crate) fn require_admin(actor: &User, action: &str) -> Result<()> {
    require(actor, &[Role::Admin], action)
}

pub(crate) fn same_user(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
