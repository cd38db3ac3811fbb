use crate::core::geo::haversine_km;
use crate::core::hotspots::NewHotspot;
use crate::core::notifications::BROADCAST;
use crate::core::platform::{require, require_admin, same_user, Platform};
use crate::core::store::names;
use crate::domain::model::{
    Attachment, EmergencyType, GeoPoint, HotspotCategory, NotificationKind, Priority, Role,
    SosAlert, SosSeverity, SosStatus, Task, TaskCategory, TaskPriority, TaskStatus, User,
};
use crate::domain::ports::{Delivery, Notifier, Storage};
use crate::utils::error::{PlatformError, Result};
use crate::utils::ids::next_id;
use crate::utils::validation::validate_range;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

const SMS_PLACE_LIMIT: usize = 50;

#[derive(Debug, Clone)]
pub struct NewSos {
    pub severity: SosSeverity,
    pub kind: EmergencyType,
    pub coords: Option<GeoPoint>,
    pub place: Option<String>,
    pub description: String,
    pub contact: Option<String>,
    pub estimated_dogs: u32,
    pub attachment: Option<Attachment>,
}

impl NewSos {
    pub fn new(severity: SosSeverity, kind: EmergencyType) -> Self {
        Self {
            severity,
            kind,
            coords: None,
            place: None,
            description: String::new(),
            contact: None,
            estimated_dogs: 1,
            attachment: None,
        }
    }
}

/// Outcome of the email/SMS fan-out for one alert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertReport {
    pub emails_sent: usize,
    pub sms_sent: usize,
    /// Deliveries not attempted because the channel is unconfigured.
    pub skipped: usize,
    pub failures: Vec<String>,
}

impl AlertReport {
    fn record(&mut self, channel: &str, recipient: &str, outcome: Result<Delivery>) {
        match outcome {
            Ok(Delivery::Sent) if channel == "email" => self.emails_sent += 1,
            Ok(Delivery::Sent) => self.sms_sent += 1,
            Ok(Delivery::Skipped) => self.skipped += 1,
            Err(e) => {
                tracing::warn!("{} alert to {} failed: {}", channel, recipient, e);
                self.failures.push(format!("{} to {}: {}", channel, recipient, e));
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SosReceipt {
    pub sos: SosAlert,
    pub task_id: String,
    pub alert: AlertReport,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SosSort {
    #[default]
    Newest,
    Oldest,
    Severity,
}

#[derive(Debug, Clone, Default)]
pub struct SosFilter {
    /// Empty means any status.
    pub statuses: Vec<SosStatus>,
    pub severities: Vec<SosSeverity>,
    pub sort: SosSort,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SosOverview {
    pub total: usize,
    pub active: usize,
    pub dispatched: usize,
    pub resolved: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NearbyResponder {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub distance_km: f64,
}

fn alert_html(sos: &SosAlert) -> String {
    let coords = sos
        .coords
        .map(|c| format!("<p><strong>Coordinates:</strong> {} (<a href=\"geo:{},{}\">open in maps</a>)</p>", c, c.lat, c.lon))
        .unwrap_or_default();
    let contact = sos
        .contact
        .as_ref()
        .map(|c| format!("<p><strong>Contact:</strong> {}</p>", c))
        .unwrap_or_default();
    let description = if sos.description.is_empty() {
        "No description provided"
    } else {
        sos.description.as_str()
    };
    format!(
        "<h2>NEW EMERGENCY ALERT</h2>\
         <p><strong>SOS ID:</strong> {id}</p>\
         <p><strong>Type:</strong> {kind}</p>\
         <p><strong>Severity:</strong> {severity}</p>\
         <p><strong>Location:</strong> {place}</p>{coords}\
         <p><strong>Description:</strong> {description}</p>\
         <p><strong>Estimated dogs:</strong> {dogs}</p>{contact}\
         <p><strong>Reported by:</strong> {reporter} ({role})</p>\
         <p><strong>Time:</strong> {time}</p>\
         <p>Log in to accept this emergency.</p>",
        id = sos.id,
        kind = sos.kind,
        severity = sos.severity,
        place = sos.display_address(),
        coords = coords,
        description = description,
        dogs = sos.estimated_dogs,
        contact = contact,
        reporter = sos.created_by,
        role = sos.reporter_role,
        time = sos.time.format("%Y-%m-%d %H:%M:%S"),
    )
}

fn alert_sms(sos: &SosAlert) -> String {
    let address = sos.display_address();
    let place = if address.chars().count() < SMS_PLACE_LIMIT {
        address
    } else {
        "Emergency Location"
    };
    let coords = sos
        .coords
        .map(|c| format!("\nCoords: {},{}", c.lat, c.lon))
        .unwrap_or_default();
    format!(
        "URGENT SOS {}\n{} - {}\n{}{}\nLog in to accept!",
        sos.id, sos.kind, sos.severity, place, coords
    )
}

/// Responders with coordinates first, nearest first; the rest keep their order.
fn order_by_distance(responders: &mut [User], origin: GeoPoint) {
    responders.sort_by(|a, b| match (a.coords, b.coords) {
        (Some(pa), Some(pb)) => haversine_km(origin, pa).total_cmp(&haversine_km(origin, pb)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

/// Sends email and SMS to every recipient over the channels they opted into,
/// at most `limit` recipients at once.
pub async fn fan_out(
    notifier: Arc<dyn Notifier>,
    recipients: Vec<User>,
    subject: String,
    html: String,
    sms: String,
    limit: usize,
) -> AlertReport {
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let subject = Arc::new(subject);
    let html = Arc::new(html);
    let sms = Arc::new(sms);
    let mut set = JoinSet::new();

    for user in recipients {
        let notifier = Arc::clone(&notifier);
        let semaphore = Arc::clone(&semaphore);
        let (subject, html, sms) = (Arc::clone(&subject), Arc::clone(&html), Arc::clone(&sms));
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let email = if user.preferences.email {
                Some(notifier.send_email(&user.email, &subject, &html).await)
            } else {
                None
            };
            let phone = user
                .phone
                .as_deref()
                .filter(|p| user.preferences.sms && !p.trim().is_empty());
            let text = match phone {
                Some(phone) => Some((phone.to_string(), notifier.send_sms(phone, &sms).await)),
                None => None,
            };
            (user.email, email, text)
        });
    }

    let mut report = AlertReport::default();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((email_to, email, text)) => {
                if let Some(outcome) = email {
                    report.record("email", &email_to, outcome);
                }
                if let Some((phone, outcome)) = text {
                    report.record("sms", &phone, outcome);
                }
            }
            Err(e) => report.failures.push(format!("alert task failed: {}", e)),
        }
    }
    report
}

fn find_sos<'a>(alerts: &'a mut [SosAlert], id: &str) -> Result<&'a mut SosAlert> {
    alerts
        .iter_mut()
        .find(|s| s.id == id)
        .ok_or_else(|| PlatformError::not_found("SOS alert", id))
}

fn expect_status(sos: &SosAlert, expected: SosStatus, target: SosStatus) -> Result<()> {
    if sos.status == expected {
        Ok(())
    } else {
        Err(PlatformError::transition("SOS alert", sos.status, target))
    }
}

impl<S: Storage> Platform<S> {
    pub async fn create_sos(&self, actor: &User, new: NewSos) -> Result<SosReceipt> {
        validate_range("estimated_dogs", new.estimated_dogs, 1, 20)?;
        let place = new.place.map(|p| p.trim().to_string()).filter(|p| !p.is_empty());

        let (coords, place) = match (new.coords, place) {
            (Some(coords), Some(place)) => {
                coords.check()?;
                (coords, place)
            }
            (Some(coords), None) => {
                coords.check()?;
                (coords, self.describe_point(coords).await)
            }
            (None, Some(place)) => (self.resolve_place(&place).await, place),
            (None, None) => {
                return Err(PlatformError::validation(
                    "an SOS needs coordinates or a place",
                ))
            }
        };

        let sos = SosAlert {
            id: next_id("SOS"),
            risk: new.severity.risk(),
            status: SosStatus::Active,
            time: Utc::now(),
            place: place.clone(),
            full_address: None,
            severity: new.severity,
            kind: new.kind,
            description: new.description.trim().to_string(),
            contact: new.contact.filter(|c| !c.trim().is_empty()),
            created_by: actor.email.clone(),
            reporter_role: actor.role,
            coords: Some(coords),
            attachment: new.attachment,
            assigned: None,
            estimated_dogs: new.estimated_dogs,
            resolved_at: None,
            resolved_by: None,
        };
        self.store.append(names::SOS, sos.clone()).await?;
        tracing::info!("SOS {} created by {} ({}, {})", sos.id, actor.email, sos.kind, sos.severity);

        let task = Task {
            id: format!("TASK-{}", sos.id),
            sos_id: Some(sos.id.clone()),
            title: format!("{} response", sos.kind),
            place: sos.display_address().to_string(),
            priority: TaskPriority::from(sos.severity),
            category: TaskCategory::Rescue,
            description: sos.description.clone(),
            volunteer: None,
            status: TaskStatus::Pending,
            notes: Vec::new(),
            created_at: sos.time,
            completed_at: None,
            due: None,
            submission: None,
        };
        let task_id = task.id.clone();
        self.store.append(names::TASKS, task).await?;

        let hotspot = NewHotspot::new(
            coords,
            HotspotCategory::Emergency,
            format!("SOS: {}", sos.kind),
            sos.risk,
        )
        .place(place.clone());
        self.add_hotspot(actor, hotspot).await?;

        self.notify(
            NotificationKind::Emergency,
            format!("NEW SOS: {} ({}) @ {}", sos.id, sos.severity, sos.display_address()),
            Priority::High,
            BROADCAST,
        )
        .await?;
        self.audit(
            "sos_created",
            Some(actor),
            json!({ "id": sos.id, "severity": sos.severity, "type": sos.kind }),
        )
        .await?;

        let alert = self.alert_responders(&sos).await?;
        for failure in &alert.failures {
            self.store
                .queue_offline("alert_delivery", json!({ "sos": sos.id, "error": failure }))
                .await?;
        }
        tracing::info!(
            "SOS {} alerts: {} emails, {} sms, {} skipped, {} failed",
            sos.id,
            alert.emails_sent,
            alert.sms_sent,
            alert.skipped,
            alert.failures.len()
        );

        Ok(SosReceipt { sos, task_id, alert })
    }

    async fn alert_responders(&self, sos: &SosAlert) -> Result<AlertReport> {
        let mut recipients: Vec<User> = self
            .responders()
            .await?
            .into_iter()
            .filter(|u| !same_user(&u.email, &sos.created_by))
            .collect();
        if let Some(origin) = sos.coords {
            order_by_distance(&mut recipients, origin);
        }
        if recipients.is_empty() {
            tracing::warn!("No responders to alert for {}", sos.id);
            return Ok(AlertReport::default());
        }

        Ok(fan_out(
            Arc::clone(&self.notifier),
            recipients,
            format!("EMERGENCY: {}", sos.id),
            alert_html(sos),
            alert_sms(sos),
            self.notify_concurrency,
        )
        .await)
    }

    /// One-tap alert with no location; only an in-app notification goes out.
    pub async fn quick_sos(&self, actor: &User) -> Result<SosAlert> {
        let sos = SosAlert {
            id: next_id("SOS"),
            risk: SosSeverity::Critical.risk(),
            status: SosStatus::Active,
            time: Utc::now(),
            place: "Quick SOS".to_string(),
            full_address: None,
            severity: SosSeverity::Critical,
            kind: EmergencyType::Other,
            description: String::new(),
            contact: actor.phone.clone(),
            created_by: actor.email.clone(),
            reporter_role: actor.role,
            coords: None,
            attachment: None,
            assigned: None,
            estimated_dogs: 1,
            resolved_at: None,
            resolved_by: None,
        };
        self.store.append(names::SOS, sos.clone()).await?;
        self.notify(
            NotificationKind::Emergency,
            format!("Quick SOS: {}", sos.id),
            Priority::High,
            BROADCAST,
        )
        .await?;
        tracing::info!("Quick SOS {} raised by {}", sos.id, actor.email);
        Ok(sos)
    }

    /// Admin or vet hands an active alert to a responder.
    pub async fn assign_sos(&self, actor: &User, id: &str, assignee: &str) -> Result<SosAlert> {
        require(actor, &[Role::Admin, Role::Vet], "assign SOS alerts")?;
        let responder = self
            .find_user(assignee)
            .await?
            .filter(User::is_responder)
            .ok_or_else(|| PlatformError::validation(format!("{} is not an active responder", assignee)))?;

        let sos = self
            .store
            .update(names::SOS, |alerts: &mut Vec<SosAlert>| {
                let sos = find_sos(alerts, id)?;
                expect_status(sos, SosStatus::Active, SosStatus::Dispatched)?;
                sos.assigned = Some(responder.email.clone());
                sos.status = SosStatus::Dispatched;
                Ok(sos.clone())
            })
            .await?;

        let volunteer = responder.email.clone();
        let sos_for_task = sos.clone();
        self.store
            .update(names::TASKS, move |tasks: &mut Vec<Task>| {
                match tasks
                    .iter_mut()
                    .find(|t| t.sos_id.as_deref() == Some(sos_for_task.id.as_str()))
                {
                    Some(task) => {
                        task.volunteer = Some(volunteer);
                        if task.status == TaskStatus::Pending {
                            task.status = TaskStatus::Assigned;
                        }
                    }
                    None => tasks.push(Task {
                        id: format!("TASK-{}", sos_for_task.id),
                        sos_id: Some(sos_for_task.id.clone()),
                        title: format!("{} response", sos_for_task.kind),
                        place: sos_for_task.display_address().to_string(),
                        priority: TaskPriority::from(sos_for_task.severity),
                        category: TaskCategory::Rescue,
                        description: sos_for_task.description.clone(),
                        volunteer: Some(volunteer),
                        status: TaskStatus::Assigned,
                        notes: Vec::new(),
                        created_at: Utc::now(),
                        completed_at: None,
                        due: None,
                        submission: None,
                    }),
                }
                Ok(())
            })
            .await?;

        self.notify(
            NotificationKind::Info,
            format!("SOS {} assigned to {}", sos.id, responder.name),
            Priority::Normal,
            &responder.email,
        )
        .await?;
        self.audit("sos_assigned", Some(actor), json!({ "id": sos.id, "assignee": responder.email }))
            .await?;
        Ok(sos)
    }

    /// A responder takes an active alert themselves.
    pub async fn accept_sos(&self, actor: &User, id: &str) -> Result<SosAlert> {
        if !actor.is_responder() {
            return Err(PlatformError::denied("accept SOS alerts", actor.role));
        }
        let sos = self
            .store
            .update(names::SOS, |alerts: &mut Vec<SosAlert>| {
                let sos = find_sos(alerts, id)?;
                expect_status(sos, SosStatus::Active, SosStatus::Dispatched)?;
                sos.assigned = Some(actor.email.clone());
                sos.status = SosStatus::Dispatched;
                Ok(sos.clone())
            })
            .await?;

        self.store
            .update(names::TASKS, |tasks: &mut Vec<Task>| {
                for task in tasks
                    .iter_mut()
                    .filter(|t| t.sos_id.as_deref() == Some(id) && t.status == TaskStatus::Pending)
                {
                    task.volunteer = Some(actor.email.clone());
                    task.status = TaskStatus::Assigned;
                }
                Ok(())
            })
            .await?;

        self.audit("sos_accepted", Some(actor), json!({ "id": sos.id })).await?;
        Ok(sos)
    }

    /// Admin, or the assigned responder, resolves a dispatched alert and
    /// completes its tasks.
    pub async fn resolve_sos(&self, actor: &User, id: &str) -> Result<SosAlert> {
        let now = Utc::now();
        let sos = self
            .store
            .update(names::SOS, |alerts: &mut Vec<SosAlert>| {
                let sos = find_sos(alerts, id)?;
                let is_assignee = actor.is_responder()
                    && sos.assigned.as_deref().is_some_and(|a| same_user(a, &actor.email));
                if !(actor.role == Role::Admin && actor.active) && !is_assignee {
                    return Err(PlatformError::denied("resolve this SOS alert", actor.role));
                }
                expect_status(sos, SosStatus::Dispatched, SosStatus::Resolved)?;
                sos.status = SosStatus::Resolved;
                sos.resolved_at = Some(now);
                sos.resolved_by = Some(actor.email.clone());
                Ok(sos.clone())
            })
            .await?;

        self.store
            .update(names::TASKS, |tasks: &mut Vec<Task>| {
                for task in tasks
                    .iter_mut()
                    .filter(|t| t.sos_id.as_deref() == Some(id) && t.status != TaskStatus::Completed)
                {
                    task.status = TaskStatus::Completed;
                    task.completed_at = Some(now);
                }
                Ok(())
            })
            .await?;

        self.notify(
            NotificationKind::Success,
            format!("SOS {} resolved", sos.id),
            Priority::Normal,
            BROADCAST,
        )
        .await?;
        self.audit("sos_resolved", Some(actor), json!({ "id": sos.id })).await?;
        tracing::info!("SOS {} resolved by {}", sos.id, actor.email);
        Ok(sos)
    }

    pub async fn close_sos(&self, actor: &User, id: &str) -> Result<SosAlert> {
        require_admin(actor, "close SOS alerts")?;
        let sos = self
            .store
            .update(names::SOS, |alerts: &mut Vec<SosAlert>| {
                let sos = find_sos(alerts, id)?;
                expect_status(sos, SosStatus::Resolved, SosStatus::Closed)?;
                sos.status = SosStatus::Closed;
                Ok(sos.clone())
            })
            .await?;
        self.audit("sos_closed", Some(actor), json!({ "id": sos.id })).await?;
        Ok(sos)
    }

    pub async fn get_sos(&self, id: &str) -> Result<SosAlert> {
        let alerts: Vec<SosAlert> = self.store.load(names::SOS).await?;
        alerts
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| PlatformError::not_found("SOS alert", id))
    }

    pub async fn list_sos(&self, filter: &SosFilter) -> Result<Vec<SosAlert>> {
        let mut alerts: Vec<SosAlert> = self.store.load(names::SOS).await?;
        alerts.retain(|s| {
            (filter.statuses.is_empty() || filter.statuses.contains(&s.status))
                && (filter.severities.is_empty() || filter.severities.contains(&s.severity))
        });
        match filter.sort {
            SosSort::Newest => alerts.sort_by(|a, b| b.time.cmp(&a.time)),
            SosSort::Oldest => alerts.sort_by(|a, b| a.time.cmp(&b.time)),
            SosSort::Severity => alerts.sort_by(|a, b| {
                a.severity
                    .rank()
                    .cmp(&b.severity.rank())
                    .then_with(|| b.time.cmp(&a.time))
            }),
        }
        Ok(alerts)
    }

    pub async fn sos_overview(&self) -> Result<SosOverview> {
        let alerts: Vec<SosAlert> = self.store.load(names::SOS).await?;
        let count = |status| alerts.iter().filter(|s| s.status == status).count();
        Ok(SosOverview {
            total: alerts.len(),
            active: count(SosStatus::Active),
            dispatched: count(SosStatus::Dispatched),
            resolved: count(SosStatus::Resolved),
        })
    }

    /// Responders with a known position, nearest first.
    pub async fn nearest_responders(&self, point: GeoPoint, n: usize) -> Result<Vec<NearbyResponder>> {
        point.check()?;
        let mut nearby: Vec<NearbyResponder> = self
            .responders()
            .await?
            .into_iter()
            .filter_map(|u| {
                let coords = u.coords?;
                Some(NearbyResponder {
                    distance_km: haversine_km(point, coords),
                    email: u.email,
                    name: u.name,
                    role: u.role,
                })
            })
            .collect();
        nearby.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
        nearby.truncate(n);
        Ok(nearby)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryStorage;
    use crate::core::auth::Registration;
    use crate::core::platform::testing::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        emails: Mutex<Vec<String>>,
        sms: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_email(&self, to: &str, _subject: &str, _html: &str) -> Result<Delivery> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail_for.as_deref() == Some(to) {
                return Err(PlatformError::ServiceError {
                    service: "sendgrid".into(),
                    message: "status 500".into(),
                });
            }
            self.emails.lock().unwrap().push(to.to_string());
            Ok(Delivery::Sent)
        }

        async fn send_sms(&self, to: &str, body: &str) -> Result<Delivery> {
            self.sms.lock().unwrap().push(format!("{}|{}", to, body));
            Ok(Delivery::Sent)
        }
    }

    async fn seed_responders(platform: &Platform<MemoryStorage>, count: usize) {
        for i in 0..count {
            platform
                .register(Registration {
                    email: format!("vol{}@straysafe.org", i),
                    name: format!("Volunteer {}", i),
                    password: "paws123".into(),
                    role: Role::Volunteer,
                    phone: (i % 2 == 0).then(|| format!("+9198400000{:02}", i)),
                })
                .await
                .unwrap();
        }
    }

    fn adyar_sos() -> NewSos {
        let mut new = NewSos::new(SosSeverity::High, EmergencyType::InjuredDog);
        new.coords = Some(GeoPoint { lat: 13.0067, lon: 80.2571 });
        new.place = Some("Adyar Bridge".into());
        new.description = "Dog hit by a bike".into();
        new
    }

    #[tokio::test]
    async fn test_create_sos_builds_task_hotspot_and_alerts() {
        let notifier = Arc::new(RecordingNotifier::default());
        let platform = platform().with_notifier(notifier.clone());
        seed_responders(&platform, 4).await;

        let receipt = platform.create_sos(&citizen(), adyar_sos()).await.unwrap();
        assert_eq!(receipt.sos.status, SosStatus::Active);
        assert_eq!(receipt.sos.risk, 75);
        assert_eq!(receipt.task_id, format!("TASK-{}", receipt.sos.id));
        assert_eq!(receipt.alert.emails_sent, 4);
        assert_eq!(receipt.alert.sms_sent, 2);
        assert!(receipt.alert.failures.is_empty());

        let sms = notifier.sms.lock().unwrap().clone();
        assert!(sms[0].contains("Adyar Bridge"));

        let tasks = platform.open_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::Pending);

        let hotspots = platform.hotspots().await.unwrap();
        assert_eq!(hotspots[0].category, HotspotCategory::Emergency);
        assert_eq!(hotspots[0].intensity, 0.75);
        assert_eq!(hotspots[0].label, "SOS: Injured Dog");
        assert_eq!(platform.unread_notifications("anyone@mail.com").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_alert_fan_out_is_bounded_and_skips_reporter() {
        let notifier = Arc::new(RecordingNotifier {
            fail_for: Some("vol3@straysafe.org".into()),
            ..Default::default()
        });
        let platform = platform()
            .with_notifier(notifier.clone())
            .with_notify_concurrency(2);
        seed_responders(&platform, 8).await;

        let reporter = platform.find_user("vol0@straysafe.org").await.unwrap().unwrap();
        let receipt = platform.create_sos(&reporter, adyar_sos()).await.unwrap();

        assert_eq!(receipt.alert.emails_sent, 6);
        assert_eq!(receipt.alert.failures.len(), 1);
        let queued = platform.store().drain_pending().await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].op, "alert_delivery");
        assert_eq!(queued[0].data["sos"], receipt.sos.id.as_str());
        assert!(notifier.peak.load(Ordering::SeqCst) <= 2);
        assert!(!notifier.emails.lock().unwrap().contains(&"vol0@straysafe.org".to_string()));
    }

    #[tokio::test]
    async fn test_alerts_follow_channel_preferences() {
        let notifier = Arc::new(RecordingNotifier::default());
        let platform = platform().with_notifier(notifier.clone());
        seed_responders(&platform, 4).await;

        let no_sms = platform.find_user("vol0@straysafe.org").await.unwrap().unwrap();
        platform
            .set_notification_prefs(&no_sms, crate::domain::model::NotificationPrefs { email: true, sms: false })
            .await
            .unwrap();
        let no_email = platform.find_user("vol1@straysafe.org").await.unwrap().unwrap();
        platform
            .set_notification_prefs(&no_email, crate::domain::model::NotificationPrefs { email: false, sms: true })
            .await
            .unwrap();

        let receipt = platform.create_sos(&citizen(), adyar_sos()).await.unwrap();
        assert_eq!(receipt.alert.emails_sent, 3);
        assert_eq!(receipt.alert.sms_sent, 1);
        assert!(!notifier.emails.lock().unwrap().contains(&"vol1@straysafe.org".to_string()));
        let texts = notifier.sms.lock().unwrap().clone();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("+919840000002|"));
    }

    #[tokio::test]
    async fn test_long_addresses_are_shortened_in_sms() {
        let mut sos = adyar_sos();
        sos.place = Some("Plot 12, 3rd Cross Street, Kasturba Nagar, Adyar, Chennai 600020".into());
        let platform = platform();
        let receipt = platform.create_sos(&citizen(), sos).await.unwrap();
        assert!(alert_sms(&receipt.sos).contains("Emergency Location"));
    }

    #[tokio::test]
    async fn test_create_sos_requires_location_and_dog_count() {
        let platform = platform();
        let bare = NewSos::new(SosSeverity::Medium, EmergencyType::Other);
        assert!(platform.create_sos(&citizen(), bare).await.is_err());

        let mut too_many = adyar_sos();
        too_many.estimated_dogs = 21;
        assert!(platform.create_sos(&citizen(), too_many).await.is_err());

        let mut by_place = NewSos::new(SosSeverity::Medium, EmergencyType::Other);
        by_place.place = Some("Velachery".into());
        let receipt = platform.create_sos(&citizen(), by_place).await.unwrap();
        assert_eq!(receipt.sos.coords.unwrap().lat, 12.9750);

        let mut by_coords = NewSos::new(SosSeverity::Medium, EmergencyType::Other);
        by_coords.coords = Some(GeoPoint { lat: 13.0, lon: 80.0 });
        let receipt = platform.create_sos(&citizen(), by_coords).await.unwrap();
        assert_eq!(receipt.sos.place, "13.00000, 80.00000");
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let platform = platform();
        seed_responders(&platform, 1).await;
        let sos = platform.create_sos(&citizen(), adyar_sos()).await.unwrap().sos;

        assert!(matches!(
            platform.resolve_sos(&admin(), &sos.id).await,
            Err(PlatformError::InvalidTransition { .. })
        ));
        assert!(matches!(
            platform.assign_sos(&volunteer(), &sos.id, "vol0@straysafe.org").await,
            Err(PlatformError::PermissionDenied { .. })
        ));

        let assigned = platform
            .assign_sos(&vet(), &sos.id, "vol0@straysafe.org")
            .await
            .unwrap();
        assert_eq!(assigned.status, SosStatus::Dispatched);
        assert_eq!(assigned.assigned.as_deref(), Some("vol0@straysafe.org"));

        let vol0 = platform.find_user("vol0@straysafe.org").await.unwrap().unwrap();
        let task = &platform.my_tasks(&vol0).await.unwrap()[0];
        assert_eq!(task.status, TaskStatus::Assigned);

        assert!(platform.resolve_sos(&volunteer(), &sos.id).await.is_err());
        assert!(platform.close_sos(&admin(), &sos.id).await.is_err());

        let resolved = platform.resolve_sos(&vol0, &sos.id).await.unwrap();
        assert_eq!(resolved.status, SosStatus::Resolved);
        assert_eq!(resolved.resolved_by.as_deref(), Some("vol0@straysafe.org"));
        assert!(platform.open_tasks().await.unwrap().is_empty());

        assert!(platform.close_sos(&vet(), &sos.id).await.is_err());
        let closed = platform.close_sos(&admin(), &sos.id).await.unwrap();
        assert_eq!(closed.status, SosStatus::Closed);
        assert!(platform.accept_sos(&vet(), &sos.id).await.is_err());
    }

    #[tokio::test]
    async fn test_accept_sets_actor_as_assignee() {
        let platform = platform();
        let sos = platform.create_sos(&citizen(), adyar_sos()).await.unwrap().sos;
        assert!(platform.accept_sos(&citizen(), &sos.id).await.is_err());

        let accepted = platform.accept_sos(&vet(), &sos.id).await.unwrap();
        assert_eq!(accepted.assigned.as_deref(), Some("vet@clinic.in"));
        assert!(platform.accept_sos(&volunteer(), &sos.id).await.is_err());
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let platform = platform();
        for severity in [SosSeverity::Medium, SosSeverity::Critical, SosSeverity::High] {
            let mut new = adyar_sos();
            new.severity = severity;
            platform.create_sos(&citizen(), new).await.unwrap();
        }
        platform.quick_sos(&citizen()).await.unwrap();

        let by_severity = platform
            .list_sos(&SosFilter {
                sort: SosSort::Severity,
                ..Default::default()
            })
            .await
            .unwrap();
        let order: Vec<SosSeverity> = by_severity.iter().map(|s| s.severity).collect();
        assert_eq!(
            order,
            vec![SosSeverity::Critical, SosSeverity::Critical, SosSeverity::High, SosSeverity::Medium]
        );

        let only_high = platform
            .list_sos(&SosFilter {
                severities: vec![SosSeverity::High],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(only_high.len(), 1);

        let overview = platform.sos_overview().await.unwrap();
        assert_eq!(overview.total, 4);
        assert_eq!(overview.active, 4);
    }

    #[tokio::test]
    async fn test_nearest_responders() {
        let platform = platform();
        seed_responders(&platform, 3).await;
        let far = platform.find_user("vol0@straysafe.org").await.unwrap().unwrap();
        let near = platform.find_user("vol1@straysafe.org").await.unwrap().unwrap();
        platform.set_location(&far, GeoPoint { lat: 12.92, lon: 80.12 }).await.unwrap();
        platform.set_location(&near, GeoPoint { lat: 13.0, lon: 80.25 }).await.unwrap();

        let ranked = platform
            .nearest_responders(GeoPoint { lat: 13.0067, lon: 80.2571 }, 5)
            .await
            .unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].email, "vol1@straysafe.org");
    }
}
