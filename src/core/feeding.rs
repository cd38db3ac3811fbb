use crate::core::platform::{require, require_admin, same_user, Platform};
use crate::core::store::names;
use crate::domain::model::{FeedingSlot, Role, User};
use crate::domain::ports::Storage;
use crate::utils::error::{PlatformError, Result};
use crate::utils::ids::next_id;
use crate::utils::tabular::to_csv;
use crate::utils::validation::validate_non_empty_string;
use chrono::{Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;

/// The day is split into eight two-hour feeding windows.
pub const STANDARD_SLOTS: [(&str, &str); 8] = [
    ("Early Morning", "06:00 - 08:00"),
    ("Morning", "08:00 - 10:00"),
    ("Late Morning", "10:00 - 12:00"),
    ("Afternoon", "12:00 - 14:00"),
    ("Late Afternoon", "14:00 - 16:00"),
    ("Evening", "16:00 - 18:00"),
    ("Night", "18:00 - 20:00"),
    ("Late Night", "20:00 - 22:00"),
];

fn slot_order(label: &str) -> Option<usize> {
    STANDARD_SLOTS
        .iter()
        .position(|(l, _)| l.eq_ignore_ascii_case(label.trim()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Availability {
    Available,
    Partial,
    Full,
}

pub fn availability(slot: &FeedingSlot) -> Availability {
    if slot.booked() == 0 {
        Availability::Available
    } else if slot.is_full() {
        Availability::Full
    } else {
        Availability::Partial
    }
}

/// Monday through Sunday of the week containing `date`.
pub fn week_of(date: NaiveDate) -> [NaiveDate; 7] {
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    std::array::from_fn(|i| monday + Duration::days(i as i64))
}

#[derive(Debug, Clone)]
pub struct NewSlot {
    pub location: String,
    pub date: NaiveDate,
    pub time_label: String,
    pub capacity: u32,
    pub notes: String,
    pub food_qty: String,
}

#[derive(Serialize)]
struct SlotRow<'a> {
    id: &'a str,
    date: NaiveDate,
    time_label: &'a str,
    time: &'a str,
    location: &'a str,
    capacity: u32,
    booked: u32,
    volunteers: String,
    food_qty: &'a str,
    notes: &'a str,
    created_by: &'a str,
}

pub fn export_csv(slots: &[FeedingSlot]) -> Result<String> {
    let rows: Vec<SlotRow> = slots
        .iter()
        .map(|s| SlotRow {
            id: &s.id,
            date: s.date,
            time_label: &s.time_label,
            time: &s.time,
            location: &s.location,
            capacity: s.capacity,
            booked: s.booked(),
            volunteers: s.bookings.join(";"),
            food_qty: &s.food_qty,
            notes: &s.notes,
            created_by: &s.created_by,
        })
        .collect();
    to_csv(&rows)
}

fn find_slot<'a>(slots: &'a mut [FeedingSlot], id: &str) -> Result<&'a mut FeedingSlot> {
    slots
        .iter_mut()
        .find(|s| s.id == id)
        .ok_or_else(|| PlatformError::not_found("feeding slot", id))
}

impl<S: Storage> Platform<S> {
    pub async fn create_slot(&self, actor: &User, new: NewSlot) -> Result<FeedingSlot> {
        require(actor, &[Role::Volunteer, Role::Admin], "create feeding slots")?;
        validate_non_empty_string("location", &new.location)?;
        let order = slot_order(&new.time_label).ok_or_else(|| {
            PlatformError::validation(format!("unknown feeding time '{}'", new.time_label))
        })?;
        if new.capacity == 0 {
            return Err(PlatformError::validation("slot capacity must be at least 1"));
        }
        let (label, time) = STANDARD_SLOTS[order];
        let location = new.location.trim().to_string();

        let slot = FeedingSlot {
            id: next_id("FS"),
            location,
            date: new.date,
            time_label: label.to_string(),
            time: time.to_string(),
            capacity: new.capacity,
            bookings: Vec::new(),
            notes: new.notes,
            food_qty: new.food_qty,
            created_by: actor.email.clone(),
            created_at: Utc::now(),
        };
        let created = slot.clone();
        self.store
            .update(names::FEEDING, move |slots: &mut Vec<FeedingSlot>| {
                let taken = slots.iter().any(|s| {
                    s.date == slot.date
                        && s.time_label == slot.time_label
                        && s.location.eq_ignore_ascii_case(&slot.location)
                });
                if taken {
                    return Err(PlatformError::conflict(format!(
                        "{} already has a {} slot on {}",
                        slot.location, slot.time_label, slot.date
                    )));
                }
                slots.push(slot);
                Ok(())
            })
            .await?;
        self.audit(
            "feeding_slot_created",
            Some(actor),
            json!({ "location": created.location, "date": created.date, "time": created.time_label }),
        )
        .await?;
        Ok(created)
    }

    pub async fn feeding_slots(&self) -> Result<Vec<FeedingSlot>> {
        self.store.load(names::FEEDING).await
    }

    pub async fn book_slot(&self, actor: &User, id: &str) -> Result<FeedingSlot> {
        let slot = self
            .store
            .update(names::FEEDING, |slots: &mut Vec<FeedingSlot>| {
                let slot = find_slot(slots, id)?;
                if slot.bookings.iter().any(|b| same_user(b, &actor.email)) {
                    return Err(PlatformError::conflict(format!(
                        "{} already booked {}",
                        actor.email, slot.id
                    )));
                }
                if slot.is_full() {
                    return Err(PlatformError::conflict(format!("slot {} is full", slot.id)));
                }
                slot.bookings.push(actor.email.clone());
                Ok(slot.clone())
            })
            .await?;
        tracing::info!(
            "{} booked {} {} ({}/{})",
            actor.email,
            slot.location,
            slot.time_label,
            slot.booked(),
            slot.capacity
        );
        Ok(slot)
    }

    pub async fn cancel_booking(&self, actor: &User, id: &str) -> Result<FeedingSlot> {
        self.store
            .update(names::FEEDING, |slots: &mut Vec<FeedingSlot>| {
                let slot = find_slot(slots, id)?;
                let before = slot.bookings.len();
                slot.bookings.retain(|b| !same_user(b, &actor.email));
                if slot.bookings.len() == before {
                    return Err(PlatformError::validation(format!(
                        "{} has no booking on {}",
                        actor.email, slot.id
                    )));
                }
                Ok(slot.clone())
            })
            .await
    }

    pub async fn delete_slot(&self, actor: &User, id: &str) -> Result<FeedingSlot> {
        require_admin(actor, "delete feeding slots")?;
        let removed = self
            .store
            .update(names::FEEDING, |slots: &mut Vec<FeedingSlot>| {
                let pos = slots
                    .iter()
                    .position(|s| s.id == id)
                    .ok_or_else(|| PlatformError::not_found("feeding slot", id))?;
                Ok(slots.remove(pos))
            })
            .await?;
        self.audit("feeding_slot_deleted", Some(actor), json!({ "id": removed.id }))
            .await?;
        Ok(removed)
    }

    /// Slots in the Monday..Sunday week around `date`, by day then time of day.
    pub async fn slots_in_week(&self, date: NaiveDate) -> Result<Vec<FeedingSlot>> {
        let week = week_of(date);
        let mut slots = self.feeding_slots().await?;
        slots.retain(|s| s.date >= week[0] && s.date <= week[6]);
        slots.sort_by_key(|s| (s.date, slot_order(&s.time_label).unwrap_or(usize::MAX)));
        Ok(slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::testing::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_slot(location: &str, day: NaiveDate, label: &str, capacity: u32) -> NewSlot {
        NewSlot {
            location: location.into(),
            date: day,
            time_label: label.into(),
            capacity,
            notes: String::new(),
            food_qty: "10 kg".into(),
        }
    }

    #[test]
    fn test_week_of_starts_on_monday() {
        // 2026-01-01 is a Thursday.
        let week = week_of(date(2026, 1, 1));
        assert_eq!(week[0], date(2025, 12, 29));
        assert_eq!(week[6], date(2026, 1, 4));
        assert_eq!(week_of(date(2025, 12, 29))[0], date(2025, 12, 29));
    }

    #[tokio::test]
    async fn test_create_slot_rules() {
        let platform = platform();
        let day = date(2026, 2, 3);
        assert!(platform
            .create_slot(&citizen(), new_slot("Besant Nagar", day, "Morning", 3))
            .await
            .is_err());
        assert!(platform
            .create_slot(&volunteer(), new_slot("Besant Nagar", day, "Brunch", 3))
            .await
            .is_err());
        assert!(platform
            .create_slot(&volunteer(), new_slot("Besant Nagar", day, "Morning", 0))
            .await
            .is_err());

        let slot = platform
            .create_slot(&volunteer(), new_slot("Besant Nagar", day, "late morning", 3))
            .await
            .unwrap();
        assert_eq!(slot.time_label, "Late Morning");
        assert_eq!(slot.time, "10:00 - 12:00");

        let dup = platform
            .create_slot(&admin(), new_slot("besant nagar", day, "Late Morning", 2))
            .await;
        assert!(matches!(dup, Err(PlatformError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_booking_respects_capacity() {
        let platform = platform();
        let slot = platform
            .create_slot(&admin(), new_slot("Adyar Park", date(2026, 2, 3), "Evening", 2))
            .await
            .unwrap();
        assert_eq!(availability(&slot), Availability::Available);

        let booked = platform.book_slot(&volunteer(), &slot.id).await.unwrap();
        assert_eq!(availability(&booked), Availability::Partial);
        assert!(platform.book_slot(&volunteer(), &slot.id).await.is_err());

        let full = platform.book_slot(&vet(), &slot.id).await.unwrap();
        assert_eq!(availability(&full), Availability::Full);
        assert!(platform.book_slot(&citizen(), &slot.id).await.is_err());

        let freed = platform.cancel_booking(&vet(), &slot.id).await.unwrap();
        assert_eq!(freed.booked(), 1);
        assert!(platform.cancel_booking(&vet(), &slot.id).await.is_err());
    }

    #[tokio::test]
    async fn test_week_listing_and_export() {
        let platform = platform();
        let monday = date(2026, 2, 2);
        for (day, label) in [
            (monday + Duration::days(2), "Morning"),
            (monday, "Night"),
            (monday, "Early Morning"),
            (monday + Duration::days(7), "Morning"),
        ] {
            platform
                .create_slot(&admin(), new_slot("Guindy", day, label, 2))
                .await
                .unwrap();
        }

        let week = platform.slots_in_week(monday + Duration::days(3)).await.unwrap();
        let labels: Vec<&str> = week.iter().map(|s| s.time_label.as_str()).collect();
        assert_eq!(labels, vec!["Early Morning", "Night", "Morning"]);

        platform.book_slot(&volunteer(), &week[0].id).await.unwrap();
        let week = platform.slots_in_week(monday).await.unwrap();
        let csv = export_csv(&week).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,date,time_label,time,location,capacity,booked,volunteers,food_qty,notes,created_by"
        );
        assert!(lines.next().unwrap().contains(",2026-02-02,Early Morning,06:00 - 08:00,Guindy,2,1,vol@straysafe.org,"));
        assert_eq!(csv.lines().count(), 4);

        assert!(platform.delete_slot(&volunteer(), &week[0].id).await.is_err());
        platform.delete_slot(&admin(), &week[0].id).await.unwrap();
        assert_eq!(platform.feeding_slots().await.unwrap().len(), 3);
    }
}
