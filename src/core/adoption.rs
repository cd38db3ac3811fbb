use crate::core::notifications::BROADCAST;
use crate::core::platform::{require_admin, same_user, Platform};
use crate::core::store::names;
use crate::domain::model::{
    AdoptionApplication, AdoptionDog, ApplicationStatus, Attachment, DogStatus, NotificationKind,
    Priority, Role, User,
};
use crate::domain::ports::Storage;
use crate::utils::error::{PlatformError, Result};
use crate::utils::ids::next_id;
use crate::utils::validation::{validate_non_empty_string, validate_phone};
use chrono::Utc;
use serde_json::json;

#[derive(Debug, Clone, Default)]
pub struct NewDog {
    pub name: String,
    pub breed: String,
    pub age: String,
    pub gender: String,
    pub description: String,
    pub vaccinated: bool,
    pub sterilized: bool,
    pub photo: Option<Attachment>,
}

#[derive(Debug, Clone, Default)]
pub struct ApplicationForm {
    pub applicant: String,
    pub phone: String,
    pub address: String,
    pub housing_type: String,
    pub has_yard: bool,
    pub other_pets: bool,
    pub experience: String,
    pub reason: String,
    pub household_members: u32,
}

fn find_dog<'a>(dogs: &'a mut [AdoptionDog], id: &str) -> Result<&'a mut AdoptionDog> {
    dogs.iter_mut()
        .find(|d| d.id == id)
        .ok_or_else(|| PlatformError::not_found("dog", id))
}

impl<S: Storage> Platform<S> {
    /// Admin listings go live at once; everyone else waits for review.
    pub async fn submit_dog(&self, actor: &User, new: NewDog) -> Result<AdoptionDog> {
        validate_non_empty_string("name", &new.name)?;
        validate_non_empty_string("age", &new.age)?;
        validate_non_empty_string("gender", &new.gender)?;

        let status = if actor.role == Role::Admin {
            DogStatus::Available
        } else {
            DogStatus::PendingApproval
        };
        let dog = AdoptionDog {
            id: next_id("DOG"),
            name: new.name.trim().to_string(),
            breed: new.breed.trim().to_string(),
            age: new.age.trim().to_string(),
            gender: new.gender.trim().to_string(),
            description: new.description,
            vaccinated: new.vaccinated,
            sterilized: new.sterilized,
            photo: new.photo,
            status,
            added_by: actor.email.clone(),
            added_at: Utc::now(),
            adopted_by: None,
            adopted_at: None,
        };
        self.store.append(names::ADOPTION_DOGS, dog.clone()).await?;
        if status == DogStatus::PendingApproval {
            self.notify(
                NotificationKind::Info,
                format!("New dog listing awaiting approval: {}", dog.name),
                Priority::Normal,
                BROADCAST,
            )
            .await?;
        }
        self.audit("dog_submitted", Some(actor), json!({ "id": dog.id, "status": dog.status }))
            .await?;
        Ok(dog)
    }

    pub async fn review_dog(&self, actor: &User, id: &str, approve: bool) -> Result<AdoptionDog> {
        require_admin(actor, "review dog listings")?;
        let to = if approve {
            DogStatus::Available
        } else {
            DogStatus::Rejected
        };
        let dog = self
            .store
            .update(names::ADOPTION_DOGS, |dogs: &mut Vec<AdoptionDog>| {
                let dog = find_dog(dogs, id)?;
                if dog.status != DogStatus::PendingApproval {
                    return Err(PlatformError::transition("dog", dog.status, to));
                }
                dog.status = to;
                Ok(dog.clone())
            })
            .await?;
        self.audit("dog_reviewed", Some(actor), json!({ "id": dog.id, "status": dog.status }))
            .await?;
        Ok(dog)
    }

    pub async fn adoption_dogs(&self) -> Result<Vec<AdoptionDog>> {
        self.store.load(names::ADOPTION_DOGS).await
    }

    pub async fn available_dogs(&self) -> Result<Vec<AdoptionDog>> {
        let mut dogs = self.adoption_dogs().await?;
        dogs.retain(|d| d.status == DogStatus::Available);
        Ok(dogs)
    }

    pub async fn apply(&self, actor: &User, dog_id: &str, form: ApplicationForm) -> Result<AdoptionApplication> {
        validate_non_empty_string("applicant", &form.applicant)?;
        validate_non_empty_string("address", &form.address)?;
        validate_phone("phone", &form.phone)?;

        let dog = self
            .adoption_dogs()
            .await?
            .into_iter()
            .find(|d| d.id == dog_id)
            .ok_or_else(|| PlatformError::not_found("dog", dog_id))?;
        if dog.status != DogStatus::Available {
            return Err(PlatformError::validation(format!(
                "{} is {} and cannot be adopted",
                dog.name, dog.status
            )));
        }

        let application = AdoptionApplication {
            id: next_id("APP"),
            dog_id: dog.id.clone(),
            dog_name: dog.name.clone(),
            applicant: form.applicant.trim().to_string(),
            applicant_email: actor.email.clone(),
            phone: form.phone.trim().to_string(),
            address: form.address.trim().to_string(),
            housing_type: form.housing_type,
            has_yard: form.has_yard,
            other_pets: form.other_pets,
            experience: form.experience,
            reason: form.reason,
            household_members: form.household_members.max(1),
            status: ApplicationStatus::Pending,
            submitted_at: Utc::now(),
            admin_notes: String::new(),
            decided_at: None,
        };
        let saved = application.clone();
        self.store
            .update(
                names::ADOPTION_APPLICATIONS,
                move |apps: &mut Vec<AdoptionApplication>| {
                    let duplicate = apps.iter().any(|a| {
                        a.dog_id == saved.dog_id
                            && a.status == ApplicationStatus::Pending
                            && same_user(&a.applicant_email, &saved.applicant_email)
                    });
                    if duplicate {
                        return Err(PlatformError::conflict(format!(
                            "{} already has a pending application for {}",
                            saved.applicant_email, saved.dog_name
                        )));
                    }
                    apps.push(saved);
                    Ok(())
                },
            )
            .await?;

        self.notify(
            NotificationKind::Info,
            format!(
                "New adoption application: {} -> {}",
                application.applicant, application.dog_name
            ),
            Priority::Medium,
            BROADCAST,
        )
        .await?;
        self.audit("adoption_application", Some(actor), json!({ "id": application.id, "dog": dog.id }))
            .await?;
        Ok(application)
    }

    /// Approving adopts the dog out and turns down every other pending
    /// application for it.
    pub async fn decide_application(
        &self,
        actor: &User,
        id: &str,
        approve: bool,
        notes: &str,
    ) -> Result<AdoptionApplication> {
        require_admin(actor, "decide adoption applications")?;
        let now = Utc::now();
        let to = if approve {
            ApplicationStatus::Approved
        } else {
            ApplicationStatus::Rejected
        };

        let decided = self
            .store
            .update(
                names::ADOPTION_APPLICATIONS,
                |apps: &mut Vec<AdoptionApplication>| {
                    let app = apps
                        .iter_mut()
                        .find(|a| a.id == id)
                        .ok_or_else(|| PlatformError::not_found("application", id))?;
                    if app.status != ApplicationStatus::Pending {
                        return Err(PlatformError::transition("application", app.status, to));
                    }
                    app.status = to;
                    app.admin_notes = notes.trim().to_string();
                    app.decided_at = Some(now);
                    let decided = app.clone();

                    if approve {
                        for other in apps.iter_mut().filter(|a| {
                            a.dog_id == decided.dog_id && a.status == ApplicationStatus::Pending
                        }) {
                            other.status = ApplicationStatus::Rejected;
                            other.admin_notes = format!("{} was adopted by another applicant", decided.dog_name);
                            other.decided_at = Some(now);
                        }
                    }
                    Ok(decided)
                },
            )
            .await?;

        if approve {
            self.store
                .update(names::ADOPTION_DOGS, |dogs: &mut Vec<AdoptionDog>| {
                    let dog = find_dog(dogs, &decided.dog_id)?;
                    dog.status = DogStatus::Adopted;
                    dog.adopted_by = Some(decided.applicant_email.clone());
                    dog.adopted_at = Some(now);
                    Ok(())
                })
                .await?;
        }

        let (kind, message) = if approve {
            (
                NotificationKind::Success,
                format!("Adoption approved: {} -> {}", decided.dog_name, decided.applicant),
            )
        } else {
            (
                NotificationKind::Warning,
                format!("Application rejected: {} - {}", decided.dog_name, decided.applicant),
            )
        };
        self.notify(kind, message, Priority::Normal, &decided.applicant_email)
            .await?;
        self.audit(
            if approve { "adoption_approved" } else { "adoption_rejected" },
            Some(actor),
            json!({ "application": decided.id }),
        )
        .await?;
        Ok(decided)
    }

    pub async fn adoption_applications(&self) -> Result<Vec<AdoptionApplication>> {
        self.store.load(names::ADOPTION_APPLICATIONS).await
    }

    pub async fn my_applications(&self, actor: &User) -> Result<Vec<AdoptionApplication>> {
        let mut apps = self.adoption_applications().await?;
        apps.retain(|a| same_user(&a.applicant_email, &actor.email));
        apps.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(apps)
    }
}
