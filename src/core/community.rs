use crate::core::platform::{same_user, Platform};
use crate::core::store::names;
use crate::domain::model::{Attachment, Comment, Donation, Post, User};
use crate::domain::ports::Storage;
use crate::utils::error::{PlatformError, Result};
use crate::utils::ids::next_id;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

pub const ANONYMOUS: &str = "Anonymous";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DonationTotals {
    pub total: f64,
    pub count: usize,
    /// Distinct named donors; anonymous gifts are not counted.
    pub donors: usize,
    pub by_purpose: BTreeMap<String, f64>,
}

fn find_post<'a>(posts: &'a mut [Post], id: &str) -> Result<&'a mut Post> {
    posts
        .iter_mut()
        .find(|p| p.id == id)
        .ok_or_else(|| PlatformError::not_found("post", id))
}

impl<S: Storage> Platform<S> {
    pub async fn create_post(&self, actor: &User, content: &str, image: Option<Attachment>) -> Result<Post> {
        let content = content.trim();
        if content.is_empty() {
            return Err(PlatformError::validation("post content is required"));
        }
        let post = Post {
            id: next_id("POST"),
            author: actor.name.clone(),
            author_email: actor.email.clone(),
            content: content.to_string(),
            image,
            likes: Vec::new(),
            comments: Vec::new(),
            time: Utc::now(),
        };
        self.store.append(names::POSTS, post.clone()).await?;
        Ok(post)
    }

    /// Newest first.
    pub async fn posts(&self) -> Result<Vec<Post>> {
        let mut posts: Vec<Post> = self.store.load(names::POSTS).await?;
        posts.sort_by(|a, b| b.time.cmp(&a.time));
        Ok(posts)
    }

    pub async fn toggle_like(&self, actor: &User, id: &str) -> Result<Post> {
        self.store
            .update(names::POSTS, |posts: &mut Vec<Post>| {
                let post = find_post(posts, id)?;
                let before = post.likes.len();
                post.likes.retain(|l| !same_user(l, &actor.email));
                if post.likes.len() == before {
                    post.likes.push(actor.email.clone());
                }
                Ok(post.clone())
            })
            .await
    }

    pub async fn comment(&self, actor: &User, id: &str, text: &str) -> Result<Post> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PlatformError::validation("comment cannot be empty"));
        }
        self.store
            .update(names::POSTS, |posts: &mut Vec<Post>| {
                let post = find_post(posts, id)?;
                post.comments.push(Comment {
                    author: actor.name.clone(),
                    text: text.to_string(),
                    time: Utc::now(),
                });
                Ok(post.clone())
            })
            .await
    }

    pub async fn donate(
        &self,
        actor: Option<&User>,
        amount: f64,
        purpose: &str,
        anonymous: bool,
    ) -> Result<Donation> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(PlatformError::validation(format!(
                "donation amount must be positive (got {})",
                amount
            )));
        }
        let purpose = match purpose.trim() {
            "" => "General Fund",
            p => p,
        };
        let named = actor.filter(|_| !anonymous);
        let donation = Donation {
            id: next_id("DON"),
            donor: named.map_or_else(|| ANONYMOUS.to_string(), |u| u.name.clone()),
            donor_email: named.map(|u| u.email.clone()),
            amount,
            purpose: purpose.to_string(),
            time: Utc::now(),
        };
        self.store.append(names::DONATIONS, donation.clone()).await?;
        self.audit(
            "donation",
            named,
            json!({ "id": donation.id, "amount": donation.amount, "purpose": donation.purpose }),
        )
        .await?;
        tracing::info!("Donation {} of {:.2} for {}", donation.id, donation.amount, donation.purpose);
        Ok(donation)
    }

    pub async fn donations(&self) -> Result<Vec<Donation>> {
        self.store.load(names::DONATIONS).await
    }

    pub async fn donation_totals(&self) -> Result<DonationTotals> {
        let donations = self.donations().await?;
        let mut totals = DonationTotals {
            count: donations.len(),
            ..Default::default()
        };
        let mut donors = BTreeSet::new();
        for d in &donations {
            totals.total += d.amount;
            *totals.by_purpose.entry(d.purpose.clone()).or_default() += d.amount;
            if d.donor != ANONYMOUS {
                donors.insert(d.donor_email.clone().unwrap_or_else(|| d.donor.clone()).to_lowercase());
            }
        }
        totals.donors = donors.len();
        Ok(totals)
    }
}
