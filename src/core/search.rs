use crate::core::platform::Platform;
use crate::core::store::names;
use crate::domain::model::{Case, Post, SosAlert};
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub cases: Vec<Case>,
    pub posts: Vec<Post>,
    pub sos: Vec<SosAlert>,
    pub total: usize,
}

fn matches_any(query: &str, fields: &[&str]) -> bool {
    fields.iter().any(|f| f.to_lowercase().contains(query))
}

impl<S: Storage> Platform<S> {
    /// Case-insensitive substring search across cases, posts, and SOS alerts.
    pub async fn global_search(&self, query: &str) -> Result<SearchResults> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return Ok(SearchResults::default());
        }

        let mut cases: Vec<Case> = self.store.load(names::CASES).await?;
        cases.retain(|c| matches_any(&q, &[c.id.as_str(), c.disease.as_str(), c.place.as_str()]));
        let mut posts: Vec<Post> = self.store.load(names::POSTS).await?;
        posts.retain(|p| matches_any(&q, &[p.content.as_str(), p.author.as_str()]));
        let mut sos: Vec<SosAlert> = self.store.load(names::SOS).await?;
        sos.retain(|s| matches_any(&q, &[s.id.as_str(), s.place.as_str()]));

        let total = cases.len() + posts.len() + sos.len();
        tracing::debug!("Search '{}' matched {} record(s)", q, total);
        Ok(SearchResults {
            cases,
            posts,
            sos,
            total,
        })
    }
}
