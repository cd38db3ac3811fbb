use crate::core::platform::{require_admin, same_user, Platform};
use crate::core::store::names;
use crate::domain::model::{Difficulty, LearningProgress, User, Video, VideoCategory};
use crate::domain::ports::Storage;
use crate::utils::error::{PlatformError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_range};
use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

pub const VIDEO_POINTS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quiz {
    pub id: &'static str,
    pub title: &'static str,
    pub category: VideoCategory,
    pub questions: u32,
    pub pass_score: u32,
    pub points: u32,
    pub difficulty: Difficulty,
}

pub const QUIZZES: [Quiz; 3] = [
    Quiz {
        id: "quiz_001",
        title: "Dog First Aid Basics",
        category: VideoCategory::FirstAid,
        questions: 10,
        pass_score: 70,
        points: 50,
        difficulty: Difficulty::Beginner,
    },
    Quiz {
        id: "quiz_002",
        title: "Vaccination Knowledge Check",
        category: VideoCategory::Health,
        questions: 15,
        pass_score: 70,
        points: 75,
        difficulty: Difficulty::Intermediate,
    },
    Quiz {
        id: "quiz_003",
        title: "Street Dog Behavior Understanding",
        category: VideoCategory::Training,
        questions: 12,
        pass_score: 70,
        points: 60,
        difficulty: Difficulty::Beginner,
    },
];

#[derive(Debug, Clone, Serialize)]
pub struct QuizOutcome {
    pub passed: bool,
    pub points_awarded: u32,
    pub badge: Option<String>,
    pub progress: LearningProgress,
}

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub title: String,
    pub url: String,
    pub category: VideoCategory,
    pub difficulty: Difficulty,
    pub description: String,
}

fn youtube_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:youtube\.com/watch\?(?:.*&)?v=|youtu\.be/|youtube\.com/embed/)([^&\n?#/]+)")
            .expect("valid youtube regex")
    })
}

/// The video id from watch, short-link and embed URLs.
pub fn youtube_id(url: &str) -> Option<String> {
    youtube_regex()
        .captures(url.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn starter_videos() -> Vec<Video> {
    let video = |id: &str, title: &str, url: &str, category, duration: &str, difficulty, description: &str| Video {
        id: id.to_string(),
        title: title.to_string(),
        url: url.to_string(),
        category,
        duration: duration.to_string(),
        difficulty,
        description: description.to_string(),
        views: 0,
        likes: 0,
        uploaded_by: "Admin".to_string(),
        date: Utc::now(),
    };
    vec![
        video(
            "vid_001",
            "Basic Dog First Aid - Essential Skills",
            "https://www.youtube.com/watch?v=5PJddmfesaA",
            VideoCategory::FirstAid,
            "12:34",
            Difficulty::Beginner,
            "Essential first aid for dogs: CPR, wound care and emergency response.",
        ),
        video(
            "vid_002",
            "How to Approach Street Dogs Safely",
            "https://www.youtube.com/watch?v=TBvPaqMZyo8",
            VideoCategory::Training,
            "8:45",
            Difficulty::Beginner,
            "Reading dog body language and approaching street dogs safely.",
        ),
    ]
}

fn find_quiz(id: &str) -> Result<&'static Quiz> {
    QUIZZES
        .iter()
        .find(|q| q.id == id)
        .ok_or_else(|| PlatformError::not_found("quiz", id))
}

fn progress_for<'a>(all: &'a mut Vec<LearningProgress>, user: &str) -> &'a mut LearningProgress {
    match all.iter().position(|p| same_user(&p.user, user)) {
        Some(i) => &mut all[i],
        None => {
            all.push(LearningProgress {
                user: user.to_string(),
                ..Default::default()
            });
            let last = all.len() - 1;
            &mut all[last]
        }
    }
}

impl<S: Storage> Platform<S> {
    /// The library; starter videos are stored on first use.
    pub async fn videos(&self) -> Result<Vec<Video>> {
        self.store
            .update(names::VIDEOS, |videos: &mut Vec<Video>| {
                if videos.is_empty() {
                    videos.extend(starter_videos());
                }
                Ok(videos.clone())
            })
            .await
    }

    pub async fn search_videos(
        &self,
        category: Option<VideoCategory>,
        query: Option<&str>,
    ) -> Result<Vec<Video>> {
        let query = query.map(|q| q.trim().to_lowercase()).filter(|q| !q.is_empty());
        let mut videos = self.videos().await?;
        videos.retain(|v| {
            category.map_or(true, |c| v.category == c)
                && query.as_deref().map_or(true, |q| {
                    v.title.to_lowercase().contains(q) || v.description.to_lowercase().contains(q)
                })
        });
        Ok(videos)
    }

    pub async fn add_video(&self, actor: &User, new: NewVideo) -> Result<Video> {
        require_admin(actor, "add awareness videos")?;
        validate_non_empty_string("title", &new.title)?;
        if youtube_id(&new.url).is_none() {
            return Err(PlatformError::validation(format!("not a YouTube URL: '{}'", new.url)));
        }
        // Starter videos are seeded first so generated ids never collide with them.
        self.videos().await?;

        let video = self
            .store
            .update(names::VIDEOS, |videos: &mut Vec<Video>| {
                let video = Video {
                    id: format!("vid_{:03}", videos.len() + 1),
                    title: new.title.trim().to_string(),
                    url: new.url.trim().to_string(),
                    category: new.category,
                    duration: "0:00".to_string(),
                    difficulty: new.difficulty,
                    description: new.description.trim().to_string(),
                    views: 0,
                    likes: 0,
                    uploaded_by: actor.name.clone(),
                    date: Utc::now(),
                };
                videos.push(video.clone());
                Ok(video)
            })
            .await?;
        tracing::info!("{} added video {} '{}'", actor.email, video.id, video.title);
        Ok(video)
    }

    pub async fn like_video(&self, id: &str) -> Result<u32> {
        self.videos().await?;
        self.store
            .update(names::VIDEOS, |videos: &mut Vec<Video>| {
                let video = videos
                    .iter_mut()
                    .find(|v| v.id == id)
                    .ok_or_else(|| PlatformError::not_found("video", id))?;
                video.likes += 1;
                Ok(video.likes)
            })
            .await
    }

    /// Points are awarded once per video.
    pub async fn complete_video(&self, actor: &User, id: &str) -> Result<LearningProgress> {
        if !self.videos().await?.iter().any(|v| v.id == id) {
            return Err(PlatformError::not_found("video", id));
        }
        let (progress, first_time) = self
            .store
            .update(names::LEARNING, |all: &mut Vec<LearningProgress>| {
                let progress = progress_for(all, &actor.email);
                let first_time = !progress.completed_videos.iter().any(|v| v == id);
                if first_time {
                    progress.completed_videos.push(id.to_string());
                    progress.total_points += VIDEO_POINTS;
                }
                Ok((progress.clone(), first_time))
            })
            .await?;

        if first_time {
            self.store
                .update(names::VIDEOS, |videos: &mut Vec<Video>| {
                    if let Some(video) = videos.iter_mut().find(|v| v.id == id) {
                        video.views += 1;
                    }
                    Ok(())
                })
                .await?;
        }
        Ok(progress)
    }

    /// Returns whether the video is bookmarked afterwards.
    pub async fn toggle_bookmark(&self, actor: &User, id: &str) -> Result<bool> {
        if !self.videos().await?.iter().any(|v| v.id == id) {
            return Err(PlatformError::not_found("video", id));
        }
        self.store
            .update(names::LEARNING, |all: &mut Vec<LearningProgress>| {
                let progress = progress_for(all, &actor.email);
                match progress.bookmarks.iter().position(|b| b == id) {
                    Some(i) => {
                        progress.bookmarks.remove(i);
                        Ok(false)
                    }
                    None => {
                        progress.bookmarks.push(id.to_string());
                        Ok(true)
                    }
                }
            })
            .await
    }

    /// Keeps the best score. Points and the badge come with the first pass only.
    pub async fn submit_quiz(&self, actor: &User, quiz_id: &str, score: u32) -> Result<QuizOutcome> {
        let quiz = find_quiz(quiz_id)?;
        validate_range("score", score, 0, 100)?;
        let passed = score >= quiz.pass_score;

        let outcome = self
            .store
            .update(names::LEARNING, |all: &mut Vec<LearningProgress>| {
                let progress = progress_for(all, &actor.email);
                let previous = progress.quiz_scores.get(quiz.id).copied();
                let passed_before = previous.is_some_and(|s| s >= quiz.pass_score);
                if previous.map_or(true, |s| score > s) {
                    progress.quiz_scores.insert(quiz.id.to_string(), score);
                }

                let mut points_awarded = 0;
                let mut badge = None;
                if passed && !passed_before {
                    points_awarded = quiz.points;
                    progress.total_points += quiz.points;
                    let earned = format!("Quiz Master - {}", quiz.title);
                    if !progress.badges.contains(&earned) {
                        progress.badges.push(earned.clone());
                    }
                    badge = Some(earned);
                }
                Ok(QuizOutcome {
                    passed,
                    points_awarded,
                    badge,
                    progress: progress.clone(),
                })
            })
            .await?;
        tracing::debug!("{} scored {} on {}", actor.email, score, quiz.id);
        Ok(outcome)
    }

    pub async fn learning_progress(&self, user: &str) -> Result<LearningProgress> {
        let all: Vec<LearningProgress> = self.store.load(names::LEARNING).await?;
        Ok(all
            .into_iter()
            .find(|p| same_user(&p.user, user))
            .unwrap_or_else(|| LearningProgress {
                user: user.to_string(),
                ..Default::default()
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::testing::*;

    #[test]
    fn test_youtube_id_forms() {
        assert_eq!(youtube_id("https://www.youtube.com/watch?v=5PJddmfesaA").as_deref(), Some("5PJddmfesaA"));
        assert_eq!(youtube_id("https://youtu.be/TBvPaqMZyo8?t=30").as_deref(), Some("TBvPaqMZyo8"));
        assert_eq!(youtube_id("https://www.youtube.com/embed/abc123").as_deref(), Some("abc123"));
        assert_eq!(youtube_id("https://www.youtube.com/watch?feature=share&v=xyz").as_deref(), Some("xyz"));
        assert!(youtube_id("https://vimeo.com/1234").is_none());
    }

    #[tokio::test]
    async fn test_library_is_seeded_and_filtered() {
        let platform = platform();
        assert_eq!(platform.videos().await.unwrap().len(), 2);
        let first_aid = platform
            .search_videos(Some(VideoCategory::FirstAid), None)
            .await
            .unwrap();
        assert_eq!(first_aid.len(), 1);
        let by_text = platform.search_videos(None, Some("BODY LANGUAGE")).await.unwrap();
        assert_eq!(by_text[0].id, "vid_002");

        let new = NewVideo {
            title: "Feeding without fights".into(),
            url: "https://youtu.be/feed123".into(),
            category: VideoCategory::Community,
            difficulty: Difficulty::Beginner,
            description: String::new(),
        };
        assert!(platform.add_video(&volunteer(), new.clone()).await.is_err());
        let added = platform.add_video(&admin(), new.clone()).await.unwrap();
        assert_eq!(added.id, "vid_003");
        assert_eq!(added.uploaded_by, "admin");

        let bad = NewVideo {
            url: "https://example.com/video".into(),
            ..new
        };
        assert!(platform.add_video(&admin(), bad).await.is_err());
        assert_eq!(platform.like_video("vid_003").await.unwrap(), 1);
        assert!(platform.like_video("vid_404").await.is_err());
    }

    #[tokio::test]
    async fn test_video_completion_awards_points_once() {
        let platform = platform();
        let me = citizen();
        let progress = platform.complete_video(&me, "vid_001").await.unwrap();
        assert_eq!(progress.total_points, VIDEO_POINTS);
        let again = platform.complete_video(&me, "vid_001").await.unwrap();
        assert_eq!(again.total_points, VIDEO_POINTS);
        assert_eq!(platform.videos().await.unwrap()[0].views, 1);
        assert!(platform.complete_video(&me, "vid_999").await.is_err());

        assert!(platform.toggle_bookmark(&me, "vid_002").await.unwrap());
        assert!(!platform.toggle_bookmark(&me, "vid_002").await.unwrap());
        assert!(platform.learning_progress("citizen@mail.com").await.unwrap().bookmarks.is_empty());
        assert_eq!(platform.learning_progress("nobody@mail.com").await.unwrap().total_points, 0);
    }

    #[tokio::test]
    async fn test_quiz_points_and_badge_on_first_pass() {
        let platform = platform();
        let me = citizen();

        let failed = platform.submit_quiz(&me, "quiz_002", 40).await.unwrap();
        assert!(!failed.passed);
        assert_eq!(failed.points_awarded, 0);

        let passed = platform.submit_quiz(&me, "quiz_002", 85).await.unwrap();
        assert!(passed.passed);
        assert_eq!(passed.points_awarded, 75);
        assert_eq!(passed.badge.as_deref(), Some("Quiz Master - Vaccination Knowledge Check"));

        let retake = platform.submit_quiz(&me, "quiz_002", 72).await.unwrap();
        assert_eq!(retake.points_awarded, 0);
        assert_eq!(retake.progress.quiz_scores.get("quiz_002"), Some(&85));
        assert_eq!(retake.progress.total_points, 75);
        assert_eq!(retake.progress.badges.len(), 1);

        assert!(platform.submit_quiz(&me, "quiz_002", 101).await.is_err());
        assert!(platform.submit_quiz(&me, "quiz_404", 90).await.is_err());
    }
}
