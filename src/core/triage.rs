use crate::core::hotspots::NewHotspot;
use crate::core::platform::Platform;
use crate::core::store::names;
use crate::domain::model::{
    BiteRiskLevel, Case, CaseSeverity, CaseStatus, GeoPoint, Hotspot, HotspotCategory, User,
};
use crate::domain::ports::Storage;
use crate::utils::error::{PlatformError, Result};
use crate::utils::ids::next_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------- detections

pub const HEALTHY: &str = "healthy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionSeverity {
    Mild,
    Moderate,
    Severe,
}

/// Maps a severity score to a label and a 1..=5 level.
pub fn severity_from_score(score: u32, class: &str) -> (DetectionSeverity, u8) {
    if class.eq_ignore_ascii_case(HEALTHY) {
        return (DetectionSeverity::Mild, 1);
    }
    match score {
        0..=14 => (DetectionSeverity::Mild, 1),
        15..=29 => (DetectionSeverity::Mild, 2),
        30..=59 => (DetectionSeverity::Moderate, 3),
        60..=84 => (DetectionSeverity::Severe, 4),
        _ => (DetectionSeverity::Severe, 5),
    }
}

/// Observed symptoms that raise a detection's severity score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symptoms {
    pub appetite_loss: bool,
    pub scratching: bool,
    pub spreading: bool,
    pub lethargy: bool,
}

fn base_severity(class: &str) -> f64 {
    match class.to_lowercase().as_str() {
        HEALTHY => 0.0,
        "dermatitis" => 40.0,
        "hypersensitivity" => 45.0,
        "fungal_infections" => 50.0,
        "ringworm" => 55.0,
        "demodicosis" => 70.0,
        _ => 50.0,
    }
}

/// Base severity of the class weighted by confidence, plus symptom points.
pub fn severity_score(class: &str, confidence: f64, symptoms: &Symptoms) -> u32 {
    let mut score = (base_severity(class) * confidence.clamp(0.0, 1.0)) as u32;
    if symptoms.appetite_loss {
        score += 5;
    }
    if symptoms.scratching {
        score += 5;
    }
    if symptoms.spreading {
        score += 10;
    }
    if symptoms.lethargy {
        score += 8;
    }
    score
}

fn disease_color(class: &str) -> &'static str {
    match class {
        "ringworm" => "#ef4444",
        "demodicosis" => "#dc2626",
        "fungal_infections" => "#eab308",
        "dermatitis" => "#3b82f6",
        "hypersensitivity" => "#10b981",
        _ => "#64748b",
    }
}

fn title_case(class: &str) -> String {
    class
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// One classifier result for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: String,
    pub confidence: f64,
    pub score: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetectionOutcome {
    pub cases: Vec<Case>,
    pub hotspots: Vec<Hotspot>,
}

fn case_severity(label: DetectionSeverity, level: u8) -> CaseSeverity {
    match (label, level) {
        (DetectionSeverity::Mild, _) => CaseSeverity::Low,
        (DetectionSeverity::Moderate, _) => CaseSeverity::Medium,
        (DetectionSeverity::Severe, 5) => CaseSeverity::Critical,
        (DetectionSeverity::Severe, _) => CaseSeverity::High,
    }
}

// ---------------------------------------------------------------- bite risk

/// Declares one questionnaire answer set: serde/display label and points.
macro_rules! answers {
    ($(#[$meta:meta])* $ty:ident { $($variant:ident = $label:literal => $points:expr),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $ty {
            $(#[serde(rename = $label)] $variant,)+
        }

        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn label(&self) -> &'static str {
                match self {
                    $($ty::$variant => $label,)+
                }
            }

            pub fn points(&self) -> u32 {
                match self {
                    $($ty::$variant => $points,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        /// Accepts the variant name (any case, `-`/`_` ignored), the full
        /// label, or a 1-based option number.
        impl FromStr for $ty {
            type Err = PlatformError;

            fn from_str(s: &str) -> Result<Self> {
                let wanted = s.trim();
                if let Ok(n) = wanted.parse::<usize>() {
                    if let Some(answer) = n.checked_sub(1).and_then(|i| Self::ALL.get(i)) {
                        return Ok(*answer);
                    }
                }
                let squashed = wanted.to_lowercase().replace(['-', '_', ' '], "");
                Self::ALL
                    .iter()
                    .find(|a| {
                        a.label().eq_ignore_ascii_case(wanted)
                            || format!("{:?}", a).to_lowercase() == squashed
                    })
                    .copied()
                    .ok_or_else(|| {
                        PlatformError::validation(format!(
                            "unknown {} answer '{}'",
                            stringify!($ty),
                            s
                        ))
                    })
            }
        }
    };
}

answers!(Aggression {
    FriendlyCalm = "Friendly/Calm" => 0,
    NeutralCautious = "Neutral/Cautious" => 5,
    Defensive = "Defensive" => 10,
    AggressiveGrowling = "Aggressive/Growling" => 20,
    AttackingLunging = "Attacking/Lunging" => 30,
});

answers!(BodyLanguage {
    Relaxed = "Relaxed (wagging tail, soft ears)" => 0,
    Alert = "Alert (ears up, attentive)" => 5,
    Tense = "Tense (stiff body, raised hackles)" => 15,
    Cowering = "Cowering/Fearful" => 10,
    ShowingTeeth = "Showing teeth/Snarling" => 25,
});

answers!(EyeContact {
    Soft = "Soft/Avoidant" => 0,
    Normal = "Normal" => 3,
    DirectStare = "Direct stare" => 10,
    FixedStare = "Fixed stare with tension" => 20,
});

answers!(Territorial {
    NotTerritorial = "Not territorial" => 0,
    Mild = "Mild (barking)" => 5,
    Moderate = "Moderate (blocking path)" => 10,
    Highly = "Highly territorial (charging)" => 20,
});

answers!(PastBehavior {
    Never = "Never aggressive" => 0,
    Rare = "Rare incidents" => 10,
    Multiple = "Multiple incidents" => 20,
    Frequent = "Frequent attacks" => 30,
});

answers!(Approach {
    Friendly = "Friendly approach" => 0,
    Cautious = "Cautious but friendly" => 3,
    Avoidant = "Avoidant/Backing away" => 8,
    WarningSigns = "Warning signs (barking/growling)" => 15,
    Charging = "Charging/Lunging" => 25,
});

answers!(FoodGuarding {
    NoGuarding = "No guarding" => 0,
    Mild = "Mild (tense when eating)" => 5,
    Moderate = "Moderate (growls near food)" => 12,
    Severe = "Severe (snaps/bites near food)" => 20,
});

answers!(Space {
    Comfortable = "Comfortable with proximity" => 0,
    PrefersDistance = "Prefers distance" => 3,
    Discomfort = "Shows discomfort when approached" => 10,
    Defends = "Actively defends space" => 18,
});

answers!(Health {
    Healthy = "Appears healthy" => 0,
    MinorIssues = "Minor issues (limping)" => 5,
    VisibleInjuries = "Visible injuries" => 10,
    RabiesSigns = "Signs of rabies/severe illness" => 25,
});

answers!(Pack {
    Alone = "Alone" => 5,
    OneOther = "With one other dog" => 3,
    SmallPack = "In small pack (2-3)" => 8,
    LargePack = "Large pack (4+)" => 15,
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiteResponses {
    pub aggression: Aggression,
    pub body_language: BodyLanguage,
    pub eye_contact: EyeContact,
    pub territorial: Territorial,
    pub past_behavior: PastBehavior,
    pub approach: Approach,
    pub food_guarding: FoodGuarding,
    pub space: Space,
    pub health: Health,
    pub pack: Pack,
}

impl Default for BiteResponses {
    fn default() -> Self {
        Self {
            aggression: Aggression::FriendlyCalm,
            body_language: BodyLanguage::Relaxed,
            eye_contact: EyeContact::Soft,
            territorial: Territorial::NotTerritorial,
            past_behavior: PastBehavior::Never,
            approach: Approach::Friendly,
            food_guarding: FoodGuarding::NoGuarding,
            space: Space::Comfortable,
            health: Health::Healthy,
            pack: Pack::Alone,
        }
    }
}

impl BiteResponses {
    pub fn score(&self) -> u32 {
        self.aggression.points()
            + self.body_language.points()
            + self.eye_contact.points()
            + self.territorial.points()
            + self.past_behavior.points()
            + self.approach.points()
            + self.food_guarding.points()
            + self.space.points()
            + self.health.points()
            + self.pack.points()
    }
}

pub fn bite_risk_level(score: u32) -> BiteRiskLevel {
    match score {
        0..=20 => BiteRiskLevel::Low,
        21..=50 => BiteRiskLevel::Moderate,
        51..=80 => BiteRiskLevel::High,
        _ => BiteRiskLevel::Critical,
    }
}

fn bite_color(level: BiteRiskLevel) -> &'static str {
    match level {
        BiteRiskLevel::Low => "#10b981",
        BiteRiskLevel::Moderate => "#3b82f6",
        BiteRiskLevel::High => "#f59e0b",
        BiteRiskLevel::Critical => "#ef4444",
    }
}

pub fn recommendations(r: &BiteResponses) -> Vec<&'static str> {
    let mut out = Vec::new();
    if matches!(r.aggression, Aggression::AggressiveGrowling | Aggression::AttackingLunging) {
        out.push("Maintain safe distance - Do not approach");
    }
    if matches!(r.territorial, Territorial::Moderate | Territorial::Highly) {
        out.push("Avoid entering the dog's territory - Choose alternate route");
    }
    if matches!(r.approach, Approach::WarningSigns | Approach::Charging) {
        out.push("Do not attempt to pet or interact");
    }
    if r.health == Health::RabiesSigns {
        out.push("RABIES RISK - Contact health department immediately");
    }
    if matches!(r.pack, Pack::SmallPack | Pack::LargePack) {
        out.push("Pack behavior increases unpredictability - Extra caution needed");
    }
    if matches!(r.food_guarding, FoodGuarding::Moderate | FoodGuarding::Severe) {
        out.push("Never approach when dog is eating or near food");
    }
    out
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiteAssessment {
    pub id: String,
    pub location: String,
    pub coords: GeoPoint,
    pub risk_score: u32,
    pub risk_level: BiteRiskLevel,
    pub responses: BiteResponses,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub notes: String,
    pub assessed_by: String,
    pub timestamp: DateTime<Utc>,
}

impl<S: Storage> Platform<S> {
    /// Stores one case per detection and a disease hotspot for every
    /// non-healthy result.
    pub async fn record_detection(
        &self,
        actor: &User,
        place: &str,
        coords: GeoPoint,
        detections: Vec<Detection>,
        notes: &str,
    ) -> Result<DetectionOutcome> {
        coords.check()?;
        if detections.is_empty() {
            return Err(PlatformError::validation("no detection results to record"));
        }
        if let Some(bad) = detections
            .iter()
            .find(|d| !(0.0..=1.0).contains(&d.confidence) || d.class.trim().is_empty())
        {
            return Err(PlatformError::validation(format!(
                "invalid detection '{}' with confidence {}",
                bad.class, bad.confidence
            )));
        }

        let now = Utc::now();
        let mut cases = Vec::with_capacity(detections.len());
        let mut pending_hotspots = Vec::new();
        for d in &detections {
            let class = d.class.trim().to_lowercase();
            let (label, level) = severity_from_score(d.score, &class);
            cases.push(Case {
                id: next_id("CS"),
                disease: class.clone(),
                confidence: d.confidence,
                severity: case_severity(label, level),
                severity_num: level,
                status: CaseStatus::Pending,
                place: place.to_string(),
                coords: Some(coords),
                analyzed_by: actor.email.clone(),
                time: now,
                assigned_vet: None,
                treatment_plan: String::new(),
                outcome: String::new(),
                vet_notes: String::new(),
                follow_up_date: None,
                medications: Vec::new(),
                last_updated: None,
                notes: notes.to_string(),
            });

            if class != HEALTHY {
                let risk = (d.confidence * 100.0).min(100.0) as u8;
                pending_hotspots.push(
                    NewHotspot::new(coords, HotspotCategory::Disease, title_case(&class), risk)
                        .disease(class.clone())
                        .place(place)
                        .color(disease_color(&class)),
                );
            }
        }

        // Hotspots only exist for saved cases.
        let saved = cases.clone();
        self.store
            .update(names::CASES, move |all: &mut Vec<Case>| {
                all.extend(saved);
                Ok(())
            })
            .await?;
        let mut hotspots = Vec::with_capacity(pending_hotspots.len());
        for hotspot in pending_hotspots {
            hotspots.push(self.add_hotspot(actor, hotspot).await?);
        }
        self.audit(
            "detection_recorded",
            Some(actor),
            json!({ "cases": cases.len(), "hotspots": hotspots.len(), "place": place }),
        )
        .await?;
        tracing::info!("Recorded {} case(s), {} hotspot(s) at {}", cases.len(), hotspots.len(), place);
        Ok(DetectionOutcome { cases, hotspots })
    }

    pub async fn assess_bite_risk(
        &self,
        actor: &User,
        place: &str,
        coords: GeoPoint,
        responses: BiteResponses,
        notes: &str,
    ) -> Result<BiteAssessment> {
        coords.check()?;
        let risk_score = responses.score();
        let risk_level = bite_risk_level(risk_score);
        let assessment = BiteAssessment {
            id: next_id("BR"),
            location: place.to_string(),
            coords,
            risk_score,
            risk_level,
            responses,
            recommendations: recommendations(&responses)
                .into_iter()
                .map(str::to_string)
                .collect(),
            notes: notes.trim().to_string(),
            assessed_by: actor.email.clone(),
            timestamp: Utc::now(),
        };
        self.store
            .append(names::BITE_ASSESSMENTS, assessment.clone())
            .await?;

        let hotspot = NewHotspot::new(
            coords,
            HotspotCategory::BiteRisk,
            format!("Bite Risk: {}", risk_level),
            risk_score.min(100) as u8,
        )
        .place(place)
        .color(bite_color(risk_level));
        self.add_hotspot(actor, hotspot).await?;

        tracing::info!("Bite risk at {}: {} ({})", place, risk_level, risk_score);
        Ok(assessment)
    }

    pub async fn bite_assessments(&self) -> Result<Vec<BiteAssessment>> {
        self.store.load(names::BITE_ASSESSMENTS).await
    }
}
