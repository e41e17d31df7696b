use std::time::Duration;

use indexmap::IndexSet;
use log::{debug, warn};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tokio_util::sync::CancellationToken;

use crate::{
    model::photo::{AiAnnotation, AiInsights, LightingType, SceneType, normalize_tag},
    random::{pick_one, random_bool, random_float, random_int, sample_size},
};

const EXPRESSION_TAGS: [&str; 7] = [
    "smile",
    "serious_expression",
    "laughing",
    "closed_eyes",
    "open_eyes",
    "looking_at_camera",
    "looking_away",
];

const QUALITY_TAGS: [&str; 6] = [
    "sharp_focus",
    "slight_blur",
    "well_exposed",
    "overexposed",
    "underexposed",
    "professional_lighting",
];

const SCENE_TAGS: [&str; 9] = [
    "indoor",
    "outdoor",
    "studio_shot",
    "natural_light",
    "portrait",
    "full_body",
    "headshot",
    "black_background",
    "white_background",
];

const MOOD_TAGS: [&str; 7] = [
    "elegant",
    "celebratory",
    "professional",
    "casual",
    "dramatic",
    "romantic",
    "joyful",
];

const DOMINANT_COLOR_PALETTE: [&str; 10] = [
    "#000000", "#FFFFFF", "#F43F5E", "#F59E0B", "#10B981", "#3B82F6", "#8B5CF6", "#F97316",
    "#F3F4F6", "#6366F1",
];

const CATEGORY_SUGGESTIONS: [&str; 7] = [
    "professional_headshot",
    "family_portrait",
    "event_highlight",
    "graduation_feature",
    "corporate_profile",
    "editorial_portrait",
    "wedding_moment",
];

// Independent detector noise.
const CLOSED_EYES_FALSE_POSITIVE: f64 = 0.15;
const TECHNICAL_ISSUE_FALSE_POSITIVE: f64 = 0.05;
const OVEREXPOSURE_FALSE_POSITIVE: f64 = 0.07;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggerSettings {
    pub latency_min_ms: u64,
    pub latency_max_ms: u64,
    /// Probability that a single generation attempt fails.
    pub failure_rate: f64,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    /// Derive every draw from the seed instead of the thread generator.
    pub deterministic: bool,
}

impl Default for TaggerSettings {
    fn default() -> Self {
        Self {
            latency_min_ms: 900,
            latency_max_ms: 1500,
            failure_rate: 0.0,
            max_attempts: 3,
            retry_backoff_ms: 200,
            deterministic: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TaggerError {
    #[error("Tag generation failed for {seed} after {attempts} attempt(s)")]
    GenerationFailed { seed: String, attempts: u32 },

    #[error("Tag generation cancelled")]
    Cancelled,
}

/// `base_ms * 2^(attempt - 1)`, saturating instead of overflowing.
fn retry_backoff(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor))
}

fn person_tag_for_count(faces_count: u32) -> &'static str {
    match faces_count {
        0 | 1 => "solo_photo",
        2 => "couple_photo",
        _ => "group_photo",
    }
}

/// Builds one annotation, drawing all randomness from `rng`.
/// `seed` only namespaces the generated face ids.
pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, seed: &str) -> AiAnnotation {
    let faces_count = random_int(rng, 1, 4) as u32;
    let face_ids = (1..=faces_count)
        .map(|idx| format!("{seed}_face_{idx}"))
        .collect();

    let expression_selection = sample_size(rng, &EXPRESSION_TAGS, faces_count as usize + 1);
    let quality_selection = sample_size(rng, &QUALITY_TAGS, 2);
    let scene_selection = sample_size(rng, &SCENE_TAGS, 3);

    let has_closed_eyes = expression_selection.contains(&"closed_eyes")
        || random_bool(rng, CLOSED_EYES_FALSE_POSITIVE);
    let has_blur = quality_selection.contains(&"slight_blur");
    let has_technical_issues = has_blur || random_bool(rng, TECHNICAL_ISSUE_FALSE_POSITIVE);
    let has_overexposure = quality_selection.contains(&"overexposed")
        || random_bool(rng, OVEREXPOSURE_FALSE_POSITIVE);

    let color_count = random_int(rng, 3, 5) as usize;
    let scene_types: Vec<SceneType> = SceneType::iter().collect();
    let lighting_types: Vec<LightingType> = LightingType::iter().collect();

    let insights = AiInsights {
        faces_count,
        face_ids,
        quality_score: random_float(rng, 6.5, 9.8, 1),
        composition_score: random_float(rng, 7.0, 9.7, 1),
        has_closed_eyes,
        has_blur,
        has_technical_issues,
        has_overexposure,
        is_group_photo: faces_count >= 3,
        dominant_colors: sample_size(rng, &DOMINANT_COLOR_PALETTE, color_count)
            .into_iter()
            .map(String::from)
            .collect(),
        scene_type: pick_one(rng, &scene_types)
            .copied()
            .unwrap_or(SceneType::Portrait),
        lighting_type: pick_one(rng, &lighting_types)
            .copied()
            .unwrap_or(LightingType::Studio),
        suggested_category: pick_one(rng, &CATEGORY_SUGGESTIONS)
            .unwrap_or(&CATEGORY_SUGGESTIONS[0])
            .to_string(),
        mood: pick_one(rng, &MOOD_TAGS).unwrap_or(&MOOD_TAGS[0]).to_string(),
    };

    let face_tag = format!("face_detected_{faces_count}");
    let tags: IndexSet<String> = std::iter::once(face_tag.as_str())
        .chain(std::iter::once(person_tag_for_count(faces_count)))
        .chain(expression_selection.iter().copied())
        .chain(quality_selection.iter().copied())
        .chain(scene_selection.iter().copied())
        .chain(std::iter::once(insights.mood.as_str()))
        .map(normalize_tag)
        .collect();

    AiAnnotation {
        tags: tags.into_iter().collect(),
        insights,
    }
}

/// Simulated computer-vision tagger.
#[derive(Debug, Clone, Default)]
pub struct Tagger {
    settings: TaggerSettings,
}

impl Tagger {
    pub fn new(settings: TaggerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &TaggerSettings {
        &self.settings
    }

    /// Non-reproducible: the same seed yields different content.
    pub fn generate(&self, seed: &str) -> AiAnnotation {
        generate_with(&mut rand::rng(), seed)
    }

    /// Reproducible: every draw comes from a generator keyed on `seed`.
    pub fn generate_seeded(&self, seed: &str) -> AiAnnotation {
        let mut rng = StdRng::seed_from_u64(fxhash::hash64(seed));
        generate_with(&mut rng, seed)
    }

    fn generate_configured(&self, seed: &str) -> AiAnnotation {
        if self.settings.deterministic {
            self.generate_seeded(seed)
        } else {
            self.generate(seed)
        }
    }

    fn attempt(&self, seed: &str, attempt: u32) -> Result<AiAnnotation, TaggerError> {
        let failed = random_bool(&mut rand::rng(), self.settings.failure_rate);
        if failed {
            return Err(TaggerError::GenerationFailed {
                seed: seed.to_string(),
                attempts: attempt,
            });
        }
        Ok(self.generate_configured(seed))
    }

    /// Same distribution as [`Tagger::generate`] after a simulated inference delay.
    pub async fn generate_async(
        &self,
        seed: &str,
        cancel: &CancellationToken,
    ) -> Result<AiAnnotation, TaggerError> {
        self.generate_attempt(seed, 1, cancel).await
    }

    async fn generate_attempt(
        &self,
        seed: &str,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Result<AiAnnotation, TaggerError> {
        let latency_ms = {
            let mut rng = rand::rng();
            random_int(
                &mut rng,
                self.settings.latency_min_ms as i64,
                self.settings.latency_max_ms as i64,
            ) as u64
        };

        tokio::select! {
            _ = cancel.cancelled() => return Err(TaggerError::Cancelled),
            _ = tokio::time::sleep(Duration::from_millis(latency_ms)) => {}
        }

        debug!("Generated tags for {} after {}ms", seed, latency_ms);
        self.attempt(seed, attempt)
    }

    /// Retries failed attempts with exponential backoff, up to `max_attempts`.
    pub async fn generate_with_retry(
        &self,
        seed: &str,
        cancel: &CancellationToken,
    ) -> Result<AiAnnotation, TaggerError> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.generate_attempt(seed, attempt, cancel).await {
                Ok(annotation) => return Ok(annotation),
                Err(TaggerError::Cancelled) => return Err(TaggerError::Cancelled),
                Err(error) if attempt >= max_attempts => {
                    warn!("Giving up on tag generation for {}: {}", seed, error);
                    return Err(error);
                }
                Err(error) => {
                    let backoff = retry_backoff(self.settings.retry_backoff_ms, attempt);
                    warn!("{} (retrying in {}ms)", error, backoff.as_millis());
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(TaggerError::Cancelled),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }
}
