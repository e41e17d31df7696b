use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

use super::bucket::Bucket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneType {
    Portrait,
    Group,
    Event,
    Product,
    Landscape,
}

impl Display for SceneType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneType::Portrait => write!(f, "portrait"),
            SceneType::Group => write!(f, "group"),
            SceneType::Event => write!(f, "event"),
            SceneType::Product => write!(f, "product"),
            SceneType::Landscape => write!(f, "landscape"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightingType {
    Studio,
    Natural,
    Mixed,
    LowLight,
}

impl Display for LightingType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LightingType::Studio => write!(f, "studio"),
            LightingType::Natural => write!(f, "natural"),
            LightingType::Mixed => write!(f, "mixed"),
            LightingType::LowLight => write!(f, "low_light"),
        }
    }
}

/// Simulated computer-vision output for one photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiInsights {
    pub faces_count: u32,
    pub face_ids: Vec<String>,
    /// 0-10
    pub quality_score: f64,
    /// 0-10
    pub composition_score: f64,
    pub has_closed_eyes: bool,
    pub has_blur: bool,
    pub has_technical_issues: bool,
    pub has_overexposure: bool,
    pub is_group_photo: bool,
    /// 3 to 5 hex colors.
    pub dominant_colors: Vec<String>,
    pub scene_type: SceneType,
    pub lighting_type: LightingType,
    pub suggested_category: String,
    pub mood: String,
}

/// Tags and insights always travel together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAnnotation {
    pub tags: Vec<String>,
    pub insights: AiInsights,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenditionUrls {
    pub thumbnail: String,
    pub medium: String,
    pub original: String,
}

impl RenditionUrls {
    /// Stable renditions for a seed, so the same upload always renders the same image.
    pub fn from_seed(seed: &str) -> Self {
        Self {
            thumbnail: format!("https://picsum.photos/seed/{seed}/200/200"),
            medium: format!("https://picsum.photos/seed/{seed}/800/600"),
            original: format!("https://picsum.photos/seed/{seed}/1920/1080"),
        }
    }
}

/// Trims a tag and replaces inner whitespace with underscores.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidPhoto {
    #[error("Photo {0} carries AI metadata outside the index bucket")]
    AnnotationOutsideIndex(String),
    #[error("Photo {0} has AI tags but no insights")]
    TagsWithoutInsights(String),
}

/// Wire shape of [`Photo`]. Only becomes a `Photo` through the checks in
/// `TryFrom`, since the bucket and annotation fields must agree.
#[derive(Deserialize)]
struct PhotoRecord {
    id: String,
    booking_id: String,
    file_name: String,
    bucket: Bucket,
    urls: RenditionUrls,
    format: String,
    size_bytes: u64,
    captured_at: Option<DateTime<Utc>>,
    uploaded_at: DateTime<Utc>,
    #[serde(default)]
    ai_tags: Vec<String>,
    #[serde(default)]
    ai_insights: Option<AiInsights>,
    #[serde(default)]
    is_favorite: bool,
    #[serde(default)]
    comments: Vec<Comment>,
    #[serde(default)]
    manual_tags: Vec<String>,
}

impl TryFrom<PhotoRecord> for Photo {
    type Error = InvalidPhoto;

    fn try_from(record: PhotoRecord) -> Result<Self, Self::Error> {
        let annotated = !record.ai_tags.is_empty() || record.ai_insights.is_some();
        if annotated && record.bucket != Bucket::Index {
            return Err(InvalidPhoto::AnnotationOutsideIndex(record.id));
        }
        if record.ai_insights.is_none() && !record.ai_tags.is_empty() {
            return Err(InvalidPhoto::TagsWithoutInsights(record.id));
        }

        Ok(Photo {
            is_customer_facing: record.bucket.is_customer_facing(),
            id: record.id,
            booking_id: record.booking_id,
            file_name: record.file_name,
            bucket: record.bucket,
            urls: record.urls,
            format: record.format,
            size_bytes: record.size_bytes,
            captured_at: record.captured_at,
            uploaded_at: record.uploaded_at,
            ai_tags: record.ai_tags,
            ai_insights: record.ai_insights,
            is_favorite: record.is_favorite,
            comments: record.comments,
            manual_tags: record.manual_tags,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PhotoRecord")]
pub struct Photo {
    pub id: String,
    pub booking_id: String,
    pub file_name: String,
    bucket: Bucket,
    is_customer_facing: bool,
    pub urls: RenditionUrls,
    pub format: String,
    pub size_bytes: u64,
    pub captured_at: Option<DateTime<Utc>>,
    pub uploaded_at: DateTime<Utc>,
    ai_tags: Vec<String>,
    ai_insights: Option<AiInsights>,
    pub is_favorite: bool,
    pub comments: Vec<Comment>,
    pub manual_tags: Vec<String>,
}

impl Photo {
    pub fn new(
        id: impl Into<String>,
        booking_id: impl Into<String>,
        file_name: impl Into<String>,
        bucket: Bucket,
        urls: RenditionUrls,
        size_bytes: u64,
    ) -> Self {
        let file_name = file_name.into();
        let format = if file_name.to_lowercase().ends_with(".png") {
            "png"
        } else {
            "jpg"
        };

        Self {
            id: id.into(),
            booking_id: booking_id.into(),
            format: format.to_string(),
            file_name,
            bucket,
            is_customer_facing: bucket.is_customer_facing(),
            urls,
            size_bytes,
            captured_at: None,
            uploaded_at: Utc::now(),
            ai_tags: Vec::new(),
            ai_insights: None,
            is_favorite: false,
            comments: Vec::new(),
            manual_tags: Vec::new(),
        }
    }

    /// Attaches an annotation. Ignored unless the photo is customer-facing.
    pub fn with_annotation(mut self, annotation: AiAnnotation) -> Self {
        if self.bucket == Bucket::Index {
            self.annotate(annotation);
        }
        self
    }

    pub fn bucket(&self) -> Bucket {
        self.bucket
    }

    pub fn is_customer_facing(&self) -> bool {
        self.is_customer_facing
    }

    pub fn ai_tags(&self) -> &[String] {
        &self.ai_tags
    }

    pub fn ai_insights(&self) -> Option<&AiInsights> {
        self.ai_insights.as_ref()
    }

    pub fn is_annotated(&self) -> bool {
        self.ai_insights.is_some()
    }

    pub fn has_ai_tag(&self, tag: &str) -> bool {
        self.ai_tags.iter().any(|t| t == tag)
    }

    /// Changes bucket and keeps the annotation invariant: leaving `index`
    /// always clears tags and insights, entering `index` attaches `annotation`
    /// when one is given.
    pub(crate) fn set_bucket(&mut self, bucket: Bucket, annotation: Option<AiAnnotation>) {
        self.bucket = bucket;
        self.is_customer_facing = bucket.is_customer_facing();

        if bucket != Bucket::Index {
            self.clear_annotation();
            return;
        }

        if let Some(annotation) = annotation {
            self.annotate(annotation);
        }
    }

    fn annotate(&mut self, annotation: AiAnnotation) {
        self.ai_tags = annotation.tags;
        self.ai_insights = Some(annotation.insights);
    }

    fn clear_annotation(&mut self) {
        self.ai_tags.clear();
        self.ai_insights = None;
    }

    pub(crate) fn toggle_favorite(&mut self) {
        self.is_favorite = !self.is_favorite;
    }

    /// Returns false when the tag was already present or is blank.
    pub(crate) fn add_manual_tag(&mut self, tag: &str) -> bool {
        let tag = normalize_tag(tag);
        if tag.is_empty() || self.manual_tags.contains(&tag) {
            return false;
        }
        self.manual_tags.push(tag);
        true
    }

    pub(crate) fn remove_manual_tag(&mut self, tag: &str) -> bool {
        let tag = normalize_tag(tag);
        let before = self.manual_tags.len();
        self.manual_tags.retain(|t| t != &tag);
        self.manual_tags.len() != before
    }
}
