use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

/// Classification of a photo within a booking. A photo is in exactly one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// Raw captures straight off the camera.
    Capture,
    /// Customer-facing photos. Older data calls this bucket `output`.
    #[serde(alias = "output")]
    Index,
    /// Preselection.
    Selects,
    /// Discarded.
    Trash,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Capture => "capture",
            Bucket::Index => "index",
            Bucket::Selects => "selects",
            Bucket::Trash => "trash",
        }
    }

    pub fn is_customer_facing(&self) -> bool {
        *self == Bucket::Index
    }

    /// Photos in these buckets have been through editing.
    pub fn is_processed(&self) -> bool {
        matches!(self, Bucket::Index | Bucket::Selects)
    }
}

impl Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown bucket: {0}")]
pub struct UnknownBucket(pub String);

impl FromStr for Bucket {
    type Err = UnknownBucket;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "capture" => Ok(Bucket::Capture),
            "index" | "output" => Ok(Bucket::Index),
            "selects" => Ok(Bucket::Selects),
            "trash" => Ok(Bucket::Trash),
            _ => Err(UnknownBucket(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_wire_values() {
        let values: Vec<String> = Bucket::iter().map(|bucket| bucket.to_string()).collect();
        assert_eq!(values, vec!["capture", "index", "selects", "trash"]);

        for bucket in Bucket::iter() {
            let json = serde_json::to_string(&bucket).unwrap();
            assert_eq!(json, format!("\"{}\"", bucket.as_str()));
        }
    }

    #[test]
    fn test_legacy_output_is_index() {
        assert_eq!("output".parse::<Bucket>(), Ok(Bucket::Index));
        let parsed: Bucket = serde_json::from_str("\"output\"").unwrap();
        assert_eq!(parsed, Bucket::Index);
        assert_eq!(parsed.to_string(), "index");
    }

    #[test]
    fn test_unknown_bucket() {
        assert_eq!(
            "archive".parse::<Bucket>(),
            Err(UnknownBucket("archive".to_string()))
        );
    }

    #[test]
    fn test_customer_facing_and_processed() {
        assert!(Bucket::Index.is_customer_facing());
        assert!(!Bucket::Selects.is_customer_facing());
        assert!(Bucket::Index.is_processed());
        assert!(Bucket::Selects.is_processed());
        assert!(!Bucket::Capture.is_processed());
        assert!(!Bucket::Trash.is_processed());
    }
}
