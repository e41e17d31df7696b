use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Individual,
    Family,
    Graduation,
    Corporate,
    Event,
    Other,
}

impl Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionType::Individual => write!(f, "individual"),
            SessionType::Family => write!(f, "family"),
            SessionType::Graduation => write!(f, "graduation"),
            SessionType::Corporate => write!(f, "corporate"),
            SessionType::Event => write!(f, "event"),
            SessionType::Other => write!(f, "other"),
        }
    }
}

/// Booking workflow, in order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    SessionScheduled,
    SessionConcluded,
    IndexPrepared,
    IndexSent,
    ClientSelection,
    ExtraPhotos,
    Production,
    EditingApproval,
    SentToPrint,
    PhotosInStudio,
    Delivered,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::SessionScheduled => "session_scheduled",
            BookingStatus::SessionConcluded => "session_concluded",
            BookingStatus::IndexPrepared => "index_prepared",
            BookingStatus::IndexSent => "index_sent",
            BookingStatus::ClientSelection => "client_selection",
            BookingStatus::ExtraPhotos => "extra_photos",
            BookingStatus::Production => "production",
            BookingStatus::EditingApproval => "editing_approval",
            BookingStatus::SentToPrint => "sent_to_print",
            BookingStatus::PhotosInStudio => "photos_in_studio",
            BookingStatus::Delivered => "delivered",
        }
    }

    /// The following workflow step, `None` once delivered.
    pub fn next(&self) -> Option<BookingStatus> {
        match self {
            BookingStatus::SessionScheduled => Some(BookingStatus::SessionConcluded),
            BookingStatus::SessionConcluded => Some(BookingStatus::IndexPrepared),
            BookingStatus::IndexPrepared => Some(BookingStatus::IndexSent),
            BookingStatus::IndexSent => Some(BookingStatus::ClientSelection),
            BookingStatus::ClientSelection => Some(BookingStatus::ExtraPhotos),
            BookingStatus::ExtraPhotos => Some(BookingStatus::Production),
            BookingStatus::Production => Some(BookingStatus::EditingApproval),
            BookingStatus::EditingApproval => Some(BookingStatus::SentToPrint),
            BookingStatus::SentToPrint => Some(BookingStatus::PhotosInStudio),
            BookingStatus::PhotosInStudio => Some(BookingStatus::Delivered),
            BookingStatus::Delivered => None,
        }
    }
}

impl Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown booking status: {0}")]
pub struct UnknownBookingStatus(pub String);

impl FromStr for BookingStatus {
    type Err = UnknownBookingStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use strum::IntoEnumIterator;

        BookingStatus::iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownBookingStatus(s.to_string()))
    }
}

/// Cached per-booking photo counts. The photo collection is the source of truth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCounts {
    pub captured: usize,
    pub processed: usize,
    pub customer_facing: usize,
}

/// Partial update merged into [`BookingCounts`]; `None` leaves a field as is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookingCountsUpdate {
    pub captured: Option<usize>,
    pub processed: Option<usize>,
    pub customer_facing: Option<usize>,
}

impl BookingCounts {
    pub fn merge(&mut self, update: BookingCountsUpdate) {
        if let Some(captured) = update.captured {
            self.captured = captured;
        }
        if let Some(processed) = update.processed {
            self.processed = processed;
        }
        if let Some(customer_facing) = update.customer_facing {
            self.customer_facing = customer_facing;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub client_id: String,
    pub title: String,
    pub session_date: NaiveDate,
    pub session_type: SessionType,
    pub location: String,
    pub status: BookingStatus,
    pub counts: BookingCounts,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub internal_notes: String,
}

impl Booking {
    pub fn new(
        id: impl Into<String>,
        client_id: impl Into<String>,
        title: impl Into<String>,
        session_date: NaiveDate,
        session_type: SessionType,
    ) -> Self {
        Self {
            id: id.into(),
            client_id: client_id.into(),
            title: title.into(),
            session_date,
            session_type,
            location: String::new(),
            status: BookingStatus::SessionScheduled,
            counts: BookingCounts::default(),
            created_at: Utc::now(),
            delivered_at: None,
            internal_notes: String::new(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }
}
