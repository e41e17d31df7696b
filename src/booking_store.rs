use chrono::Utc;
use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::{
    dependencies::Shared,
    event_bus::{EventBus, EventBusId, PhotoBucketChanged},
    model::booking::{Booking, BookingCountsUpdate, BookingStatus, SessionType},
    photo_store::BucketMetrics,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingStoreError {
    #[error("Booking not found: {0}")]
    BookingNotFound(String),
}

#[derive(Clone, Default)]
pub struct BookingStore {
    bookings: Shared<IndexMap<String, Booking>>,
}

impl BookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a booking, returning the previous record.
    pub fn insert(&self, booking: Booking) -> Option<Booking> {
        self.bookings
            .with_lock_mut(|bookings| bookings.insert(booking.id.clone(), booking))
    }

    pub fn get_by_id(&self, booking_id: &str) -> Option<Booking> {
        self.bookings
            .with_lock(|bookings| bookings.get(booking_id).cloned())
    }

    pub fn len(&self) -> usize {
        self.bookings.with_lock(|bookings| bookings.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn list_by_client(&self, client_id: &str) -> Vec<Booking> {
        self.filter(|booking| booking.client_id == client_id)
    }

    pub fn list_by_status(&self, status: BookingStatus) -> Vec<Booking> {
        self.filter(|booking| booking.status == status)
    }

    pub fn list_by_session_type(&self, session_type: SessionType) -> Vec<Booking> {
        self.filter(|booking| booking.session_type == session_type)
    }

    /// Reaching `delivered` stamps `delivered_at`.
    pub fn set_status(
        &self,
        booking_id: &str,
        status: BookingStatus,
    ) -> Result<(), BookingStoreError> {
        self.update(booking_id, |booking| {
            booking.status = status;
            if status == BookingStatus::Delivered && booking.delivered_at.is_none() {
                booking.delivered_at = Some(Utc::now());
            }
            info!("Booking {} is now {}", booking.id, status);
        })
    }

    /// Moves one step along the workflow. Delivered bookings stay delivered.
    pub fn advance_status(&self, booking_id: &str) -> Result<BookingStatus, BookingStoreError> {
        let current = self
            .get_by_id(booking_id)
            .ok_or_else(|| BookingStoreError::BookingNotFound(booking_id.to_string()))?
            .status;

        match current.next() {
            Some(next) => {
                self.set_status(booking_id, next)?;
                Ok(next)
            }
            None => Ok(current),
        }
    }

    pub fn update_counts(
        &self,
        booking_id: &str,
        update: BookingCountsUpdate,
    ) -> Result<(), BookingStoreError> {
        self.update(booking_id, |booking| booking.counts.merge(update))
    }

    /// Overwrites every cached count from the live bucket metrics.
    pub fn recompute_counts(
        &self,
        booking_id: &str,
        metrics: &BucketMetrics,
    ) -> Result<(), BookingStoreError> {
        self.update(booking_id, |booking| {
            booking.counts = metrics.to_counts();
            debug!("Booking {} counts: {:?}", booking.id, booking.counts);
        })
    }

    /// Keeps cached counts in step with every photo bucket change.
    pub fn attach_projector(&self, events: &EventBus<PhotoBucketChanged>) {
        let store = self.clone();
        events.listen(
            EventBusId::BookingProjector,
            Box::new(move |event: PhotoBucketChanged| {
                if let Err(e) = store.recompute_counts(&event.booking_id, &event.metrics) {
                    warn!(
                        "Dropping counts for photo {} ({:?}): {}",
                        event.photo_id, event.change, e
                    );
                }
            }),
        );
        debug!("Booking projector attached");
    }

    fn filter(&self, predicate: impl Fn(&Booking) -> bool) -> Vec<Booking> {
        self.bookings.with_lock(|bookings| {
            bookings
                .values()
                .filter(|booking| predicate(booking))
                .cloned()
                .collect()
        })
    }

    fn update(
        &self,
        booking_id: &str,
        op: impl FnOnce(&mut Booking),
    ) -> Result<(), BookingStoreError> {
        self.bookings
            .with_lock_mut(|bookings| match bookings.get_mut(booking_id) {
                Some(booking) => {
                    op(booking);
                    Ok(())
                }
                None => Err(BookingStoreError::BookingNotFound(booking_id.to_string())),
            })
    }
}
