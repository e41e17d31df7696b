use std::sync::Arc;

use log::{info, warn};
use parking_lot::RwLock;

use crate::{
    booking_store::BookingStore,
    config::PortalConfig,
    event_bus::{EventBus, PhotoBucketChanged},
    model::booking::Booking,
    photo_store::PhotoStore,
    tagger::Tagger,
};

/// Shared state with copy-on-write writes.
///
/// Readers either borrow under the read lock or take an `Arc` snapshot that
/// never changes underneath them. A write clones the value only while a
/// snapshot of the previous version is still alive.
pub struct Shared<T>(Arc<RwLock<Arc<T>>>);

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Clone> Shared<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(RwLock::new(Arc::new(value))))
    }

    pub fn snapshot(&self) -> Arc<T> {
        self.0.read().clone()
    }

    pub fn with_lock<R>(&self, op: impl FnOnce(&T) -> R) -> R {
        op(&self.0.read())
    }

    pub fn with_lock_mut<R>(&self, op: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.0.write();
        op(Arc::make_mut(&mut guard))
    }
}

impl<T: Clone + Default> Default for Shared<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// The process-wide services, built once and handed to whoever needs them.
#[derive(Clone)]
pub struct Dependencies {
    pub events: Arc<EventBus<PhotoBucketChanged>>,
    pub tagger: Tagger,
    pub photos: PhotoStore,
    pub bookings: BookingStore,
}

impl Dependencies {
    pub fn new(config: &PortalConfig) -> Self {
        let events = Arc::new(EventBus::new());
        let tagger = Tagger::new(config.tagger.clone());
        let photos = PhotoStore::new(Arc::clone(&events), tagger.clone(), config.upload.clone());
        let bookings = BookingStore::new();
        bookings.attach_projector(&events);

        info!(
            "Services ready (deterministic tagging: {}, tag failure rate: {})",
            config.tagger.deterministic, config.tagger.failure_rate
        );

        Self {
            events,
            tagger,
            photos,
            bookings,
        }
    }

    /// Adds a booking with counts taken from the photos it already has.
    pub fn register_booking(&self, booking: Booking) -> Option<Booking> {
        let booking_id = booking.id.clone();
        let previous = self.bookings.insert(booking);
        self.photos.with_bucket_metrics(&booking_id, |metrics| {
            if let Err(e) = self.bookings.recompute_counts(&booking_id, metrics) {
                warn!("Could not seed counts for {}: {}", booking_id, e);
            }
        });
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        booking::{Booking, SessionType},
        bucket::Bucket,
        photo::{Photo, RenditionUrls},
        upload::UploadFile,
    };
    use chrono::NaiveDate;

    #[test]
    fn test_snapshot_is_stable_across_writes() {
        let shared = Shared::new(vec![1, 2, 3]);
        let before = shared.snapshot();

        shared.with_lock_mut(|values| values.push(4));

        assert_eq!(*before, vec![1, 2, 3]);
        assert_eq!(*shared.snapshot(), vec![1, 2, 3, 4]);
        assert_eq!(shared.with_lock(|values| values.len()), 4);
    }

    #[test]
    fn test_clones_share_state() {
        let shared: Shared<Vec<u8>> = Shared::default();
        let other = shared.clone();
        other.with_lock_mut(|values| values.push(9));
        assert_eq!(*shared.snapshot(), vec![9]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_index_upload_raises_booking_counts() {
        let deps = Dependencies::new(&PortalConfig::default());
        deps.register_booking(Booking::new(
            "bk_1",
            "cl_1",
            "Family session",
            NaiveDate::from_ymd_opt(2026, 5, 2).unwrap(),
            SessionType::Family,
        ));

        let captured = deps
            .photos
            .upload(
                vec![UploadFile::new("a.jpg", 1_000), UploadFile::new("b.jpg", 2_000)],
                "bk_1",
                Bucket::Capture,
            )
            .await;
        assert_eq!(captured, 2);
        let before = deps.bookings.get_by_id("bk_1").unwrap().counts;
        assert_eq!(before.customer_facing, 0);
        assert_eq!(before.captured, 2);

        let uploaded = deps
            .photos
            .upload(
                vec![UploadFile::new("c.jpg", 500_000), UploadFile::new("d.png", 90_000)],
                "bk_1",
                Bucket::Index,
            )
            .await;
        assert_eq!(uploaded, 2);

        let after = deps.bookings.get_by_id("bk_1").unwrap().counts;
        assert_eq!(after.customer_facing, before.customer_facing + 2);
        assert_eq!(after.captured, 4);
        assert_eq!(after.processed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_mutation_path_keeps_counts_consistent() {
        let deps = Dependencies::new(&PortalConfig::default());
        deps.register_booking(Booking::new(
            "bk_2",
            "cl_1",
            "Graduation",
            NaiveDate::from_ymd_opt(2026, 6, 20).unwrap(),
            SessionType::Graduation,
        ));

        deps.photos
            .upload(
                (0..4)
                    .map(|i| UploadFile::new(format!("{i}.jpg"), 10_000))
                    .collect(),
                "bk_2",
                Bucket::Capture,
            )
            .await;
        let ids: Vec<String> = deps
            .photos
            .list_by_booking("bk_2", None)
            .into_iter()
            .map(|photo| photo.id)
            .collect();

        deps.photos.move_photo(&ids[0], Bucket::Index).await.unwrap();
        deps.photos.move_photo(&ids[1], Bucket::Selects).await.unwrap();
        deps.photos.move_photo(&ids[2], Bucket::Trash).await.unwrap();
        deps.photos.delete(&ids[3]);

        let metrics = deps.photos.bucket_metrics("bk_2");
        let counts = deps.bookings.get_by_id("bk_2").unwrap().counts;
        assert_eq!(counts, metrics.to_counts());
        assert_eq!(counts.captured, 3);
        assert_eq!(counts.processed, 2);
        assert_eq!(counts.customer_facing, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_booking_registered_after_uploads_gets_counts() {
        let deps = Dependencies::new(&PortalConfig::default());
        deps.photos
            .upload(vec![UploadFile::new("early.jpg", 1_000)], "bk_3", Bucket::Capture)
            .await;

        deps.register_booking(Booking::new(
            "bk_3",
            "cl_2",
            "Corporate headshots",
            NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
            SessionType::Corporate,
        ));

        let counts = deps.bookings.get_by_id("bk_3").unwrap().counts;
        assert_eq!(counts, deps.photos.bucket_metrics("bk_3").to_counts());
        assert_eq!(counts.captured, 1);
    }

    #[test]
    fn test_rehomed_photo_leaves_old_booking_consistent() {
        let deps = Dependencies::new(&PortalConfig::default());
        for id in ["bk_a", "bk_b"] {
            deps.register_booking(Booking::new(
                id,
                "cl_1",
                "Event",
                NaiveDate::from_ymd_opt(2026, 8, 8).unwrap(),
                SessionType::Event,
            ));
        }
        let photo = |booking_id: &str| {
            Photo::new(
                "p1",
                booking_id,
                "p1.jpg",
                Bucket::Capture,
                RenditionUrls::from_seed("p1"),
                10,
            )
        };

        deps.photos.insert(photo("bk_a"));
        deps.photos.insert(photo("bk_b"));

        for id in ["bk_a", "bk_b"] {
            let counts = deps.bookings.get_by_id(id).unwrap().counts;
            assert_eq!(counts, deps.photos.bucket_metrics(id).to_counts());
        }
        assert_eq!(deps.bookings.get_by_id("bk_a").unwrap().counts.captured, 0);
        assert_eq!(deps.bookings.get_by_id("bk_b").unwrap().counts.captured, 1);
    }
}
