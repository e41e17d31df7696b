use std::{collections::BTreeSet, sync::Arc};

use chrono::Utc;
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{
    dependencies::Shared,
    event_bus::{BucketChange, EventBus, PhotoBucketChanged},
    id::next_comment_id,
    model::{
        booking::BookingCounts,
        bucket::Bucket,
        photo::{Comment, Photo},
        upload::{UploadFile, UploadQueueItem},
    },
    tagger::{Tagger, TaggerError},
    upload_queue::{UploadQueue, UploadSettings},
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PhotoStoreError {
    #[error("Photo not found: {0}")]
    PhotoNotFound(String),

    #[error("Tagging failed: {0}")]
    Tagging(#[from] TaggerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The photo was already in the target bucket.
    Unchanged,
    Moved { tagged: bool },
}

/// Photo count per bucket for one booking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BucketMetrics {
    pub capture: usize,
    pub index: usize,
    pub selects: usize,
    pub trash: usize,
}

impl BucketMetrics {
    pub fn get(&self, bucket: Bucket) -> usize {
        match bucket {
            Bucket::Capture => self.capture,
            Bucket::Index => self.index,
            Bucket::Selects => self.selects,
            Bucket::Trash => self.trash,
        }
    }

    fn increment(&mut self, bucket: Bucket) {
        match bucket {
            Bucket::Capture => self.capture += 1,
            Bucket::Index => self.index += 1,
            Bucket::Selects => self.selects += 1,
            Bucket::Trash => self.trash += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.capture + self.index + self.selects + self.trash
    }

    pub fn to_counts(&self) -> BookingCounts {
        BookingCounts {
            captured: self.total(),
            processed: self.index + self.selects,
            customer_facing: self.index,
        }
    }
}

/// Client-side photo filter. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PhotoQuery {
    pub booking_id: Option<String>,
    pub bucket: Option<Bucket>,
    /// Case-insensitive match on file name or any AI tag.
    pub search: Option<String>,
    /// Every listed AI tag must be present.
    pub tags: Vec<String>,
    pub favorites_only: bool,
}

impl PhotoQuery {
    pub fn for_booking(booking_id: impl Into<String>) -> Self {
        Self {
            booking_id: Some(booking_id.into()),
            ..Default::default()
        }
    }

    pub fn in_bucket(mut self, bucket: Bucket) -> Self {
        self.bucket = Some(bucket);
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn favorites_only(mut self) -> Self {
        self.favorites_only = true;
        self
    }

    pub fn matches(&self, photo: &Photo) -> bool {
        if let Some(booking_id) = &self.booking_id {
            if &photo.booking_id != booking_id {
                return false;
            }
        }

        if let Some(bucket) = self.bucket {
            if photo.bucket() != bucket {
                return false;
            }
        }

        if self.favorites_only && !photo.is_favorite {
            return false;
        }

        if !self.tags.iter().all(|tag| photo.has_ai_tag(tag)) {
            return false;
        }

        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(search) => {
                let search = search.to_lowercase();
                photo.file_name.to_lowercase().contains(&search)
                    || photo
                        .ai_tags()
                        .iter()
                        .any(|tag| tag.to_lowercase().contains(&search))
            }
        }
    }
}

type PhotoCollection = IndexMap<String, Photo>;

fn metrics_for(photos: &PhotoCollection, booking_id: &str) -> BucketMetrics {
    let mut metrics = BucketMetrics::default();
    photos
        .values()
        .filter(|photo| photo.booking_id == booking_id)
        .for_each(|photo| metrics.increment(photo.bucket()));
    metrics
}

/// The authoritative photo collection.
///
/// Every write that changes bucket membership publishes a
/// [`PhotoBucketChanged`] while the write is still held, so listeners see
/// changes in the order they were applied. Listeners must not call back
/// into the store.
#[derive(Clone)]
pub struct PhotoStore {
    photos: Shared<PhotoCollection>,
    events: Arc<EventBus<PhotoBucketChanged>>,
    tagger: Tagger,
    uploads: UploadQueue,
}

impl PhotoStore {
    pub fn new(
        events: Arc<EventBus<PhotoBucketChanged>>,
        tagger: Tagger,
        upload_settings: UploadSettings,
    ) -> Self {
        Self {
            photos: Shared::new(IndexMap::new()),
            events,
            tagger,
            uploads: UploadQueue::new(upload_settings),
        }
    }

    pub fn tagger(&self) -> &Tagger {
        &self.tagger
    }

    pub fn len(&self) -> usize {
        self.photos.with_lock(|photos| photos.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, photo_id: &str) -> Option<Photo> {
        self.photos.with_lock(|photos| photos.get(photo_id).cloned())
    }

    /// Adds or replaces a photo. Returns the replaced record, if any.
    /// Replacing a photo that belonged to another booking counts as a removal
    /// there and an addition here.
    pub fn insert(&self, photo: Photo) -> Option<Photo> {
        self.photos.with_lock_mut(|photos| {
            let booking_id = photo.booking_id.clone();
            let photo_id = photo.id.clone();
            let bucket = photo.bucket();
            let previous = photos.insert(photo_id.clone(), photo);

            let change = match &previous {
                Some(previous) if previous.booking_id != booking_id => {
                    info!(
                        "Photo {} moved from booking {} to {}",
                        photo_id, previous.booking_id, booking_id
                    );
                    self.publish(
                        photos,
                        previous.booking_id.clone(),
                        photo_id.clone(),
                        BucketChange::Removed(previous.bucket()),
                    );
                    BucketChange::Added(bucket)
                }
                Some(previous) => BucketChange::Moved {
                    from: previous.bucket(),
                    to: bucket,
                },
                None => BucketChange::Added(bucket),
            };
            debug!("Stored photo {} in {}/{}", photo_id, booking_id, bucket);
            self.publish(photos, booking_id, photo_id, change);

            previous
        })
    }

    /// Filters by booking and optionally by bucket, in insertion order.
    pub fn list_by_booking(&self, booking_id: &str, bucket: Option<Bucket>) -> Vec<Photo> {
        self.photos.with_lock(|photos| {
            photos
                .values()
                .filter(|photo| {
                    photo.booking_id == booking_id && bucket.is_none_or(|b| photo.bucket() == b)
                })
                .cloned()
                .collect()
        })
    }

    pub fn list_by_bucket(&self, bucket: Bucket) -> Vec<Photo> {
        self.photos.with_lock(|photos| {
            photos
                .values()
                .filter(|photo| photo.bucket() == bucket)
                .cloned()
                .collect()
        })
    }

    /// Every customer-facing photo across bookings.
    pub fn index_photos(&self) -> Vec<Photo> {
        self.list_by_bucket(Bucket::Index)
    }

    /// Filters a snapshot, so long searches never hold up writers.
    pub fn query(&self, query: &PhotoQuery) -> Vec<Photo> {
        self.photos
            .snapshot()
            .values()
            .filter(|photo| query.matches(photo))
            .cloned()
            .collect()
    }

    /// Sorted AI tags present on customer-facing photos.
    pub fn all_tags(&self) -> Vec<String> {
        self.photos.with_lock(|photos| {
            photos
                .values()
                .filter(|photo| photo.is_customer_facing())
                .flat_map(|photo| photo.ai_tags().iter().cloned())
                .collect::<BTreeSet<String>>()
                .into_iter()
                .collect()
        })
    }

    pub fn bucket_metrics(&self, booking_id: &str) -> BucketMetrics {
        self.photos.with_lock(|photos| metrics_for(photos, booking_id))
    }

    /// Runs `op` on the current metrics while photo writes are held off, so
    /// nothing `op` does can be overtaken by a later [`PhotoBucketChanged`].
    pub fn with_bucket_metrics<R>(
        &self,
        booking_id: &str,
        op: impl FnOnce(&BucketMetrics) -> R,
    ) -> R {
        self.photos
            .with_lock(|photos| op(&metrics_for(photos, booking_id)))
    }

    pub async fn move_photo(
        &self,
        photo_id: &str,
        target: Bucket,
    ) -> Result<MoveOutcome, PhotoStoreError> {
        self.move_photo_with_cancel(photo_id, target, &CancellationToken::new())
            .await
    }

    /// Moves a photo between buckets. Entering `index` without insights runs
    /// the tagger first; leaving `index` drops tags and insights.
    pub async fn move_photo_with_cancel(
        &self,
        photo_id: &str,
        target: Bucket,
        cancel: &CancellationToken,
    ) -> Result<MoveOutcome, PhotoStoreError> {
        let current = self
            .get(photo_id)
            .ok_or_else(|| PhotoStoreError::PhotoNotFound(photo_id.to_string()))?;

        if current.bucket() == target {
            debug!("Photo {} is already in {}", photo_id, target);
            return Ok(MoveOutcome::Unchanged);
        }

        let annotation = if target == Bucket::Index && !current.is_annotated() {
            let seed = if self.tagger.settings().deterministic {
                photo_id.to_string()
            } else {
                format!("{}_{}", photo_id, Utc::now().timestamp_millis())
            };
            Some(self.tagger.generate_with_retry(&seed, cancel).await?)
        } else {
            None
        };

        self.photos.with_lock_mut(|photos| {
            // Re-read: the photo may have changed while the tagger ran.
            let photo = photos
                .get_mut(photo_id)
                .ok_or_else(|| PhotoStoreError::PhotoNotFound(photo_id.to_string()))?;

            let from = photo.bucket();
            if from == target {
                return Ok(MoveOutcome::Unchanged);
            }

            let tagged = annotation.is_some();
            photo.set_bucket(target, annotation);
            let booking_id = photo.booking_id.clone();

            info!(
                "Moved photo {} from {} to {}{}",
                photo_id,
                from,
                target,
                if tagged { " (tagged)" } else { "" }
            );
            self.publish(
                photos,
                booking_id,
                photo_id.to_string(),
                BucketChange::Moved { from, to: target },
            );

            Ok(MoveOutcome::Moved { tagged })
        })
    }

    /// Removes a photo. Missing ids are fine and return `None`.
    pub fn delete(&self, photo_id: &str) -> Option<Photo> {
        self.photos.with_lock_mut(|photos| {
            let removed = photos.shift_remove(photo_id)?;
            info!("Deleted photo {} from {}", photo_id, removed.booking_id);
            self.publish(
                photos,
                removed.booking_id.clone(),
                photo_id.to_string(),
                BucketChange::Removed(removed.bucket()),
            );
            Some(removed)
        })
    }

    /// Returns the new favorite state.
    pub fn toggle_favorite(&self, photo_id: &str) -> Result<bool, PhotoStoreError> {
        self.update(photo_id, |photo| {
            photo.toggle_favorite();
            photo.is_favorite
        })
    }

    pub fn add_comment(
        &self,
        photo_id: &str,
        author: &str,
        text: &str,
    ) -> Result<Comment, PhotoStoreError> {
        let comment = Comment {
            id: next_comment_id(),
            author: author.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
        };
        self.update(photo_id, |photo| {
            photo.comments.push(comment.clone());
            comment
        })
    }

    /// Returns false when the tag was already there.
    pub fn add_manual_tag(&self, photo_id: &str, tag: &str) -> Result<bool, PhotoStoreError> {
        self.update(photo_id, |photo| photo.add_manual_tag(tag))
    }

    /// Returns false when the tag was not there.
    pub fn remove_manual_tag(&self, photo_id: &str, tag: &str) -> Result<bool, PhotoStoreError> {
        self.update(photo_id, |photo| photo.remove_manual_tag(tag))
    }

    /// Uploads a batch and returns how many photos were materialized.
    pub async fn upload(&self, files: Vec<UploadFile>, booking_id: &str, bucket: Bucket) -> usize {
        self.upload_with_cancel(files, booking_id, bucket, &CancellationToken::new())
            .await
    }

    pub async fn upload_with_cancel(
        &self,
        files: Vec<UploadFile>,
        booking_id: &str,
        bucket: Bucket,
        cancel: &CancellationToken,
    ) -> usize {
        self.uploads
            .run_batch(self, files, booking_id, bucket, cancel)
            .await
    }

    pub fn upload_queue(&self) -> Vec<UploadQueueItem> {
        self.uploads.items()
    }

    /// Drops every queued item, finished or not. Returns how many were dropped.
    pub fn clear_queue(&self) -> usize {
        self.uploads.clear()
    }

    fn update<R>(
        &self,
        photo_id: &str,
        op: impl FnOnce(&mut Photo) -> R,
    ) -> Result<R, PhotoStoreError> {
        self.photos.with_lock_mut(|photos| match photos.get_mut(photo_id) {
            Some(photo) => Ok(op(photo)),
            None => {
                warn!("Photo not found: {}", photo_id);
                Err(PhotoStoreError::PhotoNotFound(photo_id.to_string()))
            }
        })
    }

    fn publish(
        &self,
        photos: &PhotoCollection,
        booking_id: String,
        photo_id: String,
        change: BucketChange,
    ) {
        let metrics = metrics_for(photos, &booking_id);
        self.events.emit(PhotoBucketChanged {
            booking_id,
            photo_id,
            change,
            metrics,
        });
    }
}
