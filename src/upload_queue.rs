use std::time::Duration;

use indexmap::IndexMap;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::{
    dependencies::Shared,
    id::{next_queue_item_id, uploaded_photo_id},
    model::{
        bucket::Bucket,
        photo::{Photo, RenditionUrls},
        upload::{UploadFile, UploadQueueItem, UploadStatus},
    },
    photo_store::PhotoStore,
    tagger::TaggerError,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// How often progress is recomputed.
    pub frame_interval_ms: u64,
    pub bytes_per_ms: u64,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            bytes_per_ms: 400,
            min_duration_ms: 600,
            max_duration_ms: 2200,
        }
    }
}

impl UploadSettings {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    /// Simulated transfer time: `size / bytes_per_ms`, clamped to the configured bounds.
    pub fn duration_for(&self, size: u64) -> Duration {
        let max = self.max_duration_ms.max(self.min_duration_ms);
        let millis = (size / self.bytes_per_ms.max(1)).clamp(self.min_duration_ms, max);
        Duration::from_millis(millis)
    }
}

fn progress_for(elapsed: Duration, total: Duration) -> u8 {
    if total.is_zero() {
        return 100;
    }
    (elapsed.as_millis() * 100 / total.as_millis()).min(100) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Materialized,
    Failed,
    Cancelled,
}

/// Lives as long as a batch future. Dropping it, on completion or because the
/// caller gave up, cancels unfinished items first and then evicts finished ones.
struct BatchGuard {
    cancel: Option<DropGuard>,
    queue: UploadQueue,
    ids: Vec<String>,
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        drop(self.cancel.take());
        self.queue.evict_done(&self.ids);
    }
}

/// In-flight uploads, keyed by queue item id in submission order.
#[derive(Clone)]
pub struct UploadQueue {
    items: Shared<IndexMap<String, UploadQueueItem>>,
    settings: UploadSettings,
}

impl UploadQueue {
    pub fn new(settings: UploadSettings) -> Self {
        Self {
            items: Shared::default(),
            settings,
        }
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    pub fn items(&self) -> Vec<UploadQueueItem> {
        self.items.with_lock(|items| items.values().cloned().collect())
    }

    pub fn get(&self, id: &str) -> Option<UploadQueueItem> {
        self.items.with_lock(|items| items.get(id).cloned())
    }

    pub fn len(&self) -> usize {
        self.items.with_lock(|items| items.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) -> usize {
        self.items.with_lock_mut(|items| {
            let dropped = items.len();
            items.clear();
            dropped
        })
    }

    fn enqueue(&self, item: UploadQueueItem) {
        self.items.with_lock_mut(|items| {
            items.insert(item.id.clone(), item);
        });
    }

    /// Moves an item one step forward. Backward or skipping steps are refused.
    fn advance(&self, id: &str, status: UploadStatus) -> bool {
        self.items.with_lock_mut(|items| match items.get_mut(id) {
            Some(item) if item.status.can_advance_to(status) => {
                debug!("Upload {} {:?} -> {:?}", id, item.status, status);
                item.status = status;
                if status == UploadStatus::Processing {
                    item.progress = 100;
                }
                true
            }
            Some(item) => {
                warn!(
                    "Refusing upload transition {:?} -> {:?} for {}",
                    item.status, status, id
                );
                false
            }
            None => false,
        })
    }

    fn set_progress(&self, id: &str, progress: u8) {
        self.items.with_lock_mut(|items| {
            if let Some(item) = items.get_mut(id) {
                item.progress = item.progress.max(progress);
            }
        });
    }

    fn remove(&self, id: &str) {
        self.items.with_lock_mut(|items| {
            items.shift_remove(id);
        });
    }

    fn evict_done(&self, ids: &[String]) {
        self.items.with_lock_mut(|items| {
            items.retain(|id, item| !(item.status == UploadStatus::Done && ids.contains(id)));
        });
    }

    /// Uploads every file concurrently and returns how many photos were
    /// committed to `store`. Finished items leave the queue when the whole
    /// batch settles, cancelled ones right away, failed ones stay until cleared.
    /// Dropping the returned future cancels every item that has not finished.
    pub async fn run_batch(
        &self,
        store: &PhotoStore,
        files: Vec<UploadFile>,
        booking_id: &str,
        bucket: Bucket,
        cancel: &CancellationToken,
    ) -> usize {
        if files.is_empty() {
            return 0;
        }

        info!(
            "Uploading {} file(s) to {}/{}",
            files.len(),
            booking_id,
            bucket
        );

        let batch_cancel = cancel.child_token();
        let mut batch = BatchGuard {
            cancel: Some(batch_cancel.clone().drop_guard()),
            queue: self.clone(),
            ids: Vec::with_capacity(files.len()),
        };
        let mut tasks: Vec<JoinHandle<ItemOutcome>> = Vec::with_capacity(files.len());

        for file in files {
            let item = UploadQueueItem::new(next_queue_item_id(booking_id), &file, bucket);
            batch.ids.push(item.id.clone());
            self.enqueue(item.clone());
            self.advance(&item.id, UploadStatus::Uploading);

            let queue = self.clone();
            let store = store.clone();
            let booking_id = booking_id.to_string();
            let cancel = batch_cancel.child_token();
            tasks.push(tokio::spawn(async move {
                queue.run_item(&store, item, &booking_id, &cancel).await
            }));
        }

        let mut materialized = 0;
        for task in tasks {
            match task.await {
                Ok(ItemOutcome::Materialized) => materialized += 1,
                Ok(_) => {}
                Err(e) => error!("Upload task did not finish: {}", e),
            }
        }

        let submitted = batch.ids.len();
        drop(batch);
        info!(
            "Upload batch for {} finished: {}/{} materialized",
            booking_id, materialized, submitted
        );

        materialized
    }

    async fn run_item(
        &self,
        store: &PhotoStore,
        item: UploadQueueItem,
        booking_id: &str,
        cancel: &CancellationToken,
    ) -> ItemOutcome {
        let duration = self.settings.duration_for(item.size);
        let mut ticker = tokio::time::interval(self.settings.frame_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let started = Instant::now();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.cancelled(&item.id),
                _ = ticker.tick() => {}
            }

            let progress = progress_for(started.elapsed(), duration);
            self.set_progress(&item.id, progress);
            if progress >= 100 {
                break;
            }
        }

        self.advance(&item.id, UploadStatus::Processing);

        let photo_id = uploaded_photo_id(&item.id);
        let photo = Photo::new(
            photo_id.clone(),
            booking_id,
            item.file_name.clone(),
            item.bucket,
            RenditionUrls::from_seed(&item.id),
            item.size,
        );

        let photo = if item.bucket == Bucket::Index {
            match store.tagger().generate_with_retry(&item.id, cancel).await {
                Ok(annotation) => photo.with_annotation(annotation),
                Err(TaggerError::Cancelled) => return self.cancelled(&item.id),
                Err(e) => {
                    error!("Upload of {} failed: {}", item.file_name, e);
                    self.advance(&item.id, UploadStatus::Failed);
                    return ItemOutcome::Failed;
                }
            }
        } else {
            photo
        };

        if cancel.is_cancelled() {
            return self.cancelled(&item.id);
        }

        store.insert(photo);
        self.advance(&item.id, UploadStatus::Done);
        debug!("Upload {} done as {}", item.id, photo_id);

        // The batch may have been dropped after its last eviction.
        if cancel.is_cancelled() {
            self.remove(&item.id);
        }

        ItemOutcome::Materialized
    }

    fn cancelled(&self, id: &str) -> ItemOutcome {
        debug!("Upload {} cancelled", id);
        self.remove(id);
        ItemOutcome::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        event_bus::EventBus,
        tagger::{Tagger, TaggerSettings},
    };
    use std::sync::Arc;

    fn create_test_store(tagger: Tagger) -> PhotoStore {
        PhotoStore::new(Arc::new(EventBus::new()), tagger, UploadSettings::default())
    }

    fn files(sizes: &[u64]) -> Vec<UploadFile> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, size)| UploadFile::new(format!("IMG_{i:04}.jpg"), *size))
            .collect()
    }

    #[test]
    fn test_duration_is_clamped() {
        let settings = UploadSettings::default();
        assert_eq!(settings.duration_for(0), Duration::from_millis(600));
        assert_eq!(settings.duration_for(400_000), Duration::from_millis(1000));
        assert_eq!(settings.duration_for(50_000_000), Duration::from_millis(2200));

        let inverted = UploadSettings {
            min_duration_ms: 500,
            max_duration_ms: 100,
            ..Default::default()
        };
        assert_eq!(inverted.duration_for(10), Duration::from_millis(500));
    }

    #[test]
    fn test_progress_for() {
        let total = Duration::from_millis(1000);
        assert_eq!(progress_for(Duration::ZERO, total), 0);
        assert_eq!(progress_for(Duration::from_millis(250), total), 25);
        assert_eq!(progress_for(Duration::from_millis(5000), total), 100);
        assert_eq!(progress_for(Duration::from_millis(1), Duration::ZERO), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_batch_has_no_ai_metadata() {
        let store = create_test_store(Tagger::default());

        let count = store.upload(files(&[1_000, 2_000, 3_000]), "bk_x", Bucket::Capture).await;

        assert_eq!(count, 3);
        let photos = store.list_by_booking("bk_x", Some(Bucket::Capture));
        assert_eq!(photos.len(), 3);
        assert!(photos.iter().all(|photo| !photo.is_annotated()));
        assert!(photos.iter().all(|photo| photo.ai_tags().is_empty()));
        assert!(store.upload_queue().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_index_batch_is_tagged() {
        let store = create_test_store(Tagger::default());

        let count = store.upload(files(&[10_000, 20_000]), "bk_x", Bucket::Index).await;

        assert_eq!(count, 2);
        let photos = store.list_by_booking("bk_x", None);
        assert_eq!(photos.len(), 2);
        for photo in photos {
            assert!(photo.id.starts_with("upload_bk_x_"));
            let queue_id = photo.id.trim_start_matches("upload_");
            let face_ids = &photo.ai_insights().unwrap().face_ids;
            assert!(face_ids.iter().all(|id| id.starts_with(&format!("{queue_id}_face_"))));
            assert!(photo.is_customer_facing());
            assert!(photo.ai_insights().is_some());
            assert!(!photo.ai_tags().is_empty());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_takes_simulated_duration() {
        let store = create_test_store(Tagger::default());
        let start = Instant::now();

        store.upload(files(&[400_000]), "bk_x", Bucket::Capture).await;

        let elapsed = start.elapsed().as_millis();
        assert!((1000..1100).contains(&elapsed), "elapsed {elapsed}ms");
    }

    #[tokio::test(start_paused = true)]
    async fn test_smaller_file_finishes_first() {
        let store = create_test_store(Tagger::default());
        let batch = vec![
            UploadFile::new("large.jpg", 880_000),
            UploadFile::new("small.jpg", 1_000),
        ];

        store.upload(batch, "bk_x", Bucket::Capture).await;

        let names: Vec<String> = store
            .list_by_booking("bk_x", None)
            .into_iter()
            .map(|photo| photo.file_name)
            .collect();
        assert_eq!(names, vec!["small.jpg", "large.jpg"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_is_visible_while_uploading() {
        let store = create_test_store(Tagger::default());
        let upload = {
            let store = store.clone();
            tokio::spawn(async move {
                let batch = vec![UploadFile::with_content("a.jpg", vec![0; 400_000])];
                store.upload(batch, "bk_x", Bucket::Capture).await
            })
        };

        tokio::time::sleep(Duration::from_millis(500)).await;
        let queue = store.upload_queue();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].status, UploadStatus::Uploading);
        assert!(queue[0].progress > 0 && queue[0].progress < 100);
        assert_eq!(
            queue[0].preview,
            Some(format!("preview://{}", queue[0].id))
        );

        assert_eq!(upload.await.unwrap(), 1);
        assert!(store.upload_queue().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_batch_materializes_nothing() {
        let store = create_test_store(Tagger::default());
        let cancel = CancellationToken::new();
        let upload = {
            let store = store.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let batch = files(&[100_000, 800_000]);
                store
                    .upload_with_cancel(batch, "bk_x", Bucket::Index, &cancel)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel.cancel();

        assert_eq!(upload.await.unwrap(), 0);
        assert!(store.is_empty());
        assert!(store.upload_queue().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_batch_leaves_nothing_behind() {
        let store = create_test_store(Tagger::default());

        let result = tokio::time::timeout(
            Duration::from_millis(100),
            store.upload(files(&[1_000, 2_000]), "bk_x", Bucket::Capture),
        )
        .await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(store.is_empty());
        assert!(store.upload_queue().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_batch_keeps_finished_photos_only() {
        let store = create_test_store(Tagger::default());
        let batch = vec![
            UploadFile::new("quick.jpg", 1_000),
            UploadFile::new("slow.jpg", 800_000),
        ];

        let result = tokio::time::timeout(
            Duration::from_millis(1000),
            store.upload(batch, "bk_x", Bucket::Capture),
        )
        .await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_secs(10)).await;
        let names: Vec<String> = store
            .list_by_booking("bk_x", None)
            .into_iter()
            .map(|photo| photo.file_name)
            .collect();
        assert_eq!(names, vec!["quick.jpg"]);
        assert!(store.upload_queue().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tagging_keeps_item_in_queue() {
        let store = create_test_store(Tagger::new(TaggerSettings {
            failure_rate: 1.0,
            max_attempts: 2,
            ..Default::default()
        }));

        let count = store.upload(files(&[1_000, 2_000]), "bk_x", Bucket::Index).await;

        assert_eq!(count, 0);
        assert!(store.is_empty());
        let queue = store.upload_queue();
        assert_eq!(queue.len(), 2);
        assert!(queue.iter().all(|item| item.status == UploadStatus::Failed));
        assert_eq!(store.clear_queue(), 2);
        assert!(store.upload_queue().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_batch() {
        let store = create_test_store(Tagger::default());
        assert_eq!(store.upload(Vec::new(), "bk_x", Bucket::Index).await, 0);
        assert!(store.upload_queue().is_empty());
    }

    #[test]
    fn test_advance_refuses_skipped_steps() {
        let queue = UploadQueue::new(UploadSettings::default());
        let item = UploadQueueItem::new("q1", &UploadFile::new("a.jpg", 1), Bucket::Capture);
        queue.enqueue(item);

        assert!(!queue.advance("q1", UploadStatus::Done));
        assert!(queue.advance("q1", UploadStatus::Uploading));
        assert!(queue.advance("q1", UploadStatus::Processing));
        assert_eq!(queue.get("q1").map(|item| item.progress), Some(100));
        assert!(queue.advance("q1", UploadStatus::Done));
        assert!(!queue.advance("missing", UploadStatus::Uploading));
    }
}
