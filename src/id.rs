use chrono::Utc;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

struct IdGenerator {
    next_id: u64,
}

fn next_id() -> u64 {
    static ID_GENERATOR: Lazy<Mutex<IdGenerator>> =
        Lazy::new(|| Mutex::new(IdGenerator { next_id: 0 }));
    let mut id_generator = ID_GENERATOR.lock();
    let id = id_generator.next_id;
    id_generator.next_id += 1;
    id
}

/// `{booking_id}_{unix_millis}_{sequence}`
pub fn next_queue_item_id(booking_id: &str) -> String {
    format!(
        "{}_{}_{}",
        booking_id,
        Utc::now().timestamp_millis(),
        next_id()
    )
}

pub fn next_comment_id() -> String {
    format!("com_{}", next_id())
}

pub fn uploaded_photo_id(queue_item_id: &str) -> String {
    format!("upload_{queue_item_id}")
}
