use std::sync::Arc;

use chrono::NaiveDate;
use flexi_logger::{Logger, WriteMode};
use log::{info, warn};

use studio_portal::{
    activity_log::{ActivityLog, ActivityLogWriter},
    auto_persisting::AutoPersisting,
    config::PortalConfig,
    dependencies::Dependencies,
    dirs::Dirs,
    model::{
        booking::{Booking, SessionType},
        bucket::Bucket,
        upload::UploadFile,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log: Arc<ActivityLog> = Arc::new(ActivityLog::new());

    Dirs::initialize_dirs()?;
    let mut config: AutoPersisting<PortalConfig> = AutoPersisting::new();
    let config = match config.read() {
        Ok(config) => config.clone(),
        Err(e) => {
            eprintln!("Falling back to default config: {}", e);
            PortalConfig::default()
        }
    };

    let _logger = Logger::try_with_str(&config.log_level)?
        .log_to_writer(Box::new(ActivityLogWriter::new(Arc::clone(&log))))
        .write_mode(WriteMode::Direct)
        .start()?;

    let deps = Dependencies::new(&config);
    run_session(&deps).await?;

    for line in log.lines() {
        println!("{}", line);
    }
    Ok(())
}

async fn run_session(deps: &Dependencies) -> anyhow::Result<()> {
    let session_date = NaiveDate::from_ymd_opt(2026, 9, 12)
        .ok_or_else(|| anyhow::anyhow!("invalid session date"))?;
    deps.register_booking(
        Booking::new(
            "bk_demo",
            "cl_demo",
            "Family portraits",
            session_date,
            SessionType::Family,
        )
        .with_location("Studio A"),
    );

    let captured = deps
        .photos
        .upload(
            (1..=4)
                .map(|i| UploadFile::new(format!("IMG_{i:04}.jpg"), 150_000 * i))
                .collect(),
            "bk_demo",
            Bucket::Capture,
        )
        .await;
    let indexed = deps
        .photos
        .upload(
            vec![
                UploadFile::with_content("cover.png", vec![0; 320_000]),
                UploadFile::new("IMG_0100.jpg", 540_000),
            ],
            "bk_demo",
            Bucket::Index,
        )
        .await;
    info!("Uploaded {} capture and {} index photos", captured, indexed);

    let captures = deps.photos.list_by_booking("bk_demo", Some(Bucket::Capture));
    if let Some(photo) = captures.first() {
        deps.photos.move_photo(&photo.id, Bucket::Index).await?;
    }

    let index = deps.photos.list_by_booking("bk_demo", Some(Bucket::Index));
    if let Some(photo) = index.last() {
        deps.photos.move_photo(&photo.id, Bucket::Trash).await?;
    }

    if let Some(photo) = index.first() {
        deps.photos.toggle_favorite(&photo.id)?;
        deps.photos
            .add_comment(&photo.id, "cl_demo", "This one for the living room")?;
        deps.photos.add_manual_tag(&photo.id, "wall print")?;

        if let Some(photo) = deps.photos.get(&photo.id) {
            println!("{}", serde_json::to_string_pretty(&photo)?);
        }
    }

    let metrics = deps.photos.bucket_metrics("bk_demo");
    info!("Bucket metrics for bk_demo: {:?}", metrics);
    match deps.bookings.get_by_id("bk_demo") {
        Some(booking) => info!("Booking counts for bk_demo: {:?}", booking.counts),
        None => warn!("Booking bk_demo disappeared"),
    }
    info!("Tags in use: {}", deps.photos.all_tags().join(", "));

    Ok(())
}
