//! Integration tests for the resize activity, against the in-memory object
//! store and the real JPEG codec.

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, RgbImage};

use photoflow_core::error::ActivityError;
use photoflow_core::types::{InstanceStatus, ResizeRequest};
use photoflow_engine::{ActivityRunner, Outcome, Runtime};
use photoflow_store::MemoryInstanceStore;
use photoflow_worker::{JpegCodec, MemoryObjectStore, ResizeActivity};

const SOURCE: &str = "photos";
const DEST: &str = "doneorders";

fn png_fixture(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
        width,
        height,
        image::Rgb([10, 180, 90]),
    ));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn activity(blobs: Arc<MemoryObjectStore>) -> ResizeActivity {
    ResizeActivity::new(blobs, Arc::new(JpegCodec), SOURCE, DEST)
}

// =========================================================================
// Activity tests
// =========================================================================

#[tokio::test]
async fn resize_uploads_jpeg_with_dimension_hint() {
    let blobs = Arc::new(MemoryObjectStore::new());
    blobs.put(SOURCE, "team.png", png_fixture(16, 16));

    let locator = activity(Arc::clone(&blobs))
        .run(&ResizeRequest::new("team.png", 6, 4))
        .await
        .unwrap();

    assert!(locator.name.ends_with(".jpeg"));
    assert_eq!(locator.content_disposition, "attachment; filename=6x4.jpeg");

    let stored = blobs.object(DEST, &locator.name).unwrap();
    assert_eq!(stored.content_disposition, locator.content_disposition);

    let out = image::load_from_memory(&stored.bytes).unwrap();
    assert_eq!((out.width(), out.height()), (6, 4));
    assert_eq!(image::guess_format(&stored.bytes).unwrap(), ImageFormat::Jpeg);
}

#[tokio::test]
async fn missing_source_reports_source_not_found() {
    let blobs = Arc::new(MemoryObjectStore::new());

    let err = activity(blobs)
        .run(&ResizeRequest::new("ghost.png", 10, 10))
        .await
        .unwrap_err();

    assert!(matches!(err, ActivityError::SourceNotFound { name } if name == "ghost.png"));
}

#[tokio::test]
async fn undecodable_source_reports_decode_error() {
    let blobs = Arc::new(MemoryObjectStore::new());
    blobs.put(SOURCE, "broken.png", b"definitely not an image".to_vec());

    let err = activity(blobs)
        .run(&ResizeRequest::new("broken.png", 10, 10))
        .await
        .unwrap_err();

    assert!(matches!(err, ActivityError::Decode { .. }));
}

#[tokio::test]
async fn failed_destination_write_reports_upload_error() {
    let blobs = Arc::new(MemoryObjectStore::failing_uploads());
    blobs.put(SOURCE, "team.png", png_fixture(16, 16));

    let err = activity(blobs)
        .run(&ResizeRequest::new("team.png", 10, 10))
        .await
        .unwrap_err();

    assert!(matches!(err, ActivityError::Upload { .. }));
}

#[tokio::test]
async fn same_source_different_dimensions_yield_distinct_artifacts() {
    let blobs = Arc::new(MemoryObjectStore::new());
    blobs.put(SOURCE, "team.png", png_fixture(32, 32));
    let activity = activity(Arc::clone(&blobs));

    let small = activity
        .run(&ResizeRequest::new("team.png", 8, 8))
        .await
        .unwrap();
    let large = activity
        .run(&ResizeRequest::new("team.png", 24, 16))
        .await
        .unwrap();

    assert_ne!(small.name, large.name);
    assert_eq!(small.content_disposition, "attachment; filename=8x8.jpeg");
    assert_eq!(large.content_disposition, "attachment; filename=24x16.jpeg");

    // Both artifacts readable independently, at their own dimensions.
    let a = image::load_from_memory(&blobs.object(DEST, &small.name).unwrap().bytes).unwrap();
    let b = image::load_from_memory(&blobs.object(DEST, &large.name).unwrap().bytes).unwrap();
    assert_eq!((a.width(), a.height()), (8, 8));
    assert_eq!((b.width(), b.height()), (24, 16));
}

#[tokio::test]
async fn rerunning_the_same_task_never_collides() {
    let blobs = Arc::new(MemoryObjectStore::new());
    blobs.put(SOURCE, "team.png", png_fixture(16, 16));
    let activity = activity(Arc::clone(&blobs));
    let request = ResizeRequest::new("team.png", 4, 4);

    // At-least-once: the same logical task may execute twice after a crash.
    let first = activity.run(&request).await.unwrap();
    let second = activity.run(&request).await.unwrap();

    assert_ne!(first.name, second.name);
    assert_eq!(blobs.names(DEST).len(), 2);
}

// =========================================================================
// End-to-end: engine + real activity
// =========================================================================

#[tokio::test]
async fn batch_orchestration_end_to_end() {
    let blobs = Arc::new(MemoryObjectStore::new());
    blobs.put(SOURCE, "a.png", png_fixture(20, 20));
    blobs.put(SOURCE, "b.png", png_fixture(30, 30));

    let store = Arc::new(MemoryInstanceStore::new());
    let runtime = Runtime::new(
        Arc::clone(&store),
        Arc::new(activity(Arc::clone(&blobs))) as Arc<dyn ActivityRunner>,
    )
    .with_concurrency(2);

    let id = runtime
        .start(vec![
            ResizeRequest::new("a.png", 5, 5),
            ResizeRequest::new("b.png", 7, 3),
        ])
        .await
        .unwrap();
    let outcome = runtime.run_to_completion(id).await.unwrap();

    let Outcome::Completed(locators) = outcome else {
        panic!("expected completed outcome");
    };
    assert_eq!(locators.len(), 2);
    assert_eq!(locators[0].content_disposition, "attachment; filename=5x5.jpeg");
    assert_eq!(locators[1].content_disposition, "attachment; filename=7x3.jpeg");

    let report = runtime.status(id).await.unwrap();
    assert_eq!(report.status, InstanceStatus::Completed);

    for (locator, dims) in locators.iter().zip([(5, 5), (7, 3)]) {
        let stored = blobs.object(DEST, &locator.name).unwrap();
        let img = image::load_from_memory(&stored.bytes).unwrap();
        assert_eq!((img.width(), img.height()), dims);
    }
}

#[tokio::test]
async fn batch_with_missing_source_fails_but_keeps_good_results() {
    let blobs = Arc::new(MemoryObjectStore::new());
    blobs.put(SOURCE, "a.png", png_fixture(20, 20));

    let store = Arc::new(MemoryInstanceStore::new());
    let runtime = Runtime::new(
        Arc::clone(&store),
        Arc::new(activity(Arc::clone(&blobs))) as Arc<dyn ActivityRunner>,
    );

    let id = runtime
        .start(vec![
            ResizeRequest::new("a.png", 5, 5),
            ResizeRequest::new("missing.png", 7, 3),
        ])
        .await
        .unwrap();
    let outcome = runtime.run_to_completion(id).await.unwrap();

    let Outcome::Failed(failures) = outcome else {
        panic!("expected failed outcome");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].task_index, 1);

    // The good sibling's artifact was still produced and recorded.
    assert_eq!(blobs.names(DEST).len(), 1);
    let instance = photoflow_store::InstanceStore::get(&store, id)
        .await
        .unwrap()
        .unwrap();
    assert!(instance.history[0].result.is_some() || instance.history[1].result.is_some());
}
