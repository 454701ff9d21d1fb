//! End-to-end: synthetic source → overlays → multipart JPEG readers.

use std::path::PathBuf;
use std::time::Duration;

use futures::StreamExt;
use image::{Rgb, RgbImage};
use overlaycast_overlay_model::OverlaySpec;
use overlaycast_render_engine::OverlayRenderer;
use overlaycast_stream_engine::{
    PatternSourceOpener, StartOutcome, StreamConfig, StreamController, StreamState,
};
use tokio::time::timeout;

const URL: &str = "rtsp://127.0.0.1:8554/test";
const CHUNK_HEAD: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";

fn controller(opener: PatternSourceOpener) -> StreamController {
    StreamController::new(
        opener,
        OverlayRenderer::with_builtin_font(),
        StreamConfig {
            jpeg_quality: 90,
            pause_poll: Duration::from_millis(5),
            overlay_refresh: Duration::from_secs(1),
        },
    )
}

fn red_logo() -> PathBuf {
    let path = std::env::temp_dir().join(format!("overlaycast-logo-{}.png", uuid::Uuid::new_v4()));
    RgbImage::from_pixel(40, 40, Rgb([255, 0, 0]))
        .save(&path)
        .unwrap();
    path
}

#[tokio::test]
async fn test_reader_receives_composited_jpeg_chunks() {
    let logo = red_logo();
    let controller = controller(
        PatternSourceOpener::default().with_frame_interval(Duration::from_millis(10)),
    );
    controller
        .create_overlay(&OverlaySpec::image(logo.to_string_lossy(), Some("center")))
        .unwrap();
    controller
        .create_overlay(&OverlaySpec::text("HELLO WORLD", Some("top")))
        .unwrap();

    assert_eq!(controller.start(URL).unwrap(), StartOutcome::Started);
    let mut reader = controller.stream_frames();

    let chunk = timeout(Duration::from_secs(5), reader.next())
        .await
        .unwrap()
        .unwrap();
    assert!(chunk.starts_with(CHUNK_HEAD));
    assert!(chunk.ends_with(b"\r\n"));
    let jpeg = &chunk[CHUNK_HEAD.len()..chunk.len() - 2];
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

    let decoded = image::load_from_memory(jpeg).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (720, 480));
    // The 100x100 logo sits at the image "center" anchor (300, 200).
    let Rgb([r, g, b]) = *decoded.get_pixel(350, 250);
    assert!(r > 200 && g < 60 && b < 60, "got {r},{g},{b}");

    controller.stop();
    let end = timeout(Duration::from_secs(5), async {
        while reader.next().await.is_some() {}
    })
    .await;
    assert!(end.is_ok(), "reader did not terminate after stop");
    assert!(reader.is_finished());
    assert_eq!(controller.state(), StreamState::Stopped);

    std::fs::remove_file(logo).ok();
}

#[tokio::test]
async fn test_stream_ends_when_source_runs_out() {
    let controller = controller(
        PatternSourceOpener::new(64, 48)
            .with_frame_interval(Duration::from_millis(10))
            .with_frame_limit(5),
    );
    controller.start(URL).unwrap();
    let stream = controller.stream_frames().into_stream();

    let chunks: Vec<_> = timeout(Duration::from_secs(5), stream.collect())
        .await
        .unwrap();
    assert!(!chunks.is_empty() && chunks.len() <= 5);
    assert!(chunks.iter().all(|c| c.starts_with(CHUNK_HEAD)));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(controller.state(), StreamState::Stopped);
    assert!(controller.latest_frame().is_none());
}

#[tokio::test]
async fn test_late_reader_starts_from_latest_frame() {
    let controller = controller(
        PatternSourceOpener::new(64, 48).with_frame_interval(Duration::from_millis(10)),
    );
    controller.start(URL).unwrap();
    for _ in 0..200 {
        if controller.latest_frame().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    controller.pause().unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    let retained = controller.latest_frame().unwrap();

    let mut reader = controller.stream_frames();
    let chunk = timeout(Duration::from_secs(1), reader.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&chunk[CHUNK_HEAD.len()..chunk.len() - 2], &retained[..]);
    controller.stop();
}

#[tokio::test]
async fn test_reader_ends_when_source_fails_first_read() {
    let controller = controller(PatternSourceOpener::new(64, 48).with_frame_limit(0));
    let mut idle = controller.stream_frames();
    assert!(timeout(Duration::from_secs(2), idle.next()).await.unwrap().is_none());

    controller.start(URL).unwrap();
    let stream = controller.stream_frames().into_stream();
    let chunks: Vec<_> = timeout(Duration::from_secs(2), stream.collect())
        .await
        .unwrap();
    assert!(chunks.is_empty());
    for _ in 0..200 {
        if controller.state() == StreamState::Stopped {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(controller.state(), StreamState::Stopped);
}
