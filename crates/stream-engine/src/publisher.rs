//! MJPEG output: JPEG encoding, latest-frame retention, and multipart
//! chunk framing for HTTP readers.
//!
//! The latest encoded frame lives in a `tokio::sync::watch` channel. Readers
//! always see the newest frame and never queue stale ones; a slow reader
//! simply skips frames.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{BufMut, Bytes, BytesMut};
use futures::Stream;
use image::codecs::jpeg::JpegEncoder;
use overlaycast_common::error::{OverlaycastError, OverlaycastResult};
use overlaycast_render_engine::Frame;
use tokio::sync::watch;

/// Part boundary used in the multipart body.
pub const MULTIPART_BOUNDARY: &str = "frame";

pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// `Content-Type` header value for a [`FrameStream`] response.
pub fn multipart_content_type() -> String {
    format!("multipart/x-mixed-replace; boundary={MULTIPART_BOUNDARY}")
}

/// Wrap one JPEG as a multipart part.
pub fn multipart_chunk(jpeg: &[u8]) -> Bytes {
    let head = format!("--{MULTIPART_BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n");
    let mut chunk = BytesMut::with_capacity(head.len() + jpeg.len() + 2);
    chunk.put_slice(head.as_bytes());
    chunk.put_slice(jpeg);
    chunk.put_slice(b"\r\n");
    chunk.freeze()
}

/// A published JPEG tagged with the session that produced it.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub session: u64,
    pub sequence: u64,
    pub jpeg: Bytes,
}

/// Session id meaning "nothing is streaming".
const NO_SESSION: u64 = 0;

/// What readers observe: the active session and its retained frame.
#[derive(Debug, Default)]
struct OutputState {
    session: u64,
    frame: Option<EncodedFrame>,
}

/// Holds the most recent composited frame for any number of readers.
#[derive(Debug)]
pub struct OutputPublisher {
    quality: u8,
    state: watch::Sender<OutputState>,
    next_session: AtomicU64,
    sequence: AtomicU64,
}

impl OutputPublisher {
    pub fn new(quality: u8) -> Self {
        let (state, _) = watch::channel(OutputState::default());
        Self {
            quality: quality.clamp(1, 100),
            state,
            next_session: AtomicU64::new(NO_SESSION + 1),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode `frame` as a baseline JPEG.
    pub fn encode(&self, frame: &Frame) -> OverlaycastResult<Bytes> {
        let mut out = Vec::with_capacity(frame.as_raw().len() / 8);
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .encode_image(frame)
            .map_err(|e| OverlaycastError::encode(e.to_string()))?;
        Ok(Bytes::from(out))
    }

    /// Open a new publishing session, discarding any retained frame.
    ///
    /// Readers of the previous session end, and frames published under an
    /// older session id are ignored from now on.
    pub fn begin_session(&self) -> u64 {
        let session = self.next_session.fetch_add(1, Ordering::SeqCst);
        self.state.send_modify(|state| {
            state.session = session;
            state.frame = None;
        });
        session
    }

    /// Retain `jpeg` as the latest frame of `session`.
    ///
    /// Returns `false` if `session` is no longer the active one.
    pub fn publish(&self, session: u64, jpeg: Bytes) -> bool {
        self.state.send_if_modified(|state| {
            if state.session != session {
                return false;
            }
            let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
            state.frame = Some(EncodedFrame {
                session,
                sequence,
                jpeg,
            });
            true
        })
    }

    /// End `session` if it is still active, dropping its retained frame.
    pub fn end_session(&self, session: u64) {
        self.state.send_if_modified(|state| {
            if state.session != session {
                return false;
            }
            state.session = NO_SESSION;
            state.frame = None;
            true
        });
    }

    /// The latest retained JPEG, if a session is producing frames.
    pub fn latest(&self) -> Option<Bytes> {
        self.state.borrow().frame.as_ref().map(|frame| frame.jpeg.clone())
    }

    /// A reader bound to the session active right now.
    ///
    /// With no active session the reader is already finished.
    pub fn subscribe(&self) -> FrameStream {
        let rx = self.state.subscribe();
        let session = rx.borrow().session;
        FrameStream {
            rx,
            primed: false,
            session,
            finished: session == NO_SESSION,
        }
    }
}

impl Default for OutputPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

/// A reader's view of the output: one multipart chunk per frame.
///
/// The reader follows the session that was active when it subscribed. It
/// starts with that session's retained frame, if any, and ends as soon as
/// the session stops or is replaced.
#[derive(Debug)]
pub struct FrameStream {
    rx: watch::Receiver<OutputState>,
    primed: bool,
    session: u64,
    finished: bool,
}

impl FrameStream {
    /// Wait for the next frame and return it framed as a multipart part.
    pub async fn next(&mut self) -> Option<Bytes> {
        self.next_frame()
            .await
            .map(|frame| multipart_chunk(&frame.jpeg))
    }

    /// Like [`FrameStream::next`] but without multipart framing.
    pub async fn next_frame(&mut self) -> Option<EncodedFrame> {
        while !self.finished {
            if self.primed && self.rx.changed().await.is_err() {
                self.finished = true;
                break;
            }
            self.primed = true;

            let (active, frame) = {
                let state = self.rx.borrow_and_update();
                (state.session, state.frame.clone())
            };
            if active != self.session {
                self.finished = true;
                break;
            }
            if frame.is_some() {
                return frame;
            }
        }
        None
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn content_type(&self) -> String {
        multipart_content_type()
    }

    /// Adapt into a `Stream` of multipart chunks, e.g. for an HTTP body.
    pub fn into_stream(self) -> impl Stream<Item = Bytes> + Send {
        futures::stream::unfold(self, |mut stream| async move {
            let chunk = stream.next().await?;
            Some((chunk, stream))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use image::{Rgb, RgbImage};
    use std::time::Duration;
    use tokio::time::timeout;

    fn jpeg(tag: u8) -> Bytes {
        Bytes::from(vec![0xFF, 0xD8, tag, 0xFF, 0xD9])
    }

    #[test]
    fn test_chunk_framing() {
        let chunk = multipart_chunk(&[1, 2, 3]);
        assert_eq!(
            &chunk[..],
            b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\x01\x02\x03\r\n"
        );
        assert_eq!(
            multipart_content_type(),
            "multipart/x-mixed-replace; boundary=frame"
        );
    }

    #[test]
    fn test_encode_produces_jpeg() {
        let publisher = OutputPublisher::default();
        let frame = RgbImage::from_pixel(64, 48, Rgb([10, 200, 30]));
        let jpeg = publisher.encode(&frame).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn test_latest_cleared_when_session_ends() {
        let publisher = OutputPublisher::default();
        assert!(publisher.latest().is_none());
        let session = publisher.begin_session();
        assert!(publisher.publish(session, jpeg(1)));
        assert_eq!(publisher.latest(), Some(jpeg(1)));
        publisher.end_session(session);
        assert!(publisher.latest().is_none());
        assert!(!publisher.publish(session, jpeg(2)));
        assert!(publisher.latest().is_none());
    }

    #[test]
    fn test_stale_session_cannot_publish_or_end() {
        let publisher = OutputPublisher::default();
        let old = publisher.begin_session();
        let new = publisher.begin_session();
        assert!(!publisher.publish(old, jpeg(1)));
        assert!(publisher.publish(new, jpeg(2)));
        publisher.end_session(old);
        assert_eq!(publisher.latest(), Some(jpeg(2)));
        publisher.end_session(new);
        assert!(publisher.latest().is_none());
    }

    #[tokio::test]
    async fn test_late_reader_gets_retained_frame_first() {
        let publisher = OutputPublisher::default();
        let session = publisher.begin_session();
        publisher.publish(session, jpeg(7));

        let mut reader = publisher.subscribe();
        let chunk = timeout(Duration::from_secs(1), reader.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(chunk, multipart_chunk(&jpeg(7)));
    }

    #[tokio::test]
    async fn test_reader_waits_for_first_frame_then_ends_on_stop() {
        let publisher = std::sync::Arc::new(OutputPublisher::default());
        let session = publisher.begin_session();
        let mut reader = publisher.subscribe();

        let producer = {
            let publisher = std::sync::Arc::clone(&publisher);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                publisher.publish(session, jpeg(1));
            })
        };
        let first = timeout(Duration::from_secs(1), reader.next_frame())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.jpeg, jpeg(1));
        producer.await.unwrap();

        publisher.end_session(session);
        let end = timeout(Duration::from_secs(1), reader.next()).await.unwrap();
        assert!(end.is_none());
        assert!(reader.is_finished());
        assert!(reader.next().await.is_none());
    }

    #[tokio::test]
    async fn test_reader_without_active_session_ends_immediately() {
        let publisher = OutputPublisher::default();
        let mut reader = publisher.subscribe();
        assert!(reader.is_finished());
        let end = timeout(Duration::from_secs(1), reader.next()).await.unwrap();
        assert!(end.is_none());

        // A session starting later does not revive it.
        let session = publisher.begin_session();
        publisher.publish(session, jpeg(1));
        assert!(reader.next().await.is_none());
    }

    #[tokio::test]
    async fn test_reader_ends_when_session_stops_before_first_frame() {
        let publisher = std::sync::Arc::new(OutputPublisher::default());
        let session = publisher.begin_session();
        let mut reader = publisher.subscribe();
        assert!(!reader.is_finished());

        let ender = {
            let publisher = std::sync::Arc::clone(&publisher);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                publisher.end_session(session);
            })
        };
        let end = timeout(Duration::from_secs(1), reader.next()).await.unwrap();
        ender.await.unwrap();
        assert!(end.is_none());
        assert!(reader.is_finished());
    }

    #[tokio::test]
    async fn test_reader_ends_when_replaced_before_first_frame() {
        let publisher = OutputPublisher::default();
        publisher.begin_session();
        let mut reader = publisher.subscribe();

        let second = publisher.begin_session();
        publisher.publish(second, jpeg(2));
        let end = timeout(Duration::from_secs(1), reader.next()).await.unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_reader_does_not_follow_into_next_session() {
        let publisher = OutputPublisher::default();
        let first = publisher.begin_session();
        publisher.publish(first, jpeg(1));
        let mut reader = publisher.subscribe();
        assert!(reader.next().await.is_some());

        let second = publisher.begin_session();
        publisher.publish(second, jpeg(2));
        let end = timeout(Duration::from_secs(1), reader.next()).await.unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_into_stream_yields_chunks() {
        let publisher = std::sync::Arc::new(OutputPublisher::default());
        let session = publisher.begin_session();
        publisher.publish(session, jpeg(3));

        let stream = publisher.subscribe().into_stream();
        let ender = {
            let publisher = std::sync::Arc::clone(&publisher);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                publisher.end_session(session);
            })
        };
        let chunks: Vec<Bytes> = timeout(Duration::from_secs(1), stream.collect())
            .await
            .unwrap();
        ender.await.unwrap();
        assert_eq!(chunks, vec![multipart_chunk(&jpeg(3))]);
    }
}
