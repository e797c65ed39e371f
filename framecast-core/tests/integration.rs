//! Integration tests — full broadcast/viewer lifecycle, the reverse
//! keyboard channel, and failure isolation over real TCP connections
//! on localhost.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use framecast_core::{
    BroadcastSession, CastError, InputInjector, KeyboardEvent, NullInjector, RawFrame,
    SessionConfig, TestPatternSource, ViewerSession, WindowHandle,
};

// ── Helpers ──────────────────────────────────────────────────────

/// Captures injected key events for assertions.
struct RecordingInjector(Mutex<Vec<(i32, bool)>>);

impl RecordingInjector {
    fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(Vec::new())))
    }

    fn events(&self) -> Vec<(i32, bool)> {
        self.0.lock().unwrap().clone()
    }
}

impl InputInjector for RecordingInjector {
    fn inject(&self, _window: WindowHandle, key_code: i32, key_down: bool) {
        self.0.lock().unwrap().push((key_code, key_down));
    }
}

/// The test pattern stores the frame index in every pixel's third
/// byte, so a decoded frame reveals which capture tick produced it.
fn frame_index(frame: &RawFrame) -> u8 {
    frame.data[2]
}

fn fast_session(
    injector: Arc<dyn InputInjector>,
) -> BroadcastSession<TestPatternSource> {
    BroadcastSession::new(
        TestPatternSource::new(WindowHandle(42), 32, 32),
        injector,
        SessionConfig {
            target_fps: 60,
            ..Default::default()
        },
    )
}

/// Collect up to `n` decoded frames from a viewer connection.
async fn collect_frames(
    conn: &mut framecast_core::ViewerConnection,
    n: usize,
) -> Vec<RawFrame> {
    let mut frames = Vec::with_capacity(n);
    while frames.len() < n {
        match tokio::time::timeout(Duration::from_secs(10), conn.next_frame())
            .await
            .expect("timed out waiting for a frame")
        {
            Some(Ok(frame)) => frames.push(frame),
            Some(Err(e)) => panic!("frame error: {e}"),
            None => break,
        }
    }
    frames
}

// ── Broadcast lifecycle ──────────────────────────────────────────

#[tokio::test]
async fn frames_arrive_in_capture_order_on_every_client() {
    let viewer_a = ViewerSession::bind(0).await.unwrap();
    let viewer_b = ViewerSession::bind(0).await.unwrap();
    let port_a = viewer_a.local_addr().unwrap().port();
    let port_b = viewer_b.local_addr().unwrap().port();

    let mut session = fast_session(Arc::new(NullInjector));
    session.register("127.0.0.1", port_a).unwrap();
    session.register("127.0.0.1", port_b).unwrap();
    let handle = session.handle();
    let run = tokio::spawn(async move { session.run().await });

    let mut conn_a = viewer_a.accept().await.unwrap();
    let mut conn_b = viewer_b.accept().await.unwrap();

    let frames_a = collect_frames(&mut conn_a, 10).await;
    let frames_b = collect_frames(&mut conn_b, 10).await;
    assert_eq!(frames_a.len(), 10);
    assert_eq!(frames_b.len(), 10);

    // Capture order is preserved per client: the embedded frame
    // index is strictly increasing (no reordering, no duplicates).
    for frames in [&frames_a, &frames_b] {
        for pair in frames.windows(2) {
            assert!(
                frame_index(&pair[1]) > frame_index(&pair[0]),
                "frames reordered: {} then {}",
                frame_index(&pair[0]),
                frame_index(&pair[1]),
            );
        }
    }

    handle.stop();
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run did not join")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn late_client_never_sees_frames_from_before_registration() {
    let viewer_a = ViewerSession::bind(0).await.unwrap();
    let viewer_b = ViewerSession::bind(0).await.unwrap();
    let port_a = viewer_a.local_addr().unwrap().port();
    let port_b = viewer_b.local_addr().unwrap().port();

    let mut session = fast_session(Arc::new(NullInjector));
    session.register("127.0.0.1", port_a).unwrap();
    let handle = session.handle();
    let run = tokio::spawn(async move { session.run().await });

    // Let the first viewer consume a few frames before viewer B exists.
    let mut conn_a = viewer_a.accept().await.unwrap();
    let early = collect_frames(&mut conn_a, 5).await;
    let last_early_index = frame_index(early.last().unwrap());

    handle.register("127.0.0.1", port_b).unwrap();
    let mut conn_b = viewer_b.accept().await.unwrap();
    let late = collect_frames(&mut conn_b, 3).await;

    // B's first frame was captured after its registration, hence
    // after everything A had already seen.
    assert!(
        frame_index(&late[0]) > last_early_index,
        "late client saw frame {} captured before registration (A had {})",
        frame_index(&late[0]),
        last_early_index,
    );

    handle.stop();
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run did not join")
        .unwrap()
        .unwrap();
}

// ── Failure isolation ────────────────────────────────────────────

#[tokio::test]
async fn dead_client_does_not_stall_the_others() {
    let viewer_a = ViewerSession::bind(0).await.unwrap();
    let viewer_b = ViewerSession::bind(0).await.unwrap();
    let port_a = viewer_a.local_addr().unwrap().port();
    let port_b = viewer_b.local_addr().unwrap().port();

    let mut session = fast_session(Arc::new(NullInjector));
    session.register("127.0.0.1", port_a).unwrap();
    session.register("127.0.0.1", port_b).unwrap();
    let handle = session.handle();
    let run = tokio::spawn(async move { session.run().await });

    let conn_a = viewer_a.accept().await.unwrap();
    let mut conn_b = viewer_b.accept().await.unwrap();

    // Kill A's socket mid-session.
    drop(conn_a);
    drop(viewer_a);

    // B keeps receiving long after A is gone.
    let frames = collect_frames(&mut conn_b, 20).await;
    assert_eq!(frames.len(), 20);

    // And the session still stops and joins cleanly.
    handle.stop();
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run did not join")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn unreachable_client_is_reported_not_fatal() {
    let viewer = ViewerSession::bind(0).await.unwrap();
    let port = viewer.local_addr().unwrap().port();

    let mut session = fast_session(Arc::new(NullInjector));
    // Nothing listens on port 1; that client's connect fails alone.
    session.register("127.0.0.1", 1).unwrap();
    session.register("127.0.0.1", port).unwrap();
    let handle = session.handle();
    let run = tokio::spawn(async move { session.run().await });

    let mut conn = viewer.accept().await.unwrap();
    let frames = collect_frames(&mut conn, 5).await;
    assert_eq!(frames.len(), 5);

    handle.stop();
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run did not join")
        .unwrap()
        .unwrap();
}

// ── Viewer stream termination ────────────────────────────────────

#[tokio::test]
async fn viewer_stream_ends_exactly_once_after_host_stops() {
    let viewer = ViewerSession::bind(0).await.unwrap();
    let port = viewer.local_addr().unwrap().port();

    let mut session = fast_session(Arc::new(NullInjector));
    session.register("127.0.0.1", port).unwrap();
    let handle = session.handle();
    let run = tokio::spawn(async move { session.run().await });

    let mut conn = viewer.accept().await.unwrap();
    let _ = collect_frames(&mut conn, 3).await;

    handle.stop();
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run did not join")
        .unwrap()
        .unwrap();

    // Drain until the stream terminates, then confirm it stays
    // terminated with no further callbacks.
    loop {
        match tokio::time::timeout(Duration::from_secs(5), conn.next_frame())
            .await
            .expect("stream did not terminate")
        {
            Some(Ok(_)) => continue,
            Some(Err(e)) => panic!("unexpected framing error: {e}"),
            None => break,
        }
    }
    assert!(conn.next_frame().await.is_none());
}

// ── Reverse channel ──────────────────────────────────────────────

#[tokio::test]
async fn keyboard_events_reach_the_injector_in_order() {
    let viewer = ViewerSession::bind(0).await.unwrap();
    let port = viewer.local_addr().unwrap().port();

    let injector = RecordingInjector::new();
    let mut session = fast_session(injector.clone());
    session.register("127.0.0.1", port).unwrap();
    let handle = session.handle();
    let run = tokio::spawn(async move { session.run().await });

    let mut conn = viewer.accept().await.unwrap();
    // Make sure the connection is live before sending events.
    let _ = collect_frames(&mut conn, 1).await;

    let sender = conn.event_sender();
    sender.send(KeyboardEvent::new(65, true)).await.unwrap();
    // Auto-repeat release: filtered before encoding, never on the wire.
    sender
        .send(KeyboardEvent::new(65, false).with_autorepeat(true))
        .await
        .unwrap();
    sender.send(KeyboardEvent::new(65, false)).await.unwrap();
    sender.send(KeyboardEvent::new(13, true)).await.unwrap();

    // Wait for the host to replay all three surviving events.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while injector.events().len() < 3 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "events never arrived: {:?}",
            injector.events(),
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(
        injector.events(),
        vec![(65, true), (65, false), (13, true)],
    );

    handle.stop();
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run did not join")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn malformed_event_does_not_kill_the_client() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    // Bare listener standing in for a viewer, so raw bytes can go on
    // the reverse channel.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let injector = RecordingInjector::new();
    let mut session = fast_session(injector.clone());
    session.register("127.0.0.1", port).unwrap();
    let handle = session.handle();
    let run = tokio::spawn(async move { session.run().await });

    let (mut socket, _) = listener.accept().await.unwrap();
    // Known tag, key_code 65, key_down byte 2 — malformed. Then a
    // well-formed press of key 66.
    socket.write_all(&[0x01, 0, 0, 0, 65, 2]).await.unwrap();
    socket.write_all(&[0x01, 0, 0, 0, 66, 1]).await.unwrap();

    // Drain the frame stream so the host's writes never stall.
    let drain = tokio::spawn(async move {
        let mut sink = [0u8; 4096];
        let mut total = 0usize;
        while let Ok(n) = socket.read(&mut sink).await {
            if n == 0 {
                break;
            }
            total += n;
        }
        total
    });

    // The press after the malformed payload must still be injected.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while injector.events().is_empty() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "event after malformed payload never injected",
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(injector.events(), vec![(66, true)]);

    handle.stop();
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run did not join")
        .unwrap()
        .unwrap();

    // Frames kept flowing after the bad payload arrived.
    let received = tokio::time::timeout(Duration::from_secs(5), drain)
        .await
        .expect("drain hung")
        .unwrap();
    assert!(received > 0, "no frames reached the viewer");
}

// ── Codec regression (legacy delimiter byte) ─────────────────────

#[tokio::test]
async fn frames_full_of_newline_bytes_survive_the_wire() {
    // The legacy scheme delimited frames with 0x0A and broke on
    // payloads containing it. A frame whose pixels are all 0x0A must
    // round-trip intact under length-prefixed framing.
    struct NewlineSource;
    impl framecast_core::FrameSource for NewlineSource {
        fn capture(&mut self) -> Result<RawFrame, CastError> {
            Ok(RawFrame {
                width: 16,
                height: 16,
                format: framecast_core::PixelFormat::Rgb8,
                data: vec![0x0A; 16 * 16 * 3],
                timestamp: std::time::Instant::now(),
            })
        }
        fn window(&self) -> WindowHandle {
            WindowHandle(0)
        }
    }

    let viewer = ViewerSession::bind(0).await.unwrap();
    let port = viewer.local_addr().unwrap().port();

    let mut session = BroadcastSession::new(
        NewlineSource,
        Arc::new(NullInjector),
        SessionConfig {
            target_fps: 60,
            ..Default::default()
        },
    );
    session.register("127.0.0.1", port).unwrap();
    let handle = session.handle();
    let run = tokio::spawn(async move { session.run().await });

    let mut conn = viewer.accept().await.unwrap();
    let frames = collect_frames(&mut conn, 3).await;
    for frame in &frames {
        assert_eq!(frame.data, vec![0x0A; 16 * 16 * 3]);
    }

    handle.stop();
    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run did not join")
        .unwrap()
        .unwrap();
}
