//! HTTP transport and preloader tests
//!
//! Runs an in-process axum server so the reqwest code paths (SSE body
//! streaming, status handling, image decoding) are exercised end to end.

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::routing::get;
use axum::Router;
use pretty_assertions::assert_eq;
use tokio::net::TcpListener;
use url::Url;

use genfeed_core::{
    DisplayItem, FeedError, FeedEvent, FeedFrame, FeedKind, FeedTransport, FeedWidget,
    HttpFeedTransport, HttpPreloader, PreloadError, Preloader, WidgetConfig,
};

// =============================================================================
// Helpers
// =============================================================================

async fn bind() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

fn serve(listener: TcpListener, router: Router) {
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn image_item(url: &str) -> DisplayItem {
    let event = FeedEvent::parse(&format!(r#"{{"imageURL":"{url}","prompt":"p"}}"#)).unwrap();
    DisplayItem::from_event(&event, FeedKind::Image).unwrap()
}

fn sse(body: &'static str) -> ([(header::HeaderName, &'static str); 1], &'static str) {
    ([(header::CONTENT_TYPE, "text/event-stream")], body)
}

// =============================================================================
// Feed Transport
// =============================================================================

#[tokio::test]
async fn test_http_transport_streams_sse_messages() {
    let (listener, addr) = bind().await;
    serve(
        listener,
        Router::new().route(
            "/feed",
            get(|| async {
                sse(concat!(
                    ": keep-alive\n\n",
                    "data: {\"imageURL\":\"a.png\",\"prompt\":\"x\"}\r\n\r\n",
                    "event: generation\n",
                    "data: {\"imageURL\":\"b.png\",\n",
                    "data: \"prompt\":\"y\"}\n\n",
                ))
            }),
        ),
    );

    let transport = HttpFeedTransport::new();
    let url = Url::parse(&format!("http://{addr}/feed")).unwrap();
    let mut frames = transport.open(&url).await.unwrap();

    assert_eq!(
        frames.recv().await,
        Some(FeedFrame::Message(r#"{"imageURL":"a.png","prompt":"x"}"#.to_string()))
    );
    assert_eq!(
        frames.recv().await,
        Some(FeedFrame::Message(
            "{\"imageURL\":\"b.png\",\n\"prompt\":\"y\"}".to_string()
        ))
    );
    assert_eq!(frames.recv().await, None);
}

#[tokio::test]
async fn test_http_transport_reassembles_split_chunks() {
    let chunks: Vec<&'static [u8]> = vec![
        &b"da"[..],
        &b"ta: hel"[..],
        &b"lo\n"[..],
        &b"\n: ping\nretry: 5000\nfoo: bar\n\n"[..],
        &b"event: update\r\nid: 7\r\ndata: x\r\n\r\n"[..],
        &b"data: caf\xC3"[..],
        &b"\xA9\n\n"[..],
        &b"data:tight\n\n"[..],
    ];
    let (listener, addr) = bind().await;
    serve(
        listener,
        Router::new().route(
            "/feed",
            get(move || {
                let body = futures::stream::iter(
                    chunks
                        .clone()
                        .into_iter()
                        .map(Ok::<_, std::io::Error>),
                );
                async move {
                    (
                        [(header::CONTENT_TYPE, "text/event-stream")],
                        Body::from_stream(body),
                    )
                }
            }),
        ),
    );

    let url = Url::parse(&format!("http://{addr}/feed")).unwrap();
    let mut frames = HttpFeedTransport::new().open(&url).await.unwrap();

    let mut received = Vec::new();
    while let Some(frame) = frames.recv().await {
        received.push(frame);
    }
    assert_eq!(
        received,
        vec![
            FeedFrame::Message("hello".to_string()),
            FeedFrame::Message("x".to_string()),
            FeedFrame::Message("café".to_string()),
            FeedFrame::Message("tight".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_http_transport_rejects_non_event_stream() {
    let (listener, addr) = bind().await;
    serve(
        listener,
        Router::new().route("/feed", get(|| async { "data: {}\n\n" })),
    );

    let url = Url::parse(&format!("http://{addr}/feed")).unwrap();
    let result = HttpFeedTransport::new().open(&url).await;
    assert!(matches!(result, Err(FeedError::ConnectionFailed(_))));
}

#[tokio::test]
async fn test_http_transport_rejects_error_status() {
    let (listener, addr) = bind().await;
    serve(
        listener,
        Router::new().route("/feed", get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") })),
    );

    let url = Url::parse(&format!("http://{addr}/feed")).unwrap();
    let result = HttpFeedTransport::new().open(&url).await;
    assert!(matches!(result, Err(FeedError::HttpStatus { status: 503 })));
}

#[tokio::test]
async fn test_http_transport_connection_refused() {
    let (listener, addr) = bind().await;
    drop(listener);

    let url = Url::parse(&format!("http://{addr}/feed")).unwrap();
    let result = HttpFeedTransport::new().open(&url).await;
    assert!(matches!(result, Err(FeedError::ConnectionFailed(_))));
}

// =============================================================================
// Preloader
// =============================================================================

#[tokio::test]
async fn test_preloader_decodes_image_and_fills_size() {
    let (listener, addr) = bind().await;
    let png = png_bytes(3, 2);
    serve(
        listener,
        Router::new()
            .route(
                "/a.png",
                get(move || {
                    let png = png.clone();
                    async move { ([(header::CONTENT_TYPE, "image/png")], png) }
                }),
            )
            .route("/garbage.png", get(|| async { "definitely not an image" })),
    );

    let preloader = HttpPreloader::new();

    let loaded = preloader
        .preload(image_item(&format!("http://{addr}/a.png")))
        .await
        .unwrap();
    assert!(loaded.loaded);
    assert_eq!(loaded.width, Some(3));
    assert_eq!(loaded.height, Some(2));

    let garbage = preloader
        .preload(image_item(&format!("http://{addr}/garbage.png")))
        .await;
    assert!(matches!(garbage, Err(PreloadError::Decode(_))));

    let missing = preloader
        .preload(image_item(&format!("http://{addr}/missing.png")))
        .await;
    assert_eq!(missing, Err(PreloadError::HttpStatus(404)));
}

#[tokio::test]
async fn test_preloader_fetches_text_completion() {
    let (listener, addr) = bind().await;
    serve(
        listener,
        Router::new().route("/haiku", get(|| async { "leaves fall quietly" })),
    );

    let mut item = image_item(&format!("http://{addr}/haiku"));
    item.kind = FeedKind::Text;

    let loaded = HttpPreloader::new().preload(item).await.unwrap();
    assert!(loaded.loaded);
    assert_eq!(loaded.response.as_deref(), Some("leaves fall quietly"));
}

// =============================================================================
// End to End
// =============================================================================

#[tokio::test]
async fn test_widget_over_http() {
    let (listener, addr) = bind().await;
    let png = png_bytes(4, 4);
    let feed_body = format!(
        "data: {{\"imageURL\":\"http://{addr}/img/a.png\",\"prompt\":\"x\",\"concurrentRequests\":3}}\n\n\
         data: {{\"imageURL\":\"http://{addr}/img/b.png\",\"prompt\":\"nsfw art\"}}\n\n"
    );
    serve(
        listener,
        Router::new()
            .route(
                "/feed",
                get(move || {
                    let body = feed_body.clone();
                    async move { ([(header::CONTENT_TYPE, "text/event-stream")], body) }
                }),
            )
            .route(
                "/img/a.png",
                get(move || {
                    let png = png.clone();
                    async move { ([(header::CONTENT_TYPE, "image/png")], png) }
                }),
            ),
    );

    let config = WidgetConfig::new(FeedKind::Image, Url::parse(&format!("http://{addr}/feed")).unwrap())
        .with_slide_interval(Duration::from_millis(50))
        .with_reconnect_delay(Duration::from_secs(60));
    let widget = FeedWidget::spawn(
        config,
        Arc::new(HttpFeedTransport::new()),
        Arc::new(HttpPreloader::new()),
    );

    let mut snapshots = widget.subscribe();
    let snapshot = tokio::time::timeout(
        Duration::from_secs(10),
        snapshots.wait_for(|s| s.current.as_ref().is_some_and(|i| i.loaded)),
    )
    .await
    .expect("no slide loaded in time")
    .unwrap()
    .clone();

    let current = snapshot.current.unwrap();
    assert!(current.url.unwrap().ends_with("/img/a.png"));
    assert_eq!(current.width, Some(4));
    assert_eq!(snapshot.feed.last_load, Some(3));
    assert_eq!(snapshot.feed.items_generated, 1);

    widget.shutdown().await;
}
