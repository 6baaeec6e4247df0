use crate::annotate::{annotate, load_font};
use crate::classifier::LetterClassifier;
use crate::classifiers;
use crate::config::Config;
use crate::error::SegmenterError;
use crate::recognition::{LetterPrediction, Recognizer};
use crate::segmentation::{BoundingBox, SegmentationParams, Segmenter, StepTiming};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use ab_glyph::FontVec;
use image::{DynamicImage, GrayImage, ImageFormat};
use serde::Serialize;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Room left in the request body limit for the multipart envelope
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub segmenter: Segmenter,
    pub classifier: Option<Arc<dyn LetterClassifier>>,
    pub label_font: Option<Arc<FontVec>>,
    pub config: Arc<Config>,
}

impl AppState {
    fn recognizer(&self) -> Result<Recognizer, SegmenterError> {
        let classifier = self
            .classifier
            .clone()
            .ok_or(SegmenterError::ClassifierUnavailable)?;
        Ok(Recognizer::new(self.segmenter.clone(), classifier))
    }
}

/// Segmentation response
#[derive(Serialize)]
pub struct SegmentResponse {
    pub boxes: Vec<BoundingBox>,
    pub tile_size: u32,
    pub processing_time_ms: u64,
    pub steps: Vec<StepTiming>,
}

/// Recognition response
#[derive(Serialize)]
pub struct RecognizeResponse {
    pub word: String,
    pub letters: Vec<LetterPrediction>,
    pub classifier: String,
    pub processing_time_ms: u64,
    pub steps: Vec<StepTiming>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ClassifierInfo {
    pub name: String,
    pub description: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub classifier: Option<ClassifierInfo>,
    pub max_file_size_bytes: usize,
    pub params: SegmentationParams,
}

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let classifier = classifiers::load(&config)?;
    let label_font = config
        .label_font
        .as_deref()
        .map(load_font)
        .transpose()?
        .map(Arc::new);
    let addr = format!("{}:{}", config.host, config.port);

    let state = AppState {
        segmenter: Segmenter::new(config.segmentation),
        classifier: classifier.clone(),
        label_font,
        config: Arc::new(config),
    };

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(classifier) = classifier {
        classifier.shutdown();
    }
    tracing::info!("Server stopped");

    Ok(())
}

/// Build the application routes
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size + MULTIPART_OVERHEAD;

    Router::new()
        .route("/segment", post(handle_segment))
        .route("/recognize", post(handle_recognize))
        .route("/annotate", post(handle_annotate))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Declared request body size, if the client sent one
fn content_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Map a multipart failure; a tripped body limit is reported as an oversized upload
fn multipart_error(
    e: MultipartError,
    declared_size: Option<usize>,
    max_size: usize,
    context: &str,
) -> SegmenterError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        SegmenterError::ImageTooLarge {
            size: declared_size.unwrap_or(max_size + MULTIPART_OVERHEAD),
            max: max_size,
        }
    } else {
        SegmenterError::InvalidRequest(format!("{}: {}", context, e))
    }
}

/// Read the uploaded `file` field and decode it into a grayscale bitmap
async fn read_bitmap(
    headers: &HeaderMap,
    mut multipart: Multipart,
    max_size: usize,
) -> Result<GrayImage, SegmenterError> {
    let declared_size = content_length(headers);
    let mut file_data: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, declared_size, max_size, "Failed to parse multipart"))?
    {
        if field.name() == Some("file") {
            file_data = Some(field.bytes().await.map_err(|e| {
                multipart_error(e, declared_size, max_size, "Failed to read file data")
            })?);
        }
    }

    let data = file_data.ok_or(SegmenterError::MissingFile)?;

    if data.len() > max_size {
        return Err(SegmenterError::ImageTooLarge {
            size: data.len(),
            max: max_size,
        });
    }

    let image = image::load_from_memory(&data)
        .map_err(|e| SegmenterError::UnsupportedFormat(e.to_string()))?;

    Ok(image.to_luma8())
}

/// Run CPU-bound work off the async executor
async fn blocking<T, F>(work: F) -> Result<T, SegmenterError>
where
    F: FnOnce() -> Result<T, SegmenterError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| SegmenterError::Internal(format!("Worker task failed: {}", e)))?
}

/// Handle segmentation requests
async fn handle_segment(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<SegmentResponse>, SegmenterError> {
    let start = Instant::now();
    let bitmap = read_bitmap(&headers, multipart, state.config.max_file_size).await?;

    let segmenter = state.segmenter.clone();
    let segmentation = blocking(move || Ok(segmenter.run(&bitmap))).await?;

    let processing_time_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        "Segmentation completed in {}ms, {} letters",
        processing_time_ms,
        segmentation.boxes.len()
    );

    Ok(Json(SegmentResponse {
        boxes: segmentation.boxes,
        tile_size: state.segmenter.params().tile_size,
        processing_time_ms,
        steps: segmentation.steps,
    }))
}

/// Handle recognition requests
async fn handle_recognize(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<RecognizeResponse>, SegmenterError> {
    let start = Instant::now();
    let recognizer = state.recognizer()?;
    let bitmap = read_bitmap(&headers, multipart, state.config.max_file_size).await?;

    let classifier = recognizer.classifier_name().to_string();
    let recognition = blocking(move || recognizer.recognize(&bitmap)).await?;

    let processing_time_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        "Recognition completed in {}ms, word: {:?}",
        processing_time_ms,
        recognition.word
    );

    Ok(Json(RecognizeResponse {
        word: recognition.word,
        letters: recognition.letters,
        classifier,
        processing_time_ms,
        steps: recognition.steps,
    }))
}

/// Handle annotation requests: returns the bitmap with letter boxes, and
/// predicted letters when a classifier and font are configured, as PNG
async fn handle_annotate(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, SegmenterError> {
    let bitmap = read_bitmap(&headers, multipart, state.config.max_file_size).await?;

    let png = blocking(move || {
        let (boxes, labels): (Vec<BoundingBox>, Vec<String>) = match state.recognizer() {
            Ok(recognizer) => recognizer
                .recognize(&bitmap)?
                .letters
                .iter()
                .map(|l| (l.bbox, l.label.as_string()))
                .unzip(),
            Err(_) => (state.segmenter.run(&bitmap).boxes, Vec::new()),
        };

        let annotated = annotate(&bitmap, &boxes, &labels, state.label_font.as_deref());
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(annotated)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| SegmenterError::Internal(format!("Failed to encode PNG: {}", e)))?;
        Ok(buffer)
    })
    .await?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        classifier: state.classifier.as_ref().map(|c| ClassifierInfo {
            name: c.name().to_string(),
            description: c.description().to_string(),
        }),
        max_file_size_bytes: state.config.max_file_size,
        params: *state.segmenter.params(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{TileBatch, NUM_CLASSES};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use image::Luma;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "letter-segmenter-test-boundary";

    /// Always predicts "x"
    struct ConstantClassifier;

    impl LetterClassifier for ConstantClassifier {
        fn name(&self) -> &'static str {
            "constant"
        }

        fn description(&self) -> &'static str {
            "always x"
        }

        fn classify(&self, batch: &TileBatch) -> Result<Vec<Vec<f32>>, SegmenterError> {
            let mut row = vec![0.0; NUM_CLASSES];
            row[24] = 1.0;
            Ok(vec![row; batch.len])
        }
    }

    fn state(classifier: Option<Arc<dyn LetterClassifier>>, max_file_size: usize) -> AppState {
        AppState {
            segmenter: Segmenter::default(),
            classifier,
            label_font: None,
            config: Arc::new(Config {
                max_file_size,
                ..Config::default()
            }),
        }
    }

    fn two_letter_png() -> Vec<u8> {
        let mut img = GrayImage::from_pixel(400, 200, Luma([255]));
        draw_filled_rect_mut(&mut img, Rect::at(50, 50).of_size(30, 80), Luma([0]));
        draw_filled_rect_mut(&mut img, Rect::at(150, 60).of_size(40, 70), Luma([0]));

        let mut buffer = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn upload(uri: &str, field: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
                 filename=\"word.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(header::CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(state(None, 1024 * 1024));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_info_reports_params() {
        let app = router(state(None, 1024));
        let response = app
            .oneshot(Request::get("/info").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = json_body(response).await;
        assert_eq!(body["max_file_size_bytes"], 1024);
        assert_eq!(body["params"]["min_size"], 20);
        assert_eq!(body["params"]["max_distance"], 30);
        assert!(body["classifier"].is_null());
    }

    #[tokio::test]
    async fn test_segment_returns_sorted_boxes() {
        let app = router(state(None, 1024 * 1024));
        let response = app
            .oneshot(upload("/segment", "file", &two_letter_png()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let boxes = body["boxes"].as_array().unwrap();
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0]["x0"], 50);
        assert_eq!(boxes[0]["x1"], 80);
        assert_eq!(boxes[1]["x0"], 150);
        assert_eq!(boxes[1]["y1"], 130);
        assert_eq!(body["tile_size"], 28);
    }

    #[tokio::test]
    async fn test_missing_file_field() {
        let app = router(state(None, 1024 * 1024));
        let response = app
            .oneshot(upload("/segment", "image", &two_letter_png()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "MISSING_FILE");
    }

    #[tokio::test]
    async fn test_undecodable_upload() {
        let app = router(state(None, 1024 * 1024));
        let response = app
            .oneshot(upload("/segment", "file", b"definitely not an image"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "UNSUPPORTED_FORMAT");
    }

    #[tokio::test]
    async fn test_oversized_upload() {
        let app = router(state(None, 16));
        let response = app
            .oneshot(upload("/segment", "file", &two_letter_png()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json_body(response).await["code"], "IMAGE_TOO_LARGE");
    }

    #[tokio::test]
    async fn test_body_past_limit_is_too_large() {
        // Far beyond max_file_size plus the multipart allowance, so the body
        // limit trips while the field is still being read
        let data = vec![0u8; 200 * 1024];
        let request = upload("/segment", "file", &data);
        let declared = request.headers()[header::CONTENT_LENGTH].clone();

        let app = router(state(None, 1024));
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = json_body(response).await;
        assert_eq!(body["code"], "IMAGE_TOO_LARGE");
        let message = body["error"].as_str().unwrap();
        assert!(message.contains(declared.to_str().unwrap()), "{}", message);
    }

    #[tokio::test]
    async fn test_recognize_without_classifier() {
        let app = router(state(None, 1024 * 1024));
        let response = app
            .oneshot(upload("/recognize", "file", &two_letter_png()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["code"], "CLASSIFIER_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_recognize_with_classifier() {
        let app = router(state(Some(Arc::new(ConstantClassifier)), 1024 * 1024));
        let response = app
            .oneshot(upload("/recognize", "file", &two_letter_png()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["word"], "xx");
        assert_eq!(body["classifier"], "constant");
        assert_eq!(body["letters"][0]["label"], "x");
        assert_eq!(body["letters"][1]["bbox"]["x0"], 150);
    }

    #[tokio::test]
    async fn test_annotate_returns_png() {
        let app = router(state(None, 1024 * 1024));
        let response = app
            .oneshot(upload("/annotate", "file", &two_letter_png()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let annotated = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(annotated.dimensions(), (400, 200));
        assert_eq!(annotated.get_pixel(50, 50).0, [0, 255, 0]);
    }

    #[tokio::test]
    async fn test_annotate_writes_predicted_letters() {
        let Some(font) = [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
        ]
        .iter()
        .find_map(|path| load_font(std::path::Path::new(path)).ok()) else {
            eprintln!("no system font found, skipping label rendering test");
            return;
        };
        let state = AppState {
            label_font: Some(Arc::new(font)),
            ..state(Some(Arc::new(ConstantClassifier)), 1024 * 1024)
        };
        let response = router(state)
            .oneshot(upload("/annotate", "file", &two_letter_png()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let annotated = image::load_from_memory(&bytes).unwrap().to_rgb8();
        // The "x" sits in the strip above the first box at (50, 50)
        let inked = (32..47)
            .flat_map(|y| (50..70).map(move |x| (x, y)))
            .filter(|&(x, y)| annotated.get_pixel(x, y).0 != [255, 255, 255])
            .count();
        assert!(inked > 0);
    }
}
