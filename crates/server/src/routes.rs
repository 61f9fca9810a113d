use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use decipher::intake::DragEvent;
use decipher::{ui, ImageFile, Session, UploadSource, View};
use serde::Deserialize;
use tracing::{debug, warn};

/// State shared by all routes.
#[derive(Clone)]
pub struct AppState {
    pub session: Session,
    pub spool_dir: Option<Arc<PathBuf>>,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/upload", post(upload))
        .route("/analyze", post(analyze))
        .route("/drag", post(drag))
        .route("/api/state", get(api_state))
        .route("/health", get(|| async { "OK" }))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(ui::render_page(&state.session.view()))
}

async fn api_state(State(state): State<AppState>) -> Json<View> {
    Json(state.session.view())
}

/// POST /upload: multipart with a `file` field and an optional `source` field.
async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut source = UploadSource::Picker;
    let mut upload = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Rejected upload");
                return e.into_response();
            }
        };
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let mime = field.content_type().map(str::to_string);
                match field.bytes().await {
                    Ok(bytes) => upload = Some((name, mime, bytes)),
                    Err(e) => {
                        warn!(error = %e, "Upload body could not be read");
                        return e.into_response();
                    }
                }
            }
            Some("source") => {
                if let Ok(text) = field.text().await {
                    source = UploadSource::parse(&text);
                }
            }
            _ => {}
        }
    }

    // A submit with no file chosen leaves the state alone.
    let Some((name, mime, bytes)) = upload.filter(|(name, _, bytes)| !name.is_empty() || !bytes.is_empty()) else {
        debug!("Upload without a file");
        return Redirect::to("/").into_response();
    };

    let file = match &state.spool_dir {
        Some(dir) => match ImageFile::spool(dir, name, mime.as_deref(), bytes).await {
            Ok(file) => file,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Could not spool upload");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Could not store the upload.").into_response();
            }
        },
        None => ImageFile::from_bytes(name, mime.as_deref(), bytes),
    };
    let _ = state.session.select_image(file, source);

    Redirect::to("/").into_response()
}

async fn analyze(State(state): State<AppState>) -> Redirect {
    let _ = state.session.analyze();
    Redirect::to("/")
}

#[derive(Deserialize)]
struct DragForm {
    event: String,
}

async fn drag(State(state): State<AppState>, Form(form): Form<DragForm>) -> StatusCode {
    let event = match form.event.as_str() {
        "enter" => DragEvent::Enter,
        "over" => DragEvent::Over,
        "leave" => DragEvent::Leave,
        "drop" => DragEvent::Drop,
        _ => return StatusCode::BAD_REQUEST,
    };
    state.session.drag(event);
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use decipher::{AnalysisClient, AnalysisError, AnalysisRequest, UiState};
    use reqwest::multipart::{Form as MultipartForm, Part};

    use super::*;

    struct Echo(&'static str);

    #[async_trait::async_trait]
    impl AnalysisClient for Echo {
        async fn analyze(&self, _request: AnalysisRequest) -> Result<String, AnalysisError> {
            Ok(self.0.to_string())
        }
    }

    async fn serve(spool_dir: Option<PathBuf>) -> String {
        let state = AppState {
            session: Session::new(Arc::new(Echo("Hello World"))),
            spool_dir: spool_dir.map(Arc::new),
        };
        let app = router(state, 1024 * 1024);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn view(base: &str) -> View {
        reqwest::get(format!("{base}/api/state")).await.unwrap().json().await.unwrap()
    }

    /// Poll the state endpoint until `done` holds.
    async fn wait_for(base: &str, done: impl Fn(&View) -> bool) -> View {
        for _ in 0..100 {
            let v = view(base).await;
            if done(&v) {
                return v;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("state never settled");
    }

    async fn upload(base: &str, name: &str, mime: &str, source: &str) -> String {
        let part = Part::bytes(b"\x89PNG\r\n\x1a\n".to_vec())
            .file_name(name.to_string())
            .mime_str(mime)
            .unwrap();
        let form = MultipartForm::new().part("file", part).text("source", source.to_string());
        let response = reqwest::Client::new()
            .post(format!("{base}/upload"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
        response.text().await.unwrap()
    }

    #[tokio::test]
    async fn empty_page_and_health() {
        let base = serve(None).await;
        let page = reqwest::get(format!("{base}/")).await.unwrap().text().await.unwrap();
        assert!(page.contains("Image Text Decipher"));
        assert!(page.contains("Click to upload"));

        let health = reqwest::get(format!("{base}/health")).await.unwrap().text().await.unwrap();
        assert_eq!(health, "OK");
    }

    #[tokio::test]
    async fn analyze_without_upload_shows_message() {
        let base = serve(None).await;
        let page = reqwest::Client::new()
            .post(format!("{base}/analyze"))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(page.contains("Please upload an image first."));
        assert_eq!(view(&base).await.state, UiState::Failed);
    }

    #[tokio::test]
    async fn form_posts_redirect_back_with_see_other() {
        let base = serve(None).await;
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        let response = client.post(format!("{base}/analyze")).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/");

        let form = MultipartForm::new().text("source", "picker");
        let response = client.post(format!("{base}/upload")).multipart(form).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/");
    }

    #[tokio::test]
    async fn upload_analyze_reupload() {
        let base = serve(None).await;
        upload(&base, "photo.png", "image/png", "picker").await;
        let v = wait_for(&base, |v| v.preview.is_some()).await;
        assert_eq!(v.file_name.as_deref(), Some("photo.png"));

        reqwest::Client::new().post(format!("{base}/analyze")).send().await.unwrap();
        let v = wait_for(&base, |v| v.state == UiState::Done).await;
        assert_eq!(v.result.as_deref(), Some("Hello World"));
        assert!(v.error.is_none());
        let page = reqwest::get(format!("{base}/")).await.unwrap().text().await.unwrap();
        assert!(page.contains("<p>Hello World</p>"));

        upload(&base, "photo2.jpg", "image/jpeg", "drop").await;
        let v = wait_for(&base, |v| v.preview.is_some()).await;
        assert_eq!(v.state, UiState::Ready);
        assert!(v.result.is_none());
        assert_eq!(v.file_name.as_deref(), Some("photo2.jpg"));
    }

    #[tokio::test]
    async fn spooled_uploads_work() {
        let base = serve(Some(std::env::temp_dir())).await;
        upload(&base, "photo.png", "image/png", "picker").await;
        let v = wait_for(&base, |v| v.preview.is_some()).await;
        let (mime, bytes) = v.preview.unwrap().decode().unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"\x89PNG\r\n\x1a\n");
    }

    #[tokio::test]
    async fn drag_events_update_state() {
        let base = serve(None).await;
        let client = reqwest::Client::new();
        let status = client
            .post(format!("{base}/drag"))
            .form(&[("event", "enter")])
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status, reqwest::StatusCode::NO_CONTENT);
        assert!(view(&base).await.dragging);

        client.post(format!("{base}/drag")).form(&[("event", "leave")]).send().await.unwrap();
        assert!(!view(&base).await.dragging);

        let status = client
            .post(format!("{base}/drag"))
            .form(&[("event", "sideways")])
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status, reqwest::StatusCode::BAD_REQUEST);
    }
}
