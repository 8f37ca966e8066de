use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::{Html, IntoResponse, Redirect};
use axum::routing::get;
use axum::Router;
use axum_extra::extract::cookie::CookieJar;
use tower_http::services::ServeDir;

use crate::error::UploadError;
use crate::services::uploads::{self, UploadedImage};
use crate::state::AppState;
use crate::views::{self, ResultView};

// Multipart framing on top of the file itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn router(state: &AppState) -> Router<AppState> {
    let uploads = &state.config.uploads;

    Router::new()
        .route("/", get(index).post(upload_palm))
        .route("/result", get(result))
        .route("/health", get(health_check))
        .nest_service("/uploads", ServeDir::new(&uploads.dir))
        .layer(DefaultBodyLimit::max(uploads.max_bytes + FORM_OVERHEAD_BYTES))
}

async fn index(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let (jar, session_id) = state.sessions.resolve(jar);
    let notices = state.sessions.take_notices(session_id);
    (jar, Html(views::index_page(&notices)))
}

async fn upload_palm(
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> impl IntoResponse {
    let (jar, session_id) = state.sessions.resolve(jar);

    let image = match receive_upload(&state, multipart).await {
        Ok(image) => image,
        Err(e) => {
            tracing::info!(error = %e, "Upload rejected");
            state.sessions.push_notice(session_id, e.to_string());
            return (jar, Redirect::to("/"));
        }
    };
    tracing::info!(
        original = %image.original_filename,
        stored = %image.filename,
        bytes = image.data.len(),
        "Palm image stored"
    );

    let reading = state.reader.read_palm(&image.path).await;
    state.sessions.set_reading(session_id, reading);

    (jar, Redirect::to("/result"))
}

async fn receive_upload(
    state: &AppState,
    multipart: Multipart,
) -> Result<UploadedImage, UploadError> {
    let uploads = &state.config.uploads;
    let (filename, data) = uploads::extract_palm_image(multipart, uploads.max_bytes).await?;
    let image = UploadedImage::prepare(&uploads.dir, filename, data)?;
    image.store().await?;
    Ok(image)
}

async fn result(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let (jar, session_id) = state.sessions.resolve(jar);
    let session = state.sessions.get(session_id);
    let view = ResultView::from_session(session.as_ref());
    (jar, Html(views::result_page(&view)))
}

async fn health_check() -> impl IntoResponse {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
