//! The upload form: `GET /` and `POST /`

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::Html,
};
use burn::tensor::backend::Backend;
use tracing::{debug, error, info, warn};

use crate::server::render::{render_page, PageContext};
use crate::server::state::SharedState;
use crate::utils::error::LeafError;

/// Multipart field carrying the image
pub const UPLOAD_FIELD: &str = "leaf_image";

/// URL prefix of saved uploads, relative to the site root
pub const UPLOAD_URL_PREFIX: &str = "static/uploads";

type HandlerError = (StatusCode, String);

/// Reduce a client-supplied filename to its final path component.
///
/// Both `/` and `\` count as separators. Returns `None` when nothing usable
/// remains (empty, `.` or `..`).
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or("").trim();
    match base {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

/// GET / - Render the empty form
pub async fn show<B: Backend>(State(_state): State<SharedState<B>>) -> Html<String> {
    Html(render_page(&PageContext::default()))
}

/// POST / - Save the uploaded leaf image and classify it
pub async fn upload<B: Backend>(
    State(state): State<SharedState<B>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Html<String>, HandlerError> {
    // A body that is not multipart at all carries no file part
    let Ok(mut multipart) = multipart else {
        return Ok(Html(render_page(&PageContext::message("No file part"))));
    };

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!("Malformed multipart body: {}", e);
        (StatusCode::BAD_REQUEST, format!("Malformed upload: {}", e))
    })? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        // Parts without a filename are form values, not files
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await.map_err(|e| {
            warn!("Failed to read upload: {}", e);
            (StatusCode::BAD_REQUEST, format!("Malformed upload: {}", e))
        })?;
        upload = Some((file_name, bytes));
        break;
    }

    let Some((file_name, bytes)) = upload else {
        return Ok(Html(render_page(&PageContext::message("No file part"))));
    };
    let Some(file_name) = sanitize_filename(&file_name) else {
        return Ok(Html(render_page(&PageContext::message("No selected file"))));
    };

    let save_path = state.config.upload_dir().join(&file_name);
    tokio::fs::write(&save_path, &bytes).await.map_err(|e| {
        error!("Failed to save upload {:?}: {}", save_path, e);
        internal_error("Failed to save upload")
    })?;
    let img_url = format!("{}/{}", UPLOAD_URL_PREFIX, file_name);

    let predict_state = state.clone();
    let predict_path = save_path.clone();
    let prediction = tokio::task::spawn_blocking(move || predict_state.predict(&predict_path))
        .await
        .map_err(|e| {
            error!("Inference task failed: {}", e);
            internal_error("Inference failed")
        })?;

    match prediction {
        Ok(prediction) => {
            info!(
                "Predicted '{}' ({:.1}%) for {:?} in {:.1} ms",
                prediction.label,
                prediction.confidence * 100.0,
                save_path,
                prediction.inference_time_ms
            );
            debug!("{}", prediction.display());
            Ok(Html(render_page(&PageContext::predicted(img_url, prediction))))
        }
        Err(LeafError::ImageLoad(path, reason)) => {
            warn!("Undecodable upload {:?}: {}", path, reason);
            Err((
                StatusCode::BAD_REQUEST,
                format!("Uploaded file '{}' is not a readable image", file_name),
            ))
        }
        Err(e) => {
            error!("Prediction failed for {:?}: {}", save_path, e);
            Err(internal_error("Inference failed"))
        }
    }
}

fn internal_error(message: &str) -> HandlerError {
    (StatusCode::INTERNAL_SERVER_ERROR, message.to_string())
}
