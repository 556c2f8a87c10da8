use askama::Template;
use axum::Json;
use axum::extract::{Form, Multipart, OriginalUri, State};
use axum::extract::multipart::Field;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use paperpost::{ColorMode, ConvertOptions, Error, Rotation, UploadedFile};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::state::AppState;
use super::templates::{ConverterTemplate, IndexTemplate, LoaderTemplate, SlideshowTemplate};

/// Maps the service error taxonomy onto HTTP statuses.
pub struct AppError(Error);

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        } else {
            warn!(error = %self.0, "Request rejected");
        }
        (status, self.0.to_string()).into_response()
    }
}

fn bad_request(msg: String) -> AppError {
    AppError(Error::Validation(msg))
}

fn render(tpl: impl Template) -> Response {
    match tpl.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, "Template render failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// Runs blocking service calls (file writes, camera, directory scans) off the async executor.
async fn blocking<T, F>(state: &AppState, op: F) -> Result<T, AppError>
where
    F: FnOnce(&paperpost::DisplayService) -> paperpost::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let service = state.service.clone();
    tokio::task::spawn_blocking(move || op(&service))
        .await
        .map_err(|e| AppError(Error::Io(std::io::Error::other(format!("task join error: {e}")))))?
        .map_err(AppError)
}

pub async fn index(State(state): State<AppState>) -> Response {
    let status = state.service.status();
    render(IndexTemplate {
        panel: state.service.panel().to_string(),
        busy: status.busy,
        queued: status.queued,
        slideshow: status.slideshow,
    })
}

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.status())
}

pub async fn converter_page(State(state): State<AppState>) -> Response {
    let service = &state.service;
    let defaults = service.default_options();
    render(ConverterTemplate {
        panel: service.panel().to_string(),
        palette: service.panel().color_mode == ColorMode::SevenColorPalette,
        threshold: defaults.threshold,
        threshold_offset: defaults.threshold_offset,
        saturation: format!("{:.2}", defaults.saturation),
        accept: accept_attr(service.allowed_extensions()),
    })
}

pub async fn converter_upload(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    let mut options = state.service.default_options();
    let mut file: Option<UploadedFile> = None;

    while let Some(field) = next_field(&mut multipart).await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match name.as_str() {
            "file" => file = read_file(field).await?,
            "rotation" => {
                if let Some(deg) = parse_text::<u16>(field).await {
                    options.rotation = Rotation::from_degrees(deg);
                }
            }
            "threshold" => {
                if let Some(v) = parse_text::<u8>(field).await {
                    options.threshold = v;
                }
            }
            "threshold_offset" => {
                if let Some(v) = parse_text::<u8>(field).await {
                    options.threshold_offset = v;
                }
            }
            "saturation" => {
                if let Some(v) = parse_text::<f32>(field).await {
                    options.saturation = v.clamp(0.0, 1.0);
                }
            }
            "bicolor" => options.bicolor = checkbox(field).await,
            "invert" => options.invert = checkbox(field).await,
            "dither" => options.dither = checkbox(field).await,
            "swap" => options.swap_planes = checkbox(field).await,
            "monochrome" => options.monochrome = checkbox(field).await,
            _ => {}
        }
    }

    let Some(file) = file else {
        return Err(bad_request("no file provided".into()));
    };
    info!(name = %file.name, ?options, "Converter upload");
    let depth = blocking(&state, move |service| service.submit_upload(file, options)).await?;
    info!(depth, "Conversion queued");
    Ok(Redirect::to(uri.path()))
}

pub async fn loader_page(State(state): State<AppState>) -> Response {
    let service = &state.service;
    render(LoaderTemplate {
        panel: service.panel().to_string(),
        width: service.panel().width,
        height: service.panel().height,
        accept: accept_attr(service.prepared_extensions()),
    })
}

pub async fn loader_upload(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    let mut black = None;
    let mut red = None;

    while let Some(field) = next_field(&mut multipart).await? {
        match field.name() {
            Some("file_b") => black = read_file(field).await?,
            Some("file_r") => red = read_file(field).await?,
            _ => {}
        }
    }

    if black.is_none() && red.is_none() {
        return Err(bad_request("no image in request".into()));
    }
    blocking(&state, move |service| service.submit_prepared(black, red)).await?;
    Ok(Redirect::to(uri.path()))
}

pub async fn camera(State(state): State<AppState>) -> Result<Redirect, AppError> {
    info!("Camera capture requested");
    blocking(&state, |service| service.capture(service.default_options())).await?;
    Ok(Redirect::to("/"))
}

pub async fn slideshow_page(State(state): State<AppState>) -> Response {
    let service = &state.service;
    let slideshow = service.slideshow();
    render(SlideshowTemplate {
        panel: service.panel().to_string(),
        running: slideshow.is_running(),
        images: slideshow.image_count(),
        cadence_secs: slideshow.cadence().as_secs(),
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct SlideshowForm {
    #[serde(default)]
    enabled: Option<bool>,
}

pub async fn slideshow_toggle(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    form: Option<Form<SlideshowForm>>,
) -> Result<Redirect, AppError> {
    let requested = form.and_then(|Form(f)| f.enabled);
    let running = blocking(&state, move |service| match requested {
        Some(enabled) => service.set_slideshow(enabled),
        None => service.toggle_slideshow(),
    })
    .await?;
    info!(running, "Slideshow updated");
    Ok(Redirect::to(uri.path()))
}

pub async fn clear(State(state): State<AppState>) -> Redirect {
    let depth = state.service.clear();
    info!(depth, "Clear queued");
    Redirect::to("/")
}

async fn next_field<'a>(multipart: &'a mut Multipart) -> Result<Option<Field<'a>>, AppError> {
    multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("multipart parse error: {e}")))
}

/// `None` for an empty file input, which browsers still submit.
async fn read_file(field: Field<'_>) -> Result<Option<UploadedFile>, AppError> {
    let name = field.file_name().unwrap_or_default().to_string();
    let bytes = field
        .bytes()
        .await
        .map_err(|e| bad_request(format!("read error: {e}")))?;
    if name.is_empty() && bytes.is_empty() {
        return Ok(None);
    }
    info!(name = %name, size = bytes.len(), "Received upload");
    Ok(Some(UploadedFile {
        name,
        bytes: bytes.to_vec(),
    }))
}

async fn parse_text<T: std::str::FromStr>(field: Field<'_>) -> Option<T> {
    field.text().await.ok()?.trim().parse().ok()
}

async fn checkbox(field: Field<'_>) -> bool {
    match field.text().await {
        Ok(v) => matches!(v.trim(), "on" | "true" | "1" | "yes"),
        Err(_) => false,
    }
}

fn accept_attr(extensions: &[String]) -> String {
    extensions
        .iter()
        .map(|e| format!(".{e}"))
        .collect::<Vec<_>>()
        .join(",")
}
