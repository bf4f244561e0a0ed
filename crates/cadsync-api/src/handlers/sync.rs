use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use cadsync_core::models::{ImportReport, ParsedDrawing, ReimportReport};
use cadsync_engine::{CancelFlag, ReimportScope};
use cadsync_store::CadStore;

use super::parse_project;
use crate::dto::ExportRequest;
use crate::error::ApiError;
use crate::state::AppState;

/// Uploaded drawing plus the optional form fields that accompany it
struct Upload {
    filename: String,
    data: Vec<u8>,
    drawing_id: Option<String>,
    scope: ReimportScope,
}

pub async fn import_drawing<S: CadStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(project_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<ImportReport>, ApiError> {
    let project_id = parse_project(&project_id)?;
    let upload = extract_upload(&mut multipart).await?;
    tracing::info!(
        project_id = %project_id,
        filename = %upload.filename,
        size = upload.data.len(),
        "Received drawing for import"
    );

    let drawing = parse_upload(&state, &upload)?;
    let report = state.engine.import_drawing(project_id, &drawing, &CancelFlag::new()).await?;
    Ok(Json(report))
}

pub async fn reimport_drawing<S: CadStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(project_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<ReimportReport>, ApiError> {
    let project_id = parse_project(&project_id)?;
    let upload = extract_upload(&mut multipart).await?;
    tracing::info!(
        project_id = %project_id,
        filename = %upload.filename,
        size = upload.data.len(),
        scope = ?upload.scope,
        "Received drawing for reimport"
    );

    let drawing = parse_upload(&state, &upload)?;
    let report = state
        .engine
        .reimport_drawing(project_id, &drawing, upload.scope, &CancelFlag::new())
        .await?;
    Ok(Json(report))
}

pub async fn export_drawing<S: CadStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(project_id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let project_id = parse_project(&project_id)?;
    // An empty body exports with canonical layer names
    let request: ExportRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ExportRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            ApiError::bad_request("Invalid export request").with_details(e.to_string())
        })?
    };
    let config = request.into_config(state.engine.config());

    let exported = state.engine.export(project_id, &config).await?;
    let summary = serde_json::to_string(&exported.summary)
        .map_err(|e| ApiError::internal("Failed to encode export summary").with_details(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/dxf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.dxf\"", project_id),
            ),
            (header::HeaderName::from_static("x-cadsync-export-summary"), summary),
        ],
        exported.bytes,
    )
        .into_response())
}

fn parse_upload<S: CadStore>(state: &AppState<S>, upload: &Upload) -> Result<ParsedDrawing, ApiError> {
    let mut drawing = state.engine.formats().parse(&upload.filename, &upload.data)?;
    if let Some(drawing_id) = &upload.drawing_id {
        drawing = drawing.with_drawing_id(drawing_id.clone());
    }
    Ok(drawing)
}

async fn extract_upload(multipart: &mut Multipart) -> Result<Upload, ApiError> {
    let mut file = None;
    let mut drawing_id = None;
    let mut scope = ReimportScope::Project;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::bad_request("Failed to parse multipart form").with_details(e.to_string())
    })? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload.dxf").to_string();
                let data = field.bytes().await.map_err(|e| {
                    ApiError::bad_request("Failed to read file data").with_details(e.to_string())
                })?;
                file = Some((filename, data.to_vec()));
            }
            "drawing_id" => drawing_id = Some(read_text(field).await?),
            "scope" => {
                scope = match read_text(field).await?.as_str() {
                    "project" => ReimportScope::Project,
                    "drawing" => ReimportScope::Drawing,
                    other => {
                        return Err(ApiError::bad_request("Invalid scope")
                            .with_details(format!("expected 'project' or 'drawing', got '{}'", other)))
                    }
                }
            }
            _ => {}
        }
    }

    let Some((filename, data)) = file else {
        return Err(ApiError::bad_request("No file provided")
            .with_details("Expected a 'file' field in the multipart form"));
    };
    Ok(Upload { filename, data, drawing_id, scope })
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map(|text| text.trim().to_string())
        .map_err(|e| ApiError::bad_request("Failed to read form field").with_details(e.to_string()))
}
