//! Document API endpoints.
//!
//! Handlers for single and bulk upload, listing by project, retrieval,
//! partial update and delete.

use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::StatusCode,
};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::db::{Document, DocumentChanges, DocumentType};
use crate::error::{ServiceError, ServiceResult};
use crate::service::NewDocument;

use super::AppState;
use super::auth::CurrentUser;

/// Response for delete operations
#[derive(Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

/// Partial update of a document. Absent fields are left alone;
/// `description` and `content` may be set to `null`.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateDocumentRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub content: Option<Option<serde_json::Value>>,
}

impl From<UpdateDocumentRequest> for DocumentChanges {
    fn from(request: UpdateDocumentRequest) -> Self {
        DocumentChanges {
            name: request.name,
            description: request.description,
            content: request.content,
        }
    }
}

/// Distinguish a present `null` from an absent field
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// A file that could not be uploaded as part of a bulk request
#[derive(Debug, Serialize)]
pub struct FailedUpload {
    pub filename: String,
    pub error: String,
}

/// Outcome of a bulk upload
#[derive(Debug, Serialize)]
pub struct BulkUploadResult {
    pub uploaded_documents: Vec<Document>,
    pub failed_uploads: Vec<FailedUpload>,
    pub total_files: usize,
    pub total_uploaded: usize,
    pub total_errors: usize,
}

/// Upload a single document
pub async fn upload_document_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> ServiceResult<Json<Document>> {
    let mut project_id: Option<i64> = None;
    let mut file: Option<(String, Bytes)> = None;
    let mut name: Option<String> = None;
    let mut description: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(invalid_multipart)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "project_id" => {
                project_id = Some(parse_project_id(&field.text().await.map_err(invalid_multipart)?)?);
            }
            "file" => {
                let filename = field.file_name().unwrap_or("document").to_string();
                let data = field.bytes().await.map_err(invalid_multipart)?;
                file = Some((filename, data));
            }
            "name" => {
                name = Some(field.text().await.map_err(invalid_multipart)?);
            }
            "description" => {
                let text = field.text().await.map_err(invalid_multipart)?;
                if !text.trim().is_empty() {
                    description = Some(text);
                }
            }
            _ => {}
        }
    }

    let project_id =
        project_id.ok_or_else(|| ServiceError::validation("project_id is required"))?;
    let (filename, data) = file.ok_or_else(|| ServiceError::validation("No file provided"))?;

    state.permissions.check_project_access(user.id, project_id)?;

    let document = state
        .service
        .create_document(NewDocument {
            project_id,
            name,
            description,
            document_type: DocumentType::from_filename(&filename),
            uploaded_by_id: user.id,
            filename,
            file_content: data,
        })
        .await?;

    Ok(Json(document))
}

/// Upload several documents into one project. Each file succeeds or fails on its own.
pub async fn bulk_upload_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> ServiceResult<Json<BulkUploadResult>> {
    let mut project_id: Option<i64> = None;
    let mut files: Vec<(String, Bytes)> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(invalid_multipart)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "project_id" => {
                project_id = Some(parse_project_id(&field.text().await.map_err(invalid_multipart)?)?);
            }
            "files" | "files[]" => {
                let filename = field.file_name().unwrap_or("document").to_string();
                let data = field.bytes().await.map_err(invalid_multipart)?;
                files.push((filename, data));
            }
            _ => {}
        }
    }

    let project_id =
        project_id.ok_or_else(|| ServiceError::validation("project_id is required"))?;
    if files.is_empty() {
        return Err(ServiceError::validation("No files provided"));
    }

    state.permissions.check_project_access(user.id, project_id)?;

    let total_files = files.len();
    let uploaded_by_id = user.id;
    let concurrency = state.service.uploads().bulk_concurrency.max(1);

    let outcomes: Vec<(String, ServiceResult<Document>)> = stream::iter(files)
        .map(|(filename, data)| {
            let service = state.service.clone();
            async move {
                let result = service
                    .create_document(NewDocument {
                        project_id,
                        name: None,
                        description: None,
                        document_type: DocumentType::from_filename(&filename),
                        uploaded_by_id,
                        filename: filename.clone(),
                        file_content: data,
                    })
                    .await;
                (filename, result)
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut uploaded_documents = Vec::new();
    let mut failed_uploads = Vec::new();
    for (filename, result) in outcomes {
        match result {
            Ok(document) => uploaded_documents.push(document),
            Err(e) => failed_uploads.push(FailedUpload {
                filename,
                error: e.to_string(),
            }),
        }
    }

    info!(
        project_id,
        total_files,
        uploaded = uploaded_documents.len(),
        failed = failed_uploads.len(),
        "Bulk upload finished"
    );

    Ok(Json(BulkUploadResult {
        total_files,
        total_uploaded: uploaded_documents.len(),
        total_errors: failed_uploads.len(),
        uploaded_documents,
        failed_uploads,
    }))
}

/// List the documents of a project visible to the caller
pub async fn list_project_documents_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(project_id): Path<i64>,
) -> ServiceResult<Json<Vec<Document>>> {
    let documents = state.service.get_documents_by_project(project_id, user.id)?;
    Ok(Json(documents))
}

/// Get a specific document by ID
pub async fn get_document_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(document_id): Path<i64>,
) -> ServiceResult<Json<Document>> {
    let document = state
        .permissions
        .check_document_access(user.id, document_id)?;
    Ok(Json(document))
}

/// Update document fields present in the request body
pub async fn update_document_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(document_id): Path<i64>,
    request: Option<Json<UpdateDocumentRequest>>,
) -> ServiceResult<Json<Document>> {
    state
        .permissions
        .check_document_ownership(user.id, document_id)?;

    let changes = request
        .map(|Json(request)| DocumentChanges::from(request))
        .unwrap_or_default();
    let document = state.service.update_document(document_id, changes)?;

    Ok(Json(document))
}

/// Delete a document and its stored file
pub async fn delete_document_handler(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(document_id): Path<i64>,
) -> ServiceResult<Json<DeleteResponse>> {
    state
        .permissions
        .check_document_ownership(user.id, document_id)?;

    state.service.delete_document(document_id).await?;

    Ok(Json(DeleteResponse {
        message: "Document deleted successfully".to_string(),
    }))
}

fn parse_project_id(value: &str) -> ServiceResult<i64> {
    value
        .trim()
        .parse()
        .map_err(|_| ServiceError::validation(format!("Invalid project_id: {}", value.trim())))
}

fn invalid_multipart(error: MultipartError) -> ServiceError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge {
            message: error.body_text(),
        }
    } else {
        ServiceError::validation(error.body_text())
    }
}
