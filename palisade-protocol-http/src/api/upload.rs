use std::path::Path;

use data_encoding::HEXLOWER;
use http::StatusCode;
use poem::web::Data;
use poem::{IntoResponse, Request};
use poem_openapi::payload::Json;
use poem_openapi::types::multipart::Upload;
use poem_openapi::{Multipart, Object, OpenApi};
use rand::RngCore;
use serde_json::json;
use tracing::info;
use palisade_common::helpers::rng::crypto_rng;
use palisade_common::{EventKind, RateAction, Severity};
use palisade_core::{
    AuthorizedUser, FileUpload, GateRejection, NewSecurityEvent, Services, UploadViolation,
};

use crate::common::request_context;
use crate::error::rejection_error;

pub struct Api;

#[derive(Multipart)]
struct UploadPayload {
    file: Upload,
}

#[derive(Object)]
struct UploadResponse {
    success: bool,
    filename: String,
    original_name: String,
    size: u64,
    url: String,
}

fn rejected(violations: &[UploadViolation]) -> poem::Error {
    let details: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
    let body = json!({ "error": "Upload rejected", "details": details });
    poem::Error::from_response(
        poem::web::Json(body)
            .with_status(StatusCode::BAD_REQUEST)
            .into_response(),
    )
}

#[OpenApi]
impl Api {
    /// Accepts a single image file. The stored name is random; only the
    /// original extension survives, so an uploaded name can never collide
    /// with or overwrite another user's file.
    #[oai(path = "/", method = "post", operation_id = "upload")]
    async fn upload(
        &self,
        req: &Request,
        services: Data<&Services>,
        payload: UploadPayload,
    ) -> poem::Result<Json<UploadResponse>> {
        let user_id = req
            .extensions()
            .get::<AuthorizedUser>()
            .map(|a| a.user.id);
        let ctx = request_context(req).ok_or_else(|| {
            poem::Error::from_string(
                "could not determine client address",
                StatusCode::BAD_REQUEST,
            )
        })?;

        // Uploads have their own, tighter quota on top of the api_call
        // limit already applied by the gate middleware.
        let limiter = services.gate.rate_limiter();
        if !limiter
            .allow(RateAction::FileUpload, &ctx.identifier, &ctx.ip)
            .await
            .map_err(|e| rejection_error(GateRejection::Internal(e)))?
        {
            services
                .gate
                .events()
                .record_or_warn(NewSecurityEvent {
                    kind: EventKind::RateLimitExceeded,
                    details: "file_upload".to_owned(),
                    user_id,
                    remote_ip: ctx.ip,
                    user_agent: ctx.user_agent.clone(),
                    severity: Severity::Medium,
                })
                .await;
            return Err(rejection_error(GateRejection::RateLimited));
        }
        limiter
            .record(RateAction::FileUpload, &ctx.identifier, &ctx.ip)
            .await
            .map_err(|e| rejection_error(GateRejection::Internal(e)))?;

        let original_name = payload
            .file
            .file_name()
            .unwrap_or("unnamed")
            .to_owned();
        let declared_mime = payload.file.content_type().map(str::to_owned);
        let upload = match payload.file.into_vec().await {
            Ok(data) => FileUpload {
                file_name: original_name.clone(),
                declared_mime,
                data,
                transport_error: None,
            },
            Err(e) => FileUpload {
                file_name: original_name.clone(),
                declared_mime,
                data: vec![],
                transport_error: Some(e.to_string()),
            },
        };

        let violations = services.upload_validator.validate(&upload);
        if !violations.is_empty() {
            services
                .gate
                .events()
                .record_or_warn(NewSecurityEvent {
                    kind: EventKind::UploadRejected,
                    details: violations
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join("; "),
                    user_id,
                    remote_ip: ctx.ip,
                    user_agent: ctx.user_agent.clone(),
                    severity: Severity::Medium,
                })
                .await;
            return Err(rejected(&violations));
        }

        let mut random = [0u8; 16];
        crypto_rng().fill_bytes(&mut random);
        let extension = palisade_core::extension_of(&original_name).unwrap_or_default();
        let filename = format!("{}.{extension}", HEXLOWER.encode(&random));

        let dir = Path::new(&services.config.http.uploads_dir);
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            poem::Error::from_string(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
        })?;
        let size = upload.data.len() as u64;
        tokio::fs::write(dir.join(&filename), &upload.data)
            .await
            .map_err(|e| {
                poem::Error::from_string(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
            })?;

        info!(filename = %filename, size, "file stored");
        Ok(Json(UploadResponse {
            success: true,
            url: format!("/uploads/{filename}"),
            filename,
            original_name,
            size,
        }))
    }
}
