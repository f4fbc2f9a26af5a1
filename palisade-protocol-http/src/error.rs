use http::StatusCode;
use poem::{IntoResponse, Response};
use serde_json::json;
use tracing::error;
use palisade_core::GateRejection;

/// Client-facing envelope for every policy rejection. Internal errors
/// are logged in full and reported as a generic 500. Validation
/// rejections carry the individual violations so the client can show
/// them all at once.
pub fn rejection_response(rejection: GateRejection) -> Response {
    if let GateRejection::Internal(e) = &rejection {
        error!(error = %e, "request failed");
    }
    let status =
        StatusCode::from_u16(rejection.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = match &rejection {
        GateRejection::InvalidInput(details) => json!({
            "error": rejection.message(),
            "details": details,
        }),
        _ => json!({ "error": rejection.message() }),
    };
    poem::web::Json(body).with_status(status).into_response()
}

pub fn rejection_error(rejection: GateRejection) -> poem::Error {
    poem::Error::from_response(rejection_response(rejection))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_input_lists_every_violation() {
        let rejection = GateRejection::InvalidInput(vec![
            "Password must be at least 12 characters long".to_owned(),
            "Password must contain an uppercase letter".to_owned(),
        ]);
        let resp = rejection_response(rejection);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value =
            serde_json::from_str(&resp.into_body().into_string().await.unwrap()).unwrap();
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["details"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn internal_errors_stay_opaque() {
        let rejection = GateRejection::Unauthenticated;
        let resp = rejection_response(rejection);
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let body: serde_json::Value =
            serde_json::from_str(&resp.into_body().into_string().await.unwrap()).unwrap();
        assert!(body.get("details").is_none());
    }
}
