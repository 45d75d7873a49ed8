//! services/api/src/web/webhook.rs
//!
//! Receives identity-provider events (Clerk, delivered through svix) and keeps
//! the local profile rows in step with the provider's users.
//!
//! A delivery is accepted when one of the `v1,<base64>` entries in
//! `svix-signature` equals `base64(HMAC-SHA256(key, "{id}.{timestamp}.{body}"))`,
//! where `key` is the base64 part of the `whsec_` secret, and the timestamp is
//! within five minutes of now.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use chrono::Utc;
use hadith_core::ports::PortError;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::web::rest::ApiResponse;
use crate::web::state::AppState;

type HmacSha256 = Hmac<Sha256>;

const SECRET_PREFIX: &str = "whsec_";
const TIMESTAMP_TOLERANCE_SECS: u64 = 5 * 60;

//=========================================================================================
// Signature Verification
//=========================================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("invalid timestamp header")]
    InvalidTimestamp,
    #[error("timestamp outside the tolerance window")]
    StaleTimestamp,
    #[error("no matching signature")]
    NoMatchingSignature,
}

/// The three svix headers of one delivery.
#[derive(Debug, Clone)]
pub struct SvixHeaders<'a> {
    pub id: &'a str,
    pub timestamp: &'a str,
    pub signature: &'a str,
}

impl<'a> SvixHeaders<'a> {
    /// `None` when any of the headers is absent or not valid UTF-8.
    pub fn from_headers(headers: &'a HeaderMap) -> Option<Self> {
        let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
        Some(Self {
            id: get("svix-id")?,
            timestamp: get("svix-timestamp")?,
            signature: get("svix-signature")?,
        })
    }
}

/// Verifies svix signatures for one signing secret.
pub struct SvixVerifier {
    key: Vec<u8>,
}

impl SvixVerifier {
    pub fn new(secret: &str) -> Result<Self, ApiError> {
        let encoded = secret.strip_prefix(SECRET_PREFIX).unwrap_or(secret);
        let key = STANDARD
            .decode(encoded)
            .map_err(|e| ApiError::Internal(format!("Invalid webhook secret: {}", e)))?;
        Ok(Self { key })
    }

    pub fn verify(
        &self,
        headers: &SvixHeaders<'_>,
        body: &[u8],
        now_secs: i64,
    ) -> Result<(), VerifyError> {
        let timestamp = headers
            .timestamp
            .trim()
            .parse::<i64>()
            .map_err(|_| VerifyError::InvalidTimestamp)?;
        if now_secs.abs_diff(timestamp) > TIMESTAMP_TOLERANCE_SECS {
            return Err(VerifyError::StaleTimestamp);
        }

        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|_| VerifyError::NoMatchingSignature)?;
        mac.update(format!("{}.{}.", headers.id, timestamp).as_bytes());
        mac.update(body);

        // verify_slice compares in constant time.
        let matched = headers
            .signature
            .split_whitespace()
            .filter_map(|entry| entry.split_once(','))
            .filter(|(version, _)| *version == "v1")
            .filter_map(|(_, sig)| STANDARD.decode(sig).ok())
            .any(|sig| mac.clone().verify_slice(&sig).is_ok());

        if matched {
            Ok(())
        } else {
            Err(VerifyError::NoMatchingSignature)
        }
    }
}

//=========================================================================================
// Event Payloads
//=========================================================================================

#[derive(Debug, Deserialize)]
struct ClerkEvent {
    #[serde(rename = "type")]
    kind: String,
    data: ClerkUser,
}

#[derive(Debug, Deserialize)]
struct ClerkUser {
    id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email_addresses: Vec<ClerkEmail>,
}

#[derive(Debug, Deserialize)]
struct ClerkEmail {
    email_address: String,
}

impl ClerkUser {
    /// The chosen username, else the local part of the first email address.
    fn display_name(&self) -> Option<String> {
        self.username.clone().filter(|u| !u.is_empty()).or_else(|| {
            self.email_addresses
                .first()
                .and_then(|e| e.email_address.split('@').next())
                .filter(|local| !local.is_empty())
                .map(str::to_string)
        })
    }
}

//=========================================================================================
// Handler
//=========================================================================================

/// Receive a signed identity-provider event.
#[utoipa::path(
    post,
    path = "/api/webhook/clerk",
    request_body(content = String, description = "Raw svix-signed event body", content_type = "application/json"),
    params(
        ("svix-id" = String, Header, description = "Message id"),
        ("svix-timestamp" = String, Header, description = "Unix seconds"),
        ("svix-signature" = String, Header, description = "Space-separated `v1,<base64>` entries")
    ),
    responses(
        (status = 201, description = "Profile created"),
        (status = 200, description = "Profile deleted or event ignored"),
        (status = 400, description = "Missing headers or bad signature"),
        (status = 404, description = "Deleted user had no profile"),
        (status = 500, description = "Webhook secret not configured")
    )
)]
pub async fn clerk_webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<ApiResponse<()>>)> {
    let svix = SvixHeaders::from_headers(&headers)
        .ok_or_else(|| ApiError::BadRequest("Missing svix headers".to_string()))?;
    let secret = state
        .config
        .clerk_webhook_secret
        .as_deref()
        .ok_or_else(|| ApiError::Internal("CLERK_WEBHOOK_SECRET is not configured".to_string()))?;

    SvixVerifier::new(secret)?
        .verify(&svix, &body, Utc::now().timestamp())
        .map_err(|e| {
            warn!(svix_id = svix.id, "Error verifying webhook: {}", e);
            ApiError::BadRequest("Error verifying webhook".to_string())
        })?;

    let event: ClerkEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid webhook payload: {}", e)))?;

    match event.kind.as_str() {
        "user.created" => {
            let username = event.data.display_name();
            state
                .db
                .ensure_profile(&event.data.id, username.as_deref())
                .await?;
            info!(user_id = %event.data.id, "User profile created");
            Ok((
                StatusCode::CREATED,
                Json(ApiResponse::acknowledged("User profile created")),
            ))
        }
        "user.deleted" => {
            state
                .db
                .delete_profile(&event.data.id)
                .await
                .map_err(|e| match e {
                    PortError::NotFound(_) => ApiError::NotFound("Profile not found".to_string()),
                    other => ApiError::Port(other),
                })?;
            info!(user_id = %event.data.id, "User profile deleted");
            Ok((
                StatusCode::OK,
                Json(ApiResponse::acknowledged("User profile deleted")),
            ))
        }
        other => {
            info!(event = other, "Ignoring webhook event");
            Ok((StatusCode::OK, Json(ApiResponse::acknowledged("Webhook received"))))
        }
    }
}
