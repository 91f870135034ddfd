//! Supabase API wire types
//!
//! Request and response bodies for the GoTrue auth API (`/auth/v1`) and the
//! PostgREST `drivers` table (`/rest/v1/drivers`).

use bridge_traits::backend::{AuthSession, Identity, Registration, UserId};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// GoTrue user object
#[derive(Debug, Clone, Deserialize)]
pub struct GoTrueUser {
    pub id: String,

    #[serde(default)]
    pub email: Option<String>,
}

impl From<GoTrueUser> for Identity {
    fn from(user: GoTrueUser) -> Self {
        Identity {
            id: UserId::from(user.id),
            email: user.email,
        }
    }
}

/// Response of `/auth/v1/token` and of an auto-confirmed `/auth/v1/signup`
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Lifetime of the access token in seconds
    pub expires_in: i64,

    /// Absolute expiry (Unix seconds); older servers omit it
    #[serde(default)]
    pub expires_at: Option<i64>,

    pub refresh_token: String,

    pub user: GoTrueUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl TokenResponse {
    /// Convert into a session, resolving the expiry against `now` when the
    /// server only reported a lifetime.
    pub fn into_session(self, now: DateTime<Utc>) -> AuthSession {
        let expires_at = self
            .expires_at
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(|| now + Duration::seconds(self.expires_in));

        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            expires_at,
            user: self.user.into(),
        }
    }
}

/// `/auth/v1/signup` answers with a session when the project auto-confirms
/// users, and with the bare user when email confirmation is pending.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SignUpResponse {
    Session(TokenResponse),
    PendingConfirmation(GoTrueUser),
}

/// Body of `grant_type=password`
#[derive(Serialize)]
pub struct PasswordGrant<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body of `grant_type=refresh_token`
#[derive(Serialize)]
pub struct RefreshGrant<'a> {
    pub refresh_token: &'a str,
}

/// Body of `/auth/v1/signup`
#[derive(Serialize)]
pub struct SignUpRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    /// Stored as the user's metadata
    pub data: SignUpMetadata<'a>,
}

#[derive(Serialize)]
pub struct SignUpMetadata<'a> {
    pub full_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<&'a str>,
}

impl<'a> From<&'a Registration> for SignUpRequest<'a> {
    fn from(registration: &'a Registration) -> Self {
        Self {
            email: &registration.email,
            password: &registration.password,
            data: SignUpMetadata {
                full_name: &registration.full_name,
                phone: registration.phone.as_deref(),
            },
        }
    }
}

/// Row inserted into `drivers` on registration. Counters and flags take the
/// table defaults.
#[derive(Debug, Serialize)]
pub struct NewDriverRow<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub full_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_plate: Option<&'a str>,
}

impl<'a> NewDriverRow<'a> {
    pub fn new(id: &'a UserId, registration: &'a Registration) -> Self {
        Self {
            id: id.as_str(),
            email: &registration.email,
            full_name: &registration.full_name,
            phone: registration.phone.as_deref(),
            business_id: registration.business_id.as_deref(),
            vehicle_type: registration.vehicle_type.as_deref(),
            vehicle_plate: registration.vehicle_plate.as_deref(),
        }
    }
}

/// Error body. GoTrue and PostgREST disagree on field names, so every known
/// spelling is accepted.
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiErrorBody {
    /// Most descriptive message present in the body.
    pub fn into_message(self) -> Option<String> {
        [self.error_description, self.msg, self.message, self.error]
            .into_iter()
            .flatten()
            .find(|m| !m.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN_JSON: &str = r#"{
        "access_token": "eyJ.access",
        "token_type": "bearer",
        "expires_in": 3600,
        "expires_at": 1767225600,
        "refresh_token": "r-1",
        "user": { "id": "5d1c0a7e", "email": "ada@fleet.test", "aud": "authenticated" }
    }"#;

    #[test]
    fn test_token_response_uses_absolute_expiry() {
        let response: TokenResponse = serde_json::from_str(TOKEN_JSON).unwrap();
        let session = response.into_session(Utc::now());

        assert_eq!(session.expires_at.timestamp(), 1767225600);
        assert_eq!(session.user.id, UserId::from("5d1c0a7e"));
        assert_eq!(session.user.email.as_deref(), Some("ada@fleet.test"));
    }

    #[test]
    fn test_token_response_falls_back_to_lifetime() {
        let response: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "a",
            "expires_in": 120,
            "refresh_token": "r",
            "user": { "id": "u" }
        }))
        .unwrap();
        let now = Utc::now();
        let session = response.into_session(now);

        assert_eq!(session.expires_at, now + Duration::seconds(120));
        assert_eq!(session.token_type, "bearer");
    }

    #[test]
    fn test_signup_response_variants() {
        let session: SignUpResponse = serde_json::from_str(TOKEN_JSON).unwrap();
        assert!(matches!(session, SignUpResponse::Session(_)));

        let pending: SignUpResponse =
            serde_json::from_str(r#"{ "id": "u-2", "email": "new@fleet.test" }"#).unwrap();
        assert!(matches!(pending, SignUpResponse::PendingConfirmation(_)));
    }

    #[test]
    fn test_error_body_prefers_description() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{ "error": "invalid_grant", "error_description": "Invalid login credentials" }"#,
        )
        .unwrap();
        assert_eq!(
            body.into_message().as_deref(),
            Some("Invalid login credentials")
        );

        let body: ApiErrorBody =
            serde_json::from_str(r#"{ "code": "PGRST116", "message": "" }"#).unwrap();
        assert_eq!(body.into_message(), None);
    }

    #[test]
    fn test_new_driver_row_skips_missing_fields() {
        let registration = Registration {
            email: "new@fleet.test".to_string(),
            password: "secret".to_string(),
            full_name: "New Rider".to_string(),
            phone: None,
            business_id: Some("biz-1".to_string()),
            vehicle_type: None,
            vehicle_plate: None,
        };
        let id = UserId::from("u-9");
        let row = serde_json::to_value(NewDriverRow::new(&id, &registration)).unwrap();

        assert_eq!(row["id"], "u-9");
        assert_eq!(row["business_id"], "biz-1");
        assert!(row.get("phone").is_none());
        assert!(row.get("password").is_none());
    }
}
