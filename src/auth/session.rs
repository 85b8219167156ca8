//! Login, registration and session upkeep against `/api/auth/*`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::store::{TokenPair, TokenStore};
use crate::error::{ClientError, ClientResult, ValidationErrors};
use crate::http::HttpClient;
use crate::lazy::LazyLoad;
use crate::validation::{
    validate_email, validate_password, validate_password_match, validate_required,
};

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REGISTER_PATH: &str = "/api/auth/register";
pub const REFRESH_PATH: &str = "/api/auth/refresh";
pub const LOGOUT_PATH: &str = "/api/auth/logout";
pub const ME_PATH: &str = "/api/auth/me";

/// The signed-in clinician.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(deserialize_with = "crate::models::deserialize_id")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, alias = "doctorId", deserialize_with = "crate::models::deserialize_opt_id")]
    pub doctor_id: Option<String>,
}

#[derive(Clone, Default, Serialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> ClientResult<()> {
        let mut errors = ValidationErrors::new();
        errors.check("email", validate_email(&self.email));
        errors.check("password", validate_required(&self.password, "Password"));
        errors.into_result()
    }
}

#[derive(Clone, Default, Serialize)]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip)]
    pub confirm_password: String,
}

impl RegistrationForm {
    pub fn validate(&self) -> ClientResult<()> {
        let mut errors = ValidationErrors::new();
        errors.check("name", validate_required(&self.name, "Name"));
        errors.check("email", validate_email(&self.email));
        errors.check("password", validate_password(&self.password));
        errors.check(
            "confirm_password",
            validate_password_match(&self.password, &self.confirm_password),
        );
        errors.into_result()
    }
}

#[derive(Deserialize)]
struct SessionResponse {
    #[serde(flatten)]
    tokens: Option<TokenPair>,
    #[serde(default)]
    user: Option<UserProfile>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(alias = "access_token", alias = "accessToken")]
    access: String,
    #[serde(default, alias = "refresh_token", alias = "refreshToken")]
    refresh: Option<String>,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct AccessClaims {
    #[serde(default)]
    exp: Option<i64>,
}

/// Session operations. Tokens live in the [`TokenStore`] shared with the
/// [`HttpClient`], so every request made after `login` is authenticated.
pub struct AuthClient {
    http: HttpClient,
    tokens: Arc<dyn TokenStore>,
    profile: LazyLoad<UserProfile>,
}

impl AuthClient {
    pub fn new(http: HttpClient, profile_timeout: Duration) -> Self {
        let tokens = Arc::clone(http.tokens());
        Self {
            http,
            tokens,
            profile: LazyLoad::new(profile_timeout),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_authenticated()
    }

    #[instrument(skip_all, fields(email = %form.email))]
    pub async fn login(&self, form: &LoginForm) -> ClientResult<Option<UserProfile>> {
        form.validate()?;
        let response: SessionResponse = self.http.post(LOGIN_PATH, &[], form).await?;
        let tokens = response.tokens.ok_or_else(|| missing_tokens("login"))?;
        self.start_session(tokens).await?;
        info!("Logged in");
        Ok(response.user)
    }

    /// Create an account. When the server also opens a session, it is stored.
    #[instrument(skip_all, fields(email = %form.email))]
    pub async fn register(&self, form: &RegistrationForm) -> ClientResult<Option<UserProfile>> {
        form.validate()?;
        let response: Value = self.http.post(REGISTER_PATH, &[], form).await?;
        let response: SessionResponse = serde_json::from_value(response)?;
        if let Some(tokens) = response.tokens {
            self.start_session(tokens).await?;
            info!("Registered and logged in");
        } else {
            info!("Registered");
        }
        Ok(response.user)
    }

    /// Exchange the refresh token for a new access token. The refresh token
    /// is rotated when the server sends a new one.
    #[instrument(skip_all)]
    pub async fn refresh(&self) -> ClientResult<()> {
        let current = self.tokens.get().ok_or(ClientError::NotAuthenticated)?;
        let request = RefreshRequest {
            refresh: &current.refresh,
        };

        let response: RefreshResponse = match self.http.post(REFRESH_PATH, &[], &request).await {
            Ok(response) => response,
            Err(err) if err.is_unauthorized() => {
                warn!("Refresh token rejected; clearing session");
                self.end_session().await?;
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let refresh = response.refresh.unwrap_or_else(|| current.refresh.clone());
        self.tokens.set(TokenPair::new(response.access, refresh))?;
        debug!("Access token refreshed");
        Ok(())
    }

    /// Tell the server the session is over, then forget it locally no matter
    /// what the server said.
    #[instrument(skip_all)]
    pub async fn logout(&self) -> ClientResult<()> {
        if let Some(tokens) = self.tokens.get() {
            let request = RefreshRequest {
                refresh: &tokens.refresh,
            };
            if let Err(err) = self
                .http
                .post::<_, Value>(LOGOUT_PATH, &[], &request)
                .await
            {
                warn!(error = %err, "Server logout failed; clearing local session anyway");
            }
        }
        self.end_session().await?;
        info!("Logged out");
        Ok(())
    }

    /// Profile of the signed-in user, fetched once per session.
    pub async fn current_user(&self) -> ClientResult<Arc<UserProfile>> {
        if !self.is_authenticated() {
            return Err(ClientError::NotAuthenticated);
        }
        self.profile
            .get_or_load(|| self.http.get::<UserProfile>(ME_PATH, &[]))
            .await
    }

    /// Refresh ahead of time when the access token expires within `lead`.
    /// Returns whether a refresh happened. Opaque (non-JWT) tokens are left
    /// alone.
    pub async fn ensure_fresh(&self, lead: Duration) -> ClientResult<bool> {
        let tokens = self.tokens.get().ok_or(ClientError::NotAuthenticated)?;
        let Some(remaining) = seconds_until_expiry(&tokens.access) else {
            return Ok(false);
        };
        if remaining > lead.as_secs() as i64 {
            return Ok(false);
        }
        debug!(remaining_secs = remaining, "Access token close to expiry");
        self.refresh().await?;
        Ok(true)
    }

    async fn start_session(&self, tokens: TokenPair) -> ClientResult<()> {
        self.tokens.set(tokens)?;
        self.profile.invalidate().await;
        Ok(())
    }

    async fn end_session(&self) -> ClientResult<()> {
        self.profile.invalidate().await;
        self.tokens.clear()?;
        Ok(())
    }
}

fn missing_tokens(operation: &str) -> ClientError {
    ClientError::Decode(serde::de::Error::custom(format!(
        "{operation} response did not include an access/refresh token pair"
    )))
}

/// Seconds until the token's `exp`, negative once expired. `None` when the
/// token is not a JWT or carries no `exp`.
pub fn seconds_until_expiry(token: &str) -> Option<i64> {
    let header = decode_header(token).ok()?;
    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let claims = decode::<AccessClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()?
        .claims;
    claims.exp.map(|exp| exp - Utc::now().timestamp())
}
