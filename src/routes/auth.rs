use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::Redirect,
    Json,
};
use axum_extra::{headers::Cookie, typed_header::TypedHeader};
use chrono::{Duration as ChronoDuration, Utc};
use diesel::{prelude::*, PgConnection};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        oauth::{self, ProviderIdentity},
        password, AuthenticatedUser,
    },
    error::{AppError, AppResult},
    models::{NewRefreshToken, NewUser, RefreshToken, User},
    schema::{refresh_tokens, users::dsl},
    state::AppState,
    users,
};

use crate::schema::refresh_tokens::dsl as refresh_dsl;

const REFRESH_COOKIE_NAME: &str = "refresh_token";

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(HeaderMap, Json<LoginResponse>)> {
    let mut conn = state.db()?;

    let user = users::find_by_username(&mut conn, &payload.username)?
        .ok_or_else(AppError::unauthorized)?;

    // OAuth-only accounts have no local password.
    let hash = user.password_hash.as_deref().ok_or_else(AppError::unauthorized)?;
    let valid =
        password::verify_password(&payload.password, hash).map_err(|_| AppError::unauthorized())?;
    if !valid {
        return Err(AppError::unauthorized());
    }

    touch_last_sign_in(&mut conn, user.id)?;
    info!(user_id = %user.id, username = %user.username, "user logged in");

    let (headers, response) = issue_session(&state, &mut conn, &user)?;
    Ok((headers, Json(response)))
}

pub async fn refresh(
    State(state): State<AppState>,
    jar: Option<TypedHeader<Cookie>>,
) -> AppResult<(HeaderMap, Json<LoginResponse>)> {
    let cookies = jar.ok_or_else(AppError::unauthorized)?;
    let refresh_value = cookies
        .get(REFRESH_COOKIE_NAME)
        .ok_or_else(AppError::unauthorized)?;

    let hashed = hash_refresh_token(refresh_value);
    let mut conn = state.db()?;
    let now_naive = Utc::now().naive_utc();

    let token = match refresh_dsl::refresh_tokens
        .filter(refresh_dsl::token_hash.eq(&hashed))
        .filter(refresh_dsl::revoked_at.is_null())
        .filter(refresh_dsl::expires_at.gt(now_naive))
        .first::<RefreshToken>(&mut conn)
    {
        Ok(token) => token,
        Err(diesel::result::Error::NotFound) => return Err(AppError::unauthorized()),
        Err(err) => return Err(AppError::from(err)),
    };

    diesel::update(refresh_dsl::refresh_tokens.filter(refresh_dsl::id.eq(token.id)))
        .set((
            refresh_dsl::revoked_at.eq(now_naive),
            refresh_dsl::updated_at.eq(now_naive),
        ))
        .execute(&mut conn)?;

    let user: User = dsl::users.find(token.user_id).first(&mut conn)?;

    let (headers, response) = issue_session(&state, &mut conn, &user)?;
    Ok((headers, Json(response)))
}

pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    jar: Option<TypedHeader<Cookie>>,
) -> AppResult<(HeaderMap, StatusCode)> {
    let mut conn = state.db()?;
    let now = Utc::now().naive_utc();
    let mut rows_affected = 0;

    if let Some(cookies) = jar {
        if let Some(value) = cookies.get(REFRESH_COOKIE_NAME) {
            let hashed = hash_refresh_token(value);
            rows_affected = diesel::update(
                refresh_dsl::refresh_tokens
                    .filter(refresh_dsl::token_hash.eq(hashed))
                    .filter(refresh_dsl::user_id.eq(user.user_id))
                    .filter(refresh_dsl::revoked_at.is_null()),
            )
            .set((
                refresh_dsl::revoked_at.eq(now),
                refresh_dsl::updated_at.eq(now),
            ))
            .execute(&mut conn)
            .unwrap_or(0);
        }
    }

    if rows_affected == 0 {
        let _ = diesel::update(
            refresh_dsl::refresh_tokens
                .filter(refresh_dsl::user_id.eq(user.user_id))
                .filter(refresh_dsl::revoked_at.is_null()),
        )
        .set((
            refresh_dsl::revoked_at.eq(now),
            refresh_dsl::updated_at.eq(now),
        ))
        .execute(&mut conn);
    }

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, build_clear_refresh_cookie(&state)?);
    Ok((headers, StatusCode::NO_CONTENT))
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub username: String,
    pub role: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<MeResponse>> {
    let mut conn = state.db()?;
    let record: User = dsl::users
        .find(user.user_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::unauthorized)?;

    Ok(Json(MeResponse {
        user_id: record.id,
        username: record.username,
        role: record.role,
        email: record.email,
        display_name: record.display_name,
    }))
}

#[derive(Serialize)]
pub struct AuthorizeResponse {
    pub url: String,
}

pub async fn oauth_authorize(State(state): State<AppState>) -> AppResult<Json<AuthorizeResponse>> {
    let client = state.oauth.as_ref().ok_or_else(AppError::not_found)?;

    let mut nonce = [0u8; 16];
    OsRng.fill_bytes(&mut nonce);
    let signed_state = state.jwt.generate_oauth_state(&hex::encode(nonce))?;

    Ok(Json(AuthorizeResponse {
        url: oauth::authorize_url(client, signed_state),
    }))
}

#[derive(Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> AppResult<(HeaderMap, Redirect)> {
    let client = state.oauth.as_ref().ok_or_else(AppError::not_found)?;
    let oauth_config = state.config.oauth.as_ref().ok_or_else(AppError::not_found)?;

    if let Some(error) = query.error {
        warn!(error = %error, "identity provider rejected authorization");
        return Err(AppError::unauthorized());
    }

    let signed_state = query
        .state
        .ok_or_else(|| AppError::bad_request("missing state parameter"))?;
    state
        .jwt
        .verify_oauth_state(&signed_state)
        .map_err(|_| AppError::bad_request("invalid or expired state parameter"))?;

    let code = query
        .code
        .ok_or_else(|| AppError::bad_request("missing code parameter"))?;

    let identity = oauth::exchange_code(client, &oauth_config.userinfo_url, code)
        .await
        .map_err(|err| {
            warn!(error = %err, "OAuth code exchange failed");
            AppError::unauthorized()
        })?;

    let mut conn = state.db()?;
    let user = upsert_oauth_user(&mut conn, &identity)?;
    info!(user_id = %user.id, username = %user.username, "user signed in with OAuth");

    let (headers, _) = issue_session(&state, &mut conn, &user)?;
    Ok((headers, Redirect::to(&oauth_config.success_redirect)))
}

fn upsert_oauth_user(conn: &mut PgConnection, identity: &ProviderIdentity) -> AppResult<User> {
    let now = Utc::now().naive_utc();

    let existing: Option<User> = dsl::users
        .filter(dsl::open_id.eq(&identity.subject))
        .first(conn)
        .optional()?;

    if let Some(user) = existing {
        let updated = diesel::update(dsl::users.find(user.id))
            .set((
                dsl::display_name.eq(identity.name.clone().or(user.display_name)),
                dsl::last_signed_in_at.eq(now),
                dsl::updated_at.eq(now),
            ))
            .get_result::<User>(conn)?;
        return Ok(updated);
    }

    let username = available_username(conn, &base_username(identity))?;
    // An email already claimed by another account is not copied over.
    let email = match identity.email.as_deref() {
        Some(email) if users::find_by_email(conn, email)?.is_none() => Some(email.to_string()),
        _ => None,
    };
    let new_user = NewUser {
        id: Uuid::new_v4(),
        username,
        email,
        display_name: identity.name.clone(),
        password_hash: None,
        open_id: Some(identity.subject.clone()),
        role: "user".to_string(),
    };

    diesel::insert_into(dsl::users)
        .values(&new_user)
        .execute(conn)?;
    touch_last_sign_in(conn, new_user.id)?;

    Ok(dsl::users.find(new_user.id).first(conn)?)
}

/// Username seed for a first-time OAuth sign-in: the email's local part, then
/// the display name, then the provider subject.
fn base_username(identity: &ProviderIdentity) -> String {
    let candidate = identity
        .email
        .as_deref()
        .and_then(|email| email.split('@').next())
        .or(identity.name.as_deref())
        .unwrap_or(&identity.subject);

    let cleaned: String = candidate
        .trim()
        .to_lowercase()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '-'
            }
        })
        .take(64)
        .collect();
    let cleaned = cleaned.trim_matches('-').to_string();
    if cleaned.is_empty() {
        "traveler".to_string()
    } else {
        cleaned
    }
}

fn available_username(conn: &mut PgConnection, base: &str) -> AppResult<String> {
    let mut candidate = base.to_string();
    for _ in 0..8 {
        let taken: Option<Uuid> = dsl::users
            .filter(dsl::username.eq(&candidate))
            .select(dsl::id)
            .first(conn)
            .optional()?;
        if taken.is_none() {
            return Ok(candidate);
        }
        let mut suffix = [0u8; 3];
        OsRng.fill_bytes(&mut suffix);
        candidate = format!("{base}-{}", hex::encode(suffix));
    }
    Err(AppError::internal("could not allocate a unique username"))
}

fn touch_last_sign_in(conn: &mut PgConnection, user_id: Uuid) -> AppResult<()> {
    let now = Utc::now().naive_utc();
    diesel::update(dsl::users.find(user_id))
        .set(dsl::last_signed_in_at.eq(now))
        .execute(conn)?;
    Ok(())
}

/// Mints an access token and a fresh refresh token for `user`. The refresh
/// token is persisted hashed and handed back as a cookie header.
pub(crate) fn issue_session(
    state: &AppState,
    conn: &mut PgConnection,
    user: &User,
) -> AppResult<(HeaderMap, LoginResponse)> {
    let access_token = state
        .jwt
        .generate_token(user.id, &user.username, &user.role)?;

    let now = Utc::now();
    let refresh_value = generate_refresh_token();
    let refresh_expires_at = now + ChronoDuration::days(state.config.refresh_token_expiry_days);

    let new_refresh = NewRefreshToken {
        id: Uuid::new_v4(),
        user_id: user.id,
        token_hash: hash_refresh_token(&refresh_value),
        issued_at: now.naive_utc(),
        expires_at: refresh_expires_at.naive_utc(),
    };

    diesel::insert_into(refresh_tokens::table)
        .values(&new_refresh)
        .execute(conn)?;

    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        build_refresh_cookie(state, &refresh_value, refresh_expires_at)?,
    );

    Ok((
        headers,
        LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: state.config.jwt_expiry_minutes * 60,
        },
    ))
}

fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_refresh_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn build_refresh_cookie(
    state: &AppState,
    token: &str,
    expires_at: chrono::DateTime<Utc>,
) -> AppResult<HeaderValue> {
    let max_age = ChronoDuration::days(state.config.refresh_token_expiry_days).num_seconds();

    let mut parts = vec![format!("{}={}", REFRESH_COOKIE_NAME, token)];
    parts.push("Path=/".into());
    parts.push("HttpOnly".into());
    parts.push("SameSite=Lax".into());
    parts.push(format!("Max-Age={}", max_age));
    parts.push(format!("Expires={}", expires_at.to_rfc2822()));
    cookie_attributes(state, &mut parts);

    HeaderValue::from_str(&parts.join("; ")).map_err(AppError::internal)
}

fn build_clear_refresh_cookie(state: &AppState) -> AppResult<HeaderValue> {
    let mut parts = vec![format!("{}=", REFRESH_COOKIE_NAME)];
    parts.push("Path=/".into());
    parts.push("HttpOnly".into());
    parts.push("SameSite=Lax".into());
    parts.push("Max-Age=0".into());
    parts.push("Expires=Thu, 01 Jan 1970 00:00:00 GMT".into());
    cookie_attributes(state, &mut parts);

    HeaderValue::from_str(&parts.join("; ")).map_err(AppError::internal)
}

fn cookie_attributes(state: &AppState, parts: &mut Vec<String>) {
    if state.config.refresh_cookie_secure {
        parts.push("Secure".into());
    }
    if let Some(domain) = &state.config.refresh_cookie_domain {
        parts.push(format!("Domain={}", domain));
    }
}
