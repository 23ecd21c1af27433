use actix_web::dev::HttpServiceFactory;
use actix_web::http::header;
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use diesel::insert_into;
use diesel::prelude::*;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::api::{common, settings};
use crate::error::ApiError;
use crate::models::{User, UserSetting};
use crate::schema::{sessions, users};
use crate::{AppState, DbConnection};

pub const TOKEN_LENGTH: usize = 32;

fn validate_display_name(name: &str) -> Result<(), ApiError> {
    if name.len() > common::MAX_DISPLAY_NAME_BYTES {
        return Err(ApiError::bad_request("name is too long"));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.len() > common::MAX_EMAIL_BYTES {
        return Err(ApiError::bad_request("email is too long"));
    }
    lazy_static! {
        static ref EMAIL_REGEX: Regex =
            Regex::new("^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\\.[a-zA-Z0-9-.]+$").unwrap();
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err(ApiError::bad_request("email is invalid"));
    }
    Ok(())
}

pub fn is_token(token: &str) -> bool {
    token.chars().all(|ch| ch.is_ascii_alphanumeric()) && token.len() == TOKEN_LENGTH
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| ApiError::PasswordHash)
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Pulls the session token out of the `Authorization: Bearer …` header.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_owned())
}

/// Resolves a session token to its user, ignoring expired sessions.
pub fn resolve_user(
    connection: &mut DbConnection,
    token: &str,
) -> Result<Option<User>, ApiError> {
    if !is_token(token) {
        return Ok(None);
    }
    let now = common::get_current_timestamp();
    Ok(sessions::table
        .inner_join(users::table)
        .filter(sessions::token.eq(token))
        .filter(sessions::expires_at.gt(now))
        .select(User::as_select())
        .first(connection)
        .optional()?)
}

/// The authentication gate every protected handler goes through.
pub fn require_user(
    connection: &mut DbConnection,
    token: Option<&str>,
) -> Result<User, ApiError> {
    let token = token.ok_or(ApiError::Unauthorized)?;
    resolve_user(connection, token)?.ok_or(ApiError::Unauthorized)
}

fn issue_session(
    connection: &mut DbConnection,
    user_id: i64,
    ttl_ms: i64,
) -> Result<String, ApiError> {
    let token = generate_token();
    let now = common::get_current_timestamp();
    insert_into(sessions::table)
        .values((
            sessions::user_id.eq(user_id),
            sessions::token.eq(&token),
            sessions::created_at.eq(now),
            sessions::expires_at.eq(now + ttl_ms),
        ))
        .execute(connection)?;
    Ok(token)
}

#[derive(Serialize)]
struct UserBody {
    name: String,
    email: String,
}

impl From<User> for UserBody {
    fn from(user: User) -> Self {
        UserBody {
            name: user.display_name,
            email: user.email,
        }
    }
}

#[derive(Serialize)]
struct AuthResponse {
    message: &'static str,
    token: String,
    user: UserBody,
}

#[derive(Deserialize)]
struct RegisterPayload {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

fn register(
    connection: &mut DbConnection,
    name: String,
    email: String,
    password_hash: String,
    ttl_ms: i64,
) -> Result<(String, User), ApiError> {
    connection
        .transaction::<(String, User), ApiError, _>(|connection| {
            if diesel::select(diesel::dsl::exists(
                users::table.filter(users::email.eq(&email)),
            ))
            .get_result(connection)?
            {
                return Err(ApiError::Conflict("Email already registered".to_owned()));
            }
            let user: User = insert_into(users::table)
                .values((
                    users::email.eq(&email),
                    users::password_hash.eq(&password_hash),
                    users::display_name.eq(&name),
                    users::created_at.eq(common::get_current_timestamp()),
                ))
                .returning(User::as_returning())
                .get_result(connection)?;
            settings::get_or_create_setting(connection, user.id)?;
            let token = issue_session(connection, user.id, ttl_ms)?;
            Ok((token, user))
        })
        .map_err(|error| error.unique_violation_as_conflict("Email already registered"))
}

#[post("/register")]
async fn register_handler(
    state: web::Data<AppState>,
    payload: web::Json<RegisterPayload>,
) -> Result<impl Responder, ApiError> {
    let payload = payload.0;
    let name = payload.name.as_deref().unwrap_or("").trim().to_owned();
    let email = payload
        .email
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    let password = payload.password.unwrap_or_default();
    if name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("name, email and password are required"));
    }
    validate_display_name(&name)?;
    validate_email(&email)?;
    let password_hash = hash_password(&password)?;
    let ttl_ms = state.config.session_ttl_ms;
    let mut connection = state.db_pool.get()?;
    let (token, user) =
        web::block(move || register(&mut connection, name, email, password_hash, ttl_ms))
            .await??;
    Ok(HttpResponse::Created().json(AuthResponse {
        message: "Account created",
        token,
        user: user.into(),
    }))
}

#[derive(Deserialize)]
struct LoginPayload {
    email: Option<String>,
    password: Option<String>,
}

fn login(
    connection: &mut DbConnection,
    email: String,
    password: String,
    ttl_ms: i64,
) -> Result<(String, User), ApiError> {
    let user: User = users::table
        .filter(users::email.eq(&email))
        .select(User::as_select())
        .first(connection)
        .optional()?
        .ok_or(ApiError::InvalidCredentials)?;
    if !verify_password(&password, &user.password_hash) {
        return Err(ApiError::InvalidCredentials);
    }
    let token = issue_session(connection, user.id, ttl_ms)?;
    Ok((token, user))
}

#[post("/login")]
async fn login_handler(
    state: web::Data<AppState>,
    payload: web::Json<LoginPayload>,
) -> Result<impl Responder, ApiError> {
    let payload = payload.0;
    let email = payload
        .email
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    let password = payload.password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::InvalidCredentials);
    }
    let ttl_ms = state.config.session_ttl_ms;
    let mut connection = state.db_pool.get()?;
    let (token, user) =
        web::block(move || login(&mut connection, email, password, ttl_ms)).await??;
    Ok(HttpResponse::Ok().json(AuthResponse {
        message: "Logged in",
        token,
        user: user.into(),
    }))
}

#[post("/logout")]
async fn logout_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<impl Responder, ApiError> {
    let token = bearer_token(&req).ok_or(ApiError::Unauthorized)?;
    let mut connection = state.db_pool.get()?;
    web::block(move || -> Result<(), ApiError> {
        let user = require_user(&mut connection, Some(&token))?;
        diesel::delete(
            sessions::table
                .filter(sessions::user_id.eq(user.id))
                .filter(sessions::token.eq(&token)),
        )
        .execute(&mut connection)?;
        Ok(())
    })
    .await??;
    Ok(common::message_response("Logged out"))
}

#[derive(Serialize)]
struct MeResponse {
    user: UserBody,
    target_percentage: i16,
}

#[get("/me")]
async fn me_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<impl Responder, ApiError> {
    let token = bearer_token(&req);
    let mut connection = state.db_pool.get()?;
    let (user, setting) = web::block(move || -> Result<(User, UserSetting), ApiError> {
        let user = require_user(&mut connection, token.as_deref())?;
        let setting = settings::get_or_create_setting(&mut connection, user.id)?;
        Ok((user, setting))
    })
    .await??;
    Ok(HttpResponse::Ok().json(MeResponse {
        user: user.into(),
        target_percentage: setting.target_percentage,
    }))
}

pub fn get_service() -> impl HttpServiceFactory {
    web::scope("/auth")
        .service(register_handler)
        .service(login_handler)
        .service(logout_handler)
        .service(me_handler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_alphanumeric_and_fixed_length() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(is_token(&token));
    }

    #[test]
    fn is_token_rejects_malformed_input() {
        assert!(!is_token(""));
        assert!(!is_token("short"));
        assert!(!is_token(&"a".repeat(TOKEN_LENGTH + 1)));
        let mut with_symbol = "a".repeat(TOKEN_LENGTH - 1);
        with_symbol.push('!');
        assert!(!is_token(&with_symbol));
        assert!(is_token(&"aB3dE5fG".repeat(TOKEN_LENGTH / 8)));
    }

    #[test]
    fn email_validation_accepts_plausible_addresses() {
        assert!(validate_email("student@example.com").is_ok());
        assert!(validate_email("first.last+tag@sub-domain.example.co").is_ok());
        assert!(validate_email("no-at-sign.example.com").is_err());
        assert!(validate_email("spaces in@example.com").is_err());
        let long_local = "a".repeat(common::MAX_EMAIL_BYTES);
        assert!(validate_email(&format!("{}@example.com", long_local)).is_err());
    }

    #[test]
    fn password_hashes_verify_and_reject() {
        let hash = hash_password("hunter2!").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter2!", &hash));
        assert!(!verify_password("hunter3!", &hash));
        assert!(!verify_password("hunter2!", "not-a-phc-string"));
    }
}
