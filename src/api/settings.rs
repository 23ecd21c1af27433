use actix_web::dev::HttpServiceFactory;
use actix_web::{get, put, web, HttpRequest, HttpResponse, Responder};
use diesel::insert_into;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::api::auth;
use crate::error::ApiError;
use crate::models::UserSetting;
use crate::schema::user_settings;
use crate::{AppState, DbConnection};

pub const DEFAULT_TARGET_PERCENTAGE: i16 = 80;

fn target_in_range(target: i16) -> bool {
    (1..=100).contains(&target)
}

/// Settings rows materialize lazily: the first access creates the row with
/// the default target.
pub fn get_or_create_setting(
    connection: &mut DbConnection,
    user_id: i64,
) -> Result<UserSetting, ApiError> {
    let existing: Option<UserSetting> = user_settings::table
        .filter(user_settings::user_id.eq(user_id))
        .select(UserSetting::as_select())
        .first(connection)
        .optional()?;
    if let Some(setting) = existing {
        return Ok(setting);
    }
    Ok(insert_into(user_settings::table)
        .values((
            user_settings::user_id.eq(user_id),
            user_settings::target_percentage.eq(DEFAULT_TARGET_PERCENTAGE),
        ))
        .returning(UserSetting::as_returning())
        .get_result(connection)?)
}

#[derive(Serialize)]
struct SettingsResponse {
    target_percentage: i16,
}

#[get("")]
async fn get_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<impl Responder, ApiError> {
    let token = auth::bearer_token(&req);
    let mut connection = state.db_pool.get()?;
    let setting = web::block(move || -> Result<UserSetting, ApiError> {
        let user = auth::require_user(&mut connection, token.as_deref())?;
        get_or_create_setting(&mut connection, user.id)
    })
    .await??;
    Ok(HttpResponse::Ok().json(SettingsResponse {
        target_percentage: setting.target_percentage,
    }))
}

#[derive(Deserialize)]
struct UpdateSettingsPayload {
    target_percentage: Option<i16>,
}

#[put("")]
async fn update_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<UpdateSettingsPayload>,
) -> Result<impl Responder, ApiError> {
    let target = match payload.0.target_percentage {
        Some(target) if target_in_range(target) => target,
        _ => return Err(ApiError::bad_request("target_percentage must be 1..100")),
    };
    let token = auth::bearer_token(&req);
    let mut connection = state.db_pool.get()?;
    let setting = web::block(move || -> Result<UserSetting, ApiError> {
        let user = auth::require_user(&mut connection, token.as_deref())?;
        let setting = get_or_create_setting(&mut connection, user.id)?;
        Ok(diesel::update(
            user_settings::table.filter(user_settings::id.eq(setting.id)),
        )
        .set(user_settings::target_percentage.eq(target))
        .returning(UserSetting::as_returning())
        .get_result(&mut connection)?)
    })
    .await??;
    Ok(HttpResponse::Ok().json(SettingsResponse {
        target_percentage: setting.target_percentage,
    }))
}

pub fn get_service() -> impl HttpServiceFactory {
    web::scope("/settings")
        .service(get_handler)
        .service(update_handler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_bounds_are_inclusive() {
        assert!(target_in_range(1));
        assert!(target_in_range(80));
        assert!(target_in_range(100));
        assert!(!target_in_range(0));
        assert!(!target_in_range(101));
        assert!(!target_in_range(-5));
    }
}
