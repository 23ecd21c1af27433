use actix_web::dev::HttpServiceFactory;
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use diesel::prelude::*;

use crate::api::auth;
use crate::error::ApiError;
use crate::models::{AttendanceStatus, User};
use crate::schema::{attendance_records, subjects};
use crate::summary::{self, RecordSnapshot};
use crate::{AppState, DbConnection};

/// Loads the snapshot the aggregator runs over: every record of the user,
/// tagged with its subject's name.
fn load_snapshots(
    connection: &mut DbConnection,
    user: &User,
) -> Result<Vec<RecordSnapshot>, ApiError> {
    let rows: Vec<(i64, String, AttendanceStatus)> = attendance_records::table
        .inner_join(subjects::table)
        .filter(attendance_records::user_id.eq(user.id))
        .select((
            attendance_records::subject_id,
            subjects::name,
            attendance_records::status,
        ))
        .load(connection)?;
    Ok(rows
        .into_iter()
        .map(|(subject_id, subject_name, status)| RecordSnapshot {
            subject_id,
            subject_name,
            status,
        })
        .collect())
}

#[get("/summary")]
async fn summary_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<impl Responder, ApiError> {
    let token = auth::bearer_token(&req);
    let mut connection = state.db_pool.get()?;
    let snapshots = web::block(move || -> Result<Vec<RecordSnapshot>, ApiError> {
        let user = auth::require_user(&mut connection, token.as_deref())?;
        load_snapshots(&mut connection, &user)
    })
    .await??;
    Ok(HttpResponse::Ok().json(summary::compute_summary(&snapshots)))
}

pub fn get_service() -> impl HttpServiceFactory {
    web::scope("/dashboard").service(summary_handler)
}
