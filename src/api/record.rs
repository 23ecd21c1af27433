use actix_web::dev::HttpServiceFactory;
use actix_web::{delete, get, post, web, HttpRequest, HttpResponse, Responder};
use chrono::{NaiveDate, NaiveTime};
use diesel::insert_into;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::api::{auth, common, subject};
use crate::error::ApiError;
use crate::models::{AttendanceRecord, AttendanceStatus, User};
use crate::schema::attendance_records;
use crate::{AppState, DbConnection};

#[derive(Serialize)]
struct RecordBody {
    id: i64,
    subject_id: i64,
    date: NaiveDate,
    lecture_time: Option<String>,
    status: AttendanceStatus,
}

impl From<AttendanceRecord> for RecordBody {
    fn from(record: AttendanceRecord) -> Self {
        RecordBody {
            id: record.id,
            subject_id: record.subject_id,
            date: record.date,
            lecture_time: record.lecture_time.map(common::format_time),
            status: record.status,
        }
    }
}

fn list_records(
    connection: &mut DbConnection,
    user: &User,
    date: Option<NaiveDate>,
) -> Result<Vec<AttendanceRecord>, ApiError> {
    let rows = match date {
        Some(date) => attendance_records::table
            .filter(attendance_records::user_id.eq(user.id))
            .filter(attendance_records::date.eq(date))
            .order(attendance_records::date.desc())
            .select(AttendanceRecord::as_select())
            .load(connection)?,
        None => attendance_records::table
            .filter(attendance_records::user_id.eq(user.id))
            .order(attendance_records::date.desc())
            .select(AttendanceRecord::as_select())
            .load(connection)?,
    };
    Ok(rows)
}

#[derive(Deserialize)]
struct ListQuery {
    date: Option<String>,
}

#[derive(Serialize)]
struct RecordListResponse {
    records: Vec<RecordBody>,
}

#[get("")]
async fn list_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ListQuery>,
) -> Result<impl Responder, ApiError> {
    let date_raw = query.0.date.as_deref().unwrap_or("").trim().to_owned();
    let date = if date_raw.is_empty() {
        None
    } else {
        Some(
            common::parse_date(&date_raw)
                .ok_or_else(|| ApiError::bad_request("date must be YYYY-MM-DD"))?,
        )
    };
    let token = auth::bearer_token(&req);
    let mut connection = state.db_pool.get()?;
    let rows = web::block(move || -> Result<Vec<AttendanceRecord>, ApiError> {
        let user = auth::require_user(&mut connection, token.as_deref())?;
        list_records(&mut connection, &user, date)
    })
    .await??;
    Ok(HttpResponse::Ok().json(RecordListResponse {
        records: rows.into_iter().map(RecordBody::from).collect(),
    }))
}

#[derive(Deserialize)]
struct UpsertRecordPayload {
    subject_id: Option<i64>,
    date: Option<String>,
    status: Option<String>,
    lecture_time: Option<String>,
}

#[derive(Serialize)]
struct RecordUpsertResponse {
    record: RecordBody,
    created: bool,
}

/// Upsert on the (user, subject, date, lecture_time) slot: marking the same
/// slot again overwrites the status, last writer wins.
fn upsert_record(
    connection: &mut DbConnection,
    user: &User,
    subject_id: i64,
    date: NaiveDate,
    lecture_time: Option<NaiveTime>,
    status: AttendanceStatus,
) -> Result<(AttendanceRecord, bool), ApiError> {
    let subject = subject::get_owned_subject(connection, user, subject_id)?
        .ok_or(ApiError::NotFound("Subject"))?;
    connection.transaction::<(AttendanceRecord, bool), ApiError, _>(|connection| {
        let base = attendance_records::table
            .filter(attendance_records::user_id.eq(user.id))
            .filter(attendance_records::subject_id.eq(subject.id))
            .filter(attendance_records::date.eq(date));
        let existing: Option<AttendanceRecord> = match lecture_time {
            Some(time) => base
                .filter(attendance_records::lecture_time.eq(time))
                .select(AttendanceRecord::as_select())
                .first(connection)
                .optional()?,
            None => base
                .filter(attendance_records::lecture_time.is_null())
                .select(AttendanceRecord::as_select())
                .first(connection)
                .optional()?,
        };
        if let Some(existing) = existing {
            let record = diesel::update(
                attendance_records::table.filter(attendance_records::id.eq(existing.id)),
            )
            .set(attendance_records::status.eq(status))
            .returning(AttendanceRecord::as_returning())
            .get_result(connection)?;
            return Ok((record, false));
        }
        let record: AttendanceRecord = insert_into(attendance_records::table)
            .values((
                attendance_records::user_id.eq(user.id),
                attendance_records::subject_id.eq(subject.id),
                attendance_records::date.eq(date),
                attendance_records::lecture_time.eq(lecture_time),
                attendance_records::status.eq(status),
            ))
            .returning(AttendanceRecord::as_returning())
            .get_result(connection)?;
        Ok((record, true))
    })
}

#[post("")]
async fn upsert_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<UpsertRecordPayload>,
) -> Result<impl Responder, ApiError> {
    let payload = payload.0;
    let date_raw = payload.date.as_deref().unwrap_or("").trim().to_owned();
    let status_raw = payload.status.as_deref().unwrap_or("").trim().to_lowercase();
    let (subject_id, status) = match (payload.subject_id, AttendanceStatus::parse(&status_raw)) {
        (Some(id), Some(status)) if !date_raw.is_empty() => (id, status),
        _ => {
            return Err(ApiError::bad_request(
                "subject_id, date and valid status are required",
            ))
        }
    };
    let date = common::parse_date(&date_raw)
        .ok_or_else(|| ApiError::bad_request("date must be YYYY-MM-DD"))?;
    let lecture_time = match payload.lecture_time.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            common::parse_time(raw)
                .ok_or_else(|| ApiError::bad_request("lecture_time must be HH:MM"))?,
        ),
    };
    let token = auth::bearer_token(&req);
    let mut connection = state.db_pool.get()?;
    let (record, created) = web::block(move || -> Result<(AttendanceRecord, bool), ApiError> {
        let user = auth::require_user(&mut connection, token.as_deref())?;
        upsert_record(
            &mut connection,
            &user,
            subject_id,
            date,
            lecture_time,
            status,
        )
    })
    .await??;
    let body = RecordUpsertResponse {
        record: record.into(),
        created,
    };
    let response = if created {
        HttpResponse::Created().json(&body)
    } else {
        HttpResponse::Ok().json(&body)
    };
    Ok(response)
}

#[delete("/{record_id}")]
async fn delete_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let record_id = path.into_inner();
    let token = auth::bearer_token(&req);
    let mut connection = state.db_pool.get()?;
    web::block(move || -> Result<(), ApiError> {
        let user = auth::require_user(&mut connection, token.as_deref())?;
        let affected = diesel::delete(
            attendance_records::table
                .filter(attendance_records::id.eq(record_id))
                .filter(attendance_records::user_id.eq(user.id)),
        )
        .execute(&mut connection)?;
        if affected == 0 {
            return Err(ApiError::NotFound("Record"));
        }
        Ok(())
    })
    .await??;
    Ok(common::message_response("Record deleted"))
}

pub fn get_service() -> impl HttpServiceFactory {
    web::scope("/records")
        .service(list_handler)
        .service(upsert_handler)
        .service(delete_handler)
}
