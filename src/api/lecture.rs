use actix_web::dev::HttpServiceFactory;
use actix_web::{delete, get, post, web, HttpRequest, HttpResponse, Responder};
use chrono::NaiveTime;
use diesel::insert_into;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::api::{auth, common, subject};
use crate::error::ApiError;
use crate::models::{DayOfWeek, Lecture, User};
use crate::schema::lectures;
use crate::{AppState, DbConnection};

#[derive(Serialize)]
struct LectureBody {
    id: i64,
    subject_id: i64,
    day: DayOfWeek,
    time: String,
}

impl From<Lecture> for LectureBody {
    fn from(lecture: Lecture) -> Self {
        LectureBody {
            id: lecture.id,
            subject_id: lecture.subject_id,
            day: lecture.day,
            time: common::format_time(lecture.time),
        }
    }
}

fn list_lectures(
    connection: &mut DbConnection,
    user: &User,
    day: Option<DayOfWeek>,
) -> Result<Vec<Lecture>, ApiError> {
    let rows = match day {
        Some(day) => lectures::table
            .filter(lectures::user_id.eq(user.id))
            .filter(lectures::day.eq(day))
            .order((lectures::day.asc(), lectures::time.asc()))
            .select(Lecture::as_select())
            .load(connection)?,
        None => lectures::table
            .filter(lectures::user_id.eq(user.id))
            .order((lectures::day.asc(), lectures::time.asc()))
            .select(Lecture::as_select())
            .load(connection)?,
    };
    Ok(rows)
}

#[derive(Deserialize)]
struct ListQuery {
    day: Option<String>,
}

#[derive(Serialize)]
struct LectureListResponse {
    lectures: Vec<LectureBody>,
}

#[get("")]
async fn list_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ListQuery>,
) -> Result<impl Responder, ApiError> {
    let day_filter = query.0.day.as_deref().unwrap_or("").trim().to_lowercase();
    // An unrecognized day name matches nothing.
    let day = if day_filter.is_empty() {
        None
    } else {
        match DayOfWeek::parse(&day_filter) {
            Some(day) => Some(day),
            None => {
                return Ok(HttpResponse::Ok().json(LectureListResponse { lectures: vec![] }))
            }
        }
    };
    let token = auth::bearer_token(&req);
    let mut connection = state.db_pool.get()?;
    let rows = web::block(move || -> Result<Vec<Lecture>, ApiError> {
        let user = auth::require_user(&mut connection, token.as_deref())?;
        list_lectures(&mut connection, &user, day)
    })
    .await??;
    Ok(HttpResponse::Ok().json(LectureListResponse {
        lectures: rows.into_iter().map(LectureBody::from).collect(),
    }))
}

#[derive(Deserialize)]
struct CreateLecturePayload {
    subject_id: Option<i64>,
    day: Option<String>,
    time: Option<String>,
}

#[derive(Serialize)]
struct LectureCreatedResponse {
    lecture: LectureBody,
    created: bool,
}

/// Get-or-create on the (user, subject, day, time) slot.
fn create_lecture(
    connection: &mut DbConnection,
    user: &User,
    subject_id: i64,
    day: DayOfWeek,
    time: NaiveTime,
) -> Result<(Lecture, bool), ApiError> {
    let subject = subject::get_owned_subject(connection, user, subject_id)?
        .ok_or(ApiError::NotFound("Subject"))?;
    connection.transaction::<(Lecture, bool), ApiError, _>(|connection| {
        let existing: Option<Lecture> = lectures::table
            .filter(lectures::user_id.eq(user.id))
            .filter(lectures::subject_id.eq(subject.id))
            .filter(lectures::day.eq(day))
            .filter(lectures::time.eq(time))
            .select(Lecture::as_select())
            .first(connection)
            .optional()?;
        if let Some(lecture) = existing {
            return Ok((lecture, false));
        }
        let lecture: Lecture = insert_into(lectures::table)
            .values((
                lectures::user_id.eq(user.id),
                lectures::subject_id.eq(subject.id),
                lectures::day.eq(day),
                lectures::time.eq(time),
            ))
            .returning(Lecture::as_returning())
            .get_result(connection)?;
        Ok((lecture, true))
    })
}

#[post("")]
async fn create_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<CreateLecturePayload>,
) -> Result<impl Responder, ApiError> {
    let payload = payload.0;
    let day_raw = payload.day.as_deref().unwrap_or("").trim().to_lowercase();
    let time_raw = payload.time.as_deref().unwrap_or("").trim().to_owned();
    let subject_id = match payload.subject_id {
        Some(id) if !day_raw.is_empty() && !time_raw.is_empty() => id,
        _ => return Err(ApiError::bad_request("subject_id, day, time are required")),
    };
    let day = DayOfWeek::parse(&day_raw)
        .ok_or_else(|| ApiError::bad_request("day must be a weekday name"))?;
    let time = common::parse_time(&time_raw)
        .ok_or_else(|| ApiError::bad_request("time must be HH:MM"))?;
    let token = auth::bearer_token(&req);
    let mut connection = state.db_pool.get()?;
    let (lecture, created) = web::block(move || -> Result<(Lecture, bool), ApiError> {
        let user = auth::require_user(&mut connection, token.as_deref())?;
        create_lecture(&mut connection, &user, subject_id, day, time)
    })
    .await??;
    let body = LectureCreatedResponse {
        lecture: lecture.into(),
        created,
    };
    let response = if created {
        HttpResponse::Created().json(&body)
    } else {
        HttpResponse::Ok().json(&body)
    };
    Ok(response)
}

#[delete("/{lecture_id}")]
async fn delete_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let lecture_id = path.into_inner();
    let token = auth::bearer_token(&req);
    let mut connection = state.db_pool.get()?;
    web::block(move || -> Result<(), ApiError> {
        let user = auth::require_user(&mut connection, token.as_deref())?;
        let affected = diesel::delete(
            lectures::table
                .filter(lectures::id.eq(lecture_id))
                .filter(lectures::user_id.eq(user.id)),
        )
        .execute(&mut connection)?;
        if affected == 0 {
            return Err(ApiError::NotFound("Lecture"));
        }
        Ok(())
    })
    .await??;
    Ok(common::message_response("Lecture deleted"))
}

pub fn get_service() -> impl HttpServiceFactory {
    web::scope("/lectures")
        .service(list_handler)
        .service(create_handler)
        .service(delete_handler)
}
