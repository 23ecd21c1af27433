use actix_web::dev::HttpServiceFactory;
use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse, Responder};
use diesel::insert_into;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::api::{auth, common};
use crate::error::ApiError;
use crate::models::{Subject, User};
use crate::schema::subjects;
use crate::{AppState, DbConnection};

#[derive(Serialize)]
pub struct SubjectBody {
    pub id: i64,
    pub name: String,
    pub code: String,
}

impl From<Subject> for SubjectBody {
    fn from(subject: Subject) -> Self {
        SubjectBody {
            id: subject.id,
            name: subject.name,
            code: subject.code,
        }
    }
}

/// Looks up a subject owned by the given user.
pub fn get_owned_subject(
    connection: &mut DbConnection,
    user: &User,
    subject_id: i64,
) -> Result<Option<Subject>, ApiError> {
    Ok(subjects::table
        .filter(subjects::id.eq(subject_id))
        .filter(subjects::user_id.eq(user.id))
        .select(Subject::as_select())
        .first(connection)
        .optional()?)
}

fn list_subjects(connection: &mut DbConnection, user: &User) -> Result<Vec<Subject>, ApiError> {
    Ok(subjects::table
        .filter(subjects::user_id.eq(user.id))
        .order(subjects::name.asc())
        .select(Subject::as_select())
        .load(connection)?)
}

#[derive(Serialize)]
struct SubjectListResponse {
    subjects: Vec<SubjectBody>,
}

#[get("")]
async fn list_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<impl Responder, ApiError> {
    let token = auth::bearer_token(&req);
    let mut connection = state.db_pool.get()?;
    let rows = web::block(move || -> Result<Vec<Subject>, ApiError> {
        let user = auth::require_user(&mut connection, token.as_deref())?;
        list_subjects(&mut connection, &user)
    })
    .await??;
    Ok(HttpResponse::Ok().json(SubjectListResponse {
        subjects: rows.into_iter().map(SubjectBody::from).collect(),
    }))
}

#[derive(Deserialize)]
struct CreateSubjectPayload {
    name: Option<String>,
    code: Option<String>,
}

#[derive(Serialize)]
struct SubjectResponse {
    subject: SubjectBody,
}

#[derive(Serialize)]
struct SubjectCreatedResponse {
    subject: SubjectBody,
    created: bool,
}

/// Idempotent create keyed on (user, name): an existing subject is
/// returned as-is, picking up a changed non-empty `code` on the way.
fn create_subject(
    connection: &mut DbConnection,
    user: &User,
    name: String,
    code: String,
) -> Result<(Subject, bool), ApiError> {
    connection
        .transaction::<(Subject, bool), ApiError, _>(|connection| {
            let existing: Option<Subject> = subjects::table
                .filter(subjects::user_id.eq(user.id))
                .filter(subjects::name.eq(&name))
                .select(Subject::as_select())
                .first(connection)
                .optional()?;
            if let Some(mut subject) = existing {
                if !code.is_empty() && subject.code != code {
                    subject = diesel::update(subjects::table.filter(subjects::id.eq(subject.id)))
                        .set(subjects::code.eq(&code))
                        .returning(Subject::as_returning())
                        .get_result(connection)?;
                }
                return Ok((subject, false));
            }
            let subject: Subject = insert_into(subjects::table)
                .values((
                    subjects::user_id.eq(user.id),
                    subjects::name.eq(&name),
                    subjects::code.eq(&code),
                    subjects::created_at.eq(common::get_current_timestamp()),
                ))
                .returning(Subject::as_returning())
                .get_result(connection)?;
            Ok((subject, true))
        })
        .map_err(|error| {
            error.unique_violation_as_conflict("Subject with this name already exists")
        })
}

#[post("")]
async fn create_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<CreateSubjectPayload>,
) -> Result<impl Responder, ApiError> {
    let payload = payload.0;
    let name = payload.name.as_deref().unwrap_or("").trim().to_owned();
    let code = payload.code.as_deref().unwrap_or("").trim().to_owned();
    if name.is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    if name.len() > common::MAX_SUBJECT_NAME_BYTES {
        return Err(ApiError::bad_request("name is too long"));
    }
    if code.len() > common::MAX_SUBJECT_CODE_BYTES {
        return Err(ApiError::bad_request("code is too long"));
    }
    let token = auth::bearer_token(&req);
    let mut connection = state.db_pool.get()?;
    let (subject, created) = web::block(move || -> Result<(Subject, bool), ApiError> {
        let user = auth::require_user(&mut connection, token.as_deref())?;
        create_subject(&mut connection, &user, name, code)
    })
    .await??;
    let body = SubjectCreatedResponse {
        subject: subject.into(),
        created,
    };
    let response = if created {
        HttpResponse::Created().json(&body)
    } else {
        HttpResponse::Ok().json(&body)
    };
    Ok(response)
}

#[derive(Deserialize)]
struct UpdateSubjectPayload {
    name: Option<String>,
    code: Option<String>,
}

fn update_subject(
    connection: &mut DbConnection,
    user: &User,
    subject_id: i64,
    name: String,
    code: String,
) -> Result<Subject, ApiError> {
    let subject =
        get_owned_subject(connection, user, subject_id)?.ok_or(ApiError::NotFound("Subject"))?;
    let new_name = if name.is_empty() { subject.name } else { name };
    diesel::update(subjects::table.filter(subjects::id.eq(subject.id)))
        .set((subjects::name.eq(&new_name), subjects::code.eq(&code)))
        .returning(Subject::as_returning())
        .get_result(connection)
        .map_err(|error| {
            ApiError::from(error)
                .unique_violation_as_conflict("Subject with this name already exists")
        })
}

#[put("/{subject_id}")]
async fn update_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    payload: web::Json<UpdateSubjectPayload>,
) -> Result<impl Responder, ApiError> {
    let subject_id = path.into_inner();
    let payload = payload.0;
    let name = payload.name.as_deref().unwrap_or("").trim().to_owned();
    let code = payload.code.as_deref().unwrap_or("").trim().to_owned();
    if name.len() > common::MAX_SUBJECT_NAME_BYTES {
        return Err(ApiError::bad_request("name is too long"));
    }
    if code.len() > common::MAX_SUBJECT_CODE_BYTES {
        return Err(ApiError::bad_request("code is too long"));
    }
    let token = auth::bearer_token(&req);
    let mut connection = state.db_pool.get()?;
    let subject = web::block(move || -> Result<Subject, ApiError> {
        let user = auth::require_user(&mut connection, token.as_deref())?;
        update_subject(&mut connection, &user, subject_id, name, code)
    })
    .await??;
    Ok(HttpResponse::Ok().json(SubjectResponse {
        subject: subject.into(),
    }))
}

#[delete("/{subject_id}")]
async fn delete_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let subject_id = path.into_inner();
    let token = auth::bearer_token(&req);
    let mut connection = state.db_pool.get()?;
    web::block(move || -> Result<(), ApiError> {
        let user = auth::require_user(&mut connection, token.as_deref())?;
        let affected = diesel::delete(
            subjects::table
                .filter(subjects::id.eq(subject_id))
                .filter(subjects::user_id.eq(user.id)),
        )
        .execute(&mut connection)?;
        if affected == 0 {
            return Err(ApiError::NotFound("Subject"));
        }
        Ok(())
    })
    .await??;
    Ok(common::message_response("Subject deleted"))
}

pub fn get_service() -> impl HttpServiceFactory {
    web::scope("/subjects")
        .service(list_handler)
        .service(create_handler)
        .service(update_handler)
        .service(delete_handler)
}
