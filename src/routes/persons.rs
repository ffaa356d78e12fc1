use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::authz::{permissions, Session};
use crate::errors::{AppError, AppResult};
use crate::models::pagination::{Paginated, PaginationParams, PersonPage};
use crate::models::person::{Person, PersonCreateRequest, PersonUpdateRequest, PERSON_COLUMNS};
use crate::utils::{non_blank, require_text, updated_optional, updated_text, utc_now};

const DEFAULT_DOCUMENT_TYPE: &str = "CI";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_persons).post(create_person))
        .route("/:id", get(get_person).put(update_person).delete(delete_person))
}

#[utoipa::path(
    get,
    path = "/persons",
    tag = "Persons",
    params(
        ("page" = Option<u64>, Query, description = "1-based page"),
        ("per_page" = Option<u64>, Query, description = "Page size, at most 100"),
    ),
    responses((status = 200, description = "Persons", body = PersonPage)),
    security(("bearerAuth" = []))
)]
pub async fn list_persons(
    State(state): State<AppState>,
    session: Session,
    Query(page): Query<PaginationParams>,
) -> AppResult<Json<Paginated<Person>>> {
    session.require(permissions::VIEW_PERSONS)?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM persons")
        .fetch_one(&state.pool)
        .await?;

    let sql = format!(
        "SELECT {PERSON_COLUMNS} FROM persons \
         ORDER BY paternal_surname, maternal_surname, first_name, id LIMIT ? OFFSET ?"
    );
    let persons = sqlx::query_as::<_, Person>(&sql)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(Paginated::new(persons, &page, total)))
}

#[utoipa::path(
    get,
    path = "/persons/{id}",
    tag = "Persons",
    params(("id" = i64, Path, description = "Person ID")),
    responses(
        (status = 200, description = "Person", body = Person),
        (status = 404, description = "Person not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_person(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Person>> {
    session.require(permissions::VIEW_PERSONS)?;
    Ok(Json(fetch_person(&state.pool, id).await?))
}

#[utoipa::path(
    post,
    path = "/persons",
    tag = "Persons",
    request_body = PersonCreateRequest,
    responses(
        (status = 201, description = "Person created", body = Person),
        (status = 409, description = "Document already registered")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_person(
    State(state): State<AppState>,
    session: Session,
    Json(payload): Json<PersonCreateRequest>,
) -> AppResult<(StatusCode, Json<Person>)> {
    session.require(permissions::CREATE_PERSON)?;

    let id = sqlx::query(
        "INSERT INTO persons (document_type, document_number, first_name, paternal_surname, maternal_surname, \
         birth_date, sex, birth_place, address, phone, email, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(payload.document_type.unwrap_or_else(|| DEFAULT_DOCUMENT_TYPE.to_string()))
    .bind(require_text("document_number", &payload.document_number)?)
    .bind(require_text("first_name", &payload.first_name)?)
    .bind(require_text("paternal_surname", &payload.paternal_surname)?)
    .bind(non_blank(payload.maternal_surname))
    .bind(payload.birth_date)
    .bind(non_blank(payload.sex))
    .bind(non_blank(payload.birth_place))
    .bind(non_blank(payload.address))
    .bind(non_blank(payload.phone))
    .bind(non_blank(payload.email))
    .bind(utc_now())
    .execute(&state.pool)
    .await?
    .last_insert_rowid();

    Ok((StatusCode::CREATED, Json(fetch_person(&state.pool, id).await?)))
}

#[utoipa::path(
    put,
    path = "/persons/{id}",
    tag = "Persons",
    params(("id" = i64, Path, description = "Person ID")),
    request_body = PersonUpdateRequest,
    responses(
        (status = 200, description = "Person updated", body = Person),
        (status = 404, description = "Person not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_person(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
    Json(payload): Json<PersonUpdateRequest>,
) -> AppResult<Json<Person>> {
    session.require(permissions::EDIT_PERSON)?;
    let current = fetch_person(&state.pool, id).await?;

    sqlx::query(
        "UPDATE persons SET document_type = ?, document_number = ?, first_name = ?, paternal_surname = ?, \
         maternal_surname = ?, birth_date = ?, sex = ?, birth_place = ?, address = ?, phone = ?, email = ?, \
         updated_at = ? WHERE id = ?",
    )
    .bind(payload.document_type.unwrap_or(current.document_type))
    .bind(updated_text("document_number", payload.document_number, current.document_number)?)
    .bind(updated_text("first_name", payload.first_name, current.first_name)?)
    .bind(updated_text("paternal_surname", payload.paternal_surname, current.paternal_surname)?)
    .bind(updated_optional(payload.maternal_surname, current.maternal_surname))
    .bind(payload.birth_date.or(current.birth_date))
    .bind(updated_optional(payload.sex, current.sex))
    .bind(updated_optional(payload.birth_place, current.birth_place))
    .bind(updated_optional(payload.address, current.address))
    .bind(updated_optional(payload.phone, current.phone))
    .bind(updated_optional(payload.email, current.email))
    .bind(utc_now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    Ok(Json(fetch_person(&state.pool, id).await?))
}

#[utoipa::path(
    delete,
    path = "/persons/{id}",
    tag = "Persons",
    params(("id" = i64, Path, description = "Person ID")),
    responses(
        (status = 204, description = "Person deleted together with their student and instructor profiles"),
        (status = 404, description = "Person not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_person(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    session.require(permissions::DELETE_PERSON)?;

    let result = sqlx::query("DELETE FROM persons WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found("person not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_person(pool: &SqlitePool, id: i64) -> AppResult<Person> {
    let sql = format!("SELECT {PERSON_COLUMNS} FROM persons WHERE id = ?");
    sqlx::query_as::<_, Person>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("person not found"))
}
