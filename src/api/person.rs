use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult, is_duplicate_key},
    model::person::Person,
    models::{Paginated, paginate},
    utils::{
        audit::{self, AuditEntry},
        db_utils::{build_update_sql, execute_update},
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

/// Columns a PUT may touch.
const UPDATABLE: &[&str] = &[
    "first_name",
    "middle_name",
    "last_name",
    "name_extension",
    "birth_date",
    "sex",
    "civil_status",
    "email",
    "mobile_num",
];

const PERSON_COLUMNS: &str = "id, employee_number, first_name, middle_name, last_name, \
    name_extension, birth_date, sex, civil_status, email, mobile_num, created_at";

#[derive(Deserialize, ToSchema)]
pub struct CreatePerson {
    #[schema(example = "2024-0012")]
    pub employee_number: String,
    #[schema(example = "Maria")]
    pub first_name: String,
    pub middle_name: Option<String>,
    #[schema(example = "Dela Cruz")]
    pub last_name: String,
    pub name_extension: Option<String>,
    #[schema(example = "1990-05-14", format = "date", value_type = Option<String>)]
    pub birth_date: Option<NaiveDate>,
    pub sex: Option<String>,
    pub civil_status: Option<String>,
    pub email: Option<String>,
    pub mobile_num: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PersonQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Matches names and employee number
    pub search: Option<String>,
}

/// List personal records
#[utoipa::path(
    get,
    path = "/api/personal-info",
    params(PersonQuery),
    responses((status = 200, description = "Paginated personal records", body = Object)),
    tag = "Personal Info",
    security(("bearer_auth" = []))
)]
pub async fn list_people(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PersonQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let (page, per_page, offset) = paginate(query.page, query.per_page, 20);

    let (where_clause, like) = match query.search.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => (
            "WHERE first_name LIKE ? OR last_name LIKE ? OR employee_number LIKE ?",
            Some(format!("%{}%", s)),
        ),
        _ => ("", None),
    };

    let count_sql = format!("SELECT COUNT(*) FROM person_table {}", where_clause);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(like) = &like {
        count_query = count_query.bind(like).bind(like).bind(like);
    }
    let total = count_query.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        "SELECT {} FROM person_table {} ORDER BY last_name, first_name LIMIT ? OFFSET ?",
        PERSON_COLUMNS, where_clause
    );
    debug!(sql = %data_sql, page, per_page, "Fetching personal records");

    let mut data_query = sqlx::query_as::<_, Person>(&data_sql);
    if let Some(like) = &like {
        data_query = data_query.bind(like).bind(like).bind(like);
    }
    let data = data_query
        .bind(per_page as i64)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(Paginated {
        data,
        page,
        per_page,
        total,
    }))
}

/// Get a personal record by id
#[utoipa::path(
    get,
    path = "/api/personal-info/{id}",
    params(("id" = u64, Path, description = "Record id")),
    responses(
        (status = 200, body = Person),
        (status = 404, description = "Personal record not found")
    ),
    tag = "Personal Info",
    security(("bearer_auth" = []))
)]
pub async fn get_person(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();

    let person = sqlx::query_as::<_, Person>(&format!(
        "SELECT {} FROM person_table WHERE id = ?",
        PERSON_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("Personal record not found"))?;

    auth.require_self_or_admin(&person.employee_number)?;
    Ok(HttpResponse::Ok().json(person))
}

/// Get a personal record by employee number
#[utoipa::path(
    get,
    path = "/api/personal-info/employee/{employee_number}",
    params(("employee_number" = String, Path, description = "Employee number")),
    responses(
        (status = 200, body = Person),
        (status = 404, description = "Personal record not found")
    ),
    tag = "Personal Info",
    security(("bearer_auth" = []))
)]
pub async fn get_person_by_employee_number(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let employee_number = path.into_inner();
    auth.require_self_or_admin(&employee_number)?;

    let person = sqlx::query_as::<_, Person>(&format!(
        "SELECT {} FROM person_table WHERE employee_number = ?",
        PERSON_COLUMNS
    ))
    .bind(&employee_number)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("Personal record not found"))?;

    Ok(HttpResponse::Ok().json(person))
}

/// Create a personal record
#[utoipa::path(
    post,
    path = "/api/personal-info",
    request_body = CreatePerson,
    responses(
        (status = 201, description = "Created", body = Object, example = json!({"message": "Personal record created", "id": 1})),
        (status = 400, description = "Missing required fields"),
        (status = 409, description = "Employee number already exists")
    ),
    tag = "Personal Info",
    security(("bearer_auth" = []))
)]
pub async fn create_person(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreatePerson>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    if payload.employee_number.trim().is_empty()
        || payload.first_name.trim().is_empty()
        || payload.last_name.trim().is_empty()
    {
        return Err(ApiError::bad_request(
            "employee_number, first_name and last_name are required",
        ));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO person_table
        (employee_number, first_name, middle_name, last_name, name_extension,
         birth_date, sex, civil_status, email, mobile_num)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.employee_number.trim())
    .bind(&payload.first_name)
    .bind(&payload.middle_name)
    .bind(&payload.last_name)
    .bind(&payload.name_extension)
    .bind(payload.birth_date)
    .bind(&payload.sex)
    .bind(&payload.civil_status)
    .bind(&payload.email)
    .bind(&payload.mobile_num)
    .execute(pool.get_ref())
    .await;

    let id = match result {
        Ok(res) => res.last_insert_id(),
        Err(e) if is_duplicate_key(&e) => {
            return Err(ApiError::conflict("Employee number already exists"));
        }
        Err(e) => return Err(e.into()),
    };

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "create", "person_table")
            .record(id)
            .target(payload.employee_number.trim()),
    );

    Ok(HttpResponse::Created().json(json!({
        "message": "Personal record created",
        "id": id
    })))
}

/// Update a personal record
#[utoipa::path(
    put,
    path = "/api/personal-info/{id}",
    params(("id" = u64, Path, description = "Record id")),
    request_body = Object,
    responses(
        (status = 200, description = "Personal record updated"),
        (status = 400, description = "Empty payload or column not updatable"),
        (status = 404, description = "Personal record not found")
    ),
    tag = "Personal Info",
    security(("bearer_auth" = []))
)]
pub async fn update_person(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let update = build_update_sql("person_table", &body, UPDATABLE, &["birth_date"], "id", id)?;
    let affected = execute_update(pool.get_ref(), update).await?;

    if affected == 0 {
        return Err(ApiError::not_found("Personal record not found"));
    }

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "update", "person_table").record(id),
    );
    Ok(HttpResponse::Ok().json(json!({ "message": "Personal record updated" })))
}

/// Delete a personal record
#[utoipa::path(
    delete,
    path = "/api/personal-info/{id}",
    params(("id" = u64, Path, description = "Record id")),
    responses(
        (status = 200, description = "Successfully deleted"),
        (status = 404, description = "Personal record not found")
    ),
    tag = "Personal Info",
    security(("bearer_auth" = []))
)]
pub async fn delete_person(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let res = sqlx::query("DELETE FROM person_table WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("Personal record not found"));
    }

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "delete", "person_table").record(id),
    );
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}
