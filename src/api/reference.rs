//! Reference tables: departments, department assignments, plantilla items and
//! the salary grade schedule.

use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult, duplicate_as_conflict},
    model::reference::{Department, DepartmentAssignment, Item, SalaryGrade},
    utils::{
        audit::{self, AuditEntry},
        db_utils::{SqlUpdate, build_update_sql, execute_update},
    },
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::{MySqlConnection, MySqlPool};
use utoipa::{IntoParams, ToSchema};

/// Shared 404 for deletes keyed by id.
async fn delete_by_id(
    pool: &MySqlPool,
    table: &'static str,
    id: u64,
    missing: &str,
) -> ApiResult<()> {
    let res = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", table))
        .bind(id)
        .execute(pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::not_found(missing));
    }
    Ok(())
}

/// Shared 404 for whitelisted updates; a unique key clash is a 409.
async fn update_by_id(
    pool: &MySqlPool,
    update: SqlUpdate,
    missing: &str,
    clash: &str,
) -> ApiResult<()> {
    let affected = execute_update(pool, update)
        .await
        .map_err(|e| duplicate_as_conflict(e, clash))?;
    if affected == 0 {
        return Err(ApiError::not_found(missing));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Departments
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct DepartmentInput {
    #[schema(example = "CCS")]
    pub code: String,
    #[schema(example = "College of Computing Studies")]
    pub description: String,
}

#[utoipa::path(
    get,
    path = "/api/departments",
    responses((status = 200, body = Vec<Department>)),
    security(("bearer_auth" = [])),
    tag = "Reference"
)]
pub async fn list_departments(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> ApiResult<HttpResponse> {
    let rows = sqlx::query_as::<_, Department>(
        "SELECT id, code, description FROM department_table ORDER BY code",
    )
    .fetch_all(pool.get_ref())
    .await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    post,
    path = "/api/departments",
    request_body = DepartmentInput,
    responses(
        (status = 201, description = "Created"),
        (status = 409, description = "Department code already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Reference"
)]
pub async fn create_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<DepartmentInput>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    if payload.code.trim().is_empty() {
        return Err(ApiError::bad_request("code is required"));
    }

    let res = sqlx::query("INSERT INTO department_table (code, description) VALUES (?, ?)")
        .bind(payload.code.trim())
        .bind(payload.description.trim())
        .execute(pool.get_ref())
        .await
        .map_err(|e| duplicate_as_conflict(e, "Department code already exists"))?;

    let id = res.last_insert_id();
    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "create", "department_table").record(id),
    );
    Ok(HttpResponse::Created().json(json!({ "message": "Department created", "id": id })))
}

#[utoipa::path(
    put,
    path = "/api/departments/{id}",
    params(("id" = u64, Path, description = "Record id")),
    request_body = Object,
    responses(
        (status = 200, description = "Updated"),
        (status = 404, description = "Department not found"),
        (status = 409, description = "Unique key already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Reference"
)]
pub async fn update_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let update = build_update_sql("department_table", &body, &["code", "description"], &[], "id", id)?;
    update_by_id(
        pool.get_ref(),
        update,
        "Department not found",
        "Department code already exists",
    )
    .await?;

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "update", "department_table").record(id),
    );
    Ok(HttpResponse::Ok().json(json!({ "message": "Department updated" })))
}

#[utoipa::path(
    delete,
    path = "/api/departments/{id}",
    params(("id" = u64, Path, description = "Record id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Department not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Reference"
)]
pub async fn delete_department(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();
    delete_by_id(pool.get_ref(), "department_table", id, "Department not found").await?;

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "delete", "department_table").record(id),
    );
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

// ---------------------------------------------------------------------------
// Department assignments
// ---------------------------------------------------------------------------

/// Trimmed department code; blank is a 400.
pub fn department_code(raw: &str) -> ApiResult<&str> {
    let code = raw.trim();
    if code.is_empty() {
        return Err(ApiError::bad_request("department_code is required"));
    }
    Ok(code)
}

/// 400 unless the code names a row of `department_table`. Returns the trimmed code.
pub async fn ensure_department<'a>(
    conn: &mut MySqlConnection,
    raw: &'a str,
) -> ApiResult<&'a str> {
    let code = department_code(raw)?;
    let known = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM department_table WHERE code = ?")
        .bind(code)
        .fetch_one(&mut *conn)
        .await?;
    if known == 0 {
        return Err(ApiError::bad_request(format!("Unknown department code: {code}")));
    }
    Ok(code)
}

/// Points the employee's latest assignment at `department_code`, inserting one if none exists.
pub async fn upsert_assignment(
    conn: &mut MySqlConnection,
    employee_number: &str,
    department_code: &str,
) -> Result<(), sqlx::Error> {
    let updated = sqlx::query(
        r#"
        UPDATE department_assignment SET department_code = ?
        WHERE employee_number = ?
        ORDER BY id DESC
        LIMIT 1
        "#,
    )
    .bind(department_code)
    .bind(employee_number)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        sqlx::query(
            "INSERT INTO department_assignment (employee_number, department_code) VALUES (?, ?)",
        )
        .bind(employee_number)
        .bind(department_code)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AssignmentQuery {
    pub employee_number: Option<String>,
    pub department_code: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/department-assignments",
    params(AssignmentQuery),
    responses((status = 200, body = Vec<DepartmentAssignment>)),
    security(("bearer_auth" = [])),
    tag = "Reference"
)]
pub async fn list_assignments(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AssignmentQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let mut sql =
        String::from("SELECT id, employee_number, department_code FROM department_assignment WHERE 1=1");
    if query.employee_number.is_some() {
        sql.push_str(" AND employee_number = ?");
    }
    if query.department_code.is_some() {
        sql.push_str(" AND department_code = ?");
    }
    sql.push_str(" ORDER BY employee_number");

    let mut q = sqlx::query_as::<_, DepartmentAssignment>(&sql);
    if let Some(e) = &query.employee_number {
        q = q.bind(e);
    }
    if let Some(d) = &query.department_code {
        q = q.bind(d);
    }

    let rows = q.fetch_all(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignmentInput {
    #[schema(example = "CCS")]
    pub department_code: String,
}

#[utoipa::path(
    put,
    path = "/api/department-assignments/{employee_number}",
    params(("employee_number" = String, Path, description = "Employee number")),
    request_body = AssignmentInput,
    responses(
        (status = 200, description = "Saved"),
        (status = 400, description = "Unknown department code")
    ),
    security(("bearer_auth" = [])),
    tag = "Reference"
)]
pub async fn save_assignment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
    payload: web::Json<AssignmentInput>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let employee_number = path.into_inner();

    let mut conn = pool.acquire().await?;
    let code = ensure_department(&mut conn, &payload.department_code).await?;
    upsert_assignment(&mut conn, &employee_number, code).await?;

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "upsert", "department_assignment").target(employee_number),
    );
    Ok(HttpResponse::Ok().json(json!({ "message": "Department assignment saved" })))
}

#[utoipa::path(
    delete,
    path = "/api/department-assignments/{id}",
    params(("id" = u64, Path, description = "Record id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Assignment not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Reference"
)]
pub async fn delete_assignment(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();
    delete_by_id(pool.get_ref(), "department_assignment", id, "Assignment not found").await?;

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "delete", "department_assignment").record(id),
    );
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

const ITEM_COLUMNS: &str =
    "id, item_name, item_code, salary_grade, step, employee_number, effectivity_date";

#[derive(Debug, Deserialize, ToSchema)]
pub struct ItemInput {
    #[schema(example = "Instructor I")]
    pub item_name: String,
    #[schema(example = "INST1-042")]
    pub item_code: String,
    #[schema(example = 12)]
    pub salary_grade: i32,
    pub step: Option<i32>,
    pub employee_number: Option<String>,
    #[schema(value_type = Option<String>, format = "date")]
    pub effectivity_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ItemQuery {
    pub employee_number: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/items",
    params(ItemQuery),
    responses((status = 200, body = Vec<Item>)),
    security(("bearer_auth" = [])),
    tag = "Reference"
)]
pub async fn list_items(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ItemQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let rows = match &query.employee_number {
        Some(e) => {
            sqlx::query_as::<_, Item>(&format!(
                "SELECT {} FROM item_table WHERE employee_number = ? ORDER BY id DESC",
                ITEM_COLUMNS
            ))
            .bind(e)
            .fetch_all(pool.get_ref())
            .await?
        }
        None => {
            sqlx::query_as::<_, Item>(&format!(
                "SELECT {} FROM item_table ORDER BY item_code",
                ITEM_COLUMNS
            ))
            .fetch_all(pool.get_ref())
            .await?
        }
    };
    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    get,
    path = "/api/items/{id}",
    params(("id" = u64, Path, description = "Record id")),
    responses(
        (status = 200, body = Item),
        (status = 404, description = "Item not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Reference"
)]
pub async fn get_item(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let item = sqlx::query_as::<_, Item>(&format!(
        "SELECT {} FROM item_table WHERE id = ?",
        ITEM_COLUMNS
    ))
    .bind(path.into_inner())
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("Item not found"))?;

    Ok(HttpResponse::Ok().json(item))
}

#[utoipa::path(
    post,
    path = "/api/items",
    request_body = ItemInput,
    responses(
        (status = 201, description = "Created"),
        (status = 400, description = "Invalid salary grade or step")
    ),
    security(("bearer_auth" = [])),
    tag = "Reference"
)]
pub async fn create_item(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ItemInput>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let step = payload.step.unwrap_or(1);
    if payload.salary_grade < 1 || step < 1 {
        return Err(ApiError::bad_request("salary_grade and step start at 1"));
    }

    let res = sqlx::query(
        r#"
        INSERT INTO item_table
            (item_name, item_code, salary_grade, step, employee_number, effectivity_date)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.item_name.trim())
    .bind(payload.item_code.trim())
    .bind(payload.salary_grade)
    .bind(step)
    .bind(&payload.employee_number)
    .bind(payload.effectivity_date)
    .execute(pool.get_ref())
    .await?;

    let id = res.last_insert_id();
    let mut entry = AuditEntry::new(&auth, "create", "item_table").record(id);
    if let Some(e) = &payload.employee_number {
        entry = entry.target(e.clone());
    }
    audit::log(pool.get_ref(), entry);

    Ok(HttpResponse::Created().json(json!({ "message": "Item created", "id": id })))
}

#[utoipa::path(
    put,
    path = "/api/items/{id}",
    params(("id" = u64, Path, description = "Record id")),
    request_body = Object,
    responses(
        (status = 200, description = "Updated"),
        (status = 404, description = "Item not found"),
        (status = 409, description = "Unique key already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Reference"
)]
pub async fn update_item(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let update = build_update_sql(
        "item_table",
        &body,
        &[
            "item_name",
            "item_code",
            "salary_grade",
            "step",
            "employee_number",
            "effectivity_date",
        ],
        &["effectivity_date"],
        "id",
        id,
    )?;
    update_by_id(pool.get_ref(), update, "Item not found", "Item code already exists").await?;

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "update", "item_table").record(id),
    );
    Ok(HttpResponse::Ok().json(json!({ "message": "Item updated" })))
}

#[utoipa::path(
    delete,
    path = "/api/items/{id}",
    params(("id" = u64, Path, description = "Record id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Item not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Reference"
)]
pub async fn delete_item(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();
    delete_by_id(pool.get_ref(), "item_table", id, "Item not found").await?;

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "delete", "item_table").record(id),
    );
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

// ---------------------------------------------------------------------------
// Salary grades
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct SalaryGradeInput {
    #[schema(example = 12)]
    pub salary_grade: i32,
    #[schema(example = 1)]
    pub step: i32,
    #[schema(example = 30024.0)]
    pub rate: f64,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RateQuery {
    pub salary_grade: i32,
    pub step: i32,
}

#[utoipa::path(
    get,
    path = "/api/salary-grades",
    responses((status = 200, body = Vec<SalaryGrade>)),
    security(("bearer_auth" = [])),
    tag = "Reference"
)]
pub async fn list_salary_grades(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> ApiResult<HttpResponse> {
    let rows = sqlx::query_as::<_, SalaryGrade>(
        "SELECT id, salary_grade, step, rate FROM salary_grade_table ORDER BY salary_grade, step",
    )
    .fetch_all(pool.get_ref())
    .await?;
    Ok(HttpResponse::Ok().json(rows))
}

/// Monthly rate for a grade and step
#[utoipa::path(
    get,
    path = "/api/salary-grades/rate",
    params(RateQuery),
    responses(
        (status = 200, body = SalaryGrade),
        (status = 404, description = "No rate for this grade and step")
    ),
    security(("bearer_auth" = [])),
    tag = "Reference"
)]
pub async fn salary_rate(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<RateQuery>,
) -> ApiResult<HttpResponse> {
    let row = sqlx::query_as::<_, SalaryGrade>(
        "SELECT id, salary_grade, step, rate FROM salary_grade_table WHERE salary_grade = ? AND step = ?",
    )
    .bind(query.salary_grade)
    .bind(query.step)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("No rate for this grade and step"))?;

    Ok(HttpResponse::Ok().json(row))
}

#[utoipa::path(
    post,
    path = "/api/salary-grades",
    request_body = SalaryGradeInput,
    responses(
        (status = 201, description = "Created"),
        (status = 409, description = "Grade and step already exist")
    ),
    security(("bearer_auth" = [])),
    tag = "Reference"
)]
pub async fn create_salary_grade(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<SalaryGradeInput>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    if payload.rate < 0.0 {
        return Err(ApiError::bad_request("rate cannot be negative"));
    }

    let res = sqlx::query("INSERT INTO salary_grade_table (salary_grade, step, rate) VALUES (?, ?, ?)")
        .bind(payload.salary_grade)
        .bind(payload.step)
        .bind(payload.rate)
        .execute(pool.get_ref())
        .await
        .map_err(|e| duplicate_as_conflict(e, "Grade and step already exist"))?;

    let id = res.last_insert_id();
    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "create", "salary_grade_table").record(id),
    );
    Ok(HttpResponse::Created().json(json!({ "message": "Salary grade created", "id": id })))
}

#[utoipa::path(
    put,
    path = "/api/salary-grades/{id}",
    params(("id" = u64, Path, description = "Record id")),
    request_body = Object,
    responses(
        (status = 200, description = "Updated"),
        (status = 404, description = "Salary grade not found"),
        (status = 409, description = "Unique key already taken")
    ),
    security(("bearer_auth" = [])),
    tag = "Reference"
)]
pub async fn update_salary_grade(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let update = build_update_sql(
        "salary_grade_table",
        &body,
        &["salary_grade", "step", "rate"],
        &[],
        "id",
        id,
    )?;
    update_by_id(
        pool.get_ref(),
        update,
        "Salary grade not found",
        "Grade and step already exist",
    )
    .await?;

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "update", "salary_grade_table").record(id),
    );
    Ok(HttpResponse::Ok().json(json!({ "message": "Salary grade updated" })))
}

#[utoipa::path(
    delete,
    path = "/api/salary-grades/{id}",
    params(("id" = u64, Path, description = "Record id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Salary grade not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Reference"
)]
pub async fn delete_salary_grade(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();
    delete_by_id(pool.get_ref(), "salary_grade_table", id, "Salary grade not found").await?;

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "delete", "salary_grade_table").record(id),
    );
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn department_code_is_trimmed() {
        assert_eq!(department_code("  CCS ").unwrap(), "CCS");
    }

    #[test]
    fn blank_department_code_is_rejected() {
        assert!(matches!(department_code(""), Err(ApiError::BadRequest(_))));
        assert!(matches!(department_code("   "), Err(ApiError::BadRequest(_))));
    }
}
