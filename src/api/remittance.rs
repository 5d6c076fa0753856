use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::remittance::{PhilHealth, Remittance},
    models::{Paginated, paginate},
    utils::audit::{self, AuditEntry},
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::{MySqlConnection, MySqlPool};
use utoipa::{IntoParams, ToSchema};

pub const REMITTANCE_COLUMNS: &str = "id, employee_number, nhmfc, liquidating_cash, \
    gsis_salary_loan, gsis_policy_loan, gsis_arrears, cpl, mpl, mpl_lite, emergency_loan, \
    pagibig_fund_cont, pagibig_2, multi_purpose_loan, landbank_salary_loan, \
    earist_credit_coop, feu";

/// Latest ledger row of an employee, if any.
pub async fn latest_remittance(
    conn: &mut MySqlConnection,
    employee_number: &str,
) -> Result<Option<Remittance>, sqlx::Error> {
    sqlx::query_as::<_, Remittance>(&format!(
        "SELECT {} FROM remittance_table WHERE employee_number = ? ORDER BY id DESC LIMIT 1",
        REMITTANCE_COLUMNS
    ))
    .bind(employee_number)
    .fetch_optional(&mut *conn)
    .await
}

/// Overwrites the employee's latest ledger row, or inserts the first one.
pub async fn upsert_remittance(
    conn: &mut MySqlConnection,
    employee_number: &str,
    r: &Remittance,
) -> Result<u64, sqlx::Error> {
    let existing = sqlx::query_scalar::<_, u64>(
        "SELECT id FROM remittance_table WHERE employee_number = ? ORDER BY id DESC LIMIT 1",
    )
    .bind(employee_number)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = existing {
        sqlx::query(
            r#"
            UPDATE remittance_table SET
                nhmfc = ?, liquidating_cash = ?, gsis_salary_loan = ?, gsis_policy_loan = ?,
                gsis_arrears = ?, cpl = ?, mpl = ?, mpl_lite = ?, emergency_loan = ?,
                pagibig_fund_cont = ?, pagibig_2 = ?, multi_purpose_loan = ?,
                landbank_salary_loan = ?, earist_credit_coop = ?, feu = ?
            WHERE id = ?
            "#,
        )
        .bind(r.nhmfc)
        .bind(r.liquidating_cash)
        .bind(r.gsis_salary_loan)
        .bind(r.gsis_policy_loan)
        .bind(r.gsis_arrears)
        .bind(r.cpl)
        .bind(r.mpl)
        .bind(r.mpl_lite)
        .bind(r.emergency_loan)
        .bind(r.pagibig_fund_cont)
        .bind(r.pagibig_2)
        .bind(r.multi_purpose_loan)
        .bind(r.landbank_salary_loan)
        .bind(r.earist_credit_coop)
        .bind(r.feu)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        return Ok(id);
    }

    let res = sqlx::query(
        r#"
        INSERT INTO remittance_table
            (employee_number, nhmfc, liquidating_cash, gsis_salary_loan, gsis_policy_loan,
             gsis_arrears, cpl, mpl, mpl_lite, emergency_loan, pagibig_fund_cont, pagibig_2,
             multi_purpose_loan, landbank_salary_loan, earist_credit_coop, feu)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_number)
    .bind(r.nhmfc)
    .bind(r.liquidating_cash)
    .bind(r.gsis_salary_loan)
    .bind(r.gsis_policy_loan)
    .bind(r.gsis_arrears)
    .bind(r.cpl)
    .bind(r.mpl)
    .bind(r.mpl_lite)
    .bind(r.emergency_loan)
    .bind(r.pagibig_fund_cont)
    .bind(r.pagibig_2)
    .bind(r.multi_purpose_loan)
    .bind(r.landbank_salary_loan)
    .bind(r.earist_credit_coop)
    .bind(r.feu)
    .execute(&mut *conn)
    .await?;

    Ok(res.last_insert_id())
}

/// Latest PhilHealth contribution, zero when none is on file.
pub async fn latest_philhealth(
    conn: &mut MySqlConnection,
    employee_number: &str,
) -> Result<f64, sqlx::Error> {
    let value = sqlx::query_scalar::<_, f64>(
        "SELECT philhealth_contribution FROM philhealth WHERE employee_number = ? ORDER BY id DESC LIMIT 1",
    )
    .bind(employee_number)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(value.unwrap_or(0.0))
}

pub async fn upsert_philhealth(
    conn: &mut MySqlConnection,
    employee_number: &str,
    contribution: f64,
) -> Result<(), sqlx::Error> {
    let updated = sqlx::query(
        r#"
        UPDATE philhealth SET philhealth_contribution = ?
        WHERE employee_number = ?
        ORDER BY id DESC
        LIMIT 1
        "#,
    )
    .bind(contribution)
    .bind(employee_number)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() == 0 {
        sqlx::query("INSERT INTO philhealth (employee_number, philhealth_contribution) VALUES (?, ?)")
            .bind(employee_number)
            .bind(contribution)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LedgerQuery {
    pub employee_number: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// List remittance ledger rows
#[utoipa::path(
    get,
    path = "/api/remittance",
    params(LedgerQuery),
    responses((status = 200, description = "Paginated ledger", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Remittance"
)]
pub async fn list_remittances(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LedgerQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let (page, per_page, offset) = paginate(query.page, query.per_page, 20);

    let filter = query.employee_number.as_deref();
    let where_sql = if filter.is_some() { " WHERE employee_number = ?" } else { "" };

    let count_sql = format!("SELECT COUNT(*) FROM remittance_table{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(e) = filter {
        count_q = count_q.bind(e);
    }
    let total = count_q.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        "SELECT {} FROM remittance_table{} ORDER BY id DESC LIMIT ? OFFSET ?",
        REMITTANCE_COLUMNS, where_sql
    );
    let mut data_q = sqlx::query_as::<_, Remittance>(&data_sql);
    if let Some(e) = filter {
        data_q = data_q.bind(e);
    }
    let data = data_q
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

/// Latest ledger row of an employee
#[utoipa::path(
    get,
    path = "/api/remittance/{employee_number}",
    params(("employee_number" = String, Path, description = "Employee number")),
    responses(
        (status = 200, body = Remittance),
        (status = 404, description = "No remittance on file")
    ),
    security(("bearer_auth" = [])),
    tag = "Remittance"
)]
pub async fn get_remittance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let employee_number = path.into_inner();
    auth.require_self_or_admin(&employee_number)?;

    let mut conn = pool.acquire().await?;
    let row = latest_remittance(&mut conn, &employee_number)
        .await?
        .ok_or_else(|| ApiError::not_found("No remittance on file"))?;

    Ok(HttpResponse::Ok().json(row))
}

/// Create or overwrite the latest ledger row
#[utoipa::path(
    put,
    path = "/api/remittance/{employee_number}",
    params(("employee_number" = String, Path, description = "Employee number")),
    request_body = Remittance,
    responses((status = 200, description = "Saved")),
    security(("bearer_auth" = [])),
    tag = "Remittance"
)]
pub async fn save_remittance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
    payload: web::Json<Remittance>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let employee_number = path.into_inner();

    let mut tx = pool.begin().await?;
    let id = upsert_remittance(&mut tx, &employee_number, &payload).await?;
    tx.commit().await?;

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "upsert", "remittance_table")
            .record(id)
            .target(employee_number),
    );
    Ok(HttpResponse::Ok().json(json!({ "message": "Remittance saved", "id": id })))
}

/// Delete a ledger row
#[utoipa::path(
    delete,
    path = "/api/remittance/entry/{id}",
    params(("id" = u64, Path, description = "Record id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Remittance not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Remittance"
)]
pub async fn delete_remittance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let res = sqlx::query("DELETE FROM remittance_table WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("Remittance not found"));
    }

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "delete", "remittance_table").record(id),
    );
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

/// List PhilHealth contributions
#[utoipa::path(
    get,
    path = "/api/philhealth",
    responses((status = 200, body = Vec<PhilHealth>)),
    security(("bearer_auth" = [])),
    tag = "Remittance"
)]
pub async fn list_philhealth(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let rows = sqlx::query_as::<_, PhilHealth>(
        "SELECT id, employee_number, philhealth_contribution FROM philhealth ORDER BY employee_number",
    )
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(rows))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PhilHealthInput {
    #[schema(example = 750.0)]
    pub philhealth_contribution: f64,
}

/// Set the PhilHealth contribution of an employee
#[utoipa::path(
    put,
    path = "/api/philhealth/{employee_number}",
    params(("employee_number" = String, Path, description = "Employee number")),
    request_body = PhilHealthInput,
    responses(
        (status = 200, description = "Saved"),
        (status = 400, description = "Negative contribution")
    ),
    security(("bearer_auth" = [])),
    tag = "Remittance"
)]
pub async fn save_philhealth(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
    payload: web::Json<PhilHealthInput>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let employee_number = path.into_inner();

    if payload.philhealth_contribution < 0.0 {
        return Err(ApiError::bad_request("Contribution cannot be negative"));
    }

    let mut conn = pool.acquire().await?;
    upsert_philhealth(&mut conn, &employee_number, payload.philhealth_contribution).await?;

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "upsert", "philhealth").target(employee_number),
    );
    Ok(HttpResponse::Ok().json(json!({ "message": "PhilHealth contribution saved" })))
}

/// Delete a PhilHealth row
#[utoipa::path(
    delete,
    path = "/api/philhealth/{id}",
    params(("id" = u64, Path, description = "Record id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "PhilHealth record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Remittance"
)]
pub async fn delete_philhealth(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let res = sqlx::query("DELETE FROM philhealth WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("PhilHealth record not found"));
    }

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "delete", "philhealth").record(id),
    );
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}
