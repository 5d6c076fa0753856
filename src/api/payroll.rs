use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{
    MySql, MySqlConnection, MySqlPool,
    mysql::MySqlArguments,
    query::{Query, QueryAs},
};
use std::collections::{BTreeSet, HashSet};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::{
        reference::{ensure_department, upsert_assignment},
        remittance::{latest_philhealth, latest_remittance, upsert_philhealth, upsert_remittance},
    },
    auth::auth::AuthUser,
    core::payroll_calc::{self, DEFAULT_PERA, PayrollInputs},
    error::{ApiError, ApiResult, is_duplicate_key},
    model::{
        payroll::{
            PAYROLL_FIGURE_COLUMNS, PayrollFigures, PayrollProcessed, PayrollProcessing,
            PayrollReleased, PayrollStatus,
        },
        person::payroll_name,
        remittance::Remittance,
        role::Role,
    },
    models::{Paginated, RowOutcome, paginate},
    utils::{
        audit::{self, AuditEntry},
        notify::{NotificationHub, PAYROLL_FINALIZED, PAYROLL_RELEASED},
    },
};

/// `?, ?, ?` for an `IN (...)` list of `n` values.
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// `col = ?, ...` over the shared payroll columns.
fn figure_assignments() -> String {
    PAYROLL_FIGURE_COLUMNS
        .split(',')
        .map(|c| format!("{} = ?", c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn figure_count() -> usize {
    PAYROLL_FIGURE_COLUMNS.split(',').count()
}

/// Binds `f` in `PAYROLL_FIGURE_COLUMNS` order.
fn bind_figures<'q>(
    q: Query<'q, MySql, MySqlArguments>,
    f: &'q PayrollFigures,
) -> Query<'q, MySql, MySqlArguments> {
    q.bind(&f.employee_number)
        .bind(&f.name)
        .bind(&f.department_code)
        .bind(&f.position)
        .bind(f.start_date)
        .bind(f.end_date)
        .bind(f.rate_np)
        .bind(f.increment)
        .bind(f.pera)
        .bind(f.days_absent)
        .bind(f.tardiness_minutes)
        .bind(f.abs_deduction)
        .bind(f.gross_salary)
        .bind(f.withholding_tax)
        .bind(f.personal_life_retirement_ins)
        .bind(f.total_gsis_deds)
        .bind(f.philhealth)
        .bind(f.total_pagibig_deds)
        .bind(f.total_other_deds)
        .bind(f.total_deductions)
        .bind(f.net_salary)
        .bind(f.pay1st)
        .bind(f.pay2nd)
}

fn bind_ids<'q, O>(
    mut q: QueryAs<'q, MySql, O, MySqlArguments>,
    ids: &'q [u64],
) -> QueryAs<'q, MySql, O, MySqlArguments> {
    for id in ids {
        q = q.bind(*id);
    }
    q
}

/// Non-computed part of a payroll row.
#[derive(Debug, Clone)]
pub struct PayrollContext {
    pub employee_number: String,
    pub name: String,
    pub department_code: Option<String>,
    pub position: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

pub fn build_figures(ctx: &PayrollContext, inputs: &PayrollInputs) -> PayrollFigures {
    let b = payroll_calc::compute(inputs);
    PayrollFigures {
        employee_number: ctx.employee_number.clone(),
        name: ctx.name.clone(),
        department_code: ctx.department_code.clone(),
        position: ctx.position.clone(),
        start_date: ctx.start_date,
        end_date: ctx.end_date,
        rate_np: inputs.rate,
        increment: inputs.increment,
        pera: inputs.pera,
        days_absent: inputs.days_absent,
        tardiness_minutes: inputs.tardiness_minutes,
        abs_deduction: b.abs_deduction,
        gross_salary: b.gross_salary,
        withholding_tax: inputs.withholding_tax,
        personal_life_retirement_ins: b.personal_life_retirement_ins,
        total_gsis_deds: b.total_gsis_deds,
        philhealth: b.philhealth,
        total_pagibig_deds: b.total_pagibig_deds,
        total_other_deds: b.total_other_deds,
        total_deductions: b.total_deductions,
        net_salary: b.net_salary,
        pay1st: b.pay1st,
        pay2nd: b.pay2nd,
    }
}

#[derive(sqlx::FromRow)]
struct PersonName {
    first_name: String,
    middle_name: Option<String>,
    last_name: String,
}

#[derive(sqlx::FromRow)]
struct ItemRate {
    item_name: String,
    rate: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct AttendanceTotals {
    days_absent: i32,
    total_tardiness_minutes: i64,
}

/// Caller-supplied figures layered over what the tables hold.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub increment: Option<f64>,
    pub pera: Option<f64>,
    pub withholding_tax: Option<f64>,
    pub days_absent: Option<i32>,
    pub tardiness_minutes: Option<i32>,
}

/// Gathers inputs for one employee and period. Missing master data is a
/// `BadRequest` naming what is missing.
async fn assemble(
    conn: &mut MySqlConnection,
    employee_number: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    overrides: Overrides,
) -> ApiResult<PayrollFigures> {
    let person = sqlx::query_as::<_, PersonName>(
        "SELECT first_name, middle_name, last_name FROM person_table WHERE employee_number = ?",
    )
    .bind(employee_number)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| ApiError::bad_request("No personal record"))?;

    let item = sqlx::query_as::<_, ItemRate>(
        r#"
        SELECT it.item_name, sg.rate
        FROM item_table it
        LEFT JOIN salary_grade_table sg
            ON sg.salary_grade = it.salary_grade AND sg.step = it.step
        WHERE it.employee_number = ?
        ORDER BY it.id DESC
        LIMIT 1
        "#,
    )
    .bind(employee_number)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| ApiError::bad_request("No item assigned"))?;

    let rate = item
        .rate
        .ok_or_else(|| ApiError::bad_request("No salary grade rate for the assigned item"))?;

    let department_code = sqlx::query_scalar::<_, String>(
        "SELECT department_code FROM department_assignment WHERE employee_number = ? ORDER BY id DESC LIMIT 1",
    )
    .bind(employee_number)
    .fetch_optional(&mut *conn)
    .await?;

    let attendance = sqlx::query_as::<_, AttendanceTotals>(
        r#"
        SELECT days_absent, total_tardiness_minutes
        FROM overall_attendance_record
        WHERE person_id = ? AND start_date = ? AND end_date = ?
        "#,
    )
    .bind(employee_number)
    .bind(start_date)
    .bind(end_date)
    .fetch_optional(&mut *conn)
    .await?;

    let remittance = latest_remittance(conn, employee_number)
        .await?
        .unwrap_or_default();
    let philhealth = latest_philhealth(conn, employee_number).await?;

    let (days_absent, tardiness) = attendance
        .map(|a| (a.days_absent, i32::try_from(a.total_tardiness_minutes).unwrap_or(i32::MAX)))
        .unwrap_or((0, 0));

    let ctx = PayrollContext {
        employee_number: employee_number.to_string(),
        name: payroll_name(&person.first_name, person.middle_name.as_deref(), &person.last_name),
        department_code,
        position: Some(item.item_name),
        start_date,
        end_date,
    };
    let inputs = PayrollInputs {
        rate,
        increment: overrides.increment.unwrap_or(0.0),
        pera: overrides.pera.unwrap_or(DEFAULT_PERA),
        days_absent: overrides.days_absent.unwrap_or(days_absent),
        tardiness_minutes: overrides.tardiness_minutes.unwrap_or(tardiness),
        withholding_tax: overrides.withholding_tax.unwrap_or(0.0),
        philhealth,
        remittance,
    };

    Ok(build_figures(&ctx, &inputs))
}

async fn insert_processing(
    conn: &mut MySqlConnection,
    figures: &PayrollFigures,
) -> Result<u64, sqlx::Error> {
    let sql = format!(
        "INSERT INTO payroll_processing ({}, status) VALUES ({}, ?)",
        PAYROLL_FIGURE_COLUMNS,
        placeholders(figure_count())
    );
    let res = bind_figures(sqlx::query(&sql), figures)
        .bind(PayrollStatus::Processing.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(res.last_insert_id())
}

const PROCESSING_SELECT: &str = "SELECT id, status, ";

fn processing_sql(where_sql: &str) -> String {
    format!(
        "{}{} FROM payroll_processing{}",
        PROCESSING_SELECT, PAYROLL_FIGURE_COLUMNS, where_sql
    )
}

#[derive(Deserialize, ToSchema)]
pub struct CreatePayroll {
    #[schema(example = json!(["2024-0012", "2024-0013"]))]
    pub employee_numbers: Vec<String>,
    #[schema(example = "2024-03-01", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2024-03-15", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[schema(example = 2000.0)]
    pub pera: Option<f64>,
    pub increment: Option<f64>,
    pub withholding_tax: Option<f64>,
}

#[derive(Serialize, ToSchema)]
pub struct BatchOutcome {
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
    pub results: Vec<RowOutcome>,
}

#[utoipa::path(
    post,
    path = "/api/payroll",
    request_body = CreatePayroll,
    responses(
        (status = 200, description = "Per-employee outcomes", body = BatchOutcome),
        (status = 400, description = "Empty list or bad period"),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn create_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreatePayroll>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    // 1️⃣ validate request
    if payload.employee_numbers.is_empty() {
        return Err(ApiError::bad_request("No employees selected"));
    }
    if payload.start_date > payload.end_date {
        return Err(ApiError::bad_request("start_date cannot be after end_date"));
    }

    let overrides = Overrides {
        increment: payload.increment,
        pera: payload.pera,
        withholding_tax: payload.withholding_tax,
        ..Default::default()
    };

    // 2️⃣ one row per employee, each independent
    let unique: BTreeSet<&str> = payload
        .employee_numbers
        .iter()
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .collect();

    let mut results = Vec::with_capacity(unique.len());
    for emp in unique {
        let mut tx = pool.begin().await?;

        let exists = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM payroll_processing
            WHERE employee_number = ? AND start_date = ? AND end_date = ?
            "#,
        )
        .bind(emp)
        .bind(payload.start_date)
        .bind(payload.end_date)
        .fetch_one(&mut *tx)
        .await?;

        if exists > 0 {
            results.push(RowOutcome::ok(emp, "skipped"));
            continue;
        }

        let figures = match assemble(&mut tx, emp, payload.start_date, payload.end_date, overrides).await {
            Ok(f) => f,
            Err(ApiError::BadRequest(msg)) => {
                results.push(RowOutcome::failed(emp, msg));
                continue;
            }
            Err(e) => return Err(e),
        };

        // the UNIQUE period key settles a race with a concurrent request
        let id = match insert_processing(&mut tx, &figures).await {
            Ok(id) => id,
            Err(e) if is_duplicate_key(&e) => {
                results.push(RowOutcome::ok(emp, "skipped"));
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        tx.commit().await?;

        audit::log(
            pool.get_ref(),
            AuditEntry::new(&auth, "create", "payroll_processing")
                .record(id)
                .target(emp),
        );
        results.push(RowOutcome::ok(emp, "created"));
    }

    // 3️⃣ summary
    let count = |s: &str| results.iter().filter(|r| r.status == s).count();
    let outcome = BatchOutcome {
        created: count("created"),
        skipped: count("skipped"),
        failed: results.iter().filter(|r| r.is_error()).count(),
        results,
    };
    tracing::info!(
        created = outcome.created,
        skipped = outcome.skipped,
        failed = outcome.failed,
        start_date = %payload.start_date,
        end_date = %payload.end_date,
        "Payroll processing batch"
    );

    Ok(HttpResponse::Ok().json(outcome))
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PayrollQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_number: Option<String>,
    #[param(value_type = Option<String>, format = "date")]
    pub start_date: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
    /// processing or finalized
    pub status: Option<String>,
}

enum Filter<'a> {
    Str(&'a str),
    Date(NaiveDate),
}

fn period_filter<'a>(
    employee_number: Option<&'a str>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    status: Option<&'a str>,
) -> (String, Vec<Filter<'a>>) {
    let mut where_sql = String::from(" WHERE 1=1");
    let mut args = Vec::new();
    if let Some(e) = employee_number {
        where_sql.push_str(" AND employee_number = ?");
        args.push(Filter::Str(e));
    }
    if let Some(d) = start_date {
        where_sql.push_str(" AND start_date >= ?");
        args.push(Filter::Date(d));
    }
    if let Some(d) = end_date {
        where_sql.push_str(" AND end_date <= ?");
        args.push(Filter::Date(d));
    }
    if let Some(s) = status {
        where_sql.push_str(" AND status = ?");
        args.push(Filter::Str(s));
    }
    (where_sql, args)
}

/// Counts and pages rows of `table` as `T`.
async fn paged<T>(
    pool: &MySqlPool,
    table: &str,
    select_sql: &str,
    where_sql: &str,
    args: &[Filter<'_>],
    order_sql: &str,
    page: (u32, u32, u64),
) -> Result<Paginated<T>, sqlx::Error>
where
    T: for<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> + Send + Unpin + Serialize,
{
    let (page, per_page, offset) = page;

    let count_sql = format!("SELECT COUNT(*) FROM {}{}", table, where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for a in args {
        count_q = match a {
            Filter::Str(s) => count_q.bind(*s),
            Filter::Date(d) => count_q.bind(*d),
        };
    }
    let total = count_q.fetch_one(pool).await?;

    let data_sql = format!("{} {} LIMIT ? OFFSET ?", select_sql, order_sql);
    let mut data_q = sqlx::query_as::<_, T>(&data_sql);
    for a in args {
        data_q = match a {
            Filter::Str(s) => data_q.bind(*s),
            Filter::Date(d) => data_q.bind(*d),
        };
    }
    let data = data_q
        .bind(per_page as i64)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    Ok(Paginated {
        data,
        page,
        per_page,
        total,
    })
}

#[utoipa::path(
    get,
    path = "/api/payroll",
    params(PayrollQuery),
    responses((status = 200, description = "Paginated processing rows", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payrolls(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let (where_sql, args) = period_filter(
        query.employee_number.as_deref(),
        query.start_date,
        query.end_date,
        query.status.as_deref(),
    );
    let result = paged::<PayrollProcessing>(
        pool.get_ref(),
        "payroll_processing",
        &processing_sql(&where_sql),
        &where_sql,
        &args,
        "ORDER BY start_date DESC, name",
        paginate(query.page, query.per_page, 20),
    )
    .await?;

    Ok(HttpResponse::Ok().json(result))
}

#[utoipa::path(
    get,
    path = "/api/payroll/{id}",
    params(("id" = u64, Path, description = "Record id")),
    responses(
        (status = 200, body = PayrollProcessing),
        (status = 404, description = "Payroll record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let row = sqlx::query_as::<_, PayrollProcessing>(&processing_sql(" WHERE id = ?"))
        .bind(path.into_inner())
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| ApiError::not_found("Payroll record not found"))?;

    Ok(HttpResponse::Ok().json(row))
}

#[derive(Deserialize, ToSchema)]
pub struct UpdatePayroll {
    pub increment: Option<f64>,
    pub pera: Option<f64>,
    pub withholding_tax: Option<f64>,
    pub days_absent: Option<i32>,
    pub tardiness_minutes: Option<i32>,
    /// Replaces the employee's latest ledger row
    pub remittance: Option<Remittance>,
    pub philhealth_contribution: Option<f64>,
    pub department_code: Option<String>,
}

#[utoipa::path(
    put,
    path = "/api/payroll/{id}",
    params(("id" = u64, Path, description = "Record id")),
    request_body = UpdatePayroll,
    responses(
        (status = 200, description = "Recomputed row", body = PayrollProcessing),
        (status = 400, description = "Finalized payroll cannot be modified or unknown department code"),
        (status = 404, description = "Payroll record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdatePayroll>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let mut tx = pool.begin().await?;

    // 1️⃣ lock the row and check it is still editable
    let current = sqlx::query_as::<_, PayrollProcessing>(&processing_sql(" WHERE id = ? FOR UPDATE"))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Payroll record not found"))?;

    if current.status != PayrollStatus::Processing.as_str() {
        return Err(ApiError::bad_request("Finalized payroll cannot be modified"));
    }
    let f = &current.figures;

    // 2️⃣ write through to the master tables
    if let Some(r) = &payload.remittance {
        upsert_remittance(&mut tx, &f.employee_number, r).await?;
    }
    if let Some(p) = payload.philhealth_contribution {
        if p < 0.0 {
            return Err(ApiError::bad_request("Contribution cannot be negative"));
        }
        upsert_philhealth(&mut tx, &f.employee_number, p).await?;
    }
    let department_code = match payload.department_code.as_deref() {
        Some(raw) => {
            let code = ensure_department(&mut tx, raw).await?;
            upsert_assignment(&mut tx, &f.employee_number, code).await?;
            Some(code.to_string())
        }
        None => f.department_code.clone(),
    };

    // 3️⃣ recompute from the row's own rate and the fresh deductions
    let remittance = latest_remittance(&mut tx, &f.employee_number)
        .await?
        .unwrap_or_default();
    let philhealth = latest_philhealth(&mut tx, &f.employee_number).await?;

    let ctx = PayrollContext {
        employee_number: f.employee_number.clone(),
        name: f.name.clone(),
        department_code,
        position: f.position.clone(),
        start_date: f.start_date,
        end_date: f.end_date,
    };
    let inputs = PayrollInputs {
        rate: f.rate_np,
        increment: payload.increment.unwrap_or(f.increment),
        pera: payload.pera.unwrap_or(f.pera),
        days_absent: payload.days_absent.unwrap_or(f.days_absent),
        tardiness_minutes: payload.tardiness_minutes.unwrap_or(f.tardiness_minutes),
        withholding_tax: payload.withholding_tax.unwrap_or(f.withholding_tax),
        philhealth,
        remittance,
    };
    let figures = build_figures(&ctx, &inputs);

    let sql = format!(
        "UPDATE payroll_processing SET {} WHERE id = ?",
        figure_assignments()
    );
    bind_figures(sqlx::query(&sql), &figures)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "update", "payroll_processing")
            .record(id)
            .target(figures.employee_number.clone()),
    );

    Ok(HttpResponse::Ok().json(PayrollProcessing {
        id,
        figures,
        status: current.status,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/payroll/{id}",
    params(("id" = u64, Path, description = "Record id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 400, description = "Finalized payroll cannot be deleted"),
        (status = 404, description = "Payroll record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn delete_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let status = sqlx::query_scalar::<_, String>("SELECT status FROM payroll_processing WHERE id = ?")
        .bind(id)
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| ApiError::not_found("Payroll record not found"))?;

    if status != PayrollStatus::Processing.as_str() {
        return Err(ApiError::bad_request("Finalized payroll cannot be deleted"));
    }

    let res = sqlx::query("DELETE FROM payroll_processing WHERE id = ? AND status = ?")
        .bind(id)
        .bind(PayrollStatus::Processing.as_str())
        .execute(pool.get_ref())
        .await?;
    if res.rows_affected() == 0 {
        // finalized between the check and the delete
        return Err(ApiError::bad_request("Finalized payroll cannot be deleted"));
    }

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "delete", "payroll_processing").record(id),
    );
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

/// Processing row joined with the employee's current master data.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct PayrollAssembly {
    pub id: u64,
    pub employee_number: String,
    pub name: String,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub status: String,
    pub rate_np: f64,
    pub gross_salary: f64,
    pub total_deductions: f64,
    pub net_salary: f64,
    pub department_code: Option<String>,
    pub item_name: Option<String>,
    pub salary_grade: Option<i32>,
    pub step: Option<i32>,
    pub salary_rate: Option<f64>,
    pub philhealth_contribution: Option<f64>,
    pub remittance_id: Option<u64>,
    pub nhmfc: Option<f64>,
    pub liquidating_cash: Option<f64>,
    pub gsis_salary_loan: Option<f64>,
    pub gsis_policy_loan: Option<f64>,
    pub gsis_arrears: Option<f64>,
    pub cpl: Option<f64>,
    pub mpl: Option<f64>,
    pub mpl_lite: Option<f64>,
    pub emergency_loan: Option<f64>,
    pub pagibig_fund_cont: Option<f64>,
    pub pagibig_2: Option<f64>,
    pub multi_purpose_loan: Option<f64>,
    pub landbank_salary_loan: Option<f64>,
    pub earist_credit_coop: Option<f64>,
    pub feu: Option<f64>,
    pub recorded_days_absent: Option<i32>,
    pub recorded_tardiness_minutes: Option<i64>,
}

const ASSEMBLY_SQL: &str = r#"
    SELECT p.id, p.employee_number, p.name, p.start_date, p.end_date, p.status,
           p.rate_np, p.gross_salary, p.total_deductions, p.net_salary,
           da.department_code,
           it.item_name, it.salary_grade, it.step,
           sg.rate AS salary_rate,
           ph.philhealth_contribution,
           r.id AS remittance_id, r.nhmfc, r.liquidating_cash, r.gsis_salary_loan,
           r.gsis_policy_loan, r.gsis_arrears, r.cpl, r.mpl, r.mpl_lite, r.emergency_loan,
           r.pagibig_fund_cont, r.pagibig_2, r.multi_purpose_loan, r.landbank_salary_loan,
           r.earist_credit_coop, r.feu,
           oa.days_absent AS recorded_days_absent,
           oa.total_tardiness_minutes AS recorded_tardiness_minutes
    FROM payroll_processing p
    LEFT JOIN remittance_table r
        ON r.id = (SELECT MAX(id) FROM remittance_table WHERE employee_number = p.employee_number)
    LEFT JOIN philhealth ph
        ON ph.id = (SELECT MAX(id) FROM philhealth WHERE employee_number = p.employee_number)
    LEFT JOIN department_assignment da
        ON da.id = (SELECT MAX(id) FROM department_assignment WHERE employee_number = p.employee_number)
    LEFT JOIN item_table it
        ON it.id = (SELECT MAX(id) FROM item_table WHERE employee_number = p.employee_number)
    LEFT JOIN salary_grade_table sg
        ON sg.salary_grade = it.salary_grade AND sg.step = it.step
    LEFT JOIN overall_attendance_record oa
        ON oa.person_id = p.employee_number
        AND oa.start_date = p.start_date
        AND oa.end_date = p.end_date
    WHERE 1=1
"#;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AssemblyQuery {
    /// Name or employee number fragment
    pub q: Option<String>,
    pub department_code: Option<String>,
    #[param(value_type = Option<String>, format = "date")]
    pub start_date: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
}

async fn fetch_assembly(
    pool: &MySqlPool,
    query: &AssemblyQuery,
) -> Result<Vec<PayrollAssembly>, sqlx::Error> {
    let mut sql = String::from(ASSEMBLY_SQL);
    let like = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s));

    if like.is_some() {
        sql.push_str(" AND (p.name LIKE ? OR p.employee_number LIKE ?)");
    }
    if query.department_code.is_some() {
        sql.push_str(" AND da.department_code = ?");
    }
    if query.start_date.is_some() {
        sql.push_str(" AND p.start_date >= ?");
    }
    if query.end_date.is_some() {
        sql.push_str(" AND p.end_date <= ?");
    }
    sql.push_str(" ORDER BY p.name");

    let mut q = sqlx::query_as::<_, PayrollAssembly>(&sql);
    if let Some(l) = &like {
        q = q.bind(l).bind(l);
    }
    if let Some(d) = &query.department_code {
        q = q.bind(d);
    }
    if let Some(d) = query.start_date {
        q = q.bind(d);
    }
    if let Some(d) = query.end_date {
        q = q.bind(d);
    }
    q.fetch_all(pool).await
}

#[utoipa::path(
    get,
    path = "/api/payroll/with-remittance",
    params(
        ("start_date" = Option<String>, Query, format = "date"),
        ("end_date" = Option<String>, Query, format = "date")
    ),
    responses((status = 200, body = Vec<PayrollAssembly>)),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn with_remittance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AssemblyQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let period_only = AssemblyQuery {
        start_date: query.start_date,
        end_date: query.end_date,
        ..Default::default()
    };
    let rows = fetch_assembly(pool.get_ref(), &period_only).await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[utoipa::path(
    get,
    path = "/api/payroll/search",
    params(AssemblyQuery),
    responses((status = 200, body = Vec<PayrollAssembly>)),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn search_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AssemblyQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let rows = fetch_assembly(pool.get_ref(), &query).await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[derive(Deserialize, ToSchema)]
pub struct IdsRequest {
    #[schema(example = json!([1, 2, 3]))]
    pub ids: Vec<u64>,
}

impl IdsRequest {
    fn unique(&self) -> ApiResult<Vec<u64>> {
        let ids: BTreeSet<u64> = self.ids.iter().copied().collect();
        if ids.is_empty() {
            return Err(ApiError::bad_request("No records selected"));
        }
        Ok(ids.into_iter().collect())
    }
}

#[derive(sqlx::FromRow)]
struct IdOwner {
    id: u64,
    employee_number: String,
    status: String,
}

fn notify_admins(hub: &NotificationHub, event: &str, payload: serde_json::Value) {
    for role in [Role::Superadmin, Role::Administrator] {
        hub.emit(&role.room(), event, payload.clone());
    }
}

/// Copy processing rows into `payroll_processed` and mark them finalized
#[utoipa::path(
    post,
    path = "/api/payroll/finalize",
    request_body = IdsRequest,
    responses(
        (status = 200, description = "Finalized", body = Object, example = json!({"finalized": 2, "skipped": 1})),
        (status = 400, description = "Nothing to finalize"),
        (status = 404, description = "None of the records exist")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn finalize_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<NotificationHub>,
    payload: web::Json<IdsRequest>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let ids = payload.unique()?;

    let mut tx = pool.begin().await?;

    // 1️⃣ lock the selected rows
    let sql = format!(
        "SELECT id, employee_number, status FROM payroll_processing WHERE id IN ({}) FOR UPDATE",
        placeholders(ids.len())
    );
    let rows = bind_ids(sqlx::query_as::<_, IdOwner>(&sql), &ids)
        .fetch_all(&mut *tx)
        .await?;
    if rows.is_empty() {
        return Err(ApiError::not_found("Payroll records not found"));
    }

    let eligible: Vec<&IdOwner> = rows
        .iter()
        .filter(|r| r.status == PayrollStatus::Processing.as_str())
        .collect();
    if eligible.is_empty() {
        return Err(ApiError::bad_request("All selected records are already finalized"));
    }
    let eligible_ids: Vec<u64> = eligible.iter().map(|r| r.id).collect();
    let marks = placeholders(eligible_ids.len());

    // 2️⃣ copy, then flag the originals
    let copy_sql = format!(
        "INSERT INTO payroll_processed (processing_id, {cols}) \
         SELECT id, {cols} FROM payroll_processing WHERE id IN ({marks})",
        cols = PAYROLL_FIGURE_COLUMNS,
        marks = marks
    );
    let mut copy = sqlx::query(&copy_sql);
    for id in &eligible_ids {
        copy = copy.bind(*id);
    }
    copy.execute(&mut *tx).await?;

    let flag_sql = format!(
        "UPDATE payroll_processing SET status = ? WHERE id IN ({})",
        marks
    );
    let mut flag = sqlx::query(&flag_sql).bind(PayrollStatus::Finalized.as_str());
    for id in &eligible_ids {
        flag = flag.bind(*id);
    }
    flag.execute(&mut *tx).await?;

    tx.commit().await?;

    // 3️⃣ notify and audit
    let employees: HashSet<&str> = eligible.iter().map(|r| r.employee_number.as_str()).collect();
    for emp in &employees {
        hub.emit(emp, PAYROLL_FINALIZED, json!({ "employee_number": emp }));
    }
    notify_admins(&hub, PAYROLL_FINALIZED, json!({ "count": eligible_ids.len() }));

    for r in &eligible {
        audit::log(
            pool.get_ref(),
            AuditEntry::new(&auth, "finalize", "payroll_processing")
                .record(r.id)
                .target(r.employee_number.clone()),
        );
    }

    Ok(HttpResponse::Ok().json(json!({
        "finalized": eligible_ids.len(),
        "skipped": rows.len() - eligible_ids.len()
    })))
}

const PROCESSED_TABLE_SELECT: &str = "SELECT id, processing_id, date_submitted, ";

#[utoipa::path(
    get,
    path = "/api/payroll/processed",
    params(PayrollQuery),
    responses((status = 200, description = "Paginated finalized rows", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_processed(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let (where_sql, args) = period_filter(
        query.employee_number.as_deref(),
        query.start_date,
        query.end_date,
        None,
    );
    let select = format!(
        "{}{} FROM payroll_processed{}",
        PROCESSED_TABLE_SELECT, PAYROLL_FIGURE_COLUMNS, where_sql
    );
    let result = paged::<PayrollProcessed>(
        pool.get_ref(),
        "payroll_processed",
        &select,
        &where_sql,
        &args,
        "ORDER BY date_submitted DESC, name",
        paginate(query.page, query.per_page, 20),
    )
    .await?;

    Ok(HttpResponse::Ok().json(result))
}

/// Un-finalize: remove the processed copy and reopen the processing row
#[utoipa::path(
    delete,
    path = "/api/payroll/processed/{id}",
    params(("id" = u64, Path, description = "Record id")),
    responses(
        (status = 200, description = "Returned to processing"),
        (status = 400, description = "Already released"),
        (status = 404, description = "Processed record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn delete_processed(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let mut tx = pool.begin().await?;

    let processing_id = sqlx::query_scalar::<_, u64>(
        "SELECT processing_id FROM payroll_processed WHERE id = ? FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Processed record not found"))?;

    let released = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM payroll_released WHERE processed_id = ?",
    )
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;
    if released > 0 {
        return Err(ApiError::bad_request("Released payroll cannot be un-finalized"));
    }

    sqlx::query("DELETE FROM payroll_processed WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE payroll_processing SET status = ? WHERE id = ?")
        .bind(PayrollStatus::Processing.as_str())
        .bind(processing_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "unfinalize", "payroll_processed").record(id),
    );
    Ok(HttpResponse::Ok().json(json!({ "message": "Payroll returned to processing" })))
}

#[derive(sqlx::FromRow)]
struct ProcessedOwner {
    id: u64,
    employee_number: String,
}

/// Ids of `selected` that have no released copy yet.
pub fn unreleased(selected: &[u64], already: &HashSet<u64>) -> Vec<u64> {
    selected
        .iter()
        .copied()
        .filter(|id| !already.contains(id))
        .collect()
}

/// Copy processed rows into `payroll_released`
#[utoipa::path(
    post,
    path = "/api/payroll/release",
    request_body = IdsRequest,
    responses(
        (status = 200, description = "Released", body = Object, example = json!({"released": 2, "skipped": 0})),
        (status = 400, description = "All selected records are already released"),
        (status = 404, description = "None of the records exist")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn release_payroll(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<NotificationHub>,
    payload: web::Json<IdsRequest>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let ids = payload.unique()?;

    let mut tx = pool.begin().await?;

    // 1️⃣ which of the selected rows exist and which were released before
    let sql = format!(
        "SELECT id, employee_number FROM payroll_processed WHERE id IN ({}) FOR UPDATE",
        placeholders(ids.len())
    );
    let found = bind_ids(sqlx::query_as::<_, ProcessedOwner>(&sql), &ids)
        .fetch_all(&mut *tx)
        .await?;
    if found.is_empty() {
        return Err(ApiError::not_found("Processed records not found"));
    }
    let found_ids: Vec<u64> = found.iter().map(|r| r.id).collect();

    let sql = format!(
        "SELECT processed_id FROM payroll_released WHERE processed_id IN ({})",
        placeholders(found_ids.len())
    );
    let mut already_q = sqlx::query_scalar::<_, u64>(&sql);
    for id in &found_ids {
        already_q = already_q.bind(*id);
    }
    let already: HashSet<u64> = already_q.fetch_all(&mut *tx).await?.into_iter().collect();

    let to_release = unreleased(&found_ids, &already);
    if to_release.is_empty() {
        return Err(ApiError::bad_request("All selected records are already released"));
    }

    // 2️⃣ copy with the releasing user
    let copy_sql = format!(
        "INSERT INTO payroll_released (processed_id, {cols}, released_by) \
         SELECT id, {cols}, ? FROM payroll_processed WHERE id IN ({marks})",
        cols = PAYROLL_FIGURE_COLUMNS,
        marks = placeholders(to_release.len())
    );
    let mut copy = sqlx::query(&copy_sql).bind(&auth.employee_number);
    for id in &to_release {
        copy = copy.bind(*id);
    }
    copy.execute(&mut *tx).await?;

    tx.commit().await?;

    // 3️⃣ tell each employee their payslip is out
    let released: Vec<&ProcessedOwner> = found
        .iter()
        .filter(|r| to_release.contains(&r.id))
        .collect();
    for r in &released {
        hub.emit(
            &r.employee_number,
            PAYROLL_RELEASED,
            json!({ "processed_id": r.id }),
        );
        audit::log(
            pool.get_ref(),
            AuditEntry::new(&auth, "release", "payroll_processed")
                .record(r.id)
                .target(r.employee_number.clone()),
        );
    }
    notify_admins(&hub, PAYROLL_RELEASED, json!({ "count": to_release.len() }));

    Ok(HttpResponse::Ok().json(json!({
        "released": to_release.len(),
        "skipped": ids.len() - to_release.len()
    })))
}

const RELEASED_SELECT: &str = "SELECT id, processed_id, date_released, released_by, ";

#[utoipa::path(
    get,
    path = "/api/payroll/released",
    params(PayrollQuery),
    responses((status = 200, description = "Paginated released rows", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_released(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PayrollQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let (where_sql, args) = period_filter(
        query.employee_number.as_deref(),
        query.start_date,
        query.end_date,
        None,
    );
    let select = format!(
        "{}{} FROM payroll_released{}",
        RELEASED_SELECT, PAYROLL_FIGURE_COLUMNS, where_sql
    );
    let result = paged::<PayrollReleased>(
        pool.get_ref(),
        "payroll_released",
        &select,
        &where_sql,
        &args,
        "ORDER BY date_released DESC, name",
        paginate(query.page, query.per_page, 20),
    )
    .await?;

    Ok(HttpResponse::Ok().json(result))
}

/// Released payslips of one employee, newest period first
#[utoipa::path(
    get,
    path = "/api/payroll/payslip/{employee_number}",
    params(("employee_number" = String, Path, description = "Employee number")),
    responses(
        (status = 200, body = Vec<PayrollReleased>),
        (status = 403, description = "Staff may only read their own payslips")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn payslip(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let employee_number = path.into_inner();
    auth.require_self_or_admin(&employee_number)?;

    let sql = format!(
        "{}{} FROM payroll_released WHERE employee_number = ? ORDER BY end_date DESC",
        RELEASED_SELECT, PAYROLL_FIGURE_COLUMNS
    );
    let rows = sqlx::query_as::<_, PayrollReleased>(&sql)
        .bind(&employee_number)
        .fetch_all(pool.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> PayrollContext {
        PayrollContext {
            employee_number: "2024-0012".into(),
            name: "Dela Cruz, Maria S.".into(),
            department_code: Some("CCS".into()),
            position: Some("Instructor I".into()),
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
        }
    }

    #[test]
    fn placeholder_lists() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }

    #[test]
    fn column_list_matches_bind_order() {
        assert_eq!(figure_count(), 23);
        let set = figure_assignments();
        assert!(set.starts_with("employee_number = ?, name = ?"));
        assert!(set.ends_with("pay1st = ?, pay2nd = ?"));
        assert!(!set.contains('\n'));
    }

    #[test]
    fn figures_carry_inputs_and_breakdown() {
        let inputs = PayrollInputs {
            rate: 22000.0,
            pera: DEFAULT_PERA,
            days_absent: 1,
            withholding_tax: 500.0,
            ..Default::default()
        };
        let f = build_figures(&ctx(), &inputs);

        assert_eq!(f.rate_np, 22000.0);
        assert_eq!(f.abs_deduction, 1000.0);
        assert_eq!(f.gross_salary, 23000.0);
        assert_eq!(f.personal_life_retirement_ins, 1980.0);
        assert_eq!(f.total_deductions, 2480.0);
        assert_eq!(f.net_salary, 20520.0);
        assert_eq!(f.pay1st + f.pay2nd, f.net_salary);
        assert_eq!(f.department_code.as_deref(), Some("CCS"));
    }

    #[test]
    fn release_skips_already_released_ids() {
        let already: HashSet<u64> = [2, 3].into_iter().collect();
        assert_eq!(unreleased(&[1, 2, 3, 4], &already), vec![1, 4]);
        assert!(unreleased(&[2, 3], &already).is_empty());
    }

    #[test]
    fn empty_selection_is_rejected() {
        let req = IdsRequest { ids: vec![] };
        assert!(req.unique().is_err());
        let req = IdsRequest { ids: vec![3, 1, 3] };
        assert_eq!(req.unique().unwrap(), vec![1, 3]);
    }
}
