use crate::{
    auth::auth::AuthUser,
    core::{
        dtr::{DayPunches, weekday_name},
        punches::compile_punches,
    },
    error::{ApiError, ApiResult, is_deadlock, is_duplicate_key},
    model::attendance::{AttendancePunch, AttendanceRecord},
    models::RowOutcome,
    utils::{
        audit::{self, AuditEntry},
        db_utils::{build_update_sql, execute_update},
        notify::{ATTENDANCE_CHANGED, NotificationHub},
    },
};
use actix_web::{HttpResponse, web};
use chrono::{Datelike, Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sqlx::{MySqlConnection, MySqlPool};
use std::collections::BTreeMap;
use strum::{Display, IntoStaticStr};
use utoipa::{IntoParams, ToSchema};

const RECORD_COLUMNS: &str = "id, person_id, date, day, time_in, break_in, break_out, time_out";

/// Result of saving one (person, date) row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum SaveOutcome {
    Inserted,
    Updated,
    Unchanged,
}

impl SaveOutcome {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// What saving `incoming` over the `stored` punches of a day amounts to.
pub fn day_outcome(stored: Option<&DayPunches>, incoming: &DayPunches) -> SaveOutcome {
    match stored {
        None => SaveOutcome::Inserted,
        Some(current) if current == incoming => SaveOutcome::Unchanged,
        Some(_) => SaveOutcome::Updated,
    }
}

/// Upsert keyed by the UNIQUE (person_id, date) index. The insert goes first
/// so a missing day never takes a gap lock; an existing day is then locked by
/// row and compared.
pub async fn save_day(
    conn: &mut MySqlConnection,
    person_id: &str,
    date: NaiveDate,
    punches: &DayPunches,
) -> Result<SaveOutcome, sqlx::Error> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO attendance_record (person_id, date, day, time_in, break_in, break_out, time_out)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(person_id)
    .bind(date)
    .bind(weekday_name(date.weekday()))
    .bind(punches.time_in)
    .bind(punches.break_in)
    .bind(punches.break_out)
    .bind(punches.time_out)
    .execute(&mut *conn)
    .await;

    match inserted {
        Ok(_) => return Ok(day_outcome(None, punches)),
        Err(e) if is_duplicate_key(&e) => {}
        Err(e) => return Err(e),
    }

    let row = sqlx::query_as::<_, AttendanceRecord>(&format!(
        "SELECT {} FROM attendance_record WHERE person_id = ? AND date = ? FOR UPDATE",
        RECORD_COLUMNS
    ))
    .bind(person_id)
    .bind(date)
    .fetch_one(&mut *conn)
    .await?;

    let stored = DayPunches {
        time_in: row.time_in,
        break_in: row.break_in,
        break_out: row.break_out,
        time_out: row.time_out,
    };
    let outcome = day_outcome(Some(&stored), punches);
    if outcome == SaveOutcome::Updated {
        update_day(conn, row.id, punches).await?;
    }
    Ok(outcome)
}

const SAVE_ATTEMPTS: usize = 3;

/// `save_day` in its own transaction, replayed when InnoDB picks it as a
/// deadlock victim.
pub async fn save_day_committed(
    pool: &MySqlPool,
    person_id: &str,
    date: NaiveDate,
    punches: &DayPunches,
) -> Result<SaveOutcome, sqlx::Error> {
    let mut attempt = 1;
    loop {
        let mut tx = pool.begin().await?;
        let result = match save_day(&mut tx, person_id, date, punches).await {
            Ok(outcome) => tx.commit().await.map(|_| outcome),
            Err(e) => Err(e),
        };
        match result {
            Err(e) if is_deadlock(&e) && attempt < SAVE_ATTEMPTS => {
                tracing::warn!(%person_id, %date, attempt, "Deadlock saving attendance, retrying");
                attempt += 1;
            }
            other => return other,
        }
    }
}

async fn update_day(
    conn: &mut MySqlConnection,
    id: u64,
    punches: &DayPunches,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE attendance_record
        SET time_in = ?, break_in = ?, break_out = ?, time_out = ?
        WHERE id = ?
        "#,
    )
    .bind(punches.time_in)
    .bind(punches.break_in)
    .bind(punches.break_out)
    .bind(punches.time_out)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AttendanceInput {
    #[schema(example = "2024-0012")]
    pub person_id: String,
    #[schema(value_type = String, format = "date", example = "2024-03-04")]
    pub date: NaiveDate,
    #[schema(value_type = Option<String>, example = "08:00:00")]
    pub time_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "12:00:00")]
    pub break_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "13:00:00")]
    pub break_out: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "17:00:00")]
    pub time_out: Option<NaiveTime>,
}

impl AttendanceInput {
    fn punches(&self) -> DayPunches {
        DayPunches {
            time_in: self.time_in,
            break_in: self.break_in,
            break_out: self.break_out,
            time_out: self.time_out,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    /// Staff users always get their own records
    pub person_id: Option<String>,
    #[param(value_type = Option<String>, format = "date")]
    pub start_date: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
}

/// Person filter for list endpoints; staff never see other people.
fn scoped_person(auth: &AuthUser, requested: Option<&str>) -> Option<String> {
    if auth.role.is_admin() {
        requested.map(str::to_string)
    } else {
        Some(auth.employee_number.clone())
    }
}

/// Tells the owner's room that one day record changed.
fn notify_day(hub: &NotificationHub, person_id: &str, date: NaiveDate, action: &str) {
    hub.emit(
        person_id,
        ATTENDANCE_CHANGED,
        json!({ "date": date, "action": action }),
    );
}

const PUNCH_COLUMNS: &[&str] = &["time_in", "break_in", "break_out", "time_out"];

/// List day records
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses((status = 200, body = Vec<AttendanceRecord>)),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> ApiResult<HttpResponse> {
    let person = scoped_person(&auth, query.person_id.as_deref());

    let mut sql = format!("SELECT {} FROM attendance_record WHERE 1=1", RECORD_COLUMNS);
    if person.is_some() {
        sql.push_str(" AND person_id = ?");
    }
    if query.start_date.is_some() {
        sql.push_str(" AND date >= ?");
    }
    if query.end_date.is_some() {
        sql.push_str(" AND date <= ?");
    }
    sql.push_str(" ORDER BY person_id, date");

    let mut q = sqlx::query_as::<_, AttendanceRecord>(&sql);
    if let Some(p) = &person {
        q = q.bind(p);
    }
    if let Some(d) = query.start_date {
        q = q.bind(d);
    }
    if let Some(d) = query.end_date {
        q = q.bind(d);
    }

    let rows = q.fetch_all(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(rows))
}

/// Create a day record
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = AttendanceInput,
    responses(
        (status = 201, description = "Created"),
        (status = 409, description = "A record for this person and date already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn create_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<NotificationHub>,
    payload: web::Json<AttendanceInput>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let p = payload.punches();
    let result = sqlx::query(
        r#"
        INSERT INTO attendance_record (person_id, date, day, time_in, break_in, break_out, time_out)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&payload.person_id)
    .bind(payload.date)
    .bind(weekday_name(payload.date.weekday()))
    .bind(p.time_in)
    .bind(p.break_in)
    .bind(p.break_out)
    .bind(p.time_out)
    .execute(pool.get_ref())
    .await;

    let id = match result {
        Ok(res) => res.last_insert_id(),
        Err(e) if is_duplicate_key(&e) => {
            return Err(ApiError::conflict(
                "Attendance record already exists for this person and date",
            ));
        }
        Err(e) => return Err(e.into()),
    };

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "create", "attendance_record")
            .record(id)
            .target(payload.person_id.clone()),
    );
    notify_day(&hub, &payload.person_id, payload.date, "created");

    Ok(HttpResponse::Created().json(json!({ "message": "Attendance record created", "id": id })))
}

async fn record_owner(
    pool: &MySqlPool,
    id: u64,
) -> Result<Option<(String, NaiveDate)>, sqlx::Error> {
    sqlx::query_as::<_, (String, NaiveDate)>(
        "SELECT person_id, date FROM attendance_record WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Update punches of a day record
#[utoipa::path(
    put,
    path = "/api/attendance/{id}",
    params(("id" = u64, Path, description = "Record id")),
    request_body = Object,
    responses(
        (status = 200, description = "Updated"),
        (status = 400, description = "Empty payload or column not updatable"),
        (status = 404, description = "Attendance record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn update_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<NotificationHub>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let update = build_update_sql(
        "attendance_record",
        &body,
        PUNCH_COLUMNS,
        PUNCH_COLUMNS,
        "id",
        id,
    )?;

    let (person_id, date) = record_owner(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Attendance record not found"))?;
    execute_update(pool.get_ref(), update).await?;

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "update", "attendance_record")
            .record(id)
            .target(person_id.clone()),
    );
    notify_day(&hub, &person_id, date, "updated");
    Ok(HttpResponse::Ok().json(json!({ "message": "Attendance record updated" })))
}

/// Delete a day record
#[utoipa::path(
    delete,
    path = "/api/attendance/{id}",
    params(("id" = u64, Path, description = "Record id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Attendance record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn delete_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<NotificationHub>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let (person_id, date) = record_owner(pool.get_ref(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Attendance record not found"))?;

    let res = sqlx::query("DELETE FROM attendance_record WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("Attendance record not found"));
    }

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "delete", "attendance_record")
            .record(id)
            .target(person_id.clone()),
    );
    notify_day(&hub, &person_id, date, "deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

/// Insert, update or leave untouched the record for (person, date)
#[utoipa::path(
    post,
    path = "/api/attendance/auto-save",
    request_body = AttendanceInput,
    responses(
        (status = 200, description = "Saved", body = Object, example = json!({"status": "unchanged"}))
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn auto_save(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<NotificationHub>,
    payload: web::Json<AttendanceInput>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    if payload.person_id.trim().is_empty() {
        return Err(ApiError::bad_request("person_id is required"));
    }

    let outcome = save_day_committed(
        pool.get_ref(),
        payload.person_id.trim(),
        payload.date,
        &payload.punches(),
    )
    .await?;

    if outcome != SaveOutcome::Unchanged {
        audit::log(
            pool.get_ref(),
            AuditEntry::new(&auth, outcome.as_str(), "attendance_record")
                .target(payload.person_id.trim()),
        );
        notify_day(&hub, payload.person_id.trim(), payload.date, outcome.as_str());
    }

    Ok(HttpResponse::Ok().json(json!({ "status": outcome.as_str() })))
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    person_id: String,
    date: String,
    time_in: Option<String>,
    break_in: Option<String>,
    break_out: Option<String>,
    time_out: Option<String>,
}

pub fn parse_time_cell(cell: Option<&str>) -> Result<Option<NaiveTime>, String> {
    match cell.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .map(Some)
            .map_err(|_| format!("Invalid time: {s}")),
    }
}

/// A parsed CSV line, or the line number and why it was rejected.
pub type ParsedRow = Result<(String, NaiveDate, DayPunches), (usize, String)>;

/// Header: `person_id,date,time_in,break_in,break_out,time_out`.
pub fn parse_attendance_csv(data: &[u8]) -> Vec<ParsedRow> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data);

    let rows = reader
        .deserialize::<CsvRow>()
        .enumerate()
        .map(|(i, row)| {
            // header is line 1
            let line = i + 2;
            let row = row.map_err(|e| (line, e.to_string()))?;

            if row.person_id.is_empty() {
                return Err((line, "person_id is required".to_string()));
            }
            let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d")
                .map_err(|_| (line, format!("Invalid date: {}", row.date)))?;

            let punches = DayPunches {
                time_in: parse_time_cell(row.time_in.as_deref()).map_err(|e| (line, e))?,
                break_in: parse_time_cell(row.break_in.as_deref()).map_err(|e| (line, e))?,
                break_out: parse_time_cell(row.break_out.as_deref()).map_err(|e| (line, e))?,
                time_out: parse_time_cell(row.time_out.as_deref()).map_err(|e| (line, e))?,
            };

            Ok((row.person_id, date, punches))
        })
        .collect();
    rows
}

#[derive(Serialize, ToSchema)]
pub struct ImportResponse {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub results: Vec<RowOutcome>,
}

impl ImportResponse {
    fn from_results(results: Vec<RowOutcome>) -> Self {
        let count = |s: &str| results.iter().filter(|r| r.status == s).count();
        Self {
            inserted: count("inserted"),
            updated: count("updated"),
            unchanged: count("unchanged"),
            failed: count("error"),
            results,
        }
    }
}

/// Bulk import day records from CSV
#[utoipa::path(
    post,
    path = "/api/attendance/import",
    request_body(content = String, content_type = "text/csv",
        description = "person_id,date,time_in,break_in,break_out,time_out"),
    responses(
        (status = 200, description = "Per-row outcomes", body = ImportResponse),
        (status = 400, description = "Empty upload"),
        (status = 413, description = "Upload too large")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn import_csv(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<NotificationHub>,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    if body.is_empty() {
        return Err(ApiError::bad_request("Empty upload"));
    }

    let mut results = Vec::new();
    let mut changed: BTreeMap<String, Vec<NaiveDate>> = BTreeMap::new();
    for parsed in parse_attendance_csv(&body) {
        let (person_id, date, punches) = match parsed {
            Ok(row) => row,
            Err((line, msg)) => {
                results.push(RowOutcome::failed(format!("line {line}"), msg));
                continue;
            }
        };

        let key = format!("{person_id}@{date}");
        match save_day_committed(pool.get_ref(), &person_id, date, &punches).await {
            Ok(outcome) => {
                if outcome != SaveOutcome::Unchanged {
                    changed.entry(person_id.clone()).or_default().push(date);
                }
                results.push(RowOutcome::ok(key, outcome.as_str()));
            }
            Err(e) => {
                tracing::error!(error = %e, %person_id, %date, "Attendance import row failed");
                results.push(RowOutcome::failed(key, "Database error"));
            }
        }
    }

    let response = ImportResponse::from_results(results);
    tracing::info!(
        inserted = response.inserted,
        updated = response.updated,
        failed = response.failed,
        "Attendance import finished"
    );
    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "import", "attendance_record"),
    );
    for (person_id, dates) in changed {
        hub.emit(
            &person_id,
            ATTENDANCE_CHANGED,
            json!({ "dates": dates, "action": "imported" }),
        );
    }

    Ok(HttpResponse::Ok().json(response))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewPunch {
    pub person_id: String,
    #[schema(value_type = String, format = "date")]
    pub punch_date: NaiveDate,
    #[schema(value_type = String, example = "07:58:12")]
    pub punch_time: NaiveTime,
    pub device_id: Option<String>,
}

/// Store raw device punches
#[utoipa::path(
    post,
    path = "/api/attendance/raw",
    request_body = Vec<NewPunch>,
    responses((status = 201, description = "Stored", body = Object, example = json!({"inserted": 4}))),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn add_punches(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<Vec<NewPunch>>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    if payload.is_empty() {
        return Err(ApiError::bad_request("No punches provided"));
    }

    let mut tx = pool.begin().await?;
    for p in payload.iter() {
        sqlx::query(
            r#"
            INSERT INTO attendance_record_info (person_id, punch_date, punch_time, device_id)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(p.person_id.trim())
        .bind(p.punch_date)
        .bind(p.punch_time)
        .bind(&p.device_id)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "create", "attendance_record_info"),
    );
    Ok(HttpResponse::Created().json(json!({ "inserted": payload.len() })))
}

/// List raw device punches
#[utoipa::path(
    get,
    path = "/api/attendance/raw",
    params(AttendanceQuery),
    responses((status = 200, body = Vec<AttendancePunch>)),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_punches(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceQuery>,
) -> ApiResult<HttpResponse> {
    let person = scoped_person(&auth, query.person_id.as_deref());
    let rows = fetch_punches(pool.get_ref(), person.as_deref(), query.start_date, query.end_date)
        .await?;
    Ok(HttpResponse::Ok().json(rows))
}

async fn fetch_punches(
    pool: &MySqlPool,
    person: Option<&str>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Vec<AttendancePunch>, sqlx::Error> {
    let mut sql = String::from(
        "SELECT id, person_id, punch_date, punch_time, device_id FROM attendance_record_info WHERE 1=1",
    );
    if person.is_some() {
        sql.push_str(" AND person_id = ?");
    }
    if start.is_some() {
        sql.push_str(" AND punch_date >= ?");
    }
    if end.is_some() {
        sql.push_str(" AND punch_date <= ?");
    }
    sql.push_str(" ORDER BY person_id, punch_date, punch_time");

    let mut q = sqlx::query_as::<_, AttendancePunch>(&sql);
    if let Some(p) = person {
        q = q.bind(p);
    }
    if let Some(d) = start {
        q = q.bind(d);
    }
    if let Some(d) = end {
        q = q.bind(d);
    }
    q.fetch_all(pool).await
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CompileRequest {
    /// All people when omitted
    pub person_id: Option<String>,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
}

/// Compile raw punches into day records
#[utoipa::path(
    post,
    path = "/api/attendance/compile",
    request_body = CompileRequest,
    responses(
        (status = 200, description = "Per-day outcomes", body = ImportResponse),
        (status = 400, description = "start_date after end_date")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn compile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<NotificationHub>,
    payload: web::Json<CompileRequest>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    if payload.start_date > payload.end_date {
        return Err(ApiError::bad_request("start_date cannot be after end_date"));
    }

    let punches = fetch_punches(
        pool.get_ref(),
        payload.person_id.as_deref(),
        Some(payload.start_date),
        Some(payload.end_date),
    )
    .await?;

    let days = compile_punches(
        punches
            .into_iter()
            .map(|p| (p.person_id, p.punch_date, p.punch_time)),
    );

    let mut results = Vec::with_capacity(days.len());
    let mut tx = pool.begin().await?;
    for ((person_id, date), day) in &days {
        let outcome = save_day(&mut tx, person_id, *date, day).await?;
        results.push(RowOutcome::ok(format!("{person_id}@{date}"), outcome.as_str()));
    }
    tx.commit().await?;

    let mut touched: Vec<&String> = days.keys().map(|(p, _)| p).collect();
    touched.dedup();
    for person in touched {
        hub.emit(
            person,
            ATTENDANCE_CHANGED,
            json!({ "start_date": payload.start_date, "end_date": payload.end_date, "action": "compiled" }),
        );
    }

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "compile", "attendance_record"),
    );
    Ok(HttpResponse::Ok().json(ImportResponse::from_results(results)))
}

/// Self-service check-in for today
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    responses(
        (status = 200, description = "Checked in successfully", body = Object, example = json!({
            "message": "Checked in successfully"
        })),
        (status = 409, description = "Already checked in today"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<NotificationHub>,
) -> ApiResult<HttpResponse> {
    let today = Local::now().date_naive();
    let result = sqlx::query(
        r#"
        INSERT INTO attendance_record (person_id, date, day, time_in)
        VALUES (?, ?, ?, CURTIME())
        "#,
    )
    .bind(&auth.employee_number)
    .bind(today)
    .bind(weekday_name(today.weekday()))
    .execute(pool.get_ref())
    .await;

    match result {
        Ok(_) => {
            notify_day(&hub, &auth.employee_number, today, "checked_in");
            Ok(HttpResponse::Ok().json(json!({ "message": "Checked in successfully" })))
        }
        Err(e) if is_duplicate_key(&e) => Err(ApiError::conflict("Already checked in today")),
        Err(e) => {
            tracing::error!(error = %e, employee_number = %auth.employee_number, "Check-in failed");
            Err(e.into())
        }
    }
}

/// Self-service check-out for today
#[utoipa::path(
    put,
    path = "/api/attendance/check-out",
    responses(
        (status = 200, description = "Checked out successfully"),
        (status = 400, description = "No active check-in found for today")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<NotificationHub>,
) -> ApiResult<HttpResponse> {
    let today = Local::now().date_naive();
    let result = sqlx::query(
        r#"
        UPDATE attendance_record
        SET time_out = CURTIME()
        WHERE person_id = ?
        AND date = ?
        AND time_out IS NULL
        "#,
    )
    .bind(&auth.employee_number)
    .bind(today)
    .execute(pool.get_ref())
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("No active check-in found for today"));
    }
    notify_day(&hub, &auth.employee_number, today, "checked_out");

    Ok(HttpResponse::Ok().json(json!({ "message": "Checked out successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn parses_valid_rows_and_reports_bad_ones_by_line() {
        let csv = b"person_id,date,time_in,break_in,break_out,time_out\n\
            2024-0012,2024-03-04,08:00,12:00,13:00,17:00\n\
            2024-0012,2024-13-01,08:00,,,17:00\n\
            2024-0013,2024-03-04,8:05:30,,,\n\
            ,2024-03-04,08:00,,,17:00\n";

        let rows = parse_attendance_csv(csv);
        assert_eq!(rows.len(), 4);

        let (person, date, p) = rows[0].as_ref().unwrap();
        assert_eq!(person, "2024-0012");
        assert_eq!(*date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(p.time_in, Some(t(8, 0)));
        assert_eq!(p.break_out, Some(t(13, 0)));

        assert_eq!(rows[1].as_ref().unwrap_err().0, 3);

        let (_, _, p) = rows[2].as_ref().unwrap();
        assert_eq!(p.time_in, NaiveTime::from_hms_opt(8, 5, 30));
        assert_eq!(p.time_out, None);

        assert_eq!(rows[3].as_ref().unwrap_err().0, 5);
    }

    #[test]
    fn rejects_garbage_time() {
        assert!(parse_time_cell(Some("25:99")).is_err());
        assert_eq!(parse_time_cell(Some("  ")).unwrap(), None);
        assert_eq!(parse_time_cell(None).unwrap(), None);
    }

    #[test]
    fn import_summary_counts_by_status() {
        let r = ImportResponse::from_results(vec![
            RowOutcome::ok("a", "inserted"),
            RowOutcome::ok("b", "unchanged"),
            RowOutcome::ok("c", "inserted"),
            RowOutcome::failed("d", "bad"),
        ]);
        assert_eq!((r.inserted, r.updated, r.unchanged, r.failed), (2, 0, 1, 1));
    }

    #[test]
    fn save_outcome_strings() {
        assert_eq!(SaveOutcome::Inserted.as_str(), "inserted");
        assert_eq!(SaveOutcome::Unchanged.to_string(), "unchanged");
    }

    #[test]
    fn new_day_is_inserted() {
        let incoming = DayPunches {
            time_in: Some(t(8, 0)),
            ..Default::default()
        };
        assert_eq!(day_outcome(None, &incoming), SaveOutcome::Inserted);
    }

    #[test]
    fn identical_punches_are_unchanged() {
        let day = DayPunches {
            time_in: Some(t(8, 0)),
            break_in: Some(t(12, 0)),
            break_out: Some(t(13, 0)),
            time_out: Some(t(17, 0)),
        };
        assert_eq!(day_outcome(Some(&day), &day.clone()), SaveOutcome::Unchanged);
    }

    #[test]
    fn filling_an_empty_punch_is_an_update() {
        let stored = DayPunches {
            time_in: Some(t(8, 0)),
            ..Default::default()
        };
        let incoming = DayPunches {
            time_out: Some(t(17, 0)),
            ..stored
        };
        assert_eq!(day_outcome(Some(&stored), &incoming), SaveOutcome::Updated);

        // clearing a punch counts as a change too
        assert_eq!(
            day_outcome(Some(&incoming), &DayPunches::default()),
            SaveOutcome::Updated
        );
    }

    #[test]
    fn day_changes_reach_the_owner_only() {
        let hub = NotificationHub::new();
        let mut owner = hub.subscribe(&["2024-0012".into()]);
        let mut other = hub.subscribe(&["2024-0013".into()]);
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();

        notify_day(&hub, "2024-0012", date, "deleted");

        let note = owner.try_next().unwrap().unwrap();
        assert_eq!(note.event, ATTENDANCE_CHANGED);
        assert_eq!(note.payload["date"], "2024-03-04");
        assert_eq!(note.payload["action"], "deleted");
        assert!(other.try_next().is_err());
    }
}
