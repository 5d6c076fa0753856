use crate::{
    auth::auth::AuthUser,
    core::dtr::{parse_weekday, weekday_name},
    error::{ApiError, ApiResult},
    model::attendance::OfficialTime,
    utils::audit::{self, AuditEntry},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveTime;
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ScheduleDay {
    /// Full or abbreviated weekday name
    #[schema(example = "Monday")]
    pub day: String,
    #[schema(value_type = String, example = "08:00:00")]
    pub official_time_in: NaiveTime,
    #[schema(value_type = Option<String>, example = "12:00:00")]
    pub official_break_start: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "13:00:00")]
    pub official_break_end: Option<NaiveTime>,
    #[schema(value_type = String, example = "17:00:00")]
    pub official_time_out: NaiveTime,
}

/// Normalized weekday name, or a 400 naming the bad entry.
fn validate_day(d: &ScheduleDay) -> Result<&'static str, ApiError> {
    let day = parse_weekday(&d.day)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid day: {}", d.day)))?;

    if d.official_time_in >= d.official_time_out {
        return Err(ApiError::bad_request(format!(
            "{}: time in must be before time out",
            weekday_name(day)
        )));
    }
    if d.official_break_start.is_some() != d.official_break_end.is_some() {
        return Err(ApiError::bad_request(format!(
            "{}: break start and break end go together",
            weekday_name(day)
        )));
    }
    Ok(weekday_name(day))
}

/// Weekly schedule of an employee
#[utoipa::path(
    get,
    path = "/api/official-time/{employee_number}",
    params(("employee_number" = String, Path, description = "Employee number")),
    responses((status = 200, body = Vec<OfficialTime>)),
    security(("bearer_auth" = [])),
    tag = "Official Time"
)]
pub async fn get_schedule(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let employee_number = path.into_inner();
    auth.require_self_or_admin(&employee_number)?;

    let rows = sqlx::query_as::<_, OfficialTime>(
        r#"
        SELECT id, employee_number, day, official_time_in, official_break_start,
               official_break_end, official_time_out
        FROM officialtime
        WHERE employee_number = ?
        ORDER BY FIELD(day, 'Monday','Tuesday','Wednesday','Thursday','Friday','Saturday','Sunday')
        "#,
    )
    .bind(&employee_number)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(rows))
}

/// Replace or upsert the weekly schedule
#[utoipa::path(
    put,
    path = "/api/official-time/{employee_number}",
    params(("employee_number" = String, Path, description = "Employee number")),
    request_body = Vec<ScheduleDay>,
    responses(
        (status = 200, description = "Schedule saved"),
        (status = 400, description = "Invalid day or times")
    ),
    security(("bearer_auth" = [])),
    tag = "Official Time"
)]
pub async fn save_schedule(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
    payload: web::Json<Vec<ScheduleDay>>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let employee_number = path.into_inner();

    // 1️⃣ validate every entry before touching the table
    let mut days = Vec::with_capacity(payload.len());
    for entry in payload.iter() {
        days.push((validate_day(entry)?, entry));
    }
    if days.is_empty() {
        return Err(ApiError::bad_request("Schedule is empty"));
    }

    // 2️⃣ upsert per weekday in one transaction
    let mut tx = pool.begin().await?;
    for (day, entry) in &days {
        sqlx::query(
            r#"
            INSERT INTO officialtime
                (employee_number, day, official_time_in, official_break_start,
                 official_break_end, official_time_out)
            VALUES (?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                official_time_in = VALUES(official_time_in),
                official_break_start = VALUES(official_break_start),
                official_break_end = VALUES(official_break_end),
                official_time_out = VALUES(official_time_out)
            "#,
        )
        .bind(&employee_number)
        .bind(*day)
        .bind(entry.official_time_in)
        .bind(entry.official_break_start)
        .bind(entry.official_break_end)
        .bind(entry.official_time_out)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "update", "officialtime").target(employee_number.clone()),
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Official time saved",
        "days": days.len()
    })))
}

/// Delete one weekday entry
#[utoipa::path(
    delete,
    path = "/api/official-time/entry/{id}",
    params(("id" = u64, Path, description = "Record id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Entry not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Official Time"
)]
pub async fn delete_schedule_day(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let res = sqlx::query("DELETE FROM officialtime WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("Official time entry not found"));
    }

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "delete", "officialtime").record(id),
    );
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(day: &str, tin: (u32, u32), tout: (u32, u32)) -> ScheduleDay {
        ScheduleDay {
            day: day.to_string(),
            official_time_in: NaiveTime::from_hms_opt(tin.0, tin.1, 0).unwrap(),
            official_break_start: None,
            official_break_end: None,
            official_time_out: NaiveTime::from_hms_opt(tout.0, tout.1, 0).unwrap(),
        }
    }

    #[test]
    fn normalizes_day_names() {
        assert_eq!(validate_day(&entry("mon", (8, 0), (17, 0))).unwrap(), "Monday");
        assert_eq!(validate_day(&entry("FRIDAY", (8, 0), (17, 0))).unwrap(), "Friday");
    }

    #[test]
    fn rejects_inverted_hours_and_unknown_days() {
        assert!(validate_day(&entry("Monday", (17, 0), (8, 0))).is_err());
        assert!(validate_day(&entry("Funday", (8, 0), (17, 0))).is_err());
    }

    #[test]
    fn rejects_half_a_break() {
        let mut e = entry("Tue", (8, 0), (17, 0));
        e.official_break_start = NaiveTime::from_hms_opt(12, 0, 0);
        assert!(validate_day(&e).is_err());
    }
}
