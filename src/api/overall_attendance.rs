use crate::{
    auth::auth::AuthUser,
    core::dtr::{DayPunches, PeriodTotals, Schedule, parse_weekday, period_totals},
    error::{ApiError, ApiResult},
    model::attendance::{AttendanceRecord, OfficialTime, OverallAttendance},
    models::{Paginated, paginate},
    utils::{
        audit::{self, AuditEntry},
        db_utils::{build_update_sql, execute_update},
    },
};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Weekday};
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::MySqlPool;
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};

const OVERALL_COLUMNS: &str = "id, person_id, start_date, end_date, days_present, days_absent, \
    total_rendered_minutes, total_late_minutes, total_undertime_minutes, \
    total_tardiness_minutes, total_overtime_minutes, total_honorarium_hours, \
    total_service_credit_hours";

const UPDATABLE: &[&str] = &[
    "days_present",
    "days_absent",
    "total_rendered_minutes",
    "total_late_minutes",
    "total_undertime_minutes",
    "total_tardiness_minutes",
    "total_overtime_minutes",
    "total_honorarium_hours",
    "total_service_credit_hours",
];

pub fn schedule_map(rows: &[OfficialTime]) -> HashMap<Weekday, Schedule> {
    rows.iter()
        .filter_map(|r| {
            let day = parse_weekday(&r.day)?;
            Some((
                day,
                Schedule {
                    time_in: r.official_time_in,
                    break_start: r.official_break_start,
                    break_end: r.official_break_end,
                    time_out: r.official_time_out,
                },
            ))
        })
        .collect()
}

pub fn record_map(rows: &[AttendanceRecord]) -> HashMap<NaiveDate, DayPunches> {
    rows.iter()
        .map(|r| {
            (
                r.date,
                DayPunches {
                    time_in: r.time_in,
                    break_in: r.break_in,
                    break_out: r.break_out,
                    time_out: r.time_out,
                },
            )
        })
        .collect()
}

/// Totals for one person over `[start, end]` from stored day records and schedule.
pub async fn compute_totals(
    pool: &MySqlPool,
    person_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PeriodTotals, sqlx::Error> {
    let schedule = sqlx::query_as::<_, OfficialTime>(
        r#"
        SELECT id, employee_number, day, official_time_in, official_break_start,
               official_break_end, official_time_out
        FROM officialtime
        WHERE employee_number = ?
        "#,
    )
    .bind(person_id)
    .fetch_all(pool)
    .await?;

    let records = sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT id, person_id, date, day, time_in, break_in, break_out, time_out
        FROM attendance_record
        WHERE person_id = ? AND date BETWEEN ? AND ?
        "#,
    )
    .bind(person_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(period_totals(
        start,
        end,
        &schedule_map(&schedule),
        &record_map(&records),
    ))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ComputeRequest {
    #[schema(example = "2024-0012")]
    pub person_id: String,
    #[schema(value_type = String, format = "date", example = "2024-03-01")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date", example = "2024-03-15")]
    pub end_date: NaiveDate,
    pub honorarium_hours: Option<f64>,
    pub service_credit_hours: Option<f64>,
}

/// Compute and store period totals
#[utoipa::path(
    post,
    path = "/api/overall-attendance/compute",
    request_body = ComputeRequest,
    responses(
        (status = 200, description = "Stored totals", body = OverallAttendance),
        (status = 400, description = "start_date after end_date")
    ),
    security(("bearer_auth" = [])),
    tag = "Overall Attendance"
)]
pub async fn compute(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ComputeRequest>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    if payload.start_date > payload.end_date {
        return Err(ApiError::bad_request("start_date cannot be after end_date"));
    }

    let t = compute_totals(
        pool.get_ref(),
        &payload.person_id,
        payload.start_date,
        payload.end_date,
    )
    .await?;

    sqlx::query(
        r#"
        INSERT INTO overall_attendance_record
            (person_id, start_date, end_date, days_present, days_absent,
             total_rendered_minutes, total_late_minutes, total_undertime_minutes,
             total_tardiness_minutes, total_overtime_minutes,
             total_honorarium_hours, total_service_credit_hours)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            days_present = VALUES(days_present),
            days_absent = VALUES(days_absent),
            total_rendered_minutes = VALUES(total_rendered_minutes),
            total_late_minutes = VALUES(total_late_minutes),
            total_undertime_minutes = VALUES(total_undertime_minutes),
            total_tardiness_minutes = VALUES(total_tardiness_minutes),
            total_overtime_minutes = VALUES(total_overtime_minutes),
            total_honorarium_hours = VALUES(total_honorarium_hours),
            total_service_credit_hours = VALUES(total_service_credit_hours)
        "#,
    )
    .bind(&payload.person_id)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(t.days_present)
    .bind(t.days_absent)
    .bind(t.rendered)
    .bind(t.late)
    .bind(t.undertime)
    .bind(t.tardiness)
    .bind(t.overtime)
    .bind(payload.honorarium_hours.unwrap_or(0.0))
    .bind(payload.service_credit_hours.unwrap_or(0.0))
    .execute(pool.get_ref())
    .await?;

    let stored = sqlx::query_as::<_, OverallAttendance>(&format!(
        "SELECT {} FROM overall_attendance_record WHERE person_id = ? AND start_date = ? AND end_date = ?",
        OVERALL_COLUMNS
    ))
    .bind(&payload.person_id)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .fetch_one(pool.get_ref())
    .await?;

    tracing::info!(
        person_id = %payload.person_id,
        days_absent = t.days_absent,
        tardiness = t.tardiness,
        "Overall attendance computed"
    );
    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "compute", "overall_attendance_record")
            .record(stored.id)
            .target(payload.person_id.clone()),
    );

    Ok(HttpResponse::Ok().json(stored))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OverallQuery {
    pub person_id: Option<String>,
    #[param(value_type = Option<String>, format = "date")]
    pub start_date: Option<NaiveDate>,
    #[param(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// List period totals
#[utoipa::path(
    get,
    path = "/api/overall-attendance",
    params(OverallQuery),
    responses((status = 200, description = "Paginated totals", body = Object)),
    security(("bearer_auth" = [])),
    tag = "Overall Attendance"
)]
pub async fn list_overall(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<OverallQuery>,
) -> ApiResult<HttpResponse> {
    let person = if auth.role.is_admin() {
        query.person_id.clone()
    } else {
        Some(auth.employee_number.clone())
    };
    let (page, per_page, offset) = paginate(query.page, query.per_page, 20);

    let mut where_sql = String::from(" WHERE 1=1");
    if person.is_some() {
        where_sql.push_str(" AND person_id = ?");
    }
    if query.start_date.is_some() {
        where_sql.push_str(" AND start_date >= ?");
    }
    if query.end_date.is_some() {
        where_sql.push_str(" AND end_date <= ?");
    }

    let count_sql = format!("SELECT COUNT(*) FROM overall_attendance_record{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(p) = &person {
        count_q = count_q.bind(p);
    }
    if let Some(d) = query.start_date {
        count_q = count_q.bind(d);
    }
    if let Some(d) = query.end_date {
        count_q = count_q.bind(d);
    }
    let total = count_q.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        "SELECT {} FROM overall_attendance_record{} ORDER BY start_date DESC, person_id LIMIT ? OFFSET ?",
        OVERALL_COLUMNS, where_sql
    );
    let mut data_q = sqlx::query_as::<_, OverallAttendance>(&data_sql);
    if let Some(p) = &person {
        data_q = data_q.bind(p);
    }
    if let Some(d) = query.start_date {
        data_q = data_q.bind(d);
    }
    if let Some(d) = query.end_date {
        data_q = data_q.bind(d);
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

/// Get period totals by id
#[utoipa::path(
    get,
    path = "/api/overall-attendance/{id}",
    params(("id" = u64, Path, description = "Record id")),
    responses(
        (status = 200, body = OverallAttendance),
        (status = 404, description = "Record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Overall Attendance"
)]
pub async fn get_overall(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();

    let row = sqlx::query_as::<_, OverallAttendance>(&format!(
        "SELECT {} FROM overall_attendance_record WHERE id = ?",
        OVERALL_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::not_found("Overall attendance record not found"))?;

    auth.require_self_or_admin(&row.person_id)?;
    Ok(HttpResponse::Ok().json(row))
}

/// Adjust stored totals
#[utoipa::path(
    put,
    path = "/api/overall-attendance/{id}",
    params(("id" = u64, Path, description = "Record id")),
    request_body = Object,
    responses(
        (status = 200, description = "Updated"),
        (status = 400, description = "Empty payload or column not updatable"),
        (status = 404, description = "Record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Overall Attendance"
)]
pub async fn update_overall(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let update = build_update_sql("overall_attendance_record", &body, UPDATABLE, &[], "id", id)?;
    if execute_update(pool.get_ref(), update).await? == 0 {
        return Err(ApiError::not_found("Overall attendance record not found"));
    }

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "update", "overall_attendance_record").record(id),
    );
    Ok(HttpResponse::Ok().json(json!({ "message": "Overall attendance updated" })))
}

/// Delete stored totals
#[utoipa::path(
    delete,
    path = "/api/overall-attendance/{id}",
    params(("id" = u64, Path, description = "Record id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Overall Attendance"
)]
pub async fn delete_overall(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let id = path.into_inner();

    let res = sqlx::query("DELETE FROM overall_attendance_record WHERE id = ?")
        .bind(id)
        .execute(pool.get_ref())
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("Overall attendance record not found"));
    }

    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "delete", "overall_attendance_record").record(id),
    );
    Ok(HttpResponse::Ok().json(json!({ "message": "Successfully deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn official(day: &str) -> OfficialTime {
        OfficialTime {
            id: 1,
            employee_number: "E1".into(),
            day: day.into(),
            official_time_in: t(8, 0),
            official_break_start: Some(t(12, 0)),
            official_break_end: Some(t(13, 0)),
            official_time_out: t(17, 0),
        }
    }

    #[test]
    fn schedule_rows_with_bad_day_names_are_ignored() {
        let map = schedule_map(&[official("Monday"), official("Someday"), official("fri")]);
        assert_eq!(map.len(), 2);
        assert!(map.contains_key(&Weekday::Mon));
        assert!(map.contains_key(&Weekday::Fri));
    }

    #[test]
    fn stored_rows_feed_period_totals() {
        // 2024-03-04 is a Monday
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let records = vec![AttendanceRecord {
            id: 9,
            person_id: "E1".into(),
            date: monday,
            day: "Monday".into(),
            time_in: Some(t(8, 10)),
            break_in: Some(t(12, 0)),
            break_out: Some(t(13, 0)),
            time_out: Some(t(17, 0)),
        }];

        let next_monday = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        let totals = period_totals(
            monday,
            next_monday,
            &schedule_map(&[official("Monday")]),
            &record_map(&records),
        );

        assert_eq!(totals.days_present, 1);
        assert_eq!(totals.days_absent, 1);
        assert_eq!(totals.late, 10);
        assert_eq!(totals.rendered, 470);
    }
}
