use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::leave_request::{LeaveRequest, LeaveStatus},
    models::{Paginated, paginate},
    utils::audit::{self, AuditEntry},
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use strum::{AsRefStr, EnumString};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, Deserialize, ToSchema, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Annual,
    Sick,
    Unpaid,
    Vacation,
    Maternity,
    Paternity,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "sick")]
    pub leave_type: LeaveType,
}

impl CreateLeave {
    /// Calendar days covered, both ends included.
    fn days(&self) -> ApiResult<i64> {
        if self.start_date > self.end_date {
            return Err(ApiError::bad_request("start_date cannot be after end_date"));
        }
        Ok((self.end_date - self.start_date).num_days() + 1)
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaveFilter {
    /// Filter by employee number
    pub employee_number: Option<String>,
    /// pending, approved or rejected
    #[param(value_type = Option<String>)]
    pub status: Option<LeaveStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl LeaveFilter {
    fn where_clause(&self) -> (String, Vec<&str>) {
        let mut sql = String::from(" WHERE 1=1");
        let mut args = Vec::new();
        if let Some(emp) = self.employee_number.as_deref() {
            sql.push_str(" AND employee_number = ?");
            args.push(emp);
        }
        if let Some(status) = self.status {
            sql.push_str(" AND status = ?");
            args.push(status.as_str());
        }
        (sql, args)
    }
}

const LEAVE_COLUMNS: &str =
    "id, employee_number, start_date, end_date, leave_type, status, created_at";

/* =========================
Apply for leave
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body = CreateLeave,
    responses(
        (status = 201, description = "Leave request filed for the caller", body = Object,
         example = json!({"id": 14, "days": 3, "status": "pending"})),
        (status = 400, description = "start_date after end_date or unknown leave type"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeave>,
) -> ApiResult<HttpResponse> {
    // 1️⃣ validate the range
    let days = payload.days()?;

    // 2️⃣ file it under the caller's employee number
    let res = sqlx::query(
        "INSERT INTO leave_requests (employee_number, start_date, end_date, leave_type, status) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&auth.employee_number)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.leave_type.as_ref())
    .bind(LeaveStatus::Pending.as_str())
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_number = %auth.employee_number, "Failed to file leave");
        e
    })?;

    let id = res.last_insert_id();

    // 3️⃣ audit
    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "create", "leave_requests").record(id),
    );

    Ok(HttpResponse::Created().json(json!({
        "id": id,
        "days": days,
        "status": LeaveStatus::Pending.as_str()
    })))
}

/// Moves a pending request to `outcome`. 404 when the id is unknown,
/// 400 when it was already decided.
async fn decide(
    auth: &AuthUser,
    pool: &MySqlPool,
    leave_id: u64,
    outcome: LeaveStatus,
) -> ApiResult<()> {
    auth.require_admin()?;

    let updated = sqlx::query("UPDATE leave_requests SET status = ? WHERE id = ? AND status = ?")
        .bind(outcome.as_str())
        .bind(leave_id)
        .bind(LeaveStatus::Pending.as_str())
        .execute(pool)
        .await?
        .rows_affected();

    if updated == 0 {
        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM leave_requests WHERE id = ?")
                .bind(leave_id)
                .fetch_optional(pool)
                .await?;
        return Err(match current {
            None => ApiError::not_found("Leave request not found"),
            Some(status) => ApiError::bad_request(format!("Leave request is already {status}")),
        });
    }

    let action = match outcome {
        LeaveStatus::Approved => "approve",
        _ => "reject",
    };
    audit::log(pool, AuditEntry::new(auth, action, "leave_requests").record(leave_id));
    tracing::info!(leave_id, status = outcome.as_str(), by = %auth.employee_number, "Leave decided");
    Ok(())
}

#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(("leave_id" = u64, Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Approved"),
        (status = 400, description = "Already decided"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    decide(&auth, pool.get_ref(), path.into_inner(), LeaveStatus::Approved).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Leave approved" })))
}

#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(("leave_id" = u64, Path, description = "Leave request id")),
    responses(
        (status = 200, description = "Rejected"),
        (status = 400, description = "Already decided"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    decide(&auth, pool.get_ref(), path.into_inner(), LeaveStatus::Rejected).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Leave rejected" })))
}

/// One request; staff may only read their own
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "Leave request id")),
    responses(
        (status = 200, body = LeaveRequest),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    let sql = format!("SELECT {LEAVE_COLUMNS} FROM leave_requests WHERE id = ?");
    let leave = sqlx::query_as::<_, LeaveRequest>(&sql)
        .bind(path.into_inner())
        .fetch_optional(pool.get_ref())
        .await?
        .ok_or_else(|| ApiError::not_found("Leave request not found"))?;

    auth.require_self_or_admin(&leave.employee_number)?;
    Ok(HttpResponse::Ok().json(leave))
}

/* =========================
Leave list (Admin)
========================= */
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated, newest first", body = Object),
        (status = 400, description = "Unknown status"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let (page, per_page, offset) = paginate(query.page, query.per_page, 10);
    let (where_sql, args) = query.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM leave_requests{where_sql}");
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = count_q.bind(*arg);
    }
    let total = count_q.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        "SELECT {LEAVE_COLUMNS} FROM leave_requests{where_sql} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
    );
    let mut data_q = sqlx::query_as::<_, LeaveRequest>(&data_sql);
    for arg in args {
        data_q = data_q.bind(arg);
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn request(start: &str, end: &str) -> CreateLeave {
        CreateLeave {
            start_date: NaiveDate::from_str(start).unwrap(),
            end_date: NaiveDate::from_str(end).unwrap(),
            leave_type: LeaveType::Sick,
        }
    }

    #[test]
    fn leave_types_round_trip_lowercase() {
        assert_eq!(LeaveType::Maternity.as_ref(), "maternity");
        assert!(matches!(LeaveType::from_str("vacation"), Ok(LeaveType::Vacation)));
        assert!(LeaveType::from_str("sabbatical").is_err());
    }

    #[test]
    fn unknown_leave_type_is_rejected_by_the_body_parser() {
        let bad = serde_json::from_str::<CreateLeave>(
            r#"{"start_date":"2026-01-01","end_date":"2026-01-02","leave_type":"holiday"}"#,
        );
        assert!(bad.is_err());

        let ok = serde_json::from_str::<CreateLeave>(
            r#"{"start_date":"2026-01-01","end_date":"2026-01-02","leave_type":"paternity"}"#,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn day_count_includes_both_ends() {
        assert_eq!(request("2026-01-01", "2026-01-03").days().unwrap(), 3);
        assert_eq!(request("2026-02-10", "2026-02-10").days().unwrap(), 1);
        assert!(request("2026-01-05", "2026-01-04").days().is_err());
    }

    #[test]
    fn filter_binds_status_as_lowercase() {
        let filter = LeaveFilter {
            employee_number: Some("2024-0012".into()),
            status: Some(LeaveStatus::Approved),
            page: None,
            per_page: None,
        };
        let (sql, args) = filter.where_clause();
        assert_eq!(sql, " WHERE 1=1 AND employee_number = ? AND status = ?");
        assert_eq!(args, vec!["2024-0012", "approved"]);
    }
}
