use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::audit_log::PageAccess,
    utils::{
        audit::{self, AuditEntry},
        notify::{NotificationHub, PAGE_ACCESS_GRANTED, PAGE_ACCESS_REVOKED},
    },
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::ToSchema;

/// Pages granted to an employee
#[utoipa::path(
    get,
    path = "/api/page-access/{employee_number}",
    params(("employee_number" = String, Path, description = "Employee number")),
    responses((status = 200, body = Vec<PageAccess>)),
    security(("bearer_auth" = [])),
    tag = "Page Access"
)]
pub async fn list_page_access(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let employee_number = path.into_inner();
    auth.require_self_or_admin(&employee_number)?;

    let rows = sqlx::query_as::<_, PageAccess>(
        "SELECT id, employee_number, page_id, granted_at FROM page_access WHERE employee_number = ? ORDER BY page_id",
    )
    .bind(&employee_number)
    .fetch_all(pool.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(rows))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GrantRequest {
    #[schema(example = "payroll-processing")]
    pub page_id: String,
}

/// Grant a page; granting twice is a no-op
#[utoipa::path(
    post,
    path = "/api/page-access/{employee_number}",
    params(("employee_number" = String, Path, description = "Employee number")),
    request_body = GrantRequest,
    responses(
        (status = 200, description = "Granted", body = Object, example = json!({"granted": true})),
        (status = 400, description = "page_id is required")
    ),
    security(("bearer_auth" = [])),
    tag = "Page Access"
)]
pub async fn grant_page_access(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<NotificationHub>,
    path: web::Path<String>,
    payload: web::Json<GrantRequest>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let employee_number = path.into_inner();
    let page_id = payload.page_id.trim();

    if page_id.is_empty() {
        return Err(ApiError::bad_request("page_id is required"));
    }

    let res = sqlx::query("INSERT IGNORE INTO page_access (employee_number, page_id) VALUES (?, ?)")
        .bind(&employee_number)
        .bind(page_id)
        .execute(pool.get_ref())
        .await?;

    let newly_granted = res.rows_affected() > 0;
    if newly_granted {
        hub.emit(&employee_number, PAGE_ACCESS_GRANTED, json!({ "page_id": page_id }));
        audit::log(
            pool.get_ref(),
            AuditEntry::new(&auth, "grant", "page_access")
                .record(res.last_insert_id())
                .target(employee_number.clone()),
        );
    }

    Ok(HttpResponse::Ok().json(json!({ "granted": newly_granted, "page_id": page_id })))
}

/// Revoke a page
#[utoipa::path(
    delete,
    path = "/api/page-access/{employee_number}/{page_id}",
    params(
        ("employee_number" = String, Path, description = "Employee number"),
        ("page_id" = String, Path, description = "Page identifier")
    ),
    responses(
        (status = 200, description = "Revoked"),
        (status = 404, description = "Page was not granted")
    ),
    security(("bearer_auth" = [])),
    tag = "Page Access"
)]
pub async fn revoke_page_access(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    hub: web::Data<NotificationHub>,
    path: web::Path<(String, String)>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;
    let (employee_number, page_id) = path.into_inner();

    let res = sqlx::query("DELETE FROM page_access WHERE employee_number = ? AND page_id = ?")
        .bind(&employee_number)
        .bind(&page_id)
        .execute(pool.get_ref())
        .await?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("Page access not granted"));
    }

    hub.emit(&employee_number, PAGE_ACCESS_REVOKED, json!({ "page_id": page_id }));
    audit::log(
        pool.get_ref(),
        AuditEntry::new(&auth, "revoke", "page_access").target(employee_number),
    );

    Ok(HttpResponse::Ok().json(json!({ "message": "Page access revoked" })))
}
