use crate::{
    auth::auth::AuthUser,
    error::ApiResult,
    model::audit_log::AuditLog,
    models::{Paginated, paginate},
};
use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::MySqlPool;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    /// Actor
    pub employee_number: Option<String>,
    pub table_name: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Browse the audit trail
#[utoipa::path(
    get,
    path = "/api/audit-log",
    params(AuditQuery),
    responses(
        (status = 200, description = "Paginated audit entries, newest first", body = Object),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Audit"
)]
pub async fn list_audit_log(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AuditQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let (page, per_page, offset) = paginate(query.page, query.per_page, 50);

    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<&str> = Vec::new();
    if let Some(e) = query.employee_number.as_deref() {
        where_sql.push_str(" AND employee_number = ?");
        args.push(e);
    }
    if let Some(t) = query.table_name.as_deref() {
        where_sql.push_str(" AND table_name = ?");
        args.push(t);
    }

    let count_sql = format!("SELECT COUNT(*) FROM audit_log{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for a in &args {
        count_q = count_q.bind(*a);
    }
    let total = count_q.fetch_one(pool.get_ref()).await?;

    let data_sql = format!(
        r#"
        SELECT id, employee_number, action, table_name, record_id, target_employee_number, timestamp
        FROM audit_log
        {}
        ORDER BY id DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );
    let mut data_q = sqlx::query_as::<_, AuditLog>(&data_sql);
    for a in args {
        data_q = data_q.bind(a);
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
