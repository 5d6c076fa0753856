use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct AuditLog {
    pub id: u64,
    /// Actor
    pub employee_number: String,
    #[schema(example = "update")]
    pub action: String,
    #[schema(example = "payroll_processing")]
    pub table_name: String,
    pub record_id: Option<u64>,
    pub target_employee_number: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct PageAccess {
    pub id: u64,
    pub employee_number: String,
    #[schema(example = "payroll-processing")]
    pub page_id: String,
    #[schema(value_type = String, format = "date-time")]
    pub granted_at: DateTime<Utc>,
}
