//! Best-effort audit trail. Writes run detached from the request and a failed
//! write is only logged; callers never see it.

use sqlx::MySqlPool;

use crate::auth::auth::AuthUser;

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub employee_number: String,
    pub action: &'static str,
    pub table_name: &'static str,
    pub record_id: Option<u64>,
    pub target_employee_number: Option<String>,
}

impl AuditEntry {
    pub fn new(actor: &AuthUser, action: &'static str, table_name: &'static str) -> Self {
        Self {
            employee_number: actor.employee_number.clone(),
            action,
            table_name,
            record_id: None,
            target_employee_number: None,
        }
    }

    pub fn record(mut self, id: u64) -> Self {
        self.record_id = Some(id);
        self
    }

    pub fn target(mut self, employee_number: impl Into<String>) -> Self {
        self.target_employee_number = Some(employee_number.into());
        self
    }
}

async fn insert(pool: &MySqlPool, entry: &AuditEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO audit_log (employee_number, action, table_name, record_id, target_employee_number)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entry.employee_number)
    .bind(entry.action)
    .bind(entry.table_name)
    .bind(entry.record_id)
    .bind(&entry.target_employee_number)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fire and forget.
pub fn log(pool: &MySqlPool, entry: AuditEntry) {
    let pool = pool.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = insert(&pool, &entry).await {
            tracing::warn!(
                error = %e,
                action = entry.action,
                table = entry.table_name,
                "Audit log write failed"
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::role::Role;

    #[test]
    fn builder_fills_optional_fields() {
        let actor = AuthUser {
            user_id: 1,
            employee_number: "ADMIN-1".into(),
            role: Role::Administrator,
        };
        let entry = AuditEntry::new(&actor, "update", "payroll_processing")
            .record(44)
            .target("2024-0012");
        assert_eq!(entry.employee_number, "ADMIN-1");
        assert_eq!(entry.record_id, Some(44));
        assert_eq!(entry.target_employee_number.as_deref(), Some("2024-0012"));
    }
}
