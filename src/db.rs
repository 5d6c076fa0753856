use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use std::time::Duration;

pub async fn init_db(database_url: &str, max_connections: u32) -> Result<MySqlPool, sqlx::Error> {
    MySqlPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
}

/// Tables are created on startup when missing; there is no migration history.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        employee_number VARCHAR(32) NOT NULL UNIQUE,
        email VARCHAR(255) NOT NULL,
        password VARCHAR(255) NOT NULL,
        role VARCHAR(32) NOT NULL DEFAULT 'staff',
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        last_login_at DATETIME NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS refresh_tokens (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        user_id BIGINT UNSIGNED NOT NULL,
        jti VARCHAR(64) NOT NULL UNIQUE,
        expires_at DATETIME NOT NULL,
        revoked BOOLEAN NOT NULL DEFAULT FALSE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS person_table (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        employee_number VARCHAR(32) NOT NULL UNIQUE,
        first_name VARCHAR(100) NOT NULL,
        middle_name VARCHAR(100) NULL,
        last_name VARCHAR(100) NOT NULL,
        name_extension VARCHAR(16) NULL,
        birth_date DATE NULL,
        sex VARCHAR(16) NULL,
        civil_status VARCHAR(32) NULL,
        email VARCHAR(255) NULL,
        mobile_num VARCHAR(32) NULL,
        created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS attendance_record (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        person_id VARCHAR(32) NOT NULL,
        date DATE NOT NULL,
        day VARCHAR(16) NOT NULL,
        time_in TIME NULL,
        break_in TIME NULL,
        break_out TIME NULL,
        time_out TIME NULL,
        UNIQUE KEY uq_attendance_person_date (person_id, date)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS attendance_record_info (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        person_id VARCHAR(32) NOT NULL,
        punch_date DATE NOT NULL,
        punch_time TIME NOT NULL,
        device_id VARCHAR(64) NULL,
        KEY idx_punch_person_date (person_id, punch_date)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS officialtime (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        employee_number VARCHAR(32) NOT NULL,
        day VARCHAR(16) NOT NULL,
        official_time_in TIME NOT NULL,
        official_break_start TIME NULL,
        official_break_end TIME NULL,
        official_time_out TIME NOT NULL,
        UNIQUE KEY uq_officialtime_employee_day (employee_number, day)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS overall_attendance_record (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        person_id VARCHAR(32) NOT NULL,
        start_date DATE NOT NULL,
        end_date DATE NOT NULL,
        days_present INT NOT NULL DEFAULT 0,
        days_absent INT NOT NULL DEFAULT 0,
        total_rendered_minutes BIGINT NOT NULL DEFAULT 0,
        total_late_minutes BIGINT NOT NULL DEFAULT 0,
        total_undertime_minutes BIGINT NOT NULL DEFAULT 0,
        total_tardiness_minutes BIGINT NOT NULL DEFAULT 0,
        total_overtime_minutes BIGINT NOT NULL DEFAULT 0,
        total_honorarium_hours DOUBLE NOT NULL DEFAULT 0,
        total_service_credit_hours DOUBLE NOT NULL DEFAULT 0,
        UNIQUE KEY uq_overall_person_period (person_id, start_date, end_date)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS department_table (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        code VARCHAR(32) NOT NULL UNIQUE,
        description VARCHAR(255) NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS department_assignment (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        employee_number VARCHAR(32) NOT NULL,
        department_code VARCHAR(32) NOT NULL,
        KEY idx_assignment_employee (employee_number)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS item_table (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        item_name VARCHAR(255) NOT NULL,
        item_code VARCHAR(64) NOT NULL,
        salary_grade INT NOT NULL,
        step INT NOT NULL DEFAULT 1,
        employee_number VARCHAR(32) NULL,
        effectivity_date DATE NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS salary_grade_table (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        salary_grade INT NOT NULL,
        step INT NOT NULL,
        rate DOUBLE NOT NULL,
        UNIQUE KEY uq_salary_grade_step (salary_grade, step)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS remittance_table (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        employee_number VARCHAR(32) NOT NULL,
        nhmfc DOUBLE NOT NULL DEFAULT 0,
        liquidating_cash DOUBLE NOT NULL DEFAULT 0,
        gsis_salary_loan DOUBLE NOT NULL DEFAULT 0,
        gsis_policy_loan DOUBLE NOT NULL DEFAULT 0,
        gsis_arrears DOUBLE NOT NULL DEFAULT 0,
        cpl DOUBLE NOT NULL DEFAULT 0,
        mpl DOUBLE NOT NULL DEFAULT 0,
        mpl_lite DOUBLE NOT NULL DEFAULT 0,
        emergency_loan DOUBLE NOT NULL DEFAULT 0,
        pagibig_fund_cont DOUBLE NOT NULL DEFAULT 0,
        pagibig_2 DOUBLE NOT NULL DEFAULT 0,
        multi_purpose_loan DOUBLE NOT NULL DEFAULT 0,
        landbank_salary_loan DOUBLE NOT NULL DEFAULT 0,
        earist_credit_coop DOUBLE NOT NULL DEFAULT 0,
        feu DOUBLE NOT NULL DEFAULT 0,
        KEY idx_remittance_employee (employee_number)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS philhealth (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        employee_number VARCHAR(32) NOT NULL,
        philhealth_contribution DOUBLE NOT NULL DEFAULT 0,
        KEY idx_philhealth_employee (employee_number)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS payroll_processing (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        employee_number VARCHAR(32) NOT NULL,
        name VARCHAR(255) NOT NULL,
        department_code VARCHAR(32) NULL,
        position VARCHAR(255) NULL,
        start_date DATE NOT NULL,
        end_date DATE NOT NULL,
        rate_np DOUBLE NOT NULL,
        increment DOUBLE NOT NULL DEFAULT 0,
        pera DOUBLE NOT NULL DEFAULT 0,
        days_absent INT NOT NULL DEFAULT 0,
        tardiness_minutes INT NOT NULL DEFAULT 0,
        abs_deduction DOUBLE NOT NULL DEFAULT 0,
        gross_salary DOUBLE NOT NULL DEFAULT 0,
        withholding_tax DOUBLE NOT NULL DEFAULT 0,
        personal_life_retirement_ins DOUBLE NOT NULL DEFAULT 0,
        total_gsis_deds DOUBLE NOT NULL DEFAULT 0,
        philhealth DOUBLE NOT NULL DEFAULT 0,
        total_pagibig_deds DOUBLE NOT NULL DEFAULT 0,
        total_other_deds DOUBLE NOT NULL DEFAULT 0,
        total_deductions DOUBLE NOT NULL DEFAULT 0,
        net_salary DOUBLE NOT NULL DEFAULT 0,
        pay1st DOUBLE NOT NULL DEFAULT 0,
        pay2nd DOUBLE NOT NULL DEFAULT 0,
        status VARCHAR(16) NOT NULL DEFAULT 'processing',
        UNIQUE KEY uq_payroll_processing_period (employee_number, start_date, end_date)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS payroll_processed (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        processing_id BIGINT UNSIGNED NOT NULL UNIQUE,
        employee_number VARCHAR(32) NOT NULL,
        name VARCHAR(255) NOT NULL,
        department_code VARCHAR(32) NULL,
        position VARCHAR(255) NULL,
        start_date DATE NOT NULL,
        end_date DATE NOT NULL,
        rate_np DOUBLE NOT NULL,
        increment DOUBLE NOT NULL DEFAULT 0,
        pera DOUBLE NOT NULL DEFAULT 0,
        days_absent INT NOT NULL DEFAULT 0,
        tardiness_minutes INT NOT NULL DEFAULT 0,
        abs_deduction DOUBLE NOT NULL DEFAULT 0,
        gross_salary DOUBLE NOT NULL DEFAULT 0,
        withholding_tax DOUBLE NOT NULL DEFAULT 0,
        personal_life_retirement_ins DOUBLE NOT NULL DEFAULT 0,
        total_gsis_deds DOUBLE NOT NULL DEFAULT 0,
        philhealth DOUBLE NOT NULL DEFAULT 0,
        total_pagibig_deds DOUBLE NOT NULL DEFAULT 0,
        total_other_deds DOUBLE NOT NULL DEFAULT 0,
        total_deductions DOUBLE NOT NULL DEFAULT 0,
        net_salary DOUBLE NOT NULL DEFAULT 0,
        pay1st DOUBLE NOT NULL DEFAULT 0,
        pay2nd DOUBLE NOT NULL DEFAULT 0,
        date_submitted DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS payroll_released (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        processed_id BIGINT UNSIGNED NOT NULL UNIQUE,
        employee_number VARCHAR(32) NOT NULL,
        name VARCHAR(255) NOT NULL,
        department_code VARCHAR(32) NULL,
        position VARCHAR(255) NULL,
        start_date DATE NOT NULL,
        end_date DATE NOT NULL,
        rate_np DOUBLE NOT NULL,
        increment DOUBLE NOT NULL DEFAULT 0,
        pera DOUBLE NOT NULL DEFAULT 0,
        days_absent INT NOT NULL DEFAULT 0,
        tardiness_minutes INT NOT NULL DEFAULT 0,
        abs_deduction DOUBLE NOT NULL DEFAULT 0,
        gross_salary DOUBLE NOT NULL DEFAULT 0,
        withholding_tax DOUBLE NOT NULL DEFAULT 0,
        personal_life_retirement_ins DOUBLE NOT NULL DEFAULT 0,
        total_gsis_deds DOUBLE NOT NULL DEFAULT 0,
        philhealth DOUBLE NOT NULL DEFAULT 0,
        total_pagibig_deds DOUBLE NOT NULL DEFAULT 0,
        total_other_deds DOUBLE NOT NULL DEFAULT 0,
        total_deductions DOUBLE NOT NULL DEFAULT 0,
        net_salary DOUBLE NOT NULL DEFAULT 0,
        pay1st DOUBLE NOT NULL DEFAULT 0,
        pay2nd DOUBLE NOT NULL DEFAULT 0,
        date_released DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
        released_by VARCHAR(32) NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS leave_requests (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        employee_number VARCHAR(32) NOT NULL,
        start_date DATE NOT NULL,
        end_date DATE NOT NULL,
        leave_type VARCHAR(16) NOT NULL,
        status VARCHAR(16) NOT NULL DEFAULT 'pending',
        created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS audit_log (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        employee_number VARCHAR(32) NOT NULL,
        action VARCHAR(32) NOT NULL,
        table_name VARCHAR(64) NOT NULL,
        record_id BIGINT UNSIGNED NULL,
        target_employee_number VARCHAR(32) NULL,
        timestamp TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS page_access (
        id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
        employee_number VARCHAR(32) NOT NULL,
        page_id VARCHAR(64) NOT NULL,
        granted_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE KEY uq_page_access (employee_number, page_id)
    )
    "#,
];

pub async fn ensure_schema(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::info!(tables = SCHEMA.len(), "Schema ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str) -> &'static str {
        SCHEMA
            .iter()
            .find(|s| s.contains(&format!("CREATE TABLE IF NOT EXISTS {name} (")))
            .copied()
            .unwrap()
    }

    #[test]
    fn natural_keys_are_unique() {
        assert!(table("attendance_record").contains("UNIQUE KEY"));
        assert!(table("payroll_processing")
            .contains("UNIQUE KEY uq_payroll_processing_period (employee_number, start_date, end_date)"));
        assert!(table("overall_attendance_record").contains("UNIQUE KEY uq_overall_person_period"));
        assert!(table("page_access").contains("UNIQUE KEY uq_page_access"));
    }
}
