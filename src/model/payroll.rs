use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Columns shared by the three payroll lifecycle tables, in table order.
/// Finalize and release copy rows with `INSERT ... SELECT` over this list.
pub const PAYROLL_FIGURE_COLUMNS: &str = "employee_number, name, department_code, position, \
    start_date, end_date, rate_np, increment, pera, days_absent, tardiness_minutes, \
    abs_deduction, gross_salary, withholding_tax, personal_life_retirement_ins, \
    total_gsis_deds, philhealth, total_pagibig_deds, total_other_deds, total_deductions, \
    net_salary, pay1st, pay2nd";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayrollStatus {
    Processing,
    Finalized,
}

impl PayrollStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PayrollStatus::Processing => "processing",
            PayrollStatus::Finalized => "finalized",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct PayrollFigures {
    pub employee_number: String,
    pub name: String,
    pub department_code: Option<String>,
    pub position: Option<String>,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub rate_np: f64,
    pub increment: f64,
    pub pera: f64,
    pub days_absent: i32,
    pub tardiness_minutes: i32,
    pub abs_deduction: f64,
    pub gross_salary: f64,
    pub withholding_tax: f64,
    pub personal_life_retirement_ins: f64,
    pub total_gsis_deds: f64,
    pub philhealth: f64,
    pub total_pagibig_deds: f64,
    pub total_other_deds: f64,
    pub total_deductions: f64,
    pub net_salary: f64,
    pub pay1st: f64,
    pub pay2nd: f64,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct PayrollProcessing {
    pub id: u64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub figures: PayrollFigures,
    #[schema(example = "processing")]
    pub status: String,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct PayrollProcessed {
    pub id: u64,
    pub processing_id: u64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub figures: PayrollFigures,
    #[schema(value_type = String, format = "date-time")]
    pub date_submitted: NaiveDateTime,
}

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct PayrollReleased {
    pub id: u64,
    pub processed_id: u64,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub figures: PayrollFigures,
    #[schema(value_type = String, format = "date-time")]
    pub date_released: NaiveDateTime,
    pub released_by: String,
}
