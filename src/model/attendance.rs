use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One row per person per day.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    #[schema(example = "2024-0012")]
    pub person_id: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "Monday")]
    pub day: String,
    #[schema(value_type = Option<String>, example = "08:00:00")]
    pub time_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "12:00:00")]
    pub break_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "13:00:00")]
    pub break_out: Option<NaiveTime>,
    #[schema(value_type = Option<String>, example = "17:00:00")]
    pub time_out: Option<NaiveTime>,
}

/// Raw biometric device punch.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendancePunch {
    pub id: u64,
    pub person_id: String,
    #[schema(value_type = String, format = "date")]
    pub punch_date: NaiveDate,
    #[schema(value_type = String, example = "07:58:12")]
    pub punch_time: NaiveTime,
    pub device_id: Option<String>,
}

/// Expected schedule for one weekday.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct OfficialTime {
    pub id: u64,
    pub employee_number: String,
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

/// Period totals derived from day records.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct OverallAttendance {
    pub id: u64,
    pub person_id: String,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub days_present: i32,
    pub days_absent: i32,
    pub total_rendered_minutes: i64,
    pub total_late_minutes: i64,
    pub total_undertime_minutes: i64,
    pub total_tardiness_minutes: i64,
    pub total_overtime_minutes: i64,
    pub total_honorarium_hours: f64,
    pub total_service_credit_hours: f64,
}
