use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_number": "2024-0012",
        "first_name": "Maria",
        "middle_name": "Santos",
        "last_name": "Dela Cruz",
        "name_extension": null,
        "birth_date": "1990-05-14",
        "sex": "Female",
        "civil_status": "Single",
        "email": "maria.delacruz@agency.gov.ph",
        "mobile_num": "+639171234567",
        "created_at": "2024-01-02T08:00:00"
    })
)]
pub struct Person {
    pub id: u64,
    pub employee_number: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub name_extension: Option<String>,
    #[schema(value_type = Option<String>, format = "date")]
    pub birth_date: Option<NaiveDate>,
    pub sex: Option<String>,
    pub civil_status: Option<String>,
    pub email: Option<String>,
    pub mobile_num: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: NaiveDateTime,
}

/// "Last, First M." as printed on payroll sheets.
pub fn payroll_name(first: &str, middle: Option<&str>, last: &str) -> String {
    match middle.and_then(|m| m.trim().chars().next()) {
        Some(initial) => format!("{}, {} {}.", last.trim(), first.trim(), initial),
        None => format!("{}, {}", last.trim(), first.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::payroll_name;

    #[test]
    fn formats_with_middle_initial() {
        assert_eq!(
            payroll_name("Maria", Some("Santos"), "Dela Cruz"),
            "Dela Cruz, Maria S."
        );
    }

    #[test]
    fn blank_middle_name_is_dropped() {
        assert_eq!(payroll_name("Jose", Some("  "), "Rizal"), "Rizal, Jose");
        assert_eq!(payroll_name("Jose", None, "Rizal"), "Rizal, Jose");
    }
}
