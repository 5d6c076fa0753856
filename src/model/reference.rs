use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Department {
    pub id: u64,
    #[schema(example = "CCS")]
    pub code: String,
    #[schema(example = "College of Computing Studies")]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct DepartmentAssignment {
    pub id: u64,
    pub employee_number: String,
    pub department_code: String,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Item {
    pub id: u64,
    #[schema(example = "Instructor I")]
    pub item_name: String,
    #[schema(example = "INST1-042")]
    pub item_code: String,
    #[schema(example = 12)]
    pub salary_grade: i32,
    #[schema(example = 1)]
    pub step: i32,
    pub employee_number: Option<String>,
    #[schema(value_type = Option<String>, format = "date")]
    pub effectivity_date: Option<chrono::NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct SalaryGrade {
    pub id: u64,
    #[schema(example = 12)]
    pub salary_grade: i32,
    #[schema(example = 1)]
    pub step: i32,
    #[schema(example = 30024.0)]
    pub rate: f64,
}
