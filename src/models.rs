use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterReq {
    #[schema(example = "2024-0012")]
    pub employee_number: String,
    #[schema(example = "Maria")]
    pub first_name: String,
    pub middle_name: Option<String>,
    #[schema(example = "Dela Cruz")]
    pub last_name: String,
    #[schema(example = "maria.delacruz@agency.gov.ph")]
    pub email: String,
    pub password: String,
    /// superadmin, administrator or staff
    #[schema(example = "staff")]
    pub role: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "2024-0012")]
    pub employee_number: String,
    pub password: String,
}

#[derive(FromRow)]
pub struct UserSql {
    pub id: u64,
    pub employee_number: String,
    pub password: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    /// Employee number
    pub sub: String,
    pub role: String,
    pub exp: usize,
    pub jti: String,

    pub token_type: TokenType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum TokenType {
    Access,
    Refresh,
}

/// Per-row outcome for batch endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct RowOutcome {
    /// Key of the row as submitted (employee number, CSV line, ...)
    pub key: String,
    #[schema(example = "created")]
    pub status: String,
    pub message: Option<String>,
}

impl RowOutcome {
    pub fn ok(key: impl Into<String>, status: &str) -> Self {
        Self {
            key: key.into(),
            status: status.to_string(),
            message: None,
        }
    }

    pub fn failed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: "error".to_string(),
            message: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == "error"
    }
}

/// (page, per_page, offset) with page >= 1 and per_page in 1..=100.
/// The offset is widened so any `u32` page is representable.
pub fn paginate(page: Option<u32>, per_page: Option<u32>, default_per_page: u32) -> (u32, u32, u64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(default_per_page).clamp(1, 100);
    (page, per_page, u64::from(page - 1) * u64::from(per_page))
}

/// `{data, page, per_page, total}` envelope of every list endpoint.
#[derive(Debug, Serialize)]
pub struct Paginated<T: Serialize> {
    pub data: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginate_clamps() {
        assert_eq!(paginate(Some(0), Some(1000), 20), (1, 100, 0));
        assert_eq!(paginate(Some(3), None, 20), (3, 20, 40));
    }

    #[test]
    fn paginate_huge_page_does_not_overflow() {
        assert_eq!(
            paginate(Some(50_000_000), Some(100), 20),
            (50_000_000, 100, 4_999_999_900)
        );
        let (_, _, offset) = paginate(Some(u32::MAX), Some(100), 20);
        assert_eq!(offset, (u64::from(u32::MAX) - 1) * 100);
    }
}
