use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Stored as a lowercase string in `users.role` and carried in the JWT.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Superadmin,
    Administrator,
    Staff,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Superadmin | Role::Administrator)
    }

    /// Notification room shared by every user holding this role.
    pub fn room(&self) -> String {
        format!("role:{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(Role::from_str("Administrator").unwrap(), Role::Administrator);
        assert_eq!(Role::from_str("staff").unwrap(), Role::Staff);
        assert!(Role::from_str("janitor").is_err());
    }

    #[test]
    fn room_uses_lowercase_name() {
        assert_eq!(Role::Superadmin.room(), "role:superadmin");
        assert!(Role::Superadmin.is_admin());
        assert!(!Role::Staff.is_admin());
    }
}
