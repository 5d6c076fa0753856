pub mod attendance;
pub mod audit_log;
pub mod leave_request;
pub mod notifications;
pub mod official_time;
pub mod overall_attendance;
pub mod page_access;
pub mod payroll;
pub mod person;
pub mod reference;
pub mod remittance;
