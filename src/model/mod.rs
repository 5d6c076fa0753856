pub mod attendance;
pub mod audit_log;
pub mod leave_request;
pub mod payroll;
pub mod person;
pub mod reference;
pub mod remittance;
pub mod role;
