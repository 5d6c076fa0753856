//! Database-free computation: DTR metrics, punch compilation, payroll arithmetic.

pub mod dtr;
pub mod payroll_calc;
pub mod punches;
