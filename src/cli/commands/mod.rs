pub mod backup;
pub mod payroll;
pub mod token;
