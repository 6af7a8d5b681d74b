pub mod attendance;
pub mod enrollment;
pub mod payments;
pub mod payroll;
pub mod users;
