pub mod attendance;
pub mod enrollment;
pub mod payment;
pub mod payroll;
pub mod users;
