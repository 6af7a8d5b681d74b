pub mod attendance;
pub mod enrollment;
pub mod payment;
pub mod payroll;
pub mod role;
pub mod user;
