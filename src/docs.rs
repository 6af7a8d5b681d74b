use crate::api::attendance::{
    ClockInRequest, CorrectTimesRequest, ManualAttendanceRequest, SheetEntry, SheetRequest,
};
use crate::api::enrollment::{EnrollRequest, EnrollmentActiveRequest, UpdateEnrollmentRequest};
use crate::api::payments::InitiateRequest;
use crate::api::payroll::{PaginatedPayrollResponse, PayrollQuery, PeriodRequest};
use crate::api::users::{CreateUserRequest, FinancialsRequest, UserActiveRequest};
use crate::auth::handlers::LoginResponse;
use crate::model::attendance::{AttendanceStatus, ClassAttendance, StaffAttendance};
use crate::model::enrollment::Enrollment;
use crate::model::payment::{Payment, PaymentStatus};
use crate::model::payroll::{PayrollRecord, PayrollStatus};
use crate::model::role::Role;
use crate::model::user::User;
use crate::models::LoginReqDto;
use crate::service::payroll::DisbursementSummary;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Campus API",
        version = "1.0.0",
        description = r#"
## School Management API

Attendance, tuition payments and teacher payroll for a multi-branch school.

### 🔹 Key Features
- **Staff Attendance**
  - Geofenced daily clock-in/out plus admin corrections and backfill
- **Class Attendance**
  - Per-day attendance sheets for enrolled students
- **Payments**
  - Chapa-backed tuition checkout with server-side verification
- **Payroll**
  - Idempotent monthly generation and bulk salary disbursement
- **Enrollments & Users**
  - Plan-aware student enrollment and staff account management

### 🔐 Security
Most endpoints are protected using **JWT Bearer authentication**.
Admin-only operations reject non-admin tokens; teachers may only act on
their own attendance.

### 📦 Response Format
- JSON-based RESTful responses
- Pagination supported for list endpoints

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,

        crate::api::attendance::clock_in,
        crate::api::attendance::clock_out,
        crate::api::attendance::resume,
        crate::api::attendance::correct_times,
        crate::api::attendance::manual_add,
        crate::api::attendance::submit_sheet,
        crate::api::attendance::list_staff,
        crate::api::attendance::sheet_for_date,

        crate::api::payments::initiate,
        crate::api::payments::verify,
        crate::api::payments::callback,
        crate::api::payments::list,

        crate::api::payroll::generate,
        crate::api::payroll::disburse,
        crate::api::payroll::mark_paid,
        crate::api::payroll::list,

        crate::api::enrollment::create,
        crate::api::enrollment::update,
        crate::api::enrollment::set_active,
        crate::api::enrollment::list,

        crate::api::users::create,
        crate::api::users::update_financials,
        crate::api::users::set_active,
        crate::api::users::delete,
        crate::api::users::list
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            Role,
            AttendanceStatus,
            PaymentStatus,
            PayrollStatus,
            ClockInRequest,
            CorrectTimesRequest,
            ManualAttendanceRequest,
            SheetEntry,
            SheetRequest,
            StaffAttendance,
            ClassAttendance,
            InitiateRequest,
            Payment,
            PeriodRequest,
            PayrollQuery,
            PayrollRecord,
            PaginatedPayrollResponse,
            DisbursementSummary,
            EnrollRequest,
            UpdateEnrollmentRequest,
            EnrollmentActiveRequest,
            Enrollment,
            CreateUserRequest,
            FinancialsRequest,
            UserActiveRequest,
            User
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Authentication APIs"),
        (name = "Attendance", description = "Staff and class attendance APIs"),
        (name = "Payments", description = "Tuition payment APIs"),
        (name = "Payroll", description = "Teacher payroll APIs"),
        (name = "Enrollments", description = "Student enrollment APIs"),
        (name = "Users", description = "User management APIs"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
