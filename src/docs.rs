use crate::api::attendance::{AttendanceInput, CompileRequest, ImportResponse, NewPunch};
use crate::api::leave_request::{CreateLeave, LeaveType};
use crate::api::official_time::ScheduleDay;
use crate::api::overall_attendance::ComputeRequest;
use crate::api::page_access::GrantRequest;
use crate::api::payroll::{BatchOutcome, CreatePayroll, IdsRequest, PayrollAssembly, UpdatePayroll};
use crate::api::person::CreatePerson;
use crate::api::reference::{AssignmentInput, DepartmentInput, ItemInput, SalaryGradeInput};
use crate::api::remittance::PhilHealthInput;
use crate::auth::auth::AuthUser;
use crate::auth::handlers::{BulkRegisterResponse, LoginResponse};
use crate::model::attendance::{AttendancePunch, AttendanceRecord, OfficialTime, OverallAttendance};
use crate::model::audit_log::{AuditLog, PageAccess};
use crate::model::leave_request::{LeaveRequest, LeaveStatus};
use crate::model::payroll::{PayrollFigures, PayrollProcessed, PayrollProcessing, PayrollReleased};
use crate::model::person::Person;
use crate::model::reference::{Department, DepartmentAssignment, Item, SalaryGrade};
use crate::model::remittance::{PhilHealth, Remittance};
use crate::models::{LoginReqDto, RegisterReq, RowOutcome};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRIS API",
        version = "1.0.0",
        description = r#"
## Human Resource Information System

Employee records, daily time records, leave, payroll and remittances for a
government agency.

### 🔹 Key Features
- **Personal Info**
  - Create, update, search and view employee records
- **Attendance**
  - Day records, CSV import, raw device punches, check-in/check-out
  - Weekly official time and period totals (late, undertime, overtime, absences)
- **Leave Management**
  - Apply for leave, approve/reject requests
- **Payroll**
  - Compute payroll from salary grade, attendance and remittances
  - Finalize, release and view payslips
- **Notifications**
  - Server-Sent Events feed per employee and per role

### 🔐 Security
Most endpoints are protected using **JWT Bearer authentication**.
Roles are **superadmin**, **administrator** and **staff**; staff only see their own records.

### 📦 Response Format
- JSON bodies; errors are `{"message": ...}`
- Pagination (`page`, `per_page`) on list endpoints
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::register,
        crate::auth::handlers::bulk_register,
        crate::auth::handlers::me,

        crate::api::person::list_people,
        crate::api::person::get_person,
        crate::api::person::get_person_by_employee_number,
        crate::api::person::create_person,
        crate::api::person::update_person,
        crate::api::person::delete_person,

        crate::api::attendance::list_attendance,
        crate::api::attendance::create_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::delete_attendance,
        crate::api::attendance::auto_save,
        crate::api::attendance::import_csv,
        crate::api::attendance::add_punches,
        crate::api::attendance::list_punches,
        crate::api::attendance::compile,
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,

        crate::api::official_time::get_schedule,
        crate::api::official_time::save_schedule,
        crate::api::official_time::delete_schedule_day,

        crate::api::overall_attendance::compute,
        crate::api::overall_attendance::list_overall,
        crate::api::overall_attendance::get_overall,
        crate::api::overall_attendance::update_overall,
        crate::api::overall_attendance::delete_overall,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,

        crate::api::payroll::create_payroll,
        crate::api::payroll::list_payrolls,
        crate::api::payroll::get_payroll,
        crate::api::payroll::update_payroll,
        crate::api::payroll::delete_payroll,
        crate::api::payroll::with_remittance,
        crate::api::payroll::search_payroll,
        crate::api::payroll::finalize_payroll,
        crate::api::payroll::list_processed,
        crate::api::payroll::delete_processed,
        crate::api::payroll::release_payroll,
        crate::api::payroll::list_released,
        crate::api::payroll::payslip,

        crate::api::remittance::list_remittances,
        crate::api::remittance::get_remittance,
        crate::api::remittance::save_remittance,
        crate::api::remittance::delete_remittance,
        crate::api::remittance::list_philhealth,
        crate::api::remittance::save_philhealth,
        crate::api::remittance::delete_philhealth,

        crate::api::reference::list_departments,
        crate::api::reference::create_department,
        crate::api::reference::update_department,
        crate::api::reference::delete_department,
        crate::api::reference::list_assignments,
        crate::api::reference::save_assignment,
        crate::api::reference::delete_assignment,
        crate::api::reference::list_items,
        crate::api::reference::get_item,
        crate::api::reference::create_item,
        crate::api::reference::update_item,
        crate::api::reference::delete_item,
        crate::api::reference::list_salary_grades,
        crate::api::reference::salary_rate,
        crate::api::reference::create_salary_grade,
        crate::api::reference::update_salary_grade,
        crate::api::reference::delete_salary_grade,

        crate::api::audit_log::list_audit_log,

        crate::api::page_access::list_page_access,
        crate::api::page_access::grant_page_access,
        crate::api::page_access::revoke_page_access,

        crate::api::notifications::stream_notifications
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            LoginResponse,
            BulkRegisterResponse,
            RowOutcome,
            AuthUser,
            Person,
            CreatePerson,
            AttendanceRecord,
            AttendancePunch,
            AttendanceInput,
            ImportResponse,
            NewPunch,
            CompileRequest,
            OfficialTime,
            ScheduleDay,
            OverallAttendance,
            ComputeRequest,
            LeaveRequest,
            CreateLeave,
            LeaveType,
            LeaveStatus,
            PayrollFigures,
            PayrollProcessing,
            PayrollProcessed,
            PayrollReleased,
            PayrollAssembly,
            CreatePayroll,
            UpdatePayroll,
            BatchOutcome,
            IdsRequest,
            Remittance,
            PhilHealth,
            PhilHealthInput,
            Department,
            DepartmentInput,
            DepartmentAssignment,
            AssignmentInput,
            Item,
            ItemInput,
            SalaryGrade,
            SalaryGradeInput,
            AuditLog,
            PageAccess,
            GrantRequest
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login, token rotation and user registration"),
        (name = "Personal Info", description = "Employee personal records"),
        (name = "Attendance", description = "Daily time records and device punches"),
        (name = "Official Time", description = "Weekly schedules"),
        (name = "Overall Attendance", description = "Period attendance totals"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Payroll", description = "Payroll processing, finalization and release"),
        (name = "Remittance", description = "Loan ledger and PhilHealth contributions"),
        (name = "Reference", description = "Departments, items and salary grades"),
        (name = "Audit", description = "Audit trail"),
        (name = "Page Access", description = "Per-employee page grants"),
        (name = "Notifications", description = "Server-Sent Events"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_builds_with_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/payroll/finalize"));
        assert!(doc.paths.paths.contains_key("/api/attendance/import"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
