use std::sync::Arc;

use serde_json::{json, Map, Value};
use utoipa::OpenApi;

use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::dashboard::dashboard,
		routes::auth::login,
		routes::auth::me,
		routes::auth::logout,
		routes::rbac::list_roles,
		routes::rbac::create_role,
		routes::rbac::get_role,
		routes::rbac::update_role,
		routes::rbac::delete_role,
		routes::rbac::add_permission_to_role,
		routes::rbac::remove_permission_from_role,
		routes::rbac::list_permissions,
		routes::rbac::create_permission,
		routes::rbac::get_user_roles,
		routes::rbac::assign_role_to_user,
		routes::rbac::revoke_role_from_user,
		routes::rbac::get_effective_permissions,
		routes::users::list_users,
		routes::users::get_user,
		routes::users::create_user,
		routes::users::update_user,
		routes::users::delete_user,
		routes::persons::list_persons,
		routes::persons::get_person,
		routes::persons::create_person,
		routes::persons::update_person,
		routes::persons::delete_person,
		routes::careers::list_careers,
		routes::careers::get_career,
		routes::careers::create_career,
		routes::careers::update_career,
		routes::careers::delete_career,
		routes::courses::list_courses,
		routes::courses::get_course,
		routes::courses::create_course,
		routes::courses::update_course,
		routes::courses::delete_course,
		routes::students::list_students,
		routes::students::get_student,
		routes::students::create_student,
		routes::students::update_student,
		routes::students::delete_student,
		routes::instructors::list_instructors,
		routes::instructors::get_instructor,
		routes::instructors::create_instructor,
		routes::instructors::update_instructor,
		routes::instructors::delete_instructor,
		routes::sections::list_sections,
		routes::sections::get_section,
		routes::sections::create_section,
		routes::sections::update_section,
		routes::sections::delete_section,
		routes::enrollments::list_enrollments,
		routes::enrollments::get_enrollment,
		routes::enrollments::create_enrollment,
		routes::enrollments::update_enrollment,
		routes::enrollments::delete_enrollment,
		routes::grades::list_grades,
		routes::grades::get_grade,
		routes::grades::create_grade,
		routes::grades::update_grade,
		routes::grades::delete_grade,
		routes::reports::students_report,
		routes::reports::students_report_with_body,
		routes::reports::grades_report,
		routes::reports::instructors_report,
		routes::reports::careers_report,
		routes::reports::enrollments_report
	),
	components(
		schemas(
			routes::health::HealthResponse,
			routes::dashboard::DashboardStats,
			routes::dashboard::DashboardResponse,
			routes::auth::MessageResponse,
			routes::reports::StudentReportParams,
			models::user::User,
			models::user::AuthResponse,
			models::user::MeResponse,
			models::user::LoginRequest,
			models::user::UserCreateRequest,
			models::user::UserUpdateRequest,
			models::rbac::Role,
			models::rbac::RoleSummary,
			models::rbac::RoleDetail,
			models::rbac::RoleCreateRequest,
			models::rbac::RoleUpdateRequest,
			models::rbac::Permission,
			models::rbac::PermissionCreateRequest,
			models::rbac::AssignRoleRequest,
			models::rbac::EffectivePermissions,
			models::person::Person,
			models::person::PersonCreateRequest,
			models::person::PersonUpdateRequest,
			models::career::Career,
			models::career::CareerCreateRequest,
			models::career::CareerUpdateRequest,
			models::course::Course,
			models::course::CourseCreateRequest,
			models::course::CourseUpdateRequest,
			models::student::Student,
			models::student::StudentCreateRequest,
			models::student::StudentUpdateRequest,
			models::instructor::Instructor,
			models::instructor::InstructorCreateRequest,
			models::instructor::InstructorUpdateRequest,
			models::section::Section,
			models::section::SectionCreateRequest,
			models::section::SectionUpdateRequest,
			models::enrollment::Enrollment,
			models::enrollment::EnrollmentCreateRequest,
			models::enrollment::EnrollmentUpdateRequest,
			models::grade::Grade,
			models::grade::GradeCreateRequest,
			models::grade::GradeUpdateRequest,
			crate::reports::aggregate::GradeOutcome,
			models::pagination::PaginationMeta,
			models::pagination::CareerPage,
			models::pagination::CoursePage,
			models::pagination::PersonPage,
			models::pagination::StudentPage,
			models::pagination::InstructorPage,
			models::pagination::SectionPage,
			models::pagination::EnrollmentPage,
			models::pagination::GradePage,
			models::pagination::UserPage
		)
	),
	tags(
		(name = "Health", description = "Liveness and database reachability"),
		(name = "Auth", description = "Sign-in and session"),
		(name = "Dashboard", description = "Landing page counts"),
		(name = "RBAC", description = "Roles, permissions and assignments"),
		(name = "Users", description = "User accounts"),
		(name = "Persons", description = "Personal records"),
		(name = "Careers", description = "Careers offered"),
		(name = "Courses", description = "Courses and prerequisites"),
		(name = "Students", description = "Student profiles"),
		(name = "Instructors", description = "Instructor profiles"),
		(name = "Sections", description = "Course assignments to instructors"),
		(name = "Enrollments", description = "Yearly enrollments"),
		(name = "Grades", description = "Partial and final grades"),
		(name = "Reports", description = "PDF reports")
	)
)]
pub struct ApiDoc;

/// OpenAPI document with the bearer scheme attached, ready to serve.
pub fn openapi_json() -> Arc<Value> {
	let mut doc = match serde_json::to_value(ApiDoc::openapi()) {
		Ok(doc) => doc,
		Err(err) => {
			tracing::warn!(error = %err, "OpenAPI document could not be serialized");
			return Arc::new(json!({}));
		}
	};

	ensure_security_components(&mut doc);
	Arc::new(doc)
}

fn ensure_security_components(doc: &mut Value) {
	let Some(root) = doc.as_object_mut() else {
		return;
	};

	let components = root
		.entry("components")
		.or_insert_with(|| Value::Object(Map::new()));
	let Some(components) = components.as_object_mut() else {
		return;
	};

	let schemes = components
		.entry("securitySchemes")
		.or_insert_with(|| Value::Object(Map::new()));
	if let Some(schemes) = schemes.as_object_mut() {
		schemes.insert(
			"bearerAuth".to_string(),
			json!({
				"type": "http",
				"scheme": "bearer",
				"bearerFormat": "JWT"
			}),
		);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn document_lists_report_paths_and_bearer_scheme() {
		let doc = openapi_json();
		assert!(doc["paths"]["/reports/grades/{enrollment_id}"]["get"].is_object());
		assert!(doc["paths"]["/rbac/roles"]["post"].is_object());
		assert_eq!(doc["components"]["securitySchemes"]["bearerAuth"]["scheme"], "bearer");
	}
}
