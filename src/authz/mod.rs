//! Authorization module - role-based permission checks
//!
//! Users hold roles, roles hold permission names, and a user is authorized for
//! a permission iff one of their roles grants it. Handlers call [`authorize`]
//! (usually through [`Session::require`]) as their first step.

mod evaluator;
mod principal;
mod session;

pub use evaluator::{PolicyEvaluator, RoleUnionEvaluator};
pub use principal::{Principal, RoleGrant};
pub use session::{load_principal, Session};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("authentication required")]
    Unauthorized,
    /// The permission name is kept for logs only and never rendered to clients.
    #[error("missing permission")]
    Forbidden { permission: String },
}

pub fn has_permission(principal: &Principal, permission: &str) -> bool {
    principal.has_permission(permission)
}

pub fn has_role(principal: &Principal, role: &str) -> bool {
    principal.has_role(role)
}

/// Fails with `Unauthorized` when nobody is signed in and with `Forbidden`
/// when the principal lacks the permission.
pub fn authorize(principal: Option<&Principal>, permission: &str) -> Result<(), AuthzError> {
    authorize_with(&RoleUnionEvaluator, principal, permission)
}

pub fn authorize_with(
    evaluator: &dyn PolicyEvaluator,
    principal: Option<&Principal>,
    permission: &str,
) -> Result<(), AuthzError> {
    let principal = principal.ok_or(AuthzError::Unauthorized)?;

    if evaluator.can(principal, permission) {
        Ok(())
    } else {
        tracing::debug!(
            user_id = principal.user_id,
            username = %principal.username,
            permission = %permission,
            "access denied"
        );
        Err(AuthzError::Forbidden {
            permission: permission.to_string(),
        })
    }
}

/// Stock role names created by the initial migrations
pub mod roles {
    pub const ADMINISTRATOR: &str = "Administrador";
    pub const SECRETARY: &str = "Secretaria";
    pub const INSTRUCTOR: &str = "Docente";
    pub const STUDENT: &str = "Estudiante";
}

/// Well-known permission names
pub mod permissions {
    // Career
    pub const VIEW_CAREERS: &str = "ver_carreras";
    pub const CREATE_CAREER: &str = "crear_carrera";
    pub const EDIT_CAREER: &str = "editar_carrera";
    pub const DELETE_CAREER: &str = "eliminar_carrera";

    // Course
    pub const VIEW_COURSES: &str = "ver_materias";
    pub const CREATE_COURSE: &str = "crear_materia";
    pub const EDIT_COURSE: &str = "editar_materia";
    pub const DELETE_COURSE: &str = "eliminar_materia";

    // Person
    pub const VIEW_PERSONS: &str = "ver_personas";
    pub const CREATE_PERSON: &str = "crear_persona";
    pub const EDIT_PERSON: &str = "editar_persona";
    pub const DELETE_PERSON: &str = "eliminar_persona";

    // Student
    pub const VIEW_STUDENTS: &str = "ver_estudiantes";
    pub const CREATE_STUDENT: &str = "crear_estudiante";
    pub const EDIT_STUDENT: &str = "editar_estudiante";
    pub const DELETE_STUDENT: &str = "eliminar_estudiante";

    // Instructor
    pub const VIEW_INSTRUCTORS: &str = "ver_docentes";
    pub const CREATE_INSTRUCTOR: &str = "crear_docente";
    pub const EDIT_INSTRUCTOR: &str = "editar_docente";
    pub const DELETE_INSTRUCTOR: &str = "eliminar_docente";

    // Section (course assignment)
    pub const VIEW_SECTIONS: &str = "ver_asignaciones";
    pub const CREATE_SECTION: &str = "crear_asignacion";
    pub const EDIT_SECTION: &str = "editar_asignacion";
    pub const DELETE_SECTION: &str = "eliminar_asignacion";

    // Enrollment
    pub const VIEW_ENROLLMENTS: &str = "ver_inscripciones";
    pub const CREATE_ENROLLMENT: &str = "crear_inscripcion";
    pub const EDIT_ENROLLMENT: &str = "editar_inscripcion";
    pub const DELETE_ENROLLMENT: &str = "eliminar_inscripcion";

    // Grade
    pub const VIEW_GRADES: &str = "ver_notas";
    pub const CREATE_GRADE: &str = "crear_nota";
    pub const EDIT_GRADE: &str = "editar_nota";
    pub const DELETE_GRADE: &str = "eliminar_nota";

    // User
    pub const VIEW_USERS: &str = "ver_usuarios";
    pub const CREATE_USER: &str = "crear_usuario";
    pub const EDIT_USER: &str = "editar_usuario";
    pub const DELETE_USER: &str = "eliminar_usuario";

    // Role
    pub const VIEW_ROLES: &str = "ver_roles";
    pub const CREATE_ROLE: &str = "crear_rol";
    pub const EDIT_ROLE: &str = "editar_rol";
    pub const DELETE_ROLE: &str = "eliminar_rol";
}
