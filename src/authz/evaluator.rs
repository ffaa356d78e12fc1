use super::principal::Principal;

/// Policy evaluator trait for pluggable authorization logic
pub trait PolicyEvaluator: Send + Sync {
    /// Check if the principal holds a permission
    fn can(&self, principal: &Principal, permission: &str) -> bool;
}

/// Plain RBAC: a permission is granted iff at least one held role grants it.
///
/// There is no super-user bypass, no deny list and no precedence between
/// roles. Permissions are flat names, so `editar_nota` says nothing about
/// `ver_notas`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleUnionEvaluator;

impl RoleUnionEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl PolicyEvaluator for RoleUnionEvaluator {
    fn can(&self, principal: &Principal, permission: &str) -> bool {
        if let Some(role) = principal.roles.iter().find(|r| r.grants(permission)) {
            tracing::debug!(
                user_id = principal.user_id,
                permission = %permission,
                role = %role.name,
                "role permission match"
            );
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::RoleGrant;

    #[test]
    fn test_role_permission_allows() {
        let evaluator = RoleUnionEvaluator::new();
        let principal = Principal::new(1, "secretaria")
            .with_role(RoleGrant::new(2, "Secretaria").with_permissions(["crear_estudiante"]));

        assert!(evaluator.can(&principal, "crear_estudiante"));
        assert!(!evaluator.can(&principal, "eliminar_estudiante"));
    }

    #[test]
    fn test_admin_name_is_not_a_bypass() {
        let evaluator = RoleUnionEvaluator::new();
        let principal = Principal::new(1, "admin").with_role(RoleGrant::new(1, "Administrador"));

        assert!(!evaluator.can(&principal, "ver_notas"));
    }

    #[test]
    fn test_edit_does_not_imply_view() {
        let evaluator = RoleUnionEvaluator::new();
        let principal = Principal::new(1, "editor")
            .with_role(RoleGrant::new(5, "Editor").with_permissions(["editar_carrera"]));

        assert!(!evaluator.can(&principal, "ver_carreras"));
    }
}
