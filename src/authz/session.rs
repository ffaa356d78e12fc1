use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sqlx::{FromRow, SqlitePool};

use super::principal::{Principal, RoleGrant};
use super::{authorize, AuthzError};
use crate::app::AppState;
use crate::errors::AppError;

/// Identity attached to a request. `None` means nobody is signed in: the
/// header was missing, the token did not verify, or the user is gone or
/// inactive. Only database failures reject the request outright.
#[derive(Debug, Clone, Default)]
pub struct Session(pub Option<Principal>);

impl Session {
    pub fn principal(&self) -> Option<&Principal> {
        self.0.as_ref()
    }

    pub fn authenticated(&self) -> Result<&Principal, AuthzError> {
        self.0.as_ref().ok_or(AuthzError::Unauthorized)
    }

    /// Guard used at the top of every handler.
    pub fn require(&self, permission: &str) -> Result<&Principal, AuthzError> {
        authorize(self.principal(), permission)?;
        self.authenticated()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));

        let Some(token) = token else {
            return Ok(Session(None));
        };

        let claims = match state.jwt.decode(token) {
            Ok(claims) => claims,
            Err(err) => {
                tracing::debug!(error = %err, "rejected bearer token");
                return Ok(Session(None));
            }
        };

        let principal = load_principal(&state.pool, claims.sub).await?;
        Ok(Session(principal))
    }
}

#[derive(Debug, FromRow)]
struct PrincipalRow {
    id: i64,
    username: String,
    student_id: Option<i64>,
    instructor_id: Option<i64>,
}

#[derive(Debug, FromRow)]
struct GrantRow {
    role_id: i64,
    role_name: String,
    permission: Option<String>,
}

/// Snapshots an active user with every role and the permission names each
/// role grants. Returns `Ok(None)` for unknown or inactive users.
pub async fn load_principal(pool: &SqlitePool, user_id: i64) -> Result<Option<Principal>, sqlx::Error> {
    let user = sqlx::query_as::<_, PrincipalRow>(
        "SELECT id, username, student_id, instructor_id FROM users WHERE id = ? AND active = 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let Some(user) = user else {
        return Ok(None);
    };

    let grants = sqlx::query_as::<_, GrantRow>(
        "SELECT r.id AS role_id, r.name AS role_name, p.name AS permission \
         FROM user_roles ur \
         JOIN roles r ON r.id = ur.role_id \
         LEFT JOIN role_permissions rp ON rp.role_id = r.id \
         LEFT JOIN permissions p ON p.id = rp.permission_id \
         WHERE ur.user_id = ? \
         ORDER BY r.id, p.name",
    )
    .bind(user.id)
    .fetch_all(pool)
    .await?;

    let mut roles: BTreeMap<i64, RoleGrant> = BTreeMap::new();
    for grant in grants {
        let role = roles
            .entry(grant.role_id)
            .or_insert_with(|| RoleGrant::new(grant.role_id, grant.role_name));
        if let Some(permission) = grant.permission {
            role.permissions.insert(permission);
        }
    }

    let mut principal = Principal::new(user.id, user.username);
    principal.student_id = user.student_id;
    principal.instructor_id = user.instructor_id;
    principal.roles = roles.into_values().collect();

    Ok(Some(principal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_session_requires_login() {
        let session = Session::default();
        assert_eq!(session.require("ver_notas").err(), Some(AuthzError::Unauthorized));
        assert!(session.authenticated().is_err());
    }

    #[test]
    fn require_returns_the_principal() {
        let principal = Principal::new(2, "secretaria")
            .with_role(RoleGrant::new(2, "Secretaria").with_permissions(["ver_estudiantes"]));
        let session = Session(Some(principal));

        let granted = session.require("ver_estudiantes").map(|p| p.user_id);
        assert_eq!(granted, Ok(2));
        assert!(matches!(
            session.require("eliminar_estudiante"),
            Err(AuthzError::Forbidden { .. })
        ));
    }
}
