use std::collections::BTreeSet;

/// A role held by a user, carrying the snapshot of permission names it grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrant {
    pub id: i64,
    pub name: String,
    pub permissions: BTreeSet<String>,
}

impl RoleGrant {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            permissions: BTreeSet::new(),
        }
    }

    pub fn with_permissions<I, S>(mut self, perms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions.extend(perms.into_iter().map(Into::into));
        self
    }

    pub fn grants(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

/// Principal represents the authenticated user together with a snapshot of
/// their roles. Nothing is fetched lazily: every check is answered from the
/// sets captured when the principal was loaded.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
    pub student_id: Option<i64>,
    pub instructor_id: Option<i64>,
    pub roles: Vec<RoleGrant>,
}

impl Principal {
    pub fn new(user_id: i64, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
            student_id: None,
            instructor_id: None,
            roles: Vec::new(),
        }
    }

    /// Adds a role; a role with the same id replaces the previous grant.
    pub fn with_role(mut self, role: RoleGrant) -> Self {
        self.roles.retain(|existing| existing.id != role.id);
        self.roles.push(role);
        self
    }

    pub fn without_role(mut self, role_id: i64) -> Self {
        self.roles.retain(|existing| existing.id != role_id);
        self
    }

    pub fn with_student(mut self, student_id: i64) -> Self {
        self.student_id = Some(student_id);
        self
    }

    /// Exact, case-sensitive role name match.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.name == role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.roles.iter().any(|r| r.grants(permission))
    }

    /// Union of the permission names of every held role.
    pub fn permission_names(&self) -> BTreeSet<&str> {
        self.roles
            .iter()
            .flat_map(|r| r.permissions.iter().map(String::as_str))
            .collect()
    }

    /// Name of the first role, used when stamping report metadata.
    pub fn primary_role(&self) -> Option<&str> {
        self.roles.first().map(|r| r.name.as_str())
    }
}
