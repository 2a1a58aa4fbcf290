use std::fmt;

use serde::{Deserialize, Serialize};

/// Keystone role a parametrized test runs under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
    Reader,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Member, Role::Reader];

    /// Name of the keystone role granted to the test user
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
            Role::Reader => "reader",
        }
    }

    /// Whether this role runs as the run's own user rather than a fresh one
    pub fn uses_run_user(self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Whether keystone's default policy lets this role list all projects
    pub fn can_list_projects(self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
