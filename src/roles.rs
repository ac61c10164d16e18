//! Role hierarchy and the rules built on top of it.
//!
//! Roles form a strict total order: `usuario < administrador < dueno`. The rank
//! table lives in [`Role::rank`] and nowhere else; every authorization decision
//! goes through the comparison helpers in this module.

use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

/// Role
///
/// The closed set of roles a user account can hold. Serialized with the
/// lowercase Spanish labels used by the storefront and stored in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    /// Regular customer account.
    #[default]
    Usuario,
    /// Staff member: manages the catalog and regular customers.
    Administrador,
    /// Store owner: unrestricted.
    Dueno,
}

/// Roles allowed through the staff-only endpoints.
pub const STAFF_ROLES: [Role; 2] = [Role::Administrador, Role::Dueno];

impl Role {
    pub const ALL: [Role; 3] = [Role::Usuario, Role::Administrador, Role::Dueno];

    pub const fn rank(self) -> u8 {
        match self {
            Role::Usuario => 1,
            Role::Administrador => 2,
            Role::Dueno => 3,
        }
    }

    /// Label used on the wire and in storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Usuario => "usuario",
            Role::Administrador => "administrador",
            Role::Dueno => "dueno",
        }
    }

    /// Human-readable label for console output.
    pub const fn display_name(self) -> &'static str {
        match self {
            Role::Usuario => "Usuario",
            Role::Administrador => "Administrador",
            Role::Dueno => "Dueño",
        }
    }

    pub fn has_role_or_higher(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }
}

impl PartialOrd for Role {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Role {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role label: {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Accepts the stored labels plus their English equivalents.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "usuario" | "standard" => Ok(Role::Usuario),
            "administrador" | "administrator" => Ok(Role::Administrador),
            "dueno" | "dueño" | "owner" => Ok(Role::Dueno),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// `rank(actor) >= rank(required)`.
pub fn has_role_or_higher(actor: Role, required: Role) -> bool {
    actor.has_role_or_higher(required)
}

/// String form of [`has_role_or_higher`]. Unknown labels are never authorized.
pub fn has_role_or_higher_str(actor: &str, required: &str) -> bool {
    match (actor.parse::<Role>(), required.parse::<Role>()) {
        (Ok(actor), Ok(required)) => has_role_or_higher(actor, required),
        _ => false,
    }
}

/// True when the actor satisfies at least one of the listed roles.
pub fn has_any_role(actor: Role, allowed: &[Role]) -> bool {
    allowed.iter().any(|required| actor.has_role_or_higher(*required))
}

/// Whether `actor` may modify or delete an account holding `target`.
///
/// Owners manage everyone; administrators only manage regular users.
pub fn can_manage(actor: Role, target: Role) -> bool {
    match actor {
        Role::Dueno => true,
        Role::Administrador => target == Role::Usuario,
        Role::Usuario => false,
    }
}

/// An account identity paired with its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

/// What an administrative request intends to do to a target account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagementAction {
    Modify,
    Deactivate,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ManagementDenied {
    #[error("accounts cannot delete or deactivate themselves")]
    OwnAccount,
    #[error("{actor} cannot manage accounts with role {target}")]
    OutRanked { actor: Role, target: Role },
}

/// Combines the self-protection rule with [`can_manage`].
///
/// Self-targeting is only refused for destructive actions; an owner may still
/// edit their own account.
pub fn check_management(
    action: ManagementAction,
    actor: Principal,
    target: Principal,
) -> Result<(), ManagementDenied> {
    let destructive = matches!(
        action,
        ManagementAction::Delete | ManagementAction::Deactivate
    );
    if destructive && actor.id == target.id {
        return Err(ManagementDenied::OwnAccount);
    }
    if !can_manage(actor.role, target.role) {
        return Err(ManagementDenied::OutRanked {
            actor: actor.role,
            target: target.role,
        });
    }
    Ok(())
}
