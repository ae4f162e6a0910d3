//! Two-axis authorization core.
//!
//! Access control crosses a coarse role hierarchy (admin > supervisor > user)
//! with an orthogonal write-capability flag (view | edit). Both axes are
//! stored per user and honored literally: an admin whose permission level is
//! `view` cannot write, and a plain user holding `edit` can. The engine is a
//! pure function of its inputs so the HTTP gate and the UI guard derive their
//! decisions from the exact same predicates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Coarse authority tier. Ordering follows authority: `Admin` outranks
/// `Supervisor` outranks `User`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Supervisor,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Supervisor => "supervisor",
            Role::User => "user",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Role::Admin),
            "supervisor" => Some(Role::Supervisor),
            "user" => Some(Role::User),
            _ => None,
        }
    }

    pub fn level(self) -> u8 {
        match self {
            Role::Admin => 3,
            Role::Supervisor => 2,
            Role::User => 1,
        }
    }
}

/// Write-capability flag, assigned independently of role.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    View,
    Edit,
}

impl PermissionLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            PermissionLevel::View => "view",
            PermissionLevel::Edit => "edit",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "view" => Some(PermissionLevel::View),
            "edit" => Some(PermissionLevel::Edit),
            _ => None,
        }
    }
}

/// The authenticated actor behind a request.
///
/// Loaded fresh per request from the session store. Inactive accounts never
/// produce a `Principal` (login and session resolution both refuse them), so
/// the engine does not carry account status.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
    pub permission_level: PermissionLevel,
}

/// A declarative authorization requirement attached to a route.
///
/// Policies are static configuration: they carry no state and evaluate with
/// no side effects.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Policy {
    /// Any authenticated principal.
    None,
    /// `role == admin`.
    Admin,
    /// `role ∈ {admin, supervisor}`.
    Supervisor,
    /// `permission_level == edit`. Role is deliberately not consulted.
    Write,
}

impl Policy {
    pub fn kind(self) -> &'static str {
        match self {
            Policy::None => "none",
            Policy::Admin => "admin",
            Policy::Supervisor => "supervisor",
            Policy::Write => "write",
        }
    }
}

/// Raised when route configuration names a policy kind the engine does not
/// know. Surfaces at registration time, never per request.
#[derive(Debug, Error, Eq, PartialEq)]
#[error("unknown policy kind `{0}`")]
pub struct PolicyParseError(pub String);

impl FromStr for Policy {
    type Err = PolicyParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "none" => Ok(Policy::None),
            "admin" => Ok(Policy::Admin),
            "supervisor" => Ok(Policy::Supervisor),
            "write" => Ok(Policy::Write),
            other => Err(PolicyParseError(other.to_string())),
        }
    }
}

/// Machine-readable denial code; selects the HTTP status and message.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    Unauthenticated,
    InsufficientRole,
    InsufficientPermissions,
}

impl DenyReason {
    pub fn code(self) -> &'static str {
        match self {
            DenyReason::Unauthenticated => "UNAUTHENTICATED",
            DenyReason::InsufficientRole => "INSUFFICIENT_ROLE",
            DenyReason::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A deny outcome: the reason code plus the policy that failed, so the
/// response layer can phrase the message for the requirement that was missed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Denial {
    pub reason: DenyReason,
    pub policy: Policy,
}

impl Denial {
    pub fn message(&self) -> &'static str {
        match (self.reason, self.policy) {
            (DenyReason::Unauthenticated, _) => "Unauthenticated",
            (_, Policy::Admin) => "Access denied. Admin role required.",
            (_, Policy::Supervisor) => "Access denied. Supervisor role or higher required.",
            (_, Policy::Write) => "Access denied. You have view-only permissions.",
            (_, Policy::None) => "Access denied.",
        }
    }
}

/// Allow/Deny result. Deny is a regular value, not an error.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    fn deny(reason: DenyReason, policy: Policy) -> Self {
        Decision::Deny(Denial { reason, policy })
    }

    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn denial(self) -> Option<Denial> {
        match self {
            Decision::Allow => None,
            Decision::Deny(denial) => Some(denial),
        }
    }
}

/// Evaluate one policy against an optional principal.
///
/// Pure and deterministic. `None` (no session) denies every policy,
/// including [`Policy::None`]: unauthenticated callers are never implicitly
/// allowed. Routes meant to be public simply declare no policy at all.
pub fn evaluate(principal: Option<&Principal>, policy: Policy) -> Decision {
    let Some(principal) = principal else {
        return Decision::deny(DenyReason::Unauthenticated, policy);
    };
    match policy {
        Policy::None => Decision::Allow,
        Policy::Admin => {
            if principal.role == Role::Admin {
                Decision::Allow
            } else {
                Decision::deny(DenyReason::InsufficientRole, policy)
            }
        }
        Policy::Supervisor => {
            if principal.role.level() >= Role::Supervisor.level() {
                Decision::Allow
            } else {
                Decision::deny(DenyReason::InsufficientRole, policy)
            }
        }
        // The role axis is ignored here on purpose: an admin stored with
        // `view` must be denied writes.
        Policy::Write => {
            if principal.permission_level == PermissionLevel::Edit {
                Decision::Allow
            } else {
                Decision::deny(DenyReason::InsufficientPermissions, policy)
            }
        }
    }
}

/// Evaluate a composite requirement: every component must allow, and the
/// first failing component (left-to-right) supplies the denial.
pub fn evaluate_all(principal: Option<&Principal>, policies: &[Policy]) -> Decision {
    for &policy in policies {
        if let Decision::Deny(denial) = evaluate(principal, policy) {
            return Decision::Deny(denial);
        }
    }
    Decision::Allow
}

/// UI affordance flags mirrored to the client with the initial page load.
///
/// Derived through [`evaluate`] so they cannot drift from the gate. The
/// client is a convenience layer only; the gate re-checks every request.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionFlags {
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub is_view_only: bool,
    pub is_admin: bool,
    pub is_supervisor_or_above: bool,
}

impl PermissionFlags {
    pub fn for_principal(principal: &Principal) -> Self {
        let can_write = evaluate(Some(principal), Policy::Write).is_allowed();
        Self {
            can_create: can_write,
            can_edit: can_write,
            can_delete: can_write,
            is_view_only: !can_write,
            is_admin: evaluate(Some(principal), Policy::Admin).is_allowed(),
            is_supervisor_or_above: evaluate(Some(principal), Policy::Supervisor).is_allowed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role, permission_level: PermissionLevel) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            role,
            permission_level,
        }
    }

    #[test]
    fn admin_policy_requires_admin_role() {
        let admin = principal(Role::Admin, PermissionLevel::View);
        assert!(evaluate(Some(&admin), Policy::Admin).is_allowed());

        for role in [Role::Supervisor, Role::User] {
            let p = principal(role, PermissionLevel::Edit);
            let denial = evaluate(Some(&p), Policy::Admin).denial().unwrap();
            assert_eq!(denial.reason, DenyReason::InsufficientRole);
        }
    }

    #[test]
    fn supervisor_policy_admits_admin_and_supervisor() {
        for role in [Role::Admin, Role::Supervisor] {
            let p = principal(role, PermissionLevel::View);
            assert!(evaluate(Some(&p), Policy::Supervisor).is_allowed());
        }
        let user = principal(Role::User, PermissionLevel::Edit);
        let denial = evaluate(Some(&user), Policy::Supervisor).denial().unwrap();
        assert_eq!(denial.reason, DenyReason::InsufficientRole);
    }

    #[test]
    fn write_policy_tracks_permission_level_not_role() {
        for role in [Role::Admin, Role::Supervisor, Role::User] {
            let editor = principal(role, PermissionLevel::Edit);
            assert!(evaluate(Some(&editor), Policy::Write).is_allowed());

            let viewer = principal(role, PermissionLevel::View);
            let denial = evaluate(Some(&viewer), Policy::Write).denial().unwrap();
            assert_eq!(denial.reason, DenyReason::InsufficientPermissions);
        }
    }

    #[test]
    fn view_only_admin_is_denied_writes() {
        let p = principal(Role::Admin, PermissionLevel::View);
        let denial = evaluate(Some(&p), Policy::Write).denial().unwrap();
        assert_eq!(denial.reason, DenyReason::InsufficientPermissions);
        assert_eq!(denial.message(), "Access denied. You have view-only permissions.");
    }

    #[test]
    fn missing_principal_denies_every_policy() {
        for policy in [Policy::None, Policy::Admin, Policy::Supervisor, Policy::Write] {
            let denial = evaluate(None, policy).denial().unwrap();
            assert_eq!(denial.reason, DenyReason::Unauthenticated);
        }
    }

    #[test]
    fn none_policy_admits_any_authenticated_principal() {
        let p = principal(Role::User, PermissionLevel::View);
        assert!(evaluate(Some(&p), Policy::None).is_allowed());
    }

    #[test]
    fn evaluate_is_idempotent() {
        let p = principal(Role::Supervisor, PermissionLevel::View);
        for policy in [Policy::None, Policy::Admin, Policy::Supervisor, Policy::Write] {
            assert_eq!(evaluate(Some(&p), policy), evaluate(Some(&p), policy));
        }
        assert_eq!(evaluate(None, Policy::Write), evaluate(None, Policy::Write));
    }

    #[test]
    fn composite_surfaces_first_failure_left_to_right() {
        let p = principal(Role::Supervisor, PermissionLevel::Edit);
        let denial = evaluate_all(Some(&p), &[Policy::Admin, Policy::Write])
            .denial()
            .unwrap();
        assert_eq!(denial.reason, DenyReason::InsufficientRole);
        assert_eq!(denial.policy, Policy::Admin);

        // Reversed order: the write component passes, admin still fails.
        let denial = evaluate_all(Some(&p), &[Policy::Write, Policy::Admin])
            .denial()
            .unwrap();
        assert_eq!(denial.reason, DenyReason::InsufficientRole);
    }

    #[test]
    fn composite_allows_when_every_component_allows() {
        let p = principal(Role::Admin, PermissionLevel::Edit);
        assert!(evaluate_all(Some(&p), &[Policy::Admin, Policy::Write]).is_allowed());
        assert!(evaluate_all(Some(&p), &[]).is_allowed());
    }

    #[test]
    fn editing_user_can_write_but_not_administer() {
        let p = principal(Role::User, PermissionLevel::Edit);
        assert!(evaluate(Some(&p), Policy::Write).is_allowed());
        let denial = evaluate(Some(&p), Policy::Admin).denial().unwrap();
        assert_eq!(denial.reason, DenyReason::InsufficientRole);
    }

    #[test]
    fn policy_kinds_round_trip_and_unknown_kinds_fail() {
        for policy in [Policy::None, Policy::Admin, Policy::Supervisor, Policy::Write] {
            assert_eq!(policy.kind().parse::<Policy>().unwrap(), policy);
        }
        let err = "superuser".parse::<Policy>().unwrap_err();
        assert_eq!(err, PolicyParseError("superuser".into()));
    }

    #[test]
    fn guard_flags_match_engine_predicates() {
        let p = principal(Role::Admin, PermissionLevel::View);
        let flags = PermissionFlags::for_principal(&p);
        assert!(flags.is_admin);
        assert!(flags.is_supervisor_or_above);
        assert!(flags.is_view_only);
        assert!(!flags.can_create);
        assert!(!flags.can_edit);
        assert!(!flags.can_delete);

        let p = principal(Role::User, PermissionLevel::Edit);
        let flags = PermissionFlags::for_principal(&p);
        assert!(!flags.is_admin);
        assert!(!flags.is_supervisor_or_above);
        assert!(flags.can_create && flags.can_edit && flags.can_delete);
        assert!(!flags.is_view_only);
    }

    #[test]
    fn guard_flags_serialize_camel_case() {
        let p = principal(Role::Supervisor, PermissionLevel::Edit);
        let json = serde_json::to_value(PermissionFlags::for_principal(&p)).unwrap();
        assert_eq!(json["canCreate"], true);
        assert_eq!(json["isViewOnly"], false);
        assert_eq!(json["isSupervisorOrAbove"], true);
    }
}
