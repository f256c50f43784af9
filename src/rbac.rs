//! Role-based access control.
//!
//! Every protected request passes the same chain:
//! resolve session -> resolve role -> resolve per-event permission -> allow/deny.
//!
//! Role checks happen once per router in [`enforce_roles`]. Per-event checks
//! happen inside handlers through [`require_event_permission`], because the
//! event id only becomes known after routing.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::{AuthUser, resolve_session},
    error::ApiError,
    models::{Event, Permission, Role},
    repository::RepositoryState,
};

/// Roles admitted by the authenticated (any role) router.
pub const ANY_ROLE: &[Role] = &Role::ALL;
pub const ORGANIZER_ROLES: &[Role] = &[Role::Admin, Role::Organizer];
pub const FACULTY_ROLES: &[Role] = &[Role::Faculty];
pub const ADMIN_ROLES: &[Role] = &[Role::Admin];

/// PermissionSet
///
/// A set of per-event permissions. Membership is exact: inserting one
/// permission never makes another one appear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermissionSet(u8);

impl PermissionSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Permission::ALL.into_iter().collect()
    }

    const fn bit(permission: Permission) -> u8 {
        match permission {
            Permission::Read => 1,
            Permission::Write => 1 << 1,
            Permission::Delete => 1 << 2,
            Permission::Manage => 1 << 3,
        }
    }

    pub fn insert(&mut self, permission: Permission) {
        self.0 |= Self::bit(permission);
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0 & Self::bit(permission) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        Permission::ALL.into_iter().filter(|p| self.contains(*p))
    }

    pub fn to_vec(&self) -> Vec<Permission> {
        self.iter().collect()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        let mut set = Self::empty();
        for permission in iter {
            set.insert(permission);
        }
        set
    }
}

/// authorize_role
///
/// No session -> 401. Role outside `allowed` -> 403 carrying the caller's own
/// landing route so the client can redirect there.
pub fn authorize_role(user: Option<&AuthUser>, allowed: &[Role]) -> Result<(), ApiError> {
    let user = user.ok_or(ApiError::Unauthorized)?;
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(ApiError::Forbidden {
            redirect: Some(user.role.landing_route().to_string()),
        })
    }
}

/// enforce_roles
///
/// Route-layer middleware guarding a whole router with a fixed role set.
/// Mounted with `middleware::from_fn_with_state((state, ROLES), enforce_roles)`.
/// On success the resolved `AuthUser` is left in the request extensions for the
/// handler's extractor.
pub async fn enforce_roles(
    State((state, allowed)): State<(AppState, &'static [Role])>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, body) = request.into_parts();

    let user = match parts.extensions.get::<AuthUser>() {
        Some(user) => Some(user.clone()),
        None => resolve_session(&parts.headers, &state.repo, &state.config).await?,
    };

    if let Err(denied) = authorize_role(user.as_ref(), allowed) {
        tracing::info!(
            path = %parts.uri.path(),
            role = ?user.as_ref().map(|u| u.role),
            "route access denied"
        );
        return Err(denied);
    }

    if let Some(user) = user {
        parts.extensions.insert(user);
    }

    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// resolve_event_permissions
///
/// Admins and the event's creator hold every permission; anyone else holds
/// exactly what was granted to them.
pub fn resolve_event_permissions(
    user: &AuthUser,
    event: &Event,
    granted: impl IntoIterator<Item = Permission>,
) -> PermissionSet {
    if is_event_principal(user, event) {
        PermissionSet::all()
    } else {
        granted.into_iter().collect()
    }
}

fn is_event_principal(user: &AuthUser, event: &Event) -> bool {
    user.role == Role::Admin || event.created_by == user.id
}

/// Effective permissions of `user` on `event`, querying the permission store
/// only when the user is not a principal.
pub async fn event_permissions(
    repo: &RepositoryState,
    user: &AuthUser,
    event: &Event,
) -> Result<PermissionSet, ApiError> {
    if is_event_principal(user, event) {
        return Ok(PermissionSet::all());
    }
    let granted = repo.list_user_permissions(user.id, event.id).await?;
    Ok(resolve_event_permissions(user, event, granted))
}

/// require_event_permission
///
/// Missing event -> 404; permission absent -> 403. Returns the event on success.
pub async fn require_event_permission(
    repo: &RepositoryState,
    user: &AuthUser,
    event_id: Uuid,
    required: Permission,
) -> Result<Event, ApiError> {
    let event = repo
        .get_event(event_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("event not found".into()))?;

    let permissions = event_permissions(repo, user, &event).await?;
    if permissions.contains(required) {
        Ok(event)
    } else {
        tracing::info!(user_id = %user.id, %event_id, ?required, "event permission denied");
        Err(ApiError::forbidden())
    }
}

/// check_grant_authority
///
/// `MANAGE` holders may hand out `READ`, `WRITE` and `DELETE`. Only a principal
/// (admin or event creator) may hand out or take away `MANAGE` itself.
pub fn check_grant_authority(
    user: &AuthUser,
    event: &Event,
    caller: PermissionSet,
    permission: Permission,
) -> Result<(), ApiError> {
    let allowed = match permission {
        Permission::Manage => is_event_principal(user, event),
        _ => caller.contains(Permission::Manage),
    };
    if allowed {
        Ok(())
    } else {
        Err(ApiError::forbidden())
    }
}
