//! Routers segregated by audience. Each protected router is wrapped in
//! `rbac::enforce_roles` with its allowed role set in `create_router`, so a
//! handler is never reachable by a role outside that set.

/// No session required.
pub mod public;

/// Any signed-in role.
pub mod authenticated;

/// Admin and organizer roles. Per-event permissions are checked in handlers.
pub mod organizer;

/// Faculty role only.
pub mod faculty;

/// Admin role only. Nested under `/admin`.
pub mod admin;
