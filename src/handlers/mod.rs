//! HTTP handlers, grouped by audience.
//!
//! Handlers assume the router's role guard already ran. Anything scoped to a
//! single event additionally goes through `rbac::require_event_permission`.

pub mod admin;
pub mod auth;
pub mod catalog;
pub mod events;
pub mod exports;
pub mod faculty;
pub mod permissions;
pub mod sessions;
