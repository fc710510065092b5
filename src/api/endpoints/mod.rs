//! Endpoint handlers, one module per resource.

pub mod advisor;
pub mod health;
pub mod profile;
pub mod reminders;
pub mod sos;
