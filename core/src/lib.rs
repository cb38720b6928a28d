//! Complaint lifecycle and notification broadcast engine.
//!
//! Leaves first:
//!   lifecycle: legal status transitions and who may take them
//!   resolver: who is told about a status change
//!   render: what they are told, per role and locale
//!   coordinator: resolve, render and send to everyone, settle-all
//!   hooks: fire-and-forget entry points for the CRUD layer
//!   desk: reference CRUD caller (validate, persist, notify)

pub mod branding;
pub mod complaint;
pub mod config;
pub mod coordinator;
pub mod desk;
pub mod error;
pub mod event;
pub mod hooks;
pub mod lifecycle;
pub mod render;
pub mod resolver;
pub mod store;
pub mod transport;
pub mod types;
