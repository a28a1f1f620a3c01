//! Example HTTP surface for the `TrackCore` order tracking library
//!
//! [`api`] maps the tracking service onto a small REST API with axum;
//! [`settings`] reads configuration overrides from the environment. The
//! `tracking_api` example wires both together over the in-memory store.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
// These are examples, so we don't need to be as pedantic
#![allow(clippy::missing_const_for_fn)]

pub mod api;
pub mod settings;

pub use api::{create_app, AppState};
pub use settings::config_from_env;
