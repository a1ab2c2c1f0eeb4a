//! Gateway: the HTTP surface in front of the auth core.
//!
//! Lifecycle:
//! 1. Load + validate config
//! 2. Open the database pool, build [`state::GatewayState`]
//! 3. Serve health, credential lifecycle, exchange, API and webhook routes
//! 4. Drain on Ctrl-C / SIGTERM, then close the pool
//!
//! Protected routes sit behind one middleware that calls the unified
//! authenticator; domain work (scanning, webhook handling) is delegated
//! through the traits in `services.rs`.

pub mod api_error;
pub mod api_routes;
pub mod auth_middleware;
pub mod auth_routes;
pub mod server;
pub mod services;
pub mod state;
pub mod webhook_routes;
