//! REST front end for the group purchase settlement engine.
//!
//! The server is a thin layer: request bodies deserialize into engine calls, engine errors map onto HTTP
//! statuses, and a background worker runs the expiration sweep on an interval. Authentication happens upstream;
//! requests arrive carrying an opaque, already-verified user id.
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod routes;
pub mod server;
pub mod sweep_worker;
