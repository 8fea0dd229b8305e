//! Request authentication for the ingest service
//!
//! Callers present the access token issued by the hosted auth API as
//! `Authorization: Bearer <token>`; the token is verified against the
//! auth API on each request.

mod middleware;

pub use middleware::{BearerToken, CurrentUser, authenticate};
