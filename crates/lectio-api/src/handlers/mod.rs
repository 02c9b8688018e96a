//! HTTP handlers.

pub mod admin;
pub mod health;
pub mod limits;
pub mod videos;
