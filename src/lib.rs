//! Yatube: a small social blogging service.
//!
//! Layout follows the usual layering: `domain` holds entities and invariants,
//! `application` the services and repository traits, `infra` the Postgres,
//! HTTP and filesystem adapters, `presentation` the askama views, and `cache`
//! the short-lived page cache in front of the global feed.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
