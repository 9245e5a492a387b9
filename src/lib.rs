//! Blogicum - a small multi-user blog
//!
//! Authors publish posts that can be scheduled, filed under a category and
//! tagged with a location; readers comment on them. This library provides
//! everything the `blogicum` binary serves.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod theme;
