//! Comment service for tweets: durable storage, a read-through cache and
//! image attachments behind a small JSON API.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
