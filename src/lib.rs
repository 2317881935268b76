//! Credential lifecycle and comment-thread engine for a Reddit client.
//!
//! [`storage::CredentialStore`] hands out bearer tokens, refreshing them as
//! they go stale and wiping identity when a refresh is rejected.
//! [`comments`] turns the nested comment listing into a flat, collapse-aware
//! display sequence.

pub mod auth;
pub mod comments;
pub mod config;
pub mod reddit;
pub mod storage;
