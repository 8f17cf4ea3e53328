//! ClaimCompass: vehicle damage assessment from a single photo.
//!
//! The service half ([`server`]) accepts an uploaded image or an image URL,
//! normalises it ([`imaging`]) and asks a vision model ([`vision`]) for a
//! structured assessment. The [`client`] half validates submissions, drives
//! the form's view state and renders downloadable reports.

pub mod client;
pub mod config;
pub mod error;
pub mod imaging;
pub mod models;
pub mod server;
pub mod vision;
