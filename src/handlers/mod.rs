//! HTTP request handlers

pub mod fs;
pub mod health;
