//! Data models for fragments, tables and configuration.

pub mod config;
pub mod fragment;
pub mod table;
