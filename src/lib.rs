//! Envforge - secrets for a self-hosted stack
//!
//! Generates database passwords, an HS256 signing secret and the API keys
//! signed with it, then writes them into an existing `.env` file without
//! touching any other line.

#![allow(missing_docs)]

pub mod boot;
pub mod cli;
pub mod commands;
pub mod config;
pub mod env_file;
pub mod environment;
pub mod error;
pub mod generator;
pub mod jwt;
pub mod random;
pub mod secrets;
pub mod setup_tracing;
