//! # ipscout
//!
//! The application side of the reconnaissance shell: command-line
//! arguments, layered configuration and the investigative modules that
//! plug into [`ipscout_core::Shell`].

pub mod cli;
pub mod config;
pub mod modules;
