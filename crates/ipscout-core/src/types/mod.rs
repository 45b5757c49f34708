//! # Core Type Definitions
//!
//! This module contains the shared types of the ipscout engine:
//! - Target classification (`TargetType`, `Target`)
//! - Error types (`ReconError`, `ModuleError`)
//!
//! ## Error Taxonomy
//!
//! - User input errors (unknown command, missing or incompatible target)
//! - Module execution errors (anything a module's `run` returns)
//! - Resource errors (log directory, save files, missing save keys)
//! - External tool absence (`ModuleError::ToolMissing`)
//!
//! None of these terminate the interactive session.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// TARGET TYPE
// =============================================================================

/// Classification of an investigation subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    /// Dotted-quad IPv4 address.
    Ip,
    /// Anything that is neither a URL nor an IPv4 literal.
    Domain,
    /// `http://` or `https://` URL.
    Url,
}

impl TargetType {
    /// All target types, in display order.
    pub const ALL: [TargetType; 3] = [TargetType::Ip, TargetType::Domain, TargetType::Url];

    /// Lowercase name used in prompts, save files and help output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Domain => "domain",
            Self::Url => "url",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetType {
    type Err = ReconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ip" => Ok(Self::Ip),
            "domain" => Ok(Self::Domain),
            "url" => Ok(Self::Url),
            other => Err(ReconError::UnknownTargetType(other.to_string())),
        }
    }
}

// =============================================================================
// TARGET
// =============================================================================

/// The current investigation subject and its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// The literal value the user entered.
    pub value: String,
    /// The type derived from `value`.
    pub kind: TargetType,
}

impl Target {
    /// Create a target, classifying the value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let kind = crate::target::classify(&value);
        Self { value, kind }
    }

    /// Create a target with an already-known type (used when restoring saves).
    #[must_use]
    pub fn with_kind(value: impl Into<String>, kind: TargetType) -> Self {
        Self {
            value: value.into(),
            kind,
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors raised by the ipscout engine.
///
/// The Display text of each variant is the exact line shown to the user.
#[derive(Debug, Error)]
pub enum ReconError {
    /// No module or built-in is registered under this name.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// The module needs a target and none is set.
    #[error("Please set a target first using the 'target' command.")]
    NoTarget,

    /// The module does not accept the current target type.
    #[error("This module does not support targets of type '{0}'.")]
    IncompatibleTarget(TargetType),

    /// URL to domain coercion failed because the URL has no host.
    #[error("Could not extract domain from URL.")]
    HostExtraction,

    /// A target type string could not be parsed.
    #[error("Unknown target type: {0}")]
    UnknownTargetType(String),

    /// A save record lacks a required key.
    #[error("Missing key in save file: '{0}'")]
    MissingSaveKey(String),

    /// The named save file does not exist.
    #[error("Save file {0} does not exist.")]
    SaveNotFound(String),

    /// `load` was called without a name and there are no saves.
    #[error("No save files found.")]
    NoSaves,

    /// An operation needs the per-target log and none is open.
    #[error("No log file is currently active.")]
    NoActiveLog,

    /// `save` was called without a target.
    #[error("No active investigation to save.")]
    NoActiveInvestigation,

    /// A shared resource is already borrowed (re-entrant access).
    #[error("{0} is already in use")]
    Busy(&'static str),

    /// The configuration file could not be read or parsed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for ReconError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

/// Errors returned by a module's `run`.
///
/// Caught at the dispatch boundary. `ToolMissing` is rendered on its own;
/// every other variant as `Error running <module>: <message>`.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// A required system utility is not installed.
    #[error("The '{tool}' command is not available on this system. Please install it to use this module.")]
    ToolMissing {
        /// Executable name that could not be spawned.
        tool: String,
    },

    /// The module needs an API key that is not configured.
    #[error("{service} API key not configured")]
    MissingApiKey {
        /// Human-readable service name.
        service: String,
    },

    /// Remote service answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// Transport-level HTTP failure.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// A response or tool output could not be interpreted.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Module needs a target but was invoked without one.
    #[error("no target given")]
    NoTarget,

    /// Generic failure with a message.
    #[error("{0}")]
    Failed(String),

    /// Writing module output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An engine operation requested by the module failed.
    #[error(transparent)]
    Core(#[from] ReconError),
}

// =============================================================================
// TESTS
// =============================================================================
