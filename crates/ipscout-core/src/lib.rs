//! # ipscout-core
//!
//! The investigation engine for ipscout - THE LOGIC.
//!
//! Investigative modules contribute typed nodes and timestamped edges into
//! one shared evidence graph. This crate holds that graph, the contract
//! modules implement, and the session/log/save state machine that decides
//! which modules may run and where their output goes.
//!
//! ## Architectural Constraints
//!
//! - Single-threaded and synchronous: one command runs to completion
//!   before the next is read
//! - Has NO network code and NO async; adapters live in the binary
//! - Modules never mutate session state directly; they ask the host

// =============================================================================
// MODULES
// =============================================================================

pub mod dispatch;
pub mod export;
pub mod graph;
pub mod log;
pub mod module;
pub mod primitives;
pub mod save;
pub mod session;
pub mod target;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{ModuleError, ReconError, Target, TargetType};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use dispatch::{Control, Shell};
pub use export::{NodeStyle, export_dot, style_for, write_dot};
pub use graph::{Graph, GraphEdge, GraphNode, GraphStore, SharedGraph};
pub use log::{LogBook, strip_ansi};
pub use module::{Host, HostHandle, Module, ModuleContext, ModuleFactory, Registry};
pub use save::{SaveEntry, SaveRecord, SaveStore};
pub use session::{Session, SessionHandle, SessionPaths};
pub use target::{classify, extract_hostname, sanitize};
