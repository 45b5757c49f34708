//! # Dispatch Engine
//!
//! The `Shell` owns the session, the shared graph and the module registry,
//! and turns one command line into one action.
//!
//! Module dispatch:
//! 1. tokenize on whitespace; first token names the module
//! 2. unknown name => `Unknown command: <name>`, nothing else happens
//! 3. modules with no accepted types run with whatever target is set
//! 4. otherwise require a target and check compatibility, coercing a
//!    `url` target to its host for modules that accept `domain`
//! 5. run with output captured into a buffer
//! 6. echo the buffer, then log it tagged with the module name
//!
//! No session borrow is held while a module runs, so modules may call
//! back into the host (including a target switch) at any point.

use crate::export::write_dot;
use crate::graph::{Graph, SharedGraph};
use crate::module::{HostHandle, ModuleContext, ModuleFactory, Registry};
use crate::session::{Session, SessionHandle, SessionPaths};
use crate::target::extract_hostname;
use crate::{ModuleError, ReconError, Target, TargetType};
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

/// Built-in command lines shown by `help`.
const BUILTIN_HELP: &[&str] = &[
    "  target <IP|domain|url>",
    "  reload",
    "  log",
    "  save",
    "  load [filename]",
    "  saveas <filename>",
    "  clearlog",
    "  listsaves",
    "  exportgraph [filename]     (export session graph as .dot)",
    "  help <module>",
    "  exit",
];

/// What the caller should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Exit,
}

/// The interactive investigation shell.
pub struct Shell {
    session: SessionHandle,
    graph: SharedGraph,
    registry: Registry,
    graph_file: PathBuf,
}

impl Shell {
    /// Open a session under `paths` with an empty graph and no modules.
    pub fn new(paths: &SessionPaths, graph_file: impl Into<PathBuf>) -> Result<Self, ReconError> {
        let session = SessionHandle::new(Session::open(paths)?);
        let graph = Graph::shared();
        let host: HostHandle = Rc::new(session.clone());
        let registry = Registry::new(ModuleContext::new(graph.clone(), host));
        Ok(Self {
            session,
            graph,
            registry,
            graph_file: graph_file.into(),
        })
    }

    /// Register a module under `name`.
    pub fn register(&mut self, name: impl Into<String>, factory: ModuleFactory) {
        self.registry.register(name, factory);
    }

    /// The registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The shared graph.
    #[must_use]
    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    /// The session handle.
    #[must_use]
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Current target, if any.
    #[must_use]
    pub fn current_target(&self) -> Option<Target> {
        self.session.target()
    }

    /// Prompt text, without colour.
    #[must_use]
    pub fn prompt(&self) -> String {
        match self.current_target() {
            Some(t) => format!("[target ({}): {}] > ", t.kind, t.value),
            None => "[target: none] > ".to_string(),
        }
    }

    /// Execute one command line.
    ///
    /// Command failures are reported on `out` and never returned; the only
    /// error is failing to write to `out` itself.
    pub fn execute(&mut self, line: &str, out: &mut dyn Write) -> Result<Control, ReconError> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        match name {
            "" => {}
            "target" => self.cmd_target(rest, out)?,
            "reload" => {
                self.registry.reload();
                writeln!(out, "Modules reloaded.")?;
            }
            "log" => self.cmd_log(out)?,
            "save" => self.cmd_save(out)?,
            "load" => self.cmd_load(rest, out)?,
            "saveas" => self.cmd_saveas(rest, out)?,
            "clearlog" => match self.session.with(Session::clear_session_log) {
                Ok(()) => writeln!(out, "Session log cleared.")?,
                Err(e) => writeln!(out, "{e}")?,
            },
            "listsaves" => self.cmd_listsaves(out)?,
            "exportgraph" => self.cmd_exportgraph(rest, out)?,
            "help" | "?" => self.cmd_help(rest, out)?,
            "exit" | "quit" | "EOF" => {
                self.shutdown(out)?;
                return Ok(Control::Exit);
            }
            _ => self.dispatch(line, out)?,
        }
        Ok(Control::Continue)
    }

    /// Print `Exiting.` and flush and close both logs.
    pub fn shutdown(&mut self, out: &mut dyn Write) -> Result<(), ReconError> {
        writeln!(out, "Exiting.")?;
        if let Err(e) = self.session.close() {
            tracing::warn!(error = %e, "failed to close logs");
        }
        Ok(())
    }

    // =========================================================================
    // MODULE DISPATCH
    // =========================================================================

    /// Run a module command line.
    pub fn dispatch(&mut self, line: &str, out: &mut dyn Write) -> Result<(), ReconError> {
        let mut tokens = line.split_whitespace();
        let Some(name) = tokens.next() else {
            return Ok(());
        };
        let args: Vec<String> = tokens.map(str::to_string).collect();

        let Some(accepted) = self.registry.get(name).map(|m| m.targets().to_vec()) else {
            tracing::debug!(command = name, "unknown command");
            writeln!(out, "{}", ReconError::UnknownCommand(name.to_string()))?;
            return Ok(());
        };

        let current = self.session.target();
        let effective = if accepted.is_empty() {
            current.map(|t| t.value)
        } else {
            match resolve_target(current.as_ref(), &accepted) {
                Ok(Resolved::Direct(value)) => Some(value),
                Ok(Resolved::Coerced(host)) => {
                    writeln!(out, "Note: Extracted domain '{host}' from URL.")?;
                    Some(host)
                }
                Err(e) => {
                    tracing::debug!(command = name, reason = %e, "dispatch refused");
                    writeln!(out, "{e}")?;
                    return Ok(());
                }
            }
        };

        let mut buffer: Vec<u8> = Vec::new();
        if let Some(module) = self.registry.get_mut(name) {
            tracing::debug!(command = name, target = ?effective, "running module");
            if let Err(e) = module.run(effective.as_deref(), &args, &mut buffer) {
                tracing::debug!(command = name, error = %e, "module failed");
                report_failure(name, &e, &mut buffer)?;
            }
        }

        out.write_all(&buffer)?;
        out.flush()?;

        let output = String::from_utf8_lossy(&buffer);
        if let Err(e) = self.session.with(|s| s.log(&output, Some(name))) {
            tracing::warn!(command = name, error = %e, "failed to log module output");
        }
        Ok(())
    }

    // =========================================================================
    // BUILT-INS
    // =========================================================================

    fn cmd_target(&mut self, value: &str, out: &mut dyn Write) -> Result<(), ReconError> {
        if value.is_empty() {
            writeln!(out, "Usage: target <IP|domain|url>")?;
            return Ok(());
        }
        if let Err(e) = self.session.with(|s| s.set_target(value).map(|_| ())) {
            writeln!(out, "{e}")?;
        }
        Ok(())
    }

    fn cmd_log(&mut self, out: &mut dyn Write) -> Result<(), ReconError> {
        match self.session.with(Session::read_target_log) {
            Ok(text) => writeln!(out, "{text}")?,
            Err(e) => writeln!(out, "{e}")?,
        }
        Ok(())
    }

    fn cmd_save(&mut self, out: &mut dyn Write) -> Result<(), ReconError> {
        match self.session.with(Session::save) {
            Ok(path) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                writeln!(out, "Session saved to {name}.")?;
            }
            Err(e) => writeln!(out, "{e}")?,
        }
        Ok(())
    }

    fn cmd_load(&mut self, name: &str, out: &mut dyn Write) -> Result<(), ReconError> {
        let requested = (!name.is_empty()).then_some(name);
        if requested.is_none() {
            match self.session.with(|s| {
                s.list_saves()
                    .map(|saves| saves.into_iter().next().map(|e| e.name))
            }) {
                Ok(Some(latest)) => writeln!(out, "Loading latest save: {latest}")?,
                Ok(None) => {}
                Err(e) => {
                    writeln!(out, "{e}")?;
                    return Ok(());
                }
            }
        }
        match self.session.with(|s| s.load(requested)) {
            Ok(target) => writeln!(out, "Session loaded for target: {}", target.value)?,
            Err(e) => writeln!(out, "{e}")?,
        }
        Ok(())
    }

    fn cmd_saveas(&mut self, file_name: &str, out: &mut dyn Write) -> Result<(), ReconError> {
        if file_name.is_empty() {
            writeln!(out, "Usage: saveas <filename>")?;
            return Ok(());
        }
        match self.session.with(|s| s.save_log_as(file_name)) {
            Ok(_) => writeln!(out, "Log saved as {file_name}.")?,
            Err(ReconError::NoActiveLog) => writeln!(out, "No log file to save.")?,
            Err(e) => writeln!(out, "{e}")?,
        }
        Ok(())
    }

    fn cmd_listsaves(&mut self, out: &mut dyn Write) -> Result<(), ReconError> {
        let saves = match self.session.with(|s| s.list_saves()) {
            Ok(saves) => saves,
            Err(e) => {
                writeln!(out, "{e}")?;
                return Ok(());
            }
        };
        if saves.is_empty() {
            writeln!(out, "No saved sessions found.")?;
            return Ok(());
        }
        writeln!(out, "Available saved sessions:")?;
        for save in &saves {
            writeln!(
                out,
                "  {} (last modified: {})",
                save.name,
                save.modified_display()
            )?;
        }
        Ok(())
    }

    fn cmd_exportgraph(&mut self, file: &str, out: &mut dyn Write) -> Result<(), ReconError> {
        let path = if file.is_empty() {
            self.graph_file.clone()
        } else {
            PathBuf::from(file)
        };
        let graph = self
            .graph
            .try_borrow()
            .map_err(|_| ReconError::Busy("graph"))?;
        if graph.is_empty() {
            writeln!(out, "No graph to export.")?;
            return Ok(());
        }
        match write_dot(&graph, &path) {
            Ok(()) => writeln!(out, "Graph exported to {}", path.display())?,
            Err(e) => writeln!(out, "{e}")?,
        }
        Ok(())
    }

    fn cmd_help(&self, topic: &str, out: &mut dyn Write) -> Result<(), ReconError> {
        if !topic.is_empty() {
            match self.registry.get(topic).map(|m| m.help()) {
                Some(help) if !help.is_empty() => writeln!(out, "{help}")?,
                _ => writeln!(out, "No help available for '{topic}'")?,
            }
            return Ok(());
        }
        writeln!(out, "Available commands:")?;
        for line in BUILTIN_HELP {
            writeln!(out, "{line}")?;
        }
        writeln!(out)?;
        writeln!(out, "Available modules:")?;
        if self.registry.is_empty() {
            writeln!(out, "  (none enabled)")?;
        }
        for (name, module) in self.registry.iter() {
            let targets: Vec<&str> = module.targets().iter().map(|t| t.as_str()).collect();
            writeln!(out, "  {name:<12} [{}]", targets.join(", "))?;
        }
        Ok(())
    }
}

// =============================================================================
// TARGET RESOLUTION
// =============================================================================

enum Resolved {
    Direct(String),
    Coerced(String),
}

/// Effective target for a module accepting `accepted` (non-empty).
fn resolve_target(current: Option<&Target>, accepted: &[TargetType]) -> Result<Resolved, ReconError> {
    let target = current.ok_or(ReconError::NoTarget)?;
    if accepted.contains(&target.kind) {
        return Ok(Resolved::Direct(target.value.clone()));
    }
    if target.kind == TargetType::Url && accepted.contains(&TargetType::Domain) {
        return extract_hostname(&target.value)
            .map(Resolved::Coerced)
            .ok_or(ReconError::HostExtraction);
    }
    Err(ReconError::IncompatibleTarget(target.kind))
}

fn report_failure(name: &str, error: &ModuleError, buffer: &mut Vec<u8>) -> Result<(), ReconError> {
    match error {
        ModuleError::ToolMissing { .. } => writeln!(buffer, "{error}")?,
        _ => writeln!(buffer, "Error running {name}: {error}")?,
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
