//! # Module Contribution Contract
//!
//! Every investigative adapter implements [`Module`]. Adapters are built by
//! a [`ModuleFactory`] that receives a [`ModuleContext`]: the shared graph
//! plus a narrow [`Host`] callback interface. Nothing is injected after
//! construction.
//!
//! The [`Registry`] maps command names to factories and live instances.
//! `reload` rebuilds the instances from the factories; the graph is not
//! part of a module's state and survives a reload.

use crate::graph::{GraphStore, SharedGraph};
use crate::primitives::edge_timestamp;
use crate::{ModuleError, ReconError, Target, TargetType};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

// =============================================================================
// HOST INTERFACE
// =============================================================================

/// Callbacks a module may make into the shell.
pub trait Host {
    /// Append text to both investigation logs, tagged with `module`.
    fn log(&self, text: &str, module: Option<&str>) -> Result<(), ReconError>;

    /// Append to the graph audit trail in the session log.
    fn log_graph(&self, message: &str) -> Result<(), ReconError>;

    /// Switch the session to a new target, exactly like `target <value>`.
    fn request_target(&self, value: &str) -> Result<Target, ReconError>;

    /// Path of the active per-target log, if one is open.
    fn target_log_path(&self) -> Option<PathBuf>;

    /// The log directory.
    fn log_dir(&self) -> PathBuf;
}

/// Shared handle to the host.
pub type HostHandle = Rc<dyn Host>;

// =============================================================================
// MODULE TRAIT
// =============================================================================

/// An investigative adapter.
pub trait Module {
    /// Target types accepted. Empty means runnable without a target.
    fn targets(&self) -> &[TargetType];

    /// Static usage text.
    fn help(&self) -> &str {
        ""
    }

    /// Run against `target` (the effective target for this call).
    ///
    /// Everything written to `out` is echoed and logged by the caller.
    fn run(
        &mut self,
        target: Option<&str>,
        args: &[String],
        out: &mut dyn Write,
    ) -> Result<(), ModuleError>;
}

// =============================================================================
// MODULE CONTEXT
// =============================================================================

/// What every module receives at construction.
#[derive(Clone)]
pub struct ModuleContext {
    graph: SharedGraph,
    host: HostHandle,
}

impl ModuleContext {
    #[must_use]
    pub fn new(graph: SharedGraph, host: HostHandle) -> Self {
        Self { graph, host }
    }

    /// The shared graph.
    #[must_use]
    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    /// The host callbacks.
    #[must_use]
    pub fn host(&self) -> &HostHandle {
        &self.host
    }

    /// Add or retype a node and record it in the audit trail.
    pub fn add_node(&self, id: &str, kind: &str) -> Result<(), ReconError> {
        self.graph
            .try_borrow_mut()
            .map_err(|_| ReconError::Busy("graph"))?
            .add_node(id, kind);
        self.host
            .log_graph(&format!("Added node: {id} (type={kind})"))
    }

    /// Append an edge stamped with the current time and record it.
    pub fn add_edge(&self, source: &str, target: &str, label: &str) -> Result<(), ReconError> {
        let timestamp = edge_timestamp();
        self.graph
            .try_borrow_mut()
            .map_err(|_| ReconError::Busy("graph"))?
            .add_edge(source, target, label, Some(&timestamp));
        self.host
            .log_graph(&format!("Added edge: {source} → {target} (label={label})"))
    }

    /// Typed source and target nodes joined by one edge.
    pub fn link(
        &self,
        (source, source_kind): (&str, &str),
        (target, target_kind): (&str, &str),
        label: &str,
    ) -> Result<(), ReconError> {
        self.add_node(source, source_kind)?;
        self.add_node(target, target_kind)?;
        self.add_edge(source, target, label)
    }

    /// Log through the host.
    pub fn log(&self, text: &str, module: Option<&str>) -> Result<(), ReconError> {
        self.host.log(text, module)
    }

    /// Request a target switch through the host.
    pub fn request_target(&self, value: &str) -> Result<Target, ReconError> {
        self.host.request_target(value)
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Builds a module instance from its context.
pub type ModuleFactory = Box<dyn Fn(&ModuleContext) -> Box<dyn Module>>;

struct Entry {
    factory: ModuleFactory,
    instance: Box<dyn Module>,
}

/// Explicit command-name to module mapping.
///
/// Names iterate in sorted order.
pub struct Registry {
    context: ModuleContext,
    entries: BTreeMap<String, Entry>,
}

impl Registry {
    #[must_use]
    pub fn new(context: ModuleContext) -> Self {
        Self {
            context,
            entries: BTreeMap::new(),
        }
    }

    /// Register a factory and build its first instance.
    ///
    /// Replaces any module already registered under `name`.
    pub fn register(&mut self, name: impl Into<String>, factory: ModuleFactory) {
        let name = name.into();
        let instance = factory(&self.context);
        tracing::debug!(module = %name, "module registered");
        self.entries.insert(name, Entry { factory, instance });
    }

    /// Rebuild every instance from its factory.
    pub fn reload(&mut self) {
        for entry in self.entries.values_mut() {
            entry.instance = (entry.factory)(&self.context);
        }
        tracing::debug!(count = self.entries.len(), "modules reloaded");
    }

    /// Look up a live instance.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn Module + 'static)> {
        self.entries.get_mut(name).map(|e| e.instance.as_mut())
    }

    /// Look up a live instance for reading.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn Module> {
        self.entries.get(name).map(|e| e.instance.as_ref())
    }

    /// `(name, module)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Module)> {
        self.entries
            .iter()
            .map(|(name, e)| (name.as_str(), e.instance.as_ref()))
    }

    /// Number of registered modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct RecordingHost {
        graph_lines: RefCell<Vec<String>>,
    }

    impl Host for RecordingHost {
        fn log(&self, _text: &str, _module: Option<&str>) -> Result<(), ReconError> {
            Ok(())
        }

        fn log_graph(&self, message: &str) -> Result<(), ReconError> {
            self.graph_lines.borrow_mut().push(message.to_string());
            Ok(())
        }

        fn request_target(&self, value: &str) -> Result<Target, ReconError> {
            Ok(Target::new(value))
        }

        fn target_log_path(&self) -> Option<PathBuf> {
            None
        }

        fn log_dir(&self) -> PathBuf {
            PathBuf::from("log")
        }
    }

    struct Counter {
        runs: usize,
    }

    impl Module for Counter {
        fn targets(&self) -> &[TargetType] {
            &[]
        }

        fn run(
            &mut self,
            _target: Option<&str>,
            _args: &[String],
            out: &mut dyn Write,
        ) -> Result<(), ModuleError> {
            self.runs = self.runs.saturating_add(1);
            writeln!(out, "run {}", self.runs)?;
            Ok(())
        }
    }

    fn context() -> (ModuleContext, Rc<RecordingHost>) {
        let host = Rc::new(RecordingHost::default());
        let handle: HostHandle = host.clone();
        (ModuleContext::new(Graph::shared(), handle), host)
    }

    #[test]
    fn link_adds_typed_nodes_and_audits() {
        let (ctx, host) = context();
        ctx.link(("1.1.1.1", "ip"), ("one.one.one.one", "hostname"), "reverse_dns")
            .expect("link");

        let graph = ctx.graph().borrow();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        let edge = graph.edges().next().expect("edge");
        assert!(edge.timestamp.is_some());

        let lines = host.graph_lines.borrow();
        assert_eq!(lines[0], "Added node: 1.1.1.1 (type=ip)");
        assert_eq!(
            lines[2],
            "Added edge: 1.1.1.1 → one.one.one.one (label=reverse_dns)"
        );
    }

    #[test]
    fn graph_borrow_conflict_is_reported() {
        let (ctx, _host) = context();
        let _held = ctx.graph().borrow_mut();
        assert!(matches!(
            ctx.add_node("x", "ip"),
            Err(ReconError::Busy("graph"))
        ));
    }

    #[test]
    fn reload_rebuilds_instances_but_keeps_graph() {
        let (ctx, _host) = context();
        let builds = Rc::new(Cell::new(0usize));
        let counter = builds.clone();
        let mut registry = Registry::new(ctx.clone());
        registry.register(
            "count",
            Box::new(move |_ctx: &ModuleContext| -> Box<dyn Module> {
                counter.set(counter.get().saturating_add(1));
                Box::new(Counter { runs: 0 })
            }),
        );
        ctx.add_node("kept", "domain").expect("node");

        let mut out = Vec::new();
        let module = registry.get_mut("count").expect("registered");
        module.run(None, &[], &mut out).expect("run");
        module.run(None, &[], &mut out).expect("run");
        registry.reload();
        registry
            .get_mut("count")
            .expect("registered")
            .run(None, &[], &mut out)
            .expect("run");

        assert_eq!(String::from_utf8_lossy(&out), "run 1\nrun 2\nrun 1\n");
        assert_eq!(builds.get(), 2);
        assert!(ctx.graph().borrow().contains_node("kept"));
    }

    #[test]
    fn registry_iterates_in_name_order() {
        let (ctx, _host) = context();
        let mut registry = Registry::new(ctx);
        for name in ["zeta", "alpha", "mid"] {
            registry.register(
                name,
                Box::new(|_ctx: &ModuleContext| -> Box<dyn Module> {
                    Box::new(Counter { runs: 0 })
                }),
            );
        }
        let names: Vec<_> = registry.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
        assert_eq!(registry.len(), 3);
        assert!(registry.get("missing").is_none());
    }
}
