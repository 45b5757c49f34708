//! # Validation Tier Tests (T0-T4)
//!
//! End-to-end behaviour of the engine through the public API.
//!
//! ## Tiers
//! - T0: Graph identity
//! - T1: Target classification
//! - T2: Module dispatch
//! - T3: Save / load
//! - T4: Graph export

use ipscout_core::{
    Graph, GraphStore, Module, ModuleContext, ModuleError, SessionPaths, Shell, TargetType,
};
use std::cell::RefCell;
use std::fs;
use std::io::Write;
use std::rc::Rc;
use tempfile::TempDir;

// =============================================================================
// HELPERS
// =============================================================================

/// Records every effective target it is invoked with.
struct Probe {
    targets: Vec<TargetType>,
    seen: Rc<RefCell<Vec<Option<String>>>>,
}

impl Module for Probe {
    fn targets(&self) -> &[TargetType] {
        &self.targets
    }

    fn run(
        &mut self,
        target: Option<&str>,
        _args: &[String],
        out: &mut dyn Write,
    ) -> Result<(), ModuleError> {
        self.seen.borrow_mut().push(target.map(str::to_string));
        writeln!(out, "probed {}", target.unwrap_or("nothing"))?;
        Ok(())
    }
}

/// Always fails.
struct Broken;

impl Module for Broken {
    fn targets(&self) -> &[TargetType] {
        &[]
    }

    fn run(
        &mut self,
        _target: Option<&str>,
        _args: &[String],
        out: &mut dyn Write,
    ) -> Result<(), ModuleError> {
        writeln!(out, "partial output")?;
        Err(ModuleError::Failed("boom".to_string()))
    }
}

/// Needs a missing binary.
struct NoTool;

impl Module for NoTool {
    fn targets(&self) -> &[TargetType] {
        &[]
    }

    fn run(
        &mut self,
        _target: Option<&str>,
        _args: &[String],
        _out: &mut dyn Write,
    ) -> Result<(), ModuleError> {
        Err(ModuleError::ToolMissing {
            tool: "nmap".to_string(),
        })
    }
}

/// Contributes a node and an edge, then asks the host to switch target.
struct Pivot {
    ctx: ModuleContext,
}

impl Module for Pivot {
    fn targets(&self) -> &[TargetType] {
        &[TargetType::Ip]
    }

    fn run(
        &mut self,
        target: Option<&str>,
        _args: &[String],
        out: &mut dyn Write,
    ) -> Result<(), ModuleError> {
        let target = target.ok_or(ModuleError::NoTarget)?;
        self.ctx
            .link((target, "ip"), ("pivot.example", "hostname"), "reverse_dns")?;
        let next = self.ctx.request_target("pivot.example")?;
        writeln!(out, "Retargeting to: {}", next.value)?;
        Ok(())
    }
}

struct Fixture {
    _dir: TempDir,
    root: std::path::PathBuf,
    shell: Shell,
    seen: Rc<RefCell<Vec<Option<String>>>>,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path().to_path_buf();
    let paths = SessionPaths::new(root.join("log"), root.join("saves"));
    let mut shell = Shell::new(&paths, root.join("session_graph.dot")).expect("shell");
    let seen = Rc::new(RefCell::new(Vec::new()));

    let probe_seen = seen.clone();
    shell.register(
        "dnsish",
        Box::new(move |_ctx: &ModuleContext| -> Box<dyn Module> {
            Box::new(Probe {
                targets: vec![TargetType::Domain],
                seen: probe_seen.clone(),
            })
        }),
    );
    shell.register(
        "broken",
        Box::new(|_ctx: &ModuleContext| -> Box<dyn Module> { Box::new(Broken) }),
    );
    shell.register(
        "notool",
        Box::new(|_ctx: &ModuleContext| -> Box<dyn Module> { Box::new(NoTool) }),
    );
    shell.register(
        "pivot",
        Box::new(|ctx: &ModuleContext| -> Box<dyn Module> {
            Box::new(Pivot { ctx: ctx.clone() })
        }),
    );

    Fixture {
        _dir: dir,
        root,
        shell,
        seen,
    }
}

fn run(shell: &mut Shell, line: &str) -> String {
    let mut out = Vec::new();
    shell.execute(line, &mut out).expect("execute");
    String::from_utf8(out).expect("utf8")
}

fn session_log(shell: &Shell) -> String {
    shell
        .session()
        .with(|s| Ok(fs::read_to_string(s.session_log_path())?))
        .expect("session log")
}

// =============================================================================
// TIER T0: GRAPH IDENTITY
// =============================================================================

mod t0_graph_identity {
    use super::*;

    /// T0.1: Same id twice keeps one node with the second type.
    #[test]
    fn same_id_twice_keeps_last_type() {
        let mut graph = Graph::new();
        graph.add_node("example.com", "domain");
        graph.add_node("example.com", "hostname");

        assert_eq!(graph.node_count(), 1);
        assert_eq!(
            graph.node("example.com").map(|n| n.kind.as_str()),
            Some("hostname")
        );
    }

    /// T0.2: Edges auto-create their endpoints.
    #[test]
    fn edge_between_unseen_ids() {
        let mut graph = Graph::new();
        graph.add_edge("never-seen-a", "never-seen-b", "pdns", None);

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }
}

// =============================================================================
// TIER T1: CLASSIFICATION
// =============================================================================

mod t1_classification {
    use ipscout_core::{TargetType, classify};

    /// T1.1: The three reference inputs.
    #[test]
    fn reference_inputs() {
        assert_eq!(classify("http://example.com"), TargetType::Url);
        assert_eq!(classify("192.168.1.1"), TargetType::Ip);
        assert_eq!(classify("example.com"), TargetType::Domain);
    }
}

// =============================================================================
// TIER T2: DISPATCH
// =============================================================================

mod t2_dispatch {
    use super::*;

    /// T2.1: url target is coerced to its host for a domain-only module.
    #[test]
    fn url_coerced_to_domain_for_single_call() {
        let mut f = fixture();
        run(&mut f.shell, "target https://www.example.com/login?x=1");
        let output = run(&mut f.shell, "dnsish");

        assert_eq!(
            output,
            "Note: Extracted domain 'www.example.com' from URL.\nprobed www.example.com\n"
        );
        assert_eq!(
            f.seen.borrow().as_slice(),
            &[Some("www.example.com".to_string())]
        );
        let stored = f.shell.current_target().expect("target");
        assert_eq!(stored.value, "https://www.example.com/login?x=1");
        assert_eq!(stored.kind, TargetType::Url);
    }

    /// T2.2: Unknown command prints one line and mutates nothing.
    #[test]
    fn unknown_command_is_inert() {
        let mut f = fixture();
        run(&mut f.shell, "target example.com");
        let log_before = session_log(&f.shell);

        let output = run(&mut f.shell, "frobnicate --hard");

        assert_eq!(output, "Unknown command: frobnicate\n");
        assert_eq!(session_log(&f.shell), log_before);
        assert!(f.shell.graph().borrow().is_empty());
    }

    /// T2.3: A failing module is reported and the shell keeps working.
    #[test]
    fn failing_module_reported_and_shell_survives() {
        let mut f = fixture();
        let output = run(&mut f.shell, "broken");
        assert_eq!(output, "partial output\nError running broken: boom\n");

        run(&mut f.shell, "target example.com");
        assert_eq!(run(&mut f.shell, "dnsish"), "probed example.com\n");
        assert!(session_log(&f.shell).contains("[broken] Error running broken: boom"));
    }

    /// T2.4: Missing tools get their own message.
    #[test]
    fn missing_tool_message() {
        let mut f = fixture();
        assert_eq!(
            run(&mut f.shell, "notool"),
            "The 'nmap' command is not available on this system. Please install it to use this module.\n"
        );
    }

    /// T2.5: Module output is logged to both logs, tagged per line.
    #[test]
    fn output_logged_with_module_tag() {
        let mut f = fixture();
        run(&mut f.shell, "target example.com");
        run(&mut f.shell, "dnsish");

        let target_log = run(&mut f.shell, "log");
        assert!(target_log.contains("] [dnsish] probed example.com"));
        assert!(session_log(&f.shell).contains("] [dnsish] probed example.com"));
    }

    /// T2.6: A module contributes to the graph and switches target.
    #[test]
    fn module_contributes_and_retargets() {
        let mut f = fixture();
        run(&mut f.shell, "target 203.0.113.7");
        let output = run(&mut f.shell, "pivot");

        assert_eq!(output, "Retargeting to: pivot.example\n");
        assert_eq!(
            f.shell.current_target().map(|t| t.value),
            Some("pivot.example".to_string())
        );
        let graph = f.shell.graph().borrow();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.out_edges("203.0.113.7").len(), 1);
        drop(graph);

        let audit = session_log(&f.shell);
        assert!(audit.contains("[graph] Added node: 203.0.113.7 (type=ip)"));
        assert!(audit.contains("[graph] Added edge: 203.0.113.7 → pivot.example (label=reverse_dns)"));
    }

    /// T2.7: Reload keeps the graph.
    #[test]
    fn reload_keeps_graph() {
        let mut f = fixture();
        run(&mut f.shell, "target 203.0.113.7");
        run(&mut f.shell, "pivot");
        assert_eq!(run(&mut f.shell, "reload"), "Modules reloaded.\n");
        assert_eq!(f.shell.graph().borrow().node_count(), 2);
    }
}

// =============================================================================
// TIER T3: SAVE / LOAD
// =============================================================================

mod t3_save_load {
    use super::*;

    /// T3.1: save then load restores the same triple.
    #[test]
    fn save_load_roundtrip() {
        let mut f = fixture();
        run(&mut f.shell, "target example.com");
        let log_path = f
            .shell
            .session()
            .with(|s| Ok(s.target_log_path().map(|p| p.to_path_buf())))
            .expect("path")
            .expect("active log");

        assert_eq!(run(&mut f.shell, "save"), "Session saved to example.com.save.\n");
        run(&mut f.shell, "target 9.9.9.9");

        let output = run(&mut f.shell, "load");
        assert_eq!(
            output,
            "Loading latest save: example.com.save\nSession loaded for target: example.com\n"
        );
        let target = f.shell.current_target().expect("target");
        assert_eq!(target.value, "example.com");
        assert_eq!(target.kind, TargetType::Domain);
        let restored = f
            .shell
            .session()
            .with(|s| Ok(s.target_log_path().map(|p| p.to_path_buf())))
            .expect("path")
            .expect("active log");
        assert_eq!(
            fs::canonicalize(restored).expect("canon"),
            fs::canonicalize(log_path).expect("canon")
        );
    }

    /// T3.2: A save missing `target` is reported and changes nothing.
    #[test]
    fn missing_key_leaves_session_untouched() {
        let mut f = fixture();
        run(&mut f.shell, "target 8.8.4.4");
        fs::write(
            f.root.join("saves").join("bad.save"),
            "[session]\ntarget_type = \"domain\"\nlog_path = \"/tmp/x.log\"\n",
        )
        .expect("write save");

        let output = run(&mut f.shell, "load bad.save");

        assert_eq!(output, "Missing key in save file: 'target'\n");
        let target = f.shell.current_target().expect("target");
        assert_eq!(target.value, "8.8.4.4");
        assert_eq!(target.kind, TargetType::Ip);
    }

    /// T3.3: Built-in messages for missing state.
    #[test]
    fn empty_state_messages() {
        let mut f = fixture();
        assert_eq!(run(&mut f.shell, "save"), "No active investigation to save.\n");
        assert_eq!(run(&mut f.shell, "load"), "No save files found.\n");
        assert_eq!(
            run(&mut f.shell, "load ghost.save"),
            "Save file ghost.save does not exist.\n"
        );
        assert_eq!(run(&mut f.shell, "listsaves"), "No saved sessions found.\n");
        assert_eq!(run(&mut f.shell, "log"), "No log file is currently active.\n");
        assert_eq!(run(&mut f.shell, "saveas copy.log"), "No log file to save.\n");
    }

    /// T3.4: listsaves and saveas.
    #[test]
    fn listsaves_and_saveas() {
        let mut f = fixture();
        run(&mut f.shell, "target example.org");
        run(&mut f.shell, "save");

        let listing = run(&mut f.shell, "listsaves");
        assert!(listing.starts_with("Available saved sessions:\n  example.org.save (last modified: "));

        assert_eq!(run(&mut f.shell, "saveas evidence.log"), "Log saved as evidence.log.\n");
        let copy = fs::read_to_string(f.root.join("log").join("evidence.log")).expect("copy");
        assert!(copy.contains("[target] Target set to example.org (domain)"));
        assert!(copy.contains("[save] Investigation session saved."));
    }

    /// T3.5: clearlog truncates only the session log.
    #[test]
    fn clearlog_truncates_session_log() {
        let mut f = fixture();
        run(&mut f.shell, "target example.org");
        assert_eq!(run(&mut f.shell, "clearlog"), "Session log cleared.\n");
        assert!(session_log(&f.shell).is_empty());
        assert!(run(&mut f.shell, "log").contains("Target set to example.org"));
    }
}

// =============================================================================
// TIER T4: EXPORT
// =============================================================================

mod t4_export {
    use super::*;

    /// T4.1: exportgraph writes the DOT file.
    #[test]
    fn exportgraph_writes_default_file() {
        let mut f = fixture();
        run(&mut f.shell, "target 203.0.113.7");
        run(&mut f.shell, "pivot");

        let output = run(&mut f.shell, "exportgraph");
        let path = f.root.join("session_graph.dot");
        assert_eq!(output, format!("Graph exported to {}\n", path.display()));

        let dot = fs::read_to_string(path).expect("dot");
        assert!(dot.contains("\"203.0.113.7\" [label=\"203.0.113.7\", shape=box, fillcolor=\"lightblue\"];"));
        assert!(dot.contains("\"pivot.example\" [label=\"pivot.example\", shape=oval, fillcolor=\"gold\"];"));
        assert_eq!(dot.matches("[label=\"reverse_dns (").count(), 1);
    }

    /// T4.2: Explicit file name.
    #[test]
    fn exportgraph_to_named_file() {
        let mut f = fixture();
        run(&mut f.shell, "target 203.0.113.7");
        run(&mut f.shell, "pivot");
        let path = f.root.join("custom.dot");

        let output = run(&mut f.shell, &format!("exportgraph {}", path.display()));
        assert!(output.starts_with("Graph exported to "));
        assert!(path.exists());
    }
}
