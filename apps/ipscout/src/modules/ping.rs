//! `ping`: three echo requests via the system `ping`.

use super::{require_target, run_tool};
use colored::Colorize;
use ipscout_core::{Module, ModuleContext, ModuleError, TargetType, classify};
use std::io::Write;

const TARGETS: &[TargetType] = &[TargetType::Ip, TargetType::Domain];

const HELP: &str = "ping: Send 3 ICMP packets to the target and return the response.\n\
Usage: ping\n\
Supported target types: IP, domain";

/// Count flag differs on Windows.
const COUNT_FLAG: &str = if cfg!(windows) { "-n" } else { "-c" };

pub struct Ping {
    ctx: ModuleContext,
}

impl Ping {
    pub fn new(ctx: ModuleContext) -> Self {
        Self { ctx }
    }
}

impl Module for Ping {
    fn targets(&self) -> &[TargetType] {
        TARGETS
    }

    fn help(&self) -> &str {
        HELP
    }

    fn run(
        &mut self,
        target: Option<&str>,
        _args: &[String],
        out: &mut dyn Write,
    ) -> Result<(), ModuleError> {
        let target = require_target(target)?;
        writeln!(out, "Pinging {target} with 3 packets...\n")?;

        let output = run_tool("ping", &[COUNT_FLAG, "3", target])?;
        writeln!(out, "{}", String::from_utf8_lossy(&output.stdout))?;
        if !output.status.success() {
            writeln!(out, "{} {}", "Ping failed:".red(), output.status)?;
        }

        self.ctx.link(
            (target, classify(target).as_str()),
            ("ping", "tool"),
            "ping",
        )?;
        Ok(())
    }
}
