//! # DNS Lookup Module
//!
//! Reverse lookup for IP targets; A, AAAA, MX, NS, TXT, CNAME and SOA
//! lookups for domains. Each record type is asked of a public resolver
//! pair first and the system resolver second.

use super::require_target;
use colored::Colorize;
use hickory_resolver::Resolver;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::proto::rr::RecordType;
use ipscout_core::{Module, ModuleContext, ModuleError, TargetType};
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

const TARGETS: &[TargetType] = &[TargetType::Ip, TargetType::Domain];

const HELP: &str = "dnslookup: Perform DNS lookups on domains or reverse lookups on IPs.\n\
Usage: dnslookup\n\
Supported target types: IP, domain";

/// Record types queried for a domain, in display order.
pub const RECORD_TYPES: [RecordType; 7] = [
    RecordType::A,
    RecordType::AAAA,
    RecordType::MX,
    RecordType::NS,
    RecordType::TXT,
    RecordType::CNAME,
    RecordType::SOA,
];

const PUBLIC_NAMESERVERS: [IpAddr; 2] = [
    IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)),
    IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
];
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a source produced no answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupFailure {
    /// Authoritative NXDOMAIN.
    NoSuchDomain,
    /// Timeout, refused, unreachable resolver and the like.
    Unavailable(String),
}

/// Something that answers DNS questions.
pub trait RecordSource {
    /// Name shown next to the records it returned.
    fn label(&self) -> &str;

    /// Record data of type `rtype` for `domain`; empty when none exist.
    fn records(&self, domain: &str, rtype: RecordType) -> Result<Vec<String>, LookupFailure>;

    /// PTR names for `ip`, without the trailing dot.
    fn reverse(&self, ip: IpAddr) -> Result<Vec<String>, LookupFailure>;
}

/// A hickory resolver with a display label.
pub struct HickorySource {
    label: &'static str,
    resolver: Resolver,
}

impl HickorySource {
    fn options() -> ResolverOpts {
        let mut opts = ResolverOpts::default();
        opts.timeout = LOOKUP_TIMEOUT;
        opts.attempts = 1;
        opts
    }

    /// Cloudflare and Google over plain UDP/TCP.
    pub fn public() -> std::io::Result<Self> {
        let group = NameServerConfigGroup::from_ips_clear(&PUBLIC_NAMESERVERS, 53, true);
        let config = ResolverConfig::from_parts(None, Vec::new(), group);
        Ok(Self {
            label: "Primary",
            resolver: Resolver::new(config, Self::options())?,
        })
    }

    /// Whatever the host's resolver configuration says.
    pub fn system() -> std::io::Result<Self> {
        Ok(Self {
            label: "Fallback",
            resolver: Resolver::from_system_conf()?,
        })
    }
}

fn classify_error(err: &ResolveError) -> Option<LookupFailure> {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. }
            if *response_code == ResponseCode::NXDomain =>
        {
            Some(LookupFailure::NoSuchDomain)
        }
        ResolveErrorKind::NoRecordsFound { .. } => None,
        _ => Some(LookupFailure::Unavailable(err.to_string())),
    }
}

impl RecordSource for HickorySource {
    fn label(&self) -> &str {
        self.label
    }

    fn records(&self, domain: &str, rtype: RecordType) -> Result<Vec<String>, LookupFailure> {
        match self.resolver.lookup(domain, rtype) {
            Ok(lookup) => Ok(lookup
                .iter()
                .filter(|data| data.record_type() == rtype)
                .map(ToString::to_string)
                .collect()),
            Err(e) => classify_error(&e).map_or(Ok(Vec::new()), Err),
        }
    }

    fn reverse(&self, ip: IpAddr) -> Result<Vec<String>, LookupFailure> {
        match self.resolver.reverse_lookup(ip) {
            Ok(names) => Ok(names
                .iter()
                .map(|name| name.to_string().trim_end_matches('.').to_string())
                .collect()),
            Err(e) => classify_error(&e).map_or(Ok(Vec::new()), Err),
        }
    }
}

/// What happened for one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Found {
        rtype: RecordType,
        source: String,
        values: Vec<String>,
    },
    Missing(RecordType),
    /// The domain does not exist; nothing further was asked.
    NoSuchDomain,
}

/// Ask each source in turn for every record type until one answers.
pub fn forward_lookup(sources: &[Box<dyn RecordSource>], domain: &str) -> Vec<RecordOutcome> {
    let mut outcomes = Vec::new();
    'types: for rtype in RECORD_TYPES {
        for source in sources {
            match source.records(domain, rtype) {
                Ok(values) if !values.is_empty() => {
                    outcomes.push(RecordOutcome::Found {
                        rtype,
                        source: source.label().to_string(),
                        values,
                    });
                    continue 'types;
                }
                Ok(_) => {}
                Err(LookupFailure::NoSuchDomain) => {
                    outcomes.push(RecordOutcome::NoSuchDomain);
                    return outcomes;
                }
                Err(LookupFailure::Unavailable(reason)) => {
                    tracing::debug!(source = source.label(), %rtype, %reason, "lookup failed");
                }
            }
        }
        outcomes.push(RecordOutcome::Missing(rtype));
    }
    outcomes
}

/// First PTR name any source returns for `ip`.
pub fn reverse_lookup(sources: &[Box<dyn RecordSource>], ip: IpAddr) -> Option<String> {
    sources.iter().find_map(|source| match source.reverse(ip) {
        Ok(names) => names.into_iter().next(),
        Err(e) => {
            tracing::debug!(source = source.label(), ?e, "reverse lookup failed");
            None
        }
    })
}

/// Node type for a record value, or `None` when the type is not graphed.
pub fn record_node_kind(rtype: RecordType) -> Option<String> {
    match rtype {
        RecordType::TXT => None,
        RecordType::A | RecordType::AAAA => Some("ip".to_string()),
        other => Some(other.to_string().to_lowercase()),
    }
}

pub struct DnsLookup {
    ctx: ModuleContext,
}

impl DnsLookup {
    pub fn new(ctx: ModuleContext) -> Self {
        Self { ctx }
    }

    fn sources() -> Vec<Box<dyn RecordSource>> {
        let mut sources: Vec<Box<dyn RecordSource>> = Vec::new();
        match HickorySource::public() {
            Ok(source) => sources.push(Box::new(source)),
            Err(e) => tracing::warn!(error = %e, "public resolver unavailable"),
        }
        match HickorySource::system() {
            Ok(source) => sources.push(Box::new(source)),
            Err(e) => tracing::warn!(error = %e, "system resolver unavailable"),
        }
        sources
    }

    fn reverse(
        &self,
        sources: &[Box<dyn RecordSource>],
        ip: IpAddr,
        out: &mut dyn Write,
    ) -> Result<(), ModuleError> {
        writeln!(out, "{}", format!("Reverse DNS lookup for {ip}").blue())?;
        let Some(hostname) = reverse_lookup(sources, ip) else {
            writeln!(out, "{} No reverse DNS entry found.", "Error:".red())?;
            return Ok(());
        };
        writeln!(out, "{} {hostname}", "Hostname:".yellow())?;
        self.ctx.link(
            (ip.to_string().as_str(), "ip"),
            (hostname.as_str(), "domain"),
            "reverse_dns",
        )?;
        Ok(())
    }

    fn forward(
        &self,
        sources: &[Box<dyn RecordSource>],
        domain: &str,
        out: &mut dyn Write,
    ) -> Result<(), ModuleError> {
        writeln!(out, "{}", format!("DNS records for {domain}").blue())?;
        for outcome in forward_lookup(sources, domain) {
            match outcome {
                RecordOutcome::Found {
                    rtype,
                    source,
                    values,
                } => {
                    writeln!(out, "{}", format!("{rtype} Records ({source}):").yellow())?;
                    for value in &values {
                        writeln!(out, "  {value}")?;
                    }
                    if let Some(kind) = record_node_kind(rtype) {
                        let label = rtype.to_string();
                        for value in &values {
                            self.ctx
                                .link((domain, "domain"), (value.as_str(), kind.as_str()), &label)?;
                        }
                    }
                }
                RecordOutcome::Missing(rtype) => writeln!(
                    out,
                    "{} Could not retrieve {rtype} records from any resolver.",
                    "Error:".red()
                )?,
                RecordOutcome::NoSuchDomain => {
                    writeln!(out, "{} Domain does not exist.", "Error:".red())?;
                }
            }
        }
        Ok(())
    }
}

impl Module for DnsLookup {
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
        let sources = Self::sources();
        if sources.is_empty() {
            return Err(ModuleError::Failed("no DNS resolver could be configured".to_string()));
        }
        match target.parse::<IpAddr>() {
            Ok(ip) => self.reverse(&sources, ip, out),
            Err(_) => self.forward(&sources, target, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Canned answers keyed by record type.
    struct Canned {
        label: &'static str,
        answers: HashMap<RecordType, Result<Vec<String>, LookupFailure>>,
        ptr: Result<Vec<String>, LookupFailure>,
    }

    impl Canned {
        fn new(label: &'static str) -> Self {
            Self {
                label,
                answers: HashMap::new(),
                ptr: Ok(Vec::new()),
            }
        }

        fn answer(mut self, rtype: RecordType, values: &[&str]) -> Self {
            self.answers
                .insert(rtype, Ok(values.iter().map(|v| (*v).to_string()).collect()));
            self
        }

        fn fail(mut self, rtype: RecordType, failure: LookupFailure) -> Self {
            self.answers.insert(rtype, Err(failure));
            self
        }
    }

    impl RecordSource for Canned {
        fn label(&self) -> &str {
            self.label
        }

        fn records(&self, _domain: &str, rtype: RecordType) -> Result<Vec<String>, LookupFailure> {
            self.answers.get(&rtype).cloned().unwrap_or(Ok(Vec::new()))
        }

        fn reverse(&self, _ip: IpAddr) -> Result<Vec<String>, LookupFailure> {
            self.ptr.clone()
        }
    }

    fn boxed(sources: Vec<Canned>) -> Vec<Box<dyn RecordSource>> {
        sources
            .into_iter()
            .map(|s| Box::new(s) as Box<dyn RecordSource>)
            .collect()
    }

    #[test]
    fn primary_answer_wins_and_fallback_fills_gaps() {
        let sources = boxed(vec![
            Canned::new("Primary")
                .answer(RecordType::A, &["93.184.216.34"])
                .fail(RecordType::MX, LookupFailure::Unavailable("timeout".to_string())),
            Canned::new("Fallback")
                .answer(RecordType::A, &["10.0.0.1"])
                .answer(RecordType::MX, &["10 mail.example.com."]),
        ]);

        let outcomes = forward_lookup(&sources, "example.com");
        assert_eq!(outcomes.len(), RECORD_TYPES.len());
        assert_eq!(
            outcomes[0],
            RecordOutcome::Found {
                rtype: RecordType::A,
                source: "Primary".to_string(),
                values: vec!["93.184.216.34".to_string()],
            }
        );
        assert_eq!(outcomes[1], RecordOutcome::Missing(RecordType::AAAA));
        assert_eq!(
            outcomes[2],
            RecordOutcome::Found {
                rtype: RecordType::MX,
                source: "Fallback".to_string(),
                values: vec!["10 mail.example.com.".to_string()],
            }
        );
    }

    #[test]
    fn nxdomain_stops_the_lookup() {
        let sources = boxed(vec![
            Canned::new("Primary")
                .answer(RecordType::A, &["192.0.2.1"])
                .fail(RecordType::AAAA, LookupFailure::NoSuchDomain),
            Canned::new("Fallback").answer(RecordType::AAAA, &["2001:db8::1"]),
        ]);

        let outcomes = forward_lookup(&sources, "gone.example");
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[1], RecordOutcome::NoSuchDomain);
    }

    #[test]
    fn reverse_takes_first_name_from_first_answering_source() {
        let mut silent = Canned::new("Primary");
        silent.ptr = Err(LookupFailure::Unavailable("refused".to_string()));
        let mut answering = Canned::new("Fallback");
        answering.ptr = Ok(vec!["dns.google".to_string(), "other.example".to_string()]);
        let sources = boxed(vec![silent, answering]);

        let ip: IpAddr = "8.8.8.8".parse().expect("ip");
        assert_eq!(reverse_lookup(&sources, ip).as_deref(), Some("dns.google"));
        assert_eq!(reverse_lookup(&boxed(vec![Canned::new("Empty")]), ip), None);
    }

    #[test]
    fn record_types_map_to_node_kinds() {
        assert_eq!(record_node_kind(RecordType::A).as_deref(), Some("ip"));
        assert_eq!(record_node_kind(RecordType::AAAA).as_deref(), Some("ip"));
        assert_eq!(record_node_kind(RecordType::MX).as_deref(), Some("mx"));
        assert_eq!(record_node_kind(RecordType::CNAME).as_deref(), Some("cname"));
        assert_eq!(record_node_kind(RecordType::SOA).as_deref(), Some("soa"));
        assert_eq!(record_node_kind(RecordType::TXT), None);
    }
}
