//! Cluster membership descriptors and their textual wire form.
//!
//! The configuration endpoint reports membership as two ASCII lines: a
//! decimal version followed by a space-separated list of `name|host|port`
//! triples. Parsing is pure; the same input always yields the same
//! descriptor.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::ParseError;

/// Address of a single cache node as reported by the configuration endpoint.
///
/// Equality and hashing consider only `(host, port)`. The cluster-assigned
/// `name` is carried for log messages and diagnostics.
#[derive(Debug, Clone)]
pub struct NodeAddress {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl NodeAddress {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
        }
    }

    /// The `host:port` form used to open connections.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl PartialEq for NodeAddress {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl Eq for NodeAddress {}

impl Hash for NodeAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.name, self.host, self.port)
    }
}

/// Versioned snapshot of cluster node addresses.
///
/// `version` is monotonic per cluster; anything at or below the last applied
/// version is stale and must be discarded without side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipDescriptor {
    pub version: u64,
    pub nodes: Vec<NodeAddress>,
}

impl MembershipDescriptor {
    /// Parse the textual payload returned by the configuration endpoint.
    ///
    /// Accepts `\n` or `\r\n` line endings and ignores trailing whitespace
    /// inside the node line.
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let mut lines = raw.lines();

        let version_line = lines
            .next()
            .ok_or_else(|| ParseError::Malformed("missing version line".to_string()))?;
        let version = version_line.trim().parse::<u64>().map_err(|_| {
            ParseError::Malformed(format!("version is not a non-negative integer: {version_line:?}"))
        })?;

        let node_line = lines.next().unwrap_or("");
        let mut nodes = Vec::new();
        for triple in node_line.split_whitespace() {
            nodes.push(parse_node(triple)?);
        }

        if nodes.is_empty() {
            return Err(ParseError::Empty);
        }

        Ok(Self { version, nodes })
    }

    /// Canonical textual form, the inverse of [`parse`](Self::parse).
    pub fn render(&self) -> String {
        let nodes = self
            .nodes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        format!("{}\n{}\n", self.version, nodes)
    }
}

fn parse_node(triple: &str) -> Result<NodeAddress, ParseError> {
    let fields: Vec<&str> = triple.split('|').collect();
    if fields.len() != 3 {
        return Err(ParseError::Malformed(format!(
            "address does not split into name|host|port: {triple:?}"
        )));
    }
    let (name, host, port) = (fields[0], fields[1], fields[2]);

    if host.is_empty() {
        return Err(ParseError::Malformed(format!("empty host in {triple:?}")));
    }

    let port = port
        .parse::<u16>()
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| ParseError::Malformed(format!("invalid port in {triple:?}")))?;

    Ok(NodeAddress::new(name, host, port))
}
