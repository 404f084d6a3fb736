//! Port rule parsing
//!
//! Short syntax is a single string such as `"80"`, `"8080:80"`,
//! `"127.0.0.1:8080:80"` or `"53:53/udp"`. Long syntax is a mapping with
//! `target`, `published`, `protocol` and `host_ip` keys.

use super::config::{PortMapping, Protocol};
use super::decode::{scalar_text, Node};
use crate::error::{ComposeError, Result};
use serde_yaml::{Mapping, Value};

/// Parse one entry of a service's `ports` list.
///
/// Returns `Ok(None)` for entries that are neither a scalar nor a mapping.
pub fn parse_port_entry(value: &Value) -> Result<Option<PortMapping>> {
    match Node::of(value) {
        Node::Scalar(_) => match scalar_text(value) {
            Some(spec) => parse_short(&spec).map(Some),
            None => Ok(None),
        },
        Node::Mapping(map) => parse_long(map).map(Some),
        Node::Sequence(_) | Node::Null => Ok(None),
    }
}

/// Parse short port syntax
pub fn parse_short(spec: &str) -> Result<PortMapping> {
    let (ports, protocol) = match spec.rsplit_once('/') {
        Some((ports, proto)) => {
            let protocol = Protocol::parse(proto).map_err(|_| invalid(spec, "unknown protocol"))?;
            (ports, protocol)
        }
        None => (spec, Protocol::Tcp),
    };

    let (host_ip, rest) = split_bracketed_ip(spec, ports.trim())?;
    let parts: Vec<&str> = rest.split(':').collect();

    let (ip, host, container) = match (host_ip, parts.as_slice()) {
        (Some(ip), [host, container]) => (Some(ip), Some(*host), Some(*container)),
        (Some(_), _) => return Err(invalid(spec, "expected [ip]:host:container")),
        (None, [container]) => (None, None, Some(*container)),
        (None, [host, container]) => (None, Some(*host), Some(*container)),
        (None, [ip, host, container]) => (Some(*ip), Some(*host), Some(*container)),
        (None, _) => return Err(invalid(spec, "too many ':' separated segments")),
    };

    Ok(PortMapping {
        host_ip: non_blank(ip),
        host_port: non_blank(host),
        container_port: non_blank(container),
        protocol,
    })
}

/// Parse long port syntax; unknown keys are ignored
pub fn parse_long(map: &Mapping) -> Result<PortMapping> {
    let text = |key: &str| map.get(key).and_then(scalar_text);

    let protocol = match text("protocol") {
        Some(proto) => Protocol::parse(&proto)?,
        None => Protocol::Tcp,
    };

    Ok(PortMapping {
        host_ip: non_blank(text("host_ip").as_deref()),
        host_port: non_blank(text("published").as_deref()),
        container_port: non_blank(text("target").as_deref()),
        protocol,
    })
}

/// Split a leading `[v6addr]:` off the port list
fn split_bracketed_ip<'a>(spec: &str, ports: &'a str) -> Result<(Option<&'a str>, &'a str)> {
    let Some(inner) = ports.strip_prefix('[') else {
        return Ok((None, ports));
    };

    let (ip, rest) = inner
        .split_once(']')
        .ok_or_else(|| invalid(spec, "unterminated '[' in host IP"))?;
    let rest = rest
        .strip_prefix(':')
        .ok_or_else(|| invalid(spec, "expected ':' after host IP"))?;

    Ok((Some(ip), rest))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn invalid(spec: &str, reason: &str) -> ComposeError {
    ComposeError::InvalidPortSyntax {
        spec: spec.to_string(),
        reason: reason.to_string(),
    }
}
