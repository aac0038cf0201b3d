// Parser for the IPv4 section of `route print`

use super::{netmask, Route, RoutingTable};
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    Other,
    Active,
    Persistent,
}

/// Parse `route print -4` output.
///
/// Active rows are `dest mask gateway interface metric`; persistent rows
/// are `dest mask gateway metric` and carry no interface column.
pub fn parse_route_print(output: &str) -> Result<RoutingTable, String> {
    let mut section = Section::Other;
    let mut seen_header = false;
    let mut routes = Vec::new();

    for line in output.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("Active Routes:") {
            section = Section::Active;
            seen_header = true;
            continue;
        }
        if trimmed.starts_with("Persistent Routes:") {
            section = Section::Persistent;
            seen_header = true;
            continue;
        }
        if trimmed.starts_with("IPv6 Route Table") {
            break;
        }
        if trimmed.starts_with("Interface List") {
            section = Section::Other;
            continue;
        }
        if trimmed.is_empty()
            || trimmed.starts_with("====")
            || trimmed.starts_with("Network Destination")
            || trimmed.starts_with("Network Address")
            || trimmed.starts_with("Default Gateway:")
            || trimmed == "None"
        {
            continue;
        }

        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        match section {
            Section::Active => routes.push(parse_active_row(&parts)?),
            Section::Persistent => routes.push(parse_persistent_row(&parts)?),
            Section::Other => {}
        }
    }

    if !seen_header {
        return Err("no IPv4 route sections found in route print output".to_string());
    }

    Ok(RoutingTable::new(routes))
}

fn parse_active_row(parts: &[&str]) -> Result<Route, String> {
    let [dest, mask, gateway, interface, metric] = parts else {
        return Err(format!("unexpected active route row: {}", parts.join(" ")));
    };

    let (destination, netmask) = parse_network(dest, mask)?;
    Ok(Route {
        destination,
        netmask,
        gateway: parse_gateway(gateway)?,
        interface: Some(interface.to_string()),
        metric: parse_metric(metric)?,
        persistent: false,
    })
}

fn parse_persistent_row(parts: &[&str]) -> Result<Route, String> {
    let [dest, mask, gateway, metric] = parts else {
        return Err(format!("unexpected persistent route row: {}", parts.join(" ")));
    };

    let (destination, netmask) = parse_network(dest, mask)?;
    Ok(Route {
        destination,
        netmask,
        gateway: parse_gateway(gateway)?,
        interface: None,
        metric: parse_metric(metric)?,
        persistent: true,
    })
}

fn parse_network(dest: &str, mask: &str) -> Result<(String, Ipv4Addr), String> {
    let dest: Ipv4Addr = dest
        .parse()
        .map_err(|e| format!("bad destination '{}': {}", dest, e))?;
    let mask: Ipv4Addr = mask
        .parse()
        .map_err(|e| format!("bad netmask '{}': {}", mask, e))?;
    Ok((netmask::to_cidr(dest, mask), mask))
}

fn parse_gateway(gateway: &str) -> Result<Option<Ipv4Addr>, String> {
    if gateway.eq_ignore_ascii_case("On-link") {
        return Ok(None);
    }
    gateway
        .parse()
        .map(Some)
        .map_err(|e| format!("bad gateway '{}': {}", gateway, e))
}

fn parse_metric(metric: &str) -> Result<u32, String> {
    // Persistent routes added without a metric show "Default"
    if metric.eq_ignore_ascii_case("Default") {
        return Ok(0);
    }
    metric
        .parse()
        .map_err(|e| format!("bad metric '{}': {}", metric, e))
}
