//! Windows backend: `route.exe` for the route table, PowerShell
//! NetAdapter/NetTCPIP cmdlets for adapters and interface metrics.

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

use super::{Error, RouteSpec, RoutingSystem};
use crate::command::CommandExt;
use crate::routes::{parser, RoutingTable};

#[derive(Debug, Clone)]
pub struct WindowsRoutingSystem {
    timeout: Duration,
}

impl WindowsRoutingSystem {
    pub fn new(timeout: Duration) -> Self {
        WindowsRoutingSystem { timeout }
    }

    async fn powershell(&self, script: String) -> Result<String, Error> {
        let out = Command::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command"])
            .arg(script)
            .run_stdout(self.timeout)
            .await?;
        Ok(out)
    }

    async fn route(&self, args: Vec<String>) -> Result<String, Error> {
        let out = Command::new("route").args(args).run_stdout(self.timeout).await?;
        Ok(out)
    }
}

#[async_trait]
impl RoutingSystem for WindowsRoutingSystem {
    async fn interface_index(&self, display_name: &str) -> Result<Option<u32>, Error> {
        let out = self.powershell(ifindex_script(display_name)).await?;
        parse_ifindex(&out)
    }

    async fn flush_routes(&self) -> Result<(), Error> {
        let out = self.route(vec!["-f".to_string()]).await?;
        check_route_output(&out)
    }

    async fn add_route(&self, route: &RouteSpec) -> Result<(), Error> {
        let out = self.route(route_add_args(route)).await?;
        check_route_output(&out)
    }

    async fn set_interface_metric(&self, display_name: &str, metric: u32) -> Result<(), Error> {
        self.powershell(set_metric_script(display_name, metric)).await?;
        Ok(())
    }

    async fn restart_adapter(&self, display_name: &str) -> Result<(), Error> {
        self.powershell(restart_script(display_name)).await?;
        Ok(())
    }

    async fn list_routes(&self) -> Result<RoutingTable, Error> {
        let out = self.route(vec!["print".to_string(), "-4".to_string()]).await?;
        parser::parse_route_print(&out).map_err(|detail| Error::UnexpectedOutput {
            command: "route print -4".to_string(),
            detail,
        })
    }
}

/// Single-quoted PowerShell string literal
fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Exact-name adapter lookup; `-Name` would treat brackets and stars as wildcards
fn adapter_lookup(display_name: &str) -> String {
    format!(
        "$a = Get-NetAdapter | Where-Object {{ $_.Name -eq {} }}",
        ps_quote(display_name)
    )
}

fn ifindex_script(display_name: &str) -> String {
    format!(
        "{}; if ($a -and $a.Status -ne 'Disabled') {{ $a.ifIndex }}",
        adapter_lookup(display_name)
    )
}

fn set_metric_script(display_name: &str, metric: u32) -> String {
    format!(
        "{}; if (-not $a) {{ throw {} }}; \
         Set-NetIPInterface -InterfaceIndex $a.ifIndex -AddressFamily IPv4 \
         -AutomaticMetric Disabled -InterfaceMetric {} -ErrorAction Stop",
        adapter_lookup(display_name),
        ps_quote(&format!("adapter not found: {}", display_name)),
        metric
    )
}

fn restart_script(display_name: &str) -> String {
    format!(
        "{}; if (-not $a) {{ throw {} }}; $a | Restart-NetAdapter -Confirm:$false -ErrorAction Stop",
        adapter_lookup(display_name),
        ps_quote(&format!("adapter not found: {}", display_name)),
    )
}

fn route_add_args(route: &RouteSpec) -> Vec<String> {
    let mut args = vec![
        "-p".to_string(),
        "add".to_string(),
        route.destination.to_string(),
        "mask".to_string(),
        route.mask.to_string(),
        route.gateway.to_string(),
        "metric".to_string(),
        route.metric.to_string(),
    ];
    if let Some(ifindex) = route.ifindex {
        args.push("if".to_string());
        args.push(ifindex.to_string());
    }
    args
}

fn parse_ifindex(output: &str) -> Result<Option<u32>, Error> {
    let Some(line) = output.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return Ok(None);
    };
    line.parse().map(Some).map_err(|_| Error::UnexpectedOutput {
        command: "Get-NetAdapter".to_string(),
        detail: format!("not an interface index: {}", line),
    })
}

// route.exe reports some failures on stdout with a zero exit status
fn check_route_output(output: &str) -> Result<(), Error> {
    let lower = output.to_ascii_lowercase();
    if lower.contains("failed") || lower.contains("bad argument") || lower.contains("elevation") {
        let reason = output
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or(output)
            .to_string();
        return Err(Error::RouteRejected(reason));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_route_add_args_bound() {
        let spec = RouteSpec {
            destination: Ipv4Addr::UNSPECIFIED,
            mask: Ipv4Addr::UNSPECIFIED,
            gateway: Ipv4Addr::new(10, 10, 0, 1),
            metric: 20,
            ifindex: Some(12),
        };
        assert_eq!(
            route_add_args(&spec).join(" "),
            "-p add 0.0.0.0 mask 0.0.0.0 10.10.0.1 metric 20 if 12"
        );
    }

    #[test]
    fn test_route_add_args_unbound() {
        let spec = RouteSpec {
            destination: Ipv4Addr::new(192, 168, 0, 0),
            mask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::new(192, 168, 0, 1),
            metric: 10,
            ifindex: None,
        };
        assert_eq!(
            route_add_args(&spec).join(" "),
            "-p add 192.168.0.0 mask 255.255.255.0 192.168.0.1 metric 10"
        );
    }

    #[test]
    fn test_ps_quote_escapes_single_quotes() {
        assert_eq!(ps_quote("Bob's NIC"), "'Bob''s NIC'");
        assert!(ifindex_script("Ethernet [2]").contains("$_.Name -eq 'Ethernet [2]'"));
    }

    #[test]
    fn test_set_metric_script_disables_automatic_metric() {
        let script = set_metric_script("Ethernet 2", 15);
        assert!(script.contains("-AutomaticMetric Disabled"));
        assert!(script.contains("-InterfaceMetric 15"));
        assert!(script.contains("throw 'adapter not found: Ethernet 2'"));
    }

    #[test]
    fn test_parse_ifindex() {
        assert_eq!(parse_ifindex("12\r\n").unwrap(), Some(12));
        assert_eq!(parse_ifindex("").unwrap(), None);
        assert!(parse_ifindex("Disabled").is_err());
    }

    #[test]
    fn test_check_route_output() {
        assert!(check_route_output(" OK!").is_ok());
        assert!(check_route_output("").is_ok());

        let err = check_route_output("The route addition failed: The object already exists.")
            .unwrap_err();
        assert_eq!(err.reason(), "The route addition failed: The object already exists.");
    }
}
