// Per-item outcomes and the run report

use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::error::AppResult;
use crate::routes::{Adapter, DefaultRoute, RoutingTable, StaticRoute};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Applied,
    SkippedUnresolvedAdapter,
    SkippedUnknownAdapter,
    Failed(String),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            Outcome::SkippedUnresolvedAdapter | Outcome::SkippedUnknownAdapter
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Applied => write!(f, "applied"),
            Outcome::SkippedUnresolvedAdapter => write!(f, "skipped (adapter not resolved)"),
            Outcome::SkippedUnknownAdapter => write!(f, "skipped (adapter not configured)"),
            Outcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// What a result refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Item {
    Static(StaticRoute),
    Default {
        #[serde(flatten)]
        route: DefaultRoute,
        ifindex: Option<u32>,
    },
    InterfaceMetric {
        adapter: String,
        display_name: String,
        metric: u32,
    },
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Static(route) => write!(f, "static route {}", route),
            Item::Default { route, ifindex: Some(ifindex) } => {
                write!(f, "default route {} (if {})", route, ifindex)
            }
            Item::Default { route, ifindex: None } => write!(f, "default route {}", route),
            Item::InterfaceMetric { adapter, display_name, metric } => {
                write!(f, "interface metric {} on {} ({})", metric, adapter, display_name)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub item: Item,
    pub outcome: Outcome,
}

impl ReconciliationResult {
    pub fn new(item: Item, outcome: Outcome) -> Self {
        ReconciliationResult { item, outcome }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub adapters: Vec<Adapter>,
    pub routes: Vec<ReconciliationResult>,
    pub metrics: Vec<ReconciliationResult>,
    pub table: Option<RoutingTable>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunReport {
    pub fn summary(&self) -> Summary {
        self.routes
            .iter()
            .chain(self.metrics.iter())
            .fold(Summary::default(), |mut acc, r| {
                match &r.outcome {
                    o if o.is_applied() => acc.applied += 1,
                    o if o.is_skipped() => acc.skipped += 1,
                    _ => acc.failed += 1,
                }
                acc
            })
    }

    /// Every route applied and every interface metric either pinned or
    /// skipped for a missing adapter.
    pub fn is_converged(&self) -> bool {
        self.routes.iter().all(|r| r.outcome.is_applied())
            && !self.metrics.iter().any(|r| r.outcome.is_failed())
    }

    pub fn write_json(&self, path: &Path) -> AppResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::Gateway;

    fn default_item() -> Item {
        Item::Default {
            route: DefaultRoute {
                adapter: "wan1".to_string(),
                gateway: Gateway("10.0.0.1".parse().unwrap()),
                metric: 20,
            },
            ifindex: Some(5),
        }
    }

    fn report(routes: Vec<Outcome>, metrics: Vec<Outcome>) -> RunReport {
        let wrap = |outcomes: Vec<Outcome>| -> Vec<ReconciliationResult> {
            outcomes
                .into_iter()
                .map(|o| ReconciliationResult::new(default_item(), o))
                .collect()
        };
        RunReport {
            run_id: "test".to_string(),
            started_at: String::new(),
            finished_at: String::new(),
            adapters: vec![],
            routes: wrap(routes),
            metrics: wrap(metrics),
            table: None,
        }
    }

    #[test]
    fn test_convergence() {
        assert!(report(vec![Outcome::Applied], vec![Outcome::Applied]).is_converged());
        assert!(
            report(vec![Outcome::Applied], vec![Outcome::SkippedUnresolvedAdapter]).is_converged()
        );
        assert!(!report(vec![Outcome::SkippedUnresolvedAdapter], vec![]).is_converged());
        assert!(!report(vec![Outcome::Applied], vec![Outcome::Failed("x".into())]).is_converged());
    }

    #[test]
    fn test_summary_counts() {
        let r = report(
            vec![
                Outcome::Applied,
                Outcome::SkippedUnknownAdapter,
                Outcome::Failed("bad".into()),
            ],
            vec![Outcome::Applied],
        );
        assert_eq!(
            r.summary(),
            Summary {
                applied: 2,
                skipped: 1,
                failed: 1
            }
        );
    }

    #[test]
    fn test_result_serialization() {
        let result = ReconciliationResult::new(default_item(), Outcome::Failed("denied".into()));
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["item"]["kind"], "default");
        assert_eq!(json["item"]["adapter"], "wan1");
        assert_eq!(json["item"]["gateway"], "10.0.0.1");
        assert_eq!(json["item"]["ifindex"], 5);
        assert_eq!(json["outcome"]["status"], "failed");
        assert_eq!(json["outcome"]["reason"], "denied");
    }

    #[test]
    fn test_item_display() {
        assert_eq!(
            default_item().to_string(),
            "default route 0.0.0.0/0 via 10.0.0.1 on wan1 metric 20 (if 5)"
        );
    }
}
