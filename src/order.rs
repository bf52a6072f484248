//! Which strategies to try, and in what order.
//!
//! Two kinds of configuration keys influence the order, each looked up at
//! three scopes (most specific first):
//!
//! | scope    | exclusive                               | inclusive                              |
//! |----------|-----------------------------------------|----------------------------------------|
//! | version  | `strategy.<name>.<version>.xpriority`   | `strategy.<name>.<version>.priority`   |
//! | utility  | `strategy.<name>.xpriority`             | `strategy.<name>.priority`             |
//! | global   | `strategy.xpriority`                    | `strategy.priority`                    |
//!
//! An exclusive list replaces the order outright. An inclusive list is moved
//! to the front and the remaining defaults follow in their usual order.

use tracing::{debug, warn};
use crate::config::ConfigGetter;
use crate::manifest::{NameVer, StrategyType};

/// Order used when nothing is configured.
pub const DEFAULT_ORDER: [StrategyType; 3] = [
    StrategyType::Docker,
    StrategyType::Binary,
    StrategyType::Cmdio,
];

/// Computes the ordered list of strategy types to attempt for `utility`.
pub fn strategy_order(config: &dyn ConfigGetter, utility: &NameVer) -> Vec<StrategyType> {
    if let Some(value) = lookup_scoped(config, utility, "xpriority") {
        let order = parse_list(&value);
        debug!(?order, "exclusive strategy order");
        return order;
    }

    if let Some(value) = lookup_scoped(config, utility, "priority") {
        let mut order = parse_list(&value);
        for default in DEFAULT_ORDER {
            if !order.contains(&default) {
                order.push(default);
            }
        }
        debug!(?order, "inclusive strategy order");
        return order;
    }

    debug!(order = ?DEFAULT_ORDER, "default strategy order");
    DEFAULT_ORDER.to_vec()
}

/// Keys for `kind`, most specific scope first.
pub fn scoped_keys(utility: &NameVer, kind: &str) -> Vec<String> {
    let mut keys = Vec::with_capacity(3);
    if !utility.version.is_empty() {
        keys.push(format!("strategy.{}.{}.{}", utility.name, utility.version, kind));
    }
    keys.push(format!("strategy.{}.{}", utility.name, kind));
    keys.push(format!("strategy.{kind}"));
    keys
}

fn lookup_scoped(config: &dyn ConfigGetter, utility: &NameVer, kind: &str) -> Option<String> {
    scoped_keys(utility, kind).into_iter().find_map(|key| {
        let value = config.get(&key).filter(|v| !v.trim().is_empty())?;
        debug!(%key, %value, "strategy order override");
        Some(value)
    })
}

fn parse_list(value: &str) -> Vec<StrategyType> {
    let mut order = Vec::new();
    for item in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match item.parse::<StrategyType>() {
            Ok(kind) if !order.contains(&kind) => order.push(kind),
            Ok(_) => {}
            Err(_) => warn!(strategy = %item, "ignoring unknown strategy in priority list"),
        }
    }
    order
}
