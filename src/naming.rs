//! Log prefixes and generated resource names
//!
//! Prefixes only make interleaved logs easier to scan. Generated names carry
//! a fixed recognizable prefix plus a time-based suffix so that leftovers in
//! a shared account can be traced back to a test run.

use crate::provider::ResourceKind;
use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Total width of a log prefix, including brackets and the trailing marker
pub const PREFIX_WIDTH: usize = 64;

/// Default leading characters of every generated resource name
pub const DEFAULT_NAME_PREFIX: &str = "dsn";

/// Build a fixed-width `[provider/cloud] Suite.test > ` prefix.
///
/// The provider/cloud part gets at most a third of the width. Long
/// `Suite.test` bodies keep their right end (the test name) and are marked
/// with a leading `~`.
pub fn log_prefix(provider: &str, cloud: &str, suite: &str, test: Option<&str>) -> String {
    let target = truncate_right(&format!("{}/{}", provider, cloud), PREFIX_WIDTH / 3);
    let suite = suite
        .strip_suffix("Tests")
        .or_else(|| suite.strip_suffix("Test"))
        .unwrap_or(suite);
    let body = match test {
        Some(test) => format!("{}.{}", suite, test),
        None => suite.to_string(),
    };

    // "[" + target + "] " + body + " > "
    let budget = PREFIX_WIDTH - target.chars().count() - 6;
    let body = truncate_left(&body, budget);
    format!("[{}] {:<width$} > ", target, body, width = budget)
}

fn truncate_right(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max - 1).collect();
        format!("{}~", kept)
    }
}

fn truncate_left(s: &str, max: usize) -> String {
    let len = s.chars().count();
    if len <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().skip(len - (max - 1)).collect();
        format!("~{}", kept)
    }
}

/// Produces provider-friendly names for provisioned resources
#[derive(Debug)]
pub struct NameGenerator {
    prefix: String,
    counter: AtomicU32,
}

impl NameGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU32::new(0),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Name for a new resource of `kind`, e.g. `dsnvlan4821307`
    ///
    /// `base` replaces the kind's short name. The suffix combines wall-clock
    /// milliseconds with a per-run counter, so names are unlikely to collide.
    /// Both parts wrap (the counter every 100 names, the clock every 100
    /// seconds), so uniqueness is not guaranteed.
    pub fn name_for(&self, kind: ResourceKind, base: Option<&str>) -> String {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) % 100;
        let suffix = format!("{}{:02}", Utc::now().timestamp_millis() % 100_000, seq);

        let head = format!("{}{}", self.prefix, base.unwrap_or(kind.short_name()));
        let head_budget = kind.max_name_len().saturating_sub(suffix.len());
        let head: String = head.chars().take(head_budget).collect();
        let name = format!("{}{}", head, suffix);

        if kind.dns_style_name() {
            name.to_lowercase()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
                .collect()
        } else {
            name
        }
    }
}

impl Default for NameGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_NAME_PREFIX)
    }
}
