//! Aggregate counts over a stream of decoded lines.
//!
//! The first argument of every command is counted as its key. No command
//! semantics are applied, so `MGET a b` counts `a` only.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::monitor::ParsedLine;
use crate::output;

#[derive(Debug, Clone, Default)]
pub struct Stats {
    decoded: u64,
    unrecognized: u64,
    commands: HashMap<String, u64>,
    keys: HashMap<String, u64>,
    dbs: BTreeMap<String, u64>,
    first_ts: Option<(u64, u32)>,
    last_ts: Option<(u64, u32)>,
}

/// Snapshot of [`Stats`] suitable for printing or serializing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_lines: u64,
    pub decoded: u64,
    pub unrecognized: u64,
    /// Seconds between the earliest and latest decoded timestamp.
    pub span_secs: Option<f64>,
    pub dbs: BTreeMap<String, u64>,
    pub top_commands: Vec<(String, u64)>,
    /// Keys as UTF-8 text where their raw bytes allow, `\xHH`-escaped otherwise.
    pub top_keys: Vec<(String, u64)>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, line: &ParsedLine) {
        self.decoded += 1;
        *self.commands.entry(line.command().to_string()).or_insert(0) += 1;
        if let Some(key) = line.args().first() {
            *self.keys.entry(key.clone()).or_insert(0) += 1;
        }
        *self.dbs.entry(line.db_index().to_string()).or_insert(0) += 1;
        if let Some(ts) = line.timestamp_parts() {
            self.first_ts = Some(self.first_ts.map_or(ts, |f| f.min(ts)));
            self.last_ts = Some(self.last_ts.map_or(ts, |l| l.max(ts)));
        }
    }

    pub fn record_unrecognized(&mut self) {
        self.unrecognized += 1;
    }

    pub fn total_lines(&self) -> u64 {
        self.decoded + self.unrecognized
    }

    pub fn decoded(&self) -> u64 {
        self.decoded
    }

    pub fn unrecognized(&self) -> u64 {
        self.unrecognized
    }

    /// Most frequent commands, ties broken by name.
    pub fn top_commands(&self, n: usize) -> Vec<(String, u64)> {
        top_n(&self.commands, n)
    }

    /// Most frequently touched keys, ties broken by key.
    pub fn top_keys(&self, n: usize) -> Vec<(String, u64)> {
        top_n(&self.keys, n)
    }

    /// Line count per database index.
    pub fn dbs(&self) -> &BTreeMap<String, u64> {
        &self.dbs
    }

    /// Seconds between the earliest and latest timestamp seen.
    #[allow(clippy::cast_precision_loss)]
    pub fn span_secs(&self) -> Option<f64> {
        let (first, last) = (self.first_ts?, self.last_ts?);
        let micros = |(s, us): (u64, u32)| u128::from(s) * 1_000_000 + u128::from(us);
        Some((micros(last) - micros(first)) as f64 / 1_000_000.0)
    }

    pub fn summary(&self, top: usize) -> Summary {
        Summary {
            total_lines: self.total_lines(),
            decoded: self.decoded,
            unrecognized: self.unrecognized,
            span_secs: self.span_secs(),
            dbs: self.dbs.clone(),
            top_commands: self.top_commands(top),
            top_keys: self
                .top_keys(top)
                .into_iter()
                .map(|(k, n)| (output::text_value(&k), n))
                .collect(),
        }
    }
}

fn top_n(counts: &HashMap<String, u64>, n: usize) -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> = counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(n);
    entries
}
