use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::observability::stats::StatsSnapshot;
use crate::routing::{normalize_path, Resolution};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub rules: usize,
    pub generation: u64,
    pub upstream: Option<String>,
}

#[derive(Serialize)]
pub struct RuleView {
    pub index: usize,
    pub source: String,
    pub destination: String,
}

#[derive(Deserialize)]
pub struct ResolveQuery {
    pub path: String,
}

#[derive(Serialize)]
pub struct ResolveView {
    pub path: String,
    pub normalized: String,
    pub resolution: Option<Resolution>,
    /// Later rules that also match but never win.
    pub shadowed: Vec<Resolution>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let runtime = state.runtime.load_full();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        rules: runtime.table.len(),
        generation: runtime.generation,
        upstream: runtime.upstream.as_ref().map(|u| u.as_str().to_string()),
    })
}

pub async fn get_rules(State(state): State<AppState>) -> Json<Vec<RuleView>> {
    let runtime = state.runtime.load_full();
    let rules = runtime
        .table
        .rules()
        .iter()
        .enumerate()
        .map(|(index, rule)| RuleView {
            index,
            source: rule.source().to_string(),
            destination: rule.destination().to_string(),
        })
        .collect();
    Json(rules)
}

pub async fn resolve(
    State(state): State<AppState>,
    Query(query): Query<ResolveQuery>,
) -> Json<ResolveView> {
    let runtime = state.runtime.load_full();
    let mut matches = runtime.table.matches(&query.path).into_iter();
    let resolution = matches.next();

    Json(ResolveView {
        normalized: normalize_path(&query.path).into_owned(),
        path: query.path,
        resolution,
        shadowed: matches.collect(),
    })
}

pub async fn get_stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}
