//! HTTP reporting endpoint: liveness and usage analytics.

use crate::core::UsageReport;
use crate::core::analytics::{CommandCount, MonthlyStats, PairCount};
use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const TOP_LIMIT: usize = 5;

#[derive(Clone)]
pub struct ServerState {
    report: Arc<dyn UsageReport>,
    started_at: DateTime<Local>,
}

impl ServerState {
    pub fn new(report: Arc<dyn UsageReport>) -> Self {
        Self {
            report,
            started_at: Local::now(),
        }
    }

    fn uptime(&self) -> String {
        format_uptime(
            (Local::now() - self.started_at)
                .to_std()
                .unwrap_or_default(),
        )
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyticsSummary {
    pub current_month: String,
    pub monthly_stats: MonthlyStats,
    pub top_commands: Vec<CommandCount>,
    pub popular_conversions: Vec<PairCount>,
    pub uptime: String,
}

pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let days = secs / 86_400;
    let hours = secs % 86_400 / 3_600;
    let minutes = secs % 3_600 / 60;
    format!("{days} days, {hours} hours, {minutes} minutes")
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/ping", get(ping))
        .route("/analytics", get(analytics))
        .with_state(state)
}

async fn home(State(state): State<ServerState>) -> String {
    format!(
        "CurrenzBot is running.\nUptime: {}\nLast updated: {}",
        state.uptime(),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    )
}

async fn ping() -> &'static str {
    "Pong! Bot is alive."
}

async fn analytics(State(state): State<ServerState>) -> Json<AnalyticsSummary> {
    let current_month = Local::now().format("%Y-%m").to_string();
    let report = &state.report;
    Json(AnalyticsSummary {
        monthly_stats: report.monthly_stats(&current_month).await,
        top_commands: report.top_commands(TOP_LIMIT).await,
        popular_conversions: report.popular_conversions(TOP_LIMIT).await,
        uptime: state.uptime(),
        current_month,
    })
}

/// Serves the reporting endpoint until the process is stopped.
pub async fn serve(bind: &str, state: ServerState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    info!(address = %bind, "Reporting server listening");
    axum::serve(listener, router(state))
        .await
        .context("Reporting server failed")
}
