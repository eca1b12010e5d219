use std::fmt::Write;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::state::AppState;
use crate::status::Availability;

const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match render(&state) {
        Ok(out) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], out).into_response(),
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Renders every target in OpenMetrics text format.
pub fn render(state: &AppState) -> Result<String, std::fmt::Error> {
    let mut out = String::with_capacity(2048);
    let targets = state.statuses();

    writeln!(out, "# TYPE uptime_monitor_info info")?;
    writeln!(out, "# HELP uptime_monitor_info Information about the uptime monitor")?;
    writeln!(
        out,
        "uptime_monitor_info{{version=\"{}\",started=\"{}\",targets=\"{}\"}} 1",
        env!("CARGO_PKG_VERSION"),
        state.started_at.to_rfc3339(),
        targets.len()
    )?;

    writeln!(out, "# TYPE uptime_target_up gauge")?;
    writeln!(
        out,
        "# HELP uptime_target_up 1 if the last check succeeded, 0 if it failed, -1 before the first check"
    )?;
    for t in &targets {
        let value = match t.status {
            Availability::Up => 1,
            Availability::Down => 0,
            Availability::Unknown => -1,
        };
        writeln!(
            out,
            "uptime_target_up{{target=\"{}\",url=\"{}\"}} {}",
            escape(&t.name),
            escape(&t.url),
            value
        )?;
    }

    writeln!(out, "# TYPE uptime_target_consecutive_failures gauge")?;
    writeln!(
        out,
        "# HELP uptime_target_consecutive_failures Failed check cycles since the last success"
    )?;
    for t in &targets {
        writeln!(
            out,
            "uptime_target_consecutive_failures{{target=\"{}\"}} {}",
            escape(&t.name),
            t.consecutive_failures
        )?;
    }

    writeln!(out, "# TYPE uptime_target_checks counter")?;
    writeln!(out, "# HELP uptime_target_checks Completed check cycles")?;
    for t in &targets {
        writeln!(
            out,
            "uptime_target_checks_total{{target=\"{}\"}} {}",
            escape(&t.name),
            t.checks
        )?;
    }

    writeln!(out, "# TYPE uptime_target_failures counter")?;
    writeln!(out, "# HELP uptime_target_failures Check cycles that ended down")?;
    for t in &targets {
        writeln!(
            out,
            "uptime_target_failures_total{{target=\"{}\"}} {}",
            escape(&t.name),
            t.failures
        )?;
    }

    writeln!(out, "# TYPE uptime_target_last_check_timestamp_seconds gauge")?;
    writeln!(
        out,
        "# HELP uptime_target_last_check_timestamp_seconds Unix timestamp of the last completed check"
    )?;
    for t in &targets {
        if let Some(at) = t.last_checked {
            let secs = at.timestamp() as f64 + (at.timestamp_subsec_millis() as f64 / 1000.0);
            writeln!(
                out,
                "uptime_target_last_check_timestamp_seconds{{target=\"{}\"}} {:.3}",
                escape(&t.name),
                secs
            )?;
        }
    }

    writeln!(out, "# EOF")?;
    Ok(out)
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
