//! Prometheus text exposition (format 0.0.4) of a [`MetricSnapshot`].

use std::fmt::Write;

use crate::metrics::{LabeledCounter, MetricSnapshot};

pub const EXPORTER_VERSION: &str = "1.0";
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub fn render_prometheus(snapshot: &MetricSnapshot) -> String {
    let mut out = String::with_capacity(4096);

    header(
        &mut out,
        "realtime_exporter_info",
        "Information about the realtime metrics exporter",
        "gauge",
    );
    let _ = writeln!(
        out,
        "realtime_exporter_info{{version=\"{}\"}} 1",
        EXPORTER_VERSION
    );

    gauge(
        &mut out,
        "realtime_active_connections",
        "Number of active connections",
        snapshot.gauges.active_connections,
    );
    labeled_counter(
        &mut out,
        "realtime_project_joins_total",
        "Total number of project joins",
        &snapshot.project_joins,
    );
    labeled_counter(
        &mut out,
        "realtime_project_leaves_total",
        "Total number of project leaves",
        &snapshot.project_leaves,
    );
    gauge(
        &mut out,
        "realtime_active_projects",
        "Number of projects currently being accessed",
        snapshot.gauges.active_projects,
    );
    counter(
        &mut out,
        "realtime_unique_projects_total",
        "Total number of unique projects accessed",
        snapshot.unique_projects,
    );
    gauge(
        &mut out,
        "realtime_active_users",
        "Number of unique users currently connected",
        snapshot.gauges.active_users,
    );
    counter(
        &mut out,
        "realtime_unique_users_total",
        "Total number of unique users",
        snapshot.unique_users,
    );

    let name = "realtime_session_duration_seconds";
    header(&mut out, name, "Session duration in seconds", "histogram");
    let histogram = &snapshot.session_duration;
    for (bound, cumulative) in histogram.cumulative() {
        let _ = writeln!(
            out,
            "{}_bucket{{le=\"{}\"}} {}",
            name,
            format_bound(bound),
            cumulative
        );
    }
    let _ = writeln!(out, "{}_sum {}", name, format_float(histogram.sum()));
    let _ = writeln!(out, "{}_count {}", name, histogram.count());

    out
}

fn header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
}

fn gauge(out: &mut String, name: &str, help: &str, value: u64) {
    header(out, name, help, "gauge");
    let _ = writeln!(out, "{} {}", name, value);
}

fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    header(out, name, help, "counter");
    let _ = writeln!(out, "{} {}", name, value);
}

fn labeled_counter(out: &mut String, name: &str, help: &str, values: &LabeledCounter) {
    header(out, name, help, "counter");
    for (labels, value) in values.iter() {
        let _ = writeln!(
            out,
            "{}{{browser=\"{}\",os=\"{}\"}} {}",
            name,
            labels.browser.as_str(),
            labels.os.as_str(),
            value
        );
    }
}

fn format_bound(bound: f64) -> String {
    if bound.is_infinite() {
        "+Inf".to_string()
    } else {
        format!("{:.1}", bound)
    }
}

fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}
