//! Metrics setup and update for the pipeline.

use std::time::Duration;

use prometheus::core::{AtomicF64, AtomicI64, AtomicU64, GenericCounter, GenericGauge};
use prometheus::IntCounterVec;

use crate::connection::PoolRegistry;

#[derive(Debug, Clone)]
pub struct Metrics {
    pub translate_total: GenericCounter<AtomicU64>,
    pub translate_failures: IntCounterVec,
    pub execute_total: GenericCounter<AtomicU64>,
    pub execute_failures: IntCounterVec,
    pub validation_rejections: IntCounterVec,
    pub open_pools: GenericGauge<AtomicI64>,
    pub pool_size: GenericGauge<AtomicI64>,
    pub pool_idle_count: GenericGauge<AtomicI64>,
    pub statement_timeout: GenericGauge<AtomicF64>,
}

/// Create a new int counter metric and register it with the provided Prometheus Registry
fn add_int_counter_metric(
    metrics_registry: &mut prometheus::Registry,
    metric_name: &str,
    metric_description: &str,
) -> Result<GenericCounter<AtomicU64>, prometheus::Error> {
    let int_counter =
        prometheus::IntCounter::with_opts(prometheus::Opts::new(metric_name, metric_description))?;
    metrics_registry.register(Box::new(int_counter.clone()))?;
    Ok(int_counter)
}

/// Create a new int counter metric partitioned by one label and register it
fn add_int_counter_vec_metric(
    metrics_registry: &mut prometheus::Registry,
    metric_name: &str,
    metric_description: &str,
    label: &str,
) -> Result<IntCounterVec, prometheus::Error> {
    let int_counter_vec = IntCounterVec::new(
        prometheus::Opts::new(metric_name, metric_description),
        &[label],
    )?;
    metrics_registry.register(Box::new(int_counter_vec.clone()))?;
    Ok(int_counter_vec)
}

/// Create a new int gauge metric and register it with the provided Prometheus Registry
fn add_int_gauge_metric(
    metrics_registry: &mut prometheus::Registry,
    metric_name: &str,
    metric_description: &str,
) -> Result<GenericGauge<AtomicI64>, prometheus::Error> {
    let int_gauge =
        prometheus::IntGauge::with_opts(prometheus::Opts::new(metric_name, metric_description))?;
    metrics_registry.register(Box::new(int_gauge.clone()))?;
    Ok(int_gauge)
}

/// Create a new gauge metric and register it with the provided Prometheus Registry
fn add_gauge_metric(
    metrics_registry: &mut prometheus::Registry,
    metric_name: &str,
    metric_description: &str,
) -> Result<GenericGauge<AtomicF64>, prometheus::Error> {
    let gauge =
        prometheus::Gauge::with_opts(prometheus::Opts::new(metric_name, metric_description))?;
    metrics_registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

/// Setup counters and gauges used to produce Prometheus metrics
pub fn initialise_metrics(
    metrics_registry: &mut prometheus::Registry,
) -> Result<Metrics, prometheus::Error> {
    let translate_total = add_int_counter_metric(
        metrics_registry,
        "chatdb_translate_total",
        "Total translate requests.",
    )?;

    let translate_failures = add_int_counter_vec_metric(
        metrics_registry,
        "chatdb_translate_failures_total",
        "Translate requests that did not produce a statement, by failure kind.",
        "kind",
    )?;

    let execute_total = add_int_counter_metric(
        metrics_registry,
        "chatdb_execute_total",
        "Total execute requests.",
    )?;

    let execute_failures = add_int_counter_vec_metric(
        metrics_registry,
        "chatdb_execute_failures_total",
        "Execute requests that failed, by failure kind.",
        "kind",
    )?;

    let validation_rejections = add_int_counter_vec_metric(
        metrics_registry,
        "chatdb_validation_rejections_total",
        "Candidate statements rejected by the validator, by rejection code.",
        "code",
    )?;

    let open_pools = add_int_gauge_metric(
        metrics_registry,
        "chatdb_open_pools",
        "The number of database targets that currently keep a connection pool.",
    )?;

    let pool_size = add_int_gauge_metric(
        metrics_registry,
        "chatdb_pool_size",
        "The number of pooled connections across all targets. This includes idle connections.",
    )?;

    let pool_idle_count = add_int_gauge_metric(
        metrics_registry,
        "chatdb_pool_idle",
        "The number of pooled connections that are idle (not in use).",
    )?;

    let statement_timeout = add_gauge_metric(
        metrics_registry,
        "chatdb_statement_timeout",
        "The longest a statement may run, in seconds.",
    )?;

    Ok(Metrics {
        translate_total,
        translate_failures,
        execute_total,
        execute_failures,
        validation_rejections,
        open_pools,
        pool_size,
        pool_idle_count,
        statement_timeout,
    })
}

impl Metrics {
    pub fn record_statement_timeout(&self, timeout: Duration) {
        self.statement_timeout.set(timeout.as_secs_f64());
    }
}

// update the pool gauges
pub fn update_pool_metrics(registry: &PoolRegistry, metrics: &Metrics) {
    metrics
        .open_pools
        .set(i64::try_from(registry.pool_count()).unwrap_or(i64::MAX));

    let (size, idle) = registry.connection_counts();
    metrics.pool_size.set(i64::from(size));
    metrics
        .pool_idle_count
        .set(i64::try_from(idle).unwrap_or(i64::MAX));
}
