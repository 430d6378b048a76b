//! Prometheus metrics for the trading engine and HTTP surface.

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,
    pub signals_received_total: IntCounter,
    pub signals_processed_total: IntCounter,
    pub orders_placed_total: IntCounter,
    pub order_failures_total: IntCounter,
    pub position_reversals_total: IntCounter,
    pub strategy_active: IntGauge,
    pub database_connected: Gauge,
    pub signal_handling_duration_seconds: Histogram,
    pub http_requests_total: IntCounter,
    pub http_requests_in_flight: IntGauge,
    pub http_request_duration_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let signals_received_total = IntCounter::with_opts(Opts::new(
            "signals_received_total",
            "Crossover signals delivered to the gate",
        ))?;
        registry.register(Box::new(signals_received_total.clone()))?;

        let signals_processed_total = IntCounter::with_opts(Opts::new(
            "signals_processed_total",
            "Crossover signals that passed the rate limit and were evaluated",
        ))?;
        registry.register(Box::new(signals_processed_total.clone()))?;

        let orders_placed_total = IntCounter::with_opts(Opts::new(
            "orders_placed_total",
            "Position-opening orders accepted by the exchange",
        ))?;
        registry.register(Box::new(orders_placed_total.clone()))?;

        let order_failures_total = IntCounter::with_opts(Opts::new(
            "order_failures_total",
            "Order operations that failed after retries",
        ))?;
        registry.register(Box::new(order_failures_total.clone()))?;

        let position_reversals_total = IntCounter::with_opts(Opts::new(
            "position_reversals_total",
            "Close-and-reopen sequences started",
        ))?;
        registry.register(Box::new(position_reversals_total.clone()))?;

        let strategy_active = IntGauge::with_opts(Opts::new(
            "strategy_active",
            "1 while a strategy instance is running",
        ))?;
        registry.register(Box::new(strategy_active.clone()))?;

        let database_connected = Gauge::with_opts(Opts::new(
            "database_connected",
            "1 when the settings/ledger database is reachable",
        ))?;
        registry.register(Box::new(database_connected.clone()))?;

        let signal_handling_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "signal_handling_duration_seconds",
            "Time spent handling one feed event",
        ))?;
        registry.register(Box::new(signal_handling_duration_seconds.clone()))?;

        let http_requests_total = IntCounter::with_opts(Opts::new(
            "http_requests_total",
            "HTTP requests served",
        ))?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_requests_in_flight = IntGauge::with_opts(Opts::new(
            "http_requests_in_flight",
            "HTTP requests currently being served",
        ))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;

        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency",
        ))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            signals_received_total,
            signals_processed_total,
            orders_placed_total,
            order_failures_total,
            position_reversals_total,
            strategy_active,
            database_connected,
            signal_handling_duration_seconds,
            http_requests_total,
            http_requests_in_flight,
            http_request_duration_seconds,
        })
    }

    /// Render all registered metrics in the Prometheus text format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
