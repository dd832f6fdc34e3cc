//! Prometheus counters for the draw engine, exported at `GET /metrics`

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

pub struct EngineMetrics {
    registry: Registry,
    pub numbers_drawn: IntCounter,
    pub settlements: IntCounterVec,
    pub transaction_conflicts: IntCounterVec,
    pub settlements_deferred: IntCounter,
    pub cards_sold: IntCounter,
    pub draws_started: IntCounter,
    pub draws_finished: IntCounter,
    pub auto_timers: IntGauge,
}

impl EngineMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("bingo".to_string()), None)?;

        let numbers_drawn = IntCounter::new("numbers_drawn_total", "Numbers appended to draws")?;
        let settlements = IntCounterVec::new(
            Opts::new("settlements_total", "Tiers settled and credited"),
            &["tier"],
        )?;
        let transaction_conflicts = IntCounterVec::new(
            Opts::new(
                "transaction_conflicts_total",
                "Optimistic transactions rejected at commit",
            ),
            &["operation"],
        )?;
        let settlements_deferred = IntCounter::new(
            "settlements_deferred_total",
            "Settlement calls that exhausted their retries",
        )?;
        let cards_sold = IntCounter::new("cards_sold_total", "Cards sold across all draws")?;
        let draws_started = IntCounter::new("draws_started_total", "Draws moved to active")?;
        let draws_finished = IntCounter::new("draws_finished_total", "Draws moved to finished")?;
        let auto_timers = IntGauge::new("auto_timers_active", "Automatic draw timers running")?;

        registry.register(Box::new(numbers_drawn.clone()))?;
        registry.register(Box::new(settlements.clone()))?;
        registry.register(Box::new(transaction_conflicts.clone()))?;
        registry.register(Box::new(settlements_deferred.clone()))?;
        registry.register(Box::new(cards_sold.clone()))?;
        registry.register(Box::new(draws_started.clone()))?;
        registry.register(Box::new(draws_finished.clone()))?;
        registry.register(Box::new(auto_timers.clone()))?;

        Ok(Self {
            registry,
            numbers_drawn,
            settlements,
            transaction_conflicts,
            settlements_deferred,
            cards_sold,
            draws_started,
            draws_finished,
            auto_timers,
        })
    }

    pub fn record_conflict(&self, operation: &str) {
        self.transaction_conflicts.with_label_values(&[operation]).inc();
    }

    /// Text exposition format
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
