use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Business counters exposed on `GET /metrics`.
pub struct Metrics {
    registry: Registry,
    pub orders_created: IntCounter,
    pub reservations: IntCounterVec,
    pub logins: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("pitchside_orders_created_total", "Orders placed through checkout")?;
        let reservations = IntCounterVec::new(
            Opts::new("pitchside_reservations_total", "Reservations written, by resulting status"),
            &["status"],
        )?;
        let logins = IntCounterVec::new(
            Opts::new("pitchside_logins_total", "Login attempts, by outcome"),
            &["outcome"],
        )?;

        registry.register(Box::new(orders_created.clone()))?;
        registry.register(Box::new(reservations.clone()))?;
        registry.register(Box::new(logins.clone()))?;

        Ok(Self { registry, orders_created, reservations, logins })
    }

    pub fn reservation(&self, status: &str) {
        self.reservations.with_label_values(&[status]).inc();
    }

    pub fn login(&self, outcome: &str) {
        self.logins.with_label_values(&[outcome]).inc();
    }

    /// Prometheus text exposition of every registered counter.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lists_counters() {
        let metrics = Metrics::new().unwrap();
        metrics.orders_created.inc();
        metrics.reservation("APPROVED");
        metrics.login("success");

        let text = metrics.render().unwrap();
        assert!(text.contains("pitchside_orders_created_total 1"));
        assert!(text.contains("pitchside_reservations_total{status=\"APPROVED\"} 1"));
        assert!(text.contains("pitchside_logins_total{outcome=\"success\"} 1"));
    }
}
