//! Delivery statistics.

use serde::Serialize;

/// Sent, delivered and lost counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    pub sent: u64,
    pub delivered: u64,
    pub lost: u64,
}

impl DeliveryStats {
    /// Count one evaluated transmission.
    pub fn record(&mut self, success: bool) {
        self.sent += 1;
        if success {
            self.delivered += 1;
        } else {
            self.lost += 1;
        }
    }

    /// Delivered over sent, in percent. Zero when nothing was sent.
    pub fn delivery_ratio_percent(&self) -> f64 {
        if self.sent == 0 {
            return 0.0;
        }
        self.delivered as f64 / self.sent as f64 * 100.0
    }

    /// Add another set of counts to this one.
    pub fn merge(&mut self, other: &DeliveryStats) {
        self.sent += other.sent;
        self.delivered += other.delivered;
        self.lost += other.lost;
    }
}

/// Running SNR minimum, mean and maximum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SnrStats {
    pub count: u64,
    pub min_db: Option<f64>,
    pub mean_db: Option<f64>,
    pub max_db: Option<f64>,
    #[serde(skip)]
    sum_db: f64,
}

impl SnrStats {
    /// Add one SNR sample.
    pub fn record(&mut self, snr_db: f64) {
        self.count += 1;
        self.sum_db += snr_db;
        self.min_db = Some(self.min_db.map_or(snr_db, |m| m.min(snr_db)));
        self.max_db = Some(self.max_db.map_or(snr_db, |m| m.max(snr_db)));
        self.mean_db = Some(self.sum_db / self.count as f64);
    }
}
