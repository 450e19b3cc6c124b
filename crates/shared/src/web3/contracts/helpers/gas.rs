use std::time::Duration;

pub const GWEI: u128 = 1_000_000_000;

pub const DEFAULT_ESCALATION_INTERVAL: Duration = Duration::from_secs(180);
/// Growth factor applied to the tip for each escalation.
pub const COEFFICIENT: f64 = 1.125;

/// Priority fee that grows geometrically each time a transaction stays
/// unmined for a full `every` window.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometricGasPrice {
    initial_tip: u128,
    every: Duration,
    max_tip: Option<u128>,
}

impl GeometricGasPrice {
    pub fn new(initial_tip: u128, every: Duration) -> Self {
        Self {
            initial_tip,
            every,
            max_tip: None,
        }
    }

    pub fn with_max_tip(mut self, max_tip: Option<u128>) -> Self {
        self.max_tip = max_tip;
        self
    }

    pub fn initial_tip(&self) -> u128 {
        self.initial_tip
    }

    pub fn every(&self) -> Duration {
        self.every
    }

    /// Tip to offer after `escalations` full windows without the
    /// transaction being mined.
    pub fn tip(&self, escalations: u32) -> u128 {
        let exponent = i32::try_from(escalations).unwrap_or(i32::MAX);
        let tip = (self.initial_tip as f64 * COEFFICIENT.powi(exponent)).floor();
        let tip = if tip.is_finite() { tip as u128 } else { u128::MAX };
        match self.max_tip {
            Some(max_tip) => tip.min(max_tip),
            None => tip,
        }
    }

    /// Tip for a transaction first sent `elapsed` ago.
    pub fn tip_after(&self, elapsed: Duration) -> u128 {
        let windows = elapsed.as_secs() / self.every.as_secs().max(1);
        self.tip(u32::try_from(windows).unwrap_or(u32::MAX))
    }
}
