//! SystemMetabolism
//!
//! The energy budget that gates deep-think and latches zombie (degraded)
//! mode under sustained drain.

const DEFAULT_ZOMBIE_CRITIC: f32 = 0.95;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MetabolismError {
    #[error("max_capacity must be positive")]
    NonPositiveMax,
}

/// Energy budget, fatigue/zombie thresholds, and the zombie latch.
#[derive(Debug, Clone)]
pub struct SystemMetabolism {
    max_capacity: f32,
    current: f32,
    fatigue_ratio: f32,
    zombie_ratio: f32,
    zombie_critic_threshold: f32,
    zombie_active: bool,
}

impl SystemMetabolism {
    /// Canonical constructor: ratios, not absolute thresholds.
    ///
    /// Clamps: `fatigue_ratio in [0.01, 0.95]`, `zombie_ratio in [0.01,
    /// fatigue_ratio]`, `zombie_critic in [0,1]` (`0` defaults to `0.95`).
    pub fn configure_relative(
        max_capacity: f32,
        fatigue_ratio: f32,
        zombie_ratio: f32,
        zombie_critic: f32,
    ) -> Result<Self, MetabolismError> {
        if max_capacity <= 0.0 {
            return Err(MetabolismError::NonPositiveMax);
        }
        let fatigue_ratio = fatigue_ratio.clamp(0.01, 0.95);
        let zombie_ratio = zombie_ratio.clamp(0.01, fatigue_ratio);
        let zombie_critic_threshold = if zombie_critic <= 0.0 {
            DEFAULT_ZOMBIE_CRITIC
        } else {
            zombie_critic.clamp(0.0, 1.0)
        };
        Ok(Self {
            max_capacity,
            current: max_capacity,
            fatigue_ratio,
            zombie_ratio,
            zombie_critic_threshold,
            zombie_active: false,
        })
    }

    /// Absolute-threshold form: derives ratios then delegates to
    /// `configure_relative`.
    pub fn configure(
        max_capacity: f32,
        fatigue_threshold: f32,
        zombie_critic: f32,
    ) -> Result<Self, MetabolismError> {
        if max_capacity <= 0.0 {
            return Err(MetabolismError::NonPositiveMax);
        }
        let fatigue_ratio = fatigue_threshold / max_capacity;
        // Zombie threshold isn't separately given in the absolute form;
        // derive a conservative default below fatigue.
        let zombie_ratio = fatigue_ratio * 0.7;
        Self::configure_relative(max_capacity, fatigue_ratio, zombie_ratio, zombie_critic)
    }

    pub fn max_capacity(&self) -> f32 {
        self.max_capacity
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn fatigue_threshold(&self) -> f32 {
        self.max_capacity * self.fatigue_ratio
    }

    pub fn zombie_activation_threshold(&self) -> f32 {
        self.max_capacity * self.zombie_ratio
    }

    pub fn zombie_critic_threshold(&self) -> f32 {
        self.zombie_critic_threshold
    }

    pub fn is_zombie_active(&self) -> bool {
        self.zombie_active
    }

    pub fn energy_pct(&self) -> f32 {
        if self.max_capacity <= 0.0 {
            0.0
        } else {
            self.current / self.max_capacity
        }
    }

    /// Subtract, floor at 0; latches zombie mode if the floor drops to or
    /// below the zombie activation threshold.
    pub fn consume(&mut self, amount: f32) {
        self.current = (self.current - amount.max(0.0)).max(0.0);
        if self.current <= self.zombie_activation_threshold() {
            self.zombie_active = true;
        }
    }

    /// `amount <= 0` refills to max. Always clears the zombie latch.
    pub fn recharge(&mut self, amount: Option<f32>) {
        match amount {
            Some(a) if a > 0.0 => {
                self.current = (self.current + a).min(self.max_capacity);
            }
            _ => {
                self.current = self.max_capacity;
            }
        }
        self.zombie_active = false;
    }

    /// Update thresholds proportionally for a new max capacity. If
    /// `preserve_percent`, `current` is rescaled to the same fraction of
    /// the new max it held of the old max; the zombie latch is
    /// re-evaluated against the new threshold either way.
    pub fn rescale_max_capacity(&mut self, new_max: f32, preserve_percent: bool) {
        if new_max <= 0.0 {
            return;
        }
        if preserve_percent {
            let pct = self.energy_pct();
            self.max_capacity = new_max;
            self.current = (new_max * pct).clamp(0.0, new_max);
        } else {
            self.max_capacity = new_max;
            self.current = self.current.clamp(0.0, new_max);
        }
        if self.current <= self.zombie_activation_threshold() {
            self.zombie_active = true;
        }
    }

    /// `current > fatigue_threshold && !zombie`.
    pub fn can_deep_think(&self) -> bool {
        self.current > self.fatigue_threshold() && !self.zombie_active
    }

    /// `zombie ? zombie_critic : 0.50`.
    pub fn critic_threshold(&self) -> f32 {
        if self.zombie_active {
            self.zombie_critic_threshold
        } else {
            0.50
        }
    }
}
