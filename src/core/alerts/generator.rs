// Synthetic alert source used for demos and soak runs.

use rand::seq::SliceRandom;
use rand::Rng;

use super::model::{AlertDraft, AlertId};
use super::settings::AlertSettings;

/// Label recorded as `resolved_by` for automatic closures
pub const SYSTEM_RESOLVER: &str = "system";

pub struct SyntheticGenerator {
    probability: f64,
}

impl SyntheticGenerator {
    /// `probability` is clamped to `[0, 1]`.
    pub fn new(probability: f64) -> Self {
        let probability = if probability.is_finite() {
            probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { probability }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// With the configured probability, draft an alert of a uniformly random
    /// enabled type. `None` when the roll fails or every type is disabled.
    pub fn maybe_generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        settings: &AlertSettings,
    ) -> Option<AlertDraft> {
        if !rng.gen_bool(self.probability) {
            return None;
        }

        let enabled = settings.enabled_types();
        let Some(alert_type) = enabled.choose(rng) else {
            log::debug!("Synthetic generation skipped: no alert type enabled");
            return None;
        };

        Some(alert_type.synthesize(rng))
    }

    /// Pick one of the open alerts to close automatically.
    pub fn pick_resolution<'a, R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        unresolved: &'a [AlertId],
    ) -> Option<&'a AlertId> {
        unresolved.choose(rng)
    }
}
