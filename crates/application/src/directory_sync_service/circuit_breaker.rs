use portcullis_core::{AppError, AppResult};
use tracing::warn;

/// Deletion volume above which a sync is treated as a directory outage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeletionThreshold {
    /// Trips once the plan deletes at least this many rows.
    Absolute(usize),
    /// Trips once the plan deletes at least this share of the provider's rows.
    Ratio(f64),
}

impl DeletionThreshold {
    /// Creates a validated ratio threshold in `(0, 1]`.
    pub fn ratio(value: f64) -> AppResult<Self> {
        if !(value > 0.0 && value <= 1.0) {
            return Err(AppError::Validation(format!(
                "deletion ratio must be within (0, 1], got '{value}'"
            )));
        }

        Ok(Self::Ratio(value))
    }

    /// Parses `absolute:<count>` or `ratio:<share>`.
    pub fn parse(value: &str) -> AppResult<Self> {
        let Some((kind, amount)) = value.trim().split_once(':') else {
            return Err(AppError::Validation(format!(
                "deletion threshold must look like 'absolute:<n>' or 'ratio:<r>', got '{value}'"
            )));
        };

        match kind {
            "absolute" => amount
                .parse::<usize>()
                .map(Self::Absolute)
                .map_err(|error| {
                    AppError::Validation(format!("invalid absolute deletion threshold: {error}"))
                }),
            "ratio" => {
                let ratio = amount.parse::<f64>().map_err(|error| {
                    AppError::Validation(format!("invalid deletion ratio: {error}"))
                })?;
                Self::ratio(ratio)
            }
            other => Err(AppError::Validation(format!(
                "unknown deletion threshold kind '{other}'"
            ))),
        }
    }
}

impl Default for DeletionThreshold {
    fn default() -> Self {
        Self::Absolute(10)
    }
}

/// Safety gate rejecting mass deletions before a sync writes anything.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SyncCircuitBreaker {
    threshold: DeletionThreshold,
}

impl SyncCircuitBreaker {
    /// Creates a breaker with the given threshold.
    #[must_use]
    pub fn new(threshold: DeletionThreshold) -> Self {
        Self { threshold }
    }

    /// Returns the configured threshold.
    #[must_use]
    pub fn threshold(&self) -> DeletionThreshold {
        self.threshold
    }

    /// Fails when `deletions` out of `owned` provider rows counts as a mass deletion.
    pub fn check(&self, owned: usize, deletions: usize) -> AppResult<()> {
        if deletions == 0 {
            return Ok(());
        }

        let tripped = match self.threshold {
            DeletionThreshold::Absolute(limit) => deletions >= limit,
            DeletionThreshold::Ratio(ratio) => {
                let share = deletions as f64 / owned.max(1) as f64;
                share >= ratio
            }
        };

        if tripped {
            warn!(
                owned,
                deletions,
                threshold = ?self.threshold,
                "sync circuit breaker tripped"
            );
            return Err(AppError::SyncDeletionTooLarge { deletions, owned });
        }

        Ok(())
    }
}
