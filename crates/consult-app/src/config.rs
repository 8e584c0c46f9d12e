use std::time::Duration;

use consult_core::sla::SlaTable;

/// Settings for intake and transitions.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Upper bound on every directory, policy and store call.
    pub lookup_timeout: Duration,
    /// SLA used for units with no table of their own.
    pub default_sla: SlaTable,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            lookup_timeout: Duration::from_secs(2),
            default_sla: SlaTable::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub max_escalation_level: u32,
    /// Escalation interval for units with no assignment policy.
    pub fallback_escalation_minutes: u32,
    /// Tries per consult, the first one included.
    pub max_item_attempts: u32,
    pub retry_backoff: Duration,
    pub lookup_timeout: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            max_escalation_level: 3,
            fallback_escalation_minutes: 30,
            max_item_attempts: 3,
            retry_backoff: Duration::from_millis(200),
            lookup_timeout: Duration::from_secs(2),
        }
    }
}
