//! Metric descriptions for the order lifecycle engine.
//!
//! The engine records through the `metrics` facade; installing a recorder
//! (Prometheus or otherwise) is left to the host process. Call
//! [`register_metrics`] once after installing it so exporters carry
//! descriptions.
//!
//! | Metric | Kind | Labels |
//! |---|---|---|
//! | `order_lifecycle_transitions_total` | counter | `status` |
//! | `order_lifecycle_transitions_rejected_total` | counter | |
//! | `order_lifecycle_travel_estimates_total` | counter | `source` (`api`, `estimated`) |
//! | `order_lifecycle_progression_wait_seconds` | histogram | |

use metrics::{Unit, describe_counter, describe_histogram};

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "order_lifecycle_transitions_total",
        "Total number of accepted status transitions"
    );
    describe_counter!(
        "order_lifecycle_transitions_rejected_total",
        "Total number of refused transitions and lost write races"
    );
    describe_counter!(
        "order_lifecycle_travel_estimates_total",
        "Total number of travel estimates by source"
    );
    describe_histogram!(
        "order_lifecycle_progression_wait_seconds",
        Unit::Seconds,
        "Time the scheduler waits before each automatic transition"
    );
}
