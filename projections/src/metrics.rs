//! Metric names and descriptions.
//!
//! Counters are recorded through the `metrics` facade; they are no-ops until the
//! embedding process installs a recorder. Call [`register_metrics`] once after
//! installing one so exporters can publish descriptions.

use metrics::describe_counter;

/// Events committed by the batch writer.
pub const EVENTS_APPENDED: &str = "foldstore_events_appended_total";

/// Projections written by a batch fold or a rebuild, labelled by `projection`.
pub const PROJECTION_UPDATES: &str = "foldstore_projection_updates_total";

/// Failed projection updates and rebuilds, labelled by `projection`.
pub const PROJECTION_FAILURES: &str = "foldstore_projection_failures_total";

/// Snapshot keys deleted by the retention pruner, labelled by `namespace`.
pub const SNAPSHOTS_PRUNED: &str = "foldstore_snapshots_pruned_total";

/// Register descriptions for every foldstore metric.
pub fn register_metrics() {
    describe_counter!(EVENTS_APPENDED, "Events committed by the batch writer");
    describe_counter!(
        PROJECTION_UPDATES,
        "Projection updates written after a batch commit or rebuild"
    );
    describe_counter!(
        PROJECTION_FAILURES,
        "Projection updates or rebuilds that failed at the store"
    );
    describe_counter!(
        SNAPSHOTS_PRUNED,
        "Snapshot entries deleted by retention pruning"
    );
}
