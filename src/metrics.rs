//! Pipeline counters, recorded through the `metrics` facade when the
//! `metrics` feature is enabled and compiled out otherwise.

pub const EVENTS_READ: &str = "runweld_events_read_total";
pub const EVENTS_FILTERED: &str = "runweld_events_filtered_total";
pub const VALUES_ENQUEUED: &str = "runweld_values_enqueued_total";
pub const BATCHES_FLUSHED: &str = "runweld_batches_flushed_total";

#[cfg(feature = "metrics")]
fn increment(name: &'static str, n: u64) {
    ::metrics::counter!(name).increment(n);
}

#[cfg(not(feature = "metrics"))]
fn increment(_name: &'static str, _n: u64) {}

pub(crate) fn events_read(n: u64) {
    increment(EVENTS_READ, n);
}

pub(crate) fn events_filtered(n: u64) {
    increment(EVENTS_FILTERED, n);
}

pub(crate) fn values_enqueued(n: u64) {
    increment(VALUES_ENQUEUED, n);
}

pub(crate) fn batches_flushed(n: u64) {
    increment(BATCHES_FLUSHED, n);
}
