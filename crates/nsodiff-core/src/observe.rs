// Progress lines around long-running steps.
//
// Each step runs inside a span named after the operation with the device
// (or group) as a field, and logs one line when it starts and one when it
// finishes or fails.

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use tracing::{Instrument, info, info_span, warn};

/// Run `fut` as the `operation` step for `subject`.
///
/// The outcome is returned untouched; observation never alters control
/// flow.
pub async fn instrumented<T, E, F>(operation: &'static str, subject: &str, fut: F) -> Result<T, E>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    let span = info_span!("step", op = operation, subject);
    async move {
        info!("-> ({subject}) {operation} started ...");
        let started = Instant::now();
        let outcome = fut.await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &outcome {
            Ok(_) => info!(elapsed_ms, "-> ({subject}) {operation} done!"),
            Err(e) => warn!(elapsed_ms, error = %e, "-> ({subject}) {operation} failed"),
        }
        outcome
    }
    .instrument(span)
    .await
}
