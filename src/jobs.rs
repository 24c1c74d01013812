//! Background duplicate detection.
//!
//! Detection is a full rebuild of the suggestion table, so the loop just
//! reruns it on a fixed cadence. Each run opens its own connection on a
//! blocking worker; nothing is held across the sleep.

use std::time::Duration;

use crate::audit::AuditContext;
use crate::db::RecordsDb;
use crate::duplicates::DetectionSummary;
use crate::services::people::detect_duplicates;
use crate::types::Config;

/// Delay before the first run so startup work settles.
const STARTUP_DELAY_SECS: u64 = 5;

/// Pause between runs; never shorter than an hour.
pub fn detection_interval(config: &Config) -> Duration {
    Duration::from_secs(config.detection_interval_hours.max(1) * 3600)
}

/// One detection pass on a fresh connection. `None` when the pass failed
/// (the failure is logged).
pub fn run_detection_once(config: &Config) -> Option<DetectionSummary> {
    let db = match RecordsDb::open(config) {
        Ok(db) => db,
        Err(e) => {
            log::warn!("DetectionLoop: failed to open database: {}", e);
            return None;
        }
    };
    match detect_duplicates(&db, config, &AuditContext::system()) {
        Ok(summary) => Some(summary),
        Err(e) => {
            log::warn!("DetectionLoop: detection failed: {}", e);
            None
        }
    }
}

/// Run duplicate detection forever, once per `detectionIntervalHours`.
pub async fn run_detection_loop(config: Config) {
    tokio::time::sleep(Duration::from_secs(STARTUP_DELAY_SECS)).await;

    log::info!(
        "DetectionLoop: started (every {}h, {}% tolerance)",
        config.detection_interval_hours.max(1),
        config.duplicate_similarity_percent
    );

    loop {
        let run_config = config.clone();
        match tokio::task::spawn_blocking(move || run_detection_once(&run_config)).await {
            Ok(Some(summary)) => {
                if summary.suggestions_written > 0 {
                    log::info!(
                        "DetectionLoop: {} suggestions ({} exact, {} similar) over {} people",
                        summary.suggestions_written,
                        summary.exact_pairs,
                        summary.similar_pairs,
                        summary.records_scanned
                    );
                } else {
                    log::debug!(
                        "DetectionLoop: clean, {} people scanned",
                        summary.records_scanned
                    );
                }
            }
            Ok(None) => {}
            Err(e) => log::error!("DetectionLoop: worker panicked: {}", e),
        }

        tokio::time::sleep(detection_interval(&config)).await;
    }
}
