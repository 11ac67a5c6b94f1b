use crate::model::{Location, MergedRecord};
use crate::{fronius, store, sun, Error};
use chrono::Utc;
use chrono_tz::Tz;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

/// Steady-state wait between successful poll cycles.
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Wait while the daylight gate blocks polling.
pub const NIGHT_INTERVAL: Duration = Duration::from_secs(60);
/// Wait after a failed cycle before retrying.
pub const BACKOFF_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Telemetry query URLs, polled sequentially in this order.
    pub endpoints: Vec<String>,
    pub location: Location,
    pub tz: Tz,
    pub ignore_sun_down: bool,
    /// Value of the `source` tag on every persisted record.
    pub source_tag: String,
    pub poll_interval: Duration,
    pub night_interval: Duration,
    pub backoff_interval: Duration,
}

/// Result of one poll cycle. Gating is a control signal, not an error.
#[derive(Debug)]
pub enum CycleOutcome {
    Persisted,
    Gated,
    Failed(Error),
}

/// Fetch all endpoints in order and merge their translated fields into one
/// record. The record's timestamp comes from the last successfully parsed
/// response; a later endpoint's field overwrites an earlier one of the same
/// name (field sets are disjoint by construction). Any failure discards the
/// partial record.
pub async fn collect_cycle<F, Fut>(endpoints: &[String], fetch: F) -> Result<MergedRecord, Error>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<String, Error>>,
{
    let mut fields = BTreeMap::new();
    let mut timestamp = None;

    for url in endpoints {
        let body = fetch(url.clone()).await?;
        let raw: Value = serde_json::from_str(&body)
            .map_err(|e| Error::MalformedResponse(format!("invalid JSON from {}: {}", url, e)))?;
        let kind = fronius::classify(&raw)?;
        fields.extend(fronius::response::translate(&raw, kind)?);
        timestamp = Some(fronius::response::timestamp(&raw)?);
    }

    match timestamp {
        Some(timestamp) => Ok(MergedRecord { timestamp, fields }),
        None => Err(Error::Unclassified(String::from("no endpoints configured"))),
    }
}

/// Run one poll cycle: gate check before any fetch, then collect, then a
/// single sink write. Generic over the transport and the store so both stay
/// external collaborators.
pub async fn run_cycle<F, Fut, S, SFut>(cfg: &PollerConfig, fetch: F, sink: S) -> CycleOutcome
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<String, Error>>,
    S: FnOnce(MergedRecord) -> SFut,
    SFut: Future<Output = Result<(), Error>>,
{
    let now = Utc::now().with_timezone(&cfg.tz);
    if !sun::should_poll(now, &cfg.location, cfg.ignore_sun_down) {
        return CycleOutcome::Gated;
    }

    let record = match collect_cycle(&cfg.endpoints, fetch).await {
        Ok(record) => record,
        Err(e) => return CycleOutcome::Failed(e),
    };

    match sink(record).await {
        Ok(()) => CycleOutcome::Persisted,
        Err(e) => CycleOutcome::Failed(e),
    }
}

/// The daemon loop: cycle, log the outcome, sleep the interval the outcome
/// maps to, repeat. Never returns; cancellation happens externally by
/// dropping this future (see `main`), which also interrupts an active sleep.
pub async fn run(influx: &influxdb::Client, http: &reqwest::Client, cfg: &PollerConfig) {
    loop {
        let outcome = run_cycle(
            cfg,
            |url| fronius::fetch(http, url),
            |record| async move { store::write(influx, &cfg.source_tag, &record).await },
        )
        .await;

        let wait = match outcome {
            CycleOutcome::Persisted => {
                log::info!("data written");
                cfg.poll_interval
            }
            CycleOutcome::Gated => {
                log::info!(
                    "sun is down, suspending polling for {}s",
                    cfg.night_interval.as_secs()
                );
                cfg.night_interval
            }
            CycleOutcome::Failed(e) => {
                let secs = cfg.backoff_interval.as_secs();
                match &e {
                    Error::TransientNetwork(msg) => {
                        log::warn!("connection problem: {}; retrying in {}s", msg, secs)
                    }
                    Error::MalformedResponse(msg) => {
                        log::error!("malformed device response: {}; retrying in {}s", msg, secs)
                    }
                    Error::Unclassified(msg) => {
                        log::error!("unexpected error: {}; retrying in {}s", msg, secs)
                    }
                }
                cfg.backoff_interval
            }
        };
        tokio::time::sleep(wait).await;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::FieldValue;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn read_resource(filename: &str) -> String {
        let mut d = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        d.push(format!("resources/test/{}", filename));
        fs::read_to_string(d.as_path()).unwrap()
    }

    /* Endpoint "URLs" are fixture filenames; the fetch closure serves them
    from resources/test/. */
    fn all_endpoints() -> Vec<String> {
        [
            "CommonInverterData.json",
            "3PInverterData.json",
            "MinMaxInverterData.json",
            "Meter.json",
            "LoggerInfo.json",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn test_config(endpoints: Vec<String>) -> PollerConfig {
        PollerConfig {
            endpoints,
            location: Location {
                latitude: 52.23,
                longitude: 21.01,
                elevation: 100.0,
            },
            tz: chrono_tz::Tz::Europe__Warsaw,
            ignore_sun_down: true,
            source_tag: String::from("test"),
            poll_interval: POLL_INTERVAL,
            night_interval: NIGHT_INTERVAL,
            backoff_interval: BACKOFF_INTERVAL,
        }
    }

    #[tokio::test]
    async fn merges_all_endpoints_into_one_record() {
        let record = collect_cycle(&all_endpoints(), |url| async move {
            Ok(read_resource(&url))
        })
        .await
        .unwrap();

        /* union of all five translations: 15 + 6 + 9 + 15 + 9 */
        assert_eq!(54, record.fields.len());
        for field in [
            "FAC",
            "ErrorCode",
            "IAC_L1",
            "DAY_PMAX",
            "PowerReal_P_Sum",
            "Manufacturer",
            "CO2Factor",
        ]
        .iter()
        {
            assert!(
                record.fields.contains_key(*field),
                "missing field {}",
                field
            );
        }
        assert_eq!(Some(&FieldValue::Float(49.96)), record.fields.get("FAC"));
        /* timestamp comes from the last endpoint */
        assert_eq!("2021-06-21T12:00:13+02:00", record.timestamp.to_rfc3339());
    }

    #[tokio::test]
    async fn successful_cycle_writes_exactly_once() {
        let cfg = test_config(all_endpoints());
        let writes = Arc::new(AtomicUsize::new(0));
        let sink_writes = writes.clone();

        let outcome = run_cycle(
            &cfg,
            |url| async move { Ok(read_resource(&url)) },
            |_record| async move {
                sink_writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .await;

        assert!(matches!(outcome, CycleOutcome::Persisted));
        assert_eq!(1, writes.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failed_fetch_discards_whole_cycle() {
        let cfg = test_config(all_endpoints());
        let writes = Arc::new(AtomicUsize::new(0));
        let sink_writes = writes.clone();

        let outcome = run_cycle(
            &cfg,
            |url| async move {
                if url == "MinMaxInverterData.json" {
                    Err(Error::TransientNetwork(String::from("connection refused")))
                } else {
                    Ok(read_resource(&url))
                }
            },
            |_record| async move {
                sink_writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .await;

        assert!(matches!(
            outcome,
            CycleOutcome::Failed(Error::TransientNetwork(_))
        ));
        assert_eq!(0, writes.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unknown_collection_type_discards_whole_cycle() {
        let cfg = test_config(vec![
            String::from("CommonInverterData.json"),
            String::from("CumulationInverterData.json"),
        ]);
        let writes = Arc::new(AtomicUsize::new(0));
        let sink_writes = writes.clone();

        let outcome = run_cycle(
            &cfg,
            |url| async move { Ok(read_resource(&url)) },
            |_record| async move {
                sink_writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .await;

        assert!(matches!(
            outcome,
            CycleOutcome::Failed(Error::MalformedResponse(_))
        ));
        assert_eq!(0, writes.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn store_failure_is_a_failed_cycle() {
        let cfg = test_config(all_endpoints());
        let outcome = run_cycle(
            &cfg,
            |url| async move { Ok(read_resource(&url)) },
            |_record| async move { Err(Error::Unclassified(String::from("write refused"))) },
        )
        .await;
        assert!(matches!(
            outcome,
            CycleOutcome::Failed(Error::Unclassified(_))
        ));
    }

    #[tokio::test]
    async fn no_endpoints_is_an_error() {
        let result = collect_cycle(&[], |url| async move { Ok(read_resource(&url)) }).await;
        assert!(matches!(result, Err(Error::Unclassified(_))));
    }
}
