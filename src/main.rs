use chrono_tz::Tz;
use config::Config;
use fronius2influx::model::Location;
use fronius2influx::poller::{self, PollerConfig};
use fronius2influx::store;
use std::env;
use std::time::Duration;

/// Settings read from the config file (path given as the only CLI argument)
/// merged with `F2I_`-prefixed environment variables.
#[derive(Clone, serde::Deserialize)]
pub struct Settings {
    endpoints: Vec<String>,
    latitude: f64,
    longitude: f64,
    elevation: f64,
    timezone: String,
    ignore_sun_down: bool,
    source_tag: String,
    influx_url: String,
    influx_database: String,
    influx_username: Option<String>,
    influx_password: Option<String>,
}

pub fn read_settings(config_path: &str) -> Settings {
    let mut settings = Config::default();
    settings
        .merge(config::File::with_name(config_path).required(false))
        .unwrap()
        .merge(config::Environment::with_prefix("F2I"))
        .unwrap()
        .set_default("elevation", 0.0)
        .unwrap()
        .set_default("ignore_sun_down", false)
        .unwrap()
        .set_default("source_tag", "fronius")
        .unwrap()
        .set_default("influx_url", "http://localhost:8086")
        .unwrap()
        .set_default("influx_database", "fronius")
        .unwrap();

    settings.try_into().expect("Configuration error")
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| String::from("fronius2influx"));
    let settings = read_settings(&config_path);
    let tz: Tz = settings.timezone.parse().expect("Unknown timezone identifier");

    let influx = store::client(
        &settings.influx_url,
        &settings.influx_database,
        settings.influx_username.as_deref(),
        settings.influx_password.as_deref(),
    );
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("Unable to construct HTTP client");

    let cfg = PollerConfig {
        endpoints: settings.endpoints,
        location: Location {
            latitude: settings.latitude,
            longitude: settings.longitude,
            elevation: settings.elevation,
        },
        tz,
        ignore_sun_down: settings.ignore_sun_down,
        source_tag: settings.source_tag,
        poll_interval: poller::POLL_INTERVAL,
        night_interval: poller::NIGHT_INTERVAL,
        backoff_interval: poller::BACKOFF_INTERVAL,
    };

    log::info!(
        "polling {} endpoint(s) into {}/{}",
        cfg.endpoints.len(),
        settings.influx_url,
        settings.influx_database
    );

    /* The loop never returns; ctrl-c drops it mid-sleep so no partial write
    can happen after shutdown is requested. */
    tokio::select! {
        _ = poller::run(&influx, &http, &cfg) => {}
        _ = tokio::signal::ctrl_c() => {
            log::info!("Finishing. Goodbye!");
        }
    }
}
