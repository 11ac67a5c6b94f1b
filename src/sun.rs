use crate::model::Location;
use chrono::{DateTime, Datelike};
use chrono_tz::Tz;

/// Decide whether polling should proceed at `now`. True when `ignore_sun_down`
/// is set, or when `now` falls within sunrise..sunset for its local date at
/// the configured location. Recomputed on every call since the date rolls
/// over during long-running operation.
pub fn should_poll(now: DateTime<Tz>, location: &Location, ignore_sun_down: bool) -> bool {
    if ignore_sun_down {
        return true;
    }
    let (sunrise_ts, sunset_ts) = sunrise::sunrise_sunset(
        location.latitude,
        location.longitude,
        now.year(),
        now.month(),
        now.day(),
    );
    let ts = now.timestamp();
    sunrise_ts <= ts && ts < sunset_ts
}
