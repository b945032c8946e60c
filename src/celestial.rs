//! Sun and moon positions for the time-synced light mode.
//!
//! The shadow projector consumes this strictly through [`CelestialSource`]:
//! a pure function of timestamp and configured coordinates returning azimuth
//! and zenith in radians. [`CelestialClock`] is a built-in low-precision
//! approximation; hosts with a proper ephemeris can supply their own.

use chrono::{DateTime, Utc};

pub trait CelestialSource: Send {
    /// Solar (azimuth, zenith) in radians. Azimuth is measured clockwise
    /// from north; zenith 0 is overhead, > pi/2 is below the horizon.
    fn sun_position(&self, timestamp_millis: i64, latitude: f64, longitude: f64) -> (f64, f64);

    /// Lunar (azimuth, zenith) in radians.
    fn moon_position(&self, timestamp_millis: i64, latitude: f64, longitude: f64) -> (f64, f64);

    /// Illuminated fraction of the lunar disc, 0..1.
    fn moon_illumination(&self, timestamp_millis: i64) -> f64;
}

pub struct CelestialClock;

/// Days since the J2000.0 epoch, fractional.
fn j2000_days(timestamp_millis: i64) -> f64 {
    let utc: DateTime<Utc> = DateTime::from_timestamp_millis(timestamp_millis)
        .unwrap_or_else(|| DateTime::from_timestamp_millis(0).unwrap());
    (utc.timestamp_millis() as f64) / 86_400_000.0 - 10957.5
}

/// Equatorial coordinates to local (azimuth, zenith).
fn equatorial_to_horizontal(
    right_ascension: f64,
    declination: f64,
    n: f64,
    latitude: f64,
    longitude: f64,
) -> (f64, f64) {
    let lat = latitude.to_radians();
    // Greenwich mean sidereal time in degrees
    let gmst = (280.46061837 + 360.98564736629 * n).rem_euclid(360.0);
    let hour_angle = (gmst.to_radians() + longitude.to_radians() - right_ascension)
        .rem_euclid(std::f64::consts::TAU);

    let sin_alt = lat.sin() * declination.sin() + lat.cos() * declination.cos() * hour_angle.cos();
    let zenith = std::f64::consts::FRAC_PI_2 - sin_alt.clamp(-1.0, 1.0).asin();
    let azimuth = (-hour_angle.sin()).atan2(
        declination.tan() * lat.cos() - lat.sin() * hour_angle.cos(),
    );
    (azimuth.rem_euclid(std::f64::consts::TAU), zenith)
}

/// Ecliptic (longitude, latitude) to equatorial (right ascension, declination).
fn ecliptic_to_equatorial(lon: f64, lat: f64, n: f64) -> (f64, f64) {
    let obliquity = (23.439 - 0.0000004 * n).to_radians();
    let ra = (lon.sin() * obliquity.cos() - lat.tan() * obliquity.sin()).atan2(lon.cos());
    let dec = (lat.sin() * obliquity.cos() + lat.cos() * obliquity.sin() * lon.sin()).asin();
    (ra.rem_euclid(std::f64::consts::TAU), dec)
}

fn sun_ecliptic_longitude(n: f64) -> f64 {
    let mean_longitude = 280.460 + 0.9856474 * n;
    let mean_anomaly = (357.528 + 0.9856003 * n).to_radians();
    (mean_longitude + 1.915 * mean_anomaly.sin() + 0.020 * (2.0 * mean_anomaly).sin())
        .rem_euclid(360.0)
        .to_radians()
}

fn moon_ecliptic(n: f64) -> (f64, f64) {
    let mean_longitude = 218.316 + 13.176396 * n;
    let mean_anomaly = (134.963 + 13.064993 * n).to_radians();
    let mean_distance = (93.272 + 13.229350 * n).to_radians();
    let lon = (mean_longitude + 6.289 * mean_anomaly.sin())
        .rem_euclid(360.0)
        .to_radians();
    let lat = (5.128 * mean_distance.sin()).to_radians();
    (lon, lat)
}

impl CelestialSource for CelestialClock {
    fn sun_position(&self, timestamp_millis: i64, latitude: f64, longitude: f64) -> (f64, f64) {
        let n = j2000_days(timestamp_millis);
        let lon = sun_ecliptic_longitude(n);
        let (ra, dec) = ecliptic_to_equatorial(lon, 0.0, n);
        equatorial_to_horizontal(ra, dec, n, latitude, longitude)
    }

    fn moon_position(&self, timestamp_millis: i64, latitude: f64, longitude: f64) -> (f64, f64) {
        let n = j2000_days(timestamp_millis);
        let (lon, lat) = moon_ecliptic(n);
        let (ra, dec) = ecliptic_to_equatorial(lon, lat, n);
        equatorial_to_horizontal(ra, dec, n, latitude, longitude)
    }

    fn moon_illumination(&self, timestamp_millis: i64) -> f64 {
        let n = j2000_days(timestamp_millis);
        let sun_lon = sun_ecliptic_longitude(n);
        let (moon_lon, _) = moon_ecliptic(n);
        let elongation = moon_lon - sun_lon;
        (1.0 - elongation.cos()) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-06-21 12:00 UTC
    const SOLSTICE_NOON: i64 = 1_718_971_200_000;
    // 2024-06-21 00:00 UTC
    const SOLSTICE_MIDNIGHT: i64 = 1_718_928_000_000;

    #[test]
    fn test_summer_noon_sun_is_high_at_greenwich() {
        let (_, zenith) = CelestialClock.sun_position(SOLSTICE_NOON, 51.48, 0.0);
        // Solstice noon at 51.5N: zenith around 28 degrees
        assert!(zenith.to_degrees() > 20.0 && zenith.to_degrees() < 36.0);
    }

    #[test]
    fn test_midnight_sun_is_below_horizon_at_greenwich() {
        let (_, zenith) = CelestialClock.sun_position(SOLSTICE_MIDNIGHT, 51.48, 0.0);
        assert!(zenith.to_degrees() > 90.0);
    }

    #[test]
    fn test_moon_illumination_in_range() {
        for day in 0..30 {
            let f = CelestialClock.moon_illumination(SOLSTICE_NOON + day * 86_400_000);
            assert!((0.0..=1.0).contains(&f));
        }
    }
}
