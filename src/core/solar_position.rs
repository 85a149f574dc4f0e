use serde::{Deserialize, Serialize};

/// Position of the sun in the sky, in degrees.
///
/// `azimuth` follows the crate-wide convention of degrees clockwise from North, so the sun is due
/// South at solar noon in the northern hemisphere (azimuth 180).
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct SolarPosition {
    pub elevation: f64,
    pub azimuth: f64,
    pub zenith: f64,
}

impl SolarPosition {
    pub fn is_above_horizon(&self) -> bool {
        self.elevation > 0.
    }
}

/// Calculate the position of the sun.
///
/// Arguments:
/// * `latitude` - latitude of the site, northern hemisphere positive, in degrees
/// * `day_of_year` - day of the year, 1 to 365
/// * `hour` - local solar time in hours, 0 to 24; may be fractional (e.g. 12.5 for mid-hour)
pub fn position(latitude: f64, day_of_year: u32, hour: f64) -> SolarPosition {
    let declination = solar_declination(day_of_year);
    let hour_angle = solar_hour_angle(hour);
    let elevation = solar_elevation(latitude, declination, hour_angle);

    SolarPosition {
        elevation,
        azimuth: solar_azimuth(latitude, declination, hour_angle),
        zenith: 90. - elevation,
    }
}

/// Cooper's equation for declination, in degrees
pub(crate) fn solar_declination(day_of_year: u32) -> f64 {
    23.45 * (360. * (284. + day_of_year as f64) / 365.).to_radians().sin()
}

/// Hour angle in degrees: negative in the morning, zero at solar noon, positive in the afternoon
pub(crate) fn solar_hour_angle(hour: f64) -> f64 {
    15. * (hour - 12.)
}

fn solar_elevation(latitude: f64, declination: f64, hour_angle: f64) -> f64 {
    //all three params provided as degrees, shadow each as radians for trig calcs
    let latitude = latitude.to_radians();
    let declination = declination.to_radians();
    let hour_angle = hour_angle.to_radians();

    (declination.sin() * latitude.sin()
        + declination.cos() * latitude.cos() * hour_angle.cos())
    .asin()
    .to_degrees()
}

fn solar_azimuth(latitude: f64, declination: f64, hour_angle: f64) -> f64 {
    let latitude = latitude.to_radians();
    let declination = declination.to_radians();
    let hour_angle = hour_angle.to_radians();

    // atan2 yields the angle from South, westwards positive; shift by 180 to measure from North
    let from_south = hour_angle
        .sin()
        .atan2(hour_angle.cos() * latitude.sin() - declination.tan() * latitude.cos())
        .to_degrees();

    (from_south + 180.).rem_euclid(360.)
}
