use crate::core::solar_position::{self, SolarPosition};
use crate::core::surface_irradiance::poa_irradiance;
use crate::core::units::{
    month_for_day_of_year, sum_monthly, DAYS_PER_YEAR, HOURS_PER_DAY, MONTHS_PER_YEAR,
    WATTS_PER_KILOWATT,
};
use crate::errors::BipvError;
use fsum::FSum;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

/// This module contains the empirical weather model used when no measured climate data is
/// available for a site, and the synthesis of a typical meteorological year (TMY) from it.

const MONTHLY_GHI_FLOOR: f64 = 20.; // kWh/m2/month
const MINIMUM_ANNUAL_GHI: f64 = 1.; // kWh/m2/year
const HEATING_BASE_TEMPERATURE: f64 = 18.; // deg C
const SOLAR_CONSTANT: f64 = 1367.; // W/m2
const SEASONAL_TEMPERATURE_SWING: f64 = 8.; // K
const DIURNAL_TEMPERATURE_SWING: f64 = 4.; // K
// Meinel and Meinel clear-sky model: transmittance ^ (air mass ^ exponent)
const CLEAR_SKY_TRANSMITTANCE: f64 = 0.7;
const AIR_MASS_EXPONENT: f64 = 0.678;
// below this elevation beam radiation is not separated from diffuse, as dividing by the sine of
// a grazing elevation amplifies tiny errors
const MINIMUM_BEAM_ELEVATION: f64 = 5.; // degrees

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct WeatherProfile {
    pub latitude: f64,
    pub longitude: f64,
    /// kWh/m2/year
    pub annual_ghi: f64,
    /// kWh/m2/month
    pub monthly_ghi: [f64; 12],
    pub monthly_dni: [f64; 12],
    pub monthly_dhi: [f64; 12],
    pub annual_dni: f64,
    pub annual_dhi: f64,
    /// deg C
    pub average_temperature: f64,
    pub heating_degree_days: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct HourlyWeather {
    pub hour_of_year: u32,
    /// zero-indexed month
    pub month: usize,
    /// 1 to 365
    pub day_of_year: u32,
    pub hour_of_day: u32,
    pub solar_position: SolarPosition,
    /// W/m2, averaged over the hour
    pub ghi: f64,
    pub dni: f64,
    pub dhi: f64,
    pub air_temperature: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct TypicalMeteorologicalYear {
    pub latitude: f64,
    pub longitude: f64,
    pub hours: Vec<HourlyWeather>,
}

impl TypicalMeteorologicalYear {
    /// Monthly totals of an hourly quantity, in kWh/m2
    fn monthly_totals(&self, quantity: impl Fn(&HourlyWeather) -> f64) -> [f64; 12] {
        let mut totals = [0.; MONTHS_PER_YEAR];
        for hour in &self.hours {
            totals[hour.month] += quantity(hour) / WATTS_PER_KILOWATT as f64;
        }
        totals
    }
}

pub struct WeatherModel;

impl WeatherModel {
    /// Generate a weather profile for a site from its coordinates.
    ///
    /// Longitude is recorded on the profile but does not affect the result: the model is
    /// expressed in local solar time, so only latitude matters.
    pub fn generate(latitude: f64, longitude: f64) -> Result<WeatherProfile, BipvError> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(BipvError::invalid_input(
                "latitude and longitude must be finite numbers",
            ));
        }
        if !(-90. ..=90.).contains(&latitude) {
            return Err(BipvError::invalid_input(format!(
                "latitude must be between -90 and 90 degrees, got {latitude}"
            )));
        }

        let annual_ghi = annual_ghi(latitude);
        let monthly_ghi = monthly_ghi(annual_ghi);
        let average_temperature = average_temperature(latitude);

        let mut profile = WeatherProfile {
            latitude,
            longitude,
            annual_ghi,
            monthly_ghi,
            monthly_dni: [0.; 12],
            monthly_dhi: [0.; 12],
            annual_dni: 0.,
            annual_dhi: 0.,
            average_temperature,
            heating_degree_days: heating_degree_days(average_temperature),
        };

        let tmy = Self::typical_year(&profile);
        profile.monthly_dni = tmy.monthly_totals(|hour| hour.dni);
        profile.monthly_dhi = tmy.monthly_totals(|hour| hour.dhi);
        profile.annual_dni = sum_monthly(&profile.monthly_dni);
        profile.annual_dhi = sum_monthly(&profile.monthly_dhi);

        debug!(
            annual_ghi = profile.annual_ghi,
            annual_dni = profile.annual_dni,
            annual_dhi = profile.annual_dhi,
            "generated weather profile"
        );

        Ok(profile)
    }

    /// Synthesise hourly weather for a non-leap year from a weather profile.
    ///
    /// Each month's GHI is spread over the daylight hours of that month in proportion to the
    /// clear-sky irradiance at mid-hour, then split into beam and diffuse components. Low sun
    /// passes through more air mass, so the clearness index rises towards solar noon.
    pub fn typical_year(profile: &WeatherProfile) -> TypicalMeteorologicalYear {
        let hours_in_year = DAYS_PER_YEAR * HOURS_PER_DAY;

        let mut hours: Vec<HourlyWeather> = (0..hours_in_year)
            .map(|hour_of_year| {
                let day_idx = hour_of_year / HOURS_PER_DAY;
                let hour_of_day = hour_of_year % HOURS_PER_DAY;
                let month = month_for_day_of_year(day_idx);
                HourlyWeather {
                    hour_of_year,
                    month,
                    day_of_year: day_idx + 1,
                    hour_of_day,
                    solar_position: solar_position::position(
                        profile.latitude,
                        day_idx + 1,
                        hour_of_day as f64 + 0.5,
                    ),
                    ghi: 0.,
                    dni: 0.,
                    dhi: 0.,
                    air_temperature: hourly_air_temperature(
                        profile.average_temperature,
                        profile.latitude,
                        month,
                        hour_of_day,
                    ),
                }
            })
            .collect();

        let mut daylight_weight = [0.; MONTHS_PER_YEAR];
        for hour in &hours {
            daylight_weight[hour.month] +=
                clear_sky_shape(hour.day_of_year, &hour.solar_position);
        }

        for hour in hours.iter_mut() {
            let weight = daylight_weight[hour.month];
            if weight <= 0. {
                // polar night: no daylight hours to carry the month's irradiation
                continue;
            }
            let ghi = profile.monthly_ghi[hour.month] * WATTS_PER_KILOWATT as f64
                * clear_sky_shape(hour.day_of_year, &hour.solar_position)
                / weight;
            let (dni, dhi) = split_beam_diffuse(ghi, hour.day_of_year, &hour.solar_position);
            hour.ghi = ghi;
            hour.dni = dni;
            hour.dhi = dhi;
        }

        TypicalMeteorologicalYear {
            latitude: profile.latitude,
            longitude: profile.longitude,
            hours,
        }
    }
}

/// Annual plane-of-array irradiation on a surface over a typical year, in kWh/m2/year
pub fn annual_poa_irradiance(
    tmy: &TypicalMeteorologicalYear,
    surface_tilt: f64,
    surface_azimuth: f64,
    albedo: f64,
) -> f64 {
    FSum::with_all(tmy.hours.iter().map(|hour| {
        poa_irradiance(
            hour.ghi,
            hour.dni,
            hour.dhi,
            &hour.solar_position,
            surface_tilt,
            surface_azimuth,
            albedo,
        )
    }))
    .value()
        / WATTS_PER_KILOWATT as f64
}

fn annual_ghi(latitude: f64) -> f64 {
    (1000. + (40. - latitude.abs()) * 20.).max(MINIMUM_ANNUAL_GHI)
}

fn monthly_ghi(annual_ghi: f64) -> [f64; 12] {
    let mut monthly = [0.; MONTHS_PER_YEAR];
    for (month_idx, value) in monthly.iter_mut().enumerate() {
        let month = (month_idx + 1) as f64;
        *value = (annual_ghi / 12. * (0.7 + 0.6 * (2. * PI * (month - 3.) / 12.).sin()))
            .max(MONTHLY_GHI_FLOOR);
    }

    // the seasonal shape only sums to 0.7 of the annual total, so rescale it to match
    let shape_total = sum_monthly(&monthly);
    let scale = annual_ghi / shape_total;
    monthly.map(|value| (value * scale).max(MONTHLY_GHI_FLOOR))
}

fn average_temperature(latitude: f64) -> f64 {
    15. - latitude.abs() * 0.3
}

fn heating_degree_days(average_temperature: f64) -> f64 {
    ((HEATING_BASE_TEMPERATURE - average_temperature) * DAYS_PER_YEAR as f64).max(0.)
}

/// Relative clear-sky global horizontal irradiance: extraterrestrial irradiance attenuated along
/// the beam path through the atmosphere. Zero with the sun below the horizon.
fn clear_sky_shape(day_of_year: u32, solar_position: &SolarPosition) -> f64 {
    if !solar_position.is_above_horizon() {
        return 0.;
    }
    let air_mass = 1. / solar_position.elevation.to_radians().sin();

    extra_terrestrial_horizontal(day_of_year, solar_position)
        * CLEAR_SKY_TRANSMITTANCE.powf(air_mass.powf(AIR_MASS_EXPONENT))
}

fn extra_terrestrial_horizontal(day_of_year: u32, solar_position: &SolarPosition) -> f64 {
    let earth_orbit_deviation = (360. * day_of_year as f64 / DAYS_PER_YEAR as f64).to_radians();
    SOLAR_CONSTANT
        * (1. + 0.033 * earth_orbit_deviation.cos())
        * solar_position.elevation.to_radians().sin()
}

/// Erbs correlation for the diffuse fraction of global irradiance
fn erbs_diffuse_fraction(clearness_index: f64) -> f64 {
    let kt = clearness_index;
    if kt <= 0.22 {
        1. - 0.09 * kt
    } else if kt <= 0.8 {
        0.9511 - 0.1604 * kt + 4.388 * kt.powi(2) - 16.638 * kt.powi(3) + 12.336 * kt.powi(4)
    } else {
        0.165
    }
}

/// Returns (DNI, DHI) in W/m2 for a given hourly GHI
fn split_beam_diffuse(ghi: f64, day_of_year: u32, solar_position: &SolarPosition) -> (f64, f64) {
    if ghi <= 0. {
        return (0., 0.);
    }
    if solar_position.elevation < MINIMUM_BEAM_ELEVATION {
        return (0., ghi);
    }

    let clearness_index =
        (ghi / extra_terrestrial_horizontal(day_of_year, solar_position)).clamp(0., 1.);
    let dhi = ghi * erbs_diffuse_fraction(clearness_index);
    let dni = (ghi - dhi) / solar_position.elevation.to_radians().sin();

    (dni, dhi)
}

fn hourly_air_temperature(average: f64, latitude: f64, month: usize, hour_of_day: u32) -> f64 {
    // warmest month is July in the northern hemisphere and January in the southern
    let warmest_month = if latitude >= 0. { 6. } else { 0. };
    let seasonal = SEASONAL_TEMPERATURE_SWING * (2. * PI * (month as f64 - warmest_month) / 12.).cos();
    let diurnal = DIURNAL_TEMPERATURE_SWING * (2. * PI * (hour_of_day as f64 - 9.) / 24.).sin();

    average + seasonal + diurnal
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    const NEW_YORK: (f64, f64) = (40.7128, -74.0060);

    #[fixture]
    fn new_york_profile() -> WeatherProfile {
        WeatherModel::generate(NEW_YORK.0, NEW_YORK.1).unwrap()
    }

    #[rstest]
    fn should_generate_new_york_profile(new_york_profile: WeatherProfile) {
        assert_relative_eq!(new_york_profile.annual_ghi, 985.744, epsilon = 1e-9);
        assert_relative_eq!(
            new_york_profile.average_temperature,
            2.78616,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            new_york_profile.heating_degree_days,
            5553.0516,
            epsilon = 1e-6
        );
    }

    #[rstest]
    fn should_be_deterministic(new_york_profile: WeatherProfile) {
        assert_eq!(
            WeatherModel::generate(NEW_YORK.0, NEW_YORK.1).unwrap(),
            new_york_profile
        );
    }

    #[rstest]
    #[case(0.)]
    #[case(40.7128)]
    #[case(-33.9)]
    #[case(65.)]
    fn should_keep_monthly_ghi_above_floor_and_summing_to_annual(#[case] latitude: f64) {
        let profile = WeatherModel::generate(latitude, 0.).unwrap();

        for value in profile.monthly_ghi {
            assert!(value >= MONTHLY_GHI_FLOOR, "month below floor: {value}");
        }
        assert_relative_eq!(
            sum_monthly(&profile.monthly_ghi),
            profile.annual_ghi,
            max_relative = 1e-9
        );
    }

    #[rstest]
    fn should_let_monthly_floor_win_over_annual_total_near_pole() {
        let profile = WeatherModel::generate(89., 0.).unwrap();

        assert_relative_eq!(profile.annual_ghi, 20.);
        assert_eq!(profile.monthly_ghi, [MONTHLY_GHI_FLOOR; 12]);
        assert_relative_eq!(sum_monthly(&profile.monthly_ghi), 240.);
    }

    #[rstest]
    fn should_peak_ghi_in_june(new_york_profile: WeatherProfile) {
        let peak_month = new_york_profile
            .monthly_ghi
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(idx, _)| idx)
            .unwrap();

        assert_eq!(peak_month, 5);
    }

    #[rstest]
    fn should_not_have_heating_degree_days_in_hot_climate() {
        assert_eq!(heating_degree_days(25.), 0.);
    }

    #[rstest]
    fn should_reject_invalid_coordinates() {
        assert!(WeatherModel::generate(f64::NAN, 0.).is_err());
        assert!(WeatherModel::generate(91., 0.).is_err());
        assert!(WeatherModel::generate(10., f64::INFINITY).is_err());
    }

    #[rstest]
    fn should_ignore_longitude() {
        let greenwich = WeatherModel::generate(51.5, 0.).unwrap();
        let elsewhere = WeatherModel::generate(51.5, 120.).unwrap();

        assert_eq!(greenwich.monthly_ghi, elsewhere.monthly_ghi);
        assert_eq!(greenwich.annual_dni, elsewhere.annual_dni);
    }

    #[rstest]
    fn should_synthesise_a_full_year_of_hours(new_york_profile: WeatherProfile) {
        let tmy = WeatherModel::typical_year(&new_york_profile);

        assert_eq!(tmy.hours.len(), 8760);
        assert_eq!(tmy.hours[0].month, 0);
        assert_eq!(tmy.hours[8759].month, 11);
        assert_eq!(tmy.hours[8759].day_of_year, 365);
    }

    #[rstest]
    fn should_preserve_monthly_ghi_in_hourly_data(new_york_profile: WeatherProfile) {
        let tmy = WeatherModel::typical_year(&new_york_profile);
        let monthly = tmy.monthly_totals(|hour| hour.ghi);

        for (synthesised, expected) in monthly.iter().zip(new_york_profile.monthly_ghi) {
            assert_relative_eq!(*synthesised, expected, max_relative = 1e-9);
        }
    }

    #[rstest]
    fn should_have_no_irradiance_at_night(new_york_profile: WeatherProfile) {
        let tmy = WeatherModel::typical_year(&new_york_profile);

        for hour in tmy.hours.iter().filter(|hour| !hour.solar_position.is_above_horizon()) {
            assert_eq!((hour.ghi, hour.dni, hour.dhi), (0., 0., 0.));
        }
    }

    #[rstest]
    fn should_split_components_consistently(new_york_profile: WeatherProfile) {
        let tmy = WeatherModel::typical_year(&new_york_profile);

        for hour in &tmy.hours {
            let horizontal_beam = hour.dni * hour.solar_position.elevation.to_radians().sin();
            assert_relative_eq!(
                horizontal_beam.max(0.) + hour.dhi,
                hour.ghi,
                epsilon = 1e-6
            );
        }
        assert!(new_york_profile.annual_dni > 0.);
        assert!(new_york_profile.annual_dhi > 0.);
    }

    #[rstest]
    fn should_rank_vertical_facades_south_then_east_and_west_then_north(
        new_york_profile: WeatherProfile,
    ) {
        let tmy = WeatherModel::typical_year(&new_york_profile);

        let south = annual_poa_irradiance(&tmy, 90., 180., 0.2);
        let east = annual_poa_irradiance(&tmy, 90., 90., 0.2);
        let west = annual_poa_irradiance(&tmy, 90., 270., 0.2);
        let north = annual_poa_irradiance(&tmy, 90., 0., 0.2);

        assert!(south > east, "south {south} east {east}");
        assert!(south > west, "south {south} west {west}");
        assert_relative_eq!(east, west, max_relative = 1e-9);
        assert!(east > north);
        assert!(south < new_york_profile.annual_ghi * 1.2);
    }

    #[rstest]
    fn should_raise_beam_irradiance_towards_solar_noon(new_york_profile: WeatherProfile) {
        let tmy = WeatherModel::typical_year(&new_york_profile);
        // 21 June, day 172
        let day = tmy
            .hours
            .iter()
            .filter(|hour| hour.day_of_year == 172)
            .collect::<Vec<_>>();

        let morning = day[8].dni;
        let noon = day[11].dni;
        assert!(morning > 0.);
        assert!(noon > morning, "noon {noon} morning {morning}");
        assert_relative_eq!(day[11].dni, day[12].dni, max_relative = 1e-9);
    }

    #[rstest]
    #[case(0.1, 1. - 0.009)]
    #[case(0.9, 0.165)]
    fn should_calculate_erbs_diffuse_fraction(#[case] kt: f64, #[case] expected: f64) {
        assert_relative_eq!(erbs_diffuse_fraction(kt), expected, epsilon = 1e-12);
    }

    #[rstest]
    fn should_make_july_warmer_than_january_in_north(new_york_profile: WeatherProfile) {
        let tmy = WeatherModel::typical_year(&new_york_profile);
        let mean_for_month = |month: usize| {
            let temps = tmy
                .hours
                .iter()
                .filter(|hour| hour.month == month)
                .map(|hour| hour.air_temperature)
                .collect::<Vec<_>>();
            temps.iter().sum::<f64>() / temps.len() as f64
        };

        assert!(mean_for_month(6) > mean_for_month(0));
    }
}
