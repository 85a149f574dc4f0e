use fsum::FSum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const WATTS_PER_KILOWATT: u32 = 1_000;
pub const KILOGRAMS_PER_TONNE: u32 = 1_000;
pub const HOURS_PER_DAY: u32 = 24;
pub const DAYS_PER_YEAR: u32 = 365;
pub const MONTHS_PER_YEAR: usize = 12;
pub const DAYS_IN_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Zero-indexed month (0 = January) for a zero-indexed day of a non-leap year.
pub fn month_for_day_of_year(day_idx: u32) -> usize {
    let day_idx = day_idx % DAYS_PER_YEAR;
    DAYS_IN_MONTH
        .iter()
        .scan(0, |month_end, days| {
            *month_end += days;
            Some(*month_end)
        })
        .position(|month_end| day_idx < month_end)
        .unwrap_or(MONTHS_PER_YEAR - 1)
}

pub(crate) fn sum_monthly(values: &[f64; 12]) -> f64 {
    FSum::with_all(values.iter()).value()
}

/// An azimuth measured clockwise from North (N=0, E=90, S=180, W=270), in degrees.
///
/// This is the single convention used by the crate for both building surfaces and the sun.
/// Deserialising goes through [`Azimuth360::new`], so stored values are range checked too.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, PartialOrd, Serialize)]
#[serde(try_from = "f64", into = "f64")]
#[repr(transparent)]
pub struct Azimuth360(f64);

impl Azimuth360 {
    pub fn new(angle: f64) -> Result<Self, Azimuth360Error> {
        if !angle.is_finite() {
            return Err(Azimuth360Error::NotFinite);
        }
        if !(0. ..=360.).contains(&angle) {
            return Err(Azimuth360Error::OutOfRange(angle));
        }

        Ok(Self(angle))
    }

    /// Wraps any finite angle into [0, 360).
    pub fn normalised(angle: f64) -> Result<Self, Azimuth360Error> {
        if !angle.is_finite() {
            return Err(Azimuth360Error::NotFinite);
        }
        Ok(Self(angle.rem_euclid(360.)))
    }

    pub fn angle(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Azimuth360 {
    type Error = Azimuth360Error;

    fn try_from(angle: f64) -> Result<Self, Self::Error> {
        Self::new(angle)
    }
}

impl From<Azimuth360> for f64 {
    fn from(azimuth: Azimuth360) -> Self {
        azimuth.0
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum Azimuth360Error {
    #[error("Azimuth must be between 0 and 360 degrees inclusive, got {0}")]
    OutOfRange(f64),
    #[error("Azimuth must be a finite number")]
    NotFinite,
}
