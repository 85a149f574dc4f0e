use crate::core::units::MONTHS_PER_YEAR;
use crate::errors::{BipvError, RowError};
use chrono::{Datelike, NaiveDate};
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Read;
use tracing::warn;

const COLUMN_DATE: &str = "Date";
const COLUMN_CONSUMPTION: &str = "Consumption";
const DATE_FORMAT: &str = "%Y-%m-%d";
const FILE_KIND: &str = "historical energy";

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct EnergyRecord {
    pub date: NaiveDate,
    /// kWh
    pub consumption: f64,
    /// deg C
    pub temperature: Option<f64>,
    /// %
    pub humidity: Option<f64>,
    pub solar_irradiance: Option<f64>,
    /// %
    pub occupancy: Option<f64>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct EnergyHistory {
    pub records: Vec<EnergyRecord>,
    pub skipped_rows: Vec<RowError>,
    /// kWh for a typical year, January to December
    pub monthly_demand: [f64; 12],
}

impl EnergyHistory {
    pub fn annual_demand(&self) -> f64 {
        crate::core::units::sum_monthly(&self.monthly_demand)
    }
}

#[derive(Debug, Deserialize)]
struct EnergyRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Consumption", deserialize_with = "csv::invalid_option")]
    consumption: Option<f64>,
    #[serde(rename = "Temperature", default, deserialize_with = "csv::invalid_option")]
    temperature: Option<f64>,
    #[serde(rename = "Humidity", default, deserialize_with = "csv::invalid_option")]
    humidity: Option<f64>,
    #[serde(
        rename = "Solar_Irradiance",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    solar_irradiance: Option<f64>,
    #[serde(rename = "Occupancy", default, deserialize_with = "csv::invalid_option")]
    occupancy: Option<f64>,
}

impl EnergyRow {
    fn into_record(self, row: usize) -> Result<EnergyRecord, RowError> {
        let date = NaiveDate::parse_from_str(&self.date, DATE_FORMAT).map_err(|_| {
            RowError::new(row, format!("could not parse date '{}'", self.date))
        })?;
        let consumption = self
            .consumption
            .filter(|value| value.is_finite())
            .ok_or_else(|| RowError::new(row, "consumption is missing or not a number"))?;
        if consumption < 0. {
            return Err(RowError::new(
                row,
                format!("consumption cannot be negative, got {consumption}"),
            ));
        }

        Ok(EnergyRecord {
            date,
            consumption,
            temperature: self.temperature,
            humidity: self.humidity,
            solar_irradiance: self.solar_irradiance,
            occupancy: self.occupancy,
        })
    }
}

/// Read historical consumption data from CSV. Rows whose date or consumption cannot be read are
/// skipped and reported in [`EnergyHistory::skipped_rows`].
pub fn energy_history_from_csv(file: impl Read) -> Result<EnergyHistory, BipvError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(file);

    let headers = reader.headers()?.clone();
    for column in [COLUMN_DATE, COLUMN_CONSUMPTION] {
        if !headers.iter().any(|header| header == column) {
            return Err(BipvError::MissingColumn {
                column,
                file_kind: FILE_KIND,
            });
        }
    }

    let mut records = vec![];
    let mut skipped_rows = vec![];
    for (idx, result) in reader.deserialize::<EnergyRow>().enumerate() {
        // header is line 1
        let row = idx + 2;
        let parsed = result
            .map_err(|err| RowError::new(row, err.to_string()))
            .and_then(|energy_row| energy_row.into_record(row));
        match parsed {
            Ok(record) => records.push(record),
            Err(err) => {
                warn!("skipping energy data {err}");
                skipped_rows.push(err);
            }
        }
    }

    Ok(EnergyHistory {
        monthly_demand: monthly_demand(&records),
        records,
        skipped_rows,
    })
}

/// Total consumption per calendar month, averaged over the years in which that month appears.
pub fn monthly_demand(records: &[EnergyRecord]) -> [f64; 12] {
    let mut totals = [0.; MONTHS_PER_YEAR];
    let mut years: [BTreeSet<i32>; MONTHS_PER_YEAR] = Default::default();

    for record in records {
        let month = record.date.month0() as usize;
        totals[month] += record.consumption;
        years[month].insert(record.date.year());
    }

    std::array::from_fn(|month| match years[month].len() {
        0 => 0.,
        year_count => totals[month] / year_count as f64,
    })
}
