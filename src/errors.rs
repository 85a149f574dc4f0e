use crate::core::units::Azimuth360Error;
use crate::project_state::Step;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BipvError {
    #[error("Input failed validation: {0}")]
    InvalidInput(String),
    #[error("Step '{step}' cannot run before '{requires}' has completed")]
    MissingPrerequisite { step: Step, requires: Step },
    #[error("Panel '{0}' is not present in the panel catalog")]
    UnknownPanel(String),
    #[error("Required column '{column}' is missing from {file_kind} data")]
    MissingColumn {
        column: &'static str,
        file_kind: &'static str,
    },
    #[error("Configuration '{0}' was not produced by the optimisation step")]
    UnknownConfiguration(String),
    #[error(transparent)]
    InvalidAzimuth(#[from] Azimuth360Error),
    #[error("Error reading CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("The report cannot be written before '{requires}' has completed")]
    ReportPrerequisite { requires: Step },
    #[error("Error rendering report: {0}")]
    Render(#[from] std::fmt::Error),
}

impl BipvError {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

/// A problem with a single row of an uploaded CSV file. Rows with problems are skipped rather
/// than failing the whole import.
#[derive(Clone, Debug, Deserialize, Error, PartialEq, Serialize)]
#[error("row {row}: {reason}")]
pub struct RowError {
    pub row: usize,
    pub reason: String,
}

impl RowError {
    pub(crate) fn new(row: usize, reason: impl Into<String>) -> Self {
        Self {
            row,
            reason: reason.into(),
        }
    }
}
