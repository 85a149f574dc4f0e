pub mod core;
pub mod errors;
pub mod input;
pub mod output;
pub mod project_state;
pub mod read_bim_file;
pub mod read_energy_file;
pub mod report;

#[cfg(test)]
mod tests;

use crate::input::ingest_for_processing;
use crate::output::Output;
use crate::project_state::ProjectState;
use crate::report::{write_csv_tables, write_html_report, write_state_snapshot};
use bitflags::bitflags;
use std::io::Read;
use tracing::{info, warn};

bitflags! {
    /// Optional outputs of a project run. CSV tables are always written.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct ProjectFlags: u32 {
        const HTML_REPORT = 0b1;
        const STATE_SNAPSHOT = 0b10;
    }
}

/// Run a whole feasibility study from a project input, writing its results to the given output.
///
/// Building elements come from the BIM file when one is given, otherwise from the input itself.
/// Demand comes from the energy file when one is given, otherwise from the input's `demand`.
pub fn run_project(
    input: impl Read,
    output: impl Output,
    energy_file: Option<&mut dyn Read>,
    bim_file: Option<&mut dyn Read>,
    flags: &ProjectFlags,
) -> anyhow::Result<ProjectState> {
    let input = ingest_for_processing(input)?;
    info!(project = %input.project.name, "starting feasibility study");
    let mut state = ProjectState::new(input);

    state.generate_weather()?;
    if let Some(file) = energy_file {
        state.import_energy_history(file)?;
    }
    match bim_file {
        Some(file) => state.import_building_elements(file)?,
        None => state.use_input_building_elements()?,
    };
    state.analyse_radiation()?;
    state.size_pv_systems()?;
    state.calculate_energy_balance()?;

    if state.optimise()?.is_empty() {
        warn!("no viable PV configuration, skipping financial analysis");
    } else {
        state.analyse_financials()?;
    }

    write_csv_tables(&output, &state)?;

    if flags.contains(ProjectFlags::HTML_REPORT) {
        if state.financial.is_some() {
            write_html_report(&output, &state)?;
        } else {
            warn!("nothing to appraise, HTML report not written");
        }
    }
    if flags.contains(ProjectFlags::STATE_SNAPSHOT) {
        write_state_snapshot(&output, &state)?;
    }

    Ok(state)
}
