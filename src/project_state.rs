use crate::core::building_element::BuildingElement;
use crate::core::energy_balance::{self, EnergyBalance};
use crate::core::financial::{self, FinancialEnvironmentalResult};
use crate::core::optimisation::{ConfigurationScorer, OptimizationConfiguration};
use crate::core::pv_system::{PVSystemSizer, PVSystemSpec};
use crate::core::radiation::{RadiationAggregator, RadiationRecord, RadiationSource};
use crate::core::weather::{TypicalMeteorologicalYear, WeatherModel, WeatherProfile};
use crate::errors::{BipvError, RowError};
use crate::input::{Input, RadiationMethod};
use crate::read_bim_file::{building_elements_from_csv, BimImport};
use crate::read_energy_file::{energy_history_from_csv, EnergyHistory};
use anyhow::bail;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use strum::{Display, EnumIter, IntoEnumIterator};
use tracing::{info, instrument, warn};

/// The stages of a feasibility study, in the order they run.
#[derive(
    Clone, Copy, Debug, Deserialize, Display, EnumIter, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub enum Step {
    #[strum(to_string = "project setup")]
    Setup,
    #[strum(to_string = "weather")]
    Weather,
    #[strum(to_string = "energy history")]
    EnergyHistory,
    #[strum(to_string = "building elements")]
    BuildingElements,
    #[strum(to_string = "radiation analysis")]
    Radiation,
    #[strum(to_string = "PV sizing")]
    PvSizing,
    #[strum(to_string = "energy balance")]
    EnergyBalance,
    #[strum(to_string = "optimisation")]
    Optimization,
    #[strum(to_string = "financial analysis")]
    FinancialAnalysis,
}

/// Everything known about a project so far. Each step replaces its own result wholesale and
/// clears the results that were derived from the one it replaces.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProjectState {
    pub input: Input,
    pub weather: Option<WeatherProfile>,
    // regenerated from the weather profile on demand
    #[serde(skip)]
    typical_year: Option<TypicalMeteorologicalYear>,
    pub energy_history: Option<EnergyHistory>,
    pub building_elements: Option<Vec<BuildingElement>>,
    #[serde(default)]
    pub skipped_elements: Vec<RowError>,
    pub radiation: Option<Vec<RadiationRecord>>,
    pub pv_systems: Option<Vec<PVSystemSpec>>,
    pub energy_balance: Option<EnergyBalance>,
    pub configurations: Option<Vec<OptimizationConfiguration>>,
    pub financial: Option<FinancialEnvironmentalResult>,
}

fn require<T>(value: &Option<T>, step: Step, requires: Step) -> Result<&T, BipvError> {
    value
        .as_ref()
        .ok_or(BipvError::MissingPrerequisite { step, requires })
}

fn check_unique_ids(elements: &[BuildingElement]) -> Result<(), BipvError> {
    match elements.iter().map(|element| element.id.as_str()).duplicates().next() {
        Some(id) => Err(BipvError::invalid_input(format!(
            "building element id '{id}' is used more than once"
        ))),
        None => Ok(()),
    }
}

impl ProjectState {
    pub fn new(input: Input) -> Self {
        Self {
            input,
            weather: None,
            typical_year: None,
            energy_history: None,
            building_elements: None,
            skipped_elements: vec![],
            radiation: None,
            pv_systems: None,
            energy_balance: None,
            configurations: None,
            financial: None,
        }
    }

    pub fn load(json: impl Read) -> anyhow::Result<Self> {
        let state: Self = serde_json::from_reader(json)?;
        state.input.check()?;
        if let Some(elements) = &state.building_elements {
            for element in elements {
                let rebuilt = BuildingElement::new(
                    element.id.as_str(),
                    element.element_type,
                    element.geometry(),
                    &state.input.suitability,
                )?;
                if rebuilt != *element {
                    bail!("saved building element '{}' does not match its geometry", element.id);
                }
            }
            check_unique_ids(elements)?;
        }
        Ok(state)
    }

    pub fn save(&self, writer: impl Write) -> anyhow::Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Steps whose results are currently held. Setup is always complete once a state exists.
    pub fn completed_steps(&self) -> Vec<Step> {
        Step::iter()
            .filter(|step| match step {
                Step::Setup => true,
                Step::Weather => self.weather.is_some(),
                Step::EnergyHistory => self.energy_history.is_some(),
                Step::BuildingElements => self.building_elements.is_some(),
                Step::Radiation => self.radiation.is_some(),
                Step::PvSizing => self.pv_systems.is_some(),
                Step::EnergyBalance => self.energy_balance.is_some(),
                Step::Optimization => self.configurations.is_some(),
                Step::FinancialAnalysis => self.financial.is_some(),
            })
            .collect()
    }

    /// Clear the results of every step that depends on `step`: its first dependant and all the
    /// steps after that.
    fn invalidate_dependants_of(&mut self, step: Step) {
        let first_dependant = match step {
            Step::Weather | Step::BuildingElements => Step::Radiation,
            Step::EnergyHistory | Step::PvSizing => Step::EnergyBalance,
            Step::Radiation => Step::PvSizing,
            Step::EnergyBalance => Step::Optimization,
            Step::Optimization => Step::FinancialAnalysis,
            Step::Setup | Step::FinancialAnalysis => return,
        };

        if first_dependant <= Step::Radiation {
            self.radiation = None;
        }
        if first_dependant <= Step::PvSizing {
            self.pv_systems = None;
        }
        if first_dependant <= Step::EnergyBalance {
            self.energy_balance = None;
        }
        if first_dependant <= Step::Optimization {
            self.configurations = None;
        }
        self.financial = None;
    }

    #[instrument(skip_all)]
    pub fn generate_weather(&mut self) -> Result<&WeatherProfile, BipvError> {
        let project = &self.input.project;
        let profile = WeatherModel::generate(project.latitude, project.longitude)?;
        info!(
            annual_ghi = profile.annual_ghi,
            average_temperature = profile.average_temperature,
            "weather profile ready"
        );

        self.typical_year = None;
        self.invalidate_dependants_of(Step::Weather);
        Ok(self.weather.insert(profile))
    }

    fn typical_year(&mut self) -> Result<&TypicalMeteorologicalYear, BipvError> {
        let profile = require(&self.weather, Step::Radiation, Step::Weather)?;
        if self.typical_year.is_none() {
            self.typical_year = Some(WeatherModel::typical_year(profile));
        }
        require(&self.typical_year, Step::Radiation, Step::Weather)
    }

    #[instrument(skip_all)]
    pub fn import_energy_history(&mut self, csv: impl Read) -> Result<&EnergyHistory, BipvError> {
        let history = energy_history_from_csv(csv)?;
        Ok(self.use_energy_history(history))
    }

    pub fn use_energy_history(&mut self, history: EnergyHistory) -> &EnergyHistory {
        info!(
            records = history.records.len(),
            skipped = history.skipped_rows.len(),
            annual_demand = history.annual_demand(),
            "energy history ready"
        );

        self.invalidate_dependants_of(Step::EnergyHistory);
        self.energy_history.insert(history)
    }

    #[instrument(skip_all)]
    pub fn import_building_elements(
        &mut self,
        csv: impl Read,
    ) -> Result<&[BuildingElement], BipvError> {
        let import = building_elements_from_csv(csv, &self.input.suitability)?;
        self.use_imported_elements(import)
    }

    pub fn use_imported_elements(
        &mut self,
        import: BimImport,
    ) -> Result<&[BuildingElement], BipvError> {
        self.skipped_elements = import.skipped_rows;
        self.set_building_elements(import.elements)
    }

    /// Use the building elements given inline in the project input.
    #[instrument(skip_all)]
    pub fn use_input_building_elements(&mut self) -> Result<&[BuildingElement], BipvError> {
        let elements = self
            .input
            .building_elements
            .iter()
            .map(|element| element.to_element(&self.input.suitability))
            .collect::<Result<Vec<_>, _>>()?;
        self.skipped_elements = vec![];
        self.set_building_elements(elements)
    }

    fn set_building_elements(
        &mut self,
        elements: Vec<BuildingElement>,
    ) -> Result<&[BuildingElement], BipvError> {
        if elements.is_empty() {
            return Err(BipvError::invalid_input(
                "no valid building elements were provided",
            ));
        }
        check_unique_ids(&elements)?;
        info!(
            elements = elements.len(),
            suitable = elements.iter().filter(|element| element.pv_suitable).count(),
            skipped = self.skipped_elements.len(),
            "building elements ready"
        );

        self.invalidate_dependants_of(Step::BuildingElements);
        Ok(self.building_elements.insert(elements).as_slice())
    }

    #[instrument(skip_all)]
    pub fn analyse_radiation(&mut self) -> Result<&[RadiationRecord], BipvError> {
        let annual_ghi = require(&self.weather, Step::Radiation, Step::Weather)?.annual_ghi;
        require(&self.building_elements, Step::Radiation, Step::BuildingElements)?;

        let radiation_input = self.input.radiation;
        let records = match radiation_input.method {
            RadiationMethod::Simplified => self.radiation_records(RadiationSource::Simplified {
                annual_ghi,
            })?,
            RadiationMethod::Hourly => {
                // held outside self while the aggregator borrows the rest of the state
                self.typical_year()?;
                let tmy = self.typical_year.take();
                let records = match &tmy {
                    Some(tmy) => self.radiation_records(RadiationSource::Hourly {
                        tmy,
                        annual_ghi,
                        albedo: radiation_input.albedo,
                    }),
                    None => Err(BipvError::MissingPrerequisite {
                        step: Step::Radiation,
                        requires: Step::Weather,
                    }),
                };
                self.typical_year = tmy;
                records?
            }
        };
        info!(
            method = ?radiation_input.method,
            records = records.len(),
            "radiation analysis complete"
        );

        self.invalidate_dependants_of(Step::Radiation);
        Ok(self.radiation.insert(records).as_slice())
    }

    fn radiation_records(&self, source: RadiationSource) -> Result<Vec<RadiationRecord>, BipvError> {
        let elements = require(&self.building_elements, Step::Radiation, Step::BuildingElements)?;
        let aggregator =
            RadiationAggregator::new(source, &self.input.shading, &self.input.suitability)?;
        Ok(aggregator.analyse(elements))
    }

    #[instrument(skip_all)]
    pub fn size_pv_systems(&mut self) -> Result<&[PVSystemSpec], BipvError> {
        let records = require(&self.radiation, Step::PvSizing, Step::Radiation)?;
        let elements = require(&self.building_elements, Step::PvSizing, Step::BuildingElements)?;

        let systems = PVSystemSizer::from_input(&self.input.pv_system).size_all(
            &self.input,
            elements,
            records,
        )?;
        if systems.is_empty() {
            warn!("no element can host a viable PV system");
        }
        info!(
            systems = systems.len(),
            excluded = records.len() - systems.len(),
            "PV systems sized"
        );

        self.invalidate_dependants_of(Step::PvSizing);
        Ok(self.pv_systems.insert(systems).as_slice())
    }

    /// Monthly demand from imported energy history, falling back to the demand in the input.
    pub fn monthly_demand(&self) -> Result<[f64; 12], BipvError> {
        match (&self.energy_history, &self.input.demand) {
            (Some(history), _) => Ok(history.monthly_demand),
            (None, Some(demand)) => Ok(demand.monthly_kwh),
            (None, None) => Err(BipvError::MissingPrerequisite {
                step: Step::EnergyBalance,
                requires: Step::EnergyHistory,
            }),
        }
    }

    #[instrument(skip_all)]
    pub fn calculate_energy_balance(&mut self) -> Result<&EnergyBalance, BipvError> {
        let systems = require(&self.pv_systems, Step::EnergyBalance, Step::PvSizing)?;
        let weather = require(&self.weather, Step::EnergyBalance, Step::Weather)?;
        let monthly_demand = self.monthly_demand()?;

        let balance = energy_balance::balance(&monthly_demand, systems, &weather.monthly_ghi);
        info!(
            annual_demand = balance.annual_demand,
            annual_generation = balance.annual_generation,
            self_sufficiency = balance.self_sufficiency,
            "energy balance calculated"
        );

        self.invalidate_dependants_of(Step::EnergyBalance);
        Ok(self.energy_balance.insert(balance))
    }

    #[instrument(skip_all)]
    pub fn optimise(&mut self) -> Result<&[OptimizationConfiguration], BipvError> {
        let systems = require(&self.pv_systems, Step::Optimization, Step::PvSizing)?;
        let balance = require(&self.energy_balance, Step::Optimization, Step::EnergyBalance)?;

        let scorer = ConfigurationScorer::from_input(&self.input.objectives, &self.input.financial)?;
        let configurations = scorer.score_configurations(systems, balance);
        if let Some(best) = configurations.first() {
            info!(
                configurations = configurations.len(),
                best = %best.id,
                score = best.overall_score,
                "configurations ranked"
            );
        }

        self.invalidate_dependants_of(Step::Optimization);
        Ok(self.configurations.insert(configurations).as_slice())
    }

    /// The configuration named in the input, or the best ranked one.
    pub fn selected_configuration(&self) -> Result<&OptimizationConfiguration, BipvError> {
        let configurations = require(
            &self.configurations,
            Step::FinancialAnalysis,
            Step::Optimization,
        )?;

        match &self.input.selected_configuration {
            Some(id) => configurations
                .iter()
                .find(|configuration| &configuration.id == id)
                .ok_or_else(|| BipvError::UnknownConfiguration(id.clone())),
            None => configurations.first().ok_or_else(|| {
                BipvError::invalid_input("no viable PV configuration to appraise")
            }),
        }
    }

    #[instrument(skip_all)]
    pub fn analyse_financials(&mut self) -> Result<&FinancialEnvironmentalResult, BipvError> {
        let configuration = self.selected_configuration()?;

        let result = financial::evaluate(configuration, &self.input.financial)?;
        info!(
            configuration = %result.configuration_id,
            npv = result.npv,
            payback_years = result.payback_years,
            lifetime_co2_avoided_t = result.lifetime_co2_avoided_t,
            "financial analysis complete"
        );

        Ok(self.financial.insert(result))
    }
}
