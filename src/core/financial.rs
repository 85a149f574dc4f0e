use crate::core::optimisation::{OptimizationConfiguration, NEVER_PAYS_BACK};
use crate::core::units::KILOGRAMS_PER_TONNE;
use crate::errors::BipvError;
use crate::input::FinancialInput;
use fsum::FSum;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct YearlyCashFlow {
    /// 1 for the first year of operation
    pub year: u32,
    pub generation_kwh: f64,
    pub savings: f64,
    pub om_cost: f64,
    pub net_cash_flow: f64,
    pub discounted_cash_flow: f64,
    pub cumulative_cash_flow: f64,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FinancialEnvironmentalResult {
    pub configuration_id: String,
    pub initial_cost: f64,
    /// kWh in the first year of operation
    pub initial_generation_kwh: f64,
    pub npv: f64,
    /// average annual cash flow as a percentage of the initial cost; an approximation of the
    /// internal rate of return, not a solution of NPV = 0
    pub irr: f64,
    /// first year in which cumulative cash flow covers the initial cost, or [`NEVER_PAYS_BACK`]
    pub payback_years: f64,
    /// %
    pub roi: f64,
    /// kg CO2 in the first year
    pub annual_co2_avoided_kg: f64,
    /// t CO2 over the system lifetime
    pub lifetime_co2_avoided_t: f64,
    pub carbon_credit_value: f64,
    pub cash_flows: Vec<YearlyCashFlow>,
}

/// Appraise a configuration over its lifetime, with output degrading each year and a fixed
/// operation and maintenance charge.
pub fn evaluate(
    configuration: &OptimizationConfiguration,
    parameters: &FinancialInput,
) -> Result<FinancialEnvironmentalResult, BipvError> {
    let initial_cost = configuration.total_cost;
    if !initial_cost.is_finite() || initial_cost <= 0. {
        return Err(BipvError::invalid_input(format!(
            "configuration '{}' must have a positive cost to be appraised, got {initial_cost}",
            configuration.id
        )));
    }
    let initial_generation = configuration.annual_energy_kwh;
    let om_cost = initial_cost * parameters.om_rate;

    let mut cash_flows = Vec::with_capacity(parameters.lifetime_years as usize);
    let mut cumulative_cash_flow = 0.;
    for year in 1..=parameters.lifetime_years {
        let generation_kwh =
            initial_generation * (1. - parameters.degradation_rate).powi(year as i32);
        let savings = generation_kwh * parameters.electricity_rate;
        let net_cash_flow = savings - om_cost;
        cumulative_cash_flow += net_cash_flow;

        cash_flows.push(YearlyCashFlow {
            year,
            generation_kwh,
            savings,
            om_cost,
            net_cash_flow,
            discounted_cash_flow: net_cash_flow
                / (1. + parameters.discount_rate).powi(year as i32),
            cumulative_cash_flow,
        });
    }

    let total_cash_flow = FSum::with_all(cash_flows.iter().map(|flow| flow.net_cash_flow)).value();
    let total_discounted =
        FSum::with_all(cash_flows.iter().map(|flow| flow.discounted_cash_flow)).value();
    let lifetime_generation =
        FSum::with_all(cash_flows.iter().map(|flow| flow.generation_kwh)).value();

    let payback_years = cash_flows
        .iter()
        .find(|flow| flow.cumulative_cash_flow >= initial_cost)
        .map_or(NEVER_PAYS_BACK, |flow| flow.year as f64);
    let mean_cash_flow = if cash_flows.is_empty() {
        0.
    } else {
        total_cash_flow / cash_flows.len() as f64
    };
    let lifetime_co2_avoided_t =
        lifetime_generation * parameters.grid_co2_factor / KILOGRAMS_PER_TONNE as f64;

    Ok(FinancialEnvironmentalResult {
        configuration_id: configuration.id.clone(),
        initial_cost,
        initial_generation_kwh: initial_generation,
        npv: total_discounted - initial_cost,
        irr: mean_cash_flow / initial_cost * 100.,
        payback_years,
        roi: (total_cash_flow - initial_cost) / initial_cost * 100.,
        annual_co2_avoided_kg: initial_generation * parameters.grid_co2_factor,
        lifetime_co2_avoided_t,
        carbon_credit_value: lifetime_co2_avoided_t * parameters.carbon_price,
        cash_flows,
    })
}
