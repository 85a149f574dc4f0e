use crate::core::energy_balance::{self_sufficiency, EnergyBalance};
use crate::core::pv_system::PVSystemSpec;
use crate::errors::BipvError;
use crate::input::{FinancialInput, ObjectiveWeights};
use fsum::FSum;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Payback period reported for an investment that never recovers its cost, in years
pub const NEVER_PAYS_BACK: f64 = 999.;

pub const ALL_SYSTEMS_ID: &str = "all-systems";
pub const SOUTH_FACING_ID: &str = "south-facing";

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct OptimizationConfiguration {
    pub id: String,
    pub label: String,
    /// element ids of the systems making up this configuration
    pub system_ids: Vec<String>,
    pub total_power_kw: f64,
    pub total_cost: f64,
    /// kWh/year
    pub annual_energy_kwh: f64,
    /// %
    pub energy_independence: f64,
    pub annual_savings: f64,
    pub npv: f64,
    /// years, or [`NEVER_PAYS_BACK`]
    pub payback_years: f64,
    pub overall_score: f64,
    /// 1 for the best scoring configuration
    pub rank: usize,
}

pub fn never_pays_back(payback_years: f64) -> bool {
    payback_years >= NEVER_PAYS_BACK
}

/// Simple payback: cost over annual savings
pub fn simple_payback(total_cost: f64, annual_savings: f64) -> f64 {
    if annual_savings <= 0. {
        NEVER_PAYS_BACK
    } else {
        total_cost / annual_savings
    }
}

/// Net present value of a level annual saving over a number of years
pub fn level_npv(total_cost: f64, annual_savings: f64, lifetime_years: u32, discount_rate: f64) -> f64 {
    let discounted = FSum::with_all(
        (1..=lifetime_years).map(|year| annual_savings / (1. + discount_rate).powi(year as i32)),
    )
    .value();

    discounted - total_cost
}

struct Candidate<'a> {
    id: String,
    label: String,
    systems: Vec<&'a PVSystemSpec>,
}

/// The fixed set of candidates: each system on its own, all systems together, then the
/// south-facing subset. Empty candidates and those repeating an earlier system set are dropped.
fn candidates(systems: &[PVSystemSpec]) -> Vec<Candidate<'_>> {
    let singles = systems.iter().map(|system| Candidate {
        id: format!("single-{}", system.element_id),
        label: format!("{} only", system.element_id),
        systems: vec![system],
    });
    let all = Candidate {
        id: ALL_SYSTEMS_ID.to_string(),
        label: "All systems".to_string(),
        systems: systems.iter().collect(),
    };
    let south = Candidate {
        id: SOUTH_FACING_ID.to_string(),
        label: "South-facing systems".to_string(),
        systems: systems
            .iter()
            .filter(|system| system.orientation.is_south_facing())
            .collect(),
    };

    let mut seen: HashSet<Vec<String>> = HashSet::new();
    singles
        .chain([all, south])
        .filter(|candidate| !candidate.systems.is_empty())
        .filter(|candidate| {
            let key = candidate
                .systems
                .iter()
                .map(|system| system.element_id.clone())
                .sorted()
                .collect();
            let is_new = seen.insert(key);
            if !is_new {
                debug!(candidate = %candidate.id, "dropping duplicate configuration");
            }
            is_new
        })
        .collect()
}

#[derive(Clone, Copy, Debug)]
pub struct ConfigurationScorer {
    energy_weight: f64,
    financial_weight: f64,
    electricity_rate: f64,
    lifetime_years: u32,
    discount_rate: f64,
}

impl ConfigurationScorer {
    pub fn new(
        weights: &ObjectiveWeights,
        electricity_rate: f64,
        lifetime_years: u32,
        discount_rate: f64,
    ) -> Result<Self, BipvError> {
        let (energy_weight, financial_weight) = weights.normalised()?;

        Ok(Self {
            energy_weight,
            financial_weight,
            electricity_rate,
            lifetime_years,
            discount_rate,
        })
    }

    pub fn from_input(
        weights: &ObjectiveWeights,
        financial: &FinancialInput,
    ) -> Result<Self, BipvError> {
        Self::new(
            weights,
            financial.electricity_rate,
            financial.lifetime_years,
            financial.discount_rate,
        )
    }

    /// Score and rank the candidate configurations, best first.
    pub fn score_configurations(
        &self,
        systems: &[PVSystemSpec],
        balance: &EnergyBalance,
    ) -> Vec<OptimizationConfiguration> {
        let mut configurations = candidates(systems)
            .into_iter()
            .map(|candidate| self.evaluate_candidate(candidate, balance.annual_demand))
            .collect::<Vec<_>>();

        let max_npv = configurations
            .iter()
            .map(|configuration| configuration.npv)
            .fold(f64::NEG_INFINITY, f64::max);

        for configuration in configurations.iter_mut() {
            let financial_score = if max_npv > 0. {
                configuration.npv / max_npv
            } else {
                0.
            };
            configuration.overall_score = self.energy_weight
                * (configuration.energy_independence / 100.)
                + self.financial_weight * financial_score;
        }

        // sort_by is stable, so ties keep candidate order
        configurations.sort_by(|a, b| b.overall_score.total_cmp(&a.overall_score));
        for (idx, configuration) in configurations.iter_mut().enumerate() {
            configuration.rank = idx + 1;
        }

        configurations
    }

    fn evaluate_candidate(&self, candidate: Candidate, annual_demand: f64) -> OptimizationConfiguration {
        let total_power_kw = FSum::with_all(candidate.systems.iter().map(|s| s.system_power_kw)).value();
        let total_cost = FSum::with_all(candidate.systems.iter().map(|s| s.total_cost)).value();
        let annual_energy_kwh =
            FSum::with_all(candidate.systems.iter().map(|s| s.annual_energy_kwh)).value();
        let annual_savings = annual_energy_kwh * self.electricity_rate;

        OptimizationConfiguration {
            system_ids: candidate
                .systems
                .iter()
                .map(|system| system.element_id.clone())
                .collect(),
            id: candidate.id,
            label: candidate.label,
            total_power_kw,
            total_cost,
            annual_energy_kwh,
            energy_independence: self_sufficiency(annual_energy_kwh, annual_demand),
            annual_savings,
            npv: level_npv(
                total_cost,
                annual_savings,
                self.lifetime_years,
                self.discount_rate,
            ),
            payback_years: simple_payback(total_cost, annual_savings),
            overall_score: 0.,
            rank: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::building_element::{ElementType, Orientation};
    use crate::core::energy_balance::balance;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn system(id: &str, orientation: Orientation, cost: f64, energy: f64) -> PVSystemSpec {
        PVSystemSpec {
            element_id: id.to_string(),
            element_type: ElementType::Facade,
            orientation,
            panel: "mono".to_string(),
            panel_count: 10,
            covered_area: 20.,
            system_power_kw: 4.,
            annual_energy_kwh: energy,
            specific_yield: energy / 4.,
            panel_cost: cost / 2.,
            installation_cost: cost / 2.,
            total_cost: cost,
        }
    }

    #[fixture]
    fn systems() -> Vec<PVSystemSpec> {
        vec![
            system("S", Orientation::South, 10000., 5000.),
            system("E", Orientation::East, 8000., 3000.),
        ]
    }

    #[fixture]
    fn scorer() -> ConfigurationScorer {
        ConfigurationScorer::new(
            &ObjectiveWeights {
                energy_weight: 0.5,
                financial_weight: 0.5,
            },
            0.25,
            25,
            0.05,
        )
        .unwrap()
    }

    fn demand_of(annual: f64) -> EnergyBalance {
        balance(&[annual / 12.; 12], &[], &[1.; 12])
    }

    #[rstest]
    fn should_calculate_level_npv() {
        assert_relative_eq!(level_npv(10000., 1250., 25, 0.05), 7617.43, max_relative = 1e-5);
        assert_relative_eq!(level_npv(1000., 100., 10, 0.), 0., epsilon = 1e-9);
    }

    #[rstest]
    #[case(10000., 1250., 8.)]
    #[case(10000., 0., NEVER_PAYS_BACK)]
    #[case(10000., -5., NEVER_PAYS_BACK)]
    fn should_calculate_simple_payback(
        #[case] cost: f64,
        #[case] savings: f64,
        #[case] expected: f64,
    ) {
        assert_eq!(simple_payback(cost, savings), expected);
    }

    #[rstest]
    fn should_enumerate_and_rank_candidates(systems: Vec<PVSystemSpec>, scorer: ConfigurationScorer) {
        let configurations = scorer.score_configurations(&systems, &demand_of(20000.));

        // the south-facing subset repeats "S only" so is dropped
        let ids = configurations
            .iter()
            .map(|configuration| configuration.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![ALL_SYSTEMS_ID, "single-S", "single-E"]);
        assert_eq!(
            configurations.iter().map(|c| c.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        let all = &configurations[0];
        assert_eq!(all.system_ids, vec!["S", "E"]);
        assert_relative_eq!(all.energy_independence, 40., max_relative = 1e-12);
        assert_relative_eq!(all.npv, 10187.9, max_relative = 1e-4);
        assert_relative_eq!(all.overall_score, 0.7, max_relative = 1e-12);
        assert_relative_eq!(configurations[1].overall_score, 0.4988, max_relative = 1e-3);
        assert_relative_eq!(configurations[2].overall_score, 0.2011, max_relative = 1e-3);
        assert_relative_eq!(configurations[1].payback_years, 8.);
    }

    #[rstest]
    fn should_keep_south_subset_when_distinct(scorer: ConfigurationScorer) {
        let systems = vec![
            system("S", Orientation::South, 10000., 5000.),
            system("SW", Orientation::Southwest, 9000., 4000.),
            system("W", Orientation::West, 8000., 3000.),
        ];
        let configurations = scorer.score_configurations(&systems, &demand_of(20000.));

        assert_eq!(configurations.len(), 5);
        let south = configurations
            .iter()
            .find(|configuration| configuration.id == SOUTH_FACING_ID)
            .unwrap();
        assert_eq!(south.system_ids, vec!["S", "SW"]);
    }

    #[rstest]
    fn should_collapse_single_system_to_one_candidate(scorer: ConfigurationScorer) {
        let systems = vec![system("S", Orientation::South, 10000., 5000.)];
        let configurations = scorer.score_configurations(&systems, &demand_of(20000.));

        assert_eq!(configurations.len(), 1);
        assert_eq!(configurations[0].id, "single-S");
        assert_eq!(configurations[0].rank, 1);
    }

    #[rstest]
    fn should_produce_no_candidates_without_systems(scorer: ConfigurationScorer) {
        assert!(scorer
            .score_configurations(&[], &demand_of(20000.))
            .is_empty());
    }

    #[rstest]
    fn should_drop_financial_term_when_no_candidate_has_positive_npv(
        systems: Vec<PVSystemSpec>,
    ) {
        let scorer = ConfigurationScorer::new(&ObjectiveWeights::default(), 0.01, 25, 0.05).unwrap();
        let configurations = scorer.score_configurations(&systems, &demand_of(20000.));

        for configuration in &configurations {
            assert!(configuration.npv < 0.);
            assert_relative_eq!(
                configuration.overall_score,
                0.5 * configuration.energy_independence / 100.
            );
        }
    }

    #[rstest]
    fn should_normalise_weights(systems: Vec<PVSystemSpec>) {
        let scorer = ConfigurationScorer::new(
            &ObjectiveWeights {
                energy_weight: 2.,
                financial_weight: 0.,
            },
            0.25,
            25,
            0.05,
        )
        .unwrap();
        let configurations = scorer.score_configurations(&systems, &demand_of(20000.));

        assert_relative_eq!(configurations[0].overall_score, 0.4, max_relative = 1e-12);
    }

    #[rstest]
    fn should_reject_zero_weights() {
        assert!(ConfigurationScorer::new(
            &ObjectiveWeights {
                energy_weight: 0.,
                financial_weight: 0.,
            },
            0.25,
            25,
            0.05
        )
        .is_err());
    }
}
