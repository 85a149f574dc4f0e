use crate::core::energy_balance::EnergyBalance;
use crate::core::financial::FinancialEnvironmentalResult;
use crate::core::optimisation::{never_pays_back, OptimizationConfiguration};
use crate::core::pv_system::PVSystemSpec;
use crate::core::weather::WeatherProfile;
use crate::errors::BipvError;
use crate::output::Output;
use crate::project_state::{ProjectState, Step};
use csv::WriterBuilder;
use serde::Serialize;
use std::fmt;
use std::io::Write;
use tracing::info;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

fn write_csv<T: Serialize>(output: &impl Output, key: &str, rows: &[T]) -> anyhow::Result<()> {
    info!("writing out to {key}");
    let writer = output.writer_for_location_key(key, "csv")?;
    let mut writer = WriterBuilder::new().from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

#[derive(Serialize)]
struct MonthlyBalanceRow {
    month: &'static str,
    demand_kwh: f64,
    generation_kwh: f64,
    net_import_kwh: f64,
}

#[derive(Serialize)]
struct ConfigurationRow<'a> {
    rank: usize,
    id: &'a str,
    label: &'a str,
    systems: String,
    total_power_kw: f64,
    total_cost: f64,
    annual_energy_kwh: f64,
    energy_independence: f64,
    annual_savings: f64,
    npv: f64,
    payback_years: f64,
    overall_score: f64,
}

impl<'a> From<&'a OptimizationConfiguration> for ConfigurationRow<'a> {
    fn from(configuration: &'a OptimizationConfiguration) -> Self {
        Self {
            rank: configuration.rank,
            id: &configuration.id,
            label: &configuration.label,
            systems: configuration.system_ids.join(";"),
            total_power_kw: configuration.total_power_kw,
            total_cost: configuration.total_cost,
            annual_energy_kwh: configuration.annual_energy_kwh,
            energy_independence: configuration.energy_independence,
            annual_savings: configuration.annual_savings,
            npv: configuration.npv,
            payback_years: configuration.payback_years,
            overall_score: configuration.overall_score,
        }
    }
}

/// Write one CSV table per completed step that produces tabular results.
pub fn write_csv_tables(output: &impl Output, state: &ProjectState) -> anyhow::Result<()> {
    if output.is_noop() {
        return Ok(());
    }

    if let Some(elements) = &state.building_elements {
        write_csv(output, "elements", elements)?;
    }
    if let Some(records) = &state.radiation {
        write_csv(output, "radiation", records)?;
    }
    if let Some(systems) = &state.pv_systems {
        write_csv(output, "pv_systems", systems)?;
    }
    if let Some(balance) = &state.energy_balance {
        let rows = MONTH_NAMES
            .iter()
            .enumerate()
            .map(|(month, name)| MonthlyBalanceRow {
                month: name,
                demand_kwh: balance.monthly_demand[month],
                generation_kwh: balance.monthly_generation[month],
                net_import_kwh: balance.monthly_net_import[month],
            })
            .collect::<Vec<_>>();
        write_csv(output, "monthly_balance", &rows)?;
    }
    if let Some(configurations) = &state.configurations {
        let rows = configurations
            .iter()
            .map(ConfigurationRow::from)
            .collect::<Vec<_>>();
        write_csv(output, "configurations", &rows)?;
    }
    if let Some(financial) = &state.financial {
        write_csv(output, "cash_flows", &financial.cash_flows)?;
    }

    Ok(())
}

pub fn write_state_snapshot(output: &impl Output, state: &ProjectState) -> anyhow::Result<()> {
    info!("writing out project state");
    let mut writer = output.writer_for_location_key("state", "json")?;
    state.save(&mut writer)?;
    writer.flush()?;

    Ok(())
}

fn escape_html(text: &str) -> String {
    text.chars().fold(String::with_capacity(text.len()), |mut escaped, c| {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
        escaped
    })
}

fn format_payback(payback_years: f64) -> String {
    if never_pays_back(payback_years) {
        "never".to_string()
    } else {
        format!("{payback_years:.1}")
    }
}

const STYLE: &str = "body{font-family:sans-serif;margin:2em;color:#222}\
h1{color:#1a5276}h2{border-bottom:2px solid #f5b041;padding-bottom:.2em}\
table{border-collapse:collapse;margin-bottom:1.5em}\
th,td{border:1px solid #ccc;padding:.3em .6em;text-align:right}\
th{background:#eaf2f8}td:first-child,th:first-child{text-align:left}\
.metric{display:inline-block;margin-right:2em}.metric b{display:block;font-size:1.4em}";

/// Render a self-contained HTML report of the study. Needs at least the financial analysis to
/// have run.
pub fn render_html_report(state: &ProjectState) -> Result<String, BipvError> {
    let missing = |requires| BipvError::ReportPrerequisite { requires };
    let report = HtmlReport {
        state,
        weather: state.weather.as_ref().ok_or_else(|| missing(Step::Weather))?,
        systems: state.pv_systems.as_ref().ok_or_else(|| missing(Step::PvSizing))?,
        balance: state
            .energy_balance
            .as_ref()
            .ok_or_else(|| missing(Step::EnergyBalance))?,
        configurations: state
            .configurations
            .as_ref()
            .ok_or_else(|| missing(Step::Optimization))?,
        financial: state
            .financial
            .as_ref()
            .ok_or_else(|| missing(Step::FinancialAnalysis))?,
    };

    let mut html = String::new();
    report.write_to(&mut html)?;

    Ok(html)
}

struct HtmlReport<'a> {
    state: &'a ProjectState,
    weather: &'a WeatherProfile,
    systems: &'a [PVSystemSpec],
    balance: &'a EnergyBalance,
    configurations: &'a [OptimizationConfiguration],
    financial: &'a FinancialEnvironmentalResult,
}

impl HtmlReport<'_> {
    fn write_to(&self, html: &mut impl fmt::Write) -> fmt::Result {
        let Self {
            state,
            weather,
            systems,
            balance,
            configurations,
            financial,
        } = self;
        let project = &state.input.project;
        let currency = escape_html(&project.currency);
        let elements = state.building_elements.as_deref().unwrap_or_default();

        write!(
            html,
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>BIPV feasibility: {name}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
             <h1>BIPV feasibility: {name}</h1>\n<p>{location}latitude {lat:.4}, longitude {lon:.4}, \
             timezone {tz}</p>\n",
            name = escape_html(&project.name),
            location = project
                .location
                .as_deref()
                .map(|location| format!("{}, ", escape_html(location)))
                .unwrap_or_default(),
            lat = project.latitude,
            lon = project.longitude,
            tz = escape_html(&project.timezone),
        )?;

        write!(
            html,
            "<h2>Summary</h2>\n<div>\
             <span class=\"metric\">Self-sufficiency<b>{:.1} %</b></span>\
             <span class=\"metric\">Annual generation<b>{:.0} kWh</b></span>\
             <span class=\"metric\">Net present value<b>{:.0} {currency}</b></span>\
             <span class=\"metric\">Payback<b>{} years</b></span>\
             <span class=\"metric\">CO2 avoided<b>{:.1} t</b></span>\
             </div>\n",
            balance.self_sufficiency,
            balance.annual_generation,
            financial.npv,
            format_payback(financial.payback_years),
            financial.lifetime_co2_avoided_t,
        )?;

        write!(
            html,
            "<h2>Site climate</h2>\n<p>Annual GHI {:.0} kWh/m2, DNI {:.0} kWh/m2, DHI {:.0} kWh/m2; \
             average temperature {:.1} &deg;C; {:.0} heating degree days.</p>\n",
            weather.annual_ghi,
            weather.annual_dni,
            weather.annual_dhi,
            weather.average_temperature,
            weather.heating_degree_days,
        )?;

        write!(
            html,
            "<h2>Building elements</h2>\n<p>{} elements analysed, {} suitable for PV, {} rows skipped \
             on import.</p>\n",
            elements.len(),
            elements.iter().filter(|element| element.pv_suitable).count(),
            state.skipped_elements.len(),
        )?;

        html.write_str(
            "<h2>PV systems</h2>\n<table>\n<tr><th>Element</th><th>Orientation</th><th>Panel</th>\
             <th>Panels</th><th>Power (kW)</th><th>Energy (kWh/yr)</th><th>Yield (kWh/kW)</th>\
             <th>Cost</th></tr>\n",
        )?;
        for system in systems.iter() {
            writeln!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.2}</td><td>{:.0}</td>\
                 <td>{:.0}</td><td>{:.0}</td></tr>",
                escape_html(&system.element_id),
                system.orientation,
                escape_html(&system.panel),
                system.panel_count,
                system.system_power_kw,
                system.annual_energy_kwh,
                system.specific_yield,
                system.total_cost,
            )?;
        }
        html.write_str("</table>\n")?;

        html.write_str(
            "<h2>Monthly energy balance</h2>\n<table>\n<tr><th>Month</th><th>Demand (kWh)</th>\
             <th>Generation (kWh)</th><th>Net import (kWh)</th></tr>\n",
        )?;
        for (month, name) in MONTH_NAMES.iter().enumerate() {
            writeln!(
                html,
                "<tr><td>{name}</td><td>{:.0}</td><td>{:.0}</td><td>{:.0}</td></tr>",
                balance.monthly_demand[month],
                balance.monthly_generation[month],
                balance.monthly_net_import[month],
            )?;
        }
        html.write_str("</table>\n")?;

        html.write_str(
            "<h2>Configurations</h2>\n<table>\n<tr><th>Rank</th><th>Configuration</th>\
             <th>Power (kW)</th><th>Cost</th><th>Energy independence (%)</th><th>NPV</th>\
             <th>Payback (years)</th><th>Score</th></tr>\n",
        )?;
        for configuration in configurations.iter() {
            writeln!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{:.2}</td><td>{:.0}</td><td>{:.1}</td><td>{:.0}</td>\
                 <td>{}</td><td>{:.3}</td></tr>",
                configuration.rank,
                escape_html(&configuration.label),
                configuration.total_power_kw,
                configuration.total_cost,
                configuration.energy_independence,
                configuration.npv,
                format_payback(configuration.payback_years),
                configuration.overall_score,
            )?;
        }
        html.write_str("</table>\n")?;

        write!(
            html,
            "<h2>Financial and environmental appraisal</h2>\n<p>Configuration: {}</p>\n<table>\n\
             <tr><td>Initial cost</td><td>{:.0} {currency}</td></tr>\n\
             <tr><td>Net present value</td><td>{:.0} {currency}</td></tr>\n\
             <tr><td>Return on investment</td><td>{:.1} %</td></tr>\n\
             <tr><td>Average annual return (IRR approximation)</td><td>{:.1} %</td></tr>\n\
             <tr><td>Payback</td><td>{} years</td></tr>\n\
             <tr><td>CO2 avoided, first year</td><td>{:.0} kg</td></tr>\n\
             <tr><td>CO2 avoided, lifetime</td><td>{:.1} t</td></tr>\n\
             <tr><td>Carbon credit value</td><td>{:.0} {currency}</td></tr>\n\
             </table>\n</body>\n</html>\n",
            escape_html(&financial.configuration_id),
            financial.initial_cost,
            financial.npv,
            financial.roi,
            financial.irr,
            format_payback(financial.payback_years),
            financial.annual_co2_avoided_kg,
            financial.lifetime_co2_avoided_t,
            financial.carbon_credit_value,
        )?;

        Ok(())
    }
}

pub fn write_html_report(output: &impl Output, state: &ProjectState) -> anyhow::Result<()> {
    let html = render_html_report(state)?;
    info!("writing out HTML report");
    let mut writer = output.writer_for_location_key("report", "html")?;
    writer.write_all(html.as_bytes())?;
    writer.flush()?;

    Ok(())
}
