use crate::output::{Output, SinkOutput};
use crate::project_state::Step;
use crate::{run_project, ProjectFlags};
use approx::assert_relative_eq;
use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use rstest::*;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::io::{Read, Write};
use std::rc::Rc;

/// Keeps everything written to it in memory, keyed by "<location key>.<extension>".
#[derive(Debug, Default)]
struct MemoryOutput {
    files: RefCell<IndexMap<String, Rc<RefCell<Vec<u8>>>>>,
}

struct MemoryWriter(Rc<RefCell<Vec<u8>>>);

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl MemoryOutput {
    fn keys(&self) -> Vec<String> {
        self.files.borrow().keys().cloned().collect()
    }

    fn contents(&self, key: &str) -> String {
        let files = self.files.borrow();
        let buffer = files[key].borrow();
        String::from_utf8(buffer.clone()).unwrap()
    }
}

impl Output for &MemoryOutput {
    fn writer_for_location_key(
        &self,
        location_key: &str,
        file_extension: &str,
    ) -> anyhow::Result<impl Write> {
        let buffer = Rc::new(RefCell::new(vec![]));
        self.files.borrow_mut().insert(
            format!("{location_key}.{file_extension}"),
            buffer.clone(),
        );
        Ok(MemoryWriter(buffer))
    }
}

#[fixture]
fn input() -> Value {
    json!({
        "project": {
            "name": "Hudson & Co. offices",
            "location": "New York",
            "latitude": 40.7128,
            "longitude": -74.006,
            "timezone": "America/New_York"
        },
        "shading": {"tree_shading": 0.1, "building_shading": 0.05},
        "panel_catalog": {
            "mono": {"width": 2.0, "height": 1.0, "power_watts": 400.0, "efficiency": 0.2, "unit_cost": 250.0}
        },
        "pv_system": {"facade_panel": "mono"},
        "demand": {"monthly_kwh": [4000.0, 3800.0, 3600.0, 3200.0, 3000.0, 3400.0, 3900.0, 3900.0, 3300.0, 3200.0, 3500.0, 3900.0]},
        "building_elements": [
            {"id": "F-S", "type": "facade", "azimuth": 180.0, "area": 150.0},
            {"id": "F-N", "type": "facade", "azimuth": 0.0, "area": 150.0}
        ]
    })
}

fn reader(input: &Value) -> Vec<u8> {
    input.to_string().into_bytes()
}

#[rstest]
fn should_run_whole_study_from_inline_elements(input: Value) {
    let state = run_project(
        reader(&input).as_slice(),
        SinkOutput,
        None,
        None,
        &ProjectFlags::empty(),
    )
    .unwrap();

    assert_eq!(
        state.completed_steps(),
        vec![
            Step::Setup,
            Step::Weather,
            Step::BuildingElements,
            Step::Radiation,
            Step::PvSizing,
            Step::EnergyBalance,
            Step::Optimization,
            Step::FinancialAnalysis
        ]
    );

    let radiation = state.radiation.as_ref().unwrap();
    assert_eq!(radiation.len(), 1);
    assert_relative_eq!(radiation[0].annual_irradiance, 636.790624, max_relative = 1e-6);

    let systems = state.pv_systems.as_ref().unwrap();
    assert_eq!(systems[0].panel_count, 68);
    assert_relative_eq!(systems[0].system_power_kw, 27.2);
    assert_relative_eq!(systems[0].total_cost, 57800.);
    assert_relative_eq!(
        systems[0].annual_energy_kwh,
        27.2 * 636.790624 * 0.86,
        max_relative = 1e-6
    );

    // a single system makes "all" and "south-facing" duplicates of it
    let configurations = state.configurations.as_ref().unwrap();
    assert_eq!(configurations.len(), 1);
    assert_eq!(configurations[0].id, "single-F-S");
    assert_eq!(configurations[0].rank, 1);

    let balance = state.energy_balance.as_ref().unwrap();
    assert!((0. ..=100.).contains(&balance.self_sufficiency));
    assert_relative_eq!(balance.annual_demand, 42700.);

    let financial = state.financial.as_ref().unwrap();
    assert_eq!(financial.configuration_id, "single-F-S");
    assert_eq!(financial.cash_flows.len(), 25);
    assert_relative_eq!(financial.initial_cost, 57800.);
}

#[rstest]
fn should_read_elements_and_demand_from_csv_files(mut input: Value) {
    input["building_elements"] = json!([]);
    input["demand"] = Value::Null;
    let mut energy_csv = "Date,Consumption,Temperature\n\
                          2023-01-31,4000,1.5\n\
                          2023-02-28,3800,2.0\n\
                          2023-03-31,not read,\n\
                          2023-07-31,3900,25.3\n"
        .as_bytes();
    let mut bim_csv = "ElementId,Category,Family,Level,Azimuth (°),Area (m²)\n\
                       F-S,Walls,Curtain Wall,Level 1,180,150\n\
                       F-E,Walls,Curtain Wall,Level 1,90,120\n\
                       R-1,Roofs,Basic Roof,Roof,180,400\n"
        .as_bytes();

    let state = run_project(
        reader(&input).as_slice(),
        SinkOutput,
        Some(&mut energy_csv as &mut dyn Read),
        Some(&mut bim_csv as &mut dyn Read),
        &ProjectFlags::empty(),
    )
    .unwrap();

    let history = state.energy_history.as_ref().unwrap();
    assert_eq!(history.records.len(), 3);
    assert_eq!(history.skipped_rows.len(), 1);
    assert_eq!(state.skipped_elements.len(), 1);
    assert_eq!(state.building_elements.as_ref().unwrap().len(), 2);
    assert_relative_eq!(state.energy_balance.as_ref().unwrap().annual_demand, 11700.);

    let ids = state
        .configurations
        .as_ref()
        .unwrap()
        .iter()
        .map(|configuration| configuration.id.as_str())
        .collect::<Vec<_>>();
    assert!(ids.contains(&"all-systems"));
    assert!(ids.contains(&"single-F-E"));
    assert!(ids.contains(&"single-F-S"));
}

#[rstest]
fn should_fail_without_any_demand(mut input: Value) {
    input["demand"] = Value::Null;

    let result = run_project(
        reader(&input).as_slice(),
        SinkOutput,
        None,
        None,
        &ProjectFlags::empty(),
    );

    assert!(result.is_err());
}

#[rstest]
fn should_write_tables_report_and_snapshot(input: Value) {
    let output = MemoryOutput::default();

    run_project(
        reader(&input).as_slice(),
        &output,
        None,
        None,
        &(ProjectFlags::HTML_REPORT | ProjectFlags::STATE_SNAPSHOT),
    )
    .unwrap();

    assert_eq!(
        output.keys(),
        vec![
            "elements.csv",
            "radiation.csv",
            "pv_systems.csv",
            "monthly_balance.csv",
            "configurations.csv",
            "cash_flows.csv",
            "report.html",
            "state.json"
        ]
    );

    let monthly_balance = output.contents("monthly_balance.csv");
    assert_eq!(monthly_balance.lines().count(), 13);
    assert!(monthly_balance.starts_with("month,demand_kwh,generation_kwh,net_import_kwh"));

    let report = output.contents("report.html");
    assert!(report.starts_with("<!DOCTYPE html>"));
    assert!(report.contains("Hudson &amp; Co. offices"));
    for section in [
        "Summary",
        "Site climate",
        "PV systems",
        "Monthly energy balance",
        "Configurations",
        "Financial and environmental appraisal",
    ] {
        assert!(report.contains(&format!("<h2>{section}</h2>")), "{section}");
    }
    assert!(!report.contains("<script"));

    let snapshot: Value = serde_json::from_str(&output.contents("state.json")).unwrap();
    assert_eq!(snapshot["financial"]["configuration_id"], "single-F-S");
}

#[rstest]
fn should_finish_without_appraisal_when_no_element_is_viable(mut input: Value) {
    input["building_elements"] = json!([
        {"id": "F-N", "type": "facade", "azimuth": 0.0, "area": 150.0},
        {"id": "W-S", "type": "window", "azimuth": 180.0, "area": 2.0}
    ]);
    let output = MemoryOutput::default();

    let state = run_project(
        reader(&input).as_slice(),
        &output,
        None,
        None,
        &ProjectFlags::HTML_REPORT,
    )
    .unwrap();

    assert!(state.pv_systems.as_ref().unwrap().is_empty());
    assert!(state.configurations.as_ref().unwrap().is_empty());
    assert!(state.financial.is_none());
    assert_eq!(state.energy_balance.as_ref().unwrap().self_sufficiency, 0.);
    assert!(!output.keys().contains(&"report.html".to_string()));
}
