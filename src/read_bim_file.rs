use crate::core::building_element::{BuildingElement, ElementGeometry, ElementType};
use crate::core::units::Azimuth360;
use crate::errors::{BipvError, RowError};
use crate::input::SuitabilityPolicy;
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;
use tracing::{debug, warn};

const FILE_KIND: &str = "BIM element";

// header names accepted for the two columns every row needs
const ELEMENT_ID_HEADERS: [&str; 3] = ["ElementId", "Element ID", "element_id"];
const CATEGORY_HEADERS: [&str; 3] = ["Category", "category", "Type"];

/// One row of a BIM schedule export. Column names vary between export tools, so each field
/// accepts the common variants of its header.
#[derive(Debug, Deserialize)]
struct BimRow {
    #[serde(rename = "ElementId", alias = "Element ID", alias = "element_id")]
    element_id: String,
    #[serde(rename = "Category", alias = "category", alias = "Type")]
    category: String,
    #[serde(rename = "Family", default)]
    family: Option<String>,
    #[serde(rename = "Level", alias = "level", default)]
    level: Option<String>,
    #[serde(rename = "HostWallId", alias = "Host Wall Id", default)]
    host_wall_id: Option<String>,
    #[serde(
        rename = "Azimuth",
        alias = "Azimuth (°)",
        alias = "azimuth",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    azimuth: Option<f64>,
    #[serde(
        rename = "Area",
        alias = "Area (m²)",
        alias = "Glass Area (m²)",
        alias = "area",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    area: Option<f64>,
    #[serde(
        rename = "Width (m)",
        alias = "Width",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    width: Option<f64>,
    #[serde(
        rename = "Height (m)",
        alias = "Height",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    height: Option<f64>,
    #[serde(
        rename = "Length (m)",
        alias = "Length",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    length: Option<f64>,
    #[serde(
        rename = "Tilt (°)",
        alias = "Tilt",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    tilt: Option<f64>,
    #[serde(rename = "OriX", default, deserialize_with = "csv::invalid_option")]
    ori_x: Option<f64>,
    #[serde(rename = "OriY", default, deserialize_with = "csv::invalid_option")]
    ori_y: Option<f64>,
}

/// Azimuth of a horizontal outward normal given as (x, y) components, with y pointing North and
/// x pointing East.
pub fn azimuth_from_normal(ori_x: f64, ori_y: f64) -> Result<Azimuth360, BipvError> {
    if ori_x == 0. && ori_y == 0. {
        return Err(BipvError::invalid_input(
            "orientation vector has no horizontal component",
        ));
    }
    Ok(Azimuth360::normalised(ori_x.atan2(ori_y).to_degrees())?)
}

impl BimRow {
    fn into_element(self, row: usize, policy: &SuitabilityPolicy) -> Result<BuildingElement, RowError> {
        let element_type = self
            .category
            .parse::<ElementType>()
            .map_err(|_| RowError::new(row, format!("unsupported category '{}'", self.category)))?;

        let azimuth = match (self.azimuth, self.ori_x, self.ori_y) {
            (Some(azimuth), _, _) => azimuth,
            (None, Some(ori_x), Some(ori_y)) => azimuth_from_normal(ori_x, ori_y)
                .map_err(|err| RowError::new(row, err.to_string()))?
                .angle(),
            _ => return Err(RowError::new(row, "no azimuth or orientation vector")),
        };

        let width = self.width.or(self.length);
        let area = match (self.area, width, self.height) {
            (Some(area), _, _) => area,
            (None, Some(width), Some(height)) => width * height,
            _ => return Err(RowError::new(row, "no area or dimensions")),
        };

        if let Some(family) = &self.family {
            debug!(element_id = %self.element_id, family = %family, "read BIM element");
        }

        BuildingElement::new(
            self.element_id,
            element_type,
            ElementGeometry {
                azimuth,
                area,
                width,
                height: self.height,
                tilt: self.tilt,
                level: self.level.filter(|level| !level.is_empty()),
                host_wall_id: self.host_wall_id.filter(|id| !id.is_empty()),
            },
            policy,
        )
        .map_err(|err| RowError::new(row, err.to_string()))
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct BimImport {
    pub elements: Vec<BuildingElement>,
    pub skipped_rows: Vec<RowError>,
}

/// Read facade and window elements from a BIM schedule export, classifying each one. Rows that
/// cannot be turned into a valid element are skipped and reported in [`BimImport::skipped_rows`].
pub fn building_elements_from_csv(
    file: impl Read,
    policy: &SuitabilityPolicy,
) -> Result<BimImport, BipvError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(file);

    let headers = reader.headers()?.clone();
    for (column, accepted) in [
        ("ElementId", &ELEMENT_ID_HEADERS),
        ("Category", &CATEGORY_HEADERS),
    ] {
        if !headers.iter().any(|header| accepted.contains(&header)) {
            return Err(BipvError::MissingColumn {
                column,
                file_kind: FILE_KIND,
            });
        }
    }

    let mut elements = vec![];
    let mut skipped_rows = vec![];
    let mut seen_ids = HashSet::new();
    for (idx, result) in reader.deserialize::<BimRow>().enumerate() {
        let row = idx + 2;
        let parsed = result
            .map_err(|err| RowError::new(row, err.to_string()))
            .and_then(|bim_row| bim_row.into_element(row, policy))
            .and_then(|element| {
                if seen_ids.insert(element.id.clone()) {
                    Ok(element)
                } else {
                    Err(RowError::new(
                        row,
                        format!("duplicate element id '{}'", element.id),
                    ))
                }
            });
        match parsed {
            Ok(element) => elements.push(element),
            Err(err) => {
                warn!("skipping BIM element {err}");
                skipped_rows.push(err);
            }
        }
    }

    Ok(BimImport {
        elements,
        skipped_rows,
    })
}
