use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::util::{format_number, format_opt};

/// Site identifier (MRBTS / LNBTS id).
pub type SiteId = u64;

/// One report row as it comes out of the reader, before validation.
///
/// Column names follow the neighbor hand-over analysis report.
#[derive(Debug, Deserialize)]
pub struct RawRow {
    #[serde(rename = "Source LNBTS name")]
    pub source_site_name: Option<String>,
    #[serde(rename = "eci_id")]
    pub eci_id: Option<String>,
    #[serde(rename = "NBR Inter eNB Total HOSR")]
    pub total_hosr: Option<String>,
    #[serde(rename = "NBR Inter eNB HO Prep SR")]
    pub prep_sr: Option<String>,
    #[serde(rename = "NBR Inter eNB Ho Exec SR")]
    pub exec_sr: Option<String>,
    #[serde(rename = "NBR Inter eNB HO Preparations")]
    pub preparations: Option<String>,
    #[serde(rename = "INTER_HO_ATT_NB (M8015C8)")]
    pub inter_ho_attempts: Option<String>,
    #[serde(rename = "INTER_HO_SUCC_NB (M8015C9)")]
    pub inter_ho_successes: Option<String>,
}

/// Header names every report must carry.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "Source LNBTS name",
    "eci_id",
    "NBR Inter eNB Total HOSR",
    "NBR Inter eNB HO Prep SR",
    "NBR Inter eNB Ho Exec SR",
    "NBR Inter eNB HO Preparations",
    "INTER_HO_ATT_NB (M8015C8)",
    "INTER_HO_SUCC_NB (M8015C9)",
];

/// Local cells per site encoded in an ECI.
pub const CELLS_PER_SITE: u64 = 256;

/// One (source cell, target cell) neighbor relation.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborRelationRecord {
    pub source_site_name: String,
    pub target_cell_id: u64,
    pub total_hosr: Option<f64>,
    pub prep_sr: Option<f64>,
    pub exec_sr: Option<f64>,
    pub preparations: Option<f64>,
    pub inter_ho_attempts: Option<f64>,
    pub inter_ho_successes: Option<f64>,
}

impl NeighborRelationRecord {
    pub fn target_site_id(&self) -> SiteId {
        self.target_cell_id / CELLS_PER_SITE
    }

    pub fn target_local_cell_id(&self) -> u8 {
        (self.target_cell_id % CELLS_PER_SITE) as u8
    }
}

/// Aggregated metrics for one target cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedTargetCell {
    pub target_site_id: SiteId,
    pub target_local_cell_id: u8,
    pub total_hosr: Option<f64>,
    pub prep_sr: Option<f64>,
    pub exec_sr: Option<f64>,
    pub preparations: f64,
    pub inter_ho_attempts: f64,
    pub inter_ho_successes: f64,
    pub relations: usize,
}

/// A site's position in the reference data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SiteLocation {
    pub cascade: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// A site involved in the analysis, joined to its location.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoAnnotatedSite {
    pub site_id: SiteId,
    pub is_target: bool,
    pub location: SiteLocation,
}

impl GeoAnnotatedSite {
    pub fn has_coordinates(&self) -> bool {
        self.location.latitude.is_some() && self.location.longitude.is_some()
    }

    pub fn target_label(&self) -> &'static str {
        if self.is_target {
            "Yes"
        } else {
            "No"
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct RankedCellRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Target LNBTS ID")]
    #[tabled(rename = "Target LNBTS ID")]
    pub target_site_id: SiteId,
    #[serde(rename = "Target LCR ID")]
    #[tabled(rename = "Target LCR ID")]
    pub target_local_cell_id: u8,
    #[serde(rename = "Total HOSR")]
    #[tabled(rename = "Total HOSR")]
    pub total_hosr: String,
    #[serde(rename = "HO Prep SR")]
    #[tabled(rename = "HO Prep SR")]
    pub prep_sr: String,
    #[serde(rename = "HO Exec SR")]
    #[tabled(rename = "HO Exec SR")]
    pub exec_sr: String,
    #[serde(rename = "HO Preparations")]
    #[tabled(rename = "HO Preparations")]
    pub preparations: String,
    #[serde(rename = "INTER_HO_ATT_NB")]
    #[tabled(rename = "INTER_HO_ATT_NB")]
    pub inter_ho_attempts: String,
    #[serde(rename = "INTER_HO_SUCC_NB")]
    #[tabled(rename = "INTER_HO_SUCC_NB")]
    pub inter_ho_successes: String,
}

impl RankedCellRow {
    pub fn from_cell(rank: usize, cell: &RankedTargetCell) -> Self {
        RankedCellRow {
            rank,
            target_site_id: cell.target_site_id,
            target_local_cell_id: cell.target_local_cell_id,
            total_hosr: format_opt(cell.total_hosr, 2),
            prep_sr: format_opt(cell.prep_sr, 2),
            exec_sr: format_opt(cell.exec_sr, 2),
            preparations: format_number(cell.preparations, 0),
            inter_ho_attempts: format_number(cell.inter_ho_attempts, 0),
            inter_ho_successes: format_number(cell.inter_ho_successes, 0),
        }
    }
}

/// Machine-readable export of a ranked cell: raw numbers, blank when missing.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct RankedCellRecord {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Target LNBTS ID")]
    #[tabled(rename = "Target LNBTS ID")]
    pub target_site_id: SiteId,
    #[serde(rename = "Target LCR ID")]
    #[tabled(rename = "Target LCR ID")]
    pub target_local_cell_id: u8,
    #[serde(rename = "Total HOSR")]
    #[tabled(rename = "Total HOSR", display_with = "display_raw")]
    pub total_hosr: Option<f64>,
    #[serde(rename = "HO Prep SR")]
    #[tabled(rename = "HO Prep SR", display_with = "display_raw")]
    pub prep_sr: Option<f64>,
    #[serde(rename = "HO Exec SR")]
    #[tabled(rename = "HO Exec SR", display_with = "display_raw")]
    pub exec_sr: Option<f64>,
    #[serde(rename = "HO Preparations")]
    #[tabled(rename = "HO Preparations")]
    pub preparations: f64,
    #[serde(rename = "INTER_HO_ATT_NB")]
    #[tabled(rename = "INTER_HO_ATT_NB")]
    pub inter_ho_attempts: f64,
    #[serde(rename = "INTER_HO_SUCC_NB")]
    #[tabled(rename = "INTER_HO_SUCC_NB")]
    pub inter_ho_successes: f64,
}

fn display_raw(v: &Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

impl RankedCellRecord {
    pub fn from_cell(rank: usize, cell: &RankedTargetCell) -> Self {
        RankedCellRecord {
            rank,
            target_site_id: cell.target_site_id,
            target_local_cell_id: cell.target_local_cell_id,
            total_hosr: cell.total_hosr,
            prep_sr: cell.prep_sr,
            exec_sr: cell.exec_sr,
            preparations: cell.preparations,
            inter_ho_attempts: cell.inter_ho_attempts,
            inter_ho_successes: cell.inter_ho_successes,
        }
    }
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct GeoSiteRow {
    #[serde(rename = "MRBTS")]
    #[tabled(rename = "MRBTS")]
    pub site_id: SiteId,
    #[serde(rename = "Target")]
    #[tabled(rename = "Target")]
    pub target: String,
    #[serde(rename = "Cascade")]
    #[tabled(rename = "Cascade")]
    pub cascade: String,
    #[serde(rename = "latitude")]
    #[tabled(rename = "latitude")]
    pub latitude: String,
    #[serde(rename = "longitude")]
    #[tabled(rename = "longitude")]
    pub longitude: String,
}

impl From<&GeoAnnotatedSite> for GeoSiteRow {
    fn from(site: &GeoAnnotatedSite) -> Self {
        GeoSiteRow {
            site_id: site.site_id,
            target: site.target_label().to_string(),
            cascade: site.location.cascade.clone().unwrap_or_default(),
            latitude: site
                .location
                .latitude
                .map(|v| format!("{:.6}", v))
                .unwrap_or_default(),
            longitude: site
                .location
                .longitude
                .map(|v| format!("{:.6}", v))
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub source_site: SiteId,
    pub total_rows: usize,
    pub invalid_rows: usize,
    pub relations: usize,
    pub target_cells: usize,
    pub total_preparations: f64,
    pub traffic_threshold: f64,
    pub ranked_cells: usize,
    pub sites: usize,
    pub sites_missing_coordinates: usize,
}
