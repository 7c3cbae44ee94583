use crate::error::{Error, Result};
use crate::loader::ReportUpload;
use crate::pipeline::Analysis;
use crate::types::{
    GeoAnnotatedSite, GeoSiteRow, RankedCellRecord, RankedCellRow, RankedTargetCell,
};
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tabled::{builder::Builder, settings::Style, Table, Tabled};
use tracing::info;

pub const RANKED_FILE: &str = "worst_neighbors.csv";
pub const SITES_FILE: &str = "neighbor_sites.csv";
pub const SUMMARY_FILE: &str = "summary.json";
pub const MAP_FILE: &str = "neighbor_map.geojson";

/// Write `rows` with a header line taken from the row type, so an empty
/// table still carries its columns.
pub fn write_csv<T: Serialize + Tabled>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    let headers = T::headers();
    wtr.write_record(headers.iter().map(|h| h.as_bytes()))?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s).map_err(|e| Error::io(path, e))?;
    Ok(())
}

pub fn render_rows<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}\n", render_rows(rows, max_rows));
}

pub fn ranked_rows(cells: &[RankedTargetCell]) -> Vec<RankedCellRow> {
    cells
        .iter()
        .enumerate()
        .map(|(idx, c)| RankedCellRow::from_cell(idx + 1, c))
        .collect()
}

pub fn ranked_records(cells: &[RankedTargetCell]) -> Vec<RankedCellRecord> {
    cells
        .iter()
        .enumerate()
        .map(|(idx, c)| RankedCellRecord::from_cell(idx + 1, c))
        .collect()
}

pub fn site_rows(sites: &[GeoAnnotatedSite]) -> Vec<GeoSiteRow> {
    sites.iter().map(GeoSiteRow::from).collect()
}

/// Head of the uploaded table with every column, as the user sent it.
pub fn render_upload_preview(upload: &ReportUpload) -> String {
    if upload.preview.is_empty() {
        return "(no rows)".to_string();
    }
    let mut builder = Builder::default();
    builder.push_record(upload.headers.iter().cloned());
    for row in &upload.preview {
        builder.push_record(row.iter().cloned());
    }
    builder.build().with(Style::markdown()).to_string()
}

pub fn file_modified(path: &Path) -> Option<DateTime<Local>> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Local>::from)
}

/// GeoJSON layer with one point per site that has both coordinates.
pub fn map_layer(sites: &[GeoAnnotatedSite]) -> Value {
    let features: Vec<Value> = sites
        .iter()
        .filter_map(|s| {
            let lat = s.location.latitude?;
            let lon = s.location.longitude?;
            Some(json!({
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [lon, lat] },
                "properties": {
                    "MRBTS": s.site_id,
                    "Cascade": s.location.cascade,
                    "Target": s.target_label(),
                },
            }))
        })
        .collect();
    json!({ "type": "FeatureCollection", "features": features })
}

/// Write every table of an analysis into `out_dir`, returning the paths.
pub fn export_analysis(analysis: &Analysis, out_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir).map_err(|e| Error::io(out_dir, e))?;

    let ranked = out_dir.join(RANKED_FILE);
    write_csv(&ranked, &ranked_records(&analysis.ranking.cells))?;

    let sites = out_dir.join(SITES_FILE);
    write_csv(&sites, &site_rows(&analysis.sites))?;

    let summary = out_dir.join(SUMMARY_FILE);
    write_json(&summary, &analysis.summary)?;

    let map = out_dir.join(MAP_FILE);
    write_json(&map, &map_layer(&analysis.sites))?;

    info!(dir = %out_dir.display(), "outputs saved");
    Ok(vec![ranked, sites, summary, map])
}
