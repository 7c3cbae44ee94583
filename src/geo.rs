//! Geo-location of the sites involved in an analysis.
//!
//! The reference workbook carries two lookup sheets: site → cascade
//! ([`CASCADE_SHEET`]) and cascade → coordinates ([`COORDINATES_SHEET`]).
//! Both joins are left joins; a site missing from either sheet keeps empty
//! location fields.

use crate::error::{Error, Result};
use crate::types::{GeoAnnotatedSite, NeighborRelationRecord, SiteId, SiteLocation};
use crate::util::{parse_f64_safe, parse_u64_safe};
use calamine::{open_workbook_auto, Data, Range, Reader};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

pub const CASCADE_SHEET: &str = "MRBTS-Cascade";
pub const COORDINATES_SHEET: &str = "Cascade Coordinates";

/// Trailing characters of a textual source label that hold the site id.
pub const SOURCE_SITE_SUFFIX_LEN: usize = 7;

/// In-memory copy of the reference workbook.
#[derive(Debug, Clone, Default)]
pub struct SiteLocationTable {
    cascades: HashMap<SiteId, String>,
    coordinates: HashMap<String, (Option<f64>, Option<f64>)>,
}

impl SiteLocationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load both lookup sheets from a workbook on disk.
    pub fn load(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "loading site reference data");
        let mut workbook = open_workbook_auto(path).map_err(|e| {
            Error::MissingReferenceData(format!("cannot open {}: {}", path.display(), e))
        })?;
        let cascades = workbook.worksheet_range(CASCADE_SHEET).map_err(|e| {
            Error::MissingReferenceData(format!("sheet '{}': {}", CASCADE_SHEET, e))
        })?;
        let coordinates = workbook.worksheet_range(COORDINATES_SHEET).map_err(|e| {
            Error::MissingReferenceData(format!("sheet '{}': {}", COORDINATES_SHEET, e))
        })?;
        Self::from_sheets(&cascades, &coordinates)
    }

    /// Build the table from the two sheet ranges.
    ///
    /// The first row of each range is its header. When a key occurs twice the
    /// first row wins.
    pub fn from_sheets(cascades: &Range<Data>, coordinates: &Range<Data>) -> Result<Self> {
        let mut table = Self::new();

        let mut rows = cascades.rows();
        let header = rows.next().unwrap_or(&[]);
        let site_col = column_index(header, "MRBTS", CASCADE_SHEET)?;
        let cascade_col = column_index(header, "Cascade", CASCADE_SHEET)?;
        for row in rows {
            let Some(site) = row.get(site_col).and_then(cell_u64) else {
                continue;
            };
            let Some(cascade) = row.get(cascade_col).and_then(cell_string) else {
                continue;
            };
            table.insert_site(site, cascade);
        }

        let mut rows = coordinates.rows();
        let header = rows.next().unwrap_or(&[]);
        let cascade_col = column_index(header, "Cascade", COORDINATES_SHEET)?;
        let lat_col = column_index(header, "latitude", COORDINATES_SHEET)?;
        let lon_col = column_index(header, "longitude", COORDINATES_SHEET)?;
        for row in rows {
            let Some(cascade) = row.get(cascade_col).and_then(cell_string) else {
                continue;
            };
            let lat = row.get(lat_col).and_then(cell_f64);
            let lon = row.get(lon_col).and_then(cell_f64);
            table.insert_coordinates(cascade, lat, lon);
        }

        info!(
            sites = table.cascades.len(),
            cascades = table.coordinates.len(),
            "site reference data loaded"
        );
        Ok(table)
    }

    pub fn insert_site(&mut self, site: SiteId, cascade: impl Into<String>) {
        let cascade = cascade.into();
        if let Some(existing) = self.cascades.get(&site) {
            if *existing != cascade {
                warn!(site, kept = %existing, ignored = %cascade, "site mapped to several cascades");
            }
            return;
        }
        self.cascades.insert(site, cascade);
    }

    pub fn insert_coordinates(
        &mut self,
        cascade: impl Into<String>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) {
        let cascade = cascade.into();
        if self.coordinates.contains_key(&cascade) {
            warn!(cascade = %cascade, "duplicate cascade coordinates ignored");
            return;
        }
        self.coordinates.insert(cascade, (latitude, longitude));
    }

    /// Left join of a site against both lookups.
    pub fn locate(&self, site: SiteId) -> SiteLocation {
        let Some(cascade) = self.cascades.get(&site) else {
            return SiteLocation::default();
        };
        let (latitude, longitude) = self.coordinates.get(cascade).copied().unwrap_or_default();
        SiteLocation {
            cascade: Some(cascade.clone()),
            latitude,
            longitude,
        }
    }
}

fn column_index(header: &[Data], name: &str, sheet: &str) -> Result<usize> {
    header
        .iter()
        .position(|c| cell_string(c).is_some_and(|h| h.eq_ignore_ascii_case(name)))
        .ok_or_else(|| {
            Error::MissingReferenceData(format!("sheet '{}' has no '{}' column", sheet, name))
        })
}

fn cell_string(cell: &Data) -> Option<String> {
    let s = match cell {
        Data::Empty => return None,
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        other => other.to_string(),
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn cell_u64(cell: &Data) -> Option<u64> {
    match cell {
        Data::Int(i) => u64::try_from(*i).ok(),
        _ => parse_u64_safe(cell_string(cell).as_deref()),
    }
}

fn cell_f64(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f),
        Data::Int(i) => Some(*i as f64),
        _ => parse_f64_safe(cell_string(cell).as_deref()),
    }
}

/// Extract the numeric site id from a source label.
///
/// Purely numeric labels are taken as is, anything else contributes its last
/// [`SOURCE_SITE_SUFFIX_LEN`] characters.
pub fn parse_source_site(label: &str) -> Option<SiteId> {
    let label = label.trim();
    if let Some(id) = parse_u64_safe(Some(label)) {
        return Some(id);
    }
    let chars: Vec<char> = label.chars().collect();
    let start = chars.len().saturating_sub(SOURCE_SITE_SUFFIX_LEN);
    let suffix: String = chars[start..].iter().collect();
    suffix.trim().parse::<SiteId>().ok()
}

/// Source site of a report, taken from its first relation.
pub fn source_site_of(records: &[NeighborRelationRecord]) -> Result<SiteId> {
    let first = records
        .first()
        .ok_or_else(|| Error::SourceSite("report has no valid relations".to_string()))?;

    let labels: HashSet<&str> = records.iter().map(|r| r.source_site_name.as_str()).collect();
    if labels.len() > 1 {
        warn!(
            labels = labels.len(),
            using = %first.source_site_name,
            "report mixes several source sites"
        );
    }

    parse_source_site(&first.source_site_name).ok_or_else(|| {
        Error::SourceSite(format!(
            "no site id in label '{}'",
            first.source_site_name
        ))
    })
}

/// Join the ranked target sites and the source site to their locations.
///
/// Targets keep their first-seen order; the source site is appended once,
/// tagged as non-target, even if it also ranked as a target.
pub fn enrich<I>(
    ranked_sites: I,
    source_site: SiteId,
    locations: &SiteLocationTable,
) -> Vec<GeoAnnotatedSite>
where
    I: IntoIterator<Item = SiteId>,
{
    info!(source_site, "geolocating worst neighbors");
    let mut seen = HashSet::new();
    seen.insert(source_site);

    let mut sites: Vec<GeoAnnotatedSite> = ranked_sites
        .into_iter()
        .filter(|site| seen.insert(*site))
        .map(|site_id| GeoAnnotatedSite {
            site_id,
            is_target: true,
            location: locations.locate(site_id),
        })
        .collect();
    sites.push(GeoAnnotatedSite {
        site_id: source_site,
        is_target: false,
        location: locations.locate(source_site),
    });

    let missing = sites.iter().filter(|s| !s.has_coordinates()).count();
    if missing > 0 {
        warn!(missing, "sites without coordinates");
    }
    sites
}
