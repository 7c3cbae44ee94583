//! One analysis run: source site → ranking → geo enrichment → summary.

use crate::error::Result;
use crate::geo::{enrich, source_site_of, SiteLocationTable};
use crate::loader::ReportUpload;
use crate::reports::{generate_summary, rank_with_stats, ranked_sites, Ranking};
use crate::types::{GeoAnnotatedSite, SiteId, SummaryStats};

/// Everything a run produces. Owned by the caller; nothing outlives it.
#[derive(Debug)]
pub struct Analysis {
    pub source_site: SiteId,
    pub ranking: Ranking,
    pub sites: Vec<GeoAnnotatedSite>,
    pub summary: SummaryStats,
}

impl Analysis {
    pub fn run(upload: &ReportUpload, locations: &SiteLocationTable) -> Result<Self> {
        let source_site = source_site_of(&upload.records)?;
        let ranking = rank_with_stats(&upload.records);
        let sites = enrich(ranked_sites(&ranking.cells), source_site, locations);
        let summary = generate_summary(source_site, &upload.load_report, &ranking, &sites);
        Ok(Analysis {
            source_site,
            ranking,
            sites,
            summary,
        })
    }
}
