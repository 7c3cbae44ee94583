use crate::loader::LoadReport;
use crate::types::{
    GeoAnnotatedSite, NeighborRelationRecord, RankedTargetCell, SiteId, SummaryStats,
};
use crate::util::average;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::info;

/// Share of the total preparation volume a target cell must exceed.
pub const MIN_TRAFFIC_SHARE: f64 = 0.001;

/// Number of worst target cells reported.
pub const WORST_CELL_LIMIT: usize = 20;

/// Ranked cells plus the figures used to select them.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub cells: Vec<RankedTargetCell>,
    pub target_cells: usize,
    pub total_preparations: f64,
    pub threshold: f64,
}

/// Worst target cells of a report, worst first.
pub fn rank(records: &[NeighborRelationRecord]) -> Vec<RankedTargetCell> {
    rank_with_stats(records).cells
}

pub fn rank_with_stats(records: &[NeighborRelationRecord]) -> Ranking {
    #[derive(Default)]
    struct Acc {
        total_hosr: Vec<f64>,
        prep_sr: Vec<f64>,
        exec_sr: Vec<f64>,
        preparations: f64,
        inter_ho_attempts: f64,
        inter_ho_successes: f64,
        relations: usize,
    }

    info!(relations = records.len(), "ranking worst HO neighbors");

    // BTreeMap keeps the groups in (site, local cell) order before sorting,
    // which fixes the order of ties.
    let mut map: BTreeMap<(SiteId, u8), Acc> = BTreeMap::new();
    for r in records {
        let e = map
            .entry((r.target_site_id(), r.target_local_cell_id()))
            .or_default();
        e.total_hosr.extend(r.total_hosr);
        e.prep_sr.extend(r.prep_sr);
        e.exec_sr.extend(r.exec_sr);
        e.preparations += r.preparations.unwrap_or(0.0);
        e.inter_ho_attempts += r.inter_ho_attempts.unwrap_or(0.0);
        e.inter_ho_successes += r.inter_ho_successes.unwrap_or(0.0);
        e.relations += 1;
    }

    let target_cells = map.len();
    let total_preparations: f64 = map.values().map(|a| a.preparations).sum();
    let threshold = MIN_TRAFFIC_SHARE * total_preparations;

    let mut cells: Vec<RankedTargetCell> = map
        .into_iter()
        .filter(|(_, acc)| acc.preparations > threshold)
        .map(|((site, lcr), acc)| RankedTargetCell {
            target_site_id: site,
            target_local_cell_id: lcr,
            total_hosr: average(&acc.total_hosr),
            prep_sr: average(&acc.prep_sr),
            exec_sr: average(&acc.exec_sr),
            preparations: acc.preparations,
            inter_ho_attempts: acc.inter_ho_attempts,
            inter_ho_successes: acc.inter_ho_successes,
            relations: acc.relations,
        })
        .collect();

    cells.sort_by(compare_worst_first);
    cells.truncate(WORST_CELL_LIMIT);

    info!(
        target_cells,
        threshold,
        ranked = cells.len(),
        "ranking done"
    );
    Ranking {
        cells,
        target_cells,
        total_preparations,
        threshold,
    }
}

/// Ascending total HOSR with missing rates last, then busier cells first.
pub fn compare_worst_first(a: &RankedTargetCell, b: &RankedTargetCell) -> Ordering {
    let by_rate = match (a.total_hosr, b.total_hosr) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_rate.then_with(|| b.preparations.total_cmp(&a.preparations))
}

/// Distinct target sites of a ranking, in rank order.
pub fn ranked_sites(cells: &[RankedTargetCell]) -> Vec<SiteId> {
    let mut sites: Vec<SiteId> = Vec::new();
    for c in cells {
        if !sites.contains(&c.target_site_id) {
            sites.push(c.target_site_id);
        }
    }
    sites
}

pub fn generate_summary(
    source_site: SiteId,
    load: &LoadReport,
    ranking: &Ranking,
    sites: &[GeoAnnotatedSite],
) -> SummaryStats {
    SummaryStats {
        source_site,
        total_rows: load.total_rows,
        invalid_rows: load.invalid_rows,
        relations: load.kept_rows,
        target_cells: ranking.target_cells,
        total_preparations: ranking.total_preparations,
        traffic_threshold: ranking.threshold,
        ranked_cells: ranking.cells.len(),
        sites: sites.len(),
        sites_missing_coordinates: sites.iter().filter(|s| !s.has_coordinates()).count(),
    }
}
