//! Advisory performance block - net cash flow and return per window.
//!
//! Performance periods are assigned to a window when they lie entirely inside
//! it, measured from the entity's last period end. Windows are merged under
//! the intersection policy: an entity with no complete period in any one of
//! the six windows loses the whole block, and with it its row in the final
//! matrix.

use super::metric;
use crate::{
    Result, SourceTables,
    aggregate::{WindowMatch, WindowedMetric},
    anchor::{AnchorKind, Anchors},
    merge::{MergePolicy, merge_tables},
    registry::BlockCategory,
    sources::{ENTITY_ID, NET_PAID, PERIOD_END_DAY, PERIOD_START_DAY, RETURN_FRACTION, require_columns},
    traits::FeatureBlock,
    window::windows,
};
use polars::prelude::*;

/// Advisory performance block.
///
/// # Output Columns
/// - `net_paid_<period>` for the six periods
/// - `performance_<period>` for the six periods
#[derive(Debug, Clone, Copy, Default)]
pub struct AdvisoryPerformance;

impl AdvisoryPerformance {
    fn spans() -> WindowMatch {
        WindowMatch::Spans {
            start: PERIOD_START_DAY.into(),
            end: PERIOD_END_DAY.into(),
        }
    }

    /// Net amount paid in over the periods of a window.
    pub fn net_paid_metric(&self) -> WindowedMetric {
        WindowedMetric::sum(metric::NET_PAID, NET_PAID, Self::spans())
    }

    /// Summed return fraction over the periods of a window.
    pub fn performance_metric(&self) -> WindowedMetric {
        WindowedMetric::sum(metric::PERFORMANCE, RETURN_FRACTION, Self::spans())
    }
}

impl FeatureBlock for AdvisoryPerformance {
    fn name(&self) -> &str {
        "advisory_performance"
    }

    fn description(&self) -> &str {
        "Net amount paid in and advisory return over each window before the last performance period"
    }

    fn category(&self) -> BlockCategory {
        BlockCategory::Performance
    }

    fn required_columns(&self) -> &[&str] {
        &[ENTITY_ID, PERIOD_START_DAY, PERIOD_END_DAY, NET_PAID, RETURN_FRACTION]
    }

    fn anchor(&self) -> Option<AnchorKind> {
        Some(AnchorKind::Performance)
    }

    fn window_policy(&self) -> Option<MergePolicy> {
        Some(MergePolicy::Intersection)
    }

    fn compute(&self, sources: &SourceTables, offset_days: u32) -> Result<DataFrame> {
        let performance = sources.performance();
        require_columns(performance, self.required_columns())?;
        let anchors = Anchors::performance(performance)?;

        let net_paid = self.net_paid_metric().aggregate_windows(
            performance,
            &anchors,
            windows(offset_days)?,
            MergePolicy::Intersection,
        )?;
        let returns = self.performance_metric().aggregate_windows(
            performance,
            &anchors,
            windows(offset_days)?,
            MergePolicy::Intersection,
        )?;

        merge_tables(vec![net_paid, returns], ENTITY_ID, MergePolicy::Intersection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::DateSentinels,
        sources::{PerformanceRecord, RawSources, day_number, fixtures},
    };
    use approx::assert_relative_eq;
    use chrono::Days;

    const ANCHOR: (i32, u32, u32) = (2019, 10, 31);

    /// Seven back-to-back 28-day periods ending on the anchor, the newest
    /// first; `skip` leaves one window without a period.
    fn monthly(entity_id: i64, skip: Option<usize>) -> Vec<PerformanceRecord> {
        let anchor = fixtures::date(ANCHOR.0, ANCHOR.1, ANCHOR.2);
        (0..7u64)
            .filter(|i| Some(*i as usize) != skip)
            .map(|i| PerformanceRecord {
                entity_id,
                period_start: anchor - Days::new(28 * (i + 1)),
                period_end: anchor - Days::new(28 * i),
                net_paid: 100.0 * (i + 1) as f64,
                return_fraction: 0.01 * (i + 1) as f64,
            })
            .collect()
    }

    fn sources(performance: &[PerformanceRecord]) -> SourceTables {
        let raw =
            RawSources::from_records(fixtures::attributes(&[1, 2]), &[], performance, &[], &[])
                .unwrap();
        SourceTables::normalize(raw, &DateSentinels::default()).unwrap()
    }

    #[test]
    fn test_periods_land_in_their_window() {
        let tables = sources(&monthly(1, None));
        let result = AdvisoryPerformance.compute(&tables, 0).unwrap();

        assert_eq!(result.height(), 1);
        assert_eq!(result.width(), 13);
        // Period i = 1 ends 28 days before the anchor: window LAST.
        let last = result.column("net_paid_last").unwrap().f64().unwrap();
        assert_relative_eq!(last.get(0).unwrap(), 200.0);
        let sixth = result.column("performance_sixth_last").unwrap().f64().unwrap();
        assert_relative_eq!(sixth.get(0).unwrap(), 0.07, epsilon = 1e-12);
    }

    #[test]
    fn test_gap_in_one_window_drops_entity() {
        let mut records = monthly(1, None);
        // Entity 2 has no period in window THIRD-LAST.
        records.extend(monthly(2, Some(3)));
        let tables = sources(&records);
        let result = AdvisoryPerformance.compute(&tables, 0).unwrap();

        let ids: Vec<i64> = result
            .column(ENTITY_ID)
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_offset_shifts_windows() {
        let tables = sources(&monthly(1, None));
        // With a 28-day offset window LAST holds period i = 2, and window
        // SIXTH-LAST would need a period that does not exist.
        let result = AdvisoryPerformance.compute(&tables, 28).unwrap();
        assert_eq!(result.height(), 0);

        let anchors = Anchors::performance(tables.performance()).unwrap();
        let anchor = fixtures::date(ANCHOR.0, ANCHOR.1, ANCHOR.2);
        assert_eq!(anchors.to_map().unwrap()[&1], day_number(anchor));
    }

    #[test]
    fn test_advisory_performance_metadata() {
        let block = AdvisoryPerformance;
        assert_eq!(block.name(), "advisory_performance");
        assert_eq!(block.category(), BlockCategory::Performance);
        assert_eq!(block.anchor(), Some(AnchorKind::Performance));
        assert_eq!(block.window_policy(), Some(MergePolicy::Intersection));
    }
}
