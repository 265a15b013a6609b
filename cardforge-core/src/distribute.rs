//! Block Distributor - Vertical placement of several text blocks in one region
//!
//! Blocks are only ever translated here. The single exception is the refit
//! path of `nudge_for_obstacle`, which delegates to `fitter::fit_multiple`.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::FitConfig;
use crate::error::LayoutError;
use crate::fitter::{fit_multiple, FitOutcome, LayoutBlock};
use crate::surface::{ElementId, Rect, RenderSurface};

/// Where a block ended up after a spread.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    pub element: ElementId,
    /// Vertical translation applied, in pixels.
    pub offset: f64,
    pub gap_before: f64,
    pub top: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionPlan {
    pub entries: Vec<PlanEntry>,
    pub trailing_gap: f64,
}

impl DistributionPlan {
    /// Every gap in the plan, leading and trailing included.
    pub fn gaps(&self) -> Vec<f64> {
        self.entries
            .iter()
            .map(|e| e.gap_before)
            .chain(std::iter::once(self.trailing_gap))
            .collect()
    }

    /// Re-reads every entry from the surface after blocks moved or changed
    /// size since the spread. Offsets stay cumulative.
    pub fn refresh<S: RenderSurface + ?Sized>(
        &mut self,
        surface: &S,
        region: Rect,
    ) -> Result<(), LayoutError> {
        let mut previous_bottom = region.top;
        for entry in &mut self.entries {
            let bounds = surface.bounds(entry.element)?;
            entry.offset += bounds.top - entry.top;
            entry.gap_before = bounds.top - previous_bottom;
            entry.top = bounds.top;
            entry.height = bounds.height();
            previous_bottom = bounds.bottom;
        }
        self.trailing_gap = region.bottom - previous_bottom;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeStrategy {
    /// The last block was already clear of the obstacle.
    Untouched,
    /// Blocks moved up into existing gap space.
    Shifted,
    /// Gap space was not enough; blocks were shrunk and spread again.
    Refit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NudgeOutcome {
    pub strategy: NudgeStrategy,
    /// Overlap measured before anything moved, in pixels.
    pub overlap: f64,
    pub iterations: u32,
    pub refit: Vec<FitOutcome>,
}

// --- Even Spread ---

/// Translate `elements` top to bottom into `region` with even spacing.
///
/// Gaps are in pixels. With no gaps, leftover space is split into N+1 equal
/// gaps. With only `outer_gap`, the remainder is split across the N-1 inner
/// slots (a single block is top-aligned below the outer gap). With only
/// `inner_gap`, the remainder is split between top and bottom.
pub fn spread_even<S: RenderSurface + ?Sized>(
    surface: &mut S,
    elements: &[ElementId],
    region: Rect,
    outer_gap: Option<f64>,
    inner_gap: Option<f64>,
) -> Result<DistributionPlan, LayoutError> {
    if elements.is_empty() {
        return Ok(DistributionPlan {
            entries: vec![],
            trailing_gap: region.height(),
        });
    }

    let heights = elements
        .iter()
        .map(|&el| surface.bounds(el).map(|b| b.height()))
        .collect::<Result<Vec<_>, _>>()?;
    let n = elements.len() as f64;
    let leftover = region.height() - heights.iter().sum::<f64>();

    let (outer, inner) = match (outer_gap, inner_gap) {
        (None, None) => {
            let gap = leftover / (n + 1.0);
            (gap, gap)
        }
        (Some(outer), None) if elements.len() == 1 => (outer, 0.0),
        (Some(outer), None) => (outer, (leftover - 2.0 * outer) / (n - 1.0)),
        (None, Some(inner)) => ((leftover - (n - 1.0) * inner) / 2.0, inner),
        (Some(outer), Some(inner)) => (outer, inner),
    };
    if outer < 0.0 || inner < 0.0 {
        warn!(leftover, outer, inner, "blocks overflow their region, clamping gaps");
    }
    let (outer, inner) = (outer.max(0.0), inner.max(0.0));

    let mut entries = Vec::with_capacity(elements.len());
    let mut cursor = region.top;
    for (i, (&element, &height)) in elements.iter().zip(&heights).enumerate() {
        let gap_before = if i == 0 { outer } else { inner };
        cursor += gap_before;
        let offset = cursor - surface.bounds(element)?.top;
        surface.translate(element, 0.0, offset)?;
        entries.push(PlanEntry {
            element,
            offset,
            gap_before,
            top: cursor,
            height,
        });
        cursor += height;
    }

    let plan = DistributionPlan {
        entries,
        trailing_gap: region.bottom - cursor,
    };
    debug!(blocks = elements.len(), outer, inner, trailing = plan.trailing_gap, "spread blocks");
    Ok(plan)
}

// --- Obstacle Nudge ---

/// Clear the last block off an obstacle below or beside it (a power/toughness
/// box, usually).
///
/// Blocks first borrow space from their existing gaps, each gap giving up the
/// same fraction, so blocks nearer the obstacle move furthest. When the gaps
/// cannot absorb the overlap the set is shrunk with `fit_multiple` into the
/// space above the obstacle and spread again, up to `max_nudge_iterations`.
pub fn nudge_for_obstacle<S: RenderSurface + ?Sized>(
    surface: &mut S,
    blocks: &mut [LayoutBlock],
    region: Rect,
    obstacle: Rect,
    top_clearance: Option<Rect>,
    config: &FitConfig,
) -> Result<NudgeOutcome, LayoutError> {
    let mut outcome = NudgeOutcome {
        strategy: NudgeStrategy::Untouched,
        overlap: 0.0,
        iterations: 0,
        refit: vec![],
    };
    let clearance = surface.scale_by_dpi(config.obstacle_gap_pts);
    let overlap = last_overlap(surface, blocks, obstacle, clearance)?;
    if overlap <= 0.0 {
        return Ok(outcome);
    }
    outcome.overlap = overlap;

    let upper = top_clearance.map_or(region.top, |r| r.bottom.max(region.top));
    let elements: Vec<ElementId> = blocks.iter().map(|b| b.element).collect();
    let gaps = current_gaps(surface, &elements, upper)?;
    let reclaimable: f64 = gaps.iter().sum();

    if overlap <= reclaimable {
        let mut shift = 0.0;
        for (&element, gap) in elements.iter().zip(&gaps) {
            shift += overlap * gap / reclaimable;
            surface.translate(element, 0.0, -shift)?;
        }
        outcome.strategy = NudgeStrategy::Shifted;
        debug!(overlap, reclaimable, "nudged blocks into gap space");
        return Ok(outcome);
    }

    outcome.strategy = NudgeStrategy::Refit;
    let available = Rect::new(region.left, upper, region.right, obstacle.top - clearance);
    if available.height() <= 0.0 {
        warn!(overlap, "no room above obstacle");
        return Err(LayoutError::ObstacleUnresolvable { iterations: 0, overlap });
    }

    let mut remaining = overlap;
    while outcome.iterations < config.max_nudge_iterations {
        outcome.iterations += 1;
        outcome.refit = fit_multiple(surface, blocks, available, config)?;
        spread_even(surface, &elements, available, None, None)?;
        remaining = last_overlap(surface, blocks, obstacle, clearance)?;
        if remaining <= 0.0 {
            debug!(overlap, iterations = outcome.iterations, "refit blocks above obstacle");
            return Ok(outcome);
        }
    }

    warn!(remaining, iterations = outcome.iterations, "obstacle still overlaps");
    Err(LayoutError::ObstacleUnresolvable {
        iterations: outcome.iterations,
        overlap: remaining,
    })
}

fn last_overlap<S: RenderSurface + ?Sized>(
    surface: &S,
    blocks: &[LayoutBlock],
    obstacle: Rect,
    clearance: f64,
) -> Result<f64, LayoutError> {
    let Some(last) = blocks.last() else {
        return Ok(0.0);
    };
    let bounds = surface.bounds(last.element)?;
    if !bounds.overlaps_horizontally(&obstacle) || bounds.top >= obstacle.bottom {
        return Ok(0.0);
    }
    Ok(bounds.bottom + clearance - obstacle.top)
}

/// Gap above each element, the first measured from `upper`. Negative gaps
/// count as zero.
fn current_gaps<S: RenderSurface + ?Sized>(
    surface: &S,
    elements: &[ElementId],
    upper: f64,
) -> Result<Vec<f64>, LayoutError> {
    let mut gaps = Vec::with_capacity(elements.len());
    let mut previous_bottom = upper;
    for &element in elements {
        let bounds = surface.bounds(element)?;
        gaps.push((bounds.top - previous_bottom).max(0.0));
        previous_bottom = bounds.bottom;
    }
    Ok(gaps)
}

// --- Dividers ---

/// Place one copy of `template` midway between each adjacent pair of blocks
/// and hide the template itself.
pub fn position_dividers<S: RenderSurface + ?Sized>(
    surface: &mut S,
    template: ElementId,
    elements: &[ElementId],
) -> Result<Vec<ElementId>, LayoutError> {
    let mut dividers = Vec::with_capacity(elements.len().saturating_sub(1));
    for pair in elements.windows(2) {
        let above = surface.bounds(pair[0])?;
        let below = surface.bounds(pair[1])?;
        let midpoint = (above.bottom + below.top) / 2.0;

        let divider = surface.duplicate(template)?;
        let current = surface.bounds(divider)?;
        surface.translate(divider, 0.0, midpoint - (current.top + current.height() / 2.0))?;
        surface.set_visible(divider, true)?;
        dividers.push(divider);
    }
    surface.set_visible(template, false)?;
    Ok(dividers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::FormattedString;
    use crate::print::PrintSpec;
    use crate::surface::HeadlessSurface;

    const EPS: f64 = 1e-6;

    fn surface() -> HeadlessSurface {
        HeadlessSurface::new(PrintSpec::from_template(72))
    }

    fn shapes(s: &mut HeadlessSurface, heights: &[f64]) -> Vec<ElementId> {
        heights
            .iter()
            .enumerate()
            .map(|(i, &h)| s.add_shape(&format!("block{i}"), Rect::from_size(0.0, 0.0, 100.0, h)))
            .collect()
    }

    fn tops(s: &HeadlessSurface, elements: &[ElementId]) -> Vec<f64> {
        elements.iter().map(|&e| s.bounds(e).unwrap().top).collect()
    }

    fn as_blocks(elements: &[ElementId]) -> Vec<LayoutBlock> {
        elements
            .iter()
            .map(|&e| LayoutBlock::new(e, FormattedString::default(), "Body", 10.0, 10.0))
            .collect()
    }

    #[test]
    fn test_spread_uniform() {
        let mut s = surface();
        let els = shapes(&mut s, &[20.0, 30.0, 10.0]);
        let region = Rect::from_size(0.0, 100.0, 100.0, 120.0);
        let plan = spread_even(&mut s, &els, region, None, None).unwrap();

        assert_eq!(tops(&s, &els), vec![115.0, 150.0, 195.0]);
        assert_eq!(plan.trailing_gap, 15.0);
        let total: f64 = plan.gaps().iter().sum();
        assert!((total - 60.0).abs() < EPS);
    }

    #[test]
    fn test_spread_outer_only() {
        let mut s = surface();
        let els = shapes(&mut s, &[20.0, 30.0, 10.0]);
        let region = Rect::from_size(0.0, 100.0, 100.0, 120.0);
        let plan = spread_even(&mut s, &els, region, Some(10.0), None).unwrap();

        assert_eq!(tops(&s, &els), vec![110.0, 150.0, 200.0]);
        assert_eq!(plan.trailing_gap, 10.0);
    }

    #[test]
    fn test_spread_single_block_outer_gap() {
        let mut s = surface();
        let els = shapes(&mut s, &[40.0]);
        let region = Rect::from_size(0.0, 0.0, 100.0, 120.0);
        let plan = spread_even(&mut s, &els, region, Some(12.0), None).unwrap();

        assert_eq!(tops(&s, &els), vec![12.0]);
        assert_eq!(plan.trailing_gap, 68.0);
    }

    #[test]
    fn test_spread_overflow_clamps_gaps() {
        let mut s = surface();
        let els = shapes(&mut s, &[80.0, 80.0]);
        let region = Rect::from_size(0.0, 0.0, 100.0, 120.0);
        let plan = spread_even(&mut s, &els, region, None, None).unwrap();

        assert!(plan.entries.iter().all(|e| e.gap_before == 0.0));
        assert_eq!(tops(&s, &els), vec![0.0, 80.0]);
        assert!(plan.trailing_gap < 0.0);
    }

    #[test]
    fn test_spread_keeps_order_without_overlap() {
        let mut s = surface();
        let els = shapes(&mut s, &[15.0, 25.0, 35.0, 5.0]);
        // scramble starting positions
        s.translate(els[0], 0.0, 300.0).unwrap();
        s.translate(els[2], 0.0, -50.0).unwrap();
        let region = Rect::from_size(0.0, 0.0, 100.0, 200.0);
        spread_even(&mut s, &els, region, None, None).unwrap();

        for pair in els.windows(2) {
            let a = s.bounds(pair[0]).unwrap();
            let b = s.bounds(pair[1]).unwrap();
            assert!(a.bottom <= b.top + EPS);
        }
    }

    #[test]
    fn test_nudge_noop_when_clear() {
        let mut s = surface();
        let els = shapes(&mut s, &[40.0, 40.0]);
        let region = Rect::from_size(0.0, 0.0, 100.0, 200.0);
        spread_even(&mut s, &els, region, None, None).unwrap();
        let before = tops(&s, &els);

        let mut blocks = as_blocks(&els);
        let obstacle = Rect::new(60.0, 190.0, 100.0, 200.0);
        let outcome =
            nudge_for_obstacle(&mut s, &mut blocks, region, obstacle, None, &FitConfig::default())
                .unwrap();
        assert_eq!(outcome.strategy, NudgeStrategy::Untouched);
        assert_eq!(tops(&s, &els), before);
    }

    #[test]
    fn test_nudge_shifts_into_gaps() {
        let mut s = surface();
        let els = shapes(&mut s, &[40.0, 40.0, 40.0]);
        let region = Rect::from_size(0.0, 0.0, 100.0, 200.0);
        spread_even(&mut s, &els, region, None, None).unwrap();
        assert_eq!(tops(&s, &els), vec![20.0, 80.0, 140.0]);

        let mut blocks = as_blocks(&els);
        let obstacle = Rect::new(50.0, 170.0, 100.0, 200.0);
        let outcome =
            nudge_for_obstacle(&mut s, &mut blocks, region, obstacle, None, &FitConfig::default())
                .unwrap();

        assert_eq!(outcome.strategy, NudgeStrategy::Shifted);
        assert!((outcome.overlap - 12.4).abs() < EPS);
        let after = tops(&s, &els);
        let shifts: Vec<f64> = [20.0, 80.0, 140.0].iter().zip(&after).map(|(b, a)| b - a).collect();
        assert!(shifts[0] < shifts[1] && shifts[1] < shifts[2]);
        assert!((s.bounds(els[2]).unwrap().bottom - (170.0 - 2.4)).abs() < EPS);
        // equal gaps stay equal
        let gaps = current_gaps(&s, &els, 0.0).unwrap();
        assert!((gaps[0] - gaps[1]).abs() < EPS && (gaps[1] - gaps[2]).abs() < EPS);
    }

    #[test]
    fn test_refresh_follows_nudged_blocks() {
        let mut s = surface();
        let els = shapes(&mut s, &[40.0, 40.0, 40.0]);
        let region = Rect::from_size(0.0, 0.0, 100.0, 200.0);
        let mut plan = spread_even(&mut s, &els, region, None, None).unwrap();

        let mut blocks = as_blocks(&els);
        let obstacle = Rect::new(50.0, 170.0, 100.0, 200.0);
        nudge_for_obstacle(&mut s, &mut blocks, region, obstacle, None, &FitConfig::default())
            .unwrap();
        plan.refresh(&s, region).unwrap();

        for (entry, &el) in plan.entries.iter().zip(&els) {
            let bounds = s.bounds(el).unwrap();
            assert!((entry.top - bounds.top).abs() < EPS);
            assert!((entry.height - bounds.height()).abs() < EPS);
            // shapes started at y = 0
            assert!((entry.offset - bounds.top).abs() < EPS);
        }
        let gaps: f64 = plan.gaps().iter().sum();
        assert!((gaps - 80.0).abs() < EPS);
        assert!((plan.trailing_gap - (200.0 - s.bounds(els[2]).unwrap().bottom)).abs() < EPS);
    }

    #[test]
    fn test_nudge_respects_top_clearance() {
        let mut s = surface();
        let els = shapes(&mut s, &[40.0, 40.0, 40.0]);
        let region = Rect::from_size(0.0, 0.0, 100.0, 200.0);
        spread_even(&mut s, &els, region, None, None).unwrap();

        let mut blocks = as_blocks(&els);
        let obstacle = Rect::new(50.0, 170.0, 100.0, 200.0);
        let clearance = Rect::new(0.0, 0.0, 100.0, 15.0);
        let config = FitConfig::default();
        nudge_for_obstacle(&mut s, &mut blocks, region, obstacle, Some(clearance), &config)
            .unwrap();
        assert!(s.bounds(els[0]).unwrap().top >= 15.0 - EPS);
    }

    #[test]
    fn test_nudge_refits_when_gaps_run_out() {
        let mut s = surface();
        let mut blocks: Vec<LayoutBlock> = (0..3)
            .map(|i| {
                let el = s.add_text(&format!("ability{i}"), 0.0, 0.0, None, "Body", 12.0, 12.0);
                let content = FormattedString::plain("a\nb\nc\nd\ne");
                let block = LayoutBlock::new(el, content, "Body", 12.0, 12.0);
                block.apply(&mut s).unwrap();
                block
            })
            .collect();
        let els: Vec<ElementId> = blocks.iter().map(|b| b.element).collect();
        let region = Rect::from_size(0.0, 0.0, 100.0, 200.0);
        spread_even(&mut s, &els, region, None, None).unwrap();

        let obstacle = Rect::new(0.0, 150.0, 100.0, 200.0);
        let outcome =
            nudge_for_obstacle(&mut s, &mut blocks, region, obstacle, None, &FitConfig::default())
                .unwrap();

        assert_eq!(outcome.strategy, NudgeStrategy::Refit);
        assert_eq!(outcome.iterations, 1);
        assert!(blocks.iter().all(|b| (b.font_size - 9.8).abs() < EPS));
        assert!(s.bounds(els[2]).unwrap().bottom <= 150.0 - 2.4 + EPS);
    }

    #[test]
    fn test_nudge_without_room_fails() {
        let mut s = surface();
        let els = shapes(&mut s, &[40.0]);
        let region = Rect::from_size(0.0, 0.0, 100.0, 60.0);
        spread_even(&mut s, &els, region, None, None).unwrap();

        let mut blocks = as_blocks(&els);
        let obstacle = Rect::new(0.0, 1.0, 100.0, 60.0);
        let err =
            nudge_for_obstacle(&mut s, &mut blocks, region, obstacle, None, &FitConfig::default())
                .unwrap_err();
        assert!(matches!(err, LayoutError::ObstacleUnresolvable { .. }));
    }

    #[test]
    fn test_dividers_centered_between_pairs() {
        let mut s = surface();
        let els = shapes(&mut s, &[20.0, 20.0, 20.0]);
        let region = Rect::from_size(0.0, 0.0, 100.0, 100.0);
        spread_even(&mut s, &els, region, None, None).unwrap();
        // tops 10, 40, 70
        let template = s.add_shape("divider", Rect::from_size(0.0, 0.0, 100.0, 2.0));

        let dividers = position_dividers(&mut s, template, &els).unwrap();
        assert_eq!(dividers.len(), 2);
        assert_eq!(s.bounds(dividers[0]).unwrap().top, 34.0);
        assert_eq!(s.bounds(dividers[1]).unwrap().top, 64.0);
        assert!(!s.is_visible(template).unwrap());
        assert!(s.is_visible(dividers[0]).unwrap());
    }

    #[test]
    fn test_single_block_has_no_dividers() {
        let mut s = surface();
        let els = shapes(&mut s, &[20.0]);
        let template = s.add_shape("divider", Rect::from_size(0.0, 0.0, 100.0, 2.0));
        assert!(position_dividers(&mut s, template, &els).unwrap().is_empty());
        assert!(!s.is_visible(template).unwrap());
    }
}
