//! Text Fitter - Shrinks text until it satisfies a geometric constraint
//!
//! Every loop steps the font size and leading down by `step`, then tries one
//! half step back up and keeps it only if the constraint still holds. Sizes
//! never go up past where they started and never below `min_font_size`.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::FitConfig;
use crate::error::LayoutError;
use crate::markup::FormattedString;
use crate::surface::{ElementId, Rect, RenderSurface, SurfaceError};

/// One block of text bound to a surface element. Only size, leading and
/// position change while fitting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutBlock {
    pub element: ElementId,
    pub content: FormattedString,
    pub font_family: String,
    pub font_size: f64,
    pub leading: f64,
}

impl LayoutBlock {
    pub fn new(
        element: ElementId,
        content: FormattedString,
        font_family: impl Into<String>,
        font_size: f64,
        leading: f64,
    ) -> Self {
        Self {
            element,
            content,
            font_family: font_family.into(),
            font_size,
            leading,
        }
    }

    /// Pushes content and font onto the bound element.
    pub fn apply<S: RenderSurface + ?Sized>(&self, surface: &mut S) -> Result<(), SurfaceError> {
        surface.set_text(self.element, &self.content)?;
        surface.set_font(self.element, &self.font_family, self.font_size, self.leading)
    }

    fn adjust<S: RenderSurface + ?Sized>(
        &mut self,
        surface: &mut S,
        delta: f64,
    ) -> Result<(), SurfaceError> {
        self.font_size += delta;
        self.leading += delta;
        surface.set_font(self.element, &self.font_family, self.font_size, self.leading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOutcome {
    pub element: ElementId,
    pub original_size: f64,
    pub final_size: f64,
    pub iterations: u32,
}

impl FitOutcome {
    fn unchanged(block: &LayoutBlock) -> Self {
        Self {
            element: block.element,
            original_size: block.font_size,
            final_size: block.font_size,
            iterations: 0,
        }
    }

    pub fn changed(&self) -> bool {
        self.final_size < self.original_size
    }
}

/// Shrink until the text fits the height of `region`, less padding.
pub fn fit_height<S: RenderSurface + ?Sized>(
    surface: &mut S,
    block: &mut LayoutBlock,
    region: Rect,
    config: &FitConfig,
) -> Result<FitOutcome, LayoutError> {
    let limit = region.height() - surface.scale_by_dpi(config.padding_pts);
    let element = block.element;
    shrink_until(surface, block, config, |s| Ok(s.measure(element)?.height - limit))
}

/// Shrink until the text fits the width of `region`, less padding.
pub fn fit_width<S: RenderSurface + ?Sized>(
    surface: &mut S,
    block: &mut LayoutBlock,
    region: Rect,
    config: &FitConfig,
) -> Result<FitOutcome, LayoutError> {
    let limit = region.width() - surface.scale_by_dpi(config.padding_pts);
    let element = block.element;
    shrink_until(surface, block, config, |s| Ok(s.measure(element)?.width - limit))
}

/// Shrink a line of text whose right edge runs within `min_gap_pts` of an
/// obstacle to its right, then shift the baseline so the smaller text stays
/// centered on the original line. Returns `None` when nothing had to change.
pub fn avoid_overlap<S: RenderSurface + ?Sized>(
    surface: &mut S,
    block: &mut LayoutBlock,
    obstacle: Rect,
    min_gap_pts: f64,
    config: &FitConfig,
) -> Result<Option<FitOutcome>, LayoutError> {
    let element = block.element;
    let bounds = surface.bounds(element)?;
    if obstacle.left < bounds.left {
        return Ok(None);
    }
    let limit = obstacle.left - surface.scale_by_dpi(min_gap_pts);
    if bounds.right <= limit {
        return Ok(None);
    }

    let outcome = shrink_until(surface, block, config, |s| Ok(s.bounds(element)?.right - limit))?;
    let shift = (outcome.original_size - outcome.final_size) * config.baseline_shift_ratio;
    surface.set_baseline_shift(element, shift)?;
    Ok(Some(outcome))
}

/// Shrink every block by the same step at once until their summed height fits
/// `region`, then try one shared half step back up.
pub fn fit_multiple<S: RenderSurface + ?Sized>(
    surface: &mut S,
    blocks: &mut [LayoutBlock],
    region: Rect,
    config: &FitConfig,
) -> Result<Vec<FitOutcome>, LayoutError> {
    check_step(config)?;
    let mut outcomes: Vec<FitOutcome> = blocks.iter().map(FitOutcome::unchanged).collect();
    if blocks.is_empty() {
        return Ok(outcomes);
    }

    let limit = region.height();
    let mut excess = total_height(surface, blocks)? - limit;
    if excess <= 0.0 {
        return Ok(outcomes);
    }

    let mut iterations = 0u32;
    while excess > 0.0 {
        let floor_hit = blocks.iter().find(|b| b.font_size - config.step < config.min_font_size);
        if let Some(stuck) = floor_hit {
            warn!(element = %stuck.element, overflow = excess, "block set cannot shrink further");
            return Err(LayoutError::FitImpossible {
                element: stuck.element,
                floor: config.min_font_size,
                overflow: excess,
            });
        }
        for block in blocks.iter_mut() {
            block.adjust(surface, -config.step)?;
        }
        iterations += 1;
        excess = total_height(surface, blocks)? - limit;
    }

    let half = config.half_step();
    for block in blocks.iter_mut() {
        block.adjust(surface, half)?;
    }
    if total_height(surface, blocks)? > limit {
        for block in blocks.iter_mut() {
            block.adjust(surface, -half)?;
        }
    }

    for (outcome, block) in outcomes.iter_mut().zip(blocks.iter()) {
        outcome.final_size = block.font_size;
        outcome.iterations = iterations;
    }
    debug!(blocks = blocks.len(), iterations, "fitted block set");
    Ok(outcomes)
}

fn total_height<S: RenderSurface + ?Sized>(
    surface: &S,
    blocks: &[LayoutBlock],
) -> Result<f64, SurfaceError> {
    blocks
        .iter()
        .map(|b| surface.measure(b.element).map(|size| size.height))
        .sum()
}

fn check_step(config: &FitConfig) -> Result<(), LayoutError> {
    if config.step > 0.0 {
        Ok(())
    } else {
        Err(LayoutError::InvalidStep(config.step))
    }
}

/// Core loop. `excess` reports how far past the constraint the block is;
/// anything `<= 0` fits.
fn shrink_until<S, F>(
    surface: &mut S,
    block: &mut LayoutBlock,
    config: &FitConfig,
    excess: F,
) -> Result<FitOutcome, LayoutError>
where
    S: RenderSurface + ?Sized,
    F: Fn(&S) -> Result<f64, SurfaceError>,
{
    check_step(config)?;
    let mut outcome = FitOutcome::unchanged(block);
    let mut over = excess(surface)?;
    if over <= 0.0 {
        return Ok(outcome);
    }

    // Smallest size known not to fit.
    let mut failing = block.font_size;
    while over > 0.0 {
        let delta = (block.font_size - config.step).max(config.min_font_size) - block.font_size;
        if delta >= 0.0 {
            warn!(
                element = %block.element,
                overflow = over,
                floor = config.min_font_size,
                "text cannot fit"
            );
            return Err(LayoutError::FitImpossible {
                element: block.element,
                floor: config.min_font_size,
                overflow: over,
            });
        }
        failing = block.font_size;
        block.adjust(surface, delta)?;
        outcome.iterations += 1;
        over = excess(surface)?;
    }

    let half = config.half_step();
    if block.font_size + half < failing {
        block.adjust(surface, half)?;
        if excess(surface)? > 0.0 {
            block.adjust(surface, -half)?;
        }
    }

    outcome.final_size = block.font_size;
    debug!(
        element = %block.element,
        from = outcome.original_size,
        to = outcome.final_size,
        iterations = outcome.iterations,
        "fitted text"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::print::PrintSpec;
    use crate::surface::HeadlessSurface;

    const EPS: f64 = 1e-6;

    fn surface() -> HeadlessSurface {
        HeadlessSurface::new(PrintSpec::from_template(72))
    }

    fn no_padding() -> FitConfig {
        FitConfig { padding_pts: 0.0, ..FitConfig::default() }
    }

    /// `lines` single-word lines, leading equal to size, so height = lines * size.
    fn stacked(s: &mut HeadlessSurface, name: &str, lines: usize, size: f64) -> LayoutBlock {
        let el = s.add_text(name, 0.0, 0.0, None, "Body", size, size);
        let content = FormattedString::plain(vec!["word"; lines].join("\n"));
        let block = LayoutBlock::new(el, content, "Body", size, size);
        block.apply(s).unwrap();
        block
    }

    #[test]
    fn test_fit_height_unchanged_when_fitting() {
        let mut s = surface();
        let mut block = stacked(&mut s, "a", 4, 10.0);
        let region = Rect::from_size(0.0, 0.0, 200.0, 100.0);
        let outcome = fit_height(&mut s, &mut block, region, &no_padding()).unwrap();
        assert!(!outcome.changed());
        assert_eq!(block.font_size, 10.0);
        assert_eq!(s.font_size(block.element).unwrap(), 10.0);
    }

    #[test]
    fn test_fit_height_shrinks_then_half_corrects() {
        let mut s = surface();
        let mut block = stacked(&mut s, "a", 10, 12.0);
        // 120px of text into 101px
        let region = Rect::from_size(0.0, 0.0, 200.0, 101.0);
        let outcome = fit_height(&mut s, &mut block, region, &no_padding()).unwrap();

        // 12 - 5 * 0.4 = 10.0 fits; 10.2 would not
        assert_eq!(outcome.iterations, 5);
        assert!((block.font_size - 10.0).abs() < EPS);
        assert!(s.measure(block.element).unwrap().height <= 101.0);
        assert!(block.font_size < outcome.original_size);
    }

    #[test]
    fn test_fit_height_keeps_half_step_when_it_fits() {
        let mut s = surface();
        let mut block = stacked(&mut s, "a", 10, 12.0);
        let region = Rect::from_size(0.0, 0.0, 200.0, 103.0);
        fit_height(&mut s, &mut block, region, &no_padding()).unwrap();
        // 10.4 → 104px fails, 10.0 fits, 10.2 → 102px fits
        assert!((block.font_size - 10.2).abs() < EPS);
        assert!((block.leading - 10.2).abs() < EPS);
    }

    #[test]
    fn test_fit_height_respects_scaled_padding() {
        let mut s = surface();
        let mut block = stacked(&mut s, "a", 10, 12.0);
        let region = Rect::from_size(0.0, 0.0, 200.0, 110.0);
        let config = FitConfig { padding_pts: 10.0, ..FitConfig::default() };
        fit_height(&mut s, &mut block, region, &config).unwrap();
        assert!(s.measure(block.element).unwrap().height <= 100.0 + EPS);
    }

    #[test]
    fn test_fit_height_floor() {
        let mut s = surface();
        let mut block = stacked(&mut s, "a", 10, 12.0);
        let region = Rect::from_size(0.0, 0.0, 200.0, 20.0);
        let err = fit_height(&mut s, &mut block, region, &no_padding()).unwrap_err();
        assert!(matches!(err, LayoutError::FitImpossible { .. }));
        assert!((block.font_size - 4.0).abs() < EPS);
    }

    #[test]
    fn test_fit_height_never_grows_past_start_near_floor() {
        let mut s = surface();
        let mut block = stacked(&mut s, "a", 10, 4.1);
        let region = Rect::from_size(0.0, 0.0, 200.0, 40.5);
        fit_height(&mut s, &mut block, region, &no_padding()).unwrap();
        assert!(block.font_size <= 4.1);
        assert!((block.font_size - 4.0).abs() < EPS);
    }

    #[test]
    fn test_fit_width() {
        let mut s = surface();
        let el = s.add_text("name", 0.0, 0.0, None, "Title", 20.0, 20.0);
        let content = FormattedString::plain("aaaaaaaaaa");
        let mut block = LayoutBlock::new(el, content, "Title", 20.0, 20.0);
        block.apply(&mut s).unwrap();
        // 10 chars * 0.5em * 20px = 100px into 80px
        let region = Rect::from_size(0.0, 0.0, 80.5, 30.0);
        fit_width(&mut s, &mut block, region, &no_padding()).unwrap();
        assert!(s.measure(el).unwrap().width <= 80.5);
        assert!((block.font_size - 16.0).abs() < EPS);
    }

    #[test]
    fn test_avoid_overlap_shrinks_and_shifts_baseline() {
        let mut s = surface();
        let el = s.add_text("type", 0.0, 0.0, None, "Body", 20.0, 20.0);
        let content = FormattedString::plain("aaaaaaaaaa");
        let mut block = LayoutBlock::new(el, content, "Body", 20.0, 20.0);
        block.apply(&mut s).unwrap();
        let symbol = Rect::new(95.5, 0.0, 120.0, 20.0);

        let outcome = avoid_overlap(&mut s, &mut block, symbol, 5.0, &FitConfig::default())
            .unwrap()
            .unwrap();
        assert!(s.bounds(el).unwrap().right <= 90.5);
        assert!((block.font_size - 18.0).abs() < EPS);
        let expected_shift = (outcome.original_size - outcome.final_size) * 0.3;
        assert!((s.baseline_shift(el).unwrap() - expected_shift).abs() < EPS);
    }

    #[test]
    fn test_avoid_overlap_noop_cases() {
        let mut s = surface();
        let el = s.add_text("type", 50.0, 0.0, None, "Body", 20.0, 20.0);
        let mut block = LayoutBlock::new(el, FormattedString::plain("aaaa"), "Body", 20.0, 20.0);
        block.apply(&mut s).unwrap();
        let config = FitConfig::default();

        // far away
        let far = Rect::new(300.0, 0.0, 320.0, 20.0);
        assert!(avoid_overlap(&mut s, &mut block, far, 5.0, &config).unwrap().is_none());
        // obstacle left of the text
        let left = Rect::new(0.0, 0.0, 40.0, 20.0);
        assert!(avoid_overlap(&mut s, &mut block, left, 5.0, &config).unwrap().is_none());
        assert_eq!(block.font_size, 20.0);
    }

    #[test]
    fn test_fit_multiple_uniform_shrink() {
        let mut s = surface();
        let mut blocks = vec![
            stacked(&mut s, "a", 10, 12.0),
            stacked(&mut s, "b", 10, 13.0),
            stacked(&mut s, "c", 10, 12.5),
        ];
        let region = Rect::from_size(0.0, 0.0, 200.0, 300.0);
        let outcomes = fit_multiple(&mut s, &mut blocks, region, &FitConfig::default()).unwrap();

        // 375px → 7 steps to 291px, shared half step back to 297px
        assert!(outcomes.iter().all(|o| o.iterations == 7));
        let deltas: Vec<f64> = outcomes.iter().map(|o| o.original_size - o.final_size).collect();
        for d in &deltas {
            assert!((d - 2.6).abs() < EPS, "delta {d}");
        }
        let total: f64 = blocks.iter().map(|b| s.measure(b.element).unwrap().height).sum();
        assert!(total <= 300.0 + EPS);
        assert!((total - 297.0).abs() < 1e-4);
    }

    #[test]
    fn test_fit_multiple_already_fitting() {
        let mut s = surface();
        let mut blocks = vec![stacked(&mut s, "a", 2, 10.0), stacked(&mut s, "b", 2, 10.0)];
        let region = Rect::from_size(0.0, 0.0, 200.0, 100.0);
        let outcomes = fit_multiple(&mut s, &mut blocks, region, &FitConfig::default()).unwrap();
        assert!(outcomes.iter().all(|o| !o.changed()));
    }

    #[test]
    fn test_invalid_step() {
        let mut s = surface();
        let mut block = stacked(&mut s, "a", 10, 12.0);
        let config = FitConfig { step: 0.0, ..FitConfig::default() };
        let region = Rect::from_size(0.0, 0.0, 10.0, 10.0);
        assert!(matches!(
            fit_height(&mut s, &mut block, region, &config),
            Err(LayoutError::InvalidStep(_))
        ));
    }
}
