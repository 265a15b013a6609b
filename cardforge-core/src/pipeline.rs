//! Render Pipeline - Single Entry Point
//!
//! resolve frame -> parse -> build runs -> fit -> distribute -> validate.
//! CRITICAL: render_card MUST validate the finished layout. No bypass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::card::CardLayout;
use crate::config::EngineConfig;
use crate::distribute::{
    nudge_for_obstacle, position_dividers, spread_even, DistributionPlan, NudgeOutcome,
    NudgeStrategy,
};
use crate::error::LayoutError;
use crate::fitter::{avoid_overlap, fit_height, fit_multiple, FitOutcome, LayoutBlock};
use crate::frame::{resolve_frame, FrameSpec};
use crate::hashing::{compute_job_hash, compute_plan_hash};
use crate::markup::{
    build_runs, format_text, parse_text, strip_reminder_text, Diagnostic, FormattedString, Span,
};
use crate::print::{PrintSpec, POINTS_PER_INCH};
use crate::surface::{ElementId, HeadlessSurface, Rect, RenderSurface, SurfaceError};
use crate::symbols::SymbolTable;
use crate::templates::{FontSpec, Regions, TemplateDescriptor, TemplateRegistry};
use crate::validation::{BlockSnapshot, LayoutSnapshot, ValidationResult, Validator};
use crate::ENGINE_VERSION;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::AtomicU32;

#[cfg(feature = "test-hooks")]
static VALIDATION_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_validation_call_count() -> u32 {
    VALIDATION_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_validation_call_count() {
    VALIDATION_CALL_COUNT.store(0, Ordering::SeqCst);
}

/// Rules text up to this many characters, on one line and without flavor,
/// is centered when the template allows it.
pub const SHORT_TEXT_LIMIT: usize = 70;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Template version {0} requires engine >= {1}, current is {2}")]
    EngineVersionMismatch(String, String, String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Layout failed: {0}")]
    Layout(#[from] LayoutError),

    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Render cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

// --- Cancellation ---

/// Cooperative cancellation flag, checked between stages and between cards.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

// --- Plan ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockRole {
    Rules,
    Ability,
    Flavor,
    Name,
    TypeLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    pub centered: bool,
    pub light_ink: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedBlock {
    pub element: ElementId,
    pub role: BlockRole,
    pub content: FormattedString,
    pub font_family: String,
    pub original_size: f64,
    pub final_size: f64,
    pub leading: f64,
    pub bounds: Rect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPlan {
    pub id: String,
    pub card_name: String,
    pub template_id: String,
    pub template_version: String,
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
    pub frame: FrameSpec,
    pub text_style: TextStyle,
    pub header: Vec<PlannedBlock>,
    pub blocks: Vec<PlannedBlock>,
    pub distribution: DistributionPlan,
    pub nudge: Option<NudgeOutcome>,
    pub dividers: Vec<Rect>,
    pub diagnostics: Vec<Diagnostic>,
    pub validation: ValidationResult,
    pub job_hash: String,
    pub plan_hash: String,
}

/// Everything in a plan except identity and timestamps.
#[derive(Serialize)]
struct PlanFingerprint<'a> {
    job_hash: &'a str,
    frame: &'a FrameSpec,
    text_style: &'a TextStyle,
    header: &'a [PlannedBlock],
    blocks: &'a [PlannedBlock],
    distribution: &'a DistributionPlan,
    nudge: &'a Option<NudgeOutcome>,
    dividers: &'a [Rect],
    diagnostics: &'a [Diagnostic],
}

impl RenderPlan {
    fn fingerprint(&self) -> Result<String, serde_json::Error> {
        compute_plan_hash(&PlanFingerprint {
            job_hash: &self.job_hash,
            frame: &self.frame,
            text_style: &self.text_style,
            header: &self.header,
            blocks: &self.blocks,
            distribution: &self.distribution,
            nudge: &self.nudge,
            dividers: &self.dividers,
            diagnostics: &self.diagnostics,
        })
    }
}

/// Surface elements a template's text lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceBindings {
    pub rules: ElementId,
    pub name: Option<ElementId>,
    pub type_line: Option<ElementId>,
    pub mana_cost: Option<ElementId>,
    pub divider: Option<ElementId>,
}

/// Builds an in-memory surface laid out after `template` at `print`'s
/// resolution.
pub fn bind_headless(
    template: &TemplateDescriptor,
    print: PrintSpec,
) -> (HeadlessSurface, SurfaceBindings) {
    let mut surface = HeadlessSurface::new(print);
    let regions = layout_regions(template, print.scale(POINTS_PER_INCH));
    let fonts = &template.fonts;

    let rules = regions.rules;
    let rules_el = surface.add_text(
        "Rules Text",
        rules.left,
        rules.top,
        Some(rules.width()),
        &fonts.rules.family,
        fonts.rules.size,
        fonts.rules.leading(),
    );
    let point_text =
        |surface: &mut HeadlessSurface, name: &str, region: Option<Rect>, font: &FontSpec| {
            region.map(|r| {
                surface.add_text(name, r.left, r.top, None, &font.family, font.size, font.leading())
            })
        };
    let name = point_text(&mut surface, "Card Name", regions.name, &fonts.name);
    let type_line = point_text(&mut surface, "Type Line", regions.type_line, &fonts.type_line);
    let mana_cost = point_text(&mut surface, "Mana Cost", regions.mana_cost, &fonts.name);
    let divider = regions.divider.map(|r| surface.add_shape("Divider", r));

    let bindings = SurfaceBindings {
        rules: rules_el,
        name,
        type_line,
        mana_cost,
        divider,
    };
    (surface, bindings)
}

fn layout_regions(template: &TemplateDescriptor, pixels_per_inch: f64) -> Regions {
    match template.dpi {
        Some(dpi) if dpi > 0 => template.regions.scaled(pixels_per_inch / f64::from(dpi)),
        _ => template.regions.clone(),
    }
}

/// Centering and ink color for the rules text.
pub fn text_style(
    card: &CardLayout,
    template: &TemplateDescriptor,
    frame: &FrameSpec,
) -> TextStyle {
    let oracle = card.oracle_text.trim();
    let centered = template.capabilities.center_short_text
        && !template.capabilities.staged_abilities
        && card.flavor_text.is_empty()
        && !oracle.is_empty()
        && !oracle.contains('\n')
        && oracle.chars().count() <= SHORT_TEXT_LIMIT;
    let light_ink = template
        .light_text_backgrounds
        .iter()
        .any(|slot| *slot == frame.background);
    TextStyle { centered, light_ink }
}

// --- Batch ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Record the failure and continue with the next card.
    #[default]
    Skip,
    /// Stop at the first failure.
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReport {
    pub card: String,
    pub template_id: String,
    pub timestamp: DateTime<Utc>,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub plans: Vec<RenderPlan>,
    pub failures: Vec<FailureReport>,
    pub cancelled: bool,
    pub aborted: bool,
}

/// The render pipeline - single entry point for all card layout operations
pub struct RenderPipeline {
    registry: TemplateRegistry,
    validator: Validator,
    symbols: SymbolTable,
    config: EngineConfig,
}

impl RenderPipeline {
    pub fn new(registry: TemplateRegistry, config: EngineConfig) -> Self {
        Self {
            registry,
            validator: Validator::new(),
            symbols: SymbolTable::standard(),
            config,
        }
    }

    #[must_use]
    pub fn with_symbols(mut self, symbols: SymbolTable) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn list_templates(&self) -> Vec<&TemplateDescriptor> {
        self.registry.list()
    }

    pub fn get_template(&self, id: &str) -> Option<&TemplateDescriptor> {
        self.registry.get(id)
    }

    /// Validate a finished layout against a template.
    ///
    /// This is the ONLY validation entry point.
    pub fn validate_layout(
        &self,
        template_id: &str,
        layout: &LayoutSnapshot,
    ) -> Result<ValidationResult, PipelineError> {
        #[cfg(feature = "test-hooks")]
        VALIDATION_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        let template = self.template(template_id)?;
        Ok(self.validator.validate(layout, template))
    }

    /// Lays out one card on a surface the caller owns.
    ///
    /// CRITICAL: This ALWAYS calls validate_layout before returning a plan.
    pub fn render_card<S: RenderSurface + ?Sized>(
        &self,
        card: &CardLayout,
        template_id: &str,
        surface: &mut S,
        bindings: &SurfaceBindings,
        cancel: &CancelToken,
    ) -> Result<RenderPlan, PipelineError> {
        cancel.check()?;
        let template = self.template(template_id)?;
        let regions = layout_regions(template, surface.scale_by_dpi(POINTS_PER_INCH));
        let fit = &self.config.fit;

        let frame = resolve_frame(card, &self.config.frame);
        cancel.check()?;

        let split_flavor = template.capabilities.staged_abilities
            || (template.capabilities.flavor_divider && bindings.divider.is_some());
        let (contents, diagnostics) = self.block_contents(card, template, split_flavor);
        let style = text_style(card, template, &frame);
        cancel.check()?;

        let mut blocks = Vec::with_capacity(contents.len());
        for (i, (role, content)) in contents.iter().enumerate() {
            let element = if i == 0 { bindings.rules } else { surface.duplicate(bindings.rules)? };
            let font = &template.fonts.rules;
            let block =
                LayoutBlock::new(element, content.clone(), &font.family, font.size, font.leading());
            block.apply(surface)?;
            blocks.push((*role, block));
        }
        let (roles, mut blocks): (Vec<BlockRole>, Vec<LayoutBlock>) = blocks.into_iter().unzip();

        let outcomes = if blocks.len() == 1 {
            vec![fit_height(surface, &mut blocks[0], regions.rules, fit)?]
        } else {
            let r = regions.rules;
            let padding = surface.scale_by_dpi(fit.padding_pts);
            let padded = Rect::new(r.left, r.top, r.right, r.bottom - padding);
            fit_multiple(surface, &mut blocks, padded, fit)?
        };
        let header = self.fit_header(surface, card, template, bindings, &regions)?;
        cancel.check()?;

        let elements: Vec<ElementId> = blocks.iter().map(|b| b.element).collect();
        let mut distribution = spread_even(surface, &elements, regions.rules, None, None)?;

        let has_pt_box = card.is_creature() || card.loyalty.is_some();
        let obstacle = regions
            .pt_box
            .filter(|_| template.capabilities.avoid_pt_box && has_pt_box);
        let nudge = match obstacle {
            Some(pt_box) => Some(nudge_for_obstacle(
                surface,
                &mut blocks,
                regions.rules,
                pt_box,
                regions.top_clearance,
                fit,
            )?),
            None => None,
        };
        if nudge.as_ref().is_some_and(|n| n.strategy != NudgeStrategy::Untouched) {
            distribution.refresh(surface, regions.rules)?;
        }

        let dividers = match bindings.divider {
            Some(template_el) if template.capabilities.flavor_divider && elements.len() > 1 => {
                position_dividers(surface, template_el, &elements)?
                    .into_iter()
                    .map(|d| surface.bounds(d))
                    .collect::<Result<Vec<_>, _>>()?
            }
            Some(template_el) => {
                surface.set_visible(template_el, false)?;
                vec![]
            }
            None => vec![],
        };
        cancel.check()?;

        let mut planned = Vec::with_capacity(blocks.len());
        let mut snapshots = Vec::with_capacity(blocks.len());
        for ((block, role), outcome) in blocks.iter().zip(roles).zip(&outcomes) {
            let bounds = surface.bounds(block.element)?;
            snapshots.push(BlockSnapshot {
                element: block.element,
                bounds,
                original_size: outcome.original_size,
                font_size: block.font_size,
            });
            planned.push(PlannedBlock {
                element: block.element,
                role,
                content: block.content.clone(),
                font_family: block.font_family.clone(),
                original_size: outcome.original_size,
                final_size: block.font_size,
                leading: block.leading,
                bounds,
            });
        }

        // MANDATORY: the layout is validated before any plan leaves the engine.
        let snapshot = LayoutSnapshot {
            region: regions.rules,
            blocks: snapshots,
            obstacle,
            min_font_size: fit.min_font_size,
            diagnostics: diagnostics.clone(),
        };
        let validation = self.validate_layout(template_id, &snapshot)?;
        if !validation.valid {
            warn!(
                card = %card.name,
                template = template_id,
                "layout rejected: {}",
                validation.summary()
            );
            return Err(PipelineError::ValidationFailed(validation.summary()));
        }

        let job_hash =
            compute_job_hash(card, &template.id, &template.template_version, ENGINE_VERSION)?;
        let mut plan = RenderPlan {
            id: Uuid::new_v4().to_string(),
            card_name: card.name.clone(),
            template_id: template.id.clone(),
            template_version: template.template_version.clone(),
            engine_version: ENGINE_VERSION.to_string(),
            created_at: Utc::now(),
            frame,
            text_style: style,
            header,
            blocks: planned,
            distribution,
            nudge,
            dividers,
            diagnostics,
            validation,
            job_hash,
            plan_hash: String::new(), // Computed after
        };
        plan.plan_hash = plan.fingerprint()?;

        info!(
            card = %card.name,
            template = template_id,
            blocks = plan.blocks.len(),
            background = %plan.frame.background,
            "rendered card"
        );
        Ok(plan)
    }

    /// Lays out one card on a fresh `HeadlessSurface` bound to the template.
    pub fn render_headless(
        &self,
        card: &CardLayout,
        template_id: &str,
        user_print: Option<PrintSpec>,
        cancel: &CancelToken,
    ) -> Result<(RenderPlan, HeadlessSurface), PipelineError> {
        let template = self.template(template_id)?;
        let print = PrintSpec::resolve(template.dpi, user_print);
        let (mut surface, bindings) = bind_headless(template, print);
        let plan = self.render_card(card, template_id, &mut surface, &bindings, cancel)?;
        Ok((plan, surface))
    }

    /// Renders cards one at a time. Failures are recorded per card and
    /// `policy` decides whether the batch goes on.
    pub fn render_batch(
        &self,
        cards: &[CardLayout],
        template_id: &str,
        user_print: Option<PrintSpec>,
        policy: FailurePolicy,
        cancel: &CancelToken,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        for card in cards {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            match self.render_headless(card, template_id, user_print, cancel) {
                Ok((plan, _)) => report.plans.push(plan),
                Err(PipelineError::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
                Err(e) => {
                    warn!(card = %card.name, template = template_id, error = %e, "card failed");
                    report.failures.push(FailureReport {
                        card: card.name.clone(),
                        template_id: template_id.to_string(),
                        timestamp: Utc::now(),
                        error: e.to_string(),
                    });
                    if policy == FailurePolicy::Abort {
                        report.aborted = true;
                        break;
                    }
                }
            }
        }
        info!(
            rendered = report.plans.len(),
            failed = report.failures.len(),
            cancelled = report.cancelled,
            "batch finished"
        );
        report
    }

    fn template(&self, id: &str) -> Result<&TemplateDescriptor, PipelineError> {
        let template = self
            .registry
            .get(id)
            .ok_or_else(|| PipelineError::TemplateNotFound(id.to_string()))?;
        self.check_engine_version(template)?;
        Ok(template)
    }

    fn check_engine_version(&self, template: &TemplateDescriptor) -> Result<(), PipelineError> {
        let engine_ver = semver::Version::parse(ENGINE_VERSION)
            .map_err(|_| PipelineError::InvalidTemplate("Invalid engine version".into()))?;
        let min_ver = semver::Version::parse(&template.engine_min_version)
            .map_err(|_| {
                PipelineError::InvalidTemplate(format!("{}: bad engineMinVersion", template.id))
            })?;

        if engine_ver < min_ver {
            return Err(PipelineError::EngineVersionMismatch(
                template.template_version.clone(),
                template.engine_min_version.clone(),
                ENGINE_VERSION.to_string(),
            ));
        }

        Ok(())
    }

    /// Formatted text for each rules-box block, in layout order.
    fn block_contents(
        &self,
        card: &CardLayout,
        template: &TemplateDescriptor,
        split_flavor: bool,
    ) -> (Vec<(BlockRole, FormattedString)>, Vec<Diagnostic>) {
        let markup = &self.config.markup;
        let oracle = if markup.strip_reminder {
            strip_reminder_text(&card.oracle_text)
        } else {
            card.oracle_text.clone()
        };
        let flavor = card.flavor_text.as_str();

        let mut contents = vec![];
        let mut diagnostics = vec![];
        let mut format = |role: BlockRole, rules: &str, flavor: &str| {
            let (runs, parsed) = format_text(rules, flavor, &markup.extra_italics, &self.symbols);
            diagnostics.extend(parsed.diagnostics);
            contents.push((role, runs));
        };

        let abilities: Vec<&str> = if template.capabilities.staged_abilities {
            oracle.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
        } else {
            vec![]
        };
        if abilities.is_empty() {
            format(BlockRole::Rules, &oracle, if split_flavor { "" } else { flavor });
        } else {
            for line in abilities {
                format(BlockRole::Ability, line, "");
            }
        }

        if split_flavor && !flavor.is_empty() {
            let mut parsed = parse_text(flavor, "", &[], &self.symbols);
            parsed.italics = vec![Span { start: 0, end: parsed.text.chars().count() }];
            diagnostics.extend(parsed.diagnostics.iter().cloned());
            contents.push((BlockRole::Flavor, build_runs(&parsed)));
        }
        (contents, diagnostics)
    }

    /// Right-aligns the mana cost, then keeps the name and type line clear of
    /// the cost and the expansion symbol.
    fn fit_header<S: RenderSurface + ?Sized>(
        &self,
        surface: &mut S,
        card: &CardLayout,
        template: &TemplateDescriptor,
        bindings: &SurfaceBindings,
        regions: &Regions,
    ) -> Result<Vec<PlannedBlock>, PipelineError> {
        let fit = &self.config.fit;
        let mut cost_bounds = None;
        if let (Some(cost_el), false) = (bindings.mana_cost, card.mana_cost.is_empty()) {
            let (runs, _) = format_text(&card.mana_cost, "", &[], &self.symbols);
            surface.set_text(cost_el, &runs)?;
            if let Some(region) = regions.mana_cost {
                let bounds = surface.bounds(cost_el)?;
                surface.translate(cost_el, region.right - bounds.right, 0.0)?;
            }
            cost_bounds = Some(surface.bounds(cost_el)?);
        }

        let lines = [
            (BlockRole::Name, bindings.name, card.name.as_str(), &template.fonts.name, cost_bounds),
            (
                BlockRole::TypeLine,
                bindings.type_line,
                card.type_line.as_str(),
                &template.fonts.type_line,
                regions.expansion_symbol,
            ),
        ];

        let mut header = vec![];
        for (role, element, text, font, obstacle) in lines {
            let Some(element) = element else { continue };
            let content = FormattedString::plain(text);
            let mut block =
                LayoutBlock::new(element, content, &font.family, font.size, font.leading());
            block.apply(surface)?;
            let outcome = match obstacle {
                Some(obstacle) => {
                    avoid_overlap(surface, &mut block, obstacle, fit.overlap_gap_pts, fit)?
                }
                None => None,
            };
            let original_size = outcome.map_or(block.font_size, |o: FitOutcome| o.original_size);
            header.push(PlannedBlock {
                element,
                role,
                content: block.content.clone(),
                font_family: block.font_family.clone(),
                original_size,
                final_size: block.font_size,
                leading: block.leading,
                bounds: surface.bounds(element)?,
            });
        }
        Ok(header)
    }
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self::new(TemplateRegistry::builtin(), EngineConfig::default())
    }
}
