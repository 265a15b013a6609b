//! In-memory render surface with approximate glyph metrics.
//!
//! Text is wrapped greedily inside its box using static per-character
//! advances (em units). Ink height is `size + (lines - 1) * leading`.

use std::collections::HashMap;

use super::{Anchor, ElementId, Rect, RenderSurface, Size, SurfaceError};
use crate::markup::{FormattedString, FLAVOR_SEPARATOR};
use crate::print::PrintSpec;

#[derive(Debug, Clone)]
struct TextState {
    content: String,
    family: String,
    size: f64,
    leading: f64,
    /// Wrap width in pixels; `None` for point text.
    box_width: Option<f64>,
    baseline_shift: f64,
}

#[derive(Debug, Clone)]
enum ElementKind {
    Text(TextState),
    Shape { width: f64, height: f64 },
}

#[derive(Debug, Clone)]
struct Element {
    name: String,
    left: f64,
    top: f64,
    visible: bool,
    kind: ElementKind,
}

#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    print: PrintSpec,
    elements: Vec<Element>,
    names: HashMap<String, ElementId>,
}

impl HeadlessSurface {
    pub fn new(print: PrintSpec) -> Self {
        Self {
            print,
            elements: vec![],
            names: HashMap::new(),
        }
    }

    pub fn print_spec(&self) -> PrintSpec {
        self.print
    }

    /// Adds a paragraph text element whose box starts at `(left, top)` and
    /// wraps at `box_width` pixels.
    pub fn add_text(
        &mut self,
        name: &str,
        left: f64,
        top: f64,
        box_width: Option<f64>,
        family: &str,
        size: f64,
        leading: f64,
    ) -> ElementId {
        self.push(Element {
            name: name.to_string(),
            left,
            top,
            visible: true,
            kind: ElementKind::Text(TextState {
                content: String::new(),
                family: family.to_string(),
                size,
                leading,
                box_width,
                baseline_shift: 0.0,
            }),
        })
    }

    /// Adds an opaque shape (reference region, obstacle, divider).
    pub fn add_shape(&mut self, name: &str, rect: Rect) -> ElementId {
        self.push(Element {
            name: name.to_string(),
            left: rect.left,
            top: rect.top,
            visible: true,
            kind: ElementKind::Shape {
                width: rect.width(),
                height: rect.height(),
            },
        })
    }

    pub fn element_named(&self, name: &str) -> Option<ElementId> {
        self.names.get(name).copied()
    }

    pub fn name_of(&self, element: ElementId) -> Result<&str, SurfaceError> {
        Ok(self.get(element)?.name.as_str())
    }

    pub fn font_size(&self, element: ElementId) -> Result<f64, SurfaceError> {
        Ok(self.text_state(element)?.size)
    }

    pub fn font_family(&self, element: ElementId) -> Result<&str, SurfaceError> {
        Ok(self.text_state(element)?.family.as_str())
    }

    pub fn leading(&self, element: ElementId) -> Result<f64, SurfaceError> {
        Ok(self.text_state(element)?.leading)
    }

    pub fn baseline_shift(&self, element: ElementId) -> Result<f64, SurfaceError> {
        Ok(self.text_state(element)?.baseline_shift)
    }

    pub fn text(&self, element: ElementId) -> Result<&str, SurfaceError> {
        Ok(self.text_state(element)?.content.as_str())
    }

    pub fn is_visible(&self, element: ElementId) -> Result<bool, SurfaceError> {
        Ok(self.get(element)?.visible)
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Line count the current content wraps to.
    pub fn line_count(&self, element: ElementId) -> Result<usize, SurfaceError> {
        let state = self.text_state(element)?;
        Ok(self.layout_lines(state).len())
    }

    fn push(&mut self, element: Element) -> ElementId {
        let id = ElementId::new(self.elements.len() as u32);
        self.names.entry(element.name.clone()).or_insert(id);
        self.elements.push(element);
        id
    }

    fn get(&self, element: ElementId) -> Result<&Element, SurfaceError> {
        self.elements
            .get(element.raw() as usize)
            .ok_or(SurfaceError::UnknownElement(element))
    }

    fn get_mut(&mut self, element: ElementId) -> Result<&mut Element, SurfaceError> {
        self.elements
            .get_mut(element.raw() as usize)
            .ok_or(SurfaceError::UnknownElement(element))
    }

    fn text_state(&self, element: ElementId) -> Result<&TextState, SurfaceError> {
        match &self.get(element)?.kind {
            ElementKind::Text(state) => Ok(state),
            ElementKind::Shape { .. } => Err(SurfaceError::NotText(element)),
        }
    }

    fn text_state_mut(&mut self, element: ElementId) -> Result<&mut TextState, SurfaceError> {
        match &mut self.get_mut(element)?.kind {
            ElementKind::Text(state) => Ok(state),
            ElementKind::Shape { .. } => Err(SurfaceError::NotText(element)),
        }
    }

    /// Widths in pixels of each wrapped line.
    fn layout_lines(&self, state: &TextState) -> Vec<f64> {
        let size_px = self.print.scale(state.size);
        let space = advance_em(' ') * size_px;
        let mut lines = vec![];

        for paragraph in state.content.split(['\n', FLAVOR_SEPARATOR]) {
            let mut width = 0.0_f64;
            let mut first = true;
            for word in paragraph.split_whitespace() {
                let word_w: f64 = word.chars().map(advance_em).sum::<f64>() * size_px;
                let wrap = state.box_width.map_or(false, |max| width + space + word_w > max);
                if !first && wrap {
                    lines.push(width);
                    width = word_w;
                } else {
                    width += if first { word_w } else { space + word_w };
                    first = false;
                }
            }
            if !first {
                lines.push(width);
            }
        }
        lines
    }

    fn text_size(&self, state: &TextState) -> Size {
        let lines = self.layout_lines(state);
        if lines.is_empty() {
            return Size { width: 0.0, height: 0.0 };
        }
        let size_px = self.print.scale(state.size);
        let leading_px = self.print.scale(state.leading);
        Size {
            width: lines.iter().copied().fold(0.0, f64::max),
            height: size_px + (lines.len() - 1) as f64 * leading_px,
        }
    }
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new(PrintSpec::default())
    }
}

impl RenderSurface for HeadlessSurface {
    fn measure(&self, element: ElementId) -> Result<Size, SurfaceError> {
        match &self.get(element)?.kind {
            ElementKind::Text(state) => Ok(self.text_size(state)),
            ElementKind::Shape { width, height } => Ok(Size { width: *width, height: *height }),
        }
    }

    fn set_font(
        &mut self,
        element: ElementId,
        family: &str,
        size: f64,
        leading: f64,
    ) -> Result<(), SurfaceError> {
        let state = self.text_state_mut(element)?;
        state.family = family.to_string();
        state.size = size;
        state.leading = leading;
        Ok(())
    }

    fn set_text(
        &mut self,
        element: ElementId,
        content: &FormattedString,
    ) -> Result<(), SurfaceError> {
        self.text_state_mut(element)?.content = content.text();
        Ok(())
    }

    fn bounds(&self, element: ElementId) -> Result<Rect, SurfaceError> {
        let el = self.get(element)?;
        let size = self.measure(element)?;
        let shift = match &el.kind {
            ElementKind::Text(state) => self.print.scale(state.baseline_shift),
            ElementKind::Shape { .. } => 0.0,
        };
        Ok(Rect::from_size(el.left, el.top - shift, size.width, size.height))
    }

    fn translate(&mut self, element: ElementId, dx: f64, dy: f64) -> Result<(), SurfaceError> {
        let el = self.get_mut(element)?;
        el.left += dx;
        el.top += dy;
        Ok(())
    }

    fn resize(
        &mut self,
        element: ElementId,
        scale_percent: f64,
        anchor: Anchor,
    ) -> Result<(), SurfaceError> {
        let before = self.bounds(element)?;
        let factor = scale_percent / 100.0;
        match &mut self.get_mut(element)?.kind {
            ElementKind::Text(state) => {
                state.size *= factor;
                state.leading *= factor;
                if let Some(width) = state.box_width.as_mut() {
                    *width *= factor;
                }
            }
            ElementKind::Shape { width, height } => {
                *width *= factor;
                *height *= factor;
            }
        }
        let after = self.bounds(element)?;
        let (dx, dy) = match anchor {
            Anchor::TopLeft => (0.0, 0.0),
            Anchor::Top => ((before.width() - after.width()) / 2.0, 0.0),
            Anchor::Center => (
                (before.width() - after.width()) / 2.0,
                (before.height() - after.height()) / 2.0,
            ),
            Anchor::Bottom => (
                (before.width() - after.width()) / 2.0,
                before.height() - after.height(),
            ),
            Anchor::BottomRight => (
                before.width() - after.width(),
                before.height() - after.height(),
            ),
        };
        self.translate(element, dx, dy)
    }

    fn duplicate(&mut self, element: ElementId) -> Result<ElementId, SurfaceError> {
        let mut copy = self.get(element)?.clone();
        copy.name = format!("{} copy", copy.name);
        Ok(self.push(copy))
    }

    fn set_visible(&mut self, element: ElementId, visible: bool) -> Result<(), SurfaceError> {
        self.get_mut(element)?.visible = visible;
        Ok(())
    }

    fn set_baseline_shift(&mut self, element: ElementId, shift: f64) -> Result<(), SurfaceError> {
        self.text_state_mut(element)?.baseline_shift = shift;
        Ok(())
    }

    fn scale_by_dpi(&self, points: f64) -> f64 {
        self.print.scale(points)
    }
}

/// Approximate advance width of a character in em units.
fn advance_em(c: char) -> f64 {
    match c {
        ' ' => 0.25,
        'i' | 'j' | 'l' | '\'' | '.' | ',' | ':' | ';' | '!' | '|' => 0.28,
        'f' | 'r' | 't' | 'I' | '(' | ')' | '-' => 0.33,
        'm' | 'w' => 0.80,
        'M' | 'W' | '@' => 0.89,
        '\u{2014}' => 1.0,
        'A'..='Z' => 0.65,
        '0'..='9' => 0.5,
        'a'..='z' => 0.5,
        _ if c.is_ascii() => 0.45,
        _ => 0.55,
    }
}
