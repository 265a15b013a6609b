//! Symbol Table - Glyph tokens, component colors and the ink palette
//!
//! Token values (the glyph characters) are font configuration; the color rules
//! in `symbol_colors` are fixed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::color::ManaColor;

/// Which color a glyph character is painted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "ink", content = "color")]
pub enum SymbolColor {
    /// Outer (regular) variant of a mana color.
    Mana(ManaColor),
    /// Inner (darker) variant of a mana color.
    ManaInner(ManaColor),
    Colorless,
    /// Darker colorless variant, used by the generic side of `{2/B}`.
    ColorlessInner,
    /// Primary text ink.
    Ink,
    /// Secondary ink (the light detail inside snow and untap).
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Mana,
    Hybrid,
    GenericHybrid,
    Phyrexian,
    PhyrexianHybrid,
    Special,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Glyph {
    pub chars: String,
    pub colors: Vec<SymbolColor>,
    pub kind: SymbolKind,
}

impl Glyph {
    pub fn char_count(&self) -> usize {
        self.chars.chars().count()
    }

    pub fn is_hybrid(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::Hybrid | SymbolKind::GenericHybrid | SymbolKind::PhyrexianHybrid
        )
    }

    pub fn is_phyrexian(&self) -> bool {
        matches!(self.kind, SymbolKind::Phyrexian | SymbolKind::PhyrexianHybrid)
    }
}

/// Hybrid pairs in printed order (left side first).
const HYBRID_PAIRS: [(ManaColor, ManaColor); 10] = {
    use ManaColor::*;
    [
        (White, Blue),
        (Blue, Black),
        (Black, Red),
        (Red, Green),
        (Green, White),
        (White, Black),
        (Blue, Red),
        (Black, Green),
        (Red, White),
        (Green, Blue),
    ]
};

/// Color rule for a token whose glyph has `char_count` characters.
/// Returns `None` when no rule applies.
pub fn symbol_colors(token: &str, char_count: usize) -> Option<Vec<SymbolColor>> {
    use SymbolColor::*;

    match token {
        "{E}" | "{CHAOS}" => return Some(vec![Ink]),
        "{S}" => return Some(vec![Colorless, Ink, Secondary]),
        "{Q}" => return Some(vec![Ink, Secondary]),
        _ => {}
    }

    let inner = token.strip_prefix('{').and_then(|t| t.strip_suffix('}'))?;
    let parts: Vec<&str> = inner.split('/').collect();
    let color_of = |s: &str| {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => ManaColor::from_letter(c),
            _ => None,
        }
    };

    match parts.as_slice() {
        [single] => {
            if let Some(c) = color_of(single) {
                return Some(vec![Mana(c), Ink]);
            }
        }
        ["2", right] => {
            if let Some(r) = color_of(right) {
                let generic = if r == ManaColor::Black { ColorlessInner } else { Colorless };
                return Some(vec![Mana(r), generic, Ink, Ink]);
            }
        }
        [left, "P"] => {
            if let Some(l) = color_of(left) {
                return Some(vec![ManaInner(l), Ink]);
            }
        }
        [left, right] | [left, right, "P"] => {
            if let (Some(l), Some(r)) = (color_of(left), color_of(right)) {
                return Some(vec![Mana(r), Mana(l), Ink, Ink]);
            }
        }
        _ => {}
    }

    if char_count == 2 {
        return Some(vec![Colorless, Ink]);
    }
    None
}

/// Token → glyph lookup.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    glyphs: HashMap<String, Glyph>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self { glyphs: HashMap::new() }
    }

    /// The standard token set for the bundled symbol font.
    pub fn standard() -> Self {
        let mut table = Self::new();

        for c in ManaColor::ALL {
            let lower = c.letter().to_ascii_lowercase();
            let letter = c.letter();
            table.insert_rule(&format!("{{{letter}}}"), &format!("o{lower}"), SymbolKind::Mana);
            table.insert_rule(
                &format!("{{2/{letter}}}"),
                &format!("QqR{lower}"),
                SymbolKind::GenericHybrid,
            );
            table.insert_rule(
                &format!("{{{letter}/P}}"),
                &format!("p{letter}"),
                SymbolKind::Phyrexian,
            );
        }

        for (l, r) in HYBRID_PAIRS {
            let (ll, rl) = (l.letter(), r.letter());
            table.insert_rule(
                &format!("{{{ll}/{rl}}}"),
                &format!("Qq{}{}", ll.to_ascii_lowercase(), rl),
                SymbolKind::Hybrid,
            );
            table.insert_rule(
                &format!("{{{ll}/{rl}/P}}"),
                &format!("Qp{}{}", ll.to_ascii_lowercase(), rl),
                SymbolKind::PhyrexianHybrid,
            );
        }

        for n in 0..=20u32 {
            let glyph = match char::from_digit(n, 10) {
                Some(d) => format!("o{d}"),
                // 10..=20 map onto A..=K
                None => format!("o{}", char::from(b'A' + (n - 10) as u8)),
            };
            table.insert_rule(&format!("{{{n}}}"), &glyph, SymbolKind::Mana);
        }

        for (token, glyph) in [
            ("{C}", "oc"),
            ("{X}", "ox"),
            ("{Y}", "oy"),
            ("{Z}", "oz"),
            ("{P}", "op"),
            ("{T}", "ot"),
            ("{Q}", "oq"),
            ("{S}", "omn"),
            ("{E}", "e"),
            ("{CHAOS}", "?"),
        ] {
            table.insert_rule(token, glyph, SymbolKind::Special);
        }

        table
    }

    /// Inserts a glyph whose colors come from the fixed rule table. Tokens no
    /// rule covers are skipped.
    pub fn insert_rule(&mut self, token: &str, chars: &str, kind: SymbolKind) -> bool {
        match symbol_colors(token, chars.chars().count()) {
            Some(colors) => {
                self.insert(token, Glyph { chars: chars.to_string(), colors, kind });
                true
            }
            None => false,
        }
    }

    pub fn insert(&mut self, token: &str, glyph: Glyph) {
        self.glyphs.insert(token.to_string(), glyph);
    }

    pub fn get(&self, token: &str) -> Option<&Glyph> {
        self.glyphs.get(token)
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.glyphs.keys().map(String::as_str)
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InkPair {
    pub outer: Rgb,
    pub inner: Rgb,
}

/// Color → RGB lookup for symbol painting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Palette {
    pub white: InkPair,
    pub blue: InkPair,
    pub black: InkPair,
    pub red: InkPair,
    pub green: InkPair,
    pub colorless: InkPair,
    pub ink: Rgb,
    pub secondary: Rgb,
}

impl Palette {
    pub fn resolve(&self, color: SymbolColor) -> Rgb {
        match color {
            SymbolColor::Mana(c) => self.pair(c).outer,
            SymbolColor::ManaInner(c) => self.pair(c).inner,
            SymbolColor::Colorless => self.colorless.outer,
            SymbolColor::ColorlessInner => self.colorless.inner,
            SymbolColor::Ink => self.ink,
            SymbolColor::Secondary => self.secondary,
        }
    }

    fn pair(&self, color: ManaColor) -> &InkPair {
        match color {
            ManaColor::White => &self.white,
            ManaColor::Blue => &self.blue,
            ManaColor::Black => &self.black,
            ManaColor::Red => &self.red,
            ManaColor::Green => &self.green,
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            white: InkPair { outer: Rgb::new(255, 251, 214), inner: Rgb::new(248, 231, 185) },
            blue: InkPair { outer: Rgb::new(170, 224, 250), inner: Rgb::new(67, 193, 247) },
            black: InkPair { outer: Rgb::new(204, 194, 193), inner: Rgb::new(142, 134, 128) },
            red: InkPair { outer: Rgb::new(249, 169, 143), inner: Rgb::new(249, 142, 111) },
            green: InkPair { outer: Rgb::new(154, 211, 175), inner: Rgb::new(35, 176, 97) },
            colorless: InkPair { outer: Rgb::new(204, 194, 193), inner: Rgb::new(159, 146, 143) },
            ink: Rgb::new(0, 0, 0),
            secondary: Rgb::new(255, 255, 255),
        }
    }
}
