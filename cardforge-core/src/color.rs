//! Color Model - Mana colors, color sets and canonical combinations
//!
//! A `ColorSet` is unordered. Every 2- and 3-color set maps to exactly one
//! canonical string through the fixed tables below.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ManaColor {
    #[serde(rename = "W")]
    White,
    #[serde(rename = "U")]
    Blue,
    #[serde(rename = "B")]
    Black,
    #[serde(rename = "R")]
    Red,
    #[serde(rename = "G")]
    Green,
}

impl ManaColor {
    /// WUBRG order.
    pub const ALL: [ManaColor; 5] = [
        ManaColor::White,
        ManaColor::Blue,
        ManaColor::Black,
        ManaColor::Red,
        ManaColor::Green,
    ];

    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'W' => Some(Self::White),
            'U' => Some(Self::Blue),
            'B' => Some(Self::Black),
            'R' => Some(Self::Red),
            'G' => Some(Self::Green),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Self::White => 'W',
            Self::Blue => 'U',
            Self::Black => 'B',
            Self::Red => 'R',
            Self::Green => 'G',
        }
    }

    /// Basic land type producing this color.
    pub fn basic_land_type(self) -> &'static str {
        match self {
            Self::White => "Plains",
            Self::Blue => "Island",
            Self::Black => "Swamp",
            Self::Red => "Mountain",
            Self::Green => "Forest",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Blue => "blue",
            Self::Black => "black",
            Self::Red => "red",
            Self::Green => "green",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Self::White => 1,
            Self::Blue => 1 << 1,
            Self::Black => 1 << 2,
            Self::Red => 1 << 3,
            Self::Green => 1 << 4,
        }
    }
}

/// Unordered set of mana colors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ColorSet(u8);

impl ColorSet {
    pub const EMPTY: ColorSet = ColorSet(0);
    pub const WUBRG: ColorSet = ColorSet(0b1_1111);

    /// Builds a set from any string, picking up every color letter it contains.
    pub fn from_letters(s: &str) -> Self {
        s.chars()
            .filter_map(ManaColor::from_letter)
            .fold(Self::EMPTY, |set, c| set.with(c))
    }

    pub fn from_colors<I: IntoIterator<Item = ManaColor>>(colors: I) -> Self {
        colors.into_iter().fold(Self::EMPTY, |set, c| set.with(c))
    }

    #[must_use]
    pub fn with(self, color: ManaColor) -> Self {
        Self(self.0 | color.bit())
    }

    pub fn insert(&mut self, color: ManaColor) {
        self.0 |= color.bit();
    }

    pub fn contains(self, color: ManaColor) -> bool {
        self.0 & color.bit() != 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Colors in WUBRG order.
    pub fn iter(self) -> impl Iterator<Item = ManaColor> {
        ManaColor::ALL.into_iter().filter(move |c| self.contains(*c))
    }

    /// Letters in WUBRG order, e.g. "WUG". Not canonical for pairs/triples.
    pub fn wubrg_string(self) -> String {
        self.iter().map(ManaColor::letter).collect()
    }

    /// The single fixed ordering for this set: mono letter, canonical pair or
    /// triple, or `None` for empty, 4- and 5-color sets.
    pub fn canonical(self) -> Option<&'static str> {
        match self.len() {
            1 => MONO.iter().find(|m| ColorSet::from_letters(m) == self).copied(),
            2 => PAIRS.iter().find(|p| ColorSet::from_letters(p) == self).copied(),
            3 => TRIPLES.iter().find(|t| ColorSet::from_letters(t) == self).copied(),
            _ => None,
        }
    }
}

impl fmt::Display for ColorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wubrg_string())
    }
}

impl Serialize for ColorSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for ColorSet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let colors = Vec::<ManaColor>::deserialize(deserializer)?;
        Ok(Self::from_colors(colors))
    }
}

const MONO: [&str; 5] = ["W", "U", "B", "R", "G"];

/// Allied pairs first, then enemy pairs.
const PAIRS: [&str; 10] = ["WU", "UB", "BR", "RG", "GW", "WB", "UR", "BG", "RW", "GU"];

/// Shards first, then wedges.
const TRIPLES: [&str; 10] = [
    "GWU", "WUB", "UBR", "BRG", "RGW", "WBG", "URW", "BGU", "RWB", "GUR",
];

/// Canonicalize any permutation of a 1-3 color string. Unknown letters are
/// ignored; returns `None` when no canonical form exists.
pub fn canonical_combination(letters: &str) -> Option<&'static str> {
    ColorSet::from_letters(letters).canonical()
}
