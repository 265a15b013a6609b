//! Markup Parser - Symbol substitution, italic spans and text runs
//!
//! All public offsets are char offsets into the substituted string.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::symbols::{SymbolColor, SymbolTable};

/// Separates rules text from flavor text in a combined string.
pub const FLAVOR_SEPARATOR: char = '\r';

const EM_DASH: &str = "\u{2014}";

/// Ability words italicized when they open a line followed by an em-dash.
pub const ABILITY_WORDS: &[&str] = &[
    "Adamant", "Addendum", "Alliance", "Battalion", "Bloodrush", "Celebration",
    "Channel", "Chroma", "Cohort", "Constellation", "Converge", "Coven",
    "Council's dilemma", "Delirium", "Descend 4", "Descend 8", "Domain",
    "Eerie", "Eminence", "Enrage", "Fateful hour", "Fathomless descent",
    "Ferocious", "Formidable", "Grandeur", "Hellbent", "Heroic", "Imprint",
    "Inspired", "Join forces", "Kinship", "Landfall", "Lieutenant",
    "Magecraft", "Metalcraft", "Morbid", "Pack tactics", "Paradox", "Parley",
    "Radiance", "Raid", "Rally", "Revolt", "Secret council", "Spell mastery",
    "Strive", "Survival", "Sweep", "Tempting offer", "Threshold", "Undergrowth",
    "Valiant", "Will of the council",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRun {
    pub offset: usize,
    pub colors: Vec<SymbolColor>,
}

impl SymbolRun {
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

/// Half-open char range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    UnresolvableSymbolToken { token: String, offset: usize },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedText {
    pub text: String,
    pub symbols: Vec<SymbolRun>,
    pub italics: Vec<Span>,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Plain,
    Symbol,
    Italic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub kind: RunKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub colors: Vec<SymbolColor>,
}

/// Ordered runs making up one block of text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormattedString(pub Vec<TextRun>);

impl FormattedString {
    pub fn plain(text: impl Into<String>) -> Self {
        Self(vec![TextRun { text: text.into(), kind: RunKind::Plain, colors: vec![] }])
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.0
    }

    pub fn text(&self) -> String {
        self.0.iter().map(|r| r.text.as_str()).collect()
    }

    pub fn char_len(&self) -> usize {
        self.0.iter().map(|r| r.text.chars().count()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|r| r.text.is_empty())
    }
}

/// Replaces every `{...}` token with its glyph characters, left to right.
///
/// Unknown tokens lose their braces and produce a diagnostic. After a token
/// nested inside an outer opener is replaced, the scan resumes at that
/// opener, so `{{W}}` ends with no braces left. Glyph output is never
/// rescanned past its own braces, so the loop always terminates.
pub fn locate_symbols(
    input: &str,
    table: &SymbolTable,
) -> (String, Vec<SymbolRun>, Vec<Diagnostic>) {
    let (text, symbols, diagnostics) = substitute(input, table);
    for diagnostic in &diagnostics {
        let Diagnostic::UnresolvableSymbolToken { token, offset } = diagnostic;
        warn!(token = %token, offset, "unresolvable symbol token, stripping braces");
    }
    (text, symbols, diagnostics)
}

/// The substitution behind `locate_symbols`, without logging.
fn substitute(input: &str, table: &SymbolTable) -> (String, Vec<SymbolRun>, Vec<Diagnostic>) {
    let mut text = input.to_string();
    let mut symbols: Vec<SymbolRun> = vec![];
    let mut diagnostics: Vec<Diagnostic> = vec![];
    let mut cursor = 0;

    while let Some(rel_open) = text[cursor..].find('{') {
        let first_open = cursor + rel_open;
        let close = match text[first_open..].find('}') {
            Some(rel) => first_open + rel,
            None => break,
        };
        // Innermost opener before the closer: "{a{W}" resolves "{W}".
        let open = first_open + text[first_open..close].rfind('{').unwrap_or(0);
        let token = text[open..=close].to_string();
        let offset = text[..open].chars().count();

        match table.get(&token) {
            Some(glyph) => {
                text.replace_range(open..=close, &glyph.chars);
                symbols.push(SymbolRun { offset, colors: glyph.colors.clone() });
                let inert = !glyph.chars.contains(['{', '}']);
                cursor = if open > first_open && inert {
                    first_open
                } else {
                    open + glyph.chars.len()
                };
            }
            None => {
                let bare = token[1..token.len() - 1].to_string();
                let end = offset + token.chars().count() - 1;
                // Anything found inside or after the stripped braces moves left.
                let shift = |at: usize| if at < end { 1 } else { 2 };
                for run in symbols.iter_mut().filter(|r| r.offset > offset) {
                    run.offset -= shift(run.offset);
                }
                for Diagnostic::UnresolvableSymbolToken { offset: at, .. } in &mut diagnostics {
                    if *at > offset {
                        *at -= shift(*at);
                    }
                }
                text.replace_range(open..=close, &bare);
                cursor = first_open;
                diagnostics.push(Diagnostic::UnresolvableSymbolToken { token, offset });
            }
        }
    }

    (text, symbols, diagnostics)
}

/// Removes reminder text. Never turns non-empty text into empty text: if
/// nothing would be left, the input comes back unchanged.
pub fn strip_reminder_text(text: &str) -> String {
    let mut stripped = text.to_string();
    let mut from = 0;
    while let Some(rel) = stripped[from..].find(')') {
        let close = from + rel;
        match stripped[..close].rfind('(') {
            Some(open) => {
                stripped.replace_range(open..=close, "");
                from = open;
            }
            None => from = close + 1,
        }
    }

    let lines: Vec<String> = stripped
        .split('\n')
        .map(|line| line.split(' ').filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect();
    let result = lines.join("\n");

    if result.is_empty() {
        text.to_string()
    } else {
        result
    }
}

/// Every parenthesized substring; an unclosed one runs to the end of the text.
pub fn reminder_strings(text: &str) -> Vec<String> {
    let mut found = vec![];
    let mut from = 0;
    while let Some(rel) = text[from..].find('(') {
        let start = from + rel;
        let end = match text[start..].find(')') {
            Some(rel_end) => start + rel_end + 1,
            None => text.len(),
        };
        found.push(text[start..end].to_string());
        from = end;
    }
    found
}

/// Char spans of known ability words that open a line (or a bullet) and
/// are followed by an em-dash.
pub fn ability_word_spans(text: &str) -> Vec<Span> {
    let mut spans = vec![];
    let mut line_start = 0;
    for line in text.split(['\n', FLAVOR_SEPARATOR]) {
        let (body, indent) = match line.strip_prefix("\u{2022} ") {
            Some(rest) => (rest, 2),
            None => (line, 0),
        };
        for word in ABILITY_WORDS {
            let opens_line = body
                .strip_prefix(word)
                .map_or(false, |rest| rest.trim_start().starts_with(EM_DASH));
            if opens_line {
                let start = line_start + indent;
                spans.push(Span { start, end: start + word.chars().count() });
                break;
            }
        }
        line_start += line.chars().count() + 1;
    }
    spans
}

/// Parses rules text and optional flavor text into substituted text with
/// symbol and italic metadata.
pub fn parse_text(
    rules: &str,
    flavor: &str,
    extra_italics: &[String],
    table: &SymbolTable,
) -> ParsedText {
    let mut combined = rules.to_string();
    if !flavor.is_empty() {
        combined.push(FLAVOR_SEPARATOR);
        combined.push_str(flavor);
    }

    let (text, symbols, diagnostics) = locate_symbols(&combined, table);

    let rules_end = if flavor.is_empty() {
        text.len()
    } else {
        text.rfind(FLAVOR_SEPARATOR).unwrap_or(text.len())
    };
    let mut italics = ability_word_spans(&text[..rules_end]);

    let mut patterns = reminder_strings(rules);
    patterns.extend(extra_italics.iter().cloned());
    for pattern in &patterns {
        let (pattern, _, _) = substitute(pattern, table);
        if pattern.is_empty() {
            continue;
        }
        let width = pattern.chars().count();
        for (byte_start, _) in text.match_indices(pattern.as_str()) {
            let start = text[..byte_start].chars().count();
            italics.push(Span { start, end: start + width });
        }
    }

    if !flavor.is_empty() {
        if let Some(sep) = text.rfind(FLAVOR_SEPARATOR) {
            let start = text[..sep].chars().count() + 1;
            italics.push(Span { start, end: text.chars().count() });
        }
    }
    italics.sort();

    ParsedText { text, symbols, italics, diagnostics }
}

/// Splits parsed text into ordered runs. Each symbol token becomes its own
/// run; neighbouring italic or plain characters are merged.
pub fn build_runs(parsed: &ParsedText) -> FormattedString {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Plain,
        Italic,
        Symbol(usize),
    }

    let chars: Vec<char> = parsed.text.chars().collect();
    let mut marks = vec![Mark::Plain; chars.len()];

    for span in &parsed.italics {
        for mark in marks.iter_mut().take(span.end.min(chars.len())).skip(span.start) {
            *mark = Mark::Italic;
        }
    }
    for (i, run) in parsed.symbols.iter().enumerate() {
        let end = (run.offset + run.len()).min(chars.len());
        for mark in marks.iter_mut().take(end).skip(run.offset) {
            *mark = Mark::Symbol(i);
        }
    }

    let mut runs: Vec<TextRun> = vec![];
    let mut current: Option<(Mark, String)> = None;
    for (c, mark) in chars.iter().zip(marks.iter()) {
        match current.as_mut() {
            Some((m, text)) if m == mark => text.push(*c),
            _ => {
                if let Some((m, text)) = current.take() {
                    runs.push(make_run(m, text, parsed));
                }
                current = Some((*mark, c.to_string()));
            }
        }
    }
    if let Some((m, text)) = current {
        runs.push(make_run(m, text, parsed));
    }

    fn make_run(mark: Mark, text: String, parsed: &ParsedText) -> TextRun {
        match mark {
            Mark::Plain => TextRun { text, kind: RunKind::Plain, colors: vec![] },
            Mark::Italic => TextRun { text, kind: RunKind::Italic, colors: vec![] },
            Mark::Symbol(i) => TextRun {
                text,
                kind: RunKind::Symbol,
                colors: parsed.symbols[i].colors.clone(),
            },
        }
    }

    FormattedString(runs)
}

/// `parse_text` followed by `build_runs`.
pub fn format_text(
    rules: &str,
    flavor: &str,
    extra_italics: &[String],
    table: &SymbolTable,
) -> (FormattedString, ParsedText) {
    let parsed = parse_text(rules, flavor, extra_italics, table);
    (build_runs(&parsed), parsed)
}
