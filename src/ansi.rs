//! ANSI SGR processing
//!
//! Turns one line of shell output with embedded Select Graphic Rendition
//! escapes into an ordered list of [`StyledSpan`]s. Parsing is a pure
//! function of the line and the default colors: style state never carries
//! over from one line to the next.

pub mod palette;
pub mod tokenizer;

pub use palette::Palette;
pub use tokenizer::{tokenize, Token};

use crate::models::{Color, StyledSpan};

/// Recoverable problems found while interpreting an escape. They are logged
/// and the rest of the line is still rendered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SgrDiagnostic {
    #[error("malformed escape parameter '{0}'")]
    MalformedEscape(String),

    #[error("unsupported SGR code {0}")]
    UnsupportedCode(u32),

    #[error("incomplete extended color in '{0}'")]
    IncompleteExtendedColor(String),
}

/// Style accumulated while scanning one line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorState {
    pub foreground: Color,
    pub background: Color,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub invert: bool,
}

impl ColorState {
    pub fn new(foreground: Color, background: Color) -> Self {
        Self {
            foreground,
            background,
            bold: false,
            italic: false,
            underline: false,
            invert: false,
        }
    }

    /// Span for `text` in the current state, with colors swapped when
    /// inverted
    pub fn span(&self, text: &str) -> StyledSpan {
        let (foreground, background) = if self.invert {
            (self.background, self.foreground)
        } else {
            (self.foreground, self.background)
        };
        StyledSpan {
            text: text.to_string(),
            foreground,
            background,
            bold: self.bold,
            italic: self.italic,
            underline: self.underline,
        }
    }
}

/// SGR span parser bound to a palette
#[derive(Debug, Clone, Default)]
pub struct SgrParser {
    palette: Palette,
}

impl SgrParser {
    /// Create a parser resolving colors through `palette`
    pub fn new(palette: Palette) -> Self {
        Self { palette }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Parse a line using the palette's default colors
    pub fn parse(&self, raw: &str) -> Vec<StyledSpan> {
        self.parse_line(raw, self.palette.foreground, self.palette.background)
    }

    /// Parse a line, logging any diagnostics
    pub fn parse_line(
        &self,
        raw: &str,
        default_foreground: Color,
        default_background: Color,
    ) -> Vec<StyledSpan> {
        let (spans, diagnostics) =
            self.parse_line_with_diagnostics(raw, default_foreground, default_background);
        for diagnostic in &diagnostics {
            debug!("Ignoring SGR sequence: {}", diagnostic);
        }
        spans
    }

    /// Parse a line and return the diagnostics alongside the spans
    pub fn parse_line_with_diagnostics(
        &self,
        raw: &str,
        default_foreground: Color,
        default_background: Color,
    ) -> (Vec<StyledSpan>, Vec<SgrDiagnostic>) {
        let defaults = ColorState::new(default_foreground, default_background);
        let mut state = defaults;
        let mut spans = Vec::new();
        let mut diagnostics = Vec::new();

        for token in tokenize(raw) {
            match token {
                Token::Text(text) => spans.push(state.span(text)),
                Token::Sgr(body) => self.apply(&mut state, &defaults, body, &mut diagnostics),
            }
        }

        (spans, diagnostics)
    }

    /// Apply the parameters of one escape to `state`, left to right
    fn apply(
        &self,
        state: &mut ColorState,
        defaults: &ColorState,
        body: &str,
        diagnostics: &mut Vec<SgrDiagnostic>,
    ) {
        // ESC[m is shorthand for ESC[0m
        if body.is_empty() {
            *state = *defaults;
            return;
        }

        let params: Vec<Option<u32>> = body
            .split(';')
            .map(|segment| {
                if segment.is_empty() {
                    return None;
                }
                match segment.parse::<u32>() {
                    Ok(code) => Some(code),
                    Err(_) => {
                        diagnostics.push(SgrDiagnostic::MalformedEscape(segment.to_string()));
                        None
                    }
                }
            })
            .collect();

        let mut i = 0;
        while i < params.len() {
            let Some(code) = params[i] else {
                i += 1;
                continue;
            };

            match code {
                0 => *state = *defaults,
                1 => state.bold = true,
                3 => state.italic = true,
                4 => state.underline = true,
                7 => state.invert = true,
                30..=37 => state.foreground = self.palette.base((code - 30) as u8, false),
                90..=97 => state.foreground = self.palette.base((code - 90) as u8, true),
                40..=47 => state.background = self.palette.base((code - 40) as u8, false),
                100..=107 => state.background = self.palette.base((code - 100) as u8, true),
                38 | 48 => match self.extended_color(&params[i + 1..]) {
                    Some((color, consumed)) => {
                        if code == 38 {
                            state.foreground = color;
                        } else {
                            state.background = color;
                        }
                        i += consumed;
                    }
                    None => {
                        // The remaining parameters belong to the broken selector
                        diagnostics.push(SgrDiagnostic::IncompleteExtendedColor(body.to_string()));
                        return;
                    }
                },
                other => diagnostics.push(SgrDiagnostic::UnsupportedCode(other)),
            }
            i += 1;
        }
    }

    /// Resolve the parameters following 38/48. Returns the color and the
    /// number of parameters consumed.
    fn extended_color(&self, rest: &[Option<u32>]) -> Option<(Color, usize)> {
        let channel = |p: Option<&Option<u32>>| p.copied().flatten().and_then(|v| u8::try_from(v).ok());

        match rest.first().copied().flatten()? {
            5 => {
                let index = channel(rest.get(1))?;
                Some((self.palette.indexed(index), 2))
            }
            2 => {
                let r = channel(rest.get(1))?;
                let g = channel(rest.get(2))?;
                let b = channel(rest.get(3))?;
                Some((Color::new(r, g, b), 4))
            }
            _ => None,
        }
    }
}

/// Parse `raw` with the default palette
pub fn parse_line(raw: &str, default_foreground: Color, default_background: Color) -> Vec<StyledSpan> {
    SgrParser::default().parse_line(raw, default_foreground, default_background)
}
