//! Button palette derivation with an explicit, bounded memo table.
//!
//! Palettes are keyed by the raw color string the caller styled with. The
//! cache is an ordinary value owned by whoever renders buttons; there is no
//! process-wide table.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::config::ThemeConfig;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognised color '{0}'")]
pub struct ColorParseError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

static HEX_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid hex color pattern")
});

static RGB_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^rgb\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*\)$")
        .expect("valid rgb() color pattern")
});

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };
    pub const WHITE: Rgb = Rgb {
        r: 255,
        g: 255,
        b: 255,
    };

    /// Parse `#rgb`, `#rrggbb` or `rgb(r, g, b)`
    pub fn parse(raw: &str) -> Result<Self, ColorParseError> {
        let input = raw.trim();
        let err = || ColorParseError(raw.to_string());

        if let Some(caps) = HEX_PATTERN.captures(input) {
            let digits = &caps[1];
            let expanded: String = if digits.len() == 3 {
                digits.chars().flat_map(|c| [c, c]).collect()
            } else {
                digits.to_string()
            };
            let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).map_err(|_| err());
            return Ok(Rgb {
                r: channel(0)?,
                g: channel(2)?,
                b: channel(4)?,
            });
        }

        if let Some(caps) = RGB_PATTERN.captures(input) {
            let channel = |i: usize| caps[i].parse::<u8>().map_err(|_| err());
            return Ok(Rgb {
                r: channel(1)?,
                g: channel(2)?,
                b: channel(3)?,
            });
        }

        Err(err())
    }

    /// Move each channel `amount` of the way toward black
    pub fn darken(self, amount: f32) -> Self {
        let keep = 1.0 - amount.clamp(0.0, 1.0);
        let scale = |c: u8| (f32::from(c) * keep).round() as u8;
        Rgb {
            r: scale(self.r),
            g: scale(self.g),
            b: scale(self.b),
        }
    }

    /// WCAG relative luminance in 0.0 - 1.0
    pub fn luminance(self) -> f32 {
        let linear = |c: u8| {
            let c = f32::from(c) / 255.0;
            if c <= 0.039_28 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        };
        0.2126 * linear(self.r) + 0.7152 * linear(self.g) + 0.0722 * linear(self.b)
    }

    /// Black or white, whichever reads better on this background
    pub fn contrasting_text(self) -> Self {
        if self.luminance() > 0.179 {
            Rgb::BLACK
        } else {
            Rgb::WHITE
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Colors for every interactive state of a button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ButtonPalette {
    pub base: Rgb,
    pub hover: Rgb,
    pub active: Rgb,
    pub text: Rgb,
}

impl ButtonPalette {
    pub fn derive(base: Rgb, theme: &ThemeConfig) -> Self {
        Self {
            base,
            hover: base.darken(theme.hover_darken),
            active: base.darken(theme.active_darken),
            text: base.contrasting_text(),
        }
    }
}

/// Bounded FIFO memo table of derived palettes
#[derive(Debug)]
pub struct PaletteCache {
    theme: ThemeConfig,
    entries: HashMap<String, ButtonPalette>,
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

impl PaletteCache {
    pub fn new(theme: ThemeConfig) -> Self {
        Self {
            theme,
            entries: HashMap::new(),
            order: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.theme.palette_cache_capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.entries.contains_key(raw)
    }

    /// Palette for `raw`, computed on first use.
    ///
    /// With a capacity of zero nothing is stored and every call recomputes.
    pub fn palette(&mut self, raw: &str) -> Result<ButtonPalette, ColorParseError> {
        if let Some(palette) = self.entries.get(raw) {
            self.hits += 1;
            return Ok(*palette);
        }

        self.misses += 1;
        let palette = ButtonPalette::derive(Rgb::parse(raw)?, &self.theme);
        if self.capacity() == 0 {
            return Ok(palette);
        }

        while self.entries.len() >= self.capacity() {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            debug!(color = %oldest, "evicted button palette");
        }
        self.entries.insert(raw.to_string(), palette);
        self.order.push_back(raw.to_string());
        Ok(palette)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
