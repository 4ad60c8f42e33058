//! Font acquisition with a fallback chain.
//!
//! Text nodes need their font loaded by the host before characters can be
//! set. A requested face may not exist, so candidates are tried in order:
//! the requested face, its family's Regular, the fallback family's Regular,
//! then the fallback family in each generic style alias.

use crate::scene::{FontName, SceneGraph};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

pub const DEFAULT_FALLBACK_FAMILY: &str = "Inter";
pub const REGULAR_STYLE: &str = "Regular";

pub fn default_style_aliases() -> Vec<String> {
    ["Normal", "Book", "Roman", "Medium"].map(String::from).to_vec()
}

/// Every candidate failed to load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no usable font for {requested} (tried {})", display_list(.tried))]
pub struct FontError {
    pub requested: FontName,
    pub tried: Vec<FontName>,
}

fn display_list(fonts: &[FontName]) -> String {
    fonts.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Ordered candidate list for a requested font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontFallback {
    pub fallback_family: String,
    pub style_aliases: Vec<String>,
}

impl Default for FontFallback {
    fn default() -> Self {
        Self {
            fallback_family: DEFAULT_FALLBACK_FAMILY.to_string(),
            style_aliases: default_style_aliases(),
        }
    }
}

impl FontFallback {
    pub fn new(fallback_family: impl Into<String>, style_aliases: Vec<String>) -> Self {
        Self {
            fallback_family: fallback_family.into(),
            style_aliases,
        }
    }

    /// The font used when an operation names none.
    pub fn default_font(&self) -> FontName {
        FontName::new(&self.fallback_family, REGULAR_STYLE)
    }

    /// Candidates for `requested`, in order, each at most once.
    pub fn candidates(&self, requested: &FontName) -> Vec<FontName> {
        let chain = [
            requested.clone(),
            FontName::new(&requested.family, REGULAR_STYLE),
            self.default_font(),
        ]
        .into_iter()
        .chain(
            self.style_aliases
                .iter()
                .map(|style| FontName::new(&self.fallback_family, style)),
        );

        let mut seen = HashSet::new();
        chain.filter(|font| seen.insert(font.clone())).collect()
    }
}

/// Loads fonts through the scene graph, caching what succeeded.
#[derive(Debug, Default)]
pub struct FontLoader {
    fallback: FontFallback,
    /// Requested font to the face that was actually loaded for it.
    resolved: HashMap<FontName, FontName>,
}

impl FontLoader {
    pub fn new(fallback: FontFallback) -> Self {
        Self {
            fallback,
            resolved: HashMap::new(),
        }
    }

    pub fn fallback(&self) -> &FontFallback {
        &self.fallback
    }

    /// Load the first available candidate for `requested` and return it.
    pub fn acquire<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &mut S,
        requested: &FontName,
    ) -> Result<FontName, FontError> {
        if let Some(font) = self.resolved.get(requested) {
            return Ok(font.clone());
        }

        let candidates = self.fallback.candidates(requested);
        for candidate in &candidates {
            match scene.load_font(candidate) {
                Ok(()) => {
                    if candidate != requested {
                        log::warn!("Font {} unavailable, using {}", requested, candidate);
                    }
                    self.resolved.insert(requested.clone(), candidate.clone());
                    return Ok(candidate.clone());
                }
                Err(e) => log::debug!("Font candidate {} failed: {}", candidate, e),
            }
        }
        Err(FontError {
            requested: requested.clone(),
            tried: candidates,
        })
    }
}
