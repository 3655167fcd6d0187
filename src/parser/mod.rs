use regex::Regex;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum NameParseError {
    #[error("No canonical form in '{0}'")]
    NoCanonicalForm(String),

    #[error("Empty name string")]
    EmptyName,
}

/// Extracts the de-authored canonical form of a scientific name string.
/// Implementations may keep internal state and are allowed to fail per
/// input; callers go through [`ResettingParser`] so a failure never leaks
/// state into the next record.
pub trait CanonicalParser {
    fn canonical(&mut self, name: &str) -> Result<String, NameParseError>;
}

/// Regex-based canonical extractor: genus plus up to two lowercase
/// epithets, with rank markers (var., subsp., f., ssp.) dropped and
/// authorship, years and annotations stripped.
pub struct GnaParser {
    genus: Regex,
    epithet: Regex,
}

impl GnaParser {
    pub fn new() -> Self {
        Self {
            genus: Regex::new(r"^[A-Z][a-zë-]+$").expect("invalid genus pattern"),
            epithet: Regex::new(r"^×?[a-zë-]+$").expect("invalid epithet pattern"),
        }
    }
}

impl Default for GnaParser {
    fn default() -> Self {
        Self::new()
    }
}

const RANK_MARKERS: [&str; 6] = ["var.", "subsp.", "ssp.", "f.", "forma", "cv."];

impl CanonicalParser for GnaParser {
    fn canonical(&mut self, name: &str) -> Result<String, NameParseError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(NameParseError::EmptyName);
        }

        let mut tokens = trimmed.split_whitespace();
        let genus = tokens.next().filter(|t| self.genus.is_match(t));
        let genus = match genus {
            Some(g) => g,
            None => return Err(NameParseError::NoCanonicalForm(name.to_string())),
        };

        let mut parts = vec![genus.to_string()];
        for token in tokens {
            if parts.len() >= 3 {
                break;
            }
            if RANK_MARKERS.contains(&token) {
                continue;
            }
            if self.epithet.is_match(token) {
                parts.push(token.to_string());
            } else {
                // Authorship, year or annotation: the canonical part ends.
                break;
            }
        }
        Ok(parts.join(" "))
    }
}

/// Scoped-acquisition wrapper around a parser: any failure discards the
/// inner instance and builds a fresh one from the factory, so corrupted
/// parser state never survives into the next record.
pub struct ResettingParser<P, F>
where
    P: CanonicalParser,
    F: Fn() -> P,
{
    inner: P,
    factory: F,
}

impl<P, F> ResettingParser<P, F>
where
    P: CanonicalParser,
    F: Fn() -> P,
{
    pub fn new(factory: F) -> Self {
        let inner = factory();
        Self { inner, factory }
    }

    /// Returns the canonical form, or `None` if parsing failed for this
    /// input. Failure is per-record and non-fatal.
    pub fn canonical(&mut self, name: &str) -> Option<String> {
        match self.inner.canonical(name) {
            Ok(canonical) => Some(canonical),
            Err(err) => {
                warn!("Name parser failed on '{}': {}", name, err);
                self.inner = (self.factory)();
                None
            }
        }
    }
}

/// The default parser stack used by the pipeline.
pub fn default_parser() -> ResettingParser<GnaParser, fn() -> GnaParser> {
    ResettingParser::new(GnaParser::new)
}
