//! Shared types that mirror Korp's annotation format.
//!
//! A Korp export attaches a pipe-delimited list of candidate annotations to
//! every word of a sentence. Each candidate follows the grammar
//! `BASE[..TAG][:REF]`: a lexical base, an optional part-of-speech/sense tag
//! after `..`, and an optional 1-based back-reference after `:` to the
//! position where a multi-word unit's surface form begins.
//!
//! [`Candidate::parse`] is the single place that grammar is interpreted.
//! Parsing is total: a trailing `:xyz` that is not a plain integer is kept as
//! literal text, never an error. Downstream comparisons use the parsed keys
//! ([`Candidate::base`], [`Candidate::deref_key`]) instead of re-deriving them
//! from the raw string.
//!
//! ```rust
//! use korp_types::{Candidate, Mode};
//!
//! let cand = Candidate::parse("slå_fast..vbm.1:2");
//! assert_eq!(cand.base(), "slå_fast");
//! assert_eq!(cand.reference(), Some(2));
//! assert!(cand.is_mwe(Mode::Lex.separator()));
//! ```

use std::collections::HashMap;
use std::fmt;

/// Placeholder surface form for word elements whose text is missing entirely.
pub const NOWORD: &str = "noword";

/// Annotation mode, selecting both the attribute to read and the multi-word
/// separator used inside candidate bases.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Mode {
    /// SALDO lexeme annotations; multi-word bases join words with `_`.
    Lex,
    /// SALDO sense annotations; same separator conventions as lex.
    Saldo,
    /// Lemma annotations; multi-word bases join words with a space.
    Lemma,
}

impl Mode {
    /// Parse a mode name as it appears in requests and corpus attributes.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "lex" => Some(Mode::Lex),
            "saldo" => Some(Mode::Saldo),
            "lemma" => Some(Mode::Lemma),
            _ => None,
        }
    }

    /// Name of the word attribute holding this mode's candidate list.
    pub fn attribute(self) -> &'static str {
        match self {
            Mode::Lex => "lex",
            Mode::Saldo => "saldo",
            Mode::Lemma => "lemma",
        }
    }

    /// Separator joining the words of a multi-word base in this mode.
    /// Lemma bases use a space; every other mode uses an underscore.
    pub fn separator(self) -> char {
        match self {
            Mode::Lemma => ' ',
            _ => '_',
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.attribute())
    }
}

/// One parsed `BASE[..TAG][:REF]` candidate.
///
/// The raw text is kept verbatim; the parsed fields are byte offsets into it
/// plus a precomputed reference-stripped form used for identity comparisons.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Candidate {
    raw: String,
    base_end: usize,
    ref_start: usize,
    reference: Option<usize>,
    deref: String,
}

impl Candidate {
    /// Parse a candidate string. Total: malformed suffixes degrade to
    /// literal text.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let (ref_start, reference) = match raw.rfind(':') {
            Some(idx) => {
                let digits = &raw[idx + 1..];
                if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                    match digits.parse::<usize>() {
                        Ok(n) => (idx, Some(n)),
                        Err(_) => (raw.len(), None),
                    }
                } else {
                    (raw.len(), None)
                }
            }
            None => (raw.len(), None),
        };
        let base_end = match raw.find("..") {
            Some(idx) => idx.min(ref_start),
            None => ref_start,
        };
        let deref = strip_references(&raw);
        Self {
            raw,
            base_end,
            ref_start,
            reference,
            deref,
        }
    }

    /// The candidate exactly as it appeared in the annotation.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Normalized base: tag and reference suffix stripped.
    pub fn base(&self) -> &str {
        &self.raw[..self.base_end]
    }

    /// The candidate without its trailing `:REF` suffix (tag kept).
    pub fn without_ref(&self) -> &str {
        &self.raw[..self.ref_start]
    }

    /// Identity key with every `:<digits>` occurrence removed. Two candidates
    /// naming the same unit compare equal on this regardless of which
    /// position they sit at.
    pub fn deref_key(&self) -> &str {
        &self.deref
    }

    /// 1-based back-reference to the unit's first word, if present.
    pub fn reference(&self) -> Option<usize> {
        self.reference
    }

    /// Whether this candidate spans several surface words: the base contains
    /// the separator away from the leading position, and the candidate is not
    /// a URL-like literal.
    pub fn is_mwe(&self, sep: char) -> bool {
        self.base().contains(sep) && !self.raw.starts_with(sep) && !self.raw.starts_with("http")
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Remove every `:<digits>` run from a candidate string.
fn strip_references(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b':' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > i + 1 {
                i = j;
                continue;
            }
        }
        // Candidates are UTF-8; copy whole code points.
        let ch_len = utf8_len(bytes[i]);
        out.push_str(&raw[i..i + ch_len]);
        i += ch_len;
    }
    out
}

fn utf8_len(first: u8) -> usize {
    match first {
        b if b < 0x80 => 1,
        b if b < 0xe0 => 2,
        b if b < 0xf0 => 3,
        _ => 4,
    }
}

/// One `<w>` element of a sentence: its surface text and attribute map.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WordRecord {
    /// Surface form; `None` when the element had no text at all.
    pub text: Option<String>,
    /// Attribute name → raw pipe-delimited candidate list.
    pub annotations: HashMap<String, String>,
}

impl WordRecord {
    /// The raw candidate list for a mode, if annotated.
    pub fn annotation(&self, mode: Mode) -> Option<&str> {
        self.annotations.get(mode.attribute()).map(String::as_str)
    }

    /// Surface text with the missing-text placeholder substituted.
    pub fn surface(&self) -> &str {
        self.text.as_deref().unwrap_or(NOWORD)
    }
}

/// An element inside a `<sentence>`. Anything that is not a plain word makes
/// the whole sentence inapplicable for resolution.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SentenceElement {
    Word(WordRecord),
    /// A non-word element, carrying its tag name.
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_grammar() {
        let cand = Candidate::parse("slå_fast..vbm.1:11");
        assert_eq!(cand.base(), "slå_fast");
        assert_eq!(cand.reference(), Some(11));
        assert_eq!(cand.without_ref(), "slå_fast..vbm.1");
        assert_eq!(cand.deref_key(), "slå_fast..vbm.1");
    }

    #[test]
    fn parses_without_tag_or_ref() {
        let cand = Candidate::parse("ha..vb.1");
        assert_eq!(cand.base(), "ha");
        assert_eq!(cand.reference(), None);
        assert_eq!(cand.without_ref(), "ha..vb.1");

        let plain = Candidate::parse("att");
        assert_eq!(plain.base(), "att");
        assert_eq!(plain.without_ref(), "att");
    }

    #[test]
    fn malformed_reference_is_literal() {
        let cand = Candidate::parse("kl:ockan");
        assert_eq!(cand.reference(), None);
        assert_eq!(cand.without_ref(), "kl:ockan");
        assert_eq!(cand.deref_key(), "kl:ockan");

        let trailing_colon = Candidate::parse("foo:");
        assert_eq!(trailing_colon.reference(), None);
    }

    #[test]
    fn strips_every_reference_run() {
        let cand = Candidate::parse("a:1|b:2");
        assert_eq!(cand.deref_key(), "a|b");
        assert_eq!(cand.reference(), Some(2));
        assert_eq!(cand.without_ref(), "a:1|b");
    }

    #[test]
    fn mwe_detection_respects_mode_and_urls() {
        let sep = Mode::Lex.separator();
        assert!(Candidate::parse("slå_fast..vbm.1").is_mwe(sep));
        assert!(!Candidate::parse("fast..ab.1").is_mwe(sep));
        assert!(!Candidate::parse("_ledande..av.1").is_mwe(sep));
        assert!(!Candidate::parse("http_example_com").is_mwe(sep));

        let lemma_sep = Mode::Lemma.separator();
        assert!(Candidate::parse("slå fast").is_mwe(lemma_sep));
        assert!(!Candidate::parse("slå_fast").is_mwe(lemma_sep));
    }

    #[test]
    fn mode_lookup() {
        assert_eq!(Mode::from_name("lex"), Some(Mode::Lex));
        assert_eq!(Mode::from_name("lemma"), Some(Mode::Lemma));
        assert_eq!(Mode::from_name("saldo"), Some(Mode::Saldo));
        assert_eq!(Mode::from_name("msd"), None);
        assert_eq!(Mode::Saldo.separator(), '_');
        assert_eq!(Mode::Lemma.separator(), ' ');
        assert_eq!(Mode::Lex.to_string(), "lex");
    }

    #[test]
    fn word_record_fallbacks() {
        let word = WordRecord::default();
        assert_eq!(word.surface(), NOWORD);
        assert_eq!(word.annotation(Mode::Lex), None);
    }
}
