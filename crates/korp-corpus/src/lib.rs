//! Read exported Korp corpus XML into sentences of annotated words.
//!
//! A corpus export is a flat XML file whose `<sentence>` elements contain
//! `<w>` children. The token surface form is the element text and every
//! annotation layer (`lex`, `saldo`, `lemma`, ...) is an attribute holding a
//! pipe-delimited candidate list. Callers choose between memory-mapped files
//! and owned buffers at load time via [`LoadMode`].
//!
//! # Example
//! ```no_run
//! use korp_corpus::Corpus;
//!
//! # fn main() -> anyhow::Result<()> {
//! let corpus = Corpus::load("/data/export/suc3.xml")?;
//! for sentence in corpus.sentences() {
//!     let elements = sentence?;
//!     println!("{} elements", elements.len());
//! }
//! # Ok(()) }
//! ```

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use memmap2::Mmap;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use korp_types::{SentenceElement, WordRecord};

/// Strategy for loading a corpus file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadMode {
    /// Memory-map the file (fast, zero-copy).
    Mmap,
    /// Read the file into an owned buffer (portable fallback).
    Owned,
}

enum Buffer {
    Mmap(Mmap),
    Owned(Vec<u8>),
}

impl Buffer {
    fn as_slice(&self) -> &[u8] {
        match self {
            Buffer::Mmap(m) => m.as_ref(),
            Buffer::Owned(v) => v.as_slice(),
        }
    }
}

/// A loaded corpus export, backed by mmap or an owned buffer.
pub struct Corpus {
    path: PathBuf,
    buffer: Buffer,
}

impl Corpus {
    /// Load a corpus file, memory-mapping it by default.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with_mode(path, LoadMode::Mmap)
    }

    /// Load a corpus file choosing between mmap and owned buffers at runtime.
    pub fn load_with_mode(path: impl AsRef<Path>, mode: LoadMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let buffer = match mode {
            LoadMode::Mmap => {
                let file =
                    File::open(&path).with_context(|| format!("open {}", path.display()))?;
                unsafe { Mmap::map(&file) }
                    .map(Buffer::Mmap)
                    .with_context(|| format!("mmap {}", path.display()))?
            }
            LoadMode::Owned => {
                let mut file =
                    File::open(&path).with_context(|| format!("open {}", path.display()))?;
                let mut buf = Vec::new();
                file.read_to_end(&mut buf)
                    .with_context(|| format!("read {}", path.display()))?;
                Buffer::Owned(buf)
            }
        };
        Ok(Self { path, buffer })
    }

    /// Path the corpus was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw bytes of the export.
    pub fn bytes(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Iterate over the `<sentence>` elements of the export.
    pub fn sentences(&self) -> Sentences<'_> {
        Sentences::new(self.buffer.as_slice())
    }
}

/// Streaming iterator over the sentences of a corpus export.
///
/// Each item is the sentence as a flat list of [`SentenceElement`]s in
/// document order. Structural markup nested inside a sentence (named
/// entities, link spans) appears as [`SentenceElement::Other`] carrying the
/// element name; the words inside such spans are still yielded.
pub struct Sentences<'a> {
    reader: Reader<&'a [u8]>,
    buf: Vec<u8>,
    done: bool,
}

impl<'a> Sentences<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        let mut reader = Reader::from_reader(bytes);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            done: false,
        }
    }

    /// Advance to the next `<sentence>` start tag, if any.
    fn seek_sentence(&mut self) -> Result<bool> {
        loop {
            self.buf.clear();
            match self
                .reader
                .read_event_into(&mut self.buf)
                .with_context(|| format!("xml error at byte {}", self.reader.buffer_position()))?
            {
                Event::Start(ref e) if e.name().as_ref() == b"sentence" => return Ok(true),
                Event::Eof => return Ok(false),
                _ => {}
            }
        }
    }

    /// Collect elements until the matching `</sentence>`.
    fn read_sentence(&mut self) -> Result<Vec<SentenceElement>> {
        let mut elements = Vec::new();
        let mut word: Option<WordRecord> = None;

        loop {
            self.buf.clear();
            match self
                .reader
                .read_event_into(&mut self.buf)
                .with_context(|| format!("xml error at byte {}", self.reader.buffer_position()))?
            {
                Event::Start(ref e) => match e.name().as_ref() {
                    b"w" => word = Some(word_record(e)?),
                    other => elements.push(SentenceElement::Other(
                        String::from_utf8_lossy(other).into_owned(),
                    )),
                },
                Event::Empty(ref e) => {
                    if e.name().as_ref() == b"w" {
                        elements.push(SentenceElement::Word(word_record(e)?));
                    } else {
                        elements.push(SentenceElement::Other(
                            String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                        ));
                    }
                }
                Event::Text(ref e) => {
                    if let Some(record) = word.as_mut() {
                        let text = e.unescape().context("unescape token text")?;
                        match record.text.as_mut() {
                            Some(existing) => existing.push_str(&text),
                            None => record.text = Some(text.into_owned()),
                        }
                    }
                }
                Event::End(ref e) => match e.name().as_ref() {
                    b"w" => {
                        if let Some(record) = word.take() {
                            elements.push(SentenceElement::Word(record));
                        }
                    }
                    b"sentence" => return Ok(elements),
                    _ => {}
                },
                Event::Eof => anyhow::bail!("unexpected end of file inside <sentence>"),
                _ => {}
            }
        }
    }
}

impl Iterator for Sentences<'_> {
    type Item = Result<Vec<SentenceElement>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.seek_sentence() {
            Ok(true) => Some(self.read_sentence()),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn word_record(tag: &BytesStart<'_>) -> Result<WordRecord> {
    let mut annotations = HashMap::new();
    for attr in tag.attributes() {
        let attr = attr.context("malformed <w> attribute")?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .context("unescape <w> attribute value")?
            .into_owned();
        annotations.insert(key, value);
    }
    Ok(WordRecord {
        text: None,
        annotations,
    })
}
