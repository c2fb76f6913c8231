//! Streaming Schema Parser
//!
//! Depth-scoped event parser that dispatches element begin/end callbacks for a
//! static schema. No document tree is built: the parser keeps a stack of open
//! elements, a name arena for well-formedness checks and a text accumulator
//! that is only active inside elements whose content the handler wants.
//!
//! Memory use is bounded by the nesting depth and the largest single token,
//! not by the size of the document.

pub mod attributes;

pub use attributes::Attributes;

use crate::core::attributes::{parse_attributes, RawAttribute};
use crate::core::encoding::{needs_more_for_detection, utf8_bom_len, XmlEncoding};
use crate::core::entities::{decode_into, decode_text};
use crate::core::tokenizer::{Step, SyntaxError, Token, Tokenizer, MSG_INVALID_TOKEN};
use crate::error::{Diagnostic, XmlError};
use crate::reader::buffered::BufferedReader;
use memchr::{memchr, memchr_iter, memrchr};
use std::io::Read;
use tracing::trace;

pub const MSG_SYNTAX: &str = "syntax error";
pub const MSG_NO_ELEMENT: &str = "no element found";
pub const MSG_JUNK_AFTER_ROOT: &str = "junk after document element";
pub const MSG_MISMATCHED_TAG: &str = "mismatched tag";
pub const MSG_UNSUPPORTED_ENCODING: &str = "unsupported encoding (only UTF-8 is accepted)";

/// What the parser does with an element after its begin callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementResult {
    /// Descend into the element and deliver its end callback
    Ok,
    /// Ignore the element and its whole subtree; no end callback
    Skip,
}

/// Receiver of schema events
///
/// Element identity is resolved statically: `resolve` maps a parent element
/// (or the document root when `None`) and a tag name to a child element.
/// Names that do not resolve are skipped together with their subtree.
pub trait SchemaHandler {
    type Element: Copy + std::fmt::Debug;
    type Error: From<XmlError>;

    /// Child element of `parent` named `name`, if the schema knows it
    fn resolve(parent: Option<Self::Element>, name: &[u8]) -> Option<Self::Element>;

    /// Whether the end callback of `element` receives its text content
    fn collects_text(element: Self::Element) -> bool;

    fn begin(
        &mut self,
        element: Self::Element,
        attributes: &mut Attributes<'_>,
    ) -> Result<ElementResult, Self::Error>;

    /// `text` is empty unless `collects_text(element)`
    fn end(&mut self, element: Self::Element, text: &[u8]) -> Result<(), Self::Error>;
}

/// Line and column of a byte in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPosition {
    pub line: u64,
    pub column: u64,
}

impl TextPosition {
    pub const START: TextPosition = TextPosition { line: 1, column: 0 };

    /// Move past `bytes`
    #[inline]
    pub fn advance(&mut self, bytes: &[u8]) {
        match memrchr(b'\n', bytes) {
            Some(last) => {
                self.line += memchr_iter(b'\n', bytes).count() as u64;
                self.column = (bytes.len() - last - 1) as u64;
            }
            None => self.column += bytes.len() as u64,
        }
    }

    /// Position after `bytes`, leaving `self` untouched
    #[inline]
    pub fn after(mut self, bytes: &[u8]) -> TextPosition {
        self.advance(bytes);
        self
    }
}

impl Default for TextPosition {
    fn default() -> Self {
        TextPosition::START
    }
}

#[derive(Debug, Clone, Copy)]
enum Frame<E> {
    Known(E),
    Skipped,
}

/// Parse `input` to completion, dispatching events to `handler`
///
/// Fails with every collected diagnostic if the document is malformed, a read
/// fails, or any attribute value could not be decoded.
pub fn parse<H, R>(handler: &mut H, input: R) -> Result<(), H::Error>
where
    H: SchemaHandler,
    R: Read,
{
    SchemaParser::<H>::new().run(handler, input)
}

struct SchemaParser<H: SchemaHandler> {
    frames: Vec<Frame<H::Element>>,
    /// Concatenated names of open elements
    names: Vec<u8>,
    /// End offset in `names` of each open element's name
    name_ends: Vec<usize>,
    text: Vec<u8>,
    collecting: bool,
    attrs: Vec<RawAttribute>,
    values: Vec<u8>,
    diagnostics: Vec<Diagnostic>,
    position: TextPosition,
    seen_root: bool,
    root_closed: bool,
}

impl<H: SchemaHandler> SchemaParser<H> {
    fn new() -> Self {
        SchemaParser {
            frames: Vec::with_capacity(16),
            names: Vec::with_capacity(256),
            name_ends: Vec::with_capacity(16),
            text: Vec::with_capacity(1024),
            collecting: false,
            attrs: Vec::with_capacity(16),
            values: Vec::with_capacity(256),
            diagnostics: Vec::new(),
            position: TextPosition::START,
            seen_root: false,
            root_closed: false,
        }
    }

    fn run<R: Read>(mut self, handler: &mut H, input: R) -> Result<(), H::Error> {
        let mut reader = BufferedReader::new(input);
        let mut detected = false;

        loop {
            if let Err(e) = reader.fill_buffer() {
                return Err(self.fail(self.position, e.to_string()));
            }
            let eof = reader.source_exhausted();
            let window = reader.buffered();

            if !detected {
                if needs_more_for_detection(window) && !eof {
                    continue;
                }
                detected = true;
                if XmlEncoding::detect(window) != XmlEncoding::Utf8 {
                    return Err(self.fail(self.position, MSG_UNSUPPORTED_ENCODING.to_string()));
                }
                let bom = utf8_bom_len(window);
                if bom > 0 {
                    reader.consume(bom);
                    continue;
                }
            }

            if let Some(at) = memchr(0, window) {
                let position = self.position.after(&window[..at]);
                return Err(self.fail(position, MSG_INVALID_TOKEN.to_string()));
            }

            let mut tokenizer = Tokenizer::new(window, eof);
            let (consumed, finished) = loop {
                let start = tokenizer.position();
                match tokenizer.next_token() {
                    Ok(Step::Token(token)) => {
                        let raw = &window[start..tokenizer.position()];
                        if let Err(e) = std::str::from_utf8(raw) {
                            let error = SyntaxError::new(e.valid_up_to(), MSG_INVALID_TOKEN);
                            return Err(self.syntax_error(window, start, error));
                        }
                        self.token(handler, window, start, token)?;
                        self.position.advance(raw);
                    }
                    Ok(Step::NeedMore) => break (start, false),
                    Ok(Step::End) => break (start, true),
                    Err(e) => {
                        // tokenizer offsets count from the window start
                        let error = SyntaxError::new(e.offset.saturating_sub(start), e.message);
                        return Err(self.syntax_error(window, start, error));
                    }
                }
            };

            reader.consume(consumed);
            if finished {
                break;
            }
        }

        trace!(bytes = reader.total_consumed(), "document consumed");
        self.finish()
    }

    fn token(
        &mut self,
        handler: &mut H,
        window: &[u8],
        start: usize,
        token: Token<'_>,
    ) -> Result<(), H::Error> {
        match token {
            Token::StartTag {
                name,
                attrs,
                attrs_offset,
                empty,
            } => {
                self.start_element(handler, window, start, name, attrs, attrs_offset)?;
                if empty {
                    self.end_element(handler)?;
                }
                Ok(())
            }
            Token::EndTag { name } => {
                if self.open_name() != Some(name) {
                    return Err(self.fail(self.position, MSG_MISMATCHED_TAG.to_string()));
                }
                self.end_element(handler)
            }
            Token::Text(raw) => self.text(window, start, raw),
            Token::CData(content) => {
                if self.frames.is_empty() {
                    return Err(self.fail(self.position, self.outside_root_message().to_string()));
                }
                if self.collecting {
                    self.text.extend_from_slice(content);
                }
                Ok(())
            }
            Token::Doctype if self.seen_root => {
                Err(self.fail(self.position, self.outside_root_message().to_string()))
            }
            Token::Comment | Token::ProcessingInstruction | Token::Doctype => Ok(()),
        }
    }

    fn start_element(
        &mut self,
        handler: &mut H,
        window: &[u8],
        start: usize,
        name: &[u8],
        attrs: &[u8],
        attrs_offset: usize,
    ) -> Result<(), H::Error> {
        if self.root_closed {
            return Err(self.fail(self.position, MSG_JUNK_AFTER_ROOT.to_string()));
        }
        self.seen_root = true;

        if let Err(e) = parse_attributes(attrs, &mut self.attrs, &mut self.values) {
            let error = SyntaxError::new(attrs_offset - start + e.offset, e.message);
            return Err(self.syntax_error(window, start, error));
        }

        self.names.extend_from_slice(name);
        self.name_ends.push(self.names.len());

        let element = match self.frames.last() {
            Some(Frame::Skipped) => None,
            Some(&Frame::Known(parent)) => H::resolve(Some(parent), name),
            None => H::resolve(None, name),
        };

        let frame = match element {
            Some(element) => {
                let mut attributes = Attributes::new(
                    attrs,
                    &self.attrs,
                    &self.values,
                    self.position,
                    &mut self.diagnostics,
                );
                match handler.begin(element, &mut attributes)? {
                    ElementResult::Ok => Frame::Known(element),
                    ElementResult::Skip => Frame::Skipped,
                }
            }
            None => Frame::Skipped,
        };

        self.collecting = match frame {
            Frame::Known(element) => H::collects_text(element),
            Frame::Skipped => false,
        };
        if self.collecting {
            self.text.clear();
        }
        self.frames.push(frame);
        Ok(())
    }

    fn end_element(&mut self, handler: &mut H) -> Result<(), H::Error> {
        let frame = self.frames.pop();
        self.name_ends.pop();
        self.names.truncate(self.name_ends.last().copied().unwrap_or(0));

        if let Some(Frame::Known(element)) = frame {
            let text: &[u8] = if self.collecting { &self.text } else { &[] };
            handler.end(element, text)?;
        }

        self.collecting = match self.frames.last() {
            Some(&Frame::Known(parent)) => H::collects_text(parent),
            _ => false,
        };
        if self.frames.is_empty() {
            self.root_closed = true;
        }
        Ok(())
    }

    fn text(&mut self, window: &[u8], start: usize, raw: &[u8]) -> Result<(), H::Error> {
        if self.frames.is_empty() {
            if raw.iter().all(|&b| matches!(b, b' ' | b'\t' | b'\n' | b'\r')) {
                return Ok(());
            }
            let message = self.outside_root_message();
            let first = raw
                .iter()
                .position(|&b| !matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
                .unwrap_or(0);
            return Err(self.syntax_error(window, start, SyntaxError::new(first, message)));
        }

        let decoded = if self.collecting {
            decode_into(raw, &mut self.text)
        } else {
            // still validate references in text nobody reads
            decode_text(raw).map(|_| ())
        };
        match decoded {
            Ok(()) => Ok(()),
            Err(message) => Err(self.syntax_error(window, start, SyntaxError::new(0, message))),
        }
    }

    #[inline]
    fn open_name(&self) -> Option<&[u8]> {
        let end = *self.name_ends.last()?;
        let start = match self.name_ends.len() {
            1 => 0,
            n => self.name_ends[n - 2],
        };
        Some(&self.names[start..end])
    }

    fn outside_root_message(&self) -> &'static str {
        if self.root_closed {
            MSG_JUNK_AFTER_ROOT
        } else {
            MSG_SYNTAX
        }
    }

    /// Structural error at `token_start + error.offset` within `window`
    fn syntax_error(&mut self, window: &[u8], token_start: usize, error: SyntaxError) -> H::Error {
        let at = (token_start + error.offset).min(window.len());
        let position = if at >= token_start {
            self.position.after(&window[token_start..at])
        } else {
            self.position
        };
        self.fail(position, error.message.to_string())
    }

    fn fail(&mut self, position: TextPosition, message: String) -> H::Error {
        self.diagnostics.push(Diagnostic {
            line: position.line,
            column: position.column,
            message,
        });
        XmlError {
            diagnostics: std::mem::take(&mut self.diagnostics),
        }
        .into()
    }

    fn finish(mut self) -> Result<(), H::Error> {
        if !self.frames.is_empty() || !self.seen_root {
            return Err(self.fail(self.position, MSG_NO_ELEMENT.to_string()));
        }
        if !self.diagnostics.is_empty() {
            return Err(XmlError {
                diagnostics: self.diagnostics,
            }
            .into());
        }
        Ok(())
    }
}
