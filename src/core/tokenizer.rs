//! XML Tokenizer
//!
//! Incremental tokenizer over one window of the streaming buffer. Each call to
//! [`Tokenizer::next_token`] either yields a complete token, reports that the
//! window ends inside a token ([`Step::NeedMore`]), or reports end of input.
//! Tokens borrow from the window; the caller processes them before refilling.

use super::scanner::{is_name_start_char, is_whitespace, Scanner};

/// Structural error with its offset inside the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntaxError {
    pub offset: usize,
    pub message: &'static str,
}

impl SyntaxError {
    #[inline]
    pub fn new(offset: usize, message: &'static str) -> Self {
        SyntaxError { offset, message }
    }
}

pub const MSG_INVALID_TOKEN: &str = "not well-formed (invalid token)";
pub const MSG_UNCLOSED_TOKEN: &str = "unclosed token";
pub const MSG_UNCLOSED_CDATA: &str = "unclosed CDATA section";

/// Token types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// `<name attrs>` or `<name attrs/>`; `attrs` is the raw region after the name
    StartTag {
        name: &'a [u8],
        attrs: &'a [u8],
        attrs_offset: usize,
        empty: bool,
    },
    /// `</name>`
    EndTag { name: &'a [u8] },
    /// Character data with entities still encoded
    Text(&'a [u8]),
    /// `<![CDATA[...]]>` content, taken literally
    CData(&'a [u8]),
    /// `<!-- ... -->`
    Comment,
    /// `<?target ...?>`, including the XML declaration
    ProcessingInstruction,
    /// `<!DOCTYPE ...>`
    Doctype,
}

/// Outcome of one tokenizer step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<'a> {
    /// A complete token; the window has been consumed past it
    Token(Token<'a>),
    /// The window ends inside a token; refill and retry from `position()`
    NeedMore,
    /// Input exhausted
    End,
}

/// Tokenizer over a single buffer window
pub struct Tokenizer<'a> {
    scanner: Scanner<'a>,
    /// No more bytes will arrive after this window
    eof: bool,
}

impl<'a> Tokenizer<'a> {
    /// Create a tokenizer for `window`; `eof` marks the final window
    pub fn new(window: &'a [u8], eof: bool) -> Self {
        Tokenizer {
            scanner: Scanner::new(window),
            eof,
        }
    }

    /// Bytes consumed so far (start of the next token)
    #[inline]
    pub fn position(&self) -> usize {
        self.scanner.position()
    }

    /// Produce the next token from the window
    pub fn next_token(&mut self) -> Result<Step<'a>, SyntaxError> {
        if self.scanner.is_eof() {
            return Ok(if self.eof { Step::End } else { Step::NeedMore });
        }

        if self.scanner.peek() != Some(b'<') {
            return Ok(self.text());
        }

        match self.scanner.peek_at(1) {
            None => self.incomplete(),
            Some(b'/') => self.end_tag(),
            Some(b'?') => {
                self.delimited(b"<?", b"?>", Token::ProcessingInstruction, MSG_UNCLOSED_TOKEN)
            }
            Some(b'!') => self.markup_declaration(),
            Some(_) => self.start_tag(),
        }
    }

    /// Text runs up to the next '<' (or end of input)
    fn text(&mut self) -> Step<'a> {
        let start = self.scanner.position();
        match self.scanner.find_byte(b'<') {
            Some(end) => {
                self.scanner.set_position(end);
                Step::Token(Token::Text(self.scanner.slice(start, end)))
            }
            None if self.eof => {
                let rest = self.scanner.remaining();
                self.scanner.advance(rest.len());
                Step::Token(Token::Text(rest))
            }
            None => Step::NeedMore,
        }
    }

    fn markup_declaration(&mut self) -> Result<Step<'a>, SyntaxError> {
        if self.scanner.starts_with(b"<!--") {
            return self.delimited(b"<!--", b"-->", Token::Comment, MSG_UNCLOSED_TOKEN);
        }
        if self.scanner.starts_with(b"<![CDATA[") {
            let start = self.scanner.position();
            self.scanner.advance(9);
            return match self.scanner.find_seq(b"]]>") {
                Some(end) => {
                    let content = self.scanner.slice(start + 9, end);
                    self.scanner.set_position(end + 3);
                    Ok(Step::Token(Token::CData(content)))
                }
                None => {
                    self.scanner.set_position(start);
                    self.incomplete_with(MSG_UNCLOSED_CDATA)
                }
            };
        }
        if self.scanner.starts_with(b"<!DOCTYPE") {
            return match self.scanner.find_doctype_end() {
                Some(end) => {
                    self.scanner.set_position(end + 1);
                    Ok(Step::Token(Token::Doctype))
                }
                None => self.incomplete(),
            };
        }

        // "<!", "<![CD" and friends may still grow into a known construct
        if self.scanner.is_prefix_of(b"<!--")
            || self.scanner.is_prefix_of(b"<![CDATA[")
            || self.scanner.is_prefix_of(b"<!DOCTYPE")
        {
            return self.incomplete();
        }
        Err(SyntaxError::new(self.scanner.position(), MSG_INVALID_TOKEN))
    }

    /// Constructs with a fixed opener and terminator (comments, PIs)
    fn delimited(
        &mut self,
        open: &[u8],
        close: &[u8],
        token: Token<'a>,
        unclosed: &'static str,
    ) -> Result<Step<'a>, SyntaxError> {
        let start = self.scanner.position();
        self.scanner.advance(open.len());
        match self.scanner.find_seq(close) {
            Some(end) => {
                self.scanner.set_position(end + close.len());
                Ok(Step::Token(token))
            }
            None => {
                self.scanner.set_position(start);
                self.incomplete_with(unclosed)
            }
        }
    }

    fn end_tag(&mut self) -> Result<Step<'a>, SyntaxError> {
        let start = self.scanner.position();
        let Some(gt) = self.scanner.find_byte(b'>') else {
            return self.incomplete();
        };

        self.scanner.advance(2);
        let name = match self.scanner.read_name() {
            Some(name) => name,
            None => return Err(SyntaxError::new(start, MSG_INVALID_TOKEN)),
        };
        self.scanner.skip_whitespace();
        if self.scanner.position() != gt {
            return Err(SyntaxError::new(start, MSG_INVALID_TOKEN));
        }

        self.scanner.set_position(gt + 1);
        Ok(Step::Token(Token::EndTag { name }))
    }

    fn start_tag(&mut self) -> Result<Step<'a>, SyntaxError> {
        let start = self.scanner.position();
        if !self.scanner.peek_at(1).is_some_and(is_name_start_char) {
            return Err(SyntaxError::new(start, MSG_INVALID_TOKEN));
        }

        let Some(gt) = self.scanner.find_tag_end_quoted() else {
            return self.incomplete();
        };

        self.scanner.advance(1);
        let name = match self.scanner.read_name() {
            Some(name) => name,
            None => return Err(SyntaxError::new(start, MSG_INVALID_TOKEN)),
        };

        let attrs_start = self.scanner.position();
        let (attrs_end, empty) = if gt > attrs_start && self.scanner.slice(gt - 1, gt) == b"/" {
            (gt - 1, true)
        } else {
            (gt, false)
        };

        let attrs = self.scanner.slice(attrs_start, attrs_end);
        // the name must be followed by whitespace or the end of the tag
        if attrs.first().is_some_and(|&b| !is_whitespace(b)) {
            return Err(SyntaxError::new(attrs_start, MSG_INVALID_TOKEN));
        }

        self.scanner.set_position(gt + 1);
        Ok(Step::Token(Token::StartTag {
            name,
            attrs,
            attrs_offset: attrs_start,
            empty,
        }))
    }

    #[inline]
    fn incomplete(&self) -> Result<Step<'a>, SyntaxError> {
        self.incomplete_with(MSG_UNCLOSED_TOKEN)
    }

    /// The window ends mid-token: ask for more, or fail if nothing more is coming
    fn incomplete_with(&self, message: &'static str) -> Result<Step<'a>, SyntaxError> {
        if self.eof {
            Err(SyntaxError::new(self.scanner.position(), message))
        } else {
            Ok(Step::NeedMore)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &[u8]) -> Vec<Token<'_>> {
        let mut tokenizer = Tokenizer::new(input, true);
        let mut result = Vec::new();
        loop {
            match tokenizer.next_token().unwrap() {
                Step::Token(token) => result.push(token),
                Step::End => return result,
                Step::NeedMore => panic!("final window asked for more"),
            }
        }
    }

    #[test]
    fn test_simple_document() {
        let toks = tokens(
            b"<?xml version=\"1.0\"?><mame build=\"0.262\"><machine name=\"pacman\"/></mame>",
        );
        assert_eq!(toks.len(), 4);
        assert_eq!(toks[0], Token::ProcessingInstruction);
        assert!(matches!(toks[1], Token::StartTag { name: b"mame", empty: false, .. }));
        match toks[2] {
            Token::StartTag { name, attrs, empty, .. } => {
                assert_eq!(name, b"machine");
                assert_eq!(attrs, b" name=\"pacman\"");
                assert!(empty);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(toks[3], Token::EndTag { name: b"mame" });
    }

    #[test]
    fn test_text_comment_cdata() {
        let toks = tokens(b"<year>19<!-- x -->80<![CDATA[<?>]]></year>");
        assert_eq!(toks[1], Token::Text(b"19"));
        assert_eq!(toks[2], Token::Comment);
        assert_eq!(toks[3], Token::Text(b"80"));
        assert_eq!(toks[4], Token::CData(b"<?>"));
    }

    #[test]
    fn test_doctype_with_internal_subset() {
        let toks = tokens(b"<!DOCTYPE mame [\n<!ATTLIST mame build CDATA #IMPLIED>\n]>\n<mame/>");
        assert_eq!(toks[0], Token::Doctype);
        assert_eq!(toks[1], Token::Text(b"\n"));
    }

    #[test]
    fn test_need_more_inside_tag() {
        let mut tokenizer = Tokenizer::new(b"<machine name=\"pac", false);
        assert_eq!(tokenizer.next_token(), Ok(Step::NeedMore));
        assert_eq!(tokenizer.position(), 0);
    }

    #[test]
    fn test_need_more_for_partial_markup() {
        let mut tokenizer = Tokenizer::new(b"<![CD", false);
        assert_eq!(tokenizer.next_token(), Ok(Step::NeedMore));
        let mut tokenizer = Tokenizer::new(b"text", false);
        assert_eq!(tokenizer.next_token(), Ok(Step::NeedMore));
    }

    #[test]
    fn test_unclosed_at_eof() {
        let mut tokenizer = Tokenizer::new(b"<!-- never closed", true);
        let err = tokenizer.next_token().unwrap_err();
        assert_eq!(err.message, MSG_UNCLOSED_TOKEN);
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn test_invalid_tokens() {
        for input in [&b"< machine>"[..], b"<!BOGUS>", b"<1abc/>", b"</mame x>", b"<rom\"a\">"] {
            let mut tokenizer = Tokenizer::new(input, true);
            let err = tokenizer.next_token().unwrap_err();
            let shown = String::from_utf8_lossy(input);
            assert_eq!(err.message, MSG_INVALID_TOKEN, "input {shown:?}");
        }
    }

    #[test]
    fn test_end_tag_with_whitespace() {
        let toks = tokens(b"</machine  >");
        assert_eq!(toks, vec![Token::EndTag { name: b"machine" }]);
    }
}
