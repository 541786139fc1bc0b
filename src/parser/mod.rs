//! Front ends for the two concrete syntaxes.
//!
//! Both parsers are `nom` combinators over a [`Span`] that tracks line and
//! column, and both lower into the shared [`crate::ast`] forms.

pub mod javascript;
pub mod lua;

use std::cell::Cell;
use std::path::Path;

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1, hex_digit1, one_of},
    combinator::{opt, recognize},
    error::{ErrorKind, ParseError, VerboseError, VerboseErrorKind},
    sequence::{pair, tuple},
    IResult, InputTake,
};
use nom_locate::LocatedSpan;
use tracing::{debug, instrument};

use crate::ast::{Chunk, Literal, Location};
use crate::error::{Error, Result, SourceLocation};

pub type Span<'a> = LocatedSpan<&'a str>;
pub type PResult<'a, T> = IResult<Span<'a>, T, VerboseError<Span<'a>>>;

/// Deepest nesting of expressions and blocks either parser accepts.
pub(crate) const MAX_NESTING: usize = 200;

thread_local! {
    static NESTING: Cell<usize> = const { Cell::new(0) };
}

/// Which concrete syntax a source unit is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Syntax {
    /// The alternate syntax operators author in.
    Lua,
    /// The engine's own syntax, as produced by the serializer.
    #[strum(to_string = "javascript", serialize = "js")]
    JavaScript,
}

impl Syntax {
    /// Guess the syntax from a file extension.
    pub fn from_path(path: &Path) -> Option<Syntax> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("lua") => Some(Syntax::Lua),
            Some("js") => Some(Syntax::JavaScript),
            _ => None,
        }
    }
}

/// Parse a whole source unit.
#[instrument(level = "debug", skip(source))]
pub fn parse(source: &str, filename: &str, syntax: Syntax) -> Result<Chunk> {
    let input = Span::new(source);
    NESTING.with(|depth| depth.set(0));
    let result = match syntax {
        Syntax::Lua => lua::parse_chunk(input),
        Syntax::JavaScript => javascript::parse_chunk(input),
    };
    match result {
        Ok((_, chunk)) => {
            debug!(
                statements = chunk.block.statements.len(),
                "parsed {}", filename
            );
            Ok(chunk)
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(syntax_error(filename, e)),
        Err(nom::Err::Incomplete(_)) => Err(Error::Syntax {
            message: "unexpected end of input".to_string(),
            location: SourceLocation::new(filename, 1, 1),
        }),
    }
}

fn syntax_error(filename: &str, error: VerboseError<Span<'_>>) -> Error {
    let Some((span, kind)) = error.errors.first() else {
        return Error::Syntax {
            message: "invalid syntax".to_string(),
            location: SourceLocation::new(filename, 1, 1),
        };
    };
    let context = error.errors.iter().find_map(|(_, kind)| match kind {
        VerboseErrorKind::Context(message) => Some(*message),
        _ => None,
    });
    let message = match (context, kind) {
        (Some(message), _) => message.to_string(),
        (None, VerboseErrorKind::Char(c)) => format!("expected '{}'", c),
        (None, _) => "unexpected input".to_string(),
    };
    let position = location(span);
    Error::Syntax {
        message: format!("{} near {}", message, near(span)),
        location: SourceLocation::new(filename, position.line, position.column),
    }
}

fn near(span: &Span<'_>) -> String {
    let text = span.fragment().trim_start();
    let line = text.lines().next().unwrap_or("");
    if line.is_empty() {
        return "end of input".to_string();
    }
    let snippet: String = line.chars().take(16).collect();
    format!("'{}'", snippet)
}

pub(crate) fn location(input: &Span<'_>) -> Location {
    Location::new(input.location_line(), input.get_utf8_column() as u32)
}

/// Abort parsing at `input` with a message; no alternative is tried.
pub(crate) fn fail<'a, T>(input: Span<'a>, message: &'static str) -> PResult<'a, T> {
    Err(nom::Err::Failure(VerboseError {
        errors: vec![(input, VerboseErrorKind::Context(message))],
    }))
}

/// Run `parser` one nesting level deeper, failing past [`MAX_NESTING`].
pub(crate) fn nested<'a, T>(
    input: Span<'a>,
    parser: impl FnOnce(Span<'a>) -> PResult<'a, T>,
) -> PResult<'a, T> {
    let depth = NESTING.with(|depth| {
        depth.set(depth.get() + 1);
        depth.get()
    });
    let result = if depth > MAX_NESTING {
        fail(input, "nesting is deeper than 200 levels")
    } else {
        parser(input)
    };
    NESTING.with(|depth| depth.set(depth.get().saturating_sub(1)));
    result
}

/// Recoverable mismatch; lets `alt` try the next branch.
pub(crate) fn mismatch<'a, T>(input: Span<'a>) -> PResult<'a, T> {
    Err(nom::Err::Error(VerboseError::from_error_kind(
        input,
        ErrorKind::Tag,
    )))
}

pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Integer and float literals shared by both syntaxes.
pub(crate) fn number(input: Span<'_>) -> PResult<'_, Literal> {
    alt((hex_integer, decimal_number))(input)
}

fn hex_integer(input: Span<'_>) -> PResult<'_, Literal> {
    let (rest, _) = alt((tag("0x"), tag("0X")))(input)?;
    let (rest, digits) = hex_digit1(rest)?;
    match u64::from_str_radix(digits.fragment(), 16) {
        // wraps around like the reference interpreter
        Ok(value) => Ok((rest, Literal::Integer(value as i64))),
        Err(_) => fail(input, "hexadecimal literal out of range"),
    }
}

fn decimal_number(input: Span<'_>) -> PResult<'_, Literal> {
    let (rest, text) = recognize(tuple((
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit1)))),
            recognize(pair(char('.'), digit1)),
        )),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;
    let text = *text.fragment();
    if text.contains(&['.', 'e', 'E'][..]) {
        return match text.parse::<f64>() {
            Ok(value) => Ok((rest, Literal::Float(value))),
            Err(_) => fail(input, "malformed number"),
        };
    }
    match text.parse::<i64>() {
        Ok(value) => Ok((rest, Literal::Integer(value))),
        Err(_) => match text.parse::<f64>() {
            Ok(value) => Ok((rest, Literal::Float(value))),
            Err(_) => fail(input, "malformed number"),
        },
    }
}

/// A `"..."` or `'...'` literal with the escape rules of `syntax`.
pub(crate) fn quoted_string(input: Span<'_>, syntax: Syntax) -> PResult<'_, String> {
    let text = *input.fragment();
    let quote = match text.chars().next() {
        Some(c @ ('"' | '\'')) => c,
        _ => return mismatch(input),
    };
    let mut bytes: Vec<u8> = Vec::new();
    let mut chars = text.char_indices().skip(1).peekable();
    while let Some((index, c)) = chars.next() {
        if c == quote {
            let (rest, _) = input.take_split(index + c.len_utf8());
            return match String::from_utf8(bytes) {
                Ok(value) => Ok((rest, value)),
                Err(_) => fail(input, "string literal is not valid UTF-8"),
            };
        }
        match c {
            '\n' => return fail(input, "unfinished string"),
            '\\' => {
                let Some((_, escape)) = chars.next() else {
                    return fail(input, "unfinished string");
                };
                match escape {
                    'n' => bytes.push(b'\n'),
                    't' => bytes.push(b'\t'),
                    'r' => bytes.push(b'\r'),
                    'b' => bytes.push(0x08),
                    'f' => bytes.push(0x0c),
                    'v' => bytes.push(0x0b),
                    'a' if syntax == Syntax::Lua => bytes.push(0x07),
                    '\\' | '"' | '\'' => bytes.push(escape as u8),
                    '\n' if syntax == Syntax::Lua => bytes.push(b'\n'),
                    // line continuation
                    '\n' => {}
                    'z' if syntax == Syntax::Lua => {
                        while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
                    }
                    'x' => {
                        let mut value = 0u32;
                        for _ in 0..2 {
                            match chars.next().and_then(|(_, c)| c.to_digit(16)) {
                                Some(digit) => value = value * 16 + digit,
                                None => return fail(input, "invalid \\x escape"),
                            }
                        }
                        match syntax {
                            Syntax::Lua => bytes.push(value as u8),
                            Syntax::JavaScript => {
                                push_char(&mut bytes, value, input)?;
                            }
                        }
                    }
                    'u' => {
                        let value = if chars.next_if(|(_, c)| *c == '{').is_some() {
                            let mut value = 0u32;
                            loop {
                                match chars.next() {
                                    Some((_, '}')) => break,
                                    Some((_, c)) if c.is_ascii_hexdigit() && value < 0x11_0000 => {
                                        value = value * 16 + c.to_digit(16).unwrap_or(0)
                                    }
                                    _ => return fail(input, "invalid \\u escape"),
                                }
                            }
                            value
                        } else if syntax == Syntax::JavaScript {
                            let mut value = 0u32;
                            for _ in 0..4 {
                                match chars.next().and_then(|(_, c)| c.to_digit(16)) {
                                    Some(digit) => value = value * 16 + digit,
                                    None => return fail(input, "invalid \\u escape"),
                                }
                            }
                            value
                        } else {
                            return fail(input, "invalid \\u escape");
                        };
                        push_code_unit(&mut bytes, value, &mut chars, input)?;
                    }
                    '0'..='9' if syntax == Syntax::Lua => {
                        let mut value = escape.to_digit(10).unwrap_or(0);
                        for _ in 0..2 {
                            match chars.peek().and_then(|(_, c)| c.to_digit(10)) {
                                Some(digit) => {
                                    value = value * 10 + digit;
                                    chars.next();
                                }
                                None => break,
                            }
                        }
                        if value > 255 {
                            return fail(input, "decimal escape too large");
                        }
                        bytes.push(value as u8);
                    }
                    '0' => bytes.push(0),
                    _ => return fail(input, "invalid escape sequence"),
                }
            }
            c => {
                let mut buffer = [0u8; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut buffer).as_bytes());
            }
        }
    }
    fail(input, "unfinished string")
}

fn push_char<'a>(bytes: &mut Vec<u8>, value: u32, input: Span<'a>) -> PResult<'a, ()> {
    match char::from_u32(value) {
        Some(c) => {
            let mut buffer = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buffer).as_bytes());
            Ok((input, ()))
        }
        None => fail(input, "escape is not a valid character"),
    }
}

/// JavaScript `\uXXXX` may be half of a surrogate pair spelled as two escapes.
fn push_code_unit<'a, I>(
    bytes: &mut Vec<u8>,
    value: u32,
    chars: &mut std::iter::Peekable<I>,
    input: Span<'a>,
) -> PResult<'a, ()>
where
    I: Iterator<Item = (usize, char)> + Clone,
{
    if !(0xD800..0xDC00).contains(&value) {
        return push_char(bytes, value, input);
    }
    let mut lookahead = chars.clone();
    let low = match (lookahead.next(), lookahead.next()) {
        (Some((_, '\\')), Some((_, 'u'))) => {
            let mut low = 0u32;
            for _ in 0..4 {
                match lookahead.next().and_then(|(_, c)| c.to_digit(16)) {
                    Some(digit) => low = low * 16 + digit,
                    None => return fail(input, "invalid \\u escape"),
                }
            }
            low
        }
        _ => return fail(input, "unpaired surrogate in \\u escape"),
    };
    if !(0xDC00..0xE000).contains(&low) {
        return fail(input, "unpaired surrogate in \\u escape");
    }
    *chars = lookahead;
    push_char(bytes, 0x10000 + ((value - 0xD800) << 10) + (low - 0xDC00), input)
}
