//! Reader for the textual surface syntax.
//!
//! ```text
//! (cmd a b)          application; `(x)` is just `x`, `()` is an error
//! [a b c]            (list a b c); `[]` is the empty-list literal
//! {x 1 y 2 (f x y)}  (let x 1 y 2 (f x y))
//! *[1 2]             `*` then `[1 2]`: a leading `*` is always its own token
//! "text"             one atom holding the quoted source, escapes \" \\ \n \t \r
//! ; comment          to end of line
//! ```
//!
//! With [`ParseConfig::infix`] set, brackets group binary operators instead:
//! `[a + b - c]` reads as `(- (+ a b) c)` and list literals are written
//! `[[a b c]]`. A nested group directly at the start of a group needs a
//! space (`[ [a + b] * c]`) so it is not read as a list literal.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, multispace1, not_line_ending},
    combinator::{cut, map, recognize, value},
    error::ErrorKind,
    multi::many0,
    sequence::{pair, preceded},
};

use crate::ast::{Expr, apply, atom};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Characters that end an atom
const DELIMITERS: &str = "()[]{};\"";

/// Reader options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseConfig {
    /// Read `[a OP b OP c]` as left-associative binary applications
    pub infix: bool,
}

type ParseResult<'a, T> = IResult<&'a str, T>;

fn failure(input: &str, code: ErrorKind) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Failure(nom::error::Error::new(input, code))
}

/// Convert nom parsing errors to user-friendly messages
fn to_parse_error(input: &str, error: nom::Err<nom::error::Error<&str>>) -> ParseError {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = input.len().saturating_sub(e.input.len());
            let at_end = e.input.trim_start().is_empty();
            let (kind, message) = match e.code {
                ErrorKind::TooLarge => (
                    ParseErrorKind::TooDeeplyNested,
                    format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                ),
                ErrorKind::Verify => (
                    ParseErrorKind::InvalidSyntax,
                    format!("Empty application `()` at position {position}"),
                ),
                ErrorKind::NonEmpty => (
                    ParseErrorKind::InvalidSyntax,
                    format!("Empty `{{}}` at position {position} has no final expression"),
                ),
                ErrorKind::Count => (
                    ParseErrorKind::InvalidSyntax,
                    format!(
                        "Infix group at position {position} needs operands separated by operators"
                    ),
                ),
                ErrorKind::Escaped => (
                    ParseErrorKind::InvalidSyntax,
                    format!("Invalid escape sequence at position {position}"),
                ),
                ErrorKind::Eof => (
                    ParseErrorKind::Incomplete,
                    format!("Unterminated string starting at position {position}"),
                ),
                _ if at_end => (
                    ParseErrorKind::Incomplete,
                    "Unexpected end of input".to_owned(),
                ),
                ErrorKind::Char | ErrorKind::Tag => (
                    ParseErrorKind::InvalidSyntax,
                    format!("Unexpected token at position {position}"),
                ),
                _ => {
                    let near: String = e.input.chars().take(10).collect();
                    (
                        ParseErrorKind::InvalidSyntax,
                        format!("Invalid syntax near '{near}'"),
                    )
                }
            };
            ParseError::with_context(kind, message, input, position)
        }
        nom::Err::Incomplete(_) => {
            ParseError::from_message(ParseErrorKind::Incomplete, "Incomplete input")
        }
    }
}

/// Whitespace and `;` comments
fn ws(input: &str) -> ParseResult<'_, ()> {
    value(
        (),
        many0(alt((
            multispace1,
            recognize(pair(char(';'), not_line_ending)),
        ))),
    )
    .parse(input)
}

fn parse_atom(input: &str) -> ParseResult<'_, Expr> {
    map(
        take_while1(|c: char| !c.is_whitespace() && !DELIMITERS.contains(c)),
        atom,
    )
    .parse(input)
}

fn parse_splat(input: &str) -> ParseResult<'_, Expr> {
    map(char('*'), |_| atom("*")).parse(input)
}

/// A string literal, kept as the raw quoted source
fn parse_string(input: &str) -> ParseResult<'_, Expr> {
    let (mut remaining, _) = char('"').parse(input)?;
    loop {
        let mut chars = remaining.chars();
        match chars.next() {
            Some('"') => {
                let rest = chars.as_str();
                let raw = &input[..input.len() - rest.len()];
                return Ok((rest, atom(raw)));
            }
            Some('\\') => match chars.next() {
                Some('"' | '\\' | 'n' | 't' | 'r') => remaining = chars.as_str(),
                Some(_) => return Err(failure(remaining, ErrorKind::Escaped)),
                None => return Err(failure(input, ErrorKind::Eof)),
            },
            Some(_) => remaining = chars.as_str(),
            None => return Err(failure(input, ErrorKind::Eof)),
        }
    }
}

fn parse_elements<'a>(
    input: &'a str,
    config: &ParseConfig,
    depth: usize,
) -> ParseResult<'a, Vec<Expr>> {
    many0(|i| parse_form(i, config, depth + 1)).parse(input)
}

fn list_literal(elements: Vec<Expr>) -> Expr {
    if elements.is_empty() {
        atom("[]")
    } else {
        apply(atom("list"), elements)
    }
}

fn parse_application<'a>(
    input: &'a str,
    config: &ParseConfig,
    depth: usize,
) -> ParseResult<'a, Expr> {
    let start = input;
    let (input, _) = char('(').parse(input)?;
    let (input, mut elements) = parse_elements(input, config, depth)?;
    let (input, _) = cut(preceded(ws, char(')'))).parse(input)?;

    match elements.len() {
        0 => Err(failure(start, ErrorKind::Verify)),
        1 => Ok((input, elements.remove(0))),
        _ => {
            let command = elements.remove(0);
            Ok((input, apply(command, elements)))
        }
    }
}

fn parse_brace<'a>(input: &'a str, config: &ParseConfig, depth: usize) -> ParseResult<'a, Expr> {
    let start = input;
    let (input, _) = char('{').parse(input)?;
    let (input, elements) = parse_elements(input, config, depth)?;
    let (input, _) = cut(preceded(ws, char('}'))).parse(input)?;

    if elements.is_empty() {
        return Err(failure(start, ErrorKind::NonEmpty));
    }
    Ok((input, apply(atom("let"), elements)))
}

fn parse_bracket<'a>(
    input: &'a str,
    config: &ParseConfig,
    depth: usize,
) -> ParseResult<'a, Expr> {
    let start = input;
    if config.infix {
        if let Ok((input, _)) = tag::<_, _, nom::error::Error<&str>>("[[").parse(input) {
            let (input, elements) = parse_elements(input, config, depth)?;
            let (input, _) = cut(preceded(ws, tag("]]"))).parse(input)?;
            return Ok((input, list_literal(elements)));
        }
        let (input, _) = char('[').parse(input)?;
        let (input, elements) = parse_elements(input, config, depth)?;
        let (input, _) = cut(preceded(ws, char(']'))).parse(input)?;
        let expr = infix_group(elements).ok_or_else(|| failure(start, ErrorKind::Count))?;
        return Ok((input, expr));
    }

    let (input, _) = char('[').parse(input)?;
    let (input, elements) = parse_elements(input, config, depth)?;
    let (input, _) = cut(preceded(ws, char(']'))).parse(input)?;
    Ok((input, list_literal(elements)))
}

/// `a OP b OP c` to `((a OP b) OP c)`; `None` for an even element count.
fn infix_group(elements: Vec<Expr>) -> Option<Expr> {
    if elements.len().is_multiple_of(2) {
        return None;
    }
    let mut iter = elements.into_iter();
    let mut acc = iter.next()?;
    while let (Some(op), Some(rhs)) = (iter.next(), iter.next()) {
        acc = apply(op, vec![acc, rhs]);
    }
    Some(acc)
}

fn parse_form<'a>(input: &'a str, config: &ParseConfig, depth: usize) -> ParseResult<'a, Expr> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(failure(input, ErrorKind::TooLarge));
    }
    preceded(
        ws,
        alt((
            |i| parse_application(i, config, depth),
            |i| parse_bracket(i, config, depth),
            |i| parse_brace(i, config, depth),
            parse_string,
            parse_splat,
            parse_atom,
        )),
    )
    .parse(input)
}

/// Parse exactly one form.
pub fn parse(input: &str) -> Result<Expr, Error> {
    parse_with_config(input, &ParseConfig::default())
}

pub fn parse_with_config(input: &str, config: &ParseConfig) -> Result<Expr, Error> {
    let (rest, expr) = parse_form(input, config, 0).map_err(|e| to_parse_error(input, e))?;
    let (rest, ()) = ws(rest).map_err(|e| to_parse_error(input, e))?;
    if !rest.is_empty() {
        let position = input.len() - rest.len();
        return Err(ParseError::with_context(
            ParseErrorKind::TrailingContent,
            format!("Unexpected remaining input at position {position}"),
            input,
            position,
        )
        .into());
    }
    Ok(expr)
}

/// Parse a sequence of top-level forms.
pub fn parse_program(input: &str) -> Result<Vec<Expr>, Error> {
    parse_program_with_config(input, &ParseConfig::default())
}

pub fn parse_program_with_config(input: &str, config: &ParseConfig) -> Result<Vec<Expr>, Error> {
    let mut forms = Vec::new();
    let mut rest = input;
    loop {
        let (after_ws, ()) = ws(rest).map_err(|e| to_parse_error(input, e))?;
        if after_ws.is_empty() {
            return Ok(forms);
        }
        let (after_form, expr) =
            parse_form(after_ws, config, 0).map_err(|e| to_parse_error(input, e))?;
        forms.push(expr);
        rest = after_form;
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Expected parse outcome, compared through the expression's textual form
    #[derive(Debug)]
    enum ParseTestResult {
        Success(&'static str),
        SpecificError(ParseErrorKind, &'static str),
    }
    use ParseTestResult::*;

    fn run_parse_tests(config: &ParseConfig, cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in cases.into_iter().enumerate() {
            match (parse_with_config(input, config), expected) {
                (Ok(expr), Success(printed)) => {
                    assert_eq!(expr.to_string(), printed, "case #{}: '{input}'", i + 1);
                }
                (Err(Error::ParseError(err)), SpecificError(kind, fragment)) => {
                    assert_eq!(err.kind, kind, "case #{}: '{input}' gave {err}", i + 1);
                    assert!(
                        err.message.contains(fragment),
                        "case #{}: '{input}': '{}' lacks '{fragment}'",
                        i + 1,
                        err.message
                    );
                }
                (actual, expected) => {
                    panic!("case #{}: '{input}': expected {expected:?}, got {actual:?}", i + 1)
                }
            }
        }
    }

    #[test]
    fn test_parser_data_driven() {
        use ParseErrorKind::*;
        let cases = vec![
            // Atoms
            ("42", Success("42")),
            ("  -7  ", Success("-7")),
            ("foo-bar?", Success("foo-bar?")),
            ("a*b", Success("a*b")),
            ("_", Success("_")),
            ("\"hi there\"", Success("\"hi there\"")),
            ("\"a\\\"b\"", Success("\"a\\\"b\"")),
            // Applications
            ("(add 1 2)", Success("(add 1 2)")),
            ("(f (g x) y)", Success("(f (g x) y)")),
            ("(x)", Success("x")),
            ("((f))", Success("f")),
            ("((f 1) 2)", Success("((f 1) 2)")),
            ("(add\n  1 ; one\n  2)", Success("(add 1 2)")),
            ("; leading\n(f x) ; trailing", Success("(f x)")),
            // Brackets and braces
            ("[1 2 3]", Success("(list 1 2 3)")),
            ("[]", Success("[]")),
            ("[[1] []]", Success("(list (list 1) [])")),
            ("{x 1 (f x)}", Success("(let x 1 (f x))")),
            ("{7}", Success("(let 7)")),
            // Splat
            ("(add *[1 2] 3)", Success("(add * (list 1 2) 3)")),
            ("(add * *[[2 3]] 4)", Success("(add * * (list (list 2 3)) 4)")),
            ("(f *xs)", Success("(f * xs)")),
            ("(f **xs)", Success("(f * * xs)")),
            // Errors
            ("", SpecificError(Incomplete, "Unexpected end of input")),
            ("   ; only a comment", SpecificError(Incomplete, "Unexpected end of input")),
            ("()", SpecificError(InvalidSyntax, "Empty application")),
            ("(f ())", SpecificError(InvalidSyntax, "Empty application")),
            ("{}", SpecificError(InvalidSyntax, "no final expression")),
            ("(add 1", SpecificError(Incomplete, "Unexpected end of input")),
            ("[1 2", SpecificError(Incomplete, "Unexpected end of input")),
            ("(add 1]", SpecificError(InvalidSyntax, "Unexpected token")),
            (")", SpecificError(InvalidSyntax, "Invalid syntax near ')'")),
            ("\"open", SpecificError(Incomplete, "Unterminated string")),
            ("(f \"open)", SpecificError(Incomplete, "Unterminated string")),
            ("\"bad \\q\"", SpecificError(InvalidSyntax, "Invalid escape")),
            ("1 2", SpecificError(TrailingContent, "Unexpected remaining input")),
            ("(f x))", SpecificError(TrailingContent, "Unexpected remaining input")),
        ];
        run_parse_tests(&ParseConfig::default(), cases);
    }

    #[test]
    fn test_infix_mode() {
        use ParseErrorKind::*;
        let infix = ParseConfig { infix: true };
        let cases = vec![
            ("[1 add 2]", Success("(add 1 2)")),
            ("[a add b sub c]", Success("(sub (add a b) c)")),
            ("[x]", Success("x")),
            ("[ [a mul b] add c]", Success("(add (mul a b) c)")),
            ("[[1 2 3]]", Success("(list 1 2 3)")),
            ("[[]]", Success("[]")),
            ("(f [[1 [2 add 3]]])", Success("(f (list 1 (add 2 3)))")),
            ("[a add]", SpecificError(InvalidSyntax, "needs operands")),
            ("[]", SpecificError(InvalidSyntax, "needs operands")),
            ("[[1 2]", SpecificError(Incomplete, "Unexpected end of input")),
        ];
        run_parse_tests(&infix, cases);
    }

    #[test]
    fn test_depth_limit() {
        let ok = format!("{}x{}", "(f ".repeat(MAX_PARSE_DEPTH - 2), ")".repeat(MAX_PARSE_DEPTH - 2));
        assert!(parse(&ok).is_ok());

        let deep = format!("{}x{}", "(f ".repeat(MAX_PARSE_DEPTH + 5), ")".repeat(MAX_PARSE_DEPTH + 5));
        match parse(&deep) {
            Err(Error::ParseError(err)) => assert_eq!(err.kind, ParseErrorKind::TooDeeplyNested),
            other => panic!("expected depth error, got {other:?}"),
        }

        let brackets = format!("{}{}", "[".repeat(MAX_PARSE_DEPTH + 1), "]".repeat(MAX_PARSE_DEPTH + 1));
        assert!(matches!(
            parse(&brackets),
            Err(Error::ParseError(ParseError {
                kind: ParseErrorKind::TooDeeplyNested,
                ..
            }))
        ));
    }

    #[test]
    fn test_parse_program() {
        let forms = parse_program("(f 1) ; first\n[2 3]\n\n x ").unwrap();
        let printed: Vec<String> = forms.iter().map(ToString::to_string).collect();
        assert_eq!(printed, vec!["(f 1)", "(list 2 3)", "x"]);

        assert_eq!(parse_program("  ; nothing\n").unwrap(), vec![]);
        assert!(parse_program("(f 1) (g").is_err());
    }

    #[test]
    fn test_error_context_snippet() {
        let err = match parse("(add 1 2) trailing") {
            Err(Error::ParseError(err)) => err,
            other => panic!("expected parse error, got {other:?}"),
        };
        assert!(err.context.unwrap().contains("trailing"));
    }

    #[test]
    fn test_error_context_with_multibyte_input() {
        let input = format!("(f {} x) )", "é".repeat(30));
        let context = match parse(&input) {
            Err(Error::ParseError(err)) => err.context.unwrap(),
            other => panic!("expected parse error, got {other:?}"),
        };
        assert!(context.starts_with("[...]"), "{context}");
        assert!(context.ends_with("éé x) )"), "{context}");

        let long = format!("{}) {}", "ü".repeat(10), "ß".repeat(200));
        let context = ParseError::with_context(
            ParseErrorKind::TrailingContent,
            "",
            &long,
            "ü".repeat(10).len(),
        )
        .context
        .unwrap();
        assert!(context.starts_with("üüüüüüüüüü)"), "{context}");
        assert!(context.ends_with("ß[...]"), "{context}");
    }

    #[test]
    fn test_printed_expression_reads_back() {
        for input in ["(f (g 1 -2) [] \"s\\n\" _ *)", "((f x) (y z))", "(let x 1 (add x x))"] {
            let expr = parse(input).unwrap();
            assert_eq!(parse(&expr.to_string()).unwrap(), expr, "{input}");
        }
    }
}
