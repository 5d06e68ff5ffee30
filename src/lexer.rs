//! Two-phase lexer: a preprocess pass strips `//` and `/* */`
//! comments while leaving string and char literals untouched, then a
//! single tokenize pass walks the cleaned text with ordered dispatch:
//!
//! 1. whitespace
//! 2. string / char literals (escapes decoded here)
//! 3. numbers (hex, decimal, scientific; Integer vs Real classified
//!    by shape)
//! 4. the greedy longest-match operator table
//! 5. identifiers (`@` first-byte marks a native-call name)
//! 6. any remaining punctuation byte
//!
//! Anything else is a [`LexError::UnknownChar`].

use nom::{
    IResult, Parser,
    bytes::complete::{take_while, take_while1},
    character::complete::satisfy,
    combinator::recognize,
    sequence::pair,
};

use crate::LexError;

/// Token classification. Numeric tokens carry their parsed payload;
/// all tokens keep their lexeme (decoded content for `Str`/`Char`).
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Integer(i64),
    Real(f64),
    /// `=`, the compound assignments, and `++`/`--`.
    Assignment,
    Operator,
    Identifier,
    Str,
    Char,
    Punctuation,
}

/// One lexical unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
}

impl Token {
    pub fn is_punct(&self, lexeme: &str) -> bool {
        self.kind == TokenKind::Punctuation && self.lexeme == lexeme
    }

    pub fn is_operator(&self, lexeme: &str) -> bool {
        self.kind == TokenKind::Operator && self.lexeme == lexeme
    }

    pub fn is_assignment(&self, lexeme: &str) -> bool {
        self.kind == TokenKind::Assignment && self.lexeme == lexeme
    }

    pub fn is_identifier(&self, lexeme: &str) -> bool {
        self.kind == TokenKind::Identifier && self.lexeme == lexeme
    }
}

/// Operator table, longest match first. The bool marks
/// assignment-like forms (including `++`/`--`).
const OPERATORS: &[(&str, bool)] = &[
    (">>=", true),
    ("<<=", true),
    ("+=", true),
    ("-=", true),
    ("*=", true),
    ("/=", true),
    ("%=", true),
    ("&=", true),
    ("|=", true),
    ("^=", true),
    ("++", true),
    ("--", true),
    ("<=>", false),
    ("...", false),
    ("->*", false),
    ("->", false),
    ("==", false),
    ("!=", false),
    ("<=", false),
    (">=", false),
    ("&&", false),
    ("||", false),
    ("<<", false),
    (">>", false),
    (".*", false),
    ("::", false),
    ("..", false),
    ("=", true),
    ("+", false),
    ("-", false),
    ("*", false),
    ("/", false),
    ("<", false),
    (">", false),
    ("&", false),
    ("|", false),
    ("^", false),
    ("%", false),
    ("!", false),
];

/// Strip line and block comments, preserving string and char literals
/// verbatim (their escapes are decoded later, in tokenize).
pub fn preprocess(input: &str) -> Result<String, LexError> {
    enum State {
        Normal,
        Str,
        Char,
        LineComment,
        BlockComment,
    }

    let mut output = String::with_capacity(input.len());
    let mut state = State::Normal;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Normal => {
                if c == '/' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::LineComment;
                } else if c == '/' && chars.peek() == Some(&'*') {
                    chars.next();
                    state = State::BlockComment;
                } else {
                    if c == '"' {
                        state = State::Str;
                    } else if c == '\'' {
                        state = State::Char;
                    }
                    output.push(c);
                }
            }
            State::LineComment => {
                if c == '\n' {
                    state = State::Normal;
                    output.push(c);
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Normal;
                }
            }
            State::Str | State::Char => {
                output.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        output.push(escaped);
                    }
                } else if (matches!(state, State::Str) && c == '"')
                    || (matches!(state, State::Char) && c == '\'')
                {
                    state = State::Normal;
                }
            }
        }
    }

    if matches!(state, State::BlockComment) {
        return Err(LexError::UnclosedComment);
    }
    Ok(output)
}

fn decode_escape(c: char) -> Result<char, LexError> {
    match c {
        'n' => Ok('\n'),
        't' => Ok('\t'),
        'r' => Ok('\r'),
        '0' => Ok('\0'),
        '\'' => Ok('\''),
        '"' => Ok('"'),
        '\\' => Ok('\\'),
        other => Err(LexError::InvalidEscape(other)),
    }
}

/// Consume a quoted literal starting after the opening quote; returns
/// the decoded content and the remaining input.
fn scan_quoted(input: &str, quote: char) -> Result<(String, &str), LexError> {
    let mut content = String::new();
    let mut chars = input.char_indices();

    while let Some((i, c)) = chars.next() {
        if c == quote {
            return Ok((content, &input[i + c.len_utf8()..]));
        }
        if c == '\\' {
            match chars.next() {
                Some((_, escaped)) => content.push(decode_escape(escaped)?),
                None => return Err(LexError::UnclosedLiteral),
            }
        } else {
            content.push(c);
        }
    }
    Err(LexError::UnclosedLiteral)
}

fn digits1(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_digit()).parse(input)
}

fn hex_digits1(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_hexdigit()).parse(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_' || c == '@'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))
    .parse(input)
}

/// Scan one numeric lexeme. Returns the token and the remaining
/// input. A `.` not followed by a digit terminates the scan without
/// being consumed, so range-like uses (`1..n`) lex cleanly.
fn scan_number(input: &str) -> Result<(Token, &str), LexError> {
    // hexadecimal integer
    if input.starts_with("0x") || input.starts_with("0X") {
        let body = &input[2..];
        let (rest, digits) =
            hex_digits1(body).map_err(|_| LexError::InvalidNumber(input[..2].to_owned()))?;
        let lexeme = &input[..2 + digits.len()];
        let value = i64::from_str_radix(digits, 16)
            .map_err(|_| LexError::InvalidNumber(lexeme.to_owned()))?;
        return Ok((
            Token {
                kind: TokenKind::Integer(value),
                lexeme: lexeme.to_owned(),
            },
            rest,
        ));
    }

    let bytes = input.as_bytes();
    let mut end = 0;
    let mut has_dot = false;
    let mut has_exp = false;

    while end < bytes.len() {
        let c = bytes[end];
        if c.is_ascii_digit() {
            end += 1;
        } else if c == b'.' {
            // only a digit right after the dot keeps us in the number
            if end + 1 >= bytes.len() || !bytes[end + 1].is_ascii_digit() {
                break;
            }
            if has_dot || has_exp {
                return Err(LexError::InvalidNumber(input[..=end].to_owned()));
            }
            has_dot = true;
            end += 1;
        } else if c == b'e' || c == b'E' {
            if has_exp {
                return Err(LexError::InvalidNumber(input[..=end].to_owned()));
            }
            let mut probe = end + 1;
            if probe < bytes.len() && (bytes[probe] == b'+' || bytes[probe] == b'-') {
                probe += 1;
            }
            if probe >= bytes.len() || !bytes[probe].is_ascii_digit() {
                return Err(LexError::InvalidNumber(input[..end + 1].to_owned()));
            }
            has_exp = true;
            end = probe;
        } else {
            break;
        }
    }

    let lexeme = &input[..end];
    let kind = if has_dot || has_exp {
        let value: f64 = lexeme
            .parse()
            .map_err(|_| LexError::InvalidNumber(lexeme.to_owned()))?;
        TokenKind::Real(value)
    } else {
        let value: i64 = lexeme
            .parse()
            .map_err(|_| LexError::InvalidNumber(lexeme.to_owned()))?;
        TokenKind::Integer(value)
    };

    Ok((
        Token {
            kind,
            lexeme: lexeme.to_owned(),
        },
        &input[end..],
    ))
}

/// Tokenize a source string into a finite token sequence.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let processed = preprocess(source)?;
    let mut rest = processed.as_str();
    let mut tokens = Vec::new();

    'outer: while let Some(c) = rest.chars().next() {
        if c.is_whitespace() {
            rest = &rest[c.len_utf8()..];
            continue;
        }

        // string and char literals
        if c == '"' || c == '\'' {
            let (content, after) = scan_quoted(&rest[1..], c)?;
            if c == '"' {
                tokens.push(Token {
                    kind: TokenKind::Str,
                    lexeme: content,
                });
            } else {
                // a char literal holds exactly one byte
                let mut bytes = content.bytes();
                match (bytes.next(), bytes.next()) {
                    (Some(b), None) if b.is_ascii() => tokens.push(Token {
                        kind: TokenKind::Char,
                        lexeme: (b as char).to_string(),
                    }),
                    _ => return Err(LexError::UnclosedLiteral),
                }
            }
            rest = after;
            continue;
        }

        // numbers: leading digit, or a dot directly followed by one
        let starts_number = c.is_ascii_digit()
            || (c == '.' && rest.as_bytes().get(1).is_some_and(u8::is_ascii_digit));
        if starts_number {
            let (token, after) = scan_number(rest)?;
            tokens.push(token);
            rest = after;
            continue;
        }

        // greedy longest-match operator table
        for (op, is_assignment) in OPERATORS {
            if let Some(after) = rest.strip_prefix(op) {
                tokens.push(Token {
                    kind: if *is_assignment {
                        TokenKind::Assignment
                    } else {
                        TokenKind::Operator
                    },
                    lexeme: (*op).to_owned(),
                });
                rest = after;
                continue 'outer;
            }
        }

        // identifiers (with optional @ prefix for native calls)
        if let Ok((after, name)) = identifier(rest) {
            tokens.push(Token {
                kind: TokenKind::Identifier,
                lexeme: name.to_owned(),
            });
            rest = after;
            continue;
        }

        // remaining single punctuation byte
        if c.is_ascii_punctuation() {
            tokens.push(Token {
                kind: TokenKind::Punctuation,
                lexeme: c.to_string(),
            });
            rest = &rest[1..];
            continue;
        }

        return Err(LexError::UnknownChar(c));
    }

    Ok(tokens)
}
