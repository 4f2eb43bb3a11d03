//! Formula tokenizer.

use rust_decimal::Decimal;

use super::error::EvalError;

/// A lexical token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Number(Decimal),
    Str(String),
    Ident(String),
    None,
    True,
    False,
    And,
    Or,
    Not,
    If,
    Else,
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    Ne,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Eof,
}

/// A token with its byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

/// Splits `src` into tokens, ending with [`Token::Eof`].
pub fn tokenize(src: &str) -> Result<Vec<Spanned>, EvalError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        let start = pos;

        let token = if c.is_ascii_digit() || (c == b'.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) {
            let (number, end) = read_number(src, pos)?;
            pos = end;
            Token::Number(number)
        } else if c == b'_' || c.is_ascii_alphabetic() {
            while pos < bytes.len() && (bytes[pos] == b'_' || bytes[pos].is_ascii_alphanumeric()) {
                pos += 1;
            }
            keyword_or_ident(&src[start..pos])
        } else if c == b'\'' || c == b'"' {
            let (text, end) = read_string(src, pos)?;
            pos = end;
            Token::Str(text)
        } else {
            let next = bytes.get(pos + 1).copied();
            let (token, len) = match (c, next) {
                (b'*', Some(b'*')) => (Token::DoubleStar, 2),
                (b'/', Some(b'/')) => (Token::DoubleSlash, 2),
                (b'<', Some(b'=')) => (Token::Le, 2),
                (b'>', Some(b'=')) => (Token::Ge, 2),
                (b'=', Some(b'=')) => (Token::EqEq, 2),
                (b'!', Some(b'=')) => (Token::Ne, 2),
                (b'+', _) => (Token::Plus, 1),
                (b'-', _) => (Token::Minus, 1),
                (b'*', _) => (Token::Star, 1),
                (b'/', _) => (Token::Slash, 1),
                (b'%', _) => (Token::Percent, 1),
                (b'<', _) => (Token::Lt, 1),
                (b'>', _) => (Token::Gt, 1),
                (b'(', _) => (Token::LParen, 1),
                (b')', _) => (Token::RParen, 1),
                (b'[', _) => (Token::LBracket, 1),
                (b']', _) => (Token::RBracket, 1),
                (b',', _) => (Token::Comma, 1),
                (b'.', _) => (Token::Dot, 1),
                _ => {
                    let ch = src[pos..].chars().next().unwrap_or('?');
                    return Err(EvalError::syntax(pos, format!("unexpected character '{ch}'")));
                }
            };
            pos += len;
            token
        };
        tokens.push(Spanned { token, position: start });
    }

    tokens.push(Spanned {
        token: Token::Eof,
        position: src.len(),
    });
    Ok(tokens)
}

fn keyword_or_ident(word: &str) -> Token {
    match word {
        "None" => Token::None,
        "True" => Token::True,
        "False" => Token::False,
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "if" => Token::If,
        "else" => Token::Else,
        _ => Token::Ident(word.to_string()),
    }
}

fn read_number(src: &str, start: usize) -> Result<(Decimal, usize), EvalError> {
    let bytes = src.as_bytes();
    let mut pos = start;
    while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
        pos += 1;
    }
    let mantissa_end = pos;
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut exp = pos + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            while exp < bytes.len() && bytes[exp].is_ascii_digit() {
                exp += 1;
            }
            pos = exp;
        }
    }

    let text = &src[start..pos];
    let parsed = if pos == mantissa_end {
        text.parse::<Decimal>()
    } else {
        Decimal::from_scientific(text)
    };
    parsed
        .map(|n| (n, pos))
        .map_err(|e| EvalError::syntax(start, format!("invalid number '{text}': {e}")))
}

fn read_string(src: &str, start: usize) -> Result<(String, usize), EvalError> {
    let mut chars = src[start..].char_indices();
    let Some((_, quote)) = chars.next() else {
        return Err(EvalError::syntax(start, "expected string"));
    };
    let mut out = String::new();
    while let Some((offset, ch)) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, escaped)) => out.push(escaped),
                None => break,
            },
            c if c == quote => return Ok((out, start + offset + c.len_utf8())),
            c => out.push(c),
        }
    }
    Err(EvalError::syntax(start, "unterminated string"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_tokenizes_arithmetic() {
        assert_eq!(
            kinds("(-400) + a_1 * 2.5"),
            vec![
                Token::LParen,
                Token::Minus,
                Token::Number(dec!(400)),
                Token::RParen,
                Token::Plus,
                Token::Ident("a_1".into()),
                Token::Star,
                Token::Number(dec!(2.5)),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_reads_exponent_and_two_char_operators() {
        assert_eq!(
            kinds("1e3 ** 2 // x <= y != z"),
            vec![
                Token::Number(dec!(1000)),
                Token::DoubleStar,
                Token::Number(dec!(2)),
                Token::DoubleSlash,
                Token::Ident("x".into()),
                Token::Le,
                Token::Ident("y".into()),
                Token::Ne,
                Token::Ident("z".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_reads_strings_and_keywords() {
        assert_eq!(
            kinds(r#"'it\'s' if not None else "x""#),
            vec![
                Token::Str("it's".into()),
                Token::If,
                Token::Not,
                Token::None,
                Token::Else,
                Token::Str("x".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_rejects_stray_characters() {
        assert!(matches!(tokenize("a $ b"), Err(EvalError::Syntax { position: 2, .. })));
        assert!(matches!(tokenize("'open"), Err(EvalError::Syntax { .. })));
    }
}
