//! 占位符名称（点分路径）的词法校验。
//!
//! 合法形式：`a`、`a.b.c`、`$1`、`$2.name`、`ids.0`。`.` 两侧允许空白，
//! 结果按 token 拼接（`a . b` 规范化为 `a.b`）；`//` 与 `/* */` 注释会被忽略。

use std::iter::Peekable;
use std::str::CharIndices;

/// 标识符校验错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentError {
    #[error("; is not allowed in an identifier: {0}")]
    Semicolon(String),
    #[error("identifiers cannot be empty or end with a .: {0}")]
    EmptyOrTrailingPeriod(String),
    #[error(". missing between parts of an identifier: {0}")]
    MissingPeriod(String),
    #[error("identifier cannot start with . or have two . in a row: {0}")]
    LeadingOrDoublePeriod(String),
    #[error("invalid character found in identifier: {0}")]
    InvalidCharacter(String),
}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Ident(&'a str),
    Digits(&'a str),
    Dollar,
    Period,
    Illegal,
    Eof,
}

struct Lexer<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
        }
    }

    /// 跳过空白与注释；未闭合的块注释返回 false。
    fn skip_trivia(&mut self) -> bool {
        loop {
            match self.chars.peek() {
                Some(&(_, c)) if c.is_whitespace() => {
                    self.chars.next();
                }
                Some(&(i, '/')) => {
                    let src = self.src;
                    let rest = &src[i..];
                    if rest.starts_with("//") {
                        // 行注释吃到换行
                        while let Some(&(_, c)) = self.chars.peek() {
                            if c == '\n' {
                                break;
                            }
                            self.chars.next();
                        }
                    } else if rest.starts_with("/*") {
                        let Some(end) = rest[2..].find("*/") else {
                            return false;
                        };
                        let stop = i + 2 + end + 2;
                        while let Some(&(j, _)) = self.chars.peek() {
                            if j >= stop {
                                break;
                            }
                            self.chars.next();
                        }
                    } else {
                        return true;
                    }
                }
                _ => return true,
            }
        }
    }

    fn take_while(&mut self, start: usize, f: impl Fn(char) -> bool) -> &'a str {
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if !f(c) {
                break;
            }
            end = i + c.len_utf8();
            self.chars.next();
        }
        let src = self.src;
        &src[start..end]
    }

    fn next_token(&mut self) -> Token<'a> {
        if !self.skip_trivia() {
            return Token::Illegal;
        }
        let Some(&(i, c)) = self.chars.peek() else {
            return Token::Eof;
        };
        if c == '.' {
            self.chars.next();
            Token::Period
        } else if c == '$' {
            self.chars.next();
            Token::Dollar
        } else if c.is_ascii_digit() {
            Token::Digits(self.take_while(i, |c| c.is_ascii_digit()))
        } else if c == '_' || c.is_alphabetic() {
            Token::Ident(self.take_while(i, |c| c == '_' || c.is_alphanumeric()))
        } else {
            Token::Illegal
        }
    }
}

/// 校验占位符内的名称并返回规范化后的路径。
///
/// `$N` 只能出现在首段；数字段只能出现在 `.` 之后，用于下标访问。
pub fn validate_identifier(raw: &str) -> Result<String, IdentError> {
    if raw.contains(';') {
        return Err(IdentError::Semicolon(raw.to_string()));
    }
    let mut lexer = Lexer::new(raw);
    let mut out = String::with_capacity(raw.len());
    let mut first = true;
    let mut last_period = false;
    loop {
        match lexer.next_token() {
            Token::Eof => {
                if first || last_period {
                    return Err(IdentError::EmptyOrTrailingPeriod(raw.to_string()));
                }
                break;
            }
            Token::Ident(s) => {
                if !first && !last_period {
                    return Err(IdentError::MissingPeriod(raw.to_string()));
                }
                out.push_str(s);
                first = false;
                last_period = false;
            }
            Token::Digits(s) => {
                if !last_period {
                    return Err(IdentError::InvalidCharacter(raw.to_string()));
                }
                out.push_str(s);
                last_period = false;
            }
            Token::Dollar => {
                if !first {
                    return Err(IdentError::InvalidCharacter(raw.to_string()));
                }
                let Token::Digits(n) = lexer.next_token() else {
                    return Err(IdentError::InvalidCharacter(raw.to_string()));
                };
                out.push('$');
                out.push_str(n);
                first = false;
            }
            Token::Period => {
                if first || last_period {
                    return Err(IdentError::LeadingOrDoublePeriod(raw.to_string()));
                }
                out.push('.');
                last_period = true;
            }
            Token::Illegal => return Err(IdentError::InvalidCharacter(raw.to_string())),
        }
    }
    tracing::trace!(raw, normalized = %out, "identifier.validated");
    Ok(out)
}
