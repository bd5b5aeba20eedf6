//! Static expression analysis.
//!
//! Grammar:
//!
//! ```text
//! expr    := call | ident | literal
//! call    := ident '(' [ expr { ',' expr } ] ')'
//! literal := string | number
//! ```
//!
//! Identifiers are `[A-Za-z_][A-Za-z0-9_]*`. Strings are double-quoted
//! with `\"`, `\\`, `\n`, `\t` escapes. Numbers are decimal with an
//! optional sign and fraction. Parsing never evaluates anything.

use cairn_pipeline::Expr;

/// A parse failure with its byte offset in the source expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParseError {
  pub position: usize,
  pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
  Ident(String),
  Str(String),
  Num(f64),
  LParen,
  RParen,
  Comma,
}

/// Parse a defining expression into its AST.
pub(crate) fn parse(input: &str) -> Result<Expr, ParseError> {
  let tokens = lex(input)?;
  let mut parser = Parser { tokens, pos: 0 };
  let expr = parser.expr()?;
  if let Some((_, position)) = parser.peek() {
    return Err(ParseError {
      position,
      message: "unexpected trailing input".to_string(),
    });
  }
  Ok(expr)
}

fn lex(input: &str) -> Result<Vec<(Token, usize)>, ParseError> {
  let bytes = input.as_bytes();
  let mut tokens = Vec::new();
  let mut i = 0;

  while i < bytes.len() {
    let start = i;
    match bytes[i] {
      b' ' | b'\t' | b'\r' | b'\n' => i += 1,
      b'(' => {
        tokens.push((Token::LParen, start));
        i += 1;
      }
      b')' => {
        tokens.push((Token::RParen, start));
        i += 1;
      }
      b',' => {
        tokens.push((Token::Comma, start));
        i += 1;
      }
      b'"' => {
        i += 1;
        let mut s = String::new();
        loop {
          if i >= bytes.len() {
            return Err(ParseError {
              position: start,
              message: "unterminated string literal".to_string(),
            });
          }
          match bytes[i] {
            b'"' => {
              i += 1;
              break;
            }
            b'\\' => {
              i += 1;
              let escape = bytes.get(i).copied().ok_or_else(|| ParseError {
                position: start,
                message: "unterminated string literal".to_string(),
              })?;
              match escape {
                b'"' => s.push('"'),
                b'\\' => s.push('\\'),
                b'n' => s.push('\n'),
                b't' => s.push('\t'),
                other => {
                  return Err(ParseError {
                    position: i,
                    message: format!("unknown escape '\\{}'", other as char),
                  });
                }
              }
              i += 1;
            }
            _ => {
              // Multi-byte UTF-8 sequences pass through untouched.
              let ch_len = utf8_len(bytes[i]);
              s.push_str(&input[i..i + ch_len]);
              i += ch_len;
            }
          }
        }
        tokens.push((Token::Str(s), start));
      }
      b'0'..=b'9' | b'-' => {
        i += 1;
        if bytes[start] == b'-' && !bytes.get(i).is_some_and(|b| b.is_ascii_digit()) {
          return Err(ParseError {
            position: start,
            message: "expected digits after '-'".to_string(),
          });
        }
        while bytes.get(i).is_some_and(|b| b.is_ascii_digit()) {
          i += 1;
        }
        if bytes.get(i) == Some(&b'.') {
          i += 1;
          if !bytes.get(i).is_some_and(|b| b.is_ascii_digit()) {
            return Err(ParseError {
              position: start,
              message: "expected digits after '.'".to_string(),
            });
          }
          while bytes.get(i).is_some_and(|b| b.is_ascii_digit()) {
            i += 1;
          }
        }
        let text = &input[start..i];
        let value: f64 = text.parse().map_err(|_| ParseError {
          position: start,
          message: format!("invalid number '{}'", text),
        })?;
        tokens.push((Token::Num(value), start));
      }
      b'A'..=b'Z' | b'a'..=b'z' | b'_' => {
        i += 1;
        while bytes
          .get(i)
          .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
        {
          i += 1;
        }
        tokens.push((Token::Ident(input[start..i].to_string()), start));
      }
      other => {
        return Err(ParseError {
          position: start,
          message: format!("unexpected character '{}'", other as char),
        });
      }
    }
  }

  Ok(tokens)
}

fn utf8_len(first_byte: u8) -> usize {
  match first_byte {
    b if b < 0x80 => 1,
    b if b < 0xE0 => 2,
    b if b < 0xF0 => 3,
    _ => 4,
  }
}

struct Parser {
  tokens: Vec<(Token, usize)>,
  pos: usize,
}

impl Parser {
  fn peek(&self) -> Option<(&Token, usize)> {
    self.tokens.get(self.pos).map(|(t, p)| (t, *p))
  }

  fn next(&mut self) -> Option<(Token, usize)> {
    let token = self.tokens.get(self.pos).cloned();
    if token.is_some() {
      self.pos += 1;
    }
    token
  }

  fn expr(&mut self) -> Result<Expr, ParseError> {
    let (token, position) = self.next().ok_or_else(|| ParseError {
      position: 0,
      message: "empty expression".to_string(),
    })?;

    match token {
      Token::Str(s) => Ok(Expr::Str(s)),
      Token::Num(n) => Ok(Expr::Num(n)),
      Token::Ident(name) => {
        if matches!(self.peek(), Some((Token::LParen, _))) {
          self.pos += 1;
          let args = self.args()?;
          Ok(Expr::Call {
            function: name,
            args,
          })
        } else {
          Ok(Expr::Ref(name))
        }
      }
      Token::LParen | Token::RParen | Token::Comma => Err(ParseError {
        position,
        message: "expected identifier or literal".to_string(),
      }),
    }
  }

  /// Parse a comma-separated argument list; the opening paren is consumed.
  fn args(&mut self) -> Result<Vec<Expr>, ParseError> {
    let mut args = Vec::new();

    if matches!(self.peek(), Some((Token::RParen, _))) {
      self.pos += 1;
      return Ok(args);
    }

    loop {
      args.push(self.expr()?);
      match self.next() {
        Some((Token::Comma, _)) => continue,
        Some((Token::RParen, _)) => return Ok(args),
        Some((_, position)) => {
          return Err(ParseError {
            position,
            message: "expected ',' or ')'".to_string(),
          });
        }
        None => {
          return Err(ParseError {
            position: self.tokens.last().map(|(_, p)| *p).unwrap_or(0),
            message: "unclosed argument list".to_string(),
          });
        }
      }
    }
  }
}
