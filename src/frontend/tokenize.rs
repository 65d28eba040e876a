//! Lexer for the grammar definition language.
//!
//! Compiles each lexical class to a `lazy_static` anchored regex and
//! consumes the input left to right (`regex_static!` below is the same
//! trick the old feature-structure grammar reader used), rather than
//! hand-rolling a character-by-character state machine.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::trace;

use crate::error::{GrammarError, Position};

macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

regex_static!(WHITESPACE_OR_COMMENT, r"^(?:[ \t\r\n]+|#[^\n]*)+");
regex_static!(ARROW, r"^::=");
regex_static!(AMP_STAR, r"^&\*");
regex_static!(AMP_PLUS, r"^&\+");
regex_static!(NAME_REF, r"^<[A-Za-z_][A-Za-z0-9_-]*>");
regex_static!(CAPS_NAME, r"^[A-Z][A-Z0-9_]*");
regex_static!(DIRECTIVE, r"^%[a-z]+");
regex_static!(STRING, r#"^"(?:[^"\\]|\\.)*""#);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
  Directive(String),
  NameRef(String),
  CapsName(String),
  String(String),
  Arrow,
  Pipe,
  Eq,
  Question,
  Star,
  Plus,
  AmpStar,
  AmpPlus,
  LBrace,
  RBrace,
}

pub fn tokenize(src: &str) -> Result<Vec<(Token, Position)>, GrammarError> {
  let mut out = Vec::new();
  let mut rest = src;
  let mut line = 1usize;
  let mut col = 1usize;

  while !rest.is_empty() {
    if let Some(m) = WHITESPACE_OR_COMMENT.find(rest) {
      advance(&mut line, &mut col, m.as_str());
      rest = &rest[m.end()..];
      continue;
    }

    let at = Position { line, column: col };

    macro_rules! single {
      ($pat:expr, $tok:expr) => {
        if let Some(m) = $pat.find(rest) {
          let text = m.as_str();
          out.push(($tok, at.clone()));
          advance(&mut line, &mut col, text);
          rest = &rest[m.end()..];
          continue;
        }
      };
    }

    single!(ARROW, Token::Arrow);
    single!(AMP_STAR, Token::AmpStar);
    single!(AMP_PLUS, Token::AmpPlus);

    if let Some(m) = DIRECTIVE.find(rest) {
      let text = m.as_str().to_string();
      out.push((Token::Directive(text[1..].to_string()), at));
      advance(&mut line, &mut col, m.as_str());
      rest = &rest[m.end()..];
      continue;
    }

    if let Some(m) = NAME_REF.find(rest) {
      let text = m.as_str();
      let name = text[1..text.len() - 1].to_string();
      out.push((Token::NameRef(name), at));
      advance(&mut line, &mut col, text);
      rest = &rest[m.end()..];
      continue;
    }

    if let Some(m) = CAPS_NAME.find(rest) {
      let text = m.as_str();
      out.push((Token::CapsName(text.to_string()), at));
      advance(&mut line, &mut col, text);
      rest = &rest[m.end()..];
      continue;
    }

    if let Some(m) = STRING.find(rest) {
      let text = m.as_str();
      let inner = &text[1..text.len() - 1];
      out.push((Token::String(unescape(inner)), at));
      advance(&mut line, &mut col, text);
      rest = &rest[m.end()..];
      continue;
    }

    let mut chars = rest.chars();
    match chars.next() {
      Some('|') => {
        out.push((Token::Pipe, at));
        rest = &rest[1..];
        col += 1;
      }
      Some('=') => {
        out.push((Token::Eq, at));
        rest = &rest[1..];
        col += 1;
      }
      Some('?') => {
        out.push((Token::Question, at));
        rest = &rest[1..];
        col += 1;
      }
      Some('*') => {
        out.push((Token::Star, at));
        rest = &rest[1..];
        col += 1;
      }
      Some('+') => {
        out.push((Token::Plus, at));
        rest = &rest[1..];
        col += 1;
      }
      Some('{') => {
        out.push((Token::LBrace, at));
        rest = &rest[1..];
        col += 1;
      }
      Some('}') => {
        out.push((Token::RBrace, at));
        rest = &rest[1..];
        col += 1;
      }
      Some('"') => {
        return Err(GrammarError::UnterminatedString { at });
      }
      Some(c) => {
        return Err(GrammarError::UnexpectedToken {
          at,
          found: c.to_string(),
        });
      }
      None => unreachable!("loop guard checked rest.is_empty()"),
    }
  }

  trace!(tokens = out.len(), "tokenize: done");
  Ok(out)
}

fn advance(line: &mut usize, col: &mut usize, text: &str) {
  for c in text.chars() {
    if c == '\n' {
      *line += 1;
      *col = 1;
    } else {
      *col += 1;
    }
  }
}

fn unescape(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  let mut chars = s.chars();
  while let Some(c) = chars.next() {
    if c == '\\' {
      match chars.next() {
        Some('n') => out.push('\n'),
        Some('t') => out.push('\t'),
        Some(other) => out.push(other),
        None => {}
      }
    } else {
      out.push(c);
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tokenizes_a_simple_rule() {
    let toks = tokenize(r#"<expr> ::= <expr> "+" <term> | <term>"#).unwrap();
    let kinds: Vec<_> = toks.into_iter().map(|(t, _)| t).collect();
    assert_eq!(
      kinds,
      vec![
        Token::NameRef("expr".into()),
        Token::Arrow,
        Token::NameRef("expr".into()),
        Token::String("+".into()),
        Token::NameRef("term".into()),
        Token::Pipe,
        Token::NameRef("term".into()),
      ]
    );
  }

  #[test]
  fn tokenizes_directives_and_modifiers() {
    let toks = tokenize("%tokens\nNUM = \"[0-9]+\"\n%start\n<expr>").unwrap();
    let kinds: Vec<_> = toks.into_iter().map(|(t, _)| t).collect();
    assert_eq!(
      kinds[0..4],
      [
        Token::Directive("tokens".into()),
        Token::CapsName("NUM".into()),
        Token::Eq,
        Token::String("[0-9]+".into()),
      ]
    );
    assert_eq!(kinds[4], Token::Directive("start".into()));
    assert_eq!(kinds[5], Token::NameRef("expr".into()));
  }

  #[test]
  fn rejects_unterminated_string() {
    assert!(tokenize(r#""abc"#).is_err());
  }
}
