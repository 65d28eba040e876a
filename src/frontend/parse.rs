//! Recursive-descent parser for the grammar definition language, and the
//! checker/compiler that turns its AST into a `RuleDict<String>` built
//! entirely out of the core combinators.
//!
//! Concrete syntax, for reference (mirrors the sketch in this crate's
//! design notes):
//!
//! ```text
//! %tokens
//! NAME = "regex"
//! ...
//! %start
//! <rule-name> ...
//!
//! <rule-name> ::= <alt> ("|" <alt>)*
//! <alt>       ::= <part>+
//! <part>      ::= <atom> <modifier>?
//! <atom>      ::= "literal" | CAPS_NAME | <rule-name>
//! <modifier>  ::= "?" | "*" | "+" | "&*" "{" <atom> "}" | "&+" "{" <atom> "}"
//! ```

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::combinators::{list, nonempty_list, nonempty_sep_list, optional, sep_list};
use crate::error::{GrammarError, Position};
use crate::frontend::tokenize::{tokenize, Token};
use crate::grammar::{alt, pat, ref_, seq, tok, Grammar, RuleDict};

#[derive(Debug, Clone)]
enum Atom {
  Literal(String),
  TokenRef(String),
  RuleRef(String),
}

#[derive(Debug, Clone)]
enum Modifier {
  None,
  Optional,
  Star,
  Plus,
  SepStar(Atom),
  SepPlus(Atom),
}

#[derive(Debug, Clone)]
struct Part {
  atom: Atom,
  modifier: Modifier,
}

struct RawRule {
  name: String,
  at: Position,
  alts: Vec<Vec<Part>>,
}

struct Document {
  tokens: Vec<(String, String, Position)>,
  starts: Vec<(String, Position)>,
  rules: Vec<RawRule>,
}

struct Parser {
  toks: Vec<(Token, Position)>,
  pos: usize,
}

impl Parser {
  fn peek(&self) -> Option<&Token> {
    self.toks.get(self.pos).map(|(t, _)| t)
  }

  fn at(&self) -> Position {
    self
      .toks
      .get(self.pos)
      .map(|(_, p)| p.clone())
      .unwrap_or(Position { line: 0, column: 0 })
  }

  fn bump(&mut self) -> Option<(Token, Position)> {
    let t = self.toks.get(self.pos).cloned();
    if t.is_some() {
      self.pos += 1;
    }
    t
  }

  fn expect_arrow(&mut self) -> Result<(), GrammarError> {
    match self.bump() {
      Some((Token::Arrow, _)) => Ok(()),
      Some((t, at)) => Err(unexpected(&t, at)),
      None => Err(GrammarError::UnexpectedToken {
        at: self.at(),
        found: "<end of input>".into(),
      }),
    }
  }

  fn parse_document(&mut self) -> Result<Document, GrammarError> {
    let mut tokens = Vec::new();
    let mut starts = Vec::new();
    let mut rules = Vec::new();

    while let Some(tok) = self.peek().cloned() {
      match tok {
        Token::Directive(d) if d == "tokens" => {
          self.bump();
          while let Some(Token::CapsName(name)) = self.peek().cloned() {
            let at = self.at();
            self.bump();
            match self.bump() {
              Some((Token::Eq, _)) => {}
              Some((t, at)) => return Err(unexpected(&t, at)),
              None => return Err(GrammarError::UnexpectedToken { at, found: "<end of input>".into() }),
            }
            match self.bump() {
              Some((Token::String(pattern), _)) => tokens.push((name, pattern, at)),
              Some((t, at)) => return Err(unexpected(&t, at)),
              None => return Err(GrammarError::UnexpectedToken { at, found: "<end of input>".into() }),
            }
          }
        }
        Token::Directive(d) if d == "start" => {
          self.bump();
          while let Some(Token::NameRef(name)) = self.peek().cloned() {
            let at = self.at();
            self.bump();
            starts.push((name, at));
          }
        }
        Token::Directive(d) => {
          return Err(GrammarError::UnexpectedToken {
            at: self.at(),
            found: format!("%{d}"),
          })
        }
        Token::NameRef(name) => {
          let at = self.at();
          self.bump();
          self.expect_arrow()?;
          let alts = self.parse_alts()?;
          rules.push(RawRule { name, at, alts });
        }
        other => return Err(unexpected(&other, self.at())),
      }
    }

    Ok(Document { tokens, starts, rules })
  }

  fn parse_alts(&mut self) -> Result<Vec<Vec<Part>>, GrammarError> {
    let mut alts = vec![self.parse_alt()?];
    while matches!(self.peek(), Some(Token::Pipe)) {
      self.bump();
      alts.push(self.parse_alt()?);
    }
    Ok(alts)
  }

  fn parse_alt(&mut self) -> Result<Vec<Part>, GrammarError> {
    let mut parts = vec![self.parse_part()?];
    while self.starts_part() && !self.at_rule_head() {
      parts.push(self.parse_part()?);
    }
    Ok(parts)
  }

  fn starts_part(&self) -> bool {
    matches!(
      self.peek(),
      Some(Token::String(_)) | Some(Token::CapsName(_)) | Some(Token::NameRef(_))
    )
  }

  /// `<name>` immediately followed by `::=` is the next rule's head, not a
  /// continuation of the alternative currently being parsed — the grammar
  /// definition language has no other way to mark where one rule's body
  /// ends, since whitespace (including newlines) carries no meaning.
  fn at_rule_head(&self) -> bool {
    matches!(self.peek(), Some(Token::NameRef(_)))
      && matches!(self.toks.get(self.pos + 1).map(|(t, _)| t), Some(Token::Arrow))
  }

  fn parse_atom(&mut self) -> Result<Atom, GrammarError> {
    match self.bump() {
      Some((Token::String(s), _)) => Ok(Atom::Literal(s)),
      Some((Token::CapsName(s), _)) => Ok(Atom::TokenRef(s)),
      Some((Token::NameRef(s), _)) => Ok(Atom::RuleRef(s)),
      Some((t, at)) => Err(unexpected(&t, at)),
      None => Err(GrammarError::UnexpectedToken {
        at: self.at(),
        found: "<end of input>".into(),
      }),
    }
  }

  fn parse_part(&mut self) -> Result<Part, GrammarError> {
    let atom = self.parse_atom()?;
    let modifier = match self.peek() {
      Some(Token::Question) => {
        self.bump();
        Modifier::Optional
      }
      Some(Token::Star) => {
        self.bump();
        Modifier::Star
      }
      Some(Token::Plus) => {
        self.bump();
        Modifier::Plus
      }
      Some(Token::AmpStar) => {
        self.bump();
        self.expect_lbrace()?;
        let sep = self.parse_atom()?;
        self.expect_rbrace()?;
        Modifier::SepStar(sep)
      }
      Some(Token::AmpPlus) => {
        self.bump();
        self.expect_lbrace()?;
        let sep = self.parse_atom()?;
        self.expect_rbrace()?;
        Modifier::SepPlus(sep)
      }
      _ => Modifier::None,
    };
    Ok(Part { atom, modifier })
  }

  fn expect_lbrace(&mut self) -> Result<(), GrammarError> {
    match self.bump() {
      Some((Token::LBrace, _)) => Ok(()),
      Some((t, at)) => Err(unexpected(&t, at)),
      None => Err(GrammarError::UnexpectedToken {
        at: self.at(),
        found: "<end of input>".into(),
      }),
    }
  }

  fn expect_rbrace(&mut self) -> Result<(), GrammarError> {
    match self.bump() {
      Some((Token::RBrace, _)) => Ok(()),
      Some((t, at)) => Err(unexpected(&t, at)),
      None => Err(GrammarError::UnexpectedToken {
        at: self.at(),
        found: "<end of input>".into(),
      }),
    }
  }
}

fn unexpected(t: &Token, at: Position) -> GrammarError {
  GrammarError::UnexpectedToken {
    at,
    found: format!("{t:?}"),
  }
}

/// The result of loading a grammar definition: a rule table plus the names
/// the top-level grammar should union together.
pub struct LoadedGrammar {
  pub dict: RuleDict<String>,
  pub starts: Vec<String>,
}

impl LoadedGrammar {
  /// `alt(starts.map(|s| ref_(s, dict)))`, per this crate's fixed
  /// frontend/core contract.
  pub fn top(&self) -> Grammar<String> {
    alt(self.starts.iter().map(|s| ref_(s.clone(), self.dict.clone())))
  }
}

pub fn load_grammar(src: &str) -> Result<LoadedGrammar, GrammarError> {
  let toks = tokenize(src)?;
  let mut parser = Parser { toks, pos: 0 };
  let doc = parser.parse_document()?;
  trace!(
    rules = doc.rules.len(),
    tokens = doc.tokens.len(),
    starts = doc.starts.len(),
    "parse_document: done"
  );
  check(&doc)?;
  Ok(compile(doc))
}

fn check(doc: &Document) -> Result<(), GrammarError> {
  if doc.rules.is_empty() {
    return Err(GrammarError::EmptyGrammar);
  }
  if doc.starts.is_empty() {
    return Err(GrammarError::NoStartSymbol);
  }

  let mut seen_rules = HashSet::new();
  for rule in &doc.rules {
    if !seen_rules.insert(rule.name.clone()) {
      return Err(GrammarError::DuplicateRule {
        name: rule.name.clone(),
        at: rule.at.clone(),
      });
    }
  }

  let mut seen_tokens = HashSet::new();
  for (name, _, at) in &doc.tokens {
    if !seen_tokens.insert(name.clone()) {
      return Err(GrammarError::DuplicateToken {
        name: name.clone(),
        at: at.clone(),
      });
    }
  }

  for (name, at) in &doc.starts {
    if !seen_rules.contains(name) {
      return Err(GrammarError::UndefinedRule {
        name: name.clone(),
        at: at.clone(),
      });
    }
  }

  for rule in &doc.rules {
    for alt in &rule.alts {
      for part in alt {
        check_atom(&part.atom, &seen_rules, &seen_tokens, &rule.at)?;
        match &part.modifier {
          Modifier::SepStar(sep) | Modifier::SepPlus(sep) => {
            check_atom(sep, &seen_rules, &seen_tokens, &rule.at)?
          }
          _ => {}
        }
      }
    }
  }

  Ok(())
}

fn check_atom(
  atom: &Atom,
  rules: &HashSet<String>,
  tokens: &HashSet<String>,
  at: &Position,
) -> Result<(), GrammarError> {
  match atom {
    Atom::Literal(_) => Ok(()),
    Atom::RuleRef(name) => {
      if rules.contains(name) {
        Ok(())
      } else {
        Err(GrammarError::UndefinedRule {
          name: name.clone(),
          at: at.clone(),
        })
      }
    }
    Atom::TokenRef(name) => {
      if tokens.contains(name) {
        Ok(())
      } else {
        Err(GrammarError::UndefinedToken {
          name: name.clone(),
          at: at.clone(),
        })
      }
    }
  }
}

fn compile(doc: Document) -> LoadedGrammar {
  let dict: RuleDict<String> = RuleDict::new();
  let token_patterns: HashMap<String, String> = doc
    .tokens
    .into_iter()
    .map(|(name, pattern, _)| (name, pattern))
    .collect();

  for rule in &doc.rules {
    let alts = rule
      .alts
      .iter()
      .map(|parts| compile_alt(parts, &dict, &token_patterns))
      .collect::<Vec<_>>();
    dict.insert(rule.name.clone(), alt(alts));
  }

  let starts = doc.starts.into_iter().map(|(name, _)| name).collect();
  LoadedGrammar { dict, starts }
}

fn compile_atom(atom: &Atom, dict: &RuleDict<String>, tokens: &HashMap<String, String>) -> Grammar<String> {
  match atom {
    Atom::Literal(s) => tok(s.clone()),
    Atom::TokenRef(name) => pat(&tokens[name]),
    Atom::RuleRef(name) => ref_(name.clone(), dict.clone()),
  }
}

fn compile_part(part: &Part, dict: &RuleDict<String>, tokens: &HashMap<String, String>) -> Grammar<String> {
  let base = compile_atom(&part.atom, dict, tokens);
  match &part.modifier {
    Modifier::None => base,
    Modifier::Optional => optional(base),
    Modifier::Star => list(base),
    Modifier::Plus => nonempty_list(base),
    Modifier::SepStar(sep) => sep_list(compile_atom(sep, dict, tokens), base),
    Modifier::SepPlus(sep) => nonempty_sep_list(compile_atom(sep, dict, tokens), base),
  }
}

fn compile_alt(parts: &[Part], dict: &RuleDict<String>, tokens: &HashMap<String, String>) -> Grammar<String> {
  seq(parts.iter().map(|p| compile_part(p, dict, tokens)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::engine::Engine;

  const ARITHMETIC: &str = r#"
%tokens
NUM = "[0-9]+"
%start
<expr>

<expr> ::= <expr> "+" <term> | <term>
<term> ::= NUM
"#;

  #[test]
  fn loads_and_parses_arithmetic() {
    let loaded = load_grammar(ARITHMETIC).unwrap();
    let g = loaded.top();
    let e = Engine::new();
    let input: Vec<String> = "1 + 2 + 3".split(' ').map(String::from).collect();
    assert_eq!(e.parse_compact(&input, &g).len(), 1);
  }

  #[test]
  fn rejects_undefined_rule_reference() {
    let src = "%start\n<expr>\n\n<expr> ::= <missing>\n";
    assert!(matches!(
      load_grammar(src),
      Err(GrammarError::UndefinedRule { .. })
    ));
  }

  #[test]
  fn rejects_grammar_with_no_start() {
    let src = "<expr> ::= \"a\"\n";
    assert!(matches!(load_grammar(src), Err(GrammarError::NoStartSymbol)));
  }

  #[test]
  fn modifiers_compile_to_combinators() {
    let src = r#"
%start
<list>

<list> ::= "a" &*{","}
"#;
    let loaded = load_grammar(src).unwrap();
    let g = loaded.top();
    let e = Engine::new();
    let empty: Vec<String> = vec![];
    assert_eq!(e.parse_compact(&empty, &g).len(), 1);
    let three: Vec<String> = "a , a , a".split(' ').map(String::from).collect();
    assert_eq!(e.parse_compact(&three, &g).len(), 1);
  }
}
