//! Parsing with derivatives: build a grammar out of the algebra in
//! [`grammar`], then fold a token sequence through [`Engine::derive`] (or
//! [`Engine::parse_compact`], which also keeps the residual grammar
//! shrunk via [`Engine::make_compact`]) to recognize it and recover parse
//! trees.

pub mod combinators;
pub mod engine;
pub mod eq;
pub mod error;
pub mod fixpoint;
pub mod frontend;
pub mod grammar;
pub mod memo;
pub mod tree;

pub use engine::Engine;
pub use error::GrammarError;
pub use frontend::{load_grammar, LoadedGrammar};
pub use grammar::{alt, eps, nil, pat, red, ref_, rep, seq, tok, Grammar, RuleDict, TokenValue};
pub use tree::Tree;

pub type Err = Box<dyn std::error::Error + 'static>;

#[cfg(test)]
mod tests {
  use super::*;
  use crate::combinators::{list, optional};

  // S1: arithmetic, single digit.
  #[test]
  fn scenario_single_digit_arithmetic() {
    let src = r#"
%tokens
NUM = "[0-9]+"
%start
<expr>

<expr> ::= <expr> "+" <term> | <term>
<term> ::= NUM
"#;
    let loaded = load_grammar(src).unwrap();
    let engine = Engine::new();
    let g = loaded.top();

    let input: Vec<String> = vec!["5".to_string()];
    let trees = engine.parse_compact(&input, &g);
    assert_eq!(trees.len(), 1);
  }

  // S2: left recursion terminates and both parses (not a crash/hang).
  #[test]
  fn scenario_left_recursion_terminates() {
    let src = r#"
%tokens
NUM = "[0-9]+"
%start
<expr>

<expr> ::= <expr> "+" <expr> | NUM
"#;
    let loaded = load_grammar(src).unwrap();
    let engine = Engine::new();
    let g = loaded.top();

    let input: Vec<String> = "1 + 2 + 3".split(' ').map(String::from).collect();
    let trees = engine.parse_compact(&input, &g);
    // left- and right-associative groupings of two `+`s: genuinely ambiguous.
    assert_eq!(trees.len(), 2);
  }

  // S3: ambiguity, s ::= s s | 'a'.
  #[test]
  fn scenario_ambiguous_self_concatenation() {
    let dict: RuleDict<String> = RuleDict::new();
    dict.insert(
      "s",
      alt([
        seq([ref_("s", dict.clone()), ref_("s", dict.clone())]),
        tok("a".to_string()),
      ]),
    );
    let s = ref_("s", dict);
    let engine = Engine::new();

    let one: Vec<String> = vec!["a".into()];
    let three: Vec<String> = vec!["a".into(), "a".into(), "a".into()];
    assert_eq!(engine.parse_compact(&one, &s).len(), 1);
    // "aaa" parses as (a (a a)) or ((a a) a): two distinct bracketings.
    assert_eq!(engine.parse_compact(&three, &s).len(), 2);
  }

  // S4: Kleene star.
  #[test]
  fn scenario_kleene_star_matches_any_run_length() {
    let g = list(tok("a".to_string()));
    let engine = Engine::new();

    let empty: Vec<String> = vec![];
    let five: Vec<String> = vec!["a".into(); 5];
    assert_eq!(engine.parse_compact(&empty, &g).len(), 1);
    assert_eq!(engine.parse_compact(&five, &g).len(), 1);
  }

  // S5: empty language, verified via make_compact collapsing to Nil.
  #[test]
  fn scenario_empty_language_compacts_away() {
    // nil() | (nil() "x") recognizes no strings, without going through a
    // self-referential rule (is_empty is a least fixed point from `false`,
    // so a directly recursive "black hole" rule never actually proves
    // itself empty).
    let g: Grammar<String> = alt([nil(), seq([nil(), tok("x".to_string())])]);
    let engine = Engine::new();

    assert!(engine.is_empty(&g));
    let compacted = engine.make_compact(&g);
    assert!(matches!(compacted.view(), crate::grammar::View::Nil));
  }

  // S6: reduction.
  #[test]
  fn scenario_reduction_relabels_parse_trees() {
    let g = red(optional(tok("a".to_string())), |t| match t {
      Tree::Empty => Tree::Leaf("none".to_string()),
      other => other,
    });
    let engine = Engine::new();

    let empty: Vec<String> = vec![];
    let trees = engine.parse_compact(&empty, &g);
    assert_eq!(trees, vec![Tree::Leaf("none".to_string())]);
  }

  #[test]
  fn caches_persist_across_repeated_parses_until_cleared() {
    let engine = Engine::new();
    let g = seq([tok('a'), tok('b')]);
    assert_eq!(engine.parse_compact(&['a', 'b'], &g).len(), 1);
    assert_eq!(engine.parse_compact(&['a', 'b'], &g).len(), 1);
    engine.clear_caches();
    assert_eq!(engine.parse_compact(&['a', 'b'], &g).len(), 1);
  }
}
