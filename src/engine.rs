//! The stateful engine: fixed-point analyses, the token derivative, grammar
//! compaction, and the two parse drivers built on top of them.
//!
//! An `Engine` owns every memo table and fixed-point cache its methods use.
//! Caches persist across any number of `parse`/`parse_compact` calls made
//! against grammars sharing the same rule dictionaries — that's what makes
//! repeated parses against one grammar fast — until `clear_caches` is
//! called.

use tracing::{debug, trace};

use crate::eq::{identity_key, GrammarId};
use crate::fixpoint::FixPoint;
use crate::grammar::{apply_reduce, eps, red, resolve, seq, Grammar, ReduceFn, TokenValue, View};
use crate::memo::Memo;
use crate::tree::Tree;

pub struct Engine<V: TokenValue> {
  is_empty_fix: FixPoint<bool>,
  is_nullable_fix: FixPoint<bool>,
  is_null_fix: FixPoint<bool>,
  parse_null_fix: FixPoint<Vec<Tree<V>>>,
  derive_memo: Memo<(GrammarId, V), V>,
  compact_memo: Memo<GrammarId, V>,
}

impl<V: TokenValue> Default for Engine<V> {
  fn default() -> Self {
    Engine {
      is_empty_fix: FixPoint::new(false),
      is_nullable_fix: FixPoint::new(true),
      is_null_fix: FixPoint::new(true),
      parse_null_fix: FixPoint::new(Vec::new()),
      derive_memo: Memo::new(),
      compact_memo: Memo::new(),
    }
  }
}

impl<V: TokenValue> Engine<V> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Drop every cached analysis/derivative/compaction result. The grammar
  /// graphs themselves are untouched; only the engine's memory of them is.
  pub fn clear_caches(&self) {
    self.is_empty_fix.clear();
    self.is_nullable_fix.clear();
    self.is_null_fix.clear();
    self.parse_null_fix.clear();
    self.derive_memo.clear();
    self.compact_memo.clear();
  }

  // --- analyses ---------------------------------------------------------

  pub fn is_empty(&self, g: &Grammar<V>) -> bool {
    let g = resolve(g);
    self.is_empty_fix.call(&g, |g| self.is_empty_body(g))
  }

  fn is_empty_body(&self, g: &Grammar<V>) -> bool {
    match g.view() {
      View::Nil => true,
      View::Eps(_) | View::Tok(_) | View::Pat(_) | View::Rep(_) => false,
      View::Alt(a, b) => self.is_empty(a) && self.is_empty(b),
      View::Seq(a, b) => self.is_empty(a) || self.is_empty(b),
      View::Red(g, _) => self.is_empty(g),
      View::Ref(n, d) => self.is_empty(&d.resolve_ref(n)),
      View::PendingForward => unreachable!("is_empty saw an unresolved placeholder"),
    }
  }

  pub fn is_nullable(&self, g: &Grammar<V>) -> bool {
    let g = resolve(g);
    self.is_nullable_fix.call(&g, |g| self.is_nullable_body(g))
  }

  fn is_nullable_body(&self, g: &Grammar<V>) -> bool {
    match g.view() {
      View::Nil | View::Tok(_) | View::Pat(_) => false,
      View::Eps(_) | View::Rep(_) => true,
      View::Alt(a, b) => self.is_nullable(a) || self.is_nullable(b),
      View::Seq(a, b) => self.is_nullable(a) && self.is_nullable(b),
      View::Red(g, _) => self.is_nullable(g),
      View::Ref(n, d) => self.is_nullable(&d.resolve_ref(n)),
      View::PendingForward => unreachable!("is_nullable saw an unresolved placeholder"),
    }
  }

  /// True iff this grammar recognizes exactly `{ε}`. Used only by
  /// `make_compact`; unlike `is_nullable`, a `Red` node defers to
  /// `is_nullable` of its child rather than `is_null`, matching the
  /// asymmetric rule inherited from the algorithm this engine implements
  /// (see `DESIGN.md`).
  pub fn is_null(&self, g: &Grammar<V>) -> bool {
    let g = resolve(g);
    self.is_null_fix.call(&g, |g| self.is_null_body(g))
  }

  fn is_null_body(&self, g: &Grammar<V>) -> bool {
    match g.view() {
      View::Nil | View::Tok(_) | View::Pat(_) => false,
      View::Eps(_) => true,
      View::Rep(g) => self.is_empty(g),
      View::Alt(a, b) => self.is_null(a) && self.is_null(b),
      View::Seq(a, b) => self.is_null(a) && self.is_null(b),
      View::Red(g, _) => self.is_nullable(g),
      View::Ref(n, d) => self.is_null(&d.resolve_ref(n)),
      View::PendingForward => unreachable!("is_null saw an unresolved placeholder"),
    }
  }

  pub fn parse_null(&self, g: &Grammar<V>) -> Vec<Tree<V>> {
    let g = resolve(g);
    self.parse_null_fix.call(&g, |g| self.parse_null_body(g))
  }

  fn parse_null_body(&self, g: &Grammar<V>) -> Vec<Tree<V>> {
    match g.view() {
      View::Nil | View::Tok(_) | View::Pat(_) => vec![],
      View::Eps(ts) => ts.to_vec(),
      View::Rep(_) => vec![Tree::Empty],
      View::Alt(a, b) => {
        let mut ts = self.parse_null(a);
        ts.extend(self.parse_null(b));
        ts
      }
      View::Seq(a, b) => {
        let left = self.parse_null(a);
        let right = self.parse_null(b);
        let mut out = Vec::with_capacity(left.len() * right.len());
        for t1 in &left {
          for t2 in &right {
            out.push(Tree::branch(t1.clone(), t2.clone()));
          }
        }
        out
      }
      View::Red(g, f) => self
        .parse_null(g)
        .into_iter()
        .map(|t| apply_reduce(f, t))
        .collect(),
      View::Ref(n, d) => self.parse_null(&d.resolve_ref(n)),
      View::PendingForward => unreachable!("parse_null saw an unresolved placeholder"),
    }
  }

  /// The unique tree a grammar recognizing exactly `{ε}` parses to, if
  /// `g` really does recognize only `{ε}`.
  fn null_witness(&self, g: &Grammar<V>) -> Option<Tree<V>> {
    if !self.is_null(g) {
      return None;
    }
    let ts = self.parse_null(g);
    match ts.as_slice() {
      [t] => Some(t.clone()),
      _ => None,
    }
  }

  // --- derivative ---------------------------------------------------------

  /// `derive(g, c)`: the grammar recognizing `{ w | c·w ∈ L(g) }`.
  pub fn derive(&self, g: &Grammar<V>, c: &V) -> Grammar<V> {
    let g = resolve(g);
    let key = (identity_key(&g), c.clone());
    let (placeholder, is_new) = self.derive_memo.get_or_insert_placeholder(key);
    if !is_new {
      trace!(token = %c, "derive: cache hit");
      return placeholder;
    }
    trace!(token = %c, "derive: computing");
    let result = self.derive_body(&g, c);
    self.derive_memo.fill(&placeholder, result);
    resolve(&placeholder)
  }

  fn derive_body(&self, g: &Grammar<V>, c: &V) -> Grammar<V> {
    match g.view() {
      View::Nil => crate::grammar::nil(),
      View::Eps(_) => crate::grammar::nil(),
      View::Tok(t) => {
        if t == c {
          eps(vec![Tree::Leaf(c.clone())])
        } else {
          crate::grammar::nil()
        }
      }
      View::Pat(re) => {
        if re.is_match(&c.to_string()) {
          eps(vec![Tree::Leaf(c.clone())])
        } else {
          crate::grammar::nil()
        }
      }
      View::Rep(inner) => seq([self.derive(inner, c), crate::grammar::rep(inner.clone())]),
      View::Alt(a, b) => crate::grammar::alt([self.derive(a, c), self.derive(b, c)]),
      View::Seq(a, b) => {
        let da_b = seq([self.derive(a, c), b.clone()]);
        if self.is_nullable(a) {
          let skip = seq([eps(self.parse_null(a)), self.derive(b, c)]);
          crate::grammar::alt([da_b, skip])
        } else {
          da_b
        }
      }
      View::Red(inner, f) => {
        let f = f.clone();
        red(self.derive(inner, c), move |t| apply_reduce(&f, t))
      }
      View::Ref(n, d) => self.derive(&d.resolve_ref(n), c),
      View::PendingForward => unreachable!("derive saw an unresolved placeholder"),
    }
  }

  // --- compaction ---------------------------------------------------------

  /// `make_compact(g)`: an algebraically simplified grammar with the same
  /// language and a parse forest in bijection (modulo applied `Red`
  /// functions) with `g`'s.
  pub fn make_compact(&self, g: &Grammar<V>) -> Grammar<V> {
    let g = resolve(g);
    let key = identity_key(&g);
    let (placeholder, is_new) = self.compact_memo.get_or_insert_placeholder(key);
    if !is_new {
      trace!("make_compact: cache hit");
      return resolve(&placeholder);
    }
    trace!("make_compact: computing");
    let result = self.make_compact_body(&g);
    self.compact_memo.fill(&placeholder, result);
    resolve(&placeholder)
  }

  fn make_compact_body(&self, g: &Grammar<V>) -> Grammar<V> {
    match g.view() {
      View::Nil | View::Eps(_) => g.clone(),
      View::Tok(_) | View::Pat(_) => {
        if self.is_empty(g) {
          crate::grammar::nil()
        } else {
          g.clone()
        }
      }
      View::Rep(inner) => {
        if self.is_empty(inner) {
          eps(vec![Tree::Empty])
        } else {
          crate::grammar::rep(self.make_compact(inner))
        }
      }
      View::Alt(a, b) => {
        if self.is_empty(a) {
          self.make_compact(b)
        } else if self.is_empty(b) {
          self.make_compact(a)
        } else {
          crate::grammar::alt([self.make_compact(a), self.make_compact(b)])
        }
      }
      View::Seq(a, b) => {
        if self.is_empty(a) || self.is_empty(b) {
          crate::grammar::nil()
        } else if let Some(witness) = self.null_witness(a) {
          let mc_b = self.make_compact(b);
          red(mc_b, move |w| Tree::branch(witness.clone(), w))
        } else if let Some(witness) = self.null_witness(b) {
          let mc_a = self.make_compact(a);
          red(mc_a, move |w| Tree::branch(w, witness.clone()))
        } else {
          seq([self.make_compact(a), self.make_compact(b)])
        }
      }
      View::Red(inner, f) => self.compact_red(inner, f.clone()),
      View::Ref(n, d) => self.make_compact(&d.resolve_ref(n)),
      View::PendingForward => unreachable!("make_compact saw an unresolved placeholder"),
    }
  }

  fn compact_red(&self, inner: &Grammar<V>, f: ReduceFn<V>) -> Grammar<V> {
    match inner.view() {
      View::Eps(ts) => eps(
        ts.iter()
          .cloned()
          .map(|t| apply_reduce(&f, t))
          .collect(),
      ),
      View::Seq(a, b) => {
        if let Some(witness) = self.null_witness(a) {
          let mc_b = self.make_compact(b);
          let f = f.clone();
          return red(mc_b, move |w| apply_reduce(&f, Tree::branch(witness.clone(), w)));
        }
        let f = f.clone();
        red(self.make_compact(inner), move |t| apply_reduce(&f, t))
      }
      View::Red(inner2, g) => {
        let g = g.clone();
        let f = f.clone();
        red(self.make_compact(inner2), move |t| {
          apply_reduce(&f, apply_reduce(&g, t))
        })
      }
      _ => {
        let f = f.clone();
        red(self.make_compact(inner), move |t| apply_reduce(&f, t))
      }
    }
  }

  // --- parse drivers --------------------------------------------------------

  /// Folds `tokens` through raw derivatives, then reads off the parse
  /// trees recognized at the end. Kept for debugging and for the CLI's
  /// `--chart` trace mode, which wants the uncompacted residual grammar at
  /// each step; `parse_compact` is what actually terminates in practice on
  /// recursive grammars.
  pub fn parse(&self, tokens: &[V], g: &Grammar<V>) -> Vec<Tree<V>> {
    let mut current = g.clone();
    for c in tokens {
      current = self.derive(&current, c);
    }
    self.parse_null(&current)
  }

  /// Like `parse`, but compacts the residual grammar after every token.
  pub fn parse_compact(&self, tokens: &[V], g: &Grammar<V>) -> Vec<Tree<V>> {
    let mut current = self.make_compact(g);
    for (i, c) in tokens.iter().enumerate() {
      current = self.make_compact(&self.derive(&current, c));
      debug!(step = i, token = %c, "parse_compact: advanced");
    }
    self.parse_null(&current)
  }

  /// The sequence of residual grammars `parse_compact` would visit,
  /// starting with `g` itself — used by the CLI's chart-trace mode.
  pub fn trace_compact(&self, tokens: &[V], g: &Grammar<V>) -> Vec<Grammar<V>> {
    let mut steps = Vec::with_capacity(tokens.len() + 1);
    let mut current = self.make_compact(g);
    steps.push(current.clone());
    for c in tokens {
      current = self.make_compact(&self.derive(&current, c));
      steps.push(current.clone());
    }
    steps
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grammar::{alt, ref_, seq, tok, RuleDict};

  fn digit() -> Grammar<char> {
    alt(('0'..='9').map(tok))
  }

  #[test]
  fn single_token_parses() {
    let e = Engine::new();
    let g = tok('a');
    assert_eq!(e.parse(&['a'], &g).len(), 1);
    assert_eq!(e.parse(&['b'], &g).len(), 0);
    assert_eq!(e.parse(&[], &g).len(), 0);
  }

  #[test]
  fn concatenation_consumes_in_order() {
    let e = Engine::new();
    let g = seq([tok('a'), tok('b')]);
    assert_eq!(e.parse(&['a', 'b'], &g).len(), 1);
    assert_eq!(e.parse(&['b', 'a'], &g).len(), 0);
  }

  #[test]
  fn left_recursive_grammar_terminates_and_is_ambiguous() {
    let e = Engine::new();
    let dict = RuleDict::new();
    // s ::= s s | 'a'
    dict.insert("s", alt([seq([ref_("s", dict.clone()), ref_("s", dict.clone())]), tok('a')]));
    let s = ref_("s", dict);

    assert_eq!(e.parse_compact(&['a'], &s).len(), 1);
    assert_eq!(e.parse_compact(&['a', 'a'], &s).len(), 1);
    assert_eq!(e.parse_compact(&['a', 'a', 'a'], &s).len(), 2);
  }

  #[test]
  fn arithmetic_left_recursion_terminates() {
    let e = Engine::new();
    let dict = RuleDict::new();
    // expr ::= expr '+' term | term
    // term ::= digit
    dict.insert(
      "expr",
      alt([
        seq([ref_("expr", dict.clone()), tok('+'), ref_("term", dict.clone())]),
        ref_("term", dict.clone()),
      ]),
    );
    dict.insert("term", digit());
    let expr = ref_("expr", dict);

    assert_eq!(e.parse_compact(&['1'], &expr).len(), 1);
    assert_eq!(e.parse_compact(&['1', '+', '2'], &expr).len(), 1);
    assert_eq!(e.parse_compact(&['1', '+', '2', '+', '3'], &expr).len(), 1);
  }

  #[test]
  fn make_compact_shrinks_an_empty_language_to_nil() {
    let e = Engine::new();
    // is_empty is a least fixed point from `false`, so a directly
    // recursive "never produces anything" rule never converges to empty;
    // this is a non-recursive empty language instead.
    let g: Grammar<char> = alt([crate::grammar::nil(), seq([crate::grammar::nil(), tok('a')])]);
    assert!(e.is_empty(&g));
    let compacted = e.make_compact(&g);
    assert!(matches!(compacted.view(), View::Nil));
    assert_eq!(e.parse_compact(&['a'], &g).len(), 0);
  }

  #[test]
  fn repetition_matches_any_count_including_zero() {
    let e = Engine::new();
    let g = crate::grammar::rep(tok('a'));
    assert_eq!(e.parse_compact(&[], &g).len(), 1);
    assert_eq!(e.parse_compact(&['a', 'a', 'a'], &g).len(), 1);
    assert_eq!(e.parse_compact(&['a', 'b'], &g).len(), 0);
  }

  #[test]
  fn reduction_transforms_trees_without_changing_the_language() {
    let e = Engine::new();
    // swaps the two digits' positions in the tree without touching which
    // strings the grammar accepts.
    let g = red(seq([digit(), digit()]), |t| match t {
      Tree::Branch(a, b) => Tree::Branch(b, a),
      other => other,
    });
    assert_eq!(e.parse_compact(&['1', '2'], &g).len(), 1);
    let trees = e.parse_compact(&['1', '2'], &g);
    assert_eq!(trees[0], Tree::branch(Tree::Leaf('2'), Tree::Leaf('1')));
  }

  #[test]
  fn clear_caches_does_not_change_results() {
    let e = Engine::new();
    let g = seq([tok('a'), tok('b')]);
    assert_eq!(e.parse_compact(&['a', 'b'], &g).len(), 1);
    e.clear_caches();
    assert_eq!(e.parse_compact(&['a', 'b'], &g).len(), 1);
  }
}
