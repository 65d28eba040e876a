//! The grammar algebra: the nine public node variants, their smart
//! constructors, and the `Ref`/`RuleDict` recursion knot.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use regex::Regex;

use crate::tree::Tree;

/// Bound required of the token domain: grammars need to compare, hash,
/// clone, and (for `Pat` nodes) print their tokens.
pub trait TokenValue: Clone + Eq + Hash + fmt::Debug + fmt::Display + 'static {}
impl<T: Clone + Eq + Hash + fmt::Debug + fmt::Display + 'static> TokenValue for T {}

pub(crate) type ReduceFn<V> = Rc<dyn Fn(Tree<V>) -> Tree<V>>;

/// Apply a shared reduction function. A small wrapper because calling
/// through an `Rc<dyn Fn>` directly isn't supported by the call operator;
/// going through a `&dyn Fn` (which does implement `Fn`) is.
pub(crate) fn apply_reduce<V>(f: &ReduceFn<V>, t: Tree<V>) -> Tree<V> {
  (f.as_ref())(t)
}

enum GrammarNode<V> {
  Nil,
  Eps(Vec<Tree<V>>),
  Tok(V),
  Pat(Regex),
  Rep(Grammar<V>),
  Alt(Grammar<V>, Grammar<V>),
  Seq(Grammar<V>, Grammar<V>),
  Red(Grammar<V>, ReduceFn<V>),
  Ref(String, RuleDict<V>),
  /// Not part of the public algebra: a back-patchable cell a memoizer
  /// allocates before recursing into its own computation, so a
  /// self-referential (e.g. left-recursive) rule has something with a
  /// stable identity to point back to. Filled in once that computation
  /// returns. See `derive`/`make_compact` in `engine.rs`.
  Forward(RefCell<Option<Grammar<V>>>),
}

/// A handle to a grammar node. Cloning is `O(1)`: it just bumps a refcount.
pub struct Grammar<V>(Rc<GrammarNode<V>>);

impl<V> Clone for Grammar<V> {
  fn clone(&self) -> Self {
    Grammar(Rc::clone(&self.0))
  }
}

/// A table of named rules, shared by every `Ref` that points into it.
/// Entries are inserted during grammar construction and, by convention, not
/// mutated once a parse begins.
pub struct RuleDict<V>(Rc<RefCell<HashMap<String, Grammar<V>>>>);

impl<V> Clone for RuleDict<V> {
  fn clone(&self) -> Self {
    RuleDict(Rc::clone(&self.0))
  }
}

impl<V> Default for RuleDict<V> {
  fn default() -> Self {
    RuleDict(Rc::new(RefCell::new(HashMap::new())))
  }
}

impl<V: TokenValue> RuleDict<V> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert (or overwrite) a named rule.
  pub fn insert(&self, name: impl Into<String>, g: Grammar<V>) {
    self.0.borrow_mut().insert(name.into(), g);
  }

  pub fn contains(&self, name: &str) -> bool {
    self.0.borrow().contains_key(name)
  }

  pub fn names(&self) -> Vec<String> {
    self.0.borrow().keys().cloned().collect()
  }

  /// Look up a rule. Panics if `name` was never inserted: by the time any
  /// analysis runs, every `Ref` is expected to resolve. Undefined
  /// references coming from untrusted grammar *source text* are caught
  /// earlier, by the frontend's checker, and reported as a `GrammarError`
  /// instead of reaching this point.
  fn get(&self, name: &str) -> Grammar<V> {
    self
      .0
      .borrow()
      .get(name)
      .unwrap_or_else(|| panic!("undefined rule: <{name}>"))
      .clone()
  }
}

impl<V: TokenValue> Grammar<V> {
  /// Stable identity for this node, valid as long as this handle (or a
  /// clone of it) is kept alive.
  pub(crate) fn address(&self) -> usize {
    Rc::as_ptr(&self.0) as *const () as usize
  }

  fn new(node: GrammarNode<V>) -> Self {
    Grammar(Rc::new(node))
  }

  pub(crate) fn forward_placeholder() -> Self {
    Grammar::new(GrammarNode::Forward(RefCell::new(None)))
  }

  pub(crate) fn fill_forward(&self, result: Grammar<V>) {
    match &*self.0 {
      GrammarNode::Forward(cell) => *cell.borrow_mut() = Some(result),
      _ => panic!("fill_forward called on a non-placeholder node"),
    }
  }
}

/// Follow a chain of back-patched placeholders through to the node they
/// ultimately resolve to. A placeholder that is still pending (its
/// recursive computation hasn't returned yet) resolves to itself: callers
/// that land on a still-pending placeholder have found a genuine cycle
/// through a self-referential rule, and should treat it the way any other
/// in-progress fixed-point node is treated (see `fixpoint.rs`).
pub(crate) fn resolve<V: TokenValue>(g: &Grammar<V>) -> Grammar<V> {
  let mut cur = g.clone();
  loop {
    let next = match &*cur.0 {
      GrammarNode::Forward(cell) => cell.borrow().clone(),
      _ => return cur,
    };
    match next {
      Some(target) => cur = target,
      None => return cur,
    }
  }
}

// --- smart constructors -----------------------------------------------

pub fn nil<V: TokenValue>() -> Grammar<V> {
  Grammar::new(GrammarNode::Nil)
}

pub fn eps<V: TokenValue>(trees: Vec<Tree<V>>) -> Grammar<V> {
  Grammar::new(GrammarNode::Eps(trees))
}

pub fn tok<V: TokenValue>(value: V) -> Grammar<V> {
  Grammar::new(GrammarNode::Tok(value))
}

/// Builds a `Pat` node, anchoring `pattern` at both ends so that it must
/// match a token's *entire* string form rather than a substring of it.
pub fn pat<V: TokenValue>(pattern: &str) -> Grammar<V> {
  let anchored = format!("^(?:{})$", pattern);
  let re = Regex::new(&anchored).unwrap_or_else(|e| panic!("invalid pattern {pattern:?}: {e}"));
  Grammar::new(GrammarNode::Pat(re))
}

/// `rep(Rep(g)) == Rep(g)`: repeating a repetition is the repetition.
pub fn rep<V: TokenValue>(g: Grammar<V>) -> Grammar<V> {
  if let GrammarNode::Rep(_) = &*g.0 {
    return g;
  }
  Grammar::new(GrammarNode::Rep(g))
}

fn alt2<V: TokenValue>(a: Grammar<V>, b: Grammar<V>) -> Grammar<V> {
  Grammar::new(GrammarNode::Alt(a, b))
}

fn seq2<V: TokenValue>(a: Grammar<V>, b: Grammar<V>) -> Grammar<V> {
  Grammar::new(GrammarNode::Seq(a, b))
}

/// `alt([g]) = g`; `alt([g1, g2, ..., gn])` folds into a right-leaning chain
/// of binary `Alt` nodes. Panics on an empty list: union needs at least one
/// alternative.
pub fn alt<V: TokenValue>(gs: impl IntoIterator<Item = Grammar<V>>) -> Grammar<V> {
  let mut gs: Vec<_> = gs.into_iter().collect();
  assert!(!gs.is_empty(), "alt: requires at least one alternative");
  let mut acc = gs.pop().unwrap();
  while let Some(g) = gs.pop() {
    acc = alt2(g, acc);
  }
  acc
}

/// `seq([g]) = g`; `seq([g1, ..., gn])` folds right into a chain of binary
/// `Seq` nodes, so the resulting tree shape is `Branch(g1, Branch(g2, ...))`.
pub fn seq<V: TokenValue>(gs: impl IntoIterator<Item = Grammar<V>>) -> Grammar<V> {
  let mut gs: Vec<_> = gs.into_iter().collect();
  assert!(!gs.is_empty(), "seq: requires at least one member");
  let mut acc = gs.pop().unwrap();
  while let Some(g) = gs.pop() {
    acc = seq2(g, acc);
  }
  acc
}

pub fn red<V: TokenValue>(g: Grammar<V>, f: impl Fn(Tree<V>) -> Tree<V> + 'static) -> Grammar<V> {
  Grammar::new(GrammarNode::Red(g, Rc::new(f)))
}

pub fn ref_<V: TokenValue>(name: impl Into<String>, dict: RuleDict<V>) -> Grammar<V> {
  Grammar::new(GrammarNode::Ref(name.into(), dict))
}

// --- internals used by the engine --------------------------------------

pub(crate) enum View<'a, V> {
  Nil,
  Eps(&'a [Tree<V>]),
  Tok(&'a V),
  Pat(&'a Regex),
  Rep(&'a Grammar<V>),
  Alt(&'a Grammar<V>, &'a Grammar<V>),
  Seq(&'a Grammar<V>, &'a Grammar<V>),
  Red(&'a Grammar<V>, &'a ReduceFn<V>),
  Ref(&'a str, &'a RuleDict<V>),
  /// Only reachable if a caller inspects a node without resolving it
  /// first; the engine always resolves before matching, so this arm
  /// exists only so the match stays exhaustive and documents the
  /// invariant.
  PendingForward,
}

impl<V: TokenValue> Grammar<V> {
  pub(crate) fn view(&self) -> View<'_, V> {
    match &*self.0 {
      GrammarNode::Nil => View::Nil,
      GrammarNode::Eps(ts) => View::Eps(ts),
      GrammarNode::Tok(v) => View::Tok(v),
      GrammarNode::Pat(re) => View::Pat(re),
      GrammarNode::Rep(g) => View::Rep(g),
      GrammarNode::Alt(a, b) => View::Alt(a, b),
      GrammarNode::Seq(a, b) => View::Seq(a, b),
      GrammarNode::Red(g, f) => View::Red(g, f),
      GrammarNode::Ref(n, d) => View::Ref(n, d),
      GrammarNode::Forward(_) => View::PendingForward,
    }
  }
}

impl<V: TokenValue> RuleDict<V> {
  pub(crate) fn resolve_ref(&self, name: &str) -> Grammar<V> {
    self.get(name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rep_of_rep_collapses() {
    let g: Grammar<char> = rep(tok('a'));
    let g2 = rep(g.clone());
    assert_eq!(g2.address(), g.address());
  }

  #[test]
  fn alt_and_seq_fold_multiple_children() {
    let g: Grammar<char> = alt([tok('a'), tok('b'), tok('c')]);
    match g.view() {
      View::Alt(_, _) => {}
      _ => panic!("expected Alt"),
    }
  }

  #[test]
  #[should_panic(expected = "at least one alternative")]
  fn alt_of_nothing_panics() {
    let _: Grammar<char> = alt(std::iter::empty());
  }

  #[test]
  fn pat_is_anchored() {
    let g: Grammar<String> = pat(r"\d+");
    match g.view() {
      View::Pat(re) => {
        assert!(re.is_match("123"));
        assert!(!re.is_match("a123b"));
      }
      _ => panic!("expected Pat"),
    }
  }
}
