//! Memoization for `derive` and `make_compact`.
//!
//! Both functions key their cache by the *identity* of their grammar
//! argument (plus, for `derive`, the token consumed). A plain "compute then
//! cache" memo would diverge on a directly self-referential rule — deriving
//! `expr ::= term | expr '+' term` with respect to a token recurses right
//! back into deriving `expr` before the first call has produced anything to
//! cache. Instead, a lookup that misses allocates a placeholder grammar
//! node *before* running the body, stores that placeholder in the cache
//! under the key, and hands it back to any recursive call that hits the
//! same key while the body is still running. The body fills the
//! placeholder in once it returns, and the placeholder — now resolved —
//! becomes a real part of the result graph. This is the grammar-level
//! analogue of forwarding a feature-structure node during unification.

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;

use crate::grammar::{Grammar, TokenValue};

pub struct Memo<K: Eq + Hash, V> {
  entries: RefCell<HashMap<K, Grammar<V>>>,
}

impl<K: Eq + Hash, V> Default for Memo<K, V> {
  fn default() -> Self {
    Memo {
      entries: RefCell::new(HashMap::new()),
    }
  }
}

impl<K: Eq + Hash + Clone, V: TokenValue> Memo<K, V> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Look up `key`. On a hit, returns `(handle, false)`: the caller should
  /// use `handle` as-is, whether or not it has been filled in yet (if it
  /// hasn't, that's a cycle — the caller is its own ancestor). On a miss,
  /// allocates a placeholder, records it under `key`, and returns
  /// `(placeholder, true)`: the caller is responsible for computing the
  /// result and calling `fill`.
  pub fn get_or_insert_placeholder(&self, key: K) -> (Grammar<V>, bool) {
    if let Some(existing) = self.entries.borrow().get(&key) {
      return (existing.clone(), false);
    }
    let placeholder = Grammar::forward_placeholder();
    self.entries.borrow_mut().insert(key, placeholder.clone());
    (placeholder, true)
  }

  pub fn fill(&self, placeholder: &Grammar<V>, result: Grammar<V>) {
    placeholder.fill_forward(result);
  }

  pub fn clear(&self) {
    self.entries.borrow_mut().clear();
  }
}
