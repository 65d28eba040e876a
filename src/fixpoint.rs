//! A generic least-fixed-point driver for recursive analyses over a
//! (possibly cyclic) grammar graph.
//!
//! Ported from the round-based algorithm used by the reference PWD
//! implementation's fixed-point module: an outermost call starts a
//! "round" — clears the visited set, clears the `changed` flag, and runs
//! the analysis. Any recursive call reachable from that analysis that
//! lands on an already-visited node returns the cached value (or `bottom`
//! if nothing has been cached for it yet) instead of recursing further.
//! If a round's result differs from what's cached, the cache is updated
//! and `changed` is set; rounds repeat until one produces no change.
//!
//! Because the grammars this crate analyzes are finite and the lattices
//! involved (`bool`, and the tree-list lattice bounded by a single
//! recursion level) have finite height, this always terminates.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::eq::{identity_key, GrammarId};
use crate::grammar::{Grammar, TokenValue};

pub struct FixPoint<T: Clone + PartialEq> {
  bottom: T,
  cache: RefCell<HashMap<GrammarId, T>>,
  visited: RefCell<HashSet<GrammarId>>,
  changed: Cell<bool>,
  running: Cell<bool>,
}

impl<T: Clone + PartialEq> FixPoint<T> {
  pub fn new(bottom: T) -> Self {
    FixPoint {
      bottom,
      cache: RefCell::new(HashMap::new()),
      visited: RefCell::new(HashSet::new()),
      changed: Cell::new(false),
      running: Cell::new(false),
    }
  }

  /// Run `body` over `g`, resolving the surrounding round/visited-set
  /// bookkeeping. `body` itself is expected to call back into this same
  /// `call` method (indirectly, via the owning `Engine`) for each child it
  /// recurses into. `body` may be invoked once per round, and a round
  /// repeats until the whole traversal stops changing, so it must be a
  /// plain `Fn`, not a `FnOnce`.
  pub fn call<V: TokenValue>(&self, g: &Grammar<V>, body: impl Fn(&Grammar<V>) -> T) -> T {
    let id = identity_key(g);

    if !self.running.get() {
      self.running.set(true);
      let mut round = 0usize;
      let result = loop {
        round += 1;
        self.visited.borrow_mut().clear();
        self.changed.set(false);
        let value = self.step(id, || body(g));
        debug!(round, changed = self.changed.get(), "fixpoint round");
        if !self.changed.get() {
          break value;
        }
      };
      self.running.set(false);
      result
    } else {
      self.step(id, || body(g))
    }
  }

  fn step(&self, id: GrammarId, compute: impl FnOnce() -> T) -> T {
    if self.visited.borrow().contains(&id) {
      return self
        .cache
        .borrow()
        .get(&id)
        .cloned()
        .unwrap_or_else(|| self.bottom.clone());
    }
    self.visited.borrow_mut().insert(id);

    let previous = self.cache.borrow().get(&id).cloned();
    let value = compute();

    if previous.as_ref() != Some(&value) {
      self.changed.set(true);
    }
    self.cache.borrow_mut().insert(id, value.clone());
    value
  }

  pub fn clear(&self) {
    self.cache.borrow_mut().clear();
    self.visited.borrow_mut().clear();
    self.changed.set(false);
    self.running.set(false);
  }
}
