//! Derived transformers, expressed purely in terms of the core algebra
//! (`grammar.rs`). None of these introduce a new `Grammar` variant; they're
//! exactly the sugar the grammar definition language's `?`, `*`, `+`,
//! `&*{sep}`, `&+{sep}` modifiers compile down to.

use crate::grammar::{alt, rep, seq, Grammar, TokenValue};
use crate::tree::Tree;

/// `g?` — zero or one occurrence of `g`.
pub fn optional<V: TokenValue>(g: Grammar<V>) -> Grammar<V> {
  alt([g, crate::grammar::eps(vec![Tree::Empty])])
}

/// `g*` — zero or more occurrences of `g`. An alias for `rep`, kept as a
/// separate name because the grammar definition language's `*` modifier
/// reads more naturally as "list of" than "repetition of".
pub fn list<V: TokenValue>(g: Grammar<V>) -> Grammar<V> {
  rep(g)
}

/// `g+` — one or more occurrences of `g`.
pub fn nonempty_list<V: TokenValue>(g: Grammar<V>) -> Grammar<V> {
  seq([g.clone(), rep(g)])
}

/// `g&*{sep}` — zero or more occurrences of `g`, separated by `sep`.
pub fn sep_list<V: TokenValue>(sep: Grammar<V>, g: Grammar<V>) -> Grammar<V> {
  alt([
    crate::grammar::eps(vec![Tree::Empty]),
    seq([g.clone(), rep(seq([sep, g]))]),
  ])
}

/// `g&+{sep}` — one or more occurrences of `g`, separated by `sep`.
pub fn nonempty_sep_list<V: TokenValue>(sep: Grammar<V>, g: Grammar<V>) -> Grammar<V> {
  seq([g.clone(), rep(seq([sep, g]))])
}
