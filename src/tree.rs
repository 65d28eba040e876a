//! Parse trees produced by the derivative engine.

use std::fmt;
use std::rc::Rc;

/// The result of recognizing some span of input.
///
/// `Branch` children are reference counted so that ambiguous parses, which
/// can share large common subtrees, don't pay for deep clones every time a
/// tree is threaded through a reduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tree<V> {
  /// A `Rep` that matched zero elements, or a skipped optional alternative.
  Empty,
  /// One consumed token.
  Leaf(V),
  /// The result of a `Seq`.
  Branch(Rc<Tree<V>>, Rc<Tree<V>>),
}

impl<V> Tree<V> {
  pub fn branch(left: Tree<V>, right: Tree<V>) -> Tree<V> {
    Tree::Branch(Rc::new(left), Rc::new(right))
  }

  pub fn is_empty(&self) -> bool {
    matches!(self, Tree::Empty)
  }
}

impl<V: fmt::Display> fmt::Display for Tree<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Tree::Empty => write!(f, "ε"),
      Tree::Leaf(v) => write!(f, "{}", v),
      Tree::Branch(l, r) => write!(f, "({} {})", l, r),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn branch_shares_children() {
    let leaf = Tree::Leaf("a");
    let t1 = Tree::branch(leaf.clone(), Tree::Empty);
    let t2 = Tree::branch(leaf, Tree::Empty);
    assert_eq!(t1, t2);
  }

  #[test]
  fn display_nests_branches() {
    let t = Tree::branch(Tree::Leaf('a'), Tree::branch(Tree::Leaf('b'), Tree::Empty));
    assert_eq!(t.to_string(), "(a (b ε))");
  }
}
