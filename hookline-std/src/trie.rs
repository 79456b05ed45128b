//! Token trie for subject matching.
//!
//! Subjects are `.`-separated tokens. A pattern token `*` matches exactly one
//! token and a trailing `>` matches one or more.

use std::collections::HashMap;

const SINGLE: &str = "*";
const TAIL: &str = ">";

struct TrieNode<V> {
    values: Vec<V>,
    tail: Vec<V>,
    children: HashMap<String, TrieNode<V>>,
}

impl<V> Default for TrieNode<V> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            tail: Vec::new(),
            children: HashMap::new(),
        }
    }
}

impl<V> TrieNode<V> {
    fn is_empty(&self) -> bool {
        self.values.is_empty() && self.tail.is_empty() && self.children.is_empty()
    }
}

/// A trie mapping subject patterns to values.
///
/// Several values may share one pattern.
pub struct SubjectTrie<V> {
    root: TrieNode<V>,
    len: usize,
}

impl<V> Default for SubjectTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> SubjectTrie<V> {
    /// Create a new empty trie.
    pub fn new() -> Self {
        Self {
            root: TrieNode::default(),
            len: 0,
        }
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the trie holds no values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert `value` under `pattern`.
    pub fn insert(&mut self, pattern: &str, value: V) {
        let mut node = &mut self.root;
        let mut tokens = pattern.split('.').peekable();
        while let Some(token) = tokens.next() {
            if token == TAIL && tokens.peek().is_none() {
                node.tail.push(value);
                self.len += 1;
                return;
            }
            node = node.children.entry(token.to_string()).or_default();
        }
        node.values.push(value);
        self.len += 1;
    }

    /// Remove every value under `pattern` for which `pred` holds.
    ///
    /// Returns the number of values removed.
    pub fn remove_where(&mut self, pattern: &str, mut pred: impl FnMut(&V) -> bool) -> usize {
        let tokens: Vec<&str> = pattern.split('.').collect();
        let removed = Self::remove_in(&mut self.root, &tokens, &mut pred);
        self.len -= removed;
        removed
    }

    fn remove_in(node: &mut TrieNode<V>, tokens: &[&str], pred: &mut impl FnMut(&V) -> bool) -> usize {
        match tokens {
            [] => {
                let before = node.values.len();
                node.values.retain(|v| !pred(v));
                before - node.values.len()
            }
            [last] if *last == TAIL => {
                let before = node.tail.len();
                node.tail.retain(|v| !pred(v));
                before - node.tail.len()
            }
            [token, rest @ ..] => {
                let Some(child) = node.children.get_mut(*token) else {
                    return 0;
                };
                let removed = Self::remove_in(child, rest, pred);
                if child.is_empty() {
                    node.children.remove(*token);
                }
                removed
            }
        }
    }

    /// Collect every value whose pattern matches the literal `subject`.
    pub fn matches(&self, subject: &str) -> Vec<&V> {
        let tokens: Vec<&str> = subject.split('.').collect();
        let mut out = Vec::new();
        Self::collect(&self.root, &tokens, &mut out);
        out
    }

    fn collect<'a>(node: &'a TrieNode<V>, tokens: &[&str], out: &mut Vec<&'a V>) {
        let Some((token, rest)) = tokens.split_first() else {
            out.extend(node.values.iter());
            return;
        };
        out.extend(node.tail.iter());
        if let Some(child) = node.children.get(*token) {
            Self::collect(child, rest, out);
        }
        if *token != SINGLE {
            if let Some(child) = node.children.get(SINGLE) {
                Self::collect(child, rest, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(trie: &SubjectTrie<u32>, subject: &str) -> Vec<u32> {
        let mut found: Vec<u32> = trie.matches(subject).into_iter().copied().collect();
        found.sort();
        found
    }

    #[test]
    fn test_exact_match() {
        let mut trie = SubjectTrie::new();
        trie.insert("orders.create", 1);
        trie.insert("orders.delete", 2);

        assert_eq!(sorted(&trie, "orders.create"), vec![1]);
        assert!(trie.matches("orders").is_empty());
        assert!(trie.matches("orders.create.v2").is_empty());
    }

    #[test]
    fn test_single_token_wildcard() {
        let mut trie = SubjectTrie::new();
        trie.insert("orders.*", 1);
        trie.insert("*.create", 2);

        assert_eq!(sorted(&trie, "orders.create"), vec![1, 2]);
        assert_eq!(sorted(&trie, "orders.delete"), vec![1]);
        assert!(trie.matches("orders.create.v2").is_empty());
    }

    #[test]
    fn test_tail_wildcard() {
        let mut trie = SubjectTrie::new();
        trie.insert("orders.>", 1);

        assert_eq!(sorted(&trie, "orders.create"), vec![1]);
        assert_eq!(sorted(&trie, "orders.create.v2"), vec![1]);
        assert!(trie.matches("orders").is_empty());
    }

    #[test]
    fn test_shared_pattern_and_removal() {
        let mut trie = SubjectTrie::new();
        trie.insert("a.b", 1);
        trie.insert("a.b", 2);
        trie.insert("a.>", 3);
        assert_eq!(trie.len(), 3);

        assert_eq!(trie.remove_where("a.b", |v| *v == 1), 1);
        assert_eq!(sorted(&trie, "a.b"), vec![2, 3]);

        assert_eq!(trie.remove_where("a.>", |_| true), 1);
        assert_eq!(trie.remove_where("a.b", |_| true), 1);
        assert_eq!(trie.remove_where("missing.subject", |_| true), 0);
        assert!(trie.is_empty());
    }
}
