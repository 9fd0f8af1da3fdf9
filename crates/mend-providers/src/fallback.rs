//! Deterministic local stand-in for the completion service.
//!
//! Returns canned, compilable programs keyed on keywords in the prompt. Every
//! template embeds its own tests so the sandbox pipeline is exercised end to
//! end even without network access.

use anyhow::Result;
use tracing::debug;

use crate::{CompletionRequest, CompletionResponse, LLMProvider, Usage};

/// Canonical task shapes the fallback knows how to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskShape {
    HelloWorld,
    Quicksort,
    FibonacciMemo,
    BinarySearchTree,
}

impl TaskShape {
    pub const ALL: [TaskShape; 4] = [
        TaskShape::HelloWorld,
        TaskShape::Quicksort,
        TaskShape::FibonacciMemo,
        TaskShape::BinarySearchTree,
    ];

    /// Pick the shape from keywords in free text; anything unrecognised is
    /// answered with hello world.
    pub fn detect(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("quicksort") || lower.contains("quick sort") {
            TaskShape::Quicksort
        } else if lower.contains("binary search tree") || has_word(&lower, "bst") {
            TaskShape::BinarySearchTree
        } else if lower.contains("fibonacci") {
            TaskShape::FibonacciMemo
        } else {
            TaskShape::HelloWorld
        }
    }
}

fn has_word(lower: &str, word: &str) -> bool {
    lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| token == word)
}

#[derive(Debug, Clone, Default)]
pub struct FallbackProvider;

impl FallbackProvider {
    pub fn new() -> Self {
        Self
    }

    /// The program returned for a raw prompt: Rust when the prompt names it.
    pub fn program_for(&self, prompt: &str) -> &'static str {
        let rust = has_word(&prompt.to_lowercase(), "rust");
        self.program(TaskShape::detect(prompt), rust)
    }

    /// The template for `shape`, in Rust or Python.
    pub fn program(&self, shape: TaskShape, rust: bool) -> &'static str {
        debug!("Fallback generator: shape={:?}, rust={}", shape, rust);
        match (rust, shape) {
            (true, TaskShape::HelloWorld) => RUST_HELLO,
            (true, TaskShape::Quicksort) => RUST_QUICKSORT,
            (true, TaskShape::FibonacciMemo) => RUST_FIBONACCI,
            (true, TaskShape::BinarySearchTree) => RUST_BST,
            (false, TaskShape::HelloWorld) => PYTHON_HELLO,
            (false, TaskShape::Quicksort) => PYTHON_QUICKSORT,
            (false, TaskShape::FibonacciMemo) => PYTHON_FIBONACCI,
            (false, TaskShape::BinarySearchTree) => PYTHON_BST,
        }
    }
}

#[async_trait::async_trait]
impl LLMProvider for FallbackProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let content = self.program_for(request.prompt()).to_string();
        Ok(CompletionResponse {
            content,
            usage: Usage::default(),
            model: self.model().to_string(),
        })
    }

    fn name(&self) -> &str {
        "fallback"
    }

    fn model(&self) -> &str {
        "deterministic-templates"
    }

    fn is_local(&self) -> bool {
        true
    }
}

const RUST_HELLO: &str = r#"fn greeting() -> &'static str {
    "Hello, World!"
}

fn main() {
    println!("{}", greeting());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting() {
        assert_eq!(greeting(), "Hello, World!");
    }
}
"#;

const RUST_QUICKSORT: &str = r#"fn quicksort(arr: &mut [i32]) {
    if arr.len() <= 1 {
        return;
    }
    let pivot = partition(arr);
    let (left, right) = arr.split_at_mut(pivot);
    quicksort(left);
    quicksort(&mut right[1..]);
}

fn partition(arr: &mut [i32]) -> usize {
    let pivot = arr[0];
    let mut i = 1;
    for j in 1..arr.len() {
        if arr[j] <= pivot {
            arr.swap(i, j);
            i += 1;
        }
    }
    arr.swap(0, i - 1);
    i - 1
}

fn main() {
    let mut arr = [64, 34, 25, 12, 22, 11, 90];
    quicksort(&mut arr);
    println!("{:?}", arr);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quicksort() {
        let mut arr = [3, 1, 4, 1, 5];
        quicksort(&mut arr);
        assert_eq!(arr, [1, 1, 3, 4, 5]);
    }

    #[test]
    fn test_quicksort_trivial() {
        let mut empty: [i32; 0] = [];
        quicksort(&mut empty);
        let mut single = [7];
        quicksort(&mut single);
        assert_eq!(single, [7]);
    }
}
"#;

const RUST_FIBONACCI: &str = r#"use std::collections::HashMap;

/// The cache is owned by the caller and passed in explicitly.
fn fibonacci_memo(n: u64, memo: &mut HashMap<u64, u64>) -> u64 {
    if n <= 1 {
        return n;
    }
    if let Some(&cached) = memo.get(&n) {
        return cached;
    }
    let value = fibonacci_memo(n - 1, memo) + fibonacci_memo(n - 2, memo);
    memo.insert(n, value);
    value
}

fn fibonacci_iterative(n: u64) -> u64 {
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        let next = a + b;
        a = b;
        b = next;
    }
    a
}

fn main() {
    let n = 10;
    let mut memo = HashMap::new();
    println!("Fibonacci({}) with memoization: {}", n, fibonacci_memo(n, &mut memo));
    println!("Fibonacci({}) iterative: {}", n, fibonacci_iterative(n));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fibonacci_memo() {
        let mut memo = HashMap::new();
        assert_eq!(fibonacci_memo(0, &mut memo), 0);
        assert_eq!(fibonacci_memo(1, &mut memo), 1);
        assert_eq!(fibonacci_memo(10, &mut memo), 55);
        assert_eq!(memo.get(&10), Some(&55));
    }

    #[test]
    fn test_fibonacci_iterative() {
        assert_eq!(fibonacci_iterative(0), 0);
        assert_eq!(fibonacci_iterative(1), 1);
        assert_eq!(fibonacci_iterative(10), 55);
    }
}
"#;

const RUST_BST: &str = r#"#[derive(Debug)]
struct Node {
    value: i32,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

#[derive(Debug, Default)]
struct Bst {
    root: Option<Box<Node>>,
}

impl Bst {
    fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, value: i32) {
        insert_into(&mut self.root, value);
    }

    fn contains(&self, value: i32) -> bool {
        let mut current = &self.root;
        while let Some(node) = current {
            if value == node.value {
                return true;
            }
            current = if value < node.value {
                &node.left
            } else {
                &node.right
            };
        }
        false
    }

    fn in_order(&self) -> Vec<i32> {
        let mut out = Vec::new();
        walk(&self.root, &mut out);
        out
    }
}

fn insert_into(slot: &mut Option<Box<Node>>, value: i32) {
    if let Some(node) = slot {
        if value < node.value {
            insert_into(&mut node.left, value);
        } else {
            insert_into(&mut node.right, value);
        }
    } else {
        *slot = Some(Box::new(Node {
            value,
            left: None,
            right: None,
        }));
    }
}

fn walk(slot: &Option<Box<Node>>, out: &mut Vec<i32>) {
    if let Some(node) = slot {
        walk(&node.left, out);
        out.push(node.value);
        walk(&node.right, out);
    }
}

fn main() {
    let mut bst = Bst::new();
    for value in [5, 3, 7, 2, 4, 6, 8] {
        bst.insert(value);
    }
    println!("Search 4: {}", bst.contains(4));
    println!("Search 9: {}", bst.contains(9));
    println!("In order: {:?}", bst.in_order());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bst() {
        let mut bst = Bst::new();
        bst.insert(5);
        bst.insert(3);
        bst.insert(7);
        assert!(bst.contains(5));
        assert!(bst.contains(3));
        assert!(!bst.contains(10));
        assert_eq!(bst.in_order(), vec![3, 5, 7]);
    }
}
"#;

const PYTHON_HELLO: &str = r#"import unittest


def hello():
    return "Hello, World!"


class TestHello(unittest.TestCase):
    def test_hello(self):
        self.assertEqual(hello(), "Hello, World!")


if __name__ == "__main__":
    print(hello())
"#;

const PYTHON_QUICKSORT: &str = r#"import unittest


def quicksort(arr):
    if len(arr) <= 1:
        return arr
    pivot = arr[len(arr) // 2]
    left = [x for x in arr if x < pivot]
    middle = [x for x in arr if x == pivot]
    right = [x for x in arr if x > pivot]
    return quicksort(left) + middle + quicksort(right)


class TestQuicksort(unittest.TestCase):
    def test_quicksort(self):
        self.assertEqual(quicksort([3, 1, 4, 1, 5]), [1, 1, 3, 4, 5])
        self.assertEqual(quicksort([]), [])
        self.assertEqual(quicksort([1]), [1])


if __name__ == "__main__":
    arr = [64, 34, 25, 12, 22, 11, 90]
    print(f"Sorted array: {quicksort(arr)}")
"#;

const PYTHON_FIBONACCI: &str = r#"import unittest


def fibonacci_memo(n, memo):
    """memo is owned by the caller and passed in explicitly."""
    if n in memo:
        return memo[n]
    if n <= 1:
        return n
    memo[n] = fibonacci_memo(n - 1, memo) + fibonacci_memo(n - 2, memo)
    return memo[n]


def fibonacci_iterative(n):
    if n <= 1:
        return n
    a, b = 0, 1
    for _ in range(2, n + 1):
        a, b = b, a + b
    return b


class TestFibonacci(unittest.TestCase):
    def test_fibonacci_memo(self):
        memo = {}
        self.assertEqual(fibonacci_memo(0, memo), 0)
        self.assertEqual(fibonacci_memo(1, memo), 1)
        self.assertEqual(fibonacci_memo(10, memo), 55)
        self.assertEqual(memo[10], 55)

    def test_fibonacci_iterative(self):
        self.assertEqual(fibonacci_iterative(0), 0)
        self.assertEqual(fibonacci_iterative(1), 1)
        self.assertEqual(fibonacci_iterative(10), 55)


if __name__ == "__main__":
    n = 10
    print(f"Fibonacci({n}) with memoization: {fibonacci_memo(n, {})}")
    print(f"Fibonacci({n}) iterative: {fibonacci_iterative(n)}")
"#;

const PYTHON_BST: &str = r#"import unittest


class TreeNode:
    def __init__(self, val=0):
        self.val = val
        self.left = None
        self.right = None


class BST:
    def __init__(self):
        self.root = None

    def insert(self, val):
        self.root = self._insert(self.root, val)

    def _insert(self, node, val):
        if not node:
            return TreeNode(val)
        if val < node.val:
            node.left = self._insert(node.left, val)
        else:
            node.right = self._insert(node.right, val)
        return node

    def search(self, val):
        return self._search(self.root, val)

    def _search(self, node, val):
        if not node or node.val == val:
            return node is not None
        if val < node.val:
            return self._search(node.left, val)
        return self._search(node.right, val)


class TestBST(unittest.TestCase):
    def test_bst(self):
        bst = BST()
        bst.insert(5)
        bst.insert(3)
        bst.insert(7)
        self.assertTrue(bst.search(5))
        self.assertTrue(bst.search(3))
        self.assertFalse(bst.search(10))


if __name__ == "__main__":
    bst = BST()
    for val in [5, 3, 7, 2, 4, 6, 8]:
        bst.insert(val)
    print(f"Search 4: {bst.search(4)}")
    print(f"Search 9: {bst.search(9)}")
"#;
