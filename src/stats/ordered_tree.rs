//! Order-statistic binary search tree with labelled nodes.
//!
//! Nodes are keyed by `value` and carry a `label` that identifies them for
//! removal. Every node tracks the size of its subtree, which makes median,
//! rank lookup and threshold counts proportional to the tree depth instead
//! of the number of stored values.
//!
//! Insertion keeps the tree weight balanced: when a new node lands deeper
//! than `log1.5(size)`, the lowest unbalanced ancestor subtree is rebuilt
//! (scapegoat rebuilding). Removal of a node with two children pulls its
//! replacement from the larger subtree. All traversals use explicit stacks,
//! so long runs of identical values cannot exhaust the thread stack.
//!
//! ## Usage
//!
//! ```
//! use rowing_monitor::stats::OrderedStatisticTree;
//!
//! let mut tree = OrderedStatisticTree::new();
//! tree.push(1_u32, 0.012);
//! tree.push(2, 0.011);
//! tree.push(3, 0.250); // double trigger
//! assert_eq!(tree.median(), 0.012);
//! assert_eq!(tree.number_of_values_above(0.1), 1);
//!
//! tree.remove(&3);
//! assert_eq!(tree.size(), 2);
//! ```

type Link<L> = Option<Box<LabelledNode<L>>>;

struct LabelledNode<L> {
    label: L,
    value: f64,
    left: Link<L>,
    right: Link<L>,
    subtree_size: usize,
}

impl<L> LabelledNode<L> {
    fn leaf(label: L, value: f64) -> Box<Self> {
        Box::new(Self {
            label,
            value,
            left: None,
            right: None,
            subtree_size: 1,
        })
    }

    fn update_size(&mut self) {
        self.subtree_size = 1 + size_of(&self.left) + size_of(&self.right);
    }
}

fn size_of<L>(link: &Link<L>) -> usize {
    link.as_ref().map_or(0, |node| node.subtree_size)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Left,
    Right,
}

/// Deepest allowed node depth for a tree of `size` values (root at depth 0).
fn depth_limit(size: usize) -> usize {
    if size <= 1 {
        return 0;
    }
    ((size as f64).ln() / 1.5_f64.ln()).floor() as usize
}

/// Binary search tree over `f64` values supporting order-statistic queries.
///
/// Labels must be unique while present; pushing a second node with a label
/// that is already stored makes `remove` ambiguous (the first match found
/// wins).
pub struct OrderedStatisticTree<L> {
    root: Link<L>,
}

impl<L> Default for OrderedStatisticTree<L> {
    fn default() -> Self {
        Self { root: None }
    }
}

impl<L> Drop for OrderedStatisticTree<L> {
    fn drop(&mut self) {
        dismantle(self.root.take());
    }
}

impl<L: Clone> Clone for OrderedStatisticTree<L> {
    fn clone(&self) -> Self {
        let mut items = Vec::with_capacity(self.size());
        let mut stack: Vec<&LabelledNode<L>> = Vec::new();
        let mut link = self.root.as_deref();
        loop {
            while let Some(node) = link {
                stack.push(node);
                link = node.left.as_deref();
            }
            let Some(node) = stack.pop() else {
                break;
            };
            items.push((node.label.clone(), node.value));
            link = node.right.as_deref();
        }
        let count = items.len();
        Self {
            root: build_balanced(&mut items.into_iter(), count),
        }
    }
}

impl<L> std::fmt::Debug for OrderedStatisticTree<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderedStatisticTree")
            .field("size", &self.size())
            .finish()
    }
}

impl<L> OrderedStatisticTree<L> {
    /// Number of stored values.
    pub fn size(&self) -> usize {
        size_of(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}

impl<L: PartialEq> OrderedStatisticTree<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value. Equal values descend to the left.
    pub fn push(&mut self, label: L, value: f64) {
        let mut path = Vec::new();
        let mut link = &mut self.root;
        while let Some(node) = link {
            node.subtree_size += 1;
            if value <= node.value {
                path.push(Step::Left);
                link = &mut node.left;
            } else {
                path.push(Step::Right);
                link = &mut node.right;
            }
        }
        *link = Some(LabelledNode::leaf(label, value));

        if path.len() > depth_limit(self.size()) {
            self.rebuild_scapegoat(&path);
        }
    }

    /// Remove the node carrying `label`. Unknown labels are ignored.
    pub fn remove(&mut self, label: &L) {
        let Some(path) = self.path_to(label) else {
            return;
        };
        let mut link = &mut self.root;
        for step in &path {
            match link {
                Some(node) => {
                    node.subtree_size -= 1;
                    link = match step {
                        Step::Left => &mut node.left,
                        Step::Right => &mut node.right,
                    };
                }
                None => return,
            }
        }
        unlink(link);
    }

    /// Keep only the values whose label satisfies `keep`.
    ///
    /// One pass over the tree, which is then rebuilt balanced. Use this
    /// instead of repeated [`remove`](Self::remove) calls to evict many
    /// labels at once.
    pub fn retain<F: FnMut(&L) -> bool>(&mut self, mut keep: F) {
        let kept: Vec<(L, f64)> = into_inorder(self.root.take())
            .into_iter()
            .filter(|(label, _)| keep(label))
            .collect();
        let count = kept.len();
        self.root = build_balanced(&mut kept.into_iter(), count);
    }

    /// Whether a node with `label` is currently stored.
    pub fn contains(&self, label: &L) -> bool {
        self.path_to(label).is_some()
    }

    /// Count of values strictly greater than `threshold`.
    pub fn number_of_values_above(&self, threshold: f64) -> usize {
        let mut count = 0;
        let mut link = &self.root;
        while let Some(node) = link {
            if node.value > threshold {
                count += size_of(&node.right) + 1;
                link = &node.left;
            } else {
                link = &node.right;
            }
        }
        count
    }

    /// Count of values less than or equal to `threshold`.
    pub fn number_of_values_equal_or_below(&self, threshold: f64) -> usize {
        let mut count = 0;
        let mut link = &self.root;
        while let Some(node) = link {
            if node.value <= threshold {
                count += size_of(&node.left) + 1;
                link = &node.right;
            } else {
                link = &node.left;
            }
        }
        count
    }

    /// Median using 1-indexed positions. Returns 0 for an empty tree.
    pub fn median(&self) -> f64 {
        let n = self.size();
        if n == 0 {
            return 0.0;
        }
        if n % 2 == 1 {
            self.value_at_inorder_position(n.div_ceil(2)).unwrap_or(0.0)
        } else {
            let lower = self.value_at_inorder_position(n / 2).unwrap_or(0.0);
            let upper = self.value_at_inorder_position(n / 2 + 1).unwrap_or(0.0);
            (lower + upper) / 2.0
        }
    }

    /// Value at the 1-indexed in-order `position`, or `None` when out of range.
    pub fn value_at_inorder_position(&self, position: usize) -> Option<f64> {
        if position == 0 || position > self.size() {
            return None;
        }
        let mut remaining = position;
        let mut link = &self.root;
        while let Some(node) = link {
            let own_rank = size_of(&node.left) + 1;
            match remaining.cmp(&own_rank) {
                std::cmp::Ordering::Equal => return Some(node.value),
                std::cmp::Ordering::Less => link = &node.left,
                std::cmp::Ordering::Greater => {
                    remaining -= own_rank;
                    link = &node.right;
                }
            }
        }
        None
    }

    pub fn minimum(&self) -> Option<f64> {
        let mut node = self.root.as_ref()?;
        while let Some(left) = &node.left {
            node = left;
        }
        Some(node.value)
    }

    pub fn maximum(&self) -> Option<f64> {
        let mut node = self.root.as_ref()?;
        while let Some(right) = &node.right {
            node = right;
        }
        Some(node.value)
    }

    /// All values in ascending order. Allocates; meant for diagnostics.
    pub fn ordered_series(&self) -> Vec<f64> {
        let mut series = Vec::with_capacity(self.size());
        let mut stack: Vec<&LabelledNode<L>> = Vec::new();
        let mut link = self.root.as_deref();
        loop {
            while let Some(node) = link {
                stack.push(node);
                link = node.left.as_deref();
            }
            let Some(node) = stack.pop() else {
                break;
            };
            series.push(node.value);
            link = node.right.as_deref();
        }
        series
    }

    pub fn reset(&mut self) {
        dismantle(self.root.take());
    }

    // ------------------------------------------------------------------------
    // Structural helpers
    // ------------------------------------------------------------------------

    /// Steps from the root to the node carrying `label`. Labels are not
    /// ordered, so this is a depth-first search over the whole tree.
    fn path_to(&self, label: &L) -> Option<Vec<Step>> {
        let mut path = Vec::new();
        let mut stack: Vec<(&LabelledNode<L>, usize, Option<Step>)> = Vec::new();
        if let Some(root) = self.root.as_deref() {
            stack.push((root, 0, None));
        }
        while let Some((node, depth, step)) = stack.pop() {
            path.truncate(depth.saturating_sub(1));
            if let Some(step) = step {
                path.push(step);
            }
            if node.label == *label {
                return Some(path);
            }
            if let Some(right) = node.right.as_deref() {
                stack.push((right, depth + 1, Some(Step::Right)));
            }
            if let Some(left) = node.left.as_deref() {
                stack.push((left, depth + 1, Some(Step::Left)));
            }
        }
        None
    }

    /// `path` leads to a node that was just inserted too deep. Rebuild the
    /// lowest ancestor whose larger child holds more than 2/3 of its values.
    fn rebuild_scapegoat(&mut self, path: &[Step]) {
        let mut sizes = Vec::with_capacity(path.len() + 1);
        let mut link = &self.root;
        for step in path {
            let Some(node) = link else {
                return;
            };
            sizes.push(node.subtree_size);
            link = match step {
                Step::Left => &node.left,
                Step::Right => &node.right,
            };
        }
        sizes.push(size_of(link));

        let Some(depth) = (0..path.len())
            .rev()
            .find(|&d| 3 * sizes[d + 1] > 2 * sizes[d])
        else {
            return;
        };

        let mut link = &mut self.root;
        for step in &path[..depth] {
            match link {
                Some(node) => {
                    link = match step {
                        Step::Left => &mut node.left,
                        Step::Right => &mut node.right,
                    };
                }
                None => return,
            }
        }
        let count = size_of(link);
        let items = into_inorder(link.take());
        *link = build_balanced(&mut items.into_iter(), count);
    }
}

/// Remove the node at `link`, keeping its subtrees.
fn unlink<L>(link: &mut Link<L>) {
    let Some(node) = link else {
        return;
    };
    match (node.left.is_some(), node.right.is_some()) {
        (false, false) => *link = None,
        (true, false) => *link = node.left.take(),
        (false, true) => *link = node.right.take(),
        (true, true) => {
            if size_of(&node.left) >= size_of(&node.right) {
                if let Some((pred_label, pred_value)) = detach_maximum(&mut node.left) {
                    node.label = pred_label;
                    node.value = pred_value;
                }
            } else if let Some((succ_label, succ_value)) = detach_minimum(&mut node.right) {
                node.label = succ_label;
                node.value = succ_value;
            }
            node.update_size();
        }
    }
}

/// Unlink the rightmost node of a subtree and return its contents.
fn detach_maximum<L>(mut link: &mut Link<L>) -> Option<(L, f64)> {
    while link.as_ref().is_some_and(|node| node.right.is_some()) {
        if let Some(node) = link {
            node.subtree_size -= 1;
            link = &mut node.right;
        }
    }
    let mut owned = link.take()?;
    *link = owned.left.take();
    Some((owned.label, owned.value))
}

/// Unlink the leftmost node of a subtree and return its contents.
fn detach_minimum<L>(mut link: &mut Link<L>) -> Option<(L, f64)> {
    while link.as_ref().is_some_and(|node| node.left.is_some()) {
        if let Some(node) = link {
            node.subtree_size -= 1;
            link = &mut node.left;
        }
    }
    let mut owned = link.take()?;
    *link = owned.right.take();
    Some((owned.label, owned.value))
}

/// Consume a subtree into its `(label, value)` pairs in ascending order.
fn into_inorder<L>(root: Link<L>) -> Vec<(L, f64)> {
    let mut items = Vec::with_capacity(size_of(&root));
    let mut stack: Vec<Box<LabelledNode<L>>> = Vec::new();
    let mut link = root;
    loop {
        while let Some(mut node) = link {
            link = node.left.take();
            stack.push(node);
        }
        let Some(mut node) = stack.pop() else {
            break;
        };
        link = node.right.take();
        let LabelledNode { label, value, .. } = *node;
        items.push((label, value));
    }
    items
}

/// Perfectly balanced subtree from `count` ascending pairs. Recursion depth
/// is `log2(count)`.
fn build_balanced<L, I>(items: &mut I, count: usize) -> Link<L>
where
    I: Iterator<Item = (L, f64)>,
{
    if count == 0 {
        return None;
    }
    let left_count = count / 2;
    let left = build_balanced(items, left_count);
    let (label, value) = items.next()?;
    let right = build_balanced(items, count - left_count - 1);
    Some(Box::new(LabelledNode {
        label,
        value,
        left,
        right,
        subtree_size: count,
    }))
}

/// Free a subtree without recursing through `Box` drops.
fn dismantle<L>(root: Link<L>) {
    let mut stack: Vec<Box<LabelledNode<L>>> = root.into_iter().collect();
    while let Some(mut node) = stack.pop() {
        stack.extend(node.left.take());
        stack.extend(node.right.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> OrderedStatisticTree<u32> {
        let mut tree = OrderedStatisticTree::new();
        for (label, value) in [(1, 9.0), (2, 3.0), (3, 12.0), (4, 7.0), (5, 3.0), (6, 15.0), (7, 1.0)] {
            tree.push(label, value);
        }
        tree
    }

    fn reference_median(sorted: &[f64]) -> f64 {
        let n = sorted.len();
        if n == 0 {
            0.0
        } else if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        }
    }

    #[test]
    fn test_empty_tree_sentinels() {
        let tree: OrderedStatisticTree<u32> = OrderedStatisticTree::new();
        assert_eq!(tree.size(), 0);
        assert_eq!(tree.median(), 0.0);
        assert_eq!(tree.number_of_values_above(0.0), 0);
        assert_eq!(tree.number_of_values_equal_or_below(0.0), 0);
        assert_eq!(tree.value_at_inorder_position(1), None);
        assert!(tree.ordered_series().is_empty());
    }

    #[test]
    fn test_series_is_sorted() {
        let tree = populated();
        assert_eq!(tree.ordered_series(), vec![1.0, 3.0, 3.0, 7.0, 9.0, 12.0, 15.0]);
        assert_eq!(tree.minimum(), Some(1.0));
        assert_eq!(tree.maximum(), Some(15.0));
    }

    #[test]
    fn test_median_odd_and_even() {
        let mut tree = populated();
        assert_eq!(tree.median(), 7.0);
        tree.push(8, 10.0);
        // 1 3 3 7 | 9 10 12 15
        assert_eq!(tree.median(), 8.0);
    }

    #[test]
    fn test_inorder_position_matches_series() {
        let tree = populated();
        let series = tree.ordered_series();
        for p in 1..=tree.size() {
            assert_eq!(tree.value_at_inorder_position(p), Some(series[p - 1]));
        }
        assert_eq!(tree.value_at_inorder_position(0), None);
        assert_eq!(tree.value_at_inorder_position(tree.size() + 1), None);
    }

    #[test]
    fn test_counts_partition_size() {
        let tree = populated();
        for t in [-1.0, 1.0, 2.0, 3.0, 5.0, 7.0, 9.5, 15.0, 20.0] {
            assert_eq!(
                tree.number_of_values_above(t) + tree.number_of_values_equal_or_below(t),
                tree.size(),
                "partition broken at threshold {t}"
            );
        }
    }

    #[test]
    fn test_ties_belong_to_equal_or_below() {
        let tree = populated();
        assert_eq!(tree.number_of_values_above(3.0), 4);
        assert_eq!(tree.number_of_values_equal_or_below(3.0), 3);
        assert_eq!(tree.number_of_values_above(15.0), 0);
        assert_eq!(tree.number_of_values_equal_or_below(1.0), 1);
    }

    #[test]
    fn test_remove_leaf_single_child_and_two_children() {
        let mut tree = populated();

        tree.remove(&7); // leaf 1.0
        assert_eq!(tree.ordered_series(), vec![3.0, 3.0, 7.0, 9.0, 12.0, 15.0]);

        tree.remove(&3); // 12.0 has only a right child now
        assert_eq!(tree.ordered_series(), vec![3.0, 3.0, 7.0, 9.0, 15.0]);

        tree.remove(&1); // root with two children
        assert_eq!(tree.ordered_series(), vec![3.0, 3.0, 7.0, 15.0]);
        assert_eq!(tree.size(), 4);
        assert_eq!(tree.median(), 5.0);
    }

    #[test]
    fn test_remove_duplicate_value_removes_exactly_one() {
        let mut tree = populated();
        tree.remove(&5);
        assert_eq!(tree.ordered_series(), vec![1.0, 3.0, 7.0, 9.0, 12.0, 15.0]);
        assert!(!tree.contains(&5));
        assert!(tree.contains(&2));
    }

    #[test]
    fn test_remove_unknown_label_is_noop() {
        let mut tree = populated();
        tree.remove(&42);
        assert_eq!(tree.size(), 7);

        let mut empty: OrderedStatisticTree<u32> = OrderedStatisticTree::new();
        empty.remove(&1);
        assert_eq!(empty.size(), 0);
    }

    #[test]
    fn test_reset_restores_sentinels() {
        let mut tree = populated();
        tree.reset();
        assert_eq!(tree.size(), 0);
        assert_eq!(tree.median(), 0.0);
        assert_eq!(tree.number_of_values_above(-100.0), 0);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_sliding_window_against_sorted_reference() {
        // Deterministic pseudo-random sequence (LCG), window of 11 values
        let mut tree = OrderedStatisticTree::new();
        let mut window: std::collections::VecDeque<(u64, f64)> = std::collections::VecDeque::new();
        let mut seed: u64 = 12345;
        for label in 0..500_u64 {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let value = ((seed >> 33) % 1000) as f64 / 10.0;
            tree.push(label, value);
            window.push_back((label, value));
            if window.len() > 11 {
                let (old, _) = window.pop_front().unwrap();
                let before = tree.size();
                tree.remove(&old);
                assert_eq!(tree.size(), before - 1);
            }

            let mut sorted: Vec<f64> = window.iter().map(|&(_, v)| v).collect();
            sorted.sort_by(f64::total_cmp);
            assert_eq!(tree.ordered_series(), sorted);
            assert_eq!(tree.median(), reference_median(&sorted));
        }
    }

    /// Runs `f` on a thread with a deliberately small stack.
    fn on_small_stack<F: FnOnce() + Send + 'static>(f: F) {
        std::thread::Builder::new()
            .stack_size(128 * 1024)
            .spawn(f)
            .unwrap()
            .join()
            .unwrap();
    }

    fn depth(tree: &OrderedStatisticTree<u64>) -> usize {
        let mut deepest = 0;
        let mut stack: Vec<(&LabelledNode<u64>, usize)> =
            tree.root.as_deref().map(|n| (n, 0)).into_iter().collect();
        while let Some((node, d)) = stack.pop() {
            deepest = deepest.max(d);
            stack.extend(node.left.as_deref().map(|n| (n, d + 1)));
            stack.extend(node.right.as_deref().map(|n| (n, d + 1)));
        }
        deepest
    }

    #[test]
    fn test_identical_values_stay_shallow() {
        on_small_stack(|| {
            let mut tree = OrderedStatisticTree::new();
            for label in 0..50_000_u64 {
                tree.push(label, 2.0);
            }
            assert_eq!(tree.size(), 50_000);
            assert!(depth(&tree) <= depth_limit(50_000) + 1, "depth {}", depth(&tree));
            assert_eq!(tree.median(), 2.0);
            assert_eq!(tree.number_of_values_above(2.0), 0);
            assert_eq!(tree.number_of_values_equal_or_below(2.0), 50_000);

            tree.remove(&0);
            tree.remove(&49_999);
            assert_eq!(tree.size(), 49_998);
            assert!(!tree.contains(&0));
            assert!(tree.contains(&25_000));

            let copy = tree.clone();
            assert_eq!(copy.size(), 49_998);
            assert_eq!(tree.ordered_series().len(), 49_998);
            drop(copy);
            tree.reset();
            assert!(tree.is_empty());
        });
    }

    #[test]
    fn test_ascending_values_stay_shallow() {
        let mut tree = OrderedStatisticTree::new();
        for label in 0..4_096_u64 {
            tree.push(label, label as f64);
        }
        assert!(depth(&tree) <= depth_limit(4_096) + 1);
        assert_eq!(tree.value_at_inorder_position(1), Some(0.0));
        assert_eq!(tree.value_at_inorder_position(4_096), Some(4_095.0));
        assert_eq!(tree.median(), 2_047.5);
    }

    #[test]
    fn test_retain_evicts_in_one_pass() {
        let mut tree = populated();
        tree.retain(|label| label % 2 == 0);
        assert_eq!(tree.ordered_series(), vec![3.0, 7.0, 15.0]);
        assert!(tree.contains(&4));
        assert!(!tree.contains(&1));

        // Pushes and removals keep working on the rebuilt shape
        tree.push(8, 3.0);
        tree.remove(&2);
        assert_eq!(tree.ordered_series(), vec![3.0, 7.0, 15.0]);
        assert_eq!(tree.number_of_values_equal_or_below(3.0), 1);

        tree.retain(|_| false);
        assert!(tree.is_empty());
        assert_eq!(tree.median(), 0.0);
    }
}
