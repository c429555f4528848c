//! Insertion-built R-tree over geographic points
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. Every
//! indexed point is wrapped in a childless *data node* whose rectangle is
//! degenerate and tags the point; the nodes directly above data nodes are
//! *leaf containers*. Splits are quadratic-style: the two entries whose union
//! wastes the most area seed two new groups, and the rest are distributed by
//! least enlargement.

use crate::spatial::{Point, Rectangle};
use crate::types::IndexStats;
use smallvec::SmallVec;

/// Handle of a node inside the tree's arena
pub(crate) type NodeId = usize;

#[derive(Debug, Clone)]
struct Node {
    mbr: Rectangle,
    children: SmallVec<[NodeId; 8]>,
    parent: Option<NodeId>,
    /// Position in the parent's child list
    index: usize,
    height: usize,
}

impl Node {
    fn data(point: Point) -> Self {
        Self {
            mbr: Rectangle::leaf(point),
            children: SmallVec::new(),
            parent: None,
            index: 0,
            height: 0,
        }
    }

    /// Empty container covering `extent`. Any data point tag is dropped.
    fn container(extent: Rectangle) -> Self {
        Self {
            mbr: Rectangle::new(extent.left_top(), extent.right_bottom()),
            children: SmallVec::new(),
            parent: None,
            index: 0,
            height: 0,
        }
    }

    fn is_data(&self) -> bool {
        self.mbr.data_point().is_some()
    }
}

/// A height-balanced R-tree indexing [`Point`]s.
///
/// The tree only grows: points are added one at a time with
/// [`RTree::insert`] and retrieved with [`RTree::range_query`]. Internal
/// nodes never leave the tree.
///
/// # Examples
///
/// ```rust
/// use geonear::{Point, RTree, Rectangle};
///
/// let mut tree = RTree::new(4);
/// for (i, (lat, lon)) in [(0.0, 0.0), (0.0, 1.0), (10.0, 10.0)].into_iter().enumerate() {
///     tree.insert(Point::with_offset(lat, lon, i as u64));
/// }
///
/// let window = Rectangle::new(Point::new(-1.0, -1.0), Point::new(1.0, 2.0));
/// assert_eq!(tree.range_query(&window).len(), 2);
/// assert_eq!(tree.len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct RTree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    max_keys_per_node: usize,
    min_keys_per_node: usize,
    count: usize,
}

impl RTree {
    pub const DEFAULT_MAX_KEYS_PER_NODE: usize = 4;

    /// Creates an empty tree with at most `max_keys_per_node` children per node.
    ///
    /// # Panics
    ///
    /// Panics if `max_keys_per_node` is less than 2.
    pub fn new(max_keys_per_node: usize) -> Self {
        assert!(
            max_keys_per_node >= 2,
            "max_keys_per_node must be at least 2"
        );

        Self {
            nodes: Vec::new(),
            root: None,
            max_keys_per_node,
            min_keys_per_node: max_keys_per_node / 2,
            count: 0,
        }
    }

    pub fn max_keys_per_node(&self) -> usize {
        self.max_keys_per_node
    }

    pub fn min_keys_per_node(&self) -> usize {
        self.min_keys_per_node
    }

    /// Number of inserted points
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Height of the root (0 for an empty tree, 1 for a single leaf container).
    pub fn height(&self) -> usize {
        self.root.map_or(0, |root| self.nodes[root].height)
    }

    /// Bounding rectangle of every indexed point.
    pub fn bounds(&self) -> Option<Rectangle> {
        self.root.map(|root| self.nodes[root].mbr)
    }

    pub fn stats(&self) -> IndexStats {
        let leaf_containers = self
            .nodes
            .iter()
            .filter(|node| self.is_leaf_container(node))
            .count();

        IndexStats {
            points: self.count,
            nodes: self.nodes.len(),
            height: self.height(),
            leaf_containers,
        }
    }

    /// Adds a point to the tree.
    pub fn insert(&mut self, point: Point) {
        let data = self.alloc(Node::data(point));

        match self.root {
            None => {
                let extent = self.nodes[data].mbr;
                let root = self.alloc(Node::container(extent));
                self.attach(root, data);
                self.root = Some(root);
            }
            Some(root) => {
                let leaf = self.choose_leaf(root, data);
                self.add_and_split(leaf, data);
            }
        }

        self.count += 1;
    }

    /// Returns every indexed point whose position lies in `target`
    /// (boundary included), in traversal order.
    pub fn range_query(&self, target: &Rectangle) -> Vec<Point> {
        let mut result = Vec::new();
        if let Some(root) = self.root {
            self.collect_range(root, target, &mut result);
        }
        result
    }

    /// All indexed points, in traversal order.
    pub fn points(&self) -> Vec<Point> {
        match self.bounds() {
            Some(bounds) => self.range_query(&bounds),
            None => Vec::new(),
        }
    }

    fn collect_range(&self, node: NodeId, target: &Rectangle, result: &mut Vec<Point>) {
        let node = &self.nodes[node];

        if self.is_leaf_container(node) {
            for &child in &node.children {
                let mbr = &self.nodes[child].mbr;
                if target.overlaps(mbr) {
                    if let Some(point) = mbr.data_point() {
                        result.push(point);
                    }
                }
            }
            return;
        }

        for &child in &node.children {
            if self.nodes[child].mbr.overlaps(target) {
                self.collect_range(child, target, result);
            }
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn is_leaf_container(&self, node: &Node) -> bool {
        node.children
            .first()
            .is_some_and(|&child| self.nodes[child].is_data())
    }

    /// Descends by least enlargement, then least area, down to a leaf container.
    fn choose_leaf(&self, root: NodeId, entry: NodeId) -> NodeId {
        let rect = self.nodes[entry].mbr;
        let mut current = root;

        while !self.is_leaf_container(&self.nodes[current]) {
            let node = &self.nodes[current];
            debug_assert!(!node.children.is_empty(), "internal node without children");

            let best = node.children.iter().copied().min_by(|&a, &b| {
                let a = &self.nodes[a].mbr;
                let b = &self.nodes[b].mbr;
                a.union_area(&rect)
                    .total_cmp(&b.union_area(&rect))
                    .then_with(|| a.area().total_cmp(&b.area()))
            });

            match best {
                Some(child) => current = child,
                None => break,
            }
        }

        current
    }

    /// Appends `child` to `parent`, growing the parent's rectangle and height.
    fn attach(&mut self, parent: NodeId, child: NodeId) {
        let index = self.nodes[parent].children.len();
        let (child_mbr, child_height) = {
            let child = &mut self.nodes[child];
            child.parent = Some(parent);
            child.index = index;
            (child.mbr, child.height)
        };

        let parent = &mut self.nodes[parent];
        parent.children.push(child);
        parent.mbr = parent.mbr.union(&child_mbr);
        parent.height = parent.height.max(child_height + 1);
    }

    /// Pushes the growth of `node` up to the root.
    fn expand_ancestors(&mut self, mut node: NodeId) {
        while let Some(parent) = self.nodes[node].parent {
            let (mbr, height) = (self.nodes[node].mbr, self.nodes[node].height);
            let parent_node = &mut self.nodes[parent];
            parent_node.mbr = parent_node.mbr.union(&mbr);
            parent_node.height = parent_node.height.max(height + 1);
            node = parent;
        }
    }

    /// Inserts `entry` under `node`, splitting full nodes on the way up.
    fn add_and_split(&mut self, mut node: NodeId, mut entry: NodeId) {
        loop {
            if self.nodes[node].children.len() < self.max_keys_per_node {
                self.attach(node, entry);
                self.expand_ancestors(node);
                return;
            }

            let sibling = self.split(node, entry);

            match self.nodes[node].parent {
                Some(parent) => {
                    // `node` keeps its slot in the parent and now holds the
                    // first group, which may reach past the parent's old bounds.
                    let mbr = self.nodes[node].mbr;
                    self.nodes[parent].mbr.union_in_place(&mbr);
                    node = parent;
                    entry = sibling;
                }
                None => {
                    let extent = self.nodes[node].mbr;
                    let root = self.alloc(Node::container(extent));
                    self.attach(root, node);
                    self.attach(root, sibling);
                    self.root = Some(root);
                    log::debug!(
                        "root split: tree height is now {}",
                        self.nodes[root].height
                    );
                    return;
                }
            }
        }
    }

    /// Splits the full `node` plus `entry` into two groups.
    ///
    /// `node` is reused for the first group; the second group is a new node
    /// with no parent yet, and its id is returned.
    fn split(&mut self, node: NodeId, entry: NodeId) -> NodeId {
        let mut candidates: Vec<NodeId> = Vec::with_capacity(self.max_keys_per_node + 1);
        candidates.push(entry);
        candidates.extend(self.nodes[node].children.drain(..));

        let (first, second) = self.pick_seeds(&candidates);
        // second > first, so removing it first keeps `first` valid
        let seed2 = candidates.remove(second);
        let seed1 = candidates.remove(first);

        let group1 = node;
        let seed1_mbr = self.nodes[seed1].mbr;
        {
            let reused = &mut self.nodes[group1];
            reused.mbr = Rectangle::new(seed1_mbr.left_top(), seed1_mbr.right_bottom());
            reused.height = 0;
        }
        self.attach(group1, seed1);

        let seed2_mbr = self.nodes[seed2].mbr;
        let group2 = self.alloc(Node::container(seed2_mbr));
        self.attach(group2, seed2);

        self.distribute(group1, group2, candidates);

        debug_assert!(self.nodes[group1].children.len() >= self.min_keys_per_node);
        debug_assert!(self.nodes[group2].children.len() >= self.min_keys_per_node);

        group2
    }

    /// Index pair (i < j) whose union wastes the most area.
    fn pick_seeds(&self, candidates: &[NodeId]) -> (usize, usize) {
        let mut best = (0, 1);
        let mut max_area = f64::NEG_INFINITY;

        for (i, &a) in candidates.iter().enumerate() {
            for (j, &b) in candidates.iter().enumerate().skip(i + 1) {
                let area = self.nodes[a].mbr.union_area(&self.nodes[b].mbr);
                if area > max_area {
                    max_area = area;
                    best = (i, j);
                }
            }
        }

        best
    }

    /// Assigns the remaining candidates, last first, to the group that grows
    /// least. A group that can only reach the minimum fill by taking every
    /// unplaced candidate takes them all.
    fn distribute(&mut self, group1: NodeId, group2: NodeId, mut remaining: Vec<NodeId>) {
        while let Some(current) = remaining.pop() {
            let target = self.preferred_group(group1, group2, current);
            self.attach(target, current);

            let left = remaining.len();
            if self.nodes[group1].children.len() + left == self.min_keys_per_node {
                for candidate in remaining.drain(..) {
                    self.attach(group1, candidate);
                }
            } else if self.nodes[group2].children.len() + left == self.min_keys_per_node {
                for candidate in remaining.drain(..) {
                    self.attach(group2, candidate);
                }
            }
        }
    }

    fn preferred_group(&self, group1: NodeId, group2: NodeId, candidate: NodeId) -> NodeId {
        let rect = &self.nodes[candidate].mbr;
        let (g1, g2) = (&self.nodes[group1], &self.nodes[group2]);

        let grow1 = g1.mbr.union_area(rect);
        let grow2 = g2.mbr.union_area(rect);
        if grow1 != grow2 {
            return if grow1 < grow2 { group1 } else { group2 };
        }

        let area1 = g1.mbr.area();
        let area2 = g2.mbr.area();
        if area1 != area2 {
            return if area1 < area2 { group1 } else { group2 };
        }

        if g1.children.len() < g2.children.len() {
            group1
        } else {
            group2
        }
    }
}

impl Default for RTree {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_KEYS_PER_NODE)
    }
}

#[cfg(test)]
impl RTree {
    /// Walks the whole tree and reports the first structural violation.
    fn check_invariants(&self) -> Result<(), String> {
        let Some(root) = self.root else {
            return if self.count == 0 {
                Ok(())
            } else {
                Err(format!("empty tree with count {}", self.count))
            };
        };

        if self.nodes[root].parent.is_some() {
            return Err("root has a parent".to_string());
        }

        let mut data_depths = Vec::new();
        let mut stack = vec![(root, 0usize)];
        let mut data_nodes = 0;

        while let Some((id, depth)) = stack.pop() {
            let node = &self.nodes[id];

            if node.is_data() {
                if !node.children.is_empty() || node.height != 0 {
                    return Err(format!("data node {} has children or height", id));
                }
                data_nodes += 1;
                data_depths.push(depth);
                continue;
            }

            if node.children.is_empty() {
                return Err(format!("container {} has no children", id));
            }
            if node.children.len() > self.max_keys_per_node {
                return Err(format!("node {} is over-full", id));
            }
            if id != root && node.children.len() < self.min_keys_per_node {
                return Err(format!(
                    "node {} has {} children, minimum is {}",
                    id,
                    node.children.len(),
                    self.min_keys_per_node
                ));
            }

            let leaf = self.is_leaf_container(node);
            let mut union = self.nodes[node.children[0]].mbr;
            let mut max_height = 0;
            for (index, &child) in node.children.iter().enumerate() {
                let child_node = &self.nodes[child];
                if child_node.parent != Some(id) || child_node.index != index {
                    return Err(format!("child {} of {} has a stale back-reference", child, id));
                }
                if child_node.is_data() != leaf {
                    return Err(format!("node {} mixes data and containers", id));
                }
                union = union.union(&child_node.mbr);
                max_height = max_height.max(child_node.height);
                stack.push((child, depth + 1));
            }

            if !union.same_extent(&node.mbr) {
                return Err(format!(
                    "node {} mbr {} differs from children union {}",
                    id, node.mbr, union
                ));
            }
            if node.height != max_height + 1 {
                return Err(format!("node {} has stale height {}", id, node.height));
            }
        }

        if data_nodes != self.count {
            return Err(format!(
                "{} data nodes reachable, count is {}",
                data_nodes, self.count
            ));
        }
        if data_depths.iter().any(|&depth| depth != data_depths[0]) {
            return Err("data nodes at different depths".to_string());
        }

        Ok(())
    }
}
