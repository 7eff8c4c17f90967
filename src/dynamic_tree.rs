use crate::collision::{Aabb, RayCastInput};
use crate::common::{AABB_EXTENSION, AABB_MULTIPLIER};
use crate::math::Vec2;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TreeNodeConnection {
    None,
    /// Tree mode.
    Parent(usize),
    /// Linked-list mode, threading the free list.
    Next(usize),
}

/// A node in the dynamic tree. The client does not interact with this directly.
struct TreeNode<D> {
    /// Enlarged AABB
    aabb: Aabb,
    user_data: Option<D>,
    connection: TreeNodeConnection,
    child1: Option<usize>,
    child2: Option<usize>,
    /// Leaf = 0, free node = -1
    height: i32,
    moved: bool,
}

impl<D> TreeNode<D> {
    fn is_leaf(&self) -> bool {
        self.child1.is_none()
    }
}

/// A dynamic AABB tree broad-phase, inspired by Nathanael Presson's btDbvt.
/// A dynamic tree arranges data in a binary tree to accelerate
/// queries such as volume queries and ray casts. Leafs are proxies
/// with an AABB. In the tree we expand the proxy AABB by [`AABB_EXTENSION`]
/// so that the proxy AABB is bigger than the client object. This allows the
/// client object to move by small amounts without triggering a tree update.
///
/// Nodes are pooled and relocatable, so we use node indices rather than
/// pointers.
pub struct DynamicTree<D> {
    root: Option<usize>,
    nodes: Vec<TreeNode<D>>,
    free_list: Option<usize>,
    insertion_count: usize,
}

impl<D: Copy> DynamicTree<D> {
    pub fn new() -> Self {
        Self {
            root: None,
            nodes: Vec::new(),
            free_list: None,
            insertion_count: 0,
        }
    }

    fn allocate_node(&mut self) -> usize {
        match self.free_list {
            Some(index) => {
                self.free_list = match self.nodes[index].connection {
                    TreeNodeConnection::Next(next) => Some(next),
                    _ => None,
                };
                let node = &mut self.nodes[index];
                node.connection = TreeNodeConnection::None;
                node.child1 = None;
                node.child2 = None;
                node.height = 0;
                node.user_data = None;
                node.moved = false;
                index
            }
            None => {
                self.nodes.push(TreeNode {
                    aabb: Aabb::default(),
                    user_data: None,
                    connection: TreeNodeConnection::None,
                    child1: None,
                    child2: None,
                    height: 0,
                    moved: false,
                });
                self.nodes.len() - 1
            }
        }
    }

    fn free_node(&mut self, index: usize) {
        let node = &mut self.nodes[index];
        node.connection = match self.free_list {
            Some(next) => TreeNodeConnection::Next(next),
            None => TreeNodeConnection::None,
        };
        node.height = -1;
        node.user_data = None;
        self.free_list = Some(index);
    }

    /// Create a proxy. Provide a tight fitting AABB and user data.
    pub fn create_proxy(&mut self, aabb: &Aabb, user_data: D) -> usize {
        let proxy_id = self.allocate_node();

        // Fatten the aabb.
        let r = Vec2::splat(AABB_EXTENSION);
        let node = &mut self.nodes[proxy_id];
        node.aabb = Aabb::new(aabb.lower_bound - r, aabb.upper_bound + r);
        node.user_data = Some(user_data);
        node.height = 0;
        node.moved = true;

        self.insert_leaf(proxy_id);

        proxy_id
    }

    /// Destroy a proxy. This asserts if the id is invalid.
    pub fn destroy_proxy(&mut self, proxy_id: usize) {
        debug_assert!(self.nodes[proxy_id].is_leaf());
        self.remove_leaf(proxy_id);
        self.free_node(proxy_id);
    }

    /// Move a proxy with a swepted AABB. If the proxy has moved outside of
    /// its fattened AABB, then the proxy is removed from the tree and
    /// re-inserted. Otherwise the function returns immediately.
    ///
    /// Returns true if the proxy was re-inserted or still in the startup
    /// buffering window.
    pub fn move_proxy(&mut self, proxy_id: usize, aabb: &Aabb, displacement: Vec2) -> bool {
        debug_assert!(self.nodes[proxy_id].is_leaf());

        // Extend AABB
        let r = Vec2::splat(AABB_EXTENSION);
        let mut fat_aabb = Aabb::new(aabb.lower_bound - r, aabb.upper_bound + r);

        // Predict AABB movement
        let d = AABB_MULTIPLIER * displacement;

        if d.x < 0.0 {
            fat_aabb.lower_bound.x += d.x;
        } else {
            fat_aabb.upper_bound.x += d.x;
        }

        if d.y < 0.0 {
            fat_aabb.lower_bound.y += d.y;
        } else {
            fat_aabb.upper_bound.y += d.y;
        }

        let tree_aabb = self.nodes[proxy_id].aabb;
        if tree_aabb.contains(aabb) {
            // The tree AABB still contains the object, but it might be too
            // large. Perhaps the object was moving fast but has since gone
            // to sleep. A huge AABB is larger than the new fat AABB.
            let huge_aabb = Aabb::new(
                fat_aabb.lower_bound - 4.0 * r,
                fat_aabb.upper_bound + 4.0 * r,
            );

            if huge_aabb.contains(&tree_aabb) {
                // The tree AABB contains the object AABB and the tree AABB is
                // not too large. No tree update needed.
                return false;
            }

            // Otherwise the tree AABB is huge and needs to be shrunk.
        }

        self.remove_leaf(proxy_id);

        self.nodes[proxy_id].aabb = fat_aabb;
        self.insert_leaf(proxy_id);

        self.nodes[proxy_id].moved = true;

        true
    }

    pub fn get_user_data(&self, proxy_id: usize) -> D {
        self.nodes[proxy_id].user_data.expect("free tree node")
    }

    pub fn was_moved(&self, proxy_id: usize) -> bool {
        self.nodes[proxy_id].moved
    }

    pub fn clear_moved(&mut self, proxy_id: usize) {
        self.nodes[proxy_id].moved = false;
    }

    pub fn get_fat_aabb(&self, proxy_id: usize) -> Aabb {
        self.nodes[proxy_id].aabb
    }

    /// Compute the height of the binary tree in O(N) time. Should not be
    /// called often.
    pub fn get_height(&self) -> i32 {
        match self.root {
            Some(root) => self.nodes[root].height,
            None => 0,
        }
    }

    /// Query an AABB for overlapping proxies. The callback is invoked for
    /// each proxy that overlaps the supplied AABB; return false to
    /// terminate early.
    pub fn query<F: FnMut(usize) -> bool>(&self, aabb: &Aabb, mut callback: F) {
        let mut stack: Vec<usize> = Vec::with_capacity(64);
        if let Some(root) = self.root {
            stack.push(root);
        }

        while let Some(node_id) = stack.pop() {
            let node = &self.nodes[node_id];

            if crate::collision::test_overlap_aabb(&node.aabb, aabb) {
                if node.is_leaf() {
                    if !callback(node_id) {
                        return;
                    }
                } else {
                    stack.push(node.child1.unwrap());
                    stack.push(node.child2.unwrap());
                }
            }
        }
    }

    /// Ray-cast against the proxies in the tree. This relies on the callback
    /// to perform an exact ray-cast in the case were the proxy contains a
    /// shape. The callback also performs any collision filtering, and
    /// returns the new clip fraction (0 to terminate, `max_fraction` to
    /// continue unclipped).
    pub fn ray_cast<F: FnMut(&RayCastInput, usize) -> f32>(
        &self,
        input: &RayCastInput,
        mut callback: F,
    ) {
        let p1 = input.p1;
        let p2 = input.p2;
        let mut r = p2 - p1;
        debug_assert!(r.length_squared() > 0.0);
        r = r.normalize();

        // v is perpendicular to the segment.
        let v = Vec2::scalar_cross(1.0, r);
        let abs_v = v.abs();

        // Separating axis for segment (Gino, p80).
        // |dot(v, p1 - c)| > dot(|v|, h)

        let mut max_fraction = input.max_fraction;

        // Build a bounding box for the segment.
        let mut segment_aabb = {
            let t = p1 + max_fraction * (p2 - p1);
            Aabb::new(p1.min(t), p1.max(t))
        };

        let mut stack: Vec<usize> = Vec::with_capacity(64);
        if let Some(root) = self.root {
            stack.push(root);
        }

        while let Some(node_id) = stack.pop() {
            let node = &self.nodes[node_id];

            if !crate::collision::test_overlap_aabb(&node.aabb, &segment_aabb) {
                continue;
            }

            // Separating axis for segment (Gino, p80).
            // |dot(v, p1 - c)| > dot(|v|, h)
            let c = node.aabb.center();
            let h = node.aabb.extents();
            let separation = v.dot(p1 - c).abs() - abs_v.dot(h);
            if separation > 0.0 {
                continue;
            }

            if node.is_leaf() {
                let sub_input = RayCastInput {
                    p1: input.p1,
                    p2: input.p2,
                    max_fraction,
                };

                let value = callback(&sub_input, node_id);

                if value == 0.0 {
                    // The client has terminated the ray cast.
                    return;
                }

                if value > 0.0 {
                    // Update segment bounding box.
                    max_fraction = value;
                    let t = p1 + max_fraction * (p2 - p1);
                    segment_aabb = Aabb::new(p1.min(t), p1.max(t));
                }
            } else {
                stack.push(node.child1.unwrap());
                stack.push(node.child2.unwrap());
            }
        }
    }

    fn insert_leaf(&mut self, leaf: usize) {
        self.insertion_count += 1;

        let root = match self.root {
            None => {
                self.root = Some(leaf);
                self.nodes[leaf].connection = TreeNodeConnection::None;
                return;
            }
            Some(root) => root,
        };

        // Find the best sibling for this node.
        let leaf_aabb = self.nodes[leaf].aabb;
        let mut index = root;
        while !self.nodes[index].is_leaf() {
            let child1 = self.nodes[index].child1.unwrap();
            let child2 = self.nodes[index].child2.unwrap();

            let area = self.nodes[index].aabb.get_perimeter();

            let combined_aabb = self.nodes[index].aabb.combine(&leaf_aabb);
            let combined_area = combined_aabb.get_perimeter();

            // Cost of creating a new parent for this node and the new leaf.
            let cost = 2.0 * combined_area;

            // Minimum cost of pushing the leaf further down the tree.
            let inheritance_cost = 2.0 * (combined_area - area);

            // Cost of descending into child1.
            let cost1 = if self.nodes[child1].is_leaf() {
                let aabb = self.nodes[child1].aabb.combine(&leaf_aabb);
                aabb.get_perimeter() + inheritance_cost
            } else {
                let aabb = self.nodes[child1].aabb.combine(&leaf_aabb);
                let old_area = self.nodes[child1].aabb.get_perimeter();
                let new_area = aabb.get_perimeter();
                (new_area - old_area) + inheritance_cost
            };

            // Cost of descending into child2.
            let cost2 = if self.nodes[child2].is_leaf() {
                let aabb = self.nodes[child2].aabb.combine(&leaf_aabb);
                aabb.get_perimeter() + inheritance_cost
            } else {
                let aabb = self.nodes[child2].aabb.combine(&leaf_aabb);
                let old_area = self.nodes[child2].aabb.get_perimeter();
                let new_area = aabb.get_perimeter();
                (new_area - old_area) + inheritance_cost
            };

            // Descend according to the minimum cost.
            if cost < cost1 && cost < cost2 {
                break;
            }

            // Descend
            index = if cost1 < cost2 { child1 } else { child2 };
        }

        let sibling = index;

        // Create a new parent.
        let old_parent = self.nodes[sibling].connection;
        let new_parent = self.allocate_node();
        self.nodes[new_parent].connection = old_parent;
        self.nodes[new_parent].aabb = self.nodes[sibling].aabb.combine(&leaf_aabb);
        self.nodes[new_parent].height = self.nodes[sibling].height + 1;

        if let TreeNodeConnection::Parent(old_parent) = old_parent {
            // The sibling was not the root.
            if self.nodes[old_parent].child1 == Some(sibling) {
                self.nodes[old_parent].child1 = Some(new_parent);
            } else {
                self.nodes[old_parent].child2 = Some(new_parent);
            }
        } else {
            // The sibling was the root.
            self.root = Some(new_parent);
        }
        self.nodes[new_parent].child1 = Some(sibling);
        self.nodes[new_parent].child2 = Some(leaf);
        self.nodes[sibling].connection = TreeNodeConnection::Parent(new_parent);
        self.nodes[leaf].connection = TreeNodeConnection::Parent(new_parent);

        // Walk back up the tree fixing heights and AABBs.
        let mut walk = self.nodes[leaf].connection;
        while let TreeNodeConnection::Parent(index) = walk {
            let index = self.balance(index);

            let child1 = self.nodes[index].child1.unwrap();
            let child2 = self.nodes[index].child2.unwrap();

            self.nodes[index].height =
                1 + self.nodes[child1].height.max(self.nodes[child2].height);
            self.nodes[index].aabb = self.nodes[child1].aabb.combine(&self.nodes[child2].aabb);

            walk = self.nodes[index].connection;
        }
    }

    fn remove_leaf(&mut self, leaf: usize) {
        if self.root == Some(leaf) {
            self.root = None;
            return;
        }

        let parent = match self.nodes[leaf].connection {
            TreeNodeConnection::Parent(p) => p,
            _ => unreachable!("leaf has no parent"),
        };
        let grand_parent = self.nodes[parent].connection;
        let sibling = if self.nodes[parent].child1 == Some(leaf) {
            self.nodes[parent].child2.unwrap()
        } else {
            self.nodes[parent].child1.unwrap()
        };

        if let TreeNodeConnection::Parent(grand_parent) = grand_parent {
            // Destroy parent and connect sibling to grandParent.
            if self.nodes[grand_parent].child1 == Some(parent) {
                self.nodes[grand_parent].child1 = Some(sibling);
            } else {
                self.nodes[grand_parent].child2 = Some(sibling);
            }
            self.nodes[sibling].connection = TreeNodeConnection::Parent(grand_parent);
            self.free_node(parent);

            // Adjust ancestor bounds.
            let mut walk = Some(grand_parent);
            while let Some(index) = walk {
                let index = self.balance(index);

                let child1 = self.nodes[index].child1.unwrap();
                let child2 = self.nodes[index].child2.unwrap();

                self.nodes[index].aabb =
                    self.nodes[child1].aabb.combine(&self.nodes[child2].aabb);
                self.nodes[index].height =
                    1 + self.nodes[child1].height.max(self.nodes[child2].height);

                walk = match self.nodes[index].connection {
                    TreeNodeConnection::Parent(p) => Some(p),
                    _ => None,
                };
            }
        } else {
            self.root = Some(sibling);
            self.nodes[sibling].connection = TreeNodeConnection::None;
            self.free_node(parent);
        }
    }

    // Perform a left or right rotation if node A is imbalanced.
    // Returns the new subtree root index.
    fn balance(&mut self, i_a: usize) -> usize {
        if self.nodes[i_a].is_leaf() || self.nodes[i_a].height < 2 {
            return i_a;
        }

        let i_b = self.nodes[i_a].child1.unwrap();
        let i_c = self.nodes[i_a].child2.unwrap();

        let balance = self.nodes[i_c].height - self.nodes[i_b].height;

        // Rotate C up
        if balance > 1 {
            let i_f = self.nodes[i_c].child1.unwrap();
            let i_g = self.nodes[i_c].child2.unwrap();

            // Swap A and C
            self.nodes[i_c].child1 = Some(i_a);
            self.nodes[i_c].connection = self.nodes[i_a].connection;
            self.nodes[i_a].connection = TreeNodeConnection::Parent(i_c);

            // A's old parent should point to C
            if let TreeNodeConnection::Parent(i_parent) = self.nodes[i_c].connection {
                if self.nodes[i_parent].child1 == Some(i_a) {
                    self.nodes[i_parent].child1 = Some(i_c);
                } else {
                    debug_assert!(self.nodes[i_parent].child2 == Some(i_a));
                    self.nodes[i_parent].child2 = Some(i_c);
                }
            } else {
                self.root = Some(i_c);
            }

            // Rotate
            if self.nodes[i_f].height > self.nodes[i_g].height {
                self.nodes[i_c].child2 = Some(i_f);
                self.nodes[i_a].child2 = Some(i_g);
                self.nodes[i_g].connection = TreeNodeConnection::Parent(i_a);
                self.nodes[i_a].aabb = self.nodes[i_b].aabb.combine(&self.nodes[i_g].aabb);
                self.nodes[i_c].aabb = self.nodes[i_a].aabb.combine(&self.nodes[i_f].aabb);

                self.nodes[i_a].height =
                    1 + self.nodes[i_b].height.max(self.nodes[i_g].height);
                self.nodes[i_c].height =
                    1 + self.nodes[i_a].height.max(self.nodes[i_f].height);
            } else {
                self.nodes[i_c].child2 = Some(i_g);
                self.nodes[i_a].child2 = Some(i_f);
                self.nodes[i_f].connection = TreeNodeConnection::Parent(i_a);
                self.nodes[i_a].aabb = self.nodes[i_b].aabb.combine(&self.nodes[i_f].aabb);
                self.nodes[i_c].aabb = self.nodes[i_a].aabb.combine(&self.nodes[i_g].aabb);

                self.nodes[i_a].height =
                    1 + self.nodes[i_b].height.max(self.nodes[i_f].height);
                self.nodes[i_c].height =
                    1 + self.nodes[i_a].height.max(self.nodes[i_g].height);
            }

            return i_c;
        }

        // Rotate B up
        if balance < -1 {
            let i_d = self.nodes[i_b].child1.unwrap();
            let i_e = self.nodes[i_b].child2.unwrap();

            // Swap A and B
            self.nodes[i_b].child1 = Some(i_a);
            self.nodes[i_b].connection = self.nodes[i_a].connection;
            self.nodes[i_a].connection = TreeNodeConnection::Parent(i_b);

            // A's old parent should point to B
            if let TreeNodeConnection::Parent(i_parent) = self.nodes[i_b].connection {
                if self.nodes[i_parent].child1 == Some(i_a) {
                    self.nodes[i_parent].child1 = Some(i_b);
                } else {
                    debug_assert!(self.nodes[i_parent].child2 == Some(i_a));
                    self.nodes[i_parent].child2 = Some(i_b);
                }
            } else {
                self.root = Some(i_b);
            }

            // Rotate
            if self.nodes[i_d].height > self.nodes[i_e].height {
                self.nodes[i_b].child2 = Some(i_d);
                self.nodes[i_a].child1 = Some(i_e);
                self.nodes[i_e].connection = TreeNodeConnection::Parent(i_a);
                self.nodes[i_a].aabb = self.nodes[i_c].aabb.combine(&self.nodes[i_e].aabb);
                self.nodes[i_b].aabb = self.nodes[i_a].aabb.combine(&self.nodes[i_d].aabb);

                self.nodes[i_a].height =
                    1 + self.nodes[i_c].height.max(self.nodes[i_e].height);
                self.nodes[i_b].height =
                    1 + self.nodes[i_a].height.max(self.nodes[i_d].height);
            } else {
                self.nodes[i_b].child2 = Some(i_e);
                self.nodes[i_a].child1 = Some(i_d);
                self.nodes[i_d].connection = TreeNodeConnection::Parent(i_a);
                self.nodes[i_a].aabb = self.nodes[i_c].aabb.combine(&self.nodes[i_d].aabb);
                self.nodes[i_b].aabb = self.nodes[i_a].aabb.combine(&self.nodes[i_e].aabb);

                self.nodes[i_a].height =
                    1 + self.nodes[i_c].height.max(self.nodes[i_d].height);
                self.nodes[i_b].height =
                    1 + self.nodes[i_a].height.max(self.nodes[i_e].height);
            }

            return i_b;
        }

        i_a
    }

    /// Shift the world origin. Useful for large worlds.
    pub fn shift_origin(&mut self, new_origin: Vec2) {
        for node in &mut self.nodes {
            if node.height >= 0 {
                node.aabb.lower_bound -= new_origin;
                node.aabb.upper_bound -= new_origin;
            }
        }
    }
}

impl<D: Copy> Default for DynamicTree<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_aabb(center: Vec2) -> Aabb {
        Aabb::new(center - Vec2::splat(0.5), center + Vec2::splat(0.5))
    }

    #[test]
    fn query_finds_only_overlapping() {
        let mut tree: DynamicTree<u32> = DynamicTree::new();
        for i in 0..16 {
            tree.create_proxy(&unit_aabb(Vec2::new(3.0 * i as f32, 0.0)), i);
        }

        let mut hits = Vec::new();
        tree.query(&unit_aabb(Vec2::new(6.0, 0.0)), |proxy| {
            hits.push(tree.get_user_data(proxy));
            true
        });
        assert_eq!(hits, vec![2]);
    }

    #[test]
    fn removal_keeps_tree_usable() {
        let mut tree: DynamicTree<u32> = DynamicTree::new();
        let ids: Vec<usize> = (0..8)
            .map(|i| tree.create_proxy(&unit_aabb(Vec2::new(i as f32, 0.0)), i))
            .collect();
        for &id in ids.iter().step_by(2) {
            tree.destroy_proxy(id);
        }
        let mut count = 0;
        tree.query(
            &Aabb::new(Vec2::new(-10.0, -10.0), Vec2::new(10.0, 10.0)),
            |_| {
                count += 1;
                true
            },
        );
        assert_eq!(count, 4);
    }

    #[test]
    fn small_move_stays_buffered() {
        let mut tree: DynamicTree<u32> = DynamicTree::new();
        let id = tree.create_proxy(&unit_aabb(Vec2::ZERO), 0);
        // Within the fat AABB: no reinsertion.
        let moved = tree.move_proxy(id, &unit_aabb(Vec2::new(0.01, 0.0)), Vec2::new(0.01, 0.0));
        assert!(!moved);
        // A large move forces a reinsertion.
        let moved = tree.move_proxy(id, &unit_aabb(Vec2::new(5.0, 0.0)), Vec2::new(5.0, 0.0));
        assert!(moved);
    }

    #[test]
    fn ray_cast_visits_proxies_on_path() {
        let mut tree: DynamicTree<u32> = DynamicTree::new();
        for i in 0..4 {
            tree.create_proxy(&unit_aabb(Vec2::new(2.0 * i as f32, 0.0)), i);
        }
        tree.create_proxy(&unit_aabb(Vec2::new(0.0, 50.0)), 99);

        let mut seen = Vec::new();
        tree.ray_cast(
            &RayCastInput {
                p1: Vec2::new(-2.0, 0.0),
                p2: Vec2::new(10.0, 0.0),
                max_fraction: 1.0,
            },
            |input, proxy| {
                seen.push(tree.get_user_data(proxy));
                input.max_fraction
            },
        );
        seen.sort();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }
}
