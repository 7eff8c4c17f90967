use crate::collision::{test_overlap_aabb, Aabb, RayCastInput};
use crate::dynamic_tree::DynamicTree;
use crate::math::Vec2;

/// The broad-phase is used for computing pairs and performing volume
/// queries and ray casts. It maintains a buffer of proxies that moved
/// since the last call to [`BroadPhase::update_pairs`], so that pair
/// enumeration only touches what changed.
pub struct BroadPhase<D> {
    pub tree: DynamicTree<D>,
    move_buffer: Vec<Option<usize>>,
    pair_buffer: Vec<(usize, usize)>,
}

impl<D: Copy> BroadPhase<D> {
    pub fn new() -> Self {
        Self {
            tree: DynamicTree::new(),
            move_buffer: Vec::new(),
            pair_buffer: Vec::new(),
        }
    }

    /// Create a proxy with an initial AABB. Pairs are not reported until
    /// [`BroadPhase::update_pairs`] is called.
    pub fn create_proxy(&mut self, aabb: &Aabb, user_data: D) -> usize {
        let proxy_id = self.tree.create_proxy(aabb, user_data);
        self.move_buffer.push(Some(proxy_id));
        proxy_id
    }

    pub fn destroy_proxy(&mut self, proxy_id: usize) {
        // Drop any buffered move so update_pairs never touches a freed id.
        for entry in &mut self.move_buffer {
            if *entry == Some(proxy_id) {
                *entry = None;
            }
        }
        self.tree.destroy_proxy(proxy_id);
    }

    /// Call `move_proxy` as many times as you like, then call `update_pairs`
    /// to finalize the proxy pairs (for your time step).
    pub fn move_proxy(&mut self, proxy_id: usize, aabb: &Aabb, displacement: Vec2) {
        let buffer = self.tree.move_proxy(proxy_id, aabb, displacement);
        if buffer {
            self.move_buffer.push(Some(proxy_id));
        }
    }

    /// Call to trigger a re-processing of its pairs on the next call to
    /// `update_pairs`.
    pub fn touch_proxy(&mut self, proxy_id: usize) {
        self.move_buffer.push(Some(proxy_id));
    }

    pub fn get_fat_aabb(&self, proxy_id: usize) -> Aabb {
        self.tree.get_fat_aabb(proxy_id)
    }

    pub fn get_user_data(&self, proxy_id: usize) -> D {
        self.tree.get_user_data(proxy_id)
    }

    /// Test overlap of the fat AABBs of two proxies.
    pub fn test_overlap(&self, proxy_id_a: usize, proxy_id_b: usize) -> bool {
        let aabb_a = self.tree.get_fat_aabb(proxy_id_a);
        let aabb_b = self.tree.get_fat_aabb(proxy_id_b);
        test_overlap_aabb(&aabb_a, &aabb_b)
    }

    /// Get the number of proxies currently buffered as moved.
    pub fn move_count(&self) -> usize {
        self.move_buffer.iter().filter(|e| e.is_some()).count()
    }

    /// Update the pairs. This results in pair callbacks. This can only add
    /// pairs. The callback receives the user data of both proxies; each
    /// newly-overlapping pair is reported exactly once.
    pub fn update_pairs<F: FnMut(D, D)>(&mut self, mut callback: F) {
        // Reset pair buffer.
        self.pair_buffer.clear();

        // Perform tree queries for all moving proxies.
        let tree = &self.tree;
        let pair_buffer = &mut self.pair_buffer;
        for entry in self.move_buffer.iter() {
            let query_proxy_id = match entry {
                Some(id) => *id,
                None => continue,
            };

            // We have to query the tree with the fat AABB so that
            // we don't fail to create a pair that may touch later.
            let fat_aabb = tree.get_fat_aabb(query_proxy_id);

            // Query tree, create pairs and add them to the pair buffer.
            tree.query(&fat_aabb, |proxy_id| {
                // A proxy cannot form a pair with itself.
                if proxy_id == query_proxy_id {
                    return true;
                }

                // Both proxies moving: only report from the lower id so the
                // pair is buffered once.
                if tree.was_moved(proxy_id) && proxy_id > query_proxy_id {
                    return true;
                }

                pair_buffer.push((
                    query_proxy_id.min(proxy_id),
                    query_proxy_id.max(proxy_id),
                ));
                true
            });
        }

        // Send pairs to caller, skipping duplicates from overlapping
        // queries.
        self.pair_buffer.sort_unstable();
        self.pair_buffer.dedup();
        for &(proxy_a, proxy_b) in &self.pair_buffer {
            let user_data_a = self.tree.get_user_data(proxy_a);
            let user_data_b = self.tree.get_user_data(proxy_b);
            callback(user_data_a, user_data_b);
        }

        // Clear move flags and reset the buffer.
        for entry in self.move_buffer.iter() {
            if let Some(id) = entry {
                self.tree.clear_moved(*id);
            }
        }
        self.move_buffer.clear();
    }

    pub fn query<F: FnMut(usize) -> bool>(&self, aabb: &Aabb, callback: F) {
        self.tree.query(aabb, callback);
    }

    pub fn ray_cast<F: FnMut(&RayCastInput, usize) -> f32>(
        &self,
        input: &RayCastInput,
        callback: F,
    ) {
        self.tree.ray_cast(input, callback);
    }

    pub fn shift_origin(&mut self, new_origin: Vec2) {
        self.tree.shift_origin(new_origin);
    }
}

impl<D: Copy> Default for BroadPhase<D> {
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
    fn new_overlap_reported_once() {
        let mut bp: BroadPhase<u32> = BroadPhase::new();
        bp.create_proxy(&unit_aabb(Vec2::ZERO), 1);
        bp.create_proxy(&unit_aabb(Vec2::new(0.3, 0.0)), 2);

        let mut pairs = Vec::new();
        bp.update_pairs(|a, b| pairs.push((a.min(b), a.max(b))));
        assert_eq!(pairs, vec![(1, 2)]);

        // No movement, no new pairs.
        pairs.clear();
        bp.update_pairs(|a, b| pairs.push((a, b)));
        assert!(pairs.is_empty());
    }

    #[test]
    fn moving_into_overlap_creates_pair() {
        let mut bp: BroadPhase<u32> = BroadPhase::new();
        let a = bp.create_proxy(&unit_aabb(Vec2::ZERO), 1);
        bp.create_proxy(&unit_aabb(Vec2::new(10.0, 0.0)), 2);
        let mut pairs = Vec::new();
        bp.update_pairs(|a, b| pairs.push((a, b)));
        assert!(pairs.is_empty());

        bp.move_proxy(a, &unit_aabb(Vec2::new(9.6, 0.0)), Vec2::new(9.6, 0.0));
        bp.update_pairs(|a, b| pairs.push((a.min(b), a.max(b))));
        assert_eq!(pairs, vec![(1, 2)]);
    }
}
