//! Procedural level generation
//!
//! A level is a forest of line segments grown from `level + 1` random
//! anchors, no two closer than the minimum edge length and capped by how
//! many the field can hold at that spacing. Consecutive anchors are joined by a base edge, then every anchor
//! sprouts two "spider" chains: random hops that keep going with a
//! probability that halves at each hop. Candidate hops that are too short,
//! leave the field, or land too close to an existing vertex are resampled a
//! bounded number of times before the chain gives up.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::Rng;
use rand_distr::StandardNormal;

use super::segment::Segment;
use crate::polar_to_cartesian;
use crate::tuning::Tuning;

/// Continuation probability a fresh spider chain starts with
pub const SPIDER_START_PROBABILITY: f64 = 0.8;
/// Chains grown from every anchor
pub const SPIDERS_PER_ANCHOR: usize = 2;
/// Samples tried before a hop is abandoned
pub const MAX_ATTEMPTS: u32 = 16;
/// Samples tried before anchor placement stops for the level
pub const MAX_ANCHOR_ATTEMPTS: u32 = 256;
/// Min-edge grid cells reserved per anchor. A quarter of the grid is sparse
/// enough for rejection sampling to fill reliably.
pub const CELLS_PER_ANCHOR: usize = 4;
/// Hop distance is scaled by the smaller field dimension over this
pub const SPREAD_DIVISOR: f32 = 4.0;

/// Anchor points placed in the current level, used for spacing checks
#[derive(Debug, Clone, Default)]
pub struct VertexSet {
    points: Vec<Vec2>,
}

impl VertexSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a vertex (exact duplicates are stored once)
    pub fn insert(&mut self, p: Vec2) {
        if !self.points.contains(&p) {
            self.points.push(p);
        }
    }

    /// True if any vertex lies closer than `min_dist` to `p`
    pub fn near(&self, p: Vec2, min_dist: f32) -> bool {
        self.points.iter().any(|v| v.distance(p) < min_dist)
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Everything one generation pass produced
#[derive(Debug, Clone, Default)]
pub struct LevelLayout {
    pub anchors: Vec<Vec2>,
    /// Number of anchor-to-anchor edges at the front of `segments`
    pub base_edges: usize,
    /// All edges in creation order
    pub segments: Vec<Segment>,
    /// Spider chains that placed at least one edge
    pub chains: usize,
}

/// Grows a level's segment graph
pub struct LevelGenerator<'a, R: Rng + ?Sized> {
    tuning: &'a Tuning,
    rng: &'a mut R,
    vertices: &'a mut VertexSet,
    min_edge: f32,
    spread: f32,
    anchor_capacity: usize,
}

impl<'a, R: Rng + ?Sized> LevelGenerator<'a, R> {
    pub fn new(tuning: &'a Tuning, rng: &'a mut R, vertices: &'a mut VertexSet) -> Self {
        let size = tuning.field_size();
        Self {
            tuning,
            rng,
            vertices,
            min_edge: tuning.min_edge(),
            spread: size.x.min(size.y) / SPREAD_DIVISOR,
            anchor_capacity: anchor_capacity(tuning),
        }
    }

    /// Most anchors a level places, however high the level
    pub fn anchor_capacity(&self) -> usize {
        self.anchor_capacity
    }

    /// Generate the layout for `level`
    pub fn generate(mut self, level: u32) -> LevelLayout {
        let mut layout = LevelLayout::default();

        let wanted = (level as usize + 1).min(self.anchor_capacity);
        for _ in 0..wanted {
            let Some(anchor) = self.place_anchor(&layout.anchors) else {
                log::debug!("Field full after {} anchors", layout.anchors.len());
                break;
            };
            if let Some(&prev) = layout.anchors.last() {
                self.add_edge(prev, anchor, &mut layout);
                layout.base_edges += 1;
            }
            layout.anchors.push(anchor);
        }

        for i in 0..layout.anchors.len() {
            let anchor = layout.anchors[i];
            for _ in 0..SPIDERS_PER_ANCHOR {
                if self.spider(anchor, &mut layout) > 0 {
                    layout.chains += 1;
                }
            }
        }

        log::debug!(
            "Level {}: {} anchors, {} edges, {} chains",
            level,
            layout.anchors.len(),
            layout.segments.len(),
            layout.chains
        );
        layout
    }

    /// Uniform point strictly inside the field and at least `min_edge` from
    /// every anchor in `placed`, or `None` once `MAX_ANCHOR_ATTEMPTS` samples
    /// all miss
    fn place_anchor(&mut self, placed: &[Vec2]) -> Option<Vec2> {
        let size = self.tuning.field_size();
        for _ in 0..MAX_ANCHOR_ATTEMPTS {
            let p = Vec2::new(
                self.rng.random::<f32>() * size.x,
                self.rng.random::<f32>() * size.y,
            );
            if self.tuning.in_bounds(p) && placed.iter().all(|a| a.distance(p) >= self.min_edge) {
                self.vertices.insert(p);
                return Some(p);
            }
        }
        None
    }

    /// Grow one chain from `start`; returns the number of edges placed
    fn spider(&mut self, start: Vec2, layout: &mut LevelLayout) -> usize {
        let mut from = start;
        let mut prob = SPIDER_START_PROBABILITY;
        let mut placed = 0;

        loop {
            let Some(end) = self.sample_hop(from, prob) else {
                log::trace!("spider gave up after {} edges", placed);
                return placed;
            };
            self.add_edge(from, end, layout);
            placed += 1;

            if self.rng.random::<f64>() >= prob {
                return placed;
            }
            from = end;
            prob /= 2.0;
        }
    }

    /// Pick an acceptable hop endpoint from `from`, or `None` to give up
    fn sample_hop(&mut self, from: Vec2, prob: f64) -> Option<Vec2> {
        for _ in 0..MAX_ATTEMPTS {
            let angle = self.rng.random::<f32>() * TAU;
            let gauss: f64 = self.rng.sample(StandardNormal);
            let dist = (gauss * prob) as f32 * self.spread;
            let end = from + polar_to_cartesian(dist, angle);

            if dist < self.min_edge
                || !self.tuning.in_bounds(end)
                || self.vertices.near(end, self.min_edge)
            {
                continue;
            }
            return Some(end);
        }
        None
    }

    fn add_edge(&mut self, a: Vec2, b: Vec2, layout: &mut LevelLayout) {
        self.vertices.insert(a);
        self.vertices.insert(b);
        layout.segments.push(Segment::new(a, b));
    }
}

/// One anchor per `CELLS_PER_ANCHOR` cells of a min-edge grid over the field
fn anchor_capacity(tuning: &Tuning) -> usize {
    let min_edge = tuning.min_edge().max(1.0);
    let size = tuning.field_size();
    let cells = (size.x / min_edge) as usize * (size.y / min_edge) as usize;
    (cells / CELLS_PER_ANCHOR).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn generate(seed: u64, level: u32) -> (LevelLayout, Tuning) {
        let tuning = Tuning::default();
        let mut rng = Pcg32::seed_from_u64(seed);
        let mut vertices = VertexSet::new();
        let layout = LevelGenerator::new(&tuning, &mut rng, &mut vertices).generate(level);
        (layout, tuning)
    }

    #[test]
    fn test_level_zero_single_anchor() {
        for seed in 0..50 {
            let (layout, _) = generate(seed, 0);
            assert_eq!(layout.anchors.len(), 1);
            assert_eq!(layout.base_edges, 0);
            assert!(layout.chains <= 2);
            // Every chain starts at the only anchor
            if let Some(first) = layout.segments.first() {
                assert_eq!(first.a, layout.anchors[0]);
            }
        }
    }

    #[test]
    fn test_anchor_count_and_base_edges() {
        let (layout, _) = generate(7, 5);
        assert_eq!(layout.anchors.len(), 6);
        assert_eq!(layout.base_edges, 5);
        for (i, seg) in layout.segments.iter().take(layout.base_edges).enumerate() {
            assert_eq!(seg.a, layout.anchors[i]);
            assert_eq!(seg.b, layout.anchors[i + 1]);
        }
    }

    #[test]
    fn test_same_seed_same_level() {
        let (a, _) = generate(1234, 3);
        let (b, _) = generate(1234, 3);
        assert_eq!(a.anchors, b.anchors);
        assert_eq!(a.segments, b.segments);
    }

    fn assert_anchors_spaced(layout: &LevelLayout, min_edge: f32) {
        for (i, a) in layout.anchors.iter().enumerate() {
            for b in &layout.anchors[i + 1..] {
                assert!(a.distance(*b) >= min_edge, "anchors {:?} and {:?} too close", a, b);
            }
        }
    }

    #[test]
    fn test_anchor_capacity_default_field() {
        let tuning = Tuning::default();
        let mut rng = Pcg32::seed_from_u64(0);
        let mut vertices = VertexSet::new();
        // 18 x 12 cells of size 3, one anchor per 4 cells
        assert_eq!(
            LevelGenerator::new(&tuning, &mut rng, &mut vertices).anchor_capacity(),
            54
        );
    }

    #[test]
    fn test_deep_levels_cap_anchors_and_keep_spacing() {
        for seed in [1, 64, 777] {
            let (layout, tuning) = generate(seed, 500);
            assert!(!layout.anchors.is_empty());
            assert!(layout.anchors.len() <= 54);
            assert_eq!(layout.base_edges, layout.anchors.len() - 1);
            assert_anchors_spaced(&layout, tuning.min_edge());
        }
    }

    #[test]
    fn test_vertex_set() {
        let mut set = VertexSet::new();
        assert!(set.is_empty());
        set.insert(Vec2::new(1.0, 1.0));
        set.insert(Vec2::new(1.0, 1.0));
        assert_eq!(set.len(), 1);
        assert!(set.near(Vec2::new(2.0, 1.0), 3.0));
        assert!(!set.near(Vec2::new(5.0, 1.0), 3.0));
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn test_crowded_field_gives_up_cleanly() {
        // Pre-fill the vertex set so almost every hop lands too close
        let tuning = Tuning::default();
        let mut vertices = VertexSet::new();
        for x in 1..56 {
            for y in 1..36 {
                vertices.insert(Vec2::new(x as f32, y as f32));
            }
        }
        let before = vertices.len();
        let mut rng = Pcg32::seed_from_u64(99);
        let layout = LevelGenerator::new(&tuning, &mut rng, &mut vertices).generate(0);

        assert_eq!(layout.anchors.len(), 1);
        assert!(layout.segments.is_empty());
        assert_eq!(layout.chains, 0);
        // Only the anchor itself may have been added
        assert!(vertices.len() <= before + 1);
    }

    proptest! {
        #[test]
        fn prop_endpoints_strictly_inside(seed in any::<u64>(), level in 0u32..12) {
            let (layout, tuning) = generate(seed, level);
            for seg in &layout.segments {
                prop_assert!(tuning.in_bounds(seg.a));
                prop_assert!(tuning.in_bounds(seg.b));
            }
        }

        #[test]
        fn prop_spider_edges_respect_spacing(seed in any::<u64>(), level in 0u32..12) {
            let (layout, tuning) = generate(seed, level);
            let min_edge = tuning.min_edge();

            // Replay creation order: each spider endpoint must be clear of every
            // distinct vertex placed before it
            let mut placed: Vec<Vec2> = layout.anchors.clone();
            for seg in layout.segments.iter().skip(layout.base_edges) {
                prop_assert!(seg.length() >= min_edge - 1e-3);
                for v in &placed {
                    prop_assert!(v.distance(seg.b) >= min_edge);
                }
                placed.push(seg.b);
            }
        }

        #[test]
        fn prop_anchors_respect_spacing(seed in any::<u64>(), level in 0u32..80) {
            let (layout, tuning) = generate(seed, level);
            let min_edge = tuning.min_edge();
            for (i, a) in layout.anchors.iter().enumerate() {
                for b in &layout.anchors[i + 1..] {
                    prop_assert!(a.distance(*b) >= min_edge);
                }
            }
        }

        #[test]
        fn prop_chains_are_connected(seed in any::<u64>(), level in 0u32..12) {
            let (layout, _) = generate(seed, level);
            let mut known: Vec<Vec2> = layout.anchors.clone();
            for seg in &layout.segments {
                prop_assert!(known.contains(&seg.a));
                known.push(seg.b);
            }
        }
    }
}
