//! Barnes-Hut octree over node positions.
//!
//! Cells live in a flat arena; a subdivided cell owns the 8 consecutive cells starting at
//! `first_child`. Every cell keeps the point count and running center of mass of everything
//! inserted beneath it, so a far-away cell can stand in for all of its points at once.

use crate::math::Vector3D;
use crate::rng::XorShift64Star;
use rand::Rng;

/// Distance floor for repulsion (and energy) terms.
pub const MIN_DISTANCE: f64 = 0.001;

/// Subdivision limit. Coincident points would otherwise split forever; at this depth a leaf keeps
/// every point that reaches it.
const MAX_DEPTH: u32 = 24;

const BOUNDS_MARGIN: f64 = 0.01;
const MIN_HALF_WIDTH: f64 = 0.5;

/// Axis-aligned cube, stored as its min corner and side length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    min: Vector3D,
    width: f64,
}

impl Bounds {
    pub fn new(min: Vector3D, width: f64) -> Self {
        Self { min, width }
    }

    /// Smallest margin-padded cube around `points` (non-finite points are ignored).
    pub fn enclosing(points: &[Vector3D]) -> Self {
        let mut lo = Vector3D::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
        let mut hi = Vector3D::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in points.iter().filter(|p| p.is_finite()) {
            lo = Vector3D::new(lo.x.min(p.x), lo.y.min(p.y), lo.z.min(p.z));
            hi = Vector3D::new(hi.x.max(p.x), hi.y.max(p.y), hi.z.max(p.z));
        }
        if !(lo.is_finite() && hi.is_finite()) {
            return Self::new(Vector3D::new(-1.0, -1.0, -1.0), 2.0);
        }
        let center = (lo + hi) * 0.5;
        let extent = (hi.x - lo.x).max(hi.y - lo.y).max(hi.z - lo.z);
        let half = (extent * 0.5 * (1.0 + BOUNDS_MARGIN)).max(MIN_HALF_WIDTH);
        Self::new(center - Vector3D::new(half, half, half), half * 2.0)
    }

    pub fn min(&self) -> Vector3D {
        self.min
    }

    pub fn max(&self) -> Vector3D {
        self.min + Vector3D::new(self.width, self.width, self.width)
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn center(&self) -> Vector3D {
        let h = self.width / 2.0;
        self.min + Vector3D::new(h, h, h)
    }

    pub fn contains(&self, p: Vector3D) -> bool {
        let eps = self.width * 1e-12;
        let max = self.max();
        p.x >= self.min.x - eps
            && p.y >= self.min.y - eps
            && p.z >= self.min.z - eps
            && p.x <= max.x + eps
            && p.y <= max.y + eps
            && p.z <= max.z + eps
    }

    fn octant(&self, p: Vector3D) -> usize {
        let c = self.center();
        usize::from(p.x >= c.x) | (usize::from(p.y >= c.y) << 1) | (usize::from(p.z >= c.z) << 2)
    }

    fn child(&self, octant: usize) -> Self {
        let h = self.width / 2.0;
        let pick = |bit: usize| if octant & bit != 0 { h } else { 0.0 };
        Self::new(self.min + Vector3D::new(pick(1), pick(2), pick(4)), h)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub node: usize,
    pub position: Vector3D,
}

#[derive(Debug, Clone)]
pub struct Cell {
    bounds: Bounds,
    depth: u32,
    mass: f64,
    center_of_mass: Vector3D,
    first_child: Option<usize>,
    body: Option<Body>,
    // Only populated at `MAX_DEPTH`.
    overflow: Vec<Body>,
}

impl Cell {
    fn empty(bounds: Bounds, depth: u32) -> Self {
        Self {
            bounds,
            depth,
            mass: 0.0,
            center_of_mass: Vector3D::ZERO,
            first_child: None,
            body: None,
            overflow: Vec::new(),
        }
    }

    fn absorb(&mut self, p: Vector3D) {
        self.mass += 1.0;
        self.center_of_mass = self.center_of_mass + (p - self.center_of_mass) * (1.0 / self.mass);
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn center_of_mass(&self) -> Vector3D {
        self.center_of_mass
    }

    pub fn is_leaf(&self) -> bool {
        self.first_child.is_none()
    }

    /// Arena indices of the 8 children, if subdivided.
    pub fn children(&self) -> Option<std::ops::Range<usize>> {
        self.first_child.map(|first| first..first + 8)
    }

    /// Points stored directly in this cell (empty for internal cells).
    pub fn bodies(&self) -> impl Iterator<Item = &Body> {
        self.body.iter().chain(self.overflow.iter())
    }
}

#[derive(Debug, Clone)]
pub struct Octree {
    cells: Vec<Cell>,
}

impl Octree {
    pub fn with_bounds(bounds: Bounds) -> Self {
        Self {
            cells: vec![Cell::empty(bounds, 0)],
        }
    }

    /// Builds a tree over `positions`, node `i` being `positions[i]`.
    pub fn build(positions: &[Vector3D]) -> Self {
        let mut tree = Self::with_bounds(Bounds::enclosing(positions));
        tree.cells.reserve(positions.len() * 2);
        for (node, &p) in positions.iter().enumerate() {
            tree.insert(node, p);
        }
        tree
    }

    pub fn root(&self) -> &Cell {
        &self.cells[0]
    }

    pub fn cell(&self, idx: usize) -> &Cell {
        &self.cells[idx]
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Inserts a point; returns `false` (and changes nothing) if it lies outside the root cube.
    pub fn insert(&mut self, node: usize, position: Vector3D) -> bool {
        if !position.is_finite() || !self.cells[0].bounds.contains(position) {
            return false;
        }
        let body = Body { node, position };
        let mut idx = 0;
        loop {
            self.cells[idx].absorb(position);

            if let Some(first) = self.cells[idx].first_child {
                idx = first + self.cells[idx].bounds.octant(position);
                continue;
            }

            let cell = &mut self.cells[idx];
            let Some(existing) = cell.body else {
                cell.body = Some(body);
                return true;
            };
            if cell.depth >= MAX_DEPTH {
                cell.overflow.push(body);
                return true;
            }

            cell.body = None;
            let first = self.subdivide(idx);
            let bounds = self.cells[idx].bounds;
            let child = &mut self.cells[first + bounds.octant(existing.position)];
            child.absorb(existing.position);
            child.body = Some(existing);

            idx = first + bounds.octant(position);
        }
    }

    fn subdivide(&mut self, idx: usize) -> usize {
        let first = self.cells.len();
        let bounds = self.cells[idx].bounds;
        let depth = self.cells[idx].depth + 1;
        self.cells
            .extend((0..8).map(|octant| Cell::empty(bounds.child(octant), depth)));
        self.cells[idx].first_child = Some(first);
        first
    }

    /// Approximate repulsion on `node` (at `position`) from every point in the tree.
    ///
    /// Magnitude is `k² · mass / d²`, pointing away from the source. A cell is summarised by its
    /// center of mass when it does not contain `position` and `width / d < theta`.
    pub fn repulsion(&self, node: usize, position: Vector3D, k_sq: f64, theta: f64) -> Vector3D {
        let mut force = Vector3D::ZERO;
        let mut stack: Vec<usize> = vec![0];
        while let Some(idx) = stack.pop() {
            let cell = &self.cells[idx];
            if cell.mass <= 0.0 {
                continue;
            }
            match cell.children() {
                None => {
                    for b in cell.bodies() {
                        if b.node == node {
                            continue;
                        }
                        let delta = position - b.position;
                        let delta = if delta.magnitude_squared() == 0.0 {
                            tie_break_direction(node, b.node)
                        } else {
                            delta
                        };
                        force += repulsion_force(delta, 1.0, k_sq);
                    }
                }
                Some(children) => {
                    let delta = position - cell.center_of_mass;
                    let dist = delta.magnitude().max(MIN_DISTANCE);
                    if !cell.bounds.contains(position) && cell.bounds.width / dist < theta {
                        force += repulsion_force(delta, cell.mass, k_sq);
                    } else {
                        stack.extend(children);
                    }
                }
            }
        }
        force
    }
}

fn repulsion_force(delta: Vector3D, mass: f64, k_sq: f64) -> Vector3D {
    let dist = delta.magnitude().max(MIN_DISTANCE);
    delta.normalize() * (k_sq * mass / (dist * dist))
}

/// Direction `a` moves away from an exactly coincident `b`; `tie_break_direction(b, a)` is its
/// negation, so the pair separates.
pub(crate) fn tie_break_direction(a: usize, b: usize) -> Vector3D {
    let (lo, hi, sign) = if a < b { (a, b, 1.0) } else { (b, a, -1.0) };
    let seed = (lo as u64).wrapping_mul(0x9E3779B97F4A7C15)
        ^ (hi as u64).wrapping_mul(0xC2B2AE3D27D4EB4F);
    let mut rng = XorShift64Star::new(seed);
    let z: f64 = rng.random_range(-1.0..=1.0);
    let phi: f64 = rng.random_range(0.0..std::f64::consts::TAU);
    let r = (1.0 - z * z).max(0.0).sqrt();
    Vector3D::new(r * phi.cos(), r * phi.sin(), z) * (sign * MIN_DISTANCE)
}

#[cfg(test)]
mod tests {
    use super::{Bounds, MIN_DISTANCE, Octree, tie_break_direction};
    use crate::math::Vector3D;

    #[test]
    fn insert_rejects_points_outside_root() {
        let mut tree = Octree::with_bounds(Bounds::new(Vector3D::ZERO, 1.0));
        assert!(tree.insert(0, Vector3D::new(0.5, 0.5, 0.5)));
        assert!(!tree.insert(1, Vector3D::new(1.5, 0.5, 0.5)));
        assert!(!tree.insert(2, Vector3D::new(f64::NAN, 0.5, 0.5)));
        assert_eq!(tree.root().mass(), 1.0);
    }

    #[test]
    fn second_point_subdivides_leaf() {
        let mut tree = Octree::with_bounds(Bounds::new(Vector3D::ZERO, 2.0));
        tree.insert(0, Vector3D::new(0.5, 0.5, 0.5));
        assert!(tree.root().is_leaf());
        tree.insert(1, Vector3D::new(1.5, 1.5, 1.5));
        assert!(!tree.root().is_leaf());
        assert_eq!(tree.root().bodies().count(), 0);
        assert_eq!(tree.root().center_of_mass(), Vector3D::new(1.0, 1.0, 1.0));

        let children = tree.root().children().unwrap();
        let occupied: Vec<usize> = children.filter(|&c| tree.cell(c).mass() > 0.0).collect();
        assert_eq!(occupied.len(), 2);
    }

    #[test]
    fn coincident_points_stop_at_max_depth() {
        let p = Vector3D::new(0.25, 0.25, 0.25);
        let mut tree = Octree::with_bounds(Bounds::new(Vector3D::ZERO, 1.0));
        for node in 0..3 {
            assert!(tree.insert(node, p));
        }
        assert_eq!(tree.root().mass(), 3.0);
        let deepest = tree.cells().iter().find(|c| c.bodies().count() > 1).unwrap();
        assert_eq!(deepest.bodies().count(), 3);
    }

    #[test]
    fn repulsion_pushes_away_and_skips_self() {
        let positions = [Vector3D::new(0.0, 0.0, 0.0), Vector3D::new(2.0, 0.0, 0.0)];
        let tree = Octree::build(&positions);
        let f = tree.repulsion(0, positions[0], 4.0, 0.5);
        // k² / d² = 4 / 4, pointing away from node 1.
        assert!((f.x + 1.0).abs() < 1e-12, "{f:?}");
        assert!(f.y.abs() < 1e-12 && f.z.abs() < 1e-12);
    }

    #[test]
    fn tie_break_is_antisymmetric() {
        let a = tie_break_direction(3, 8);
        let b = tie_break_direction(8, 3);
        assert_eq!(a, -b);
        assert!((a.magnitude() - MIN_DISTANCE).abs() < 1e-12);
    }
}
