//! Net force per node: Barnes-Hut repulsion + edge springs + a weak pull toward the origin.

use crate::algo::LayoutParams;
use crate::algo::octree::Octree;
use crate::graph::IndexedGraph;
use crate::math::Vector3D;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceModel {
    pub k: f64,
    pub theta: f64,
    pub centering: f64,
}

impl ForceModel {
    pub fn new(k: f64, theta: f64) -> Self {
        Self {
            k,
            theta,
            centering: LayoutParams::default().centering,
        }
    }

    pub fn from_params(params: &LayoutParams) -> Self {
        Self {
            k: params.k,
            theta: params.theta,
            centering: params.centering,
        }
    }

    /// Forces for every node of `graph`, indexed like `positions`.
    ///
    /// Positions are only read; callers apply the result after the whole pass.
    pub fn compute(&self, graph: &IndexedGraph, positions: &[Vector3D]) -> Vec<Vector3D> {
        debug_assert_eq!(graph.len(), positions.len());
        let tree = Octree::build(positions);
        let mut forces = self.repulsion(&tree, positions);
        self.add_attraction(graph, positions, &mut forces);
        self.add_centering(positions, &mut forces);
        forces
    }

    #[cfg(not(feature = "parallel"))]
    fn repulsion(&self, tree: &Octree, positions: &[Vector3D]) -> Vec<Vector3D> {
        let k_sq = self.k * self.k;
        positions
            .iter()
            .enumerate()
            .map(|(i, &p)| tree.repulsion(i, p, k_sq, self.theta))
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn repulsion(&self, tree: &Octree, positions: &[Vector3D]) -> Vec<Vector3D> {
        let k_sq = self.k * self.k;
        positions
            .par_iter()
            .enumerate()
            .map(|(i, &p)| tree.repulsion(i, p, k_sq, self.theta))
            .collect()
    }

    fn add_attraction(
        &self,
        graph: &IndexedGraph,
        positions: &[Vector3D],
        forces: &mut [Vector3D],
    ) {
        for &(u, v) in graph.edges() {
            if u == v {
                continue;
            }
            let delta = positions[u] - positions[v];
            let dist = delta.magnitude();
            if dist == 0.0 {
                continue;
            }
            let f = delta * ((dist - self.k) / dist);
            forces[u] -= f;
            forces[v] += f;
        }
    }

    fn add_centering(&self, positions: &[Vector3D], forces: &mut [Vector3D]) {
        for (f, &p) in forces.iter_mut().zip(positions) {
            *f += p * -self.centering;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ForceModel;
    use crate::graph::Graph;
    use crate::math::Vector3D;

    fn pair(with_edge: bool) -> Graph {
        let g = Graph::new().with_node("a").with_node("b");
        if with_edge { g.with_edge("a", "b") } else { g }
    }

    #[test]
    fn stretched_edge_pulls_endpoints_together() {
        let g = pair(true).index().unwrap();
        let positions = [Vector3D::new(-50.0, 0.0, 0.0), Vector3D::new(50.0, 0.0, 0.0)];
        let model = ForceModel {
            k: 10.0,
            theta: 0.8,
            centering: 0.0,
        };
        let f = model.compute(&g, &positions);
        // spring: 100 - 10 = 90 inward; repulsion: 100 / 100^2 = 0.01 outward.
        assert!((f[0].x - 89.99).abs() < 1e-9, "{:?}", f[0]);
        assert!((f[1].x + 89.99).abs() < 1e-9, "{:?}", f[1]);
    }

    #[test]
    fn compressed_edge_pushes_endpoints_apart() {
        let g = pair(true).index().unwrap();
        let positions = [Vector3D::new(-1.0, 0.0, 0.0), Vector3D::new(1.0, 0.0, 0.0)];
        let f = ForceModel::new(10.0, 0.8).compute(&g, &positions);
        assert!(f[0].x < 0.0 && f[1].x > 0.0);
    }

    #[test]
    fn disconnected_pair_only_repels() {
        let g = pair(false).index().unwrap();
        let positions = [Vector3D::new(0.0, 0.0, 0.0), Vector3D::new(0.0, 30.0, 0.0)];
        let model = ForceModel {
            k: 30.0,
            theta: 0.8,
            centering: 0.0,
        };
        let f = model.compute(&g, &positions);
        assert!((f[0].y + 1.0).abs() < 1e-9);
        assert!((f[1].y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn centering_pulls_toward_origin() {
        let g = Graph::new().with_node("solo").index().unwrap();
        let f = ForceModel::new(30.0, 0.8).compute(&g, &[Vector3D::new(100.0, 0.0, -50.0)]);
        assert!((f[0].x + 1.0).abs() < 1e-12);
        assert!((f[0].z - 0.5).abs() < 1e-12);
    }

    #[test]
    fn barnes_hut_tracks_exact_sum_for_distant_cluster() {
        let mut g = Graph::new().with_node("probe");
        let mut positions = vec![Vector3D::new(-500.0, 0.0, 0.0)];
        for i in 0..27 {
            g = g.with_node(format!("c{i}"));
            let (x, y, z) = ((i % 3) as f64, ((i / 3) % 3) as f64, (i / 9) as f64);
            positions.push(Vector3D::new(x, y, z));
        }
        let g = g.index().unwrap();
        let exact = ForceModel {
            k: 10.0,
            theta: 1e-9,
            centering: 0.0,
        }
        .compute(&g, &positions)[0];
        let approx = ForceModel {
            k: 10.0,
            theta: 1.0,
            centering: 0.0,
        }
        .compute(&g, &positions)[0];
        assert!(exact.x < 0.0);
        assert!(((approx.x - exact.x) / exact.x).abs() < 0.01);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn parallel_pass_matches_sequential_sum_bit_for_bit() {
        use crate::algo::octree::Octree;
        use crate::algo::relax::initial_positions;
        use crate::rng::XorShift64Star;

        let mut g = Graph::new();
        for i in 0..200 {
            g = g.with_node(format!("n{i}"));
        }
        for i in 0..200 {
            g = g.with_edge(format!("n{i}"), format!("n{}", (i * 7 + 3) % 200));
        }
        let g = g.index().unwrap();
        let mut rng = XorShift64Star::new(21);
        let positions = initial_positions(200, 30.0, 1.0, &mut rng);
        let model = ForceModel::new(30.0, 0.8);

        let tree = Octree::build(&positions);
        let k_sq = model.k * model.k;
        let mut expected: Vec<Vector3D> = positions
            .iter()
            .enumerate()
            .map(|(i, &p)| tree.repulsion(i, p, k_sq, model.theta))
            .collect();
        model.add_attraction(&g, &positions, &mut expected);
        model.add_centering(&positions, &mut expected);

        let got = model.compute(&g, &positions);
        for (a, b) in got.iter().zip(&expected) {
            assert_eq!(a.x.to_bits(), b.x.to_bits());
            assert_eq!(a.y.to_bits(), b.y.to_bits());
            assert_eq!(a.z.to_bits(), b.z.to_bits());
        }
    }
}
