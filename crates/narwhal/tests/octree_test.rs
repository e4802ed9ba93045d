use narwhal::Vector3D;
use narwhal::algo::octree::{Body, Octree};
use proptest::prelude::*;

fn subtree_bodies(tree: &Octree, idx: usize, out: &mut Vec<Body>) {
    let cell = tree.cell(idx);
    out.extend(cell.bodies().copied());
    if let Some(children) = cell.children() {
        for child in children {
            subtree_bodies(tree, child, out);
        }
    }
}

fn point() -> impl Strategy<Value = Vector3D> {
    (-1000.0..1000.0f64, -1000.0..1000.0f64, -1000.0..1000.0f64)
        .prop_map(|(x, y, z)| Vector3D::new(x, y, z))
}

fn points() -> impl Strategy<Value = Vec<Vector3D>> {
    // Repeat a prefix so coincident points show up regularly.
    (prop::collection::vec(point(), 1..120), 0usize..8).prop_map(|(mut pts, dupes)| {
        let repeated: Vec<Vector3D> = pts.iter().take(dupes).copied().collect();
        pts.extend(repeated);
        pts
    })
}

proptest! {
    #[test]
    fn every_cell_contains_its_subtree(pts in points()) {
        let tree = Octree::build(&pts);
        for idx in 0..tree.cells().len() {
            let mut bodies = Vec::new();
            subtree_bodies(&tree, idx, &mut bodies);
            let cell = tree.cell(idx);
            for b in &bodies {
                prop_assert!(cell.bounds().contains(b.position));
            }
            prop_assert_eq!(cell.mass(), bodies.len() as f64);
            if let Some(children) = cell.children() {
                let (lo, hi) = (cell.bounds().min(), cell.bounds().max());
                for child in children.map(|c| tree.cell(c)) {
                    prop_assert_eq!(child.depth(), cell.depth() + 1);
                    let (clo, chi) = (child.bounds().min(), child.bounds().max());
                    prop_assert!(clo.x >= lo.x && clo.y >= lo.y && clo.z >= lo.z);
                    prop_assert!(chi.x <= hi.x + 1e-9 && chi.y <= hi.y + 1e-9 && chi.z <= hi.z + 1e-9);
                }
            }
            if !bodies.is_empty() {
                let mean = bodies.iter().map(|b| b.position).sum::<Vector3D>()
                    * (1.0 / bodies.len() as f64);
                prop_assert!(mean.distance(cell.center_of_mass()) < 1e-6);
            }
        }
    }

    #[test]
    fn root_mass_counts_every_point(pts in points()) {
        let tree = Octree::build(&pts);
        prop_assert_eq!(tree.root().mass(), pts.len() as f64);

        let mut bodies = Vec::new();
        subtree_bodies(&tree, 0, &mut bodies);
        let mut nodes: Vec<usize> = bodies.iter().map(|b| b.node).collect();
        nodes.sort_unstable();
        prop_assert_eq!(nodes, (0..pts.len()).collect::<Vec<_>>());
    }
}

#[test]
fn coincident_points_share_a_deep_leaf_and_still_repel() {
    let p = Vector3D::new(3.0, 3.0, 3.0);
    let tree = Octree::build(&[p, p, p]);
    assert_eq!(tree.root().mass(), 3.0);
    let f = tree.repulsion(0, p, 900.0, 0.8);
    assert!(f.is_finite());
    assert!(f.magnitude() > 0.0);
}
