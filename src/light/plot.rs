// Graphviz dump of a built light tree. A read-only consumer of
// `LightTree::get_nodes()`; has no effect on build determinism. Grounded on
// this crate's own `LightTreeNode` layout, kept to one function, no state,
// writing straight to an `impl Write`, in the same spirit as the rest of
// this crate's small, single-purpose debug utilities.

use std::io;

use crate::light::builder::{LightTree, LightTreeNodeKind};

/// Writes `tree` as a Graphviz `digraph` to `w`: one record-shaped node per
/// `LightTreeNode`, `:left`/`:right` edges between parent and children,
/// `rankdir = "LR"` to match the source's left-to-right layout convention.
pub fn plot_to_writer(tree: &LightTree, w: &mut impl io::Write) -> io::Result<()> {
    writeln!(w, "digraph LightTree {{")?;
    writeln!(w, "    rankdir = \"LR\";")?;
    writeln!(w, "    node [shape = record];")?;

    for (i, node) in tree.get_nodes().iter().enumerate() {
        let kind_label = match node.kind {
            LightTreeNodeKind::Leaf { first_prim_index, num_prims } => {
                format!("leaf | first_prim_index: {} | num_prims: {}", first_prim_index, num_prims)
            }
            LightTreeNodeKind::Interior { .. } => "interior".to_string(),
        };

        let (axis, theta_o, theta_e) = match node.bcone {
            crate::cone::OrientationConef::Empty => (0.0, -1.0, -1.0),
            crate::cone::OrientationConef::Valid { axis, theta_o, theta_e } => (axis, theta_o, theta_e),
        };

        writeln!(
            w,
            "    n{} [label = \"{{ idx: {} | {} | bbox: [{:.3},{:.3},{:.3}] - [{:.3},{:.3},{:.3}] | \
             bcone: axis=({:.3},{:.3},{:.3}) theta_o={:.3} theta_e={:.3} | energy: {:.5} | bit_trail: {:#06b} }}\"];",
            i,
            i,
            kind_label,
            node.bbox.pmin.x,
            node.bbox.pmin.y,
            node.bbox.pmin.z,
            node.bbox.pmax.x,
            node.bbox.pmax.y,
            node.bbox.pmax.z,
            axis.x,
            axis.y,
            axis.z,
            theta_o,
            theta_e,
            node.energy,
            node.bit_trail,
        )?;
    }

    for (i, node) in tree.get_nodes().iter().enumerate() {
        if let LightTreeNodeKind::Interior { right_child_index } = node.kind {
            writeln!(w, "    n{} -> n{} [label = \":left\"];", i, i + 1)?;
            writeln!(w, "    n{} -> n{} [label = \":right\"];", i, right_child_index)?;
        }
    }

    writeln!(w, "}}")?;
    Ok(())
}
