use crate::{index::Index, node::NodeDefinition};
use glam::Mat4;

#[derive(Clone, Debug, PartialEq)]
pub struct Joint {
    /// `None` when the joint's node was not loaded into the scene.
    pub node_idx: Option<Index<NodeDefinition>>,
    pub inverse_bind_matrix: Mat4,
}

/// Joints of a skin, in the order the mesh's joint ids refer to them.
///
/// Skeletons are plain data; nothing is created on the GPU for them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SkeletonDefinition {
    pub root_node_idx: Option<Index<NodeDefinition>>,
    pub joints: Vec<Joint>,
}

impl SkeletonDefinition {
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn inverse_bind_matrices(&self) -> Vec<Mat4> {
        self.joints
            .iter()
            .map(|joint| joint.inverse_bind_matrix)
            .collect()
    }
}
