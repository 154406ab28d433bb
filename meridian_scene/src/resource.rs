#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ResourceType {
    Environment,
    Shader,
    Skeleton,
    Mesh,
    Material,
}

impl ResourceType {
    pub const COUNT: usize = 5;

    pub const ALL: [ResourceType; Self::COUNT] = [
        ResourceType::Environment,
        ResourceType::Shader,
        ResourceType::Skeleton,
        ResourceType::Mesh,
        ResourceType::Material,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ResourceType::Environment => "environment",
            ResourceType::Shader => "shader",
            ResourceType::Skeleton => "skeleton",
            ResourceType::Mesh => "mesh",
            ResourceType::Material => "material",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Receives the resources a renderable node depends on.
pub trait ResourceReceiver {
    fn register(&mut self, ty: ResourceType, index: usize);
}

/// Usage count per resource, rebuilt for every scene instantiation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResourceRefCounts {
    counts: [Vec<u32>; ResourceType::COUNT],
}

impl ResourceRefCounts {
    /// Zeroed counts for `sizes[ty]` resources of each type.
    pub fn new(sizes: impl Fn(ResourceType) -> usize) -> Self {
        Self {
            counts: ResourceType::ALL.map(|ty| vec![0; sizes(ty)]),
        }
    }

    pub fn get(&self, ty: ResourceType) -> &[u32] {
        &self.counts[ty.slot()]
    }

    pub fn count(&self, ty: ResourceType, index: usize) -> u32 {
        self.get(ty).get(index).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, ty: ResourceType, index: usize) {
        match self.counts[ty.slot()].get_mut(index) {
            Some(count) => *count += 1,
            None => tracing::warn!(
                kind = ty.name(),
                index,
                "reference to a resource outside the bundle"
            ),
        }
    }

    /// Indices with a nonzero count.
    pub fn referenced(&self, ty: ResourceType) -> impl Iterator<Item = usize> + '_ {
        self.get(ty)
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(index, _)| index)
    }

    pub fn total(&self, ty: ResourceType) -> u32 {
        self.get(ty).iter().sum()
    }
}

impl ResourceReceiver for ResourceRefCounts {
    fn register(&mut self, ty: ResourceType, index: usize) {
        self.increment(ty, index);
    }
}
