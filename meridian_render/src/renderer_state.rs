use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct RendererState: u32 {
        const DEPTH_WRITE = 1 << 0;
        const DEPTH_TEST = 1 << 1;
        const CULL_FRONT = 1 << 2;
        const CULL_BACK = 1 << 3;
        const ALPHA_BLEND = 1 << 4;
    }
}

impl RendererState {
    pub const OPAQUE: Self = Self::DEPTH_TEST
        .union(Self::DEPTH_WRITE)
        .union(Self::CULL_BACK);
}
