use crate::{
    id::{SamplerId, TextureId},
    pixel::PixelFormat,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TextureType {
    Texture2D,
    TextureCube,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TextureDescriptor {
    pub ty: TextureType,
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TextureSlot {
    pub texture: TextureId,
    pub sampler: Option<SamplerId>,
}

/// Textures bound to a renderer, addressed by slot.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TextureSet {
    slots: Vec<Option<TextureSlot>>,
}

impl TextureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_texture(&mut self, index: usize, texture: TextureId) {
        if self.slots.len() <= index {
            self.slots.resize(index + 1, None);
        }
        let sampler = self.slots[index].and_then(|slot| slot.sampler);
        self.slots[index] = Some(TextureSlot { texture, sampler });
    }

    /// Has no effect on a slot without a texture.
    pub fn set_sampler(&mut self, index: usize, sampler: SamplerId) {
        if let Some(Some(slot)) = self.slots.get_mut(index) {
            slot.sampler = Some(sampler);
        }
    }

    pub fn texture(&self, index: usize) -> Option<TextureId> {
        self.slot(index).map(|slot| slot.texture)
    }

    pub fn sampler(&self, index: usize) -> Option<SamplerId> {
        self.slot(index).and_then(|slot| slot.sampler)
    }

    pub fn slot(&self, index: usize) -> Option<TextureSlot> {
        self.slots.get(index).copied().flatten()
    }

    pub fn texture_count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampler_sticks_to_existing_texture_only() {
        let mut set = TextureSet::new();
        set.set_sampler(0, SamplerId(3));
        assert_eq!(set.texture_count(), 0);

        set.set_texture(1, TextureId(7));
        set.set_sampler(1, SamplerId(3));
        assert_eq!(set.texture_count(), 2);
        assert_eq!(set.texture(0), None);
        assert_eq!(set.texture(1), Some(TextureId(7)));
        assert_eq!(set.sampler(1), Some(SamplerId(3)));

        set.set_texture(1, TextureId(8));
        assert_eq!(set.sampler(1), Some(SamplerId(3)));
    }
}
