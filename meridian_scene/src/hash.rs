use xxhash_rust::xxh3::Xxh3;

/// Order-sensitive 64-bit accumulator over feature tags.
pub(crate) struct FeatureHash(Xxh3);

impl FeatureHash {
    pub(crate) fn new() -> Self {
        Self(Xxh3::new())
    }

    /// Tags are length-prefixed so that adjacent tags cannot run together.
    pub(crate) fn add_tag(&mut self, tag: &str) {
        self.0.update(&(tag.len() as u32).to_le_bytes());
        self.0.update(tag.as_bytes());
    }

    pub(crate) fn finish(&self) -> u64 {
        self.0.digest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_of(tags: &[&str]) -> u64 {
        let mut hash = FeatureHash::new();
        for tag in tags {
            hash.add_tag(tag);
        }
        hash.finish()
    }

    #[test]
    fn order_and_boundaries_matter() {
        assert_eq!(hash_of(&["SKIN", "FLIP"]), hash_of(&["SKIN", "FLIP"]));
        assert_ne!(hash_of(&["SKIN", "FLIP"]), hash_of(&["FLIP", "SKIN"]));
        assert_ne!(hash_of(&["MORPH", "POS"]), hash_of(&["MORPHPOS"]));
    }
}
