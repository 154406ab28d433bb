use std::collections::HashMap;

/// Option chosen for each customization tag.
///
/// A node tagged with a customization only has its chosen child visited.
/// Unset tags pick the first child; choices past the last child pick the
/// last one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Choices {
    options: HashMap<String, usize>,
}

impl Choices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, tag: impl Into<String>, option: usize) {
        self.options.insert(tag.into(), option);
    }

    pub fn get(&self, tag: &str) -> Option<usize> {
        self.options.get(tag).copied()
    }

    pub fn clear(&mut self) {
        self.options.clear();
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Index of the child to visit out of `child_count`.
    pub fn resolve(&self, tag: &str, child_count: usize) -> Option<usize> {
        if child_count == 0 {
            return None;
        }
        Some(self.get(tag).unwrap_or(0).min(child_count - 1))
    }
}
