use crate::runtime::value::Holder;
use std::collections::HashMap;

/// Flat name-to-holder mapping. Mython name resolution never walks outward:
/// the top level and every call frame each own exactly one closure, and a
/// frame sees nothing but `self` and its formal parameters.
#[derive(Clone, Debug, Default)]
pub struct Closure {
    bindings: HashMap<String, Holder>,
}

impl Closure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, holder: Holder) {
        self.bindings.insert(name.into(), holder);
    }

    pub fn get(&self, name: &str) -> Option<&Holder> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Holder)> {
        self.bindings
            .iter()
            .map(|(name, holder)| (name.as_str(), holder))
    }
}
