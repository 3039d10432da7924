//! Named scalar properties, resolved to integer handles at load time.
//!
//! Interaction parameters ("Diameter", "Elasticity", ...) are either plain
//! numbers or references to a named property; the hot path only ever indexes
//! by handle.

use crate::{CoreError, ParticleId, Result};
use std::collections::HashMap;

/// Storage backing one named property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    /// One value shared by every particle.
    Fixed(f64),
    /// One value per particle, indexed by id.
    PerParticle(Vec<f64>),
}

/// Physical dimension of a property, for unit conversion at the
/// configuration boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dimension {
    #[default]
    Dimensionless,
    Length,
    Time,
    Mass,
    Energy,
}

/// A named scalar property.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub dimension: Dimension,
    pub kind: PropertyKind,
}

impl Property {
    pub fn fixed(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            dimension: Dimension::default(),
            kind: PropertyKind::Fixed(value),
        }
    }

    pub fn per_particle(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            dimension: Dimension::default(),
            kind: PropertyKind::PerParticle(values),
        }
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimension = dimension;
        self
    }

    /// Copy with every stored value multiplied by `scale`.
    pub fn scaled(mut self, scale: f64) -> Self {
        match &mut self.kind {
            PropertyKind::Fixed(v) => *v *= scale,
            PropertyKind::PerParticle(vs) => vs.iter_mut().for_each(|v| *v *= scale),
        }
        self
    }

    #[inline]
    pub fn value(&self, id: ParticleId) -> f64 {
        match &self.kind {
            PropertyKind::Fixed(v) => *v,
            PropertyKind::PerParticle(vs) => vs[id as usize],
        }
    }

    pub fn max_value(&self) -> f64 {
        match &self.kind {
            PropertyKind::Fixed(v) => *v,
            PropertyKind::PerParticle(vs) => vs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// All named properties of a simulation, with name -> handle resolution.
#[derive(Debug, Clone, Default)]
pub struct PropertyStore {
    properties: Vec<Property>,
    by_name: HashMap<String, usize>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a property and return its handle. Re-registering a name
    /// replaces the stored values but keeps the handle.
    pub fn insert(&mut self, property: Property) -> usize {
        if let Some(&handle) = self.by_name.get(&property.name) {
            self.properties[handle] = property;
            return handle;
        }
        let handle = self.properties.len();
        self.by_name.insert(property.name.clone(), handle);
        self.properties.push(property);
        handle
    }

    /// Resolve a name to its handle.
    pub fn lookup(&self, name: &str) -> Result<usize> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| CoreError::UnknownProperty(name.to_string()))
    }

    #[inline]
    pub fn get(&self, handle: usize) -> &Property {
        &self.properties[handle]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Parse an attribute that is either a numeric literal or the name of a
    /// registered property.
    pub fn parse_ref(&self, attr: &str) -> Result<PropertyRef> {
        if let Ok(v) = attr.parse::<f64>() {
            return Ok(PropertyRef::Inline(v));
        }
        Ok(PropertyRef::Named(self.lookup(attr)?))
    }
}

/// A resolved reference to a scalar parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyRef {
    /// Literal value carried inline.
    Inline(f64),
    /// Handle into the [`PropertyStore`].
    Named(usize),
}

impl PropertyRef {
    #[inline]
    pub fn value(&self, store: &PropertyStore, id: ParticleId) -> f64 {
        match *self {
            PropertyRef::Inline(v) => v,
            PropertyRef::Named(h) => store.get(h).value(id),
        }
    }

    pub fn max_value(&self, store: &PropertyStore) -> f64 {
        match *self {
            PropertyRef::Inline(v) => v,
            PropertyRef::Named(h) => store.get(h).max_value(),
        }
    }

    /// Attribute text that reproduces this reference on reload.
    pub fn display(&self, store: &PropertyStore) -> String {
        match *self {
            PropertyRef::Inline(v) => format!("{v}"),
            PropertyRef::Named(h) => store.get(h).name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_ref_ignores_store() {
        let store = PropertyStore::new();
        let r = store.parse_ref("1.5").unwrap();
        assert_eq!(r, PropertyRef::Inline(1.5));
        assert_eq!(r.value(&store, 99), 1.5);
    }

    #[test]
    fn named_ref_resolves_per_particle_values() {
        let mut store = PropertyStore::new();
        store.insert(Property::per_particle("D", vec![1.0, 2.0, 0.5]));
        let r = store.parse_ref("D").unwrap();
        assert_eq!(r.value(&store, 1), 2.0);
        assert_eq!(r.max_value(&store), 2.0);
        assert_eq!(r.display(&store), "D");
    }

    #[test]
    fn unknown_name_is_an_error() {
        let store = PropertyStore::new();
        assert!(matches!(
            store.parse_ref("missing"),
            Err(CoreError::UnknownProperty(_))
        ));
    }

    #[test]
    fn reinsert_keeps_handle() {
        let mut store = PropertyStore::new();
        let h = store.insert(Property::fixed("e", 1.0));
        let h2 = store.insert(Property::fixed("e", 0.9));
        assert_eq!(h, h2);
        assert_eq!(store.get(h).value(0), 0.9);
    }
}
