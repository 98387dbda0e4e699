/// Loaded models, addressed by application-assigned ids
use std::fmt;

use crate::error::{Result, ViewerError};
use crate::geometry::Geometry;

/// Stable identity of a loaded model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(u64);

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model-{}", self.0)
    }
}

/// One loaded geometry and its render flags
#[derive(Debug, Clone)]
pub struct Model {
    id: ModelId,
    pub geometry: Geometry,
    pub visible: bool,
}

impl Model {
    pub fn id(&self) -> ModelId {
        self.id
    }
}

/// Arena of models in insertion order.
#[derive(Debug)]
pub struct ModelRegistry {
    models: Vec<Model>,
    next_id: u64,
    visible: bool,
    revision: u64,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            models: Vec::new(),
            next_id: 1,
            visible: true,
            revision: 0,
        }
    }

    /// Register a geometry under a fresh id.
    pub fn insert(&mut self, geometry: Geometry) -> ModelId {
        let id = ModelId(self.next_id);
        self.next_id += 1;
        self.models.push(Model {
            id,
            geometry,
            visible: true,
        });
        self.revision += 1;
        id
    }

    pub fn get(&self, id: ModelId) -> Option<&Model> {
        self.models.iter().find(|model| model.id == id)
    }

    pub fn get_mut(&mut self, id: ModelId) -> Option<&mut Model> {
        self.models.iter_mut().find(|model| model.id == id)
    }

    pub fn geometry(&self, id: ModelId) -> Result<&Geometry> {
        self.get(id)
            .map(|model| &model.geometry)
            .ok_or(ViewerError::UnknownModel(id))
    }

    pub fn geometry_mut(&mut self, id: ModelId) -> Result<&mut Geometry> {
        self.get_mut(id)
            .map(|model| &mut model.geometry)
            .ok_or(ViewerError::UnknownModel(id))
    }

    pub fn contains(&self, id: ModelId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Model> {
        self.models.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Model> {
        self.models.iter_mut()
    }

    /// Models that pass both their own and the container visibility flag
    pub fn visible_models(&self) -> impl Iterator<Item = &Model> {
        let container = self.visible;
        self.models.iter().filter(move |model| container && model.visible)
    }

    pub fn ids(&self) -> Vec<ModelId> {
        self.models.iter().map(|model| model.id).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn is_visible(&self, id: ModelId) -> bool {
        self.visible && self.get(id).is_some_and(|model| model.visible)
    }

    pub fn set_model_visible(&mut self, id: ModelId, visible: bool) -> Result<()> {
        let model = self.get_mut(id).ok_or(ViewerError::UnknownModel(id))?;
        model.visible = visible;
        Ok(())
    }

    /// Whether the model group as a whole is shown
    pub fn is_group_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Bumped whenever the set of selectable models changes
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
