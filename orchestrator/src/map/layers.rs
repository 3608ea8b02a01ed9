//! Infrastructure marker layers.
//!
//! Every change of the corpus or of the visibility flags clears all
//! groups and rebuilds them from scratch, so each group always holds
//! exactly the visible features of its layer.

use super::features::{FeatureCorpus, LayerKey};
use super::popup::feature_popup;
use super::{GroupId, IconKind, MapSurface, MarkerSpec, SurfaceError};
use std::collections::BTreeMap;
use std::sync::Arc;

impl From<LayerKey> for IconKind {
    fn from(key: LayerKey) -> Self {
        match key {
            LayerKey::Demand => IconKind::Demand,
            LayerKey::Hub => IconKind::Hub,
            LayerKey::Solar => IconKind::Solar,
            LayerKey::Wind => IconKind::Wind,
            LayerKey::Renewable => IconKind::Renewable,
        }
    }
}

/// Visibility of each layer. Layers without a flag are visible.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityFlags(BTreeMap<LayerKey, bool>);

impl Default for VisibilityFlags {
    /// Demand centers and hubs shown, plants hidden
    fn default() -> Self {
        Self(BTreeMap::from([
            (LayerKey::Demand, true),
            (LayerKey::Hub, true),
            (LayerKey::Solar, false),
            (LayerKey::Wind, false),
        ]))
    }
}

impl VisibilityFlags {
    /// No flags set, every layer visible
    pub fn all_visible() -> Self {
        Self(BTreeMap::new())
    }

    pub fn is_visible(&self, key: LayerKey) -> bool {
        self.0.get(&key).copied().unwrap_or(true)
    }

    pub fn set(&mut self, key: LayerKey, visible: bool) {
        self.0.insert(key, visible);
    }

    /// Flip a layer, returning its new visibility
    pub fn toggle(&mut self, key: LayerKey) -> bool {
        let visible = !self.is_visible(key);
        self.0.insert(key, visible);
        visible
    }
}

/// Keeps the marker groups in line with the corpus and the flags
#[derive(Debug, Default)]
pub struct LayerVisibilityReconciler {
    corpus: Arc<FeatureCorpus>,
    flags: VisibilityFlags,
    groups: BTreeMap<LayerKey, GroupId>,
    drawn: BTreeMap<LayerKey, usize>,
}

impl LayerVisibilityReconciler {
    pub fn new(flags: VisibilityFlags) -> Self {
        Self {
            flags,
            ..Default::default()
        }
    }

    pub fn flags(&self) -> &VisibilityFlags {
        &self.flags
    }

    pub fn corpus(&self) -> &FeatureCorpus {
        &self.corpus
    }

    /// Number of markers currently drawn for `key`
    pub fn drawn(&self, key: LayerKey) -> usize {
        self.drawn.get(&key).copied().unwrap_or(0)
    }

    /// Number of markers currently drawn over all layers
    pub fn total_drawn(&self) -> usize {
        self.drawn.values().sum()
    }

    /// Replace the corpus. Drawn on `surface` when one is given.
    pub fn set_corpus(
        &mut self,
        corpus: Arc<FeatureCorpus>,
        surface: Option<&mut dyn MapSurface>,
    ) -> Result<usize, SurfaceError> {
        self.corpus = corpus;
        self.redraw(surface)
    }

    /// Replace every visibility flag
    pub fn set_flags(
        &mut self,
        flags: VisibilityFlags,
        surface: Option<&mut dyn MapSurface>,
    ) -> Result<usize, SurfaceError> {
        self.flags = flags;
        self.redraw(surface)
    }

    /// Show or hide one layer
    pub fn set_visible(
        &mut self,
        key: LayerKey,
        visible: bool,
        surface: Option<&mut dyn MapSurface>,
    ) -> Result<usize, SurfaceError> {
        self.flags.set(key, visible);
        self.redraw(surface)
    }

    fn redraw(&mut self, surface: Option<&mut dyn MapSurface>) -> Result<usize, SurfaceError> {
        match surface {
            Some(surface) => self.reconcile(surface),
            None => Ok(0),
        }
    }

    /// Clear every group and draw the visible features again.
    /// Returns the number of markers drawn.
    pub fn reconcile(&mut self, surface: &mut dyn MapSurface) -> Result<usize, SurfaceError> {
        for group in self.groups.values() {
            surface.clear_layer_group(*group)?;
        }
        self.drawn.clear();

        for feature in self.corpus.features() {
            if !self.flags.is_visible(feature.layer) {
                continue;
            }

            let group = match self.groups.get(&feature.layer) {
                Some(group) => *group,
                None => {
                    let group = surface.create_layer_group()?;
                    self.groups.insert(feature.layer, group);
                    group
                }
            };

            surface.add_marker(
                Some(group),
                MarkerSpec {
                    at: feature.coordinate,
                    icon: feature.layer.into(),
                    popup: feature_popup(feature),
                    z_offset: 0,
                },
            )?;
            *self.drawn.entry(feature.layer).or_insert(0) += 1;
        }

        let total = self.total_drawn();
        map_debug!(
            "(reconcile) drew {} of {} features.",
            total,
            self.corpus.len()
        );
        Ok(total)
    }

    /// Forget the groups of a released map instance
    pub fn detach(&mut self) {
        self.groups.clear();
        self.drawn.clear();
    }
}
