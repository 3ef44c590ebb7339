//! Craft arena: components owning registries and topologies, plus whole-craft
//! save/load.
//!
//! A component is a placed part with named registries and named topologies.
//! The arena owns all of them, so a topology can use nodes of any component;
//! `split_mut` hands out one topology together with the registry arena for
//! edits.
//!
//! Whole-craft flattening numbers redirectors by component (`parent_index`)
//! and by registry position within the component (`container_index`). Loading
//! matches registries and topologies by name within each component.

use std::collections::BTreeSet;

use nalgebra::Isometry3;
use tracing::{info, warn};

use crate::error::{SaveError, SaveResult};
use crate::registry::{NodeRegistries, NodeRegistry, RegistryId};
use crate::save::{
    load_nodes, load_panels, save_nodes, save_panels, ComponentSave, CraftSave, LoadRedirectorMap,
    LoadReport, SaveRedirectorMap, DEFAULT_CRAFT_SCALE,
};
use crate::topology::{PanelTopology, Topologies, TopologyId};

/// A placed part and the containers it owns.
#[derive(Clone, Debug, PartialEq)]
pub struct Component {
    pub component_id: String,
    transform: Isometry3<f64>,
    registries: Vec<(String, RegistryId)>,
    topologies: Vec<(String, TopologyId)>,
}

impl Component {
    #[inline]
    pub fn transform(&self) -> &Isometry3<f64> {
        &self.transform
    }

    /// Named registries in creation order (the order of `container_index`).
    #[inline]
    pub fn registries(&self) -> &[(String, RegistryId)] {
        &self.registries
    }

    #[inline]
    pub fn topologies(&self) -> &[(String, TopologyId)] {
        &self.topologies
    }

    pub fn registry(&self, name: &str) -> Option<RegistryId> {
        self.registries.iter().find(|(n, _)| n == name).map(|(_, id)| *id)
    }

    pub fn topology(&self, name: &str) -> Option<TopologyId> {
        self.topologies.iter().find(|(n, _)| n == name).map(|(_, id)| *id)
    }
}

#[derive(Debug)]
pub struct Craft {
    name: String,
    scale: f64,
    registries: NodeRegistries,
    topologies: Topologies,
    components: Vec<Component>,
    next_topology: u32,
}

impl Craft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scale: DEFAULT_CRAFT_SCALE,
            registries: NodeRegistries::new(),
            topologies: Topologies::new(),
            components: Vec::new(),
            next_topology: 0,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }

    #[inline]
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    #[inline]
    pub fn registries(&self) -> &NodeRegistries {
        &self.registries
    }

    #[inline]
    pub fn registries_mut(&mut self) -> &mut NodeRegistries {
        &mut self.registries
    }

    pub fn registry_mut(&mut self, id: RegistryId) -> Option<&mut NodeRegistry> {
        self.registries.get_mut(id)
    }

    #[inline]
    pub fn topologies(&self) -> &Topologies {
        &self.topologies
    }

    pub fn topology(&self, id: TopologyId) -> Option<&PanelTopology> {
        self.topologies.get(&id)
    }

    /// One topology plus the registry arena, for panel edits.
    pub fn split_mut(&mut self, id: TopologyId) -> Option<(&mut PanelTopology, &mut NodeRegistries)> {
        let topology = self.topologies.get_mut(&id)?;
        Some((topology, &mut self.registries))
    }

    /// Append a component; returns its index.
    pub fn add_component(&mut self, component_id: impl Into<String>, transform: Isometry3<f64>) -> usize {
        self.components.push(Component {
            component_id: component_id.into(),
            transform,
            registries: Vec::new(),
            topologies: Vec::new(),
        });
        self.components.len() - 1
    }

    /// New registry in `component`, framed by the component's transform.
    pub fn add_registry(&mut self, component: usize, name: impl Into<String>) -> Option<RegistryId> {
        let comp = self.components.get_mut(component)?;
        let id = self.registries.create();
        if let Some(r) = self.registries.get_mut(id) {
            r.set_transform(comp.transform);
        }
        comp.registries.push((name.into(), id));
        Some(id)
    }

    /// New empty topology in `component`, framed by the component's transform.
    pub fn add_topology(&mut self, component: usize, name: impl Into<String>) -> Option<TopologyId> {
        let comp = self.components.get_mut(component)?;
        let id = TopologyId(self.next_topology);
        self.next_topology += 1;
        let mut topology = PanelTopology::new(id);
        topology.set_transform(comp.transform);
        self.topologies.insert(id, topology);
        comp.topologies.push((name.into(), id));
        Some(id)
    }

    /// Whether any registry of `component` is attached or any of its
    /// topologies holds panels.
    pub fn is_component_connected(&self, component: usize) -> bool {
        let Some(comp) = self.components.get(component) else {
            return false;
        };
        comp.registries
            .iter()
            .any(|(_, id)| self.registries.get(*id).is_some_and(|r| r.is_connected()))
            || comp
                .topologies
                .iter()
                .any(|(_, id)| self.topologies.get(id).is_some_and(|t| !t.is_empty()))
    }

    /// Place `component` elsewhere; refused while connected.
    pub fn move_component(&mut self, component: usize, transform: Isometry3<f64>) -> bool {
        if component >= self.components.len() || self.is_component_connected(component) {
            return false;
        }
        self.place(component, transform);
        true
    }

    /// Drop `component` and its containers; refused while connected.
    /// Later components shift down by one.
    pub fn remove_component_if_unconnected(&mut self, component: usize) -> bool {
        if component >= self.components.len() || self.is_component_connected(component) {
            return false;
        }
        let comp = self.components.remove(component);
        for (_, id) in &comp.registries {
            self.registries.remove(*id);
        }
        for (_, id) in &comp.topologies {
            self.topologies.remove(id);
        }
        true
    }

    fn place(&mut self, component: usize, transform: Isometry3<f64>) {
        let Some(comp) = self.components.get_mut(component) else {
            return;
        };
        comp.transform = transform;
        for (_, id) in &comp.registries {
            if let Some(r) = self.registries.get_mut(*id) {
                r.set_transform(transform);
            }
        }
        for (_, id) in &comp.topologies {
            if let Some(t) = self.topologies.get_mut(id) {
                t.set_transform(transform);
            }
        }
    }

    // ----- save / load -----

    /// Flatten the whole craft. Nodes of every component are recorded first so
    /// panels may reference any of them.
    pub fn save_craft(&self) -> SaveResult<CraftSave> {
        let mut save = CraftSave::new(self.name.clone(), self.scale);
        let mut map = SaveRedirectorMap::new();
        for (i, comp) in self.components.iter().enumerate() {
            let mut saved = ComponentSave::new(comp.component_id.clone(), comp.transform);
            for (j, (name, id)) in comp.registries.iter().enumerate() {
                let registry = self.registries.get(*id).ok_or(SaveError::RegistryNotFound(*id))?;
                let mut nodes = save_nodes(registry, i, j, &mut map);
                nodes.component_name = name.clone();
                saved.saved_nodes.push(nodes);
            }
            save.components.push(saved);
        }
        for (comp, saved) in self.components.iter().zip(save.components.iter_mut()) {
            for (name, id) in &comp.topologies {
                let topology = self.topologies.get(id).ok_or(SaveError::TopologyNotFound(*id))?;
                let mut noxel = save_panels(topology, &map);
                noxel.component_name = name.clone();
                saved.saved_noxels.push(noxel);
            }
        }
        info!(craft = %self.name, components = save.components.len(), "craft_saved");
        Ok(save)
    }

    /// Restore `save` into a craft with the same component layout.
    ///
    /// Topologies are emptied first, then every registry is loaded, then every
    /// topology. Containers without a saved record of the same name are left
    /// as they are (`warn!`).
    pub fn load_craft(&mut self, save: &CraftSave) -> SaveResult<LoadReport> {
        if save.components.len() != self.components.len() {
            return Err(SaveError::ComponentMismatch(format!(
                "save has {} components, craft has {}",
                save.components.len(),
                self.components.len()
            )));
        }
        if let Some((i, (comp, saved))) = self
            .components
            .iter()
            .zip(&save.components)
            .enumerate()
            .find(|(_, (c, s))| c.component_id != s.component_id)
        {
            return Err(SaveError::ComponentMismatch(format!(
                "component {i} is {}, save has {}",
                comp.component_id, saved.component_id
            )));
        }
        self.name = save.craft_name.clone();
        self.scale = save.craft_scale;

        for topology in self.topologies.values_mut() {
            topology.empty(&mut self.registries);
        }
        for (i, saved) in save.components.iter().enumerate() {
            self.place(i, saved.transform);
        }

        let mut map = LoadRedirectorMap::new();
        for (i, (comp, saved)) in self.components.iter().zip(&save.components).enumerate() {
            for (name, id) in &comp.registries {
                let Some(k) = saved.saved_nodes.iter().position(|n| &n.component_name == name) else {
                    warn!(component = i, registry = %name, "registry_not_in_save");
                    continue;
                };
                let registry = self.registries.get_mut(*id).ok_or(SaveError::RegistryNotFound(*id))?;
                load_nodes(registry, i, k, &saved.saved_nodes[k], &mut map);
            }
        }

        let mut report = LoadReport::default();
        for (i, (comp, saved)) in self.components.iter().zip(&save.components).enumerate() {
            for (name, id) in &comp.topologies {
                let Some(noxel) = saved.saved_noxels.iter().find(|n| &n.component_name == name) else {
                    warn!(component = i, topology = %name, "topology_not_in_save");
                    continue;
                };
                let topology = self.topologies.get_mut(id).ok_or(SaveError::TopologyNotFound(*id))?;
                report.absorb(load_panels(topology, &mut self.registries, &map, noxel));
            }
        }
        info!(
            craft = %self.name,
            panels = report.panels,
            rejected = report.rejected,
            missing_nodes = report.missing_nodes,
            "craft_loaded"
        );
        Ok(report)
    }

    /// Empty craft with the layout of `save`: one editable registry per saved
    /// node record and one topology per saved panel record.
    ///
    /// Registries whose owner rebuilds their content (saved without
    /// locations) come out empty; callers fill them before `load_craft`.
    pub fn scaffold(save: &CraftSave) -> Self {
        let mut craft = Craft::new(save.craft_name.clone());
        craft.scale = save.craft_scale;
        for saved in &save.components {
            let c = craft.add_component(saved.component_id.clone(), saved.transform);
            let mut seen = BTreeSet::new();
            for nodes in &saved.saved_nodes {
                if !seen.insert(nodes.component_name.as_str()) {
                    warn!(component = c, registry = %nodes.component_name, "duplicate_registry_name");
                    continue;
                }
                if let Some(id) = craft.add_registry(c, nodes.component_name.clone()) {
                    if let Some(r) = craft.registries.get_mut(id) {
                        r.set_editable(true);
                    }
                }
            }
            for noxel in &saved.saved_noxels {
                craft.add_topology(c, noxel.component_name.clone());
            }
        }
        craft
    }

    /// `scaffold` followed by `load_craft`.
    pub fn from_save(save: &CraftSave) -> SaveResult<(Self, LoadReport)> {
        let mut craft = Self::scaffold(save);
        let report = craft.load_craft(save)?;
        Ok((craft, report))
    }
}
