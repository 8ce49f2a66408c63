//! Bounded light pools and the per-frame light snapshot

use crate::scene::{DirectionalLight, LightsHeader, PointLight, PointLightGpu, SpotLight, SpotLightGpu};
use std::collections::BTreeSet;

/// Id of a point or spot light; the two kinds use separate id spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LightId(pub u32);

/// Fixed-capacity slot array with a free-set
///
/// Allocation always takes the smallest free slot, so ids of removed lights
/// are reused before higher ones.
#[derive(Debug, Clone)]
pub struct LightPool<T> {
    slots: Vec<Option<T>>,
    free: BTreeSet<u32>,
}

impl<T> LightPool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(capacity).collect(),
            free: (0..capacity as u32).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn free_slots(&self) -> usize {
        self.free.len()
    }

    pub fn insert(&mut self, value: T) -> Option<LightId> {
        let index = self.free.pop_first()?;
        self.slots[index as usize] = Some(value);
        Some(LightId(index))
    }

    pub fn get(&self, id: LightId) -> Option<&T> {
        self.slots.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// Replace a live entry; returns false for unknown ids
    pub fn update(&mut self, id: LightId, value: T) -> bool {
        match self.slots.get_mut(id.0 as usize) {
            Some(slot @ Some(_)) => {
                *slot = Some(value);
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, id: LightId) -> Option<T> {
        let removed = self.slots.get_mut(id.0 as usize)?.take()?;
        self.free.insert(id.0);
        Some(removed)
    }

    /// Live entries in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (LightId, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|value| (LightId(i as u32), value)))
    }
}

/// Dense copy of every live light, in ascending id order
#[derive(Debug, Clone, PartialEq)]
pub struct LightSnapshot {
    pub directional: DirectionalLight,
    pub point_lights: Vec<PointLight>,
    pub spot_lights: Vec<SpotLight>,
    pub point_light_count: u32,
    pub spot_light_count: u32,
}

impl LightSnapshot {
    pub fn header(&self) -> LightsHeader {
        LightsHeader {
            directional: self.directional.to_gpu_data(),
            counts: [self.point_light_count, self.spot_light_count, 0, 0],
        }
    }

    pub fn point_light_data(&self) -> Vec<PointLightGpu> {
        self.point_lights.iter().map(PointLight::to_gpu_data).collect()
    }

    pub fn spot_light_data(&self) -> Vec<SpotLightGpu> {
        self.spot_lights.iter().map(SpotLight::to_gpu_data).collect()
    }
}

/// Directional light plus bounded point and spot light pools
#[derive(Debug, Clone)]
pub struct LightManager {
    directional: DirectionalLight,
    point_lights: LightPool<PointLight>,
    spot_lights: LightPool<SpotLight>,
}

impl LightManager {
    pub fn new(max_point_lights: usize, max_spot_lights: usize) -> Self {
        Self {
            directional: DirectionalLight::default(),
            point_lights: LightPool::new(max_point_lights),
            spot_lights: LightPool::new(max_spot_lights),
        }
    }

    pub fn update_directional_light(&mut self, light: DirectionalLight) {
        self.directional = light;
    }

    pub fn directional_light(&self) -> &DirectionalLight {
        &self.directional
    }

    /// `None` when the pool is full
    pub fn add_point_light(&mut self, light: PointLight) -> Option<LightId> {
        let id = self.point_lights.insert(light);
        if id.is_none() {
            log::warn!(
                "Point light pool is full ({} lights)",
                self.point_lights.capacity()
            );
        }
        id
    }

    pub fn update_point_light(&mut self, id: LightId, light: PointLight) {
        self.point_lights.update(id, light);
    }

    pub fn remove_point_light(&mut self, id: LightId) {
        self.point_lights.remove(id);
    }

    pub fn point_light(&self, id: LightId) -> Option<&PointLight> {
        self.point_lights.get(id)
    }

    pub fn point_light_count(&self) -> usize {
        self.point_lights.len()
    }

    pub fn free_point_slots(&self) -> usize {
        self.point_lights.free_slots()
    }

    /// `None` when the pool is full
    pub fn add_spot_light(&mut self, light: SpotLight) -> Option<LightId> {
        let id = self.spot_lights.insert(light);
        if id.is_none() {
            log::warn!(
                "Spot light pool is full ({} lights)",
                self.spot_lights.capacity()
            );
        }
        id
    }

    pub fn update_spot_light(&mut self, id: LightId, light: SpotLight) {
        self.spot_lights.update(id, light);
    }

    pub fn remove_spot_light(&mut self, id: LightId) {
        self.spot_lights.remove(id);
    }

    pub fn spot_light(&self, id: LightId) -> Option<&SpotLight> {
        self.spot_lights.get(id)
    }

    pub fn spot_light_count(&self) -> usize {
        self.spot_lights.len()
    }

    pub fn free_spot_slots(&self) -> usize {
        self.spot_lights.free_slots()
    }

    pub fn get_light_data(&self) -> LightSnapshot {
        let point_lights: Vec<PointLight> = self.point_lights.iter().map(|(_, l)| *l).collect();
        let spot_lights: Vec<SpotLight> = self.spot_lights.iter().map(|(_, l)| *l).collect();
        LightSnapshot {
            directional: self.directional,
            point_light_count: point_lights.len() as u32,
            spot_light_count: spot_lights.len() as u32,
            point_lights,
            spot_lights,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn point(x: f32) -> PointLight {
        PointLight::new(Vec3::new(x, 0.0, 0.0), Vec3::ONE, 1.0, 5.0)
    }

    #[test]
    fn pool_reuses_smallest_free_slot() {
        let mut pool = LightPool::new(4);
        let ids: Vec<_> = (0..3).map(|i| pool.insert(i).unwrap()).collect();
        assert_eq!(ids, vec![LightId(0), LightId(1), LightId(2)]);

        pool.remove(LightId(1));
        pool.remove(LightId(0));
        assert_eq!(pool.insert(10), Some(LightId(0)));
        assert_eq!(pool.insert(11), Some(LightId(1)));
        assert_eq!(pool.insert(12), Some(LightId(3)));
        assert_eq!(pool.insert(13), None);
    }

    #[test]
    fn update_ignores_dead_ids() {
        let mut manager = LightManager::new(2, 2);
        manager.update_point_light(LightId(0), point(1.0));
        assert!(manager.point_light(LightId(0)).is_none());
        manager.update_point_light(LightId(99), point(1.0));
        assert_eq!(manager.point_light_count(), 0);

        let id = manager.add_point_light(point(1.0)).unwrap();
        manager.update_point_light(id, point(2.0));
        assert_eq!(manager.point_light(id), Some(&point(2.0)));
    }

    #[test]
    fn point_and_spot_ids_are_independent() {
        let mut manager = LightManager::new(2, 2);
        let p = manager.add_point_light(point(0.0)).unwrap();
        let s = manager.add_spot_light(SpotLight::default()).unwrap();
        assert_eq!(p, s);

        manager.remove_point_light(p);
        assert!(manager.spot_light(s).is_some());
        assert_eq!(manager.free_spot_slots(), 1);
        assert_eq!(manager.free_point_slots(), 2);
    }

    #[test]
    fn snapshot_header_carries_counts() {
        let mut manager = LightManager::new(4, 4);
        manager.add_point_light(point(0.0));
        manager.add_spot_light(SpotLight::default());
        manager.add_spot_light(SpotLight::default());
        let header = manager.get_light_data().header();
        assert_eq!(header.counts, [1, 2, 0, 0]);
    }
}
