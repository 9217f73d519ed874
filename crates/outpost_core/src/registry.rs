//! Owning storage for placed structures and their sibling groups.
//!
//! Sibling relations are index-based: a group id maps to the set of member
//! handles, and each structure maps back to at most one group. Structures
//! never hold references to each other.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::Fixed;
use crate::placement::AnchorSite;
use crate::structure::{PlayerId, Structure, StructureId};

/// Handle to a sibling group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u64);

/// A structure that was just taken out of the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedStructure {
    /// The removed structure.
    pub structure: Structure,
    /// Siblings it was linked to at removal time, in id order.
    pub former_siblings: Vec<StructureId>,
}

/// Storage for all placed structures.
///
/// Uses a `HashMap` for O(1) lookup by id, with deterministic iteration via
/// sorted keys when processing systems.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructureRegistry {
    structures: HashMap<StructureId, Structure>,
    groups: BTreeMap<GroupId, BTreeSet<StructureId>>,
    membership: HashMap<StructureId, GroupId>,
    anchors: BTreeSet<StructureId>,
    next_id: u64,
    next_group: u64,
}

impl StructureRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            next_group: 1,
            ..Self::default()
        }
    }

    /// Insert a structure and return its id.
    pub fn insert(&mut self, structure: Structure) -> StructureId {
        let id = StructureId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        self.structures.insert(id, structure);
        id
    }

    /// Remove a structure, unlinking it from its group and the anchor list.
    ///
    /// Surviving siblings keep their construction ratio while their shared
    /// `construction_needed` drops by the removed structure's requirement.
    /// A group left with a single member is dissolved.
    pub fn remove(&mut self, id: StructureId) -> Option<RemovedStructure> {
        let structure = self.structures.remove(&id)?;
        self.anchors.remove(&id);

        let mut former_siblings = Vec::new();
        if let Some(group) = self.membership.remove(&id) {
            let members = self.groups.entry(group).or_default();
            members.remove(&id);
            former_siblings.extend(members.iter().copied());

            let requirement = structure.requirement();
            for sibling in &former_siblings {
                if let Some(s) = self.structures.get_mut(sibling) {
                    let needed = s.construction_needed() - requirement;
                    s.set_construction_needed(needed);
                }
            }

            if former_siblings.len() < 2 {
                self.groups.remove(&group);
                for sibling in &former_siblings {
                    self.membership.remove(sibling);
                }
            }
        }

        Some(RemovedStructure {
            structure,
            former_siblings,
        })
    }

    /// Get a structure by id.
    #[must_use]
    pub fn get(&self, id: StructureId) -> Option<&Structure> {
        self.structures.get(&id)
    }

    /// Get a mutable reference to a structure by id.
    pub fn get_mut(&mut self, id: StructureId) -> Option<&mut Structure> {
        self.structures.get_mut(&id)
    }

    /// Check if a structure exists.
    #[must_use]
    pub fn contains(&self, id: StructureId) -> bool {
        self.structures.contains_key(&id)
    }

    /// Number of stored structures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.structures.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    /// Get sorted structure ids for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<StructureId> {
        let mut ids: Vec<_> = self.structures.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over all structures (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = (&StructureId, &Structure)> {
        self.structures.iter()
    }

    /// Group the structure belongs to, if any.
    #[must_use]
    pub fn group_of(&self, id: StructureId) -> Option<GroupId> {
        self.membership.get(&id).copied()
    }

    /// Siblings of a structure, excluding itself, in id order.
    #[must_use]
    pub fn siblings(&self, id: StructureId) -> Vec<StructureId> {
        self.group_members(id)
            .into_iter()
            .filter(|&member| member != id)
            .collect()
    }

    /// Every member of the structure's group including itself, in id order.
    ///
    /// An ungrouped structure is its own single-member group. Unknown ids
    /// yield an empty list.
    #[must_use]
    pub fn group_members(&self, id: StructureId) -> Vec<StructureId> {
        if !self.contains(id) {
            return Vec::new();
        }
        self.group_of(id)
            .and_then(|group| self.groups.get(&group))
            .map_or_else(|| vec![id], |members| members.iter().copied().collect())
    }

    /// Link structures into one sibling group.
    ///
    /// Existing groups of the given structures are merged in. Every member's
    /// `construction_needed` becomes the summed requirement of the group,
    /// with each member's ratio preserved.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::StructureNotFound`] for unknown ids and
    /// [`GameError::InvalidState`] when fewer than two distinct structures
    /// are given.
    pub fn link(&mut self, ids: &[StructureId]) -> Result<GroupId> {
        let mut members = BTreeSet::new();
        for &id in ids {
            if !self.contains(id) {
                return Err(GameError::StructureNotFound(id));
            }
            members.insert(id);
        }
        if members.len() < 2 {
            return Err(GameError::InvalidState(
                "a sibling group needs at least two structures".into(),
            ));
        }

        let merged: BTreeSet<GroupId> = members
            .iter()
            .filter_map(|id| self.membership.get(id).copied())
            .collect();
        for group in merged {
            if let Some(old) = self.groups.remove(&group) {
                members.extend(old);
            }
        }

        let total = members
            .iter()
            .filter_map(|id| self.structures.get(id))
            .fold(Fixed::ZERO, |acc, s| acc + s.requirement());

        let group = GroupId(self.next_group.max(1));
        self.next_group = group.0 + 1;
        for &id in &members {
            self.membership.insert(id, group);
            if let Some(s) = self.structures.get_mut(&id) {
                s.set_construction_needed(total);
            }
        }
        self.groups.insert(group, members);
        Ok(group)
    }

    /// Number of sibling groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Add a structure to the anchor list used for placement range checks.
    pub fn register_anchor(&mut self, id: StructureId) {
        if self.contains(id) {
            self.anchors.insert(id);
        }
    }

    /// Whether the structure is a registered anchor.
    #[must_use]
    pub fn is_registered_anchor(&self, id: StructureId) -> bool {
        self.anchors.contains(&id)
    }

    /// Registered anchors, in id order.
    #[must_use]
    pub fn anchor_sites(&self) -> Vec<AnchorSite> {
        self.anchors
            .iter()
            .filter_map(|id| self.structures.get(id))
            .map(|s| AnchorSite {
                position: s.pose().position,
                safety_range: s.blueprint().safety_range,
                owner: s.owner(),
            })
            .collect()
    }

    /// Registered anchors belonging to `owner`.
    #[must_use]
    pub fn anchor_sites_of(&self, owner: PlayerId) -> Vec<AnchorSite> {
        self.anchor_sites()
            .into_iter()
            .filter(|site| site.owner == owner)
            .collect()
    }
}
