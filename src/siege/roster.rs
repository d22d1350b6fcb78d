//! Contest membership
//!
//! Every faction appears at most once, keyed by id, so the attacker and
//! defender sides are disjoint by construction. The roster is shared as an
//! immutable snapshot: writers clone, mutate and swap under a short lock,
//! readers iterate whatever snapshot they grabbed without holding anything.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::core::types::{EntityId, FactionId, Role};
use crate::siege::registration::Rejection;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactionParticipation {
    pub faction: FactionId,
    pub role: Role,
    pub banners: Vec<EntityId>,
}

impl FactionParticipation {
    pub fn new(faction: FactionId, role: Role) -> Self {
        Self {
            faction,
            role,
            banners: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Roster {
    entries: BTreeMap<FactionId, FactionParticipation>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from stored rows; a later row for the same faction wins
    pub fn from_rows(rows: &[(FactionId, Role)]) -> Self {
        let mut roster = Self::new();
        for (faction, role) in rows {
            roster
                .entries
                .insert(*faction, FactionParticipation::new(*faction, *role));
        }
        roster
    }

    pub fn role(&self, faction: FactionId) -> Option<Role> {
        self.entries.get(&faction).map(|p| p.role)
    }

    pub fn contains(&self, faction: FactionId) -> bool {
        self.entries.contains_key(&faction)
    }

    pub fn get(&self, faction: FactionId) -> Option<&FactionParticipation> {
        self.entries.get(&faction)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FactionParticipation> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn with_role(&self, pred: impl Fn(Role) -> bool) -> Vec<FactionId> {
        self.entries
            .values()
            .filter(|p| pred(p.role))
            .map(|p| p.faction)
            .collect()
    }

    pub fn attackers(&self) -> Vec<FactionId> {
        self.with_role(|r| r == Role::Attacker)
    }

    /// Owner and approved defenders
    pub fn defenders(&self) -> Vec<FactionId> {
        self.with_role(|r| r.is_defending())
    }

    pub fn pending_defenders(&self) -> Vec<FactionId> {
        self.with_role(|r| r == Role::PendingDefender)
    }

    pub fn owner(&self) -> Option<FactionId> {
        self.entries
            .values()
            .find(|p| p.role == Role::Owner)
            .map(|p| p.faction)
    }

    pub fn attacker_count(&self) -> usize {
        self.entries.values().filter(|p| p.role == Role::Attacker).count()
    }

    /// Approved plus pending defenders, excluding the owner
    pub fn defender_count(&self) -> usize {
        self.entries
            .values()
            .filter(|p| matches!(p.role, Role::Defender | Role::PendingDefender))
            .count()
    }

    pub fn add(&mut self, faction: FactionId, role: Role) -> Result<(), Rejection> {
        if self.entries.contains_key(&faction) {
            return Err(Rejection::AlreadyRegistered);
        }
        self.entries
            .insert(faction, FactionParticipation::new(faction, role));
        Ok(())
    }

    /// Add stored rows for factions not yet on the roster; live roles win
    pub fn merge_rows(&mut self, rows: &[(FactionId, Role)]) {
        for (faction, role) in rows {
            self.entries
                .entry(*faction)
                .or_insert_with(|| FactionParticipation::new(*faction, *role));
        }
    }

    pub fn remove(&mut self, faction: FactionId) -> Option<FactionParticipation> {
        self.entries.remove(&faction)
    }

    pub fn approve(&mut self, faction: FactionId) -> Result<(), Rejection> {
        match self.entries.get_mut(&faction) {
            Some(p) if p.role == Role::PendingDefender => {
                p.role = Role::Defender;
                Ok(())
            }
            _ => Err(Rejection::NotPending),
        }
    }

    /// Drop every defender the owner never approved
    pub fn discard_pending(&mut self) -> Vec<FactionParticipation> {
        let pending = self.pending_defenders();
        pending
            .into_iter()
            .filter_map(|f| self.entries.remove(&f))
            .collect()
    }

    /// Put `owner` in the Owner role; any other Owner becomes a defender
    pub fn set_owner(&mut self, owner: FactionId) {
        for p in self.entries.values_mut() {
            if p.role == Role::Owner && p.faction != owner {
                p.role = Role::Defender;
            }
        }
        self.entries
            .entry(owner)
            .and_modify(|p| p.role = Role::Owner)
            .or_insert_with(|| FactionParticipation::new(owner, Role::Owner));
    }

    pub fn clear(&mut self) -> Vec<FactionParticipation> {
        std::mem::take(&mut self.entries).into_values().collect()
    }

    /// Swap sides after `seizer` took the stronghold mid-battle
    ///
    /// Defenders become attackers, `seizer` becomes the owner and its allied
    /// attackers become defenders. Returns the banners of the new defending
    /// side, which must be despawned.
    pub fn swap_for_seizure(&mut self, seizer: FactionId, allies: &[FactionId]) -> Vec<EntityId> {
        let mut removed = Vec::new();
        let mut swapped = BTreeMap::new();

        for (faction, mut p) in std::mem::take(&mut self.entries) {
            p.role = match p.role {
                Role::Owner | Role::Defender => Role::Attacker,
                Role::PendingDefender => continue,
                Role::Attacker if faction == seizer => Role::Owner,
                Role::Attacker if allies.contains(&faction) => Role::Defender,
                Role::Attacker => Role::Attacker,
            };
            if p.role.is_defending() {
                removed.append(&mut p.banners);
            }
            swapped.insert(faction, p);
        }
        swapped
            .entry(seizer)
            .or_insert_with(|| FactionParticipation::new(seizer, Role::Owner));

        self.entries = swapped;
        removed
    }

    pub fn banner_count(&self, faction: FactionId) -> usize {
        self.entries.get(&faction).map(|p| p.banners.len()).unwrap_or(0)
    }

    /// Only attackers and defenders plant banners, up to `limit` each
    pub fn can_plant_banner(&self, faction: FactionId, limit: usize) -> Result<(), Rejection> {
        match self.entries.get(&faction) {
            Some(p) if p.role == Role::PendingDefender => Err(Rejection::NotCombatant),
            Some(p) if p.banners.len() >= limit => Err(Rejection::BannerLimit(limit)),
            Some(_) => Ok(()),
            None => Err(Rejection::NotCombatant),
        }
    }

    pub fn plant_banner(&mut self, faction: FactionId, banner: EntityId, limit: usize) -> Result<(), Rejection> {
        self.can_plant_banner(faction, limit)?;
        if let Some(p) = self.entries.get_mut(&faction) {
            p.banners.push(banner);
        }
        Ok(())
    }

    /// Forget a destroyed banner; returns the faction that planted it
    pub fn remove_banner(&mut self, banner: EntityId) -> Option<FactionId> {
        self.entries.values_mut().find_map(|p| {
            let position = p.banners.iter().position(|b| *b == banner)?;
            p.banners.remove(position);
            Some(p.faction)
        })
    }

    pub fn all_banners(&self) -> Vec<EntityId> {
        self.entries
            .values()
            .flat_map(|p| p.banners.iter().copied())
            .collect()
    }

    /// Factions to notify: the defending side, plus attackers if `both_sides`
    pub fn recipients(&self, both_sides: bool) -> Vec<FactionId> {
        self.with_role(|r| r.is_defending() || (both_sides && r == Role::Attacker))
    }

    /// At most one owner and no banner held by a pending defender
    pub fn is_consistent(&self) -> bool {
        let owners = self.entries.values().filter(|p| p.role == Role::Owner).count();
        owners <= 1
            && self
                .entries
                .iter()
                .all(|(id, p)| *id == p.faction && (p.role != Role::PendingDefender || p.banners.is_empty()))
    }

    pub fn rows(&self) -> Vec<(FactionId, Role)> {
        self.entries.values().map(|p| (p.faction, p.role)).collect()
    }
}

/// Copy-on-write handle to the current roster
#[derive(Debug, Default)]
pub struct SharedRoster {
    current: RwLock<Arc<Roster>>,
}

impl SharedRoster {
    pub fn new(roster: Roster) -> Self {
        Self {
            current: RwLock::new(Arc::new(roster)),
        }
    }

    pub fn snapshot(&self) -> Arc<Roster> {
        self.current.read().clone()
    }

    /// Apply `f` to a copy and publish it only if `f` succeeds
    pub fn try_update<T, E>(&self, f: impl FnOnce(&mut Roster) -> Result<T, E>) -> Result<T, E> {
        let mut current = self.current.write();
        let mut next = Roster::clone(&current);
        let value = f(&mut next)?;
        *current = Arc::new(next);
        Ok(value)
    }

    pub fn update<T>(&self, f: impl FnOnce(&mut Roster) -> T) -> T {
        let mut current = self.current.write();
        let mut next = Roster::clone(&current);
        let value = f(&mut next);
        *current = Arc::new(next);
        value
    }

    pub fn replace(&self, roster: Roster) -> Arc<Roster> {
        std::mem::replace(&mut *self.current.write(), Arc::new(roster))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: FactionId = FactionId(1);
    const B: FactionId = FactionId(2);
    const C: FactionId = FactionId(3);
    const D: FactionId = FactionId(4);

    #[test]
    fn test_faction_registers_once() {
        let mut roster = Roster::new();
        roster.add(A, Role::Attacker).unwrap();
        assert_eq!(roster.add(A, Role::PendingDefender), Err(Rejection::AlreadyRegistered));
        assert_eq!(roster.attackers(), vec![A]);
        assert!(roster.pending_defenders().is_empty());
    }

    #[test]
    fn test_approve_only_pending() {
        let mut roster = Roster::new();
        roster.add(A, Role::PendingDefender).unwrap();
        roster.add(B, Role::Attacker).unwrap();
        roster.approve(A).unwrap();
        assert_eq!(roster.role(A), Some(Role::Defender));
        assert_eq!(roster.approve(B), Err(Rejection::NotPending));
        assert_eq!(roster.approve(C), Err(Rejection::NotPending));
    }

    #[test]
    fn test_merge_rows_keeps_live_roles() {
        let mut roster = Roster::new();
        roster.add(A, Role::Attacker).unwrap();
        roster.add(B, Role::PendingDefender).unwrap();

        roster.merge_rows(&[(A, Role::Defender), (C, Role::Attacker), (D, Role::Owner)]);

        assert_eq!(roster.role(A), Some(Role::Attacker));
        assert_eq!(roster.role(B), Some(Role::PendingDefender));
        assert_eq!(roster.role(C), Some(Role::Attacker));
        assert_eq!(roster.owner(), Some(D));
        assert_eq!(roster.len(), 4);
    }

    #[test]
    fn test_discard_pending() {
        let mut roster = Roster::new();
        roster.add(A, Role::PendingDefender).unwrap();
        roster.add(B, Role::Defender).unwrap();
        let dropped = roster.discard_pending();
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].faction, A);
        assert_eq!(roster.defenders(), vec![B]);
    }

    #[test]
    fn test_seizure_swaps_sides() {
        let mut roster = Roster::new();
        roster.set_owner(A);
        roster.add(B, Role::Defender).unwrap();
        roster.add(C, Role::Attacker).unwrap();
        roster.add(D, Role::Attacker).unwrap();
        let banner = EntityId::new();
        roster.plant_banner(D, banner, 1).unwrap();

        let removed = roster.swap_for_seizure(C, &[D]);

        assert_eq!(roster.owner(), Some(C));
        assert_eq!(roster.role(D), Some(Role::Defender));
        assert_eq!(roster.role(A), Some(Role::Attacker));
        assert_eq!(roster.role(B), Some(Role::Attacker));
        assert_eq!(removed, vec![banner]);
        assert!(roster.is_consistent());
    }

    #[test]
    fn test_set_owner_demotes_previous() {
        let mut roster = Roster::new();
        roster.set_owner(A);
        roster.set_owner(B);
        assert_eq!(roster.owner(), Some(B));
        assert_eq!(roster.role(A), Some(Role::Defender));
        assert!(roster.is_consistent());
    }

    #[test]
    fn test_banner_limit() {
        let mut roster = Roster::new();
        roster.add(A, Role::Attacker).unwrap();
        roster.add(B, Role::PendingDefender).unwrap();
        roster.plant_banner(A, EntityId::new(), 1).unwrap();
        assert_eq!(
            roster.plant_banner(A, EntityId::new(), 1),
            Err(Rejection::BannerLimit(1))
        );
        assert_eq!(
            roster.plant_banner(B, EntityId::new(), 1),
            Err(Rejection::NotCombatant)
        );
        assert_eq!(roster.banner_count(A), 1);
    }

    #[test]
    fn test_recipients_by_side() {
        let mut roster = Roster::new();
        roster.set_owner(A);
        roster.add(B, Role::Attacker).unwrap();
        roster.add(C, Role::PendingDefender).unwrap();
        assert_eq!(roster.recipients(false), vec![A]);
        assert_eq!(roster.recipients(true), vec![A, B]);
    }

    #[test]
    fn test_failed_update_keeps_snapshot() {
        let shared = SharedRoster::default();
        shared.update(|r| r.add(A, Role::Attacker)).unwrap();
        let before = shared.snapshot();

        let result = shared.try_update(|r| {
            r.remove(A);
            r.add(B, Role::Attacker)?;
            r.add(B, Role::Attacker)
        });

        assert!(result.is_err());
        assert_eq!(shared.snapshot(), before);
        assert_eq!(before.attackers(), vec![A]);
    }
}
