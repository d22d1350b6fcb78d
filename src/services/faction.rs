//! Faction and alliance registry

use serde::{Deserialize, Serialize};

use crate::core::types::{ActorId, AllianceId, FactionId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionInfo {
    pub id: FactionId,
    pub name: String,
    pub level: u32,
    pub member_count: u32,
    pub alliance: Option<AllianceId>,
    pub leader: ActorId,
}

pub trait FactionRegistry: Send + Sync {
    fn faction(&self, id: FactionId) -> Option<FactionInfo>;

    fn alliance_of(&self, id: FactionId) -> Option<AllianceId>;

    fn alliance_members(&self, alliance: AllianceId) -> Vec<FactionId>;

    fn reputation(&self, id: FactionId) -> i64;

    fn add_reputation(&self, id: FactionId, amount: u32);

    fn take_reputation(&self, id: FactionId, amount: u32);

    fn is_leader(&self, faction: FactionId, actor: ActorId) -> bool;

    /// Every faction sharing an alliance with `id`, excluding `id`
    fn allies_of(&self, id: FactionId) -> Vec<FactionId> {
        match self.alliance_of(id) {
            Some(alliance) => self
                .alliance_members(alliance)
                .into_iter()
                .filter(|member| *member != id)
                .collect(),
            None => Vec::new(),
        }
    }
}
