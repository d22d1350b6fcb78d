//! Spatial zone service: the combat area around a stronghold

use crate::core::types::StrongholdId;

pub trait ZoneService: Send + Sync {
    fn enable_contest_zone(&self, stronghold: StrongholdId);

    fn disable_contest_zone(&self, stronghold: StrongholdId);

    /// Move everyone who is not a registered participant out of the area
    fn evict_non_participants(&self, stronghold: StrongholdId);
}
