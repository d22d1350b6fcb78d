//! Property tests for roster membership
//!
//! Random sequences of registration, approval, seizure and banner operations
//! must never place a faction on both sides or produce two owners.

use proptest::prelude::*;

use stronghold_siege::core::types::{EntityId, FactionId, Role};
use stronghold_siege::siege::Roster;

const BANNER_LIMIT: usize = 2;

#[derive(Debug, Clone)]
enum Op {
    Attack(u32),
    Defend(u32),
    Approve(u32),
    Withdraw(u32),
    DiscardPending,
    SetOwner(u32),
    Seize(u32, Vec<u32>),
    PlantBanner(u32),
    DestroyBanner(usize),
}

fn faction() -> impl Strategy<Value = u32> {
    0u32..8
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        faction().prop_map(Op::Attack),
        faction().prop_map(Op::Defend),
        faction().prop_map(Op::Approve),
        faction().prop_map(Op::Withdraw),
        Just(Op::DiscardPending),
        faction().prop_map(Op::SetOwner),
        (faction(), prop::collection::vec(faction(), 0..3)).prop_map(|(f, allies)| Op::Seize(f, allies)),
        faction().prop_map(Op::PlantBanner),
        (0usize..16).prop_map(Op::DestroyBanner),
    ]
}

fn apply(roster: &mut Roster, op: &Op) {
    match op {
        Op::Attack(f) => {
            let _ = roster.add(FactionId(*f), Role::Attacker);
        }
        Op::Defend(f) => {
            let _ = roster.add(FactionId(*f), Role::PendingDefender);
        }
        Op::Approve(f) => {
            let _ = roster.approve(FactionId(*f));
        }
        Op::Withdraw(f) => {
            roster.remove(FactionId(*f));
        }
        Op::DiscardPending => {
            roster.discard_pending();
        }
        Op::SetOwner(f) => roster.set_owner(FactionId(*f)),
        Op::Seize(f, allies) => {
            if roster.role(FactionId(*f)) == Some(Role::Attacker) {
                let allies: Vec<FactionId> = allies.iter().map(|a| FactionId(*a)).collect();
                roster.swap_for_seizure(FactionId(*f), &allies);
            }
        }
        Op::PlantBanner(f) => {
            let _ = roster.plant_banner(FactionId(*f), EntityId::new(), BANNER_LIMIT);
        }
        Op::DestroyBanner(i) => {
            let banners = roster.all_banners();
            if !banners.is_empty() {
                roster.remove_banner(banners[i % banners.len()]);
            }
        }
    }
}

proptest! {
    #[test]
    fn roster_sides_stay_disjoint(ops in prop::collection::vec(op(), 0..64)) {
        let mut roster = Roster::new();
        for op in &ops {
            apply(&mut roster, op);

            prop_assert!(roster.is_consistent());
            let attackers = roster.attackers();
            let defenders = roster.defenders();
            let pending = roster.pending_defenders();
            prop_assert!(attackers.iter().all(|a| !defenders.contains(a) && !pending.contains(a)));
            prop_assert!(defenders.iter().all(|d| !pending.contains(d)));
            prop_assert_eq!(attackers.len() + defenders.len() + pending.len(), roster.len());
        }
    }

    #[test]
    fn banners_respect_limit(ops in prop::collection::vec(op(), 0..64)) {
        let mut roster = Roster::new();
        for op in &ops {
            apply(&mut roster, op);
        }
        for participation in roster.iter() {
            prop_assert!(participation.banners.len() <= BANNER_LIMIT);
        }
        prop_assert_eq!(
            roster.all_banners().len(),
            roster.iter().map(|p| roster.banner_count(p.faction)).sum::<usize>()
        );
    }

    #[test]
    fn seizure_makes_seizer_sole_owner(
        attackers in prop::collection::btree_set(faction(), 1..6),
        defenders in prop::collection::btree_set(8u32..12, 0..4),
        allies in prop::collection::vec(faction(), 0..4),
    ) {
        let mut roster = Roster::new();
        roster.set_owner(FactionId(100));
        for d in &defenders {
            roster.add(FactionId(*d), Role::Defender).unwrap();
        }
        for a in &attackers {
            roster.add(FactionId(*a), Role::Attacker).unwrap();
        }
        let seizer = FactionId(*attackers.iter().next().unwrap());
        let allies: Vec<FactionId> = allies.into_iter().map(FactionId).collect();

        roster.swap_for_seizure(seizer, &allies);

        prop_assert_eq!(roster.owner(), Some(seizer));
        prop_assert_eq!(roster.role(FactionId(100)), Some(Role::Attacker));
        for d in &defenders {
            prop_assert_eq!(roster.role(FactionId(*d)), Some(Role::Attacker));
        }
        for a in &attackers {
            let faction = FactionId(*a);
            if faction != seizer && allies.contains(&faction) {
                prop_assert_eq!(roster.role(faction), Some(Role::Defender));
            }
        }
    }
}
