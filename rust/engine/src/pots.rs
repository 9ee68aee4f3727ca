//! Layered side-pot construction.

use serde::{Deserialize, Serialize};

use crate::player::{PlayerId, PlayerState};

/// One pot layer: the chips in it and the players who can win it.
/// Index 0 of a breakdown is the main pot; later entries are side pots
/// in the order the all-in caps were reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pot {
    pub amount: u64,
    pub eligible: Vec<PlayerId>,
}

/// Build the pot breakdown from every player's total hand contribution.
///
/// Each all-in contender's total contribution forms a cap. Walking the
/// caps in ascending order, every player (folded players included) funds
/// each layer with the part of their contribution that falls inside it;
/// the layer is winnable by the contenders who covered it. Chips above
/// the last cap form the final layer over the remaining contenders.
pub fn build_pots(players: &[PlayerState]) -> Vec<Pot> {
    let mut caps: Vec<u64> = players
        .iter()
        .filter(|p| p.contending() && p.all_in)
        .map(|p| p.total_contributed)
        .collect();
    if let Some(top) = players
        .iter()
        .filter(|p| p.contending())
        .map(|p| p.total_contributed)
        .max()
    {
        caps.push(top);
    }
    caps.sort_unstable();
    caps.dedup();
    caps.retain(|&c| c > 0);

    let mut pots = Vec::new();
    let mut floor = 0u64;
    for cap in caps {
        let amount: u64 = players
            .iter()
            .map(|p| p.total_contributed.min(cap).saturating_sub(floor))
            .sum();
        let eligible: Vec<PlayerId> = players
            .iter()
            .filter(|p| p.contending() && p.total_contributed >= cap)
            .map(|p| p.id)
            .collect();
        if amount > 0 && !eligible.is_empty() {
            pots.push(Pot { amount, eligible });
        }
        floor = cap;
    }

    // Folded chips above the top contender cap have no layer of their
    // own; they ride with the last pot.
    let orphaned: u64 = players
        .iter()
        .map(|p| p.total_contributed.saturating_sub(floor))
        .sum();
    if orphaned > 0 {
        if let Some(last) = pots.last_mut() {
            last.amount += orphaned;
        }
    }
    pots
}
