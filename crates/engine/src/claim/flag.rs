use serde::{Deserialize, Serialize};

/// Claim-wide toggle for world behaviour that no permission grant covers.
///
/// A flag that is *enabled* allows the behaviour inside the claim. Claims start
/// with every flag disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    Explosion,
    FireSpread,
    MobGriefing,
    Pvp,
    /// Doors, redstone, beds and vehicles open to every visitor.
    VisitorInteraction,
    ItemDropOnDeath,
    Pistons,
    FluidFlow,
    TreeGrowth,
    SculkSpread,
    Dispensers,
    Lightning,
    FallingBlocks,
}

impl Flag {
    pub const ALL: [Flag; 13] = [
        Flag::Explosion,
        Flag::FireSpread,
        Flag::MobGriefing,
        Flag::Pvp,
        Flag::VisitorInteraction,
        Flag::ItemDropOnDeath,
        Flag::Pistons,
        Flag::FluidFlow,
        Flag::TreeGrowth,
        Flag::SculkSpread,
        Flag::Dispensers,
        Flag::Lightning,
        Flag::FallingBlocks,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Flag::Explosion => "explosion",
            Flag::FireSpread => "fire_spread",
            Flag::MobGriefing => "mob_griefing",
            Flag::Pvp => "pvp",
            Flag::VisitorInteraction => "visitor_interaction",
            Flag::ItemDropOnDeath => "item_drop_on_death",
            Flag::Pistons => "pistons",
            Flag::FluidFlow => "fluid_flow",
            Flag::TreeGrowth => "tree_growth",
            Flag::SculkSpread => "sculk_spread",
            Flag::Dispensers => "dispensers",
            Flag::Lightning => "lightning",
            Flag::FallingBlocks => "falling_blocks",
        }
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Flag {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Flag::ALL
            .into_iter()
            .find(|flag| flag.as_str() == s)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

/// A flag or permission name that matches nothing in the enumeration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown name: {0:?}")]
pub struct UnknownName(pub String);
