//! World events the host asks the claim layer about.

use claims_engine::{Flag, Permission, PlayerId, Position3D, WorldId};

/// Something a player does to the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    BreakBlock,
    PlaceBlock,
    OpenContainer,
    UseDoor,
    UseRedstone,
    /// Breeding, leashing, shearing and similar.
    TouchAnimal,
    /// Igniting TNT, end crystals and other explosives.
    Detonate,
    Sleep,
    RideVehicle,
    EditSign,
    /// Armour stands, item frames and display entities.
    ManipulateDisplay,
    /// Raids and other triggered events.
    StartEvent,
}

impl Interaction {
    pub const fn permission(self) -> Permission {
        match self {
            Interaction::BreakBlock => Permission::Break,
            Interaction::PlaceBlock => Permission::Build,
            Interaction::OpenContainer => Permission::ContainerAccess,
            Interaction::UseDoor => Permission::DoorUse,
            Interaction::UseRedstone => Permission::Redstone,
            Interaction::TouchAnimal => Permission::Husbandry,
            Interaction::Detonate => Permission::Detonate,
            Interaction::Sleep => Permission::Sleep,
            Interaction::RideVehicle => Permission::VehicleUse,
            Interaction::EditSign => Permission::SignEdit,
            Interaction::ManipulateDisplay => Permission::DisplayManipulate,
            Interaction::StartEvent => Permission::EventStart,
        }
    }

    /// Uses that leave nothing behind. A claim can open these to every
    /// visitor with [`Flag::VisitorInteraction`].
    pub const fn is_casual(self) -> bool {
        matches!(
            self,
            Interaction::UseDoor | Interaction::UseRedstone | Interaction::Sleep | Interaction::RideVehicle
        )
    }
}

/// Something that happens at one position with no player responsible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hazard {
    Explosion,
    Lightning,
    MobGrief,
    FireSpread,
    /// A player hurting another; checked at the victim's position.
    PlayerDamage,
    /// Items spilling when a player dies.
    DeathDrop,
}

impl Hazard {
    pub const fn flag(self) -> Flag {
        match self {
            Hazard::Explosion => Flag::Explosion,
            Hazard::Lightning => Flag::Lightning,
            Hazard::MobGrief => Flag::MobGriefing,
            Hazard::FireSpread => Flag::FireSpread,
            Hazard::PlayerDamage => Flag::Pvp,
            Hazard::DeathDrop => Flag::ItemDropOnDeath,
        }
    }
}

/// Something that moves from one block into another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spread {
    Piston,
    Fluid,
    TreeGrowth,
    Sculk,
    Dispenser,
    FallingBlock,
}

impl Spread {
    pub const fn flag(self) -> Flag {
        match self {
            Spread::Piston => Flag::Pistons,
            Spread::Fluid => Flag::FluidFlow,
            Spread::TreeGrowth => Flag::TreeGrowth,
            Spread::Sculk => Flag::SculkSpread,
            Spread::Dispenser => Flag::Dispensers,
            Spread::FallingBlock => Flag::FallingBlocks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldEvent {
    Interact {
        world: WorldId,
        player: PlayerId,
        pos: Position3D,
        action: Interaction,
    },
    Hazard {
        world: WorldId,
        pos: Position3D,
        hazard: Hazard,
    },
    Spread {
        world: WorldId,
        from: Position3D,
        to: Position3D,
        spread: Spread,
    },
}

impl WorldEvent {
    pub fn world(&self) -> WorldId {
        match self {
            WorldEvent::Interact { world, .. }
            | WorldEvent::Hazard { world, .. }
            | WorldEvent::Spread { world, .. } => *world,
        }
    }
}
