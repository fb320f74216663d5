use serde::{Deserialize, Serialize};

use super::flag::UnknownName;

/// Fine-grained capability inside a claim. Granted per player or claim-wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Build,
    Break,
    ContainerAccess,
    DoorUse,
    Redstone,
    Husbandry,
    Detonate,
    Sleep,
    VehicleUse,
    SignEdit,
    DisplayManipulate,
    EventStart,
    ManagePartitions,
    ManagePermissions,
    ManageFlags,
    ManageMetadata,
}

impl Permission {
    pub const ALL: [Permission; 16] = [
        Permission::Build,
        Permission::Break,
        Permission::ContainerAccess,
        Permission::DoorUse,
        Permission::Redstone,
        Permission::Husbandry,
        Permission::Detonate,
        Permission::Sleep,
        Permission::VehicleUse,
        Permission::SignEdit,
        Permission::DisplayManipulate,
        Permission::EventStart,
        Permission::ManagePartitions,
        Permission::ManagePermissions,
        Permission::ManageFlags,
        Permission::ManageMetadata,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Permission::Build => "build",
            Permission::Break => "break",
            Permission::ContainerAccess => "container_access",
            Permission::DoorUse => "door_use",
            Permission::Redstone => "redstone",
            Permission::Husbandry => "husbandry",
            Permission::Detonate => "detonate",
            Permission::Sleep => "sleep",
            Permission::VehicleUse => "vehicle_use",
            Permission::SignEdit => "sign_edit",
            Permission::DisplayManipulate => "display_manipulate",
            Permission::EventStart => "event_start",
            Permission::ManagePartitions => "manage_partitions",
            Permission::ManagePermissions => "manage_permissions",
            Permission::ManageFlags => "manage_flags",
            Permission::ManageMetadata => "manage_metadata",
        }
    }

    /// Management permissions let the holder change the claim itself rather
    /// than interact with blocks inside it.
    pub const fn is_management(&self) -> bool {
        match self {
            Permission::ManagePartitions
            | Permission::ManagePermissions
            | Permission::ManageFlags
            | Permission::ManageMetadata => true,
            Permission::Build
            | Permission::Break
            | Permission::ContainerAccess
            | Permission::DoorUse
            | Permission::Redstone
            | Permission::Husbandry
            | Permission::Detonate
            | Permission::Sleep
            | Permission::VehicleUse
            | Permission::SignEdit
            | Permission::DisplayManipulate
            | Permission::EventStart => false,
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Permission {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_back() {
        for p in Permission::ALL {
            assert_eq!(p.as_str().parse::<Permission>(), Ok(p));
        }
    }

    #[test]
    fn only_manage_variants_are_management() {
        let managed: Vec<_> = Permission::ALL.into_iter().filter(Permission::is_management).collect();
        assert_eq!(managed.len(), 4);
        assert!(!Permission::Build.is_management());
    }
}
