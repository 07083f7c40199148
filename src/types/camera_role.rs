use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

//
// Logical position of a camera on the rig.
// The lowercase form doubles as the registry key and the suffix of recorded files.
//
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CameraRole {
    Visible,
    Thermal,
}

impl CameraRole {
    pub fn name(&self) -> &'static str {
        match self {
            CameraRole::Visible => "visible",
            CameraRole::Thermal => "thermal",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn parses_lowercase_role_names() {
        assert_eq!(CameraRole::from_str("visible").unwrap(), CameraRole::Visible);
        assert_eq!(CameraRole::from_str("thermal").unwrap(), CameraRole::Thermal);
        assert!(CameraRole::from_str("infrared").is_err());
    }

    #[test]
    fn display_matches_registry_name() {
        for role in CameraRole::iter() {
            assert_eq!(role.to_string(), role.name());
        }
    }
}
