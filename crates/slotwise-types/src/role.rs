use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Role of an account. Stored as lowercase text in the `users.role` column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UserRole {
    /// Books appointments for themselves.
    #[default]
    Patient,
    /// Owns a calendar that others book into.
    Provider,
    /// Sees and edits everything.
    Admin,
}

impl UserRole {
    pub fn is_admin(self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

/// Author of a chat message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    /// Result of a tool invocation, only ever sent to the model.
    Tool,
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn roles_round_trip_through_column_text() {
        assert_eq!(UserRole::Provider.as_ref(), "provider");
        assert_eq!(UserRole::from_str("admin").unwrap(), UserRole::Admin);
        assert_eq!(MessageRole::Assistant.to_string(), "assistant");
        assert!(UserRole::from_str("superuser").is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&UserRole::Patient).unwrap();
        assert_eq!(json, "\"patient\"");
        let role: MessageRole = serde_json::from_str("\"tool\"").unwrap();
        assert_eq!(role, MessageRole::Tool);
    }
}
