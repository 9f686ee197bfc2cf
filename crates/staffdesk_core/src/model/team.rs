//! Team membership records.

use super::staffer::Section;
use super::{Collection, Entity};
use serde::{Deserialize, Serialize};

/// Asserts that the executive identified by `added_by` owns `staffer_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeamMember {
    pub id: String,
    pub staffer_id: String,
    pub staffer_name: String,
    pub section: Section,
    pub added_by: String,
    pub added_by_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Entity for TeamMember {
    const COLLECTION: Collection = Collection::Teams;

    fn id(&self) -> &str {
        &self.id
    }
}
