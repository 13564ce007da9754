use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LicenseType {
    pub id: i32,
    pub code: String,
    pub name: String,
    pub parent_id: Option<i32>,
    pub is_parent: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LicenseTypeNode {
    #[serde(flatten)]
    pub license_type: LicenseType,
    pub children: Vec<LicenseType>,
}

/// Groups a flat list into parent nodes with their children.
///
/// Types that are neither parents nor attached to a known parent become
/// childless top-level nodes.
pub fn build_tree(types: Vec<LicenseType>) -> Vec<LicenseTypeNode> {
    let parent_ids: Vec<i32> = types.iter().filter(|t| t.is_parent).map(|t| t.id).collect();
    let (children, roots): (Vec<_>, Vec<_>) = types
        .into_iter()
        .partition(|t| t.parent_id.is_some_and(|p| parent_ids.contains(&p)));

    roots
        .into_iter()
        .map(|root| {
            let kids = children
                .iter()
                .filter(|c| c.parent_id == Some(root.id))
                .cloned()
                .collect();
            LicenseTypeNode {
                license_type: root,
                children: kids,
            }
        })
        .collect()
}
