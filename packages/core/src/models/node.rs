//! Node and Page Data Structures
//!
//! Read-side views of the content store. A `Page` owns a forest of root
//! nodes; every `Node` belongs to exactly one page and has at most one
//! parent node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named root container owning a forest of nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// A unit of content inside a page tree
///
/// # Fields
///
/// - `id`: Stable node identifier (uid)
/// - `text`: Raw node content, including inline references
/// - `page_id` / `page_title`: The page that owns this node's tree
/// - `created_at` / `modified_at`: Store timestamps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub text: String,
    pub page_id: String,
    pub page_title: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Node {
    /// Number of values a node occupies in a result row
    pub const ROW_WIDTH: usize = 6;

    /// Build a node from the projection columns produced by
    /// [`crate::query::NodeProjection`]:
    /// `uid, string, page uid, page title, create time, edit time`
    pub fn from_row(row: &[Value]) -> Result<Self, String> {
        if row.len() < Self::ROW_WIDTH {
            return Err(format!(
                "expected {} node columns, got {}",
                Self::ROW_WIDTH,
                row.len()
            ));
        }

        Ok(Self {
            id: string_column(row, 0, "uid")?,
            text: string_column(row, 1, "string")?,
            page_id: string_column(row, 2, "page uid")?,
            page_title: string_column(row, 3, "page title")?,
            created_at: time_column(row, 4, "create time")?,
            modified_at: time_column(row, 5, "edit time")?,
        })
    }
}

fn string_column(row: &[Value], index: usize, name: &str) -> Result<String, String> {
    row[index]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| format!("column {} ({}) is not a string: {}", index, name, row[index]))
}

fn time_column(row: &[Value], index: usize, name: &str) -> Result<DateTime<Utc>, String> {
    row[index]
        .as_i64()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .ok_or_else(|| {
            format!(
                "column {} ({}) is not a millisecond timestamp: {}",
                index, name, row[index]
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_from_row() {
        let row = vec![
            json!("b1"),
            json!("Project Alpha"),
            json!("p1"),
            json!("Projects"),
            json!(1_700_000_000_000i64),
            json!(1_700_000_500_000i64),
        ];
        let node = Node::from_row(&row).unwrap();
        assert_eq!(node.id, "b1");
        assert_eq!(node.text, "Project Alpha");
        assert_eq!(node.page_title, "Projects");
        assert_eq!(node.created_at.timestamp_millis(), 1_700_000_000_000);
        assert!(node.modified_at > node.created_at);
    }

    #[test]
    fn test_node_from_short_row_fails() {
        let err = Node::from_row(&[json!("b1")]).unwrap_err();
        assert!(err.contains("expected 6"));
    }

    #[test]
    fn test_node_from_row_rejects_wrong_types() {
        let row = vec![
            json!(42),
            json!("text"),
            json!("p1"),
            json!("Page"),
            json!(0),
            json!(0),
        ];
        assert!(Node::from_row(&row).unwrap_err().contains("uid"));
    }

    #[test]
    fn test_node_serializes_camel_case() {
        let row = vec![
            json!("b1"),
            json!("x"),
            json!("p1"),
            json!("Page"),
            json!(0),
            json!(0),
        ];
        let value = serde_json::to_value(Node::from_row(&row).unwrap()).unwrap();
        assert_eq!(value["pageId"], "p1");
        assert_eq!(value["pageTitle"], "Page");
        assert!(value.get("modifiedAt").is_some());
    }
}
