//! Widget layout and default row allocation.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::types::QueryDefinition;

/// Width passed to the service for every widget.
pub const WIDGET_WIDTH: u32 = 1;

/// Grid position of a widget on its dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WidgetPosition {
    pub col: u32,
    pub row: u32,
    #[serde(rename = "sizeX")]
    pub size_x: u32,
    #[serde(rename = "sizeY")]
    pub size_y: u32,
}

/// Title, description and position of a widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetOptions {
    pub title: String,
    pub description: Option<String>,
    pub position: WidgetPosition,
}

/// Hands out default rows for widgets that do not declare one.
///
/// The counter advances once for every widget laid out, whether or not its
/// row is explicit, and is never reset between dashboards. One allocator
/// lives for exactly one run.
#[derive(Debug, Default)]
pub struct PositionAllocator {
    next: u32,
}

impl PositionAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn advance(&mut self) -> u32 {
        self.next += 1;
        self.next
    }

    /// Build the widget options of a query from its `-- widget ` attributes.
    ///
    /// Unrecognized attributes are ignored.
    pub fn layout(&mut self, query: &QueryDefinition) -> Result<WidgetOptions> {
        let default_row = self.advance();
        let attrs = &query.widget_attrs;
        Ok(WidgetOptions {
            title: attrs.get("title").cloned().unwrap_or_default(),
            description: attrs.get("description").cloned(),
            position: WidgetPosition {
                col: number(query, "col", 0)?,
                row: number(query, "row", default_row)?,
                size_x: number(query, "size_x", 3)?,
                size_y: number(query, "size_y", 3)?,
            },
        })
    }
}

fn number(query: &QueryDefinition, name: &str, default: u32) -> Result<u32> {
    match query.widget_attrs.get(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| Error::InvalidArgument {
            argument: name.to_string(),
            value: raw.clone(),
            expected: "a non-negative integer",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GroupRef;
    use std::collections::HashMap;

    fn query(widget: &[(&str, &str)]) -> QueryDefinition {
        QueryDefinition {
            group: GroupRef::from("assessment_main"),
            name: "00_count.sql".to_string(),
            query_text: "SELECT 1".to_string(),
            viz_attrs: HashMap::new(),
            widget_attrs: widget
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_defaults() {
        let mut positions = PositionAllocator::new();
        let options = positions.layout(&query(&[])).unwrap();
        assert_eq!(options.title, "");
        assert_eq!(options.description, None);
        assert_eq!(
            options.position,
            WidgetPosition {
                col: 0,
                row: 1,
                size_x: 3,
                size_y: 3
            }
        );
    }

    #[test]
    fn test_rows_increase() {
        let mut positions = PositionAllocator::new();
        let rows: Vec<u32> = (0..3)
            .map(|_| positions.layout(&query(&[])).unwrap().position.row)
            .collect();
        assert_eq!(rows, vec![1, 2, 3]);
    }

    #[test]
    fn test_explicit_row_still_advances_counter() {
        let mut positions = PositionAllocator::new();
        let explicit = positions.layout(&query(&[("row", "10")])).unwrap();
        assert_eq!(explicit.position.row, 10);
        let next = positions.layout(&query(&[])).unwrap();
        assert_eq!(next.position.row, 2);
    }

    #[test]
    fn test_explicit_attributes() {
        let mut positions = PositionAllocator::new();
        let options = positions
            .layout(&query(&[
                ("title", "Readiness"),
                ("description", "Share of tables ready"),
                ("col", "3"),
                ("size_x", "6"),
                ("size_y", "8"),
            ]))
            .unwrap();
        assert_eq!(options.title, "Readiness");
        assert_eq!(options.description.as_deref(), Some("Share of tables ready"));
        assert_eq!(options.position.col, 3);
        assert_eq!(options.position.size_x, 6);
        assert_eq!(options.position.size_y, 8);
    }

    #[test]
    fn test_invalid_number() {
        let mut positions = PositionAllocator::new();
        let err = positions.layout(&query(&[("col", "left")])).unwrap_err();
        assert!(err.is_definition());
    }

    #[test]
    fn test_wire_format() {
        let mut positions = PositionAllocator::new();
        let options = positions.layout(&query(&[])).unwrap();
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["position"]["sizeX"], 3);
        assert_eq!(json["position"]["row"], 1);
    }
}
