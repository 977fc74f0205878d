//! Visualization argument builders.
//!
//! Each supported kind binds the attributes of a `-- viz ` magic comment to a
//! fixed argument list, the way a function call binds keyword arguments:
//! required arguments must be present, optional ones fall back to defaults and
//! anything else is rejected.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::types::QueryDefinition;

/// Supported visualization kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VizKind {
    Table,
    Counter,
}

impl VizKind {
    /// Name used in definition files.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Counter => "counter",
        }
    }
}

impl fmt::Display for VizKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VizKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "table" => Ok(Self::Table),
            "counter" => Ok(Self::Counter),
            other => Err(Error::UnknownVizType(other.to_string())),
        }
    }
}

/// Fully resolved visualization, ready to send to the service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VizSpec {
    #[serde(rename = "type")]
    pub kind: VizKind,
    pub name: String,
    pub description: Option<String>,
    pub options: VizOptions,
}

/// Kind-specific visualization options.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VizOptions {
    Table(TableOptions),
    Counter(CounterOptions),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableOptions {
    pub items_per_page: u32,
    pub condensed: bool,
    pub with_row_number: bool,
    pub version: u32,
    pub columns: Vec<VizColumn>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterOptions {
    pub counter_label: Option<String>,
    pub counter_col_name: String,
    pub row_number: u32,
    pub target_row_number: u32,
    pub string_decimal: u32,
    pub string_dec_char: String,
    pub string_thou_sep: String,
    pub tooltip_format: String,
    pub count_row: bool,
}

/// Table column descriptor with display defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VizColumn {
    pub name: String,
    pub title: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub image_url_template: String,
    pub image_title_template: String,
    pub link_url_template: String,
    pub link_text_template: String,
    pub link_title_template: String,
    pub link_open_in_new_tab: bool,
    pub display_as: String,
    pub visible: bool,
    pub order: u32,
    pub allow_search: bool,
    pub align_content: String,
    #[serde(rename = "allowHTML")]
    pub allow_html: bool,
    pub highlight_links: bool,
    pub use_monospace_font: bool,
    pub preserve_whitespace: bool,
}

impl VizColumn {
    /// Column showing `name` as a plain string, titled after itself.
    pub fn new(name: &str) -> Self {
        let template = "{{ @ }}".to_string();
        Self {
            name: name.to_string(),
            title: name.to_string(),
            column_type: "string".to_string(),
            image_url_template: template.clone(),
            image_title_template: template.clone(),
            link_url_template: template.clone(),
            link_text_template: template.clone(),
            link_title_template: template,
            link_open_in_new_tab: true,
            display_as: "string".to_string(),
            visible: true,
            order: 100_000,
            allow_search: false,
            align_content: "left".to_string(),
            allow_html: false,
            highlight_links: false,
            use_monospace_font: false,
            preserve_whitespace: false,
        }
    }
}

/// Resolve the visualization of a query definition.
///
/// Fails on a missing or unknown `type` and on any argument the kind's
/// builder does not accept.
pub fn build(query: &QueryDefinition) -> Result<VizSpec> {
    let kind: VizKind = query.viz_type().unwrap_or("none").parse()?;
    let args = Args::new(kind.name(), query.viz_args());
    match kind {
        VizKind::Table => table(args),
        VizKind::Counter => counter(args),
    }
}

fn table(mut args: Args<'_>) -> Result<VizSpec> {
    let name = args.required("name")?;
    let columns = args.required("columns")?;
    let items_per_page = args.int("items_per_page", 25)?;
    let condensed = args.flag("condensed", true)?;
    let with_row_number = args.flag("with_row_number", false)?;
    let description = args.optional("description");
    args.finish()?;

    Ok(VizSpec {
        kind: VizKind::Table,
        name,
        description,
        options: VizOptions::Table(TableOptions {
            items_per_page,
            condensed,
            with_row_number,
            version: 2,
            columns: columns
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(VizColumn::new)
                .collect(),
        }),
    })
}

fn counter(mut args: Args<'_>) -> Result<VizSpec> {
    let name = args.required("name")?;
    let value_column = args.required("value_column")?;
    let description = args.optional("description");
    let counter_label = args.optional("counter_label");
    let row_number = args.int("value_row_number", 1)?;
    let target_row_number = args.int("target_row_number", 1)?;
    let string_decimal = args.int("string_decimal", 0)?;
    let string_dec_char = args
        .optional("string_decimal_char")
        .unwrap_or_else(|| ".".to_string());
    let string_thou_sep = args
        .optional("string_thousand_separator")
        .unwrap_or_else(|| ",".to_string());
    let tooltip_format = args
        .optional("tooltip_format")
        .unwrap_or_else(|| "0,0.000".to_string());
    let count_row = args.flag("count_row", false)?;
    args.finish()?;

    Ok(VizSpec {
        kind: VizKind::Counter,
        name,
        description,
        options: VizOptions::Counter(CounterOptions {
            counter_label,
            counter_col_name: value_column,
            row_number,
            target_row_number,
            string_decimal,
            string_dec_char,
            string_thou_sep,
            tooltip_format,
            count_row,
        }),
    })
}

// ============================================================================
// Argument binding
// ============================================================================

/// Keyword arguments being bound to one builder.
struct Args<'a> {
    builder: &'static str,
    values: HashMap<&'a str, &'a str>,
}

impl<'a> Args<'a> {
    fn new(builder: &'static str, values: HashMap<&'a str, &'a str>) -> Self {
        Self { builder, values }
    }

    fn optional(&mut self, name: &str) -> Option<String> {
        self.values.remove(name).map(str::to_string)
    }

    fn required(&mut self, name: &'static str) -> Result<String> {
        self.optional(name).ok_or(Error::MissingArgument {
            builder: self.builder,
            argument: name,
        })
    }

    fn int(&mut self, name: &str, default: u32) -> Result<u32> {
        match self.values.remove(name) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| Error::InvalidArgument {
                argument: name.to_string(),
                value: raw.to_string(),
                expected: "a non-negative integer",
            }),
        }
    }

    fn flag(&mut self, name: &str, default: bool) -> Result<bool> {
        match self.values.remove(name) {
            None => Ok(default),
            Some(raw) => parse_bool(raw).ok_or_else(|| Error::InvalidArgument {
                argument: name.to_string(),
                value: raw.to_string(),
                expected: "true or false",
            }),
        }
    }

    /// Reject whatever was not consumed by the builder.
    fn finish(self) -> Result<()> {
        let mut extra: Vec<&str> = self.values.into_keys().collect();
        extra.sort_unstable();
        match extra.first() {
            Some(argument) => Err(Error::UnexpectedArgument {
                builder: self.builder,
                argument: (*argument).to_string(),
            }),
            None => Ok(()),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GroupRef;

    fn query(viz: &[(&str, &str)]) -> QueryDefinition {
        QueryDefinition {
            group: GroupRef::from("assessment_main"),
            name: "00_count.sql".to_string(),
            query_text: "SELECT 1".to_string(),
            viz_attrs: viz
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            widget_attrs: HashMap::new(),
        }
    }

    #[test]
    fn test_table_defaults() {
        let spec =
            build(&query(&[("type", "table"), ("name", "Tables"), ("columns", "a,b,c")])).unwrap();
        assert_eq!(spec.kind, VizKind::Table);
        assert_eq!(spec.name, "Tables");
        assert_eq!(spec.description, None);
        let VizOptions::Table(options) = spec.options else {
            panic!("expected table options");
        };
        assert_eq!(options.items_per_page, 25);
        assert!(options.condensed);
        assert!(!options.with_row_number);
        assert_eq!(options.version, 2);
        let names: Vec<&str> = options.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_table_overrides() {
        let spec = build(&query(&[
            ("type", "table"),
            ("name", "T"),
            ("columns", "x"),
            ("items_per_page", "10"),
            ("condensed", "False"),
            ("with_row_number", "true"),
            ("description", "All tables"),
        ]))
        .unwrap();
        assert_eq!(spec.description.as_deref(), Some("All tables"));
        let VizOptions::Table(options) = spec.options else {
            panic!("expected table options");
        };
        assert_eq!(options.items_per_page, 10);
        assert!(!options.condensed);
        assert!(options.with_row_number);
    }

    #[test]
    fn test_counter_defaults() {
        let spec =
            build(&query(&[("type", "counter"), ("name", "Count"), ("value_column", "n")]))
                .unwrap();
        assert_eq!(spec.kind, VizKind::Counter);
        let VizOptions::Counter(options) = spec.options else {
            panic!("expected counter options");
        };
        assert_eq!(options.counter_col_name, "n");
        assert_eq!(options.row_number, 1);
        assert_eq!(options.target_row_number, 1);
        assert_eq!(options.string_decimal, 0);
        assert_eq!(options.string_dec_char, ".");
        assert_eq!(options.string_thou_sep, ",");
        assert_eq!(options.tooltip_format, "0,0.000");
        assert!(!options.count_row);
        assert_eq!(options.counter_label, None);
    }

    #[test]
    fn test_unknown_kind() {
        let err = build(&query(&[("type", "pie"), ("name", "P")])).unwrap_err();
        assert!(matches!(err, Error::UnknownVizType(ref k) if k == "pie"));
    }

    #[test]
    fn test_missing_type() {
        let err = build(&query(&[("name", "P")])).unwrap_err();
        assert!(matches!(err, Error::UnknownVizType(_)));
    }

    #[test]
    fn test_unexpected_argument() {
        let err = build(&query(&[
            ("type", "counter"),
            ("name", "C"),
            ("value_column", "n"),
            ("columns", "a"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::UnexpectedArgument { argument, .. } if argument == "columns"));
    }

    #[test]
    fn test_missing_required_argument() {
        let err = build(&query(&[("type", "table"), ("name", "T")])).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingArgument {
                builder: "table",
                argument: "columns"
            }
        ));
    }

    #[test]
    fn test_invalid_integer() {
        let err = build(&query(&[
            ("type", "table"),
            ("name", "T"),
            ("columns", "a"),
            ("items_per_page", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn test_wire_format() {
        let spec = build(&query(&[("type", "table"), ("name", "T"), ("columns", "a")])).unwrap();
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["type"], "TABLE");
        assert_eq!(json["options"]["itemsPerPage"], 25);
        assert_eq!(json["options"]["columns"][0]["displayAs"], "string");
        assert_eq!(json["options"]["columns"][0]["allowHTML"], false);
        assert_eq!(json["options"]["columns"][0]["type"], "string");
    }
}
