//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
//! Descriptions of collections and tables, as returned by `listCollections`
//! and `listTables`, and as sent to `createCollection` and `createTable`.
//!
//! The Data API adds column types over time. Any column type this SDK does not
//! know is kept as [`ColumnTypeDescriptor::Unknown`] holding the raw json, and
//! written back unchanged.

use serde_derive::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{ia_err, DataAPIError};
use crate::types::SortMode;

const SCALAR_TYPES: [&str; 21] = [
    "ascii", "bigint", "blob", "boolean", "counter", "date", "decimal", "double", "duration",
    "float", "inet", "int", "smallint", "text", "time", "timestamp", "timeuuid", "tinyint",
    "uuid", "varchar", "varint",
];

/// Extra information the Data API gives for columns it cannot fully handle,
/// such as columns created directly through CQL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSupportDescriptor {
    pub cql_definition: String,
    pub create_table: bool,
    pub insert: bool,
    pub read: bool,
}

impl ApiSupportDescriptor {
    fn from_value(v: &Value) -> Option<ApiSupportDescriptor> {
        serde_json::from_value(v.clone()).ok()
    }

    fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// The type of one table column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnTypeDescriptor {
    /// `text`, `int`, `timestamp`, ...
    Scalar(String),
    Vector {
        dimension: Option<u64>,
        /// Server-side embedding settings, passed through as-is.
        service: Option<Value>,
    },
    List {
        value_type: Box<ColumnTypeDescriptor>,
    },
    Set {
        value_type: Box<ColumnTypeDescriptor>,
    },
    Map {
        key_type: Box<ColumnTypeDescriptor>,
        value_type: Box<ColumnTypeDescriptor>,
    },
    /// A column the Data API reports but does not fully support.
    Unsupported {
        api_support: ApiSupportDescriptor,
    },
    /// Anything else: kept verbatim.
    Unknown(Value),
}

impl ColumnTypeDescriptor {
    /// Parse a column type from either its string shorthand (`"text"`) or its
    /// object form (`{"type": "list", "valueType": "int"}`). Never fails.
    pub fn from_value(v: &Value) -> ColumnTypeDescriptor {
        let parsed = match v {
            Value::String(s) => Self::from_object(&json!({ "type": s })),
            Value::Object(_) => Self::from_object(v),
            _ => None,
        };
        match parsed {
            Some(d) => d,
            None => {
                debug!("unknown column type descriptor: {}", v);
                ColumnTypeDescriptor::Unknown(v.clone())
            }
        }
    }

    fn from_object(v: &Value) -> Option<ColumnTypeDescriptor> {
        let ctype = v.get("type").and_then(|t| t.as_str());
        if let Some(k) = v.get("keyType") {
            if ctype != Some("map") {
                return None;
            }
            let vt = v.get("valueType")?;
            return Some(ColumnTypeDescriptor::Map {
                key_type: Box::new(Self::from_value(k)),
                value_type: Box::new(Self::from_value(vt)),
            });
        }
        if let Some(vt) = v.get("valueType") {
            let value_type = Box::new(Self::from_value(vt));
            return match ctype? {
                "list" => Some(ColumnTypeDescriptor::List { value_type }),
                "set" => Some(ColumnTypeDescriptor::Set { value_type }),
                _ => None,
            };
        }
        match ctype? {
            "vector" => {
                let dimension = match v.get("dimension") {
                    None | Some(Value::Null) => None,
                    Some(d) => Some(d.as_u64()?),
                };
                let service = v.get("service").filter(|s| !s.is_null()).cloned();
                Some(ColumnTypeDescriptor::Vector { dimension, service })
            }
            "UNSUPPORTED" => {
                let api_support = ApiSupportDescriptor::from_value(v.get("apiSupport")?)?;
                Some(ColumnTypeDescriptor::Unsupported { api_support })
            }
            t if SCALAR_TYPES.contains(&t) => Some(ColumnTypeDescriptor::Scalar(t.to_string())),
            _ => None,
        }
    }

    /// The object form of this type. An [`Unknown`](ColumnTypeDescriptor::Unknown)
    /// type returns exactly what was parsed.
    pub fn to_value(&self) -> Value {
        match self {
            ColumnTypeDescriptor::Scalar(s) => json!({ "type": s }),
            ColumnTypeDescriptor::Vector { dimension, service } => {
                let mut m = Map::new();
                m.insert("type".to_string(), json!("vector"));
                if let Some(d) = dimension {
                    m.insert("dimension".to_string(), json!(d));
                }
                if let Some(s) = service {
                    m.insert("service".to_string(), s.clone());
                }
                Value::Object(m)
            }
            ColumnTypeDescriptor::List { value_type } => {
                json!({ "type": "list", "valueType": value_type.to_inner_value() })
            }
            ColumnTypeDescriptor::Set { value_type } => {
                json!({ "type": "set", "valueType": value_type.to_inner_value() })
            }
            ColumnTypeDescriptor::Map {
                key_type,
                value_type,
            } => json!({
                "type": "map",
                "keyType": key_type.to_inner_value(),
                "valueType": value_type.to_inner_value(),
            }),
            ColumnTypeDescriptor::Unsupported { api_support } => json!({
                "type": "UNSUPPORTED",
                "apiSupport": api_support.to_value(),
            }),
            ColumnTypeDescriptor::Unknown(raw) => raw.clone(),
        }
    }

    // key and value types of collections use the string shorthand
    fn to_inner_value(&self) -> Value {
        match self {
            ColumnTypeDescriptor::Scalar(s) => json!(s),
            other => other.to_value(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ColumnTypeDescriptor::Unknown(_))
    }
}

/// The primary key of a table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PrimaryKeyDescriptor {
    pub partition_by: Vec<String>,
    /// Clustering columns, in order.
    pub partition_sort: Vec<(String, SortMode)>,
}

impl PrimaryKeyDescriptor {
    /// Parse either the string shorthand (a single partition column) or the
    /// object form `{"partitionBy": [...], "partitionSort": {...}}`.
    pub fn from_value(v: &Value) -> Result<PrimaryKeyDescriptor, DataAPIError> {
        if let Value::String(s) = v {
            return Ok(PrimaryKeyDescriptor {
                partition_by: vec![s.clone()],
                partition_sort: Vec::new(),
            });
        }
        let partition_by = match v.get("partitionBy") {
            Some(Value::Array(a)) => {
                let mut cols = Vec::with_capacity(a.len());
                for c in a {
                    match c.as_str() {
                        Some(s) => cols.push(s.to_string()),
                        None => return ia_err!("invalid partitionBy column: {}", c),
                    }
                }
                cols
            }
            _ => return ia_err!("primary key is missing 'partitionBy': {}", v),
        };
        let mut partition_sort = Vec::new();
        if let Some(Value::Object(ps)) = v.get("partitionSort") {
            for (col, dir) in ps {
                let mode = match dir.as_i64() {
                    Some(d) if d > 0 => SortMode::Ascending,
                    Some(d) if d < 0 => SortMode::Descending,
                    _ => return ia_err!("invalid partitionSort value for {}: {}", col, dir),
                };
                partition_sort.push((col.clone(), mode));
            }
        }
        Ok(PrimaryKeyDescriptor {
            partition_by,
            partition_sort,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut ps = Map::new();
        for (col, mode) in &self.partition_sort {
            ps.insert(col.clone(), json!(*mode as i32));
        }
        json!({ "partitionBy": self.partition_by, "partitionSort": ps })
    }
}

/// The columns and primary key of a table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableDefinition {
    /// Columns, in the order the Data API lists them.
    pub columns: Vec<(String, ColumnTypeDescriptor)>,
    pub primary_key: PrimaryKeyDescriptor,
}

impl TableDefinition {
    pub fn new() -> TableDefinition {
        TableDefinition::default()
    }

    /// Add a column. `column_type` may be a shorthand such as `"text"`.
    pub fn column(mut self, name: &str, column_type: &Value) -> TableDefinition {
        self.columns
            .push((name.to_string(), ColumnTypeDescriptor::from_value(column_type)));
        self
    }

    pub fn partition_by(mut self, columns: &[&str]) -> TableDefinition {
        self.primary_key.partition_by = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn partition_sort(mut self, column: &str, mode: SortMode) -> TableDefinition {
        self.primary_key.partition_sort.push((column.to_string(), mode));
        self
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnTypeDescriptor> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    pub fn from_value(v: &Value) -> Result<TableDefinition, DataAPIError> {
        let mut columns = Vec::new();
        match v.get("columns") {
            Some(Value::Object(cols)) => {
                for (name, ct) in cols {
                    columns.push((name.clone(), ColumnTypeDescriptor::from_value(ct)));
                }
            }
            _ => return ia_err!("table definition is missing 'columns': {}", v),
        }
        let primary_key = match v.get("primaryKey") {
            Some(pk) => PrimaryKeyDescriptor::from_value(pk)?,
            None => return ia_err!("table definition is missing 'primaryKey': {}", v),
        };
        Ok(TableDefinition {
            columns,
            primary_key,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut cols = Map::new();
        for (name, ct) in &self.columns {
            cols.insert(name.clone(), ct.to_value());
        }
        json!({ "columns": cols, "primaryKey": self.primary_key.to_value() })
    }
}

/// A table, as listed by the Data API.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDescriptor {
    pub name: String,
    pub definition: TableDefinition,
    /// The full json this descriptor was parsed from.
    pub raw: Value,
}

impl TableDescriptor {
    pub fn from_value(v: &Value) -> Result<TableDescriptor, DataAPIError> {
        let name = match v.get("name").and_then(|n| n.as_str()) {
            Some(n) => n.to_string(),
            None => return ia_err!("table descriptor has no name: {}", v),
        };
        let definition = match v.get("definition") {
            Some(d) => TableDefinition::from_value(d)?,
            None => return ia_err!("table descriptor for {} has no definition", name),
        };
        Ok(TableDescriptor {
            name,
            definition,
            raw: v.clone(),
        })
    }

    pub fn to_value(&self) -> Value {
        json!({ "name": self.name, "definition": self.definition.to_value() })
    }
}

/// A collection, as listed by the Data API.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionDescriptor {
    pub name: String,
    /// The collection options (vector, indexing, default id ...), as given
    /// by the Data API.
    pub options: Map<String, Value>,
}

impl CollectionDescriptor {
    pub fn from_value(v: &Value) -> Result<CollectionDescriptor, DataAPIError> {
        let name = match v.get("name").and_then(|n| n.as_str()) {
            Some(n) => n.to_string(),
            None => return ia_err!("collection descriptor has no name: {}", v),
        };
        let options = match v.get("options") {
            Some(Value::Object(o)) => o.clone(),
            None | Some(Value::Null) => Map::new(),
            Some(other) => return ia_err!("invalid options for collection {}: {}", name, other),
        };
        Ok(CollectionDescriptor { name, options })
    }

    pub fn to_value(&self) -> Value {
        json!({ "name": self.name, "options": self.options })
    }

    /// The vector dimension, for vector-enabled collections.
    pub fn vector_dimension(&self) -> Option<u64> {
        self.options
            .get("vector")
            .and_then(|v| v.get("dimension"))
            .and_then(|d| d.as_u64())
    }

    /// The similarity metric, for vector-enabled collections.
    pub fn vector_metric(&self) -> Option<&str> {
        self.options
            .get("vector")
            .and_then(|v| v.get("metric"))
            .and_then(|m| m.as_str())
    }
}

/// Settings of a regular (non-vector) index on a text column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableIndexOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ascii: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalize: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_sensitive: Option<bool>,
}

/// Settings of a vector index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableVectorIndexOptions {
    /// `cosine`, `dot_product` or `euclidean`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_model: Option<String>,
}

/// What an index covers and how.
#[derive(Debug, Clone, PartialEq)]
pub enum TableIndexDefinition {
    Regular {
        column: String,
        options: TableIndexOptions,
    },
    Vector {
        column: String,
        options: TableVectorIndexOptions,
    },
    /// An index the Data API cannot describe, such as one created through CQL,
    /// or a shape this SDK does not know. Kept verbatim.
    Unknown(Value),
}

impl TableIndexDefinition {
    /// Never fails: anything not understood becomes [`TableIndexDefinition::Unknown`].
    pub fn from_value(v: &Value) -> TableIndexDefinition {
        let column = match v.get("column").and_then(|c| c.as_str()) {
            Some(c) if c != "UNKNOWN" => c.to_string(),
            _ => return TableIndexDefinition::Unknown(v.clone()),
        };
        let raw_options = v.get("options").cloned().unwrap_or_else(|| json!({}));
        let parsed = if raw_options.get("metric").is_some() {
            serde_json::from_value(raw_options.clone())
                .ok()
                .map(|options| TableIndexDefinition::Vector { column, options })
        } else {
            serde_json::from_value(raw_options.clone())
                .ok()
                .map(|options| TableIndexDefinition::Regular { column, options })
        };
        match parsed {
            Some(d) if d.to_value() == *v || v.get("options").is_none() => d,
            _ => {
                debug!("keeping index definition as-is: {}", v);
                TableIndexDefinition::Unknown(v.clone())
            }
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            TableIndexDefinition::Regular { column, options } => json!({
                "column": column,
                "options": serde_json::to_value(options).unwrap_or_else(|_| json!({})),
            }),
            TableIndexDefinition::Vector { column, options } => json!({
                "column": column,
                "options": serde_json::to_value(options).unwrap_or_else(|_| json!({})),
            }),
            TableIndexDefinition::Unknown(v) => v.clone(),
        }
    }

    /// The indexed column, if known.
    pub fn column(&self) -> Option<&str> {
        match self {
            TableIndexDefinition::Regular { column, .. } => Some(column),
            TableIndexDefinition::Vector { column, .. } => Some(column),
            TableIndexDefinition::Unknown(_) => None,
        }
    }
}

/// An index, as listed by `listIndexes`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableIndexDescriptor {
    pub name: String,
    pub definition: TableIndexDefinition,
}

impl TableIndexDescriptor {
    pub fn from_value(v: &Value) -> Result<TableIndexDescriptor, DataAPIError> {
        let name = match v.get("name").and_then(|n| n.as_str()) {
            Some(n) => n.to_string(),
            None => return ia_err!("index descriptor has no name: {}", v),
        };
        let definition = match v.get("definition") {
            Some(d) => TableIndexDefinition::from_value(d),
            None => return ia_err!("index descriptor for {} has no definition", name),
        };
        Ok(TableIndexDescriptor { name, definition })
    }
}

/// A change to the schema of an existing table, for [`Table::alter()`](crate::Table::alter()).
#[derive(Debug, Clone, PartialEq)]
pub enum AlterTableOperation {
    AddColumns(Vec<(String, ColumnTypeDescriptor)>),
    DropColumns(Vec<String>),
    /// Enable server-side embeddings on vector columns. Each service
    /// definition (provider, modelName ...) is passed through as-is.
    AddVectorize(Vec<(String, Value)>),
    DropVectorize(Vec<String>),
}

impl AlterTableOperation {
    /// The name of the operation inside the `alterTable` command.
    pub fn name(&self) -> &'static str {
        match self {
            AlterTableOperation::AddColumns(_) => "add",
            AlterTableOperation::DropColumns(_) => "drop",
            AlterTableOperation::AddVectorize(_) => "addVectorize",
            AlterTableOperation::DropVectorize(_) => "dropVectorize",
        }
    }

    /// `{"<name>": {"columns": ...}}`
    pub fn to_value(&self) -> Value {
        let columns = match self {
            AlterTableOperation::AddColumns(cols) => {
                let mut m = Map::new();
                for (n, ct) in cols {
                    m.insert(n.clone(), ct.to_value());
                }
                Value::Object(m)
            }
            AlterTableOperation::AddVectorize(cols) => {
                let mut m = Map::new();
                for (n, svc) in cols {
                    m.insert(n.clone(), svc.clone());
                }
                Value::Object(m)
            }
            AlterTableOperation::DropColumns(cols) | AlterTableOperation::DropVectorize(cols) => {
                json!(cols)
            }
        };
        let mut op = Map::new();
        op.insert(self.name().to_string(), json!({ "columns": columns }));
        Value::Object(op)
    }
}
