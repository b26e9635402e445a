/// Arrow schema definitions for the matter findings and risks tables.
pub mod tables {
    use arrow::datatypes::{DataType, Field, Schema};

    pub const FINDINGS: &str = "findings";
    pub const RISKS: &str = "risks";

    /// Schema for normalised findings. `value` holds JSON text.
    pub fn findings_schema() -> Schema {
        Schema::new(vec![
            Field::new("matter_id", DataType::Utf8, false),
            Field::new("key", DataType::Utf8, false),
            Field::new("value", DataType::Utf8, false),
            Field::new("evidence_file", DataType::Utf8, true),
            Field::new("evidence_page", DataType::Int32, true),
            Field::new("evidence_note", DataType::Utf8, true),
            Field::new("confidence", DataType::Int32, false),
            Field::new("created_at", DataType::Utf8, false),
        ])
    }

    /// Schema for derived risks. `evidence` holds a JSON array; `ordinal`
    /// keeps rule-table order.
    pub fn risks_schema() -> Schema {
        Schema::new(vec![
            Field::new("matter_id", DataType::Utf8, false),
            Field::new("ordinal", DataType::Int32, false),
            Field::new("code", DataType::Utf8, false),
            Field::new("severity", DataType::Utf8, false),
            Field::new("message", DataType::Utf8, false),
            Field::new("evidence", DataType::Utf8, false),
            Field::new("created_at", DataType::Utf8, false),
        ])
    }
}
