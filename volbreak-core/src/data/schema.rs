use polars::prelude::*;

/// Column layouts for bar data on disk and in imported CSV files.
pub struct BarSchema;

impl BarSchema {
    /// Schema of an imported CSV file. Timestamps are parsed after loading so
    /// that both `YYYY-MM-DD HH:MM[:SS]` and ISO `T`-separated forms are accepted.
    pub fn csv_schema() -> Schema {
        Schema::from_iter(vec![
            Field::new("timestamp".into(), DataType::String),
            Field::new("open".into(), DataType::Float64),
            Field::new("high".into(), DataType::Float64),
            Field::new("low".into(), DataType::Float64),
            Field::new("close".into(), DataType::Float64),
            Field::new("volume".into(), DataType::Float64),
        ])
    }

    /// Check that a stored partition has every expected column with the right type.
    pub fn validate_stored(df: &DataFrame) -> Result<(), SchemaError> {
        let actual = df.schema();
        for (name, expected) in [
            ("start_ms", DataType::Int64),
            ("end_ms", DataType::Int64),
            ("open", DataType::Float64),
            ("high", DataType::Float64),
            ("low", DataType::Float64),
            ("close", DataType::Float64),
            ("volume", DataType::UInt64),
        ] {
            let dtype = actual
                .get(name)
                .ok_or_else(|| SchemaError::MissingColumn(name.to_string()))?;
            if dtype != &expected {
                return Err(SchemaError::TypeMismatch {
                    column: name.to_string(),
                    expected,
                    actual: dtype.clone(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },
}
