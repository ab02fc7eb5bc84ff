use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("dataset '{0}' is not registered with this provider")]
    UnknownDataset(String),

    #[error("dataset '{dataset}' has no data for field '{field}'")]
    UnknownField { dataset: String, field: String },

    #[error("dataset '{dataset}' has no extent for axis '{axis}'")]
    UnknownAxis { dataset: String, axis: String },

    #[error("field '{field}' expects {expected} values, got {actual}")]
    Shape {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("field '{field}' is streamed with axes {declared}, not {requested}")]
    WrongGroup {
        field: String,
        declared: String,
        requested: String,
    },

    #[error("bad cell in column '{column}', record {record}: {reason}")]
    Parse {
        column: String,
        record: usize,
        reason: String,
    },

    #[error("provider state poisoned")]
    Poisoned,

    #[error(transparent)]
    Core(#[from] lazytab_core::error::Error),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
