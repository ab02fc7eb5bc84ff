use thiserror::Error;

use lazytab_io::ProviderError;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("result has {rows} rows, more than the configured cap of {cap}")]
    TooManyRows { rows: usize, cap: usize },

    #[error("plan varies along {0} and has no single value")]
    NotScalar(String),

    #[error("plan has no dataset to read field '{0}' from")]
    NoDataset(String),

    #[error("provider streamed {len} records for group {group}, needed position {wanted}")]
    Truncated {
        group: String,
        len: usize,
        wanted: usize,
    },

    #[error("axis '{0}' is not bound at this point of the plan")]
    Unbound(String),

    #[error("kernel: {0}")]
    Kernel(String),

    #[error("provider: {0}")]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Core(#[from] lazytab_core::error::Error),
}
