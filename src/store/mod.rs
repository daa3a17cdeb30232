pub mod file;
pub mod record;

pub use file::{lookup, update};
pub use record::UserRecord;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("can't lock \"{path}\": {source}")]
    Lock {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}
