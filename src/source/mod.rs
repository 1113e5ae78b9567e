// src/source/mod.rs
pub mod snapshot;
pub mod synthetic;
pub mod workbook;

pub use snapshot::SnapshotSource;
pub use synthetic::SyntheticSource;
pub use workbook::WorkbookSource;

use anyhow::Result;

use crate::record::Dataset;

/// Anything that can produce a dataset snapshot on demand.
pub trait RecordSource {
    /// Short human-readable origin, used in logs.
    fn describe(&self) -> String;

    /// Read the whole snapshot. Called once per dashboard build.
    fn load(&self) -> Result<Dataset>;
}

impl<S: RecordSource + ?Sized> RecordSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn load(&self) -> Result<Dataset> {
        (**self).load()
    }
}
