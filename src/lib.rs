pub mod config;
pub mod dates;
pub mod logging;
pub mod metrics;
pub mod panels;
pub mod record;
pub mod report;
pub mod source;
pub mod window;

pub use dates::{normalize, DayRange, MonthKey};
pub use record::{Dataset, Record, Value};
pub use report::{build_report, DashboardReport};
pub use source::RecordSource;
