pub mod error;
pub mod filter;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod priority;
pub mod sanitize;
pub mod schema;
pub mod statistics;
pub mod table;
pub mod toml_config;

pub use error::{PickerError, Result};
pub use pipeline::{process, run_files, Processed, Settings};
pub use priority::{is_clean_rdns, rank_group, Cap, PriorityEngine, PriorityGroup, Selection};
pub use sanitize::sanitize_ip_list;
pub use statistics::RunSummary;
pub use table::{Cell, Table};
pub use toml_config::TomlConfig;
