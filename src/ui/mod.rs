pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{header, human_bytes, info, status, success, summary_row, warn};
pub use table::{artifact_table, stats_table, TableBuilder};
pub use theme::{theme, Theme};
