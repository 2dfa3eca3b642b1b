pub mod history;
pub mod loaders;
pub mod profile;
pub mod stats;
pub mod work_item;

pub use history::{upsert_bounded, HistoryEntry, HistoryStatus, HISTORY_CAPACITY};
pub use loaders::{load_profile, load_selectors, load_settings};
pub use profile::{ProfileData, SkillEntry};
pub use stats::{CounterKind, RunCounters};
pub use work_item::{FormOutcome, ItemStatus, WorkItem};
