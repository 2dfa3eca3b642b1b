pub mod logging;

pub use logging::{init, init_log_file, print_final_stats, truncate_text};
