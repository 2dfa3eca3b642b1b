pub mod toml_loader;

pub use toml_loader::{load_profile, load_selectors, load_settings};
