pub mod connection;
pub mod headless;

pub use connection::{connect_to_browser_and_page, url_matches};
pub use headless::launch_headless_browser;
