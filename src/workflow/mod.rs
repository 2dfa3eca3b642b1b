pub mod apply_flow;
pub mod form_session;

pub use apply_flow::{dismiss_step_surface, ApplyFlow};
pub use form_session::FormSession;
