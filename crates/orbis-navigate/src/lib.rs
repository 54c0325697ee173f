//! Camera snapshots for the globe: the immutable per-frame [`NavigatorState`] and the
//! [`Navigator`] controllers that produce it.

mod look_at;
mod state;

pub use look_at::{LookAtNavigator, Navigator};
pub use state::NavigatorState;
