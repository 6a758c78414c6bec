pub mod analytics;
pub mod health;
pub mod recommendations;

pub use analytics::get_analytics;
pub use health::{health_check, root};
pub use recommendations::recommend;
