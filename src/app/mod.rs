mod actions;
pub mod state;

pub use actions::ActionDispatcher;
pub use state::{build_list_view, CustomerSummary, ListOptions, ListSection, ListView};
