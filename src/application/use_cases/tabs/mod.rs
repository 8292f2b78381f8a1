pub mod close_tab;
pub mod list_tabs;
pub mod open_tab;
pub mod reorder_tabs;
