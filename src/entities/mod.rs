pub mod activity;
pub mod activity_item;
pub mod category;
pub mod price_history;
pub mod product; // denormalized stock counter lives here
pub mod stock_ledger_entry;
pub mod user;
