pub mod daily_entry;
