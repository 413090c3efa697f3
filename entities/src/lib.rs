pub mod reading_state;
