pub mod load_data;
pub mod present;
