pub mod button_reader;
pub mod departure_fetcher;
pub mod display_controller;
