pub mod departure;
pub mod wiener_linien_api_model;
