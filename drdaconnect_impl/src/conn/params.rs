pub mod connect_params;
pub mod connect_params_builder;
