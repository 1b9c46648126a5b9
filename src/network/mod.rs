pub mod mqtt;
pub mod wifi;
