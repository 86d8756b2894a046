pub mod commission;
pub mod forecast;
pub mod notify;
