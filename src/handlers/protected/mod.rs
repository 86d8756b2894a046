pub mod applications;
pub mod chat;
pub mod commissions;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod payouts;
pub mod predictions;
pub mod products;
pub mod promotions;
pub mod reviews;
pub mod settings;
pub mod statistics;
pub mod users;
