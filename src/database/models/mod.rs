pub mod chat;
pub mod notification;
pub mod order;
pub mod payment;
pub mod product;
pub mod promotion;
pub mod review;
pub mod seller;
pub mod user;

pub use chat::ChatMessage;
pub use notification::Notification;
pub use order::{Order, OrderItem, TrackingEvent};
pub use payment::Payment;
pub use product::Product;
pub use promotion::Promotion;
pub use review::Review;
pub use seller::{PayoutRequest, SellerApplication};
pub use user::{Role, User};
