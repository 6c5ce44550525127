pub mod user;
pub mod gig;
pub mod bid;
pub mod payment;
pub mod chat;
pub mod message;
pub mod notification;
pub mod profile;
pub mod review;

pub use user::*;
pub use gig::*;
pub use bid::*;
pub use payment::*;
pub use chat::*;
pub use message::*;
pub use notification::*;
pub use profile::*;
pub use review::*;
