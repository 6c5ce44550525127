pub mod jwt;
pub mod notify;
pub mod payment;
pub mod presence;
pub mod razorpay;
pub mod realtime;

pub use jwt::JwtService;
pub use notify::NotificationService;
pub use payment::PaymentService;
pub use presence::PresenceStore;
pub use razorpay::RazorpayService;
pub use realtime::{EventHub, RealtimeEvent};
