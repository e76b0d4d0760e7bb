pub mod channel;
pub mod notification;

pub use channel::Notifier;
pub use notification::{Notification, NotificationContent, Response, Success, Token, THINKING_TAG};
