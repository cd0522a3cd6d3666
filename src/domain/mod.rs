pub mod category;
pub mod frequency;
pub mod new_subscriber;
pub mod subscriber;
pub mod subscriber_email;
