pub mod db;
pub mod fcm;
pub mod resend;

pub use db::DbAdapter;
pub use fcm::{FcmConfig, FcmGateway};
pub use resend::ResendMailer;
