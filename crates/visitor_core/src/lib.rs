pub mod domain;
pub mod error;
pub mod mail;
pub mod memory;
pub mod notifications;
pub mod ports;
pub mod shifts;
pub mod visits;

pub use domain::{
    ActiveShift, NewNotification, NewVisitSession, Notification, NotificationStatus, Period,
    Profile, PushPayload, Role, VisitScope, VisitSession, VisitStatus, VisitTransition,
    VisitorContext,
};
pub use error::{VisitorError, VisitorResult};
pub use mail::{ApprovalAction, ApprovalMailer};
pub use notifications::{NotificationDispatcher, NotifyOutcome, NotifyRequest};
pub use ports::{
    DeliveryOutcome, DirectoryStore, EmailMessage, EmailService, PortError, PortResult,
    PushGateway,
};
pub use shifts::ShiftRegistry;
pub use visits::{NewVisitRequest, VisitService};

#[cfg(test)]
mod test_support;
