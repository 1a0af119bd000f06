//! crates/visitor_core/src/mail.rs
//!
//! Approval / rejection emails sent to residents.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::info;

use crate::error::{VisitorError, VisitorResult};
use crate::ports::{EmailMessage, EmailService};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalAction {
    Approved,
    Rejected,
}

impl fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalAction::Approved => f.write_str("approved"),
            ApprovalAction::Rejected => f.write_str("rejected"),
        }
    }
}

impl FromStr for ApprovalAction {
    type Err = VisitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(ApprovalAction::Approved),
            "rejected" => Ok(ApprovalAction::Rejected),
            other => Err(VisitorError::Validation(format!(
                "action must be 'approved' or 'rejected', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone)]
pub struct ApprovalMailer {
    email: Arc<dyn EmailService>,
}

impl ApprovalMailer {
    pub fn new(email: Arc<dyn EmailService>) -> Self {
        Self { email }
    }

    pub async fn send_approval_email(
        &self,
        resident_email: &str,
        visit_ref: &str,
        action: &str,
    ) -> VisitorResult<()> {
        if resident_email.trim().is_empty() || visit_ref.trim().is_empty() || action.trim().is_empty()
        {
            return Err(VisitorError::Validation("Missing required parameters".to_string()));
        }
        let action: ApprovalAction = action.parse()?;
        let message = compose(resident_email, visit_ref, action);
        self.email.send_email(&message).await?;
        info!(to = %resident_email, %action, "Approval email sent");
        Ok(())
    }
}

fn compose(resident_email: &str, visit_ref: &str, action: ApprovalAction) -> EmailMessage {
    EmailMessage {
        to: resident_email.to_string(),
        subject: format!("Visit {}: {}", action, visit_ref),
        html: format!(
            "<p>Hi,</p>\
             <p>The visit {} has been {} by the resident. Please follow up accordingly.</p>\
             <p>If you did not expect this notification, please ignore this email.</p>",
            escape_html(visit_ref),
            action
        ),
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
