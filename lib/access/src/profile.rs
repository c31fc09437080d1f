//! Profile claims extracted from an identity-provider token response.

use keywarden_core::{Error, Result};

/// The subset of identity-provider claims the login flow needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpProfile {
    /// Provider-assigned subject identifier.
    pub subject: String,
    /// Email address asserted by the provider.
    pub email: String,
    /// Whether the provider has verified the email address.
    pub email_verified: bool,
    /// Given name claim, if present.
    pub given_name: Option<String>,
    /// Family name claim, if present.
    pub family_name: Option<String>,
    /// Profile picture URL claim, if present.
    pub picture: Option<String>,
}

impl IdpProfile {
    /// Rejects profiles that cannot drive identity linking.
    ///
    /// `email_verified` is carried for callers to inspect but does not
    /// fail validation; an unverified email still identifies the account
    /// at the provider.
    pub fn validate(&self) -> Result<()> {
        if self.subject.is_empty() {
            return Err(Error::invalid("subject required"));
        }
        if self.email.is_empty() {
            return Err(Error::invalid("email required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keywarden_core::ErrorCode;

    fn profile() -> IdpProfile {
        IdpProfile {
            subject: "sub-123".to_string(),
            email: "alice@example.com".to_string(),
            email_verified: true,
            given_name: Some("Alice".to_string()),
            family_name: None,
            picture: None,
        }
    }

    #[test]
    fn verified_profile_is_valid() {
        assert!(profile().validate().is_ok());
    }

    #[test]
    fn unverified_email_still_validates() {
        let mut p = profile();
        p.email_verified = false;
        assert!(p.validate().is_ok());
    }

    #[test]
    fn missing_email_is_rejected() {
        let mut p = profile();
        p.email = String::new();
        assert_eq!(p.validate().unwrap_err().code(), ErrorCode::Invalid);
    }

    #[test]
    fn missing_subject_is_rejected() {
        let mut p = profile();
        p.subject = String::new();
        assert_eq!(p.validate().unwrap_err().code(), ErrorCode::Invalid);
    }
}
