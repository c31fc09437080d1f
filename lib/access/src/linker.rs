//! Find-or-create identity linking.
//!
//! Given a verified provider profile, resolve it to exactly one local user:
//! a known `(provider, provider_id)` pair wins outright; otherwise the
//! email decides, creating a fresh user when nobody holds it and failing
//! hard when more than one does.

use chrono::{DateTime, Utc};
use keywarden_core::{Error, ErrorCode, Result};
use tracing::info;

use crate::identity::AuthIdentity;
use crate::store::{AuthIdentityStore, UserStore};
use crate::user::User;

/// Resolves a provider login to a local user and identity link.
///
/// Concurrent first logins through the same account can race past the
/// lookups; the storage uniqueness constraints catch that, and a
/// `Conflict` from a create is answered by re-running the lookup and
/// adopting whichever row won.
pub async fn link_identity(
    users: &dyn UserStore,
    identities: &dyn AuthIdentityStore,
    provider: &str,
    provider_id: &str,
    email: &str,
    now: DateTime<Utc>,
) -> Result<(User, AuthIdentity)> {
    match identities.find_identity(provider, provider_id).await {
        Ok(mut identity) => {
            let user = users.find_user_by_id(identity.user_id()).await?;
            identity.touch(now);
            identities.update_identity(&identity).await?;
            return Ok((user, identity));
        }
        Err(err) if err.code() == ErrorCode::NotFound => {}
        Err(err) => return Err(err),
    }

    let user = resolve_user_by_email(users, email, now).await?;

    let identity = AuthIdentity::new(
        user.id(),
        provider.to_string(),
        provider_id.to_string(),
        now,
    );
    identity.validate()?;
    match identities.create_identity(&identity).await {
        Ok(()) => {
            info!(
                user_id = %user.id(),
                provider,
                "linked new identity"
            );
            Ok((user, identity))
        }
        Err(err) if err.code() == ErrorCode::Conflict => {
            // A concurrent login linked this account first; adopt its row.
            let identity = identities.find_identity(provider, provider_id).await?;
            let user = users.find_user_by_id(identity.user_id()).await?;
            Ok((user, identity))
        }
        Err(err) => Err(err),
    }
}

/// Finds the single user holding `email`, creating one if nobody does.
async fn resolve_user_by_email(
    users: &dyn UserStore,
    email: &str,
    now: DateTime<Utc>,
) -> Result<User> {
    match single_user_by_email(users, email).await? {
        Some(user) => Ok(user),
        None => {
            let user = User::new(email.to_string(), now);
            user.validate()?;
            match users.create_user(&user).await {
                Ok(()) => {
                    info!(user_id = %user.id(), "created user on first login");
                    Ok(user)
                }
                Err(err) if err.code() == ErrorCode::Conflict => {
                    // Lost a create race on the email; the winner's row is
                    // the user now.
                    single_user_by_email(users, email)
                        .await?
                        .ok_or_else(|| Error::internal("user vanished after email conflict"))
                }
                Err(err) => Err(err),
            }
        }
    }
}

async fn single_user_by_email(users: &dyn UserStore, email: &str) -> Result<Option<User>> {
    let mut matches = users.find_users_by_email(email).await?;
    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches.remove(0))),
        _ => Err(Error::conflict("multiple users share this email")),
    }
}
