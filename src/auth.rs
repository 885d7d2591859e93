use tokio::sync::watch;

use crate::models::UserId;

/// Source of the signed-in user
pub trait AuthProvider: Send + Sync {
    /// The signed-in user, if any
    fn current_user(&self) -> Option<UserId>;

    /// Subscribes to sign-in/sign-out changes.
    ///
    /// The receiver is the subscription; dropping it unsubscribes.
    fn subscribe(&self) -> watch::Receiver<Option<UserId>>;
}

/// Auth provider holding the signed-in user in process memory
///
/// Credential checks happen in the identity service in front of this
/// client; this type only tracks who is signed in and restores a persisted
/// user id on launch.
#[derive(Debug)]
pub struct LocalAuthProvider {
    user_tx: watch::Sender<Option<UserId>>,
}

impl Default for LocalAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalAuthProvider {
    pub fn new() -> Self {
        let (user_tx, _) = watch::channel(None);
        Self { user_tx }
    }

    /// Creates a provider with a previously persisted user already signed in
    pub fn restore(user_id: Option<UserId>) -> Self {
        let provider = Self::new();
        if let Some(user_id) = user_id {
            tracing::info!(user_id = %user_id, "Restored signed-in user");
            provider.sign_in(user_id);
        }
        provider
    }

    pub fn sign_in(&self, user_id: UserId) {
        tracing::info!(user_id = %user_id, "User signed in");
        self.user_tx.send_replace(Some(user_id));
    }

    pub fn sign_out(&self) {
        if let Some(previous) = self.user_tx.send_replace(None) {
            tracing::info!(user_id = %previous, "User signed out");
        }
    }
}

impl AuthProvider for LocalAuthProvider {
    fn current_user(&self) -> Option<UserId> {
        self.user_tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<UserId>> {
        self.user_tx.subscribe()
    }
}
