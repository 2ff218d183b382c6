use tokio::sync::watch;
use tracing::debug;

use crate::error::StorageError;
use crate::traits::{AuthSource, Identity};

/// In-process auth session. Sign-in state lives in a watch channel so every
/// subscriber sees sign-in and sign-out.
pub struct SessionAuth {
    tx: watch::Sender<Option<Identity>>,
}

impl Default for SessionAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionAuth {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn signed_in(identity: Identity) -> Self {
        let (tx, _rx) = watch::channel(Some(identity));
        Self { tx }
    }

    pub fn sign_in(&self, identity: Identity) {
        debug!(user_id = %identity.user_id, "signed in");
        self.tx.send_replace(Some(identity));
    }

    pub fn sign_out(&self) {
        debug!("signed out");
        self.tx.send_replace(None);
    }
}

#[async_trait::async_trait]
impl AuthSource for SessionAuth {
    async fn current_user(&self) -> Result<Option<Identity>, StorageError> {
        Ok(self.tx.borrow().clone())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }
}
