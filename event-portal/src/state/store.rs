//! Browser-session persistence of the authenticated pair and OAuth verifier.

use tower_sessions::Session;

use crate::models::SessionPair;

const AUTH_KEY: &str = "auth";
const PKCE_VERIFIER_KEY: &str = "pkce_verifier";

pub async fn load_pair(session: &Session) -> anyhow::Result<Option<SessionPair>> {
    Ok(session.get::<SessionPair>(AUTH_KEY).await?)
}

/// Overwrite the stored pair in one write.
pub async fn save_pair(session: &Session, pair: &SessionPair) -> anyhow::Result<()> {
    session.insert(AUTH_KEY, pair).await?;
    Ok(())
}

/// Store a freshly signed-in pair under a new session id.
pub async fn begin_authenticated(session: &Session, pair: &SessionPair) -> anyhow::Result<()> {
    session.cycle_id().await?;
    save_pair(session, pair).await
}

pub async fn clear_pair(session: &Session) -> anyhow::Result<()> {
    session.remove::<SessionPair>(AUTH_KEY).await?;
    Ok(())
}

pub async fn store_verifier(session: &Session, verifier: &str) -> anyhow::Result<()> {
    session.insert(PKCE_VERIFIER_KEY, verifier).await?;
    Ok(())
}

/// Verifiers are single-use: reading one removes it.
pub async fn take_verifier(session: &Session) -> anyhow::Result<Option<String>> {
    Ok(session.remove::<String>(PKCE_VERIFIER_KEY).await?)
}
