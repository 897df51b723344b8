//! broterm-feed entry point.
//!
//! Headless feed tail: starts a session from an access token in the
//! environment, connects the feed and logs every event until Ctrl-C or
//! token expiry.

use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use broterm_feed::app_state::AppContext;
use broterm_feed::config::{FeedConfig, parse_env};
use broterm_feed::domain::{EventCategory, FeedEvent};
use broterm_feed::feed::Subscription;
use broterm_feed::session::{Scope, UserAuth};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = FeedConfig::from_env();
    let token = std::env::var("BROTERM_ACCESS_TOKEN")
        .context("BROTERM_ACCESS_TOKEN must hold a bearer token")?;
    let ttl = Duration::from_secs(parse_env("BROTERM_TOKEN_TTL_SECS", 3600));
    tracing::info!(endpoint = %config.endpoint(), "starting broterm-feed");

    // Build the session and feed
    let root = Scope::new_root();
    let ctx = AppContext::new(root.clone(), config);
    ctx.login(UserAuth::with_ttl(token, ttl), || {
        tracing::warn!("access token expired; log in again");
    });
    let Ok(session) = ctx.sessions.derive_scope() else {
        anyhow::bail!("session ended before the feed could start");
    };

    // Subscribe before connecting so no early event is missed
    let mut consumers = Vec::new();
    for category in EventCategory::ALL {
        let subscription = ctx.feed.subscribe(category).await;
        consumers.push(tokio::spawn(log_events(subscription)));
    }

    ctx.feed.connect().await.context("feed connection failed")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl-C")?;
            tracing::info!("interrupted; logging out");
        }
        () = session.cancelled() => {}
    }

    ctx.logout();
    ctx.feed.wait_disconnected().await;
    for consumer in consumers {
        let _ = consumer.await;
    }
    root.cancel();

    if let Some(reason) = ctx.feed.last_disconnect() {
        tracing::info!(?reason, "feed stopped");
    }
    Ok(())
}

async fn log_events(mut subscription: Subscription) {
    while let Some(event) = subscription.recv().await {
        match event {
            FeedEvent::ChatMessage(msg) => tracing::info!(
                channel_id = %msg.channel_id,
                sender = %msg.sender_user_id,
                at = %msg.received_at_utc,
                "{}",
                msg.content
            ),
            FeedEvent::UserProfileUpdated(update) => {
                tracing::info!(code = update.update_code.0, "profile updated");
            }
            FeedEvent::ChannelUpdated(update) => {
                tracing::info!(channel_id = %update.channel_id, "channel updated");
            }
        }
    }
    tracing::debug!(category = subscription.category().as_str(), "subscription closed");
}
