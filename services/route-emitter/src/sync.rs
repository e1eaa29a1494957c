//! Background loops: periodic full sync, event tailing and re-emission.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use cellroute_routing_table::MessagesToEmit;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::source::StateSource;
use crate::watcher::Watcher;

/// Fetches full desired/actual state and fresh domains, then syncs the
/// table against them.
///
/// Events handled while the listings are fetched are cached by the watcher
/// and replayed onto the new table. If any fetch fails, the cached events
/// are applied to the live table instead.
pub async fn sync_once(source: &dyn StateSource, watcher: &Watcher) -> Result<MessagesToEmit> {
    watcher.begin_sync();

    let fetched = tokio::try_join!(
        async {
            source
                .desired_scheduling_infos()
                .await
                .context("failed to fetch desired lrps")
        },
        async {
            source
                .actual_lrps()
                .await
                .context("failed to fetch actual lrps")
        },
        async { source.domains().await.context("failed to fetch domains") },
    );

    let (desired, actuals, domains) = match fetched {
        Ok(state) => state,
        Err(e) => {
            watcher.abort_sync().await;
            return Err(e);
        }
    };

    debug!(
        desired_count = desired.len(),
        actual_count = actuals.len(),
        domain_count = domains.len(),
        "Fetched state for sync"
    );

    Ok(watcher.sync(desired, actuals, &domains).await)
}

/// Sync on every tick. The first tick fires immediately.
pub async fn run_sync_loop(
    interval: Duration,
    source: Arc<dyn StateSource>,
    watcher: Arc<Watcher>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if let Err(e) = sync_once(source.as_ref(), &watcher).await {
            warn!(error = %format!("{e:#}"), "Sync failed; retrying at next interval");
        }
    }
}

/// Reads a persisted cursor. A missing or empty file yields `None`.
pub fn read_cursor(path: &Path) -> Result<Option<i64>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read cursor file {}", path.display()))?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    trimmed
        .parse::<i64>()
        .map(Some)
        .with_context(|| format!("Invalid cursor in {}", path.display()))
}

/// Atomically replaces the cursor file with `cursor`.
pub fn write_cursor(path: &Path, cursor: i64) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let tmp: PathBuf = path.with_extension("tmp");
    fs::write(&tmp, cursor.to_string())
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| {
        format!(
            "Failed to move cursor file into place ({} -> {})",
            tmp.display(),
            path.display()
        )
    })?;

    Ok(())
}

/// Pages through the event feed without applying anything and returns the
/// id of its latest event.
pub async fn fast_forward_cursor(source: &dyn StateSource, limit: i64) -> Result<i64> {
    let mut cursor = 0;

    loop {
        let page = source
            .events(cursor, limit)
            .await
            .context("failed to fetch events")?;
        let next = page
            .items
            .iter()
            .map(|item| item.event_id)
            .fold(cursor.max(page.next_after_event_id), i64::max);

        if page.items.is_empty() || next == cursor {
            return Ok(next);
        }
        cursor = next;
    }
}

/// Where the event loop starts: the persisted cursor if there is one,
/// otherwise the head of the feed. Fetch errors are retried after the poll
/// interval; an unreadable cursor file is an error.
pub async fn initial_cursor(config: &Config, source: &dyn StateSource) -> Result<i64> {
    if let Some(path) = &config.cursor_file {
        if let Some(cursor) = read_cursor(path)? {
            info!(cursor, path = %path.display(), "Resuming event feed from cursor file");
            return Ok(cursor);
        }
    }

    loop {
        match fast_forward_cursor(source, config.event_fetch_limit).await {
            Ok(cursor) => {
                info!(cursor, "Following event feed from its head");
                return Ok(cursor);
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Failed to find event feed head; retrying");
                tokio::time::sleep(config.event_poll_interval).await;
            }
        }
    }
}

/// Fetches one page of events after `cursor` and applies them.
///
/// Returns the new cursor and the number of events received. Events that
/// cannot be decoded are logged and skipped.
pub async fn poll_events_once(
    source: &dyn StateSource,
    watcher: &Watcher,
    cursor: i64,
    limit: i64,
) -> Result<(i64, usize)> {
    let page = source
        .events(cursor, limit)
        .await
        .context("failed to fetch events")?;
    let received = page.items.len();

    let mut cursor = cursor;
    for item in page.items {
        cursor = cursor.max(item.event_id);
        let event_id = item.event_id;
        let event_type = item.event_type.clone();

        match item.decode() {
            Ok(event) => {
                watcher.handle_event(event).await;
            }
            Err(e) => {
                warn!(
                    event_id,
                    event_type = %event_type,
                    error = %e,
                    "Skipping undecodable event"
                );
            }
        }
    }

    Ok((cursor.max(page.next_after_event_id), received))
}

/// Tail the event feed forever, starting after `cursor`.
pub async fn run_event_loop(
    config: &Config,
    source: Arc<dyn StateSource>,
    watcher: Arc<Watcher>,
    mut cursor: i64,
) {
    loop {
        match poll_events_once(source.as_ref(), &watcher, cursor, config.event_fetch_limit).await {
            Ok((next, received)) => {
                if next != cursor {
                    if let Some(path) = &config.cursor_file {
                        if let Err(e) = write_cursor(path, next) {
                            warn!(
                                error = %format!("{e:#}"),
                                cursor = next,
                                "Failed to persist cursor"
                            );
                        }
                    }
                }
                cursor = next;
                if received == 0 {
                    tokio::time::sleep(config.event_poll_interval).await;
                }
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), cursor, "Failed to poll events; retrying");
                tokio::time::sleep(config.event_poll_interval).await;
            }
        }
    }
}

/// Re-emit the whole table on every tick.
pub async fn run_emit_loop(interval: Duration, watcher: Arc<Watcher>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Skip the immediate first tick; the initial sync already emits.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let messages = watcher.emit_all().await;
        info!(
            registrations = messages.route_registration_count(),
            "Re-emitted routing table"
        );
    }
}
