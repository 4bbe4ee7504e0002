//! Crosspost queueing.

use tracing::{debug, info};
use uuid::Uuid;

use feed_core::{CrosspostKind, CrosspostRepository, Frontmatter, NewCrosspostEntry, Platform};

use crate::report::{Degradation, IngestReport};

/// Platforms the frontmatter asks to crosspost to.
pub fn requested_platforms(frontmatter: &Frontmatter) -> Vec<Platform> {
    let mut platforms = Vec::new();
    if frontmatter.crosspost_instagram {
        platforms.push(Platform::Instagram);
    }
    if frontmatter.crosspost_threads {
        platforms.push(Platform::Threads);
    }
    platforms
}

/// Queue one entry per requested platform against its most recent account.
///
/// A platform without a connected account is skipped. Failed lookups and
/// inserts are reported.
pub async fn enqueue_crossposts(
    crossposts: &dyn CrosspostRepository,
    post_id: Uuid,
    platforms: &[Platform],
    kind: CrosspostKind,
    report: &mut IngestReport,
) -> usize {
    let mut queued = 0;
    for &platform in platforms {
        let account = match crossposts.latest_account(platform).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                debug!(%post_id, %platform, "No connected account, crosspost skipped");
                continue;
            }
            Err(e) => {
                report.degrade(Degradation::Crosspost {
                    platform,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let entry = NewCrosspostEntry {
            post_id,
            platform,
            kind,
            account_id: account.id,
        };
        match crossposts.enqueue(entry).await {
            Ok(entry) => {
                debug!(%post_id, %platform, entry_id = %entry.id, "Crosspost queued");
                queued += 1;
            }
            Err(e) => report.degrade(Degradation::Crosspost {
                platform,
                reason: e.to_string(),
            }),
        }
    }

    if queued > 0 {
        info!(
            subsystem = "ingest",
            component = "crosspost",
            %post_id,
            %kind,
            queued,
            "Crossposts queued"
        );
    }
    queued
}
