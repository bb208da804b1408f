//! Release range resolution.
//!
//! Turns the user's `TO_REF` (and optional `--from`) into a [`ReleaseRange`]
//! plus the [`CommitSet`] used to filter pull requests. Nothing here writes
//! to the repository except [`prepare_repository`].

use chrono::Days;
use tracing::{info, instrument};

use crate::error::{RefResolutionError, VcsError};
use crate::types::{CommitSet, ReleaseRange};
use crate::vcs::Vcs;

/// Tag pattern skipped unless testing tags are requested.
pub const TESTING_TAG_PATTERN: &str = "*-testing";

/// Makes sure history and tags are complete before resolving refs.
///
/// ## Errors
///
/// Any git failure while unshallowing or fetching tags.
pub async fn prepare_repository<V: Vcs>(vcs: &V) -> Result<(), VcsError> {
    if vcs.is_shallow().await? {
        info!("Unshallow repository");
        vcs.unshallow().await?;
    }
    info!("Fetching all tags");
    vcs.fetch_tags().await
}

/// Resolves the release range.
///
/// When `from_ref` is `None` the previous tag is picked: the nearest tag
/// reachable from `to_ref` that does not itself point at `to_ref` (and is
/// not a `*-testing` tag unless `include_testing_tags`).
///
/// The date window is widened by one day on each side to absorb time zone
/// and cherry-pick skew when searching the tracker by merge date.
///
/// ## Errors
///
/// - `RefNotFound` when either ref does not exist
/// - `NoPriorTag` when no previous tag can be found
#[instrument(skip(vcs))]
pub async fn resolve_range<V: Vcs>(
    vcs: &V,
    to_ref: &str,
    from_ref: Option<&str>,
    include_testing_tags: bool,
) -> Result<ReleaseRange, RefResolutionError> {
    ensure_exists(vcs, to_ref).await?;

    let from_ref = match from_ref {
        Some(from) => {
            ensure_exists(vcs, from).await?;
            from.to_string()
        }
        None => previous_tag(vcs, to_ref, include_testing_tags).await?,
    };

    let from_date = vcs
        .commit_date(&from_ref)
        .await?
        .checked_sub_days(Days::new(1))
        .ok_or_else(|| VcsError::InvalidOutput(format!("date of `{from_ref}` out of range")))?;
    let to_date = vcs
        .commit_date(to_ref)
        .await?
        .checked_add_days(Days::new(1))
        .ok_or_else(|| VcsError::InvalidOutput(format!("date of `{to_ref}` out of range")))?;

    info!("Using {}..{} as changelog interval", from_ref, to_ref);

    Ok(ReleaseRange {
        from_ref,
        to_ref: to_ref.to_string(),
        from_date,
        to_date,
    })
}

/// Collects the hashes of every commit in `from_ref..to_ref`.
pub async fn collect_commits<V: Vcs>(
    vcs: &V,
    range: &ReleaseRange,
) -> Result<CommitSet, VcsError> {
    let commits = vcs.commits_between(&range.from_ref, &range.to_ref).await?;
    info!("{} commits in range", commits.len());
    Ok(commits.into_iter().collect())
}

async fn ensure_exists<V: Vcs>(vcs: &V, reference: &str) -> Result<(), RefResolutionError> {
    match vcs.resolve_ref(reference).await {
        Ok(_) => Ok(()),
        Err(VcsError::NotFound(_)) => Err(RefResolutionError::RefNotFound(reference.to_string())),
        Err(e) => Err(e.into()),
    }
}

async fn previous_tag<V: Vcs>(
    vcs: &V,
    to_ref: &str,
    include_testing_tags: bool,
) -> Result<String, RefResolutionError> {
    let mut exclude = vcs.tags_pointing_at(to_ref).await?;
    info!("All tags pointing to {}: {:?}", to_ref, exclude);
    if !include_testing_tags {
        exclude.push(TESTING_TAG_PATTERN.to_string());
    }

    match vcs.describe_nearest_tag(to_ref, &exclude).await {
        Ok(tag) => Ok(tag),
        Err(VcsError::NotFound(_)) => Err(RefResolutionError::NoPriorTag(to_ref.to_string())),
        Err(e) => Err(e.into()),
    }
}
