use super::load_member;
use crate::config::ReferralSettings;
use crate::domain::member::MemberId;
use crate::domain::ports::RepositoryRef;
use crate::domain::referral::{LevelWalker, ReferralLevels, ReferralRelation};
use crate::error::Result;
use tracing::{debug, warn};

/// Read-only downline enumeration.
#[derive(Clone)]
pub struct ReferralWalker {
    repo: RepositoryRef,
    settings: ReferralSettings,
}

impl ReferralWalker {
    pub fn new(repo: RepositoryRef, settings: ReferralSettings) -> Self {
        Self { repo, settings }
    }

    /// Lists the members below `root`, one level at a time.
    ///
    /// `depth` defaults to, and is clamped at, the relation's configured bound.
    /// Exactly that many levels are returned; trailing levels may be empty.
    pub async fn enumerate(
        &self,
        root: MemberId,
        relation: ReferralRelation,
        depth: Option<usize>,
    ) -> Result<ReferralLevels> {
        load_member(&self.repo, root).await?;
        let bound = self.settings.max_depth(relation);
        let depth = depth.map_or(bound, |d| d.min(bound));

        let mut walker = LevelWalker::new(root, self.settings.max_visited);
        let mut levels = Vec::with_capacity(depth);
        let mut frontier = vec![root];
        for _ in 0..depth {
            let mut candidates = Vec::new();
            for parent in &frontier {
                candidates.extend(self.repo.children(relation, *parent).await?);
            }
            let level = walker.admit(candidates);
            frontier = level.clone();
            levels.push(level);
        }

        if walker.is_truncated() {
            warn!(root = %root, relation = %relation, cap = self.settings.max_visited, "referral walk truncated");
        }
        let levels = ReferralLevels {
            root,
            relation,
            levels,
            truncated: walker.is_truncated(),
        };
        debug!(root = %root, relation = %relation, depth, total = levels.total(), "referrals enumerated");
        Ok(levels)
    }
}
