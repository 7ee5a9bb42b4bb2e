//! Read side: rankings and per-participant history.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use scorekeeper_state::{
    ParticipantDirectory, ParticipantId, SubmissionId, SubmissionRecord, SubmissionStore, TaskId,
};
use serde::Serialize;

use crate::domain::Result;

/// One participant's best result on a task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestScore {
    pub participant_id: ParticipantId,
    pub score: f64,
    pub submission_id: SubmissionId,
    pub submitted_at: DateTime<Utc>,
}

/// A ranked scoreboard row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreboardEntry {
    /// 1-based position
    pub rank: usize,
    pub participant_id: ParticipantId,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub score: f64,
    pub submission_id: SubmissionId,
    pub submitted_at: DateTime<Utc>,
}

/// A scored submission in a participant's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub submission_id: SubmissionId,
    pub score: f64,
    pub submitted_at: DateTime<Utc>,
    pub scored_at: Option<DateTime<Utc>>,
}

/// Best score per participant, best first.
///
/// Only ranked submissions (active, scored) count. A participant's best is
/// the earliest submission reaching their maximum. Equal bests are ordered
/// by that submission's time, then by participant id.
pub fn rank_best_scores(submissions: &[SubmissionRecord]) -> Vec<BestScore> {
    let mut best: BTreeMap<&ParticipantId, BestScore> = BTreeMap::new();
    for record in submissions {
        let Some(score) = record.score.filter(|_| record.is_ranked()) else {
            continue;
        };
        let candidate = BestScore {
            participant_id: record.participant_id.clone(),
            score,
            submission_id: record.submission_id.clone(),
            submitted_at: record.submitted_at,
        };
        match best.get(&record.participant_id) {
            Some(current) if !improves(&candidate, current) => {}
            _ => {
                best.insert(&record.participant_id, candidate);
            }
        }
    }

    let mut ranked: Vec<BestScore> = best.into_values().collect();
    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(a.submitted_at.cmp(&b.submitted_at))
            .then_with(|| a.participant_id.cmp(&b.participant_id))
    });
    ranked
}

fn improves(candidate: &BestScore, current: &BestScore) -> bool {
    match candidate.score.total_cmp(&current.score) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.submitted_at < current.submitted_at,
    }
}

/// Scoreboard queries over the submission store.
pub struct Scoreboard {
    submissions: Arc<dyn SubmissionStore>,
    participants: Arc<dyn ParticipantDirectory>,
}

impl Scoreboard {
    pub fn new(
        submissions: Arc<dyn SubmissionStore>,
        participants: Arc<dyn ParticipantDirectory>,
    ) -> Self {
        Self {
            submissions,
            participants,
        }
    }

    /// Ranked best scores for a task, joined with participant attributes.
    ///
    /// Unknown participants are listed without display attributes.
    pub async fn ranking(&self, task_id: &TaskId) -> Result<Vec<ScoreboardEntry>> {
        let scored = self.submissions.list_scored(task_id, None).await?;
        let mut entries = Vec::new();
        for (idx, best) in rank_best_scores(&scored).into_iter().enumerate() {
            let participant = self.participants.get_participant(&best.participant_id).await?;
            let (display_name, avatar_url) = match participant {
                Some(p) => (Some(p.display_name), p.avatar_url),
                None => (None, None),
            };
            entries.push(ScoreboardEntry {
                rank: idx + 1,
                participant_id: best.participant_id,
                display_name,
                avatar_url,
                score: best.score,
                submission_id: best.submission_id,
                submitted_at: best.submitted_at,
            });
        }
        Ok(entries)
    }

    /// A participant's scored submissions for a task, newest first.
    pub async fn history(
        &self,
        task_id: &TaskId,
        participant_id: &ParticipantId,
    ) -> Result<Vec<HistoryEntry>> {
        let scored = self
            .submissions
            .list_scored(task_id, Some(participant_id))
            .await?;
        let mut entries: Vec<HistoryEntry> = scored
            .into_iter()
            .filter(|r| r.is_ranked() && &r.participant_id == participant_id)
            .filter_map(|r| {
                r.score.map(|score| HistoryEntry {
                    submission_id: r.submission_id,
                    score,
                    submitted_at: r.submitted_at,
                    scored_at: r.scored_at,
                })
            })
            .collect();
        // stable: store order breaks timestamp ties
        entries.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(entries)
    }
}
