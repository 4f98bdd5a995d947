use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use super::catalog::{ActiveCatalog, ItemId};
use super::recorder::ChecklistValidation;
use crate::dossier::{Checkpoint, DossierId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Valid,
    Rejected,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Valid => "VALID",
            Verdict::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "VALID" => Ok(Verdict::Valid),
            "REJECTED" => Ok(Verdict::Rejected),
            other => Err(format!("unknown verdict '{other}'")),
        }
    }
}

/// Pass/fail totals of one answer set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synthesis {
    pub total: u32,
    pub validated: u32,
    pub rejected: u32,
    pub verdict: Verdict,
}

impl Synthesis {
    /// Reduces an answer set against the catalog's mandatory items.
    ///
    /// `VALID` iff no answer is negative and every mandatory item of the catalog
    /// has a positive answer in the set. Prior history is never consulted.
    pub fn compute<I>(catalog: &ActiveCatalog, answers: I) -> Self
    where
        I: IntoIterator<Item = (ItemId, bool)>,
    {
        let mut total = 0u32;
        let mut validated = 0u32;
        let mut positive: HashSet<ItemId> = HashSet::new();
        for (item_id, valid) in answers {
            total += 1;
            if valid {
                validated += 1;
                positive.insert(item_id);
            }
        }
        let rejected = total - validated;
        let mandatory_satisfied = catalog.mandatory_items().all(|item| positive.contains(&item.id));
        let verdict = if rejected == 0 && mandatory_satisfied {
            Verdict::Valid
        } else {
            Verdict::Rejected
        };

        Self {
            total,
            validated,
            rejected,
            verdict,
        }
    }

    pub fn of_validations(catalog: &ActiveCatalog, validations: &[ChecklistValidation]) -> Self {
        Self::compute(catalog, validations.iter().map(|v| (v.item_id, v.valid)))
    }

    pub fn is_valid(&self) -> bool {
        self.verdict == Verdict::Valid
    }
}

/// Stored rollup of one checkpoint for one dossier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSynthesis {
    pub dossier_id: DossierId,
    pub checkpoint: Checkpoint,
    pub total: u32,
    pub validated: u32,
    pub rejected: u32,
    pub verdict: Verdict,
    pub general_comment: Option<String>,
    pub actor_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl ValidationSynthesis {
    pub fn record(
        dossier_id: DossierId,
        checkpoint: Checkpoint,
        synthesis: Synthesis,
        general_comment: Option<String>,
        actor_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            dossier_id,
            checkpoint,
            total: synthesis.total,
            validated: synthesis.validated,
            rejected: synthesis.rejected,
            verdict: synthesis.verdict,
            general_comment,
            actor_id,
            created_at,
        }
    }
}

/// Human-readable reason listing every item that failed, in catalog order.
pub fn rejection_reason(catalog: &ActiveCatalog, validations: &[ChecklistValidation]) -> String {
    let failed: Vec<String> = catalog
        .items()
        .filter_map(|item| {
            let answer = validations.iter().find(|v| v.item_id == item.id && !v.valid)?;
            Some(match answer.comment.as_deref() {
                Some(comment) => format!("{} ({comment})", item.name),
                None => item.name.clone(),
            })
        })
        .collect();

    if failed.is_empty() {
        format!("Checkpoint {} rejected: mandatory controls not satisfied", catalog.checkpoint)
    } else {
        format!(
            "Checkpoint {} rejected: {}",
            catalog.checkpoint,
            failed.join("; ")
        )
    }
}
