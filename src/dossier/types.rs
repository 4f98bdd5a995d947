use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use uuid::Uuid;

/// Case numbers look like `DOS-2026-00042`: a short uppercase prefix, the year, a sequence.
static CASE_NUMBER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z]{2,5}-\d{4}-\d{3,6}$").expect("case number pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DossierId(pub Uuid);

impl DossierId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DossierId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DossierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DossierId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Identity of a person acting on the workflow (creator, controller, officer).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for UserId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of a dossier. Progress is totally ordered; each checkpoint
/// has its own terminal rejection branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DossierStatus {
    Pending,
    ApprovedCheckpoint1,
    RejectedCheckpoint1,
    ApprovedCheckpoint2,
    RejectedCheckpoint2,
    Finalized,
    RejectedCheckpoint3,
}

impl DossierStatus {
    pub const ALL: [DossierStatus; 7] = [
        DossierStatus::Pending,
        DossierStatus::ApprovedCheckpoint1,
        DossierStatus::RejectedCheckpoint1,
        DossierStatus::ApprovedCheckpoint2,
        DossierStatus::RejectedCheckpoint2,
        DossierStatus::Finalized,
        DossierStatus::RejectedCheckpoint3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DossierStatus::Pending => "PENDING",
            DossierStatus::ApprovedCheckpoint1 => "APPROVED_CHECKPOINT_1",
            DossierStatus::RejectedCheckpoint1 => "REJECTED_CHECKPOINT_1",
            DossierStatus::ApprovedCheckpoint2 => "APPROVED_CHECKPOINT_2",
            DossierStatus::RejectedCheckpoint2 => "REJECTED_CHECKPOINT_2",
            DossierStatus::Finalized => "FINALIZED",
            DossierStatus::RejectedCheckpoint3 => "REJECTED_CHECKPOINT_3",
        }
    }

    /// The checkpoint whose rejection produced this status, if any.
    pub fn rejected_at(&self) -> Option<Checkpoint> {
        match self {
            DossierStatus::RejectedCheckpoint1 => Some(Checkpoint::BudgetControl),
            DossierStatus::RejectedCheckpoint2 => Some(Checkpoint::OrderingOfficer),
            DossierStatus::RejectedCheckpoint3 => Some(Checkpoint::AccountingOfficer),
            _ => None,
        }
    }
}

impl fmt::Display for DossierStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DossierStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DossierStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| format!("unknown dossier status '{s}'"))
    }
}

/// Roles that act on a dossier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Originator,
    BudgetController,
    OrderingOfficer,
    AccountingOfficer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Originator => "originator",
            Role::BudgetController => "budget_controller",
            Role::OrderingOfficer => "ordering_officer",
            Role::AccountingOfficer => "accounting_officer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "originator" => Ok(Role::Originator),
            "budget_controller" => Ok(Role::BudgetController),
            "ordering_officer" => Ok(Role::OrderingOfficer),
            "accounting_officer" => Ok(Role::AccountingOfficer),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// One validation stage of the approval chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Checkpoint {
    BudgetControl,
    OrderingOfficer,
    AccountingOfficer,
}

impl Checkpoint {
    pub const ALL: [Checkpoint; 3] = [
        Checkpoint::BudgetControl,
        Checkpoint::OrderingOfficer,
        Checkpoint::AccountingOfficer,
    ];

    /// 1-based position in the chain.
    pub fn number(&self) -> u8 {
        match self {
            Checkpoint::BudgetControl => 1,
            Checkpoint::OrderingOfficer => 2,
            Checkpoint::AccountingOfficer => 3,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Checkpoint::ALL.into_iter().find(|cp| cp.number() == number)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Checkpoint::BudgetControl => "budget-control",
            Checkpoint::OrderingOfficer => "ordering-officer",
            Checkpoint::AccountingOfficer => "accounting-officer",
        }
    }

    pub fn responsible_role(&self) -> Role {
        match self {
            Checkpoint::BudgetControl => Role::BudgetController,
            Checkpoint::OrderingOfficer => Role::OrderingOfficer,
            Checkpoint::AccountingOfficer => Role::AccountingOfficer,
        }
    }

    /// Status the dossier must hold before this checkpoint can be submitted.
    pub fn precondition(&self) -> DossierStatus {
        match self {
            Checkpoint::BudgetControl => DossierStatus::Pending,
            Checkpoint::OrderingOfficer => DossierStatus::ApprovedCheckpoint1,
            Checkpoint::AccountingOfficer => DossierStatus::ApprovedCheckpoint2,
        }
    }

    pub fn approved_status(&self) -> DossierStatus {
        match self {
            Checkpoint::BudgetControl => DossierStatus::ApprovedCheckpoint1,
            Checkpoint::OrderingOfficer => DossierStatus::ApprovedCheckpoint2,
            Checkpoint::AccountingOfficer => DossierStatus::Finalized,
        }
    }

    pub fn rejected_status(&self) -> DossierStatus {
        match self {
            Checkpoint::BudgetControl => DossierStatus::RejectedCheckpoint1,
            Checkpoint::OrderingOfficer => DossierStatus::RejectedCheckpoint2,
            Checkpoint::AccountingOfficer => DossierStatus::RejectedCheckpoint3,
        }
    }

    pub fn next(&self) -> Option<Checkpoint> {
        Checkpoint::from_number(self.number() + 1)
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Checkpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(number) = trimmed.parse::<u8>() {
            return Checkpoint::from_number(number)
                .ok_or_else(|| format!("unknown checkpoint number {number}"));
        }
        Checkpoint::ALL
            .into_iter()
            .find(|cp| cp.as_str() == trimmed)
            .ok_or_else(|| format!("unknown checkpoint '{trimmed}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionRecord {
    pub checkpoint: Checkpoint,
    pub reason: String,
    pub detail: Option<String>,
    pub rejected_at: DateTime<Utc>,
}

/// An accounting case file moving through the approval chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dossier {
    pub id: DossierId,
    pub case_number: String,
    pub status: DossierStatus,
    /// Amount in minor currency units.
    pub amount: i64,
    pub nature_id: Option<i64>,
    pub budget_line_id: Option<i64>,
    pub creator_id: UserId,
    pub rejection: Option<RejectionRecord>,
    /// Optimistic concurrency counter, bumped on every committed transition.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_transition_at: Option<DateTime<Utc>>,
}

/// Input of the originating role when opening a dossier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDossier {
    pub case_number: String,
    pub amount: i64,
    pub creator_id: UserId,
    #[serde(default)]
    pub nature_id: Option<i64>,
    #[serde(default)]
    pub budget_line_id: Option<i64>,
}

impl NewDossier {
    /// Returns one message per offending field.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !is_valid_case_number(&self.case_number) {
            problems.push(format!(
                "case number '{}' does not match PREFIX-YYYY-NNN",
                self.case_number
            ));
        }
        if self.amount < 0 {
            problems.push(format!("amount must not be negative (got {})", self.amount));
        }
        if self.creator_id.as_str().trim().is_empty() {
            problems.push("creator id is empty".to_string());
        }
        problems
    }

    pub fn into_dossier(self, now: DateTime<Utc>) -> Dossier {
        Dossier {
            id: DossierId::new(),
            case_number: self.case_number,
            status: DossierStatus::Pending,
            amount: self.amount,
            nature_id: self.nature_id,
            budget_line_id: self.budget_line_id,
            creator_id: self.creator_id,
            rejection: None,
            version: 0,
            created_at: now,
            updated_at: now,
            last_transition_at: None,
        }
    }
}

pub fn is_valid_case_number(case_number: &str) -> bool {
    CASE_NUMBER_PATTERN.is_match(case_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_chain_is_consistent() {
        for cp in Checkpoint::ALL {
            match cp.next() {
                Some(next) => assert_eq!(next.precondition(), cp.approved_status()),
                None => assert_eq!(cp.approved_status(), DossierStatus::Finalized),
            }
            assert_eq!(cp.rejected_status().rejected_at(), Some(cp));
        }
    }

    #[test]
    fn test_checkpoint_parsing_accepts_names_and_numbers() {
        assert_eq!("budget-control".parse::<Checkpoint>().unwrap(), Checkpoint::BudgetControl);
        assert_eq!("3".parse::<Checkpoint>().unwrap(), Checkpoint::AccountingOfficer);
        assert!("4".parse::<Checkpoint>().is_err());
        assert!("treasury".parse::<Checkpoint>().is_err());
    }

    #[test]
    fn test_status_round_trips_through_wire_name() {
        for status in DossierStatus::ALL {
            assert_eq!(status.as_str().parse::<DossierStatus>().unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_case_number_validation() {
        assert!(is_valid_case_number("DOS-2026-00042"));
        assert!(!is_valid_case_number("dos-2026-1"));
        assert!(!is_valid_case_number("DOS2026001"));

        let bad = NewDossier {
            case_number: "x".to_string(),
            amount: -5,
            creator_id: UserId::new(" "),
            nature_id: None,
            budget_line_id: None,
        };
        assert_eq!(bad.validate().len(), 3);
    }
}
