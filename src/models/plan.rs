use serde::{Deserialize, Serialize};
use crate::errors::AuditError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanPhase {
    pub name: String,
    pub description: String,
    pub fields: Vec<String>,
    pub estimated_weeks: u32,
    pub milestone: String,
}

/// Ordered remediation phases, executed one after another by a single team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub run_id: String,
    pub phases: Vec<PlanPhase>,
    pub total_weeks: u32,
}

impl Plan {
    pub fn new(run_id: &str, phases: Vec<PlanPhase>) -> Self {
        let total_weeks = phases.iter().map(|p| p.estimated_weeks).sum();
        Self {
            id: String::new(),
            run_id: run_id.to_string(),
            phases,
            total_weeks,
        }
    }

    pub fn validate(&self) -> Result<(), AuditError> {
        if self.phases.is_empty() {
            return Err(AuditError::Validation("plan must contain at least one phase".into()));
        }
        let sum: u32 = self.phases.iter().map(|p| p.estimated_weeks).sum();
        if sum != self.total_weeks {
            return Err(AuditError::Validation(format!(
                "plan total_weeks {} does not match phase sum {}",
                self.total_weeks, sum
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(weeks: u32) -> PlanPhase {
        PlanPhase {
            name: format!("phase-{}", weeks),
            description: String::new(),
            fields: vec![],
            estimated_weeks: weeks,
            milestone: String::new(),
        }
    }

    #[test]
    fn test_total_weeks_is_sequential_sum() {
        let plan = Plan::new("run", vec![phase(2), phase(3), phase(1)]);
        assert_eq!(plan.total_weeks, 6);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_validate_detects_tampered_total() {
        let mut plan = Plan::new("run", vec![phase(2)]);
        plan.total_weeks = 5;
        assert!(plan.validate().is_err());
    }
}
