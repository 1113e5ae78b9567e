use serde::Serialize;

pub const IDENTIFIED: &str = "0 - Identified";
pub const PROSPECTING: &str = "1 - Prospecting";
pub const WARM: &str = "2 - Warm";
pub const QUALIFIED: &str = "3 - Qualified";
pub const CUSTOMER: &str = "4 - Customer";
pub const CLOSED_LOST: &str = "5a - Closed Lost";
pub const CHURNED: &str = "5b - Churned";

/// Early funnel stages that count as "in process".
pub const IN_PROCESS: [&str; 3] = [IDENTIFIED, PROSPECTING, WARM];

/// Closing outcome of a deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Outcome {
    Won,
    Lost,
    Open,
}

/// Which stage labels count as won and lost.
#[derive(Debug, Clone, Copy)]
pub struct StageRule {
    pub won: &'static [&'static str],
    pub lost: &'static [&'static str],
}

impl StageRule {
    /// Won means a current customer.
    pub const CUSTOMER_ONLY: StageRule = StageRule {
        won: &[CUSTOMER],
        lost: &[CLOSED_LOST],
    };

    /// Won also covers churned customers, since they closed at one point.
    pub const INCLUDING_CHURNED: StageRule = StageRule {
        won: &[CUSTOMER, CHURNED],
        lost: &[CLOSED_LOST],
    };

    pub fn classify(&self, stage: Option<&str>) -> Outcome {
        match stage {
            Some(s) if self.won.iter().any(|w| stage_eq(s, w)) => Outcome::Won,
            Some(s) if self.lost.iter().any(|l| stage_eq(s, l)) => Outcome::Lost,
            _ => Outcome::Open,
        }
    }
}

/// Stage labels compare trimmed and ASCII case-insensitively.
pub fn stage_eq(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

pub fn is_in_process(stage: &str) -> bool {
    IN_PROCESS.iter().any(|s| stage_eq(stage, s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn churned_counts_as_won_only_when_asked() {
        assert_eq!(StageRule::CUSTOMER_ONLY.classify(Some(CHURNED)), Outcome::Open);
        assert_eq!(StageRule::INCLUDING_CHURNED.classify(Some(CHURNED)), Outcome::Won);
    }

    #[test]
    fn classification_ignores_case_and_padding() {
        let rule = StageRule::CUSTOMER_ONLY;
        assert_eq!(rule.classify(Some(" 4 - customer ")), Outcome::Won);
        assert_eq!(rule.classify(Some("5A - CLOSED LOST")), Outcome::Lost);
        assert_eq!(rule.classify(Some("2 - Warm")), Outcome::Open);
        assert_eq!(rule.classify(None), Outcome::Open);
    }

    #[test]
    fn in_process_stages() {
        assert!(is_in_process("1 - prospecting"));
        assert!(!is_in_process(QUALIFIED));
    }
}
