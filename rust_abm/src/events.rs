//! Scenario events applied to the firm sector at the opening of a period.

use serde::Deserialize;

/// What happens when an event fires.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SectorEvent {
    /// Create `count` fresh firms on top of any scheduled regeneration.
    CreateFirms { count: usize },
    /// Impose a common target debt ratio on every live firm.
    SetTargetDebtRatio { value: f64 },
}

/// An event and the period it fires in.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ScheduledEvent {
    pub period: u64,
    #[serde(flatten)]
    pub event: SectorEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_parse_from_tagged_json() {
        let events: Vec<ScheduledEvent> = serde_json::from_str(
            r#"[
                {"period": 10, "event": "create_firms", "count": 5},
                {"period": 20, "event": "set_target_debt_ratio", "value": 0.5}
            ]"#,
        )
        .unwrap();
        assert_eq!(events[0].period, 10);
        assert_eq!(events[0].event, SectorEvent::CreateFirms { count: 5 });
        assert_eq!(events[1].event, SectorEvent::SetTargetDebtRatio { value: 0.5 });
    }

    #[test]
    fn unknown_event_is_rejected() {
        let parsed: Result<ScheduledEvent, _> =
            serde_json::from_str(r#"{"period": 1, "event": "meteor_strike"}"#);
        assert!(parsed.is_err());
    }
}
