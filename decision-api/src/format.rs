//! Conversion of stored decisions into wire decisions.

use crate::error::FormatError;
use crate::storage::StoredDecision;
use chrono::{DateTime, Utc};
use decision_types::{format_duration, Decision};
use std::collections::HashSet;

/// Format stored decisions for bouncers.
///
/// Remaining duration is computed against `now` for every record. With
/// `dedup`, only the first record seen for each (value, scope, type) is
/// kept, so the result depends on the order of `records`. Without it the
/// output has the same length and order as the input.
pub fn format_decisions(
    records: &[StoredDecision],
    dedup: bool,
    now: DateTime<Utc>,
) -> Result<Vec<Decision>, FormatError> {
    let mut seen: HashSet<(&str, &str, &str)> = HashSet::new();
    let mut formatted = Vec::with_capacity(records.len());

    for record in records {
        if record.value.is_empty() {
            return Err(FormatError::Malformed {
                id: record.id,
                reason: "empty value",
            });
        }
        if record.scope.is_empty() {
            return Err(FormatError::Malformed {
                id: record.id,
                reason: "empty scope",
            });
        }

        if dedup
            && !seen.insert((
                record.value.as_str(),
                record.scope.as_str(),
                record.kind.as_str(),
            ))
        {
            continue;
        }

        formatted.push(to_wire(record, now));
    }

    Ok(formatted)
}

fn to_wire(record: &StoredDecision, now: DateTime<Utc>) -> Decision {
    Decision {
        id: record.id,
        duration: Some(format_duration(record.ends_at() - now)),
        scenario: Some(record.scenario.clone()),
        scope: Some(record.scope.clone()),
        value: Some(record.value.clone()),
        kind: Some(record.kind.clone()),
        origin: Some(record.origin.clone()),
        uuid: record.uuid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use decision_types::{DecisionId, DecisionUuid};

    fn record(id: i64, value: &str, kind: &str, until: DateTime<Utc>) -> StoredDecision {
        StoredDecision {
            id: DecisionId::new(id),
            uuid: DecisionUuid::new(),
            value: value.to_string(),
            scope: "Ip".to_string(),
            kind: kind.to_string(),
            origin: "local".to_string(),
            scenario: "crowdsecurity/ssh-bf".to_string(),
            created_at: until - Duration::hours(4),
            until,
            deleted_at: None,
        }
    }

    #[test]
    fn dedup_keeps_one_per_key() {
        let now = Utc::now();
        let records = vec![
            record(1, "192.0.2.1", "ban", now + Duration::hours(1)),
            record(2, "192.0.2.1", "ban", now + Duration::hours(2)),
            record(3, "192.0.2.1", "captcha", now + Duration::hours(1)),
            record(4, "192.0.2.2", "ban", now + Duration::hours(1)),
        ];

        let formatted = format_decisions(&records, true, now).unwrap();
        let ids: Vec<_> = formatted.iter().map(|d| d.id.value()).collect();
        assert_eq!(ids, vec![1, 3, 4]);
    }

    #[test]
    fn dedup_is_first_seen_not_longest() {
        let now = Utc::now();
        let short = record(1, "192.0.2.1", "ban", now + Duration::minutes(5));
        let long = record(2, "192.0.2.1", "ban", now + Duration::hours(24));

        let formatted = format_decisions(&[short.clone(), long.clone()], true, now).unwrap();
        assert_eq!(formatted.len(), 1);
        assert_eq!(formatted[0].id, short.id);

        let reversed = format_decisions(&[long.clone(), short], true, now).unwrap();
        assert_eq!(reversed[0].id, long.id);
    }

    #[test]
    fn without_dedup_order_and_count_are_preserved() {
        let now = Utc::now();
        let records = vec![
            record(3, "192.0.2.1", "ban", now + Duration::hours(1)),
            record(1, "192.0.2.1", "ban", now + Duration::hours(1)),
            record(2, "192.0.2.1", "ban", now + Duration::hours(1)),
        ];

        let formatted = format_decisions(&records, false, now).unwrap();
        let ids: Vec<_> = formatted.iter().map(|d| d.id.value()).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn duration_decreases_with_time_and_goes_negative() {
        let created = Utc::now();
        let records = vec![record(1, "192.0.2.1", "ban", created + Duration::hours(3))];

        let first = format_decisions(&records, false, created).unwrap();
        let later = format_decisions(&records, false, created + Duration::seconds(1)).unwrap();
        let expired = format_decisions(&records, false, created + Duration::hours(4)).unwrap();

        assert_eq!(first[0].duration.as_deref(), Some("3h0m0s"));
        assert_eq!(later[0].duration.as_deref(), Some("2h59m59s"));
        assert_eq!(expired[0].duration.as_deref(), Some("-1h0m0s"));
    }

    #[test]
    fn deleted_record_duration_uses_deletion_time() {
        let now = Utc::now();
        let mut deleted = record(1, "192.0.2.1", "ban", now + Duration::hours(3));
        deleted.deleted_at = Some(now - Duration::seconds(30));

        let formatted = format_decisions(&[deleted], false, now).unwrap();
        assert_eq!(formatted[0].duration.as_deref(), Some("-30s"));
    }

    #[test]
    fn wire_fields_are_copied() {
        let now = Utc::now();
        let r = record(7, "192.0.2.9", "ban", now + Duration::hours(1));
        let formatted = format_decisions(std::slice::from_ref(&r), true, now).unwrap();

        let d = &formatted[0];
        assert_eq!(d.id, r.id);
        assert_eq!(d.uuid, r.uuid);
        assert_eq!(d.value.as_deref(), Some("192.0.2.9"));
        assert_eq!(d.scope.as_deref(), Some("Ip"));
        assert_eq!(d.kind.as_deref(), Some("ban"));
        assert_eq!(d.origin.as_deref(), Some("local"));
        assert_eq!(d.scenario.as_deref(), Some("crowdsecurity/ssh-bf"));
    }

    #[test]
    fn malformed_record_is_rejected() {
        let now = Utc::now();
        let mut bad = record(5, "", "ban", now + Duration::hours(1));
        let err = format_decisions(std::slice::from_ref(&bad), false, now).unwrap_err();
        assert_eq!(
            err,
            FormatError::Malformed {
                id: DecisionId::new(5),
                reason: "empty value"
            }
        );

        bad.value = "192.0.2.1".into();
        bad.scope = String::new();
        assert!(format_decisions(&[bad], false, now).is_err());
    }

    #[test]
    fn empty_input_formats_to_empty_output() {
        assert!(format_decisions(&[], true, Utc::now()).unwrap().is_empty());
    }
}
