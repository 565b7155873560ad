use itertools::Itertools;
use matchfeed_sdk::objects::EventType;

use crate::events::MatchEvent;

/// Caller-supplied key if present, otherwise one derived from the event.
pub fn resolve_idempotency_key(event: &MatchEvent) -> String {
    event
        .idempotency_key
        .clone()
        .unwrap_or_else(|| derive_idempotency_key(event))
}

/// Stable key for the logical fact an event describes.
///
/// Built from the match, event type, minute, player, and one
/// type-specific discriminator (card type, assist, player coming on, or
/// period). Names are compared trimmed and lowercased, so a replay with
/// different casing maps to the same key. The event id and timestamp are
/// not part of it.
pub fn derive_idempotency_key(event: &MatchEvent) -> String {
    let discriminator = match event.kind {
        EventType::Card => event.card_type.clone(),
        EventType::Goal | EventType::Substitution => event.secondary_player.clone(),
        EventType::PeriodTransition => event.period.map(|p| p.to_string()),
    };
    let material = [
        Some(event.match_id.clone()),
        Some(event.kind.to_string()),
        Some(event.minute.to_string()),
        event.player.clone(),
        discriminator,
    ]
    .into_iter()
    .map(|part| part.map(|p| p.trim().to_lowercase()).unwrap_or_default())
    .join("|");

    let digest = ring::digest::digest(&ring::digest::SHA256, material.as_bytes());
    let short = &digest.as_ref()[..16];
    format!(
        "{}:{}",
        event.match_id,
        fast32::base64::RFC4648_NOPAD.encode(short)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PeriodMarker;
    use crate::testing::event;

    fn goal(player: &str) -> MatchEvent {
        let mut e = event("m-1", EventType::Goal, 12);
        e.player = Some(player.to_string());
        e
    }

    #[test]
    fn test_key_ignores_id_timestamp_and_case() {
        let a = goal("Ana");
        let b = goal("  ana ");
        assert_ne!(a.id, b.id);
        assert_eq!(derive_idempotency_key(&a), derive_idempotency_key(&b));
        assert!(derive_idempotency_key(&a).starts_with("m-1:"));
    }

    #[test]
    fn test_key_separates_distinct_facts() {
        let a = goal("Ana");
        let mut later = goal("Ana");
        later.minute = 13;
        let mut assisted = goal("Ana");
        assisted.secondary_player = Some("Bea".to_string());
        let mut other_match = goal("Ana");
        other_match.match_id = "m-2".to_string();

        let key = derive_idempotency_key(&a);
        assert_ne!(key, derive_idempotency_key(&later));
        assert_ne!(key, derive_idempotency_key(&assisted));
        assert_ne!(key, derive_idempotency_key(&other_match));
    }

    #[test]
    fn test_period_is_part_of_key() {
        let halftime = event("m-1", EventType::PeriodTransition, 45).with_period(PeriodMarker::Halftime);
        let second = event("m-1", EventType::PeriodTransition, 45).with_period(PeriodMarker::SecondHalf);
        assert_ne!(
            derive_idempotency_key(&halftime),
            derive_idempotency_key(&second)
        );
    }

    #[test]
    fn test_supplied_key_wins() {
        let mut e = goal("Ana");
        e.idempotency_key = Some("caller-key".to_string());
        assert_eq!(resolve_idempotency_key(&e), "caller-key");
    }
}
