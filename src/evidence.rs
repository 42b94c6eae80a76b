//! Evidence decoder — sparse `(channel id, score)` pairs → named score fields.
//!
//! An association row reports only the channels that observed the pair.
//! The decoder spreads them over the seven known channels, leaving the
//! unobserved ones as `None` (stored as `null`). Unknown channel ids are
//! skipped so that new upstream channels do not break the load.

use serde::{Deserialize, Serialize};

use crate::model::{PropertyMap, Value};

/// Numeric evidence / confidence score as reported by the source.
pub type Score = i64;

/// Known evidence channels: source channel id → field name.
pub const SCORE_CHANNELS: [(i64, &str); 7] = [
    (6, "coexpression"),
    (8, "experiments"),
    (10, "database"),
    (12, "textmining"),
    (14, "neighborhood"),
    (15, "fusion"),
    (16, "cooccurence"),
];

/// Field name for a channel id, if the channel is known.
pub fn channel_name(channel: i64) -> Option<&'static str> {
    channel_slot(channel).map(|slot| SCORE_CHANNELS[slot].1)
}

fn channel_slot(channel: i64) -> Option<usize> {
    SCORE_CHANNELS.iter().position(|(id, _)| *id == channel)
}

/// Per-channel scores of one association, in [`SCORE_CHANNELS`] order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceScores {
    slots: [Option<Score>; SCORE_CHANNELS.len()],
}

impl EvidenceScores {
    /// Decode sparse channel scores. A channel listed twice keeps its last score.
    pub fn decode<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (i64, Score)>,
    {
        let mut scores = Self::default();
        for (channel, score) in pairs {
            if let Some(slot) = channel_slot(channel) {
                scores.slots[slot] = Some(score);
            }
        }
        scores
    }

    /// All seven fields in channel order, observed or not.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, Option<Score>)> + '_ {
        SCORE_CHANNELS
            .iter()
            .zip(self.slots)
            .map(|((_, name), score)| (*name, score))
    }

    pub fn get(&self, field: &str) -> Option<Score> {
        self.fields()
            .find(|(name, _)| *name == field)
            .and_then(|(_, score)| score)
    }

    /// Write all seven fields into `props`, unobserved ones as `Value::Null`.
    pub fn write_into(&self, props: &mut PropertyMap) {
        for (name, score) in self.fields() {
            props.insert(name.to_string(), Value::from(score));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_known_channels() {
        let scores = EvidenceScores::decode([(6, 92), (10, 900), (12, 906)]);
        assert_eq!(scores.get("coexpression"), Some(92));
        assert_eq!(scores.get("database"), Some(900));
        assert_eq!(scores.get("textmining"), Some(906));
        assert_eq!(scores.get("experiments"), None);
        assert_eq!(scores.get("fusion"), None);
    }

    #[test]
    fn test_unknown_channel_ignored() {
        let scores = EvidenceScores::decode([(7, 500), (99, 1), (-1, 3)]);
        assert_eq!(scores, EvidenceScores::default());
    }

    #[test]
    fn test_last_occurrence_wins() {
        let scores = EvidenceScores::decode([(8, 100), (8, 300)]);
        assert_eq!(scores.get("experiments"), Some(300));
    }

    #[test]
    fn test_write_into_sets_null_for_unobserved() {
        let mut props = PropertyMap::new();
        EvidenceScores::decode([(15, 44)]).write_into(&mut props);
        assert_eq!(props.len(), 7);
        assert_eq!(props.get("fusion"), Some(&Value::Int(44)));
        assert_eq!(props.get("cooccurence"), Some(&Value::Null));
    }

    #[test]
    fn test_fields_follow_channel_table() {
        let scores = EvidenceScores::decode(SCORE_CHANNELS.map(|(channel, _)| (channel, channel * 10)));
        let fields: Vec<_> = scores.fields().collect();
        let expected: Vec<_> = SCORE_CHANNELS.iter().map(|(channel, name)| (*name, Some(channel * 10))).collect();
        assert_eq!(fields, expected);
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(channel_name(14), Some("neighborhood"));
        assert_eq!(channel_name(13), None);
    }

    proptest! {
        #[test]
        fn prop_always_seven_known_fields(pairs in proptest::collection::vec((0i64..32, 0i64..1000), 0..40)) {
            let scores = EvidenceScores::decode(pairs.clone());
            let mut props = PropertyMap::new();
            scores.write_into(&mut props);

            let mut keys: Vec<&str> = props.keys().map(String::as_str).collect();
            keys.sort_unstable();
            let mut expected: Vec<&str> = SCORE_CHANNELS.iter().map(|(_, n)| *n).collect();
            expected.sort_unstable();
            prop_assert_eq!(keys, expected);

            for (channel, name) in SCORE_CHANNELS {
                let last = pairs.iter().rev().find(|(c, _)| *c == channel).map(|(_, s)| *s);
                prop_assert_eq!(scores.get(name), last);
            }
        }
    }
}
