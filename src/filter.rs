//! Compatibility filter: pure predicate over declared incompatibility rules.

use crate::schema::Schema;
use crate::token::Token;

/// True if the token violates none of the schema's incompatibility rules.
///
/// A rule fires when the token carries `rule.value` in `rule.layer` and any
/// attribute of the token carries a value listed in `rule.incompatible_with`.
/// Rules are evaluated independently; one firing rule rejects the token.
/// Only layer attributes are consulted; the nonce can never match a rule.
pub fn is_compatible(schema: &Schema, token: &Token) -> bool {
    for rule in &schema.incompatibilities {
        let selected = match token.get(&rule.layer) {
            Some(v) => v,
            None => continue,
        };
        if selected != rule.value {
            continue;
        }
        for value in token.attributes.values() {
            if rule.incompatible_with.iter().any(|v| v == value) {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::str::FromStr;

    fn schema() -> Schema {
        Schema::from_str(
            r#"{
                "layers": [
                    {"name": "background", "values": ["red", "blue"], "weights": [1, 1]},
                    {"name": "body", "values": ["gold", "silver"], "weights": [1, 1]},
                    {"name": "hat", "values": ["crown", "cap"], "weights": [1, 1]}
                ],
                "incompatibilities": [
                    {"layer": "background", "value": "red", "incompatible_with": ["gold"]}
                ]
            }"#,
        )
        .unwrap()
    }

    fn token(pairs: &[(&str, &str)]) -> Token {
        let attributes: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Token::new(attributes, 0.5)
    }

    #[test]
    fn test_forbidden_pairing_rejected() {
        let t = token(&[("background", "red"), ("body", "gold"), ("hat", "cap")]);
        assert!(!is_compatible(&schema(), &t));
    }

    #[test]
    fn test_trigger_value_without_forbidden_partner_accepted() {
        let t = token(&[("background", "red"), ("body", "silver"), ("hat", "cap")]);
        assert!(is_compatible(&schema(), &t));
    }

    #[test]
    fn test_forbidden_partner_without_trigger_accepted() {
        let t = token(&[("background", "blue"), ("body", "gold"), ("hat", "crown")]);
        assert!(is_compatible(&schema(), &t));
    }

    #[test]
    fn test_rule_applies_across_any_attribute() {
        // The rule names no partner layer; "gold" in any other attribute
        // trips it, matching the declared-rule semantics.
        let s = Schema::from_str(
            r#"{
                "layers": [
                    {"name": "background", "values": ["red"], "weights": [1]},
                    {"name": "hat", "values": ["gold"], "weights": [1]}
                ],
                "incompatibilities": [
                    {"layer": "background", "value": "red", "incompatible_with": ["gold"]}
                ]
            }"#,
        )
        .unwrap();
        let t = token(&[("background", "red"), ("hat", "gold")]);
        assert!(!is_compatible(&s, &t));
    }

    #[test]
    fn test_rule_listing_its_own_trigger_always_fires() {
        // The scan covers every attribute, the trigger layer included, so a
        // rule whose incompatible_with lists its own trigger value rejects
        // every token carrying that value.
        let s = Schema::from_str(
            r#"{
                "layers": [{"name": "a", "values": ["x"], "weights": [1]}],
                "incompatibilities": [
                    {"layer": "a", "value": "x", "incompatible_with": ["x"]}
                ]
            }"#,
        )
        .unwrap();
        assert!(!is_compatible(&s, &token(&[("a", "x")])));
    }

    #[test]
    fn test_no_rules_accepts_everything() {
        let s = Schema::from_str(
            r#"{"layers": [{"name": "a", "values": ["x"], "weights": [1]}]}"#,
        )
        .unwrap();
        assert!(is_compatible(&s, &token(&[("a", "x")])));
    }

    #[test]
    fn test_nonce_is_never_consulted() {
        // A nonce whose string form collides with a forbidden value must
        // not trip the rule.
        let s = Schema::from_str(
            r#"{
                "layers": [
                    {"name": "background", "values": ["red"], "weights": [1]},
                    {"name": "body", "values": ["silver"], "weights": [1]}
                ],
                "incompatibilities": [
                    {"layer": "background", "value": "red", "incompatible_with": ["0.5"]}
                ]
            }"#,
        )
        .unwrap();
        let t = token(&[("background", "red"), ("body", "silver")]);
        assert_eq!(t.nonce, 0.5);
        assert!(is_compatible(&s, &t));
    }
}
