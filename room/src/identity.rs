//! Identity resolution
//!
//! Maps an opaque participant identity to the slot that renders it. The
//! binding is recomputed on every call, so a participant that reconnects under
//! a different identity lands wherever the new identity points.

use crate::slots::PanelNames;
use room_core::SlotId;

/// One entry of the ordered rule list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRule {
    pub slot: SlotId,
    /// Lowercase keywords, matched as substrings
    keywords: Vec<String>,
}

impl IdentityRule {
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    fn matches(&self, identity: &str) -> bool {
        self.keywords.iter().any(|k| identity.contains(k.as_str()))
    }
}

/// First-match keyword resolver with a default slot.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    rules: Vec<IdentityRule>,
    default_slot: SlotId,
}

impl IdentityResolver {
    /// Create a resolver with no rules; everything resolves to `default_slot`.
    pub fn new(default_slot: SlotId) -> Self {
        Self {
            rules: Vec::new(),
            default_slot,
        }
    }

    /// Append a rule. Rules are tried in the order they were added.
    pub fn with_rule<I, S>(mut self, slot: SlotId, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut lowered: Vec<String> = Vec::new();
        for keyword in keywords {
            let keyword = keyword.as_ref().trim().to_lowercase();
            // An empty keyword would match every identity
            if !keyword.is_empty() && !lowered.contains(&keyword) {
                lowered.push(keyword);
            }
        }
        self.rules.push(IdentityRule {
            slot,
            keywords: lowered,
        });
        self
    }

    /// Resolver for the single-agent layout.
    pub fn single_agent() -> Self {
        Self::new(SlotId::Agent)
    }

    /// Resolver for the host + four specialists layout.
    ///
    /// Specialists are tried in a fixed order (marketing, finance, product,
    /// legal) and the host takes everything else.
    pub fn mentor_panel(names: &PanelNames) -> Self {
        Self::new(SlotId::Host)
            .with_rule(
                SlotId::Marketing,
                [names.marketing.as_str(), "marketing", "growth"],
            )
            .with_rule(SlotId::Finance, [names.finance.as_str(), "finance", "financ"])
            .with_rule(SlotId::Product, [names.product.as_str(), "product", "produto"])
            .with_rule(SlotId::Legal, [names.legal.as_str(), "legal", "juridic"])
    }

    /// Resolve an identity to its slot. Never fails.
    pub fn resolve(&self, identity: &str) -> SlotId {
        let identity = identity.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&identity))
            .map(|rule| rule.slot)
            .unwrap_or(self.default_slot)
    }

    pub fn rules(&self) -> &[IdentityRule] {
        &self.rules
    }

    pub fn default_slot(&self) -> SlotId {
        self.default_slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> IdentityResolver {
        IdentityResolver::mentor_panel(&PanelNames::default())
    }

    #[test]
    fn specialist_keywords_ignore_case() {
        let resolver = panel();
        for identity in ["maya-specialist-07", "MAYA", "agent-Maya-x", "growth-bot"] {
            assert_eq!(resolver.resolve(identity), SlotId::Marketing, "{}", identity);
        }
        assert_eq!(resolver.resolve("Ricardo-avatar"), SlotId::Finance);
        assert_eq!(resolver.resolve("bey-LUCAS-1"), SlotId::Product);
        assert_eq!(resolver.resolve("fernanda"), SlotId::Legal);
        assert_eq!(resolver.resolve("specialist-finance"), SlotId::Finance);
    }

    #[test]
    fn unmatched_identities_go_to_host() {
        let resolver = panel();
        assert_eq!(resolver.resolve("unknown-bot-3"), SlotId::Host);
        assert_eq!(resolver.resolve("cosmo-avatar"), SlotId::Host);
        assert_eq!(resolver.resolve(""), SlotId::Host);
    }

    #[test]
    fn first_declared_rule_wins() {
        let resolver = panel();
        // Both a finance and a legal keyword; finance is declared first
        assert_eq!(resolver.resolve("ricardo-fernanda-pair"), SlotId::Finance);
        // Legal name before marketing name in the string, marketing still wins
        assert_eq!(resolver.resolve("fernanda-and-maya"), SlotId::Marketing);
    }

    #[test]
    fn custom_names_extend_keywords() {
        let names = PanelNames {
            marketing: "Bianca".to_string(),
            ..PanelNames::default()
        };
        let resolver = IdentityResolver::mentor_panel(&names);
        assert_eq!(resolver.resolve("bianca-avatar"), SlotId::Marketing);
        assert_eq!(resolver.resolve("maya-avatar"), SlotId::Host);
    }

    #[test]
    fn empty_keywords_are_dropped() {
        let resolver = IdentityResolver::new(SlotId::Host).with_rule(SlotId::Legal, ["", "  "]);
        assert!(resolver.rules()[0].keywords().is_empty());
        assert_eq!(resolver.resolve("anything"), SlotId::Host);
    }

    #[test]
    fn single_agent_resolves_everything_to_agent() {
        let resolver = IdentityResolver::single_agent();
        assert_eq!(resolver.resolve("maya-specialist-07"), SlotId::Agent);
        assert_eq!(resolver.resolve("unknown-bot-3"), SlotId::Agent);
        assert_eq!(resolver.default_slot(), SlotId::Agent);
    }
}
