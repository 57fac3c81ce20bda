use std::collections::BTreeMap;

use crate::domain::product::ProductKey;

/// Free-text product synonyms mapped onto canonical price-table keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AliasTable {
    aliases: BTreeMap<ProductKey, ProductKey>,
}

pub const SCREEN_FAMILY: &str = "screen";

impl Default for AliasTable {
    fn default() -> Self {
        Self::new([
            ("screen", SCREEN_FAMILY),
            ("alux screen", SCREEN_FAMILY),
            ("screenová roleta", SCREEN_FAMILY),
            ("boční screen", SCREEN_FAMILY),
        ])
    }
}

impl AliasTable {
    pub fn new<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            aliases: pairs
                .into_iter()
                .map(|(alias, canonical)| (ProductKey::new(alias), ProductKey::new(canonical)))
                .collect(),
        }
    }

    /// Adds or replaces entries, e.g. from the `[aliases]` config table.
    pub fn extend<'a>(&mut self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) {
        for (alias, canonical) in pairs {
            self.aliases.insert(ProductKey::new(alias), ProductKey::new(canonical));
        }
    }

    pub fn canonicalize(&self, raw: &str) -> ProductKey {
        let key = ProductKey::new(raw);
        self.aliases.get(&key).cloned().unwrap_or(key)
    }

    /// Aliases that resolve to `canonical`, excluding the canonical key itself.
    pub fn aliases_for(&self, canonical: &ProductKey) -> Vec<&ProductKey> {
        self.aliases
            .iter()
            .filter(|(alias, target)| *target == canonical && *alias != canonical)
            .map(|(alias, _)| alias)
            .collect()
    }

    pub fn canonical_targets(&self) -> Vec<&ProductKey> {
        let mut targets = self.aliases.values().collect::<Vec<_>>();
        targets.sort();
        targets.dedup();
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::AliasTable;
    use crate::domain::product::ProductKey;

    #[test]
    fn screen_synonyms_resolve_to_screen() {
        let aliases = AliasTable::default();

        for raw in ["Screenová roleta", "BOČNÍ SCREEN", "alux  screen", "screen"] {
            assert_eq!(aliases.canonicalize(raw).as_str(), "screen", "alias `{raw}`");
        }
    }

    #[test]
    fn unknown_names_pass_through_normalized() {
        let aliases = AliasTable::default();
        assert_eq!(aliases.canonicalize(" ALUX Glass ").as_str(), "alux glass");
    }

    #[test]
    fn configured_aliases_extend_defaults() {
        let mut aliases = AliasTable::default();
        aliases.extend([("skleněná stěna", "ALUX Glass")]);

        assert_eq!(aliases.canonicalize("Skleněná stěna"), ProductKey::new("alux glass"));
        assert_eq!(aliases.canonicalize("boční screen").as_str(), "screen");
    }

    #[test]
    fn aliases_for_lists_synonyms_only() {
        let aliases = AliasTable::default();
        let screen = ProductKey::new("screen");
        let synonyms =
            aliases.aliases_for(&screen).into_iter().map(ProductKey::as_str).collect::<Vec<_>>();

        assert_eq!(synonyms, vec!["alux screen", "boční screen", "screenová roleta"]);
    }
}
