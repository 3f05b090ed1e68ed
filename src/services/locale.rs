use serde::Deserialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ru,
}

const EN: &[(&str, &str)] = &[
    ("party", "Team"),
    ("solved", "="),
    ("penalty", "Time"),
    ("rank", "Rank"),
    ("problems", "solved"),
    ("log", "Reveal log"),
    ("help", "Keys"),
];

const RU: &[(&str, &str)] = &[
    ("party", "Команда"),
    ("solved", "="),
    ("penalty", "Время"),
    ("rank", "Место"),
    ("problems", "задач"),
    ("log", "Журнал"),
    ("help", "Клавиши"),
];

impl Locale {
    fn table(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Locale::En => EN,
            Locale::Ru => RU,
        }
    }

    pub fn lookup(self, key: &str) -> Option<&'static str> {
        self.table()
            .iter()
            .find(|(candidate, _)| *candidate == key)
            .map(|(_, value)| *value)
    }

    pub fn localize(self, key: &str) -> String {
        match self.lookup(key) {
            Some(value) => value.to_string(),
            None => format!("???{key}???"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_keys_resolve_per_locale() {
        assert_eq!(Locale::En.localize("rank"), "Rank");
        assert_eq!(Locale::Ru.localize("rank"), "Место");
        assert_eq!(Locale::Ru.localize("solved"), "=");
    }

    #[test]
    fn unknown_keys_are_flagged() {
        assert_eq!(Locale::En.lookup("medal"), None);
        assert_eq!(Locale::En.localize("medal"), "???medal???");
    }
}
