// Static lookup table of supported railway stations

/// A station the availability API accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Station {
    pub code: &'static str,
    pub name_uz: &'static str,
    pub name_ru: &'static str,
    pub name_en: &'static str,
}

const fn station(
    code: &'static str,
    name_uz: &'static str,
    name_ru: &'static str,
    name_en: &'static str,
) -> Station {
    Station {
        code,
        name_uz,
        name_ru,
        name_en,
    }
}

pub const STATIONS: [Station; 16] = [
    station("2900000", "Toshkent", "Ташкент", "Tashkent"),
    station("2900700", "Samarqand", "Самарканд", "Samarkand"),
    station("2900800", "Buxoro", "Бухара", "Bukhara"),
    station("2900172", "Xiva", "Хива", "Khiva"),
    station("2900790", "Urganch", "Ургенч", "Urgench"),
    station("2900970", "Nukus", "Нукус", "Nukus"),
    station("2900930", "Navoiy", "Навои", "Navoi"),
    station("2900680", "Andijon", "Андижан", "Andijan"),
    station("2900750", "Qarshi", "Карши", "Karshi"),
    station("2900720", "Jizzax", "Джизак", "Jizzakh"),
    station("2900255", "Termiz", "Термез", "Termez"),
    station("2900850", "Guliston", "Гулистан", "Gulistan"),
    station("2900880", "Qo'qon", "Коканд", "Kokand"),
    station("2900920", "Margilon", "Маргилан", "Margilan"),
    station("2900693", "Pop", "Пап", "Pop"),
    station("2900940", "Namangan", "Наманган", "Namangan"),
];

pub fn by_code(code: &str) -> Option<&'static Station> {
    STATIONS.iter().find(|s| s.code == code)
}

/// Uzbek display name, falling back to the raw code for unknown stations
pub fn display_name(code: &str) -> &str {
    by_code(code).map(|s| s.name_uz).unwrap_or(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_are_unique() {
        let codes: HashSet<_> = STATIONS.iter().map(|s| s.code).collect();
        assert_eq!(codes.len(), STATIONS.len());
    }

    #[test]
    fn test_lookup() {
        assert_eq!(by_code("2900700").map(|s| s.name_en), Some("Samarkand"));
        assert_eq!(display_name("2900000"), "Toshkent");
        assert_eq!(display_name("0000000"), "0000000");
    }
}
