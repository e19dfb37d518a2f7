//! Coin catalog
//!
//! The fixed set of US coin types the classifier can choose from. Each variant
//! carries its catalog key, the text prompt used for zero-shot matching, its
//! denomination and a base value in USD.

use serde::{Serialize, Serializer};
use std::fmt;

/// Face value of a coin as reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Denomination {
    Cent,
    Nickel,
    Dime,
    Quarter,
    HalfDollar,
    Dollar,
    SilverBullion,
    GoldBullion,
    Varies,
    Unknown,
}

impl Denomination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Denomination::Cent => "$0.01",
            Denomination::Nickel => "$0.05",
            Denomination::Dime => "$0.10",
            Denomination::Quarter => "$0.25",
            Denomination::HalfDollar => "$0.50",
            Denomination::Dollar => "$1",
            Denomination::SilverBullion => "$1 (Bullion)",
            Denomination::GoldBullion => "$50 (Bullion)",
            Denomination::Varies => "Varies",
            Denomination::Unknown => "Unknown",
        }
    }

    /// Denominations whose pre-1965 strikes were 90% silver and get a $5 value floor
    pub fn has_silver_floor(&self) -> bool {
        matches!(
            self,
            Denomination::HalfDollar | Denomination::Quarter | Denomination::Dime
        )
    }

    /// Pure silver content (troy oz) of a 90% silver strike of this denomination
    pub fn silver_troy_oz(&self) -> Option<f64> {
        match self {
            Denomination::Dollar => Some(0.77344),
            Denomination::HalfDollar => Some(0.36169),
            Denomination::Quarter => Some(0.18084),
            Denomination::Dime => Some(0.07234),
            _ => None,
        }
    }
}

impl fmt::Display for Denomination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Denomination {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Known coin types, in the order their prompts are presented to the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoinType {
    MorganDollar,
    PeaceDollar,
    WalkingLibertyHalf,
    FranklinHalf,
    KennedyHalf,
    WashingtonQuarter,
    StandingLibertyQuarter,
    BarberQuarter,
    MercuryDime,
    RooseveltDime,
    BarberDime,
    BuffaloNickel,
    JeffersonNickel,
    LincolnCent,
    IndianHeadCent,
    WheatCent,
    AmericanEagleSilver,
    AmericanEagleGold,
    ModernCommemorative,
    StateQuarter,
    UnknownCoin,
}

impl CoinType {
    /// Every catalog entry; the sentinel comes last
    pub const ALL: [CoinType; 21] = [
        CoinType::MorganDollar,
        CoinType::PeaceDollar,
        CoinType::WalkingLibertyHalf,
        CoinType::FranklinHalf,
        CoinType::KennedyHalf,
        CoinType::WashingtonQuarter,
        CoinType::StandingLibertyQuarter,
        CoinType::BarberQuarter,
        CoinType::MercuryDime,
        CoinType::RooseveltDime,
        CoinType::BarberDime,
        CoinType::BuffaloNickel,
        CoinType::JeffersonNickel,
        CoinType::LincolnCent,
        CoinType::IndianHeadCent,
        CoinType::WheatCent,
        CoinType::AmericanEagleSilver,
        CoinType::AmericanEagleGold,
        CoinType::ModernCommemorative,
        CoinType::StateQuarter,
        CoinType::UnknownCoin,
    ];

    /// Snake-case catalog key
    pub fn key(&self) -> &'static str {
        match self {
            CoinType::MorganDollar => "morgan_dollar",
            CoinType::PeaceDollar => "peace_dollar",
            CoinType::WalkingLibertyHalf => "walking_liberty_half",
            CoinType::FranklinHalf => "franklin_half",
            CoinType::KennedyHalf => "kennedy_half",
            CoinType::WashingtonQuarter => "washington_quarter",
            CoinType::StandingLibertyQuarter => "standing_liberty_quarter",
            CoinType::BarberQuarter => "barber_quarter",
            CoinType::MercuryDime => "mercury_dime",
            CoinType::RooseveltDime => "roosevelt_dime",
            CoinType::BarberDime => "barber_dime",
            CoinType::BuffaloNickel => "buffalo_nickel",
            CoinType::JeffersonNickel => "jefferson_nickel",
            CoinType::LincolnCent => "lincoln_cent",
            CoinType::IndianHeadCent => "indian_head_cent",
            CoinType::WheatCent => "wheat_cent",
            CoinType::AmericanEagleSilver => "american_eagle_silver",
            CoinType::AmericanEagleGold => "american_eagle_gold",
            CoinType::ModernCommemorative => "modern_commemorative",
            CoinType::StateQuarter => "state_quarter",
            CoinType::UnknownCoin => "unknown_coin",
        }
    }

    /// Text prompt matched against the image embedding
    pub fn description(&self) -> &'static str {
        match self {
            CoinType::MorganDollar => "a Morgan silver dollar coin with Liberty head and eagle, minted 1878-1904 and 1921",
            CoinType::PeaceDollar => "a Peace silver dollar coin with Liberty head and eagle at rest, minted 1921-1935",
            CoinType::WalkingLibertyHalf => "a Walking Liberty half dollar with Liberty walking and eagle, minted 1916-1947",
            CoinType::FranklinHalf => "a Franklin half dollar with Benjamin Franklin portrait and Liberty Bell, minted 1948-1963",
            CoinType::KennedyHalf => "a Kennedy half dollar with John F. Kennedy portrait, minted 1964-present",
            CoinType::WashingtonQuarter => "a Washington quarter with George Washington portrait, minted 1932-present",
            CoinType::StandingLibertyQuarter => "a Standing Liberty quarter with Liberty standing, minted 1916-1930",
            CoinType::BarberQuarter => "a Barber quarter with Liberty head, minted 1892-1916",
            CoinType::MercuryDime => "a Mercury dime with Liberty head with winged cap, minted 1916-1945",
            CoinType::RooseveltDime => "a Roosevelt dime with Franklin D. Roosevelt portrait, minted 1946-present",
            CoinType::BarberDime => "a Barber dime with Liberty head, minted 1892-1916",
            CoinType::BuffaloNickel => "a Buffalo nickel with Native American and buffalo, minted 1913-1938",
            CoinType::JeffersonNickel => "a Jefferson nickel with Thomas Jefferson portrait, minted 1938-present",
            CoinType::LincolnCent => "a Lincoln penny with Abraham Lincoln portrait, minted 1909-present",
            CoinType::IndianHeadCent => "an Indian Head penny with Native American portrait, minted 1859-1909",
            CoinType::WheatCent => "a Lincoln Wheat penny with wheat stalks on reverse, minted 1909-1958",
            CoinType::AmericanEagleSilver => "an American Silver Eagle bullion coin with walking Liberty and eagle",
            CoinType::AmericanEagleGold => "an American Gold Eagle bullion coin with Liberty and eagle",
            CoinType::ModernCommemorative => "a modern commemorative US coin with special design",
            CoinType::StateQuarter => "a US State quarter with state-specific design on reverse, minted 1999-2008",
            CoinType::UnknownCoin => "an unidentifiable or foreign coin",
        }
    }

    pub fn denomination(&self) -> Denomination {
        match self {
            CoinType::MorganDollar | CoinType::PeaceDollar => Denomination::Dollar,
            CoinType::WalkingLibertyHalf | CoinType::FranklinHalf | CoinType::KennedyHalf => {
                Denomination::HalfDollar
            }
            CoinType::WashingtonQuarter
            | CoinType::StandingLibertyQuarter
            | CoinType::BarberQuarter
            | CoinType::StateQuarter => Denomination::Quarter,
            CoinType::MercuryDime | CoinType::RooseveltDime | CoinType::BarberDime => {
                Denomination::Dime
            }
            CoinType::BuffaloNickel | CoinType::JeffersonNickel => Denomination::Nickel,
            CoinType::LincolnCent | CoinType::IndianHeadCent | CoinType::WheatCent => {
                Denomination::Cent
            }
            CoinType::AmericanEagleSilver => Denomination::SilverBullion,
            CoinType::AmericanEagleGold => Denomination::GoldBullion,
            CoinType::ModernCommemorative => Denomination::Varies,
            CoinType::UnknownCoin => Denomination::Unknown,
        }
    }

    /// Typical collector value in USD for a circulated example
    pub fn base_value(&self) -> f64 {
        match self {
            CoinType::MorganDollar => 30.00,
            CoinType::PeaceDollar => 25.00,
            CoinType::WalkingLibertyHalf => 15.00,
            CoinType::FranklinHalf => 10.00,
            CoinType::KennedyHalf => 7.00,
            CoinType::WashingtonQuarter => 5.00,
            CoinType::StandingLibertyQuarter => 20.00,
            CoinType::BarberQuarter => 15.00,
            CoinType::MercuryDime => 3.00,
            CoinType::RooseveltDime => 2.00,
            CoinType::BarberDime => 10.00,
            CoinType::BuffaloNickel => 2.00,
            CoinType::JeffersonNickel => 0.50,
            CoinType::LincolnCent => 0.10,
            CoinType::IndianHeadCent => 5.00,
            CoinType::WheatCent => 0.25,
            CoinType::AmericanEagleSilver => 35.00,
            CoinType::AmericanEagleGold => 2000.00,
            CoinType::ModernCommemorative => 50.00,
            CoinType::StateQuarter => 0.50,
            CoinType::UnknownCoin => 0.00,
        }
    }

    /// Title-cased name derived from the key, e.g. "Kennedy Half"
    pub fn display_name(&self) -> String {
        self.key()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Catalog prompts in classifier order
    pub fn descriptions() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.description()).collect()
    }
}

impl fmt::Display for CoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

impl Serialize for CoinType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_keys_unique() {
        let keys: HashSet<_> = CoinType::ALL.iter().map(|c| c.key()).collect();
        assert_eq!(keys.len(), CoinType::ALL.len());
        assert_eq!(CoinType::ALL.last(), Some(&CoinType::UnknownCoin));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(CoinType::MorganDollar.display_name(), "Morgan Dollar");
        assert_eq!(CoinType::KennedyHalf.display_name(), "Kennedy Half");
        assert_eq!(CoinType::UnknownCoin.display_name(), "Unknown Coin");
        assert_eq!(CoinType::IndianHeadCent.to_string(), "Indian Head Cent");
    }

    #[test]
    fn test_denominations() {
        assert_eq!(CoinType::WashingtonQuarter.denomination().as_str(), "$0.25");
        assert_eq!(CoinType::AmericanEagleGold.denomination().as_str(), "$50 (Bullion)");
        assert_eq!(CoinType::UnknownCoin.denomination(), Denomination::Unknown);
        assert_eq!(CoinType::UnknownCoin.base_value(), 0.0);
    }

    #[test]
    fn test_denomination_serializes_as_face_value() {
        let json = serde_json::to_string(&Denomination::HalfDollar).unwrap();
        assert_eq!(json, "\"$0.50\"");
    }

    #[test]
    fn test_silver_content() {
        assert_eq!(CoinType::MorganDollar.denomination().silver_troy_oz(), Some(0.77344));
        assert_eq!(CoinType::MercuryDime.denomination().silver_troy_oz(), Some(0.07234));
        assert_eq!(CoinType::LincolnCent.denomination().silver_troy_oz(), None);
        assert_eq!(CoinType::AmericanEagleSilver.denomination().silver_troy_oz(), None);
        assert!(Denomination::Quarter.has_silver_floor());
        assert!(!Denomination::Dollar.has_silver_floor());
    }
}
