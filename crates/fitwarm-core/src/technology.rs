//! The closed set of FIT technologies and the one alias table used everywhere.

use std::fmt;

/// Technologies eligible under the Feed-in Tariff scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Technology {
    Photovoltaic,
    Wind,
    Hydro,
    AnaerobicDigestion,
    MicroChp,
}

const ALIASES: &[(&str, Technology)] = &[
    ("photovoltaic", Technology::Photovoltaic),
    ("photovoltaics", Technology::Photovoltaic),
    ("solar", Technology::Photovoltaic),
    ("solar pv", Technology::Photovoltaic),
    ("solar panel", Technology::Photovoltaic),
    ("solar panels", Technology::Photovoltaic),
    ("pv", Technology::Photovoltaic),
    ("wind", Technology::Wind),
    ("wind turbine", Technology::Wind),
    ("wind turbines", Technology::Wind),
    ("turbine", Technology::Wind),
    ("turbines", Technology::Wind),
    ("wind farm", Technology::Wind),
    ("wind farms", Technology::Wind),
    ("hydro", Technology::Hydro),
    ("hydroelectric", Technology::Hydro),
    ("hydropower", Technology::Hydro),
    ("hydro power", Technology::Hydro),
    ("water power", Technology::Hydro),
    ("anaerobic digestion", Technology::AnaerobicDigestion),
    ("anaerobic", Technology::AnaerobicDigestion),
    ("biogas", Technology::AnaerobicDigestion),
    ("ad", Technology::AnaerobicDigestion),
    ("micro chp", Technology::MicroChp),
    ("micro-chp", Technology::MicroChp),
    ("microchp", Technology::MicroChp),
    ("chp", Technology::MicroChp),
    ("combined heat and power", Technology::MicroChp),
];

impl Technology {
    /// Resolves a free-text technology name. Case and inner whitespace are
    /// ignored; anything outside the alias table is `None`.
    pub fn canonicalize(raw: &str) -> Option<Self> {
        let key = raw
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, tech)| *tech)
    }

    /// Canonical lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Technology::Photovoltaic => "photovoltaic",
            Technology::Wind => "wind",
            Technology::Hydro => "hydro",
            Technology::AnaerobicDigestion => "anaerobic digestion",
            Technology::MicroChp => "micro chp",
        }
    }

    /// Length of the FIT contract in years.
    pub fn fit_term_years(self) -> i32 {
        match self {
            Technology::MicroChp => 10,
            _ => 20,
        }
    }
}

impl fmt::Display for Technology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
