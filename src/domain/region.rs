use std::{collections::HashSet, fmt};

/// States and union territories offered by the myscheme.gov.in state facet.
/// Order matters: ties in fuzzy matching go to the earlier entry.
pub const VALID_REGIONS: [&str; 36] = [
    "Andhra Pradesh",
    "Arunachal Pradesh",
    "Assam",
    "Bihar",
    "Chhattisgarh",
    "Goa",
    "Gujarat",
    "Haryana",
    "Himachal Pradesh",
    "Jharkhand",
    "Karnataka",
    "Kerala",
    "Madhya Pradesh",
    "Maharashtra",
    "Manipur",
    "Meghalaya",
    "Mizoram",
    "Nagaland",
    "Odisha",
    "Punjab",
    "Rajasthan",
    "Sikkim",
    "Tamil Nadu",
    "Telangana",
    "Tripura",
    "Uttar Pradesh",
    "Uttarakhand",
    "West Bengal",
    "Andaman and Nicobar Islands",
    "Chandigarh",
    "Dadra and Nagar Haveli and Daman and Diu",
    "Delhi",
    "Jammu and Kashmir",
    "Ladakh",
    "Lakshadweep",
    "Puducherry",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionName {
    Known(&'static str),
    /// Input that matched nothing, passed through untouched.
    Unrecognised(String),
}

impl RegionName {
    pub fn as_str(&self) -> &str {
        match self {
            RegionName::Known(name) => name,
            RegionName::Unrecognised(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, RegionName::Known(_))
    }
}

impl fmt::Display for RegionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps free-form state input onto [`VALID_REGIONS`]. Never fails.
///
/// 1. Exact match ignoring case and whitespace ("tamilnadu" == "Tamil Nadu").
/// 2. Otherwise the region sharing the most lowercase words with the input.
/// 3. Otherwise the input is returned as [`RegionName::Unrecognised`].
pub fn normalize(input: &str) -> RegionName {
    let cleaned = input.trim().to_lowercase();
    let squashed = squash(&cleaned);

    if let Some(region) = VALID_REGIONS
        .into_iter()
        .find(|region| region.to_lowercase() == cleaned || squash(region) == squashed)
    {
        log::debug!("Exact region match for '{}': {}", input, region);
        return RegionName::Known(region);
    }

    let input_parts: HashSet<&str> = cleaned.split_whitespace().collect();
    let mut best_match = None;
    let mut max_matches = 0;

    for region in VALID_REGIONS {
        let region_lower = region.to_lowercase();
        let matches = region_lower
            .split_whitespace()
            .collect::<HashSet<&str>>()
            .intersection(&input_parts)
            .count();
        if matches > max_matches {
            max_matches = matches;
            best_match = Some(region);
        }
    }

    match best_match {
        Some(region) => {
            log::info!("Auto-corrected region '{}' to '{}'", input, region);
            RegionName::Known(region)
        }
        None => {
            log::warn!("No region match for '{}', using original", input);
            RegionName::Unrecognised(input.to_string())
        }
    }
}

fn squash(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
