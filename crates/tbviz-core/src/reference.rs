use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::error::ReferenceError;
use crate::types::{CountryKey, Development, WhoRegion};

const BUILTIN_REFERENCE: &str = include_str!("reference.toml");

#[derive(Debug, Deserialize)]
struct ReferenceFile {
    #[serde(default)]
    developed: Vec<String>,
    #[serde(default)]
    countries: Vec<CountryEntryFile>,
}

#[derive(Debug, Deserialize)]
struct CountryEntryFile {
    iso3: String,
    name: String,
    region: String,
    #[serde(default)]
    aliases: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CountryEntry {
    pub iso3: String,
    pub name: String,
    pub region: WhoRegion,
}

/// Outcome of looking a source country up in the reference table.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub key: CountryKey,
    pub region: Option<WhoRegion>,
    pub development: Development,
}

impl Resolution {
    pub fn is_mapped(&self) -> bool {
        self.region.is_some()
    }
}

/// Immutable lookup tables: ISO3 → WHO region, spelling variants → ISO3 and the
/// developed-country allow-list.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    countries: Vec<CountryEntry>,
    by_iso3: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
    developed: HashSet<String>,
}

static BUILTIN: Lazy<ReferenceData> = Lazy::new(|| {
    ReferenceData::from_toml_str(BUILTIN_REFERENCE).unwrap_or_else(|err| {
        tracing::error!(error = %err, "built-in reference tables are invalid");
        ReferenceData::default()
    })
});

impl ReferenceData {
    pub fn builtin() -> &'static ReferenceData {
        &BUILTIN
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, ReferenceError> {
        let file: ReferenceFile = toml::from_str(toml_str)?;
        let mut data = ReferenceData::default();

        for entry in file.countries {
            let iso3 = entry.iso3.trim().to_ascii_uppercase();
            let region =
                WhoRegion::try_from(entry.region.as_str()).map_err(|_| {
                    ReferenceError::UnknownRegion {
                        iso3: iso3.clone(),
                        region: entry.region.clone(),
                    }
                })?;
            if data.by_iso3.contains_key(&iso3) {
                return Err(ReferenceError::DuplicateIso3(iso3));
            }

            let idx = data.countries.len();
            data.by_iso3.insert(iso3.clone(), idx);
            for name in std::iter::once(&entry.name).chain(entry.aliases.iter()) {
                let key = name_key(name);
                if let Some(&existing) = data.by_name.get(&key) {
                    if existing != idx {
                        return Err(ReferenceError::AmbiguousName {
                            name: name.clone(),
                            first: data.countries[existing].iso3.clone(),
                            second: iso3,
                        });
                    }
                }
                data.by_name.insert(key, idx);
            }
            data.countries.push(CountryEntry {
                iso3,
                name: entry.name.trim().to_string(),
                region,
            });
        }

        for code in file.developed {
            let code = code.trim().to_ascii_uppercase();
            if !data.by_iso3.contains_key(&code) {
                return Err(ReferenceError::UnknownDeveloped(code));
            }
            data.developed.insert(code);
        }

        Ok(data)
    }

    pub fn countries(&self) -> &[CountryEntry] {
        &self.countries
    }

    pub fn lookup_iso3(&self, iso3: &str) -> Option<&CountryEntry> {
        self.by_iso3
            .get(&iso3.trim().to_ascii_uppercase())
            .map(|idx| &self.countries[*idx])
    }

    pub fn lookup_name(&self, name: &str) -> Option<&CountryEntry> {
        self.by_name.get(&name_key(name)).map(|idx| &self.countries[*idx])
    }

    pub fn is_developed(&self, iso3: &str) -> bool {
        self.developed.contains(&iso3.trim().to_ascii_uppercase())
    }

    /// Resolves a source country: ISO3 first, then name. Returns `None` only
    /// when neither identifier is present.
    pub fn resolve(&self, iso3: Option<&str>, name: Option<&str>) -> Option<Resolution> {
        let entry = iso3
            .and_then(|code| self.lookup_iso3(code))
            .or_else(|| name.and_then(|n| self.lookup_name(n)));

        if let Some(entry) = entry {
            let development = if self.developed.contains(&entry.iso3) {
                Development::Developed
            } else {
                Development::Developing
            };
            return Some(Resolution {
                key: CountryKey {
                    name: entry.name.clone(),
                    id: entry.iso3.clone(),
                    iso3: Some(entry.iso3.clone()),
                },
                region: Some(entry.region),
                development,
            });
        }

        let cleaned = name.map(clean_name).filter(|n| !n.is_empty());
        let iso3 = iso3
            .map(|code| code.trim().to_ascii_uppercase())
            .filter(|code| !code.is_empty());
        let display = cleaned.clone().or_else(|| iso3.clone())?;
        let id = iso3.clone().unwrap_or_else(|| display.clone());
        Some(Resolution {
            key: CountryKey {
                name: display,
                id,
                iso3,
            },
            region: None,
            development: Development::Developing,
        })
    }
}

/// Collapses whitespace and unifies apostrophes; keeps the original casing.
pub fn clean_name(name: &str) -> String {
    name.replace(['\u{2019}', '\u{2018}', '`'], "'")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn name_key(name: &str) -> String {
    clean_name(name).to_lowercase()
}
