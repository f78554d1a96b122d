//! Service-config selection.
//!
//! The TXT record carries a JSON list of choices. Each choice may restrict
//! itself to certain client languages, client hostnames, or a percentage of
//! clients; the first choice that applies wins and its `serviceConfig`
//! object is the config to use.

use crate::base::error::ResolveError;
use serde::Deserialize;
use serde_json::Value;

/// Language name matched against `clientLanguage`.
pub const CLIENT_LANGUAGE: &str = "rust";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Choice {
    #[serde(default)]
    client_language: Option<Vec<String>>,
    #[serde(default)]
    percentage: Option<u8>,
    #[serde(default)]
    client_hostname: Option<Vec<String>>,
    service_config: serde_json::Map<String, Value>,
}

impl Choice {
    fn applies(&self, client_hostname: &str, percentage_roll: u8) -> bool {
        if let Some(languages) = &self.client_language {
            if !languages.iter().any(|l| l.eq_ignore_ascii_case(CLIENT_LANGUAGE)) {
                return false;
            }
        }
        if let Some(hosts) = &self.client_hostname {
            if !hosts.iter().any(|h| h == client_hostname) {
                return false;
            }
        }
        match self.percentage {
            Some(pct) => pct != 0 && percentage_roll <= pct,
            None => true,
        }
    }
}

/// Selects the applicable service config from a raw choice list.
///
/// `percentage_roll` is the client's draw in `1..=100`; a choice with
/// `percentage: N` applies when the roll is at most `N`. Returns the chosen
/// `serviceConfig` re-serialized as JSON, or `None` if no choice applies.
pub fn choose(
    raw: &str,
    client_hostname: &str,
    percentage_roll: u8,
) -> Result<Option<String>, ResolveError> {
    let choices: Vec<Choice> = serde_json::from_str(raw)
        .map_err(|e| ResolveError::InvalidServiceConfig(e.to_string()))?;
    if let Some(pct) = choices.iter().filter_map(|c| c.percentage).find(|p| *p > 100) {
        return Err(ResolveError::InvalidServiceConfig(format!(
            "percentage {pct} out of range"
        )));
    }
    choices
        .into_iter()
        .find(|choice| choice.applies(client_hostname, percentage_roll))
        .map(|choice| {
            serde_json::to_string(&choice.service_config)
                .map_err(|e| ResolveError::InvalidServiceConfig(e.to_string()))
        })
        .transpose()
}
