//! Catalog of latency probe targets and the provider/continent filter.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::domain::latency::{Continent, ProbeTarget, Provider, Selector};
use crate::error::DriftError;

use Continent::*;
use Provider::*;

type Entry = (&'static str, Provider, &'static str, &'static str, Continent, &'static str, &'static str);

const BUILTIN: &[Entry] = &[
    ("aws-us-east-1", Aws, "us-east-1", "N. Virginia", NorthAmerica, "US", "https://dynamodb.us-east-1.amazonaws.com/ping"),
    ("aws-us-east-2", Aws, "us-east-2", "Ohio", NorthAmerica, "US", "https://dynamodb.us-east-2.amazonaws.com/ping"),
    ("aws-us-west-1", Aws, "us-west-1", "N. California", NorthAmerica, "US", "https://dynamodb.us-west-1.amazonaws.com/ping"),
    ("aws-us-west-2", Aws, "us-west-2", "Oregon", NorthAmerica, "US", "https://dynamodb.us-west-2.amazonaws.com/ping"),
    ("aws-ca-central-1", Aws, "ca-central-1", "Montreal", NorthAmerica, "CA", "https://dynamodb.ca-central-1.amazonaws.com/ping"),
    ("aws-sa-east-1", Aws, "sa-east-1", "Sao Paulo", SouthAmerica, "BR", "https://dynamodb.sa-east-1.amazonaws.com/ping"),
    ("aws-eu-west-1", Aws, "eu-west-1", "Ireland", Europe, "IE", "https://dynamodb.eu-west-1.amazonaws.com/ping"),
    ("aws-eu-west-2", Aws, "eu-west-2", "London", Europe, "GB", "https://dynamodb.eu-west-2.amazonaws.com/ping"),
    ("aws-eu-west-3", Aws, "eu-west-3", "Paris", Europe, "FR", "https://dynamodb.eu-west-3.amazonaws.com/ping"),
    ("aws-eu-central-1", Aws, "eu-central-1", "Frankfurt", Europe, "DE", "https://dynamodb.eu-central-1.amazonaws.com/ping"),
    ("aws-eu-north-1", Aws, "eu-north-1", "Stockholm", Europe, "SE", "https://dynamodb.eu-north-1.amazonaws.com/ping"),
    ("aws-me-south-1", Aws, "me-south-1", "Bahrain", MiddleEast, "BH", "https://dynamodb.me-south-1.amazonaws.com/ping"),
    ("aws-af-south-1", Aws, "af-south-1", "Cape Town", Africa, "ZA", "https://dynamodb.af-south-1.amazonaws.com/ping"),
    ("aws-ap-south-1", Aws, "ap-south-1", "Mumbai", Asia, "IN", "https://dynamodb.ap-south-1.amazonaws.com/ping"),
    ("aws-ap-northeast-1", Aws, "ap-northeast-1", "Tokyo", Asia, "JP", "https://dynamodb.ap-northeast-1.amazonaws.com/ping"),
    ("aws-ap-southeast-1", Aws, "ap-southeast-1", "Singapore", Asia, "SG", "https://dynamodb.ap-southeast-1.amazonaws.com/ping"),
    ("aws-ap-southeast-2", Aws, "ap-southeast-2", "Sydney", Oceania, "AU", "https://dynamodb.ap-southeast-2.amazonaws.com/ping"),
    ("gcp-us-central1", Gcp, "us-central1", "Iowa", NorthAmerica, "US", "https://us-central1-5tkroniexa-uc.a.run.app/api/ping"),
    ("gcp-us-east4", Gcp, "us-east4", "N. Virginia", NorthAmerica, "US", "https://us-east4-5tkroniexa-uk.a.run.app/api/ping"),
    ("gcp-us-west1", Gcp, "us-west1", "Oregon", NorthAmerica, "US", "https://us-west1-5tkroniexa-uw.a.run.app/api/ping"),
    ("gcp-southamerica-east1", Gcp, "southamerica-east1", "Sao Paulo", SouthAmerica, "BR", "https://southamerica-east1-5tkroniexa-rj.a.run.app/api/ping"),
    ("gcp-europe-west1", Gcp, "europe-west1", "Belgium", Europe, "BE", "https://europe-west1-5tkroniexa-ew.a.run.app/api/ping"),
    ("gcp-europe-west3", Gcp, "europe-west3", "Frankfurt", Europe, "DE", "https://europe-west3-5tkroniexa-ey.a.run.app/api/ping"),
    ("gcp-me-west1", Gcp, "me-west1", "Tel Aviv", MiddleEast, "IL", "https://me-west1-5tkroniexa-zf.a.run.app/api/ping"),
    ("gcp-asia-northeast1", Gcp, "asia-northeast1", "Tokyo", Asia, "JP", "https://asia-northeast1-5tkroniexa-an.a.run.app/api/ping"),
    ("gcp-asia-southeast1", Gcp, "asia-southeast1", "Singapore", Asia, "SG", "https://asia-southeast1-5tkroniexa-as.a.run.app/api/ping"),
    ("gcp-australia-southeast1", Gcp, "australia-southeast1", "Sydney", Oceania, "AU", "https://australia-southeast1-5tkroniexa-ts.a.run.app/api/ping"),
    ("azure-eastus", Azure, "eastus", "Virginia", NorthAmerica, "US", "https://s8eastus.blob.core.windows.net/public/latency-test.json"),
    ("azure-westus2", Azure, "westus2", "Washington", NorthAmerica, "US", "https://s8westus2.blob.core.windows.net/public/latency-test.json"),
    ("azure-brazilsouth", Azure, "brazilsouth", "Sao Paulo State", SouthAmerica, "BR", "https://s8brazilsouth.blob.core.windows.net/public/latency-test.json"),
    ("azure-westeurope", Azure, "westeurope", "Netherlands", Europe, "NL", "https://s8westeurope.blob.core.windows.net/public/latency-test.json"),
    ("azure-northeurope", Azure, "northeurope", "Ireland", Europe, "IE", "https://s8northeurope.blob.core.windows.net/public/latency-test.json"),
    ("azure-uaenorth", Azure, "uaenorth", "Dubai", MiddleEast, "AE", "https://s8uaenorth.blob.core.windows.net/public/latency-test.json"),
    ("azure-southafricanorth", Azure, "southafricanorth", "Johannesburg", Africa, "ZA", "https://s8southafricanorth.blob.core.windows.net/public/latency-test.json"),
    ("azure-japaneast", Azure, "japaneast", "Tokyo", Asia, "JP", "https://s8japaneast.blob.core.windows.net/public/latency-test.json"),
    ("azure-australiaeast", Azure, "australiaeast", "New South Wales", Oceania, "AU", "https://s8australiaeast.blob.core.windows.net/public/latency-test.json"),
    ("oracle-us-ashburn-1", Oracle, "us-ashburn-1", "Ashburn", NorthAmerica, "US", "https://objectstorage.us-ashburn-1.oraclecloud.com/"),
    ("oracle-us-phoenix-1", Oracle, "us-phoenix-1", "Phoenix", NorthAmerica, "US", "https://objectstorage.us-phoenix-1.oraclecloud.com/"),
    ("oracle-eu-frankfurt-1", Oracle, "eu-frankfurt-1", "Frankfurt", Europe, "DE", "https://objectstorage.eu-frankfurt-1.oraclecloud.com/"),
    ("oracle-uk-london-1", Oracle, "uk-london-1", "London", Europe, "GB", "https://objectstorage.uk-london-1.oraclecloud.com/"),
    ("oracle-ap-tokyo-1", Oracle, "ap-tokyo-1", "Tokyo", Asia, "JP", "https://objectstorage.ap-tokyo-1.oraclecloud.com/"),
    ("oracle-sa-saopaulo-1", Oracle, "sa-saopaulo-1", "Sao Paulo", SouthAmerica, "BR", "https://objectstorage.sa-saopaulo-1.oraclecloud.com/"),
    ("contabo-eu-nuremberg", Contabo, "EU", "Nuremberg", Europe, "DE", "https://lg-nue.contabo.net/favicon.ico"),
    ("contabo-us-central", Contabo, "US-central", "St. Louis", NorthAmerica, "US", "https://lg-stl.contabo.net/favicon.ico"),
    ("contabo-uk", Contabo, "UK", "Portsmouth", Europe, "GB", "https://lg-uk.contabo.net/favicon.ico"),
    ("contabo-sin", Contabo, "SIN", "Singapore", Asia, "SG", "https://lg-sin.contabo.net/favicon.ico"),
    ("contabo-aus", Contabo, "AUS", "Sydney", Oceania, "AU", "https://lg-syd.contabo.net/favicon.ico"),
];

/// The built-in catalog, in display order.
pub fn builtin() -> Vec<ProbeTarget> {
    BUILTIN
        .iter()
        .map(|&(id, provider, region, position, continent, country, url)| ProbeTarget {
            id: id.into(),
            provider,
            region: region.into(),
            position: position.into(),
            continent,
            country: country.into(),
            url: url.into(),
        })
        .collect()
}

/// Keep the targets matching both predicates, preserving catalog order.
pub fn filter(
    targets: &[ProbeTarget],
    provider: Selector<Provider>,
    continent: Selector<Continent>,
) -> Vec<ProbeTarget> {
    targets
        .iter()
        .filter(|t| provider.matches(&t.provider) && continent.matches(&t.continent))
        .cloned()
        .collect()
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    targets: Vec<ProbeTarget>,
}

/// Parse a TOML catalog made of `[[targets]]` tables.
pub fn parse_catalog(content: &str) -> Result<Vec<ProbeTarget>, DriftError> {
    let file: CatalogFile = toml::from_str(content)?;
    validate(&file.targets)?;
    Ok(file.targets)
}

pub fn load_catalog(path: &Path) -> Result<Vec<ProbeTarget>, DriftError> {
    let content = fs::read_to_string(path)
        .map_err(|e| DriftError::Config(format!("cannot read catalog {}: {e}", path.display())))?;
    parse_catalog(&content)
}

fn validate(targets: &[ProbeTarget]) -> Result<(), DriftError> {
    if targets.is_empty() {
        return Err(DriftError::Config("catalog has no targets".into()));
    }
    let mut seen = HashSet::new();
    for t in targets {
        if t.id.trim().is_empty() {
            return Err(DriftError::Config("catalog target with empty id".into()));
        }
        if !seen.insert(t.id.as_str()) {
            return Err(DriftError::Config(format!("duplicate target id '{}'", t.id)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_ids_are_unique() {
        assert!(validate(&builtin()).is_ok());
    }

    #[test]
    fn every_provider_has_targets() {
        let all = builtin();
        for p in Provider::ALL {
            assert!(all.iter().any(|t| t.provider == p), "no target for {p}");
        }
    }

    #[test]
    fn catalog_file_rejects_duplicates() {
        let content = r#"
            [[targets]]
            id = "a"
            provider = "AWS"
            region = "eu-west-1"
            position = "Ireland"
            continent = "Europe"
            country = "IE"
            url = "https://example.com/a"

            [[targets]]
            id = "a"
            provider = "gcp"
            region = "europe-west1"
            position = "Belgium"
            continent = "Europe"
            country = "BE"
            url = "https://example.com/b"
        "#;
        let err = parse_catalog(content).unwrap_err();
        assert!(matches!(err, DriftError::Config(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn catalog_file_parses_targets() {
        let content = r#"
            [[targets]]
            id = "lab"
            provider = "Contabo"
            region = "lab"
            position = "Basement"
            continent = "North America"
            country = "US"
            url = "http://10.0.0.1/favicon.ico"
        "#;
        let targets = parse_catalog(content).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].continent, Continent::NorthAmerica);
        assert_eq!(targets[0].provider, Provider::Contabo);
    }
}
