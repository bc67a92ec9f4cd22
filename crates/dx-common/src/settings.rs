use serde::Serialize;

use crate::{error::SettingsError, guard::ApprovalPolicy};

pub const DEFAULT_CHAIN_ID: u64 = 1;

/// Process-wide driver settings, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct SdkSettings {
    pub chain_id: Option<u64>,
    pub wallet: Option<String>,
    pub rpc_url: Option<String>,
    pub infura_id: Option<String>,
    pub automatic_spend_approval: bool,
    pub use_infinite_spend_approval: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ProviderTarget {
    Infura { project_id: String },
    Rpc { url: String },
}

impl ProviderTarget {
    /// HTTP endpoint for `chain_id`.
    pub fn endpoint(&self, chain_id: u64) -> Result<String, SettingsError> {
        match self {
            ProviderTarget::Rpc { url } => Ok(url.clone()),
            ProviderTarget::Infura { project_id } => {
                let network = infura_network(chain_id)
                    .ok_or(SettingsError::UnsupportedInfuraChain(chain_id))?;
                Ok(format!("https://{network}.infura.io/v3/{project_id}"))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedSettings {
    pub chain_id: u64,
    pub wallet: String,
    pub provider: ProviderTarget,
    pub approval: ApprovalPolicy,
}

impl SdkSettings {
    pub fn chain_id(&self) -> u64 {
        self.chain_id.unwrap_or(DEFAULT_CHAIN_ID)
    }

    pub fn approval_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy {
            automatic: self.automatic_spend_approval,
            infinite: self.use_infinite_spend_approval,
        }
    }

    /// Checks that a provider and a wallet are configured. An Infura id wins
    /// over an RPC url when both are present.
    pub fn validate(&self) -> Result<ValidatedSettings, SettingsError> {
        let provider = match (non_blank(&self.infura_id), non_blank(&self.rpc_url)) {
            (Some(project_id), _) => ProviderTarget::Infura { project_id },
            (None, Some(url)) => ProviderTarget::Rpc { url },
            (None, None) => return Err(SettingsError::MissingProvider),
        };
        let wallet = non_blank(&self.wallet).ok_or(SettingsError::MissingWallet)?;

        Ok(ValidatedSettings {
            chain_id: self.chain_id(),
            wallet,
            provider,
            approval: self.approval_policy(),
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn infura_network(chain_id: u64) -> Option<&'static str> {
    match chain_id {
        1 => Some("mainnet"),
        5 => Some("goerli"),
        42 => Some("kovan"),
        137 => Some("polygon-mainnet"),
        42161 => Some("arbitrum-mainnet"),
        11155111 => Some("sepolia"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SdkSettings {
        SdkSettings {
            wallet: Some("0xabc".to_string()),
            infura_id: Some("project".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn chain_defaults_to_mainnet() {
        let validated = base().validate().unwrap();
        assert_eq!(validated.chain_id, 1);
        assert_eq!(
            validated.provider.endpoint(validated.chain_id).unwrap(),
            "https://mainnet.infura.io/v3/project"
        );
    }

    #[test]
    fn provider_is_required() {
        let settings = SdkSettings {
            infura_id: None,
            rpc_url: Some("  ".to_string()),
            ..base()
        };
        assert_eq!(settings.validate().unwrap_err(), SettingsError::MissingProvider);
    }

    #[test]
    fn wallet_is_required() {
        let settings = SdkSettings {
            wallet: None,
            ..base()
        };
        assert_eq!(settings.validate().unwrap_err(), SettingsError::MissingWallet);
    }

    #[test]
    fn rpc_endpoint_is_used_verbatim() {
        let settings = SdkSettings {
            infura_id: None,
            rpc_url: Some("http://localhost:8545".to_string()),
            chain_id: Some(31337),
            ..base()
        };
        let validated = settings.validate().unwrap();
        assert_eq!(
            validated.provider.endpoint(validated.chain_id).unwrap(),
            "http://localhost:8545"
        );
    }

    #[test]
    fn infura_needs_a_known_chain() {
        let target = ProviderTarget::Infura {
            project_id: "p".to_string(),
        };
        assert_eq!(target.endpoint(42).unwrap(), "https://kovan.infura.io/v3/p");
        assert_eq!(
            target.endpoint(31337).unwrap_err(),
            SettingsError::UnsupportedInfuraChain(31337)
        );
    }

    #[test]
    fn approval_flags_are_threaded_explicitly() {
        let settings = SdkSettings {
            automatic_spend_approval: true,
            use_infinite_spend_approval: true,
            ..base()
        };
        assert_eq!(
            settings.validate().unwrap().approval,
            ApprovalPolicy {
                automatic: true,
                infinite: true
            }
        );
    }
}
