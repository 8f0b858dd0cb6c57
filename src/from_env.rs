//! Environment variables the relayer needs before it can start.

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use url::Url;

pub const ENV_RPC_URL: &str = "RPC_URL";
pub const ENV_RELAYER_PRIVATE_KEY: &str = "RELAYER_PRIVATE_KEY";
pub const ENV_FORWARDER_ADDRESS: &str = "FORWARDER_ADDRESS";
pub const ENV_HOST: &str = "HOST";
pub const ENV_PORT: &str = "PORT";

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, thiserror::Error)]
pub enum FromEnvError {
    #[error("environment variable {0} is required")]
    Missing(&'static str),
    #[error("environment variable {name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Startup settings read from the process environment.
///
/// Holds the relayer key, so it deliberately has no `Debug` impl.
pub struct RelayerEnv {
    pub rpc_url: Url,
    pub signer: PrivateKeySigner,
    pub forwarder_address: Address,
    pub host: IpAddr,
    pub port: u16,
}

impl RelayerEnv {
    pub fn from_env() -> Result<Self, FromEnvError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FromEnvError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |name: &'static str| get(name).ok_or(FromEnvError::Missing(name));

        let rpc_url = require(ENV_RPC_URL)?;
        let rpc_url = Url::parse(&rpc_url).map_err(|e| FromEnvError::Invalid {
            name: ENV_RPC_URL,
            reason: e.to_string(),
        })?;

        // The key itself never appears in the error.
        let signer = PrivateKeySigner::from_str(&require(ENV_RELAYER_PRIVATE_KEY)?).map_err(|_| {
            FromEnvError::Invalid {
                name: ENV_RELAYER_PRIVATE_KEY,
                reason: "not a valid secp256k1 private key".to_string(),
            }
        })?;

        let forwarder_address = require(ENV_FORWARDER_ADDRESS)?;
        let forwarder_address =
            Address::from_str(&forwarder_address).map_err(|e| FromEnvError::Invalid {
                name: ENV_FORWARDER_ADDRESS,
                reason: e.to_string(),
            })?;

        let host = match get(ENV_HOST) {
            Some(host) => host.parse().map_err(|_| FromEnvError::Invalid {
                name: ENV_HOST,
                reason: format!("{host:?} is not an IP address"),
            })?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        let port = match get(ENV_PORT) {
            Some(port) => port.parse().map_err(|_| FromEnvError::Invalid {
                name: ENV_PORT,
                reason: format!("{port:?} is not a port number"),
            })?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            rpc_url,
            signer,
            forwarder_address,
            host,
            port,
        })
    }

    pub fn relayer_address(&self) -> Address {
        self.signer.address()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // Well-known Hardhat account #0.
    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_RPC_URL, "http://127.0.0.1:8545"),
            (ENV_RELAYER_PRIVATE_KEY, KEY),
            (ENV_FORWARDER_ADDRESS, "0x5fbdb2315678afecb367f032d93f642f64180aa3"),
        ]
    }

    #[test]
    fn test_defaults() {
        let env = RelayerEnv::from_lookup(lookup(&required())).unwrap();
        assert_eq!(env.socket_addr(), "0.0.0.0:3000".parse().unwrap());
        assert_eq!(
            env.relayer_address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse::<Address>().unwrap()
        );
        assert_eq!(
            env.forwarder_address,
            "0x5FbDB2315678afecb367f032d93F642f64180aa3".parse::<Address>().unwrap()
        );
    }

    #[test]
    fn test_host_and_port() {
        let mut vars = required();
        vars.push((ENV_HOST, "127.0.0.1"));
        vars.push((ENV_PORT, "8080"));
        let env = RelayerEnv::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(env.socket_addr(), "127.0.0.1:8080".parse().unwrap());
    }

    #[test]
    fn test_missing_each_required_variable() {
        for name in [ENV_RPC_URL, ENV_RELAYER_PRIVATE_KEY, ENV_FORWARDER_ADDRESS] {
            let vars: Vec<_> = required().into_iter().filter(|(k, _)| *k != name).collect();
            let err = RelayerEnv::from_lookup(lookup(&vars)).err().unwrap();
            assert!(matches!(err, FromEnvError::Missing(n) if n == name), "{name}");
        }
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let mut vars = required();
        vars.retain(|(k, _)| *k != ENV_RPC_URL);
        vars.push((ENV_RPC_URL, "  "));
        let err = RelayerEnv::from_lookup(lookup(&vars)).err().unwrap();
        assert!(matches!(err, FromEnvError::Missing(ENV_RPC_URL)));
    }

    #[test]
    fn test_invalid_key_is_not_echoed() {
        let mut vars = required();
        vars.retain(|(k, _)| *k != ENV_RELAYER_PRIVATE_KEY);
        vars.push((ENV_RELAYER_PRIVATE_KEY, "0xdeadbeefsecret"));
        let err = RelayerEnv::from_lookup(lookup(&vars)).err().unwrap();
        let message = err.to_string();
        assert!(message.contains(ENV_RELAYER_PRIVATE_KEY));
        assert!(!message.contains("deadbeefsecret"));
    }

    #[test]
    fn test_invalid_forwarder_address() {
        let mut vars = required();
        vars.retain(|(k, _)| *k != ENV_FORWARDER_ADDRESS);
        vars.push((ENV_FORWARDER_ADDRESS, "0x1234"));
        let err = RelayerEnv::from_lookup(lookup(&vars)).err().unwrap();
        assert!(matches!(
            err,
            FromEnvError::Invalid {
                name: ENV_FORWARDER_ADDRESS,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_port() {
        let mut vars = required();
        vars.push((ENV_PORT, "99999"));
        let err = RelayerEnv::from_lookup(lookup(&vars)).err().unwrap();
        assert!(matches!(err, FromEnvError::Invalid { name: ENV_PORT, .. }));
    }
}
