use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use relay_client::{ForwardCall, ForwarderWallet, RelayerClient};
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Sign MinimalForwarder requests and relay them.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign a request and print the `{request, signature}` body.
    Sign(SignArgs),
    /// Sign a request and post it to the relayer.
    Relay {
        #[command(flatten)]
        sign: SignArgs,
        #[arg(long, env = "RELAYER_URL", default_value = "http://localhost:3000")]
        relayer_url: String,
    },
    /// Query the relayer's health endpoint.
    Health {
        #[arg(long, env = "RELAYER_URL", default_value = "http://localhost:3000")]
        relayer_url: String,
    },
}

#[derive(Args, Debug)]
struct SignArgs {
    /// RPC endpoint used to read the chain id and forwarder nonce.
    #[arg(long, env = "RPC_URL")]
    rpc_url: String,

    #[arg(long, env = "FORWARDER_ADDRESS")]
    forwarder: Address,

    /// Private key of the account the request is signed for (hex string, 0x...).
    #[arg(long, env = "SIGNER_PRIVATE_KEY", hide_env_values = true)]
    private_key: String,

    /// Call target. Defaults to the forwarder itself, a harmless no-op.
    #[arg(long)]
    to: Option<Address>,

    /// Calldata for the target.
    #[arg(long, default_value = "0x")]
    data: Bytes,

    /// Wei forwarded with the call.
    #[arg(long, default_value = "0")]
    value: U256,

    /// Gas forwarded to the target call.
    #[arg(long, default_value = "100000")]
    gas: U256,
}

impl SignArgs {
    async fn prepare(self) -> Result<forwarder_relayer::forwarder::SignedForwardRequest> {
        let signer = PrivateKeySigner::from_str(&self.private_key)
            .map_err(|_| anyhow::anyhow!("SIGNER_PRIVATE_KEY is not a valid private key"))?;
        let rpc_url = self.rpc_url.parse().context("Invalid RPC_URL")?;
        let provider = ProviderBuilder::new().connect_http(rpc_url);
        let wallet = ForwarderWallet::new(signer, provider, self.forwarder);

        let call = ForwardCall {
            to: self.to.unwrap_or(self.forwarder),
            data: self.data,
            value: self.value,
            gas: self.gas,
        };
        wallet.prepare(call).await
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Sign(args) => {
            let signed = args.prepare().await?;
            println!("{}", serde_json::to_string_pretty(&signed.to_relay_request())?);
        }
        Command::Relay { sign, relayer_url } => {
            let signed = sign.prepare().await?;
            let body = signed.to_relay_request();
            tracing::info!(from = %body.request.from, nonce = %body.request.nonce, "Relaying request");
            let response = RelayerClient::new(relayer_url).relay(&body).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Health { relayer_url } => {
            let health = RelayerClient::new(relayer_url).health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
    }
    Ok(())
}
