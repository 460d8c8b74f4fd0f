use super::redact_url;
use crate::chain::{ChainConnection, ChainRegistry};
use crate::cli::ChainsArgs;
use crate::config::Config;
use anyhow::Result;
use futures::future::join_all;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChainListItem {
    name: String,
    eid: u32,
    rpc: String,
    chain_id: Option<String>,
    role: &'static str,
}

/// List configured chains with their RPC URLs and probed chain ids.
pub async fn run(args: ChainsArgs, config: Config) -> Result<()> {
    let registry = ChainRegistry::from_config(&config)?;
    let connections: Vec<&ChainConnection> = registry.all().collect();
    let probes = join_all(connections.iter().map(|conn| conn.rpc.chain_id())).await;

    let items: Vec<ChainListItem> = connections
        .iter()
        .zip(probes)
        .map(|(conn, chain_id)| ChainListItem {
            name: conn.name().to_string(),
            eid: conn.profile.endpoint_id,
            rpc: redact_url(&conn.profile.rpc_endpoint),
            chain_id: chain_id.ok().map(|id| id.to_string()),
            role: role(&registry, conn.name()),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    println!("{:<12} {:<8} {:<10} {:<10} {}", "name", "eid", "chainId", "role", "rpc");
    for item in items {
        let chain_id = item.chain_id.unwrap_or_else(|| "unknown".to_string());
        println!(
            "{:<12} {:<8} {:<10} {:<10} {}",
            item.name, item.eid, chain_id, item.role, item.rpc
        );
    }
    Ok(())
}

fn role(registry: &ChainRegistry, name: &str) -> &'static str {
    if registry.reference_name() == name {
        "reference"
    } else if registry.claim_chains().iter().any(|chain| chain == name) {
        "claim"
    } else {
        "-"
    }
}
