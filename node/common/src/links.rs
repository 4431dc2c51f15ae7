use ethers::types::{Address, H256};

use crate::types::UpkeepId;

struct Network {
    chain_id: u64,
    /// Network segment used by the automation app
    automation_slug: &'static str,
    explorer: &'static str,
}

const NETWORKS: &[Network] = &[
    Network { chain_id: 1, automation_slug: "mainnet", explorer: "https://etherscan.io" },
    Network { chain_id: 11155111, automation_slug: "sepolia", explorer: "https://sepolia.etherscan.io" },
    Network { chain_id: 10, automation_slug: "optimism", explorer: "https://optimistic.etherscan.io" },
    Network { chain_id: 56, automation_slug: "bsc", explorer: "https://bscscan.com" },
    Network { chain_id: 97, automation_slug: "bsc-testnet", explorer: "https://testnet.bscscan.com" },
    Network { chain_id: 137, automation_slug: "polygon", explorer: "https://polygonscan.com" },
    Network { chain_id: 80002, automation_slug: "polygon-amoy", explorer: "https://amoy.polygonscan.com" },
    Network { chain_id: 250, automation_slug: "fantom", explorer: "https://ftmscan.com" },
    Network { chain_id: 8453, automation_slug: "base", explorer: "https://basescan.org" },
    Network { chain_id: 84532, automation_slug: "base-sepolia", explorer: "https://sepolia.basescan.org" },
    Network { chain_id: 42161, automation_slug: "arbitrum", explorer: "https://arbiscan.io" },
    Network { chain_id: 421614, automation_slug: "arbitrum-sepolia", explorer: "https://sepolia.arbiscan.io" },
    Network { chain_id: 43114, automation_slug: "avalanche", explorer: "https://snowtrace.io" },
    Network { chain_id: 43113, automation_slug: "fuji", explorer: "https://testnet.snowtrace.io" },
];

fn network(chain_id: u64) -> Option<&'static Network> {
    NETWORKS.iter().find(|n| n.chain_id == chain_id)
}

/// Automation app page for an upkeep
pub fn upkeep_link(chain_id: u64, id: UpkeepId) -> Option<String> {
    network(chain_id).map(|n| format!("https://automation.chain.link/{}/{}", n.automation_slug, id))
}

/// Block explorer page for a contract
pub fn contract_explorer_link(chain_id: u64, address: Address) -> Option<String> {
    network(chain_id).map(|n| format!("{}/address/{:?}", n.explorer, address))
}

/// Block explorer page for a transaction
pub fn transaction_explorer_link(chain_id: u64, tx_hash: H256) -> Option<String> {
    network(chain_id).map(|n| format!("{}/tx/{:?}", n.explorer, tx_hash))
}
