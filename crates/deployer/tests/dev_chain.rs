//! Deployments against an in-memory development chain that mines every
//! accepted transaction immediately.

use {
    alloy::{
        consensus::TxEnvelope,
        eips::eip2718::Decodable2718,
        primitives::{Address, Bytes, TxHash, U256, keccak256},
        signers::local::PrivateKeySigner,
    },
    clap::Parser,
    deployer::{
        ConfirmationPolicy,
        ConstructorArgs,
        ContractArtifact,
        Deployer,
        DeploymentError,
        DeploymentRequest,
        ErrorKind,
        NetworkConfig,
        SignerKey,
        arguments::{Cli, Command},
        record,
        traits::{Connector, FeeEstimate, Provider, ProviderError, Receipt},
    },
    std::{
        collections::HashMap,
        str::FromStr,
        sync::{Arc, Mutex},
    },
    tokio_util::sync::CancellationToken,
    url::Url,
};

const CHAIN_ID: u64 = 31337;
const FUNDED_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const UNFUNDED_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
const WHITELIST: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

const ARTIFACT: &str = r#"{
    "_format": "hh-sol-artifact-1",
    "contractName": "CryptoDevs",
    "sourceName": "contracts/CryptoDevs.sol",
    "abi": [
        {
            "type": "constructor",
            "stateMutability": "nonpayable",
            "inputs": [
                { "internalType": "string", "name": "baseURI", "type": "string" },
                { "internalType": "address", "name": "whitelistContract", "type": "address" }
            ]
        },
        {
            "type": "function",
            "name": "maxTokenIds",
            "stateMutability": "view",
            "inputs": [],
            "outputs": [{ "internalType": "uint256", "name": "", "type": "uint256" }]
        }
    ],
    "bytecode": "0x6080604052348015600f57600080fd5b50603f80601d6000396000f3fe6080604052600080fdfea164736f6c6343000811000a",
    "deployedBytecode": "0x6080604052600080fdfea164736f6c6343000811000a",
    "linkReferences": {},
    "deployedLinkReferences": {}
}"#;

#[derive(Default)]
struct State {
    head: u64,
    nonces: HashMap<Address, u64>,
    receipts: HashMap<TxHash, Receipt>,
}

/// Development chain double. Every accepted transaction is mined into its own
/// block and every receipt query mines one more empty block.
#[derive(Clone)]
struct DevChain {
    funded: Vec<Address>,
    state: Arc<Mutex<State>>,
}

impl DevChain {
    fn new(funded: Vec<Address>) -> Self {
        Self {
            funded,
            state: Default::default(),
        }
    }

    fn transactions(&self) -> usize {
        self.state.lock().unwrap().receipts.len()
    }
}

impl Connector for DevChain {
    fn connect(&self, _: &Url) -> anyhow::Result<Arc<dyn Provider>> {
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait::async_trait]
impl Provider for DevChain {
    async fn chain_id(&self) -> Result<u64, ProviderError> {
        Ok(CHAIN_ID)
    }

    async fn balance(&self, address: Address) -> Result<U256, ProviderError> {
        Ok(if self.funded.contains(&address) {
            U256::from(10_000) * U256::from(10).pow(U256::from(18))
        } else {
            U256::ZERO
        })
    }

    async fn nonce(&self, address: Address) -> Result<u64, ProviderError> {
        let state = self.state.lock().unwrap();
        Ok(state.nonces.get(&address).copied().unwrap_or_default())
    }

    async fn estimate_gas(&self, _: Address, input: Bytes) -> Result<u64, ProviderError> {
        Ok(53_000 + 16 * input.len() as u64)
    }

    async fn estimate_fees(&self) -> Result<FeeEstimate, ProviderError> {
        Ok(FeeEstimate {
            max_fee_per_gas: 2_000_000_000,
            max_priority_fee_per_gas: 1_000_000_000,
        })
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash, ProviderError> {
        let envelope = TxEnvelope::decode_2718(&mut raw.as_ref())
            .map_err(|err| ProviderError::Rejected(err.to_string()))?;
        let TxEnvelope::Eip1559(signed) = envelope else {
            return Err(ProviderError::Rejected("unsupported transaction type".to_string()));
        };
        let from = signed
            .signature()
            .recover_address_from_prehash(&signed.signature_hash())
            .map_err(|err| ProviderError::Rejected(err.to_string()))?;
        if signed.tx().chain_id != CHAIN_ID {
            return Err(ProviderError::Rejected("invalid chain id".to_string()));
        }

        let hash = keccak256(&raw);
        let mut state = self.state.lock().unwrap();
        let expected = state.nonces.get(&from).copied().unwrap_or_default();
        if signed.tx().nonce != expected {
            return Err(ProviderError::Rejected("nonce too low".to_string()));
        }
        state.nonces.insert(from, expected + 1);
        state.head += 1;
        let receipt = Receipt {
            transaction_hash: hash,
            block_number: state.head,
            success: true,
            contract_address: Some(from.create(expected)),
            gas_used: 53_000,
        };
        state.receipts.insert(hash, receipt);
        Ok(hash)
    }

    async fn receipt(&self, hash: TxHash) -> Result<Option<Receipt>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.head += 1;
        Ok(state.receipts.get(&hash).cloned())
    }

    async fn block_number(&self) -> Result<u64, ProviderError> {
        Ok(self.state.lock().unwrap().head)
    }
}

fn address_of(key: &str) -> Address {
    PrivateKeySigner::from_str(key).unwrap().address()
}

fn request(key: &str) -> DeploymentRequest {
    DeploymentRequest {
        network: NetworkConfig {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            signer_key: Some(SignerKey::new(key)),
            chain_id: Some(CHAIN_ID),
            network: Some("localhost".to_string()),
        },
        artifact: ContractArtifact::from_json("CryptoDevs", ARTIFACT).unwrap(),
        args: ConstructorArgs::parse(["ipfs://metadata/", WHITELIST]),
    }
}

#[tokio::test(start_paused = true)]
async fn deploys_contract() {
    observe::tracing::initialize_reentrant("deployer=debug");
    let chain = DevChain::new(vec![address_of(FUNDED_KEY)]);
    let deployer = Deployer::new(Arc::new(chain.clone()), ConfirmationPolicy::default());

    let deployment = deployer
        .deploy(&request(FUNDED_KEY), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(deployment.address, address_of(FUNDED_KEY).create(0));
    assert_eq!(deployment.deployer, address_of(FUNDED_KEY));
    assert_eq!(deployment.chain_id, CHAIN_ID);
    assert_eq!(chain.transactions(), 1);
}

#[tokio::test(start_paused = true)]
async fn deployments_are_not_idempotent() {
    observe::tracing::initialize_reentrant("deployer=debug");
    let chain = DevChain::new(vec![address_of(FUNDED_KEY)]);
    let deployer = Deployer::new(Arc::new(chain.clone()), ConfirmationPolicy::default());
    let request = request(FUNDED_KEY);

    let first = deployer
        .deploy(&request, &CancellationToken::new())
        .await
        .unwrap();
    let second = deployer
        .deploy(&request, &CancellationToken::new())
        .await
        .unwrap();
    assert_ne!(first.transaction_hash, second.transaction_hash);
    assert_ne!(first.address, second.address);
    assert_eq!(second.address, address_of(FUNDED_KEY).create(1));
    assert_eq!(chain.transactions(), 2);
}

#[tokio::test(start_paused = true)]
async fn waits_for_confirmations() {
    let chain = DevChain::new(vec![address_of(FUNDED_KEY)]);
    let policy = ConfirmationPolicy {
        confirmations: 4,
        ..Default::default()
    };
    let deployment = Deployer::new(Arc::new(chain), policy)
        .deploy(&request(FUNDED_KEY), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(deployment.confirmations, 4);
}

#[tokio::test(start_paused = true)]
async fn unfunded_account_sends_nothing() {
    let chain = DevChain::new(vec![address_of(FUNDED_KEY)]);
    let deployer = Deployer::new(Arc::new(chain.clone()), ConfirmationPolicy::default());

    let err = deployer
        .deploy(&request(UNFUNDED_KEY), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DeploymentError::SubmissionRejected { .. }));
    assert_eq!(chain.transactions(), 0);
}

fn cli(args: &[&str]) -> deployer::arguments::Arguments {
    let base = ["deployer", "deploy", "--rpc-url", "http://127.0.0.1:8545"];
    let cli = Cli::try_parse_from(base.iter().chain(args)).unwrap();
    let Command::Deploy(args) = cli.command;
    args
}

#[tokio::test(start_paused = true)]
async fn cli_records_deployments_and_refuses_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("CryptoDevs.json");
    std::fs::write(&artifact, ARTIFACT).unwrap();
    let output = dir.path().join("deployments.json");
    let artifact = artifact.to_str().unwrap();
    let output = output.to_str().unwrap();
    let whitelist = format!("whitelistContract={WHITELIST}");
    let flags = [
        "--private-key",
        FUNDED_KEY,
        "--chain-id",
        "31337",
        "--artifact",
        artifact,
        "--constructor-arg",
        "baseURI=ipfs://metadata/",
        "--constructor-arg",
        &whitelist,
        "--output",
        output,
    ];
    let chain = DevChain::new(vec![address_of(FUNDED_KEY)]);

    let code = deployer::execute(&cli(&flags), Arc::new(chain.clone()), CancellationToken::new())
        .await;
    assert_eq!(code, 0);
    let records = record::load(output.as_ref()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].contract, "CryptoDevs");
    assert_eq!(records[0].address, address_of(FUNDED_KEY).create(0));
    assert_eq!(records[0].constructor_args[0], "baseURI=ipfs://metadata/");

    let code = deployer::execute(&cli(&flags), Arc::new(chain.clone()), CancellationToken::new())
        .await;
    assert_eq!(code, ErrorKind::InvalidConfiguration.exit_code());
    assert_eq!(chain.transactions(), 1);

    let forced = [&flags[..], &["--force"][..]].concat();
    let code = deployer::execute(&cli(&forced), Arc::new(chain.clone()), CancellationToken::new())
        .await;
    assert_eq!(code, 0);
    assert_eq!(record::load(output.as_ref()).unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn cli_exit_codes() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("CryptoDevs.json");
    std::fs::write(&artifact, ARTIFACT).unwrap();
    let artifact = artifact.to_str().unwrap();
    let chain = DevChain::new(vec![address_of(FUNDED_KEY)]);
    let run = |flags: Vec<&str>| {
        let chain = chain.clone();
        let args = cli(&flags);
        async move { deployer::execute(&args, Arc::new(chain), CancellationToken::new()).await }
    };

    // Wrong chain.
    let code = run(vec![
        "--private-key",
        FUNDED_KEY,
        "--chain-id",
        "1",
        "--artifact",
        artifact,
        "--constructor-arg",
        "ipfs://metadata/",
        "--constructor-arg",
        WHITELIST,
    ])
    .await;
    assert_eq!(code, ErrorKind::SubmissionRejected.exit_code());

    // Missing constructor argument.
    let code = run(vec![
        "--private-key",
        FUNDED_KEY,
        "--artifact",
        artifact,
        "--constructor-arg",
        "ipfs://metadata/",
    ])
    .await;
    assert_eq!(code, ErrorKind::InvalidConfiguration.exit_code());

    // Unknown artifact.
    let code = run(vec![
        "--private-key",
        FUNDED_KEY,
        "--contract",
        "Missing",
        "--artifacts-dir",
        dir.path().to_str().unwrap(),
    ])
    .await;
    assert_eq!(code, deployer::EXIT_FAILURE);

    // Unlinked library placeholder in the bytecode.
    let unlinked = dir.path().join("Linked.json");
    std::fs::write(
        &unlinked,
        r#"{ "contractName": "Linked", "abi": [], "bytecode": "0x6080__$1234567890abcdef$__6040" }"#,
    )
    .unwrap();
    let code = run(vec![
        "--private-key",
        FUNDED_KEY,
        "--artifact",
        unlinked.to_str().unwrap(),
    ])
    .await;
    assert_eq!(code, ErrorKind::InvalidConfiguration.exit_code());

    assert_eq!(chain.transactions(), 0);
}

#[tokio::test(start_paused = true)]
async fn cli_output_requires_a_network_identity() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("CryptoDevs.json");
    std::fs::write(&artifact, ARTIFACT).unwrap();
    let output = dir.path().join("deployments.json");
    let whitelist = format!("whitelistContract={WHITELIST}");
    let flags = [
        "--private-key",
        FUNDED_KEY,
        "--artifact",
        artifact.to_str().unwrap(),
        "--constructor-arg",
        "baseURI=ipfs://metadata/",
        "--constructor-arg",
        &whitelist,
        "--output",
        output.to_str().unwrap(),
    ];
    let chain = DevChain::new(vec![address_of(FUNDED_KEY)]);

    let code = deployer::execute(&cli(&flags), Arc::new(chain.clone()), CancellationToken::new())
        .await;
    assert_eq!(code, ErrorKind::InvalidConfiguration.exit_code());
    assert_eq!(chain.transactions(), 0);
    assert!(!output.exists());

    let named = [&flags[..], &["--network", "devnet"][..]].concat();
    let code = deployer::execute(&cli(&named), Arc::new(chain.clone()), CancellationToken::new())
        .await;
    assert_eq!(code, 0);
    assert_eq!(record::load(&output).unwrap()[0].network, "devnet");
}
