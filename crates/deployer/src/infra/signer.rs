use {
    crate::traits::{SignedTransaction, TransactionSigner, UnsignedDeployment},
    alloy::{
        consensus::{SignableTransaction, TxEip1559, TxEnvelope},
        eips::eip2718::Encodable2718,
        network::TxSigner,
        primitives::{Address, TxKind, U256},
        signers::local::PrivateKeySigner,
    },
    anyhow::{Context, Result},
};

/// Signs deployments with a private key held in memory.
#[derive(Clone, Debug)]
pub struct LocalSigner(PrivateKeySigner);

impl LocalSigner {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self(signer)
    }
}

#[async_trait::async_trait]
impl TransactionSigner for LocalSigner {
    fn address(&self) -> Address {
        self.0.address()
    }

    async fn sign(&self, tx: UnsignedDeployment) -> Result<SignedTransaction> {
        let mut tx = TxEip1559 {
            chain_id: tx.chain_id,
            nonce: tx.nonce,
            gas_limit: tx.gas_limit,
            max_fee_per_gas: tx.fees.max_fee_per_gas,
            max_priority_fee_per_gas: tx.fees.max_priority_fee_per_gas,
            to: TxKind::Create,
            value: U256::ZERO,
            access_list: Default::default(),
            input: tx.input,
        };
        let signature = self
            .0
            .sign_transaction(&mut tx)
            .await
            .context("failed to sign deployment transaction")?;
        let envelope = TxEnvelope::from(tx.into_signed(signature));
        Ok(SignedTransaction {
            hash: *envelope.tx_hash(),
            raw: envelope.encoded_2718().into(),
        })
    }
}
