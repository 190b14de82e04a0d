use crate::{
    signing::{sign_builder_message, verify_signed_builder_message, SecretKey},
    types::ExecutionPayloadHeader,
};
use ethereum_consensus::{
    primitives::{BlsPublicKey, BlsSignature, Hash32, U256},
    ssz::prelude::*,
    state_transition::Context,
    Error, Fork,
};
use std::fmt;

#[derive(Debug, Clone, Serializable, HashTreeRoot, serde::Serialize, serde::Deserialize)]
pub struct BuilderBid {
    pub header: ExecutionPayloadHeader,
    #[serde(with = "crate::serde::as_str")]
    pub value: U256,
    #[serde(rename = "pubkey")]
    pub public_key: BlsPublicKey,
}

impl BuilderBid {
    pub fn sign(
        mut self,
        secret_key: &SecretKey,
        context: &Context,
    ) -> Result<SignedBuilderBid, Error> {
        let signature = sign_builder_message(&mut self, secret_key, context)?;
        Ok(SignedBuilderBid { message: self, signature })
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SignedBuilderBid {
    pub message: BuilderBid,
    pub signature: BlsSignature,
}

impl SignedBuilderBid {
    pub fn version(&self) -> Fork {
        self.message.header.version()
    }

    pub fn value(&self) -> &U256 {
        &self.message.value
    }

    pub fn block_hash(&self) -> &Hash32 {
        self.message.header.block_hash()
    }

    pub fn parent_hash(&self) -> &Hash32 {
        self.message.header.parent_hash()
    }

    /// Verifies the bid signature against the public key the bid claims as its signer.
    pub fn verify_signature(&mut self, context: &Context) -> Result<(), Error> {
        let public_key = self.message.public_key.clone();
        verify_signed_builder_message(&mut self.message, &self.signature, &public_key, context)
    }
}

impl fmt::Display for SignedBuilderBid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let block_hash = self.block_hash();
        let value = self.value();
        write!(f, "block hash {block_hash} and value {value}")
    }
}
