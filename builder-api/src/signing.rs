pub use ethereum_consensus::crypto::{verify_signature, SecretKey};
use ethereum_consensus::{
    builder::compute_builder_domain,
    primitives::{BlsPublicKey, BlsSignature, Root},
    signing::{compute_signing_root, sign_with_domain},
    ssz::prelude::HashTreeRoot,
    state_transition::Context,
    Error,
};

pub fn compute_builder_signing_root<T: HashTreeRoot>(
    data: &mut T,
    context: &Context,
) -> Result<Root, Error> {
    let domain = compute_builder_domain(context)?;
    compute_signing_root(data, domain)
}

pub fn sign_builder_message<T: HashTreeRoot>(
    message: &mut T,
    signing_key: &SecretKey,
    context: &Context,
) -> Result<BlsSignature, Error> {
    let domain = compute_builder_domain(context)?;
    sign_with_domain(message, signing_key, domain)
}

/// Verifies `signature` over `message` under the builder domain for `public_key`.
pub fn verify_signed_builder_message<T: HashTreeRoot>(
    message: &mut T,
    signature: &BlsSignature,
    public_key: &BlsPublicKey,
    context: &Context,
) -> Result<(), Error> {
    let signing_root = compute_builder_signing_root(message, context)?;
    verify_signature(public_key, signing_root.as_ref(), signature).map_err(Error::from)
}
