//! Signed transactions submitted to the state-transition layer

use crate::{Address, CoreError, CoreResult, Gas, Hash, Nonce, Wei};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};

/// Recoverable ECDSA signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode)]
pub struct Signature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u8,
}

impl Signature {
    /// Create new signature
    pub fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        Self { r, s, v }
    }

    fn to_recoverable(&self) -> CoreResult<RecoverableSignature> {
        let recovery_id = RecoveryId::from_u8_masked(self.v);

        let mut compact = [0u8; 64];
        compact[0..32].copy_from_slice(&self.r);
        compact[32..64].copy_from_slice(&self.s);

        RecoverableSignature::from_compact(&compact, recovery_id)
            .map_err(|e| CoreError::Crypto(e.to_string()))
    }
}

/// Transaction data structure
///
/// A missing `to` requests contract creation; the payload is then the init code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode)]
pub struct Transaction {
    /// Number of transactions previously sent by the signer
    pub nonce: Nonce,
    /// Maximum gas this transaction may consume
    pub gas_limit: Gas,
    /// Recipient address (None for contract creation)
    pub to: Option<Address>,
    /// Value carried by the transaction
    pub value: Wei,
    /// Call payload or init code
    pub data: Vec<u8>,
    /// Transaction signature
    pub signature: Option<Signature>,
}

impl Transaction {
    /// Create a new unsigned transaction
    pub fn new(nonce: Nonce, gas_limit: Gas, to: Option<Address>, value: Wei, data: Vec<u8>) -> Self {
        Self {
            nonce,
            gas_limit,
            to,
            value,
            data,
            signature: None,
        }
    }

    /// Create a plain value transfer
    pub fn transfer(nonce: Nonce, to: Address, value: Wei, gas_limit: Gas) -> Self {
        Self::new(nonce, gas_limit, Some(to), value, Vec::new())
    }

    /// Create a contract call
    pub fn call(nonce: Nonce, to: Address, value: Wei, gas_limit: Gas, payload: Vec<u8>) -> Self {
        Self::new(nonce, gas_limit, Some(to), value, payload)
    }

    /// Create a contract creation transaction
    pub fn create_contract(nonce: Nonce, value: Wei, gas_limit: Gas, code: Vec<u8>) -> Self {
        Self::new(nonce, gas_limit, None, value, code)
    }

    /// Canonical bytes of the full transaction, signature included
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| CoreError::Bincode(e.to_string()))
    }

    /// Encode transaction for signing (signature excluded)
    pub fn encode_for_signing(&self) -> CoreResult<Vec<u8>> {
        let unsigned = TransactionForSigning {
            nonce: self.nonce,
            gas_limit: self.gas_limit,
            to: self.to,
            value: self.value,
            data: &self.data,
        };

        bincode::encode_to_vec(&unsigned, bincode::config::standard())
            .map_err(|e| CoreError::Bincode(e.to_string()))
    }

    /// Transaction hash (including signature)
    pub fn hash(&self) -> CoreResult<Hash> {
        Ok(Hash::digest(&self.encode()?))
    }

    /// Hash signed by the sender
    pub fn signing_hash(&self) -> CoreResult<Hash> {
        Ok(Hash::digest(&self.encode_for_signing()?))
    }

    /// Sign the transaction with a raw 32-byte secret key
    pub fn sign(&mut self, private_key: &[u8]) -> CoreResult<()> {
        let secp = Secp256k1::new();
        let secret_key =
            SecretKey::from_slice(private_key).map_err(|e| CoreError::Crypto(e.to_string()))?;
        let message = Message::from_digest(*self.signing_hash()?.as_bytes());

        let (recovery_id, compact) = secp
            .sign_ecdsa_recoverable(message, &secret_key)
            .serialize_compact();

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&compact[0..32]);
        s.copy_from_slice(&compact[32..64]);

        self.signature = Some(Signature::new(r, s, recovery_id as u8));
        Ok(())
    }

    /// Check that a signature is present and recovers to a public key
    pub fn verify_signature(&self) -> CoreResult<bool> {
        if self.signature.is_none() {
            return Ok(false);
        }
        Ok(self.recover_public_key().is_ok())
    }

    /// Sender address recovered from the signature
    pub fn sender(&self) -> CoreResult<Address> {
        let public_key = self.recover_public_key()?;
        Ok(address_of(&public_key))
    }

    fn recover_public_key(&self) -> CoreResult<PublicKey> {
        let signature = self.signature.as_ref().ok_or(CoreError::InvalidSignature)?;
        let message = Message::from_digest(*self.signing_hash()?.as_bytes());

        Secp256k1::new()
            .recover_ecdsa(message, &signature.to_recoverable()?)
            .map_err(|e| CoreError::Crypto(e.to_string()))
    }
}

/// Address of a public key: low 20 bytes of keccak256 over the uncompressed point
pub fn address_of(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    Address::from_hash(&Hash::digest(&uncompressed[1..]))
}

/// Address controlled by a raw secret key
pub fn address_of_secret(private_key: &[u8]) -> CoreResult<Address> {
    let secret_key =
        SecretKey::from_slice(private_key).map_err(|e| CoreError::Crypto(e.to_string()))?;
    Ok(address_of(&PublicKey::from_secret_key(&Secp256k1::new(), &secret_key)))
}

#[derive(bincode::Encode)]
struct TransactionForSigning<'a> {
    nonce: Nonce,
    gas_limit: Gas,
    to: Option<Address>,
    value: Wei,
    data: &'a [u8],
}
