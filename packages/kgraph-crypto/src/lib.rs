mod error;

pub use error::{Error, Result};

use std::collections::BTreeMap;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as base64_engine;
use rand::RngCore;

const NONCE_LEN: usize = 12;

/// Encrypted connector secret: `key_version` names which [`KeyRing`] entry
/// produced `ciphertext`, which is `nonce || aes_gcm_output`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
	pub key_version: u32,
	pub ciphertext: Vec<u8>,
}

/// Holds every key version a connector secret might have been encrypted
/// with, plus the version new encryptions should use. Rotation is: encrypt
/// with the new active version, keep old versions around to decrypt
/// anything not yet re-encrypted, and try versions newest-first when the
/// caller doesn't already know which one produced a given envelope.
pub struct KeyRing {
	keys: BTreeMap<u32, [u8; 32]>,
	active_version: u32,
}

impl KeyRing {
	pub fn new(active_version: u32, keys: Vec<(u32, String)>) -> Result<Self> {
		let mut decoded = BTreeMap::new();
		for (version, base64_key) in keys {
			let bytes = base64_engine.decode(base64_key)?;
			if bytes.len() != 32 {
				return Err(Error::InvalidKeyLength(bytes.len()));
			}
			let mut key = [0u8; 32];
			key.copy_from_slice(&bytes);
			decoded.insert(version, key);
		}
		if !decoded.contains_key(&active_version) {
			return Err(Error::UnknownKeyVersion(active_version));
		}
		Ok(Self { keys: decoded, active_version })
	}

	pub fn active_version(&self) -> u32 {
		self.active_version
	}

	pub fn encrypt(&self, plaintext: &[u8]) -> Result<Envelope> {
		self.encrypt_with(self.active_version, plaintext)
	}

	pub fn encrypt_with(&self, key_version: u32, plaintext: &[u8]) -> Result<Envelope> {
		let key_bytes = self.keys.get(&key_version).ok_or(Error::UnknownKeyVersion(key_version))?;
		let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key_bytes));

		let mut nonce_bytes = [0u8; NONCE_LEN];
		OsRng.fill_bytes(&mut nonce_bytes);
		let nonce = Nonce::from_slice(&nonce_bytes);

		let mut ciphertext = cipher.encrypt(nonce, plaintext).map_err(|_| Error::Encrypt)?;
		let mut envelope = nonce_bytes.to_vec();
		envelope.append(&mut ciphertext);

		Ok(Envelope { key_version, ciphertext: envelope })
	}

	pub fn decrypt(&self, envelope: &Envelope) -> Result<Vec<u8>> {
		self.decrypt_with(envelope.key_version, &envelope.ciphertext)
	}

	pub fn decrypt_with(&self, key_version: u32, data: &[u8]) -> Result<Vec<u8>> {
		let key_bytes = self.keys.get(&key_version).ok_or(Error::UnknownKeyVersion(key_version))?;
		if data.len() < NONCE_LEN {
			return Err(Error::TruncatedEnvelope);
		}
		let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
		let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key_bytes));
		cipher.decrypt(Nonce::from_slice(nonce_bytes), ciphertext).map_err(|_| Error::Decrypt)
	}

	/// Tries every known key version, newest first, until one decrypts
	/// successfully. Used by rotation sweeps that re-encrypt secrets whose
	/// stored `key_version` predates a bulk migration.
	pub fn decrypt_any(&self, data: &[u8]) -> Result<(u32, Vec<u8>)> {
		for (&version, _) in self.keys.iter().rev() {
			if let Ok(plaintext) = self.decrypt_with(version, data) {
				return Ok((version, plaintext));
			}
		}
		Err(Error::Decrypt)
	}

	/// Re-encrypts `envelope` under the active key if it isn't already.
	pub fn rotate(&self, envelope: &Envelope) -> Result<Envelope> {
		if envelope.key_version == self.active_version {
			return Ok(envelope.clone());
		}
		let plaintext = self.decrypt(envelope)?;
		self.encrypt(&plaintext)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn test_key(byte: u8) -> String {
		base64_engine.encode([byte; 32])
	}

	#[test]
	fn round_trips_under_active_key() {
		let ring = KeyRing::new(2, vec![(1, test_key(1)), (2, test_key(2))]).unwrap();
		let envelope = ring.encrypt(b"super secret token").unwrap();
		assert_eq!(envelope.key_version, 2);
		let plaintext = ring.decrypt(&envelope).unwrap();
		assert_eq!(plaintext, b"super secret token");
	}

	#[test]
	fn rotate_moves_to_active_version() {
		let ring = KeyRing::new(2, vec![(1, test_key(1)), (2, test_key(2))]).unwrap();
		let old = ring.encrypt_with(1, b"legacy secret").unwrap();
		let rotated = ring.rotate(&old).unwrap();
		assert_eq!(rotated.key_version, 2);
		assert_eq!(ring.decrypt(&rotated).unwrap(), b"legacy secret");
	}

	#[test]
	fn decrypt_any_finds_the_right_version() {
		let ring = KeyRing::new(3, vec![(1, test_key(1)), (2, test_key(2)), (3, test_key(3))]).unwrap();
		let envelope = ring.encrypt_with(2, b"mid-rotation secret").unwrap();
		let (version, plaintext) = ring.decrypt_any(&envelope.ciphertext).unwrap();
		assert_eq!(version, 2);
		assert_eq!(plaintext, b"mid-rotation secret");
	}

	#[test]
	fn unknown_active_version_is_rejected() {
		assert!(KeyRing::new(9, vec![(1, test_key(1))]).is_err());
	}
}
