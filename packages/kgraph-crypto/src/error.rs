pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid key length: expected 32 bytes, got {0}.")]
	InvalidKeyLength(usize),
	#[error("No key registered for version {0}.")]
	UnknownKeyVersion(u32),
	#[error("Failed to decode base64 key material: {0}")]
	Base64(#[from] base64::DecodeError),
	#[error("Encryption failed.")]
	Encrypt,
	#[error("Decryption failed: ciphertext is malformed or the key version is wrong.")]
	Decrypt,
	#[error("Envelope is too short to contain a nonce.")]
	TruncatedEnvelope,
}
