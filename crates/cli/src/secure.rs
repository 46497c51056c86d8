use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305, Key, Nonce,
};

pub const KEY_LENGTH: usize = 32;
pub const NONCE_LENGTH: usize = 12;

/// Write a fresh random key to `path`. Refuses to clobber an existing key:
/// losing it makes every archive encrypted with it unreadable.
pub fn generate_key(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "key file {} already exists; pass --force to replace it",
            path.display()
        );
    }
    let key = ChaCha20Poly1305::generate_key(&mut OsRng);
    fs::write(path, key.as_slice())
        .with_context(|| format!("failed to write key file {}", path.display()))?;
    Ok(())
}

fn load_cipher(path: &Path) -> Result<ChaCha20Poly1305> {
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read key file {}", path.display()))?;
    if bytes.len() != KEY_LENGTH {
        bail!(
            "key file {} has {} byte(s); expected {}",
            path.display(),
            bytes.len(),
            KEY_LENGTH
        );
    }
    Ok(ChaCha20Poly1305::new(Key::from_slice(&bytes)))
}

/// Encrypt `plaintext` under the key at `key_path`. The random nonce is
/// prepended so the payload is self-contained.
pub fn encrypt_bytes(key_path: &Path, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = load_cipher(key_path)?;
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| anyhow!("encryption failed"))?;
    let mut payload = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
    payload.extend_from_slice(&nonce);
    payload.extend_from_slice(&ciphertext);
    Ok(payload)
}

pub fn decrypt_bytes(key_path: &Path, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() < NONCE_LENGTH {
        bail!("payload too short to contain a nonce");
    }
    let cipher = load_cipher(key_path)?;
    let (nonce, ciphertext) = payload.split_at(NONCE_LENGTH);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| anyhow!("decryption failed; wrong key or corrupted payload"))
}

/// Encrypt a file on disk, leaving the original in place. Returns the
/// output path (`<input>.enc` unless overridden).
pub fn encrypt_file(key_path: &Path, input: &Path, output: Option<PathBuf>) -> Result<PathBuf> {
    let plaintext = fs::read(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let payload = encrypt_bytes(key_path, &plaintext)?;
    let output = output.unwrap_or_else(|| default_encrypted_path(input));
    fs::write(&output, payload)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(output)
}

pub fn decrypt_file(key_path: &Path, input: &Path, output: Option<PathBuf>) -> Result<PathBuf> {
    let payload = fs::read(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let plaintext = decrypt_bytes(key_path, &payload)?;
    let output = match output {
        Some(path) => path,
        None => default_decrypted_path(input)?,
    };
    fs::write(&output, plaintext)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(output)
}

fn default_encrypted_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_os_string();
    name.push(".enc");
    PathBuf::from(name)
}

fn default_decrypted_path(input: &Path) -> Result<PathBuf> {
    match input.extension() {
        Some(ext) if ext == "enc" => Ok(input.with_extension("")),
        _ => bail!(
            "cannot infer an output name for {}; pass --output",
            input.display()
        ),
    }
}
