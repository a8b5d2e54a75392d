//! Credential file formats (spec §6): the plain `network_credentials.ini`
//! layout and the optional `SGCRED1` encrypted container. Credential
//! storage proper — SMB/FTP/GIO browsing, keychain backends — is an
//! external collaborator out of scope; only the on-disk formats live here,
//! grounded on `original_source/src/NetworkCredentials.cpp` and
//! `EncryptedFileCredentialStore.cpp`.

use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use sha2::Sha256;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad magic")]
    BadMagic,
    #[error("truncated credential file")]
    Truncated,
    #[error("decryption failed")]
    DecryptionFailed,
}

pub type CredentialResult<T> = Result<T, CredentialError>;

const MAGIC: &[u8; 7] = b"SGCRED1";
const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

/// Parses the plain `network_credentials.ini` format: INI `[host-path]`
/// sections with `username=`/`password=` keys.
pub fn parse_ini(text: &str) -> BTreeMap<String, Credential> {
    let mut out = BTreeMap::new();
    let mut current: Option<String> = None;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            let path = line[1..line.len() - 1].to_string();
            out.entry(path.clone()).or_insert_with(Credential::default);
            current = Some(path);
            continue;
        }
        let Some(path) = current.as_ref() else { continue };
        if let Some((key, value)) = line.split_once('=') {
            let entry = out.entry(path.clone()).or_insert_with(Credential::default);
            match key.trim() {
                "username" => entry.username = value.trim().to_string(),
                "password" => entry.password = value.trim().to_string(),
                _ => {}
            }
        }
    }
    out
}

pub fn render_ini(entries: &BTreeMap<String, Credential>) -> String {
    let mut out = String::from("# songforge network credentials\n# Format: [path] followed by username= and password=\n\n");
    for (path, cred) in entries {
        out.push_str(&format!("[{path}]\nusername={}\npassword={}\n\n", cred.username, cred.password));
    }
    out
}

pub fn load_ini(path: &Path) -> CredentialResult<BTreeMap<String, Credential>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(parse_ini(&text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e.into()),
    }
}

pub fn save_ini(path: &Path, entries: &BTreeMap<String, Credential>) -> CredentialResult<()> {
    std::fs::write(path, render_ini(entries))?;
    Ok(())
}

fn render_plaintext(entries: &BTreeMap<String, Credential>) -> String {
    let mut out = String::new();
    for (host, cred) in entries {
        out.push_str(host);
        out.push('\n');
        out.push_str(&cred.username);
        out.push('\n');
        out.push_str(&cred.password);
        out.push('\n');
    }
    out
}

fn parse_plaintext(text: &str) -> BTreeMap<String, Credential> {
    let mut out = BTreeMap::new();
    let mut lines = text.lines();
    while let (Some(host), Some(user), Some(pass)) = (lines.next(), lines.next(), lines.next()) {
        if host.is_empty() {
            continue;
        }
        out.insert(host.to_string(), Credential { username: user.to_string(), password: pass.to_string() });
    }
    out
}

/// PBKDF2-HMAC-SHA256, 100k iterations, 44-byte output split 32-byte key / 12-byte IV.
fn derive_key_iv(passphrase: &str, salt: &[u8]) -> ([u8; 32], [u8; 12]) {
    let mut okm = [0u8; 44];
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut okm);
    let mut key = [0u8; 32];
    let mut iv = [0u8; 12];
    key.copy_from_slice(&okm[..32]);
    iv.copy_from_slice(&okm[32..]);
    (key, iv)
}

/// Encrypts `entries` into the `SGCRED1` container format (spec §6).
pub fn encrypt_credentials(entries: &BTreeMap<String, Credential>, passphrase: &str) -> CredentialResult<Vec<u8>> {
    let plaintext = render_plaintext(entries);
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let (key, iv) = derive_key_iv(passphrase, &salt);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let nonce = Nonce::from_slice(&iv);
    let mut combined = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| CredentialError::DecryptionFailed)?;
    let tag = combined.split_off(combined.len() - TAG_LEN);

    let mut out = Vec::with_capacity(7 + SALT_LEN + IV_LEN + TAG_LEN + 8 + combined.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&salt);
    out.extend_from_slice(&iv);
    out.extend_from_slice(&tag);
    out.extend_from_slice(&(combined.len() as u64).to_le_bytes());
    out.extend_from_slice(&combined);
    Ok(out)
}

/// Decrypts a `SGCRED1` container back into its host→credential map.
pub fn decrypt_credentials(data: &[u8], passphrase: &str) -> CredentialResult<BTreeMap<String, Credential>> {
    let header_len = 7 + SALT_LEN + IV_LEN + TAG_LEN + 8;
    if data.len() < header_len {
        return Err(CredentialError::Truncated);
    }
    if &data[0..7] != MAGIC {
        return Err(CredentialError::BadMagic);
    }
    let mut pos = 7;
    let salt = &data[pos..pos + SALT_LEN];
    pos += SALT_LEN;
    let iv = &data[pos..pos + IV_LEN];
    pos += IV_LEN;
    let tag = &data[pos..pos + TAG_LEN];
    pos += TAG_LEN;
    let ct_len = u64::from_le_bytes(data[pos..pos + 8].try_into().unwrap()) as usize;
    pos += 8;
    if data.len() < pos + ct_len {
        return Err(CredentialError::Truncated);
    }
    let ciphertext = &data[pos..pos + ct_len];

    let (key, _) = derive_key_iv(passphrase, salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let nonce = Nonce::from_slice(iv);
    let mut combined = ciphertext.to_vec();
    combined.extend_from_slice(tag);
    let plaintext = cipher.decrypt(nonce, combined.as_ref()).map_err(|_| CredentialError::DecryptionFailed)?;
    Ok(parse_plaintext(&String::from_utf8_lossy(&plaintext)))
}

pub fn save_encrypted(path: &Path, entries: &BTreeMap<String, Credential>, passphrase: &str) -> CredentialResult<()> {
    let bytes = encrypt_credentials(entries, passphrase)?;
    std::fs::write(path, bytes)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

pub fn load_encrypted(path: &Path, passphrase: &str) -> CredentialResult<BTreeMap<String, Credential>> {
    match std::fs::read(path) {
        Ok(bytes) => decrypt_credentials(&bytes, passphrase),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(e) => Err(e.into()),
    }
}
