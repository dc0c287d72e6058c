//! Model signing utility for hepascreen classifier artifacts.
//!
//! Writes a manifest (`manifest.json`) binding the SHA-256 of every model
//! artifact in a directory, and a detached Ed25519 signature (`model.sig`)
//! over the manifest bytes.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin sign_model -- <model_dir | model_file>
//! ```
//!
//! The 32-byte signing seed is read, base64 encoded, from
//! `HEPASCREEN_MODEL_SIGNING_KEY_B64_FILE` or the Docker secret path. Debug
//! builds also accept `HEPASCREEN_MODEL_SIGNING_KEY_B64`. The seed is
//! zeroized after use.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use hepascreen::adapters::model::{sha256_hex, ModelManifest, MANIFEST_FILE, SIGNATURE_FILE};

const KEY_FILE_ENV: &str = "HEPASCREEN_MODEL_SIGNING_KEY_B64_FILE";
const KEY_ENV_DEV: &str = "HEPASCREEN_MODEL_SIGNING_KEY_B64";
const DOCKER_SECRET_PATH: &str = "/run/secrets/hepascreen_model_signing_key_b64";

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

fn non_empty_secret(raw: String) -> Result<Zeroizing<String>> {
    let raw = Zeroizing::new(raw);
    let secret = raw.trim_end_matches(['\n', '\r']).to_string();
    if secret.is_empty() {
        bail!("Empty signing key");
    }
    Ok(Zeroizing::new(secret))
}

fn read_signing_seed_b64() -> Result<Zeroizing<String>> {
    if let Ok(path) = env::var(KEY_FILE_ENV) {
        let content = fs::read_to_string(path.trim()).context("Failed reading signing key file")?;
        return non_empty_secret(content);
    }

    if Path::new(DOCKER_SECRET_PATH).exists() {
        let content =
            fs::read_to_string(DOCKER_SECRET_PATH).context("Failed reading docker secret")?;
        return non_empty_secret(content);
    }

    // Dev-only fallback for convenience.
    if cfg!(debug_assertions) {
        if let Ok(v) = env::var(KEY_ENV_DEV) {
            return non_empty_secret(v);
        }
    }

    bail!(
        "Missing signing key. Provide {KEY_FILE_ENV} or {DOCKER_SECRET_PATH} ({KEY_ENV_DEV} only in debug builds)."
    )
}

fn read_signing_seed() -> Result<Seed> {
    let v = read_signing_seed_b64()?;
    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(v.trim())
            .context("Invalid base64 in signing key")?,
    );

    let bytes: [u8; 32] = raw.as_slice().try_into().map_err(|_| {
        anyhow::anyhow!(
            "Signing key seed must be 32 bytes after base64 decode (got {})",
            raw.len()
        )
    })?;
    Ok(Seed(bytes))
}

fn model_dir_from_args() -> Result<PathBuf> {
    let mut args = env::args().skip(1);
    let (Some(arg), None) = (args.next(), args.next()) else {
        bail!("Usage: sign_model <model_dir | model_file>");
    };

    let path = PathBuf::from(arg);
    if path.is_file() {
        let parent = path
            .parent()
            .context("Model path has no parent directory")?;
        Ok(if parent.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            parent.to_path_buf()
        })
    } else {
        Ok(path)
    }
}

/// Every `*.json` artifact in the directory except the manifest itself.
fn collect_artifacts(model_dir: &Path) -> Result<BTreeMap<String, String>> {
    let mut files = BTreeMap::new();
    let entries =
        fs::read_dir(model_dir).with_context(|| format!("Failed to list {model_dir:?}"))?;

    for entry in entries {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name == MANIFEST_FILE || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let bytes = fs::read(&path).with_context(|| format!("Failed to read {path:?}"))?;
        files.insert(name.to_string(), sha256_hex(&bytes));
    }

    if files.is_empty() {
        bail!("No model JSON found in {model_dir:?}");
    }
    Ok(files)
}

fn main() -> Result<()> {
    let model_dir = model_dir_from_args()?;
    let files = collect_artifacts(&model_dir)?;

    let seed = read_signing_seed()?;
    let signing_key = SigningKey::from_bytes(&seed.0);
    drop(seed);

    let manifest = ModelManifest {
        version: 1,
        created_at: Some(chrono::Utc::now().timestamp()),
        files,
    };
    let manifest_bytes =
        serde_json::to_vec_pretty(&manifest).context("Failed to serialize manifest.json")?;

    let manifest_path = model_dir.join(MANIFEST_FILE);
    fs::write(&manifest_path, &manifest_bytes)
        .with_context(|| format!("Failed to write {manifest_path:?}"))?;

    let sig: Signature = signing_key.sign(&manifest_bytes);
    let sig_path = model_dir.join(SIGNATURE_FILE);
    fs::write(&sig_path, sig.to_bytes())
        .with_context(|| format!("Failed to write {sig_path:?}"))?;

    println!("Signed manifest: {manifest_path:?}");
    for name in manifest.files.keys() {
        println!("  bound {name}");
    }
    println!("Wrote signature: {sig_path:?}");
    println!(
        "Public key (base64, for HEPASCREEN_MODEL_PUBKEY_B64_FILE)={}",
        general_purpose::STANDARD.encode(signing_key.verifying_key().as_bytes())
    );

    Ok(())
}
