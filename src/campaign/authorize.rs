//! src/campaign/authorize.rs

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const PASSCODE_TAG_KEY: &[u8] = b"mailing-list campaign passcode";

/// Checks campaign passcodes without leaking timing information.
///
/// Both the configured passcode and the candidate are reduced to an
/// HMAC tag; the tags are compared with `verify_slice`, which runs in
/// constant time regardless of where the inputs differ.
#[derive(Clone)]
pub struct PasscodeVerifier {
    mac: HmacSha256,
    expected_tag: Vec<u8>,
}

impl PasscodeVerifier {
    pub fn new(passcode: &Secret<String>) -> Result<Self, anyhow::Error> {
        if passcode.expose_secret().is_empty() {
            anyhow::bail!("The campaign passcode must not be empty.");
        }
        let mac = HmacSha256::new_from_slice(PASSCODE_TAG_KEY)
            .map_err(|_| anyhow::anyhow!("Invalid HMAC key length."))?;
        let mut tagger = mac.clone();
        tagger.update(passcode.expose_secret().as_bytes());
        let expected_tag = tagger.finalize().into_bytes().to_vec();
        Ok(Self { mac, expected_tag })
    }

    pub fn verify(&self, candidate: &Secret<String>) -> bool {
        let mut mac = self.mac.clone();
        mac.update(candidate.expose_secret().as_bytes());
        mac.verify_slice(&self.expected_tag).is_ok()
    }
}
