// Turning PEM material from the certificate cache into servable keys

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use rustls_pemfile::{certs, private_key};
use x509_parser::pem::parse_x509_pem;

use crate::error::ProviderError;

/// Parse a PEM certificate chain
pub fn parse_certificate_chain(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, ProviderError> {
    let mut reader = pem;
    let chain = certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ProviderError::InvalidCertificate(format!("Failed to parse certificate: {e}")))?;

    if chain.is_empty() {
        return Err(ProviderError::InvalidCertificate(
            "No certificate found in PEM data".to_string(),
        ));
    }

    Ok(chain)
}

/// Parse a PEM private key (RSA, ECDSA or PKCS#8)
pub fn parse_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, ProviderError> {
    let mut reader = pem;
    private_key(&mut reader)
        .map_err(|e| ProviderError::InvalidCertificate(format!("Failed to parse private key: {e}")))?
        .ok_or_else(|| ProviderError::InvalidCertificate("No private key found in PEM data".to_string()))
}

/// Build a certified key ready to be served from a PEM chain and key
pub fn certified_key(cert_pem: &[u8], key_pem: &[u8]) -> Result<Arc<CertifiedKey>, ProviderError> {
    let chain = parse_certificate_chain(cert_pem)?;
    let key = parse_private_key(key_pem)?;

    let signing_key = rustls::crypto::aws_lc_rs::sign::any_supported_type(&key)
        .map_err(|e| ProviderError::InvalidCertificate(format!("Invalid private key: {e}")))?;

    return Ok(Arc::new(CertifiedKey::new(chain, signing_key)));
}

/// Check that the private key belongs to the leaf certificate.
///
/// Keys whose public half cannot be derived are accepted.
pub fn verify_key_pair(cert_pem: &[u8], key_pem: &[u8]) -> Result<(), ProviderError> {
    let certified = certified_key(cert_pem, key_pem)?;

    match certified.keys_match() {
        Ok(()) | Err(rustls::Error::InconsistentKeys(rustls::InconsistentKeys::Unknown)) => Ok(()),
        Err(e) => Err(ProviderError::InvalidCertificate(format!(
            "Private key does not match the certificate: {e}"
        ))),
    }
}

/// The `notAfter` date of the leaf (first) certificate in a PEM chain
pub fn certificate_expiry(cert_pem: &[u8]) -> Result<DateTime<Utc>, ProviderError> {
    let (_, pem) = parse_x509_pem(cert_pem)
        .map_err(|e| ProviderError::InvalidCertificate(format!("Failed to parse PEM: {e}")))?;

    let leaf = pem
        .parse_x509()
        .map_err(|e| ProviderError::InvalidCertificate(format!("Failed to parse certificate: {e}")))?;

    let not_after = leaf.validity().not_after.timestamp();
    DateTime::<Utc>::from_timestamp(not_after, 0).ok_or_else(|| {
        ProviderError::InvalidCertificate(format!("Certificate expiry {not_after} is out of range"))
    })
}
