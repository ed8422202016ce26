/* src/setup/cert.rs */

use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::extension::{BasicConstraints, SubjectAlternativeName};
use openssl::x509::{X509, X509Builder, X509NameBuilder};
use std::error::Error;
use std::fs;

const VALID_DAYS: u32 = 365;

// Self-signed certificate the device presents to config clients.
pub fn generate_certificate(
    cert_path: &str,
    key_path: &str,
    ip_address: &str,
) -> Result<(), Box<dyn Error>> {
    let rsa = Rsa::generate(2048)?;
    let pkey = PKey::from_rsa(rsa)?;
    let cert = build_certificate(&pkey, ip_address)?;

    fs::write(cert_path, cert.to_pem()?)?;
    fs::write(key_path, pkey.private_key_to_pem_pkcs8()?)?;
    Ok(())
}

fn build_certificate(
    pkey: &PKey<openssl::pkey::Private>,
    ip_address: &str,
) -> Result<X509, Box<dyn Error>> {
    let mut name = X509NameBuilder::new()?;
    name.append_entry_by_text("O", "devdrop")?;
    name.append_entry_by_text("CN", "localhost")?;
    let name = name.build();

    let mut builder = X509Builder::new()?;
    builder.set_version(2)?;
    builder.set_subject_name(&name)?;
    builder.set_issuer_name(&name)?;
    builder.set_pubkey(pkey)?;
    let not_before = Asn1Time::days_from_now(0)?;
    let not_after = Asn1Time::days_from_now(VALID_DAYS)?;
    builder.set_not_before(&not_before)?;
    builder.set_not_after(&not_after)?;

    let mut serial = BigNum::new()?;
    serial.rand(159, MsbOption::MAYBE_ZERO, false)?;
    let serial = serial.to_asn1_integer()?;
    builder.set_serial_number(&serial)?;

    builder.append_extension(BasicConstraints::new().critical().build()?)?;

    // The device is reached by IP, so the selected address goes into the SAN.
    let san = SubjectAlternativeName::new()
        .dns("localhost")
        .ip("127.0.0.1")
        .ip("::1")
        .ip(ip_address)
        .build(&builder.x509v3_context(None, None))?;
    builder.append_extension(san)?;

    builder.sign(pkey, MessageDigest::sha256())?;
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_pem_pair_with_selected_ip() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.crt");
        let key = dir.path().join("cert.key");

        generate_certificate(cert.to_str().unwrap(), key.to_str().unwrap(), "10.1.2.3").unwrap();

        let pem = fs::read(&cert).unwrap();
        let parsed = X509::from_pem(&pem).unwrap();
        let ips: Vec<Vec<u8>> = parsed
            .subject_alt_names()
            .unwrap()
            .iter()
            .filter_map(|n| n.ipaddress().map(|ip| ip.to_vec()))
            .collect();
        assert!(ips.contains(&vec![10, 1, 2, 3]));
        assert!(fs::read_to_string(&key).unwrap().contains("PRIVATE KEY"));
    }
}
