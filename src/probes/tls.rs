//! Leaf certificate expiry lookup for the HTTP probe.
//!
//! `reqwest` does not expose the peer certificate chain of a completed
//! request, so expiry is read via a side TLS handshake against the same
//! host:port. Failure here never fails the check — it only means
//! `ssl_not_after` stays `None`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::ClientConfig;
use tokio_rustls::TlsConnector;

pub async fn leaf_cert_not_after(host: &str, port: u16, timeout: Duration) -> Option<DateTime<Utc>> {
    let fut = async {
        let mut roots = tokio_rustls::rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let connector = TlsConnector::from(Arc::new(config));

        let stream = TcpStream::connect((host, port)).await.ok()?;
        let server_name = ServerName::try_from(host.to_string()).ok()?;
        let tls_stream = connector.connect(server_name, stream).await.ok()?;
        let (_, session) = tls_stream.get_ref();
        let cert = session.peer_certificates()?.first()?.clone();
        let (_, x509) = x509_parser::parse_x509_certificate(cert.as_ref()).ok()?;
        let not_after = x509.validity().not_after.timestamp();
        Utc.timestamp_opt(not_after, 0).single()
    };

    tokio::time::timeout(timeout, fut).await.ok().flatten()
}
