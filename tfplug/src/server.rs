//! Server module for running Terraform providers
//!
//! Performs the go-plugin handshake: verifies the magic cookie, binds a
//! loopback listener, sets up AutoMTLS when Terraform offers a client
//! certificate and prints the handshake line on stdout.

use crate::context::Context;
use crate::error::{Result, TfplugError};
use crate::grpc::GrpcProviderServer;
use crate::proto::plugin::grpc_controller_server::{GrpcController, GrpcControllerServer};
use crate::proto::plugin::Empty;
use crate::proto::ProviderServer;
use crate::provider::Provider;
use base64::Engine;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::Notify;
use tonic::transport::{Certificate, Identity, Server, ServerTlsConfig};

pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";

const CORE_PROTOCOL_VERSION: u32 = 1;
const PROTOCOL_VERSION: u32 = 6;

/// Server configuration for running a Terraform provider
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum message size in bytes
    pub max_message_size: usize,
    /// Skip the magic cookie check, used when running under a debugger
    pub skip_cookie_check: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_message_size: 256 << 20, // 256MB
            skip_cookie_check: false,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    pub fn without_cookie_check(mut self) -> Self {
        self.skip_cookie_check = true;
        self
    }
}

/// go-plugin's controller service; Terraform calls Shutdown when done
struct Controller {
    shutdown: Arc<Notify>,
}

#[tonic::async_trait]
impl GrpcController for Controller {
    async fn shutdown(
        &self,
        _request: tonic::Request<Empty>,
    ) -> std::result::Result<tonic::Response<Empty>, tonic::Status> {
        tracing::debug!("GRPCController.Shutdown received");
        self.shutdown.notify_one();
        Ok(tonic::Response::new(Empty {}))
    }
}

pub(crate) fn check_magic_cookie(value: Option<&str>) -> Result<()> {
    match value {
        Some(v) if v == MAGIC_COOKIE_VALUE => Ok(()),
        _ => Err(TfplugError::HandshakeError(
            "This binary is a plugin. These are not meant to be executed directly. \
             Please execute the program that consumes these plugins, which will \
             load any plugins automatically"
                .to_string(),
        )),
    }
}

struct AutoMtls {
    tls_config: ServerTlsConfig,
    /// Server certificate DER, base64 without padding, for the handshake line
    encoded_cert: String,
}

fn auto_mtls(client_cert_pem: &str) -> Result<AutoMtls> {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .map_err(|e| TfplugError::TlsError(format!("Failed to generate certificate: {}", e)))?;

    let encoded_cert = base64::engine::general_purpose::STANDARD_NO_PAD.encode(certified.cert.der());
    let identity = Identity::from_pem(certified.cert.pem(), certified.key_pair.serialize_pem());
    let tls_config = ServerTlsConfig::new()
        .identity(identity)
        .client_ca_root(Certificate::from_pem(client_cert_pem));

    Ok(AutoMtls {
        tls_config,
        encoded_cert,
    })
}

pub(crate) fn handshake_line(addr: &std::net::SocketAddr, encoded_cert: Option<&str>) -> String {
    let mut line = format!(
        "{}|{}|tcp|{}|grpc",
        CORE_PROTOCOL_VERSION, PROTOCOL_VERSION, addr
    );
    if let Some(cert) = encoded_cert {
        line.push('|');
        line.push_str(cert);
    }
    line
}

/// Main entry point for running a provider
pub async fn serve<P: Provider + 'static>(provider: P, config: ServerConfig) -> Result<()> {
    if !config.skip_cookie_check {
        check_magic_cookie(std::env::var(MAGIC_COOKIE_KEY).ok().as_deref())?;
    }

    let root = Context::new();
    let grpc_server = GrpcProviderServer::with_context(provider, root.clone());
    let provider_service = ProviderServer::new(grpc_server)
        .max_decoding_message_size(config.max_message_size)
        .max_encoding_message_size(config.max_message_size);

    let shutdown = Arc::new(Notify::new());
    let controller = GrpcControllerServer::new(Controller {
        shutdown: shutdown.clone(),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let actual_addr = listener.local_addr()?;

    let mut builder = Server::builder();
    let mtls = match std::env::var("PLUGIN_CLIENT_CERT") {
        Ok(client_cert) if !client_cert.is_empty() => {
            let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
            Some(auto_mtls(&client_cert)?)
        }
        _ => {
            tracing::warn!("PLUGIN_CLIENT_CERT not set, serving without TLS");
            None
        }
    };
    let encoded_cert = mtls.as_ref().map(|m| m.encoded_cert.clone());
    if let Some(mtls) = mtls {
        builder = builder
            .tls_config(mtls.tls_config)
            .map_err(|e| TfplugError::TlsError(e.to_string()))?;
    }

    let line = handshake_line(&actual_addr, encoded_cert.as_deref());
    {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", line)?;
        stdout.flush()?;
    }
    tracing::info!("provider listening on {}", actual_addr);

    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
    builder
        .add_service(provider_service)
        .add_service(controller)
        .serve_with_incoming_shutdown(incoming, async move {
            shutdown.notified().await;
            root.cancel();
        })
        .await?;

    tracing::info!("provider server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_cookie_must_match() {
        assert!(check_magic_cookie(Some(MAGIC_COOKIE_VALUE)).is_ok());
        assert!(matches!(
            check_magic_cookie(Some("nope")),
            Err(TfplugError::HandshakeError(_))
        ));
        assert!(check_magic_cookie(None).is_err());
    }

    #[test]
    fn handshake_line_without_tls() {
        let addr: std::net::SocketAddr = "127.0.0.1:4242".parse().unwrap();
        assert_eq!(handshake_line(&addr, None), "1|6|tcp|127.0.0.1:4242|grpc");
    }

    #[test]
    fn handshake_line_carries_certificate() {
        let addr: std::net::SocketAddr = "127.0.0.1:4242".parse().unwrap();
        let line = handshake_line(&addr, Some("MIIB"));
        assert_eq!(line, "1|6|tcp|127.0.0.1:4242|grpc|MIIB");
    }

    #[test]
    fn auto_mtls_cert_is_unpadded_base64() {
        let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let pem = certified.cert.pem();

        let mtls = auto_mtls(&pem).unwrap();

        assert!(!mtls.encoded_cert.ends_with('='));
        let der = base64::engine::general_purpose::STANDARD_NO_PAD
            .decode(&mtls.encoded_cert)
            .unwrap();
        assert!(!der.is_empty());
    }

    #[tokio::test]
    async fn controller_shutdown_notifies() {
        let shutdown = Arc::new(Notify::new());
        let controller = Controller {
            shutdown: shutdown.clone(),
        };

        controller
            .shutdown(tonic::Request::new(Empty {}))
            .await
            .unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(1), shutdown.notified())
            .await
            .unwrap();
    }
}
