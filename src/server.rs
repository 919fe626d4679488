//! Web server

use crate::cli;

use std::{
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    process::exit,
    time::Duration,
};

use axum::ServiceExt;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use expanduser::expanduser;
use tokio::signal;

/// Address to listen on. The host must be an IP address; IPv6 hosts need no brackets.
fn socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let ip: IpAddr = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse()
        .map_err(|_| format!("invalid listen address '{}'", host))?;
    Ok(SocketAddr::new(ip, port))
}

/// Expand `~` in a TLS file path and check that the file exists.
fn tls_file(path: &str, what: &str) -> Result<PathBuf, String> {
    let expanded = expanduser(path)
        .map_err(|_| format!("failed to expand ~ in {} path '{}'", what, path))?;
    if !expanded.exists() {
        return Err(format!(
            "TLS {} file expected at '{}' but not found",
            what,
            expanded.display()
        ));
    }
    expanded
        .canonicalize()
        .map_err(|e| format!("failed to resolve TLS {} file '{}': {}", what, path, e))
}

async fn tls_config(cert_file: &Path, key_file: &Path) -> RustlsConfig {
    match RustlsConfig::from_pem_file(cert_file, key_file).await {
        Ok(config) => config,
        Err(error) => {
            tracing::error!("failed to load TLS certificate files: {}", error);
            exit(1)
        }
    }
}

/// Serve the Pastizales API until a shutdown signal arrives.
///
/// Configuration errors are logged and end the process with a non-zero status.
///
/// # Arguments
///
/// * `args`: Command line arguments
/// * `service`: The [crate::app::Service] to serve
pub async fn serve(args: &cli::CommandLineArgs, service: crate::app::Service) {
    let addr = socket_addr(&args.host, args.port).unwrap_or_else(|message| {
        tracing::error!("{}", message);
        exit(1)
    });

    let handle = Handle::new();
    tokio::spawn(shutdown_signal(
        handle.clone(),
        Duration::from_secs(args.graceful_shutdown_timeout),
    ));

    let result = if args.https {
        let (cert_file, key_file) = match (
            tls_file(&args.cert_file, "certificate"),
            tls_file(&args.key_file, "key"),
        ) {
            (Ok(cert_file), Ok(key_file)) => (cert_file, key_file),
            (Err(message), _) | (_, Err(message)) => {
                tracing::error!("{}", message);
                exit(1)
            }
        };
        let config = tls_config(&cert_file, &key_file).await;
        tracing::info!("listening at https://{}/api", addr);
        axum_server::bind_rustls(addr, config)
            .handle(handle)
            .serve(service.into_make_service())
            .await
    } else {
        tracing::info!("listening at http://{}/api", addr);
        axum_server::bind(addr)
            .handle(handle)
            .serve(service.into_make_service())
            .await
    };
    match result {
        Ok(()) => tracing::info!("server stopped"),
        Err(error) => {
            tracing::error!("server failed: {}", error);
            exit(1)
        }
    }
}

/// Wait for Ctrl-C or SIGTERM, then stop accepting connections and give in-flight upstream
/// calls up to `timeout` to finish.
async fn shutdown_signal(handle: Handle, timeout: Duration) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl+C: {}", error);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::warn!("failed to listen for SIGTERM: {}", error);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!(
        "signal received, shutting down within {}s",
        timeout.as_secs()
    );
    handle.graceful_shutdown(Some(timeout));
}
