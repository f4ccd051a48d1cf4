use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, fmt};

/// Centralized application configuration.
/// Combines environment variables (optionally from `.env`) and CLI arguments.
/// Built once at startup and shared read-only with every handler.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Object store `host:port`, without scheme.
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub use_ssl: bool,
    pub region: String,
    /// Public base URL; upload responses are `{base_url}/{key}`.
    pub base_url: String,
    pub upload_auth: UploadAuth,
    pub upload_path: String,
    pub files_path: String,
    /// Request body cap for uploads. `None` lifts the limit.
    pub max_upload_bytes: Option<usize>,
}

/// Whether `POST /upload` requires `Authorization: Bearer <token>`.
#[derive(Clone, PartialEq, Eq)]
pub enum UploadAuth {
    Disabled,
    Bearer(String),
}

impl UploadAuth {
    /// Check a raw `Authorization` header value against the policy.
    pub fn is_authorized(&self, header: Option<&str>) -> bool {
        match self {
            UploadAuth::Disabled => true,
            UploadAuth::Bearer(token) => header
                .and_then(|value| value.strip_prefix("Bearer "))
                .is_some_and(|presented| presented == token),
        }
    }
}

impl fmt::Debug for UploadAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadAuth::Disabled => f.write_str("Disabled"),
            UploadAuth::Bearer(_) => f.write_str("Bearer(<redacted>)"),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("endpoint", &self.endpoint)
            .field("access_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("use_ssl", &self.use_ssl)
            .field("region", &self.region)
            .field("base_url", &self.base_url)
            .field("upload_auth", &self.upload_auth)
            .field("upload_path", &self.upload_path)
            .field("files_path", &self.files_path)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "File upload gateway in front of an S3-compatible store")]
pub struct Args {
    /// Host to bind to (overrides GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port for the HTTP server (overrides GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Object store host:port (overrides MINIO_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Bucket holding uploaded files (overrides MINIO_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Public base URL used in upload responses (overrides BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3333;
const DEFAULT_ENDPOINT: &str = "localhost:3334";
const DEFAULT_BUCKET: &str = "files";
const DEFAULT_REGION: &str = "us-east-1";

impl AppConfig {
    /// Load `.env`, parse CLI args and merge them with the process environment.
    pub fn from_env_and_args() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
            Err(err) if err.not_found() => tracing::debug!("No .env file found"),
            Err(err) => tracing::warn!("Failed to load .env file: {}", err),
        }

        let args = Args::parse();
        Self::from_lookup(args, |name| env::var(name).ok())
    }

    /// Merge CLI args with variables resolved through `lookup`.
    /// Empty variables count as unset.
    pub fn from_lookup<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let required = |name: &str| var(name).with_context(|| format!("{} must be set", name));

        // --- Environment fallback ---
        let env_port = match var("GATEWAY_PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing GATEWAY_PORT value `{}`", value))?,
            None => DEFAULT_PORT,
        };
        let use_ssl = parse_flag(var("MINIO_USE_SSL"), "MINIO_USE_SSL", false)?;
        let require_auth = parse_flag(var("REQUIRE_UPLOAD_AUTH"), "REQUIRE_UPLOAD_AUTH", true)?;
        let max_upload_bytes = var("MAX_UPLOAD_BYTES")
            .map(|value| {
                value
                    .parse::<usize>()
                    .with_context(|| format!("parsing MAX_UPLOAD_BYTES value `{}`", value))
            })
            .transpose()?;

        let upload_auth = if require_auth {
            let token = var("UPLOAD_TOKEN")
                .context("UPLOAD_TOKEN must be set when REQUIRE_UPLOAD_AUTH is enabled")?;
            UploadAuth::Bearer(token)
        } else {
            UploadAuth::Disabled
        };

        let base_url = match args.base_url {
            Some(url) => url,
            None => required("BASE_URL")?,
        };

        // --- Merge ---
        let cfg = Self {
            host: args
                .host
                .or_else(|| var("GATEWAY_HOST"))
                .unwrap_or_else(|| DEFAULT_HOST.into()),
            port: args.port.unwrap_or(env_port),
            endpoint: args
                .endpoint
                .or_else(|| var("MINIO_ENDPOINT"))
                .unwrap_or_else(|| DEFAULT_ENDPOINT.into()),
            access_key: required("MINIO_ACCESS_KEY")?,
            secret_key: required("MINIO_SECRET_KEY")?,
            bucket: args
                .bucket
                .or_else(|| var("MINIO_BUCKET"))
                .unwrap_or_else(|| DEFAULT_BUCKET.into()),
            use_ssl,
            region: var("MINIO_REGION").unwrap_or_else(|| DEFAULT_REGION.into()),
            base_url: base_url.trim_end_matches('/').to_string(),
            upload_auth,
            upload_path: var("UPLOAD_PATH").unwrap_or_else(|| "/upload".into()),
            files_path: var("FILES_PATH")
                .map(|path| path.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "/files".into()),
            max_upload_bytes,
        };

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if !self.upload_path.starts_with('/') {
            bail!("UPLOAD_PATH `{}` must start with `/`", self.upload_path);
        }
        if !self.files_path.starts_with('/') || self.files_path.len() < 2 {
            bail!(
                "FILES_PATH `{}` must start with `/` and name a prefix",
                self.files_path
            );
        }
        if self.endpoint.contains("://") {
            bail!(
                "MINIO_ENDPOINT `{}` must be host:port without a scheme; use MINIO_USE_SSL for TLS",
                self.endpoint
            );
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Endpoint URL handed to the S3 client.
    pub fn endpoint_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}", scheme, self.endpoint)
    }
}

fn parse_flag(value: Option<String>, name: &str, default: bool) -> Result<bool> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("{} must be a boolean, got `{}`", name, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    const MINIMAL: &[(&str, &str)] = &[
        ("MINIO_ACCESS_KEY", "minio"),
        ("MINIO_SECRET_KEY", "minio-secret"),
        ("BASE_URL", "https://files.example.com/"),
        ("UPLOAD_TOKEN", "s3cret"),
    ];

    #[test]
    fn defaults_fill_unset_values() {
        let cfg = AppConfig::from_lookup(Args::default(), lookup_from(MINIMAL)).unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:3333");
        assert_eq!(cfg.endpoint_url(), "http://localhost:3334");
        assert_eq!(cfg.bucket, "files");
        assert_eq!(cfg.base_url, "https://files.example.com");
        assert_eq!(cfg.upload_auth, UploadAuth::Bearer("s3cret".into()));
        assert_eq!(cfg.upload_path, "/upload");
        assert_eq!(cfg.files_path, "/files");
        assert_eq!(cfg.max_upload_bytes, None);
    }

    #[test]
    fn cli_args_override_environment() {
        let mut vars = MINIMAL.to_vec();
        vars.push(("GATEWAY_PORT", "8080"));
        vars.push(("MINIO_BUCKET", "env-bucket"));
        let args = Args {
            port: Some(9000),
            bucket: Some("cli-bucket".into()),
            ..Args::default()
        };
        let cfg = AppConfig::from_lookup(args, lookup_from(&vars)).unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.bucket, "cli-bucket");
    }

    #[test]
    fn ssl_flag_switches_scheme() {
        let mut vars = MINIMAL.to_vec();
        vars.push(("MINIO_USE_SSL", "true"));
        vars.push(("MINIO_ENDPOINT", "minio.internal:9000"));
        let cfg = AppConfig::from_lookup(Args::default(), lookup_from(&vars)).unwrap();
        assert_eq!(cfg.endpoint_url(), "https://minio.internal:9000");
    }

    #[test]
    fn auth_can_be_disabled_without_token() {
        let vars = [
            ("MINIO_ACCESS_KEY", "minio"),
            ("MINIO_SECRET_KEY", "minio-secret"),
            ("BASE_URL", "http://localhost:3333/files"),
            ("REQUIRE_UPLOAD_AUTH", "false"),
        ];
        let cfg = AppConfig::from_lookup(Args::default(), lookup_from(&vars)).unwrap();
        assert_eq!(cfg.upload_auth, UploadAuth::Disabled);
    }

    #[test]
    fn missing_token_with_auth_required_is_an_error() {
        let vars: Vec<_> = MINIMAL
            .iter()
            .copied()
            .filter(|(k, _)| *k != "UPLOAD_TOKEN")
            .collect();
        let err = AppConfig::from_lookup(Args::default(), lookup_from(&vars)).unwrap_err();
        assert!(err.to_string().contains("UPLOAD_TOKEN"));
    }

    #[test]
    fn missing_credentials_are_an_error() {
        let vars = [("BASE_URL", "http://x"), ("UPLOAD_TOKEN", "t")];
        let err = AppConfig::from_lookup(Args::default(), lookup_from(&vars)).unwrap_err();
        assert!(err.to_string().contains("MINIO_ACCESS_KEY"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        for (name, value) in [
            ("GATEWAY_PORT", "http"),
            ("MINIO_USE_SSL", "maybe"),
            ("MAX_UPLOAD_BYTES", "-1"),
            ("UPLOAD_PATH", "upload"),
            ("MINIO_ENDPOINT", "http://localhost:3334"),
        ] {
            let mut vars = MINIMAL.to_vec();
            vars.push((name, value));
            assert!(
                AppConfig::from_lookup(Args::default(), lookup_from(&vars)).is_err(),
                "{name}={value} should be rejected"
            );
        }
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let cfg = AppConfig::from_lookup(Args::default(), lookup_from(MINIMAL)).unwrap();
        let rendered = format!("{:?}", cfg);
        assert!(!rendered.contains("minio-secret"));
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn bearer_policy_checks_exact_token() {
        let auth = UploadAuth::Bearer("s3cret".into());
        assert!(auth.is_authorized(Some("Bearer s3cret")));
        assert!(!auth.is_authorized(Some("Bearer wrong")));
        assert!(!auth.is_authorized(Some("s3cret")));
        assert!(!auth.is_authorized(Some("bearer s3cret")));
        assert!(!auth.is_authorized(None));
        assert!(UploadAuth::Disabled.is_authorized(None));
    }
}
