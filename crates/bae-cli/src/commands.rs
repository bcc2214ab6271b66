//! Subcommand implementations
//!
//! Each command writes its report to `out`; errors propagate to `main`.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use bae_auth::config::BridgeConfig;
use bae_auth::discovery::DiscoveryFetcher;
use bae_auth::{
    AuthResult, CompletedLogin, ContextTag, LoginCompletion, ProviderRegistry, Strategy,
    StrategyFactory,
};
use bae_jwt::{JwtSigner, SignOptions};
use serde_json::Value;
use tracing::debug;

use crate::cli::{Command, SignArgs};

/// Load `path`, or only the `BAE_` environment when no file was given
pub fn load_config(path: Option<&Path>) -> Result<BridgeConfig> {
    match path {
        Some(path) => BridgeConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => BridgeConfig::from_env().context("loading configuration from the environment"),
    }
}

/// Run `command` against `config`
pub async fn execute(
    command: Command,
    config: &BridgeConfig,
    has_config_file: bool,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::Discover { uri } => discover(config, &uri, out).await,
        _ if !has_config_file => {
            bail!("no configuration file given (use --config or BAE_CONFIG)")
        }
        Command::Check => check(config, out).await,
        Command::Sign(args) => sign(config, &args, out),
        Command::Authorize { provider } => authorize(config, &provider, out).await,
    }
}

/// Completion handler for commands that never handle a callback
fn discard_completion() -> Arc<dyn LoginCompletion> {
    Arc::new(|_outcome: AuthResult<CompletedLogin>, _tag: ContextTag| async {})
}

fn signer(config: &BridgeConfig) -> Result<Option<Arc<JwtSigner>>> {
    config
        .siop
        .as_ref()
        .map(|siop| JwtSigner::new(siop).map(Arc::new))
        .transpose()
        .context("loading the SIOP signing key")
}

async fn check(config: &BridgeConfig, out: &mut impl Write) -> Result<()> {
    let signer = signer(config)?;
    match &signer {
        Some(signer) => writeln!(
            out,
            "siop      {} ({}), kid={}",
            signer.algorithm(),
            signer.key_family(),
            signer.key_id().unwrap_or("-")
        )?,
        None => writeln!(out, "siop      not configured")?,
    }

    let fetcher = DiscoveryFetcher::with_config(config.discovery.fetcher_config())?;
    let registry =
        ProviderRegistry::build(config, Arc::new(fetcher), signer, discard_completion()).await;

    for name in registry.names().await {
        let strategy = registry.get(&name).await?;
        writeln!(
            out,
            "ok        {}  {}",
            name,
            strategy.metadata().authorization_endpoint
        )?;
    }
    for (name, reason) in registry.failures() {
        writeln!(out, "FAIL      {}  {}", name, reason)?;
    }

    let failed = registry.failures().len();
    if failed > 0 {
        bail!("{} of {} providers unavailable", failed, config.providers.len());
    }
    Ok(())
}

fn sign(config: &BridgeConfig, args: &SignArgs, out: &mut impl Write) -> Result<()> {
    let signer = signer(config)?.ok_or_else(|| anyhow!("no [siop] section in the configuration"))?;

    let claims: Value = serde_json::from_str(&args.claims).context("parsing --claims")?;

    let mut options = SignOptions::new(args.algorithm.unwrap_or_else(|| signer.algorithm()));
    if let Some(lifetime) = &args.expires_in {
        options = options.expires_in_str(lifetime)?;
    }
    if let Some(kid) = &args.key_id {
        options = options.with_key_id(kid.clone());
    }

    let token = signer.sign_jwt(&claims, &options)?;
    writeln!(out, "{}", token)?;
    Ok(())
}

async fn discover(config: &BridgeConfig, uri: &str, out: &mut impl Write) -> Result<()> {
    let fetcher = DiscoveryFetcher::with_config(config.discovery.fetcher_config())?;
    let document = fetcher.fetch(uri).await?;
    debug!(uri, "Discovery document validated");

    serde_json::to_writer_pretty(&mut *out, &document)?;
    writeln!(out)?;
    Ok(())
}

async fn authorize(config: &BridgeConfig, provider: &str, out: &mut impl Write) -> Result<()> {
    let provider_config = config
        .provider(provider)
        .ok_or_else(|| anyhow!("provider '{}' is not configured", provider))?
        .clone();

    let mut factory = StrategyFactory::new(
        provider_config,
        Arc::new(DiscoveryFetcher::with_config(config.discovery.fetcher_config())?),
    )
    .with_name(provider)
    .with_fallback_role(config.fallback_role.clone())
    .with_request_timeout(config.discovery.request_timeout());
    if let Some(signer) = signer(config)? {
        factory = factory.with_signer(signer);
    }

    let strategy = factory.build(discard_completion()).await?;
    let request = strategy.begin()?;

    writeln!(out, "{}", request.url)?;
    serde_json::to_writer_pretty(&mut *out, &request.pending)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SignArgs;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io::Write as _;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_KEY_HEX: &str = "c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721";

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    async fn mock_idp() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": server.uri(),
                "authorization_endpoint": format!("{}/authorize", server.uri()),
                "token_endpoint": format!("{}/token", server.uri()),
            })))
            .mount(&server)
            .await;
        server
    }

    fn sign_args(claims: &str) -> SignArgs {
        SignArgs {
            claims: claims.to_string(),
            expires_in: Some("1h".to_string()),
            algorithm: None,
            key_id: Some("kid-1".to_string()),
        }
    }

    #[test]
    fn test_sign_prints_token() {
        let file = config_file(&format!("[siop]\nprivate_key = \"{}\"\n", TEST_KEY_HEX));
        let config = load_config(Some(file.path())).unwrap();
        let mut out = Vec::new();

        sign(&config, &sign_args(r#"{"sub":"user123","iss":"test"}"#), &mut out).unwrap();

        let token = String::from_utf8(out).unwrap();
        assert_eq!(token.trim().split('.').count(), 3);
    }

    #[test]
    fn test_sign_requires_siop_and_object_claims() {
        let config = BridgeConfig::default();
        assert!(sign(&config, &sign_args("{}"), &mut Vec::new()).is_err());

        let file = config_file(&format!("[siop]\nprivate_key = \"{}\"\n", TEST_KEY_HEX));
        let config = load_config(Some(file.path())).unwrap();
        assert!(sign(&config, &sign_args("not json"), &mut Vec::new()).is_err());
        assert!(sign(&config, &sign_args("[1, 2]"), &mut Vec::new()).is_err());
    }

    #[tokio::test]
    async fn test_discover_prints_document() {
        let server = mock_idp().await;
        let mut out = Vec::new();

        discover(&BridgeConfig::default(), &server.uri(), &mut out)
            .await
            .unwrap();

        let printed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(
            printed["token_endpoint"],
            json!(format!("{}/token", server.uri()))
        );
    }

    #[tokio::test]
    async fn test_check_reports_failures() {
        let healthy = mock_idp().await;
        let file = config_file(&format!(
            r#"
[providers.healthy]
client_id = "bae"
client_secret = "secret"
callback_url = "http://market.com/callback"
server = "{}"

[providers.broken]
client_id = "bae"
client_secret = "secret"
callback_url = "http://market.com/callback"
server = "http://127.0.0.1:9"
"#,
            healthy.uri()
        ));
        let config = load_config(Some(file.path())).unwrap();
        let mut out = Vec::new();

        let result = check(&config, &mut out).await;

        assert!(result.is_err());
        let report = String::from_utf8(out).unwrap();
        assert!(report.contains("siop      not configured"));
        assert!(report.contains("ok        healthy"));
        assert!(report.contains("FAIL      broken"));
    }

    #[tokio::test]
    async fn test_authorize_prints_redirect() {
        let server = mock_idp().await;
        let file = config_file(&format!(
            r#"
[providers.keycloak]
client_id = "bae"
client_secret = "secret"
callback_url = "http://market.com/callback"
server = "{}"
"#,
            server.uri()
        ));
        let config = load_config(Some(file.path())).unwrap();
        let mut out = Vec::new();

        authorize(&config, "keycloak", &mut out).await.unwrap();

        let printed = String::from_utf8(out).unwrap();
        let first_line = printed.lines().next().unwrap();
        assert!(first_line.starts_with(&format!("{}/authorize?", server.uri())));
        assert!(printed.contains("\"state\""));

        assert!(authorize(&config, "missing", &mut Vec::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_check_reports_loaded_siop_key() {
        // GIVEN: a SIOP key and a provider that needs it for signed request objects
        let server = mock_idp().await;
        let file = config_file(&format!(
            r#"
[siop]
private_key = "{}"
key_id = "siop-1"

[providers.keycloak]
client_id = "bae"
client_secret = "secret"
callback_url = "http://market.com/callback"
server = "{}"
signed_request_object = true
"#,
            TEST_KEY_HEX,
            server.uri()
        ));
        let config = load_config(Some(file.path())).unwrap();
        let mut out = Vec::new();

        // WHEN: checking the configuration
        check(&config, &mut out).await.unwrap();

        // THEN: the one loaded key is reported and the provider builds with it
        let report = String::from_utf8(out).unwrap();
        assert!(report.contains("siop      ES256"));
        assert!(report.contains("kid=siop-1"));
        assert!(report.contains("ok        keycloak"));
    }

    #[tokio::test]
    async fn test_commands_other_than_discover_need_a_file() {
        let result = execute(
            Command::Check,
            &BridgeConfig::default(),
            false,
            &mut Vec::new(),
        )
        .await;
        assert!(result.is_err());
    }
}
