use super::VaultArgs;
use crate::context::Context;
use crate::secrets::{SecretReader, StaticSecretReader, VaultSecretReader};
use crate::template::{TemplateRenderer, delimiters, materialize};
use crate::vault::config::{DEFAULT_AUTH_MOUNT, DEFAULT_JWT_PATH};
use anyhow::{Context as AnyhowContext, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

/// Render a template, fetching the secrets it references
#[derive(Debug, Args)]
pub struct TemplateCommand {
    /// Template to render
    #[arg(long)]
    template_file: PathBuf,

    /// Where to write the rendered template (defaults to stdout)
    #[arg(long)]
    output_file: Option<PathBuf>,

    /// Where to write the record of consumed secrets (.json, .yaml or .yml)
    #[arg(long)]
    secrets_output_file: Option<PathBuf>,

    /// Kubernetes auth role to log in with instead of using a token
    #[arg(long)]
    role: Option<String>,

    /// Mount path of the Kubernetes auth method
    #[arg(long, default_value = DEFAULT_AUTH_MOUNT)]
    auth_mount: String,

    /// Service account token used for Kubernetes login
    #[arg(long, default_value = DEFAULT_JWT_PATH)]
    jwt_file: PathBuf,

    /// Serve secret NAME from JSON instead of Vault, e.g. user='{"value":"alice"}'
    #[arg(long = "var", value_name = "NAME=JSON", value_parser = parse_var)]
    vars: Vec<(String, String)>,
}

impl TemplateCommand {
    /// Execute the template command
    pub fn execute(self, ctx: &Context, vault: &VaultArgs) -> Result<()> {
        let bytes = ctx.fs.read(&self.template_file).with_context(|| {
            format!(
                "Failed to read template file: {}",
                self.template_file.display()
            )
        })?;
        let source = delimiters::decode(&bytes).with_context(|| {
            format!(
                "Failed to parse template: {}",
                self.template_file.display()
            )
        })?;

        let reader = self.secret_reader(ctx, vault)?;
        let renderer = TemplateRenderer::new(reader, Arc::clone(&ctx.output));

        let mut rendered = Vec::new();
        let record = renderer.render(source, &mut rendered).with_context(|| {
            format!(
                "Failed to render template: {}",
                self.template_file.display()
            )
        })?;

        materialize(ctx.fs.as_ref(), &rendered, self.output_file.as_deref())?;
        if let Some(path) = &self.output_file {
            ctx.output.key_value("Output", &path.display().to_string());
        }

        if let Some(path) = &self.secrets_output_file {
            record.write_to(ctx.fs.as_ref(), path)?;
            ctx.output
                .key_value("Secrets record", &path.display().to_string());
        }

        ctx.output
            .key_value("Secrets", &record.len().to_string());
        ctx.output
            .key_value("Leases", &record.leased_count().to_string());
        ctx.output.success("OK");

        Ok(())
    }

    /// Static overrides when any `--var` was given, Vault otherwise
    fn secret_reader(&self, ctx: &Context, vault: &VaultArgs) -> Result<Arc<dyn SecretReader>> {
        if !self.vars.is_empty() {
            ctx.output.debug(&format!(
                "Using {} static override(s) instead of Vault",
                self.vars.len()
            ));
            let reader = StaticSecretReader::from_overrides(
                self.vars
                    .iter()
                    .map(|(name, json)| (name.as_str(), json.as_str())),
            )?;
            return Ok(Arc::new(reader));
        }

        let mut config = vault
            .to_config()?
            .with_auth_mount(self.auth_mount.as_str())
            .with_jwt_path(&self.jwt_file);
        if let Some(role) = &self.role {
            config = config.with_role(role.as_str());
        }

        ctx.output
            .debug(&format!("Connecting to Vault at {}", config.address));
        let reader = VaultSecretReader::connect(config, ctx.fs.as_ref(), Arc::clone(&ctx.output))
            .context("Failed to authenticate to Vault")?;
        Ok(Arc::new(reader))
    }
}

/// Parse a `NAME=JSON` override, splitting at the first `=`
fn parse_var(value: &str) -> Result<(String, String), String> {
    let (name, json) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=JSON, got '{}'", value))?;
    if name.is_empty() {
        return Err(format!("missing secret name in '{}'", value));
    }
    Ok((name.to_string(), json.to_string()))
}
