//! Hook orchestration.
//!
//! [`SwiftPmPlugin`] sequences the toolchain, manifest, archive, registry and
//! git steps for the `pre-publish` and `post-publish` hooks. Every failure is
//! turned into an unsuccessful [`ExecuteResponse`] whose message names the
//! step that failed; nothing here panics or aborts the host.

use std::path::Path;

use serde_json::{Map, Value};
use swiftpub_schema::{
    ExecuteRequest, ExecuteResponse, Hook, PluginInfo, ReleaseContext, ValidateResponse,
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

use crate::archive::ArchiveBuilder;
use crate::config::PluginConfig;
use crate::error::{StepContext, StepError};
use crate::manifest;
use crate::registry::RegistryClient;
use crate::toolchain::{PackageTool, SwiftCli, swift_available};
use crate::vcs::{Git, VersionControl};

/// Identifier reported to the host.
pub const PLUGIN_NAME: &str = "swift-pm";

const PLUGIN_DESCRIPTION: &str = "Swift Package Manager registry publishing and package management";

/// Where the plugin gets its external collaborators from.
///
/// [`HostToolbox`] uses the real `swift` and `git` binaries and the process
/// environment. Tests substitute fakes.
pub trait Toolbox: Send + Sync {
    fn package_tool(&self, work_dir: &Path) -> Box<dyn PackageTool>;

    fn version_control(&self, work_dir: &Path) -> Box<dyn VersionControl>;

    fn swift_on_path(&self) -> bool;

    fn env_var(&self, key: &str) -> Option<String>;
}

/// The real toolchain, git and environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostToolbox;

impl Toolbox for HostToolbox {
    fn package_tool(&self, work_dir: &Path) -> Box<dyn PackageTool> {
        Box::new(SwiftCli::new(work_dir))
    }

    fn version_control(&self, work_dir: &Path) -> Box<dyn VersionControl> {
        Box::new(Git::new(work_dir))
    }

    fn swift_on_path(&self) -> bool {
        swift_available()
    }

    fn env_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// The Swift Package Manager release plugin.
#[derive(Debug, Default)]
pub struct SwiftPmPlugin<T = HostToolbox> {
    toolbox: T,
}

impl SwiftPmPlugin<HostToolbox> {
    pub fn new() -> Self {
        Self { toolbox: HostToolbox }
    }
}

impl<T: Toolbox> SwiftPmPlugin<T> {
    pub fn with_toolbox(toolbox: T) -> Self {
        Self { toolbox }
    }

    pub fn info(&self) -> PluginInfo {
        PluginInfo {
            name: PLUGIN_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: PLUGIN_DESCRIPTION.to_string(),
            hooks: vec![Hook::PrePublish, Hook::PostPublish],
        }
    }

    /// Check a raw configuration without running anything.
    ///
    /// Type errors and semantic problems are reported together.
    pub fn validate(&self, raw: &Map<String, Value>) -> ValidateResponse {
        let (config, mut errors) = PluginConfig::load(raw, |k| self.toolbox.env_var(k));
        errors.extend(config.problems(self.toolbox.swift_on_path()));
        ValidateResponse::from(errors)
    }

    /// Run one hook.
    pub async fn execute(
        &self,
        request: &ExecuteRequest,
        cancel: &CancellationToken,
    ) -> ExecuteResponse {
        let env = |k: &str| self.toolbox.env_var(k);
        let mut config = match PluginConfig::from_raw_with_env(&request.config, env) {
            Ok(config) => config,
            Err(e) => {
                error!(%e, "Rejected configuration");
                return ExecuteResponse::failed(e.to_string());
            }
        };
        config.dry_run |= request.dry_run;

        let ctx = &request.context;
        let span = info_span!(
            "hook",
            plugin = PLUGIN_NAME,
            hook = %request.hook,
            version = %ctx.version,
        );

        let result = async {
            match &request.hook {
                Hook::PrePublish => self.pre_publish(&config, ctx, cancel).await,
                Hook::PostPublish => self.post_publish(&config, ctx, cancel).await,
                Hook::Other(name) => Ok(ExecuteResponse::ok(format!(
                    "Hook {name} not handled by {PLUGIN_NAME} plugin"
                ))),
            }
        }
        .instrument(span)
        .await;

        result.unwrap_or_else(|e| {
            if e.source.is_cancelled() {
                warn!(step = e.step, "Hook cancelled");
            } else {
                error!(error = %e, "Hook failed");
            }
            ExecuteResponse::failed(e.to_string())
        })
    }

    async fn pre_publish(
        &self,
        cfg: &PluginConfig,
        ctx: &ReleaseContext,
        cancel: &CancellationToken,
    ) -> Result<ExecuteResponse, StepError> {
        let version = ctx.version.as_str();
        let manifest_path = cfg.manifest_file();
        let work_dir = cfg.work_dir().step("Failed to get working directory")?;
        let tool = self.toolbox.package_tool(&work_dir);

        if cfg.validate {
            info!("Validating package manifest");
            if cfg.dry_run {
                info!("[DRY-RUN] Would validate Package.swift");
            } else {
                tool.validate(cancel).await.step("Package validation failed")?;
            }
        }

        if cfg.build {
            info!("Building package");
            if cfg.dry_run {
                info!("[DRY-RUN] Would build package");
            } else {
                tool.build(Some("release"), cancel).await.step("Build failed")?;
            }
        }

        if cfg.test {
            info!("Running tests");
            if cfg.dry_run {
                info!(config = ?cfg.test_config, "[DRY-RUN] Would run tests");
            } else {
                tool.test(&cfg.test_config, cancel).await.step("Tests failed")?;
            }
        }

        if cfg.update_manifest && !cfg.version_constant.is_empty() {
            let constant = cfg.version_constant.as_str();
            info!(constant, "Updating version in Package.swift");
            if cfg.dry_run {
                info!(constant, version, "[DRY-RUN] Would update version constant");
            } else {
                manifest::update_version_constant(&manifest_path, constant, version)
                    .step("Failed to update version")?;
            }
        }

        info!("PrePublish completed successfully");
        Ok(ExecuteResponse::ok("Package validated and built successfully")
            .with_output("version", version))
    }

    async fn post_publish(
        &self,
        cfg: &PluginConfig,
        ctx: &ReleaseContext,
        cancel: &CancellationToken,
    ) -> Result<ExecuteResponse, StepError> {
        let version = ctx.version.as_str();
        let work_dir = cfg.work_dir().step("Failed to get working directory")?;

        let package = if cfg.package_name.is_empty() {
            let tool = self.toolbox.package_tool(&work_dir);
            tool.dump_package(cancel)
                .await
                .step("Failed to parse Package.swift")?
                .name
        } else {
            cfg.package_name.clone()
        };
        let scope = cfg.scope.as_str();
        let registry = cfg.registry.as_str();

        let mut response = ExecuteResponse::ok(String::new())
            .with_output("package", package.as_str())
            .with_output("version", version);
        let mut skipped = false;

        if cfg.dry_run {
            info!(exclude = ?cfg.archive.exclude, "[DRY-RUN] Would create archive");
            if !registry.is_empty() {
                info!(registry, scope, %package, version, "[DRY-RUN] Would publish to registry");
            }
        } else {
            let client = if registry.is_empty() {
                None
            } else {
                Some(
                    RegistryClient::new(registry, cfg.token.clone())
                        .step("Failed to publish to registry")?,
                )
            };

            if let Some(client) = client.as_ref().filter(|_| cfg.skip_existing) {
                skipped = client
                    .version_exists(scope, &package, version, cancel)
                    .await
                    .step("Failed to publish to registry")?;
                if skipped {
                    info!(
                        %package,
                        version,
                        "Release already in registry; skipping archive and upload"
                    );
                }
            }

            if !skipped {
                info!(%package, "Creating package archive");
                let artifact = ArchiveBuilder::new(&work_dir, version, cfg.archive.clone())
                    .build_async(cancel.clone())
                    .await
                    .step("Failed to create archive")?;
                response = response
                    .with_output("checksum", artifact.digest().as_str())
                    .with_output("archive_size", artifact.size());

                if let Some(client) = &client {
                    info!(registry, scope, %package, "Publishing to registry");
                    client
                        .publish_artifact(scope, &package, version, &artifact, cancel)
                        .await
                        .step("Failed to publish to registry")?;
                }
            }
        }
        response = response.with_output("skipped_existing", skipped);

        if cfg.create_tag {
            let tag = cfg.tag_for(version);
            info!(%tag, "Creating git tag");
            if cfg.dry_run {
                info!(%tag, "[DRY-RUN] Would create git tag");
            } else {
                self.toolbox
                    .version_control(&work_dir)
                    .create_tag(&tag, cancel)
                    .await
                    .step("Failed to create git tag")?;
            }
            response = response.with_output("tag", tag);
        }

        response.message = if cfg.dry_run {
            format!("[DRY-RUN] Would publish {package}@{version} to registry")
        } else if skipped {
            format!("{package}@{version} already published to registry")
        } else {
            format!("Published {package}@{version} to registry")
        };

        info!("PostPublish completed successfully");
        Ok(response)
    }
}
