//! # dms-schema Subcommands
//!
//! Each subcommand builds what it needs from [`StartupConfig`] and returns
//! a process exit code.
//!
//! ## Usage
//!
//! ```bash
//! # Run the full startup sequence against the bundled sample schema:
//! dms-schema startup
//!
//! # Same, against a directory of ApiSchema*.json files:
//! dms-schema --schema-path ./schemas startup --json
//!
//! # Inspect derived artifacts:
//! dms-schema hash --manifest
//! dms-schema seeds
//! dms-schema load-order
//! dms-schema validate
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use dms_pipeline::{
    ApiSchemaInputNormalizer, ApiSchemaProvider, CompiledSchemaCache, DependencyCalculator,
    EffectiveApiSchemaProvider, EffectiveSchemaHasher, EffectiveSchemaInfo, NoopSchemaCache,
    ProviderError, ResourceKeySeedProvider, ValidatorCache,
};
use dms_schema::{ApiSchemaDocumentNodes, ApiSchemaFailure};

use crate::backend::FingerprintFileStore;
use crate::config::StartupConfig;
use crate::orchestrator::{CancellationSignal, StartupError, StartupOrchestrator};
use crate::tasks::{BackendMappingInitializationTask, LoadAndBuildEffectiveSchemaTask};

/// Arguments for `dms-schema startup`.
#[derive(Args, Debug)]
pub struct StartupArgs {
    /// Print the effective schema fingerprint as JSON on success.
    #[arg(long)]
    pub json: bool,

    /// Build the effective schema without touching the fingerprint file.
    #[arg(long)]
    pub skip_backend: bool,
}

/// Arguments for `dms-schema hash`.
#[derive(Args, Debug)]
pub struct HashArgs {
    /// Print the manifest the hash is computed over.
    #[arg(long)]
    pub manifest: bool,
}

/// Arguments for `dms-schema seeds`.
#[derive(Args, Debug)]
pub struct SeedsArgs {
    /// Print seeds as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `dms-schema load-order`.
#[derive(Args, Debug)]
pub struct LoadOrderArgs {
    /// Print as a table instead of JSON.
    #[arg(long)]
    pub table: bool,
}

/// Arguments for `dms-schema validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Print failures as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Providers wired the way a serving process wires them.
pub struct Runtime {
    pub api_schema: Arc<ApiSchemaProvider>,
    pub effective: Arc<EffectiveApiSchemaProvider>,
}

impl Runtime {
    pub fn build(config: &StartupConfig, cache: Arc<dyn CompiledSchemaCache>) -> Self {
        let effective = Arc::new(EffectiveApiSchemaProvider::new(cache));
        let api_schema = Arc::new(ApiSchemaProvider::new(
            config.schema_source(),
            Arc::clone(&effective),
            config.allow_schema_reload,
        ));
        Self {
            api_schema,
            effective,
        }
    }

    /// The startup sequence over these providers.
    pub fn orchestrator(&self, config: &StartupConfig, with_backend: bool) -> StartupOrchestrator {
        let mut tasks: Vec<Box<dyn crate::orchestrator::StartupTask>> =
            vec![Box::new(LoadAndBuildEffectiveSchemaTask::new(Arc::clone(&self.api_schema)))];
        if with_backend {
            tasks.push(Box::new(BackendMappingInitializationTask::new(
                Arc::clone(&self.effective),
                Box::new(FingerprintFileStore::new(&config.fingerprint_path)),
            )));
        }
        StartupOrchestrator::new(tasks)
    }
}

/// Execute `dms-schema startup`.
pub fn run_startup(args: &StartupArgs, config: &StartupConfig, cancel: &CancellationSignal) -> Result<u8> {
    let runtime = Runtime::build(config, Arc::new(ValidatorCache::new()));
    let mut orchestrator = runtime.orchestrator(config, !args.skip_backend);

    match orchestrator.run(cancel) {
        Ok(()) => {}
        Err(StartupError::Cancelled { next_task }) => {
            eprintln!("Startup cancelled before '{next_task}'");
            return Ok(130);
        }
        Err(e) => {
            print_failures(&runtime.api_schema.api_schema_failures());
            return Err(e).context("startup did not complete");
        }
    }

    let set = runtime.effective.current()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&set.info)?);
        return Ok(0);
    }

    println!("Startup completed");
    for record in orchestrator.records() {
        let elapsed = record.finished_at - record.started_at;
        println!(
            "  [{:>4}] {:<36} {} ms",
            record.order,
            record.name,
            elapsed.num_milliseconds()
        );
    }
    println!();
    println!("  Schema id:           {}", set.schema_id);
    println!("  Effective hash:      {}", set.info.effective_schema_hash);
    println!("  Resource keys:       {}", set.info.resource_key_count);
    println!("  Seed hash:           {}", set.info.resource_key_seed_hash);
    for component in &set.info.schema_components {
        println!(
            "  Project:             {} {} ({}{})",
            component.project_name,
            component.project_version,
            component.project_endpoint_name,
            if component.is_extension_project { ", extension" } else { "" }
        );
    }
    Ok(0)
}

/// Execute `dms-schema hash`.
pub fn run_hash(args: &HashArgs, config: &StartupConfig) -> Result<u8> {
    let normalized = load_normalized(config)?;
    let hasher = EffectiveSchemaHasher::new();
    if args.manifest {
        print!("{}", hasher.manifest(&normalized)?.as_str());
        return Ok(0);
    }
    println!("{}", hasher.compute_hash(&normalized)?);
    Ok(0)
}

/// Execute `dms-schema seeds`.
pub fn run_seeds(args: &SeedsArgs, config: &StartupConfig) -> Result<u8> {
    let normalized = load_normalized(config)?;
    let seeder = ResourceKeySeedProvider::new();
    let seeds = seeder.get_seeds(&normalized)?;
    let seed_hash = seeder.compute_seed_hash(&seeds);

    if args.json {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct SeedReport<'a> {
            resource_key_seed_hash: String,
            resource_keys: &'a [dms_pipeline::ResourceKeySeed],
        }
        let report = SeedReport {
            resource_key_seed_hash: seed_hash.to_hex(),
            resource_keys: &seeds,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(0);
    }

    for seed in &seeds {
        println!(
            "  {:>5}  {:<20} {:<48} {}{}",
            seed.resource_key_id,
            seed.project_name.as_str(),
            seed.resource_name.as_str(),
            seed.resource_version,
            if seed.is_abstract_resource { "  (abstract)" } else { "" }
        );
    }
    println!();
    println!("Total: {} resource keys, seed hash {seed_hash}", seeds.len());
    Ok(0)
}

/// Execute `dms-schema load-order`.
pub fn run_load_order(args: &LoadOrderArgs, config: &StartupConfig) -> Result<u8> {
    let normalized = load_normalized(config)?;
    let info = EffectiveSchemaInfo::derive(&normalized)?;
    let effective = EffectiveApiSchemaProvider::new(Arc::new(NoopSchemaCache));
    effective.initialize(&normalized, info)?;
    let set = effective.current()?;
    let order = DependencyCalculator::new().resource_load_order(&set.documents);

    if args.table {
        for entry in &order {
            println!("  {:>3}  {}", entry.order, entry.resource);
        }
        return Ok(0);
    }
    println!("{}", serde_json::to_string_pretty(&order)?);
    Ok(0)
}

/// Execute `dms-schema validate`. Exit code 1 when any document fails.
pub fn run_validate(args: &ValidateArgs, config: &StartupConfig) -> Result<u8> {
    let runtime = Runtime::build(config, Arc::new(NoopSchemaCache));
    let failures = match runtime.api_schema.get_api_schema_nodes() {
        Ok(nodes) => match ApiSchemaInputNormalizer::new().normalize(&nodes) {
            Ok(_) => Vec::new(),
            Err(e) => e.to_failures(),
        },
        Err(e) => e.failures().to_vec(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&failures)?);
    } else if failures.is_empty() {
        println!("OK: API schema documents are valid");
    } else {
        print_failures(&failures);
        println!("FAILED: {} failure(s)", failures.len());
    }
    Ok(if failures.is_empty() { 0 } else { 1 })
}

/// Load, validate and normalize through the configured source.
fn load_normalized(config: &StartupConfig) -> Result<ApiSchemaDocumentNodes> {
    let runtime = Runtime::build(config, Arc::new(NoopSchemaCache));
    let nodes = runtime
        .api_schema
        .get_api_schema_nodes()
        .map_err(|e: ProviderError| {
            print_failures(e.failures());
            e
        })?;
    let normalized = ApiSchemaInputNormalizer::new()
        .normalize(&nodes)
        .context("API schema normalization failed")?;
    Ok(normalized)
}

fn print_failures(failures: &[ApiSchemaFailure]) {
    for failure in failures {
        eprintln!("  {failure}");
    }
}
