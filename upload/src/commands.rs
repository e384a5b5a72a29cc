use anyhow::{Context, Result};
use log::{info, warn};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use xray::client::{FeatureExport, FeatureImport};
use xray::config::Env;
use xray::feature;
use xray::run;
use xray::upload::{self, Upload, UploadContext};

fn context() -> Result<UploadContext> {
    let env: Env = env::vars().collect();
    Ok(UploadContext::from_env(env)?)
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

pub fn results(path: &Path, scenario_tags: Option<&Path>) -> Result<()> {
    let outcome = run::parse(&read(path)?)?;
    let mut context = context()?;
    if let Some(tags) = scenario_tags {
        context = context.scenarios(feature::parse_scenario_tags(&read(tags)?)?);
    }
    match upload::run(&outcome, &context)? {
        Upload::Skipped(reason) => info!("Nothing uploaded: {}", reason),
        Upload::Uploaded(outcome) => {
            for issue in outcome.issues {
                println!("{}", issue);
            }
        }
    }
    Ok(())
}

pub fn import_feature(
    file: PathBuf,
    project_key: Option<String>,
    project_id: Option<String>,
    source: Option<String>,
) -> Result<()> {
    let context = context()?;
    let request = FeatureImport {
        file,
        project_key: project_key.or_else(|| context.config().jira.project_key.clone()),
        project_id,
        source,
    };
    let outcome = upload::import_feature(&context, &request)?;
    for error in outcome.errors.iter() {
        match &error.entity_key {
            Some(key) => warn!("{}: {}", key, error.message),
            None => warn!("{}", error.message),
        }
    }
    Ok(())
}

pub fn export_feature(keys: Vec<String>, filter: Option<u64>, output_dir: &Path) -> Result<()> {
    let context = context()?;
    let exported = upload::export_feature(&context, &FeatureExport { keys, filter })?;
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(&exported.filename);
    fs::write(&path, &exported.content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("{}", path.display());
    Ok(())
}
