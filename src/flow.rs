// The `run` command: load local inputs, settle the author email, hand the
// dataset to the flow service, and record what came back. Submission
// failures are reported once and end the command; they never panic and
// never leave half-updated state behind.

use crate::api::{FlowService, FlowServiceClient, LoginPolicy, SubmissionRequest};
use crate::cli::RunArgs;
use crate::config::ServiceConfig;
use crate::email::{resolve_author_email, EmailDecision};
use crate::error::Error;
use crate::state::{FlowRunRecord, SessionStateUpdate, StateStore};
use crate::ui::{self, TerminalPrompter};
use anyhow::{Context, Result};
use log::debug;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

pub fn run(args: &RunArgs, verbose: bool) -> Result<()> {
    if !args.data_path.exists() {
        anyhow::bail!("Data path '{}' does not exist", args.data_path.display());
    }

    let config = ServiceConfig::resolve(args.service_instance.as_deref())?;
    let store = StateStore::new(args.client_state_file.clone());
    let state = store.load()?;

    let bag_kwargs = match &args.bag_kwargs_file {
        Some(path) => load_json_object(path)?,
        None => Map::new(),
    };
    let dataset_acls = match &args.acl_file {
        Some(path) => Some(load_json_object(path)?),
        None => None,
    };

    debug!("determining author email");
    let decision = resolve_author_email(
        args.author_email.as_deref(),
        state.author_email.as_deref(),
        &mut TerminalPrompter,
    )?;

    let client = FlowServiceClient::connect(
        &config,
        LoginPolicy::Interactive {
            force: args.force_login,
            no_browser: args.no_browser,
        },
    )?;

    let request = SubmissionRequest {
        data_path: args.data_path.display().to_string(),
        author_email: decision.email.clone(),
        catalog_id: args.catalog.clone(),
        schema: args.schema.clone(),
        dataset_acls,
        output_dir: args.output_dir.as_ref().map(|p| p.display().to_string()),
        delete_dir: args.delete_dir,
        handle_git_repos: !args.ignore_git,
        server: args.server.clone(),
        dry_run: args.dry_run,
        verbose,
        force_http: args.force_http,
        bag_kwargs,
    };

    submit_and_record(&client, &store, &config, &request, &decision)
}

/// Links shown to the user once the flow has somewhere for the bag to land.
#[derive(Debug, Clone, PartialEq)]
pub struct RunLinks {
    pub http_link: String,
    pub globus_web_link: String,
}

/// Build the direct-download link and the Globus web-app link for a bag the
/// service will deposit at `dest_path` on the configured data endpoint.
pub fn derive_links(config: &ServiceConfig, dest_path: &str) -> RunLinks {
    let http_link = format!("{}{}", config.endpoint_base_url, dest_path);
    let dir_path = match dest_path.rfind('/') {
        Some(0) => "/",
        Some(idx) => &dest_path[..idx],
        None => "",
    };
    let globus_web_link = format!(
        "https://app.globus.org/file-manager?origin_id={}&origin_path={}",
        config.endpoint_uuid, dir_path
    );
    RunLinks {
        http_link,
        globus_web_link,
    }
}

/// Submit and, on a real (non-dry-run) success, persist the outcome. This
/// is the part of `run` with consequences, so it takes the service and the
/// store as seams.
pub fn submit_and_record<S: FlowService>(
    service: &S,
    store: &StateStore,
    config: &ServiceConfig,
    request: &SubmissionRequest,
    email: &EmailDecision,
) -> Result<()> {
    let spinner = ui::spinner("Submitting dataset to the flow service...");
    let outcome = service.start_flow(request);
    spinner.finish_and_clear();

    let response = match outcome {
        Ok(response) => response,
        Err(e) => return Err(Error::Submission(format!("{:#}", e)).into()),
    };
    if !response.success {
        let reason = response
            .error
            .unwrap_or_else(|| "the service gave no reason".to_string());
        return Err(Error::FlowRejected(reason).into());
    }

    if let Some(message) = &response.message {
        println!("{}", message);
    }
    if request.dry_run {
        println!("Dry run complete. Nothing was submitted and nothing was saved.");
        return Ok(());
    }

    let missing =
        |field: &str| Error::Submission(format!("service reported success but sent no {}", field));
    let dest_path = response
        .fair_re_dest_path
        .ok_or_else(|| missing("fair_re_dest_path"))?;
    let flow_id = response.flow_id.ok_or_else(|| missing("flow_id"))?;
    let flow_instance_id = response
        .flow_instance_id
        .ok_or_else(|| missing("flow_instance_id"))?;
    debug!("flow {} started, instance {}", flow_id, flow_instance_id);

    let links = derive_links(config, &dest_path);
    let update = SessionStateUpdate {
        author_email: if email.save {
            Some(email.email.clone())
        } else {
            None
        },
        flow_run: Some(FlowRunRecord {
            service_instance: config.instance.clone(),
            flow_id,
            flow_instance_id,
            http_link: links.http_link.clone(),
            globus_web_link: links.globus_web_link.clone(),
        }),
    };
    store
        .save(&update)
        .context("Failed to record the submission in the session state file")?;

    let bag_name = dest_path.rsplit('/').next().unwrap_or(&dest_path);
    println!("Your bag '{}' is on its way. Check on it with 'fairflow status'.", bag_name);
    println!("Watch it arrive in the Globus web app:\n  {}", links.globus_web_link);
    println!("Direct download once the flow completes:\n  {}", links.http_link);
    Ok(())
}

/// Read one of the optional JSON input files (bag kwargs, dataset ACLs).
/// The file must hold a JSON object; anything else is treated the same as
/// unparseable JSON.
fn load_json_object(path: &Path) -> Result<Map<String, Value>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw).map_err(|e| Error::InvalidJson {
        path: path.display().to_string(),
        detail: e.to_string(),
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(Error::InvalidJson {
            path: path.display().to_string(),
            detail: "expected a JSON object".into(),
        }
        .into()),
    }
}
