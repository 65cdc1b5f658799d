// The `status` command: work out which flow run the user means, ask the
// service about it, and print either the one-line summary or the raw
// structure.

use crate::api::{FlowService, FlowServiceClient, LoginPolicy};
use crate::cli::StatusArgs;
use crate::config::ServiceConfig;
use crate::error::Error;
use crate::state::StateStore;
use crate::ui;
use anyhow::Result;
use log::debug;

/// Which run to query, and on which deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRef {
    pub flow_id: String,
    pub flow_instance_id: String,
    pub service_instance: Option<String>,
}

/// Explicit identifiers win over persisted ones. When both are given on
/// the command line the state file is not read at all: a fully explicit
/// query works on a fresh machine, and runs against the default
/// deployment. Otherwise persisted values fill the gaps, and if either
/// identifier is still missing there is nothing to query and no request
/// is made.
pub fn resolve_flow_ref(
    explicit_id: Option<&str>,
    explicit_instance: Option<&str>,
    store: &StateStore,
) -> Result<FlowRef> {
    if let (Some(flow_id), Some(flow_instance_id)) = (explicit_id, explicit_instance) {
        return Ok(FlowRef {
            flow_id: flow_id.to_string(),
            flow_instance_id: flow_instance_id.to_string(),
            service_instance: None,
        });
    }

    let state = store.load()?;
    let flow_id = explicit_id.map(str::to_string).or(state.flow_id);
    let flow_instance_id = explicit_instance
        .map(str::to_string)
        .or(state.flow_instance_id);
    match (flow_id, flow_instance_id) {
        (Some(flow_id), Some(flow_instance_id)) => Ok(FlowRef {
            flow_id,
            flow_instance_id,
            service_instance: state.service_instance,
        }),
        _ => Err(Error::NoFlowToQuery.into()),
    }
}

pub fn run(args: &StatusArgs) -> Result<()> {
    let store = StateStore::new(args.client_state_file.clone());
    let flow = resolve_flow_ref(
        args.flow_id.as_deref(),
        args.flow_instance_id.as_deref(),
        &store,
    )?;
    debug!(
        "querying flow {} instance {}",
        flow.flow_id, flow.flow_instance_id
    );

    let config = ServiceConfig::resolve(flow.service_instance.as_deref())?;
    let client = FlowServiceClient::connect(
        &config,
        LoginPolicy::Interactive {
            force: false,
            no_browser: false,
        },
    )?;

    let spinner = ui::spinner("Checking flow status...");
    let outcome = client.check_status(&flow.flow_id, &flow.flow_instance_id);
    spinner.finish_and_clear();

    let status = match outcome {
        Ok(status) => status,
        Err(e) => {
            let detail = if args.raw {
                format!("{:#}", e)
            } else {
                e.to_string()
            };
            return Err(Error::Status {
                flow_id: flow.flow_id,
                detail,
            }
            .into());
        }
    };

    if args.raw {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{}", status.clean_status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn store_with(dir: &tempfile::TempDir, body: &str) -> StateStore {
        let path = dir.path().join("state.json");
        fs::write(&path, body).unwrap();
        StateStore::new(Some(path))
    }

    #[test]
    fn explicit_identifiers_win_over_persisted_ones() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(
            &dir,
            r#"{"flow_id": "F2", "flow_instance_id": "I2", "service_instance": "staging"}"#,
        );

        let flow = resolve_flow_ref(Some("F1"), Some("I1"), &store).unwrap();
        assert_eq!(flow.flow_id, "F1");
        assert_eq!(flow.flow_instance_id, "I1");
        assert_eq!(flow.service_instance, None);
    }

    #[test]
    fn a_fully_explicit_query_never_opens_the_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, "{broken");

        let flow = resolve_flow_ref(Some("F1"), Some("I1"), &store).unwrap();
        assert_eq!(flow.flow_id, "F1");
    }

    #[test]
    fn persisted_identifiers_fill_the_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(
            &dir,
            r#"{"flow_id": "F2", "flow_instance_id": "I2", "service_instance": "staging"}"#,
        );

        let flow = resolve_flow_ref(None, None, &store).unwrap();
        assert_eq!(flow.flow_id, "F2");
        assert_eq!(flow.flow_instance_id, "I2");
        assert_eq!(flow.service_instance.as_deref(), Some("staging"));

        let flow = resolve_flow_ref(Some("F1"), None, &store).unwrap();
        assert_eq!(flow.flow_id, "F1");
        assert_eq!(flow.flow_instance_id, "I2");
    }

    #[test]
    fn with_nothing_saved_and_nothing_given_there_is_no_flow_to_query() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(Some(dir.path().join("missing.json")));

        let err = resolve_flow_ref(None, None, &store).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::NoFlowToQuery)
        ));
    }

    #[test]
    fn a_half_resolved_query_is_still_no_flow() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, r#"{"flow_id": "F2"}"#);

        let err = resolve_flow_ref(None, None, &store).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::NoFlowToQuery)
        ));
    }
}
