//! Store probes: health, API version detection, environment info

use anyhow::{bail, Context, Result};
use storesync_core::{AttributeBag, AttributeValue};

use super::{print_summary, Session};

pub fn health(session: &Session) -> Result<()> {
    let connector = session.connector(session.progress.stage_line("health"))?;
    let healthy = connector.health_check();
    let url = connector.config().base_url.clone();
    print_summary(
        "Health",
        &[
            ("Store", url.clone()),
            ("Reachable", if healthy { "yes" } else { "no" }.to_string()),
        ],
    );
    if !healthy {
        bail!("{url} is not reachable with the configured credentials");
    }
    Ok(())
}

pub fn api_version(session: &Session) -> Result<()> {
    let connector = session.connector(session.progress.stage_line("probe"))?;
    match connector.detect_api_version() {
        Some(version) => {
            print_summary(
                "API version",
                &[
                    ("Store", connector.config().base_url.clone()),
                    ("Version", version),
                ],
            );
            Ok(())
        }
        None => bail!("no supported API version answered"),
    }
}

pub fn info(session: &Session) -> Result<()> {
    let pb = session.progress.stage_line("info");
    let connector = session.connector(pb.clone())?;
    let doc = connector
        .store_info()
        .context("Failed to read store information")?;
    pb.finish_and_clear();

    let rows = info_rows(&doc);
    if rows.is_empty() {
        log::warn!("store returned no scalar fields");
    }
    let rows: Vec<(&str, String)> = rows.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
    print_summary("Store", &rows);
    Ok(())
}

/// Scalar fields of the document and of its direct child objects.
fn info_rows(doc: &AttributeBag) -> Vec<(String, String)> {
    let mut rows = Vec::new();
    for (key, value) in doc.iter() {
        match value {
            AttributeValue::Scalar(s) => rows.push((key.to_string(), s.to_string())),
            AttributeValue::Object(child) => {
                for (child_key, child_value) in child.iter() {
                    if let AttributeValue::Scalar(s) = child_value {
                        rows.push((format!("{key}.{child_key}"), s.to_string()));
                    }
                }
            }
            AttributeValue::List(_) => {}
        }
    }
    rows
}
