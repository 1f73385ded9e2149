//! Archive fixtures and config builders

use super::constants::*;
use recordings_bridge::config::{AppConfig, CliConfig, FileConfig};
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;

/// Zip archive holding `entries` as (name, content) pairs.
pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("Failed to start zip entry");
        writer.write_all(content).expect("Failed to write zip entry");
    }
    writer
        .finish()
        .expect("Failed to finish zip archive")
        .into_inner()
}

/// Config pointing both collaborators at the fake API on `base_url`.
///
/// `extra` is appended verbatim, so it may override sections.
pub fn app_config(base_url: &str, work_dir: &Path, extra: &str) -> AppConfig {
    let toml = format!(
        r#"
        work_dir = "{work_dir}"

        [storage]
        api_base_url = "{base_url}"
        home_region = "{HOME_REGION}"
        client_id = "{CLIENT_ID}"
        client_secret = "{CLIENT_SECRET}"
        request_timeout_secs = 5

        [crm]
        webhook_url = "{base_url}/rest/1/{WEBHOOK_KEY}/"
        attachment_field = "{ATTACHMENT_FIELD}"
        request_timeout_secs = 5

        {extra}
        "#,
        work_dir = work_dir.display(),
    );
    let file = FileConfig::parse(&toml).expect("Failed to parse test config");
    AppConfig::resolve(&CliConfig::default(), Some(file)).expect("Failed to resolve test config")
}

/// `[export]` section with no delay between status checks.
pub fn fast_export(max_poll_attempts: u32) -> String {
    format!(
        "[export]\npoll_interval_secs = 0\nmax_poll_attempts = {}\n",
        max_poll_attempts
    )
}
