// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates berth.yml template files.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::CONFIG_FILENAME;

/// Write a commented `berth.yml` into `dir` and return its path.
pub fn init_config(dir: &Path, force: bool) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    std::fs::write(&config_path, TEMPLATE)?;
    Ok(config_path)
}

const TEMPLATE: &str = r#"# berth configuration. Every field is optional.

# Runtime and socket are auto-detected (rootless Podman, rootful Podman,
# then Docker) unless set here.
# runtime:
#   runtime: docker
#   socket: unix:///var/run/docker.sock

base_image: alpine:latest
build_tag: berth-demo:latest
probe_host: 127.0.0.1

timeouts:
  ready: 10s
  poll_interval: 250ms
  stop: 10s
  probe: 5s
  probe_retry: 30s
  worker_observe: 8s
"#;
