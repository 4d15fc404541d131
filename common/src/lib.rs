pub mod tracing;

use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Serialize, Deserialize)]
pub struct Version {
    pub git_describe: Option<String>,
}
