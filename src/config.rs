//! Runtime configuration.
//!
//! Loaded from a TOML file, normally through the privileged-helper boundary
//! on startup and reconfiguration. `-D name=value` command-line definitions
//! are substituted into the raw text (`${name}`) before parsing.

use crate::filter::FilterRule;
use crate::flow::FieldMask;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Flow-log path.
    pub logfile: PathBuf,
    /// Upper bound on tracked exporters.
    #[serde(default = "default_max_peers")]
    pub max_peers: usize,
    /// Store-mask field names; see [`FieldMask::from_config_name`].
    #[serde(default = "default_store")]
    pub store: Vec<String>,
    #[serde(default)]
    pub listen: Vec<Listen>,
    #[serde(default, rename = "filter")]
    pub filters: Vec<FilterRule>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Listen {
    pub addr: IpAddr,
    pub port: u16,
}

impl Listen {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.port)
    }
}

fn default_max_peers() -> usize {
    1024
}

fn default_store() -> Vec<String> {
    vec!["all".to_string()]
}

impl Config {
    pub fn from_file(path: &Path, defines: &[(String, String)]) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&text, defines).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(text: &str, defines: &[(String, String)]) -> Result<Self> {
        let expanded = expand_macros(text, defines)?;
        let config: Config = toml::de::from_str(&expanded)?;
        config.store_mask()?;
        Ok(config)
    }

    /// Resolves the `store` names into one mask.
    pub fn store_mask(&self) -> Result<FieldMask> {
        let mut mask = FieldMask::empty();
        for name in &self.store {
            mask |= FieldMask::from_config_name(name)
                .with_context(|| format!("unknown store field {name:?}"))?;
        }
        Ok(mask)
    }
}

fn expand_macros(text: &str, defines: &[(String, String)]) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            bail!("unterminated macro reference");
        };
        let name = &after[..end];
        match defines.iter().find(|(defined, _)| defined == name) {
            Some((_, value)) => out.push_str(value),
            None => bail!("undefined macro ${{{name}}}"),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
