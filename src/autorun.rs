//! The record produced for every discovered autorun entry.

use crate::fingerprint::Fingerprint;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The persistence mechanism an entry was found through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AutorunType {
    #[serde(rename = "run_key")]
    RunKey,
    #[serde(rename = "service")]
    Service,
    #[serde(rename = "startup")]
    Startup,
    #[serde(rename = "task")]
    Task,
    #[serde(rename = "launch_daemons")]
    LaunchDaemons,
    #[serde(rename = "launch_agents")]
    LaunchAgents,
    #[serde(rename = "launch_agents_user")]
    LaunchAgentsUser,
    #[serde(rename = "systemd")]
    Systemd,
    #[serde(rename = "cron")]
    Cron,
    #[serde(rename = "crond")]
    Crond,
    #[serde(rename = "rc.d")]
    RcD,
    #[serde(rename = "local_rc.d")]
    LocalRcD,
    #[serde(rename = "bash")]
    Bash,
}

impl AutorunType {
    pub const ALL: [AutorunType; 13] = [
        AutorunType::RunKey,
        AutorunType::Service,
        AutorunType::Startup,
        AutorunType::Task,
        AutorunType::LaunchDaemons,
        AutorunType::LaunchAgents,
        AutorunType::LaunchAgentsUser,
        AutorunType::Systemd,
        AutorunType::Cron,
        AutorunType::Crond,
        AutorunType::RcD,
        AutorunType::LocalRcD,
        AutorunType::Bash,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AutorunType::RunKey => "run_key",
            AutorunType::Service => "service",
            AutorunType::Startup => "startup",
            AutorunType::Task => "task",
            AutorunType::LaunchDaemons => "launch_daemons",
            AutorunType::LaunchAgents => "launch_agents",
            AutorunType::LaunchAgentsUser => "launch_agents_user",
            AutorunType::Systemd => "systemd",
            AutorunType::Cron => "cron",
            AutorunType::Crond => "crond",
            AutorunType::RcD => "rc.d",
            AutorunType::LocalRcD => "local_rc.d",
            AutorunType::Bash => "bash",
        }
    }
}

impl fmt::Display for AutorunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AutorunType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AutorunType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown autorun type '{s}'"))
    }
}

/// One program configured to start automatically.
///
/// Built once by the enumerator; `image_name` always matches `image_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Autorun {
    #[serde(rename = "type")]
    kind: AutorunType,
    location: String,
    image_path: String,
    image_name: String,
    arguments: String,
    #[serde(serialize_with = "empty_if_none")]
    md5: Option<String>,
    #[serde(serialize_with = "empty_if_none")]
    sha1: Option<String>,
    #[serde(serialize_with = "empty_if_none")]
    sha256: Option<String>,
    entry: String,
    launch_string: String,
    resolved: bool,
}

fn empty_if_none<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(value.as_deref().unwrap_or_default())
}

/// Launch details of an [`Autorun`], before fingerprinting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub path: String,
    pub arguments: String,
    pub resolved: bool,
}

impl Autorun {
    pub fn new(
        kind: AutorunType,
        location: impl Into<String>,
        entry: impl Into<String>,
        launch_string: impl Into<String>,
        image: Image,
        fingerprint: Fingerprint,
    ) -> Self {
        let image_name = basename(&image.path).to_string();
        Self {
            kind,
            location: location.into(),
            image_path: image.path,
            image_name,
            arguments: image.arguments,
            md5: fingerprint.md5,
            sha1: fingerprint.sha1,
            sha256: fingerprint.sha256,
            entry: entry.into(),
            launch_string: launch_string.into(),
            resolved: image.resolved,
        }
    }

    pub fn kind(&self) -> AutorunType {
        self.kind
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn image_path(&self) -> &str {
        &self.image_path
    }

    pub fn image_name(&self) -> &str {
        &self.image_name
    }

    pub fn arguments(&self) -> &str {
        &self.arguments
    }

    pub fn md5(&self) -> Option<&str> {
        self.md5.as_deref()
    }

    pub fn sha1(&self) -> Option<&str> {
        self.sha1.as_deref()
    }

    pub fn sha256(&self) -> Option<&str> {
        self.sha256.as_deref()
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn launch_string(&self) -> &str {
        &self.launch_string
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }
}

impl fmt::Display for Autorun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Type: {}", self.kind)?;
        writeln!(f, "Location: {}", self.location)?;
        writeln!(f, "Image Path: {}", self.image_path)?;
        writeln!(f, "Image Name: {}", self.image_name)?;
        writeln!(f, "Arguments: {}", self.arguments)?;
        writeln!(f, "Entry: {}", self.entry)?;
        writeln!(f, "Launch String: {}", self.launch_string)?;
        writeln!(f, "MD5: {}", self.md5().unwrap_or_default())?;
        writeln!(f, "SHA1: {}", self.sha1().unwrap_or_default())?;
        write!(f, "SHA256: {}", self.sha256().unwrap_or_default())
    }
}

/// Last component of a path, splitting on both `/` and `\`.
pub fn basename(path: &str) -> &str {
    path.trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
}
