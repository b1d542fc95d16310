//! Port resolution: which discovery candidates to scrape and how to name them
//!
//! Pod discovery yields one candidate per declared container port, plus one per
//! container without ports. A named port keeps the candidates exposing that
//! name. A numeric port may not be declared at all, so every candidate of a pod
//! is rewritten to the same address and instance, and the collector merges
//! them into one target.

use vigil_common::crd::IntOrString;
use vigil_common::promconfig::relabel::escape_literal;
use vigil_common::promconfig::RelabelConfig;

use crate::error::CompileError;
use crate::labels;

/// A resolved port specifier
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortSpec<'a> {
    /// Container port name
    Named(&'a str),
    /// Port number
    Numeric(u16),
}

impl<'a> PortSpec<'a> {
    /// Resolve an endpoint's port field
    ///
    /// An empty name or a zero number counts as unset.
    pub fn from_endpoint(port: Option<&'a IntOrString>) -> Result<Self, CompileError> {
        match port {
            Some(IntOrString::String(name)) if !name.is_empty() => Ok(Self::Named(name)),
            Some(IntOrString::Int(number)) if *number != 0 => u16::try_from(*number)
                .map(Self::Numeric)
                .map_err(|_| CompileError::Port(format!("port number {number} is out of range"))),
            _ => Err(CompileError::Port(
                "exactly one of a port name or a port number must be set".to_string(),
            )),
        }
    }

    /// Job name suffix for this port
    pub fn job_suffix(&self) -> String {
        match self {
            Self::Named(name) => name.to_string(),
            Self::Numeric(number) => number.to_string(),
        }
    }

    /// Rules filtering candidates and deriving `instance` (and for numeric
    /// ports, `__address__`) for this port
    ///
    /// Expects `__tmp_instance` to be set by [`tmp_instance_rules`].
    pub fn rules(&self) -> Vec<RelabelConfig> {
        match self {
            Self::Named(name) => vec![
                RelabelConfig::keep(&[labels::META_POD_CONTAINER_PORT_NAME], escape_literal(name)),
                RelabelConfig::copy(
                    &[labels::TMP_INSTANCE, labels::META_POD_CONTAINER_PORT_NAME],
                    labels::INSTANCE,
                )
                .with_regex("(.+);(.+)")
                .with_replacement("$1:$2"),
            ],
            Self::Numeric(number) => vec![
                RelabelConfig::label_drop(labels::CONTAINER),
                RelabelConfig::copy(&[labels::TMP_INSTANCE], labels::INSTANCE)
                    .with_replacement(format!("$1:{number}")),
                RelabelConfig::copy(&[labels::META_POD_IP], labels::ADDRESS)
                    .with_replacement(format!("$1:{number}")),
            ],
        }
    }
}

/// Rules setting `__tmp_instance` to the pod name, or to the node name for
/// pods owned by a DaemonSet
pub fn tmp_instance_rules() -> Vec<RelabelConfig> {
    vec![
        RelabelConfig::copy(&[labels::META_POD_NAME], labels::TMP_INSTANCE),
        RelabelConfig::copy(
            &[labels::META_POD_CONTROLLER_KIND, labels::META_POD_NODE_NAME],
            labels::TMP_INSTANCE,
        )
        .with_regex("DaemonSet;(.*)"),
    ]
}
