//! Label names: discovery meta-labels, output labels, and label sanitizing

/// Address the collector scrapes
pub const ADDRESS: &str = "__address__";
/// Scratch label holding the instance name before the port is appended
pub const TMP_INSTANCE: &str = "__tmp_instance";
/// Query parameter the prober reads the probe target from
pub const PARAM_TARGET: &str = "__param_target";

/// Pod namespace
pub const META_NAMESPACE: &str = "__meta_kubernetes_namespace";
/// Pod name
pub const META_POD_NAME: &str = "__meta_kubernetes_pod_name";
/// Pod IP
pub const META_POD_IP: &str = "__meta_kubernetes_pod_ip";
/// Pod phase (Pending, Running, Succeeded, Failed, Unknown)
pub const META_POD_PHASE: &str = "__meta_kubernetes_pod_phase";
/// Name of the node the pod runs on
pub const META_POD_NODE_NAME: &str = "__meta_kubernetes_pod_node_name";
/// Container name of the candidate
pub const META_POD_CONTAINER_NAME: &str = "__meta_kubernetes_pod_container_name";
/// Container port name of the candidate
pub const META_POD_CONTAINER_PORT_NAME: &str = "__meta_kubernetes_pod_container_port_name";
/// Kind of the pod's owning controller
pub const META_POD_CONTROLLER_KIND: &str = "__meta_kubernetes_pod_controller_kind";
/// Name of the pod's owning controller
pub const META_POD_CONTROLLER_NAME: &str = "__meta_kubernetes_pod_controller_name";
/// Node name (node role)
pub const META_NODE_NAME: &str = "__meta_kubernetes_node_name";

/// GCP-style project identifier
pub const PROJECT_ID: &str = "project_id";
/// Cluster location
pub const LOCATION: &str = "location";
/// Cluster name
pub const CLUSTER: &str = "cluster";
/// Namespace of the scraped object
pub const NAMESPACE: &str = "namespace";
/// Job name
pub const JOB: &str = "job";
/// Instance name
pub const INSTANCE: &str = "instance";
/// Pod name
pub const POD: &str = "pod";
/// Container name
pub const CONTAINER: &str = "container";
/// Node name
pub const NODE: &str = "node";
/// Inferred top-level controller name
pub const TOP_LEVEL_CONTROLLER_NAME: &str = "top_level_controller_name";
/// Inferred top-level controller type
pub const TOP_LEVEL_CONTROLLER_TYPE: &str = "top_level_controller_type";

/// Meta-label prefixes for object labels of one discovery role
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LabelPrefix {
    value: &'static str,
    present: &'static str,
}

/// Pod label meta-labels
pub const POD_LABELS: LabelPrefix = LabelPrefix {
    value: "__meta_kubernetes_pod_label_",
    present: "__meta_kubernetes_pod_labelpresent_",
};

/// Node label meta-labels
pub const NODE_LABELS: LabelPrefix = LabelPrefix {
    value: "__meta_kubernetes_node_label_",
    present: "__meta_kubernetes_node_labelpresent_",
};

impl LabelPrefix {
    /// Meta-label carrying the value of object label `key`
    pub fn value_of(&self, key: &str) -> String {
        format!("{}{}", self.value, sanitize_label_name(key))
    }

    /// Meta-label set to `true` when object label `key` exists
    pub fn presence_of(&self, key: &str) -> String {
        format!("{}{}", self.present, sanitize_label_name(key))
    }
}

/// Replace every character outside `[A-Za-z0-9_]` with `_`, as discovery
/// does when it turns object labels into meta-labels
pub fn sanitize_label_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_label_name() {
        assert_eq!(sanitize_label_name("app.kubernetes.io/name"), "app_kubernetes_io_name");
        assert_eq!(sanitize_label_name("pod-template-hash"), "pod_template_hash");
        assert_eq!(sanitize_label_name("plain_0"), "plain_0");
        assert_eq!(sanitize_label_name("ünï"), "_n_");
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(POD_LABELS.value_of("app"), "__meta_kubernetes_pod_label_app");
        assert_eq!(
            POD_LABELS.presence_of("a.b"),
            "__meta_kubernetes_pod_labelpresent_a_b"
        );
        assert_eq!(NODE_LABELS.value_of("zone"), "__meta_kubernetes_node_label_zone");
    }
}
