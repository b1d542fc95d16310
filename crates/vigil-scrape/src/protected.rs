//! Labels tenants must never control
//!
//! Every user-supplied relabel rule, and every rule derived from a label
//! mapping, passes through [`check_rule`]. Rules that only filter (keep/drop)
//! are always safe. Rules that write a label must not write a protected one,
//! `labeldrop` must not be able to match one, and `labelkeep` must match all
//! of them. `labelmap` writes names computed from the input and is refused.

use vigil_common::promconfig::relabel::compile_anchored;
use vigil_common::promconfig::{RelabelAction, RelabelConfig};

use crate::error::CompileError;
use crate::labels;

/// Labels injected by the platform itself
pub const PROTECTED_LABELS: [&str; 7] = [
    labels::PROJECT_ID,
    labels::LOCATION,
    labels::CLUSTER,
    labels::NAMESPACE,
    labels::JOB,
    labels::INSTANCE,
    labels::ADDRESS,
];

/// Whether `name` is a protected label
pub fn is_protected(name: &str) -> bool {
    PROTECTED_LABELS.contains(&name)
}

/// Reject a rule that could write, erase, or fail to keep a protected label
pub fn check_rule(rule: &RelabelConfig) -> Result<(), CompileError> {
    let action = rule.action;
    match action {
        RelabelAction::Keep | RelabelAction::Drop => Ok(()),
        RelabelAction::Replace | RelabelAction::HashMod => {
            let target = rule.target_label.as_str();
            if target.contains('$') {
                return Err(CompileError::protected(
                    action,
                    format!("target label {target:?} is computed from the input and may name a protected label"),
                ));
            }
            if is_protected(target) {
                return Err(CompileError::protected(
                    action,
                    format!("writes protected label {target:?}"),
                ));
            }
            Ok(())
        }
        RelabelAction::LabelDrop => {
            let regex = compile_anchored(&rule.regex)
                .map_err(|e| CompileError::InvalidRelabeling(e.to_string()))?;
            match PROTECTED_LABELS.iter().find(|l| regex.is_match(l)) {
                Some(label) => Err(CompileError::protected(
                    action,
                    format!("regex {:?} would drop protected label {label:?}", rule.regex),
                )),
                None => Ok(()),
            }
        }
        RelabelAction::LabelKeep => {
            let regex = compile_anchored(&rule.regex)
                .map_err(|e| CompileError::InvalidRelabeling(e.to_string()))?;
            match PROTECTED_LABELS.iter().find(|l| !regex.is_match(l)) {
                Some(label) => Err(CompileError::protected(
                    action,
                    format!("regex {:?} does not keep protected label {label:?}", rule.regex),
                )),
                None => Ok(()),
            }
        }
        RelabelAction::LabelMap => Err(CompileError::protected(
            action,
            "labelmap cannot be checked against protected labels",
        )),
    }
}
