/// Audit trail
///
/// Structured events on the `larkm::audit` target, so they can be routed or
/// filtered separately from operational logs (`RUST_LOG=larkm::audit=info`).
use crate::{
    error::LarkmResult,
    policy::CallerContext,
    registry::{ArkRecord, Resolution},
};

const NO_REFERER: &str = "-";

/// Record one resolution attempt and how it ended
pub fn resolution(ark: &str, caller: &CallerContext, result: &LarkmResult<Resolution>) {
    let referer = caller.referer.as_deref().unwrap_or(NO_REFERER);
    match result {
        Ok(Resolution::Redirect(target)) => tracing::info!(
            target: "larkm::audit",
            event = "resolve",
            ip = %caller.ip,
            referer,
            ark,
            outcome = "redirect",
            redirect = %target,
            "ARK resolved"
        ),
        Ok(Resolution::Info(_)) => tracing::info!(
            target: "larkm::audit",
            event = "resolve",
            ip = %caller.ip,
            referer,
            ark,
            outcome = "info",
            "ARK resolved"
        ),
        Err(e) => tracing::info!(
            target: "larkm::audit",
            event = "resolve",
            ip = %caller.ip,
            referer,
            ark,
            outcome = "error",
            status = e.status().as_u16(),
            detail = %e,
            "ARK resolution failed"
        ),
    }
}

pub fn ark_created(record: &ArkRecord, caller: &CallerContext) {
    tracing::info!(
        target: "larkm::audit",
        event = "create",
        ip = %caller.ip,
        ark = %record.ark_string,
        target_url = %record.target,
        "ARK created"
    );
}

/// Log each field whose value changed, old and new
pub fn ark_updated(before: &ArkRecord, after: &ArkRecord, caller: &CallerContext) {
    for (field, old, new) in changed_fields(before, after) {
        tracing::info!(
            target: "larkm::audit",
            event = "update",
            ip = %caller.ip,
            ark = %after.ark_string,
            field,
            old,
            new,
            "ARK updated"
        );
    }
}

pub fn ark_deleted(ark: &str, caller: &CallerContext) {
    tracing::info!(
        target: "larkm::audit",
        event = "delete",
        ip = %caller.ip,
        ark,
        "ARK deleted"
    );
}

fn changed_fields<'a>(
    before: &'a ArkRecord,
    after: &'a ArkRecord,
) -> Vec<(&'static str, &'a str, &'a str)> {
    [
        ("target", &before.target, &after.target),
        ("who", &before.who, &after.who),
        ("what", &before.what, &after.what),
        ("when", &before.when, &after.when),
        ("policy", &before.policy, &after.policy),
    ]
    .into_iter()
    .filter(|(_, old, new)| old != new)
    .map(|(field, old, new)| (field, old.as_str(), new.as_str()))
    .collect()
}
