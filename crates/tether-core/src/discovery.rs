//! Feature-to-service mapping for service discovery.
//!
//! Discovery asks the server for its child components and then for each
//! component's feature set. This module turns those feature sets into
//! [`ComponentAddresses`]. The I/O lives in the session crate.

use std::collections::{BTreeMap, BTreeSet};

use crate::component::{ComponentAddresses, ServiceKind};

/// Legal identities and contracts.
pub const NS_LEGAL_IDENTITIES: &str = "urn:ieee:iot:leg:id:1.0";

/// Thing registry discovery.
pub const NS_THING_REGISTRY: &str = "urn:ieee:iot:disco:1.0";

/// Provisioning: device side.
pub const NS_PROVISIONING_DEVICE: &str = "urn:ieee:iot:prov:d:1.0";

/// Provisioning: owner side.
pub const NS_PROVISIONING_OWNER: &str = "urn:ieee:iot:prov:o:1.0";

/// Provisioning: tokens.
pub const NS_PROVISIONING_TOKEN: &str = "urn:ieee:iot:prov:t:1.0";

/// HTTP file upload (XEP-0363).
pub const NS_HTTP_FILE_UPLOAD: &str = "urn:xmpp:http:upload:0";

/// Event logging.
pub const NS_EVENT_LOG: &str = "urn:xmpp:eventlog";

/// Multi-user chat (XEP-0045).
pub const NS_MUC: &str = "http://jabber.org/protocol/muc";

/// Financial ledger.
pub const NS_LEDGER: &str = "urn:ieee:iot:e:1.0";

/// Data form field carrying the upload limit in an HTTP upload info result.
pub const FIELD_MAX_FILE_SIZE: &str = "max-file-size";

/// Feature set advertised by one component (a disco#info result).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoInfo {
    /// Advertised feature namespaces.
    pub features: BTreeSet<String>,
    /// Extended info form fields (`var` to first value).
    pub fields: BTreeMap<String, String>,
}

impl DiscoInfo {
    /// Info with the given features and no form fields.
    pub fn with_features<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { features: features.into_iter().map(Into::into).collect(), fields: BTreeMap::new() }
    }

    /// Add a form field.
    #[must_use]
    pub fn with_field(mut self, var: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(var.into(), value.into());
        self
    }

    /// Component advertises `feature`.
    pub fn has(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }

    /// Upload limit from the info form, if advertised and numeric.
    pub fn max_file_size(&self) -> Option<u64> {
        self.fields.get(FIELD_MAX_FILE_SIZE).and_then(|v| v.trim().parse().ok())
    }
}

/// Roles a component fulfils, judged by its features.
pub fn classify(info: &DiscoInfo) -> Vec<ServiceKind> {
    let mut kinds = Vec::new();

    if info.has(NS_LEGAL_IDENTITIES) {
        kinds.push(ServiceKind::LegalIdentities);
    }
    if info.has(NS_HTTP_FILE_UPLOAD) {
        kinds.push(ServiceKind::FileUpload);
    }
    if info.has(NS_MUC) {
        kinds.push(ServiceKind::MultiUserChat);
    }
    if info.has(NS_THING_REGISTRY) {
        kinds.push(ServiceKind::ThingRegistry);
    }
    if info.has(NS_PROVISIONING_DEVICE)
        && info.has(NS_PROVISIONING_OWNER)
        && info.has(NS_PROVISIONING_TOKEN)
    {
        kinds.push(ServiceKind::Provisioning);
    }
    if info.has(NS_LEDGER) {
        kinds.push(ServiceKind::Ledger);
    }
    if info.has(NS_EVENT_LOG) {
        kinds.push(ServiceKind::EventLog);
    }

    kinds
}

/// Addresses found by classifying every `(jid, info)` pair.
///
/// When two components claim the same role the first one wins.
pub fn resolve<'a, I>(items: I) -> ComponentAddresses
where
    I: IntoIterator<Item = (&'a str, &'a DiscoInfo)>,
{
    let mut found = ComponentAddresses::new();

    for (jid, info) in items {
        for kind in classify(info) {
            if found.get(kind).is_some() {
                continue;
            }
            found.set(kind, jid);
            if kind == ServiceKind::FileUpload
                && let Some(max) = info.max_file_size()
            {
                found.set_file_upload_max_size(max);
            }
        }
    }

    found
}

/// Result of merging one discovery run into the known addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryOutcome {
    /// Every required service is now resolved.
    pub complete: bool,
    /// Kinds whose address was added or changed by this run.
    pub changed: Vec<ServiceKind>,
    /// Required kinds still missing.
    pub missing: Vec<ServiceKind>,
}

/// Merge a run's findings into `known`. Never erases known addresses.
pub fn apply(known: &mut ComponentAddresses, found: &ComponentAddresses) -> DiscoveryOutcome {
    let changed = known.merge(found);
    let missing = known.missing();
    DiscoveryOutcome { complete: missing.is_empty(), changed, missing }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisioning_needs_all_three_features() {
        let partial = DiscoInfo::with_features([NS_PROVISIONING_DEVICE, NS_PROVISIONING_OWNER]);
        assert!(classify(&partial).is_empty());

        let full = DiscoInfo::with_features([
            NS_PROVISIONING_DEVICE,
            NS_PROVISIONING_OWNER,
            NS_PROVISIONING_TOKEN,
        ]);
        assert_eq!(classify(&full), vec![ServiceKind::Provisioning]);
    }

    #[test]
    fn one_component_can_fill_several_roles() {
        let info = DiscoInfo::with_features([NS_LEGAL_IDENTITIES, NS_LEDGER]);
        assert_eq!(classify(&info), vec![ServiceKind::LegalIdentities, ServiceKind::Ledger]);
    }

    #[test]
    fn upload_limit_comes_from_form() {
        let info = DiscoInfo::with_features([NS_HTTP_FILE_UPLOAD])
            .with_field(FIELD_MAX_FILE_SIZE, "5242880");
        let found = resolve([("upload.example.org", &info)]);

        assert_eq!(found.get(ServiceKind::FileUpload), Some("upload.example.org"));
        assert_eq!(found.file_upload_max_size(), Some(5_242_880));
    }

    #[test]
    fn garbage_upload_limit_is_ignored() {
        let info =
            DiscoInfo::with_features([NS_HTTP_FILE_UPLOAD]).with_field(FIELD_MAX_FILE_SIZE, "big");
        assert_eq!(info.max_file_size(), None);
    }

    #[test]
    fn first_claimant_wins() {
        let a = DiscoInfo::with_features([NS_MUC]);
        let b = DiscoInfo::with_features([NS_MUC]);
        let found = resolve([("muc.example.org", &a), ("rooms.example.org", &b)]);
        assert_eq!(found.get(ServiceKind::MultiUserChat), Some("muc.example.org"));
    }

    #[test]
    fn apply_reports_missing_required_kinds() {
        let mut known = ComponentAddresses::new();
        let found = resolve([("muc.example.org", &DiscoInfo::with_features([NS_MUC]))]);

        let outcome = apply(&mut known, &found);

        assert!(!outcome.complete);
        assert_eq!(outcome.changed, vec![ServiceKind::MultiUserChat]);
        assert!(outcome.missing.contains(&ServiceKind::LegalIdentities));
        assert!(!outcome.missing.contains(&ServiceKind::MultiUserChat));
    }
}
