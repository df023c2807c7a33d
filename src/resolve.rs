//! The inheritance resolver.
//!
//! Groups form a DAG through `inherit`. Resolution first linearizes the
//! composed groups (each group before its parents, depth-first, first
//! occurrence kept), then computes the effective metadata for one
//! operation as data:
//!
//! - the operation itself comes from the first group in the order that
//!   declares it (the nearest override);
//! - every other metadata kind takes the first non-empty group value in
//!   the order, with operation-level declarations beating group-level
//!   ones;
//! - the endpoint is special: an operation-level endpoint on the resolved
//!   override wins, otherwise the search starts at the operation's
//!   defining group and walks that group's own ancestor chain toward the
//!   root. A more-derived group's endpoint never leaks into operations it
//!   did not itself declare, which is what lets one federated client hit
//!   several hosts.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::api::Api;
use crate::auth::Auth;
use crate::backend::BackendKind;
use crate::error::ConfigError;
use crate::metadata::{GroupDefaults, Handler, OperationSpec, StatusRule};

/// Effective metadata for one operation, before client and per-call
/// overrides are applied.
pub(crate) struct ResolvedOperation {
    pub spec: Arc<OperationSpec>,
    pub endpoint: Option<Url>,
    pub backend: Option<BackendKind>,
    pub timeout: Option<Duration>,
    pub stream: Option<bool>,
    /// Group-level static headers from the nearest group declaring any.
    pub headers: Vec<(String, String)>,
    /// Group handlers followed by operation handlers; lookup scans in
    /// reverse, so operation registrations shadow group ones.
    pub handlers: Vec<(StatusRule, Handler)>,
    pub auth: Option<Auth>,
}

impl std::fmt::Debug for ResolvedOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedOperation")
            .field("spec", &self.spec)
            .field("endpoint", &self.endpoint)
            .field("backend", &self.backend)
            .field("timeout", &self.timeout)
            .field("stream", &self.stream)
            .field("headers", &self.headers)
            .field("handlers", &self.handlers.len())
            .field("auth", &self.auth)
            .finish()
    }
}

/// Linearizes composed groups: each group precedes its parents, parents in
/// registration order, duplicates keep their first (most derived) position.
pub(crate) fn linearize(groups: &[Api]) -> Vec<Api> {
    fn visit(group: &Api, out: &mut Vec<Api>) {
        if out.iter().any(|seen| seen.same_group(group)) {
            return;
        }
        out.push(group.clone());
        for parent in &group.inner.parents {
            visit(parent, out);
        }
    }

    let mut out = Vec::new();
    for group in groups {
        visit(group, &mut out);
    }
    out
}

fn first<T>(order: &[Api], pick: impl Fn(&GroupDefaults) -> Option<T>) -> Option<T> {
    order.iter().find_map(|group| pick(&group.inner.defaults))
}

/// Computes effective metadata for `name` over a linearized group order.
pub(crate) fn resolve(order: &[Api], name: &str) -> Result<ResolvedOperation, ConfigError> {
    let (defining, spec) = order
        .iter()
        .find_map(|group| {
            group
                .inner
                .operations
                .get(name)
                .map(|spec| (group, Arc::clone(spec)))
        })
        .ok_or_else(|| ConfigError::UnknownOperation(name.to_string()))?;

    let backend = spec
        .backend
        .or_else(|| first(order, |defaults| defaults.backend));
    let timeout = spec
        .timeout
        .or_else(|| first(order, |defaults| defaults.timeout));
    let stream = spec
        .stream
        .or_else(|| first(order, |defaults| defaults.stream));
    let auth = first(order, |defaults| defaults.auth.clone());

    let headers = order
        .iter()
        .map(|group| &group.inner.defaults.headers)
        .find(|headers| !headers.is_empty())
        .cloned()
        .unwrap_or_default();

    let mut handlers = order
        .iter()
        .map(|group| &group.inner.defaults.handlers)
        .find(|handlers| !handlers.is_empty())
        .cloned()
        .unwrap_or_default();
    handlers.extend(spec.handlers.iter().cloned());

    // Endpoint search starts at the defining group and walks its own
    // ancestors, never the siblings that happen to precede them in the
    // composed order. Only when that chain declares nothing does the
    // nearest endpoint anywhere in the composed order apply.
    let endpoint = spec
        .endpoint
        .clone()
        .or_else(|| {
            linearize(std::slice::from_ref(defining))
                .iter()
                .find_map(|group| group.inner.defaults.endpoint.clone())
        })
        .or_else(|| first(order, |defaults| defaults.endpoint.clone()));

    Ok(ResolvedOperation {
        spec,
        endpoint,
        backend,
        timeout,
        stream,
        headers,
        handlers,
        auth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Operation;

    fn group(name: &str) -> crate::api::ApiBuilder {
        Api::builder(name)
    }

    #[test]
    fn linearization_visits_derived_before_parents() {
        let a = group("a").build().unwrap();
        let b = group("b").inherit(&a).build().unwrap();
        let c = group("c").inherit(&a).build().unwrap();
        let d = group("d").inherit(&b).inherit(&c).build().unwrap();

        let order = linearize(std::slice::from_ref(&d));
        let names: Vec<_> = order.iter().map(Api::name).collect();
        assert_eq!(names, vec!["d", "b", "a", "c"]);
    }

    #[test]
    fn nearest_operation_override_wins() {
        let base = group("base")
            .operation(Operation::get("fetch", "v1/things"))
            .build()
            .unwrap();
        let derived = group("derived")
            .inherit(&base)
            .operation(Operation::get("fetch", "v2/things"))
            .build()
            .unwrap();

        let order = linearize(std::slice::from_ref(&derived));
        let resolved = resolve(&order, "fetch").unwrap();
        assert_eq!(resolved.spec.path(), "v2/things");
    }

    #[test]
    fn nearest_group_headers_replace_base_headers() {
        let base = group("base")
            .header("x-tag", "base")
            .header("x-only-base", "1")
            .operation(Operation::get("fetch", "things"))
            .build()
            .unwrap();
        let derived = group("derived")
            .inherit(&base)
            .header("x-tag", "derived")
            .build()
            .unwrap();

        let order = linearize(std::slice::from_ref(&derived));
        let resolved = resolve(&order, "fetch").unwrap();
        // No cross-level merging: the derived declaration wins wholesale.
        assert_eq!(resolved.headers, vec![("x-tag".to_string(), "derived".to_string())]);
    }

    #[test]
    fn endpoint_resolution_follows_defining_group() {
        // A declares endpoint x; C(B(A)) overrides the method with its own
        // operation-level endpoint y. The override resolves to y while the
        // untouched inherited method keeps x.
        let a = group("a")
            .endpoint("https://x.example.com")
            .operation(Operation::get("fetch", "things"))
            .operation(Operation::get("other", "other"))
            .build()
            .unwrap();
        let b = group("b").inherit(&a).build().unwrap();
        let c = group("c")
            .inherit(&b)
            .operation(Operation::get("fetch", "things").endpoint("https://y.example.com"))
            .build()
            .unwrap();

        let order = linearize(std::slice::from_ref(&c));

        let overridden = resolve(&order, "fetch").unwrap();
        assert_eq!(
            overridden.endpoint.unwrap().as_str(),
            "https://y.example.com/"
        );

        let inherited = resolve(&order, "other").unwrap();
        assert_eq!(inherited.endpoint.unwrap().as_str(), "https://x.example.com/");
    }

    #[test]
    fn derived_group_endpoint_does_not_leak_into_base_operations() {
        let base = group("base")
            .endpoint("https://base.example.com")
            .operation(Operation::get("fetch", "things"))
            .build()
            .unwrap();
        let derived = group("derived")
            .inherit(&base)
            .endpoint("https://derived.example.com")
            .operation(Operation::get("local", "local"))
            .build()
            .unwrap();

        let order = linearize(std::slice::from_ref(&derived));

        // `fetch` is defined on base, so the search starts there.
        let fetch = resolve(&order, "fetch").unwrap();
        assert_eq!(fetch.endpoint.unwrap().as_str(), "https://base.example.com/");

        // `local` is defined on derived and finds derived's endpoint first.
        let local = resolve(&order, "local").unwrap();
        assert_eq!(
            local.endpoint.unwrap().as_str(),
            "https://derived.example.com/"
        );
    }

    #[test]
    fn composing_group_endpoint_applies_when_defining_chain_has_none() {
        let fragment = group("fragment")
            .operation(Operation::get("fetch", "things"))
            .build()
            .unwrap();
        let composed = group("composed")
            .endpoint("https://composed.example.com")
            .inherit(&fragment)
            .build()
            .unwrap();

        let order = linearize(std::slice::from_ref(&composed));
        let resolved = resolve(&order, "fetch").unwrap();
        assert_eq!(
            resolved.endpoint.unwrap().as_str(),
            "https://composed.example.com/"
        );
    }

    #[test]
    fn operation_timeout_beats_group_timeout() {
        let base = group("base")
            .timeout(Duration::from_secs(30))
            .operation(Operation::get("slow", "slow").timeout(Duration::from_secs(5)))
            .operation(Operation::get("plain", "plain"))
            .build()
            .unwrap();

        let order = linearize(std::slice::from_ref(&base));
        assert_eq!(
            resolve(&order, "slow").unwrap().timeout,
            Some(Duration::from_secs(5))
        );
        assert_eq!(
            resolve(&order, "plain").unwrap().timeout,
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn unknown_operation_is_config_error() {
        let base = group("base").build().unwrap();
        let order = linearize(std::slice::from_ref(&base));
        let err = resolve(&order, "missing").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownOperation(name) if name == "missing"));
    }

    #[test]
    fn composed_groups_search_in_composition_order() {
        let one = group("one")
            .operation(Operation::get("shared", "from-one"))
            .build()
            .unwrap();
        let two = group("two")
            .operation(Operation::get("shared", "from-two"))
            .operation(Operation::get("extra", "extra"))
            .build()
            .unwrap();

        let order = linearize(&[one, two]);
        assert_eq!(resolve(&order, "shared").unwrap().spec.path(), "from-one");
        assert_eq!(resolve(&order, "extra").unwrap().spec.path(), "extra");
    }
}
