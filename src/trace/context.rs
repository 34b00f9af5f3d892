//! Per-request trace context.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::trace::resolver;
use crate::trace::spec::TraceSpecs;

/// Identifiers resolved for one inbound request.
///
/// Built once before any handler runs and never mutated afterwards. Handlers
/// read it through the axum extractor; the middleware echoes `trace_id` on
/// the response.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TraceContext {
    trace_id: String,
    span_id: Option<String>,
    parent_span_id: Option<String>,
    #[serde(skip)]
    trace_id_generated: bool,
    onward_headers: OnwardHeaders,
}

impl TraceContext {
    /// Resolve trace, span and parent span ids from inbound headers.
    pub fn resolve(headers: &HeaderMap, specs: &TraceSpecs) -> Self {
        let generator = specs.generator();
        let trace = resolver::resolve(headers, specs.trace(), generator);
        let span = resolver::resolve(headers, specs.span(), generator);
        let parent_span = resolver::resolve(headers, specs.parent_span(), generator);

        // The trace spec always generates on miss.
        let trace_id = trace.value.unwrap_or_else(|| generator.generate());

        let mut onward_headers = OnwardHeaders::default();
        for (spec, value) in [
            (specs.trace(), Some(trace_id.as_str())),
            (specs.span(), span.value.as_deref()),
            (specs.parent_span(), parent_span.value.as_deref()),
        ] {
            let Some(value) = value.filter(|_| spec.propagate()) else {
                continue;
            };
            for candidate in spec.candidates() {
                onward_headers.insert(candidate.name(), value);
            }
        }

        Self {
            trace_id,
            span_id: span.value,
            parent_span_id: parent_span.value,
            trace_id_generated: trace.generated,
            onward_headers,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Alias of [`trace_id`](Self::trace_id).
    pub fn request_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span_id(&self) -> Option<&str> {
        self.span_id.as_deref()
    }

    pub fn parent_span_id(&self) -> Option<&str> {
        self.parent_span_id.as_deref()
    }

    /// True if no inbound header carried a trace id.
    pub fn trace_id_generated(&self) -> bool {
        self.trace_id_generated
    }

    /// Headers to attach to any call made to a downstream service.
    ///
    /// Every trace header name maps to the trace id and, when a span id was
    /// received, every span header name maps to it. Parent span headers are
    /// never included; code creating a child span sets its own.
    pub fn onward_headers(&self) -> &OnwardHeaders {
        &self.onward_headers
    }
}

/// Ordered header name/value pairs with case-insensitive names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OnwardHeaders {
    entries: Vec<(String, String)>,
}

impl OnwardHeaders {
    /// Insert or replace `name`, comparing names case-insensitively.
    pub fn insert(&mut self, name: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some(entry) => entry.1 = value.to_owned(),
            None => self.entries.push((name.to_owned(), value.to_owned())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set every entry on `headers`, replacing existing values.
    ///
    /// Entries that do not form a valid header are skipped and logged.
    pub fn apply_to(&self, headers: &mut HeaderMap) {
        for (name, value) in self.iter() {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Skipping onward header that is not a valid HTTP header"),
            }
        }
    }

    pub fn to_header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(self.len());
        self.apply_to(&mut headers);
        headers
    }
}

impl Serialize for OnwardHeaders {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TraceConfig;
    use crate::trace::resolver::IdGenerator;

    #[derive(Debug)]
    struct Fixed;

    impl IdGenerator for Fixed {
        fn generate(&self) -> String {
            "generated".to_string()
        }
    }

    fn specs(config: TraceConfig) -> TraceSpecs {
        TraceSpecs::from_config(&config).unwrap().with_generator(Fixed)
    }

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    fn onward(ctx: &TraceContext) -> Vec<(&str, &str)> {
        let mut pairs: Vec<_> = ctx.onward_headers().iter().collect();
        pairs.sort();
        pairs
    }

    fn dm_config() -> TraceConfig {
        TraceConfig {
            request_id_header: "DM-REQUEST-ID".into(),
            downstream_request_id_header: Some("DOWNSTREAM-REQUEST-ID".into()),
            ..TraceConfig::default()
        }
    }

    #[test]
    fn test_primary_header_wins_and_is_propagated_everywhere() {
        let ctx = specs(dm_config()).resolve(&headers(&[
            ("DM-REQUEST-ID", "from-header"),
            ("DOWNSTREAM-REQUEST-ID", "from-downstream"),
        ]));

        assert_eq!(ctx.trace_id(), "from-header");
        assert_eq!(ctx.request_id(), "from-header");
        assert!(!ctx.trace_id_generated());
        assert_eq!(
            onward(&ctx),
            [("DM-REQUEST-ID", "from-header"), ("DOWNSTREAM-REQUEST-ID", "from-header")]
        );
    }

    #[test]
    fn test_downstream_header_used_when_primary_missing() {
        let ctx = specs(dm_config()).resolve(&headers(&[("DOWNSTREAM-REQUEST-ID", "from-downstream")]));

        assert_eq!(ctx.trace_id(), "from-downstream");
        assert_eq!(
            onward(&ctx),
            [("DM-REQUEST-ID", "from-downstream"), ("DOWNSTREAM-REQUEST-ID", "from-downstream")]
        );
    }

    #[test]
    fn test_generated_trace_id_fills_every_trace_header() {
        let config = TraceConfig {
            downstream_request_id_header: Some(String::new()),
            ..dm_config()
        };
        let ctx = specs(config).resolve(&HeaderMap::new());

        assert_eq!(ctx.trace_id(), "generated");
        assert!(ctx.trace_id_generated());
        assert_eq!(
            onward(&ctx),
            [("DM-REQUEST-ID", "generated"), ("X-B3-TraceId", "generated")]
        );
    }

    #[test]
    fn test_override_list_ignores_primary_and_downstream_headers() {
        let config = TraceConfig {
            trace_id_headers: Some(vec!["x-tommy-caffrey".into(), "y-jacky-caffrey".into()]),
            ..dm_config()
        };
        let ctx = specs(config).resolve(&headers(&[
            ("DM-REQUEST-ID", "from-header"),
            ("DOWNSTREAM-REQUEST-ID", "from-downstream"),
        ]));

        assert_eq!(ctx.trace_id(), "generated");
        assert_eq!(
            onward(&ctx),
            [("x-tommy-caffrey", "generated"), ("y-jacky-caffrey", "generated")]
        );
    }

    #[test]
    fn test_unset_downstream_header_falls_back_to_b3() {
        let config = TraceConfig {
            request_id_header: "DM-REQUEST-ID".into(),
            ..TraceConfig::default()
        };
        let ctx = specs(config).resolve(&headers(&[
            ("x-kidneys", "pork"),
            ("x-b3-traceid", "Grilled Mutton"),
        ]));

        assert_eq!(ctx.trace_id(), "Grilled Mutton");
        assert_eq!(
            onward(&ctx),
            [("DM-REQUEST-ID", "Grilled Mutton"), ("X-B3-TraceId", "Grilled Mutton")]
        );
    }

    #[test]
    fn test_span_id_is_forwarded_under_configured_spelling() {
        let ctx = specs(TraceConfig::default()).resolve(&headers(&[
            ("dm-request-id", "t1"),
            ("x-b3-spanid", "Steak, kidney, liver, mashed"),
        ]));

        assert_eq!(ctx.span_id(), Some("Steak, kidney, liver, mashed"));
        assert_eq!(ctx.onward_headers().get("X-B3-SpanId"), Some("Steak, kidney, liver, mashed"));
        assert_eq!(ctx.onward_headers().len(), 3);
    }

    #[test]
    fn test_missing_span_id_is_not_generated_or_forwarded() {
        let ctx = specs(TraceConfig::default()).resolve(&HeaderMap::new());

        assert_eq!(ctx.span_id(), None);
        assert!(!ctx.onward_headers().contains("X-B3-SpanId"));
        assert_eq!(ctx.onward_headers().len(), 2);
    }

    #[test]
    fn test_every_span_header_name_is_forwarded() {
        let config = TraceConfig {
            span_id_headers: vec!["barrels-and-boxes".into(), "Bloomusalem".into()],
            ..TraceConfig::default()
        };
        let ctx = specs(config).resolve(&headers(&[("bloomusalem", "huge-pork-kidney")]));

        assert_eq!(ctx.span_id(), Some("huge-pork-kidney"));
        assert_eq!(ctx.onward_headers().get("barrels-and-boxes"), Some("huge-pork-kidney"));
        assert_eq!(ctx.onward_headers().get("Bloomusalem"), Some("huge-pork-kidney"));
    }

    #[test]
    fn test_parent_span_id_is_resolved_but_never_forwarded() {
        let config = TraceConfig {
            parent_span_id_headers: vec!["Potato-Preservative".into()],
            ..TraceConfig::default()
        };
        let ctx = specs(config).resolve(&headers(&[("POTATO-PRESERVATIVE", "Plage and Pestilence")]));

        assert_eq!(ctx.parent_span_id(), Some("Plage and Pestilence"));
        assert!(!ctx.onward_headers().contains("Potato-Preservative"));

        let ctx = specs(TraceConfig::default()).resolve(&headers(&[
            ("X-B3-PARENTSPAN", "colossal-edifice"),
            ("X-WANDERING-SOAP", "Flower of the Bath"),
        ]));
        assert_eq!(ctx.parent_span_id(), Some("colossal-edifice"));
        assert!(!ctx.onward_headers().contains("X-B3-ParentSpan"));
    }

    #[test]
    fn test_identifier_kinds_resolve_independently() {
        // (config tweak, inbound headers, expected trace id)
        let trace_cases: [(Option<Vec<String>>, Vec<(&str, &str)>, &str); 3] = [
            (None, vec![("dm-request-id", "from-header")], "from-header"),
            (None, vec![], "generated"),
            (
                Some(vec!["x-tommy-caffrey".into(), "y-jacky-caffrey".into()]),
                vec![("y-jacky-caffrey", "jacky"), ("x-tommy-caffrey", "tommy")],
                "tommy",
            ),
        ];
        let span_cases: [(Vec<(&str, &str)>, Option<&str>); 2] =
            [(vec![("x-b3-spanid", "S1")], Some("S1")), (vec![], None)];
        let parent_cases: [(Vec<(&str, &str)>, Option<&str>); 2] =
            [(vec![("x-b3-parentspan", "P1")], Some("P1")), (vec![], None)];

        for (trace_override, trace_headers, expected_trace) in &trace_cases {
            for (span_headers, expected_span) in &span_cases {
                for (parent_headers, expected_parent) in &parent_cases {
                    let config = TraceConfig {
                        trace_id_headers: trace_override.clone(),
                        ..TraceConfig::default()
                    };
                    let inbound: Vec<_> = trace_headers
                        .iter()
                        .chain(span_headers)
                        .chain(parent_headers)
                        .copied()
                        .collect();
                    let ctx = specs(config).resolve(&headers(&inbound));

                    assert_eq!(ctx.trace_id(), *expected_trace);
                    assert_eq!(ctx.span_id(), *expected_span);
                    assert_eq!(ctx.parent_span_id(), *expected_parent);
                    assert_eq!(ctx.onward_headers().get("X-B3-SpanId"), *expected_span);
                    assert!(!ctx.onward_headers().contains("X-B3-ParentSpan"));
                }
            }
        }
    }

    #[test]
    fn test_onward_headers_replace_case_insensitively() {
        let mut onward = OnwardHeaders::default();
        onward.insert("X-B3-TraceId", "a");
        onward.insert("x-b3-traceid", "b");

        assert_eq!(onward.len(), 1);
        assert_eq!(onward.get("X-B3-TRACEID"), Some("b"));
        assert_eq!(onward.iter().next(), Some(("X-B3-TraceId", "b")));
    }

    #[test]
    fn test_onward_headers_to_header_map() {
        let ctx = specs(TraceConfig::default()).resolve(&headers(&[("x-b3-spanid", "S1")]));
        let map = ctx.onward_headers().to_header_map();

        assert_eq!(map.get("dm-request-id").unwrap(), "generated");
        assert_eq!(map.get("x-b3-traceid").unwrap(), "generated");
        assert_eq!(map.get("x-b3-spanid").unwrap(), "S1");
        assert!(map.get("x-b3-parentspan").is_none());
    }

    #[test]
    fn test_serializes_onward_headers_as_object() {
        let ctx = specs(TraceConfig::default()).resolve(&headers(&[("x-b3-spanid", "S1")]));
        let json = serde_json::to_value(&ctx).unwrap();

        assert_eq!(json["trace_id"], "generated");
        assert_eq!(json["span_id"], "S1");
        assert!(json["parent_span_id"].is_null());
        assert_eq!(json["onward_headers"]["X-B3-SpanId"], "S1");
        assert!(json.get("trace_id_generated").is_none());
    }
}
