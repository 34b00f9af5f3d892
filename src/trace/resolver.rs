//! Identifier resolution from inbound headers.

use axum::http::{HeaderMap, HeaderName};
use std::fmt;
use uuid::Uuid;

use crate::trace::spec::IdentifierSpec;

/// Source of freshly generated identifiers.
pub trait IdGenerator: Send + Sync + fmt::Debug {
    /// Produce a new identifier. Must not repeat across calls.
    fn generate(&self) -> String;
}

/// Random (version 4) UUIDs in canonical hyphenated form, backed by the OS CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidV4Generator;

impl IdGenerator for UuidV4Generator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Outcome of resolving one identifier kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The resolved value, absent if nothing matched and generation is off.
    pub value: Option<String>,
    /// True if `value` was produced by the generator.
    pub generated: bool,
}

impl Resolution {
    fn found(value: &str) -> Self {
        Self {
            value: Some(value.to_owned()),
            generated: false,
        }
    }

    fn generated(value: String) -> Self {
        Self {
            value: Some(value),
            generated: true,
        }
    }

    fn absent() -> Self {
        Self {
            value: None,
            generated: false,
        }
    }
}

/// Resolve one identifier from `headers` according to `spec`.
///
/// Candidates are checked in spec order and the first one carrying a
/// non-empty, visible-ASCII value wins, wherever it sits on the wire. Falls
/// back to `generator` when `spec` allows it. Never fails.
pub fn resolve(headers: &HeaderMap, spec: &IdentifierSpec, generator: &dyn IdGenerator) -> Resolution {
    let found = spec
        .candidates()
        .iter()
        .find_map(|candidate| header_value(headers, candidate.header_name()));

    match found {
        Some(value) => Resolution::found(value),
        None if spec.generate_on_miss() => Resolution::generated(generator.generate()),
        None => Resolution::absent(),
    }
}

/// First value of `name`, skipping empty and non-ASCII values.
fn header_value<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::spec::IdentifierKind;
    use axum::http::HeaderValue;

    #[derive(Debug)]
    struct Fixed(&'static str);

    impl IdGenerator for Fixed {
        fn generate(&self) -> String {
            self.0.to_string()
        }
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_static(value),
            );
        }
        map
    }

    #[test]
    fn test_configured_order_beats_wire_order() {
        let spec = IdentifierSpec::trace(["x-tommy-caffrey", "y-jacky-caffrey"]).unwrap();
        let inbound = headers(&[
            ("y-jacky-caffrey", "jacky-header-value"),
            ("x-tommy-caffrey", "tommy-header-value"),
        ]);

        let resolution = resolve(&inbound, &spec, &Fixed("generated"));
        assert_eq!(resolution.value.as_deref(), Some("tommy-header-value"));
        assert!(!resolution.generated);
    }

    #[test]
    fn test_falls_through_to_later_candidate() {
        let spec = IdentifierSpec::trace(["DM-REQUEST-ID", "DOWNSTREAM-REQUEST-ID"]).unwrap();
        let inbound = headers(&[("DOWNSTREAM-REQUEST-ID", "from-downstream")]);

        let resolution = resolve(&inbound, &spec, &Fixed("generated"));
        assert_eq!(resolution.value.as_deref(), Some("from-downstream"));
    }

    #[test]
    fn test_header_names_match_case_insensitively() {
        let spec = IdentifierSpec::span(["Bloomusalem"]).unwrap();
        let inbound = headers(&[("bloomusalem", "huge-pork-kidney")]);

        let resolution = resolve(&inbound, &spec, &Fixed("unused"));
        assert_eq!(resolution.value.as_deref(), Some("huge-pork-kidney"));
    }

    #[test]
    fn test_generates_on_miss_when_allowed() {
        let spec = IdentifierSpec::trace(["DM-Request-ID"]).unwrap();
        let inbound = headers(&[("x-kidneys", "pork")]);

        let resolution = resolve(&inbound, &spec, &Fixed("generated"));
        assert_eq!(resolution, Resolution::generated("generated".into()));
    }

    #[test]
    fn test_absent_when_generation_disabled() {
        for spec in [
            IdentifierSpec::span(["X-B3-SpanId"]).unwrap(),
            IdentifierSpec::parent_span(["X-B3-ParentSpan"]).unwrap(),
        ] {
            let resolution = resolve(&HeaderMap::new(), &spec, &Fixed("never"));
            assert_eq!(resolution, Resolution::absent(), "{:?}", spec.kind());
        }
    }

    #[test]
    fn test_empty_value_is_skipped() {
        let spec = IdentifierSpec::trace(["a-header", "b-header"]).unwrap();
        let inbound = headers(&[("a-header", ""), ("b-header", "second")]);

        let resolution = resolve(&inbound, &spec, &Fixed("generated"));
        assert_eq!(resolution.value.as_deref(), Some("second"));
    }

    #[test]
    fn test_non_ascii_value_is_skipped() {
        let spec = IdentifierSpec::trace(["DM-Request-ID", "X-B3-TraceId"]).unwrap();
        let mut inbound = HeaderMap::new();
        inbound.insert("dm-request-id", HeaderValue::from_bytes(b"caf\xe9").unwrap());
        inbound.insert("x-b3-traceid", HeaderValue::from_static("second"));

        let resolution = resolve(&inbound, &spec, &Fixed("generated"));
        assert_eq!(resolution.value.as_deref(), Some("second"));

        inbound.remove("x-b3-traceid");
        let resolution = resolve(&inbound, &spec, &Fixed("generated"));
        assert_eq!(resolution, Resolution::generated("generated".into()));
    }

    #[test]
    fn test_first_of_repeated_header_wins() {
        let spec = IdentifierSpec::span(["X-B3-SpanId"]).unwrap();
        let inbound = headers(&[("x-b3-spanid", "one"), ("x-b3-spanid", "two")]);

        let resolution = resolve(&inbound, &spec, &Fixed("unused"));
        assert_eq!(resolution.value.as_deref(), Some("one"));
    }

    #[test]
    fn test_uuid_generator_produces_v4() {
        let generator = UuidV4Generator;
        let first = generator.generate();
        let second = generator.generate();

        let parsed = Uuid::parse_str(&first).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(first, parsed.hyphenated().to_string());
        assert_ne!(first, second);
    }

    #[test]
    fn test_kind_is_carried_by_spec() {
        let spec = IdentifierSpec::parent_span(["X-B3-ParentSpan"]).unwrap();
        assert_eq!(spec.kind(), IdentifierKind::ParentSpan);
    }
}
