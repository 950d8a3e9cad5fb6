// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

/* Request descriptors and the templates they are built from */

use std::fmt;

use url::Url;

use crate::error::SetupError;
use crate::harness::fixtures::FixtureSet;

/// A fully parameterized GET: path segments plus ordered query parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointRequest {
    segments: Vec<String>,
    query: Vec<(String, String)>,
}

impl EndpointRequest {
    /// A request for a static path with no query parameters.
    pub fn from_path(path: &str) -> Self {
        Self {
            segments: split_path(path).collect(),
            query: Vec::new(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Resolve against the API base url. Segments are percent-encoded individually and
    /// the query is form-encoded, so a comma-joined id list travels as a single value.
    pub fn to_url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(&self.segments);
        }
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }
        url
    }
}

impl fmt::Display for EndpointRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        if !self.query.is_empty() {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&self.query)
                .finish();
            write!(f, "?{encoded}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// The first identifier of the fixture set in this slot.
    Fixture(usize),
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Param {
    Literal { name: String, value: String },
    /// All identifiers of the fixture set in this slot, comma-joined.
    JoinedFixture { name: String, slot: usize },
}

/// Describes how to derive an [`EndpointRequest`] from a case's resolved fixtures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestTemplate {
    segments: Vec<Segment>,
    params: Vec<Param>,
}

impl RequestTemplate {
    /// Start from a static path such as `/v3/service_plans`.
    pub fn new(path: &str) -> Self {
        Self {
            segments: split_path(path).map(Segment::Literal).collect(),
            params: Vec::new(),
        }
    }

    pub fn segment(mut self, literal: &str) -> Self {
        self.segments.push(Segment::Literal(literal.to_owned()));
        self
    }

    pub fn fixture_segment(mut self, slot: usize) -> Self {
        self.segments.push(Segment::Fixture(slot));
        self
    }

    pub fn param(mut self, name: &str, value: impl ToString) -> Self {
        self.params.push(Param::Literal {
            name: name.to_owned(),
            value: value.to_string(),
        });
        self
    }

    pub fn joined_fixture_param(mut self, name: &str, slot: usize) -> Self {
        self.params.push(Param::JoinedFixture {
            name: name.to_owned(),
            slot,
        });
        self
    }

    /// Build the request. Every referenced slot must hold a non-empty fixture set.
    pub fn build(&self, fixtures: &[FixtureSet]) -> Result<EndpointRequest, SetupError> {
        let mut segments = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            segments.push(match segment {
                Segment::Literal(s) => s.clone(),
                Segment::Fixture(index) => slot(fixtures, *index)?.ids()[0].clone(),
            });
        }

        let mut query = Vec::with_capacity(self.params.len());
        for param in &self.params {
            query.push(match param {
                Param::Literal { name, value } => (name.clone(), value.clone()),
                Param::JoinedFixture { name, slot: index } => {
                    (name.clone(), slot(fixtures, *index)?.ids().join(","))
                }
            });
        }

        Ok(EndpointRequest { segments, query })
    }
}

fn split_path(path: &str) -> impl Iterator<Item = String> + '_ {
    path.split('/').filter(|s| !s.is_empty()).map(str::to_owned)
}

fn slot(fixtures: &[FixtureSet], index: usize) -> Result<&FixtureSet, SetupError> {
    let set = fixtures.get(index).ok_or(SetupError::MissingFixtureSlot {
        slot: index,
        available: fixtures.len(),
    })?;
    if set.is_empty() {
        return Err(SetupError::EmptyFixtureSet {
            query: set.query().to_string(),
        });
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::fixtures::FixtureQuery;

    fn set(ids: &[&str]) -> FixtureSet {
        FixtureSet::new(
            FixtureQuery::database("SELECT guid FROM services", vec![]),
            ids.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn builds_path_suffix_endpoints() {
        let request = RequestTemplate::new("/v3/service_plans")
            .fixture_segment(0)
            .segment("visibility")
            .build(&[set(&["plan-guid"])])
            .unwrap();

        let base = Url::parse("https://api.example.com").unwrap();
        assert_eq!(
            request.to_url(&base).as_str(),
            "https://api.example.com/v3/service_plans/plan-guid/visibility"
        );
        assert_eq!(request.to_string(), "/v3/service_plans/plan-guid/visibility");
    }

    #[test]
    fn joined_ids_are_one_encoded_value() {
        let request = RequestTemplate::new("/v3/service_plans")
            .joined_fixture_param("service_offering_guids", 0)
            .param("per_page", 500)
            .build(&[set(&["a", "b", "c"])])
            .unwrap();

        let base = Url::parse("https://api.example.com/").unwrap();
        let url = request.to_url(&base);
        assert_eq!(
            url.as_str(),
            "https://api.example.com/v3/service_plans?service_offering_guids=a%2Cb%2Cc&per_page=500"
        );
        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[0], ("service_offering_guids".into(), "a,b,c".into()));
    }

    #[test]
    fn base_path_prefix_is_kept() {
        let request = RequestTemplate::new("/v3/service_plans").build(&[]).unwrap();
        let base = Url::parse("https://gateway.example.com/cf/").unwrap();
        assert_eq!(
            request.to_url(&base).as_str(),
            "https://gateway.example.com/cf/v3/service_plans"
        );
    }

    #[test]
    fn fixture_ids_cannot_escape_their_segment() {
        let request = RequestTemplate::new("/v3/service_plans")
            .fixture_segment(0)
            .build(&[set(&["../admin?x=1"])])
            .unwrap();
        let base = Url::parse("https://api.example.com").unwrap();
        let url = request.to_url(&base);
        assert_eq!(url.path_segments().unwrap().count(), 3);
        assert_eq!(url.query(), None);
    }

    #[test]
    fn empty_fixture_sets_are_refused() {
        let err = RequestTemplate::new("/v3/service_plans")
            .joined_fixture_param("space_guids", 0)
            .build(&[set(&[])])
            .unwrap_err();
        assert!(matches!(err, SetupError::EmptyFixtureSet { .. }));
    }

    #[test]
    fn unknown_slots_are_refused() {
        let err = RequestTemplate::new("/v3/service_plans")
            .fixture_segment(1)
            .build(&[set(&["a"])])
            .unwrap_err();
        assert!(matches!(
            err,
            SetupError::MissingFixtureSlot {
                slot: 1,
                available: 1
            }
        ));
    }
}
