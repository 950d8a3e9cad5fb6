// Copyright 2021-2024 SecureDNA Stiftung (SecureDNA Foundation) <licensing@securedna.org>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Latency cases for the `/v3/service_plans` endpoints.

use crate::harness::case::BenchmarkCase;
use crate::harness::fixtures::{FixtureQuery, FixtureSpec};
use crate::harness::request::RequestTemplate;
use crate::shared::config::Config;
use crate::shared::types::{BudgetKind, PrincipalKind};

const PLANS: &str = "/v3/service_plans";

// Plans with at least one visibility row, i.e. plans a regular user can only see through an
// org it belongs to.
const RESTRICTED_PLANS: &str = "SELECT DISTINCT s_p.guid FROM service_plans s_p \
     INNER JOIN service_plan_visibilities s_p_v ON s_p.id = s_p_v.service_plan_id \
     ORDER BY s_p.guid";
const SERVICE_OFFERINGS: &str = "SELECT guid FROM services ORDER BY guid";
const SERVICE_INSTANCES: &str = "SELECT guid FROM service_instances ORDER BY guid";
const PREFIXED_ORGS: &str = "SELECT guid FROM organizations WHERE name LIKE ?1 ORDER BY guid";
const PREFIXED_SPACES: &str = "SELECT guid FROM spaces WHERE name LIKE ?1 ORDER BY guid";

struct Catalog<'a> {
    config: &'a Config,
}

impl Catalog<'_> {
    fn case(
        &self,
        endpoint: &str,
        principal: PrincipalKind,
        description: &str,
        budget: BudgetKind,
        request: RequestTemplate,
    ) -> BenchmarkCase {
        BenchmarkCase::new(
            endpoint,
            principal,
            description,
            self.config.budget(budget),
            self.config.samples,
            request,
        )
    }

    fn page_size(&self) -> u32 {
        self.config.large_page_size.0
    }

    fn restricted_plan(&self) -> FixtureSpec {
        FixtureSpec::required(FixtureQuery::database(RESTRICTED_PLANS, vec![]), 1)
    }

    fn guid_list(&self, statement: &str, params: Vec<String>) -> FixtureSpec {
        FixtureSpec::required(
            FixtureQuery::database(statement, params),
            self.config.fixture_pick,
        )
    }

    fn prefixed(&self, kind: &str) -> Vec<String> {
        vec![format!("{}-{kind}-%", self.config.name_prefix)]
    }

    fn list(&self) -> Vec<BenchmarkCase> {
        let endpoint = format!("GET {PLANS}");
        vec![
            self.case(
                &endpoint,
                PrincipalKind::Admin,
                "list all",
                BudgetKind::Basic,
                RequestTemplate::new(PLANS),
            ),
            self.case(
                &endpoint,
                PrincipalKind::Admin,
                &format!("list with page size {}", self.page_size()),
                BudgetKind::Long,
                RequestTemplate::new(PLANS).param("per_page", self.page_size()),
            ),
            self.case(
                &endpoint,
                PrincipalKind::RegularUser,
                "list all",
                BudgetKind::Long,
                RequestTemplate::new(PLANS),
            ),
        ]
    }

    fn show(&self) -> Vec<BenchmarkCase> {
        let endpoint = format!("GET {PLANS}/:guid");
        let request = RequestTemplate::new(PLANS).fixture_segment(0);
        vec![
            self.case(
                &endpoint,
                PrincipalKind::Admin,
                "show one",
                BudgetKind::Basic,
                request.clone(),
            )
            .with_fixture(FixtureSpec::required(
                FixtureQuery::listing(PLANS, PrincipalKind::Admin),
                1,
            )),
            self.case(
                &endpoint,
                PrincipalKind::RegularUser,
                "show one",
                BudgetKind::Long,
                request,
            )
            .with_fixture(self.restricted_plan()),
        ]
    }

    fn visibility(&self) -> Vec<BenchmarkCase> {
        let endpoint = format!("GET {PLANS}/:guid/visibility");
        let request = RequestTemplate::new(PLANS)
            .fixture_segment(0)
            .segment("visibility");
        [PrincipalKind::Admin, PrincipalKind::RegularUser]
            .into_iter()
            .map(|principal| {
                self.case(
                    &endpoint,
                    principal,
                    "show visibility",
                    BudgetKind::Basic,
                    request.clone(),
                )
                .with_fixture(self.restricted_plan())
            })
            .collect()
    }

    /// Filtering by a list of related guids, with the budgets for each principal and page size.
    fn filtered(
        &self,
        filter: &str,
        related: &str,
        statement: &str,
        variants: &[(PrincipalKind, bool, BudgetKind)],
    ) -> Vec<BenchmarkCase> {
        let endpoint = format!("GET {PLANS}?{filter}=");
        variants
            .iter()
            .map(|&(principal, large_page, budget)| {
                let mut request = RequestTemplate::new(PLANS).joined_fixture_param(filter, 0);
                let mut description = format!("filter for list of {related}");
                if large_page {
                    request = request.param("per_page", self.page_size());
                    description = format!("{description} with page size {}", self.page_size());
                }
                self.case(&endpoint, principal, &description, budget, request)
                    .with_fixture(self.guid_list(statement, vec![]))
            })
            .collect()
    }

    fn org_and_space(&self) -> BenchmarkCase {
        self.case(
            &format!("GET {PLANS}?organization_guids=&space_guids="),
            PrincipalKind::RegularUser,
            "filter by org and space guids",
            BudgetKind::Basic,
            RequestTemplate::new(PLANS)
                .joined_fixture_param("organization_guids", 0)
                .joined_fixture_param("space_guids", 1),
        )
        .with_fixture(self.guid_list(PREFIXED_ORGS, self.prefixed("org")))
        .with_fixture(self.guid_list(PREFIXED_SPACES, self.prefixed("space")))
    }
}

/// All service plan cases, in the order they run.
pub fn service_plan_cases(config: &Config) -> Vec<BenchmarkCase> {
    use BudgetKind::{Basic, Long};
    use PrincipalKind::{Admin, RegularUser};

    let catalog = Catalog { config };
    let mut cases = catalog.list();
    cases.extend(catalog.show());
    cases.extend(catalog.visibility());
    cases.extend(catalog.filtered(
        "service_offering_guids",
        "service_offerings",
        SERVICE_OFFERINGS,
        &[
            (Admin, false, Basic),
            (Admin, true, Long),
            (RegularUser, false, Basic),
        ],
    ));
    cases.extend(catalog.filtered(
        "service_instance_guids",
        "service_instances",
        SERVICE_INSTANCES,
        &[
            (Admin, false, Basic),
            (Admin, true, Long),
            (RegularUser, false, Long),
            (RegularUser, true, Long),
        ],
    ));
    cases.push(catalog.org_and_space());
    cases
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::Path;
    use std::time::Duration;

    use url::Url;

    use super::*;
    use crate::harness::fixtures::FixtureSet;
    use crate::shared::config::parse_config;

    fn config() -> Config {
        parse_config(
            r#"{
                "api_url": "https://api.example.com",
                "admin": {"token": "a"},
                "regular_user": {"token": "u"},
                "ccdb_path": "ccdb.sqlite",
                "large_page_size": 1000,
                "name_prefix": "bench"
            }"#,
            Path::new("config.json"),
            |_| None,
        )
        .unwrap()
    }

    fn find<'a>(cases: &'a [BenchmarkCase], name: &str) -> &'a BenchmarkCase {
        cases
            .iter()
            .find(|c| c.name == name)
            .unwrap_or_else(|| panic!("no case named {name:?}"))
    }

    fn url_for(case: &BenchmarkCase, ids: &[&[&str]]) -> String {
        let sets: Vec<_> = case
            .fixtures
            .iter()
            .zip(ids)
            .map(|(spec, ids)| {
                FixtureSet::new(
                    spec.query.clone(),
                    ids.iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect();
        case.request
            .build(&sets)
            .unwrap()
            .to_url(&Url::parse("https://api.example.com").unwrap())
            .to_string()
    }

    #[test]
    fn catalog_has_fifteen_uniquely_named_cases() {
        let cases = service_plan_cases(&config());
        assert_eq!(cases.len(), 15);
        let names: HashSet<_> = cases.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names.len(), 15);
        assert_eq!(cases[0].name, "GET /v3/service_plans as admin list all");
    }

    #[test]
    fn budgets_follow_the_table() {
        let cases = service_plan_cases(&config());
        let long = Duration::from_secs(120);
        let basic = Duration::from_secs(30);

        assert_eq!(
            find(&cases, "GET /v3/service_plans as admin list with page size 1000").budget,
            long
        );
        assert_eq!(
            find(&cases, "GET /v3/service_plans as regular user list all").budget,
            long
        );
        assert_eq!(
            find(&cases, "GET /v3/service_plans/:guid/visibility as regular user show visibility")
                .budget,
            basic
        );
        assert_eq!(
            find(
                &cases,
                "GET /v3/service_plans?service_instance_guids= as regular user filter for list of service_instances"
            )
            .budget,
            long
        );
    }

    #[test]
    fn regular_user_plans_come_from_visibility_rows() {
        let cases = service_plan_cases(&config());
        for case in cases
            .iter()
            .filter(|c| c.principal == PrincipalKind::RegularUser && c.name.contains(":guid"))
        {
            assert_eq!(case.fixtures.len(), 1);
            match &case.fixtures[0].query {
                FixtureQuery::Database { statement, .. } => {
                    assert!(statement.contains("service_plan_visibilities"), "{}", case.name)
                }
                other => panic!("{} resolves fixtures from {other}", case.name),
            }
        }

        let admin_show = find(&cases, "GET /v3/service_plans/:guid as admin show one");
        assert_eq!(
            admin_show.fixtures[0].query,
            FixtureQuery::listing("/v3/service_plans", PrincipalKind::Admin)
        );
    }

    #[test]
    fn requests_are_built_from_fixtures() {
        let cases = service_plan_cases(&config());

        let visibility = find(
            &cases,
            "GET /v3/service_plans/:guid/visibility as admin show visibility",
        );
        assert_eq!(
            url_for(visibility, &[&["p1"]]),
            "https://api.example.com/v3/service_plans/p1/visibility"
        );

        let offerings = find(
            &cases,
            "GET /v3/service_plans?service_offering_guids= as admin filter for list of service_offerings with page size 1000",
        );
        assert_eq!(offerings.fixtures[0].pick, 50);
        assert_eq!(
            url_for(offerings, &[&["s1", "s2"]]),
            "https://api.example.com/v3/service_plans?service_offering_guids=s1%2Cs2&per_page=1000"
        );

        let org_space = find(
            &cases,
            "GET /v3/service_plans?organization_guids=&space_guids= as regular user filter by org and space guids",
        );
        assert_eq!(
            url_for(org_space, &[&["o1"], &["sp1", "sp2"]]),
            "https://api.example.com/v3/service_plans?organization_guids=o1&space_guids=sp1%2Csp2"
        );
    }

    #[test]
    fn name_prefix_is_a_bound_parameter() {
        let cases = service_plan_cases(&config());
        let org_space = cases.last().unwrap();
        let params: Vec<_> = org_space
            .fixtures
            .iter()
            .map(|spec| match &spec.query {
                FixtureQuery::Database { statement, params } => {
                    assert!(!statement.contains("bench"));
                    params.clone()
                }
                other => panic!("unexpected query {other}"),
            })
            .collect();
        assert_eq!(
            params,
            [vec!["bench-org-%".to_owned()], vec!["bench-space-%".to_owned()]]
        );
    }
}
