use roster_core::db::open_db_in_memory;
use roster_core::{
    Member, MemberRepository, PageRequest, PagingConfig, RepoError, Session, SessionConfig, Sort,
    SqliteMemberRepository, SqliteTeamRepository, Team, TeamRepository,
};
use rusqlite::Connection;
use std::collections::BTreeSet;

fn seed_same_age(session: &mut Session<'_>, count: usize, age: i64) {
    let mut repo = SqliteMemberRepository::new(session);
    for index in 1..=count {
        repo.save(Member::new(format!("member{index}"), age)).unwrap();
    }
}

fn begin(conn: &mut Connection) -> Session<'_> {
    Session::begin(conn, SessionConfig::default()).unwrap()
}

#[test]
fn page_reports_totals_and_position() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    seed_same_age(&mut session, 5, 10);
    let mut repo = SqliteMemberRepository::new(&mut session);

    let request = PageRequest::of_sorted(0, 3, Sort::desc("username")).unwrap();
    let page = repo.find_by_age(10, &request).unwrap();

    let names = page.content().iter().map(|m| m.username.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["member5", "member4", "member3"]);
    assert_eq!(page.total_elements(), 5);
    assert_eq!(page.total_pages(), 2);
    assert_eq!(page.number(), 0);
    assert!(page.is_first());
    assert!(page.has_next());

    let last = repo.find_by_age(10, &request.next()).unwrap();
    assert_eq!(last.number_of_elements(), 2);
    assert!(last.is_last());
    assert!(!last.has_next());
}

#[test]
fn page_mapping_keeps_metadata() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    seed_same_age(&mut session, 5, 10);
    let mut repo = SqliteMemberRepository::new(&mut session);

    let request = PageRequest::of_sorted(0, 3, Sort::asc("username")).unwrap();
    let usernames = repo
        .find_all_paged(&request)
        .unwrap()
        .map(|member| member.username);
    assert_eq!(usernames.content(), &["member1", "member2", "member3"]);
    assert_eq!(usernames.total_elements(), 5);
}

#[test]
fn count_statement_is_skipped_when_window_decides_total() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    seed_same_age(&mut session, 5, 10);
    let mut repo = SqliteMemberRepository::new(&mut session);

    let cases = [
        (PageRequest::of(0, 10).unwrap(), 1, 5),
        (PageRequest::of(1, 3).unwrap(), 1, 5),
        (PageRequest::of(0, 3).unwrap(), 2, 5),
        (PageRequest::of(4, 3).unwrap(), 2, 5),
    ];
    for (request, expected_statements, expected_total) in cases {
        let before = repo.session().statement_count();
        let page = repo.find_all_paged(&request).unwrap();
        let issued = repo.session().statement_count() - before;
        assert_eq!(issued, expected_statements, "page {}", request.page());
        assert_eq!(page.total_elements(), expected_total, "page {}", request.page());
    }
}

#[test]
fn slice_fetches_one_extra_row_without_counting() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    seed_same_age(&mut session, 5, 10);
    let mut repo = SqliteMemberRepository::new(&mut session);

    let request = PageRequest::of_sorted(0, 3, Sort::desc("username")).unwrap();
    let before = repo.session().statement_count();
    let slice = repo.find_slice_by_age(10, &request).unwrap();
    assert_eq!(repo.session().statement_count() - before, 1);
    assert_eq!(slice.number_of_elements(), 3);
    assert!(slice.has_next());
    assert!(slice.is_first());

    let tail = repo.find_slice_by_age(10, &request.next()).unwrap();
    assert_eq!(tail.number_of_elements(), 2);
    assert!(!tail.has_next());
}

#[test]
fn extract_count_page_fetches_team_and_counts_without_join() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let team = SqliteTeamRepository::new(&mut session)
        .save(Team::new("teamA"))
        .unwrap();
    let mut repo = SqliteMemberRepository::new(&mut session);
    for index in 0..4 {
        repo.save(Member::with_team(format!("member{index}"), 10, &team).unwrap())
            .unwrap();
    }
    repo.save(Member::new("older", 40)).unwrap();
    repo.session().clear();

    let request = PageRequest::of(0, 2).unwrap();
    let page = repo.find_extract_count_by_age(10, &request).unwrap();
    assert_eq!(page.total_elements(), 4);
    assert_eq!(page.total_pages(), 2);

    let statements = repo.session().statement_count();
    let fetched = repo.team_of(&page.content()[0]).unwrap().unwrap();
    assert_eq!(fetched.name, "teamA");
    assert_eq!(fetched.members().len(), 4);
    assert_eq!(repo.session().statement_count(), statements);
}

#[test]
fn native_projection_pages_with_separate_count() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let team = SqliteTeamRepository::new(&mut session)
        .save(Team::new("teamA"))
        .unwrap();
    let mut repo = SqliteMemberRepository::new(&mut session);
    repo.save(Member::with_team("m1", 0, &team).unwrap()).unwrap();
    repo.save(Member::new("m2", 0)).unwrap();
    repo.save(Member::new("m3", 0)).unwrap();

    let request = PageRequest::of_sorted(0, 2, Sort::asc("id")).unwrap();
    let page = repo.find_by_native_projection(&request).unwrap();
    assert_eq!(page.total_elements(), 3);
    assert_eq!(page.content().len(), 2);
    assert_eq!(page.content()[0].username, "m1");
    assert_eq!(page.content()[0].team_name.as_deref(), Some("teamA"));
    assert_eq!(page.content()[1].team_name, None);

    let by_name = repo
        .find_by_native_projection(&PageRequest::of_sorted(0, 10, Sort::desc("username")).unwrap())
        .unwrap();
    assert_eq!(by_name.content()[0].username, "m3");
}

#[test]
fn unknown_sort_property_is_rejected() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    let mut repo = SqliteMemberRepository::new(&mut session);

    let request = PageRequest::of_sorted(0, 3, Sort::asc("password")).unwrap();
    assert!(matches!(
        repo.find_all_paged(&request),
        Err(RepoError::InvalidSort(property)) if property == "password"
    ));

    let native = PageRequest::of_sorted(0, 3, Sort::asc("age")).unwrap();
    assert!(matches!(
        repo.find_by_native_projection(&native),
        Err(RepoError::InvalidSort(_))
    ));
}

#[test]
fn request_from_params_uses_paging_defaults() {
    let config = PagingConfig::default();
    let request = PageRequest::from_params(Some(1), Some(5_000), Some("age,desc"), &config).unwrap();
    assert_eq!(request.page(), 1);
    assert_eq!(request.size(), config.max_size);
    assert_eq!(request.sort(), &Sort::desc("age"));

    assert!(matches!(
        PageRequest::from_params(None, None, Some("age;drop"), &config),
        Err(RepoError::InvalidSort(_))
    ));
}

#[test]
fn page_json_envelope_has_expected_keys() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = begin(&mut conn);
    seed_same_age(&mut session, 5, 10);
    let mut repo = SqliteMemberRepository::new(&mut session);

    let page = repo
        .find_all_paged(&PageRequest::of_sorted(0, 3, Sort::asc("username")).unwrap())
        .unwrap();
    let json = serde_json::to_value(&page).unwrap();
    let keys = json
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect::<BTreeSet<_>>();
    assert_eq!(
        keys,
        BTreeSet::from([
            "content",
            "first",
            "hasNext",
            "last",
            "number",
            "size",
            "totalElements",
            "totalPages",
        ])
    );
    assert_eq!(json["content"][0]["username"], "member1");
    assert_eq!(json["content"][0]["age"], 10);

    let slice = repo
        .find_slice_by_age(10, &PageRequest::of(0, 3).unwrap())
        .unwrap();
    let slice_json = serde_json::to_value(&slice).unwrap();
    assert_eq!(slice_json["hasNext"], true);
    assert!(slice_json.get("totalElements").is_none());
}
