use roster_core::db::open_db_in_memory;
use roster_core::{
    MemberService, PagingConfig, RepoError, Session, SessionConfig, SqliteMemberRepository,
    SqliteTeamRepository, Team, TeamRepository,
};

#[test]
fn default_listing_uses_configured_size_and_sort() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = Session::begin(&mut conn, SessionConfig::default()).unwrap();
    let mut service = MemberService::new(
        SqliteMemberRepository::new(&mut session),
        PagingConfig::default(),
    );

    let ids = service.seed_members(100).unwrap();
    assert_eq!(ids.len(), 100);

    let request = service.default_request().unwrap();
    let page = service.list_members(&request).unwrap();
    assert_eq!(page.size(), 12);
    assert_eq!(page.number_of_elements(), 12);
    assert_eq!(page.content()[0].username, "user99");
    assert_eq!(page.total_elements(), 100);
    assert_eq!(page.total_pages(), 9);

    let last_request = service.page_request(Some(8), None, None).unwrap();
    let last = service.list_members(&last_request).unwrap();
    assert_eq!(last.number_of_elements(), 4);
    assert!(last.is_last());
}

#[test]
fn dto_listing_resolves_team_names() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = Session::begin(&mut conn, SessionConfig::default()).unwrap();
    let team = SqliteTeamRepository::new(&mut session)
        .save(Team::new("teamA"))
        .unwrap();
    let mut service = MemberService::new(
        SqliteMemberRepository::new(&mut session),
        PagingConfig::default(),
    );
    let ids = service.seed_members(2).unwrap();

    service
        .repository()
        .session()
        .change_team(ids[0], team.id())
        .unwrap();

    let request = service.page_request(None, None, Some("id")).unwrap();
    let page = service.list_member_dtos(&request).unwrap();
    let json = serde_json::to_value(&page).unwrap();
    assert_eq!(json["content"][0]["username"], "user0");
    assert_eq!(json["content"][0]["teamName"], "teamA");
    assert_eq!(json["content"][1]["teamName"], serde_json::Value::Null);
    assert_eq!(json["totalElements"], 2);
}

#[test]
fn dto_listing_defaults_to_five_members_in_id_order() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = Session::begin(&mut conn, SessionConfig::default()).unwrap();
    let mut service = MemberService::new(
        SqliteMemberRepository::new(&mut session),
        PagingConfig::default(),
    );
    service.seed_members(12).unwrap();

    let request = service.dto_page_request(None, None, None).unwrap();
    let page = service.list_member_dtos(&request).unwrap();
    assert_eq!(page.size(), 5);
    assert_eq!(page.total_elements(), 12);
    assert_eq!(page.total_pages(), 3);
    let names = page
        .content()
        .iter()
        .map(|dto| dto.username.as_str())
        .collect::<Vec<_>>();
    assert_eq!(names, ["user0", "user1", "user2", "user3", "user4"]);
}

#[test]
fn invalid_sort_parameter_is_reported() {
    let mut conn = open_db_in_memory().unwrap();
    let mut session = Session::begin(&mut conn, SessionConfig::default()).unwrap();
    let service = MemberService::new(
        SqliteMemberRepository::new(&mut session),
        PagingConfig::default(),
    );

    assert!(matches!(
        service.page_request(None, None, Some("username desc")),
        Err(RepoError::InvalidSort(_))
    ));
}
